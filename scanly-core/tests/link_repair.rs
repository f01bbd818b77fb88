#![cfg(unix)]

mod support;

use std::os::unix::fs::symlink;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use scanly_core::ScanlyError;
use scanly_core::collaborators::NotificationEvent;
use scanly_core::model::repair::RepairPhase;
use scanly_core::repair::{LinkRepairEngine, RepairConfig, RepairMonitor};
use support::{RecordingNotifier, eventually};
use tokio_util::sync::CancellationToken;

struct Layout {
    _tmp: tempfile::TempDir,
    src: PathBuf,
    dest: PathBuf,
}

fn layout() -> Layout {
    let tmp = tempfile::tempdir().unwrap();
    let base = tmp.path().canonicalize().unwrap();
    let src = base.join("src");
    let dest = base.join("library");
    std::fs::create_dir_all(&src).unwrap();
    std::fs::create_dir_all(&dest).unwrap();
    Layout {
        _tmp: tmp,
        src,
        dest,
    }
}

fn link(target: &Path, link: &Path) {
    std::fs::create_dir_all(link.parent().unwrap()).unwrap();
    symlink(target, link).unwrap();
}

fn file(path: &Path) {
    std::fs::create_dir_all(path.parent().unwrap()).unwrap();
    std::fs::write(path, b"video").unwrap();
}

#[tokio::test]
async fn moved_source_is_relinked_and_second_run_is_clean() {
    let l = layout();
    let original = l.src.join("A").join("movie.mkv");
    file(&original);
    let linked = l.dest.join("Movies").join("Movie (2020)").join("movie.mkv");
    link(&original, &linked);

    std::fs::rename(l.src.join("A"), l.src.join("B")).unwrap();

    let engine = LinkRepairEngine::new(RepairConfig::new(&l.dest, vec![l.src.clone()]));
    let report = engine.check_and_repair().await.unwrap();
    assert_eq!(report.scanned, 1);
    assert_eq!(report.found, 1);
    assert_eq!(report.repaired, 1);
    assert_eq!(report.failed, 0);
    assert!(report.finished_at >= report.started_at);

    assert_eq!(
        std::fs::read_link(&linked).unwrap(),
        l.src.join("B").join("movie.mkv")
    );
    assert_eq!(std::fs::read(&linked).unwrap(), b"video");

    let second = engine.check_and_repair().await.unwrap();
    assert_eq!(second.found, 0);
    assert_eq!(second.repaired, 0);
}

#[tokio::test]
async fn relative_mode_writes_relative_targets() {
    let l = layout();
    let original = l.src.join("old").join("episode.mkv");
    file(&original);
    let linked = l.dest.join("TV Shows").join("Show").join("episode.mkv");
    link(&original, &linked);
    std::fs::rename(l.src.join("old"), l.src.join("new")).unwrap();

    let mut config = RepairConfig::new(&l.dest, vec![l.src.clone()]);
    config.relative_links = true;
    let engine = LinkRepairEngine::new(config);
    assert_eq!(engine.check_and_repair().await.unwrap().repaired, 1);

    let target = std::fs::read_link(&linked).unwrap();
    assert!(target.is_relative());
    assert_eq!(
        target,
        Path::new("../../../src/new/episode.mkv").to_path_buf()
    );
    assert_eq!(std::fs::read(&linked).unwrap(), b"video");
}

#[tokio::test]
async fn unrepairable_links_are_left_alone() {
    let l = layout();
    let linked = l.dest.join("Movies").join("Gone").join("gone.mkv");
    link(&l.src.join("nowhere").join("gone.mkv"), &linked);
    let healthy_source = l.src.join("here.mkv");
    file(&healthy_source);
    let healthy = l.dest.join("Movies").join("Here").join("here.mkv");
    link(&healthy_source, &healthy);

    let engine = LinkRepairEngine::new(RepairConfig::new(&l.dest, vec![l.src.clone()]));
    let report = engine.check_and_repair().await.unwrap();
    assert_eq!(report.scanned, 2);
    assert_eq!(report.found, 1);
    assert_eq!(report.repaired, 0);
    assert_eq!(report.failed, 1);

    // Still there, still pointing at the old place.
    assert!(std::fs::symlink_metadata(&linked).is_ok());
    assert_eq!(
        std::fs::read_link(&linked).unwrap(),
        l.src.join("nowhere").join("gone.mkv")
    );
    assert_eq!(std::fs::read_link(&healthy).unwrap(), healthy_source);
}

#[tokio::test]
async fn directory_links_are_not_followed() {
    let l = layout();
    link(&l.dest, &l.dest.join("loop"));

    let engine = LinkRepairEngine::new(RepairConfig::new(&l.dest, vec![l.src.clone()]));
    let report = tokio::time::timeout(Duration::from_secs(5), engine.check_and_repair())
        .await
        .unwrap()
        .unwrap();
    assert_eq!(report.scanned, 1);
    assert_eq!(report.found, 0);
}

#[tokio::test]
async fn missing_destination_is_an_error() {
    let l = layout();
    let engine = LinkRepairEngine::new(RepairConfig::new(l.dest.join("absent"), vec![]));

    assert!(matches!(
        engine.check_and_repair().await,
        Err(ScanlyError::InvalidPath(_))
    ));
    assert_eq!(engine.phase(), RepairPhase::Idle);
}

#[tokio::test]
async fn phase_is_observable() {
    let l = layout();
    let engine = LinkRepairEngine::new(RepairConfig::new(&l.dest, vec![]));
    let mut phases = engine.subscribe();
    assert_eq!(*phases.borrow(), RepairPhase::Idle);

    engine.check_and_repair().await.unwrap();
    assert!(phases.has_changed().unwrap());
    assert_eq!(*phases.borrow_and_update(), RepairPhase::Done);
    assert_eq!(engine.phase(), RepairPhase::Done);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn monitor_repairs_in_the_background_and_reports() {
    let l = layout();
    let original = l.src.join("first").join("clip.mkv");
    file(&original);
    let linked = l.dest.join("Movies").join("Clip").join("clip.mkv");
    link(&original, &linked);
    std::fs::rename(l.src.join("first"), l.src.join("second")).unwrap();

    let engine = Arc::new(LinkRepairEngine::new(RepairConfig::new(
        &l.dest,
        vec![l.src.clone()],
    )));
    let notifier = Arc::new(RecordingNotifier::default());
    let monitor = RepairMonitor::new(engine, Duration::from_millis(100), notifier.clone());

    assert!(monitor.start().await);
    assert!(!monitor.start().await);
    assert!(monitor.is_running().await);

    let recorder = Arc::clone(&notifier);
    assert!(
        eventually(5, || {
            let recorder = Arc::clone(&recorder);
            async move {
                recorder.events().iter().any(|event| {
                    matches!(event, NotificationEvent::LinksRepaired { repaired: 1, .. })
                })
            }
        })
        .await
    );
    assert_eq!(
        std::fs::read_link(&linked).unwrap(),
        l.src.join("second").join("clip.mkv")
    );

    assert!(monitor.stop().await);
    assert!(!monitor.stop().await);
    assert!(!monitor.is_running().await);
}

#[tokio::test]
async fn cancelled_run_changes_nothing_and_resets_phase() {
    let l = layout();
    let original = l.src.join("A").join("movie.mkv");
    file(&original);
    let linked = l.dest.join("Movies").join("Movie").join("movie.mkv");
    link(&original, &linked);
    std::fs::rename(l.src.join("A"), l.src.join("B")).unwrap();

    let engine = LinkRepairEngine::new(RepairConfig::new(&l.dest, vec![l.src.clone()]));
    let cancel = CancellationToken::new();
    cancel.cancel();

    assert!(matches!(
        engine.check_and_repair_until(&cancel).await,
        Err(ScanlyError::Cancelled(_))
    ));
    assert_eq!(engine.phase(), RepairPhase::Idle);
    assert_eq!(std::fs::read_link(&linked).unwrap(), original);

    // An uncancelled run afterwards still repairs.
    assert_eq!(engine.check_and_repair().await.unwrap().repaired, 1);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn stopping_the_monitor_never_leaves_a_run_half_way() {
    let l = layout();
    for n in 0..200 {
        let source = l.src.join(format!("old-{n}")).join(format!("clip-{n}.mkv"));
        file(&source);
        link(
            &source,
            &l.dest.join("Movies").join(format!("Clip {n}")).join(format!("clip-{n}.mkv")),
        );
        std::fs::rename(l.src.join(format!("old-{n}")), l.src.join(format!("new-{n}"))).unwrap();
    }

    let engine = Arc::new(LinkRepairEngine::new(RepairConfig::new(
        &l.dest,
        vec![l.src.clone()],
    )));
    let monitor = RepairMonitor::new(
        Arc::clone(&engine),
        Duration::from_secs(3600),
        Arc::new(RecordingNotifier::default()),
    );

    assert!(monitor.start().await);
    tokio::time::sleep(Duration::from_millis(20)).await;
    assert!(monitor.stop().await);

    assert!(matches!(
        engine.phase(),
        RepairPhase::Idle | RepairPhase::Done
    ));
    // Every link is either untouched or fully re-pointed.
    for n in 0..200 {
        let linked = l.dest.join("Movies").join(format!("Clip {n}")).join(format!("clip-{n}.mkv"));
        let target = std::fs::read_link(&linked).unwrap();
        assert!(
            target == l.src.join(format!("old-{n}")).join(format!("clip-{n}.mkv"))
                || target == l.src.join(format!("new-{n}")).join(format!("clip-{n}.mkv")),
            "unexpected target {}",
            target.display()
        );
    }
}
