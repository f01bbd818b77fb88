mod support;

use std::sync::Arc;
use std::time::Duration;

use scanly_core::ScanlyError;
use scanly_core::matching::{MatchPoolConfig, MatchWorkerPool};
use scanly_core::model::category::MediaCategory;
use scanly_core::model::ids::MatchRequestId;
use scanly_core::model::matching::{MatchRequest, MatchTier};
use scanly_core::reference::ReferenceListCache;
use support::write_list;

fn config(workers: usize) -> MatchPoolConfig {
    MatchPoolConfig {
        workers,
        queue_capacity: 8,
        await_timeout_secs: 5,
        result_ttl_secs: 60,
    }
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn exact_title_and_year_comes_back_first() {
    let dir = tempfile::tempdir().unwrap();
    write_list(
        dir.path(),
        "movies",
        &[
            "Inception: The Cobol Job (2010) [tmdb-64956]",
            "Inception (2010) [tmdb-27205]",
            "Interception (2009) [tmdb-11111]",
        ],
    );
    let pool = MatchWorkerPool::spawn(config(2), Arc::new(ReferenceListCache::new(dir.path())));

    let result = pool
        .resolve(MatchRequest::new("Inception", Some(2010), MediaCategory::Movie))
        .await
        .unwrap()
        .unwrap();

    assert!(result.error.is_none());
    let top = result.top().unwrap();
    assert_eq!(top.tier, MatchTier::ExactTitleYear);
    assert_eq!(top.entry.external_id.as_deref(), Some("27205"));
    assert!(
        result
            .candidates
            .windows(2)
            .all(|pair| pair[0].tier >= pair[1].tier)
    );

    pool.shutdown().await;
}

#[tokio::test]
async fn missing_list_yields_an_empty_result() {
    let dir = tempfile::tempdir().unwrap();
    let pool = MatchWorkerPool::spawn(config(1), Arc::new(ReferenceListCache::new(dir.path())));

    let result = pool
        .resolve(MatchRequest::new("Anything", None, MediaCategory::AnimeTv))
        .await
        .unwrap()
        .unwrap();
    assert!(result.is_empty());
    assert!(result.error.is_none());

    pool.shutdown().await;
}

#[tokio::test]
async fn unreadable_list_reports_an_error() {
    let dir = tempfile::tempdir().unwrap();
    // A directory where the list file should be.
    std::fs::create_dir(dir.path().join("movies.txt")).unwrap();
    let pool = MatchWorkerPool::spawn(config(1), Arc::new(ReferenceListCache::new(dir.path())));

    let result = pool
        .resolve(MatchRequest::new("Heat", Some(1995), MediaCategory::Movie))
        .await
        .unwrap()
        .unwrap();
    assert!(result.error.is_some());
    assert!(result.is_empty());

    pool.shutdown().await;
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn many_requests_each_get_their_own_result() {
    let dir = tempfile::tempdir().unwrap();
    write_list(
        dir.path(),
        "movies",
        &["Heat (1995) [tmdb-949]", "Ronin (1998) [tmdb-8195]"],
    );
    let pool = MatchWorkerPool::spawn(config(3), Arc::new(ReferenceListCache::new(dir.path())));

    let mut ids = Vec::new();
    for n in 0..20 {
        let (title, year) = if n % 2 == 0 {
            ("Heat", 1995)
        } else {
            ("Ronin", 1998)
        };
        let id = pool
            .submit(MatchRequest::new(title, Some(year), MediaCategory::Movie))
            .await
            .unwrap();
        ids.push((id, title));
    }

    for (id, title) in ids {
        let result = pool
            .await_result(id, Some(Duration::from_secs(5)))
            .await
            .unwrap();
        assert_eq!(result.request_id, id);
        assert_eq!(result.top().unwrap().entry.title, title);
    }
    assert!(pool.results().is_empty().await);

    pool.shutdown().await;
}

#[tokio::test]
async fn waiting_on_an_unknown_id_times_out() {
    let dir = tempfile::tempdir().unwrap();
    let pool = MatchWorkerPool::spawn(config(1), Arc::new(ReferenceListCache::new(dir.path())));

    let started = std::time::Instant::now();
    let result = pool
        .await_result(MatchRequestId::new(), Some(Duration::from_millis(200)))
        .await;
    assert!(result.is_none());
    assert!(started.elapsed() >= Duration::from_millis(200));

    pool.shutdown().await;
}

#[tokio::test]
async fn submit_after_shutdown_is_rejected() {
    let dir = tempfile::tempdir().unwrap();
    let pool = MatchWorkerPool::spawn(config(2), Arc::new(ReferenceListCache::new(dir.path())));
    pool.shutdown().await;
    // A second shutdown is harmless.
    pool.shutdown().await;

    let err = pool
        .submit(MatchRequest::new("Heat", None, MediaCategory::Movie))
        .await
        .unwrap_err();
    assert!(matches!(err, ScanlyError::Cancelled(_)));
}
