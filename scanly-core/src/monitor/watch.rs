//! Discovery of new top-level items under monitored roots.
//!
//! Local roots get a recursive `notify` watcher whose raw events are
//! debounced per root: candidates accumulate until the root has been quiet
//! for the debounce window, then the batch is persisted in one store call.
//! Roots on remote mounts are handed to the shared poll scheduler instead.

use std::collections::HashMap;
use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use notify::event::{CreateKind, EventKind, ModifyKind, RenameMode};
use notify::{Config as NotifyConfig, Event, RecommendedWatcher, RecursiveMode, Watcher};
use tokio::sync::{Mutex, Notify, mpsc};
use tokio::task::{JoinHandle, spawn_blocking};
use tokio::time::{Instant, sleep_until, timeout};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use super::config::WatchConfig;
use super::filter::CandidateFilter;
use super::mount::MountProbe;
use super::poll::PollScheduler;
use super::store::MonitorStateStore;
use crate::collaborators::{NotificationEvent, Notifier};
use crate::error::{Result, ScanlyError};
use crate::fs::FileSystem;
use crate::model::ids::MonitoredRootId;
use crate::model::roots::{DiscoveryMode, MonitoredRoot};

/// Where accepted candidates go: the store's pending queue, the dispatcher
/// wake signal and the notifier.
#[derive(Clone)]
pub struct DiscoverySink {
    store: Arc<MonitorStateStore>,
    notifier: Arc<dyn Notifier>,
    pending_signal: Arc<Notify>,
}

impl fmt::Debug for DiscoverySink {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DiscoverySink")
            .field("store", &self.store.path())
            .finish_non_exhaustive()
    }
}

impl DiscoverySink {
    pub fn new(
        store: Arc<MonitorStateStore>,
        notifier: Arc<dyn Notifier>,
        pending_signal: Arc<Notify>,
    ) -> Self {
        Self {
            store,
            notifier,
            pending_signal,
        }
    }

    pub fn pending_signal(&self) -> Arc<Notify> {
        Arc::clone(&self.pending_signal)
    }

    /// Persist a batch of arrivals seen by the watcher. Returns how many
    /// were new.
    pub async fn record(&self, root_id: MonitoredRootId, paths: Vec<PathBuf>) -> usize {
        if paths.is_empty() {
            return 0;
        }
        match self.store.add_pending_batch(root_id, &paths).await {
            Ok(0) => 0,
            Ok(added) => {
                self.announce(root_id, added, paths);
                added
            }
            Err(err) => {
                warn!(root = %root_id, error = %err, "failed to record pending items");
                0
            }
        }
    }

    /// Persist a full listing of the root. Items processed before are not
    /// queued again. Returns how many were new.
    pub async fn record_listing(&self, root_id: MonitoredRootId, listing: Vec<PathBuf>) -> usize {
        match self.store.reconcile_listing(root_id, &listing).await {
            Ok(added) if added.is_empty() => 0,
            Ok(added) => {
                let count = added.len();
                self.announce(root_id, count, added);
                count
            }
            Err(err) => {
                warn!(root = %root_id, error = %err, "failed to record root listing");
                0
            }
        }
    }

    fn announce(&self, root_id: MonitoredRootId, added: usize, paths: Vec<PathBuf>) {
        info!(root = %root_id, added, "new items pending");
        self.notifier
            .notify(NotificationEvent::PendingDiscovered { root_id, paths });
        self.pending_signal.notify_one();
    }
}

/// List the root and keep the children that pass the filter. A failed
/// listing is logged and yields `None`, so it never counts as an empty root.
pub(crate) async fn scan_root(
    fs: &dyn FileSystem,
    filter: &CandidateFilter,
) -> Option<Vec<PathBuf>> {
    match fs.list_dir(filter.root()).await {
        Ok(entries) => Some(
            entries
                .into_iter()
                .filter(|entry| entry.is_dir)
                .filter_map(|entry| filter.accept(&entry.path))
                .collect(),
        ),
        Err(err) => {
            warn!(root = %filter.root().display(), error = %err, "root listing failed");
            None
        }
    }
}

enum WatchSession {
    Event {
        watcher: RecommendedWatcher,
        cancel: CancellationToken,
        task: JoinHandle<()>,
    },
    Polling,
}

impl WatchSession {
    fn mode(&self) -> DiscoveryMode {
        match self {
            WatchSession::Event { .. } => DiscoveryMode::EventDriven,
            WatchSession::Polling => DiscoveryMode::Polling,
        }
    }
}

enum WatchMessage {
    Event(Event),
    Error(String),
}

pub struct WatchEngine {
    config: WatchConfig,
    sink: DiscoverySink,
    probe: Arc<dyn MountProbe>,
    fs: Arc<dyn FileSystem>,
    sessions: Mutex<HashMap<MonitoredRootId, WatchSession>>,
    poller: Mutex<Option<PollScheduler>>,
}

impl fmt::Debug for WatchEngine {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut debug = f.debug_struct("WatchEngine");
        debug.field("config", &self.config);
        match self.sessions.try_lock() {
            Ok(guard) => {
                debug.field("sessions", &guard.len());
            }
            Err(_) => {
                debug.field("sessions", &"<locked>");
            }
        }
        debug.finish_non_exhaustive()
    }
}

impl WatchEngine {
    pub fn new(
        config: WatchConfig,
        sink: DiscoverySink,
        probe: Arc<dyn MountProbe>,
        fs: Arc<dyn FileSystem>,
    ) -> Self {
        Self {
            config,
            sink,
            probe,
            fs,
            sessions: Mutex::new(HashMap::new()),
            poller: Mutex::new(None),
        }
    }

    pub fn config(&self) -> &WatchConfig {
        &self.config
    }

    /// Arm discovery for a root. Calling it for a root that is already
    /// watched returns the mode of the existing session.
    pub async fn start_watch(&self, root: &MonitoredRoot) -> Result<DiscoveryMode> {
        let mut sessions = self.sessions.lock().await;
        if let Some(existing) = sessions.get(&root.id) {
            return Ok(existing.mode());
        }

        if !self.fs.is_dir(&root.path).await {
            return Err(ScanlyError::InvalidPath(format!(
                "{} is not an existing directory",
                root.path.display()
            )));
        }

        let mode = self.select_mode(root).await;
        let filter = CandidateFilter::new(&root.path, &self.config.excluded_names);

        let session = match mode {
            DiscoveryMode::EventDriven => self.start_event_session(root.id, filter).await?,
            DiscoveryMode::Polling => {
                let mut poller = self.poller.lock().await;
                let scheduler = poller.get_or_insert_with(|| {
                    PollScheduler::spawn(
                        self.config.poll_interval(),
                        Arc::clone(&self.fs),
                        self.sink.clone(),
                    )
                });
                scheduler.register(root.id, filter);
                WatchSession::Polling
            }
        };
        sessions.insert(root.id, session);
        drop(sessions);

        if let Err(err) = self.sink.store.set_discovery_mode(root.id, Some(mode)).await {
            warn!(root = %root.id, error = %err, "could not record discovery mode");
        }
        info!(
            root = %root.id,
            path = %root.path.display(),
            mode = ?mode,
            "watch started"
        );
        Ok(mode)
    }

    /// Disarm discovery for a root. Unknown ids are a no-op.
    pub async fn stop_watch(&self, id: MonitoredRootId) -> Result<()> {
        let Some(session) = self.sessions.lock().await.remove(&id) else {
            return Ok(());
        };

        match session {
            WatchSession::Event {
                watcher,
                cancel,
                mut task,
            } => {
                drop(watcher);
                cancel.cancel();
                if timeout(self.config.stop_timeout(), &mut task).await.is_err() {
                    warn!(root = %id, "debounce task did not stop in time; aborting");
                    task.abort();
                }
            }
            WatchSession::Polling => {
                if let Some(poller) = self.poller.lock().await.as_ref() {
                    poller.unregister(id);
                }
            }
        }

        if let Err(err) = self.sink.store.set_discovery_mode(id, None).await {
            debug!(root = %id, error = %err, "discovery mode not cleared");
        }
        info!(root = %id, "watch stopped");
        Ok(())
    }

    pub async fn is_watching(&self, id: MonitoredRootId) -> Option<DiscoveryMode> {
        self.sessions.lock().await.get(&id).map(WatchSession::mode)
    }

    pub async fn watched_count(&self) -> usize {
        self.sessions.lock().await.len()
    }

    /// Stop every session and the poll scheduler.
    pub async fn shutdown(&self) {
        let ids: Vec<MonitoredRootId> = self.sessions.lock().await.keys().copied().collect();
        for id in ids {
            if let Err(err) = self.stop_watch(id).await {
                warn!(root = %id, error = %err, "failed to stop watch");
            }
        }
        if let Some(poller) = self.poller.lock().await.take() {
            poller.shutdown(self.config.stop_timeout()).await;
        }
    }

    async fn select_mode(&self, root: &MonitoredRoot) -> DiscoveryMode {
        if self.config.force_polling {
            return DiscoveryMode::Polling;
        }
        match self.probe.probe(&root.path).await {
            Ok(kind) if kind.is_remote() => {
                debug!(root = %root.id, kind = ?kind, "remote mount; polling");
                DiscoveryMode::Polling
            }
            Ok(_) => DiscoveryMode::EventDriven,
            Err(err) => {
                warn!(
                    root = %root.id,
                    error = %err,
                    "mount probe failed; using native events"
                );
                DiscoveryMode::EventDriven
            }
        }
    }

    async fn start_event_session(
        &self,
        root_id: MonitoredRootId,
        filter: CandidateFilter,
    ) -> Result<WatchSession> {
        let (tx, rx) = mpsc::channel(self.config.event_channel_capacity.max(16));
        let watch_path = filter.root().to_path_buf();
        let watcher = spawn_blocking(move || init_watcher(watch_path, tx))
            .await
            .map_err(|err| {
                ScanlyError::Internal(format!("watcher initialization panicked: {err}"))
            })??;

        match scan_root(self.fs.as_ref(), &filter).await {
            Some(baseline) => {
                debug!(root = %root_id, count = baseline.len(), "baseline scan");
                self.sink.record_listing(root_id, baseline).await;
            }
            None => debug!(root = %root_id, "baseline scan skipped"),
        }

        let cancel = CancellationToken::new();
        let task = spawn_debounce_loop(
            root_id,
            filter,
            self.sink.clone(),
            rx,
            self.config.debounce_window(),
            cancel.clone(),
        );
        Ok(WatchSession::Event {
            watcher,
            cancel,
            task,
        })
    }
}

fn init_watcher(
    root: PathBuf,
    tx: mpsc::Sender<WatchMessage>,
) -> Result<RecommendedWatcher> {
    let mut watcher = RecommendedWatcher::new(
        move |res: std::result::Result<Event, notify::Error>| {
            let message = match res {
                Ok(event) => WatchMessage::Event(event),
                Err(err) => WatchMessage::Error(err.to_string()),
            };
            // Receiver gone means the session is stopping.
            let _ = tx.blocking_send(message);
        },
        NotifyConfig::default(),
    )?;
    watcher.watch(&root, RecursiveMode::Recursive)?;
    Ok(watcher)
}

fn spawn_debounce_loop(
    root_id: MonitoredRootId,
    filter: CandidateFilter,
    sink: DiscoverySink,
    mut rx: mpsc::Receiver<WatchMessage>,
    window: Duration,
    cancel: CancellationToken,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut buffer: Vec<PathBuf> = Vec::new();
        let mut deadline = Instant::now();

        loop {
            tokio::select! {
                _ = cancel.cancelled() => break,
                _ = sleep_until(deadline), if !buffer.is_empty() => {
                    sink.record(root_id, std::mem::take(&mut buffer)).await;
                }
                message = rx.recv() => match message {
                    Some(WatchMessage::Event(event)) => {
                        let candidates = event_candidates(&event, &filter).await;
                        if candidates.is_empty() {
                            continue;
                        }
                        for candidate in candidates {
                            if !buffer.contains(&candidate) {
                                buffer.push(candidate);
                            }
                        }
                        deadline = Instant::now() + window;
                    }
                    Some(WatchMessage::Error(error)) => {
                        warn!(root = %root_id, error = %error, "watcher error");
                    }
                    None => break,
                },
            }
        }

        if !buffer.is_empty() {
            sink.record(root_id, buffer).await;
        }
        debug!(root = %root_id, "debounce loop stopped");
    })
}

/// Directory arrivals directly under the root: creations and renames into
/// place.
async fn event_candidates(event: &Event, filter: &CandidateFilter) -> Vec<PathBuf> {
    let (paths, must_check_dir): (Vec<&PathBuf>, bool) = match event.kind {
        EventKind::Create(CreateKind::Folder) => (event.paths.iter().collect(), false),
        EventKind::Create(CreateKind::Any | CreateKind::Other) => {
            (event.paths.iter().collect(), true)
        }
        EventKind::Modify(ModifyKind::Name(RenameMode::To | RenameMode::Any)) => {
            (event.paths.iter().take(1).collect(), true)
        }
        EventKind::Modify(ModifyKind::Name(RenameMode::Both)) => {
            (event.paths.get(1).into_iter().collect(), true)
        }
        _ => return Vec::new(),
    };

    let mut candidates = Vec::new();
    for path in paths.into_iter().filter_map(|path| filter.accept(path)) {
        if must_check_dir && !is_directory(&path).await {
            continue;
        }
        candidates.push(path);
    }
    candidates
}

async fn is_directory(path: &Path) -> bool {
    tokio::fs::metadata(path)
        .await
        .map(|md| md.is_dir())
        .unwrap_or(false)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn filter(root: &Path) -> CandidateFilter {
        CandidateFilter::new(root, &[".git".to_string()])
    }

    #[tokio::test]
    async fn folder_creation_directly_under_root_is_a_candidate() {
        let event = Event::new(EventKind::Create(CreateKind::Folder))
            .add_path(PathBuf::from("/in/New Show"))
            .add_path(PathBuf::from("/in/New Show/Season 1"));
        assert_eq!(
            event_candidates(&event, &filter(Path::new("/in"))).await,
            vec![PathBuf::from("/in/New Show")]
        );
    }

    #[tokio::test]
    async fn file_events_are_ignored() {
        let event = Event::new(EventKind::Create(CreateKind::File))
            .add_path(PathBuf::from("/in/movie.mkv"));
        assert!(
            event_candidates(&event, &filter(Path::new("/in")))
                .await
                .is_empty()
        );
    }

    #[tokio::test]
    async fn rename_into_root_uses_destination_path() {
        let tmp = tempfile::tempdir().unwrap();
        let target = tmp.path().join("Arrived");
        std::fs::create_dir(&target).unwrap();

        let event = Event::new(EventKind::Modify(ModifyKind::Name(RenameMode::Both)))
            .add_path(tmp.path().join("elsewhere"))
            .add_path(target.clone());
        assert_eq!(
            event_candidates(&event, &filter(tmp.path())).await,
            vec![target]
        );
    }

    #[tokio::test]
    async fn renamed_in_files_are_not_candidates() {
        let tmp = tempfile::tempdir().unwrap();
        let file = tmp.path().join("movie.mkv");
        std::fs::write(&file, b"x").unwrap();

        let event = Event::new(EventKind::Modify(ModifyKind::Name(RenameMode::To)))
            .add_path(file);
        assert!(event_candidates(&event, &filter(tmp.path())).await.is_empty());
    }
}
