use std::fmt;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::Notify;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::info;

use crate::collaborators::{Collaborators, Notifier};
use crate::error::Result;
use crate::fs::{FileSystem, RealFs};
use crate::matching::{MatchPoolConfig, MatchWorkerPool};
use crate::monitor::{
    DiscoverySink, MonitorService, MonitorStateStore, MountProbe, ProcMountProbe,
    WatchConfig, WatchEngine,
};
use crate::processing::{
    DirectoryWorkerPool, ItemProcessor, PendingDispatcher, ProcessingConfig,
};
use crate::reference::{ReferenceListCache, ReferenceListRefresher, RemoteListSource};
use crate::repair::{LinkRepairEngine, RepairConfig, RepairMonitor};

/// Everything needed to assemble a [`ScanlyContext`].
#[derive(Debug, Clone)]
pub struct ContextSettings {
    pub state_file: PathBuf,
    pub reference_dir: PathBuf,
    pub remote_lists: Vec<RemoteListSource>,
    pub list_max_age: Duration,
    pub watch: WatchConfig,
    pub matching: MatchPoolConfig,
    pub processing: ProcessingConfig,
    /// `None` disables link repair entirely.
    pub repair: Option<RepairConfig>,
}

impl ContextSettings {
    pub fn new(state_file: impl Into<PathBuf>, reference_dir: impl Into<PathBuf>) -> Self {
        Self {
            state_file: state_file.into(),
            reference_dir: reference_dir.into(),
            remote_lists: Vec::new(),
            list_max_age: Duration::from_secs(24 * 60 * 60),
            watch: WatchConfig::default(),
            matching: MatchPoolConfig::default(),
            processing: ProcessingConfig::default(),
            repair: None,
        }
    }
}

/// The wired-up core, built once at startup and shared by the daemon and
/// one-shot commands.
#[derive(Clone)]
pub struct ScanlyContext {
    settings: Arc<ContextSettings>,
    store: Arc<MonitorStateStore>,
    watch: Arc<WatchEngine>,
    monitors: MonitorService,
    reference: Arc<ReferenceListCache>,
    refresher: ReferenceListRefresher,
    matcher: Arc<MatchWorkerPool>,
    directories: Arc<DirectoryWorkerPool>,
    dispatcher: Arc<PendingDispatcher>,
    repair: Option<Arc<LinkRepairEngine>>,
    repair_monitor: Option<Arc<RepairMonitor>>,
    notifier: Arc<dyn Notifier>,
    pending_signal: Arc<Notify>,
}

impl fmt::Debug for ScanlyContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ScanlyContext").finish_non_exhaustive()
    }
}

impl ScanlyContext {
    pub async fn build(settings: ContextSettings, collaborators: Collaborators) -> Result<Self> {
        Self::build_with(
            settings,
            collaborators,
            Arc::new(RealFs::new()),
            Arc::new(ProcMountProbe::default()),
        )
        .await
    }

    /// Like [`build`](Self::build) with an explicit filesystem and mount
    /// probe.
    pub async fn build_with(
        settings: ContextSettings,
        collaborators: Collaborators,
        fs: Arc<dyn FileSystem>,
        probe: Arc<dyn MountProbe>,
    ) -> Result<Self> {
        let notifier = Arc::clone(&collaborators.notifier);
        let store = Arc::new(MonitorStateStore::open(&settings.state_file).await?);
        let pending_signal = Arc::new(Notify::new());

        let sink = DiscoverySink::new(
            Arc::clone(&store),
            Arc::clone(&notifier),
            Arc::clone(&pending_signal),
        );
        let watch = Arc::new(WatchEngine::new(
            settings.watch.clone(),
            sink,
            probe,
            Arc::clone(&fs),
        ));
        let monitors = MonitorService::new(Arc::clone(&store), Arc::clone(&watch));

        let reference = Arc::new(ReferenceListCache::new(&settings.reference_dir));
        let refresher =
            ReferenceListRefresher::new(Arc::clone(&reference), settings.list_max_age);

        let matcher = Arc::new(MatchWorkerPool::spawn(
            settings.matching.clone(),
            Arc::clone(&reference),
        ));
        let processor = Arc::new(ItemProcessor::new(
            fs,
            collaborators,
            Arc::clone(&reference),
        ));
        let directories = Arc::new(DirectoryWorkerPool::spawn(
            settings.processing.directory_workers,
            Arc::clone(&matcher),
            processor,
        ));
        let dispatcher = Arc::new(PendingDispatcher::new(
            Arc::clone(&store),
            Arc::clone(&directories),
            Arc::clone(&notifier),
        ));

        let repair = settings
            .repair
            .clone()
            .map(|config| Arc::new(LinkRepairEngine::new(config)));
        let repair_monitor = repair.as_ref().map(|engine| {
            Arc::new(RepairMonitor::new(
                Arc::clone(engine),
                engine.config().interval(),
                Arc::clone(&notifier),
            ))
        });

        info!(
            state_file = %settings.state_file.display(),
            reference_dir = %settings.reference_dir.display(),
            repair = repair.is_some(),
            "scanly context ready"
        );

        Ok(Self {
            settings: Arc::new(settings),
            store,
            watch,
            monitors,
            reference,
            refresher,
            matcher,
            directories,
            dispatcher,
            repair,
            repair_monitor,
            notifier,
            pending_signal,
        })
    }

    pub fn settings(&self) -> &ContextSettings {
        &self.settings
    }

    pub fn store(&self) -> &Arc<MonitorStateStore> {
        &self.store
    }

    pub fn watch(&self) -> &Arc<WatchEngine> {
        &self.watch
    }

    pub fn monitors(&self) -> &MonitorService {
        &self.monitors
    }

    pub fn reference(&self) -> &Arc<ReferenceListCache> {
        &self.reference
    }

    pub fn refresher(&self) -> &ReferenceListRefresher {
        &self.refresher
    }

    pub fn matcher(&self) -> &Arc<MatchWorkerPool> {
        &self.matcher
    }

    pub fn directories(&self) -> &Arc<DirectoryWorkerPool> {
        &self.directories
    }

    pub fn dispatcher(&self) -> &Arc<PendingDispatcher> {
        &self.dispatcher
    }

    pub fn repair(&self) -> Option<&Arc<LinkRepairEngine>> {
        self.repair.as_ref()
    }

    pub fn repair_monitor(&self) -> Option<&Arc<RepairMonitor>> {
        self.repair_monitor.as_ref()
    }

    pub fn notifier(&self) -> &Arc<dyn Notifier> {
        &self.notifier
    }

    /// Refresh every configured remote list that has gone stale.
    pub async fn refresh_remote_lists(&self) -> usize {
        self.refresher.refresh_all(&self.settings.remote_lists).await
    }

    /// Start the dispatcher loop, woken by discovery and by its interval.
    pub fn spawn_dispatcher(&self, cancel: CancellationToken) -> JoinHandle<()> {
        Arc::clone(&self.dispatcher).spawn_loop(
            Arc::clone(&self.pending_signal),
            self.settings.processing.dispatch_interval(),
            cancel,
        )
    }

    /// Stop background work in dependency order: repair, discovery, then the
    /// processing pools.
    pub async fn shutdown(&self) {
        if let Some(monitor) = &self.repair_monitor {
            monitor.stop().await;
        }
        self.monitors.shutdown().await;
        self.directories.shutdown().await;
        info!(degraded = self.store.is_degraded(), "scanly context shut down");
    }
}
