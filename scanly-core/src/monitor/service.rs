use std::path::Path;
use std::sync::Arc;

use tracing::{info, warn};

use super::store::MonitorStateStore;
use super::watch::WatchEngine;
use crate::error::{Result, ScanlyError};
use crate::model::ids::MonitoredRootId;
use crate::model::roots::{DiscoveryMode, MonitoredRoot};

/// Outcome of re-arming active roots after a restart.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RearmSummary {
    pub armed: Vec<(MonitoredRootId, DiscoveryMode)>,
    pub deactivated: Vec<MonitoredRootId>,
}

/// User-facing operations on monitored roots. Keeps the persisted active
/// flag and the live watch session in step.
#[derive(Debug, Clone)]
pub struct MonitorService {
    store: Arc<MonitorStateStore>,
    watch: Arc<WatchEngine>,
}

impl MonitorService {
    pub fn new(store: Arc<MonitorStateStore>, watch: Arc<WatchEngine>) -> Self {
        Self { store, watch }
    }

    pub fn store(&self) -> &Arc<MonitorStateStore> {
        &self.store
    }

    pub fn watch(&self) -> &Arc<WatchEngine> {
        &self.watch
    }

    pub async fn add_root(
        &self,
        path: &Path,
        name: Option<String>,
        activate: bool,
    ) -> Result<MonitoredRootId> {
        let id = self.store.add_root(path, name).await?;
        if activate {
            self.set_active(id, true).await?;
        }
        Ok(id)
    }

    /// Stop the watch, then forget the root and its pending items.
    pub async fn remove_root(&self, id: MonitoredRootId) -> Result<MonitoredRoot> {
        self.watch.stop_watch(id).await?;
        self.store.remove_root(id).await
    }

    /// Activation only sticks once the watch is armed.
    pub async fn set_active(&self, id: MonitoredRootId, active: bool) -> Result<()> {
        let root = self
            .store
            .get(id)
            .await
            .ok_or_else(|| ScanlyError::NotFound(format!("monitored root {id}")))?;

        if active {
            self.watch.start_watch(&root).await?;
            self.store.set_active(id, true).await
        } else {
            self.watch.stop_watch(id).await?;
            self.store.set_active(id, false).await
        }
    }

    /// Flip the active flag. Returns the new state.
    pub async fn toggle(&self, id: MonitoredRootId) -> Result<bool> {
        let root = self
            .store
            .get(id)
            .await
            .ok_or_else(|| ScanlyError::NotFound(format!("monitored root {id}")))?;
        let next = !root.active;
        self.set_active(id, next).await?;
        Ok(next)
    }

    /// Start watches for every root persisted as active. Roots that can no
    /// longer be watched are deactivated so the next start does not retry
    /// them.
    pub async fn rearm_active(&self) -> RearmSummary {
        let mut summary = RearmSummary::default();
        for root in self.store.active_roots().await {
            match self.watch.start_watch(&root).await {
                Ok(mode) => summary.armed.push((root.id, mode)),
                Err(err) => {
                    warn!(
                        root = %root.id,
                        path = %root.path.display(),
                        error = %err,
                        "cannot re-arm root; deactivating"
                    );
                    if let Err(err) = self.store.set_active(root.id, false).await {
                        warn!(root = %root.id, error = %err, "failed to deactivate root");
                    }
                    summary.deactivated.push(root.id);
                }
            }
        }
        info!(
            armed = summary.armed.len(),
            deactivated = summary.deactivated.len(),
            "active roots re-armed"
        );
        summary
    }

    pub async fn shutdown(&self) {
        self.watch.shutdown().await;
    }
}
