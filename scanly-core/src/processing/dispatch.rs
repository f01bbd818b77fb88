use std::fmt;
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::{Mutex, Notify};
use tokio::task::JoinHandle;
use tokio::time::{MissedTickBehavior, interval};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use super::pool::DirectoryWorkerPool;
use crate::collaborators::{NotificationEvent, Notifier};
use crate::error::Result;
use crate::model::outcome::DirectoryOutcome;
use crate::model::roots::PendingItem;
use crate::monitor::store::{MonitorStateStore, ProcessingCounts};

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DispatchSummary {
    pub claimed: usize,
    pub completed: usize,
    pub released: usize,
    /// Items dropped because their directory no longer exists.
    pub dropped: usize,
}

/// Drains the store's pending queue through the directory pool.
pub struct PendingDispatcher {
    store: Arc<MonitorStateStore>,
    pool: Arc<DirectoryWorkerPool>,
    notifier: Arc<dyn Notifier>,
    run_lock: Mutex<()>,
}

impl fmt::Debug for PendingDispatcher {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PendingDispatcher")
            .field("pool", &self.pool)
            .finish_non_exhaustive()
    }
}

impl PendingDispatcher {
    pub fn new(
        store: Arc<MonitorStateStore>,
        pool: Arc<DirectoryWorkerPool>,
        notifier: Arc<dyn Notifier>,
    ) -> Self {
        Self {
            store,
            pool,
            notifier,
            run_lock: Mutex::new(()),
        }
    }

    /// Claim everything pending, process it and settle each claim: items
    /// whose directory succeeded are completed, items whose directory is gone
    /// are dropped and the rest stay pending.
    pub async fn run_once(&self) -> Result<DispatchSummary> {
        let _guard = self.run_lock.lock().await;

        let claims = self.store.claim_pending().await;
        let mut summary = DispatchSummary {
            claimed: claims.len(),
            ..DispatchSummary::default()
        };
        let mut claimed = Vec::with_capacity(claims.len());
        for item in claims {
            if path_exists(&item.path).await {
                claimed.push(item);
            } else {
                self.drop_vanished(&item, &mut summary).await;
            }
        }
        if claimed.is_empty() {
            return Ok(summary);
        }
        debug!(claimed = claimed.len(), "dispatching pending items");

        for (index, item) in claimed.iter().enumerate() {
            if let Err(err) = self.pool.submit(item.path.clone()).await {
                // Nothing from here on was queued; hand the claims back.
                for unsent in &claimed[index..] {
                    self.store.release_claim(unsent).await;
                }
                if index > 0 {
                    // Settle what was already queued before giving up.
                    claimed.truncate(index);
                    self.settle(&mut claimed, &mut summary).await;
                }
                return Err(err);
            }
        }

        self.settle(&mut claimed, &mut summary).await;
        info!(
            claimed = summary.claimed,
            completed = summary.completed,
            released = summary.released,
            dropped = summary.dropped,
            "pending items dispatched"
        );
        Ok(summary)
    }

    async fn settle(&self, claimed: &mut Vec<PendingItem>, summary: &mut DispatchSummary) {
        let outcomes = self
            .pool
            .collect_results(|progress| {
                debug!(
                    completed = progress.completed,
                    total = progress.total,
                    path = %progress.latest.path.display(),
                    "directory finished"
                );
            })
            .await;

        for outcome in outcomes {
            self.notifier.notify(NotificationEvent::DirectoryProcessed {
                path: outcome.path.clone(),
                linked: outcome.linked(),
                skipped: outcome.skipped(),
                failed: outcome.failed_items(),
            });

            let Some(position) = claimed.iter().position(|item| item.path == outcome.path)
            else {
                continue;
            };
            let item = claimed.swap_remove(position);
            if outcome.is_success() {
                match self.store.complete_pending(&item, counts_for(&outcome)).await {
                    Ok(()) => summary.completed += 1,
                    Err(err) => {
                        warn!(path = %item.path.display(), error = %err, "could not complete pending item");
                        self.store.release_claim(&item).await;
                        summary.released += 1;
                    }
                }
            } else if !path_exists(&item.path).await {
                self.drop_vanished(&item, summary).await;
            } else {
                if let Err(err) = self
                    .store
                    .record_processing(item.root_id, counts_for(&outcome))
                    .await
                {
                    debug!(root = %item.root_id, error = %err, "stats not recorded");
                }
                self.store.release_claim(&item).await;
                summary.released += 1;
            }
        }

        // Claims with no outcome (workers gone) stay pending.
        for item in claimed.drain(..) {
            self.store.release_claim(&item).await;
            summary.released += 1;
        }
    }

    async fn drop_vanished(&self, item: &PendingItem, summary: &mut DispatchSummary) {
        match self.store.discard_pending(item).await {
            Ok(_) => {
                info!(path = %item.path.display(), "pending directory no longer exists; skipped");
                summary.dropped += 1;
            }
            Err(err) => {
                warn!(path = %item.path.display(), error = %err, "could not drop vanished item");
                self.store.release_claim(item).await;
                summary.released += 1;
            }
        }
    }

    /// Run on every pending-work signal and at least once per `every`, until
    /// cancelled.
    pub fn spawn_loop(
        self: Arc<Self>,
        signal: Arc<Notify>,
        every: Duration,
        cancel: CancellationToken,
    ) -> JoinHandle<()> {
        tokio::spawn(async move {
            let mut ticker = interval(every);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
            info!(interval_secs = every.as_secs(), "pending dispatcher started");

            loop {
                tokio::select! {
                    _ = cancel.cancelled() => break,
                    _ = signal.notified() => {}
                    _ = ticker.tick() => {}
                }
                if let Err(err) = self.run_once().await {
                    warn!(error = %err, "dispatch run failed");
                }
            }
            info!("pending dispatcher stopped");
        })
    }
}

async fn path_exists(path: &Path) -> bool {
    // An unreadable path is not proof that it is gone.
    tokio::fs::try_exists(path).await.unwrap_or(true)
}

fn counts_for(outcome: &DirectoryOutcome) -> ProcessingCounts {
    ProcessingCounts {
        processed: outcome.linked() as u64,
        errors: (outcome.failed_items() + usize::from(outcome.error.is_some())) as u64,
        skipped: outcome.skipped() as u64,
    }
}
