use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::Mutex;
use tokio::task::JoinHandle;
use tokio::time::{MissedTickBehavior, interval};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use super::engine::LinkRepairEngine;
use crate::collaborators::{NotificationEvent, Notifier};
use crate::error::ScanlyError;

struct Running {
    cancel: CancellationToken,
    task: JoinHandle<()>,
}

/// Runs link repair in the background: once at start, then every interval.
pub struct RepairMonitor {
    engine: Arc<LinkRepairEngine>,
    every: Duration,
    notifier: Arc<dyn Notifier>,
    running: Mutex<Option<Running>>,
}

impl fmt::Debug for RepairMonitor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RepairMonitor")
            .field("every", &self.every)
            .finish_non_exhaustive()
    }
}

impl RepairMonitor {
    pub fn new(
        engine: Arc<LinkRepairEngine>,
        every: Duration,
        notifier: Arc<dyn Notifier>,
    ) -> Self {
        Self {
            engine,
            every,
            notifier,
            running: Mutex::new(None),
        }
    }

    /// Returns `false` when already running.
    pub async fn start(&self) -> bool {
        let mut running = self.running.lock().await;
        if running.as_ref().is_some_and(|r| !r.task.is_finished()) {
            return false;
        }

        let cancel = CancellationToken::new();
        let task = tokio::spawn(run_monitor(
            Arc::clone(&self.engine),
            self.every,
            Arc::clone(&self.notifier),
            cancel.clone(),
        ));
        *running = Some(Running { cancel, task });
        info!(interval_secs = self.every.as_secs(), "repair monitor started");
        true
    }

    /// Signal the loop and wait for it. A run in progress stops after the
    /// link it is working on. Returns `false` when it was not running.
    pub async fn stop(&self) -> bool {
        let Some(Running { cancel, task }) = self.running.lock().await.take() else {
            return false;
        };
        cancel.cancel();
        if let Err(err) = task.await {
            warn!(error = %err, "repair monitor task ended abnormally");
        }
        info!("repair monitor stopped");
        true
    }

    pub async fn is_running(&self) -> bool {
        self.running
            .lock()
            .await
            .as_ref()
            .is_some_and(|r| !r.task.is_finished())
    }
}

async fn run_monitor(
    engine: Arc<LinkRepairEngine>,
    every: Duration,
    notifier: Arc<dyn Notifier>,
    cancel: CancellationToken,
) {
    let mut ticker = interval(every);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
    loop {
        tokio::select! {
            _ = cancel.cancelled() => break,
            _ = ticker.tick() => {}
        }
        match engine.check_and_repair_until(&cancel).await {
            Ok(report) if report.repaired > 0 => {
                notifier.notify(NotificationEvent::LinksRepaired {
                    found: report.found,
                    repaired: report.repaired,
                    failed: report.failed,
                });
            }
            Ok(_) => {}
            Err(ScanlyError::Cancelled(_)) => {
                debug!("scheduled link repair interrupted");
                break;
            }
            Err(err) => warn!(error = %err, "scheduled link repair failed"),
        }
    }
}
