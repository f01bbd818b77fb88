//! Shared poll scheduler for roots on remote mounts.
//!
//! One task serves every polling root. Each registered root is scanned as
//! soon as it is registered and then once per interval.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio::time::{Instant, sleep_until, timeout};
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use super::filter::CandidateFilter;
use super::watch::{DiscoverySink, scan_root};
use crate::fs::FileSystem;
use crate::model::ids::MonitoredRootId;

#[derive(Debug)]
enum PollCommand {
    Register {
        root_id: MonitoredRootId,
        filter: CandidateFilter,
    },
    Unregister(MonitoredRootId),
}

struct PolledRoot {
    filter: CandidateFilter,
    next_due: Instant,
}

#[derive(Debug)]
pub(crate) struct PollScheduler {
    commands: mpsc::UnboundedSender<PollCommand>,
    cancel: CancellationToken,
    task: JoinHandle<()>,
}

impl PollScheduler {
    pub(crate) fn spawn(
        interval: Duration,
        fs: Arc<dyn FileSystem>,
        sink: DiscoverySink,
    ) -> Self {
        let (commands, rx) = mpsc::unbounded_channel();
        let cancel = CancellationToken::new();
        let task = tokio::spawn(run_scheduler(interval, fs, sink, rx, cancel.clone()));
        Self {
            commands,
            cancel,
            task,
        }
    }

    pub(crate) fn register(&self, root_id: MonitoredRootId, filter: CandidateFilter) {
        if self
            .commands
            .send(PollCommand::Register { root_id, filter })
            .is_err()
        {
            warn!(root = %root_id, "poll scheduler is gone; root not registered");
        }
    }

    /// Fire and forget; a scan already in progress for the root completes.
    pub(crate) fn unregister(&self, root_id: MonitoredRootId) {
        let _ = self.commands.send(PollCommand::Unregister(root_id));
    }

    pub(crate) async fn shutdown(self, bound: Duration) {
        self.cancel.cancel();
        drop(self.commands);
        let mut task = self.task;
        if timeout(bound, &mut task).await.is_err() {
            warn!("poll scheduler did not stop in time; aborting");
            task.abort();
        }
    }
}

async fn run_scheduler(
    interval: Duration,
    fs: Arc<dyn FileSystem>,
    sink: DiscoverySink,
    mut commands: mpsc::UnboundedReceiver<PollCommand>,
    cancel: CancellationToken,
) {
    let mut roots: HashMap<MonitoredRootId, PolledRoot> = HashMap::new();

    loop {
        let next_due = roots.values().map(|root| root.next_due).min();
        tokio::select! {
            _ = cancel.cancelled() => break,
            command = commands.recv() => match command {
                Some(PollCommand::Register { root_id, filter }) => {
                    debug!(root = %root_id, "polling root registered");
                    roots.insert(root_id, PolledRoot {
                        filter,
                        next_due: Instant::now(),
                    });
                }
                Some(PollCommand::Unregister(root_id)) => {
                    if roots.remove(&root_id).is_some() {
                        debug!(root = %root_id, "polling root unregistered");
                    }
                }
                None => break,
            },
            _ = sleep_until(next_due.unwrap_or_else(Instant::now)), if next_due.is_some() => {
                let now = Instant::now();
                let due: Vec<MonitoredRootId> = roots
                    .iter()
                    .filter(|(_, root)| root.next_due <= now)
                    .map(|(id, _)| *id)
                    .collect();
                for root_id in due {
                    let Some(root) = roots.get_mut(&root_id) else {
                        continue;
                    };
                    let listing = scan_root(fs.as_ref(), &root.filter).await;
                    root.next_due = Instant::now() + interval;
                    if let Some(listing) = listing {
                        sink.record_listing(root_id, listing).await;
                    }
                }
            }
        }
    }
    debug!("poll scheduler stopped");
}
