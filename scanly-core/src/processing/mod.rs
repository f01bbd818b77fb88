//! Directory processing: a bounded pool of directory workers layered on the
//! shared match pool, and the dispatcher that drains the pending queue
//! through it.

use std::time::Duration;

use serde::{Deserialize, Serialize};

pub mod dispatch;
pub mod item;
pub mod pool;

pub use dispatch::{DispatchSummary, PendingDispatcher};
pub use item::ItemProcessor;
pub use pool::{DirectoryProgress, DirectoryWorkerPool};

#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct ProcessingConfig {
    /// Number of long-lived directory workers.
    pub directory_workers: usize,
    /// Fallback cadence of the pending dispatcher when nothing wakes it.
    pub dispatch_interval_secs: u64,
}

impl Default for ProcessingConfig {
    fn default() -> Self {
        Self {
            directory_workers: 4,
            dispatch_interval_secs: 60,
        }
    }
}

impl ProcessingConfig {
    pub fn dispatch_interval(&self) -> Duration {
        Duration::from_secs(self.dispatch_interval_secs.max(1))
    }
}
