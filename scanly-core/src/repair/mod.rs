//! Symlink integrity for the destination tree.

use std::path::PathBuf;
use std::time::Duration;

use serde::{Deserialize, Serialize};

pub mod engine;
pub mod monitor;

pub use engine::LinkRepairEngine;
pub use monitor::RepairMonitor;

#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq)]
pub struct RepairConfig {
    /// Root of the organized link tree.
    pub destination: PathBuf,
    /// Where relocated sources are searched for, in order.
    #[serde(default)]
    pub search_roots: Vec<PathBuf>,
    /// Write repaired targets relative to the link's directory.
    #[serde(default)]
    pub relative_links: bool,
    /// Cadence of the background repair monitor.
    #[serde(default = "RepairConfig::default_interval_secs")]
    pub interval_secs: u64,
}

impl RepairConfig {
    pub fn new(destination: impl Into<PathBuf>, search_roots: Vec<PathBuf>) -> Self {
        Self {
            destination: destination.into(),
            search_roots,
            relative_links: false,
            interval_secs: Self::default_interval_secs(),
        }
    }

    pub fn interval(&self) -> Duration {
        Duration::from_secs(self.interval_secs.max(1))
    }

    const fn default_interval_secs() -> u64 {
        3_600
    }
}
