use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Discovery tuning shared by event-driven and polling roots.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct WatchConfig {
    /// Quiet period (milliseconds) before buffered candidates are flushed.
    pub debounce_window_ms: u64,
    /// Rescan cadence (seconds) for roots on remote mounts.
    pub poll_interval_secs: u64,
    /// Upper bound (milliseconds) on waiting for a debounce task to exit.
    pub stop_timeout_ms: u64,
    /// Capacity of the channel between notify and the debounce task.
    pub event_channel_capacity: usize,
    /// Top-level names that are never treated as new items.
    pub excluded_names: Vec<String>,
    /// Poll every root regardless of what the mount probe reports.
    pub force_polling: bool,
}

impl Default for WatchConfig {
    fn default() -> Self {
        Self {
            debounce_window_ms: 5_000,
            poll_interval_secs: 300,
            stop_timeout_ms: 2_000,
            event_channel_capacity: 1_024,
            excluded_names: default_excluded_names(),
            force_polling: false,
        }
    }
}

impl WatchConfig {
    pub fn debounce_window(&self) -> Duration {
        Duration::from_millis(self.debounce_window_ms.max(1))
    }

    pub fn poll_interval(&self) -> Duration {
        Duration::from_secs(self.poll_interval_secs.max(1))
    }

    pub fn stop_timeout(&self) -> Duration {
        Duration::from_millis(self.stop_timeout_ms)
    }
}

pub fn default_excluded_names() -> Vec<String> {
    [".git", "__pycache__", "node_modules", ".venv"]
        .into_iter()
        .map(String::from)
        .collect()
}
