use std::path::PathBuf;

use chrono::{DateTime, Utc};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "snake_case"))]
pub enum LinkStatus {
    Ok,
    Broken,
}

/// A symlink observed during a repair scan. Never persisted.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SymlinkRecord {
    pub link: PathBuf,
    /// Target exactly as stored in the link, possibly relative.
    pub target: PathBuf,
    pub status: LinkStatus,
}

impl SymlinkRecord {
    pub fn is_broken(&self) -> bool {
        self.status == LinkStatus::Broken
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "snake_case"))]
pub enum RepairPhase {
    #[default]
    Idle,
    Scanning,
    Detecting,
    Repairing,
    Done,
}

/// Counters from one repair run.
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct RepairReport {
    pub scanned: usize,
    pub found: usize,
    pub repaired: usize,
    pub failed: usize,
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
}

impl RepairReport {
    pub fn started() -> Self {
        let now = Utc::now();
        Self {
            scanned: 0,
            found: 0,
            repaired: 0,
            failed: 0,
            started_at: now,
            finished_at: now,
        }
    }
}
