use std::path::PathBuf;

use chrono::{DateTime, Utc};

use crate::ids::MonitoredRootId;

/// How new items under a root are discovered.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "snake_case"))]
pub enum DiscoveryMode {
    /// Native filesystem notifications.
    EventDriven,
    /// Fixed-interval listing, used for network and remote mounts.
    Polling,
}

/// Running totals of processed items for a root.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(default))]
pub struct RootStats {
    pub total_processed: u64,
    pub total_errors: u64,
    pub total_skipped: u64,
    pub last_processed: Option<DateTime<Utc>>,
}

/// A filesystem location under background watch.
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct MonitoredRoot {
    pub id: MonitoredRootId,
    pub path: PathBuf,
    pub name: String,
    pub active: bool,
    #[cfg_attr(feature = "serde", serde(default))]
    pub discovery_mode: Option<DiscoveryMode>,
    /// Discovered, not yet processed top-level items in discovery order.
    #[cfg_attr(feature = "serde", serde(default))]
    pub pending: Vec<PathBuf>,
    /// Items already processed. Listings skip them until they disappear
    /// from the root.
    #[cfg_attr(feature = "serde", serde(default))]
    pub seen: Vec<PathBuf>,
    pub created_at: DateTime<Utc>,
    #[cfg_attr(feature = "serde", serde(default))]
    pub stats: RootStats,
}

impl MonitoredRoot {
    pub fn new(path: PathBuf, name: String) -> Self {
        Self {
            id: MonitoredRootId::new(),
            path,
            name,
            active: false,
            discovery_mode: None,
            pending: Vec::new(),
            seen: Vec::new(),
            created_at: Utc::now(),
            stats: RootStats::default(),
        }
    }

    pub fn has_pending(&self, path: &std::path::Path) -> bool {
        self.pending.iter().any(|existing| existing == path)
    }

    pub fn has_seen(&self, path: &std::path::Path) -> bool {
        self.seen.iter().any(|existing| existing == path)
    }
}

/// A pending path together with the root that owns it.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct PendingItem {
    pub root_id: MonitoredRootId,
    pub path: PathBuf,
}
