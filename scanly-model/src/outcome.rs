use std::path::{Path, PathBuf};

use crate::category::MediaCategory;

#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(tag = "status", rename_all = "snake_case"))]
pub enum ItemStatus {
    Linked { external_id: Option<String> },
    Skipped { reason: String },
    Failed { reason: String },
}

/// Result of processing a single media item inside a directory task.
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct ItemOutcome {
    pub path: PathBuf,
    pub title: Option<String>,
    pub year: Option<u16>,
    pub category: Option<MediaCategory>,
    pub status: ItemStatus,
}

impl ItemOutcome {
    pub fn failed(path: &Path, reason: impl Into<String>) -> Self {
        Self {
            path: path.to_path_buf(),
            title: None,
            year: None,
            category: None,
            status: ItemStatus::Failed {
                reason: reason.into(),
            },
        }
    }

    pub fn is_failed(&self) -> bool {
        matches!(self.status, ItemStatus::Failed { .. })
    }
}

/// Result of one directory task.
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct DirectoryOutcome {
    pub path: PathBuf,
    pub items: Vec<ItemOutcome>,
    /// Directory-level failure (unreadable directory, worker panic).
    pub error: Option<String>,
}

impl DirectoryOutcome {
    pub fn new(path: &Path) -> Self {
        Self {
            path: path.to_path_buf(),
            items: Vec::new(),
            error: None,
        }
    }

    pub fn failed(path: &Path, error: impl Into<String>) -> Self {
        Self {
            error: Some(error.into()),
            ..Self::new(path)
        }
    }

    pub fn linked(&self) -> usize {
        self.count(|status| matches!(status, ItemStatus::Linked { .. }))
    }

    pub fn skipped(&self) -> usize {
        self.count(|status| matches!(status, ItemStatus::Skipped { .. }))
    }

    pub fn failed_items(&self) -> usize {
        self.count(|status| matches!(status, ItemStatus::Failed { .. }))
    }

    /// True when the directory was readable and no item failed.
    pub fn is_success(&self) -> bool {
        self.error.is_none() && self.failed_items() == 0
    }

    fn count(&self, predicate: impl Fn(&ItemStatus) -> bool) -> usize {
        self.items
            .iter()
            .filter(|item| predicate(&item.status))
            .count()
    }
}
