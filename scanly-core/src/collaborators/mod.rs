//! Narrow interfaces to behaviour that lives outside the core.
//!
//! The processing pipeline only talks to these traits. The submodules hold
//! the default implementations the daemon wires up.

use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use async_trait::async_trait;
use serde::Serialize;

use crate::error::Result;
use crate::model::category::MediaCategory;
use crate::model::ids::MonitoredRootId;

pub mod links;
pub mod naming;
pub mod notify;

pub use links::SymlinkLinkCreator;
pub use naming::{KeywordClassifier, RegexTitleExtractor};
pub use notify::{LogNotifier, NoopNotifier, WebhookNotifier};

/// Title and optional release year derived from a folder or file name.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct TitleYear {
    pub title: String,
    pub year: Option<u16>,
}

impl TitleYear {
    pub fn new(title: impl Into<String>, year: Option<u16>) -> Self {
        Self {
            title: title.into(),
            year,
        }
    }
}

pub trait TitleExtractor: Send + Sync {
    fn extract_title_year(&self, name: &str) -> TitleYear;
}

pub trait Classifier: Send + Sync {
    fn classify(&self, name: &str, path: &Path) -> MediaCategory;
}

/// Online metadata lookup used when no reference list knows the title.
#[async_trait]
pub trait MetadataResolver: Send + Sync {
    async fn resolve_external_id(
        &self,
        title: &str,
        year: Option<u16>,
        category: MediaCategory,
    ) -> Result<Option<String>>;
}

/// Everything needed to materialize links for one item.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LinkRequest {
    pub source: PathBuf,
    pub title: String,
    pub year: Option<u16>,
    pub category: MediaCategory,
    pub external_id: Option<String>,
}

#[async_trait]
pub trait LinkCreator: Send + Sync {
    /// Returns `Ok(false)` when nothing could be linked.
    async fn create_links(&self, request: &LinkRequest) -> Result<bool>;
}

/// Outward notification events. Delivery is best effort.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum NotificationEvent {
    PendingDiscovered {
        root_id: MonitoredRootId,
        paths: Vec<PathBuf>,
    },
    DirectoryProcessed {
        path: PathBuf,
        linked: usize,
        skipped: usize,
        failed: usize,
    },
    LinksRepaired {
        found: usize,
        repaired: usize,
        failed: usize,
    },
}

impl NotificationEvent {
    pub fn kind(&self) -> &'static str {
        match self {
            NotificationEvent::PendingDiscovered { .. } => "pending_discovered",
            NotificationEvent::DirectoryProcessed { .. } => {
                "directory_processed"
            }
            NotificationEvent::LinksRepaired { .. } => "links_repaired",
        }
    }
}

/// Fire-and-forget sink. Implementations must never block or fail the
/// caller.
pub trait Notifier: Send + Sync {
    fn notify(&self, event: NotificationEvent);
}

/// Resolver for setups without an online metadata service.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoopResolver;

#[async_trait]
impl MetadataResolver for NoopResolver {
    async fn resolve_external_id(
        &self,
        _title: &str,
        _year: Option<u16>,
        _category: MediaCategory,
    ) -> Result<Option<String>> {
        Ok(None)
    }
}

/// The full set of collaborators handed to the processing pipeline.
#[derive(Clone)]
pub struct Collaborators {
    pub extractor: Arc<dyn TitleExtractor>,
    pub classifier: Arc<dyn Classifier>,
    pub resolver: Arc<dyn MetadataResolver>,
    pub linker: Arc<dyn LinkCreator>,
    pub notifier: Arc<dyn Notifier>,
}

impl fmt::Debug for Collaborators {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Collaborators").finish_non_exhaustive()
    }
}
