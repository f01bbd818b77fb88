use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use tracing::{debug, warn};

use crate::collaborators::{Collaborators, LinkRequest};
use crate::fs::FileSystem;
use crate::matching::MatchWorkerPool;
use crate::model::category::MediaCategory;
use crate::model::matching::MatchRequest;
use crate::model::outcome::{DirectoryOutcome, ItemOutcome, ItemStatus};
use crate::paths::is_hidden;
use crate::reference::ReferenceListCache;

/// Turns one directory into per-item outcomes: extract, classify, match,
/// resolve, link.
pub struct ItemProcessor {
    fs: Arc<dyn FileSystem>,
    collaborators: Collaborators,
    cache: Arc<ReferenceListCache>,
    match_timeout: Option<Duration>,
}

impl fmt::Debug for ItemProcessor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ItemProcessor")
            .field("match_timeout", &self.match_timeout)
            .finish_non_exhaustive()
    }
}

struct Identified {
    title: String,
    year: Option<u16>,
    external_id: String,
}

impl ItemProcessor {
    pub fn new(
        fs: Arc<dyn FileSystem>,
        collaborators: Collaborators,
        cache: Arc<ReferenceListCache>,
    ) -> Self {
        Self {
            fs,
            collaborators,
            cache,
            match_timeout: None,
        }
    }

    /// Override the match pool's default wait per item.
    pub fn with_match_timeout(mut self, timeout: Duration) -> Self {
        self.match_timeout = Some(timeout);
        self
    }

    pub async fn process_directory(
        &self,
        matcher: &MatchWorkerPool,
        directory: &Path,
    ) -> DirectoryOutcome {
        let items = match self.media_items(directory).await {
            Ok(items) => items,
            Err(reason) => {
                warn!(path = %directory.display(), reason = %reason, "directory not processable");
                return DirectoryOutcome::failed(directory, reason);
            }
        };

        let mut outcome = DirectoryOutcome::new(directory);
        for item in items {
            let item_outcome = self.process_item(matcher, &item).await;
            if let ItemStatus::Failed { reason } = &item_outcome.status {
                debug!(item = %item.display(), reason = %reason, "item failed");
            }
            outcome.items.push(item_outcome);
        }
        outcome
    }

    /// Immediate non-hidden subdirectories, or the directory itself when it
    /// has none.
    async fn media_items(&self, directory: &Path) -> Result<Vec<PathBuf>, String> {
        if !self.fs.is_dir(directory).await {
            return Err(format!("{} is not a directory", directory.display()));
        }
        let entries = self
            .fs
            .list_dir(directory)
            .await
            .map_err(|err| err.to_string())?;
        let subdirectories: Vec<PathBuf> = entries
            .into_iter()
            .filter(|entry| entry.is_dir)
            .filter(|entry| entry.path.file_name().is_some_and(|name| !is_hidden(name)))
            .map(|entry| entry.path)
            .collect();
        if subdirectories.is_empty() {
            Ok(vec![directory.to_path_buf()])
        } else {
            Ok(subdirectories)
        }
    }

    pub async fn process_item(&self, matcher: &MatchWorkerPool, item: &Path) -> ItemOutcome {
        let name = item
            .file_name()
            .map(|name| name.to_string_lossy().into_owned())
            .unwrap_or_default();
        let extracted = self.collaborators.extractor.extract_title_year(&name);
        let category = self.collaborators.classifier.classify(&name, item);

        let mut outcome = ItemOutcome {
            path: item.to_path_buf(),
            title: Some(extracted.title.clone()).filter(|t| !t.is_empty()),
            year: extracted.year,
            category: Some(category),
            status: ItemStatus::Skipped {
                reason: "no title".into(),
            },
        };
        if extracted.title.trim().is_empty() {
            return outcome;
        }

        let identified = match self
            .identify(matcher, &extracted.title, extracted.year, category)
            .await
        {
            Ok(Some(identified)) => identified,
            Ok(None) => {
                outcome.status = ItemStatus::Skipped {
                    reason: "no identifier found".into(),
                };
                return outcome;
            }
            Err(reason) => {
                outcome.status = ItemStatus::Failed { reason };
                return outcome;
            }
        };

        let request = LinkRequest {
            source: item.to_path_buf(),
            title: identified.title,
            year: identified.year,
            category,
            external_id: Some(identified.external_id.clone()),
        };
        outcome.status = match self.collaborators.linker.create_links(&request).await {
            Ok(true) => ItemStatus::Linked {
                external_id: Some(identified.external_id),
            },
            Ok(false) => ItemStatus::Failed {
                reason: "no links created".into(),
            },
            Err(err) => ItemStatus::Failed {
                reason: format!("link creation failed: {err}"),
            },
        };
        outcome
    }

    /// Find an external id: the top reference candidate first, then the
    /// online resolver. Ids learned online are appended to the category's
    /// reference list.
    async fn identify(
        &self,
        matcher: &MatchWorkerPool,
        title: &str,
        year: Option<u16>,
        category: MediaCategory,
    ) -> Result<Option<Identified>, String> {
        let request = MatchRequest::new(title, year, category);
        let request_id = matcher
            .submit(request)
            .await
            .map_err(|err| format!("match submit failed: {err}"))?;
        let result = matcher
            .await_result(request_id, self.match_timeout)
            .await
            .ok_or_else(|| "match deferred: no result before timeout".to_string())?;
        if let Some(error) = result.error {
            return Err(format!("reference lookup failed: {error}"));
        }

        if let Some(top) = result.candidates.first()
            && let Some(id) = &top.entry.external_id
        {
            return Ok(Some(Identified {
                title: top.entry.title.clone(),
                year: top.entry.year.or(year),
                external_id: id.clone(),
            }));
        }

        let resolved = self
            .collaborators
            .resolver
            .resolve_external_id(title, year, category)
            .await
            .map_err(|err| format!("metadata lookup failed: {err}"))?;
        let Some(external_id) = resolved else {
            return Ok(None);
        };

        let list = category.reference_list();
        if let Err(err) = self
            .cache
            .append_entry(&list, title, year, Some(&external_id))
            .await
        {
            warn!(list = %list, error = %err, "could not record learned id");
        }
        Ok(Some(Identified {
            title: title.to_string(),
            year,
            external_id,
        }))
    }
}
