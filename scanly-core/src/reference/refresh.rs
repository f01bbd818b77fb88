//! Keeps lists that mirror a remote JSON source up to date.

use std::sync::Arc;
use std::time::{Duration, SystemTime};

use chrono::Utc;
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use super::cache::ReferenceListCache;
use super::parse::format_entry;
use crate::error::Result;
use crate::model::reference::ReferenceListId;

/// A list whose contents are fetched from `url`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RemoteListSource {
    pub list: ReferenceListId,
    pub url: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RefreshOutcome {
    Fresh,
    Refreshed { entries: usize },
}

#[derive(Debug, Deserialize)]
struct RemoteItem {
    #[serde(alias = "name")]
    title: String,
    #[serde(default, alias = "release_year")]
    year: Option<u16>,
    #[serde(default, alias = "id")]
    tmdb_id: Option<serde_json::Value>,
}

#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum RemotePayload {
    Items(Vec<RemoteItem>),
    Wrapped { items: Vec<RemoteItem> },
}

impl RemotePayload {
    fn into_items(self) -> Vec<RemoteItem> {
        match self {
            RemotePayload::Items(items) | RemotePayload::Wrapped { items } => items,
        }
    }
}

#[derive(Debug, Clone)]
pub struct ReferenceListRefresher {
    client: reqwest::Client,
    cache: Arc<ReferenceListCache>,
    max_age: Duration,
}

impl ReferenceListRefresher {
    pub fn new(cache: Arc<ReferenceListCache>, max_age: Duration) -> Self {
        Self::with_client(reqwest::Client::new(), cache, max_age)
    }

    pub fn with_client(
        client: reqwest::Client,
        cache: Arc<ReferenceListCache>,
        max_age: Duration,
    ) -> Self {
        Self {
            client,
            cache,
            max_age,
        }
    }

    /// Refetch the list only when its remote snapshot is missing or older
    /// than the freshness window. Learned entries in the local file do not
    /// count.
    pub async fn refresh_if_stale(&self, source: &RemoteListSource) -> Result<RefreshOutcome> {
        if self.is_fresh(&source.list).await {
            debug!(list = %source.list, "reference list is fresh");
            return Ok(RefreshOutcome::Fresh);
        }
        self.refresh(source).await
    }

    /// Refresh every source, logging failures. Returns how many snapshots
    /// were replaced.
    pub async fn refresh_all(&self, sources: &[RemoteListSource]) -> usize {
        let mut refreshed = 0;
        for source in sources {
            match self.refresh_if_stale(source).await {
                Ok(RefreshOutcome::Refreshed { .. }) => refreshed += 1,
                Ok(RefreshOutcome::Fresh) => {}
                Err(err) => {
                    warn!(list = %source.list, url = %source.url, error = %err, "list refresh failed");
                }
            }
        }
        refreshed
    }

    /// Fetch and replace the remote snapshot unconditionally.
    pub async fn refresh(&self, source: &RemoteListSource) -> Result<RefreshOutcome> {
        let payload: RemotePayload = self
            .client
            .get(&source.url)
            .send()
            .await?
            .error_for_status()?
            .json()
            .await?;
        let items = payload.into_items();

        let mut contents = format!(
            "# {} refreshed from {} at {}\n",
            source.list,
            source.url,
            Utc::now().to_rfc3339()
        );
        let mut entries = 0;
        for item in items {
            let title = item.title.trim();
            if title.is_empty() {
                continue;
            }
            let id = item.tmdb_id.as_ref().and_then(id_to_string);
            contents.push_str(&format_entry(title, item.year, id.as_deref()));
            contents.push('\n');
            entries += 1;
        }

        self.cache.replace_remote(&source.list, &contents).await?;
        info!(list = %source.list, entries, "reference list refreshed");
        Ok(RefreshOutcome::Refreshed { entries })
    }

    async fn is_fresh(&self, list: &ReferenceListId) -> bool {
        let path = self.cache.remote_path(list);
        let Ok(metadata) = tokio::fs::metadata(&path).await else {
            return false;
        };
        let Ok(modified) = metadata.modified() else {
            return false;
        };
        SystemTime::now()
            .duration_since(modified)
            .map(|age| age < self.max_age)
            .unwrap_or(true)
    }
}

fn id_to_string(value: &serde_json::Value) -> Option<String> {
    match value {
        serde_json::Value::Number(n) => Some(n.to_string()),
        serde_json::Value::String(s) if !s.trim().is_empty() => Some(s.trim().to_string()),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn payload_accepts_bare_and_wrapped_arrays() {
        let bare: RemotePayload =
            serde_json::from_str(r#"[{"title": "Heat", "year": 1995, "tmdb_id": 949}]"#)
                .unwrap();
        let wrapped: RemotePayload = serde_json::from_str(
            r#"{"items": [{"name": "Heat", "release_year": 1995, "id": "949"}]}"#,
        )
        .unwrap();

        for payload in [bare, wrapped] {
            let items = payload.into_items();
            assert_eq!(items.len(), 1);
            assert_eq!(items[0].title, "Heat");
            assert_eq!(items[0].year, Some(1995));
            assert_eq!(
                items[0].tmdb_id.as_ref().and_then(id_to_string).as_deref(),
                Some("949")
            );
        }
    }

    #[tokio::test]
    async fn recent_snapshot_is_fresh() {
        let tmp = tempfile::tempdir().unwrap();
        let cache = Arc::new(ReferenceListCache::new(tmp.path()));
        let list = ReferenceListId::new("movies");
        cache.replace_remote(&list, "Heat (1995)\n").await.unwrap();
        let refresher = ReferenceListRefresher::new(cache, Duration::from_secs(3600));

        let source = RemoteListSource {
            list,
            // Never contacted: the snapshot is fresh.
            url: "http://127.0.0.1:9/movies.json".into(),
        };
        assert_eq!(
            refresher.refresh_if_stale(&source).await.unwrap(),
            RefreshOutcome::Fresh
        );
    }

    #[tokio::test]
    async fn learned_entries_do_not_make_a_list_fresh() {
        let tmp = tempfile::tempdir().unwrap();
        let cache = Arc::new(ReferenceListCache::new(tmp.path()));
        let list = ReferenceListId::new("movies");
        cache
            .append_entry(&list, "Heat", Some(1995), Some("949"))
            .await
            .unwrap();
        let refresher = ReferenceListRefresher::new(Arc::clone(&cache), Duration::from_secs(3600));

        let source = RemoteListSource {
            list: list.clone(),
            url: "http://127.0.0.1:9/movies.json".into(),
        };
        // No snapshot yet, so the unreachable source is contacted.
        assert!(refresher.refresh_if_stale(&source).await.is_err());
        assert_eq!(cache.get(&list).await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn unreachable_source_is_an_error() {
        let tmp = tempfile::tempdir().unwrap();
        let cache = Arc::new(ReferenceListCache::new(tmp.path()));
        let refresher = ReferenceListRefresher::new(cache, Duration::from_secs(3600));
        let source = RemoteListSource {
            list: ReferenceListId::new("movies"),
            url: "http://127.0.0.1:9/movies.json".into(),
        };
        assert!(refresher.refresh_if_stale(&source).await.is_err());
        assert_eq!(refresher.refresh_all(std::slice::from_ref(&source)).await, 0);
    }
}
