use std::collections::{HashMap, HashSet};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

use tokio::io::AsyncWriteExt;
use tokio::sync::Mutex;
use tracing::{debug, info};

use super::parse::{format_entry, parse_list};
use crate::error::{Result, ScanlyError};
use crate::matching::normalize::normalize_title;
use crate::model::reference::{ReferenceEntry, ReferenceListId};

const REMOTE_DIR: &str = "remote";

/// Read-through cache of parsed reference lists.
///
/// A list is the union of its local file `<id>.txt`, which also collects
/// learned entries, and the last snapshot fetched from a remote source at
/// `remote/<id>.txt`. Local entries win when both name the same title and
/// year.
///
/// A miss parses the backing files while holding the cache lock, so
/// concurrent readers of a cold list wait for the single parse instead of
/// repeating it. Missing files are cached as empty lists.
#[derive(Debug)]
pub struct ReferenceListCache {
    directory: PathBuf,
    lists: Mutex<HashMap<ReferenceListId, Arc<Vec<ReferenceEntry>>>>,
    parse_count: AtomicUsize,
}

impl ReferenceListCache {
    pub fn new(directory: impl Into<PathBuf>) -> Self {
        Self {
            directory: directory.into(),
            lists: Mutex::new(HashMap::new()),
            parse_count: AtomicUsize::new(0),
        }
    }

    pub fn directory(&self) -> &Path {
        &self.directory
    }

    pub fn list_path(&self, list: &ReferenceListId) -> PathBuf {
        self.directory.join(list.file_name())
    }

    /// Where the snapshot of a remote source is kept.
    pub fn remote_path(&self, list: &ReferenceListId) -> PathBuf {
        self.directory.join(REMOTE_DIR).join(list.file_name())
    }

    pub async fn get(&self, list: &ReferenceListId) -> Result<Arc<Vec<ReferenceEntry>>> {
        let mut guard = self.lists.lock().await;
        if let Some(entries) = guard.get(list) {
            return Ok(Arc::clone(entries));
        }

        let local = read_list_file(&self.list_path(list)).await?;
        let remote = read_list_file(&self.remote_path(list)).await?;
        if local.is_none() && remote.is_none() {
            debug!(list = %list, "reference list missing; caching empty");
        } else {
            self.parse_count.fetch_add(1, Ordering::Relaxed);
        }

        let entries = merge_entries(
            local.map(|contents| parse_list(&contents, list)).unwrap_or_default(),
            remote.map(|contents| parse_list(&contents, list)).unwrap_or_default(),
        );
        debug!(list = %list, entries = entries.len(), "reference list loaded");
        let entries = Arc::new(entries);
        guard.insert(list.clone(), Arc::clone(&entries));
        Ok(entries)
    }

    /// Swap in a new remote snapshot and drop the cached copy. The local
    /// file is never touched.
    pub async fn replace_remote(&self, list: &ReferenceListId, contents: &str) -> Result<()> {
        let path = self.remote_path(list);
        let dir = self.directory.join(REMOTE_DIR);
        let tmp = dir.join(format!(".{}.tmp", list.file_name()));

        let mut guard = self.lists.lock().await;
        tokio::fs::create_dir_all(&dir).await?;
        tokio::fs::write(&tmp, contents).await?;
        tokio::fs::rename(&tmp, &path).await.map_err(|err| {
            ScanlyError::Internal(format!("failed to replace {}: {err}", path.display()))
        })?;
        guard.remove(list);
        Ok(())
    }

    /// Drop one list, or every list when `None`.
    pub async fn invalidate(&self, list: Option<&ReferenceListId>) {
        let mut guard = self.lists.lock().await;
        match list {
            Some(list) => {
                guard.remove(list);
            }
            None => guard.clear(),
        }
    }

    /// Number of file parses performed so far.
    pub fn parse_count(&self) -> usize {
        self.parse_count.load(Ordering::Relaxed)
    }

    /// Append a learned entry to a list file and drop the cached copy.
    pub async fn append_entry(
        &self,
        list: &ReferenceListId,
        title: &str,
        year: Option<u16>,
        external_id: Option<&str>,
    ) -> Result<()> {
        let line = format_entry(title, year, external_id);
        let path = self.list_path(list);
        {
            // Hold the cache lock so a concurrent miss cannot parse a
            // half-written line.
            let mut guard = self.lists.lock().await;
            tokio::fs::create_dir_all(&self.directory).await?;
            let needs_newline = match tokio::fs::read(&path).await {
                Ok(bytes) => bytes.last().is_some_and(|b| *b != b'\n'),
                Err(_) => false,
            };
            let mut file = tokio::fs::OpenOptions::new()
                .create(true)
                .append(true)
                .open(&path)
                .await?;
            let mut payload = String::new();
            if needs_newline {
                payload.push('\n');
            }
            payload.push_str(&line);
            payload.push('\n');
            file.write_all(payload.as_bytes()).await?;
            file.flush().await?;
            guard.remove(list);
        }
        info!(list = %list, entry = %line, "reference entry appended");
        Ok(())
    }
}

async fn read_list_file(path: &Path) -> Result<Option<String>> {
    match tokio::fs::read_to_string(path).await {
        Ok(contents) => Ok(Some(contents)),
        Err(err) if err.kind() == std::io::ErrorKind::NotFound => Ok(None),
        Err(err) => Err(err.into()),
    }
}

fn merge_entries(
    local: Vec<ReferenceEntry>,
    remote: Vec<ReferenceEntry>,
) -> Vec<ReferenceEntry> {
    let mut known: HashSet<(String, Option<u16>)> = local
        .iter()
        .map(|entry| (normalize_title(&entry.title), entry.year))
        .collect();
    let mut merged = local;
    for entry in remote {
        if known.insert((normalize_title(&entry.title), entry.year)) {
            merged.push(entry);
        }
    }
    merged
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn missing_file_is_cached_empty() {
        let tmp = tempfile::tempdir().unwrap();
        let cache = ReferenceListCache::new(tmp.path());
        let list = ReferenceListId::new("movies");

        assert!(cache.get(&list).await.unwrap().is_empty());
        // The file appearing later is not seen until invalidation.
        std::fs::write(tmp.path().join("movies.txt"), "Heat (1995)\n").unwrap();
        assert!(cache.get(&list).await.unwrap().is_empty());

        cache.invalidate(Some(&list)).await;
        assert_eq!(cache.get(&list).await.unwrap().len(), 1);
        assert_eq!(cache.parse_count(), 1);
    }

    #[tokio::test]
    async fn append_entry_invalidates_and_persists() {
        let tmp = tempfile::tempdir().unwrap();
        let cache = ReferenceListCache::new(tmp.path().join("lists"));
        let list = ReferenceListId::new("tv_series");

        assert!(cache.get(&list).await.unwrap().is_empty());
        cache
            .append_entry(&list, "Severance", Some(2022), Some("95396"))
            .await
            .unwrap();

        let entries = cache.get(&list).await.unwrap();
        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].to_string(), "Severance (2022) [tmdb-95396]");
    }

    #[tokio::test]
    async fn remote_snapshot_merges_under_local_entries() {
        let tmp = tempfile::tempdir().unwrap();
        let cache = ReferenceListCache::new(tmp.path());
        let list = ReferenceListId::new("movies");
        std::fs::write(tmp.path().join("movies.txt"), "Heat (1995) [tmdb-949]\n").unwrap();

        cache
            .replace_remote(&list, "heat (1995) [tmdb-1]\nRonin (1998) [tmdb-8195]\n")
            .await
            .unwrap();

        let entries = cache.get(&list).await.unwrap();
        let rendered: Vec<String> = entries.iter().map(ToString::to_string).collect();
        assert_eq!(
            rendered,
            vec!["Heat (1995) [tmdb-949]", "Ronin (1998) [tmdb-8195]"]
        );
        assert_eq!(cache.parse_count(), 1);
    }

    #[tokio::test]
    async fn unreadable_list_is_an_error_and_not_cached() {
        let tmp = tempfile::tempdir().unwrap();
        // A directory in place of the file fails with something other than
        // NotFound.
        std::fs::create_dir(tmp.path().join("movies.txt")).unwrap();
        let cache = ReferenceListCache::new(tmp.path());
        let list = ReferenceListId::new("movies");

        assert!(cache.get(&list).await.is_err());
        std::fs::remove_dir(tmp.path().join("movies.txt")).unwrap();
        std::fs::write(tmp.path().join("movies.txt"), "Heat\n").unwrap();
        assert_eq!(cache.get(&list).await.unwrap().len(), 1);
    }
}
