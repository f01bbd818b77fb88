//! Durable record of monitored roots and their pending queues.
//!
//! The store is the only writer of root state. Every mutation runs under a
//! single write lock and the JSON document is flushed (temp file + rename)
//! before the lock is released, so a reader never observes state that has
//! not at least been attempted on disk. A failed flush is logged and marks
//! the store degraded; the in-memory mutation still stands.

use std::collections::HashSet;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};

use chrono::Utc;
use serde::{Deserialize, Serialize};
use tokio::sync::RwLock;
use tracing::{debug, error, info, warn};

use crate::error::{Result, ScanlyError};
use crate::model::ids::MonitoredRootId;
use crate::model::roots::{DiscoveryMode, MonitoredRoot, PendingItem};
use crate::paths::normalize_path;

const STATE_VERSION: u32 = 1;

/// Per-item processing tallies folded into [`RootStats`](crate::model::roots::RootStats).
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ProcessingCounts {
    pub processed: u64,
    pub errors: u64,
    pub skipped: u64,
}

#[derive(Debug, Serialize, Deserialize)]
struct StateDocument {
    version: u32,
    #[serde(default)]
    roots: Vec<MonitoredRoot>,
}

#[derive(Debug, Default)]
struct StoreState {
    roots: Vec<MonitoredRoot>,
    in_flight: HashSet<PendingItem>,
}

impl StoreState {
    fn root(&self, id: MonitoredRootId) -> Result<&MonitoredRoot> {
        self.roots
            .iter()
            .find(|root| root.id == id)
            .ok_or_else(|| ScanlyError::NotFound(format!("monitored root {id}")))
    }

    fn root_mut(&mut self, id: MonitoredRootId) -> Result<&mut MonitoredRoot> {
        self.roots
            .iter_mut()
            .find(|root| root.id == id)
            .ok_or_else(|| ScanlyError::NotFound(format!("monitored root {id}")))
    }
}

#[derive(Debug)]
pub struct MonitorStateStore {
    path: PathBuf,
    state: RwLock<StoreState>,
    degraded: AtomicBool,
}

impl MonitorStateStore {
    /// Load the state file. A missing file starts empty; an unreadable one is
    /// moved aside to `<file>.corrupt-<timestamp>` and also starts empty.
    pub async fn open(path: impl Into<PathBuf>) -> Result<Self> {
        let path = path.into();
        let roots = match tokio::fs::read(&path).await {
            Ok(bytes) => match serde_json::from_slice::<StateDocument>(&bytes) {
                Ok(document) => {
                    if document.version != STATE_VERSION {
                        warn!(
                            path = %path.display(),
                            version = document.version,
                            "state file version differs; loading anyway"
                        );
                    }
                    document.roots
                }
                Err(err) => {
                    quarantine_corrupt(&path, &err).await;
                    Vec::new()
                }
            },
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => {
                debug!(path = %path.display(), "no state file yet");
                Vec::new()
            }
            Err(err) => return Err(err.into()),
        };

        info!(
            path = %path.display(),
            roots = roots.len(),
            "monitor state loaded"
        );

        Ok(Self {
            path,
            state: RwLock::new(StoreState {
                roots,
                in_flight: HashSet::new(),
            }),
            degraded: AtomicBool::new(false),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// True when the most recent flush failed.
    pub fn is_degraded(&self) -> bool {
        self.degraded.load(Ordering::Relaxed)
    }

    /// Register a directory. Re-adding an already monitored path returns the
    /// existing id.
    pub async fn add_root(
        &self,
        path: &Path,
        name: Option<String>,
    ) -> Result<MonitoredRootId> {
        let is_dir = tokio::fs::metadata(path)
            .await
            .map(|md| md.is_dir())
            .unwrap_or(false);
        if !is_dir {
            return Err(ScanlyError::InvalidPath(format!(
                "{} is not an existing directory",
                path.display()
            )));
        }

        let normalized = normalize_path(path);
        self.mutate(|state| {
            if let Some(existing) =
                state.roots.iter().find(|root| root.path == normalized)
            {
                return Ok((existing.id, false));
            }
            let name = name
                .filter(|name| !name.trim().is_empty())
                .or_else(|| {
                    normalized
                        .file_name()
                        .map(|n| n.to_string_lossy().into_owned())
                })
                .unwrap_or_else(|| normalized.display().to_string());
            let root = MonitoredRoot::new(normalized.clone(), name);
            let id = root.id;
            info!(root = %id, path = %normalized.display(), "monitored root added");
            state.roots.push(root);
            Ok((id, true))
        })
        .await
    }

    pub async fn remove_root(&self, id: MonitoredRootId) -> Result<MonitoredRoot> {
        self.mutate(|state| {
            let index = state
                .roots
                .iter()
                .position(|root| root.id == id)
                .ok_or_else(|| ScanlyError::NotFound(format!("monitored root {id}")))?;
            let removed = state.roots.remove(index);
            state.in_flight.retain(|item| item.root_id != id);
            info!(root = %id, path = %removed.path.display(), "monitored root removed");
            Ok((removed, true))
        })
        .await
    }

    pub async fn set_active(&self, id: MonitoredRootId, active: bool) -> Result<()> {
        self.mutate(|state| {
            let root = state.root_mut(id)?;
            let changed = root.active != active;
            root.active = active;
            Ok(((), changed))
        })
        .await
    }

    pub async fn set_discovery_mode(
        &self,
        id: MonitoredRootId,
        mode: Option<DiscoveryMode>,
    ) -> Result<()> {
        self.mutate(|state| {
            let root = state.root_mut(id)?;
            let changed = root.discovery_mode != mode;
            root.discovery_mode = mode;
            Ok(((), changed))
        })
        .await
    }

    /// Returns whether the path was newly added.
    pub async fn add_pending(&self, id: MonitoredRootId, path: &Path) -> Result<bool> {
        let paths = [path.to_path_buf()];
        Ok(self.add_pending_batch(id, &paths).await? == 1)
    }

    /// Append paths in the given order, skipping ones already pending.
    /// Returns how many were added.
    pub async fn add_pending_batch(
        &self,
        id: MonitoredRootId,
        paths: &[PathBuf],
    ) -> Result<usize> {
        self.mutate(|state| {
            let root = state.root_mut(id)?;
            let mut added = 0;
            for path in paths {
                let normalized = normalize_path(path);
                if !root.has_pending(&normalized) {
                    root.pending.push(normalized);
                    added += 1;
                }
            }
            if added > 0 {
                debug!(root = %id, added, "pending items recorded");
            }
            Ok((added, added > 0))
        })
        .await
    }

    /// Fold a full listing of the root's candidates into the queue. Entries
    /// that were already processed are skipped; processed entries missing
    /// from the listing are forgotten so a later arrival under the same name
    /// is picked up again. Returns the paths that were added.
    pub async fn reconcile_listing(
        &self,
        id: MonitoredRootId,
        listing: &[PathBuf],
    ) -> Result<Vec<PathBuf>> {
        let listing: Vec<PathBuf> = listing.iter().map(|path| normalize_path(path)).collect();
        self.mutate(|state| {
            let root = state.root_mut(id)?;
            let seen_before = root.seen.len();
            root.seen.retain(|seen| listing.contains(seen));
            let forgotten = seen_before - root.seen.len();

            let mut added = Vec::new();
            for path in listing {
                if !root.has_pending(&path) && !root.has_seen(&path) {
                    root.pending.push(path.clone());
                    added.push(path);
                }
            }
            let changed = !added.is_empty() || forgotten > 0;
            if changed {
                debug!(root = %id, added = added.len(), forgotten, "listing reconciled");
            }
            Ok((added, changed))
        })
        .await
    }

    pub async fn remove_pending(&self, id: MonitoredRootId, path: &Path) -> Result<bool> {
        let normalized = normalize_path(path);
        self.mutate(|state| {
            let root = state.root_mut(id)?;
            let before = root.pending.len();
            root.pending.retain(|existing| existing != &normalized);
            let removed = root.pending.len() != before;
            Ok((removed, removed))
        })
        .await
    }

    /// Drop every pending item of a root. Returns how many were dropped.
    pub async fn clear_pending(&self, id: MonitoredRootId) -> Result<usize> {
        self.mutate(|state| {
            let root = state.root_mut(id)?;
            let cleared = root.pending.len();
            root.pending.clear();
            Ok((cleared, cleared > 0))
        })
        .await
    }

    pub async fn record_processing(
        &self,
        id: MonitoredRootId,
        counts: ProcessingCounts,
    ) -> Result<()> {
        self.mutate(|state| {
            let root = state.root_mut(id)?;
            apply_counts(root, counts);
            Ok(((), true))
        })
        .await
    }

    pub async fn list_pending(&self, id: MonitoredRootId) -> Result<Vec<PathBuf>> {
        let state = self.state.read().await;
        Ok(state.root(id)?.pending.clone())
    }

    pub async fn list_all_pending(&self) -> Vec<PendingItem> {
        let state = self.state.read().await;
        state
            .roots
            .iter()
            .flat_map(|root| {
                root.pending.iter().map(|path| PendingItem {
                    root_id: root.id,
                    path: path.clone(),
                })
            })
            .collect()
    }

    pub async fn roots(&self) -> Vec<MonitoredRoot> {
        self.state.read().await.roots.clone()
    }

    pub async fn get(&self, id: MonitoredRootId) -> Option<MonitoredRoot> {
        self.state.read().await.root(id).ok().cloned()
    }

    pub async fn active_roots(&self) -> Vec<MonitoredRoot> {
        let state = self.state.read().await;
        state.roots.iter().filter(|root| root.active).cloned().collect()
    }

    /// Hand out every pending item not already claimed. A claimed item is not
    /// returned again until it is completed or released.
    pub async fn claim_pending(&self) -> Vec<PendingItem> {
        let mut state = self.state.write().await;
        let StoreState { roots, in_flight } = &mut *state;
        let mut claimed = Vec::new();
        for root in roots.iter() {
            for path in &root.pending {
                let item = PendingItem {
                    root_id: root.id,
                    path: path.clone(),
                };
                if in_flight.insert(item.clone()) {
                    claimed.push(item);
                }
            }
        }
        claimed
    }

    /// Remove a processed item from its root, remember it as seen, fold its
    /// counts into the root statistics and drop the claim.
    pub async fn complete_pending(
        &self,
        item: &PendingItem,
        counts: ProcessingCounts,
    ) -> Result<()> {
        self.mutate(|state| {
            state.in_flight.remove(item);
            let Ok(root) = state.root_mut(item.root_id) else {
                // Root was removed while the item was in flight.
                return Ok(((), false));
            };
            root.pending.retain(|existing| existing != &item.path);
            if !root.has_seen(&item.path) {
                root.seen.push(item.path.clone());
            }
            apply_counts(root, counts);
            Ok(((), true))
        })
        .await
    }

    /// Drop an item whose directory no longer exists, along with its claim.
    /// Returns whether it was still pending.
    pub async fn discard_pending(&self, item: &PendingItem) -> Result<bool> {
        self.mutate(|state| {
            state.in_flight.remove(item);
            let Ok(root) = state.root_mut(item.root_id) else {
                return Ok((false, false));
            };
            let before = root.pending.len();
            root.pending.retain(|existing| existing != &item.path);
            let removed = root.pending.len() != before;
            Ok((removed, removed))
        })
        .await
    }

    /// Drop the claim and leave the item pending for a later run.
    pub async fn release_claim(&self, item: &PendingItem) {
        self.state.write().await.in_flight.remove(item);
    }

    async fn mutate<T>(
        &self,
        op: impl FnOnce(&mut StoreState) -> Result<(T, bool)>,
    ) -> Result<T> {
        let mut state = self.state.write().await;
        let (value, changed) = op(&mut state)?;
        if changed {
            self.persist(&state).await;
        }
        Ok(value)
    }

    async fn persist(&self, state: &StoreState) {
        match self.write_document(state).await {
            Ok(()) => {
                self.degraded.store(false, Ordering::Relaxed);
            }
            Err(err) => {
                error!(
                    path = %self.path.display(),
                    error = %err,
                    "failed to persist monitor state; continuing in memory"
                );
                self.degraded.store(true, Ordering::Relaxed);
            }
        }
    }

    async fn write_document(&self, state: &StoreState) -> Result<()> {
        let document = StateDocument {
            version: STATE_VERSION,
            roots: state.roots.clone(),
        };
        let bytes = serde_json::to_vec_pretty(&document)?;

        if let Some(parent) = self.path.parent()
            && !parent.as_os_str().is_empty()
        {
            tokio::fs::create_dir_all(parent).await?;
        }
        let tmp = sibling_with_suffix(&self.path, ".tmp");
        tokio::fs::write(&tmp, &bytes).await?;
        tokio::fs::rename(&tmp, &self.path).await?;
        Ok(())
    }
}

fn apply_counts(root: &mut MonitoredRoot, counts: ProcessingCounts) {
    root.stats.total_processed += counts.processed;
    root.stats.total_errors += counts.errors;
    root.stats.total_skipped += counts.skipped;
    root.stats.last_processed = Some(Utc::now());
}

fn sibling_with_suffix(path: &Path, suffix: &str) -> PathBuf {
    let mut name = path.file_name().unwrap_or_default().to_os_string();
    name.push(suffix);
    path.with_file_name(name)
}

async fn quarantine_corrupt(path: &Path, err: &serde_json::Error) {
    let stamp = Utc::now().format("%Y%m%d%H%M%S");
    let aside = sibling_with_suffix(path, &format!(".corrupt-{stamp}"));
    match tokio::fs::rename(path, &aside).await {
        Ok(()) => warn!(
            path = %path.display(),
            moved_to = %aside.display(),
            error = %err,
            "state file unreadable; moved aside and starting empty"
        ),
        Err(rename_err) => error!(
            path = %path.display(),
            error = %err,
            rename_error = %rename_err,
            "state file unreadable and could not be moved aside"
        ),
    }
}
