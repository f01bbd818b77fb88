//! Broken-link detection and repair.
//!
//! A run walks the destination tree breadth first (directory symlinks are
//! recorded, never followed), checks every link target and re-points broken
//! links at a file with the same name found under the search roots. A link
//! is only ever replaced by renaming a fresh sibling symlink over it.

use std::collections::VecDeque;
use std::ffi::OsStr;
use std::fs::FileType;
use std::path::{Path, PathBuf};

use chrono::Utc;
use tokio::sync::{Mutex, watch};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use super::RepairConfig;
use crate::error::{Result, ScanlyError};
use crate::fs::create_symlink;
use crate::model::repair::{LinkStatus, RepairPhase, RepairReport, SymlinkRecord};
use crate::paths::{relative_path, resolve_link_target};

#[derive(Debug)]
pub struct LinkRepairEngine {
    config: RepairConfig,
    phase: watch::Sender<RepairPhase>,
    run_lock: Mutex<()>,
}

impl LinkRepairEngine {
    pub fn new(config: RepairConfig) -> Self {
        let (phase, _) = watch::channel(RepairPhase::Idle);
        Self {
            config,
            phase,
            run_lock: Mutex::new(()),
        }
    }

    pub fn config(&self) -> &RepairConfig {
        &self.config
    }

    pub fn phase(&self) -> RepairPhase {
        *self.phase.borrow()
    }

    pub fn subscribe(&self) -> watch::Receiver<RepairPhase> {
        self.phase.subscribe()
    }

    /// One full scan/detect/repair pass. Runs are serialized.
    pub async fn check_and_repair(&self) -> Result<RepairReport> {
        self.check_and_repair_until(&CancellationToken::new()).await
    }

    /// A pass that stops between links once `cancel` fires. The link being
    /// replaced at that moment is finished first. An interrupted pass
    /// returns [`ScanlyError::Cancelled`] and leaves the phase at `Idle`.
    pub async fn check_and_repair_until(
        &self,
        cancel: &CancellationToken,
    ) -> Result<RepairReport> {
        let _guard = self.run_lock.lock().await;
        let result = self.run(cancel).await;
        if result.is_err() {
            self.phase.send_replace(RepairPhase::Idle);
        }
        result
    }

    async fn run(&self, cancel: &CancellationToken) -> Result<RepairReport> {
        let destination = &self.config.destination;
        let is_dir = tokio::fs::metadata(destination)
            .await
            .map(|md| md.is_dir())
            .unwrap_or(false);
        if !is_dir {
            return Err(ScanlyError::InvalidPath(format!(
                "link destination {} is not a directory",
                destination.display()
            )));
        }

        let mut report = RepairReport::started();

        self.phase.send_replace(RepairPhase::Scanning);
        let links = scan_links(destination, cancel).await?;
        report.scanned = links.len();

        self.phase.send_replace(RepairPhase::Detecting);
        let mut broken = Vec::new();
        for (link, target) in links {
            check_cancelled(cancel)?;
            let resolved = resolve_link_target(&link, &target);
            let status = if tokio::fs::metadata(&resolved).await.is_ok() {
                LinkStatus::Ok
            } else {
                LinkStatus::Broken
            };
            let record = SymlinkRecord {
                link,
                target,
                status,
            };
            if record.is_broken() {
                debug!(link = %record.link.display(), target = %record.target.display(), "broken link");
                broken.push(record);
            }
        }
        report.found = broken.len();

        self.phase.send_replace(RepairPhase::Repairing);
        for record in &broken {
            check_cancelled(cancel)?;
            let Some(replacement) = self.find_replacement(record).await else {
                warn!(link = %record.link.display(), "no replacement found");
                report.failed += 1;
                continue;
            };
            match self.relink(&record.link, &replacement).await {
                Ok(()) => {
                    info!(
                        link = %record.link.display(),
                        target = %replacement.display(),
                        "link repaired"
                    );
                    report.repaired += 1;
                }
                Err(err) => {
                    warn!(link = %record.link.display(), error = %err, "relink failed");
                    report.failed += 1;
                }
            }
        }

        report.finished_at = Utc::now();
        self.phase.send_replace(RepairPhase::Done);
        info!(
            scanned = report.scanned,
            found = report.found,
            repaired = report.repaired,
            failed = report.failed,
            "link repair finished"
        );
        Ok(report)
    }

    async fn find_replacement(&self, record: &SymlinkRecord) -> Option<PathBuf> {
        if record.target.is_absolute() && tokio::fs::metadata(&record.target).await.is_ok() {
            return Some(record.target.clone());
        }
        let name = record.target.file_name()?;
        for root in &self.config.search_roots {
            if let Some(found) = find_file_named(root, name).await {
                return Some(found);
            }
        }
        None
    }

    async fn relink(&self, link: &Path, new_target: &Path) -> Result<()> {
        let target = if self.config.relative_links {
            let base = link.parent().unwrap_or_else(|| Path::new("/"));
            relative_path(new_target, base)
        } else {
            new_target.to_path_buf()
        };

        let name = link
            .file_name()
            .ok_or_else(|| ScanlyError::InvalidPath(link.display().to_string()))?;
        let mut staging_name = std::ffi::OsString::from(".");
        staging_name.push(name);
        staging_name.push(".scanly-repair");
        let staging = link.with_file_name(staging_name);

        // Leftover from an interrupted run.
        let _ = tokio::fs::remove_file(&staging).await;
        create_symlink(&target, &staging).await?;
        if let Err(err) = tokio::fs::rename(&staging, link).await {
            let _ = tokio::fs::remove_file(&staging).await;
            return Err(err.into());
        }
        Ok(())
    }
}

fn check_cancelled(cancel: &CancellationToken) -> Result<()> {
    if cancel.is_cancelled() {
        info!("link repair interrupted");
        return Err(ScanlyError::Cancelled("link repair".into()));
    }
    Ok(())
}

#[derive(Debug, PartialEq, Eq)]
enum EntryAction {
    ReadLink,
    Descend,
    Skip,
}

/// Entries whose type cannot be read are skipped.
fn entry_action(path: &Path, file_type: std::io::Result<FileType>) -> EntryAction {
    match file_type {
        Ok(file_type) if file_type.is_symlink() => EntryAction::ReadLink,
        Ok(file_type) if file_type.is_dir() => EntryAction::Descend,
        Ok(_) => EntryAction::Skip,
        Err(err) => {
            warn!(path = %path.display(), error = %err, "skipping unreadable entry");
            EntryAction::Skip
        }
    }
}

/// Every symlink under `root` with its raw target. Only an unreadable
/// `root` fails the scan.
async fn scan_links(
    root: &Path,
    cancel: &CancellationToken,
) -> Result<Vec<(PathBuf, PathBuf)>> {
    let mut links = Vec::new();
    let mut queue = VecDeque::from([root.to_path_buf()]);
    let mut first = true;

    while let Some(dir) = queue.pop_front() {
        check_cancelled(cancel)?;
        let mut reader = match tokio::fs::read_dir(&dir).await {
            Ok(reader) => reader,
            Err(err) if first => return Err(err.into()),
            Err(err) => {
                warn!(dir = %dir.display(), error = %err, "skipping unreadable directory");
                continue;
            }
        };
        first = false;

        loop {
            let entry = match reader.next_entry().await {
                Ok(Some(entry)) => entry,
                Ok(None) => break,
                Err(err) => {
                    warn!(dir = %dir.display(), error = %err, "directory listing cut short");
                    break;
                }
            };
            let path = entry.path();
            match entry_action(&path, entry.file_type().await) {
                EntryAction::ReadLink => match tokio::fs::read_link(&path).await {
                    Ok(target) => links.push((path, target)),
                    Err(err) => {
                        warn!(link = %path.display(), error = %err, "unreadable link");
                    }
                },
                EntryAction::Descend => queue.push_back(path),
                EntryAction::Skip => {}
            }
        }
    }
    Ok(links)
}

/// Breadth-first search for a regular file called `name`. Each directory's
/// own entries are checked before descending; the first hit wins.
async fn find_file_named(root: &Path, name: &OsStr) -> Option<PathBuf> {
    let mut queue = VecDeque::from([root.to_path_buf()]);
    while let Some(dir) = queue.pop_front() {
        let Ok(mut reader) = tokio::fs::read_dir(&dir).await else {
            continue;
        };
        let mut entries = Vec::new();
        while let Ok(Some(entry)) = reader.next_entry().await {
            if let Ok(file_type) = entry.file_type().await {
                entries.push((entry.path(), file_type));
            }
        }
        entries.sort_by(|a, b| a.0.cmp(&b.0));

        for (path, file_type) in &entries {
            if file_type.is_file() && path.file_name() == Some(name) {
                return Some(path.clone());
            }
        }
        queue.extend(
            entries
                .into_iter()
                .filter(|(_, file_type)| file_type.is_dir())
                .map(|(path, _)| path),
        );
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn entry_type_errors_skip_the_entry() {
        let tmp = tempfile::tempdir().unwrap();
        let path = tmp.path().join("entry");
        let err = std::io::Error::new(std::io::ErrorKind::PermissionDenied, "denied");
        assert_eq!(entry_action(&path, Err(err)), EntryAction::Skip);

        let dir_type = std::fs::symlink_metadata(tmp.path()).unwrap().file_type();
        assert_eq!(entry_action(tmp.path(), Ok(dir_type)), EntryAction::Descend);
    }

    #[tokio::test]
    async fn cancelled_scan_stops_before_reading() {
        let tmp = tempfile::tempdir().unwrap();
        let cancel = CancellationToken::new();
        cancel.cancel();
        assert!(matches!(
            scan_links(tmp.path(), &cancel).await,
            Err(ScanlyError::Cancelled(_))
        ));
    }
}
