//! Mount classification used to choose between native events and polling.
//!
//! Native change notifications are unreliable on network filesystems and
//! FUSE remotes (rclone, sshfs), so roots living on those are polled.

use std::path::{Path, PathBuf};

use async_trait::async_trait;

use crate::error::Result;
use crate::paths::normalize_path;

const REMOTE_FS_TYPES: &[&str] = &[
    "nfs",
    "nfs4",
    "cifs",
    "smb3",
    "smbfs",
    "sshfs",
    "fuse.sshfs",
    "9p",
    "davfs",
    "fuse.rclone",
    "ceph",
    "glusterfs",
    "fuse.s3fs",
    "afs",
];

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MountKind {
    Local,
    Remote { fs_type: String },
}

impl MountKind {
    pub fn is_remote(&self) -> bool {
        matches!(self, MountKind::Remote { .. })
    }
}

#[async_trait]
pub trait MountProbe: Send + Sync {
    async fn probe(&self, path: &Path) -> Result<MountKind>;
}

/// Reads the mount table (`/proc/self/mounts` by default) and classifies the
/// mount with the longest mount point covering the path.
#[derive(Debug, Clone)]
pub struct ProcMountProbe {
    mounts_file: PathBuf,
}

impl Default for ProcMountProbe {
    fn default() -> Self {
        Self::new("/proc/self/mounts")
    }
}

impl ProcMountProbe {
    pub fn new(mounts_file: impl Into<PathBuf>) -> Self {
        Self {
            mounts_file: mounts_file.into(),
        }
    }
}

#[async_trait]
impl MountProbe for ProcMountProbe {
    async fn probe(&self, path: &Path) -> Result<MountKind> {
        let table = match tokio::fs::read_to_string(&self.mounts_file).await {
            Ok(table) => table,
            // No mount table (non-Linux hosts): assume local.
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => {
                return Ok(MountKind::Local);
            }
            Err(err) => return Err(err.into()),
        };
        Ok(classify_mount(&table, &normalize_path(path)))
    }
}

/// Always reports the same kind. Used for `force_polling` and in tests.
#[derive(Debug, Clone)]
pub struct FixedMountProbe(pub MountKind);

#[async_trait]
impl MountProbe for FixedMountProbe {
    async fn probe(&self, _path: &Path) -> Result<MountKind> {
        Ok(self.0.clone())
    }
}

fn classify_mount(table: &str, path: &Path) -> MountKind {
    let mut best: Option<(usize, &str, &str)> = None;
    for line in table.lines() {
        let mut fields = line.split_whitespace();
        let (Some(source), Some(mount_point), Some(fs_type)) =
            (fields.next(), fields.next(), fields.next())
        else {
            continue;
        };
        let mount_point = PathBuf::from(unescape_mount_field(mount_point));
        if !path.starts_with(&mount_point) {
            continue;
        }
        let depth = mount_point.components().count();
        if best.is_none_or(|(best_depth, _, _)| depth >= best_depth) {
            best = Some((depth, source, fs_type));
        }
    }

    match best {
        Some((_, source, fs_type))
            if REMOTE_FS_TYPES.contains(&fs_type) || source.contains("rclone") =>
        {
            MountKind::Remote {
                fs_type: fs_type.to_string(),
            }
        }
        _ => MountKind::Local,
    }
}

/// The mount table escapes whitespace and backslashes as octal (`\040`).
fn unescape_mount_field(field: &str) -> String {
    let bytes = field.as_bytes();
    let mut out = Vec::with_capacity(bytes.len());
    let mut i = 0;
    while i < bytes.len() {
        if bytes[i] == b'\\'
            && i + 3 < bytes.len()
            && bytes[i + 1..i + 4].iter().all(|b| (b'0'..=b'7').contains(b))
        {
            let value = (bytes[i + 1] - b'0') as u32 * 64
                + (bytes[i + 2] - b'0') as u32 * 8
                + (bytes[i + 3] - b'0') as u32;
            if let Ok(byte) = u8::try_from(value) {
                out.push(byte);
                i += 4;
                continue;
            }
        }
        out.push(bytes[i]);
        i += 1;
    }
    String::from_utf8_lossy(&out).into_owned()
}
