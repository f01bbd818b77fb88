//! Minimal async filesystem abstraction used for directory listings.
//!
//! Discovery (baseline and polling scans) and directory processing only ever
//! need "is this a directory" and "what is directly inside it"; routing that
//! through a trait lets tests drive remote-mount listings and directory
//! processing with [`InMemoryFs`].

use std::collections::HashMap;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::RwLock;

use async_trait::async_trait;

use crate::error::Result;

/// One child of a listed directory.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DirEntryInfo {
    pub path: PathBuf,
    pub is_dir: bool,
}

#[async_trait]
pub trait FileSystem: Send + Sync {
    /// Check whether a path exists and is a directory (following symlinks).
    async fn is_dir(&self, path: &Path) -> bool;

    /// List the immediate children of a directory, sorted by path.
    async fn list_dir(&self, path: &Path) -> Result<Vec<DirEntryInfo>>;
}

/// Real filesystem implementation backed by tokio::fs.
#[derive(Debug, Default, Clone, Copy)]
pub struct RealFs;

impl RealFs {
    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl FileSystem for RealFs {
    async fn is_dir(&self, path: &Path) -> bool {
        tokio::fs::metadata(path)
            .await
            .map(|md| md.is_dir())
            .unwrap_or(false)
    }

    async fn list_dir(&self, path: &Path) -> Result<Vec<DirEntryInfo>> {
        let mut reader = tokio::fs::read_dir(path).await?;
        let mut entries = Vec::new();
        while let Some(entry) = reader.next_entry().await? {
            let path = entry.path();
            // Follow symlinks so linked directories count as directories.
            let is_dir = match tokio::fs::metadata(&path).await {
                Ok(md) => md.is_dir(),
                Err(_) => false,
            };
            entries.push(DirEntryInfo { path, is_dir });
        }
        entries.sort_by(|a, b| a.path.cmp(&b.path));
        Ok(entries)
    }
}

/// Create a file symlink at `link` pointing to `target`.
pub async fn create_symlink(target: &Path, link: &Path) -> io::Result<()> {
    #[cfg(unix)]
    {
        tokio::fs::symlink(target, link).await
    }
    #[cfg(windows)]
    {
        tokio::fs::symlink_file(target, link).await
    }
}

/// In-memory filesystem for tests.
/// Paths are treated literally; callers should use absolute paths.
#[derive(Debug, Default)]
pub struct InMemoryFs {
    nodes: RwLock<HashMap<PathBuf, Node>>,
}

#[derive(Debug, Clone)]
enum Node {
    Dir { children: Vec<PathBuf> },
    File,
}

impl InMemoryFs {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_dir<P: Into<PathBuf>>(&self, path: P) {
        let path = path.into();
        let mut nodes = self.write_nodes();
        if nodes.contains_key(&path) {
            return;
        }
        ensure_parent_link(&mut nodes, &path);
        nodes.insert(
            path,
            Node::Dir {
                children: Vec::new(),
            },
        );
    }

    pub fn add_file<P: Into<PathBuf>>(&self, path: P) {
        let path = path.into();
        let mut nodes = self.write_nodes();
        ensure_parent_link(&mut nodes, &path);
        nodes.insert(path, Node::File);
    }

    fn write_nodes(
        &self,
    ) -> std::sync::RwLockWriteGuard<'_, HashMap<PathBuf, Node>> {
        self.nodes
            .write()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn read_nodes(
        &self,
    ) -> std::sync::RwLockReadGuard<'_, HashMap<PathBuf, Node>> {
        self.nodes
            .read()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

fn ensure_parent_link(nodes: &mut HashMap<PathBuf, Node>, path: &Path) {
    if let Some(parent) = path.parent() {
        if !nodes.contains_key(parent) {
            nodes.insert(
                parent.to_path_buf(),
                Node::Dir {
                    children: Vec::new(),
                },
            );
            ensure_parent_link(nodes, parent);
        }
        if let Some(Node::Dir { children }) = nodes.get_mut(parent)
            && !children.iter().any(|p| p.as_path() == path)
        {
            children.push(path.to_path_buf());
        }
    }
}

#[async_trait]
impl FileSystem for InMemoryFs {
    async fn is_dir(&self, path: &Path) -> bool {
        matches!(self.read_nodes().get(path), Some(Node::Dir { .. }))
    }

    async fn list_dir(&self, path: &Path) -> Result<Vec<DirEntryInfo>> {
        let nodes = self.read_nodes();
        match nodes.get(path) {
            Some(Node::Dir { children }) => {
                let mut entries: Vec<_> = children
                    .iter()
                    .map(|child| DirEntryInfo {
                        path: child.clone(),
                        is_dir: matches!(
                            nodes.get(child),
                            Some(Node::Dir { .. })
                        ),
                    })
                    .collect();
                entries.sort_by(|a, b| a.path.cmp(&b.path));
                Ok(entries)
            }
            Some(Node::File) => Err(io::Error::new(
                io::ErrorKind::NotADirectory,
                format!("list_dir on file: {}", path.display()),
            )
            .into()),
            None => Err(io::Error::new(
                io::ErrorKind::NotFound,
                format!("list_dir on missing path: {}", path.display()),
            )
            .into()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn in_memory_lists_sorted_children() {
        let fs = InMemoryFs::new();
        fs.add_dir("/in/b");
        fs.add_file("/in/a.mkv");
        fs.add_dir("/in/b/nested");

        let entries = fs.list_dir(Path::new("/in")).await.unwrap();
        assert_eq!(
            entries,
            vec![
                DirEntryInfo {
                    path: "/in/a.mkv".into(),
                    is_dir: false
                },
                DirEntryInfo {
                    path: "/in/b".into(),
                    is_dir: true
                },
            ]
        );
        assert!(fs.is_dir(Path::new("/in/b/nested")).await);
        assert!(fs.list_dir(Path::new("/missing")).await.is_err());
    }

    #[tokio::test]
    async fn real_fs_marks_directories() {
        let tmp = tempfile::tempdir().unwrap();
        std::fs::create_dir(tmp.path().join("dir")).unwrap();
        std::fs::write(tmp.path().join("file.txt"), b"x").unwrap();

        let entries = RealFs::new().list_dir(tmp.path()).await.unwrap();
        assert_eq!(entries.len(), 2);
        assert!(entries.iter().any(|e| e.is_dir && e.path.ends_with("dir")));
        assert!(
            entries
                .iter()
                .any(|e| !e.is_dir && e.path.ends_with("file.txt"))
        );
    }
}
