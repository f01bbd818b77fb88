//! Lexical path helpers shared by the store, the watcher and link repair.

use std::env;
use std::ffi::OsStr;
use std::path::{Component, Path, PathBuf};

/// Make `path` absolute and fold `.` / `..` components without touching the
/// filesystem. Trailing separators disappear.
pub fn normalize_path(path: &Path) -> PathBuf {
    let absolute = if path.is_absolute() {
        path.to_path_buf()
    } else {
        env::current_dir()
            .unwrap_or_else(|_| PathBuf::from("/"))
            .join(path)
    };

    let mut normalized = PathBuf::new();
    for component in absolute.components() {
        match component {
            Component::Prefix(prefix) => normalized.push(prefix.as_os_str()),
            Component::RootDir => normalized.push(component.as_os_str()),
            Component::CurDir => {}
            Component::ParentDir => {
                normalized.pop();
            }
            Component::Normal(segment) => normalized.push(segment),
        }
    }
    normalized
}

pub fn is_hidden(name: &OsStr) -> bool {
    name.to_string_lossy().starts_with('.')
}

/// Resolve a link target the way the OS does: relative targets are taken
/// relative to the directory holding the link.
pub fn resolve_link_target(link: &Path, target: &Path) -> PathBuf {
    if target.is_absolute() {
        return normalize_path(target);
    }
    let base = link.parent().unwrap_or_else(|| Path::new("/"));
    normalize_path(&base.join(target))
}

/// Express `target` relative to `base_dir`. Both are normalized first.
pub fn relative_path(target: &Path, base_dir: &Path) -> PathBuf {
    let target = normalize_path(target);
    let base = normalize_path(base_dir);

    let target_parts: Vec<_> = target.components().collect();
    let base_parts: Vec<_> = base.components().collect();
    let common = target_parts
        .iter()
        .zip(base_parts.iter())
        .take_while(|(a, b)| a == b)
        .count();

    let mut relative = PathBuf::new();
    for _ in common..base_parts.len() {
        relative.push("..");
    }
    for part in &target_parts[common..] {
        relative.push(part.as_os_str());
    }
    if relative.as_os_str().is_empty() {
        relative.push(".");
    }
    relative
}
