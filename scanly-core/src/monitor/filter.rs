use std::collections::HashSet;
use std::path::{Path, PathBuf};

use crate::paths::{is_hidden, normalize_path};

/// Decides whether a path is a new top-level item of one root.
#[derive(Debug, Clone)]
pub struct CandidateFilter {
    root: PathBuf,
    excluded: HashSet<String>,
}

impl CandidateFilter {
    pub fn new(root: &Path, excluded_names: &[String]) -> Self {
        Self {
            root: normalize_path(root),
            excluded: excluded_names.iter().cloned().collect(),
        }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Returns the normalized path when it sits directly under the root and
    /// is neither hidden nor excluded.
    pub fn accept(&self, path: &Path) -> Option<PathBuf> {
        let normalized = normalize_path(path);
        if normalized.parent() != Some(self.root.as_path()) {
            return None;
        }
        let name = normalized.file_name()?;
        if is_hidden(name) {
            return None;
        }
        if self.excluded.contains(name.to_string_lossy().as_ref()) {
            return None;
        }
        Some(normalized)
    }
}
