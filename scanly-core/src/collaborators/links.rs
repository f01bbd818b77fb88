use std::path::{Path, PathBuf};

use async_trait::async_trait;
use tracing::{debug, warn};

use super::{LinkCreator, LinkRequest};
use crate::error::Result;
use crate::fs::create_symlink;
use crate::paths::{is_hidden, normalize_path, relative_path, resolve_link_target};

const VIDEO_EXTENSIONS: &[&str] =
    &["mkv", "mp4", "avi", "m4v", "mov", "wmv", "ts", "webm"];

/// Links every video file under the source into
/// `<destination>/<library dir>/<Title (Year) [tmdb-ID]>/`, keeping the
/// layout below the source (season folders and the like).
#[derive(Debug, Clone)]
pub struct SymlinkLinkCreator {
    destination: PathBuf,
    relative: bool,
}

impl SymlinkLinkCreator {
    pub fn new(destination: impl Into<PathBuf>, relative: bool) -> Self {
        Self {
            destination: destination.into(),
            relative,
        }
    }

    pub fn destination(&self) -> &Path {
        &self.destination
    }

    /// Folder the item's links land in.
    pub fn item_dir(&self, request: &LinkRequest) -> PathBuf {
        let mut folder = sanitize_component(&request.title);
        if let Some(year) = request.year {
            folder.push_str(&format!(" ({year})"));
        }
        if let Some(id) = &request.external_id {
            folder.push_str(&format!(" [tmdb-{id}]"));
        }
        self.destination
            .join(request.category.library_dir())
            .join(folder)
    }

    async fn link_one(&self, source_file: &Path, link: &Path) -> Result<bool> {
        if let Some(parent) = link.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }

        let target = if self.relative {
            let base = link.parent().unwrap_or_else(|| Path::new("/"));
            relative_path(source_file, base)
        } else {
            source_file.to_path_buf()
        };

        match tokio::fs::read_link(link).await {
            Ok(existing) => {
                let resolved = resolve_link_target(link, &existing);
                if resolved == normalize_path(source_file) {
                    debug!(link = %link.display(), "link already in place");
                    return Ok(true);
                }
                warn!(
                    link = %link.display(),
                    existing = %existing.display(),
                    "refusing to replace link pointing elsewhere"
                );
                return Ok(false);
            }
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => {}
            Err(err) => {
                // Something that is not a symlink occupies the slot.
                warn!(link = %link.display(), error = %err, "link slot occupied");
                return Ok(false);
            }
        }

        create_symlink(&target, link).await?;
        debug!(
            link = %link.display(),
            target = %target.display(),
            "created link"
        );
        Ok(true)
    }
}

#[async_trait]
impl LinkCreator for SymlinkLinkCreator {
    async fn create_links(&self, request: &LinkRequest) -> Result<bool> {
        let source = normalize_path(&request.source);
        let item_dir = self.item_dir(request);
        let files = collect_video_files(&source).await?;
        if files.is_empty() {
            debug!(source = %source.display(), "no video files to link");
            return Ok(false);
        }

        let mut linked = 0usize;
        for file in &files {
            let relative = if file == &source {
                file.file_name().map(PathBuf::from).unwrap_or_default()
            } else {
                file.strip_prefix(&source)
                    .map(Path::to_path_buf)
                    .unwrap_or_default()
            };
            if relative.as_os_str().is_empty() {
                continue;
            }
            if self.link_one(file, &item_dir.join(&relative)).await? {
                linked += 1;
            }
        }
        Ok(linked > 0)
    }
}

pub fn is_video_file(path: &Path) -> bool {
    path.extension()
        .and_then(|ext| ext.to_str())
        .is_some_and(|ext| {
            VIDEO_EXTENSIONS
                .iter()
                .any(|known| ext.eq_ignore_ascii_case(known))
        })
}

async fn collect_video_files(source: &Path) -> Result<Vec<PathBuf>> {
    let metadata = tokio::fs::metadata(source).await?;
    if metadata.is_file() {
        return Ok(if is_video_file(source) {
            vec![source.to_path_buf()]
        } else {
            Vec::new()
        });
    }

    let mut files = Vec::new();
    let mut stack = vec![source.to_path_buf()];
    while let Some(dir) = stack.pop() {
        let mut reader = tokio::fs::read_dir(&dir).await?;
        while let Some(entry) = reader.next_entry().await? {
            if is_hidden(&entry.file_name()) {
                continue;
            }
            let path = entry.path();
            let file_type = entry.file_type().await?;
            if file_type.is_dir() {
                stack.push(path);
            } else if is_video_file(&path) {
                files.push(path);
            }
        }
    }
    files.sort();
    Ok(files)
}

fn sanitize_component(title: &str) -> String {
    title
        .chars()
        .map(|c| match c {
            '/' | '\\' | ':' | '\0' => ' ',
            other => other,
        })
        .collect::<String>()
        .trim()
        .to_string()
}

#[cfg(all(test, unix))]
mod tests {
    use super::*;
    use crate::model::category::MediaCategory;

    fn request(source: &Path) -> LinkRequest {
        LinkRequest {
            source: source.to_path_buf(),
            title: "Inception".into(),
            year: Some(2010),
            category: MediaCategory::Movie,
            external_id: Some("27205".into()),
        }
    }

    #[tokio::test]
    async fn links_video_files_into_category_layout() {
        let tmp = tempfile::tempdir().unwrap();
        let source = tmp.path().join("in/Inception.2010.1080p");
        std::fs::create_dir_all(&source).unwrap();
        std::fs::write(source.join("movie.mkv"), b"x").unwrap();
        std::fs::write(source.join("notes.nfo"), b"x").unwrap();

        let creator = SymlinkLinkCreator::new(tmp.path().join("lib"), false);
        assert!(creator.create_links(&request(&source)).await.unwrap());

        let link = tmp
            .path()
            .join("lib/Movies/Inception (2010) [tmdb-27205]/movie.mkv");
        assert_eq!(std::fs::read_link(&link).unwrap(), source.join("movie.mkv"));
        assert!(
            !tmp.path()
                .join("lib/Movies/Inception (2010) [tmdb-27205]/notes.nfo")
                .exists()
        );

        // Second run finds the identical link and still reports success.
        assert!(creator.create_links(&request(&source)).await.unwrap());
    }

    #[tokio::test]
    async fn relative_mode_writes_relative_targets() {
        let tmp = tempfile::tempdir().unwrap();
        let source = tmp.path().join("in/Inception");
        std::fs::create_dir_all(&source).unwrap();
        std::fs::write(source.join("movie.mkv"), b"x").unwrap();

        let creator = SymlinkLinkCreator::new(tmp.path().join("lib"), true);
        assert!(creator.create_links(&request(&source)).await.unwrap());

        let link = tmp
            .path()
            .join("lib/Movies/Inception (2010) [tmdb-27205]/movie.mkv");
        let target = std::fs::read_link(&link).unwrap();
        assert!(target.is_relative());
        assert!(std::fs::metadata(&link).is_ok());
    }

    #[tokio::test]
    async fn nothing_to_link_reports_false() {
        let tmp = tempfile::tempdir().unwrap();
        let source = tmp.path().join("in/Empty");
        std::fs::create_dir_all(&source).unwrap();

        let creator = SymlinkLinkCreator::new(tmp.path().join("lib"), false);
        assert!(!creator.create_links(&request(&source)).await.unwrap());
    }
}
