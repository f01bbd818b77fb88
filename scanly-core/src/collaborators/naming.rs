//! Release-name heuristics used as the default extractor and classifier.

use std::path::Path;

use once_cell::sync::Lazy;
use regex::Regex;

use super::{Classifier, TitleExtractor, TitleYear};
use crate::model::category::MediaCategory;

static BRACKET_GROUP_PATTERN: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"\[[^\]]*\]").expect("bracket group regex should compile")
});
static YEAR_PATTERN: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?:^|[\s(\[])((?:19|20)\d{2})(?:[\s)\]]|$)")
        .expect("year regex should compile")
});
static SEASON_MARKER_PATTERN: Lazy<Regex> = Lazy::new(|| {
    Regex::new(
        r"(?i)\b(?:S\d{1,2}(?:E\d{1,3})?|Season\s?\d{1,2}|Complete\s+Series|E\d{2,3})\b",
    )
    .expect("season marker regex should compile")
});
static RELEASE_TAG_PATTERN: Lazy<Regex> = Lazy::new(|| {
    Regex::new(
        r"(?i)\b(?:2160p|1080p|720p|576p|480p|4k|uhd|bluray|blu-ray|web-dl|webdl|webrip|hdtv|dvdrip|brrip|x264|x265|h264|h265|hevc|remux|repack|proper|extended|unrated)\b",
    )
    .expect("release tag regex should compile")
});
static COLLAPSE_WHITESPACE_PATTERN: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"\s+").expect("whitespace regex should compile")
});

const VIDEO_EXTENSIONS: &[&str] =
    &["mkv", "mp4", "avi", "m4v", "mov", "wmv", "ts", "webm"];

const ANIME_MARKERS: &[&str] = &[
    "anime",
    "horriblesubs",
    "subsplease",
    "erai-raws",
    "animejp",
    "judas",
];

/// Derives `Title (Year)` from scene-style folder and file names.
#[derive(Debug, Default, Clone, Copy)]
pub struct RegexTitleExtractor;

impl TitleExtractor for RegexTitleExtractor {
    fn extract_title_year(&self, name: &str) -> TitleYear {
        let stem = strip_video_extension(name);
        let without_groups = BRACKET_GROUP_PATTERN.replace_all(stem, " ");
        let spaced = without_groups.replace(['.', '_'], " ");

        let year_match = YEAR_PATTERN
            .captures_iter(&spaced)
            .filter_map(|caps| caps.get(1))
            .find(|m| m.start() > 0);
        let year = year_match.and_then(|m| m.as_str().parse::<u16>().ok());

        let mut cut = spaced.len();
        if let Some(m) = year_match {
            cut = cut.min(m.start());
        }
        if let Some(m) = SEASON_MARKER_PATTERN.find(&spaced) {
            cut = cut.min(m.start());
        }
        if let Some(m) = RELEASE_TAG_PATTERN.find(&spaced) {
            cut = cut.min(m.start());
        }

        let mut title = clean_title(&spaced[..cut]);
        if title.is_empty() {
            title = clean_title(&spaced);
        }

        TitleYear { title, year }
    }
}

fn strip_video_extension(name: &str) -> &str {
    match name.rsplit_once('.') {
        Some((stem, ext))
            if VIDEO_EXTENSIONS
                .iter()
                .any(|known| ext.eq_ignore_ascii_case(known)) =>
        {
            stem
        }
        _ => name,
    }
}

fn clean_title(raw: &str) -> String {
    let collapsed = COLLAPSE_WHITESPACE_PATTERN.replace_all(raw.trim(), " ");
    collapsed
        .trim_matches(|c: char| c == '-' || c == '(' || c.is_whitespace())
        .to_string()
}

/// Season markers mean TV; fansub-style bracket tags or anime release groups
/// mean anime.
#[derive(Debug, Default, Clone, Copy)]
pub struct KeywordClassifier;

impl Classifier for KeywordClassifier {
    fn classify(&self, name: &str, _path: &Path) -> MediaCategory {
        let spaced = name.replace(['.', '_'], " ");
        let is_tv = SEASON_MARKER_PATTERN.is_match(&spaced);

        let lower = name.to_ascii_lowercase();
        let bracket_groups = BRACKET_GROUP_PATTERN.find_iter(name).count();
        let is_anime = bracket_groups >= 2
            || (bracket_groups >= 1 && name.trim_start().starts_with('['))
            || ANIME_MARKERS.iter().any(|marker| lower.contains(marker));

        MediaCategory::from_flags(is_tv, is_anime)
    }
}
