use once_cell::sync::Lazy;
use regex::Regex;
use tracing::debug;

use crate::model::reference::{ReferenceEntry, ReferenceListId};

/// `Title (Year) [tmdb-ID]` with year and id optional. `[movie:ID]` and a
/// bare `[ID]` are accepted for the id.
static ENTRY_PATTERN: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^(.+?)(?:\s+\((\d{4})\))?(?:\s+\[(?:tmdb-|movie:)?(\d+)\])?\s*$")
        .expect("reference entry regex should compile")
});

/// Parse one line. Comments, blank lines and malformed entries yield `None`.
pub fn parse_line(line: &str, list: &ReferenceListId) -> Option<ReferenceEntry> {
    let line = line.trim();
    if line.is_empty() || line.starts_with('#') {
        return None;
    }
    if line.contains("[Error]") {
        debug!(list = %list, line, "skipping error marker");
        return None;
    }

    let Some(caps) = ENTRY_PATTERN.captures(line) else {
        debug!(list = %list, line, "skipping malformed reference line");
        return None;
    };
    let title = caps.get(1).map(|m| m.as_str().trim()).unwrap_or_default();
    if title.is_empty() {
        debug!(list = %list, line, "skipping reference line without title");
        return None;
    }

    Some(ReferenceEntry {
        title: title.to_string(),
        year: caps.get(2).and_then(|m| m.as_str().parse().ok()),
        external_id: caps.get(3).map(|m| m.as_str().to_string()),
        list: list.clone(),
    })
}

pub fn parse_list(contents: &str, list: &ReferenceListId) -> Vec<ReferenceEntry> {
    contents
        .lines()
        .filter_map(|line| parse_line(line, list))
        .collect()
}

/// Render an entry in the canonical list format.
pub fn format_entry(title: &str, year: Option<u16>, external_id: Option<&str>) -> String {
    let mut line = title.trim().to_string();
    if let Some(year) = year {
        line.push_str(&format!(" ({year})"));
    }
    if let Some(id) = external_id {
        line.push_str(&format!(" [tmdb-{id}]"));
    }
    line
}

#[cfg(test)]
mod tests {
    use super::*;

    fn list() -> ReferenceListId {
        ReferenceListId::new("movies")
    }

    #[test]
    fn parses_full_entry() {
        let entry = parse_line("Inception (2010) [tmdb-27205]", &list()).unwrap();
        assert_eq!(entry.title, "Inception");
        assert_eq!(entry.year, Some(2010));
        assert_eq!(entry.external_id.as_deref(), Some("27205"));
    }

    #[test]
    fn year_and_id_are_optional() {
        let entry = parse_line("Heat", &list()).unwrap();
        assert_eq!((entry.year, entry.external_id), (None, None));

        let entry = parse_line("Heat (1995)", &list()).unwrap();
        assert_eq!(entry.year, Some(1995));
        assert_eq!(entry.external_id, None);
    }

    #[test]
    fn accepts_alternate_id_forms() {
        let entry = parse_line("Alien (1979) [movie:348]", &list()).unwrap();
        assert_eq!(entry.external_id.as_deref(), Some("348"));
        let entry = parse_line("Alien [348]", &list()).unwrap();
        assert_eq!(entry.title, "Alien");
        assert_eq!(entry.external_id.as_deref(), Some("348"));
    }

    #[test]
    fn keeps_parentheses_inside_titles() {
        let entry = parse_line("Up (Director's Cut) (2009)", &list()).unwrap();
        assert_eq!(entry.title, "Up (Director's Cut)");
        assert_eq!(entry.year, Some(2009));
    }

    #[test]
    fn skips_comments_blanks_and_errors() {
        let contents = "# header\n\n[Error] lookup failed\nHeat (1995)\n   \n";
        let entries = parse_list(contents, &list());
        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].title, "Heat");
    }

    #[test]
    fn format_matches_parse() {
        let line = format_entry("Inception", Some(2010), Some("27205"));
        assert_eq!(line, "Inception (2010) [tmdb-27205]");
        assert_eq!(format_entry("Heat", None, None), "Heat");
    }
}
