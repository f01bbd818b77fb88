use std::fmt;

/// Identifier of a reference list; backed by `<id>.txt` on disk.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(transparent))]
pub struct ReferenceListId(String);

impl ReferenceListId {
    pub fn new(id: impl Into<String>) -> Self {
        let id = id.into();
        let trimmed = id.trim().trim_end_matches(".txt");
        ReferenceListId(trimmed.to_string())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn file_name(&self) -> String {
        format!("{}.txt", self.0)
    }
}

impl fmt::Display for ReferenceListId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// One known title parsed from a reference list.
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct ReferenceEntry {
    pub title: String,
    pub year: Option<u16>,
    pub external_id: Option<String>,
    pub list: ReferenceListId,
}

impl fmt::Display for ReferenceEntry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.title)?;
        if let Some(year) = self.year {
            write!(f, " ({year})")?;
        }
        if let Some(id) = &self.external_id {
            write!(f, " [tmdb-{id}]")?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn list_id_strips_extension() {
        let id = ReferenceListId::new("movies.txt");
        assert_eq!(id.as_str(), "movies");
        assert_eq!(id.file_name(), "movies.txt");
    }

    #[test]
    fn entry_display_matches_list_format() {
        let entry = ReferenceEntry {
            title: "Inception".into(),
            year: Some(2010),
            external_id: Some("27205".into()),
            list: ReferenceListId::new("movies"),
        };
        assert_eq!(entry.to_string(), "Inception (2010) [tmdb-27205]");
    }
}
