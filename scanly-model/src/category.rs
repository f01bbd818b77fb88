use std::fmt;
use std::str::FromStr;

use crate::error::ModelError;
use crate::reference::ReferenceListId;

/// Library category an item is organized under.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "snake_case"))]
pub enum MediaCategory {
    Movie,
    Tv,
    AnimeMovie,
    AnimeTv,
}

impl MediaCategory {
    pub const ALL: [MediaCategory; 4] = [
        MediaCategory::Movie,
        MediaCategory::Tv,
        MediaCategory::AnimeMovie,
        MediaCategory::AnimeTv,
    ];

    pub fn from_flags(is_tv: bool, is_anime: bool) -> Self {
        match (is_tv, is_anime) {
            (true, true) => MediaCategory::AnimeTv,
            (true, false) => MediaCategory::Tv,
            (false, true) => MediaCategory::AnimeMovie,
            (false, false) => MediaCategory::Movie,
        }
    }

    pub fn is_tv(self) -> bool {
        matches!(self, MediaCategory::Tv | MediaCategory::AnimeTv)
    }

    pub fn is_anime(self) -> bool {
        matches!(self, MediaCategory::AnimeMovie | MediaCategory::AnimeTv)
    }

    pub fn as_str(self) -> &'static str {
        match self {
            MediaCategory::Movie => "movie",
            MediaCategory::Tv => "tv",
            MediaCategory::AnimeMovie => "anime_movie",
            MediaCategory::AnimeTv => "anime_tv",
        }
    }

    /// Reference list consulted when matching titles of this category.
    pub fn reference_list(self) -> ReferenceListId {
        let id = match self {
            MediaCategory::Movie => "movies",
            MediaCategory::Tv => "tv_series",
            MediaCategory::AnimeMovie => "anime_movies",
            MediaCategory::AnimeTv => "anime_series",
        };
        ReferenceListId::new(id)
    }

    /// Directory name used for this category inside the destination tree.
    pub fn library_dir(self) -> &'static str {
        match self {
            MediaCategory::Movie => "Movies",
            MediaCategory::Tv => "TV Shows",
            MediaCategory::AnimeMovie => "Anime Movies",
            MediaCategory::AnimeTv => "Anime Shows",
        }
    }
}

impl fmt::Display for MediaCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for MediaCategory {
    type Err = ModelError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().replace('-', "_").as_str() {
            "movie" | "movies" => Ok(MediaCategory::Movie),
            "tv" | "show" | "series" => Ok(MediaCategory::Tv),
            "anime_movie" => Ok(MediaCategory::AnimeMovie),
            "anime_tv" | "anime_series" => Ok(MediaCategory::AnimeTv),
            other => Err(ModelError::UnknownCategory(other.to_string())),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn categories_map_to_distinct_lists() {
        let lists: Vec<_> = MediaCategory::ALL
            .iter()
            .map(|category| category.reference_list())
            .collect();
        assert_eq!(lists[0].as_str(), "movies");
        assert_eq!(lists[1].as_str(), "tv_series");
        assert_eq!(lists[2].as_str(), "anime_movies");
        assert_eq!(lists[3].as_str(), "anime_series");
    }

    #[test]
    fn flags_pick_category() {
        assert_eq!(MediaCategory::from_flags(true, true), MediaCategory::AnimeTv);
        assert_eq!(MediaCategory::from_flags(false, false), MediaCategory::Movie);
        assert!(MediaCategory::AnimeTv.is_tv());
        assert!(!MediaCategory::AnimeMovie.is_tv());
    }

    #[test]
    fn parses_kebab_names() {
        assert_eq!(
            "anime-movie".parse::<MediaCategory>().unwrap(),
            MediaCategory::AnimeMovie
        );
        assert!("music".parse::<MediaCategory>().is_err());
    }
}
