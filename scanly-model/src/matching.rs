use crate::category::MediaCategory;
use crate::ids::MatchRequestId;
use crate::reference::{ReferenceEntry, ReferenceListId};

/// A title lookup handed to the match workers.
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct MatchRequest {
    pub id: MatchRequestId,
    pub title: String,
    pub year: Option<u16>,
    pub category: MediaCategory,
}

impl MatchRequest {
    pub fn new(
        title: impl Into<String>,
        year: Option<u16>,
        category: MediaCategory,
    ) -> Self {
        Self::with_id(MatchRequestId::new(), title, year, category)
    }

    pub fn with_id(
        id: MatchRequestId,
        title: impl Into<String>,
        year: Option<u16>,
        category: MediaCategory,
    ) -> Self {
        Self {
            id,
            title: title.into(),
            year,
            category,
        }
    }
}

/// Scoring tier, ordered from weakest to strongest.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "snake_case"))]
pub enum MatchTier {
    Fuzzy,
    WordSubset,
    ExactTitle,
    ExactTitleYear,
}

#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct MatchCandidate {
    pub entry: ReferenceEntry,
    pub tier: MatchTier,
    /// Normalized similarity in `0.0..=1.0`; exact tiers report `1.0`.
    pub similarity: f64,
}

/// Ranked candidates for one [`MatchRequest`].
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct MatchResult {
    pub request_id: MatchRequestId,
    pub list: ReferenceListId,
    pub candidates: Vec<MatchCandidate>,
    /// Set when the reference list could not be read.
    pub error: Option<String>,
}

impl MatchResult {
    pub fn empty(request: &MatchRequest) -> Self {
        Self {
            request_id: request.id,
            list: request.category.reference_list(),
            candidates: Vec::new(),
            error: None,
        }
    }

    pub fn failed(request: &MatchRequest, error: impl Into<String>) -> Self {
        Self {
            error: Some(error.into()),
            ..Self::empty(request)
        }
    }

    pub fn top(&self) -> Option<&MatchCandidate> {
        self.candidates.first()
    }

    pub fn is_empty(&self) -> bool {
        self.candidates.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn tiers_order_weakest_first() {
        assert!(MatchTier::ExactTitleYear > MatchTier::ExactTitle);
        assert!(MatchTier::ExactTitle > MatchTier::WordSubset);
        assert!(MatchTier::WordSubset > MatchTier::Fuzzy);
    }

    #[test]
    fn failed_result_keeps_request_list() {
        let request = MatchRequest::new("Dune", None, MediaCategory::AnimeTv);
        let result = MatchResult::failed(&request, "boom");
        assert_eq!(result.list.as_str(), "anime_series");
        assert!(result.is_empty());
        assert_eq!(result.error.as_deref(), Some("boom"));
    }
}
