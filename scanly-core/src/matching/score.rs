use std::cmp::Reverse;

use ordered_float::OrderedFloat;
use rapidfuzz::distance::levenshtein;

use super::normalize::{normalize_title, word_set};
use crate::model::matching::{MatchCandidate, MatchTier};
use crate::model::reference::ReferenceEntry;

/// Similarity strictly above this counts as a fuzzy match.
pub const FUZZY_THRESHOLD: f64 = 0.8;

/// Normalized Levenshtein similarity in `0.0..=1.0`.
pub fn similarity(a: &str, b: &str) -> f64 {
    if a.is_empty() && b.is_empty() {
        return 1.0;
    }
    levenshtein::normalized_similarity(a.chars(), b.chars())
}

/// Tier and similarity of one entry against a normalized query, or `None`
/// when the entry does not match at all.
pub fn score_entry(
    query: &str,
    year: Option<u16>,
    entry: &ReferenceEntry,
) -> Option<(MatchTier, f64)> {
    let candidate = normalize_title(&entry.title);
    if query.is_empty() || candidate.is_empty() {
        return None;
    }

    if query == candidate {
        let tier = if year == entry.year {
            MatchTier::ExactTitleYear
        } else {
            MatchTier::ExactTitle
        };
        return Some((tier, 1.0));
    }

    // Two known, different years rule out every weaker tier.
    if let (Some(wanted), Some(listed)) = (year, entry.year)
        && wanted != listed
    {
        return None;
    }

    let score = similarity(query, &candidate);
    let query_words = word_set(query);
    let candidate_words = word_set(&candidate);
    let (smaller, larger) = if query_words.len() <= candidate_words.len() {
        (&query_words, &candidate_words)
    } else {
        (&candidate_words, &query_words)
    };
    if !smaller.is_empty() && smaller.is_subset(larger) {
        return Some((MatchTier::WordSubset, score));
    }

    (score > FUZZY_THRESHOLD).then_some((MatchTier::Fuzzy, score))
}

/// Score every entry and order the matches strongest first. Equal
/// `(tier, similarity)` pairs keep list order.
pub fn rank_candidates(
    title: &str,
    year: Option<u16>,
    entries: &[ReferenceEntry],
) -> Vec<MatchCandidate> {
    let query = normalize_title(title);
    let mut candidates: Vec<MatchCandidate> = entries
        .iter()
        .filter_map(|entry| {
            score_entry(&query, year, entry).map(|(tier, similarity)| MatchCandidate {
                entry: entry.clone(),
                tier,
                similarity,
            })
        })
        .collect();
    candidates.sort_by_key(|candidate| {
        Reverse((candidate.tier, OrderedFloat(candidate.similarity)))
    });
    candidates
}
