use std::collections::HashSet;

/// Lowercase, drop punctuation and collapse whitespace.
pub fn normalize_title(title: &str) -> String {
    let cleaned: String = title
        .chars()
        .flat_map(char::to_lowercase)
        .filter(|c| c.is_alphanumeric() || c.is_whitespace() || *c == '_')
        .collect();
    cleaned.split_whitespace().collect::<Vec<_>>().join(" ")
}

pub fn word_set(normalized: &str) -> HashSet<&str> {
    normalized.split_whitespace().collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn strips_punctuation_and_case() {
        assert_eq!(
            normalize_title("  The Lord of the Rings: The Two Towers "),
            "the lord of the rings the two towers"
        );
        assert_eq!(normalize_title("Spider-Man"), "spiderman");
        assert_eq!(normalize_title("Amélie"), "amélie");
    }

    #[test]
    fn word_sets_ignore_repeats() {
        let set = word_set("the the office");
        assert_eq!(set.len(), 2);
    }
}
