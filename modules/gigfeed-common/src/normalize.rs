//! Text normalization shared by the dedup fingerprint, the curation
//! deny-list, and accent-insensitive city matching.

/// Fold common Latin diacritics to their ASCII base letter. Anything
/// outside the table passes through unchanged.
pub fn fold_diacritics(input: &str) -> String {
    input
        .chars()
        .map(|c| match c {
            'á' | 'à' | 'â' | 'ä' | 'ã' | 'å' => 'a',
            'é' | 'è' | 'ê' | 'ë' => 'e',
            'í' | 'ì' | 'î' | 'ï' => 'i',
            'ó' | 'ò' | 'ô' | 'ö' | 'õ' | 'ø' => 'o',
            'ú' | 'ù' | 'û' | 'ü' => 'u',
            'ñ' => 'n',
            'ç' => 'c',
            'ý' | 'ÿ' => 'y',
            'Á' | 'À' | 'Â' | 'Ä' | 'Ã' | 'Å' => 'A',
            'É' | 'È' | 'Ê' | 'Ë' => 'E',
            'Í' | 'Ì' | 'Î' | 'Ï' => 'I',
            'Ó' | 'Ò' | 'Ô' | 'Ö' | 'Õ' | 'Ø' => 'O',
            'Ú' | 'Ù' | 'Û' | 'Ü' => 'U',
            'Ñ' => 'N',
            'Ç' => 'C',
            other => other,
        })
        .collect()
}

/// Normalize a title for fingerprinting: fold diacritics, lowercase,
/// strip punctuation, collapse whitespace.
pub fn normalize_title(title: &str) -> String {
    fold_diacritics(title)
        .to_lowercase()
        .chars()
        .map(|c| if c.is_alphanumeric() { c } else { ' ' })
        .collect::<String>()
        .split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
}

/// Canonical key form of a city name.
pub fn fold_city(city: &str) -> String {
    normalize_title(city)
}

/// Filler words that carry no identity. "Jazz Night @ Blue Note" and
/// "Jazz Night at Blue Note" must compare equal.
const STOPWORDS: &[&str] = &[
    "a", "an", "the", "at", "in", "on", "of", "and", "with", "de", "la", "el", "y",
];

/// Tokens of a normalized title, for overlap similarity. Stopwords are
/// dropped unless the whole title is stopwords.
pub fn title_tokens(title: &str) -> Vec<String> {
    let all: Vec<String> = normalize_title(title)
        .split_whitespace()
        .map(str::to_string)
        .collect();
    let filtered: Vec<String> = all
        .iter()
        .filter(|t| !STOPWORDS.contains(&t.as_str()))
        .cloned()
        .collect();
    if filtered.is_empty() {
        all
    } else {
        filtered
    }
}

/// Token-overlap similarity (Jaccard) between two titles after
/// normalization. 1.0 for identical token sets, 0.0 for disjoint.
pub fn title_similarity(a: &str, b: &str) -> f64 {
    use std::collections::HashSet;

    let ta: HashSet<String> = title_tokens(a).into_iter().collect();
    let tb: HashSet<String> = title_tokens(b).into_iter().collect();
    if ta.is_empty() && tb.is_empty() {
        return 1.0;
    }
    if ta.is_empty() || tb.is_empty() {
        return 0.0;
    }
    let intersection = ta.intersection(&tb).count() as f64;
    let union = ta.union(&tb).count() as f64;
    intersection / union
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn folds_accents() {
        assert_eq!(fold_diacritics("Núñez"), "Nunez");
        assert_eq!(fold_diacritics("São Paulo"), "Sao Paulo");
        assert_eq!(fold_city("Núñez"), fold_city("Nunez"));
    }

    #[test]
    fn normalizes_punctuation_and_whitespace() {
        assert_eq!(
            normalize_title("Jazz Night @ Blue Note!!"),
            "jazz night blue note"
        );
        assert_eq!(normalize_title("  Two   Spaces "), "two spaces");
    }

    #[test]
    fn similarity_of_at_variants_is_high() {
        // "@" is stripped as punctuation and "at" as a stopword, so the
        // token sets are identical.
        let s = title_similarity("Jazz Night @ Blue Note", "Jazz Night at Blue Note");
        assert!(s >= 0.85, "similarity was {s}");
    }

    #[test]
    fn similarity_of_unrelated_titles_is_low() {
        let s = title_similarity("Jazz Night at Blue Note", "Metal Fest Arena Show");
        assert!(s < 0.2, "similarity was {s}");
    }

    #[test]
    fn empty_titles() {
        assert_eq!(title_similarity("", ""), 1.0);
        assert_eq!(title_similarity("something", "!!!"), 0.0);
    }
}
