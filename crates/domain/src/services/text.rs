//! Text normalization shared by the message analyzers.
//!
//! Customers write with and without accents, with typographic apostrophes and
//! with arbitrary punctuation. Every analyzer works on the normalized form so
//! that keyword lists can be written once.

/// Lowercases, folds French accents, turns every separator (including
/// apostrophes and hyphens) into a single space and isolates `?` as a token.
pub fn normalize(text: &str) -> String {
    let mut out = String::with_capacity(text.len());

    for c in text.chars().flat_map(char::to_lowercase) {
        match fold_char(c) {
            '?' => out.push_str(" ? "),
            folded if folded.is_alphanumeric() => out.push(folded),
            _ => out.push(' '),
        }
    }

    out.split_whitespace().collect::<Vec<_>>().join(" ")
}

fn fold_char(c: char) -> char {
    match c {
        'à' | 'â' | 'ä' | 'á' | 'ã' => 'a',
        'é' | 'è' | 'ê' | 'ë' => 'e',
        'î' | 'ï' | 'í' => 'i',
        'ô' | 'ö' | 'ó' | 'õ' => 'o',
        'ù' | 'û' | 'ü' | 'ú' => 'u',
        'ç' => 'c',
        'ÿ' => 'y',
        'ñ' => 'n',
        'œ' => 'o',
        _ => c,
    }
}

/// Splits normalized text into tokens.
pub fn tokens(normalized: &str) -> Vec<&str> {
    normalized.split(' ').filter(|t| !t.is_empty()).collect()
}

/// Whether `phrase` (normalized) appears in `normalized` on token boundaries.
pub fn contains_phrase(normalized: &str, phrase: &str) -> bool {
    if phrase.is_empty() {
        return false;
    }
    let haystack = format!(" {} ", normalized);
    let needle = format!(" {} ", phrase);
    haystack.contains(&needle)
}

/// Whether `normalized` begins with `phrase` on a token boundary.
pub fn starts_with_phrase(normalized: &str, phrase: &str) -> bool {
    if phrase.is_empty() {
        return false;
    }
    normalized == phrase || normalized.starts_with(&format!("{} ", phrase))
}

/// Normalizes a keyword list once so it can be compared with normalized text.
pub fn normalize_all(phrases: &[&str]) -> Vec<String> {
    phrases
        .iter()
        .map(|p| normalize(p))
        .filter(|p| !p.is_empty())
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_normalize_folds_accents_and_case() {
        assert_eq!(normalize("Ça M'INTÉRESSE pas"), "ca m interesse pas");
        assert_eq!(normalize("Crème   brûlée"), "creme brulee");
    }

    #[test]
    fn test_normalize_typographic_apostrophe_and_hyphen() {
        assert_eq!(normalize("J’achète l’huile"), "j achete l huile");
        assert_eq!(normalize("Est-ce que"), "est ce que");
    }

    #[test]
    fn test_normalize_isolates_question_mark() {
        assert_eq!(normalize("C'est combien?"), "c est combien ?");
        assert_eq!(normalize("Prix ??"), "prix ? ?");
    }

    #[test]
    fn test_normalize_drops_punctuation_and_emoji() {
        assert_eq!(normalize("Bonjour!!! 😀 2x savons, svp."), "bonjour 2x savons svp");
        assert_eq!(normalize("   "), "");
    }

    #[test]
    fn test_contains_phrase_respects_boundaries() {
        let text = normalize("je ne veux pas de nonchalance");
        assert!(contains_phrase(&text, "je ne veux pas"));
        assert!(!contains_phrase(&text, "non"));
        assert!(!contains_phrase(&text, ""));
    }

    #[test]
    fn test_starts_with_phrase() {
        assert!(starts_with_phrase("non merci", "non"));
        assert!(starts_with_phrase("non", "non"));
        assert!(!starts_with_phrase("nonante", "non"));
        assert!(!starts_with_phrase("oui non", "non"));
    }
}
