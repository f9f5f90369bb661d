// 🔤 Name Normalizer - Canonical keys for identity comparison
//
// "HON. JOHN MWANGI", "Dr. John Mwangi" and "John  Mwangi (MP)" all collapse
// to the same key: "JOHN MWANGI". An empty key means "unmatchable".

use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};

static PARENTHETICAL: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\([^()]*\)").expect("parenthetical pattern is valid"));

/// Honorifics stripped by default. Multi-word titles are written with spaces.
pub const DEFAULT_HONORIFICS: [&str; 11] = [
    "HON", "DR", "PROF", "MR", "MRS", "MS", "ENG", "AMB", "CPA", "COL RTD", "SEN",
];

// ============================================================================
// NAME NORMALIZER
// ============================================================================

/// Turns raw display names into comparable keys.
///
/// Titles are matched as whole tokens, case-insensitively, with an optional
/// trailing period. "DRAKE" keeps its "DR".
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NameNormalizer {
    /// Each honorific as a sequence of uppercase tokens, without periods
    honorifics: Vec<Vec<String>>,
}

impl NameNormalizer {
    /// Create normalizer with the default honorific table
    pub fn new() -> Self {
        Self::with_honorifics(DEFAULT_HONORIFICS.iter().copied())
    }

    /// Create normalizer with a custom honorific table
    pub fn with_honorifics<I, S>(honorifics: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let mut table: Vec<Vec<String>> = honorifics
            .into_iter()
            .map(|h| {
                h.as_ref()
                    .split_whitespace()
                    .map(|t| t.trim_end_matches('.').to_uppercase())
                    .filter(|t| !t.is_empty())
                    .collect::<Vec<_>>()
            })
            .filter(|tokens| !tokens.is_empty())
            .collect();

        // Longest first so "COL RTD" wins over a bare "COL"
        table.sort_by(|a, b| b.len().cmp(&a.len()).then_with(|| a.cmp(b)));
        table.dedup();

        NameNormalizer { honorifics: table }
    }

    /// Canonicalize a raw display name.
    ///
    /// Uppercase → drop parenthetical groups → commas become spaces →
    /// strip honorific tokens → collapse whitespace.
    pub fn normalize(&self, raw_name: &str) -> String {
        let mut name = raw_name.to_uppercase();

        // Innermost groups first so nested parentheses disappear completely
        while PARENTHETICAL.is_match(&name) {
            name = PARENTHETICAL.replace_all(&name, " ").into_owned();
        }

        let name = name.replace(',', " ");
        let tokens: Vec<&str> = name.split_whitespace().collect();

        let mut kept: Vec<&str> = Vec::with_capacity(tokens.len());
        let mut i = 0;
        while i < tokens.len() {
            match self.honorific_len_at(&tokens[i..]) {
                Some(len) => i += len,
                None => {
                    kept.push(tokens[i]);
                    i += 1;
                }
            }
        }

        kept.join(" ")
    }

    /// Number of tokens consumed if an honorific starts at `tokens[0]`
    fn honorific_len_at(&self, tokens: &[&str]) -> Option<usize> {
        self.honorifics.iter().find_map(|title| {
            if title.len() > tokens.len() {
                return None;
            }
            let all_match = title
                .iter()
                .zip(tokens)
                .all(|(t, token)| strip_one_period(token) == t);
            if all_match {
                Some(title.len())
            } else {
                None
            }
        })
    }

    pub fn honorific_count(&self) -> usize {
        self.honorifics.len()
    }
}

impl Default for NameNormalizer {
    fn default() -> Self {
        Self::new()
    }
}

fn strip_one_period(token: &str) -> &str {
    token.strip_suffix('.').unwrap_or(token)
}

// ============================================================================
// HELPER FUNCTIONS
// ============================================================================

/// Normalize with the default honorific table
pub fn normalize_name(raw_name: &str) -> String {
    static DEFAULT: Lazy<NameNormalizer> = Lazy::new(NameNormalizer::new);
    DEFAULT.normalize(raw_name)
}

/// Key for sub-region / county lookups: uppercase, trimmed, single-spaced
pub fn normalize_region(raw_region: &str) -> String {
    raw_region
        .split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
        .to_uppercase()
}

/// Split a normalized key into tokens longer than `min_len` characters
pub fn discriminative_tokens(key: &str, min_len: usize) -> Vec<&str> {
    key.split(' ')
        .filter(|t| t.chars().count() > min_len)
        .collect()
}

// ============================================================================
// TESTS
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_strips_titles_and_case() {
        assert_eq!(normalize_name("HON. JOHN MWANGI"), "JOHN MWANGI");
        assert_eq!(normalize_name("Dr. John Mwangi"), "JOHN MWANGI");
        assert_eq!(normalize_name("prof mary wanjiru"), "MARY WANJIRU");
        assert_eq!(normalize_name("Hon. Dr. Eng. Peter Kamau"), "PETER KAMAU");
    }

    #[test]
    fn test_multi_token_title() {
        assert_eq!(normalize_name("Col. Rtd. James Omondi"), "JAMES OMONDI");
        assert_eq!(normalize_name("COL RTD JAMES OMONDI"), "JAMES OMONDI");
    }

    #[test]
    fn test_keeps_titles_embedded_in_words() {
        assert_eq!(normalize_name("Drake Honest"), "DRAKE HONEST");
        assert_eq!(normalize_name("Mrsa Amber"), "MRSA AMBER");
        assert_eq!(normalize_name("Engineer Msafiri"), "ENGINEER MSAFIRI");
    }

    #[test]
    fn test_removes_parentheticals_and_commas() {
        assert_eq!(normalize_name("Mwangi, John (MP)"), "MWANGI JOHN");
        assert_eq!(normalize_name("John (Johnny) Mwangi (ODM)"), "JOHN MWANGI");
        assert_eq!(normalize_name("John (a (b) c) Mwangi"), "JOHN MWANGI");
    }

    #[test]
    fn test_collapses_whitespace() {
        assert_eq!(normalize_name("  John\t\n  Mwangi  "), "JOHN MWANGI");
    }

    #[test]
    fn test_empty_input_is_unmatchable() {
        assert_eq!(normalize_name(""), "");
        assert_eq!(normalize_name("   "), "");
        assert_eq!(normalize_name("Hon."), "");
        assert_eq!(normalize_name("(vacant)"), "");
    }

    #[test]
    fn test_idempotent() {
        for raw in [
            "HON. JOHN MWANGI",
            "Mwangi, John (MP)",
            "A (X) B (Y)",
            "Col. Rtd. James  Omondi",
            "Ms. Amina Hassan, CPA",
        ] {
            let once = normalize_name(raw);
            assert_eq!(normalize_name(&once), once, "not idempotent for {:?}", raw);
        }
    }

    #[test]
    fn test_custom_honorifics() {
        let normalizer = NameNormalizer::with_honorifics(["Bishop", "Rev."]);
        assert_eq!(normalizer.normalize("Bishop Rev. Jane Doe"), "JANE DOE");
        // Default titles are not active on a custom table
        assert_eq!(normalizer.normalize("Dr. Jane Doe"), "DR. JANE DOE");
        assert_eq!(normalizer.honorific_count(), 2);
    }

    #[test]
    fn test_normalize_region() {
        assert_eq!(normalize_region("  Dagoretti   North "), "DAGORETTI NORTH");
        assert_eq!(normalize_region(""), "");
    }

    #[test]
    fn test_discriminative_tokens() {
        assert_eq!(
            discriminative_tokens("J OUMA PETER KAMAU", 3),
            vec!["OUMA", "PETER", "KAMAU"]
        );
        assert!(discriminative_tokens("J M ODM", 3).is_empty());
    }
}
