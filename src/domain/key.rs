//! Citation keys
//!
//! Key Format: `{surname}{year}{titleword}{suffix}` (e.g., `muller2020quantum`)
//!
//! All parts are ASCII-transliterated, lowercased and stripped of anything
//! that is not alphanumeric. Missing parts are skipped. The suffix is empty
//! for the first work with a given base and `a`, `b`, ..., `z`, `aa`, `ab`, ...
//! for later ones.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

use super::metadata::RawMetadata;
use super::normalize::key_token;

#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum KeyError {
    #[error("Invalid citation key: '{0}' (expected lowercase ASCII letters and digits)")]
    Invalid(String),
}

const STOPWORDS: &[&str] = &[
    "a", "an", "the", "on", "in", "of", "for", "to", "and", "with", "by", "from", "as", "at",
    "is", "are", "was", "were", "be", "its", "into", "via", "towards", "toward",
];

/// Human-readable identifier of a record within a library
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct CitationKey(String);

impl CitationKey {
    /// Derives the base key (no disambiguation suffix) for `meta`
    pub fn base_for(meta: &RawMetadata) -> Self {
        let surname = meta
            .first_author()
            .map(|a| key_token(&a.family))
            .unwrap_or_default();
        let year = meta
            .year
            .map(|y| key_token(&y.to_string()))
            .unwrap_or_default();
        let word = meta
            .title()
            .and_then(first_significant_word)
            .unwrap_or_default();

        let prefix = if surname.is_empty() { "anon".to_string() } else { surname };
        Self(format!("{}{}{}", prefix, year, word))
    }

    /// Returns this key with the `n`th suffix appended (`n = 0` is `a`)
    pub fn with_suffix(&self, n: usize) -> Self {
        Self(format!("{}{}", self.0, suffix(n)))
    }

    /// Candidate keys in order: the base key, then base+a, base+b, ...
    pub fn candidates(&self) -> impl Iterator<Item = CitationKey> + '_ {
        std::iter::once(self.clone()).chain((0..).map(|n| self.with_suffix(n)))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

/// Bijective base-26 suffix: 0 -> a, 25 -> z, 26 -> aa, 27 -> ab, ...
fn suffix(mut n: usize) -> String {
    let mut letters = Vec::new();
    loop {
        letters.push(b'a' + (n % 26) as u8);
        if n < 26 {
            break;
        }
        n = n / 26 - 1;
    }
    letters.reverse();
    String::from_utf8(letters).unwrap_or_default()
}

/// First title word that is not a stopword, falling back to the first word
fn first_significant_word(title: &str) -> Option<String> {
    let words: Vec<String> = title
        .split(|c: char| c.is_whitespace() || c == '-' || c == '/')
        .map(key_token)
        .filter(|w| !w.is_empty())
        .collect();

    words
        .iter()
        .find(|w| !STOPWORDS.contains(&w.as_str()))
        .or_else(|| words.first())
        .cloned()
}

impl fmt::Display for CitationKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl FromStr for CitationKey {
    type Err = KeyError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        if s.is_empty() || !s.chars().all(|c| c.is_ascii_lowercase() || c.is_ascii_digit()) {
            return Err(KeyError::Invalid(s.to_string()));
        }
        Ok(Self(s.to_string()))
    }
}

impl TryFrom<String> for CitationKey {
    type Error = KeyError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<CitationKey> for String {
    fn from(key: CitationKey) -> Self {
        key.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::metadata::{Author, WorkKind};
    use proptest::prelude::*;

    fn meta(author: Option<&str>, year: Option<i32>, title: Option<&str>) -> RawMetadata {
        let mut meta = RawMetadata::new("10.1000/xyz123".parse().unwrap(), WorkKind::JournalArticle);
        meta.authors = author.map(|a| vec![Author::new(None, a)]).unwrap_or_default();
        meta.year = year;
        meta.title = title.map(str::to_string);
        meta
    }

    #[test]
    fn base_key_from_author_year_title() {
        let key = CitationKey::base_for(&meta(Some("Müller"), Some(2020), Some("Quantum Foo")));
        assert_eq!(key.as_str(), "muller2020quantum");
    }

    #[test]
    fn base_key_skips_stopwords() {
        let key = CitationKey::base_for(&meta(Some("Doe"), Some(2023), Some("The Future of AI")));
        assert_eq!(key.as_str(), "doe2023future");

        let key = CitationKey::base_for(&meta(Some("Doe"), Some(2023), Some("On the")));
        assert_eq!(key.as_str(), "doe2023on");
    }

    #[test]
    fn base_key_strips_punctuation() {
        let key = CitationKey::base_for(&meta(
            Some("O'Brien"),
            Some(1999),
            Some("\"Self-Assembly\" in water"),
        ));
        assert_eq!(key.as_str(), "obrien1999self");
    }

    #[test]
    fn base_key_with_missing_parts() {
        let key = CitationKey::base_for(&meta(None, Some(2001), Some("Anonymous Work")));
        assert_eq!(key.as_str(), "anon2001anonymous");

        let key = CitationKey::base_for(&meta(Some("Smith"), None, None));
        assert_eq!(key.as_str(), "smith");
    }

    #[test]
    fn base_key_drops_sign_of_negative_year() {
        let key = CitationKey::base_for(&meta(Some("Caesar"), Some(-44), Some("Commentarii")));
        assert_eq!(key.as_str(), "caesar44commentarii");
        assert!(key.as_str().parse::<CitationKey>().is_ok());
    }

    #[test]
    fn suffix_sequence() {
        assert_eq!(suffix(0), "a");
        assert_eq!(suffix(1), "b");
        assert_eq!(suffix(25), "z");
        assert_eq!(suffix(26), "aa");
        assert_eq!(suffix(27), "ab");
        assert_eq!(suffix(51), "az");
        assert_eq!(suffix(52), "ba");
        assert_eq!(suffix(701), "zz");
        assert_eq!(suffix(702), "aaa");
    }

    #[test]
    fn candidates_start_with_base() {
        let base: CitationKey = "smith2024".parse().unwrap();
        let first: Vec<String> = base.candidates().take(3).map(String::from).collect();
        assert_eq!(first, vec!["smith2024", "smith2024a", "smith2024b"]);
    }

    #[test]
    fn parse_rejects_invalid_keys() {
        assert!("Smith2024".parse::<CitationKey>().is_err());
        assert!("smith-2024".parse::<CitationKey>().is_err());
        assert!("".parse::<CitationKey>().is_err());
        assert!("smith2024a".parse::<CitationKey>().is_ok());
    }

    proptest! {
        #[test]
        fn derived_keys_are_valid(author in "\\PC{0,20}", title in "\\PC{0,40}", year in any::<i32>()) {
            let key = CitationKey::base_for(&meta(Some(&author), Some(year), Some(&title)));
            prop_assert!(key.as_str().parse::<CitationKey>().is_ok());
        }

        #[test]
        fn suffixes_are_distinct(a in 0usize..5000, b in 0usize..5000) {
            prop_assume!(a != b);
            prop_assert_ne!(suffix(a), suffix(b));
        }
    }
}
