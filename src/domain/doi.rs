//! Digital Object Identifiers
//!
//! DOI Format: `10.{registrant}/{suffix}` (e.g., `10.1000/xyz123`)
//!
//! - Registrant: 4-9 digits, optionally followed by `.digits` subdivisions
//! - Suffix: any non-empty run of non-whitespace characters
//!
//! Input may carry a `doi:` prefix or a resolver URL (`https://doi.org/...`),
//! which is stripped before validation. DOIs are case-insensitive, so equality
//! and hashing ignore ASCII case while display keeps the original spelling.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::hash::{Hash, Hasher};
use std::str::FromStr;
use thiserror::Error;

#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum DoiError {
    #[error("Invalid DOI: expected '10.{{registrant}}/{{suffix}}', got '{0}'")]
    Malformed(String),

    #[error("Invalid DOI: empty input")]
    Empty,
}

const URL_PREFIXES: &[&str] = &[
    "https://doi.org/",
    "http://doi.org/",
    "https://dx.doi.org/",
    "http://dx.doi.org/",
    "doi.org/",
];

/// A validated DOI
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Doi(String);

impl Doi {
    /// Returns the DOI as written, without any prefix
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Returns the registrant code (the part between `10.` and `/`)
    pub fn registrant(&self) -> &str {
        let prefix = self.0.split('/').next().unwrap_or_default();
        prefix.strip_prefix("10.").unwrap_or(prefix)
    }

    /// Returns the suffix (everything after the first `/`)
    pub fn suffix(&self) -> &str {
        self.0.split_once('/').map(|(_, s)| s).unwrap_or_default()
    }

    /// Returns the resolver URL for this DOI
    pub fn url(&self) -> String {
        format!("https://doi.org/{}", self.0)
    }
}

fn strip_decorations(input: &str) -> &str {
    let mut s = input.trim();

    if s.get(..4).is_some_and(|head| head.eq_ignore_ascii_case("doi:")) {
        s = s[4..].trim_start();
    }

    for prefix in URL_PREFIXES {
        if s
            .get(..prefix.len())
            .is_some_and(|head| head.eq_ignore_ascii_case(prefix))
        {
            s = &s[prefix.len()..];
            break;
        }
    }

    s
}

fn valid_registrant(registrant: &str) -> bool {
    let mut parts = registrant.split('.');

    let head = parts.next().unwrap_or_default();
    if !(4..=9).contains(&head.len()) || !head.chars().all(|c| c.is_ascii_digit()) {
        return false;
    }

    parts.all(|p| !p.is_empty() && p.chars().all(|c| c.is_ascii_digit()))
}

impl FromStr for Doi {
    type Err = DoiError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let stripped = strip_decorations(s);
        if stripped.is_empty() {
            return Err(DoiError::Empty);
        }

        let malformed = || DoiError::Malformed(s.trim().to_string());

        let (prefix, suffix) = stripped.split_once('/').ok_or_else(malformed)?;
        let registrant = prefix.strip_prefix("10.").ok_or_else(malformed)?;

        if !valid_registrant(registrant) {
            return Err(malformed());
        }

        if suffix.is_empty() || suffix.chars().any(char::is_whitespace) {
            return Err(malformed());
        }

        Ok(Self(stripped.to_string()))
    }
}

impl PartialEq for Doi {
    fn eq(&self, other: &Self) -> bool {
        self.0.eq_ignore_ascii_case(&other.0)
    }
}

impl Eq for Doi {}

impl Hash for Doi {
    fn hash<H: Hasher>(&self, state: &mut H) {
        for b in self.0.bytes() {
            state.write_u8(b.to_ascii_lowercase());
        }
    }
}

impl fmt::Display for Doi {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl TryFrom<String> for Doi {
    type Error = DoiError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<Doi> for String {
    fn from(doi: Doi) -> Self {
        doi.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    #[test]
    fn parse_plain_doi() {
        let doi: Doi = "10.1000/xyz123".parse().unwrap();
        assert_eq!(doi.as_str(), "10.1000/xyz123");
        assert_eq!(doi.registrant(), "1000");
        assert_eq!(doi.suffix(), "xyz123");
    }

    #[test]
    fn parse_strips_prefixes() {
        let cases = [
            "doi:10.1000/xyz123",
            "DOI: 10.1000/xyz123",
            "https://doi.org/10.1000/xyz123",
            "http://dx.doi.org/10.1000/xyz123",
            "  10.1000/xyz123  ",
        ];

        for case in cases {
            let doi: Doi = case.parse().unwrap();
            assert_eq!(doi.as_str(), "10.1000/xyz123", "input: {}", case);
        }
    }

    #[test]
    fn parse_registrant_subdivisions() {
        let doi: Doi = "10.1000.10/abc".parse().unwrap();
        assert_eq!(doi.registrant(), "1000.10");
    }

    #[test]
    fn suffix_may_contain_slashes() {
        let doi: Doi = "10.1021/acs.jpcb.0c01234/suppl".parse().unwrap();
        assert_eq!(doi.suffix(), "acs.jpcb.0c01234/suppl");
    }

    #[test]
    fn parse_rejects_malformed() {
        for bad in [
            "11.1000/abc",
            "10.12/abc",
            "10.1000",
            "10.1000/",
            "10.abcd/xyz",
            "10.1000/has space",
            "10.1000./abc",
            "not a doi",
        ] {
            assert!(
                matches!(bad.parse::<Doi>(), Err(DoiError::Malformed(_))),
                "should reject {}",
                bad
            );
        }
    }

    #[test]
    fn parse_rejects_empty() {
        assert_eq!("   ".parse::<Doi>(), Err(DoiError::Empty));
        assert_eq!("doi:".parse::<Doi>(), Err(DoiError::Empty));
    }

    #[test]
    fn equality_ignores_case() {
        let a: Doi = "10.1000/ABC".parse().unwrap();
        let b: Doi = "10.1000/abc".parse().unwrap();
        assert_eq!(a, b);

        let set: HashSet<Doi> = [a, b].into_iter().collect();
        assert_eq!(set.len(), 1);
    }

    #[test]
    fn display_keeps_case() {
        let doi: Doi = "10.1000/ABC".parse().unwrap();
        assert_eq!(doi.to_string(), "10.1000/ABC");
        assert_eq!(doi.url(), "https://doi.org/10.1000/ABC");
    }

    #[test]
    fn serde_round_trip() {
        let doi: Doi = "10.1000/xyz123".parse().unwrap();
        let json = serde_json::to_string(&doi).unwrap();
        assert_eq!(json, "\"10.1000/xyz123\"");

        let back: Doi = serde_json::from_str(&json).unwrap();
        assert_eq!(back, doi);

        assert!(serde_json::from_str::<Doi>("\"bogus\"").is_err());
    }
}
