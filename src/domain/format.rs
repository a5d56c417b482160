//! Output formats for citation records

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

#[derive(Debug, Clone, Error, PartialEq, Eq)]
#[error("Unknown format '{0}' (expected one of: bib, md, md-long, doi)")]
pub struct UnknownFormat(pub String);

/// Citation output format
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "kebab-case")]
pub enum Format {
    /// BibLaTeX entry
    #[default]
    Bib,
    /// Short ACS-style markdown citation
    #[serde(alias = "markdown")]
    Md,
    /// Long ACS-style markdown citation with title and DOI link
    #[serde(alias = "markdown-long")]
    MdLong,
    /// Bare DOI
    Doi,
}

impl Format {
    pub fn all() -> &'static [Format] {
        &[Format::Bib, Format::Md, Format::MdLong, Format::Doi]
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Format::Bib => "bib",
            Format::Md => "md",
            Format::MdLong => "md-long",
            Format::Doi => "doi",
        }
    }
}

impl fmt::Display for Format {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Format {
    type Err = UnknownFormat;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "bib" | "b" | "bibtex" | "biblatex" => Ok(Format::Bib),
            "md" | "m" | "markdown" => Ok(Format::Md),
            "md-long" | "markdown-long" | "ml" => Ok(Format::MdLong),
            "doi" | "d" => Ok(Format::Doi),
            _ => Err(UnknownFormat(s.to_string())),
        }
    }
}
