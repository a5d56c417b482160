//! Bibliographic metadata returned by the registry
//!
//! [`RawMetadata`] is built once per successful resolution and never mutated
//! afterwards. Only the DOI and the work kind are mandatory; every other field
//! may be missing and renderers skip what is absent.

use serde::{Deserialize, Serialize};

use super::doi::Doi;

/// Kind of published work
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "kebab-case")]
pub enum WorkKind {
    #[default]
    JournalArticle,
    ProceedingsArticle,
    Book,
    BookChapter,
    Preprint,
    Dataset,
    Report,
    Thesis,
    Other,
}

impl WorkKind {
    /// Maps a CSL or Crossref type name to a work kind
    pub fn from_type_name(name: &str) -> Self {
        match name.trim().to_ascii_lowercase().as_str() {
            "article-journal" | "journal-article" | "article" | "article-magazine"
            | "article-newspaper" => WorkKind::JournalArticle,
            "paper-conference" | "proceedings-article" => WorkKind::ProceedingsArticle,
            "book" | "monograph" | "edited-book" | "reference-book" => WorkKind::Book,
            "chapter" | "book-chapter" | "book-section" | "book-part" => WorkKind::BookChapter,
            "posted-content" | "preprint" => WorkKind::Preprint,
            "dataset" => WorkKind::Dataset,
            "report" => WorkKind::Report,
            "thesis" | "dissertation" => WorkKind::Thesis,
            _ => WorkKind::Other,
        }
    }

    /// Returns a display label for the work kind
    pub fn label(&self) -> &'static str {
        match self {
            WorkKind::JournalArticle => "journal article",
            WorkKind::ProceedingsArticle => "proceedings article",
            WorkKind::Book => "book",
            WorkKind::BookChapter => "book chapter",
            WorkKind::Preprint => "preprint",
            WorkKind::Dataset => "dataset",
            WorkKind::Report => "report",
            WorkKind::Thesis => "thesis",
            WorkKind::Other => "other",
        }
    }
}

/// A single author, in publication order
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Author {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub given: Option<String>,
    pub family: String,
}

impl Author {
    pub fn new(given: Option<&str>, family: &str) -> Self {
        Self {
            given: given.map(str::to_string).filter(|g| !g.trim().is_empty()),
            family: family.to_string(),
        }
    }

    /// Initials of the given names, e.g. "John Ronald" -> "J. R."
    pub fn initials(&self) -> Option<String> {
        let given = self.given.as_deref()?;
        let parts: Vec<String> = given
            .split(|c: char| c.is_whitespace() || c == '-')
            .filter_map(|part| part.chars().next())
            .filter(|c| c.is_alphabetic())
            .map(|c| format!("{}.", c))
            .collect();

        if parts.is_empty() {
            None
        } else {
            Some(parts.join(" "))
        }
    }

    /// "Family, Given" form used in BibLaTeX author lists
    pub fn inverted(&self) -> String {
        match &self.given {
            Some(given) => format!("{}, {}", self.family, given),
            None => self.family.clone(),
        }
    }

    /// "Given Family" form for searching and display
    pub fn full_name(&self) -> String {
        match &self.given {
            Some(given) => format!("{} {}", given, self.family),
            None => self.family.clone(),
        }
    }
}

/// Structured metadata for one resolved DOI
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RawMetadata {
    pub doi: Doi,

    #[serde(default)]
    pub kind: WorkKind,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub authors: Vec<Author>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub year: Option<i32>,

    /// Journal, proceedings or book title
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub container: Option<String>,

    /// Abbreviated container title (ISO4 journal abbreviation when known)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub container_short: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub volume: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub issue: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pages: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub publisher: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,
}

impl RawMetadata {
    /// Creates metadata with only the mandatory fields set
    pub fn new(doi: Doi, kind: WorkKind) -> Self {
        Self {
            doi,
            kind,
            authors: Vec::new(),
            title: None,
            year: None,
            container: None,
            container_short: None,
            volume: None,
            issue: None,
            pages: None,
            publisher: None,
            url: None,
        }
    }

    pub fn first_author(&self) -> Option<&Author> {
        self.authors.first()
    }

    /// Returns the title if present and not blank
    pub fn title(&self) -> Option<&str> {
        self.title.as_deref().map(str::trim).filter(|t| !t.is_empty())
    }

    /// True when neither an author nor a title is known
    pub fn is_anonymous_and_untitled(&self) -> bool {
        self.title().is_none() && self.authors.iter().all(|a| a.family.trim().is_empty())
    }

    /// Returns the container, preferring the abbreviation when asked
    pub fn container(&self, abbreviated: bool) -> Option<&str> {
        let short = self.container_short.as_deref().filter(|s| !s.is_empty());
        let long = self.container.as_deref().filter(|s| !s.is_empty());
        if abbreviated {
            short.or(long)
        } else {
            long.or(short)
        }
    }

    /// Lists the names of fields whose values differ from `other`
    pub fn changed_fields(&self, other: &RawMetadata) -> Vec<&'static str> {
        let mut changed = Vec::new();
        if self.kind != other.kind {
            changed.push("kind");
        }
        if self.authors != other.authors {
            changed.push("authors");
        }
        if self.title != other.title {
            changed.push("title");
        }
        if self.year != other.year {
            changed.push("year");
        }
        if self.container != other.container || self.container_short != other.container_short {
            changed.push("container");
        }
        if self.volume != other.volume {
            changed.push("volume");
        }
        if self.issue != other.issue {
            changed.push("issue");
        }
        if self.pages != other.pages {
            changed.push("pages");
        }
        if self.publisher != other.publisher {
            changed.push("publisher");
        }
        if self.url != other.url {
            changed.push("url");
        }
        changed
    }
}
