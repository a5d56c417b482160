//! Citation records

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::doi::Doi;
use super::format::Format;
use super::key::CitationKey;
use super::metadata::RawMetadata;

/// A formatted citation, owned by the library once inserted
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CitationRecord {
    pub key: CitationKey,
    pub doi: Doi,
    pub format: Format,
    pub text: String,
    pub metadata: RawMetadata,
    pub added_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl CitationRecord {
    pub fn new(key: CitationKey, format: Format, text: String, metadata: RawMetadata) -> Self {
        let now = Utc::now();
        Self {
            key,
            doi: metadata.doi.clone(),
            format,
            text,
            metadata,
            added_at: now,
            updated_at: now,
        }
    }

    /// True when both records carry the same citation content.
    ///
    /// Timestamps are bookkeeping and do not count.
    pub fn same_content(&self, other: &CitationRecord) -> bool {
        self.key == other.key
            && self.doi == other.doi
            && self.format == other.format
            && self.text == other.text
            && self.metadata == other.metadata
    }

    /// Short author label for listings: "Smith", "Smith & Doe", "Smith et al."
    pub fn author_label(&self) -> String {
        let authors = &self.metadata.authors;
        match authors.len() {
            0 => String::new(),
            1 => authors[0].family.clone(),
            2 => format!("{} & {}", authors[0].family, authors[1].family),
            _ => format!("{} et al.", authors[0].family),
        }
    }
}
