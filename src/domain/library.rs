//! In-memory library of citation records
//!
//! Holds the invariants of a library without any I/O: keys are unique, and
//! under [`DoiKeyPolicy::Shared`] a DOI maps to at most one key. Records keep
//! their insertion order, which is also the order they are persisted in.

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use thiserror::Error;

use super::doi::Doi;
use super::format::Format;
use super::key::CitationKey;
use super::normalize::fold;
use super::record::CitationRecord;

#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum LibraryError {
    #[error("Citation key '{key}' is already used by {existing}")]
    DuplicateKey { key: CitationKey, existing: Doi },

    #[error("DOI {doi} is already stored under key '{key}'")]
    DuplicateDoi { doi: Doi, key: CitationKey },

    #[error("No record with key '{0}'")]
    NotFound(CitationKey),
}

/// How records for the same DOI in different formats relate to keys
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum DoiKeyPolicy {
    /// One key per DOI; a new format replaces the stored text
    #[default]
    Shared,
    /// One key per (DOI, format) pair
    PerFormat,
}

impl DoiKeyPolicy {
    /// True when a record for (`doi`, `format`) represents the same entry as `existing`
    pub fn same_work(&self, existing: &CitationRecord, doi: &Doi, format: Format) -> bool {
        match self {
            DoiKeyPolicy::Shared => &existing.doi == doi,
            DoiKeyPolicy::PerFormat => &existing.doi == doi && existing.format == format,
        }
    }
}

/// Ordering used when listing records
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum SortMode {
    /// Year, then container, then first author
    #[default]
    Year,
    /// Time the record was added
    Added,
    /// Citation key
    Key,
    /// Title
    Title,
    /// Persisted insertion order
    Insertion,
}

impl std::str::FromStr for SortMode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "year" | "y" | "yja" => Ok(SortMode::Year),
            "added" | "add" | "a" => Ok(SortMode::Added),
            "key" | "k" => Ok(SortMode::Key),
            "title" | "t" => Ok(SortMode::Title),
            "insertion" | "none" | "i" => Ok(SortMode::Insertion),
            other => Err(format!(
                "invalid sort mode '{}' (expected year, added, key, title or insertion)",
                other
            )),
        }
    }
}

/// What an insert did to the library
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InsertOutcome {
    Inserted,
    Updated,
    Unchanged,
}

impl InsertOutcome {
    pub fn changed(&self) -> bool {
        !matches!(self, InsertOutcome::Unchanged)
    }
}

/// Keyed collection of citation records
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Library {
    records: IndexMap<CitationKey, CitationRecord>,
    policy: DoiKeyPolicy,
}

impl Library {
    pub fn new(policy: DoiKeyPolicy) -> Self {
        Self {
            records: IndexMap::new(),
            policy,
        }
    }

    /// Builds a library from persisted records in order.
    ///
    /// Only key uniqueness is enforced. The DOI policy governs new inserts,
    /// so a file written under another policy still loads; see
    /// [`Self::policy_conflicts`].
    pub fn from_records(
        records: impl IntoIterator<Item = CitationRecord>,
        policy: DoiKeyPolicy,
    ) -> Result<Self, LibraryError> {
        let mut library = Self::new(policy);
        for record in records {
            if let Some(existing) = library.records.get(&record.key) {
                return Err(LibraryError::DuplicateKey {
                    key: record.key.clone(),
                    existing: existing.doi.clone(),
                });
            }
            library.records.insert(record.key.clone(), record);
        }
        Ok(library)
    }

    /// Keys of records that share a work with an earlier record under the
    /// current policy, as (earlier key, later key)
    pub fn policy_conflicts(&self) -> Vec<(&CitationKey, &CitationKey)> {
        let records: Vec<&CitationRecord> = self.records.values().collect();
        records
            .iter()
            .enumerate()
            .filter_map(|(i, later)| {
                records[..i]
                    .iter()
                    .find(|earlier| self.policy.same_work(earlier, &later.doi, later.format))
                    .map(|earlier| (&earlier.key, &later.key))
            })
            .collect()
    }

    pub fn policy(&self) -> DoiKeyPolicy {
        self.policy
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn contains_key(&self, key: &CitationKey) -> bool {
        self.records.contains_key(key)
    }

    pub fn lookup(&self, key: &CitationKey) -> Option<&CitationRecord> {
        self.records.get(key)
    }

    /// Records in insertion order
    pub fn iter(&self) -> impl Iterator<Item = &CitationRecord> + '_ {
        self.records.values()
    }

    /// Finds the record that represents (`doi`, `format`) under the key policy
    pub fn find_work(&self, doi: &Doi, format: Format) -> Option<&CitationRecord> {
        self.records
            .values()
            .find(|r| self.policy.same_work(r, doi, format))
    }

    /// All records for a DOI regardless of format
    pub fn find_by_doi<'a>(&'a self, doi: &'a Doi) -> impl Iterator<Item = &'a CitationRecord> + 'a {
        self.records.values().filter(move |r| &r.doi == doi)
    }

    /// Inserts or updates a record.
    ///
    /// A record for the same work under the same key is replaced in place,
    /// keeping its position and `added_at`. Identical content is a no-op.
    pub fn insert(&mut self, mut record: CitationRecord) -> Result<InsertOutcome, LibraryError> {
        if let Some(existing) = self.records.get(&record.key) {
            if !self.policy.same_work(existing, &record.doi, record.format) {
                return Err(LibraryError::DuplicateKey {
                    key: record.key,
                    existing: existing.doi.clone(),
                });
            }

            if existing.same_content(&record) {
                return Ok(InsertOutcome::Unchanged);
            }

            record.added_at = existing.added_at;
            self.records.insert(record.key.clone(), record);
            return Ok(InsertOutcome::Updated);
        }

        if let Some(other) = self.find_work(&record.doi, record.format) {
            return Err(LibraryError::DuplicateDoi {
                doi: record.doi,
                key: other.key.clone(),
            });
        }

        self.records.insert(record.key.clone(), record);
        Ok(InsertOutcome::Inserted)
    }

    /// Removes a record, preserving the order of the others
    pub fn remove(&mut self, key: &CitationKey) -> Result<CitationRecord, LibraryError> {
        self.records
            .shift_remove(key)
            .ok_or_else(|| LibraryError::NotFound(key.clone()))
    }

    /// Records matching every whitespace-separated term of `query`.
    ///
    /// Matching is case- and accent-insensitive over key, DOI, title,
    /// authors, container and year. An empty query matches everything.
    pub fn search(&self, query: &str) -> Vec<&CitationRecord> {
        let terms: Vec<String> = query.split_whitespace().map(fold).collect();

        self.records
            .values()
            .filter(|record| {
                let haystack = search_text(record);
                terms.iter().all(|term| haystack.contains(term.as_str()))
            })
            .collect()
    }

    /// Records ordered by `mode`; stable for equal elements
    pub fn sorted(&self, mode: SortMode, reverse: bool) -> Vec<&CitationRecord> {
        let mut records: Vec<&CitationRecord> = self.records.values().collect();
        records.sort_by(|a, b| compare(a, b, mode));
        if reverse {
            records.reverse();
        }
        records
    }
}

fn search_text(record: &CitationRecord) -> String {
    let meta = &record.metadata;
    let mut parts = vec![record.key.to_string(), record.doi.to_string()];
    parts.extend(meta.title.clone());
    parts.extend(meta.authors.iter().map(|a| a.full_name()));
    parts.extend(meta.container.clone());
    parts.extend(meta.container_short.clone());
    parts.extend(meta.year.map(|y| y.to_string()));
    fold(&parts.join(" "))
}

fn compare(a: &CitationRecord, b: &CitationRecord, mode: SortMode) -> Ordering {
    match mode {
        SortMode::Year => {
            let container = |r: &CitationRecord| r.metadata.container(true).map(fold);
            let author = |r: &CitationRecord| r.metadata.first_author().map(|x| fold(&x.family));
            a.metadata
                .year
                .cmp(&b.metadata.year)
                .then_with(|| container(a).cmp(&container(b)))
                .then_with(|| author(a).cmp(&author(b)))
        }
        SortMode::Added => a.added_at.cmp(&b.added_at),
        SortMode::Key => a.key.cmp(&b.key),
        SortMode::Title => {
            let title = |r: &CitationRecord| r.metadata.title().map(fold);
            title(a).cmp(&title(b))
        }
        SortMode::Insertion => Ordering::Equal,
    }
}
