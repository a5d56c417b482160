//! Reference manager
//!
//! The single entry point front-ends use: resolve a DOI and store the
//! result, search, list, cite and remove. It owns the library store and the
//! fetch coalescer; nothing else touches the library file.

use chrono::Utc;
use thiserror::Error;
use tokio::sync::RwLock;
use tracing::{debug, info};

use crate::domain::{
    CitationKey, CitationRecord, Format, FormatError, Formatter, InsertOutcome, LibraryError,
    SortMode,
};
use crate::resolve::{FetchCoalescer, FetchStats, ResolveError};
use crate::storage::{LibraryStore, StoreError};

#[derive(Debug, Error)]
pub enum ManagerError {
    #[error(transparent)]
    Resolve(#[from] ResolveError),

    #[error(transparent)]
    Format(#[from] FormatError),

    #[error(transparent)]
    Store(#[from] StoreError),
}

impl From<LibraryError> for ManagerError {
    fn from(err: LibraryError) -> Self {
        ManagerError::Store(err.into())
    }
}

/// A record as stored, plus what storing it did
#[derive(Debug, Clone, PartialEq)]
pub struct Stored {
    pub record: CitationRecord,
    pub outcome: InsertOutcome,
}

/// Result of re-resolving a stored record
#[derive(Debug, Clone, PartialEq)]
pub struct RefreshOutcome {
    pub record: CitationRecord,
    /// Metadata fields that differ from the stored version
    pub changed: Vec<&'static str>,
    pub outcome: InsertOutcome,
}

pub struct ReferenceManager {
    store: RwLock<LibraryStore>,
    fetcher: FetchCoalescer,
    formatter: Formatter,
    default_format: Format,
}

impl ReferenceManager {
    pub fn new(
        store: LibraryStore,
        fetcher: FetchCoalescer,
        formatter: Formatter,
        default_format: Format,
    ) -> Self {
        Self {
            store: RwLock::new(store),
            fetcher,
            formatter,
            default_format,
        }
    }

    pub fn default_format(&self) -> Format {
        self.default_format
    }

    pub fn fetch_stats(&self) -> FetchStats {
        self.fetcher.stats()
    }

    /// Resolves `doi`, formats it and stores the record
    pub async fn resolve_and_store(
        &self,
        doi: &str,
        format: Option<Format>,
    ) -> Result<CitationRecord, ManagerError> {
        self.add(doi, format).await.map(|stored| stored.record)
    }

    /// Like [`Self::resolve_and_store`], also reporting whether anything changed
    pub async fn add(&self, doi: &str, format: Option<Format>) -> Result<Stored, ManagerError> {
        let format = format.unwrap_or(self.default_format);
        let meta = self.fetcher.resolve(doi, format).await?;

        // Key derivation and insert happen under one write lock, against the
        // file as it is now, so two works with the same base key cannot both
        // claim it.
        let mut store = self.store.write().await;
        let (record, outcome) = store.insert_with(|library| {
            let record = self.formatter.format(&meta, format, library)?;
            debug!(doi = %record.doi, key = %record.key, "formatted record");
            Ok::<_, ManagerError>(record)
        })?;

        Ok(Stored { record, outcome })
    }

    pub async fn lookup(&self, key: &CitationKey) -> Option<CitationRecord> {
        self.store.read().await.lookup(key).cloned()
    }

    /// Records matching every term of `query`, in insertion order
    pub async fn search(&self, query: &str) -> Vec<CitationRecord> {
        let store = self.store.read().await;
        store.library().search(query).into_iter().cloned().collect()
    }

    pub async fn list(&self, sort: SortMode, reverse: bool) -> Vec<CitationRecord> {
        let store = self.store.read().await;
        store
            .library()
            .sorted(sort, reverse)
            .into_iter()
            .cloned()
            .collect()
    }

    pub async fn len(&self) -> usize {
        self.store.read().await.library().len()
    }

    pub async fn is_empty(&self) -> bool {
        self.len().await == 0
    }

    pub async fn remove(&self, key: &CitationKey) -> Result<CitationRecord, ManagerError> {
        Ok(self.store.write().await.delete(key)?)
    }

    /// Citation text for a stored record.
    ///
    /// The stored text is returned for its own format; other formats are
    /// rendered from the stored metadata without a network round trip.
    pub async fn cite(
        &self,
        key: &CitationKey,
        format: Option<Format>,
    ) -> Result<String, ManagerError> {
        let record = self
            .lookup(key)
            .await
            .ok_or_else(|| LibraryError::NotFound(key.clone()))?;

        match format {
            Some(format) if format != record.format => {
                Ok(self.formatter.render(&record.metadata, format, &record.key)?)
            }
            _ => Ok(record.text),
        }
    }

    /// Re-resolves a stored record and rewrites it if the registry changed.
    ///
    /// The key is kept even if the new metadata would derive another one.
    /// The record is looked up again once the fetch completes, so a record
    /// removed in the meantime stays removed.
    pub async fn refresh(&self, key: &CitationKey) -> Result<RefreshOutcome, ManagerError> {
        let current = self
            .lookup(key)
            .await
            .ok_or_else(|| LibraryError::NotFound(key.clone()))?;

        let meta = self.fetcher.fetch_once(&current.doi, current.format).await?;

        let mut store = self.store.write().await;
        let mut changed = Vec::new();
        let (record, outcome) = store.insert_with(|library| {
            let fresh = library
                .lookup(key)
                .filter(|r| r.doi == current.doi)
                .ok_or_else(|| LibraryError::NotFound(key.clone()))?;

            changed = fresh.metadata.changed_fields(&meta);
            let text = self.formatter.render(&meta, fresh.format, key)?;
            Ok::<_, ManagerError>(CitationRecord {
                text,
                metadata: meta,
                updated_at: Utc::now(),
                ..fresh.clone()
            })
        })?;
        info!(key = %key, changed = ?changed, "refreshed");

        Ok(RefreshOutcome {
            record,
            changed,
            outcome,
        })
    }
}
