//! YAML storage for the citation library
//!
//! The library lives in a single human-readable YAML file mapping citation
//! keys to record fields, in insertion order. Every mutation runs under an
//! exclusive lock on a sidecar `.lock` file, re-reads the file, applies the
//! change to a copy, writes a temp file and renames it into place. Memory is
//! only updated after the rename succeeds, so a failure at any step leaves
//! both the file and the in-memory library at their previous state.

use std::fs::{self, File, OpenOptions};
use std::io::{self, BufWriter, Write};
use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use fs2::FileExt;
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{debug, info, warn};

use crate::domain::{
    CitationKey, CitationRecord, Doi, DoiKeyPolicy, Format, InsertOutcome, Library, LibraryError,
    RawMetadata,
};

const FILE_VERSION: u32 = 1;

#[derive(Debug, Error)]
pub enum StoreError {
    #[error(transparent)]
    Library(#[from] LibraryError),

    #[error("Failed to {action} {}: {source}", path.display())]
    Io {
        action: &'static str,
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("Library file {} is corrupt: {message}", path.display())]
    Corrupt { path: PathBuf, message: String },

    #[error("Failed to serialize library: {0}")]
    Serialize(String),
}

impl StoreError {
    fn io(action: &'static str, path: &Path, source: io::Error) -> Self {
        StoreError::Io {
            action,
            path: path.to_path_buf(),
            source,
        }
    }

    pub fn is_duplicate_key(&self) -> bool {
        matches!(self, StoreError::Library(LibraryError::DuplicateKey { .. }))
    }

    pub fn is_not_found(&self) -> bool {
        matches!(self, StoreError::Library(LibraryError::NotFound(_)))
    }
}

/// On-disk layout of the library file
#[derive(Debug, Serialize, Deserialize)]
struct LibraryFile {
    version: u32,
    #[serde(default)]
    records: IndexMap<CitationKey, StoredRecord>,
}

/// Record fields as stored under their key
#[derive(Debug, Serialize, Deserialize)]
struct StoredRecord {
    doi: Doi,
    format: Format,
    added_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
    text: String,
    metadata: RawMetadata,
}

impl From<&CitationRecord> for StoredRecord {
    fn from(record: &CitationRecord) -> Self {
        Self {
            doi: record.doi.clone(),
            format: record.format,
            added_at: record.added_at,
            updated_at: record.updated_at,
            text: record.text.clone(),
            metadata: record.metadata.clone(),
        }
    }
}

impl StoredRecord {
    fn into_record(self, key: CitationKey) -> CitationRecord {
        CitationRecord {
            key,
            doi: self.doi,
            format: self.format,
            text: self.text,
            metadata: self.metadata,
            added_at: self.added_at,
            updated_at: self.updated_at,
        }
    }
}

/// Appends `.{ext}` to the file name: `library.yaml` -> `library.yaml.lock`
fn sidecar(path: &Path, ext: &str) -> PathBuf {
    let mut name = path.file_name().map(|n| n.to_os_string()).unwrap_or_default();
    name.push(".");
    name.push(ext);
    path.with_file_name(name)
}

/// Held for the duration of a read or a mutation; released on drop
struct StoreLock {
    file: File,
}

impl StoreLock {
    fn acquire(library_path: &Path, exclusive: bool) -> Result<Self, StoreError> {
        let lock_path = sidecar(library_path, "lock");
        let file = OpenOptions::new()
            .read(true)
            .write(true)
            .create(true)
            .truncate(false)
            .open(&lock_path)
            .map_err(|e| StoreError::io("open lock file", &lock_path, e))?;

        let locked = if exclusive {
            FileExt::lock_exclusive(&file)
        } else {
            FileExt::lock_shared(&file)
        };
        locked.map_err(|e| StoreError::io("lock", &lock_path, e))?;

        Ok(Self { file })
    }
}

impl Drop for StoreLock {
    fn drop(&mut self) {
        let _ = FileExt::unlock(&self.file);
    }
}

/// Persistent library backed by a YAML file
#[derive(Debug)]
pub struct LibraryStore {
    path: PathBuf,
    library: Library,
}

impl LibraryStore {
    /// Opens the library at `path`; a missing file is an empty library
    pub fn open(path: impl Into<PathBuf>, policy: DoiKeyPolicy) -> Result<Self, StoreError> {
        let path = path.into();
        let library = Self::load(&path, policy)?;
        debug!(path = %path.display(), records = library.len(), "opened library");
        Ok(Self { path, library })
    }

    /// Opens the library, first copying an existing file to `<file>.bak`
    pub fn open_with_backup(
        path: impl Into<PathBuf>,
        policy: DoiKeyPolicy,
    ) -> Result<Self, StoreError> {
        let path = path.into();
        if path.is_file() {
            let backup = sidecar(&path, "bak");
            fs::copy(&path, &backup).map_err(|e| StoreError::io("back up", &backup, e))?;
            debug!(backup = %backup.display(), "backed up library");
        }
        Self::open(path, policy)
    }

    /// Returns the path to the library file
    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn library(&self) -> &Library {
        &self.library
    }

    pub fn lookup(&self, key: &CitationKey) -> Option<&CitationRecord> {
        self.library.lookup(key)
    }

    /// Records in persisted insertion order
    pub fn list(&self) -> impl Iterator<Item = &CitationRecord> + '_ {
        self.library.iter()
    }

    /// Inserts or updates a record and persists the result
    pub fn insert(&mut self, record: CitationRecord) -> Result<InsertOutcome, StoreError> {
        let key = record.key.clone();
        let outcome = self.mutate(|library| library.insert(record).map_err(StoreError::from))?;
        info!(key = %key, outcome = ?outcome, "insert");
        Ok(outcome)
    }

    /// Builds a record against the library as it is on disk, under the write
    /// lock, then inserts it.
    ///
    /// `build` sees writes from other processes, so keys it derives cannot
    /// collide with records added since this store was opened.
    pub fn insert_with<E: From<StoreError>>(
        &mut self,
        build: impl FnOnce(&Library) -> Result<CitationRecord, E>,
    ) -> Result<(CitationRecord, InsertOutcome), E> {
        let (record, outcome) = self.mutate::<_, E>(|library| {
            let record = build(library)?;
            let outcome = library
                .insert(record.clone())
                .map_err(|e| E::from(StoreError::from(e)))?;
            Ok((record, outcome))
        })?;
        info!(key = %record.key, outcome = ?outcome, "insert");

        let record = self.library.lookup(&record.key).cloned().unwrap_or(record);
        Ok((record, outcome))
    }

    /// Deletes the record under `key` and persists the result
    pub fn delete(&mut self, key: &CitationKey) -> Result<CitationRecord, StoreError> {
        let removed = self.mutate(|library| library.remove(key).map_err(StoreError::from))?;
        info!(key = %key, "delete");
        Ok(removed)
    }

    /// Re-reads the file, discarding the in-memory copy
    pub fn reload(&mut self) -> Result<(), StoreError> {
        self.library = Self::load(&self.path, self.library.policy())?;
        Ok(())
    }

    /// Runs `change` on a fresh copy of the library under the write lock and
    /// commits it only if the change and the write both succeed
    fn mutate<T, E: From<StoreError>>(
        &mut self,
        change: impl FnOnce(&mut Library) -> Result<T, E>,
    ) -> Result<T, E> {
        let _lock = StoreLock::acquire(&self.path, true)?;

        let mut next = Self::read_file(&self.path, self.library.policy())?;
        let before = next.clone();
        let value = change(&mut next)?;

        if next != before {
            Self::write_file(&self.path, &next)?;
        }
        self.library = next;
        Ok(value)
    }

    /// Reads a library file under a shared lock
    pub fn load(path: &Path, policy: DoiKeyPolicy) -> Result<Library, StoreError> {
        if !path.exists() {
            return Ok(Library::new(policy));
        }
        let _lock = StoreLock::acquire(path, false)?;
        Self::read_file(path, policy)
    }

    /// Writes a library file atomically under an exclusive lock
    pub fn save(path: &Path, library: &Library) -> Result<(), StoreError> {
        let _lock = StoreLock::acquire(path, true)?;
        Self::write_file(path, library)
    }

    fn read_file(path: &Path, policy: DoiKeyPolicy) -> Result<Library, StoreError> {
        let content = match fs::read_to_string(path) {
            Ok(content) => content,
            Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(Library::new(policy)),
            Err(e) => return Err(StoreError::io("read", path, e)),
        };

        if content.trim().is_empty() {
            return Ok(Library::new(policy));
        }

        let corrupt = |message: String| StoreError::Corrupt {
            path: path.to_path_buf(),
            message,
        };

        let file: LibraryFile = serde_yaml::from_str(&content).map_err(|e| corrupt(e.to_string()))?;
        if file.version > FILE_VERSION {
            return Err(corrupt(format!("unsupported version {}", file.version)));
        }

        let records = file
            .records
            .into_iter()
            .map(|(key, stored)| stored.into_record(key));
        let library = Library::from_records(records, policy).map_err(|e| corrupt(e.to_string()))?;
        for (earlier, later) in library.policy_conflicts() {
            warn!(
                path = %path.display(),
                key = %later,
                shares_work_with = %earlier,
                policy = ?policy,
                "record predates the current DOI key policy"
            );
        }
        Ok(library)
    }

    fn write_file(path: &Path, library: &Library) -> Result<(), StoreError> {
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent).map_err(|e| StoreError::io("create directory", parent, e))?;
        }

        let file = LibraryFile {
            version: FILE_VERSION,
            records: library
                .iter()
                .map(|r| (r.key.clone(), StoredRecord::from(r)))
                .collect(),
        };
        let content =
            serde_yaml::to_string(&file).map_err(|e| StoreError::Serialize(e.to_string()))?;

        // Write to temp file first
        let temp_path = sidecar(path, "tmp");
        {
            let temp = OpenOptions::new()
                .write(true)
                .create(true)
                .truncate(true)
                .open(&temp_path)
                .map_err(|e| StoreError::io("create temp file", &temp_path, e))?;

            let mut writer = BufWriter::new(&temp);
            writer
                .write_all(content.as_bytes())
                .and_then(|_| writer.flush())
                .map_err(|e| StoreError::io("write", &temp_path, e))?;
            drop(writer);
            temp.sync_all()
                .map_err(|e| StoreError::io("sync", &temp_path, e))?;
        }

        // Atomic rename
        if let Err(e) = fs::rename(&temp_path, path) {
            let _ = fs::remove_file(&temp_path);
            return Err(StoreError::io("replace", path, e));
        }

        Ok(())
    }
}
