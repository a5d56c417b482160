//! # Storage Layer
//!
//! Persistence for citekeep in human-readable file formats.
//!
//! ## Storage Formats
//!
//! | Data | Format | Location |
//! |------|--------|----------|
//! | Library | YAML keyed by citation key | `<data dir>/library.yaml` |
//! | Backup | Copy taken on open | `<data dir>/library.yaml.bak` |
//! | Config | TOML | `<config dir>/config.toml` |
//!
//! ## Concurrency Safety
//!
//! - [`LibraryStore`] takes an `fs2` lock on `library.yaml.lock`: exclusive
//!   for mutations, shared for loads
//! - All writes are atomic (temp file + fsync + rename)
//! - A failed mutation leaves both the file and the in-memory library as
//!   they were
//!
//! ## Key Types
//!
//! - [`LibraryStore`] - Read/write the citation library
//! - [`Config`] - User configuration

mod config;
mod library;

pub use config::{Config, ConfigError, LibraryConfig, NetworkConfig};
pub use library::{LibraryStore, StoreError};
