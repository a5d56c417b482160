//! citekeep - a small personal reference manager
//!
//! Resolves DOIs against a registry, formats the metadata as citations
//! (BibLaTeX or ACS-style markdown) under deterministic citation keys, and
//! keeps them in a local YAML library.

pub mod cli;
pub mod domain;
pub mod manager;
pub mod resolve;
pub mod storage;

pub use domain::{CitationKey, CitationRecord, Doi, Format, Library, RawMetadata};
pub use manager::{ManagerError, ReferenceManager};
