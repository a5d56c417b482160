//! Domain models for citekeep
//!
//! Contains the core bibliographic logic without any I/O concerns.

mod doi;
mod format;
mod formatter;
mod key;
mod library;
mod metadata;
mod normalize;
mod record;

pub use doi::{Doi, DoiError};
pub use format::{Format, UnknownFormat};
pub use formatter::{FormatError, Formatter};
pub use key::{CitationKey, KeyError};
pub use library::{DoiKeyPolicy, InsertOutcome, Library, LibraryError, SortMode};
pub use metadata::{Author, RawMetadata, WorkKind};
pub use normalize::{fold, key_token, normalize};
pub use record::CitationRecord;
