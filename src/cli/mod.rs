//! # Command-Line Interface
//!
//! User-facing CLI commands and output formatting.
//!
//! ## Command Groups
//!
//! | Group | Purpose | Examples |
//! |-------|---------|----------|
//! | Records | Resolve and manage entries | `add`, `show`, `cite`, `remove`, `refresh` |
//! | Query | Browse the library | `list`, `search` |
//! | Config | Inspect settings | `config`, `config --init` |
//!
//! ## Output Formats
//!
//! All commands support the `--output` flag:
//! - `text` (default) - Human-readable output
//! - `json` - Machine-parseable JSON
//!
//! Citation formats (`bib`, `md`, `md-long`, `doi`) are chosen per command
//! with `--format`.
//!
//! ## Verbose Mode
//!
//! Use `--verbose` (or `-v`) for debug output, including request logs:
//! ```bash
//! citekeep --verbose add 10.1000/xyz123
//! ```
//! `RUST_LOG` overrides the log filter.
//!
//! ## Entry Point
//!
//! Call [`run()`] to parse arguments and execute the appropriate command.

mod app;
mod config_cmd;
mod output;
mod query;
mod reference;

pub use app::{run, Cli, Commands};
pub use output::{Output, OutputFormat};
