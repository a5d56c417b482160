//! Main CLI application structure

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

use super::output::{Output, OutputFormat};
use super::{config_cmd, query, reference};
use crate::domain::{CitationKey, Format, Formatter, SortMode};
use crate::manager::ReferenceManager;
use crate::resolve::{FetchCoalescer, HttpResolver, Resolver};
use crate::storage::{Config, LibraryStore};

#[derive(Parser)]
#[command(name = "citekeep")]
#[command(author, version, about = "Resolve DOIs into a local citation library")]
#[command(propagate_version = true)]
pub struct Cli {
    /// Output format
    #[arg(long, short = 'o', global = true, default_value = "text")]
    pub output: OutputFormat,

    /// Enable verbose output for debugging
    #[arg(long, short = 'v', global = true)]
    pub verbose: bool,

    /// Library file (overrides the configured one)
    #[arg(long, short = 'l', global = true, env = "CITEKEEP_LIBRARY")]
    pub library: Option<PathBuf>,

    /// Config file (defaults to the platform config directory)
    #[arg(long, short = 'c', global = true, env = "CITEKEEP_CONFIG")]
    pub config: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Resolve DOIs and add them to the library
    Add {
        /// DOIs, bare or as doi.org URLs
        #[arg(required = true)]
        dois: Vec<String>,

        /// Citation format (bib, md, md-long, doi)
        #[arg(long, short = 'f')]
        format: Option<Format>,
    },

    /// List the library
    List {
        /// Sort order (year, added, key, title, insertion)
        #[arg(long, short = 's')]
        sort: Option<SortMode>,

        /// Reverse the sort order
        #[arg(long, short = 'r')]
        reverse: bool,
    },

    /// Show a stored record
    Show {
        /// Citation key
        key: CitationKey,
    },

    /// Print citations for stored records
    Cite {
        /// Citation keys
        #[arg(required = true)]
        keys: Vec<CitationKey>,

        /// Render in another format instead of the stored one
        #[arg(long, short = 'f')]
        format: Option<Format>,
    },

    /// Search the library
    Search {
        /// Terms that must all match (key, DOI, title, authors, journal, year)
        #[arg(required = true)]
        query: Vec<String>,
    },

    /// Remove records from the library
    Remove {
        /// Citation keys
        #[arg(required = true)]
        keys: Vec<CitationKey>,
    },

    /// Re-resolve a stored record and report what changed
    Refresh {
        /// Citation key
        key: CitationKey,
    },

    /// Show or initialize the configuration
    Config {
        /// Print only the config file path
        #[arg(long)]
        path: bool,

        /// Write a default config file if none exists
        #[arg(long)]
        init: bool,
    },
}

impl Commands {
    fn mutates_library(&self) -> bool {
        matches!(
            self,
            Commands::Add { .. } | Commands::Remove { .. } | Commands::Refresh { .. }
        )
    }
}

/// Main entry point for the CLI
pub fn run() -> Result<()> {
    let Cli {
        output,
        verbose,
        library,
        config: config_path,
        command,
    } = Cli::parse();
    init_tracing(verbose);
    let output = Output::new(output, verbose);

    output.verbose("citekeep starting");

    let config = match (&command, config_path.as_deref()) {
        (Commands::Config { init: true, .. }, Some(path)) if !path.exists() => Config::default(),
        (_, path) => Config::load(path)?,
    };

    if let Commands::Config { path, init } = command {
        return config_cmd::run(&output, &config, config_path.as_deref(), path, init);
    }

    let library_path = match library {
        Some(path) => path,
        None => config.library_file()?,
    };
    output.verbose(&format!("Library: {}", library_path.display()));

    let runtime = tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
        .context("Failed to start async runtime")?;

    runtime.block_on(dispatch(&output, &config, library_path, command))?;

    output.verbose("Command completed successfully");
    Ok(())
}

async fn dispatch(
    output: &Output,
    config: &Config,
    library_path: PathBuf,
    command: Commands,
) -> Result<()> {
    let manager = open_manager(config, library_path, command.mutates_library())?;

    match command {
        Commands::Add { dois, format } => {
            reference::add(output, Arc::new(manager), dois, format).await
        }
        Commands::List { sort, reverse } => {
            let sort = sort.unwrap_or(config.library.sort);
            let reverse = reverse != config.library.reverse;
            query::list(output, &manager, sort, reverse).await
        }
        Commands::Show { key } => reference::show(output, &manager, &key).await,
        Commands::Cite { keys, format } => reference::cite(output, &manager, &keys, format).await,
        Commands::Search { query } => query::search(output, &manager, &query.join(" ")).await,
        Commands::Remove { keys } => reference::remove(output, &manager, &keys).await,
        Commands::Refresh { key } => reference::refresh(output, &manager, &key).await,
        Commands::Config { .. } => Ok(()),
    }
}

/// Builds the manager for one command from the loaded configuration
fn open_manager(config: &Config, library_path: PathBuf, mutating: bool) -> Result<ReferenceManager> {
    let policy = config.library.doi_keys;
    let store = if mutating && config.library.backup_on_open {
        LibraryStore::open_with_backup(&library_path, policy)
    } else {
        LibraryStore::open(&library_path, policy)
    }
    .with_context(|| format!("Failed to open library {}", library_path.display()))?;

    let network = &config.network;
    let resolver: Arc<dyn Resolver> = Arc::new(HttpResolver::new(
        &network.registry_url,
        network.timeout(),
        &network.user_agent(),
    )?);
    let fetcher = FetchCoalescer::new(resolver, network.retry_policy());
    let formatter = Formatter::new(config.library.full_container_titles);

    Ok(ReferenceManager::new(store, fetcher, formatter, config.default_format))
}

/// Logs go to stderr; `RUST_LOG` wins over `--verbose`
fn init_tracing(verbose: bool) {
    let default = if verbose { "citekeep_cli=debug" } else { "warn" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));

    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .try_init();
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn cli_definition_is_valid() {
        Cli::command().debug_assert();
    }

    #[test]
    fn parses_add_with_format() {
        let cli = Cli::try_parse_from(["citekeep", "add", "10.1000/a", "10.1000/b", "-f", "md"]).unwrap();
        match cli.command {
            Commands::Add { dois, format } => {
                assert_eq!(dois, vec!["10.1000/a", "10.1000/b"]);
                assert_eq!(format, Some(Format::Md));
            }
            _ => panic!("expected add"),
        }
    }

    #[test]
    fn rejects_bad_keys_and_formats() {
        assert!(Cli::try_parse_from(["citekeep", "show", "Not-A-Key"]).is_err());
        assert!(Cli::try_parse_from(["citekeep", "cite", "smith2020", "-f", "pdf"]).is_err());
        assert!(Cli::try_parse_from(["citekeep", "list", "--sort", "random"]).is_err());
    }

    #[test]
    fn only_mutating_commands_back_up() {
        let cli = Cli::try_parse_from(["citekeep", "remove", "smith2020"]).unwrap();
        assert!(cli.command.mutates_library());

        let cli = Cli::try_parse_from(["citekeep", "list"]).unwrap();
        assert!(!cli.command.mutates_library());
    }
}
