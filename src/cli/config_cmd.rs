//! Config command

use std::path::Path;

use anyhow::{anyhow, Result};

use super::output::Output;
use crate::storage::Config;

/// Shows the effective configuration, its path, or writes a default file
pub fn run(
    output: &Output,
    config: &Config,
    explicit_path: Option<&Path>,
    path_only: bool,
    init: bool,
) -> Result<()> {
    let path = match explicit_path {
        Some(path) => path.to_path_buf(),
        None => Config::default_path()
            .ok_or_else(|| anyhow!("Could not determine config directory"))?,
    };

    if init {
        if path.exists() {
            output.success(&format!("Config already exists at {}", path.display()));
        } else {
            Config::default().save(&path)?;
            output.success(&format!("Wrote default config to {}", path.display()));
        }
        return Ok(());
    }

    if path_only {
        if output.is_json() {
            output.data(&serde_json::json!({ "path": path }));
        } else {
            println!("{}", path.display());
        }
        return Ok(());
    }

    let library = config.library_file().ok();
    if output.is_json() {
        output.data(&serde_json::json!({
            "path": path,
            "exists": path.exists(),
            "library": library,
            "config": config,
        }));
    } else {
        if path.exists() {
            println!("# {}", path.display());
        } else {
            println!("# {} (not found, using defaults)", path.display());
        }
        if let Some(library) = library {
            println!("# library: {}", library.display());
        }
        print!("{}", config.to_toml()?);
    }

    Ok(())
}
