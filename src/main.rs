//! citekeep - DOI-based personal reference manager

use std::process::ExitCode;

fn main() -> ExitCode {
    if let Err(e) = citekeep_cli::cli::run() {
        eprintln!("Error: {:#}", e);
        ExitCode::FAILURE
    } else {
        ExitCode::SUCCESS
    }
}
