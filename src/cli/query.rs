//! Query commands (list, search)

use anyhow::Result;

use super::output::Output;
use crate::domain::SortMode;
use crate::manager::ReferenceManager;

/// List the whole library
pub async fn list(
    output: &Output,
    manager: &ReferenceManager,
    sort: SortMode,
    reverse: bool,
) -> Result<()> {
    output.verbose_ctx("list", &format!("Sort: {:?}, reverse: {}", sort, reverse));
    let records = manager.list(sort, reverse).await;

    if output.is_json() {
        output.data(&records);
    } else if records.is_empty() {
        println!("Library is empty.");
    } else {
        output.record_rows(&records);
        println!();
        println!("{} record(s)", records.len());
    }

    Ok(())
}

/// Search the library
pub async fn search(output: &Output, manager: &ReferenceManager, query: &str) -> Result<()> {
    output.verbose_ctx("search", &format!("Searching for: {}", query));
    let results = manager.search(query).await;
    output.verbose_ctx("search", &format!("Found {} results", results.len()));

    if output.is_json() {
        output.data(&results);
    } else if results.is_empty() {
        println!("No results found for '{}'", query);
    } else {
        println!("Search results for '{}':", query);
        output.record_rows(&results);
        println!();
        println!("Found {} result(s)", results.len());
    }

    Ok(())
}
