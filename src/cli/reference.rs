//! Record commands (add, show, cite, remove, refresh)

use std::sync::Arc;

use anyhow::{bail, Context, Result};
use tokio::task::JoinSet;

use super::output::Output;
use crate::domain::{CitationKey, CitationRecord, Format, InsertOutcome};
use crate::manager::ReferenceManager;

fn outcome_label(outcome: InsertOutcome) -> &'static str {
    match outcome {
        InsertOutcome::Inserted => "added",
        InsertOutcome::Updated => "updated",
        InsertOutcome::Unchanged => "unchanged",
    }
}

/// Resolves every DOI concurrently and stores the results
pub async fn add(
    output: &Output,
    manager: Arc<ReferenceManager>,
    dois: Vec<String>,
    format: Option<Format>,
) -> Result<()> {
    let total = dois.len();
    output.verbose_ctx("add", &format!("Resolving {} DOI(s)", total));

    let mut tasks = JoinSet::new();
    for (index, doi) in dois.into_iter().enumerate() {
        let manager = Arc::clone(&manager);
        tasks.spawn(async move {
            let result = manager.add(&doi, format).await;
            (index, doi, result)
        });
    }

    let mut results = Vec::with_capacity(total);
    while let Some(joined) = tasks.join_next().await {
        results.push(joined.context("Resolution task failed")?);
    }
    results.sort_by_key(|(index, _, _)| *index);

    let stats = manager.fetch_stats();
    output.verbose_ctx(
        "add",
        &format!(
            "Registry calls: {}, retries: {}, coalesced: {}",
            stats.resolver_calls, stats.retries, stats.coalesced
        ),
    );

    let mut failures = 0;
    let mut items = Vec::new();
    for (_, doi, result) in results {
        match result {
            Ok(stored) => {
                let record = &stored.record;
                if output.is_json() {
                    items.push(serde_json::json!({
                        "doi": record.doi,
                        "key": record.key,
                        "format": record.format,
                        "outcome": outcome_label(stored.outcome),
                        "text": record.text,
                    }));
                } else {
                    let message = match stored.outcome {
                        InsertOutcome::Inserted => format!("Added {} ({})", record.key, record.doi),
                        InsertOutcome::Updated => format!("Updated {} ({})", record.key, record.doi),
                        InsertOutcome::Unchanged => {
                            format!("{} ({}) is already in the library", record.key, record.doi)
                        }
                    };
                    output.success(&message);
                    output.verbose_ctx("add", &record.text);
                }
            }
            Err(err) => {
                failures += 1;
                if output.is_json() {
                    items.push(serde_json::json!({
                        "doi": doi,
                        "error": err.to_string(),
                    }));
                } else {
                    output.error(&format!("{}: {}", doi, err));
                }
            }
        }
    }

    if output.is_json() {
        output.data(&items);
    }

    if failures > 0 {
        bail!("{} of {} DOI(s) could not be added", failures, total);
    }
    Ok(())
}

/// Shows one record in full
pub async fn show(output: &Output, manager: &ReferenceManager, key: &CitationKey) -> Result<()> {
    let record = match manager.lookup(key).await {
        Some(record) => record,
        None => bail!("No record with key '{}'", key),
    };

    if output.is_json() {
        output.data(&record);
    } else {
        print_record(&record);
    }

    Ok(())
}

fn print_record(record: &CitationRecord) {
    let meta = &record.metadata;
    let authors: Vec<String> = meta.authors.iter().map(|a| a.inverted()).collect();

    println!("Key:       {}", record.key);
    println!("DOI:       {}", record.doi);
    println!("Type:      {}", meta.kind.label());
    if !authors.is_empty() {
        println!("Authors:   {}", authors.join("; "));
    }
    if let Some(title) = meta.title() {
        println!("Title:     {}", title);
    }
    if let Some(container) = meta.container(false) {
        println!("Container: {}", container);
    }
    if let Some(year) = meta.year {
        println!("Year:      {}", year);
    }
    for (label, value) in [
        ("Volume:   ", &meta.volume),
        ("Issue:    ", &meta.issue),
        ("Pages:    ", &meta.pages),
        ("Publisher:", &meta.publisher),
    ] {
        if let Some(value) = value {
            println!("{} {}", label, value);
        }
    }
    println!("Format:    {}", record.format);
    println!("Added:     {}", record.added_at.format("%Y-%m-%d %H:%M"));
    println!("Updated:   {}", record.updated_at.format("%Y-%m-%d %H:%M"));
    println!();
    println!("{}", record.text);
}

/// Prints citation text for each key
pub async fn cite(
    output: &Output,
    manager: &ReferenceManager,
    keys: &[CitationKey],
    format: Option<Format>,
) -> Result<()> {
    let mut items = Vec::new();
    for key in keys {
        let text = manager.cite(key, format).await?;
        if output.is_json() {
            items.push(serde_json::json!({
                "key": key,
                "format": format,
                "text": text,
            }));
        } else {
            println!("{}", text);
        }
    }

    if output.is_json() {
        output.data(&items);
    }
    Ok(())
}

/// Removes each key, reporting the ones that were not found
pub async fn remove(output: &Output, manager: &ReferenceManager, keys: &[CitationKey]) -> Result<()> {
    let mut failures = 0;
    for key in keys {
        match manager.remove(key).await {
            Ok(record) => {
                output.verbose_ctx("remove", &format!("Removed DOI {}", record.doi));
                output.success(&format!("Removed {}", key));
            }
            Err(err) => {
                failures += 1;
                output.error(&err.to_string());
            }
        }
    }

    if failures > 0 {
        bail!("{} of {} key(s) could not be removed", failures, keys.len());
    }
    Ok(())
}

/// Re-resolves a record and reports which fields changed
pub async fn refresh(output: &Output, manager: &ReferenceManager, key: &CitationKey) -> Result<()> {
    let refreshed = manager.refresh(key).await?;

    if output.is_json() {
        output.data(&serde_json::json!({
            "key": key,
            "changed": refreshed.changed,
            "outcome": outcome_label(refreshed.outcome),
        }));
    } else if refreshed.changed.is_empty() && !refreshed.outcome.changed() {
        output.success(&format!("{} is up to date", key));
    } else if refreshed.changed.is_empty() {
        output.success(&format!("Refreshed {}", key));
    } else {
        output.success(&format!(
            "Refreshed {}: {} changed",
            key,
            refreshed.changed.join(", ")
        ));
    }

    Ok(())
}
