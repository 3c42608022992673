//! Exact-match search command implementation.

use std::path::PathBuf;

use anyhow::{Context, Result};
use colored::Colorize;
use imprint_core::{ExactMatchSearcher, MatchResult};
use tracing::info;

use crate::utils::{fingerprint_file, short_hex};

/// Execute the search command.
///
/// Prints one matching dataset identifier per line, or a [`MatchResult`]
/// with `--json`. No matches (and exit 0) means the dataset holds no copy of
/// the image.
pub async fn execute(
    file: PathBuf,
    dataset: PathBuf,
    recursive: bool,
    json: bool,
    quiet: bool,
) -> Result<()> {
    let fingerprint = fingerprint_file(&file)?;

    let searcher = ExactMatchSearcher::new(&dataset).recursive(recursive);
    let matches = searcher
        .find_exact_blocking(fingerprint.digest)
        .await
        .with_context(|| format!("Failed to search dataset {}", dataset.display()))?;

    info!(
        query = %file.display(),
        dataset = %dataset.display(),
        matches = matches.len(),
        "Exact search complete"
    );

    let result = MatchResult::exact(file.display().to_string(), matches);
    if json {
        println!(
            "{}",
            serde_json::to_string_pretty(&result).context("Failed to serialize result")?
        );
        return Ok(());
    }

    if !quiet {
        eprintln!(
            "{} {} ({})",
            "Searching for".dimmed(),
            file.display(),
            short_hex(&fingerprint.digest.to_hex())
        );
        if result.is_empty() {
            eprintln!("{}", "No exact matches found".yellow());
        } else {
            eprintln!(
                "{}",
                format!("{} exact match(es):", result.matches.len())
                    .green()
                    .bold()
            );
        }
    }

    for m in &result.matches {
        println!("{}", m.identifier);
    }

    Ok(())
}
