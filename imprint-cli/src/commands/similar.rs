//! Similarity search command implementation.

use std::path::PathBuf;

use anyhow::{Context, Result};
use colored::Colorize;
use imprint_core::{FingerprintStore, MatchResult, SimilaritySearcher};
use tracing::info;

use crate::utils::{fingerprint_file, open_store};
use crate::StoreArgs;

/// Execute the similar command.
///
/// Compares the image's perceptual hash against every stored fingerprint and
/// prints `<distance>  <key>` lines, closest first (or a [`MatchResult`]
/// with `--json`).
pub async fn execute(
    file: PathBuf,
    store_args: StoreArgs,
    threshold: u32,
    limit: Option<usize>,
    json: bool,
    quiet: bool,
) -> Result<()> {
    let fingerprint = fingerprint_file(&file)?;
    let store = open_store(&store_args).await?;
    let records = store
        .list()
        .await
        .context("Failed to read stored fingerprints")?;

    let mut searcher = SimilaritySearcher::new(threshold);
    if let Some(limit) = limit {
        searcher = searcher.with_limit(limit);
    }
    let matches = searcher.find_similar(
        &fingerprint.perceptual_hash,
        records.iter().map(|r| (r.key.as_str(), r.perceptual_hash)),
    );

    info!(
        query = %file.display(),
        candidates = records.len(),
        threshold,
        matches = matches.len(),
        "Similarity search complete"
    );

    let result = MatchResult {
        query: file.display().to_string(),
        matches,
    };
    if json {
        println!(
            "{}",
            serde_json::to_string_pretty(&result).context("Failed to serialize result")?
        );
        return Ok(());
    }

    if !quiet {
        eprintln!(
            "{} {} {} {}",
            "Compared against".dimmed(),
            records.len(),
            "stored fingerprint(s), threshold".dimmed(),
            threshold
        );
        if result.is_empty() {
            eprintln!("{}", "No similar images found".yellow());
        }
    }

    for m in &result.matches {
        println!("{:>2}  {}", m.distance, m.identifier);
    }

    Ok(())
}
