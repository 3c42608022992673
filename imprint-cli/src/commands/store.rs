//! Fingerprint store administration commands.

use anyhow::{Context, Result};
use colored::Colorize;
use imprint_core::FingerprintStore;

use crate::exit_codes::{CodedError, INPUT_ERROR};
use crate::utils::{format_timestamp, open_store};
use crate::{StoreAction, StoreArgs};

fn no_such_key(key: &str) -> CodedError {
    CodedError::new(INPUT_ERROR, format!("No fingerprint for key '{}'", key))
}

/// Execute a store subcommand.
pub async fn execute(args: StoreArgs, action: StoreAction, quiet: bool) -> Result<()> {
    let store = open_store(&args).await?;

    match action {
        StoreAction::List => {
            let records = store.list().await.context("Failed to list fingerprints")?;
            for record in &records {
                println!(
                    "{}  {}  {}  {}",
                    record.hash_value,
                    record.perceptual_hash,
                    format_timestamp(&record.updated_at),
                    record.key
                );
            }
            if !quiet {
                eprintln!("{}", format!("{} fingerprint(s)", records.len()).dimmed());
            }
        }
        StoreAction::Get { key } => {
            let record = store
                .get(&key)
                .await
                .context("Failed to read fingerprint")?
                .ok_or_else(|| no_such_key(&key))?;

            println!("{} {}", "Key:".dimmed(), record.key);
            println!("{} {}", "Fingerprint:".dimmed(), record.hash_value);
            println!("{} {}", "Perceptual hash:".dimmed(), record.perceptual_hash);
            println!(
                "{} {}",
                "Updated:".dimmed(),
                format_timestamp(&record.updated_at)
            );
        }
        StoreAction::Delete { key } => {
            let deleted = store
                .delete(&key)
                .await
                .context("Failed to delete fingerprint")?;
            if !deleted {
                return Err(no_such_key(&key).into());
            }
            if !quiet {
                println!("{} {}", "Deleted".green(), key);
            }
        }
        StoreAction::Count => {
            let count = store.count().await.context("Failed to count fingerprints")?;
            println!("{}", count);
        }
    }

    Ok(())
}
