//! Fingerprint command implementation.

use std::path::PathBuf;

use anyhow::Result;
use tracing::info;

use crate::utils::fingerprint_file;

/// Execute the fingerprint command.
///
/// Prints `<digest>  <perceptual hash>  <path>` per file, like `sha256sum`,
/// or one JSON object per line with `--json`.
pub fn execute(files: Vec<PathBuf>, json: bool) -> Result<()> {
    for file in files {
        let fingerprint = fingerprint_file(&file)?;
        info!(path = %file.display(), digest = %fingerprint.digest, "Fingerprinted");

        if json {
            println!(
                "{}",
                serde_json::json!({
                    "path": file.display().to_string(),
                    "fingerprint": fingerprint.digest.to_hex(),
                    "perceptual_hash": fingerprint.perceptual_hash.to_hex(),
                })
            );
        } else {
            println!(
                "{}  {}  {}",
                fingerprint.digest,
                fingerprint.perceptual_hash,
                file.display()
            );
        }
    }

    Ok(())
}
