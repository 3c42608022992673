//! Common utility functions shared across CLI commands.

use std::path::Path;

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use imprint_core::{FingerprintEngine, ImageFingerprint, SqliteFingerprintStore};
use tracing::debug;

use crate::StoreArgs;

/// The CLI runs one command at a time; a single connection is enough.
const STORE_MAX_CONNECTIONS: u32 = 1;

/// Read an image file from disk.
pub fn read_image(path: &Path) -> Result<Vec<u8>> {
    let data =
        std::fs::read(path).with_context(|| format!("Failed to read file: {}", path.display()))?;
    debug!(path = %path.display(), bytes = data.len(), "Read file");
    Ok(data)
}

/// Read and fingerprint an image file.
pub fn fingerprint_file(path: &Path) -> Result<ImageFingerprint> {
    let data = read_image(path)?;
    FingerprintEngine::new()
        .analyze(&data)
        .with_context(|| format!("Failed to fingerprint {}", path.display()))
}

/// Open (and migrate) the fingerprint store.
pub async fn open_store(args: &StoreArgs) -> Result<SqliteFingerprintStore> {
    SqliteFingerprintStore::connect(&args.database, STORE_MAX_CONNECTIONS)
        .await
        .with_context(|| format!("Failed to open fingerprint store at {}", args.database))
}

/// Content key for a file: its base name.
pub fn file_key(path: &Path) -> String {
    path.file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| path.display().to_string())
}

/// Format a timestamp as a human-readable UTC string.
pub fn format_timestamp(timestamp: &DateTime<Utc>) -> String {
    timestamp.format("%Y-%m-%d %H:%M:%S UTC").to_string()
}

/// Shorten a hex digest for display.
pub fn short_hex(hex: &str) -> &str {
    hex.get(..16).unwrap_or(hex)
}
