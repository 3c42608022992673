//! Dataset bootstrap: download reference images listed in a manifest.
//!
//! Manifest format, one entry per line:
//!
//! ```text
//! # comments and blank lines are ignored
//! faces/alice.jpg https://example.org/images/alice.jpg
//! ```
//!
//! The path is relative to the dataset directory. Each download is retried
//! with exponential backoff on transient failures, and every body must decode
//! as an image before it is written.

use std::path::{Component, Path, PathBuf};
use std::sync::atomic::{AtomicU32, Ordering};
use std::time::Duration;

use anyhow::{anyhow, Context, Result};
use backoff::{future::retry_notify, ExponentialBackoff};
use clap::Args;
use colored::Colorize;
use reqwest::{Client, StatusCode};
use tracing::{debug, instrument, warn};

use crate::exit_codes::{CodedError, DATA_ERROR, NETWORK_ERROR};

/// Bodies smaller than this are error pages or truncated transfers.
const MIN_BODY_BYTES: usize = 200;

const INITIAL_INTERVAL: Duration = Duration::from_millis(200);
const MAX_INTERVAL: Duration = Duration::from_secs(5);

#[derive(Args)]
pub struct BootstrapArgs {
    /// Manifest of "relative/path URL" lines
    #[arg(short, long, value_name = "FILE")]
    pub manifest: PathBuf,

    /// Dataset directory to populate
    #[arg(short, long, env = "DATASET_DIR", default_value = "dataset")]
    pub dataset: PathBuf,

    /// Attempts per download before giving up
    #[arg(long, default_value_t = 3, value_parser = clap::value_parser!(u32).range(1..))]
    pub max_attempts: u32,

    /// Per-request timeout in seconds
    #[arg(long, default_value_t = 30)]
    pub timeout: u64,

    /// Re-download files that already exist
    #[arg(long)]
    pub force: bool,
}

/// One manifest line.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ManifestEntry {
    pub path: PathBuf,
    pub url: String,
}

/// Parse manifest text. Errors name the offending line.
pub fn parse_manifest(text: &str) -> Result<Vec<ManifestEntry>, CodedError> {
    let mut entries = Vec::new();

    for (index, raw) in text.lines().enumerate() {
        let line_no = index + 1;
        let line = raw.trim();
        if line.is_empty() || line.starts_with('#') {
            continue;
        }

        let mut parts = line.split_whitespace();
        let (Some(path), Some(url), None) = (parts.next(), parts.next(), parts.next()) else {
            return Err(CodedError::new(
                DATA_ERROR,
                format!("manifest line {}: expected \"relative/path URL\"", line_no),
            ));
        };

        let path = PathBuf::from(path);
        let escapes = path
            .components()
            .any(|c| !matches!(c, Component::Normal(_) | Component::CurDir));
        if escapes {
            return Err(CodedError::new(
                DATA_ERROR,
                format!(
                    "manifest line {}: path '{}' must stay inside the dataset directory",
                    line_no,
                    path.display()
                ),
            ));
        }

        if !(url.starts_with("http://") || url.starts_with("https://")) {
            return Err(CodedError::new(
                DATA_ERROR,
                format!("manifest line {}: '{}' is not an http(s) URL", line_no, url),
            ));
        }

        entries.push(ManifestEntry {
            path,
            url: url.to_string(),
        });
    }

    Ok(entries)
}

/// Reject bodies that are too small or are not images.
fn validate_body(body: &[u8]) -> Result<()> {
    if body.len() < MIN_BODY_BYTES {
        return Err(anyhow!(
            "response too small ({} bytes, minimum {})",
            body.len(),
            MIN_BODY_BYTES
        ));
    }
    image::load_from_memory(body).context("response is not a decodable image")?;
    Ok(())
}

fn is_transient_error(error: &reqwest::Error) -> bool {
    error.is_timeout() || error.is_connect() || error.is_request()
}

fn is_transient_status(status: StatusCode) -> bool {
    matches!(
        status,
        StatusCode::TOO_MANY_REQUESTS
            | StatusCode::INTERNAL_SERVER_ERROR
            | StatusCode::BAD_GATEWAY
            | StatusCode::SERVICE_UNAVAILABLE
            | StatusCode::GATEWAY_TIMEOUT
    )
}

/// One download attempt. Transient failures are only retryable while
/// attempts remain.
async fn fetch_once(
    client: &Client,
    url: &str,
    retry_allowed: bool,
) -> std::result::Result<Vec<u8>, backoff::Error<anyhow::Error>> {
    let classify = |err: anyhow::Error, transient: bool| {
        if transient && retry_allowed {
            backoff::Error::transient(err)
        } else {
            backoff::Error::permanent(err)
        }
    };

    let response = client.get(url).send().await.map_err(|e| {
        let transient = is_transient_error(&e);
        classify(anyhow!("request failed: {e}"), transient)
    })?;

    let status = response.status();
    if !status.is_success() {
        return Err(classify(
            anyhow!("server returned {status}"),
            is_transient_status(status),
        ));
    }

    let body = response
        .bytes()
        .await
        .map_err(|e| classify(anyhow!("failed to read body: {e}"), true))?;

    validate_body(&body).map_err(backoff::Error::permanent)?;
    Ok(body.to_vec())
}

/// Download one URL with bounded exponential backoff.
#[instrument(level = "debug", skip(client))]
async fn download(
    client: &Client,
    url: &str,
    max_attempts: u32,
    timeout: Duration,
) -> Result<Vec<u8>> {
    let attempts = AtomicU32::new(0);
    let policy = ExponentialBackoff {
        initial_interval: INITIAL_INTERVAL,
        max_interval: MAX_INTERVAL,
        max_elapsed_time: Some(timeout * max_attempts),
        ..Default::default()
    };

    let operation = || {
        let attempt = attempts.fetch_add(1, Ordering::Relaxed) + 1;
        debug!(attempt, "Downloading");
        fetch_once(client, url, attempt < max_attempts)
    };

    retry_notify(policy, operation, |err: anyhow::Error, wait: Duration| {
        warn!(error = %err, retry_in_ms = wait.as_millis() as u64, "Download failed, will retry");
    })
    .await
}

async fn write_entry(dataset: &Path, entry: &ManifestEntry, body: &[u8]) -> Result<PathBuf> {
    let dest = dataset.join(&entry.path);
    if let Some(parent) = dest.parent() {
        tokio::fs::create_dir_all(parent)
            .await
            .with_context(|| format!("Failed to create {}", parent.display()))?;
    }
    tokio::fs::write(&dest, body)
        .await
        .with_context(|| format!("Failed to write {}", dest.display()))?;
    Ok(dest)
}

/// Execute the bootstrap command.
pub async fn execute(args: BootstrapArgs, quiet: bool) -> Result<()> {
    let text = tokio::fs::read_to_string(&args.manifest)
        .await
        .with_context(|| format!("Failed to read manifest: {}", args.manifest.display()))?;
    let entries = parse_manifest(&text)?;

    let timeout = Duration::from_secs(args.timeout);
    let client = Client::builder()
        .timeout(timeout)
        .build()
        .context("Failed to create HTTP client")?;

    let mut downloaded = 0usize;
    let mut skipped = 0usize;
    let mut failed = 0usize;

    for entry in &entries {
        let dest = args.dataset.join(&entry.path);
        if !args.force && dest.exists() {
            skipped += 1;
            if !quiet {
                println!("{} {}", "skip".dimmed(), entry.path.display());
            }
            continue;
        }

        let outcome = match download(&client, &entry.url, args.max_attempts, timeout).await {
            Ok(body) => write_entry(&args.dataset, entry, &body).await,
            Err(e) => Err(e),
        };

        match outcome {
            Ok(_) => {
                downloaded += 1;
                if !quiet {
                    println!("{} {}", "ok".green(), entry.path.display());
                }
            }
            Err(e) => {
                failed += 1;
                warn!(
                    path = %entry.path.display(),
                    url = %entry.url,
                    error = %e,
                    "Download failed"
                );
                eprintln!("{} {}: {:#}", "fail".red(), entry.path.display(), e);
            }
        }
    }

    if !quiet {
        eprintln!(
            "{}",
            format!(
                "{} downloaded, {} skipped, {} failed",
                downloaded, skipped, failed
            )
            .dimmed()
        );
    }

    if failed > 0 {
        return Err(CodedError::new(
            NETWORK_ERROR,
            format!("{} of {} downloads failed", failed, entries.len()),
        )
        .into());
    }

    Ok(())
}
