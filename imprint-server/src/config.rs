//! Server configuration module
//!
//! Handles loading configuration from environment variables with sensible defaults.

use std::net::{IpAddr, Ipv4Addr, SocketAddr};
use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

use imprint_core::pipeline::{
    PipelineConfig, ReportPolicy, DEFAULT_MAX_SIMILAR_RESULTS, DEFAULT_MIN_CONFIDENCE,
};
use imprint_core::search::DEFAULT_THRESHOLD;

/// Server configuration loaded from environment variables
#[derive(Debug, Clone)]
pub struct Config {
    /// Server port (default: 3000)
    pub port: u16,
    /// Server host (default: 127.0.0.1)
    pub host: IpAddr,
    /// Allowed CORS origins, comma-separated (default: allow all in dev)
    pub allowed_origins: Option<Vec<String>>,
    /// Request body limit in MB (default: 50)
    pub body_limit_mb: usize,
    /// Maximum file size per upload in MB (default: 25)
    pub max_file_size_mb: usize,
    /// Request timeout in seconds (default: 60)
    pub timeout_secs: u64,
    /// Enable rate limiting (default: false for tests, true when loaded from env)
    pub rate_limit_enabled: bool,
    /// Rate limit: requests per second (default: 10)
    pub rate_limit_per_sec: u64,
    /// Rate limit: burst size (default: 20)
    pub rate_limit_burst: u32,
    /// SQLite database URL (default: sqlite:imprint.db)
    pub database_url: String,
    /// Database connection pool maximum connections (default: 5)
    pub database_max_connections: u32,
    /// Reference dataset for exact-match search (default: dataset)
    pub dataset_dir: PathBuf,
    /// Walk dataset subdirectories (default: false)
    pub dataset_recursive: bool,
    /// Cache dataset digests between requests (default: true)
    pub dataset_cache: bool,
    /// Where alert and takedown artifacts are written (default: alerts)
    pub alerts_dir: PathBuf,
    /// Inference endpoint for the authenticity classifier
    pub classifier_url: Option<String>,
    /// Classifier request timeout in seconds (default: 30)
    pub classifier_timeout_secs: u64,
    /// Allow the fixed-verdict classifier (default: false, enable with ALLOW_MOCK_CLASSIFIER=true)
    pub allow_mock_classifier: bool,
    /// Maximum Hamming distance for similar matches (default: 10)
    pub similarity_threshold: u32,
    /// Cap on similar matches per response (default: 25)
    pub max_similar_results: usize,
    /// When to produce incident artifacts (default: fake verdicts at >= 0.5)
    pub report_policy: ReportPolicy,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            port: 3000,
            host: IpAddr::V4(Ipv4Addr::LOCALHOST),
            allowed_origins: None, // None = allow all (dev mode)
            body_limit_mb: 50,
            max_file_size_mb: 25,
            timeout_secs: 60,
            rate_limit_enabled: false, // Disabled by default (for tests)
            rate_limit_per_sec: 10,
            rate_limit_burst: 20,
            database_url: "sqlite:imprint.db".to_string(),
            database_max_connections: 5,
            dataset_dir: PathBuf::from("dataset"),
            dataset_recursive: false,
            dataset_cache: true,
            alerts_dir: PathBuf::from("alerts"),
            classifier_url: None,
            classifier_timeout_secs: 30,
            // Enabled by default for tests; from_env() defaults to false
            allow_mock_classifier: true,
            similarity_threshold: DEFAULT_THRESHOLD,
            max_similar_results: DEFAULT_MAX_SIMILAR_RESULTS,
            report_policy: ReportPolicy::default(),
        }
    }
}

impl Config {
    /// Load configuration from environment variables
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Load configuration from an arbitrary variable source.
    pub fn from_lookup(var: impl Fn(&str) -> Option<String>) -> Self {
        let defaults = Self::default();
        let flag = |key: &str, default: bool| {
            var(key)
                .map(|v| match v.trim().to_lowercase().as_str() {
                    "true" | "1" | "yes" => true,
                    "false" | "0" | "no" => false,
                    _ => default,
                })
                .unwrap_or(default)
        };

        let host = match var("HOST") {
            Some(h) => h.trim().parse().unwrap_or_else(|_| {
                tracing::warn!(host = %h, "Invalid HOST, falling back to 127.0.0.1");
                defaults.host
            }),
            None => defaults.host,
        };

        let allowed_origins = var("ALLOWED_ORIGINS").map(|origins| {
            origins
                .split(',')
                .map(|s| s.trim().to_string())
                .filter(|s| !s.is_empty())
                .collect()
        });

        let min_confidence =
            parse_var(&var, "REPORT_MIN_CONFIDENCE").unwrap_or(DEFAULT_MIN_CONFIDENCE);
        let report_policy = match var("REPORT_POLICY") {
            Some(mode) => ReportPolicy::parse(&mode, min_confidence).unwrap_or_else(|e| {
                tracing::warn!(error = %e, "Invalid REPORT_POLICY, using default");
                ReportPolicy::FakeLabel { min_confidence }
            }),
            None => ReportPolicy::FakeLabel { min_confidence },
        };

        Self {
            port: parse_var(&var, "PORT").unwrap_or(defaults.port),
            host,
            allowed_origins,
            body_limit_mb: parse_var(&var, "BODY_LIMIT_MB").unwrap_or(defaults.body_limit_mb),
            max_file_size_mb: parse_var(&var, "MAX_FILE_SIZE_MB")
                .unwrap_or(defaults.max_file_size_mb),
            timeout_secs: parse_var(&var, "REQUEST_TIMEOUT_SECS").unwrap_or(defaults.timeout_secs),
            // On by default in production; RATE_LIMIT_ENABLED=false turns it off
            rate_limit_enabled: flag("RATE_LIMIT_ENABLED", true),
            rate_limit_per_sec: parse_var(&var, "RATE_LIMIT_PER_SEC")
                .unwrap_or(defaults.rate_limit_per_sec),
            rate_limit_burst: parse_var(&var, "RATE_LIMIT_BURST")
                .unwrap_or(defaults.rate_limit_burst),
            database_url: var("DATABASE_URL").unwrap_or(defaults.database_url),
            database_max_connections: parse_var(&var, "DATABASE_MAX_CONNECTIONS")
                .unwrap_or(defaults.database_max_connections),
            dataset_dir: var("DATASET_DIR")
                .map(PathBuf::from)
                .unwrap_or(defaults.dataset_dir),
            dataset_recursive: flag("DATASET_RECURSIVE", defaults.dataset_recursive),
            dataset_cache: flag("DATASET_CACHE", defaults.dataset_cache),
            alerts_dir: var("ALERTS_DIR")
                .map(PathBuf::from)
                .unwrap_or(defaults.alerts_dir),
            classifier_url: var("CLASSIFIER_URL").filter(|u| !u.trim().is_empty()),
            classifier_timeout_secs: parse_var(&var, "CLASSIFIER_TIMEOUT_SECS")
                .unwrap_or(defaults.classifier_timeout_secs),
            allow_mock_classifier: flag("ALLOW_MOCK_CLASSIFIER", false),
            similarity_threshold: parse_var(&var, "SIMILARITY_THRESHOLD")
                .unwrap_or(defaults.similarity_threshold),
            max_similar_results: parse_var(&var, "MAX_SIMILAR_RESULTS")
                .unwrap_or(defaults.max_similar_results),
            report_policy,
        }
    }

    /// Get socket address from config
    pub fn socket_addr(&self) -> SocketAddr {
        SocketAddr::new(self.host, self.port)
    }

    /// Per-upload limit in bytes, saturating at `usize::MAX`.
    pub fn max_file_size(&self) -> usize {
        self.max_file_size_mb.saturating_mul(1024 * 1024)
    }

    /// Whole-request body limit in bytes, saturating at `usize::MAX`.
    pub fn body_limit(&self) -> usize {
        self.body_limit_mb.saturating_mul(1024 * 1024)
    }

    pub fn classifier_timeout(&self) -> Duration {
        Duration::from_secs(self.classifier_timeout_secs)
    }

    pub fn pipeline_config(&self) -> PipelineConfig {
        PipelineConfig {
            similarity_threshold: self.similarity_threshold,
            max_similar_results: self.max_similar_results,
            report_policy: self.report_policy,
        }
    }
}

fn parse_var<T: FromStr>(var: &impl Fn(&str) -> Option<String>, key: &str) -> Option<T> {
    let raw = var(key)?;
    match raw.trim().parse() {
        Ok(value) => Some(value),
        Err(_) => {
            tracing::warn!(key, value = %raw, "Ignoring unparseable environment variable");
            None
        }
    }
}
