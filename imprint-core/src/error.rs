use std::path::PathBuf;

use thiserror::Error;

/// The byte stream could not be turned into a fingerprint.
#[derive(Error, Debug)]
pub enum DecodeError {
    #[error("Failed to decode image: {0}")]
    Image(#[from] image::ImageError),

    #[error("Failed to read {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Fingerprint task failed: {0}")]
    Task(String),
}

/// Errors that can occur when interacting with the fingerprint store.
#[derive(Error, Debug)]
pub enum StoreError {
    /// Database connection failed
    #[error("Database connection error: {0}")]
    Connection(String),

    /// Migration execution failed
    #[error("Migration error: {0}")]
    Migration(String),

    /// SQL query execution failed
    #[error("Query error: {0}")]
    Query(String),

    /// Stored row could not be mapped back into a record
    #[error("Corrupt record for key '{key}': {reason}")]
    Corrupt { key: String, reason: String },

    /// Store is not reachable (used by adapters that front a remote engine)
    #[error("Store unavailable: {0}")]
    Unavailable(String),
}

#[cfg(feature = "sqlite")]
impl From<sqlx::Error> for StoreError {
    fn from(e: sqlx::Error) -> Self {
        Self::Query(e.to_string())
    }
}

#[cfg(feature = "sqlite")]
impl From<sqlx::migrate::MigrateError> for StoreError {
    fn from(e: sqlx::migrate::MigrateError) -> Self {
        Self::Migration(e.to_string())
    }
}

/// The reference dataset could not be enumerated.
#[derive(Error, Debug)]
pub enum SearchError {
    #[error("Dataset folder '{0}' not found")]
    DatasetMissing(PathBuf),

    #[error("Dataset '{path}' is unreadable: {reason}")]
    Unreadable { path: PathBuf, reason: String },

    #[error("Search task failed: {0}")]
    Task(String),
}

/// The external classifier did not produce a usable verdict.
#[derive(Error, Debug)]
pub enum ClassifierError {
    #[error("Classifier request failed: {0}")]
    Request(String),

    #[error("Classifier returned status {0}")]
    Status(u16),

    #[error("Classifier response could not be parsed: {0}")]
    InvalidResponse(String),

    #[error("Classifier confidence {0} is outside [0, 1]")]
    ConfidenceOutOfRange(f64),

    #[error("Classifier unavailable: {0}")]
    Unavailable(String),
}

#[cfg(feature = "http-classifier")]
impl From<reqwest::Error> for ClassifierError {
    fn from(e: reqwest::Error) -> Self {
        Self::Request(e.to_string())
    }
}

/// An incident artifact could not be written.
#[derive(Error, Debug)]
pub enum ReportError {
    #[error("Failed to write artifact {path}: {source}")]
    Write {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Reporter unavailable: {0}")]
    Unavailable(String),
}

/// Errors that abort an analysis request.
///
/// Only the fingerprint and classification stages are fatal; everything else
/// is recorded as a [`StageError`](crate::pipeline::StageError) on the result.
#[derive(Error, Debug)]
pub enum PipelineError {
    #[error(transparent)]
    Decode(#[from] DecodeError),

    #[error(transparent)]
    Classifier(#[from] ClassifierError),
}
