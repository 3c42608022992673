//! Imprint Core - image fingerprinting and misuse detection
//!
//! This crate provides the building blocks for checking whether an uploaded
//! image already exists in a reference dataset, resembles previously seen
//! uploads, or is likely synthetic.
//!
//! # Features
//!
//! - SHA-256 content digest over a normalized 128x128 grayscale raster
//! - 64-bit perceptual hash (Blockhash) for near-duplicate search
//! - Upserting fingerprint store (SQLite or in-memory)
//! - Exact-match scan of a reference dataset directory
//! - Pluggable authenticity classifier
//! - Alert and takedown artifacts for suspicious images
//!
//! # Example
//!
//! ```no_run
//! use std::sync::Arc;
//! use imprint_core::{
//!     AnalysisRequest, ExactMatchSearcher, FileIncidentReporter, FixedClassifier,
//!     MemoryFingerprintStore, Pipeline, PipelineConfig,
//! };
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let pipeline = Pipeline::new(
//!     Arc::new(MemoryFingerprintStore::new()),
//!     ExactMatchSearcher::new("dataset"),
//!     Arc::new(FixedClassifier::default()),
//!     Arc::new(FileIncidentReporter::new("alerts")),
//!     PipelineConfig::default(),
//! );
//!
//! let bytes = std::fs::read("photo.jpg")?;
//! let result = pipeline.analyze(AnalysisRequest::new("photo.jpg", bytes)).await?;
//! println!("{} exact matches", result.exact_matches.len());
//! # Ok(())
//! # }
//! ```

pub mod classifier;
pub mod error;
pub mod fingerprint;
pub mod pipeline;
pub mod report;
pub mod search;
pub mod store;

#[cfg(test)]
pub(crate) mod test_images;

// Re-export main types for convenience
pub use classifier::{Classifier, FixedClassifier, Label, Verdict};
#[cfg(feature = "http-classifier")]
pub use classifier::{HttpClassifier, HttpClassifierConfig};
pub use error::{
    ClassifierError, DecodeError, PipelineError, ReportError, SearchError, StoreError,
};
pub use fingerprint::{ContentDigest, FingerprintEngine, ImageFingerprint, PerceptualHash};
pub use pipeline::{
    AnalysisRequest, AnalysisResult, InvalidReportPolicy, Pipeline, PipelineConfig, ReportPolicy,
    Stage, StageError,
};
pub use report::{Artifacts, FileIncidentReporter, Incident, IncidentReporter};
pub use search::{find_similar, ExactMatchSearcher, Match, MatchResult, SimilaritySearcher};
pub use store::{FingerprintRecord, FingerprintStore, MemoryFingerprintStore};
#[cfg(feature = "sqlite")]
pub use store::SqliteFingerprintStore;
