//! HTTP request handlers
//!
//! This module contains all the request handlers for the API endpoints.

pub mod analyze;
pub mod fingerprints;
pub mod health;

pub use crate::state::AppState;
pub use analyze::{
    analyze_handler, AnalyzeResponse, ArtifactsResponse, SimilarMatchResponse,
    StageErrorResponse, VerdictResponse,
};
pub use fingerprints::{
    delete_fingerprint_handler, get_fingerprint_handler, list_fingerprints_handler,
    DeleteFingerprintResponse, FingerprintListResponse, FingerprintResponse,
};
pub use health::{health, ready, HealthResponse, ReadyResponse};
