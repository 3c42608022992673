//! Image analysis handler
//!
//! Handles POST /analyze requests: fingerprint, store, search, classify and
//! (when suspicious) report on one uploaded image.

use std::path::Path;

use axum::{
    extract::{Multipart, State},
    Json,
};
use imprint_core::{AnalysisRequest, AnalysisResult};
use serde::Serialize;
use utoipa::ToSchema;

use crate::error::ApiError;
use crate::multipart::MultipartFields;
use crate::state::AppState;

/// A near-duplicate from the fingerprint store.
#[derive(Serialize, ToSchema)]
pub struct SimilarMatchResponse {
    /// Stored content key
    #[schema(example = "3f2a9c0e1b7d4a55b0c1d2e3f4a5b6c7_beach.jpg")]
    pub identifier: String,
    /// Hamming distance between perceptual hashes (0-64)
    #[schema(example = 3)]
    pub distance: u32,
}

/// Classifier verdict.
#[derive(Serialize, ToSchema)]
pub struct VerdictResponse {
    /// "REAL" or "FAKE"
    #[schema(example = "FAKE")]
    pub label: String,
    /// Probability of the label, in [0, 1]
    #[schema(example = 0.93)]
    pub confidence: f64,
}

/// Paths of generated incident artifacts.
#[derive(Serialize, ToSchema)]
pub struct ArtifactsResponse {
    #[schema(example = "alerts/alert_20260101_120000_1a2b3c4d.txt")]
    pub alert_ref: Option<String>,
    #[schema(example = "alerts/takedown_20260101_120000_1a2b3c4d.txt")]
    pub takedown_ref: Option<String>,
}

/// A stage that failed without aborting the analysis.
#[derive(Serialize, ToSchema)]
pub struct StageErrorResponse {
    /// One of "persist", "search" or "report"
    #[schema(example = "persist")]
    pub stage: String,
    #[schema(example = "Store unavailable: database is locked")]
    pub message: String,
}

/// Response for a completed analysis
#[derive(Serialize, ToSchema)]
pub struct AnalyzeResponse {
    /// Content key the fingerprint was stored under
    #[schema(example = "3f2a9c0e1b7d4a55b0c1d2e3f4a5b6c7_portrait.jpg")]
    pub identifier: String,
    /// SHA-256 content digest (lowercase hex)
    #[schema(example = "9f86d081884c7d659a2feaa0c55ad015a3bf4f1b2b0b822cd15d6c15b0f00a08")]
    pub fingerprint: String,
    /// 64-bit perceptual hash (hex)
    #[schema(example = "a1b2c3d4e5f67890")]
    pub perceptual_hash: String,
    /// Dataset files with an identical content digest
    pub exact_matches: Vec<String>,
    /// Stored uploads within the similarity threshold, closest first
    pub similar_matches: Vec<SimilarMatchResponse>,
    pub verdict: VerdictResponse,
    /// Present only when the analysis was reported as an incident
    pub artifacts: Option<ArtifactsResponse>,
    /// Non-fatal failures, empty when every stage succeeded
    pub stage_errors: Vec<StageErrorResponse>,
}

impl From<AnalysisResult> for AnalyzeResponse {
    fn from(result: AnalysisResult) -> Self {
        Self {
            identifier: result.content_key,
            fingerprint: result.fingerprint.to_hex(),
            perceptual_hash: result.perceptual_hash.to_hex(),
            exact_matches: result.exact_matches,
            similar_matches: result
                .similar_matches
                .into_iter()
                .map(|m| SimilarMatchResponse {
                    identifier: m.identifier,
                    distance: m.distance,
                })
                .collect(),
            verdict: VerdictResponse {
                label: result.verdict.label.to_string(),
                confidence: result.verdict.confidence,
            },
            artifacts: result.artifacts.map(|a| ArtifactsResponse {
                alert_ref: a.alert_ref,
                takedown_ref: a.takedown_ref,
            }),
            stage_errors: result
                .stage_errors
                .into_iter()
                .map(|e| StageErrorResponse {
                    stage: e.stage.to_string(),
                    message: e.message,
                })
                .collect(),
        }
    }
}

/// Analyze an uploaded image
///
/// Accepts multipart/form-data with:
/// - **file** (required): the image to analyze
/// - **identifier** (optional): content key to store the fingerprint under.
///   Re-using a key replaces its stored fingerprint.
///
/// Without an identifier, the key is the upload's base filename prefixed
/// with a random UUID, so concurrent uploads of `photo.jpg` never collide.
#[utoipa::path(
    post,
    path = "/analyze",
    tag = "Analysis",
    request_body(
        content_type = "multipart/form-data",
        description = "Image file with optional identifier"
    ),
    responses(
        (
            status = 200,
            description = "Analysis completed (check stage_errors for partial failures)",
            body = AnalyzeResponse
        ),
        (status = 400, description = "Missing file, unsupported content type, or file too large"),
        (status = 422, description = "File could not be decoded as an image"),
        (status = 502, description = "Classifier failed")
    )
)]
pub async fn analyze_handler(
    State(state): State<AppState>,
    mut multipart: Multipart,
) -> Result<Json<AnalyzeResponse>, ApiError> {
    let mut fields = MultipartFields::parse(&mut multipart, state.max_file_size).await?;
    let file = fields.take_file()?;

    let content_key = match fields.get_text("identifier") {
        Some(identifier) => sanitize_basename(identifier)
            .ok_or_else(|| ApiError::bad_request("Identifier must contain a file name"))?,
        None => generated_key(file.file_name.as_deref()),
    };

    tracing::debug!(
        content_key = %content_key,
        bytes = file.data.len(),
        content_type = ?file.content_type,
        "Analysis requested"
    );

    let result = state
        .pipeline
        .analyze(AnalysisRequest::new(content_key, file.data))
        .await?;

    Ok(Json(result.into()))
}

/// Last path component of an uploaded name, with either separator style.
fn sanitize_basename(name: &str) -> Option<String> {
    let last = name.rsplit(['/', '\\']).next().unwrap_or(name).trim();
    let base = Path::new(last).file_name()?.to_str()?;
    if base.is_empty() || base == "." || base == ".." {
        None
    } else {
        Some(base.to_string())
    }
}

fn generated_key(file_name: Option<&str>) -> String {
    let base = file_name
        .and_then(sanitize_basename)
        .unwrap_or_else(|| "upload".to_string());
    format!("{}_{}", uuid::Uuid::new_v4().simple(), base)
}
