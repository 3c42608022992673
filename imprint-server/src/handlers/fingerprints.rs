//! Fingerprint store administration handlers
//!
//! - GET /fingerprints - list stored fingerprints
//! - GET /fingerprints/{key} - fetch one record
//! - DELETE /fingerprints/{key} - remove one record

use axum::{
    extract::{Path, State},
    Json,
};
use chrono::SecondsFormat;
use imprint_core::FingerprintRecord;
use serde::Serialize;
use utoipa::ToSchema;

use crate::error::ApiError;
use crate::state::AppState;

/// A stored fingerprint.
#[derive(Serialize, ToSchema)]
pub struct FingerprintResponse {
    #[schema(example = "3f2a9c0e1b7d4a55b0c1d2e3f4a5b6c7_portrait.jpg")]
    pub key: String,
    /// SHA-256 content digest (lowercase hex)
    #[schema(example = "9f86d081884c7d659a2feaa0c55ad015a3bf4f1b2b0b822cd15d6c15b0f00a08")]
    pub hash_value: String,
    /// 64-bit perceptual hash (hex)
    #[schema(example = "a1b2c3d4e5f67890")]
    pub perceptual_hash: String,
    /// Time of the last write (RFC 3339)
    #[schema(example = "2026-01-01T12:00:00Z")]
    pub updated_at: String,
}

impl From<FingerprintRecord> for FingerprintResponse {
    fn from(record: FingerprintRecord) -> Self {
        Self {
            key: record.key,
            hash_value: record.hash_value.to_hex(),
            perceptual_hash: record.perceptual_hash.to_hex(),
            updated_at: record.updated_at.to_rfc3339_opts(SecondsFormat::Secs, true),
        }
    }
}

/// Response for listing fingerprints
#[derive(Serialize, ToSchema)]
pub struct FingerprintListResponse {
    #[schema(example = 2)]
    pub count: usize,
    /// Records sorted by key
    pub fingerprints: Vec<FingerprintResponse>,
}

/// Response for a delete
#[derive(Serialize, ToSchema)]
pub struct DeleteFingerprintResponse {
    pub key: String,
    pub deleted: bool,
}

/// List every stored fingerprint
#[utoipa::path(
    get,
    path = "/fingerprints",
    tag = "Fingerprints",
    responses(
        (status = 200, description = "Stored fingerprints", body = FingerprintListResponse),
        (status = 500, description = "Store error")
    )
)]
pub async fn list_fingerprints_handler(
    State(state): State<AppState>,
) -> Result<Json<FingerprintListResponse>, ApiError> {
    let records = state.pipeline.store().list().await?;
    let fingerprints: Vec<FingerprintResponse> = records.into_iter().map(Into::into).collect();

    Ok(Json(FingerprintListResponse {
        count: fingerprints.len(),
        fingerprints,
    }))
}

/// Fetch one stored fingerprint by key
#[utoipa::path(
    get,
    path = "/fingerprints/{key}",
    tag = "Fingerprints",
    params(("key" = String, Path, description = "Content key")),
    responses(
        (status = 200, description = "Stored fingerprint", body = FingerprintResponse),
        (status = 404, description = "No fingerprint under this key"),
        (status = 500, description = "Store error")
    )
)]
pub async fn get_fingerprint_handler(
    State(state): State<AppState>,
    Path(key): Path<String>,
) -> Result<Json<FingerprintResponse>, ApiError> {
    let record = state
        .pipeline
        .store()
        .get(&key)
        .await?
        .ok_or_else(|| ApiError::not_found(format!("No fingerprint for key '{}'", key)))?;

    Ok(Json(record.into()))
}

/// Delete one stored fingerprint by key
#[utoipa::path(
    delete,
    path = "/fingerprints/{key}",
    tag = "Fingerprints",
    params(("key" = String, Path, description = "Content key")),
    responses(
        (status = 200, description = "Fingerprint deleted", body = DeleteFingerprintResponse),
        (status = 404, description = "No fingerprint under this key"),
        (status = 500, description = "Store error")
    )
)]
pub async fn delete_fingerprint_handler(
    State(state): State<AppState>,
    Path(key): Path<String>,
) -> Result<Json<DeleteFingerprintResponse>, ApiError> {
    if !state.pipeline.store().delete(&key).await? {
        return Err(ApiError::not_found(format!(
            "No fingerprint for key '{}'",
            key
        )));
    }

    tracing::info!(key = %key, "Fingerprint deleted");
    Ok(Json(DeleteFingerprintResponse { key, deleted: true }))
}
