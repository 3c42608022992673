//! API error handling module
//!
//! Provides a unified error type for all API endpoints with structured error variants.

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use imprint_core::{ClassifierError, DecodeError, PipelineError, StoreError};
use thiserror::Error;

/// API error type with structured variants for different error categories
#[derive(Debug, Error)]
pub enum ApiError {
    /// Bad request - client provided invalid input
    #[error("Bad request: {0}")]
    BadRequest(String),

    /// Not found - requested resource does not exist
    #[error("Not found: {0}")]
    NotFound(String),

    /// Fatal analysis failure (undecodable image or classifier failure)
    #[error(transparent)]
    Pipeline(#[from] PipelineError),

    /// Fingerprint store failure on an administrative route
    #[error("Store error: {0}")]
    Store(#[from] StoreError),
}

impl ApiError {
    /// Create a bad request error
    pub fn bad_request(message: impl Into<String>) -> Self {
        Self::BadRequest(message.into())
    }

    /// Create a not found error
    pub fn not_found(message: impl Into<String>) -> Self {
        Self::NotFound(message.into())
    }

    /// Get the HTTP status code for this error
    pub fn status_code(&self) -> StatusCode {
        match self {
            Self::BadRequest(_) => StatusCode::BAD_REQUEST,
            Self::NotFound(_) => StatusCode::NOT_FOUND,
            Self::Store(_) => StatusCode::INTERNAL_SERVER_ERROR,
            Self::Pipeline(ref e) => match e {
                // Uploaded bytes are not an image we can decode → 422
                PipelineError::Decode(DecodeError::Image(_)) => StatusCode::UNPROCESSABLE_ENTITY,
                // Worker failures while decoding are ours → 500
                PipelineError::Decode(_) => StatusCode::INTERNAL_SERVER_ERROR,
                // The inference service failed us → 502
                PipelineError::Classifier(_) => StatusCode::BAD_GATEWAY,
            },
        }
    }

    /// Get the error code for programmatic error handling
    pub fn error_code(&self) -> &'static str {
        match self {
            Self::BadRequest(_) => "INVALID_INPUT",
            Self::NotFound(_) => "NOT_FOUND",
            Self::Store(_) => "STORE_ERROR",
            Self::Pipeline(ref e) => match e {
                PipelineError::Decode(DecodeError::Image(_)) => "DECODE_FAILED",
                PipelineError::Decode(_) => "INTERNAL_ERROR",
                PipelineError::Classifier(_) => "CLASSIFIER_FAILED",
            },
        }
    }

    /// Get sanitized error message for client response
    fn client_message(&self) -> String {
        match self {
            Self::Pipeline(ref e) => match e {
                PipelineError::Decode(DecodeError::Image(_)) => {
                    "Uploaded file could not be decoded as an image".to_string()
                }
                PipelineError::Decode(_) => "Image processing failed".to_string(),
                PipelineError::Classifier(ClassifierError::ConfidenceOutOfRange(_))
                | PipelineError::Classifier(ClassifierError::InvalidResponse(_)) => {
                    "Classifier returned an invalid verdict".to_string()
                }
                PipelineError::Classifier(_) => "Classifier unavailable".to_string(),
            },
            Self::Store(_) => "Fingerprint store error".to_string(),
            // For other errors, use the Display message
            _ => self.to_string(),
        }
    }

    /// Get the error category for logging
    fn error_category(&self) -> &'static str {
        match self {
            Self::BadRequest(_) => "bad_request",
            Self::NotFound(_) => "not_found",
            Self::Pipeline(PipelineError::Decode(_)) => "decode",
            Self::Pipeline(PipelineError::Classifier(_)) => "classifier",
            Self::Store(_) => "store",
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        let category = self.error_category();
        let code = self.error_code();
        let internal_message = self.to_string();
        let client_message = self.client_message();

        // Log based on severity, always including internal details
        if status.is_server_error() {
            tracing::error!(
                status = %status,
                category = category,
                code = code,
                error = %internal_message,
                "Server error"
            );
        } else {
            tracing::warn!(
                status = %status,
                category = category,
                code = code,
                error = %internal_message,
                "Client error"
            );
        }

        // All error responses include a `code` field for programmatic error handling
        let body = serde_json::json!({
            "error": client_message,
            "code": code,
        });

        (status, Json(body)).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn decode_error() -> ApiError {
        let err = image::load_from_memory(b"nope").unwrap_err();
        ApiError::from(PipelineError::from(DecodeError::from(err)))
    }

    #[test]
    fn test_decode_failure_is_unprocessable() {
        let err = decode_error();
        assert_eq!(err.status_code(), StatusCode::UNPROCESSABLE_ENTITY);
        assert_eq!(err.error_code(), "DECODE_FAILED");
    }

    #[test]
    fn test_classifier_failure_is_bad_gateway() {
        let err = ApiError::from(PipelineError::from(ClassifierError::Status(500)));
        assert_eq!(err.status_code(), StatusCode::BAD_GATEWAY);
        assert_eq!(err.error_code(), "CLASSIFIER_FAILED");
        assert_eq!(err.client_message(), "Classifier unavailable");
    }

    #[test]
    fn test_store_error_hides_details() {
        let err = ApiError::from(StoreError::Query("no such table: fingerprints".into()));
        assert_eq!(err.status_code(), StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(err.error_code(), "STORE_ERROR");
        assert!(!err.client_message().contains("fingerprints"));
    }

    #[test]
    fn test_client_errors_keep_message() {
        let err = ApiError::bad_request("No file provided");
        assert_eq!(err.status_code(), StatusCode::BAD_REQUEST);
        assert!(err.client_message().contains("No file provided"));
    }
}
