//! Remote inference endpoint client.
//!
//! Posts the raw image bytes and expects a JSON body of the form
//! `{"label": "REAL" | "FAKE", "confidence": 0.93}` (`prediction` is accepted
//! as an alias for `label`).
//!
//! A failed call is fatal to the analysis request, so there is no retry loop
//! here; the request timeout bounds how long a caller can wait.

use std::time::{Duration, Instant};

use async_trait::async_trait;
use reqwest::Client;
use serde::Deserialize;
use tracing::{debug, instrument, warn};

use super::{Classifier, Label, Verdict};
use crate::error::ClassifierError;

/// Default timeout for inference requests.
const DEFAULT_TIMEOUT: Duration = Duration::from_secs(30);

/// Response structure from the inference endpoint.
#[derive(Debug, Deserialize)]
struct InferenceResponse {
    #[serde(alias = "prediction")]
    label: String,
    confidence: f64,
}

impl InferenceResponse {
    fn into_verdict(self) -> Result<Verdict, ClassifierError> {
        let label: Label = self.label.parse()?;
        Verdict::new(label, self.confidence)
    }
}

/// Configuration for the HTTP classifier client.
#[derive(Debug, Clone)]
pub struct HttpClassifierConfig {
    /// Inference endpoint URL.
    pub endpoint: String,
    /// Request timeout.
    pub timeout: Duration,
}

impl HttpClassifierConfig {
    pub fn new(endpoint: impl Into<String>) -> Self {
        Self {
            endpoint: endpoint.into(),
            timeout: DEFAULT_TIMEOUT,
        }
    }
}

/// Classifier backed by a remote inference service.
pub struct HttpClassifier {
    client: Client,
    config: HttpClassifierConfig,
}

impl HttpClassifier {
    #[instrument(level = "debug", skip_all, fields(
        endpoint = %config.endpoint,
        timeout_ms = config.timeout.as_millis() as u64
    ))]
    pub fn new(config: HttpClassifierConfig) -> Result<Self, ClassifierError> {
        let client = Client::builder()
            .timeout(config.timeout)
            .build()
            .map_err(|e| {
                warn!(error = %e, "Failed to create HTTP client");
                ClassifierError::Unavailable(format!("Failed to create HTTP client: {e}"))
            })?;

        debug!("HTTP classifier client created");
        Ok(Self { client, config })
    }
}

#[async_trait]
impl Classifier for HttpClassifier {
    #[instrument(
        level = "info",
        skip_all,
        fields(endpoint = %self.config.endpoint, bytes = image_data.len())
    )]
    async fn classify(&self, image_data: &[u8]) -> Result<Verdict, ClassifierError> {
        let start = Instant::now();

        let response = self
            .client
            .post(&self.config.endpoint)
            .header(reqwest::header::CONTENT_TYPE, "application/octet-stream")
            .body(image_data.to_vec())
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            warn!(status = %status, "Classifier returned error status");
            return Err(ClassifierError::Status(status.as_u16()));
        }

        let body: InferenceResponse = response
            .json()
            .await
            .map_err(|e| ClassifierError::InvalidResponse(e.to_string()))?;
        let verdict = body.into_verdict()?;

        debug!(
            label = %verdict.label,
            confidence = verdict.confidence,
            latency_ms = start.elapsed().as_millis() as u64,
            "Classification complete"
        );
        Ok(verdict)
    }

    fn name(&self) -> &'static str {
        "http"
    }
}
