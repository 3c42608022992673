//! Authenticity classifier boundary.
//!
//! The model itself lives outside this crate. The pipeline only sees a
//! [`Classifier`] handle that is built once at startup and shared read-only
//! between requests.
//!
//! - [`HttpClassifier`] - posts the image to a remote inference endpoint
//! - [`FixedClassifier`] - returns a preset verdict (tests and demos only)

mod fixed;
#[cfg(feature = "http-classifier")]
mod http;

pub use fixed::FixedClassifier;
#[cfg(feature = "http-classifier")]
pub use http::{HttpClassifier, HttpClassifierConfig};

use std::fmt;
use std::str::FromStr;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::error::ClassifierError;

/// Binary authenticity label.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Label {
    Real,
    Fake,
}

impl fmt::Display for Label {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Label::Real => f.write_str("REAL"),
            Label::Fake => f.write_str("FAKE"),
        }
    }
}

impl FromStr for Label {
    type Err = ClassifierError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "real" => Ok(Label::Real),
            "fake" => Ok(Label::Fake),
            other => Err(ClassifierError::InvalidResponse(format!(
                "unknown label '{}'",
                other
            ))),
        }
    }
}

/// Classifier output for one image.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Verdict {
    pub label: Label,
    /// Probability of `label`, in `[0, 1]`
    pub confidence: f64,
}

impl Verdict {
    /// Build a verdict, rejecting confidences outside `[0, 1]`.
    pub fn new(label: Label, confidence: f64) -> Result<Self, ClassifierError> {
        if !(0.0..=1.0).contains(&confidence) {
            return Err(ClassifierError::ConfidenceOutOfRange(confidence));
        }
        Ok(Self { label, confidence })
    }

    pub fn is_fake(&self) -> bool {
        self.label == Label::Fake
    }
}

/// External authenticity classifier.
///
/// Implementations must be thread-safe (`Send + Sync`); one instance serves
/// every concurrent request.
#[async_trait]
pub trait Classifier: Send + Sync {
    /// Classify encoded image bytes.
    async fn classify(&self, image_data: &[u8]) -> Result<Verdict, ClassifierError>;

    /// Short name for logs and health output.
    fn name(&self) -> &'static str;
}
