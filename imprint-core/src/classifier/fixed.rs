//! Fixed-verdict classifier for testing.

use async_trait::async_trait;

use super::{Classifier, Label, Verdict};
use crate::error::ClassifierError;

/// Classifier that returns the same verdict for every image.
/// WARNING: Do not use in production - it never looks at the image!
#[derive(Debug, Clone, Copy)]
pub struct FixedClassifier {
    verdict: Verdict,
}

impl FixedClassifier {
    pub fn new(verdict: Verdict) -> Self {
        Self { verdict }
    }

    pub fn real(confidence: f64) -> Result<Self, ClassifierError> {
        Verdict::new(Label::Real, confidence).map(Self::new)
    }

    pub fn fake(confidence: f64) -> Result<Self, ClassifierError> {
        Verdict::new(Label::Fake, confidence).map(Self::new)
    }
}

impl Default for FixedClassifier {
    fn default() -> Self {
        Self::new(Verdict {
            label: Label::Real,
            confidence: 0.5,
        })
    }
}

#[async_trait]
impl Classifier for FixedClassifier {
    async fn classify(&self, _image_data: &[u8]) -> Result<Verdict, ClassifierError> {
        Ok(self.verdict)
    }

    fn name(&self) -> &'static str {
        "fixed"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_returns_configured_verdict() {
        let classifier = FixedClassifier::fake(0.9).unwrap();
        let verdict = classifier.classify(b"ignored").await.unwrap();
        assert_eq!(verdict.label, Label::Fake);
        assert_eq!(verdict.confidence, 0.9);
    }

    #[test]
    fn test_rejects_invalid_confidence() {
        assert!(FixedClassifier::real(1.5).is_err());
    }
}
