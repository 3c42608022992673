//! Application state module
//!
//! Defines shared state accessible across all request handlers, and how it is
//! assembled from [`Config`] at startup.

use std::sync::Arc;

use imprint_core::{
    Classifier, ClassifierError, ExactMatchSearcher, FileIncidentReporter, FingerprintStore,
    FixedClassifier, HttpClassifier, HttpClassifierConfig, Pipeline,
};
use thiserror::Error;

use crate::config::Config;
use crate::validation::DEFAULT_MAX_FILE_SIZE;

/// Reasons the server refuses to start.
#[derive(Debug, Error)]
pub enum StartupError {
    #[error(
        "No classifier configured: set CLASSIFIER_URL, or ALLOW_MOCK_CLASSIFIER=true for testing"
    )]
    NoClassifier,

    #[error("Failed to initialize classifier: {0}")]
    Classifier(#[from] ClassifierError),
}

/// Application state containing shared resources.
#[derive(Clone)]
pub struct AppState {
    /// Analysis pipeline (owns the store, dataset searcher and classifier)
    pub pipeline: Arc<Pipeline>,
    /// Maximum accepted upload size in bytes
    pub max_file_size: usize,
}

impl AppState {
    pub fn new(pipeline: Arc<Pipeline>) -> Self {
        Self {
            pipeline,
            max_file_size: DEFAULT_MAX_FILE_SIZE,
        }
    }

    pub fn with_max_file_size(mut self, max_file_size: usize) -> Self {
        self.max_file_size = max_file_size;
        self
    }

    /// Assemble the pipeline around an already-connected store.
    pub fn from_config(
        config: &Config,
        store: Arc<dyn FingerprintStore>,
    ) -> Result<Self, StartupError> {
        let classifier = build_classifier(config)?;

        if !config.dataset_dir.is_dir() {
            tracing::warn!(
                dataset = %config.dataset_dir.display(),
                "Dataset directory not found; exact-match search will report errors"
            );
        }

        let exact = ExactMatchSearcher::new(&config.dataset_dir)
            .recursive(config.dataset_recursive)
            .with_cache(config.dataset_cache);
        let reporter = Arc::new(FileIncidentReporter::new(&config.alerts_dir));

        let pipeline = Pipeline::new(store, exact, classifier, reporter, config.pipeline_config());

        Ok(Self::new(Arc::new(pipeline)).with_max_file_size(config.max_file_size()))
    }
}

/// Build the classifier once for the lifetime of the server.
///
/// A configured endpoint always wins; the fixed classifier is only used when
/// explicitly allowed.
pub fn build_classifier(config: &Config) -> Result<Arc<dyn Classifier>, StartupError> {
    if let Some(url) = &config.classifier_url {
        let mut http_config = HttpClassifierConfig::new(url.clone());
        http_config.timeout = config.classifier_timeout();
        let classifier = HttpClassifier::new(http_config)?;
        tracing::info!(endpoint = %url, "Using HTTP classifier");
        return Ok(Arc::new(classifier));
    }

    if config.allow_mock_classifier {
        tracing::warn!("Using fixed classifier (ALLOW_MOCK_CLASSIFIER); verdicts are not real");
        return Ok(Arc::new(FixedClassifier::default()));
    }

    Err(StartupError::NoClassifier)
}
