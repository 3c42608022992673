//! Analysis orchestration.
//!
//! One uploaded image flows through five stages:
//!
//! 1. **fingerprint** - decode and hash (fatal on failure)
//! 2. **persist** - upsert into the fingerprint store (non-fatal)
//! 3. **search** - exact dataset search and similarity search (non-fatal)
//! 4. **classify** - authenticity verdict (fatal on failure)
//! 5. **report** - incident artifacts when the verdict is suspicious (non-fatal)
//!
//! Search and classification are independent and run concurrently. Non-fatal
//! failures are collected into [`AnalysisResult::stage_errors`] so a caller
//! can tell "no matches" apart from "search failed".

use std::fmt;
use std::str::FromStr;
use std::sync::Arc;

use chrono::Utc;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{debug, error, info, instrument, warn};

use crate::classifier::{Classifier, Verdict};
use crate::error::{ClassifierError, PipelineError, StoreError};
use crate::fingerprint::{ContentDigest, FingerprintEngine, ImageFingerprint, PerceptualHash};
use crate::report::{Artifacts, Incident, IncidentReporter};
use crate::search::{ExactMatchSearcher, Match, SimilaritySearcher, DEFAULT_THRESHOLD};
use crate::store::{FingerprintRecord, FingerprintStore};

/// Default cap on similar matches returned per request.
pub const DEFAULT_MAX_SIMILAR_RESULTS: usize = 25;

/// Default minimum confidence for a FAKE verdict to count as suspicious.
pub const DEFAULT_MIN_CONFIDENCE: f64 = 0.5;

/// Pipeline stage names, as reported in [`StageError`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Stage {
    Fingerprint,
    Persist,
    Search,
    Classify,
    Report,
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Stage::Fingerprint => "fingerprint",
            Stage::Persist => "persist",
            Stage::Search => "search",
            Stage::Classify => "classify",
            Stage::Report => "report",
        };
        f.write_str(name)
    }
}

/// A non-fatal stage failure.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StageError {
    pub stage: Stage,
    pub message: String,
}

impl StageError {
    fn new(stage: Stage, message: impl fmt::Display) -> Self {
        Self {
            stage,
            message: message.to_string(),
        }
    }
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("Unknown report policy '{0}' (expected always, never, fake or fake-or-match)")]
pub struct InvalidReportPolicy(pub String);

/// Decides whether an analysis is suspicious enough to produce artifacts.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(tag = "mode", rename_all = "kebab-case")]
pub enum ReportPolicy {
    /// Report every analysis.
    Always,
    /// Never report.
    Never,
    /// Report FAKE verdicts at or above `min_confidence`.
    FakeLabel { min_confidence: f64 },
    /// Report FAKE verdicts at or above `min_confidence`, or any match.
    FakeOrMatched { min_confidence: f64 },
}

impl Default for ReportPolicy {
    fn default() -> Self {
        ReportPolicy::FakeLabel {
            min_confidence: DEFAULT_MIN_CONFIDENCE,
        }
    }
}

impl ReportPolicy {
    /// Parse a policy mode name, attaching `min_confidence` where it applies.
    pub fn parse(mode: &str, min_confidence: f64) -> Result<Self, InvalidReportPolicy> {
        match mode.trim().to_ascii_lowercase().as_str() {
            "always" => Ok(ReportPolicy::Always),
            "never" => Ok(ReportPolicy::Never),
            "fake" => Ok(ReportPolicy::FakeLabel { min_confidence }),
            "fake-or-match" => Ok(ReportPolicy::FakeOrMatched { min_confidence }),
            other => Err(InvalidReportPolicy(other.to_string())),
        }
    }

    pub fn is_suspicious(&self, verdict: &Verdict, match_count: usize) -> bool {
        match *self {
            ReportPolicy::Always => true,
            ReportPolicy::Never => false,
            ReportPolicy::FakeLabel { min_confidence } => {
                verdict.is_fake() && verdict.confidence >= min_confidence
            }
            ReportPolicy::FakeOrMatched { min_confidence } => {
                (verdict.is_fake() && verdict.confidence >= min_confidence) || match_count > 0
            }
        }
    }
}

impl FromStr for ReportPolicy {
    type Err = InvalidReportPolicy;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s, DEFAULT_MIN_CONFIDENCE)
    }
}

/// Tunables for a [`Pipeline`].
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PipelineConfig {
    /// Maximum Hamming distance for a similar match.
    pub similarity_threshold: u32,
    /// Cap on similar matches per request.
    pub max_similar_results: usize,
    pub report_policy: ReportPolicy,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            similarity_threshold: DEFAULT_THRESHOLD,
            max_similar_results: DEFAULT_MAX_SIMILAR_RESULTS,
            report_policy: ReportPolicy::default(),
        }
    }
}

/// One image to analyze.
#[derive(Debug, Clone)]
pub struct AnalysisRequest {
    /// Unique key the fingerprint is stored under.
    pub content_key: String,
    /// Encoded image bytes. Shared with the blocking fingerprint task and the
    /// classifier, and released when the request completes.
    pub image_data: Arc<[u8]>,
}

impl AnalysisRequest {
    pub fn new(content_key: impl Into<String>, image_data: impl Into<Arc<[u8]>>) -> Self {
        Self {
            content_key: content_key.into(),
            image_data: image_data.into(),
        }
    }
}

/// Outcome of a completed analysis.
#[derive(Debug, Clone, Serialize)]
pub struct AnalysisResult {
    #[serde(rename = "identifier")]
    pub content_key: String,
    pub fingerprint: ContentDigest,
    pub perceptual_hash: PerceptualHash,
    pub exact_matches: Vec<String>,
    pub similar_matches: Vec<Match>,
    pub verdict: Verdict,
    pub artifacts: Option<Artifacts>,
    pub stage_errors: Vec<StageError>,
}

impl AnalysisResult {
    pub fn match_count(&self) -> usize {
        self.exact_matches.len() + self.similar_matches.len()
    }

    pub fn has_stage_error(&self, stage: Stage) -> bool {
        self.stage_errors.iter().any(|e| e.stage == stage)
    }
}

#[derive(Default)]
struct SearchOutcome {
    exact_matches: Vec<String>,
    similar_matches: Vec<Match>,
    errors: Vec<StageError>,
}

/// Runs analyses against shared, read-mostly resources.
///
/// A `Pipeline` is built once at startup and shared behind an `Arc`; every
/// method takes `&self`, so any number of requests can run concurrently.
pub struct Pipeline {
    engine: FingerprintEngine,
    store: Arc<dyn FingerprintStore>,
    exact: ExactMatchSearcher,
    similar: SimilaritySearcher,
    classifier: Arc<dyn Classifier>,
    reporter: Arc<dyn IncidentReporter>,
    report_policy: ReportPolicy,
}

impl Pipeline {
    pub fn new(
        store: Arc<dyn FingerprintStore>,
        exact: ExactMatchSearcher,
        classifier: Arc<dyn Classifier>,
        reporter: Arc<dyn IncidentReporter>,
        config: PipelineConfig,
    ) -> Self {
        Self {
            engine: FingerprintEngine::default(),
            store,
            exact,
            similar: SimilaritySearcher::new(config.similarity_threshold)
                .with_limit(config.max_similar_results),
            classifier,
            reporter,
            report_policy: config.report_policy,
        }
    }

    pub fn store(&self) -> &Arc<dyn FingerprintStore> {
        &self.store
    }

    pub fn classifier_name(&self) -> &'static str {
        self.classifier.name()
    }

    /// Run every stage for one image.
    ///
    /// Returns `Err` only when fingerprinting or classification fails. All
    /// other failures are recorded on the returned result. A classifier
    /// failure returns as soon as it happens, without waiting for search.
    #[instrument(
        skip_all,
        fields(content_key = %request.content_key, bytes = request.image_data.len())
    )]
    pub async fn analyze(&self, request: AnalysisRequest) -> Result<AnalysisResult, PipelineError> {
        let AnalysisRequest {
            content_key,
            image_data,
        } = request;
        let mut stage_errors = Vec::new();

        let fingerprint = self
            .engine
            .analyze_blocking(Arc::clone(&image_data))
            .await
            .map_err(|e| {
                warn!(stage = %Stage::Fingerprint, error = %e, "Analysis aborted");
                e
            })?;

        if let Err(e) = self.persist(&content_key, fingerprint).await {
            warn!(stage = %Stage::Persist, error = %e, "Fingerprint not stored");
            stage_errors.push(StageError::new(Stage::Persist, e));
        }

        let (search, verdict) = tokio::try_join!(
            async { Ok::<_, ClassifierError>(self.search(&content_key, &fingerprint).await) },
            self.classify(&image_data),
        )?;
        stage_errors.extend(search.errors);

        let mut result = AnalysisResult {
            content_key,
            fingerprint: fingerprint.digest,
            perceptual_hash: fingerprint.perceptual_hash,
            exact_matches: search.exact_matches,
            similar_matches: search.similar_matches,
            verdict,
            artifacts: None,
            stage_errors,
        };

        if self
            .report_policy
            .is_suspicious(&result.verdict, result.match_count())
        {
            let incident = Incident {
                content_key: result.content_key.clone(),
                verdict: result.verdict,
                exact_matches: result.exact_matches.clone(),
                similar_matches: result.similar_matches.clone(),
                detected_at: Utc::now(),
            };
            match self.reporter.report(&incident).await {
                Ok(artifacts) => result.artifacts = Some(artifacts),
                Err(e) => {
                    warn!(stage = %Stage::Report, error = %e, "Incident artifacts not generated");
                    result.stage_errors.push(StageError::new(Stage::Report, e));
                }
            }
        } else {
            debug!(
                label = %result.verdict.label,
                match_count = result.match_count(),
                "Not suspicious, skipping report"
            );
        }

        info!(
            digest = %result.fingerprint,
            label = %result.verdict.label,
            confidence = result.verdict.confidence,
            exact = result.exact_matches.len(),
            similar = result.similar_matches.len(),
            stage_errors = result.stage_errors.len(),
            "Analysis complete"
        );

        Ok(result)
    }

    async fn classify(&self, image_data: &[u8]) -> Result<Verdict, ClassifierError> {
        self.classifier.classify(image_data).await.map_err(|e| {
            error!(
                stage = %Stage::Classify,
                classifier = self.classifier.name(),
                error = %e,
                "Analysis aborted"
            );
            e
        })
    }

    /// Upsert on a detached task: once started, the write completes even if
    /// the caller stops waiting.
    async fn persist(
        &self,
        content_key: &str,
        fingerprint: ImageFingerprint,
    ) -> Result<(), StoreError> {
        let store = Arc::clone(&self.store);
        let record = FingerprintRecord::new(content_key, fingerprint);

        tokio::spawn(async move { store.upsert(&record).await })
            .await
            .map_err(|e| StoreError::Unavailable(format!("persist task failed: {e}")))?
    }

    async fn search(&self, content_key: &str, fingerprint: &ImageFingerprint) -> SearchOutcome {
        let (exact, similar) = tokio::join!(
            self.exact.find_exact_blocking(fingerprint.digest),
            self.find_similar(content_key, &fingerprint.perceptual_hash),
        );

        let mut outcome = SearchOutcome::default();
        match exact {
            Ok(matches) => outcome.exact_matches = matches,
            Err(e) => {
                warn!(stage = %Stage::Search, error = %e, "Exact search failed");
                outcome
                    .errors
                    .push(StageError::new(Stage::Search, format!("exact search: {e}")));
            }
        }
        match similar {
            Ok(matches) => outcome.similar_matches = matches,
            Err(e) => {
                warn!(stage = %Stage::Search, error = %e, "Similarity search failed");
                outcome
                    .errors
                    .push(StageError::new(Stage::Search, format!("similarity search: {e}")));
            }
        }
        outcome
    }

    /// Compare against a snapshot of every stored record except the query's
    /// own key.
    async fn find_similar(
        &self,
        content_key: &str,
        query: &PerceptualHash,
    ) -> Result<Vec<Match>, StoreError> {
        let records = self.store.list().await?;
        Ok(self.similar.find_similar(
            query,
            records
                .iter()
                .filter(|r| r.key != content_key)
                .map(|r| (r.key.as_str(), r.perceptual_hash)),
        ))
    }
}
