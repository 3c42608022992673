//! Analyze command implementation.

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use clap::Args;
use colored::Colorize;
use imprint_core::{
    AnalysisRequest, AnalysisResult, Classifier, ExactMatchSearcher, FileIncidentReporter,
    FixedClassifier, HttpClassifier, HttpClassifierConfig, Label, Pipeline, PipelineConfig,
    ReportPolicy, Verdict,
};
use tracing::info;

use crate::exit_codes::{CodedError, USAGE_ERROR};
use crate::utils::{file_key, open_store, read_image, short_hex};
use crate::StoreArgs;

#[derive(Args)]
pub struct AnalyzeArgs {
    /// Image to analyze
    #[arg(value_name = "FILE")]
    pub file: PathBuf,

    /// Content key to store the fingerprint under (defaults to the file name)
    #[arg(short, long)]
    pub identifier: Option<String>,

    #[command(flatten)]
    pub store: StoreArgs,

    /// Reference dataset directory
    #[arg(short, long, env = "DATASET_DIR", default_value = "dataset")]
    pub dataset: PathBuf,

    /// Descend into dataset subdirectories
    #[arg(short, long)]
    pub recursive: bool,

    /// Keep dataset digests in memory between scans
    #[arg(long, env = "DATASET_CACHE")]
    pub dataset_cache: bool,

    /// Directory for alert and takedown artifacts
    #[arg(long, env = "ALERTS_DIR", default_value = "alerts")]
    pub alerts: PathBuf,

    /// Inference endpoint for the authenticity classifier
    #[arg(long, env = "CLASSIFIER_URL")]
    pub classifier_url: Option<String>,

    /// Classifier request timeout in seconds
    #[arg(long, env = "CLASSIFIER_TIMEOUT_SECS", default_value_t = 30)]
    pub classifier_timeout: u64,

    /// Use a fixed verdict instead of a classifier ("real" or "fake", for testing)
    #[arg(long, value_name = "LABEL")]
    pub mock: Option<String>,

    /// Maximum Hamming distance for similar matches
    #[arg(
        short,
        long,
        env = "SIMILARITY_THRESHOLD",
        default_value_t = imprint_core::search::DEFAULT_THRESHOLD
    )]
    pub threshold: u32,

    /// Maximum number of similar matches to report
    #[arg(
        long,
        env = "MAX_SIMILAR_RESULTS",
        default_value_t = imprint_core::pipeline::DEFAULT_MAX_SIMILAR_RESULTS
    )]
    pub max_similar: usize,

    /// When to write incident artifacts: always, never, fake, fake-or-match
    #[arg(long, env = "REPORT_POLICY", default_value = "fake")]
    pub report_policy: String,

    /// Minimum FAKE confidence for the fake and fake-or-match policies
    #[arg(
        long,
        env = "REPORT_MIN_CONFIDENCE",
        default_value_t = imprint_core::pipeline::DEFAULT_MIN_CONFIDENCE
    )]
    pub min_confidence: f64,

    /// Print the result as JSON
    #[arg(long)]
    pub json: bool,
}

fn build_classifier(args: &AnalyzeArgs) -> Result<Arc<dyn Classifier>> {
    if let Some(label) = &args.mock {
        let label: Label = label.parse().map_err(|_| {
            CodedError::new(
                USAGE_ERROR,
                format!("Invalid --mock label '{}' (expected real or fake)", label),
            )
        })?;
        let verdict = Verdict::new(label, 0.99)?;
        return Ok(Arc::new(FixedClassifier::new(verdict)));
    }

    let url = args.classifier_url.as_ref().ok_or_else(|| {
        CodedError::new(
            USAGE_ERROR,
            "No classifier configured: pass --classifier-url (or CLASSIFIER_URL), \
             or --mock for testing",
        )
    })?;

    let mut config = HttpClassifierConfig::new(url.clone());
    config.timeout = Duration::from_secs(args.classifier_timeout);
    let classifier = HttpClassifier::new(config).context("Failed to create classifier client")?;
    Ok(Arc::new(classifier))
}

/// Execute the analyze command.
pub async fn execute(args: AnalyzeArgs, quiet: bool) -> Result<()> {
    let report_policy = ReportPolicy::parse(&args.report_policy, args.min_confidence)
        .map_err(|e| CodedError::new(USAGE_ERROR, e.to_string()))?;
    let classifier = build_classifier(&args)?;

    let data = read_image(&args.file)?;
    let store = open_store(&args.store).await?;

    let pipeline = Pipeline::new(
        Arc::new(store),
        ExactMatchSearcher::new(&args.dataset)
            .recursive(args.recursive)
            .with_cache(args.dataset_cache),
        classifier,
        Arc::new(FileIncidentReporter::new(&args.alerts)),
        PipelineConfig {
            similarity_threshold: args.threshold,
            max_similar_results: args.max_similar,
            report_policy,
        },
    );

    let content_key = args
        .identifier
        .clone()
        .unwrap_or_else(|| file_key(&args.file));
    let result = pipeline
        .analyze(AnalysisRequest::new(content_key, data))
        .await
        .with_context(|| format!("Analysis of {} failed", args.file.display()))?;

    info!(
        content_key = %result.content_key,
        label = %result.verdict.label,
        stage_errors = result.stage_errors.len(),
        "Analysis finished"
    );

    if args.json {
        println!(
            "{}",
            serde_json::to_string_pretty(&result).context("Failed to serialize result")?
        );
    } else {
        print_result(&result, quiet);
    }

    Ok(())
}

fn print_result(result: &AnalysisResult, quiet: bool) {
    if quiet {
        println!(
            "{} {:.2} {}",
            result.verdict.label, result.verdict.confidence, result.content_key
        );
        return;
    }

    let verdict = format!(
        "{} ({:.1}% confidence)",
        result.verdict.label,
        result.verdict.confidence * 100.0
    );
    let verdict = if result.verdict.is_fake() {
        verdict.red().bold()
    } else {
        verdict.green().bold()
    };

    println!();
    println!("   {} {}", "Image:".dimmed(), result.content_key);
    println!(
        "   {} {}",
        "Fingerprint:".dimmed(),
        short_hex(&result.fingerprint.to_hex())
    );
    println!("   {} {}", "Verdict:".dimmed(), verdict);

    if result.exact_matches.is_empty() {
        println!("   {} {}", "Exact matches:".dimmed(), "none".dimmed());
    } else {
        println!("   {}", "Exact matches:".dimmed());
        for identifier in &result.exact_matches {
            println!("     {}", identifier.yellow());
        }
    }

    if result.similar_matches.is_empty() {
        println!("   {} {}", "Similar images:".dimmed(), "none".dimmed());
    } else {
        println!("   {}", "Similar images:".dimmed());
        for m in &result.similar_matches {
            println!(
                "     {} {}",
                m.identifier.yellow(),
                format!("(distance {})", m.distance).dimmed()
            );
        }
    }

    if let Some(artifacts) = &result.artifacts {
        for path in [&artifacts.alert_ref, &artifacts.takedown_ref].into_iter().flatten() {
            println!("   {} {}", "Wrote:".dimmed(), path);
        }
    }

    for err in &result.stage_errors {
        println!(
            "   {} {}: {}",
            "Warning:".yellow().bold(),
            err.stage,
            err.message
        );
    }
    println!();
}
