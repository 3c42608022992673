//! Incident artifacts.
//!
//! When an analysis is judged suspicious, an [`IncidentReporter`] turns the
//! verdict and matches into human-readable records. The pipeline only keeps
//! the references (paths) the reporter hands back.

use std::path::PathBuf;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::classifier::Verdict;
use crate::error::ReportError;
use crate::search::Match;

/// Everything a reporter needs to describe one suspicious analysis.
#[derive(Debug, Clone)]
pub struct Incident {
    pub content_key: String,
    pub verdict: Verdict,
    pub exact_matches: Vec<String>,
    pub similar_matches: Vec<Match>,
    pub detected_at: DateTime<Utc>,
}

/// References to generated artifacts.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Artifacts {
    pub alert_ref: Option<String>,
    pub takedown_ref: Option<String>,
}

/// Produces incident artifacts.
#[async_trait]
pub trait IncidentReporter: Send + Sync {
    async fn report(&self, incident: &Incident) -> Result<Artifacts, ReportError>;
}

/// Writes an alert and a takedown request as text files into a directory.
///
/// File names carry the detection time plus a random suffix, so concurrent
/// incidents within the same second never overwrite each other.
#[derive(Debug, Clone)]
pub struct FileIncidentReporter {
    dir: PathBuf,
}

impl FileIncidentReporter {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    async fn write(&self, file_name: &str, contents: String) -> Result<PathBuf, ReportError> {
        tokio::fs::create_dir_all(&self.dir)
            .await
            .map_err(|source| ReportError::Write {
                path: self.dir.clone(),
                source,
            })?;

        let path = self.dir.join(file_name);
        tokio::fs::write(&path, contents)
            .await
            .map_err(|source| ReportError::Write {
                path: path.clone(),
                source,
            })?;

        Ok(path)
    }

    /// Write both artifacts or neither: an alert whose takedown could not be
    /// written is removed again.
    async fn write_pair(
        &self,
        alert: (&str, String),
        takedown: (&str, String),
    ) -> Result<(PathBuf, PathBuf), ReportError> {
        let alert_path = self.write(alert.0, alert.1).await?;

        match self.write(takedown.0, takedown.1).await {
            Ok(takedown_path) => Ok((alert_path, takedown_path)),
            Err(e) => {
                if let Err(cleanup) = tokio::fs::remove_file(&alert_path).await {
                    warn!(
                        path = %alert_path.display(),
                        error = %cleanup,
                        "Failed to remove orphaned alert"
                    );
                }
                Err(e)
            }
        }
    }
}

#[async_trait]
impl IncidentReporter for FileIncidentReporter {
    async fn report(&self, incident: &Incident) -> Result<Artifacts, ReportError> {
        let stamp = incident.detected_at.format("%Y%m%d_%H%M%S");
        let suffix = &uuid::Uuid::new_v4().simple().to_string()[..8];

        let (alert, takedown) = self
            .write_pair(
                (&format!("alert_{stamp}_{suffix}.txt"), render_alert(incident)),
                (
                    &format!("takedown_{stamp}_{suffix}.txt"),
                    render_takedown(incident),
                ),
            )
            .await?;

        info!(
            content_key = %incident.content_key,
            alert = %alert.display(),
            takedown = %takedown.display(),
            "Incident artifacts written"
        );

        Ok(Artifacts {
            alert_ref: Some(alert.display().to_string()),
            takedown_ref: Some(takedown.display().to_string()),
        })
    }
}

fn matched_identifiers(incident: &Incident) -> Vec<String> {
    incident
        .exact_matches
        .iter()
        .cloned()
        .chain(
            incident
                .similar_matches
                .iter()
                .map(|m| format!("{} (distance {})", m.identifier, m.distance)),
        )
        .collect()
}

/// Alert body.
pub fn render_alert(incident: &Incident) -> String {
    let matches = matched_identifiers(incident);
    let matches_text = if matches.is_empty() {
        "None".to_string()
    } else {
        matches.join(", ")
    };

    format!(
        "==== Imprint Alert ====\n\
         Image: {}\n\
         Authenticity Verdict: {} (Confidence: {:.2})\n\
         Matches Found: {}\n\
         Timestamp: {}\n\
         =======================\n",
        incident.content_key,
        incident.verdict.label,
        incident.verdict.confidence,
        matches_text,
        incident.detected_at.to_rfc3339(),
    )
}

/// Takedown request template.
pub fn render_takedown(incident: &Incident) -> String {
    let matches = matched_identifiers(incident);
    let mut body = String::new();

    body.push_str("To: Abuse/Privacy Team\n");
    body.push_str("Subject: Takedown Request - Misuse of Personal Image\n\n");
    body.push_str("Dear Team,\n\n");
    body.push_str(&format!(
        "Please remove content that misuses my personal image ({}).\n",
        incident.content_key
    ));
    body.push_str(&format!("Detection Result: {}\n", incident.verdict.label));
    if !matches.is_empty() {
        body.push_str(&format!("Matched Files: {}\n", matches.join(", ")));
    }
    body.push_str(
        "\nThis violates my privacy rights. Please act on it urgently.\n\nSincerely,\nUser\n",
    );
    body.push_str(&format!("Timestamp: {}\n", incident.detected_at.to_rfc3339()));

    body
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::classifier::Label;

    fn incident(exact: Vec<&str>, similar: Vec<(&str, u32)>) -> Incident {
        Incident {
            content_key: "query.jpg".into(),
            verdict: Verdict::new(Label::Fake, 0.876).unwrap(),
            exact_matches: exact.into_iter().map(String::from).collect(),
            similar_matches: similar
                .into_iter()
                .map(|(identifier, distance)| Match {
                    identifier: identifier.into(),
                    distance,
                })
                .collect(),
            detected_at: Utc::now(),
        }
    }

    #[test]
    fn test_render_alert_with_matches() {
        let text = render_alert(&incident(vec!["ref.jpg"], vec![("near.jpg", 3)]));
        assert!(text.contains("Image: query.jpg"));
        assert!(text.contains("FAKE (Confidence: 0.88)"));
        assert!(text.contains("Matches Found: ref.jpg, near.jpg (distance 3)"));
    }

    #[test]
    fn test_render_alert_without_matches() {
        let text = render_alert(&incident(vec![], vec![]));
        assert!(text.contains("Matches Found: None"));
    }

    #[test]
    fn test_render_takedown_omits_empty_matches() {
        let without = render_takedown(&incident(vec![], vec![]));
        assert!(!without.contains("Matched Files"));
        assert!(without.contains("Detection Result: FAKE"));

        let with = render_takedown(&incident(vec!["ref.jpg"], vec![]));
        assert!(with.contains("Matched Files: ref.jpg"));
    }

    #[tokio::test]
    async fn test_file_reporter_writes_both_artifacts() {
        let dir = tempfile::tempdir().unwrap();
        let reporter = FileIncidentReporter::new(dir.path().join("alerts"));

        let artifacts = reporter
            .report(&incident(vec!["ref.jpg"], vec![]))
            .await
            .unwrap();

        let alert = artifacts.alert_ref.unwrap();
        let takedown = artifacts.takedown_ref.unwrap();
        assert!(alert.contains("alert_"));
        assert!(takedown.contains("takedown_"));
        assert!(std::fs::read_to_string(&alert).unwrap().contains("ref.jpg"));
        assert!(std::fs::read_to_string(&takedown)
            .unwrap()
            .contains("Takedown Request"));
    }

    #[tokio::test]
    async fn test_same_second_incidents_do_not_collide() {
        let dir = tempfile::tempdir().unwrap();
        let reporter = FileIncidentReporter::new(dir.path());
        let incident = incident(vec![], vec![]);

        let a = reporter.report(&incident).await.unwrap();
        let b = reporter.report(&incident).await.unwrap();
        assert_ne!(a.alert_ref, b.alert_ref);
        assert_eq!(std::fs::read_dir(dir.path()).unwrap().count(), 4);
    }

    #[tokio::test]
    async fn test_unwritable_dir_is_report_error() {
        let dir = tempfile::tempdir().unwrap();
        let blocker = dir.path().join("blocker");
        std::fs::write(&blocker, b"file, not a directory").unwrap();

        let reporter = FileIncidentReporter::new(blocker.join("alerts"));
        let err = reporter.report(&incident(vec![], vec![])).await.unwrap_err();
        assert!(matches!(err, ReportError::Write { .. }));
    }

    #[tokio::test]
    async fn test_failed_takedown_leaves_no_orphaned_alert() {
        let dir = tempfile::tempdir().unwrap();
        // A directory where the takedown file should go makes that write fail.
        std::fs::create_dir(dir.path().join("takedown_x.txt")).unwrap();

        let reporter = FileIncidentReporter::new(dir.path());
        let err = reporter
            .write_pair(
                ("alert_x.txt", "alert".into()),
                ("takedown_x.txt", "takedown".into()),
            )
            .await
            .unwrap_err();

        assert!(matches!(err, ReportError::Write { .. }));
        assert!(!dir.path().join("alert_x.txt").exists());
    }
}
