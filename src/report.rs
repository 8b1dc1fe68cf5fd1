//! Aggregation and persistence of remediation outcomes.
//!
//! The report keeps outcomes in submission order and adds only run metadata
//! and a summary; the outcomes themselves are passed through untouched.

use camino::{Utf8Path, Utf8PathBuf};
use cap_std::{ambient_authority, fs_utf8::Dir};
use chrono::{DateTime, Local};
use serde::Serialize;
use thiserror::Error;
use tracing::info;

use crate::outcome::{OutcomeStatus, RemediationOutcome};

/// File name prefix for persisted reports.
pub const REPORT_FILE_PREFIX: &str = "oci-atp-scale-down-";

const REPORT_TIMESTAMP_FORMAT: &str = "%Y-%m-%d-%H-%M";

/// Counts of outcomes by status.
#[derive(Clone, Copy, Debug, Default, Eq, PartialEq, Serialize)]
pub struct RunSummary {
    /// Instances processed.
    pub total: usize,
    /// Instances where at least one step applied.
    pub remediated: usize,
    /// Instances that were already compliant.
    pub unchanged: usize,
    /// Instances excluded from mutation.
    pub skipped: usize,
    /// Instances whose processing ended with a remote error.
    pub failed: usize,
}

impl RunSummary {
    /// Tallies `outcomes`.
    #[must_use]
    pub fn tally(outcomes: &[RemediationOutcome]) -> Self {
        outcomes
            .iter()
            .fold(Self::default(), |mut summary, outcome| {
                summary.total += 1;
                match outcome.status() {
                    OutcomeStatus::Remediated => summary.remediated += 1,
                    OutcomeStatus::Unchanged => summary.unchanged += 1,
                    OutcomeStatus::Skipped => summary.skipped += 1,
                    OutcomeStatus::Failed => summary.failed += 1,
                }
                summary
            })
    }
}

/// Final, serialisable result of a run.
#[derive(Clone, Debug, Eq, PartialEq, Serialize)]
pub struct RemediationReport {
    /// When the report was assembled.
    pub generated_at: DateTime<Local>,
    /// Whether mutations were suppressed.
    pub dry_run: bool,
    /// Outcome counts.
    pub summary: RunSummary,
    /// One outcome per candidate, in submission order.
    pub outcomes: Vec<RemediationOutcome>,
}

impl RemediationReport {
    /// Assembles a report from ordered outcomes, logging each one.
    #[must_use]
    pub fn assemble(
        outcomes: Vec<RemediationOutcome>,
        dry_run: bool,
        generated_at: DateTime<Local>,
    ) -> Self {
        for outcome in &outcomes {
            info!(
                instance = %outcome.detail.id,
                status = ?outcome.status(),
                steps = ?outcome.steps_applied,
                skip = ?outcome.skip_reason,
                error = ?outcome.error,
                "result"
            );
        }
        Self {
            generated_at,
            dry_run,
            summary: RunSummary::tally(&outcomes),
            outcomes,
        }
    }

    /// File name under which the report is persisted.
    #[must_use]
    pub fn file_name(&self) -> String {
        format!(
            "{REPORT_FILE_PREFIX}{}.json",
            self.generated_at.format(REPORT_TIMESTAMP_FORMAT)
        )
    }
}

/// Errors raised while persisting a report.
#[derive(Debug, Error)]
pub enum ReportError {
    /// Raised when file system operations fail.
    #[error("failed to write report to {path}: {message}")]
    Io {
        /// Path that could not be written.
        path: Utf8PathBuf,
        /// Human-readable error message.
        message: String,
    },
    /// Raised when the report cannot be rendered.
    #[error("failed to render report: {0}")]
    Serialise(#[from] serde_json::Error),
}

/// Persists reports; implemented by storage backends.
pub trait ReportWriter {
    /// Writes `report` and returns where it was stored.
    ///
    /// # Errors
    ///
    /// Returns [`ReportError`] when rendering or storage fails.
    fn write(&self, report: &RemediationReport) -> Result<Utf8PathBuf, ReportError>;
}

/// Writes pretty-printed JSON reports into a directory.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct JsonReportWriter {
    directory: Utf8PathBuf,
}

impl JsonReportWriter {
    /// Creates a writer targeting `directory`, created on demand.
    pub fn new(directory: impl Into<Utf8PathBuf>) -> Self {
        Self {
            directory: directory.into(),
        }
    }

    /// Directory receiving reports.
    #[must_use]
    pub fn directory(&self) -> &Utf8Path {
        &self.directory
    }
}

impl ReportWriter for JsonReportWriter {
    fn write(&self, report: &RemediationReport) -> Result<Utf8PathBuf, ReportError> {
        let file_name = report.file_name();
        let path = self.directory.join(&file_name);
        let rendered = serde_json::to_string_pretty(report)?;

        Dir::create_ambient_dir_all(&self.directory, ambient_authority()).map_err(|err| {
            ReportError::Io {
                path: self.directory.clone(),
                message: err.to_string(),
            }
        })?;
        let dir = Dir::open_ambient_dir(&self.directory, ambient_authority()).map_err(|err| {
            ReportError::Io {
                path: self.directory.clone(),
                message: err.to_string(),
            }
        })?;
        dir.write(&file_name, rendered)
            .map_err(|err| ReportError::Io {
                path: path.clone(),
                message: err.to_string(),
            })?;

        info!(path = %path, "wrote remediation report");
        Ok(path)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::instance::InstanceId;
    use crate::outcome::{AppliedStep, InstanceDetail, SkipReason};
    use chrono::TimeZone;
    use rstest::{fixture, rstest};
    use tempfile::TempDir;

    #[fixture]
    fn outcomes() -> Vec<RemediationOutcome> {
        let mut remediated = RemediationOutcome::new(InstanceDetail::unknown(InstanceId::from("a")));
        remediated.record(AppliedStep::TagFixed);
        let skipped = RemediationOutcome::new(InstanceDetail::unknown(InstanceId::from("b")))
            .skipped(SkipReason::Dedicated);
        let failed = RemediationOutcome::failed(InstanceId::from("c"), "boom");
        let unchanged = RemediationOutcome::new(InstanceDetail::unknown(InstanceId::from("d")));
        vec![remediated, skipped, failed, unchanged]
    }

    fn fixed_time() -> DateTime<Local> {
        Local
            .with_ymd_and_hms(2024, 2, 14, 9, 5, 0)
            .single()
            .expect("fixed timestamp should be unambiguous")
    }

    #[rstest]
    fn assemble_keeps_order_and_tallies(outcomes: Vec<RemediationOutcome>) {
        let report = RemediationReport::assemble(outcomes.clone(), false, fixed_time());

        assert_eq!(report.outcomes, outcomes);
        assert_eq!(
            report.summary,
            RunSummary {
                total: 4,
                remediated: 1,
                unchanged: 1,
                skipped: 1,
                failed: 1,
            }
        );
    }

    #[rstest]
    fn file_name_carries_minute_timestamp() {
        let report = RemediationReport::assemble(Vec::new(), true, fixed_time());
        assert_eq!(report.file_name(), "oci-atp-scale-down-2024-02-14-09-05.json");
    }

    #[rstest]
    fn json_writer_persists_report(outcomes: Vec<RemediationOutcome>) {
        let tmp = TempDir::new().unwrap_or_else(|err| panic!("tempdir: {err}"));
        let root = Utf8PathBuf::from_path_buf(tmp.path().join("reports"))
            .unwrap_or_else(|path| panic!("non-utf8 tempdir: {}", path.display()));
        let writer = JsonReportWriter::new(root.clone());
        let report = RemediationReport::assemble(outcomes, false, fixed_time());

        let path = writer.write(&report).expect("report should be written");

        assert_eq!(path, root.join(report.file_name()));
        let contents = std::fs::read_to_string(&path).expect("report should be readable");
        let value: serde_json::Value =
            serde_json::from_str(&contents).expect("report should be valid JSON");
        assert_eq!(value["summary"]["total"], 4);
        assert_eq!(value["outcomes"][0]["detail"]["id"], "a");
        assert_eq!(value["outcomes"][1]["skip_reason"], "dedicated");
        assert_eq!(value["outcomes"][2]["error"], "boom");
    }

    #[rstest]
    fn json_writer_reports_unwritable_directory() {
        let tmp = TempDir::new().unwrap_or_else(|err| panic!("tempdir: {err}"));
        let blocker = tmp.path().join("blocker");
        std::fs::write(&blocker, "not a directory").expect("blocker file should be written");
        let root = Utf8PathBuf::from_path_buf(blocker)
            .unwrap_or_else(|path| panic!("non-utf8 tempdir: {}", path.display()));

        let err = JsonReportWriter::new(root)
            .write(&RemediationReport::assemble(Vec::new(), false, fixed_time()))
            .expect_err("writing beneath a file should fail");

        assert!(matches!(err, ReportError::Io { .. }), "got {err:?}");
    }
}
