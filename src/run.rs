//! Orchestrates one remediation pass over the fleet.
//!
//! The run enumerates candidates, fans the remediation worker out across a
//! bounded pool, assembles the ordered outcomes into a report, and persists
//! it. Only enumeration and report persistence can fail a run; per-instance
//! failures live in the report.

use std::num::NonZeroUsize;
use std::sync::Arc;
use std::time::Duration;

use camino::Utf8PathBuf;
use chrono::Local;
use thiserror::Error;
use tracing::info;

use crate::dispatch::{DEFAULT_POOL_SIZE, Dispatcher};
use crate::remediate::Remediator;
use crate::report::{RemediationReport, ReportError, ReportWriter, RunSummary};
use crate::service::{DatabaseService, ServiceError};

/// Errors that abort a run.
#[derive(Debug, Error)]
pub enum RunError {
    /// Raised when candidates cannot be enumerated; nothing was processed.
    #[error("failed to enumerate candidate databases: {0}")]
    Enumeration(#[source] ServiceError),
    /// Raised when the report cannot be persisted after processing.
    #[error("failed to persist report: {source}")]
    Report {
        /// Outcome counts of the completed pass.
        summary: RunSummary,
        /// Underlying persistence error.
        #[source]
        source: ReportError,
    },
}

/// Result of a completed run.
#[derive(Clone, Debug)]
pub struct RunReceipt {
    /// The assembled report.
    pub report: RemediationReport,
    /// Where the report was written.
    pub location: Utf8PathBuf,
}

impl RunReceipt {
    /// Outcome counts.
    #[must_use]
    pub const fn summary(&self) -> RunSummary {
        self.report.summary
    }
}

/// Executes a remediation pass using the provided service and report writer.
#[derive(Debug)]
pub struct RemediationRun<S, W> {
    service: Arc<S>,
    writer: W,
    dry_run: bool,
    pool_size: NonZeroUsize,
    stagger: Duration,
}

impl<S, W> RemediationRun<S, W>
where
    S: DatabaseService + 'static,
    W: ReportWriter,
{
    /// Creates a run with the default pool size and no start stagger.
    #[must_use]
    pub const fn new(service: Arc<S>, writer: W, dry_run: bool) -> Self {
        Self {
            service,
            writer,
            dry_run,
            pool_size: DEFAULT_POOL_SIZE,
            stagger: Duration::ZERO,
        }
    }

    /// Overrides the concurrency bound.
    #[must_use]
    pub const fn with_pool_size(mut self, pool_size: NonZeroUsize) -> Self {
        self.pool_size = pool_size;
        self
    }

    /// Overrides the per-worker start delay.
    #[must_use]
    pub const fn with_stagger(mut self, stagger: Duration) -> Self {
        self.stagger = stagger;
        self
    }

    /// Runs the pass and writes its report.
    ///
    /// # Errors
    ///
    /// Returns [`RunError::Enumeration`] when listing fails and
    /// [`RunError::Report`] when the report cannot be written.
    pub async fn execute(&self) -> Result<RunReceipt, RunError> {
        info!(
            dry_run = self.dry_run,
            pool_size = self.pool_size.get(),
            "starting autonomous database remediation"
        );
        let ids = self
            .service
            .list_candidates()
            .await
            .map_err(RunError::Enumeration)?;
        info!(count = ids.len(), "candidate databases found");

        let remediator = Remediator::new(Arc::clone(&self.service), self.dry_run)
            .with_stagger(self.stagger);
        let outcomes = Dispatcher::new(Arc::new(remediator), self.pool_size)
            .dispatch(&ids)
            .await;

        let report = RemediationReport::assemble(outcomes, self.dry_run, Local::now());
        let location = self.writer.write(&report).map_err(|source| RunError::Report {
            summary: report.summary,
            source,
        })?;

        info!(
            total = report.summary.total,
            remediated = report.summary.remediated,
            unchanged = report.summary.unchanged,
            skipped = report.summary.skipped,
            failed = report.summary.failed,
            "remediation pass complete"
        );
        Ok(RunReceipt { report, location })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::outcome::OutcomeStatus;
    use crate::test_support::{
        FakeDatabaseService, MemoryReportWriter, ServiceCall, compliant_instance,
        noncompliant_instance,
    };

    fn fleet() -> FakeDatabaseService {
        let mut standby = noncompliant_instance("db-standby");
        standby.role = crate::instance::Role::Standby;
        FakeDatabaseService::with_instances([
            noncompliant_instance("db-fix"),
            compliant_instance("db-ok"),
            standby,
        ])
    }

    #[tokio::test]
    async fn run_writes_report_with_ordered_outcomes() {
        let service = fleet();
        let writer = MemoryReportWriter::new();

        let receipt = RemediationRun::new(Arc::new(service.clone()), writer.clone(), false)
            .execute()
            .await
            .expect("run should succeed");

        let statuses: Vec<OutcomeStatus> =
            receipt.report.outcomes.iter().map(|o| o.status()).collect();
        assert_eq!(
            statuses,
            vec![
                OutcomeStatus::Remediated,
                OutcomeStatus::Unchanged,
                OutcomeStatus::Skipped,
            ]
        );
        assert_eq!(receipt.summary().total, 3);
        assert_eq!(receipt.location.as_str(), "memory://report.json");
        assert_eq!(writer.reports().len(), 1);
        assert!(!receipt.report.dry_run);
    }

    #[tokio::test]
    async fn enumeration_failure_aborts_before_any_instance_work() {
        let service = fleet();
        service.fail_listing("NotAuthenticated");
        let writer = MemoryReportWriter::new();

        let err = RemediationRun::new(Arc::new(service.clone()), writer.clone(), false)
            .execute()
            .await
            .expect_err("run should fail");

        assert!(matches!(err, RunError::Enumeration(_)), "got {err:?}");
        assert_eq!(service.calls(), vec![ServiceCall::List]);
        assert!(writer.reports().is_empty());
    }

    #[tokio::test]
    async fn report_failure_keeps_the_summary() {
        let service = fleet();

        let err = RemediationRun::new(
            Arc::new(service),
            MemoryReportWriter::failing("disk full"),
            true,
        )
        .execute()
        .await
        .expect_err("run should fail");

        let RunError::Report { summary, source } = err else {
            panic!("expected report error");
        };
        assert_eq!(summary.total, 3);
        assert!(source.to_string().contains("disk full"));
    }

    #[tokio::test]
    async fn dry_run_is_recorded_and_mutates_nothing() {
        let service = fleet();
        let writer = MemoryReportWriter::new();

        let receipt = RemediationRun::new(Arc::new(service.clone()), writer, true)
            .with_stagger(Duration::from_secs(60))
            .execute()
            .await
            .expect("run should succeed");

        assert!(receipt.report.dry_run);
        assert_eq!(service.start_count() + service.update_count(), 0);
        assert_eq!(receipt.summary().remediated, 1);
    }

    #[tokio::test]
    async fn empty_fleet_produces_empty_report() {
        let writer = MemoryReportWriter::new();

        let receipt = RemediationRun::new(Arc::new(FakeDatabaseService::new()), writer, false)
            .with_pool_size(NonZeroUsize::MIN)
            .execute()
            .await
            .expect("run should succeed");

        assert!(receipt.report.outcomes.is_empty());
        assert_eq!(receipt.summary(), RunSummary::default());
    }
}
