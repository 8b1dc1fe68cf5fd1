//! Shared fixtures for remediation BDD scenarios.

use std::cell::{Cell, RefCell};
use std::num::NonZeroUsize;
use std::sync::Arc;

use atp_remediate::test_support::{FakeDatabaseService, MemoryReportWriter};
use atp_remediate::{
    AppliedStep, InstanceId, RemediationOutcome, RemediationRun, RunError, RunReceipt,
};
use rstest::fixture;
use tokio::runtime::Runtime;

/// Observable result of a pass.
#[derive(Debug)]
pub enum RunResult {
    Completed(RunReceipt),
    Failed(RunError),
}

/// Scenario state shared between steps.
#[derive(Debug)]
pub struct RemediationContext {
    pub service: FakeDatabaseService,
    pub writer: RefCell<MemoryReportWriter>,
    pub dry_run: Cell<bool>,
    pub pool_size: Cell<NonZeroUsize>,
    pub result: RefCell<Option<RunResult>>,
}

#[fixture]
pub fn remediation_context() -> RemediationContext {
    RemediationContext {
        service: FakeDatabaseService::new(),
        writer: RefCell::new(MemoryReportWriter::new()),
        dry_run: Cell::new(false),
        pool_size: Cell::new(atp_remediate::DEFAULT_POOL_SIZE),
        result: RefCell::new(None),
    }
}

impl RemediationContext {
    pub fn execute(&self) {
        let runtime = Runtime::new().unwrap_or_else(|err| panic!("tokio runtime: {err}"));
        let run = RemediationRun::new(
            Arc::new(self.service.clone()),
            self.writer.borrow().clone(),
            self.dry_run.get(),
        )
        .with_pool_size(self.pool_size.get());
        let result = match runtime.block_on(run.execute()) {
            Ok(receipt) => RunResult::Completed(receipt),
            Err(err) => RunResult::Failed(err),
        };
        self.result.replace(Some(result));
    }

    pub fn receipt(&self) -> RunReceipt {
        match self.result.borrow().as_ref() {
            Some(RunResult::Completed(receipt)) => receipt.clone(),
            Some(RunResult::Failed(err)) => panic!("expected a completed run, got: {err}"),
            None => panic!("the remediation pass has not run"),
        }
    }

    pub fn outcome(&self, id: &str) -> RemediationOutcome {
        let target = InstanceId::from(id);
        self.receipt()
            .report
            .outcomes
            .into_iter()
            .find(|outcome| outcome.detail.id == target)
            .unwrap_or_else(|| panic!("no outcome recorded for {id}"))
    }

    pub fn with_failure<T>(&self, inspect: impl FnOnce(&RunError) -> T) -> T {
        match self.result.borrow().as_ref() {
            Some(RunResult::Failed(err)) => inspect(err),
            Some(RunResult::Completed(_)) => panic!("expected the run to fail"),
            None => panic!("the remediation pass has not run"),
        }
    }
}

/// Parses a comma-separated step list as written in feature files.
pub fn parse_steps(list: &str) -> Vec<&'static str> {
    list.split(',')
        .map(str::trim)
        .filter(|name| !name.is_empty())
        .map(|name| match name {
            "compute" => "compute",
            "storage" => "storage",
            "license" => "license",
            "tags" => "tags",
            other => panic!("unknown step name {other}"),
        })
        .collect()
}

/// Short name of an applied step.
pub const fn step_name(step: &AppliedStep) -> &'static str {
    match step {
        AppliedStep::ComputeConverted => "compute",
        AppliedStep::StorageScaled { .. } => "storage",
        AppliedStep::LicenseChanged => "license",
        AppliedStep::TagFixed => "tags",
    }
}
