//! Core library for fleet-wide remediation of serverless Autonomous
//! Databases.
//!
//! The crate enumerates candidate databases through a [`DatabaseService`],
//! applies a fixed, idempotent policy to each one on a bounded worker pool
//! (ECPU billing, gigabyte storage with auto-scaling, BYOL licensing, and a
//! stop-permitting `Schedule.AnyDay` tag), and persists an ordered report of
//! what happened. [`OciCliService`] drives the real control plane through the
//! `oci` CLI; [`test_support`] provides an in-memory fake.

pub mod config;
pub mod dispatch;
pub mod instance;
pub mod logging;
pub mod oci;
pub mod outcome;
pub mod remediate;
pub mod report;
pub mod run;
pub mod runner;
pub mod schedule;
pub mod service;
pub mod test_support;
pub mod waiter;

pub use config::{ConfigError, RemediateConfig};
pub use dispatch::{DEFAULT_POOL_SIZE, Dispatcher};
pub use instance::{
    ComputeModel, DefinedTags, InstanceId, InstanceRecord, LicenseModel, LifecycleState, Role,
};
pub use logging::{LoggingError, init_tracing};
pub use oci::{OciAuth, OciCliService, OciSettings, PollPolicy};
pub use outcome::{AppliedStep, InstanceDetail, OutcomeStatus, RemediationOutcome, SkipReason};
pub use remediate::{Remediator, storage_target_gb};
pub use report::{JsonReportWriter, RemediationReport, ReportError, ReportWriter, RunSummary};
pub use run::{RemediationRun, RunError, RunReceipt};
pub use runner::{CommandOutput, CommandRunner, ProcessCommandRunner, RunnerError};
pub use schedule::{DEFAULT_SCHEDULE, ScheduleStatus, schedule_patch, schedule_status};
pub use service::{DatabaseService, InstanceUpdate, ServiceError, UpdateKind};
pub use waiter::AvailabilityWaiter;
