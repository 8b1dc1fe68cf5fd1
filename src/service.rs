//! Control-plane abstraction for reading and mutating database instances.

use std::fmt;
use std::future::Future;
use std::pin::Pin;

use thiserror::Error;

use crate::instance::{
    ComputeModel, DefinedTags, InstanceId, InstanceRecord, LicenseModel, LifecycleState,
};
use crate::runner::RunnerError;

/// Backup retention applied alongside the ECPU conversion.
pub const ECPU_BACKUP_RETENTION_DAYS: u32 = 15;

/// Compute count applied when storage is rescaled.
pub const SCALED_COMPUTE_COUNT: f64 = 2.0;

/// Edition applied alongside the BYOL licence change.
pub const STANDARD_EDITION: &str = "STANDARD_EDITION";

/// Partial update submitted to the control plane.
///
/// Each variant is one of the field groups the remediation policy changes
/// together; fields outside the group are left untouched.
#[derive(Clone, Debug, PartialEq)]
pub enum InstanceUpdate {
    /// Switch the compute billing model.
    ComputeModel {
        /// Target compute model.
        compute_model: ComputeModel,
        /// Backup retention to apply, in days.
        backup_retention_days: u32,
    },
    /// Resize storage in gigabytes and reset compute.
    Storage {
        /// Target data storage in gigabytes.
        data_storage_size_gb: u32,
        /// Enable storage auto-scaling.
        storage_auto_scaling: bool,
        /// Compute count to apply.
        compute_count: f64,
        /// Enable compute auto-scaling.
        compute_auto_scaling: bool,
    },
    /// Change licensing and edition.
    License {
        /// Target licence model.
        license_model: LicenseModel,
        /// Target database edition.
        database_edition: String,
    },
    /// Replace the defined-tag map.
    DefinedTags(DefinedTags),
}

impl InstanceUpdate {
    /// Conversion to ECPU with the standard backup retention.
    #[must_use]
    pub const fn ecpu_conversion() -> Self {
        Self::ComputeModel {
            compute_model: ComputeModel::Ecpu,
            backup_retention_days: ECPU_BACKUP_RETENTION_DAYS,
        }
    }

    /// Storage resize to `target_gb` with auto-scaling and two compute units.
    #[must_use]
    pub const fn storage_scale(target_gb: u32) -> Self {
        Self::Storage {
            data_storage_size_gb: target_gb,
            storage_auto_scaling: true,
            compute_count: SCALED_COMPUTE_COUNT,
            compute_auto_scaling: true,
        }
    }

    /// Licence change to BYOL on Standard Edition.
    #[must_use]
    pub fn byol_standard() -> Self {
        Self::License {
            license_model: LicenseModel::BringYourOwnLicense,
            database_edition: STANDARD_EDITION.to_owned(),
        }
    }

    /// Returns the field group touched by this update.
    #[must_use]
    pub const fn kind(&self) -> UpdateKind {
        match self {
            Self::ComputeModel { .. } => UpdateKind::ComputeModel,
            Self::Storage { .. } => UpdateKind::Storage,
            Self::License { .. } => UpdateKind::License,
            Self::DefinedTags(_) => UpdateKind::DefinedTags,
        }
    }
}

/// Discriminant of [`InstanceUpdate`].
#[derive(Clone, Copy, Debug, Eq, Hash, Ord, PartialEq, PartialOrd)]
pub enum UpdateKind {
    /// Compute model conversion.
    ComputeModel,
    /// Storage resize.
    Storage,
    /// Licence change.
    License,
    /// Defined-tag replacement.
    DefinedTags,
}

impl fmt::Display for UpdateKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            Self::ComputeModel => "compute model",
            Self::Storage => "storage",
            Self::License => "license",
            Self::DefinedTags => "defined tags",
        };
        f.write_str(label)
    }
}

/// Failures raised by a remote control-plane call.
#[derive(Clone, Debug, Error, Eq, PartialEq)]
pub enum ServiceError {
    /// Raised when the control-plane client exits unsuccessfully.
    #[error("{program} exited with status {status_text}: {stderr}")]
    CommandFailure {
        /// Program that failed (typically `oci`).
        program: String,
        /// Human readable representation of the exit status.
        status_text: String,
        /// Stderr captured from the command.
        stderr: String,
    },
    /// Raised when a response cannot be parsed.
    #[error("failed to parse {resource} response: {message}")]
    Parse {
        /// Resource being parsed.
        resource: String,
        /// Parser error message.
        message: String,
    },
    /// Raised when the poll primitive gives up waiting for a state.
    #[error("timeout waiting for instance {instance_id} to reach {state}")]
    Timeout {
        /// Instance being polled.
        instance_id: String,
        /// Desired lifecycle state.
        state: String,
    },
    /// Raised when the service rejects or fails a request.
    #[error("service error: {message}")]
    Remote {
        /// Message returned by the service.
        message: String,
    },
    /// Raised when the client process cannot be run at all.
    #[error(transparent)]
    Runner(#[from] RunnerError),
}

/// Future returned by service operations.
pub type ServiceFuture<'a, T> = Pin<Box<dyn Future<Output = Result<T, ServiceError>> + Send + 'a>>;

/// Capability contract for the database control plane.
///
/// Implementations are shared across concurrently running workers and must
/// therefore be safe to call from several tasks at once.
pub trait DatabaseService: Send + Sync {
    /// Lists every candidate instance matching the fleet's workload filter.
    fn list_candidates(&self) -> ServiceFuture<'_, Vec<InstanceId>>;

    /// Fetches the current state of one instance.
    fn fetch_instance<'a>(&'a self, id: &'a InstanceId) -> ServiceFuture<'a, InstanceRecord>;

    /// Starts an instance; a no-op when it is already running.
    fn start_instance<'a>(&'a self, id: &'a InstanceId) -> ServiceFuture<'a, ()>;

    /// Applies a partial update to an instance.
    fn update_instance<'a>(
        &'a self,
        id: &'a InstanceId,
        update: &'a InstanceUpdate,
    ) -> ServiceFuture<'a, ()>;

    /// Polls until the instance reports `state`, bounded by the
    /// implementation's own poll policy.
    fn wait_for_state<'a>(
        &'a self,
        id: &'a InstanceId,
        state: &'a LifecycleState,
    ) -> ServiceFuture<'a, ()>;
}
