//! Per-instance remediation policy.
//!
//! A [`Remediator`] takes one instance identifier through a fixed sequence
//! of idempotent steps:
//!
//! 1. convert OCPU billing to ECPU,
//! 2. rescale terabyte-modelled storage to gigabytes,
//! 3. switch included licences to BYOL on Standard Edition,
//! 4. ensure the `Schedule.AnyDay` tag permits stopping.
//!
//! Each mutation is bracketed by availability checks. Dedicated, standby,
//! free-tier, and unavailable instances are never touched. Remote failures
//! end processing for that instance only and are folded into its
//! [`RemediationOutcome`].

use std::sync::Arc;
use std::time::Duration;

use tracing::{debug, error, info};

use crate::instance::{
    ComputeModel, InstanceId, InstanceRecord, LicenseModel, LifecycleState, Role,
};
use crate::outcome::{AppliedStep, InstanceDetail, RemediationOutcome, SkipReason};
use crate::schedule::{ScheduleStatus, schedule_patch, schedule_status};
use crate::service::{DatabaseService, InstanceUpdate, ServiceError};
use crate::waiter::{AvailabilityWaiter, dry_run_prefix};

/// Minimum data storage applied when rescaling, in gigabytes.
pub const MIN_STORAGE_GB: u32 = 20;

const GB_PER_TB: f64 = 1024.0;
const STORAGE_HEADROOM: f64 = 2.0;

/// Computes the gigabyte storage target for `allocated_tb` terabytes.
///
/// The allocation is converted to gigabytes and doubled for headroom, then
/// floored at [`MIN_STORAGE_GB`]. Values beyond `u32::MAX` saturate.
#[must_use]
#[expect(
    clippy::float_arithmetic,
    clippy::cast_possible_truncation,
    clippy::cast_sign_loss,
    reason = "storage sizes arrive as fractional terabytes and saturate into whole gigabytes"
)]
pub fn storage_target_gb(allocated_tb: f64) -> u32 {
    let scaled = (allocated_tb * GB_PER_TB * STORAGE_HEADROOM).floor() as u32;
    scaled.max(MIN_STORAGE_GB)
}

/// Returns why `record` must not be mutated, if it is excluded.
#[must_use]
pub fn skip_reason(record: &InstanceRecord) -> Option<SkipReason> {
    if record.is_dedicated {
        Some(SkipReason::Dedicated)
    } else if record.role == Role::Standby {
        Some(SkipReason::Standby)
    } else if record.is_free_tier {
        Some(SkipReason::FreeTier)
    } else if record.lifecycle_state == LifecycleState::Unavailable {
        Some(SkipReason::Unavailable)
    } else {
        None
    }
}

/// Applies the remediation policy to single instances.
#[derive(Debug)]
pub struct Remediator<S> {
    service: Arc<S>,
    dry_run: bool,
    stagger: Duration,
}

impl<S: DatabaseService> Remediator<S> {
    /// Creates a remediator over the shared service handle.
    #[must_use]
    pub const fn new(service: Arc<S>, dry_run: bool) -> Self {
        Self {
            service,
            dry_run,
            stagger: Duration::ZERO,
        }
    }

    /// Delays each worker's first call by `stagger` outside dry-run.
    #[must_use]
    pub const fn with_stagger(mut self, stagger: Duration) -> Self {
        self.stagger = stagger;
        self
    }

    /// Returns `true` when mutations are suppressed.
    #[must_use]
    pub const fn dry_run(&self) -> bool {
        self.dry_run
    }

    /// Remediates one instance and reports what happened.
    ///
    /// This never fails: every remote error is captured in the returned
    /// outcome.
    pub async fn remediate(&self, id: &InstanceId) -> RemediationOutcome {
        if !self.dry_run && !self.stagger.is_zero() {
            tokio::time::sleep(self.stagger).await;
        }

        let record = match self.service.fetch_instance(id).await {
            Ok(record) => record,
            Err(err) => {
                error!(instance = %id, error = %err, "failed to read autonomous database");
                return RemediationOutcome::failed(id.clone(), err.to_string());
            }
        };

        log_examine(&record);
        let mut outcome = RemediationOutcome::new(InstanceDetail::from(&record));

        if let Some(reason) = skip_reason(&record) {
            debug!(instance = %id, %reason, "not operating on excluded database");
            return outcome.skipped(reason);
        }

        if let Err(err) = self.apply_policy(&record, &mut outcome).await {
            error!(
                instance = %id,
                name = %record.display_name,
                error = %err,
                "failed to complete remediation"
            );
            outcome.fail(err.to_string());
            return outcome;
        }

        info!(instance = %id, name = %record.display_name, "remediation complete");
        outcome
    }

    async fn apply_policy(
        &self,
        record: &InstanceRecord,
        outcome: &mut RemediationOutcome,
    ) -> Result<(), ServiceError> {
        let prefix = dry_run_prefix(self.dry_run);
        let name = record.display_name.as_str();

        debug!(
            compute_model = %record.compute_model,
            compute_count = record.compute_count,
            "compute"
        );
        if record.compute_model == ComputeModel::Ocpu {
            info!(instance = %record.id, ">>>{prefix}Converting {name} to ECPU");
            self.mutate(&record.id, &InstanceUpdate::ecpu_conversion())
                .await?;
            outcome.record(AppliedStep::ComputeConverted);
            info!(instance = %record.id, "{prefix}Converted {name} to ECPU");
        }

        debug!(
            data_tb = ?record.data_storage_size_tb,
            used_tb = ?record.used_storage_size_tb,
            allocated_tb = record.allocated_storage_size_tb,
            "storage"
        );
        match record.data_storage_size_tb {
            None => debug!(instance = %record.id, "storage already in GB model, no action"),
            Some(data_tb) => {
                let target_gb = storage_target_gb(record.allocated_storage_size_tb);
                info!(
                    instance = %record.id,
                    ">>>{prefix}Scaling storage of {name} from {data_tb} TB to {target_gb} GB (auto-scale)"
                );
                self.mutate(&record.id, &InstanceUpdate::storage_scale(target_gb))
                    .await?;
                outcome.record(AppliedStep::StorageScaled { target_gb });
                info!(instance = %record.id, "{prefix}Scaled storage of {name}");
            }
        }

        if record.license_model == LicenseModel::LicenseIncluded {
            info!(instance = %record.id, ">>>{prefix}Updating license of {name} to BYOL / SE");
            self.mutate(&record.id, &InstanceUpdate::byol_standard())
                .await?;
            outcome.record(AppliedStep::LicenseChanged);
            info!(instance = %record.id, "{prefix}Updated license of {name} to BYOL / SE");
        }

        match schedule_status(&record.defined_tags) {
            ScheduleStatus::Compliant(schedule) => {
                debug!(instance = %record.id, %schedule, "schedule compliant, will stop");
            }
            ScheduleStatus::MissingAnyDay => {
                debug!(instance = %record.id, "schedule namespace has no AnyDay key, no action");
            }
            ScheduleStatus::MissingNamespace => {
                info!(instance = %record.id, ">>>{prefix}Adding default Schedule.AnyDay tag to {name}");
            }
            ScheduleStatus::NeverStops(schedule) => {
                info!(
                    instance = %record.id,
                    ">>>{prefix}Schedule {schedule} of {name} never stops, applying default"
                );
            }
        }
        if let Some(tags) = schedule_patch(&record.defined_tags) {
            self.mutate(&record.id, &InstanceUpdate::DefinedTags(tags))
                .await?;
            outcome.record(AppliedStep::TagFixed);
            info!(instance = %record.id, "{prefix}Updated schedule tags of {name}");
        }

        Ok(())
    }

    async fn mutate(&self, id: &InstanceId, update: &InstanceUpdate) -> Result<(), ServiceError> {
        let waiter = AvailabilityWaiter::new(self.service.as_ref(), self.dry_run);
        waiter.ensure_available(id, true).await?;
        if self.dry_run {
            debug!(instance = %id, kind = %update.kind(), "DRYRUN: skipping update");
        } else {
            self.service.update_instance(id, update).await?;
        }
        waiter.ensure_available(id, false).await
    }
}

fn log_examine(record: &InstanceRecord) {
    info!(instance = %record.id, "----Examine ({})----", record.display_name);
    info!(
        instance = %record.id,
        compute_model = %record.compute_model,
        dedicated = record.is_dedicated,
        role = %record.role,
        data_tb = ?record.data_storage_size_tb,
        license_model = %record.license_model,
        edition = %record.database_edition,
        state = %record.lifecycle_state,
        "current configuration"
    );
}
