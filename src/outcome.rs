//! Per-instance remediation results.

use std::fmt;

use serde::Serialize;

use crate::instance::{ComputeModel, InstanceId, InstanceRecord, LicenseModel};

/// Identifying details captured before any change is made.
#[derive(Clone, Debug, Eq, PartialEq, Serialize)]
pub struct InstanceDetail {
    /// Display name, unknown when the initial fetch failed.
    pub name: Option<String>,
    /// Instance identifier.
    pub id: InstanceId,
    /// Compute model observed at worker start.
    pub original_compute_model: Option<ComputeModel>,
    /// Licence model observed at worker start.
    pub original_license_model: Option<LicenseModel>,
}

impl InstanceDetail {
    /// Detail for an instance whose state could not be read.
    #[must_use]
    pub const fn unknown(id: InstanceId) -> Self {
        Self {
            name: None,
            id,
            original_compute_model: None,
            original_license_model: None,
        }
    }
}

impl From<&InstanceRecord> for InstanceDetail {
    fn from(record: &InstanceRecord) -> Self {
        Self {
            name: Some(record.display_name.clone()),
            id: record.id.clone(),
            original_compute_model: Some(record.compute_model.clone()),
            original_license_model: Some(record.license_model.clone()),
        }
    }
}

/// Why an instance was excluded from mutation.
#[derive(Clone, Copy, Debug, Eq, Hash, PartialEq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SkipReason {
    /// Runs on dedicated infrastructure.
    Dedicated,
    /// Data Guard standby.
    Standby,
    /// Always Free instance.
    FreeTier,
    /// Lifecycle state is `UNAVAILABLE`.
    Unavailable,
}

impl fmt::Display for SkipReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            Self::Dedicated => "dedicated",
            Self::Standby => "standby",
            Self::FreeTier => "free tier",
            Self::Unavailable => "unavailable",
        };
        f.write_str(label)
    }
}

/// A remediation step that changed (or under dry-run would change) state.
#[derive(Clone, Copy, Debug, Eq, Hash, PartialEq, Serialize)]
#[serde(tag = "step", rename_all = "snake_case")]
pub enum AppliedStep {
    /// Compute model converted to ECPU.
    ComputeConverted,
    /// Storage rescaled to the given size.
    StorageScaled {
        /// New data storage size in gigabytes.
        target_gb: u32,
    },
    /// Licence switched to BYOL on Standard Edition.
    LicenseChanged,
    /// Schedule tag set to the default.
    TagFixed,
}

/// Coarse classification of an outcome, used for run summaries.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum OutcomeStatus {
    /// Excluded by the eligibility filter.
    Skipped,
    /// A remote call failed.
    Failed,
    /// At least one step applied without error.
    Remediated,
    /// Already compliant; nothing applied.
    Unchanged,
}

/// Result of remediating one instance.
#[derive(Clone, Debug, Eq, PartialEq, Serialize)]
pub struct RemediationOutcome {
    /// Identifying details.
    pub detail: InstanceDetail,
    /// Present only when the instance was excluded from mutation.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub skip_reason: Option<SkipReason>,
    /// Steps that applied, in policy order.
    pub steps_applied: Vec<AppliedStep>,
    /// Message of the remote failure that ended processing, if any.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl RemediationOutcome {
    /// Starts an outcome with no steps recorded.
    #[must_use]
    pub const fn new(detail: InstanceDetail) -> Self {
        Self {
            detail,
            skip_reason: None,
            steps_applied: Vec::new(),
            error: None,
        }
    }

    /// Outcome for an instance that could not be processed at all.
    #[must_use]
    pub fn failed(id: InstanceId, message: impl Into<String>) -> Self {
        let mut outcome = Self::new(InstanceDetail::unknown(id));
        outcome.error = Some(message.into());
        outcome
    }

    /// Marks the instance as excluded.
    #[must_use]
    pub fn skipped(mut self, reason: SkipReason) -> Self {
        self.skip_reason = Some(reason);
        self
    }

    /// Records an applied step; repeated steps are ignored.
    pub fn record(&mut self, step: AppliedStep) {
        if !self.steps_applied.contains(&step) {
            self.steps_applied.push(step);
        }
    }

    /// Records the terminal error.
    pub fn fail(&mut self, message: impl Into<String>) {
        self.error = Some(message.into());
    }

    /// Returns `true` when `step` was recorded.
    #[must_use]
    pub fn applied(&self, step: &AppliedStep) -> bool {
        self.steps_applied.contains(step)
    }

    /// Classifies the outcome.
    #[must_use]
    pub fn status(&self) -> OutcomeStatus {
        if self.skip_reason.is_some() {
            OutcomeStatus::Skipped
        } else if self.error.is_some() {
            OutcomeStatus::Failed
        } else if self.steps_applied.is_empty() {
            OutcomeStatus::Unchanged
        } else {
            OutcomeStatus::Remediated
        }
    }
}
