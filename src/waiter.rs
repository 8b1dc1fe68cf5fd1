//! Availability gating around mutating calls.

use tracing::{debug, info};

use crate::instance::{InstanceId, LifecycleState};
use crate::service::{DatabaseService, ServiceError};

/// Ensures an instance is running and mutable before and after a change.
///
/// Under dry-run the waiter still reads the instance but never starts it and
/// never blocks on a poll.
#[derive(Debug)]
pub struct AvailabilityWaiter<'a, S: ?Sized> {
    service: &'a S,
    dry_run: bool,
}

impl<'a, S: DatabaseService + ?Sized> AvailabilityWaiter<'a, S> {
    /// Creates a waiter borrowing the shared service handle.
    #[must_use]
    pub const fn new(service: &'a S, dry_run: bool) -> Self {
        Self { service, dry_run }
    }

    /// Re-reads the instance, starts it when requested and stopped, then
    /// waits for `AVAILABLE`.
    ///
    /// # Errors
    ///
    /// Returns [`ServiceError`] when the read, the start command, or the poll
    /// fails (including poll exhaustion).
    pub async fn ensure_available(
        &self,
        id: &InstanceId,
        start_if_stopped: bool,
    ) -> Result<(), ServiceError> {
        let record = self.service.fetch_instance(id).await?;

        if start_if_stopped && record.lifecycle_state == LifecycleState::Stopped {
            info!(
                instance = %id,
                name = %record.display_name,
                "{}Starting autonomous database",
                dry_run_prefix(self.dry_run)
            );
            if !self.dry_run {
                self.service.start_instance(id).await?;
            }
        }

        if self.dry_run {
            debug!(instance = %id, "not waiting for AVAILABLE under dry run");
            return Ok(());
        }

        self.service
            .wait_for_state(id, &LifecycleState::Available)
            .await?;
        debug!(instance = %id, name = %record.display_name, "autonomous database AVAILABLE");
        Ok(())
    }
}

/// Prefix applied to intent log lines under dry-run.
#[must_use]
pub(crate) const fn dry_run_prefix(dry_run: bool) -> &'static str {
    if dry_run { "DRYRUN: " } else { "" }
}
