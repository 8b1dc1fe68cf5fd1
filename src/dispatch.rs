//! Bounded-concurrency fan-out of the remediation worker.

use std::num::NonZeroUsize;
use std::sync::Arc;

use tokio::sync::Semaphore;
use tokio::task::JoinSet;
use tracing::{debug, error};

use crate::instance::InstanceId;
use crate::outcome::RemediationOutcome;
use crate::remediate::Remediator;
use crate::service::DatabaseService;

/// Default number of concurrently running workers.
pub const DEFAULT_POOL_SIZE: NonZeroUsize = match NonZeroUsize::new(5) {
    Some(size) => size,
    None => NonZeroUsize::MIN,
};

/// Runs one worker per identifier with at most `pool_size` running at once.
///
/// Every identifier owns a result slot fixed at submission, so outcomes come
/// back in input order whatever order the workers finish in.
#[derive(Debug)]
pub struct Dispatcher<S> {
    remediator: Arc<Remediator<S>>,
    pool_size: NonZeroUsize,
}

impl<S> Dispatcher<S>
where
    S: DatabaseService + 'static,
{
    /// Creates a dispatcher around a shared remediator.
    #[must_use]
    pub const fn new(remediator: Arc<Remediator<S>>, pool_size: NonZeroUsize) -> Self {
        Self {
            remediator,
            pool_size,
        }
    }

    /// Concurrency bound.
    #[must_use]
    pub const fn pool_size(&self) -> NonZeroUsize {
        self.pool_size
    }

    /// Remediates every identifier and returns outcomes in submission order.
    ///
    /// Waits for all workers; a failing instance never stops its siblings.
    pub async fn dispatch(&self, ids: &[InstanceId]) -> Vec<RemediationOutcome> {
        let permits = Arc::new(Semaphore::new(self.pool_size.get()));
        let mut workers = JoinSet::new();

        for (slot, id) in ids.iter().cloned().enumerate() {
            let remediator = Arc::clone(&self.remediator);
            let gate = Arc::clone(&permits);
            workers.spawn(async move {
                // The semaphore is never closed, so acquisition only waits.
                let _permit = gate.acquire_owned().await.ok();
                debug!(instance = %id, slot, "worker started");
                let outcome = remediator.remediate(&id).await;
                (slot, outcome)
            });
        }

        let mut slots: Vec<Option<RemediationOutcome>> = ids.iter().map(|_| None).collect();
        while let Some(joined) = workers.join_next().await {
            match joined {
                Ok((slot, outcome)) => {
                    if let Some(entry) = slots.get_mut(slot) {
                        *entry = Some(outcome);
                    }
                }
                Err(err) => error!(error = %err, "remediation worker aborted"),
            }
        }

        ids.iter()
            .zip(slots)
            .map(|(id, slot)| {
                slot.unwrap_or_else(|| {
                    RemediationOutcome::failed(id.clone(), "remediation worker aborted")
                })
            })
            .collect()
    }
}
