//! Launch-phase admission control.
//!
//! A counted semaphore caps how many sessions may sit in the expensive
//! launching phase at once. Steady-state Healthy sessions hold no token, so
//! the ceiling bounds resource spikes rather than fleet size. Admission is
//! backpressure: a refused agent waits in bounded slices instead of failing.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::{OwnedSemaphorePermit, Semaphore};
use tokio_util::sync::CancellationToken;
use tracing::warn;

/// Proof of admission to the launching phase.
///
/// The underlying permit returns to the governor when the token is dropped.
#[derive(Debug)]
pub struct AdmissionToken {
    _permit: OwnedSemaphorePermit,
}

/// Counted-semaphore gate over concurrent session launches.
pub struct ResourceGovernor {
    permits: Arc<Semaphore>,
    ceiling: usize,
    admission_wait: Duration,
}

impl ResourceGovernor {
    /// Create a governor with `ceiling` concurrent launch slots.
    #[must_use]
    pub fn new(ceiling: usize, admission_wait: Duration) -> Self {
        Self {
            permits: Arc::new(Semaphore::new(ceiling)),
            ceiling,
            admission_wait,
        }
    }

    /// Configured launch-slot ceiling.
    #[must_use]
    pub fn ceiling(&self) -> usize {
        self.ceiling
    }

    /// Launch slots currently free.
    #[must_use]
    pub fn available(&self) -> usize {
        self.permits.available_permits()
    }

    /// Attempt admission without waiting.
    #[must_use]
    pub fn try_admit(&self) -> Option<AdmissionToken> {
        Arc::clone(&self.permits)
            .try_acquire_owned()
            .ok()
            .map(|permit| AdmissionToken { _permit: permit })
    }

    /// Wait for admission, observing cancellation at every wait-slice
    /// boundary.
    ///
    /// Each time a slice of `admission_wait` expires without a free slot a
    /// warning is logged and the wait re-enters; refusal is backpressure,
    /// never a failure. Returns `None` only when `cancel` fires first.
    pub async fn admit(&self, cancel: &CancellationToken) -> Option<AdmissionToken> {
        loop {
            tokio::select! {
                () = cancel.cancelled() => return None,
                acquired = tokio::time::timeout(
                    self.admission_wait,
                    Arc::clone(&self.permits).acquire_owned(),
                ) => {
                    match acquired {
                        Ok(Ok(permit)) => return Some(AdmissionToken { _permit: permit }),
                        Ok(Err(_)) => {
                            // The semaphore is never closed in practice.
                            warn!("admission semaphore closed");
                            return None;
                        }
                        Err(_) => {
                            warn!(
                                wait_secs = self.admission_wait.as_secs(),
                                "launch admission still refused; waiting again"
                            );
                        }
                    }
                }
            }
        }
    }
}
