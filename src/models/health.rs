//! Health probe samples and the per-session probe history ring.

use std::collections::VecDeque;

use chrono::{DateTime, Utc};
use serde::Serialize;

/// Maximum samples retained per session.
const HISTORY_CAPACITY: usize = 32;

/// Outcome of a single health probe.
#[derive(Debug, Clone, Copy, Serialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum ProbeStatus {
    /// The session responded within the probe timeout.
    Ok,
    /// The session did not respond, responded with an error, or timed out.
    Failed,
}

/// A single detail-annotated health reading.
#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct HealthSample {
    /// When the probe completed.
    pub observed_at: DateTime<Utc>,
    /// Observed status.
    pub status: ProbeStatus,
    /// Error detail for failed probes.
    pub detail: Option<String>,
}

impl HealthSample {
    /// Construct a successful sample observed now.
    #[must_use]
    pub fn ok() -> Self {
        Self {
            observed_at: Utc::now(),
            status: ProbeStatus::Ok,
            detail: None,
        }
    }

    /// Construct a failed sample observed now, with an error detail.
    #[must_use]
    pub fn failed(detail: impl Into<String>) -> Self {
        Self {
            observed_at: Utc::now(),
            status: ProbeStatus::Failed,
            detail: Some(detail.into()),
        }
    }

    /// Whether the sample observed a healthy session.
    #[must_use]
    pub fn is_ok(&self) -> bool {
        self.status == ProbeStatus::Ok
    }
}

/// Bounded ring of recent probe samples for one session.
///
/// Owned by the session agent; cleared on every new launch so stale failures
/// never bleed into a fresh attempt.
#[derive(Debug, Default)]
pub struct HealthHistory {
    samples: VecDeque<HealthSample>,
}

impl HealthHistory {
    /// Create an empty history.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a sample, evicting the oldest once at capacity.
    pub fn push(&mut self, sample: HealthSample) {
        if self.samples.len() == HISTORY_CAPACITY {
            self.samples.pop_front();
        }
        self.samples.push_back(sample);
    }

    /// Number of consecutive failed probes at the tail of the history.
    ///
    /// A single success resets the streak, so a Degraded session that
    /// recovers does not carry its earlier failures forward.
    #[must_use]
    pub fn consecutive_failures(&self) -> u32 {
        let mut streak = 0;
        for sample in self.samples.iter().rev() {
            if sample.is_ok() {
                break;
            }
            streak += 1;
        }
        streak
    }

    /// Detail of the most recent failed sample, if any.
    #[must_use]
    pub fn last_failure_detail(&self) -> Option<&str> {
        self.samples
            .iter()
            .rev()
            .find(|s| !s.is_ok())
            .and_then(|s| s.detail.as_deref())
    }

    /// Drop all samples. Called on every transition into Launching.
    pub fn clear(&mut self) {
        self.samples.clear();
    }

    /// Number of retained samples.
    #[must_use]
    pub fn len(&self) -> usize {
        self.samples.len()
    }

    /// Whether the history holds no samples.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }
}
