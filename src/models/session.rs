//! Session model, state machine, and lifecycle events.

use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::account::{AccountCredential, ProxyEndpoint};

/// Lifecycle state for a session agent.
///
/// Transitions happen only inside the owning agent's control loop; there is
/// no concurrent writer. `Terminated` is terminal.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum SessionState {
    /// Agent created, stagger delay not yet elapsed.
    Pending,
    /// Driver launch plus first probe in progress.
    Launching,
    /// Last probe succeeded.
    Healthy,
    /// One or more probes failed, below the disconnect threshold.
    Degraded,
    /// Consecutive probe failures reached the disconnect threshold.
    Disconnected,
    /// Cleaning up and waiting out the backoff delay before a relaunch.
    Retrying,
    /// Final state: clean shutdown, retry exhaustion, or forced.
    Terminated,
}

impl SessionState {
    /// Determine whether a lifecycle transition is permitted.
    ///
    /// Any state may transition to `Terminated` (external shutdown);
    /// `Terminated` itself has no outgoing edges.
    #[must_use]
    pub fn can_transition_to(self, next: Self) -> bool {
        if self == Self::Terminated {
            return false;
        }
        if next == Self::Terminated {
            return true;
        }
        matches!(
            (self, next),
            (Self::Pending | Self::Retrying, Self::Launching)
                | (Self::Launching, Self::Healthy | Self::Retrying)
                | (Self::Healthy, Self::Degraded)
                | (Self::Degraded, Self::Healthy | Self::Disconnected)
                | (Self::Disconnected, Self::Retrying)
        )
    }

    /// Whether this state is terminal.
    #[must_use]
    pub fn is_terminal(self) -> bool {
        self == Self::Terminated
    }
}

/// Immutable per-session configuration, built once by the orchestrator and
/// owned exclusively by the session agent it is handed to.
#[derive(Debug, Clone)]
pub struct SessionConfig {
    /// Stable session identifier, unique within one orchestration run.
    pub session_id: String,
    /// Zero-based position in the input pairing.
    pub index: usize,
    /// Account driven by this session.
    pub credential: AccountCredential,
    /// Dedicated proxy for this session.
    pub proxy: ProxyEndpoint,
    /// Delay from orchestration start before the first launch.
    pub stagger_delay: Duration,
    /// Memory ceiling advertised to the driver, in megabytes.
    pub memory_limit_mb: u32,
    /// Remote debugging port reserved for this session, when configured.
    pub debug_port: Option<u16>,
}

/// A state-machine transition event reported upward to the orchestrator.
#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct StateChange {
    /// Session the transition belongs to.
    pub session_id: String,
    /// State before the transition.
    pub from: SessionState,
    /// State after the transition.
    pub to: SessionState,
    /// When the transition occurred.
    pub timestamp: DateTime<Utc>,
    /// Error or annotation attached to the transition, if any.
    pub detail: Option<String>,
}

/// Why a session reached its terminal state.
#[derive(Debug, Clone, Copy, Serialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum TerminationReason {
    /// Orchestrator shutdown signal; the session was otherwise viable.
    Shutdown,
    /// Retry budget exhausted; the session is reported as failed.
    RetryExhausted,
}

/// Final report returned by a session agent's run loop.
#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct TerminalReport {
    /// Session the report belongs to.
    pub session_id: String,
    /// Why the session terminated.
    pub reason: TerminationReason,
    /// Last error observed before termination, if any.
    pub last_error: Option<String>,
}
