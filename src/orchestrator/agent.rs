//! Per-session agent: the single owner of one session's lifecycle.
//!
//! Each agent runs as one task driving the state machine
//! Pending → Launching → Healthy ⇄ Degraded → Disconnected → Retrying → …
//! → Terminated. All per-session mutable state (current state, probe
//! history, retry budget) lives inside the agent; the orchestrator only
//! observes [`StateChange`] events and the final [`TerminalReport`].
//!
//! Driver errors are absorbed here and become transitions — they never
//! propagate upward, and no failure in one agent can touch another.

use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, info_span, warn, Instrument};

use crate::driver::SessionDriver;
use crate::models::health::HealthHistory;
use crate::models::retry::{RetryBudget, RetryPolicy};
use crate::models::session::{
    SessionConfig, SessionState, StateChange, TerminalReport, TerminationReason,
};
use crate::orchestrator::governor::ResourceGovernor;
use crate::orchestrator::monitor;

/// Health/retry knobs shared by every agent in a run.
#[derive(Debug, Clone, Copy)]
pub struct AgentTuning {
    /// Gap between probe completions.
    pub probe_interval: Duration,
    /// Per-probe timeout.
    pub probe_timeout: Duration,
    /// Consecutive failed probes before Degraded escalates to Disconnected.
    pub failure_threshold: u32,
    /// Backoff policy for relaunches.
    pub retry: RetryPolicy,
}

impl Default for AgentTuning {
    fn default() -> Self {
        Self {
            probe_interval: Duration::from_secs(30),
            probe_timeout: Duration::from_secs(10),
            failure_threshold: 3,
            retry: RetryPolicy::default(),
        }
    }
}

/// Outcome of one launch attempt (launch call plus first probe).
enum LaunchOutcome {
    /// Launch and first probe succeeded.
    Up,
    /// Launch or first probe failed; detail describes the failure.
    Failed(String),
    /// Shutdown fired mid-launch.
    Cancelled,
}

/// Why the steady-state probe loop ended.
enum ProbeExit {
    /// Consecutive failures reached the disconnect threshold.
    Disconnected,
    /// Shutdown fired.
    Cancelled,
}

/// One account's lifecycle owner.
pub struct SessionAgent {
    config: SessionConfig,
    tuning: AgentTuning,
    driver: Arc<dyn SessionDriver>,
    governor: Arc<ResourceGovernor>,
    events: mpsc::Sender<StateChange>,
    cancel: CancellationToken,
    state: SessionState,
    history: HealthHistory,
    budget: RetryBudget,
    last_error: Option<String>,
}

impl SessionAgent {
    /// Construct an agent in the Pending state.
    #[must_use]
    pub fn new(
        config: SessionConfig,
        tuning: AgentTuning,
        driver: Arc<dyn SessionDriver>,
        governor: Arc<ResourceGovernor>,
        events: mpsc::Sender<StateChange>,
        cancel: CancellationToken,
    ) -> Self {
        Self {
            config,
            tuning,
            driver,
            governor,
            events,
            cancel,
            state: SessionState::Pending,
            history: HealthHistory::new(),
            budget: RetryBudget::new(),
            last_error: None,
        }
    }

    /// Spawn the agent's run loop as its own task.
    #[must_use]
    pub fn spawn(self) -> JoinHandle<TerminalReport> {
        let span = info_span!("session_agent", session_id = %self.config.session_id);
        tokio::spawn(self.run().instrument(span))
    }

    /// Drive the session to a terminal state.
    ///
    /// Every suspension point — stagger wait, admission wait, probe
    /// interval, retry delay — observes the shutdown token, so cancellation
    /// is seen within one wakeup.
    pub async fn run(mut self) -> TerminalReport {
        if !self.wait_cancellable(self.config.stagger_delay).await {
            return self.finish(TerminationReason::Shutdown).await;
        }

        loop {
            // Admission gates every launch, the first one included; the
            // token is held only for the launching phase.
            let Some(token) = self.governor.admit(&self.cancel).await else {
                return self.finish(TerminationReason::Shutdown).await;
            };
            self.transition(SessionState::Launching, None).await;
            // Fresh launch, fresh probe history: stale failures from a prior
            // attempt must not count toward the disconnect threshold.
            self.history.clear();

            match self.launch_once().await {
                LaunchOutcome::Up => {
                    drop(token);
                    self.budget.reset();
                    self.transition(SessionState::Healthy, None).await;
                    match self.probe_loop().await {
                        ProbeExit::Cancelled => {
                            return self.finish(TerminationReason::Shutdown).await;
                        }
                        ProbeExit::Disconnected => {}
                    }
                }
                LaunchOutcome::Cancelled => {
                    drop(token);
                    return self.finish(TerminationReason::Shutdown).await;
                }
                LaunchOutcome::Failed(detail) => {
                    drop(token);
                    self.last_error = Some(detail);
                }
            }

            // Launch failed or the session disconnected: consume budget.
            self.transition(SessionState::Retrying, self.last_error.clone())
                .await;
            // Release the dead handle now rather than across the backoff wait.
            if let Err(err) = self.driver.terminate(&self.config.session_id).await {
                warn!(%err, "cleanup before retry failed");
            }
            let attempt = self.budget.record_failure();
            if !self.budget.can_retry(&self.tuning.retry) {
                warn!(attempts = attempt, "retry budget exhausted");
                return self.finish(TerminationReason::RetryExhausted).await;
            }

            let delay = self.tuning.retry.next_delay(attempt.saturating_sub(1));
            info!(
                attempt,
                delay_ms = u64::try_from(delay.as_millis()).unwrap_or(u64::MAX),
                "waiting before relaunch"
            );
            if !self.wait_cancellable(delay).await {
                return self.finish(TerminationReason::Shutdown).await;
            }
        }
    }

    /// One launch attempt: prior-resource release, driver launch, first probe.
    async fn launch_once(&mut self) -> LaunchOutcome {
        // Scoped acquisition: whatever the previous attempt left behind is
        // released before anything new is acquired.
        if let Err(err) = self.driver.terminate(&self.config.session_id).await {
            warn!(%err, "pre-launch cleanup failed");
        }

        let launched = tokio::select! {
            () = self.cancel.cancelled() => return LaunchOutcome::Cancelled,
            result = self.driver.launch(&self.config) => result,
        };

        match launched {
            Ok(handle) => {
                debug!(session_id = %handle.session_id, "launched; taking first probe");
                let sample = monitor::probe_session(
                    self.driver.as_ref(),
                    &self.config.session_id,
                    self.tuning.probe_timeout,
                )
                .await;
                let healthy = sample.is_ok();
                let detail = sample.detail.clone();
                self.history.push(sample);

                if healthy {
                    LaunchOutcome::Up
                } else {
                    // Half-launched session: release it before retrying.
                    if let Err(err) = self.driver.terminate(&self.config.session_id).await {
                        warn!(%err, "cleanup after failed first probe failed");
                    }
                    LaunchOutcome::Failed(
                        detail.unwrap_or_else(|| "first probe failed".to_owned()),
                    )
                }
            }
            Err(err) => LaunchOutcome::Failed(err.to_string()),
        }
    }

    /// Steady-state probe loop for a launched session.
    ///
    /// The interval is measured from the previous probe's completion, so a
    /// slow probe never overlaps the next one.
    async fn probe_loop(&mut self) -> ProbeExit {
        loop {
            if !self.wait_cancellable(self.tuning.probe_interval).await {
                return ProbeExit::Cancelled;
            }

            let sample = monitor::probe_session(
                self.driver.as_ref(),
                &self.config.session_id,
                self.tuning.probe_timeout,
            )
            .await;
            let healthy = sample.is_ok();
            if !healthy {
                self.last_error = sample.detail.clone();
            }
            self.history.push(sample);

            match (self.state, healthy) {
                // Repeated success is not a transition.
                (SessionState::Healthy, true) => {}
                (SessionState::Healthy, false) => {
                    self.transition(SessionState::Degraded, self.last_error.clone())
                        .await;
                }
                // One good probe recovers without counting as a failure.
                (SessionState::Degraded, true) => {
                    self.budget.reset();
                    self.transition(SessionState::Healthy, None).await;
                }
                (SessionState::Degraded, false) => {
                    let streak = self.history.consecutive_failures();
                    if streak >= self.tuning.failure_threshold {
                        warn!(streak, "disconnect threshold reached");
                        self.transition(SessionState::Disconnected, self.last_error.clone())
                            .await;
                        return ProbeExit::Disconnected;
                    }
                }
                (state, _) => {
                    debug!(?state, "probe loop in unexpected state");
                }
            }
        }
    }

    /// Release driver resources, report the terminal transition, and build
    /// the final report.
    async fn finish(mut self, reason: TerminationReason) -> TerminalReport {
        if let Err(err) = self.driver.terminate(&self.config.session_id).await {
            warn!(%err, "terminal cleanup failed");
        }

        let detail = match reason {
            TerminationReason::Shutdown => Some("shutdown".to_owned()),
            TerminationReason::RetryExhausted => Some(format!(
                "retry budget exhausted after {} attempt(s)",
                self.budget.attempts()
            )),
        };
        self.transition(SessionState::Terminated, detail).await;

        TerminalReport {
            session_id: self.config.session_id.clone(),
            reason,
            last_error: self.last_error,
        }
    }

    /// Record and publish a state transition.
    async fn transition(&mut self, next: SessionState, detail: Option<String>) {
        if !self.state.can_transition_to(next) {
            warn!(from = ?self.state, to = ?next, "illegal state transition");
        }
        let change = StateChange {
            session_id: self.config.session_id.clone(),
            from: self.state,
            to: next,
            timestamp: Utc::now(),
            detail,
        };
        info!(
            from = ?change.from,
            to = ?change.to,
            detail = change.detail.as_deref().unwrap_or_default(),
            "state transition"
        );
        self.state = next;
        if self.events.send(change).await.is_err() {
            debug!("status channel closed");
        }
    }

    /// Sleep unless the shutdown token fires first.
    ///
    /// Returns `false` when cancelled.
    async fn wait_cancellable(&self, delay: Duration) -> bool {
        if delay.is_zero() {
            return !self.cancel.is_cancelled();
        }
        tokio::select! {
            () = self.cancel.cancelled() => false,
            () = tokio::time::sleep(delay) => true,
        }
    }
}
