//! Session orchestration.
//!
//! Covers staggered fleet startup, per-session agents, health probing,
//! launch admission control, status aggregation, and graceful shutdown.

pub mod agent;
pub mod governor;
pub mod monitor;
pub mod reporter;

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use serde::Serialize;
use tokio::sync::{mpsc, RwLock};
use tokio::task::{JoinHandle, JoinSet};
use tokio_util::sync::CancellationToken;
use tracing::{info, info_span, warn, Instrument};
use uuid::Uuid;

use crate::config::GlobalConfig;
use crate::driver::SessionDriver;
use crate::inputs;
use crate::models::account::{AccountCredential, ProxyEndpoint};
use crate::models::session::{
    SessionConfig, SessionState, StateChange, TerminalReport, TerminationReason,
};
use crate::Result;

use agent::{AgentTuning, SessionAgent};
use governor::ResourceGovernor;

/// Shared session-id → state snapshot, updated by the event aggregator.
pub type StatusMap = Arc<RwLock<HashMap<String, SessionState>>>;

/// Run-wide settings derived from configuration.
#[derive(Debug, Clone)]
pub struct RunSettings {
    /// Gap between consecutive session start times.
    pub stagger_interval: Duration,
    /// Launch admission ceiling.
    pub max_launching: usize,
    /// Admission wait-slice length.
    pub admission_wait: Duration,
    /// Health/retry knobs handed to every agent.
    pub tuning: AgentTuning,
    /// Memory ceiling advertised per session, in megabytes.
    pub memory_limit_mb: u32,
    /// Base remote-debugging port; session `i` gets `base + i`.
    pub debug_base_port: Option<u16>,
}

impl Default for RunSettings {
    fn default() -> Self {
        Self {
            stagger_interval: Duration::from_secs(30),
            max_launching: 3,
            admission_wait: Duration::from_secs(60),
            tuning: AgentTuning::default(),
            memory_limit_mb: 512,
            debug_base_port: None,
        }
    }
}

impl From<&GlobalConfig> for RunSettings {
    fn from(config: &GlobalConfig) -> Self {
        Self {
            stagger_interval: Duration::from_secs(config.orchestrator.stagger_seconds),
            max_launching: usize::try_from(config.orchestrator.max_launching).unwrap_or(usize::MAX),
            admission_wait: Duration::from_secs(config.orchestrator.admission_wait_seconds),
            tuning: AgentTuning {
                probe_interval: Duration::from_secs(config.health.probe_interval_seconds),
                probe_timeout: Duration::from_secs(config.health.probe_timeout_seconds),
                failure_threshold: config.health.failure_threshold,
                retry: config.retry_policy(),
            },
            memory_limit_mb: config.driver.memory_limit_mb,
            debug_base_port: config.driver.debug_base_port,
        }
    }
}

/// Final accounting for one orchestration run.
#[derive(Debug, Clone, Serialize)]
pub struct RunSummary {
    /// Sessions the run started with.
    pub total: usize,
    /// Sessions that terminated via the shutdown signal.
    pub shut_down: usize,
    /// Sessions that exhausted their retry budget.
    pub failed: usize,
    /// Sessions force-marked Terminated at the shutdown deadline.
    pub forced: Vec<String>,
    /// Per-session terminal reports, in completion order.
    pub reports: Vec<TerminalReport>,
}

/// Top-level fleet driver.
pub struct Orchestrator;

impl Orchestrator {
    /// Pair inputs, schedule staggered starts, and spawn one agent per pair.
    ///
    /// Fails before spawning anything when the credential and proxy counts
    /// mismatch or the lists are empty. Must be called within a tokio
    /// runtime.
    ///
    /// # Errors
    ///
    /// Returns `AppError::Input` on a pairing failure.
    #[allow(clippy::needless_pass_by_value)] // Arc handles are cloned into each agent task.
    pub fn start(
        credentials: Vec<AccountCredential>,
        proxies: Vec<ProxyEndpoint>,
        settings: &RunSettings,
        driver: Arc<dyn SessionDriver>,
    ) -> Result<OrchestratorHandle> {
        inputs::check_pairing(&credentials, &proxies)?;

        let run_id = Uuid::new_v4();
        let total = credentials.len();
        let cancel = CancellationToken::new();
        let governor = Arc::new(ResourceGovernor::new(
            settings.max_launching,
            settings.admission_wait,
        ));
        let (event_tx, event_rx) = mpsc::channel::<StateChange>(64);

        let mut seed = HashMap::with_capacity(total);
        let mut session_ids = Vec::with_capacity(total);
        let mut agents = JoinSet::new();

        info!(%run_id, sessions = total, "orchestration starting");

        for (index, (credential, proxy)) in credentials.into_iter().zip(proxies).enumerate() {
            let session_id = format!("session-{:02}", index + 1);
            let stagger_delay = settings
                .stagger_interval
                .saturating_mul(u32::try_from(index).unwrap_or(u32::MAX));
            let debug_port = settings
                .debug_base_port
                .and_then(|base| u16::try_from(index).ok().and_then(|i| base.checked_add(i)));

            info!(
                session_id = %session_id,
                account = %credential,
                proxy = %proxy,
                stagger_secs = stagger_delay.as_secs(),
                "session scheduled"
            );

            seed.insert(session_id.clone(), SessionState::Pending);
            session_ids.push(session_id.clone());

            let config = SessionConfig {
                session_id: session_id.clone(),
                index,
                credential,
                proxy,
                stagger_delay,
                memory_limit_mb: settings.memory_limit_mb,
                debug_port,
            };
            let agent = SessionAgent::new(
                config,
                settings.tuning,
                Arc::clone(&driver),
                Arc::clone(&governor),
                event_tx.clone(),
                cancel.child_token(),
            );
            let span = info_span!("session_agent", session_id = %session_id);
            agents.spawn(agent.run().instrument(span));
        }
        drop(event_tx);

        let statuses: StatusMap = Arc::new(RwLock::new(seed));
        let aggregator = tokio::spawn(aggregate_events(event_rx, Arc::clone(&statuses)));

        Ok(OrchestratorHandle {
            run_id,
            total,
            session_ids,
            cancel,
            agents,
            statuses,
            aggregator,
            reports: Vec::with_capacity(total),
        })
    }
}

/// Fold agent state-change events into the shared snapshot map.
///
/// Ends once every agent has dropped its sender.
async fn aggregate_events(mut events: mpsc::Receiver<StateChange>, statuses: StatusMap) {
    while let Some(change) = events.recv().await {
        statuses
            .write()
            .await
            .insert(change.session_id.clone(), change.to);
    }
}

/// Handle over a running orchestration.
#[derive(Debug)]
pub struct OrchestratorHandle {
    run_id: Uuid,
    total: usize,
    session_ids: Vec<String>,
    cancel: CancellationToken,
    agents: JoinSet<TerminalReport>,
    statuses: StatusMap,
    aggregator: JoinHandle<()>,
    reports: Vec<TerminalReport>,
}

impl OrchestratorHandle {
    /// Identifier for this orchestration run.
    #[must_use]
    pub fn run_id(&self) -> Uuid {
        self.run_id
    }

    /// Token observed by every agent; cancelled on shutdown.
    #[must_use]
    pub fn cancel_token(&self) -> CancellationToken {
        self.cancel.clone()
    }

    /// Shared snapshot map, for the status reporter.
    #[must_use]
    pub fn statuses(&self) -> StatusMap {
        Arc::clone(&self.statuses)
    }

    /// Point-in-time copy of every session's state.
    pub async fn status_snapshot(&self) -> HashMap<String, SessionState> {
        self.statuses.read().await.clone()
    }

    /// Wait for every agent to reach a terminal state naturally.
    pub async fn wait(&mut self) -> RunSummary {
        while let Some(joined) = self.agents.join_next().await {
            match joined {
                Ok(report) => self.reports.push(report),
                Err(err) => warn!(%err, "session agent task failed"),
            }
        }
        // All senders are gone; let the aggregator drain its buffer.
        if let Err(err) = (&mut self.aggregator).await {
            warn!(%err, "event aggregator task failed");
        }
        self.summarize(Vec::new())
    }

    /// Cancel every agent and wait up to `deadline` for terminal reports.
    ///
    /// Agents that miss the deadline are aborted and force-marked Terminated;
    /// their ids come back in [`RunSummary::forced`]. A forced session is a
    /// warning, not a process failure.
    pub async fn shutdown(mut self, deadline: Duration) -> RunSummary {
        info!(deadline_secs = deadline.as_secs(), "shutdown requested");
        self.cancel.cancel();

        let agents = &mut self.agents;
        let reports = &mut self.reports;
        let drained = tokio::time::timeout(deadline, async {
            while let Some(joined) = agents.join_next().await {
                match joined {
                    Ok(report) => reports.push(report),
                    Err(err) => warn!(%err, "session agent task failed"),
                }
            }
        })
        .await;

        if drained.is_err() {
            self.agents.abort_all();
            while self.agents.join_next().await.is_some() {}
        }
        if let Err(err) = (&mut self.aggregator).await {
            warn!(%err, "event aggregator task failed");
        }

        let mut forced = Vec::new();
        if drained.is_err() {
            let reported: Vec<&str> = self.reports.iter().map(|r| r.session_id.as_str()).collect();
            let mut map = self.statuses.write().await;
            for id in &self.session_ids {
                if !reported.contains(&id.as_str()) {
                    warn!(session_id = %id, "session missed shutdown deadline; forced");
                    map.insert(id.clone(), SessionState::Terminated);
                    forced.push(id.clone());
                }
            }
        }

        self.summarize(forced)
    }

    fn summarize(&self, forced: Vec<String>) -> RunSummary {
        let shut_down = self
            .reports
            .iter()
            .filter(|r| r.reason == TerminationReason::Shutdown)
            .count();
        let failed = self
            .reports
            .iter()
            .filter(|r| r.reason == TerminationReason::RetryExhausted)
            .count();
        RunSummary {
            total: self.total,
            shut_down,
            failed,
            forced,
            reports: self.reports.clone(),
        }
    }
}
