//! Periodic status reporting and the final run summary.
//!
//! A background task logs a per-state census of the fleet at a fixed
//! interval until shutdown. The reporter only reads the shared snapshot
//! map; it places no constraints on how agents run.

use std::time::Duration;

use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use crate::models::session::SessionState;
use crate::orchestrator::{RunSummary, StatusMap};

/// Spawn a background task that logs fleet status at `interval`.
///
/// Stops when `cancel` fires.
#[must_use]
pub fn spawn_status_reporter(
    statuses: StatusMap,
    interval: Duration,
    cancel: CancellationToken,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        loop {
            tokio::select! {
                () = cancel.cancelled() => {
                    info!("status reporter shutting down");
                    break;
                }
                () = tokio::time::sleep(interval) => {}
            }

            let snapshot = statuses.read().await.clone();
            let count = |wanted: SessionState| snapshot.values().filter(|s| **s == wanted).count();
            info!(
                pending = count(SessionState::Pending),
                launching = count(SessionState::Launching),
                healthy = count(SessionState::Healthy),
                degraded = count(SessionState::Degraded),
                disconnected = count(SessionState::Disconnected),
                retrying = count(SessionState::Retrying),
                terminated = count(SessionState::Terminated),
                "fleet status"
            );
        }
    })
}

/// Log the final run summary.
///
/// Forced sessions surface as a warning; they do not fail the run.
pub fn log_summary(summary: &RunSummary) {
    let json = serde_json::to_string(summary).unwrap_or_else(|_| "{}".to_owned());
    info!(
        total = summary.total,
        shut_down = summary.shut_down,
        failed = summary.failed,
        summary = %json,
        "run complete"
    );
    if !summary.forced.is_empty() {
        warn!(
            forced = summary.forced.len(),
            sessions = ?summary.forced,
            "some sessions were forced to terminate at the shutdown deadline"
        );
    }
    for report in &summary.reports {
        if let Some(ref err) = report.last_error {
            warn!(session_id = %report.session_id, error = %err, "session ended with an error");
        }
    }
}
