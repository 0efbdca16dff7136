//! Session agent lifecycle tests against the scriptable fake driver.
//!
//! Covers steady-state idempotence, Degraded recovery, the
//! consecutive-failure disconnect threshold, and retry-budget exhaustion.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

use sessionherd::models::retry::RetryPolicy;
use sessionherd::models::session::{SessionState, StateChange, TerminationReason};
use sessionherd::orchestrator::agent::{AgentTuning, SessionAgent};
use sessionherd::orchestrator::governor::ResourceGovernor;

use super::test_helpers::{as_dyn, fast_tuning, test_session, FakeDriver};

/// Collect every event arriving within `window`.
async fn drain_events(rx: &mut mpsc::Receiver<StateChange>, window: Duration) -> Vec<StateChange> {
    let deadline = tokio::time::Instant::now() + window;
    let mut events = Vec::new();
    loop {
        match tokio::time::timeout_at(deadline, rx.recv()).await {
            Ok(Some(change)) => events.push(change),
            Ok(None) | Err(_) => break,
        }
    }
    events
}

fn spawn_agent(
    driver: &Arc<FakeDriver>,
    tuning: AgentTuning,
) -> (
    tokio::task::JoinHandle<sessionherd::models::session::TerminalReport>,
    mpsc::Receiver<StateChange>,
    CancellationToken,
) {
    let governor = Arc::new(ResourceGovernor::new(1, Duration::from_millis(50)));
    let (tx, rx) = mpsc::channel(64);
    let cancel = CancellationToken::new();
    let agent = SessionAgent::new(
        test_session("s-1", Duration::ZERO),
        tuning,
        as_dyn(driver),
        governor,
        tx,
        cancel.clone(),
    );
    (agent.spawn(), rx, cancel)
}

#[tokio::test]
async fn healthy_session_never_leaves_healthy() {
    let driver = Arc::new(FakeDriver::healthy());
    let (handle, mut rx, cancel) = spawn_agent(&driver, fast_tuning());

    // ~15 probe intervals pass inside this window; repeated successes must
    // produce no transitions beyond the initial two.
    let events = drain_events(&mut rx, Duration::from_millis(300)).await;
    assert_eq!(events.len(), 2, "unexpected transitions: {events:?}");
    assert_eq!(events[0].from, SessionState::Pending);
    assert_eq!(events[0].to, SessionState::Launching);
    assert_eq!(events[1].to, SessionState::Healthy);
    assert_eq!(driver.launch_count("s-1"), 1);

    cancel.cancel();
    let report = tokio::time::timeout(Duration::from_secs(1), handle)
        .await
        .expect("agent must terminate promptly")
        .expect("agent task must not panic");
    assert_eq!(report.reason, TerminationReason::Shutdown);
    // Terminal cleanup must release the driver resource.
    assert!(driver.total_terminates() >= 1);
}

#[tokio::test]
async fn degraded_session_recovers_on_next_success() {
    let driver = Arc::new(FakeDriver::healthy());
    // First entry gates the launch; then one failure, then recovery.
    driver.script_probes("s-1", &[true, false, true]);
    let (handle, mut rx, cancel) = spawn_agent(&driver, fast_tuning());

    let events = drain_events(&mut rx, Duration::from_millis(300)).await;
    let states: Vec<SessionState> = events.iter().map(|e| e.to).collect();
    assert_eq!(
        states,
        vec![
            SessionState::Launching,
            SessionState::Healthy,
            SessionState::Degraded,
            SessionState::Healthy,
        ],
        "events: {events:?}"
    );
    // A single failed probe must not count as a full failure.
    assert_eq!(driver.launch_count("s-1"), 1);

    cancel.cancel();
    let _ = tokio::time::timeout(Duration::from_secs(1), handle).await;
}

#[tokio::test]
async fn threshold_failures_yield_exactly_one_disconnect() {
    let driver = Arc::new(FakeDriver::healthy());
    // Gate probe, then three consecutive failures (threshold = 3).
    driver.script_probes("s-1", &[true, false, false, false]);
    let (handle, mut rx, cancel) = spawn_agent(&driver, fast_tuning());

    let events = drain_events(&mut rx, Duration::from_millis(400)).await;
    let disconnects = events
        .iter()
        .filter(|e| e.to == SessionState::Disconnected)
        .count();
    let degradations = events
        .iter()
        .filter(|e| e.to == SessionState::Degraded)
        .count();
    assert_eq!(disconnects, 1, "events: {events:?}");
    assert_eq!(degradations, 1, "events: {events:?}");

    // The disconnect must route through Retrying into a relaunch.
    assert!(
        events
            .iter()
            .any(|e| e.from == SessionState::Disconnected && e.to == SessionState::Retrying),
        "events: {events:?}"
    );
    assert!(driver.launch_count("s-1") >= 2, "a relaunch must happen");

    cancel.cancel();
    let _ = tokio::time::timeout(Duration::from_secs(1), handle).await;
}

#[tokio::test]
async fn budget_exhaustion_terminates_with_no_further_launches() {
    let driver = Arc::new(FakeDriver::failing_launches(u32::MAX));
    let tuning = AgentTuning {
        retry: RetryPolicy {
            max_attempts: 3,
            base_delay: Duration::from_millis(10),
            max_delay: Duration::from_millis(20),
        },
        ..fast_tuning()
    };
    let (handle, mut rx, _cancel) = spawn_agent(&driver, tuning);

    let report = tokio::time::timeout(Duration::from_secs(2), handle)
        .await
        .expect("agent must give up within the window")
        .expect("agent task must not panic");
    assert_eq!(report.reason, TerminationReason::RetryExhausted);
    assert!(report.last_error.is_some());

    // Exactly max_attempts launches, and none after the terminal state.
    assert_eq!(driver.launch_count("s-1"), 3);
    tokio::time::sleep(Duration::from_millis(100)).await;
    assert_eq!(driver.launch_count("s-1"), 3);

    let events = drain_events(&mut rx, Duration::from_millis(50)).await;
    let last = events.last().expect("events must have been emitted");
    assert_eq!(last.to, SessionState::Terminated);
    assert!(
        last.detail
            .as_deref()
            .is_some_and(|d| d.contains("exhausted")),
        "terminal detail must mention exhaustion: {last:?}"
    );
}
