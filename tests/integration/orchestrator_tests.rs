//! Orchestrator-level tests: staggered startup, input pairing, status
//! aggregation, and natural run completion.

use std::sync::Arc;
use std::time::{Duration, Instant};

use sessionherd::models::session::{SessionState, TerminationReason};
use sessionherd::orchestrator::{Orchestrator, RunSettings};
use sessionherd::AppError;

use super::test_helpers::{as_dyn, fast_tuning, test_pairs, FakeDriver};

fn fast_settings() -> RunSettings {
    RunSettings {
        stagger_interval: Duration::ZERO,
        max_launching: 3,
        admission_wait: Duration::from_millis(100),
        tuning: fast_tuning(),
        memory_limit_mb: 128,
        debug_base_port: None,
    }
}

#[tokio::test]
async fn staggered_starts_respect_the_interval() {
    let driver = Arc::new(FakeDriver::healthy());
    let (creds, proxies) = test_pairs(3);
    let settings = RunSettings {
        stagger_interval: Duration::from_millis(200),
        ..fast_settings()
    };

    let handle = Orchestrator::start(creds, proxies, &settings, as_dyn(&driver))
        .expect("start must succeed");

    // Wait for all three first launches.
    let deadline = Instant::now() + Duration::from_secs(3);
    while driver.total_launches() < 3 {
        assert!(Instant::now() < deadline, "sessions never launched");
        tokio::time::sleep(Duration::from_millis(10)).await;
    }

    let first = driver.first_launch_offset("session-01").expect("s1 launched");
    let second = driver.first_launch_offset("session-02").expect("s2 launched");
    let third = driver.first_launch_offset("session-03").expect("s3 launched");

    // Lower bounds are hard guarantees: a stagger sleep never fires early.
    assert!(first < Duration::from_millis(150), "s1 started late: {first:?}");
    assert!(second >= Duration::from_millis(200), "s2 started early: {second:?}");
    assert!(third >= Duration::from_millis(400), "s3 started early: {third:?}");

    let _ = handle.shutdown(Duration::from_secs(1)).await;
}

#[tokio::test]
async fn count_mismatch_fails_before_spawning_anything() {
    let driver = Arc::new(FakeDriver::healthy());
    let (creds, _) = test_pairs(5);
    let (_, proxies) = test_pairs(4);

    let err = Orchestrator::start(creds, proxies, &fast_settings(), as_dyn(&driver))
        .expect_err("mismatched counts must fail");
    assert!(matches!(err, AppError::Input(_)), "got: {err}");
    assert_eq!(driver.total_launches(), 0, "no agent may have spawned");
}

#[tokio::test]
async fn snapshot_tracks_fleet_state() {
    let driver = Arc::new(FakeDriver::healthy());
    let (creds, proxies) = test_pairs(2);
    let handle = Orchestrator::start(creds, proxies, &fast_settings(), as_dyn(&driver))
        .expect("start must succeed");

    let deadline = Instant::now() + Duration::from_secs(2);
    loop {
        let snapshot = handle.status_snapshot().await;
        assert_eq!(snapshot.len(), 2);
        assert!(snapshot.contains_key("session-01"));
        assert!(snapshot.contains_key("session-02"));
        if snapshot.values().all(|s| *s == SessionState::Healthy) {
            break;
        }
        assert!(
            Instant::now() < deadline,
            "fleet never became healthy: {snapshot:?}"
        );
        tokio::time::sleep(Duration::from_millis(10)).await;
    }

    let statuses = handle.statuses();
    let summary = handle.shutdown(Duration::from_secs(1)).await;
    assert_eq!(summary.total, 2);
    assert_eq!(summary.shut_down, 2);
    assert_eq!(summary.failed, 0);
    assert!(summary.forced.is_empty());

    let map = statuses.read().await;
    assert!(map.values().all(|s| *s == SessionState::Terminated));
}

#[tokio::test]
async fn run_completes_naturally_when_every_session_fails_out() {
    let driver = Arc::new(FakeDriver::failing_launches(u32::MAX));
    let (creds, proxies) = test_pairs(1);
    let mut handle =
        Orchestrator::start(creds, proxies, &fast_settings(), as_dyn(&driver))
            .expect("start must succeed");

    let summary = tokio::time::timeout(Duration::from_secs(3), handle.wait())
        .await
        .expect("run must finish once the budget is exhausted");
    assert_eq!(summary.total, 1);
    assert_eq!(summary.failed, 1);
    assert_eq!(summary.shut_down, 0);
    assert!(summary.forced.is_empty());
    assert_eq!(summary.reports.len(), 1);
    assert_eq!(summary.reports[0].reason, TerminationReason::RetryExhausted);
}
