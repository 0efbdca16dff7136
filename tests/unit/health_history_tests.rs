//! Unit tests for the bounded probe history ring.

use sessionherd::models::health::{HealthHistory, HealthSample};

#[test]
fn empty_history_has_no_failures() {
    let history = HealthHistory::new();
    assert!(history.is_empty());
    assert_eq!(history.consecutive_failures(), 0);
    assert!(history.last_failure_detail().is_none());
}

#[test]
fn ring_is_bounded() {
    let mut history = HealthHistory::new();
    for _ in 0..100 {
        history.push(HealthSample::ok());
    }
    assert_eq!(history.len(), 32);
}

#[test]
fn failure_streak_counts_from_the_tail() {
    let mut history = HealthHistory::new();
    history.push(HealthSample::ok());
    history.push(HealthSample::failed("one"));
    history.push(HealthSample::failed("two"));
    assert_eq!(history.consecutive_failures(), 2);
    assert_eq!(history.last_failure_detail(), Some("two"));
}

#[test]
fn success_resets_the_streak() {
    let mut history = HealthHistory::new();
    history.push(HealthSample::failed("one"));
    history.push(HealthSample::failed("two"));
    history.push(HealthSample::ok());
    assert_eq!(history.consecutive_failures(), 0);

    // Failures before the success stay out of the new streak.
    history.push(HealthSample::failed("three"));
    assert_eq!(history.consecutive_failures(), 1);
}

#[test]
fn clear_drops_every_sample() {
    let mut history = HealthHistory::new();
    history.push(HealthSample::failed("stale"));
    history.push(HealthSample::failed("stale"));
    history.clear();
    assert!(history.is_empty());
    assert_eq!(history.consecutive_failures(), 0);
    assert!(history.last_failure_detail().is_none());
}
