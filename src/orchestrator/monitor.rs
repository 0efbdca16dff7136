//! Health probing shared by every session agent.
//!
//! One probe is one bounded-timeout driver call producing one
//! [`HealthSample`]. A timeout is a failed sample, not an error raised to
//! the caller; there is no shared mutable state across sessions.

use std::time::Duration;

use crate::driver::SessionDriver;
use crate::models::health::HealthSample;

/// Take one detail-annotated health reading for a session.
///
/// Wraps the driver probe in `timeout`; a driver error or an overrun both
/// come back as failed samples so the agent's state machine stays the single
/// place where failures are interpreted.
pub async fn probe_session(
    driver: &dyn SessionDriver,
    session_id: &str,
    timeout: Duration,
) -> HealthSample {
    match tokio::time::timeout(timeout, driver.probe(session_id)).await {
        Ok(Ok(sample)) => sample,
        Ok(Err(err)) => HealthSample::failed(err.to_string()),
        Err(_) => HealthSample::failed(format!(
            "probe timed out after {}ms",
            timeout.as_millis()
        )),
    }
}
