//! Protocol-agnostic session driver abstraction.
//!
//! The [`SessionDriver`] trait decouples the orchestration core (session
//! agents, health monitoring, admission control) from whatever actually runs
//! a session — a child process, a remote browser API, or a test double.
//! Sessions are keyed by their id; implementations keep their own registry
//! of live handles and each agent only issues calls for its own session.

pub mod process_driver;

use std::future::Future;
use std::pin::Pin;

use crate::models::health::HealthSample;
use crate::models::session::SessionConfig;
use crate::Result;

/// Opaque receipt for a launched session.
///
/// Carries no driver internals; the session id is the key for all follow-up
/// calls.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionHandle {
    /// Session the handle belongs to.
    pub session_id: String,
}

/// Uniform interface between a session agent and its session runner.
///
/// All methods are issued by exactly one agent per session id, sequentially;
/// implementations may still be shared across agents and must be internally
/// synchronized for distinct ids.
pub trait SessionDriver: Send + Sync {
    /// Launch a new session for `config`.
    ///
    /// Any live handle already registered under the same session id must be
    /// released before the new one is acquired.
    ///
    /// # Errors
    ///
    /// Returns [`AppError::Launch`](crate::AppError::Launch) if the session
    /// cannot be started.
    fn launch(
        &self,
        config: &SessionConfig,
    ) -> Pin<Box<dyn Future<Output = Result<SessionHandle>> + Send + '_>>;

    /// Take one health reading for the session.
    ///
    /// A slow or unresponsive session should be reported as a failed
    /// [`HealthSample`], not an error; errors are reserved for registry
    /// failures such as an unknown session id.
    ///
    /// # Errors
    ///
    /// Returns [`AppError::Probe`](crate::AppError::Probe) if no live handle
    /// exists for the session id.
    fn probe(&self, session_id: &str)
        -> Pin<Box<dyn Future<Output = Result<HealthSample>> + Send + '_>>;

    /// Release the session's resources.
    ///
    /// Idempotent — terminating an unknown or already-terminated session id
    /// returns `Ok(())`.
    ///
    /// # Errors
    ///
    /// Returns [`AppError::Driver`](crate::AppError::Driver) only if releasing
    /// a live handle fails.
    fn terminate(&self, session_id: &str) -> Pin<Box<dyn Future<Output = Result<()>> + Send + '_>>;
}
