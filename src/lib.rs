#![forbid(unsafe_code)]

//! sessionherd — multi-session orchestrator.
//!
//! Coordinates fleets of independent, long-running session agents, each
//! driving one remote browser-based compute node through a dedicated proxy:
//! staggered startup, per-session health state machines, bounded
//! retry/backoff with cleanup, and launch-phase admission control.

pub mod config;
pub mod driver;
pub mod errors;
pub mod inputs;
pub mod models;
pub mod orchestrator;

pub use config::GlobalConfig;
pub use errors::{AppError, Result};
