//! Error types shared across the application.

use std::fmt::{Display, Formatter};

/// Shared application result type.
pub type Result<T> = std::result::Result<T, AppError>;

/// Application error enumeration covering all domain failure modes.
///
/// Only `Config` and `Input` are fatal; they abort the process before any
/// session starts. `Launch` and `Probe` are per-session and are absorbed by
/// the owning session agent as state transitions — they never cross the
/// agent boundary.
#[derive(Debug)]
pub enum AppError {
    /// Configuration parsing or validation failure.
    Config(String),
    /// Credential or proxy input file failure (unparseable line, count mismatch).
    Input(String),
    /// Driver failed to launch a session.
    Launch(String),
    /// Driver failed to probe a session.
    Probe(String),
    /// Driver registry or termination failure.
    Driver(String),
    /// File-system or I/O operation failure.
    Io(String),
}

impl Display for AppError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Config(msg) => write!(f, "config: {msg}"),
            Self::Input(msg) => write!(f, "input: {msg}"),
            Self::Launch(msg) => write!(f, "launch: {msg}"),
            Self::Probe(msg) => write!(f, "probe: {msg}"),
            Self::Driver(msg) => write!(f, "driver: {msg}"),
            Self::Io(msg) => write!(f, "io: {msg}"),
        }
    }
}

impl std::error::Error for AppError {}

impl From<toml::de::Error> for AppError {
    fn from(err: toml::de::Error) -> Self {
        Self::Config(format!("invalid config: {err}"))
    }
}

impl From<std::io::Error> for AppError {
    fn from(err: std::io::Error) -> Self {
        Self::Io(err.to_string())
    }
}
