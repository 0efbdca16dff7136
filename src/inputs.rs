//! Credential and proxy input file loading.
//!
//! Both files are line-oriented: one entry per line, blank lines skipped,
//! paired 1:1 by position. Any unparseable line, or a count mismatch between
//! the two files, is a fatal startup error — there is no partial run.

use std::fs;
use std::path::Path;

use tracing::info;

use crate::models::account::{AccountCredential, ProxyEndpoint};
use crate::{AppError, Result};

/// Load all account credentials from a file.
///
/// # Errors
///
/// Returns `AppError::Io` if the file cannot be read, or `AppError::Input`
/// if any non-blank line fails to parse.
pub fn load_credentials(path: impl AsRef<Path>) -> Result<Vec<AccountCredential>> {
    let path = path.as_ref();
    let raw = fs::read_to_string(path)
        .map_err(|err| AppError::Io(format!("cannot read {}: {err}", path.display())))?;

    let mut credentials = Vec::new();
    for (number, line) in raw.lines().enumerate() {
        let line = line.trim();
        if line.is_empty() {
            continue;
        }
        let credential = AccountCredential::parse(line).map_err(|err| {
            AppError::Input(format!("{} line {}: {err}", path.display(), number + 1))
        })?;
        credentials.push(credential);
    }

    info!(count = credentials.len(), path = %path.display(), "credentials loaded");
    Ok(credentials)
}

/// Load all proxy endpoints from a file.
///
/// # Errors
///
/// Returns `AppError::Io` if the file cannot be read, or `AppError::Input`
/// if any non-blank line fails to parse.
pub fn load_proxies(path: impl AsRef<Path>) -> Result<Vec<ProxyEndpoint>> {
    let path = path.as_ref();
    let raw = fs::read_to_string(path)
        .map_err(|err| AppError::Io(format!("cannot read {}: {err}", path.display())))?;

    let mut proxies = Vec::new();
    for (number, line) in raw.lines().enumerate() {
        let line = line.trim();
        if line.is_empty() {
            continue;
        }
        let proxy = ProxyEndpoint::parse(line).map_err(|err| {
            AppError::Input(format!("{} line {}: {err}", path.display(), number + 1))
        })?;
        proxies.push(proxy);
    }

    info!(count = proxies.len(), path = %path.display(), "proxies loaded");
    Ok(proxies)
}

/// Verify the 1:1 pairing between credentials and proxies.
///
/// # Errors
///
/// Returns `AppError::Input` if either list is empty or the counts differ.
pub fn check_pairing(credentials: &[AccountCredential], proxies: &[ProxyEndpoint]) -> Result<()> {
    if credentials.is_empty() {
        return Err(AppError::Input("no credentials loaded".into()));
    }
    if credentials.len() != proxies.len() {
        return Err(AppError::Input(format!(
            "{} credential(s) but {} prox(ies); each account requires its own proxy",
            credentials.len(),
            proxies.len()
        )));
    }
    Ok(())
}
