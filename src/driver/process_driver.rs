//! Child-process session driver.
//!
//! Runs one session-runner process per session with `kill_on_drop(true)`.
//! The account, proxy, and resource ceiling are handed to the runner through
//! `SESSIONHERD_*` environment variables; a probe checks that the process is
//! still alive. Each session gets its own remote-debugging port when a base
//! port is configured.

use std::collections::HashMap;
use std::process::Stdio;
use std::time::Duration;

use tokio::process::{Child, Command};
use tokio::sync::Mutex;
use tracing::{debug, info, warn};

use crate::config::DriverConfig;
use crate::driver::{SessionDriver, SessionHandle};
use crate::models::health::HealthSample;
use crate::models::session::SessionConfig;
use crate::{AppError, Result};

/// Grace period for a killed runner process to be reaped.
const REAP_GRACE: Duration = Duration::from_secs(5);

/// [`SessionDriver`] backed by one child process per session.
pub struct ProcessDriver {
    config: DriverConfig,
    children: Mutex<HashMap<String, Child>>,
}

impl ProcessDriver {
    /// Create a driver from the `[driver]` configuration section.
    #[must_use]
    pub fn new(config: DriverConfig) -> Self {
        Self {
            config,
            children: Mutex::new(HashMap::new()),
        }
    }

    /// Number of live runner processes.
    pub async fn live_count(&self) -> usize {
        self.children.lock().await.len()
    }

    async fn spawn_runner(&self, session: &SessionConfig) -> Result<Child> {
        let mut cmd = Command::new(&self.config.command);
        cmd.args(&self.config.args)
            .env("SESSIONHERD_SESSION_ID", &session.session_id)
            .env("SESSIONHERD_ACCOUNT", &session.credential.identifier)
            .env("SESSIONHERD_ACCOUNT_SECRET", &session.credential.secret)
            .env("SESSIONHERD_PROXY_URL", session.proxy.connect_url())
            .env(
                "SESSIONHERD_MEMORY_LIMIT_MB",
                session.memory_limit_mb.to_string(),
            )
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .kill_on_drop(true);

        if let Some(port) = session.debug_port {
            cmd.env("SESSIONHERD_DEBUG_PORT", port.to_string());
        }

        cmd.spawn().map_err(|err| {
            AppError::Launch(format!(
                "failed to spawn '{}' for {}: {err}",
                self.config.command, session.session_id
            ))
        })
    }

    /// Kill a runner and wait for it to be reaped.
    async fn reap(session_id: &str, mut child: Child) {
        if let Err(err) = child.start_kill() {
            // Already exited: reap below still collects the status.
            debug!(session_id, %err, "runner kill signal not delivered");
        }
        match tokio::time::timeout(REAP_GRACE, child.wait()).await {
            Ok(Ok(status)) => {
                info!(session_id, ?status, "runner process reaped");
            }
            Ok(Err(err)) => {
                warn!(session_id, %err, "error waiting for runner process");
            }
            Err(_) => {
                warn!(session_id, "runner did not exit within grace period");
            }
        }
    }
}

impl SessionDriver for ProcessDriver {
    fn launch(
        &self,
        config: &SessionConfig,
    ) -> std::pin::Pin<Box<dyn std::future::Future<Output = Result<SessionHandle>> + Send + '_>>
    {
        let session = config.clone();
        Box::pin(async move {
            // Scoped acquisition: release any prior handle before the new
            // launch, even if the agent skipped its own cleanup.
            let previous = self.children.lock().await.remove(&session.session_id);
            if let Some(child) = previous {
                warn!(session_id = %session.session_id, "stale runner found before launch");
                Self::reap(&session.session_id, child).await;
            }

            let child = self.spawn_runner(&session).await?;
            info!(
                session_id = %session.session_id,
                pid = child.id().unwrap_or(0),
                command = %self.config.command,
                "runner process spawned"
            );

            self.children
                .lock()
                .await
                .insert(session.session_id.clone(), child);

            Ok(SessionHandle {
                session_id: session.session_id,
            })
        })
    }

    fn probe(
        &self,
        session_id: &str,
    ) -> std::pin::Pin<Box<dyn std::future::Future<Output = Result<HealthSample>> + Send + '_>>
    {
        let session_id = session_id.to_owned();
        Box::pin(async move {
            let mut children = self.children.lock().await;
            let Some(child) = children.get_mut(&session_id) else {
                return Err(AppError::Probe(format!(
                    "no live runner for {session_id}"
                )));
            };

            match child.try_wait() {
                Ok(None) => Ok(HealthSample::ok()),
                Ok(Some(status)) => {
                    // The runner died on its own; drop the dead entry so a
                    // relaunch starts clean.
                    children.remove(&session_id);
                    Ok(HealthSample::failed(format!("runner exited: {status}")))
                }
                Err(err) => {
                    children.remove(&session_id);
                    Ok(HealthSample::failed(format!("runner poll failed: {err}")))
                }
            }
        })
    }

    fn terminate(
        &self,
        session_id: &str,
    ) -> std::pin::Pin<Box<dyn std::future::Future<Output = Result<()>> + Send + '_>> {
        let session_id = session_id.to_owned();
        Box::pin(async move {
            let child = self.children.lock().await.remove(&session_id);
            match child {
                Some(child) => {
                    Self::reap(&session_id, child).await;
                    Ok(())
                }
                None => {
                    debug!(session_id = %session_id, "terminate on unknown session id is a no-op");
                    Ok(())
                }
            }
        })
    }
}
