// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Power sequencing for the Docker environment.
//!
//! `start` must never strand the state machine in `Starting`: a lingering
//! `Starting` would be misread by crash detection once the exit is
//! observed. A drop guard deposits `Stopping` then `Offline` whenever the
//! boot sequence errors or is cancelled midway.

use super::{with_deadline, DockerEnvironment, CONTAINER_OP_TIMEOUT, STOP_GRACE_SECONDS};
use crate::environment::{EnvironmentError, Outlet};
use bollard::container::{
    KillContainerOptions, StartContainerOptions, StopContainerOptions, WaitContainerOptions,
};
use futures_util::StreamExt;
use roost_core::{ServerState, StopType};
use std::sync::atomic::Ordering;
use std::time::Duration;

struct StartGuard<'a> {
    outlet: &'a Outlet,
    armed: bool,
}

impl Drop for StartGuard<'_> {
    fn drop(&mut self) {
        if self.armed {
            self.outlet.set_state(ServerState::Stopping);
            self.outlet.set_state(ServerState::Offline);
        }
    }
}

impl DockerEnvironment {
    pub(super) async fn start_environment(&self) -> Result<(), EnvironmentError> {
        if self.outlet.state() != ServerState::Offline {
            return Ok(());
        }

        match self.inspect().await {
            Ok(inspect) => {
                let running = inspect
                    .state
                    .as_ref()
                    .and_then(|s| s.running)
                    .unwrap_or(false);
                if running {
                    // Recovery after a daemon restart: the process kept
                    // running, so adopt it instead of booting.
                    tracing::info!(server = %self.id, "container already running, reattaching");
                    self.outlet.set_state(ServerState::Starting);
                    self.outlet.set_state(ServerState::Running);
                    return self.attach_environment().await;
                }
                // Throw away old log history so the follower does not
                // replay a previous boot.
                if let Some(path) = inspect.log_path.as_deref().filter(|p| !p.is_empty()) {
                    truncate_log(path).await?;
                }
            }
            Err(err) if err.is_not_found() => {}
            Err(err) => return Err(err),
        }

        self.outlet.set_state(ServerState::Starting);
        let mut guard = StartGuard {
            outlet: &self.outlet,
            armed: true,
        };

        self.remove_container().await?;
        self.create_container().await?;

        with_deadline(
            self.client
                .start_container(&self.id, None::<StartContainerOptions<String>>),
        )
        .await?;

        self.attach_environment().await?;
        guard.armed = false;
        Ok(())
    }

    pub(super) async fn stop_environment(&self) -> Result<(), EnvironmentError> {
        if self.outlet.state() == ServerState::Offline {
            return Ok(());
        }

        let stop = self.config.read().stop.clone();
        match stop.kind {
            // The console interpreter observes the command echo and moves
            // the state to Stopping, keeping crash detection informed.
            StopType::Command if self.attached.load(Ordering::SeqCst) => {
                self.send_command_environment(&stop.value).await
            }
            StopType::Signal => {
                self.terminate_environment(&normalize_signal(&stop.value))
                    .await
            }
            StopType::Command => {
                self.outlet.set_state(ServerState::Stopping);
                let request = self.client.stop_container(
                    &self.id,
                    Some(StopContainerOptions {
                        t: STOP_GRACE_SECONDS,
                    }),
                );
                // the runtime burns the full grace period before killing
                let deadline = Duration::from_secs(STOP_GRACE_SECONDS as u64) + CONTAINER_OP_TIMEOUT;
                match tokio::time::timeout(deadline, request).await {
                    Ok(Ok(())) => Ok(()),
                    Ok(Err(err)) => {
                        let err = EnvironmentError::from(err);
                        if err.is_not_found() {
                            self.outlet.set_state(ServerState::Offline);
                            Ok(())
                        } else {
                            Err(err)
                        }
                    }
                    Err(_) => Err(EnvironmentError::Timeout),
                }
            }
        }
    }

    pub(super) async fn wait_for_stop_environment(
        &self,
        timeout: Duration,
        terminate: bool,
    ) -> Result<(), EnvironmentError> {
        self.stop_environment().await?;

        let mut wait = self.client.wait_container(
            &self.id,
            Some(WaitContainerOptions {
                condition: "not-running".to_string(),
            }),
        );
        match tokio::time::timeout(timeout, wait.next()).await {
            Ok(None) | Ok(Some(Ok(_))) => {
                self.outlet.set_state(ServerState::Offline);
                Ok(())
            }
            Ok(Some(Err(err))) => {
                let err = EnvironmentError::from(err);
                if err.is_not_found() {
                    self.outlet.set_state(ServerState::Offline);
                    Ok(())
                } else {
                    Err(err)
                }
            }
            Err(_) if terminate => self.terminate_environment("SIGKILL").await,
            Err(_) => Err(EnvironmentError::Timeout),
        }
    }

    pub(super) async fn terminate_environment(
        &self,
        signal: &str,
    ) -> Result<(), EnvironmentError> {
        if !self.container_running().await? {
            return Ok(());
        }

        self.outlet.set_state(ServerState::Stopping);
        let killed = with_deadline(self.client.kill_container(
            &self.id,
            Some(KillContainerOptions {
                signal: signal.to_string(),
            }),
        ))
        .await;
        match killed {
            Ok(()) => {}
            Err(err) if err.is_not_found() => {}
            Err(err) => return Err(err),
        }
        self.outlet.set_state(ServerState::Offline);
        Ok(())
    }
}

/// Normalize a configured stop-signal name for the runtime; anything
/// unusable degrades to SIGKILL.
pub(super) fn normalize_signal(value: &str) -> String {
    let upper = value.trim().to_uppercase();
    if upper.is_empty() {
        return "SIGKILL".to_string();
    }
    if upper.starts_with("SIG") {
        upper
    } else {
        format!("SIG{upper}")
    }
}

async fn truncate_log(path: &str) -> Result<(), EnvironmentError> {
    match tokio::fs::OpenOptions::new()
        .write(true)
        .truncate(true)
        .open(path)
        .await
    {
        Ok(_) => Ok(()),
        Err(err) if err.kind() == std::io::ErrorKind::NotFound => Ok(()),
        Err(err) => Err(err.into()),
    }
}

#[cfg(test)]
#[path = "power_tests.rs"]
mod tests;
