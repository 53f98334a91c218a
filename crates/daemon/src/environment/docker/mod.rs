// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Docker-backed process environment.
//!
//! # Module layout
//!
//! - [`configure`] — container/host configuration assembly
//! - `power` — start/stop/terminate sequencing
//! - `stream` — attach pumps, log follower, console I/O
//!
//! One container per server, named by the server uuid. Every container
//! operation carries a 10 second deadline except image pulls (15 minutes)
//! and `wait_for_stop`, whose deadline the caller supplies.

pub mod configure;
mod power;
mod stream;

use super::{EnvironmentConfig, EnvironmentError, ExitState, Outlet, ProcessEnvironment};
use async_trait::async_trait;
use bollard::container::{CreateContainerOptions, RemoveContainerOptions, UpdateContainerOptions};
use bollard::image::{CreateImageOptions, ListImagesOptions};
use bollard::models::ContainerInspectResponse;
use bollard::Docker;
use futures_util::StreamExt;
use parking_lot::{Mutex, RwLock};
use roost_core::{Clock, ServerState, StopConfiguration};
use std::collections::HashMap;
use std::future::Future;
use std::pin::Pin;
use std::sync::atomic::AtomicBool;
use std::sync::Arc;
use std::time::Duration;
use tokio::io::AsyncWrite;
use tokio_util::sync::CancellationToken;

const CONTAINER_OP_TIMEOUT: Duration = Duration::from_secs(10);
const IMAGE_PULL_TIMEOUT: Duration = Duration::from_secs(15 * 60);
/// Grace period handed to the runtime's own stop request.
const STOP_GRACE_SECONDS: i64 = 10;

type SharedStdin = Arc<tokio::sync::Mutex<Option<Pin<Box<dyn AsyncWrite + Send>>>>>;

/// Process environment backed by a Docker container.
pub struct DockerEnvironment {
    id: String,
    client: Docker,
    config: RwLock<EnvironmentConfig>,
    outlet: Outlet,
    clock: Arc<dyn Clock>,
    stdin: SharedStdin,
    attached: Arc<AtomicBool>,
    cancel: Mutex<CancellationToken>,
    pumps: Mutex<Vec<tokio::task::JoinHandle<()>>>,
}

impl DockerEnvironment {
    pub fn new(
        client: Docker,
        id: impl Into<String>,
        config: EnvironmentConfig,
        outlet: Outlet,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self {
            id: id.into(),
            client,
            config: RwLock::new(config),
            outlet,
            clock,
            stdin: Arc::new(tokio::sync::Mutex::new(None)),
            attached: Arc::new(AtomicBool::new(false)),
            cancel: Mutex::new(CancellationToken::new()),
            pumps: Mutex::new(Vec::new()),
        }
    }

    /// Container name; equals the server uuid.
    pub fn id(&self) -> &str {
        &self.id
    }

    async fn inspect(&self) -> Result<ContainerInspectResponse, EnvironmentError> {
        match with_deadline(self.client.inspect_container(&self.id, None)).await {
            Err(err) if err.is_not_found() => Err(EnvironmentError::NotFound),
            other => other,
        }
    }

    async fn container_exists(&self) -> Result<bool, EnvironmentError> {
        match self.inspect().await {
            Ok(_) => Ok(true),
            Err(err) if err.is_not_found() => Ok(false),
            Err(err) => Err(err),
        }
    }

    async fn container_running(&self) -> Result<bool, EnvironmentError> {
        match self.inspect().await {
            Ok(inspect) => Ok(inspect
                .state
                .as_ref()
                .and_then(|s| s.running)
                .unwrap_or(false)),
            Err(err) if err.is_not_found() => Ok(false),
            Err(err) => Err(err),
        }
    }

    async fn create_container(&self) -> Result<(), EnvironmentError> {
        if self.container_exists().await? {
            return Ok(());
        }

        let config = self.config.read().clone();
        self.ensure_image(&config.image).await?;

        let container = configure::container_config(&self.id, &config);
        tracing::info!(server = %self.id, image = %config.image, "creating container");
        with_deadline(self.client.create_container(
            Some(CreateContainerOptions {
                name: self.id.clone(),
                platform: None,
            }),
            container,
        ))
        .await?;
        Ok(())
    }

    /// Pull the configured image, falling back to a locally cached copy
    /// when the registry is unreachable.
    async fn ensure_image(&self, image: &str) -> Result<(), EnvironmentError> {
        let pull = async {
            let options = CreateImageOptions::<String> {
                from_image: image.to_string(),
                ..Default::default()
            };
            let mut progress = self.client.create_image(Some(options), None, None);
            while let Some(update) = progress.next().await {
                update?;
            }
            Ok::<(), bollard::errors::Error>(())
        };

        let failure = match tokio::time::timeout(IMAGE_PULL_TIMEOUT, pull).await {
            Ok(Ok(())) => None,
            Ok(Err(err)) => Some(err.to_string()),
            Err(_) => Some("pull deadline exceeded".to_string()),
        };
        let exists_locally = if failure.is_some() {
            self.image_exists_locally(image).await?
        } else {
            false
        };

        match pull_outcome(failure.is_some(), exists_locally) {
            PullOutcome::Ready => Ok(()),
            PullOutcome::UseLocalCopy => {
                tracing::warn!(
                    server = %self.id,
                    %image,
                    error = %failure.unwrap_or_default(),
                    "image pull failed, continuing with the local copy"
                );
                Ok(())
            }
            PullOutcome::Fail => Err(EnvironmentError::ImagePull(failure.unwrap_or_default())),
        }
    }

    async fn image_exists_locally(&self, image: &str) -> Result<bool, EnvironmentError> {
        let images = with_deadline(self.client.list_images(Some(ListImagesOptions::<String> {
            filters: reference_filters(image),
            ..Default::default()
        })))
        .await?;
        Ok(!images.is_empty())
    }

    async fn remove_container(&self) -> Result<(), EnvironmentError> {
        let removal = with_deadline(self.client.remove_container(
            &self.id,
            Some(RemoveContainerOptions {
                force: true,
                v: true,
                ..Default::default()
            }),
        ))
        .await;
        match removal {
            Ok(()) => Ok(()),
            Err(err) if err.is_not_found() => Ok(()),
            Err(err) => Err(err),
        }
    }

    fn cancel_pumps(&self) {
        self.cancel.lock().cancel();
    }
}

#[async_trait]
impl ProcessEnvironment for DockerEnvironment {
    async fn exists(&self) -> Result<bool, EnvironmentError> {
        self.container_exists().await
    }

    async fn is_running(&self) -> Result<bool, EnvironmentError> {
        self.container_running().await
    }

    async fn create(&self) -> Result<(), EnvironmentError> {
        self.create_container().await
    }

    async fn on_before_start(&self) -> Result<(), EnvironmentError> {
        // Always rebuild the container so Panel-side configuration changes
        // take effect and no stale mount/env drift survives.
        self.remove_container().await?;
        self.create_container().await
    }

    async fn start(&self) -> Result<(), EnvironmentError> {
        self.start_environment().await
    }

    async fn stop(&self) -> Result<(), EnvironmentError> {
        self.stop_environment().await
    }

    async fn wait_for_stop(
        &self,
        timeout: Duration,
        terminate: bool,
    ) -> Result<(), EnvironmentError> {
        self.wait_for_stop_environment(timeout, terminate).await
    }

    async fn terminate(&self, signal: &str) -> Result<(), EnvironmentError> {
        self.terminate_environment(signal).await
    }

    async fn in_situ_update(&self) -> Result<(), EnvironmentError> {
        if !self.container_exists().await? {
            return Ok(());
        }
        let limits = self.config.read().limits.clone();
        let update = UpdateContainerOptions::<String> {
            memory: Some(limits.memory_bytes()),
            memory_reservation: Some(limits.memory_reservation_bytes()),
            memory_swap: Some(limits.converted_swap()),
            cpu_quota: Some(limits.cpu_quota()),
            cpu_period: Some(roost_core::limits::CPU_PERIOD),
            cpuset_cpus: (!limits.threads.is_empty()).then(|| limits.threads.clone()),
            ..Default::default()
        };
        match with_deadline(self.client.update_container(&self.id, update)).await {
            Ok(()) => Ok(()),
            Err(err) if err.is_not_found() => Ok(()),
            Err(err) => Err(err),
        }
    }

    async fn send_command(&self, command: &str) -> Result<(), EnvironmentError> {
        self.send_command_environment(command).await
    }

    async fn read_log(&self, bytes: u64) -> Result<Vec<String>, EnvironmentError> {
        self.read_log_environment(bytes).await
    }

    async fn exit_state(&self) -> Result<ExitState, EnvironmentError> {
        let inspect = self.inspect().await?;
        let state = inspect.state.unwrap_or_default();
        Ok(ExitState {
            exit_code: state.exit_code.unwrap_or(0),
            oom_killed: state.oom_killed.unwrap_or(false),
        })
    }

    async fn attach(&self) -> Result<(), EnvironmentError> {
        self.attach_environment().await
    }

    async fn destroy(&self) -> Result<(), EnvironmentError> {
        self.cancel_pumps();
        let pumps: Vec<_> = std::mem::take(&mut *self.pumps.lock());
        for pump in pumps {
            let _ = pump.await;
        }
        if self.outlet.state() != ServerState::Offline {
            self.outlet.set_state(ServerState::Stopping);
        }
        self.outlet.set_state(ServerState::Offline);
        self.remove_container().await?;
        self.attached.store(false, std::sync::atomic::Ordering::SeqCst);
        self.stdin.lock().await.take();
        Ok(())
    }

    fn update_configuration(&self, config: EnvironmentConfig) {
        *self.config.write() = config;
    }

    fn stop_configuration(&self) -> StopConfiguration {
        self.config.read().stop.clone()
    }
}

/// Wrap a container-runtime call in the standard 10s deadline.
async fn with_deadline<T, F>(future: F) -> Result<T, EnvironmentError>
where
    F: Future<Output = Result<T, bollard::errors::Error>>,
{
    match tokio::time::timeout(CONTAINER_OP_TIMEOUT, future).await {
        Ok(result) => Ok(result?),
        Err(_) => Err(EnvironmentError::Timeout),
    }
}

/// What happens after an image pull attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum PullOutcome {
    /// The pull succeeded; the image is current.
    Ready,
    /// The registry is unreachable but a copy of the same reference is
    /// cached locally: warn and proceed with it.
    UseLocalCopy,
    /// No way to materialize the image.
    Fail,
}

fn pull_outcome(pull_failed: bool, exists_locally: bool) -> PullOutcome {
    match (pull_failed, exists_locally) {
        (false, _) => PullOutcome::Ready,
        (true, true) => PullOutcome::UseLocalCopy,
        (true, false) => PullOutcome::Fail,
    }
}

/// Image-list filter selecting exactly the configured reference.
fn reference_filters(image: &str) -> HashMap<String, Vec<String>> {
    let mut filters = HashMap::new();
    filters.insert("reference".to_string(), vec![image.to_string()]);
    filters
}

#[cfg(test)]
#[path = "mod_tests.rs"]
mod tests;
