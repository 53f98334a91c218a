// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! The per-server object.
//!
//! A [`Server`] exclusively owns its process environment, its event bus
//! and its filesystem guard. Two monitor tasks subscribe to the server's
//! own bus: the console interpreter (startup/stop line matching) and the
//! state watcher (Panel status reports and crash detection).

mod console;
mod crash;
pub mod install;
pub mod manager;

use crate::config::DaemonConfig;
use crate::environment::docker::DockerEnvironment;
use crate::environment::{
    environment_config, EnvironmentError, Outlet, ProcessEnvironment, StateCell,
};
use crate::event_bus::EventBus;
use crate::filesystem::{Filesystem, FilesystemError};
use crate::remote::{PanelClient, ServerConfigurationResponse};
use parking_lot::{Mutex, RwLock};
use roost_core::{topic, Clock, ProcessConfiguration, ServerConfiguration, ServerState, SystemClock};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};
use thiserror::Error;
use tokio::task::JoinHandle;
use uuid::Uuid;

const RESTART_STOP_DEADLINE: Duration = Duration::from_secs(60);

/// Errors from server-level operations.
#[derive(Debug, Error)]
pub enum ServerError {
    #[error("a restart is already in progress for this server")]
    RestartInProgress,

    #[error(transparent)]
    Environment(#[from] EnvironmentError),

    #[error(transparent)]
    Filesystem(#[from] FilesystemError),
}

/// Everything a server is assembled from.
pub(crate) struct ServerParts {
    pub id: Uuid,
    pub config: ServerConfiguration,
    pub process: ProcessConfiguration,
    pub bus: EventBus,
    pub outlet: Outlet,
    pub environment: Arc<dyn ProcessEnvironment>,
    pub filesystem: Arc<Filesystem>,
    pub remote: Option<Arc<PanelClient>>,
    pub clock: Arc<dyn Clock>,
    pub crash_cooldown: Duration,
}

/// One managed game server.
pub struct Server {
    id: Uuid,
    config: RwLock<ServerConfiguration>,
    process: RwLock<ProcessConfiguration>,
    bus: EventBus,
    outlet: Outlet,
    environment: Arc<dyn ProcessEnvironment>,
    filesystem: Arc<Filesystem>,
    remote: Option<Arc<PanelClient>>,
    clock: Arc<dyn Clock>,
    crash_cooldown: Duration,
    restarting: AtomicBool,
    last_auto_restart: Mutex<Option<Instant>>,
    tasks: Mutex<Vec<JoinHandle<()>>>,
}

impl Server {
    /// Build a Docker-backed server from its authoritative Panel payload.
    pub fn from_configuration(
        docker: bollard::Docker,
        payload: ServerConfigurationResponse,
        daemon: &DaemonConfig,
        remote: Option<Arc<PanelClient>>,
    ) -> Result<Arc<Self>, ServerError> {
        let uuid = payload.settings.uuid;
        let filesystem = Arc::new(Filesystem::new(
            daemon.system.server_data_dir(&uuid),
            payload.settings.build.disk_bytes(),
            daemon.system.disk_check_interval(),
        )?);

        let bus = EventBus::new();
        let outlet = Outlet::new(Arc::new(StateCell::default()), bus.clone());
        let clock: Arc<dyn Clock> = Arc::new(SystemClock);

        let environment = environment_config(
            &payload.settings,
            &payload.process_configuration,
            daemon.system.uid,
            daemon.system.gid,
            &daemon.docker.network_mode,
            &daemon.docker.dns,
            &daemon.docker.allowed_mounts,
        );
        let environment: Arc<dyn ProcessEnvironment> = Arc::new(DockerEnvironment::new(
            docker,
            uuid.to_string(),
            environment,
            outlet.clone(),
            Arc::clone(&clock),
        ));

        Ok(Self::assemble(ServerParts {
            id: uuid,
            config: payload.settings,
            process: payload.process_configuration,
            bus,
            outlet,
            environment,
            filesystem,
            remote,
            clock,
            crash_cooldown: daemon.system.crash_cooldown(),
        }))
    }

    pub(crate) fn assemble(parts: ServerParts) -> Arc<Self> {
        let server = Arc::new(Self {
            id: parts.id,
            config: RwLock::new(parts.config),
            process: RwLock::new(parts.process),
            bus: parts.bus,
            outlet: parts.outlet,
            environment: parts.environment,
            filesystem: parts.filesystem,
            remote: parts.remote,
            clock: parts.clock,
            crash_cooldown: parts.crash_cooldown,
            restarting: AtomicBool::new(false),
            last_auto_restart: Mutex::new(None),
            tasks: Mutex::new(Vec::new()),
        });
        server.spawn_monitors();
        server
    }

    fn spawn_monitors(self: &Arc<Self>) {
        // the bus is freshly created with the server, so these cannot fail
        let Ok(console_sub) = self.bus.subscribe(topic::CONSOLE_OUTPUT) else {
            return;
        };
        let Ok(state_sub) = self.bus.subscribe(topic::STATE_CHANGE) else {
            return;
        };
        let console_task = tokio::spawn(console::run(Arc::downgrade(self), console_sub));
        let state_task = tokio::spawn(crash::run(Arc::downgrade(self), state_sub));
        self.tasks.lock().extend([console_task, state_task]);
    }

    pub fn uuid(&self) -> Uuid {
        self.id
    }

    pub fn state(&self) -> ServerState {
        self.outlet.state()
    }

    pub fn events(&self) -> &EventBus {
        &self.bus
    }

    pub fn filesystem(&self) -> &Filesystem {
        &self.filesystem
    }

    pub fn environment(&self) -> &Arc<dyn ProcessEnvironment> {
        &self.environment
    }

    pub fn configuration(&self) -> ServerConfiguration {
        self.config.read().clone()
    }

    pub async fn start(&self) -> Result<(), ServerError> {
        self.environment.start().await.map_err(Into::into)
    }

    pub async fn stop(&self) -> Result<(), ServerError> {
        self.environment.stop().await.map_err(Into::into)
    }

    /// Stop (waiting up to a minute) and boot again. Serialized: while one
    /// restart runs, concurrent callers fail fast with
    /// [`ServerError::RestartInProgress`].
    pub async fn restart(&self) -> Result<(), ServerError> {
        if self.restarting.swap(true, Ordering::SeqCst) {
            return Err(ServerError::RestartInProgress);
        }
        let result = self.restart_inner().await;
        self.restarting.store(false, Ordering::SeqCst);
        result
    }

    async fn restart_inner(&self) -> Result<(), ServerError> {
        self.environment
            .wait_for_stop(RESTART_STOP_DEADLINE, false)
            .await?;
        self.environment.start().await?;
        Ok(())
    }

    /// Forcibly kill the process.
    pub async fn kill(&self) -> Result<(), ServerError> {
        self.environment.terminate("SIGKILL").await.map_err(Into::into)
    }

    /// Tear the server down: destroy the backing environment, close the
    /// event bus and wait for the monitor tasks to drain.
    pub async fn destroy(&self) -> Result<(), ServerError> {
        let result = self.environment.destroy().await;
        self.bus.destroy();
        let tasks: Vec<_> = std::mem::take(&mut *self.tasks.lock());
        for task in tasks {
            let _ = task.await;
        }
        result.map_err(Into::into)
    }
}

#[cfg(test)]
#[path = "mod_tests.rs"]
mod tests;
