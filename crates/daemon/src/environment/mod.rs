// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Abstract process environment consumed by the server layer.
//!
//! A [`ProcessEnvironment`] is the backing that can create, start, stop,
//! attach to and destroy one server process. The Docker implementation
//! lives in [`docker`]; the server layer only ever talks to the trait, so
//! other backings stay possible.
//!
//! The environment never owns the server — it is handed an [`Outlet`] at
//! construction through which it publishes console lines and state
//! transitions, which keeps the ownership graph acyclic.

pub mod docker;

use crate::event_bus::EventBus;
use async_trait::async_trait;
use parking_lot::Mutex;
use roost_core::{
    topic, Allocations, Mount, ProcessConfiguration, ResourceLimits, ServerState,
    StopConfiguration,
};
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;

/// Errors from environment operations.
#[derive(Debug, Error)]
pub enum EnvironmentError {
    #[error("no backing container exists")]
    NotFound,

    #[error("environment is not attached to the process streams")]
    NotAttached,

    #[error("operation deadline exceeded")]
    Timeout,

    #[error("image pull failed: {0}")]
    ImagePull(String),

    #[error(transparent)]
    Transport(#[from] bollard::errors::Error),

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

impl EnvironmentError {
    /// Whether the underlying transport reported a missing resource.
    /// Destroy, Stop and in-situ updates treat this as success.
    pub fn is_not_found(&self) -> bool {
        match self {
            EnvironmentError::NotFound => true,
            EnvironmentError::Transport(bollard::errors::Error::DockerResponseServerError {
                status_code: 404,
                ..
            }) => true,
            _ => false,
        }
    }
}

/// Exit information of the most recent process run.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ExitState {
    pub exit_code: i64,
    pub oom_killed: bool,
}

/// Everything a concrete environment needs to materialize a server
/// process, snapshotted from the server configuration.
#[derive(Debug, Clone, Default)]
pub struct EnvironmentConfig {
    /// Command line the container runs.
    pub invocation: String,
    /// Image reference.
    pub image: String,
    /// `KEY=VALUE` pairs for the process.
    pub environment: Vec<String>,
    pub limits: ResourceLimits,
    pub allocations: Allocations,
    /// Pre-authorized bind mounts only.
    pub mounts: Vec<Mount>,
    pub stop: StopConfiguration,
    /// Unprivileged uid/gid the in-container process runs as.
    pub uid: u32,
    pub gid: u32,
    pub network_mode: String,
    pub dns: Vec<String>,
}

/// Per-server state variable, shared between the server and its
/// environment. All reads and writes go through this cell.
#[derive(Default)]
pub struct StateCell {
    state: Mutex<ServerState>,
}

impl StateCell {
    pub fn get(&self) -> ServerState {
        *self.state.lock()
    }

    /// Set the state, returning the previous value when it changed.
    /// Same-state transitions are no-ops.
    fn swap(&self, next: ServerState) -> Option<ServerState> {
        let mut state = self.state.lock();
        if *state == next {
            return None;
        }
        Some(std::mem::replace(&mut *state, next))
    }
}

/// Publish-handle the environment writes through: console lines and state
/// transitions flow out of here onto the owning server's event bus.
#[derive(Clone)]
pub struct Outlet {
    state: Arc<StateCell>,
    bus: EventBus,
}

impl Outlet {
    pub fn new(state: Arc<StateCell>, bus: EventBus) -> Self {
        Self { state, bus }
    }

    pub fn state(&self) -> ServerState {
        self.state.get()
    }

    /// Transition the state variable, publishing a state-change event.
    /// Setting the current state again emits nothing.
    pub fn set_state(&self, next: ServerState) {
        if let Some(prev) = self.state.swap(next) {
            tracing::debug!(prev = %prev, next = %next, "state transition");
            self.bus.publish(topic::STATE_CHANGE, next.to_string());
        }
    }

    /// Publish one console line (no terminator).
    pub fn publish_console(&self, line: &str) {
        self.bus.publish(topic::CONSOLE_OUTPUT, line);
    }
}

/// Operations a backing process resource must support. Failure semantics
/// are part of the contract; see the individual methods.
#[async_trait]
pub trait ProcessEnvironment: Send + Sync {
    /// Whether a backing resource is materialized.
    async fn exists(&self) -> Result<bool, EnvironmentError>;

    /// Whether the backing process is currently running.
    async fn is_running(&self) -> Result<bool, EnvironmentError>;

    /// Materialize the backing resource without starting it. A no-op when
    /// it already exists.
    async fn create(&self) -> Result<(), EnvironmentError>;

    /// Destroy any stale resource and re-create it so configuration
    /// changes take effect.
    async fn on_before_start(&self) -> Result<(), EnvironmentError>;

    /// Boot the process. A no-op unless the server is Offline; any error
    /// mid-sequence deposits the state into Stopping then Offline.
    async fn start(&self) -> Result<(), EnvironmentError>;

    /// Ask the process to stop, honoring the configured stop directive.
    /// Idempotent when already offline.
    async fn stop(&self) -> Result<(), EnvironmentError>;

    /// Stop and block until Offline or the deadline. On deadline, kills
    /// when `terminate` is set, otherwise fails with `Timeout`.
    async fn wait_for_stop(
        &self,
        timeout: Duration,
        terminate: bool,
    ) -> Result<(), EnvironmentError>;

    /// Forcibly deliver the named signal. A no-op when not running.
    async fn terminate(&self, signal: &str) -> Result<(), EnvironmentError>;

    /// Apply the current resource limits without a restart. A no-op when
    /// no resource exists.
    async fn in_situ_update(&self) -> Result<(), EnvironmentError>;

    /// Write `command` followed by a newline to the process input stream.
    async fn send_command(&self, command: &str) -> Result<(), EnvironmentError>;

    /// The last `bytes` bytes of the tail log, line-split.
    async fn read_log(&self, bytes: u64) -> Result<Vec<String>, EnvironmentError>;

    /// Exit code and OOM flag of the most recent run.
    async fn exit_state(&self) -> Result<ExitState, EnvironmentError>;

    /// Start the console pumps. Returns once attachment is established,
    /// not when the process ends. A no-op when already attached.
    async fn attach(&self) -> Result<(), EnvironmentError>;

    /// Remove the backing resource. Success when already missing.
    async fn destroy(&self) -> Result<(), EnvironmentError>;

    /// Replace the configuration snapshot (resource limits, stop
    /// directive) used by subsequent operations.
    fn update_configuration(&self, config: EnvironmentConfig);

    /// The process configuration relevant pieces are snapshotted in the
    /// environment config; expose the stop directive for the server layer.
    fn stop_configuration(&self) -> StopConfiguration;
}

/// Build the environment snapshot for a server from its authoritative
/// configuration plus daemon-level settings.
pub fn environment_config(
    config: &roost_core::ServerConfiguration,
    process: &ProcessConfiguration,
    uid: u32,
    gid: u32,
    network_mode: &str,
    dns: &[String],
    allowed_mounts: &[std::path::PathBuf],
) -> EnvironmentConfig {
    let mounts = config
        .mounts
        .iter()
        .filter(|mount| {
            let allowed = allowed_mounts
                .iter()
                .any(|prefix| std::path::Path::new(&mount.source).starts_with(prefix));
            if !allowed {
                tracing::warn!(
                    server = %config.uuid,
                    source = %mount.source,
                    "skipping mount outside the allow-list"
                );
            }
            allowed
        })
        .cloned()
        .collect();

    EnvironmentConfig {
        invocation: config.invocation.clone(),
        image: config.container.image.clone(),
        environment: config.environment_variables(),
        limits: config.build.clone(),
        allocations: config.allocations.clone(),
        mounts,
        stop: process.stop.clone(),
        uid,
        gid,
        network_mode: network_mode.to_string(),
        dns: dns.to_vec(),
    }
}

#[cfg(test)]
#[path = "mod_tests.rs"]
mod tests;
