// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! One-shot server bootstrap.
//!
//! Validates a create request, pulls the authoritative configuration from
//! the Panel, materializes the data directory with the right ownership
//! and asks the environment to create itself. Failures are logged and
//! surfaced without partial cleanup — the next attempt finds and reuses
//! or recreates whatever was left behind.

use super::manager::ServerManager;
use super::{Server, ServerError};
use crate::config::DaemonConfig;
use crate::environment::EnvironmentError;
use crate::remote::{PanelClient, RemoteError};
use serde::Deserialize;
use std::os::unix::fs::PermissionsExt;
use std::path::Path;
use std::sync::Arc;
use thiserror::Error;
use uuid::Uuid;

#[derive(Debug, Error)]
pub enum InstallerError {
    #[error("validation failed: {0}")]
    Validation(String),

    #[error(transparent)]
    Remote(#[from] RemoteError),

    #[error(transparent)]
    Server(#[from] ServerError),

    #[error(transparent)]
    Environment(#[from] EnvironmentError),

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

/// Inbound create request. Everything except the uuids deserializes
/// permissively with zero-value defaults.
#[derive(Debug, Default, Clone, Deserialize)]
#[serde(default)]
pub struct CreateServerRequest {
    pub uuid: Uuid,
    pub service: ServiceDetails,
    pub start_on_completion: bool,
}

#[derive(Debug, Default, Clone, Deserialize)]
#[serde(default)]
pub struct ServiceDetails {
    pub egg: Uuid,
}

impl CreateServerRequest {
    /// Both identifiers must be version-4 uuids.
    pub fn validate(&self) -> Result<(), InstallerError> {
        if self.uuid.get_version_num() != 4 {
            return Err(InstallerError::Validation(format!(
                "server uuid {} is not a version 4 uuid",
                self.uuid
            )));
        }
        if self.service.egg.get_version_num() != 4 {
            return Err(InstallerError::Validation(format!(
                "egg uuid {} is not a version 4 uuid",
                self.service.egg
            )));
        }
        Ok(())
    }
}

/// Bootstraps new servers onto this node.
pub struct Installer {
    docker: bollard::Docker,
    panel: Arc<PanelClient>,
    manager: Arc<ServerManager>,
    config: Arc<DaemonConfig>,
}

impl Installer {
    pub fn new(
        docker: bollard::Docker,
        panel: Arc<PanelClient>,
        manager: Arc<ServerManager>,
        config: Arc<DaemonConfig>,
    ) -> Self {
        Self {
            docker,
            panel,
            manager,
            config,
        }
    }

    /// Install the server described by `raw` and register it.
    pub async fn install(&self, raw: serde_json::Value) -> Result<Arc<Server>, InstallerError> {
        let request: CreateServerRequest = serde_json::from_value(raw)
            .map_err(|err| InstallerError::Validation(err.to_string()))?;
        request.validate()?;

        tracing::info!(
            server = %request.uuid,
            egg = %request.service.egg,
            "installing server"
        );

        let payload = self.panel.server_configuration(&request.uuid).await?;
        let server = Server::from_configuration(
            self.docker.clone(),
            payload,
            &self.config,
            Some(Arc::clone(&self.panel)),
        )?;

        self.prepare_data_directory(server.filesystem().path())?;
        server.environment().create().await?;

        self.manager.add(Arc::clone(&server));
        tracing::info!(server = %request.uuid, "server installed");
        Ok(server)
    }

    /// `mkdir -p` the data directory, fix its mode and hand it to the
    /// configured unprivileged owner.
    fn prepare_data_directory(&self, path: &Path) -> Result<(), InstallerError> {
        std::fs::create_dir_all(path)?;
        std::fs::set_permissions(path, std::fs::Permissions::from_mode(0o755))?;
        nix::unistd::chown(
            path,
            Some(nix::unistd::Uid::from_raw(self.config.system.uid)),
            Some(nix::unistd::Gid::from_raw(self.config.system.gid)),
        )
        .map_err(|errno| InstallerError::Io(std::io::Error::from(errno)))?;
        Ok(())
    }
}

#[cfg(test)]
#[path = "install_tests.rs"]
mod tests;
