// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Daemon configuration, loaded from TOML with sensible defaults.
//!
//! `ROOSTD_CONFIG` overrides the config path; every section is optional
//! so a minimal file only needs the Panel credentials.

use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::time::Duration;
use thiserror::Error;

pub const DEFAULT_CONFIG_PATH: &str = "/etc/roost/config.toml";

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("could not read {path}: {source}")]
    Read {
        path: String,
        source: std::io::Error,
    },

    #[error(transparent)]
    Parse(#[from] toml::de::Error),
}

/// Panel connection settings.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct PanelSettings {
    pub url: String,
    pub token: String,
}

impl Default for PanelSettings {
    fn default() -> Self {
        Self {
            url: "http://localhost".to_string(),
            token: String::new(),
        }
    }
}

/// Host-level settings: where server data lives and who owns it.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct SystemSettings {
    pub data_root: PathBuf,
    /// Unprivileged uid/gid server data and processes run as.
    pub uid: u32,
    pub gid: u32,
    /// Freshness window of the cached disk usage, in seconds.
    pub disk_check_interval: u64,
    /// Minimum seconds between automatic crash restarts.
    pub crash_cooldown: u64,
}

impl Default for SystemSettings {
    fn default() -> Self {
        Self {
            data_root: PathBuf::from("/var/lib/roost/volumes"),
            uid: 998,
            gid: 998,
            disk_check_interval: 60,
            crash_cooldown: 60,
        }
    }
}

impl SystemSettings {
    pub fn disk_check_interval(&self) -> Duration {
        Duration::from_secs(self.disk_check_interval)
    }

    pub fn crash_cooldown(&self) -> Duration {
        Duration::from_secs(self.crash_cooldown)
    }

    /// Data directory for one server.
    pub fn server_data_dir(&self, uuid: &uuid::Uuid) -> PathBuf {
        self.data_root.join(uuid.to_string())
    }
}

/// Container runtime settings.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct DockerSettings {
    pub network_mode: String,
    pub dns: Vec<String>,
    /// Host paths servers may bind-mount from.
    pub allowed_mounts: Vec<PathBuf>,
}

impl Default for DockerSettings {
    fn default() -> Self {
        Self {
            network_mode: "bridge".to_string(),
            dns: vec!["1.1.1.1".to_string(), "1.0.0.1".to_string()],
            allowed_mounts: Vec::new(),
        }
    }
}

/// Top-level daemon configuration.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct DaemonConfig {
    pub panel: PanelSettings,
    pub system: SystemSettings,
    pub docker: DockerSettings,
}

impl DaemonConfig {
    /// `ROOSTD_CONFIG` when set, otherwise [`DEFAULT_CONFIG_PATH`].
    pub fn path() -> PathBuf {
        std::env::var("ROOSTD_CONFIG")
            .map(PathBuf::from)
            .unwrap_or_else(|_| PathBuf::from(DEFAULT_CONFIG_PATH))
    }

    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let raw = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.display().to_string(),
            source,
        })?;
        Ok(toml::from_str(&raw)?)
    }
}

#[cfg(test)]
#[path = "config_tests.rs"]
mod tests;
