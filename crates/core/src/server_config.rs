// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Authoritative per-server configuration as supplied by the control plane.
//!
//! Deserialization is permissive: any field the Panel omits falls back to
//! its zero value so configuration schema drift does not break the daemon.

use crate::limits::{Allocations, Mount, ResourceLimits};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use uuid::Uuid;

/// Container details for a server.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ContainerDetails {
    /// Image reference, e.g. `ghcr.io/parkervcp/yolks:java_17`.
    pub image: String,
}

/// The server-type template this server was created from.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct EggDetails {
    pub id: Uuid,
}

/// Everything the Panel knows about one server.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfiguration {
    pub uuid: Uuid,
    pub suspended: bool,
    /// Command line the container runs, with `{{VAR}}` style placeholders
    /// already expanded by the Panel.
    pub invocation: String,
    /// Egg-defined variables; the Panel may send numbers and booleans.
    pub environment: HashMap<String, serde_json::Value>,
    pub container: ContainerDetails,
    pub build: ResourceLimits,
    pub allocations: Allocations,
    pub mounts: Vec<Mount>,
    pub egg: EggDetails,
    pub crash_detection_enabled: bool,
}

impl ServerConfiguration {
    /// `KEY=VALUE` pairs for the container process, covering the egg
    /// variables plus the values every server receives.
    pub fn environment_variables(&self) -> Vec<String> {
        let mut vars: Vec<String> = self
            .environment
            .iter()
            .map(|(key, value)| match value {
                serde_json::Value::String(s) => format!("{key}={s}"),
                other => format!("{key}={other}"),
            })
            .collect();
        vars.sort();

        vars.push(format!("STARTUP={}", self.invocation));
        vars.push(format!("SERVER_MEMORY={}", self.build.memory_limit));
        vars.push(format!("SERVER_IP={}", self.allocations.default.ip));
        vars.push(format!("SERVER_PORT={}", self.allocations.default.port));
        vars
    }
}

#[cfg(test)]
#[path = "server_config_tests.rs"]
mod tests;
