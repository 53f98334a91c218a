// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Server power state machine.

use serde::{Deserialize, Serialize};
use std::str::FromStr;
use thiserror::Error;

/// Power state of a managed server process.
///
/// The lifecycle is cyclic: a server always comes back to `Offline`, either
/// through a graceful `Stopping` phase or directly when the process dies
/// underneath us.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ServerState {
    #[default]
    Offline,
    Starting,
    Running,
    Stopping,
}

crate::simple_display! {
    ServerState {
        Offline => "offline",
        Starting => "starting",
        Running => "running",
        Stopping => "stopping",
    }
}

/// Error returned when parsing an unrecognized state name.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("unknown server state: {0}")]
pub struct UnknownState(pub String);

impl FromStr for ServerState {
    type Err = UnknownState;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "offline" => Ok(ServerState::Offline),
            "starting" => Ok(ServerState::Starting),
            "running" => Ok(ServerState::Running),
            "stopping" => Ok(ServerState::Stopping),
            other => Err(UnknownState(other.to_string())),
        }
    }
}

impl ServerState {
    /// Whether moving from `prev` to `self` is an edge of the lifecycle graph.
    ///
    /// The recovery edges `Starting -> Offline` and `Running -> Offline` cover
    /// processes that die without passing through `Stopping`.
    pub fn can_follow(self, prev: ServerState) -> bool {
        use ServerState::*;
        matches!(
            (prev, self),
            (Offline, Starting)
                | (Starting, Running)
                | (Starting, Stopping)
                | (Starting, Offline)
                | (Running, Stopping)
                | (Running, Offline)
                | (Stopping, Offline)
        )
    }
}

#[cfg(test)]
#[path = "state_tests.rs"]
mod tests;
