// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Process-wide registry of managed servers.
//!
//! Owned by the daemon bootstrap and handed around explicitly; reads are
//! concurrent, writes exclusive. Removing a server destroys it: the
//! backing container is removed, the bus is closed and subscribers drain.

use super::{Server, ServerError};
use parking_lot::RwLock;
use std::collections::HashMap;
use std::sync::Arc;
use uuid::Uuid;

#[derive(Default)]
pub struct ServerManager {
    servers: RwLock<HashMap<Uuid, Arc<Server>>>,
}

impl ServerManager {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a server, replacing any previous instance with the same id.
    pub fn add(&self, server: Arc<Server>) {
        self.servers.write().insert(server.uuid(), server);
    }

    pub fn get(&self, uuid: &Uuid) -> Option<Arc<Server>> {
        self.servers.read().get(uuid).cloned()
    }

    pub fn all(&self) -> Vec<Arc<Server>> {
        self.servers.read().values().cloned().collect()
    }

    pub fn len(&self) -> usize {
        self.servers.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.servers.read().is_empty()
    }

    /// Drop a server from the registry and tear it down.
    pub async fn remove(&self, uuid: &Uuid) -> Result<(), ServerError> {
        let removed = self.servers.write().remove(uuid);
        match removed {
            Some(server) => server.destroy().await,
            None => Ok(()),
        }
    }
}

#[cfg(test)]
#[path = "manager_tests.rs"]
mod tests;
