// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Event vocabulary for the per-server publish/subscribe fabric.

use serde::{Deserialize, Serialize};

/// Topics published on a server's event bus.
pub mod topic {
    /// One console line per event, without a line terminator.
    pub const CONSOLE_OUTPUT: &str = "console output";
    /// The new state name after a transition.
    pub const STATE_CHANGE: &str = "state change";
}

/// A single event as observed by a subscriber.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Event {
    pub topic: String,
    pub payload: String,
}

impl Event {
    pub fn new(topic: impl Into<String>, payload: impl Into<String>) -> Self {
        Self {
            topic: topic.into(),
            payload: payload.into(),
        }
    }
}

#[cfg(test)]
#[path = "event_tests.rs"]
mod tests;
