// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Console-line interpreter.
//!
//! While a server is `Starting`, each console line is matched against the
//! startup done patterns; the first hit flips it to `Running`. While
//! `Running` with a command-type stop directive, a line equal to the stop
//! value flips it to `Stopping` — this is how an operator-typed graceful
//! stop informs crash detection, so the following exit is not misread as
//! a crash.

use super::Server;
use crate::event_bus::Subscription;
use roost_core::{strip_ansi, ServerState, StopType};
use std::borrow::Cow;
use std::sync::Weak;

pub(super) async fn run(server: Weak<Server>, mut subscription: Subscription) {
    while let Some(event) = subscription.recv().await {
        let Some(server) = server.upgrade() else {
            break;
        };
        server.interpret_console_line(&event.payload);
    }
}

impl Server {
    pub(crate) fn interpret_console_line(&self, line: &str) {
        let state = self.state();
        if state != ServerState::Starting && state != ServerState::Running {
            return;
        }

        let process = self.process.read();
        let line = if process.startup.strip_ansi {
            strip_ansi(line)
        } else {
            Cow::Borrowed(line)
        };

        match state {
            ServerState::Starting => {
                if process.startup.done.iter().any(|p| p.matches(&line)) {
                    tracing::debug!(server = %self.id, "startup done pattern matched");
                    self.outlet.set_state(ServerState::Running);
                }
            }
            ServerState::Running => {
                if process.stop.kind == StopType::Command && line.as_ref() == process.stop.value {
                    tracing::debug!(server = %self.id, "observed the stop command on the console");
                    self.outlet.set_state(ServerState::Stopping);
                }
            }
            _ => {}
        }
    }
}

#[cfg(test)]
#[path = "console_tests.rs"]
mod tests;
