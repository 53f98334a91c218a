// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! State watcher: Panel status reports and crash detection.
//!
//! Any transition to `Offline` that did not pass through `Stopping` is an
//! unexpected exit. A user-initiated stop always routes through
//! `Stopping` (the console interpreter or the power handlers put it
//! there), which inherently suppresses crash handling.

use super::{Server, ServerError};
use crate::event_bus::Subscription;
use roost_core::ServerState;
use std::sync::Weak;

pub(super) async fn run(server: Weak<Server>, mut subscription: Subscription) {
    let mut prev = ServerState::Offline;
    while let Some(event) = subscription.recv().await {
        let Some(server) = server.upgrade() else {
            break;
        };
        let Ok(next) = event.payload.parse::<ServerState>() else {
            continue;
        };

        server.report_state(next);

        if next == ServerState::Offline && prev != ServerState::Stopping {
            if let Err(err) = server.handle_unexpected_exit().await {
                tracing::warn!(server = %server.uuid(), error = %err, "crash handling failed");
            }
        }
        prev = next;
    }
}

impl Server {
    /// Push the new state to the Panel without blocking state processing.
    fn report_state(&self, state: ServerState) {
        let Some(remote) = self.remote.clone() else {
            return;
        };
        let uuid = self.id;
        tokio::spawn(async move {
            if let Err(err) = remote.report_status(&uuid, state).await {
                tracing::warn!(server = %uuid, error = %err, "status report rejected by the panel");
            }
        });
    }

    async fn handle_unexpected_exit(&self) -> Result<(), ServerError> {
        if !self.config.read().crash_detection_enabled {
            return Ok(());
        }

        let exit = self.environment.exit_state().await?;
        if exit.exit_code == 0 && !exit.oom_killed {
            tracing::debug!(server = %self.id, "process exited cleanly, not treating as a crash");
            return Ok(());
        }

        self.outlet
            .publish_console("---------- Detected server process in a crashed state! ----------");
        self.outlet
            .publish_console(&format!("Exit code: {}", exit.exit_code));
        self.outlet
            .publish_console(&format!("Out of memory: {}", exit.oom_killed));

        {
            let mut last = self.last_auto_restart.lock();
            let now = self.clock.now();
            if let Some(at) = *last {
                let since = now.saturating_duration_since(at);
                if since < self.crash_cooldown {
                    tracing::warn!(
                        server = %self.id,
                        since_secs = since.as_secs(),
                        "aborting automatic restart, last restart is inside the cooldown window"
                    );
                    self.outlet.publish_console(
                        "Aborting automatic restart, last crash occurred within the cooldown window.",
                    );
                    return Ok(());
                }
            }
            *last = Some(now);
        }

        tracing::info!(
            server = %self.id,
            exit_code = exit.exit_code,
            oom_killed = exit.oom_killed,
            "restarting server after unexpected exit"
        );
        self.start().await
    }
}

#[cfg(test)]
#[path = "crash_tests.rs"]
mod tests;
