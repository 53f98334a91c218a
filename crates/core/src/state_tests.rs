// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;
use yare::parameterized;

#[test]
fn default_state_is_offline() {
    assert_eq!(ServerState::default(), ServerState::Offline);
}

#[parameterized(
    offline = { ServerState::Offline, "offline" },
    starting = { ServerState::Starting, "starting" },
    running = { ServerState::Running, "running" },
    stopping = { ServerState::Stopping, "stopping" },
)]
fn display_round_trips_through_parse(state: ServerState, name: &str) {
    assert_eq!(state.to_string(), name);
    assert_eq!(name.parse::<ServerState>().unwrap(), state);
}

#[test]
fn parse_rejects_unknown_names() {
    let err = "paused".parse::<ServerState>().unwrap_err();
    assert_eq!(err, UnknownState("paused".to_string()));
}

#[test]
fn serde_uses_lowercase_names() {
    let json = serde_json::to_string(&ServerState::Starting).unwrap();
    assert_eq!(json, "\"starting\"");
    let back: ServerState = serde_json::from_str("\"stopping\"").unwrap();
    assert_eq!(back, ServerState::Stopping);
}

#[parameterized(
    boot = { ServerState::Offline, ServerState::Starting },
    booted = { ServerState::Starting, ServerState::Running },
    start_aborted = { ServerState::Starting, ServerState::Stopping },
    start_died = { ServerState::Starting, ServerState::Offline },
    graceful = { ServerState::Running, ServerState::Stopping },
    crashed = { ServerState::Running, ServerState::Offline },
    stopped = { ServerState::Stopping, ServerState::Offline },
)]
fn lifecycle_edges_are_legal(prev: ServerState, next: ServerState) {
    assert!(next.can_follow(prev));
}

#[parameterized(
    skip_boot = { ServerState::Offline, ServerState::Running },
    stop_from_nowhere = { ServerState::Offline, ServerState::Stopping },
    resurrect = { ServerState::Stopping, ServerState::Running },
    restart_mid_stop = { ServerState::Stopping, ServerState::Starting },
    backwards = { ServerState::Running, ServerState::Starting },
)]
fn illegal_edges_are_rejected(prev: ServerState, next: ServerState) {
    assert!(!next.can_follow(prev));
}

#[test]
fn self_transitions_are_not_edges() {
    for state in [
        ServerState::Offline,
        ServerState::Starting,
        ServerState::Running,
        ServerState::Stopping,
    ] {
        assert!(!state.can_follow(state));
    }
}
