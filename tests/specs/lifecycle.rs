// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Full lifecycle scenarios: boot, graceful stop, crash recovery and
//! restart serialization.

use roost_core::{topic, ServerState};
use roost_daemon::environment::ExitState;
use roost_daemon::test_support::{harness, minecraft_process, wait_for_state, FakeCall};
use roost_daemon::ServerError;
use std::time::Duration;

const COOLDOWN: Duration = Duration::from_secs(60);

#[tokio::test]
async fn clean_start_and_operator_stop() {
    let h = harness(minecraft_process(), true, COOLDOWN);
    let mut states = h.bus.subscribe(topic::STATE_CHANGE).unwrap();

    // power on
    h.server.start().await.unwrap();
    assert_eq!(states.recv().await.unwrap().payload, "starting");

    // the boot log completes startup
    h.environment
        .emit_console("Done (1.23s)! For help, type \"help\"");
    assert_eq!(states.recv().await.unwrap().payload, "running");

    // the server echoes the operator's stop command
    h.environment.emit_console("stop");
    assert_eq!(states.recv().await.unwrap().payload, "stopping");

    // the container exits
    h.environment.set_exit_state(ExitState {
        exit_code: 0,
        oom_killed: false,
    });
    h.environment.emit_exit();
    assert_eq!(states.recv().await.unwrap().payload, "offline");

    // crash detection stays quiet: the exit went through Stopping
    tokio::time::sleep(Duration::from_millis(50)).await;
    assert_eq!(h.environment.count(&FakeCall::ExitState), 0);
    assert_eq!(h.environment.count(&FakeCall::Start), 1);
    assert_eq!(h.server.state(), ServerState::Offline);
}

#[tokio::test]
async fn segfault_while_running_is_restarted() {
    let h = harness(minecraft_process(), true, COOLDOWN);

    h.server.start().await.unwrap();
    h.environment.emit_console("Done (0.8s)!");
    wait_for_state(&h.server, ServerState::Running).await;

    // no "stop" was ever observed; the process dies with SIGSEGV
    h.environment.set_exit_state(ExitState {
        exit_code: 139,
        oom_killed: false,
    });
    h.environment.emit_exit();

    // crash detection fires and boots the server again
    wait_for_state(&h.server, ServerState::Starting).await;
    assert_eq!(h.environment.count(&FakeCall::ExitState), 1);
    assert_eq!(h.environment.count(&FakeCall::Start), 2);
}

#[tokio::test]
async fn first_console_line_can_complete_startup() {
    let h = harness(minecraft_process(), true, COOLDOWN);
    h.server.start().await.unwrap();

    h.environment.emit_console("Done (0.1s)! For help, type \"help\"");

    wait_for_state(&h.server, ServerState::Running).await;
}

#[tokio::test]
async fn concurrent_restarts_run_exactly_one_cycle() {
    let h = harness(minecraft_process(), true, COOLDOWN);
    h.server.start().await.unwrap();
    h.environment.set_stop_delay(Duration::from_millis(50));

    let winner = {
        let server = h.server.clone();
        tokio::spawn(async move { server.restart().await })
    };
    tokio::time::sleep(Duration::from_millis(10)).await;

    // the loser fails fast instead of queueing a second cycle
    let loser = h.server.restart().await;
    assert!(matches!(loser, Err(ServerError::RestartInProgress)));

    winner.await.unwrap().unwrap();
    assert_eq!(
        h.environment.count(&FakeCall::WaitForStop { terminate: false }),
        1
    );
    assert_eq!(h.environment.count(&FakeCall::Start), 2);
}

#[tokio::test]
async fn subscribers_observe_only_legal_transitions() {
    let h = harness(minecraft_process(), true, COOLDOWN);
    let mut states = h.bus.subscribe(topic::STATE_CHANGE).unwrap();

    h.server.start().await.unwrap();
    h.environment.emit_console("Done (1.0s)!");
    h.environment.emit_console("stop");
    wait_for_state(&h.server, ServerState::Stopping).await;
    h.environment.emit_exit();
    wait_for_state(&h.server, ServerState::Offline).await;

    let mut prev = ServerState::Offline;
    while let Some(event) = states.try_recv() {
        let next: ServerState = event.payload.parse().unwrap();
        assert!(
            next.can_follow(prev),
            "illegal transition {prev} -> {next} observed"
        );
        prev = next;
    }
    assert_eq!(prev, ServerState::Offline);
}
