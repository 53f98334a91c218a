// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Shared test helpers: a scriptable fake process environment and a
//! harness that assembles a server around it.
//!
//! Gated behind `#[cfg(any(test, feature = "test-support"))]`.

#![allow(clippy::expect_used)]
#![allow(clippy::unwrap_used)]
#![allow(clippy::panic)]

use crate::environment::{
    EnvironmentConfig, EnvironmentError, ExitState, Outlet, ProcessEnvironment, StateCell,
};
use crate::event_bus::EventBus;
use crate::filesystem::Filesystem;
use crate::server::{Server, ServerParts};
use async_trait::async_trait;
use parking_lot::Mutex;
use roost_core::{
    Clock, FakeClock, ProcessConfiguration, ServerConfiguration, ServerState, StopConfiguration,
    StopType,
};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use uuid::Uuid;

/// A recorded call on the fake environment.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FakeCall {
    Create,
    OnBeforeStart,
    Start,
    Stop,
    WaitForStop { terminate: bool },
    Terminate(String),
    InSituUpdate,
    SendCommand(String),
    ExitState,
    Attach,
    Destroy,
}

/// Scriptable in-memory [`ProcessEnvironment`].
///
/// Mirrors the state discipline of the real backing: `start` moves an
/// Offline server to Starting, `terminate` runs Stopping then Offline,
/// and the test drives console output and process exits explicitly.
pub struct FakeEnvironment {
    outlet: Outlet,
    stop: StopConfiguration,
    calls: Mutex<Vec<FakeCall>>,
    exit_state: Mutex<ExitState>,
    running: AtomicBool,
    attached: AtomicBool,
    /// Artificial latency inside `wait_for_stop`, to widen race windows.
    stop_delay: Mutex<Duration>,
}

impl FakeEnvironment {
    pub fn new(outlet: Outlet, stop: StopConfiguration) -> Arc<Self> {
        Arc::new(Self {
            outlet,
            stop,
            calls: Mutex::new(Vec::new()),
            exit_state: Mutex::new(ExitState::default()),
            running: AtomicBool::new(false),
            attached: AtomicBool::new(false),
            stop_delay: Mutex::new(Duration::from_millis(0)),
        })
    }

    fn record(&self, call: FakeCall) {
        self.calls.lock().push(call);
    }

    pub fn calls(&self) -> Vec<FakeCall> {
        self.calls.lock().clone()
    }

    pub fn count(&self, call: &FakeCall) -> usize {
        self.calls.lock().iter().filter(|c| *c == call).count()
    }

    /// Script the exit information reported after the next process exit.
    pub fn set_exit_state(&self, exit: ExitState) {
        *self.exit_state.lock() = exit;
    }

    pub fn set_stop_delay(&self, delay: Duration) {
        *self.stop_delay.lock() = delay;
    }

    /// Emit one console line, as the attach pump would.
    pub fn emit_console(&self, line: &str) {
        self.outlet.publish_console(line);
    }

    /// Simulate the container process exiting underneath the daemon.
    pub fn emit_exit(&self) {
        self.running.store(false, Ordering::SeqCst);
        self.attached.store(false, Ordering::SeqCst);
        self.outlet.set_state(ServerState::Offline);
    }
}

#[async_trait]
impl ProcessEnvironment for FakeEnvironment {
    async fn exists(&self) -> Result<bool, EnvironmentError> {
        Ok(true)
    }

    async fn is_running(&self) -> Result<bool, EnvironmentError> {
        Ok(self.running.load(Ordering::SeqCst))
    }

    async fn create(&self) -> Result<(), EnvironmentError> {
        self.record(FakeCall::Create);
        Ok(())
    }

    async fn on_before_start(&self) -> Result<(), EnvironmentError> {
        self.record(FakeCall::OnBeforeStart);
        Ok(())
    }

    async fn start(&self) -> Result<(), EnvironmentError> {
        self.record(FakeCall::Start);
        if self.outlet.state() != ServerState::Offline {
            return Ok(());
        }
        self.outlet.set_state(ServerState::Starting);
        self.running.store(true, Ordering::SeqCst);
        self.attached.store(true, Ordering::SeqCst);
        Ok(())
    }

    async fn stop(&self) -> Result<(), EnvironmentError> {
        self.record(FakeCall::Stop);
        if self.outlet.state() == ServerState::Offline {
            return Ok(());
        }
        if self.stop.kind == StopType::Command && self.attached.load(Ordering::SeqCst) {
            // the echo of the stop command moves the interpreter along
            self.outlet.publish_console(&self.stop.value);
            return Ok(());
        }
        self.outlet.set_state(ServerState::Stopping);
        Ok(())
    }

    async fn wait_for_stop(
        &self,
        _timeout: Duration,
        terminate: bool,
    ) -> Result<(), EnvironmentError> {
        self.record(FakeCall::WaitForStop { terminate });
        let delay = *self.stop_delay.lock();
        if !delay.is_zero() {
            tokio::time::sleep(delay).await;
        }
        if self.outlet.state() != ServerState::Offline {
            self.outlet.set_state(ServerState::Stopping);
            self.outlet.set_state(ServerState::Offline);
        }
        self.running.store(false, Ordering::SeqCst);
        Ok(())
    }

    async fn terminate(&self, signal: &str) -> Result<(), EnvironmentError> {
        self.record(FakeCall::Terminate(signal.to_string()));
        if !self.running.swap(false, Ordering::SeqCst) {
            return Ok(());
        }
        self.outlet.set_state(ServerState::Stopping);
        self.outlet.set_state(ServerState::Offline);
        Ok(())
    }

    async fn in_situ_update(&self) -> Result<(), EnvironmentError> {
        self.record(FakeCall::InSituUpdate);
        Ok(())
    }

    async fn send_command(&self, command: &str) -> Result<(), EnvironmentError> {
        if !self.attached.load(Ordering::SeqCst) {
            return Err(EnvironmentError::NotAttached);
        }
        self.record(FakeCall::SendCommand(command.to_string()));
        Ok(())
    }

    async fn read_log(&self, _bytes: u64) -> Result<Vec<String>, EnvironmentError> {
        Ok(Vec::new())
    }

    async fn exit_state(&self) -> Result<ExitState, EnvironmentError> {
        self.record(FakeCall::ExitState);
        Ok(*self.exit_state.lock())
    }

    async fn attach(&self) -> Result<(), EnvironmentError> {
        self.record(FakeCall::Attach);
        self.attached.store(true, Ordering::SeqCst);
        Ok(())
    }

    async fn destroy(&self) -> Result<(), EnvironmentError> {
        self.record(FakeCall::Destroy);
        self.running.store(false, Ordering::SeqCst);
        if self.outlet.state() != ServerState::Offline {
            self.outlet.set_state(ServerState::Stopping);
        }
        self.outlet.set_state(ServerState::Offline);
        Ok(())
    }

    fn update_configuration(&self, _config: EnvironmentConfig) {}

    fn stop_configuration(&self) -> StopConfiguration {
        self.stop.clone()
    }
}

/// A server assembled around a [`FakeEnvironment`] and a temp data root.
pub struct TestHarness {
    pub server: Arc<Server>,
    pub environment: Arc<FakeEnvironment>,
    pub bus: EventBus,
    pub clock: Arc<FakeClock>,
    _data: tempfile::TempDir,
}

/// Build a harness with the given process configuration.
pub fn harness(
    process: ProcessConfiguration,
    crash_detection: bool,
    crash_cooldown: Duration,
) -> TestHarness {
    let data = tempfile::TempDir::new().expect("temp data root");
    let filesystem = Arc::new(
        Filesystem::new(data.path().join("data"), 0, Duration::from_secs(60))
            .expect("filesystem guard"),
    );

    let bus = EventBus::new();
    let outlet = Outlet::new(Arc::new(StateCell::default()), bus.clone());
    let clock = Arc::new(FakeClock::new());
    let environment = FakeEnvironment::new(outlet.clone(), process.stop.clone());

    let uuid = Uuid::new_v4();
    let config = ServerConfiguration {
        uuid,
        crash_detection_enabled: crash_detection,
        ..Default::default()
    };

    let environment_dyn: Arc<dyn ProcessEnvironment> = environment.clone();
    let clock_dyn: Arc<dyn Clock> = clock.clone();
    let server = Server::assemble(ServerParts {
        id: uuid,
        config,
        process,
        bus: bus.clone(),
        outlet,
        environment: environment_dyn,
        filesystem,
        remote: None,
        clock: clock_dyn,
        crash_cooldown,
    });

    TestHarness {
        server,
        environment,
        bus,
        clock,
        _data: data,
    }
}

/// Process configuration matching a typical Minecraft-style server: a
/// `Done (` prefix done pattern and a `stop` console command.
pub fn minecraft_process() -> ProcessConfiguration {
    serde_json::from_str(
        r#"{
            "startup": { "done": ["Done ("], "strip_ansi": true },
            "stop": { "type": "command", "value": "stop" }
        }"#,
    )
    .expect("static process configuration")
}

/// Wait until the server reaches `state` or the deadline lapses.
pub async fn wait_for_state(server: &Server, state: ServerState) {
    let deadline = std::time::Instant::now() + Duration::from_secs(2);
    while server.state() != state {
        if std::time::Instant::now() > deadline {
            panic!(
                "server never reached {state}, still {current}",
                current = server.state()
            );
        }
        tokio::time::sleep(Duration::from_millis(5)).await;
    }
}
