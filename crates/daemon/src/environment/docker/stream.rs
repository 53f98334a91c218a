// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Console plumbing: the attach stream and the log follower.
//!
//! Two cooperating pumps feed the `console output` topic. The attach
//! stream carries live stdout/stderr and owns the stdin half used by
//! `send_command`, but it misses boot output emitted before attachment;
//! the log follower tails the container log from "now" to fill that gap.
//! The two produce overlapping lines and no de-duplication is performed —
//! downstream consumers are expected to tolerate it.

use super::{with_deadline, DockerEnvironment};
use crate::environment::EnvironmentError;
use bollard::container::{AttachContainerOptions, LogOutput, LogsOptions};
use futures_util::{Stream, StreamExt};
use roost_core::ServerState;
use std::io::SeekFrom;
use std::sync::atomic::Ordering;
use std::sync::Arc;
use tokio::io::{AsyncReadExt, AsyncSeekExt, AsyncWriteExt};
use tokio_util::sync::CancellationToken;

impl DockerEnvironment {
    pub(super) async fn attach_environment(&self) -> Result<(), EnvironmentError> {
        if self.attached.swap(true, Ordering::SeqCst) {
            return Ok(());
        }

        let options = AttachContainerOptions::<String> {
            stdin: Some(true),
            stdout: Some(true),
            stderr: Some(true),
            stream: Some(true),
            logs: Some(false),
            ..Default::default()
        };
        let streams = match with_deadline(self.client.attach_container(&self.id, Some(options)))
            .await
        {
            Ok(streams) => streams,
            Err(err) => {
                self.attached.store(false, Ordering::SeqCst);
                return Err(err);
            }
        };

        *self.stdin.lock().await = Some(streams.input);

        let token = CancellationToken::new();
        *self.cancel.lock() = token.clone();
        let follower = self.spawn_log_follower(token.clone());
        let pump = self.spawn_attach_pump(streams.output, token);
        self.pumps.lock().extend([follower, pump]);
        Ok(())
    }

    /// Tail the container log from now on. The attach stream misses boot
    /// output written before the stream opened; this pump fills the gap.
    fn spawn_log_follower(&self, token: CancellationToken) -> tokio::task::JoinHandle<()> {
        let client = self.client.clone();
        let id = self.id.clone();
        let outlet = self.outlet.clone();
        let since = self.clock.epoch_secs();

        tokio::spawn(async move {
            let options = LogsOptions::<String> {
                follow: true,
                stdout: true,
                stderr: true,
                since,
                ..Default::default()
            };
            let mut logs = client.logs(&id, Some(options));
            let mut lines = LineBuffer::default();
            loop {
                tokio::select! {
                    _ = token.cancelled() => break,
                    chunk = logs.next() => match chunk {
                        Some(Ok(output)) => {
                            for line in lines.feed(&output.into_bytes()) {
                                outlet.publish_console(&line);
                            }
                        }
                        Some(Err(err)) => {
                            tracing::debug!(server = %id, error = %err, "log follower ended");
                            break;
                        }
                        None => break,
                    },
                }
            }
            for line in lines.flush() {
                outlet.publish_console(&line);
            }
        })
    }

    fn spawn_attach_pump<S>(&self, mut output: S, token: CancellationToken) -> tokio::task::JoinHandle<()>
    where
        S: Stream<Item = Result<LogOutput, bollard::errors::Error>> + Send + Unpin + 'static,
    {
        let id = self.id.clone();
        let outlet = self.outlet.clone();
        let stdin = Arc::clone(&self.stdin);
        let attached = Arc::clone(&self.attached);

        tokio::spawn(async move {
            let mut lines = LineBuffer::default();
            loop {
                tokio::select! {
                    _ = token.cancelled() => break,
                    chunk = output.next() => match chunk {
                        Some(Ok(output)) => {
                            for line in lines.feed(&output.into_bytes()) {
                                outlet.publish_console(&line);
                            }
                        }
                        Some(Err(err)) => {
                            tracing::debug!(server = %id, error = %err, "attach stream failed");
                            break;
                        }
                        None => break,
                    },
                }
            }
            for line in lines.flush() {
                outlet.publish_console(&line);
            }
            // The stream is gone: clear the handle, mark the process
            // offline and take the log follower down with us.
            attached.store(false, Ordering::SeqCst);
            stdin.lock().await.take();
            outlet.set_state(ServerState::Offline);
            token.cancel();
        })
    }

    pub(super) async fn send_command_environment(
        &self,
        command: &str,
    ) -> Result<(), EnvironmentError> {
        let mut stdin = self.stdin.lock().await;
        let Some(writer) = stdin.as_mut() else {
            return Err(EnvironmentError::NotAttached);
        };
        writer.write_all(format!("{command}\n").as_bytes()).await?;
        writer.flush().await?;
        Ok(())
    }

    /// Read the last `bytes` bytes of the container's tail log, split
    /// into raw log-driver lines.
    pub(super) async fn read_log_environment(
        &self,
        bytes: u64,
    ) -> Result<Vec<String>, EnvironmentError> {
        let inspect = self.inspect().await?;
        let Some(path) = inspect.log_path.filter(|p| !p.is_empty()) else {
            return Ok(Vec::new());
        };

        let mut file = tokio::fs::File::open(&path).await?;
        let len = file.metadata().await?.len();
        file.seek(SeekFrom::Start(len.saturating_sub(bytes))).await?;
        let mut raw = Vec::new();
        file.read_to_end(&mut raw).await?;

        Ok(String::from_utf8_lossy(&raw)
            .lines()
            .map(str::to_string)
            .collect())
    }
}

/// Reassembles console lines from arbitrarily chunked stream output.
#[derive(Default)]
pub(super) struct LineBuffer {
    partial: Vec<u8>,
}

impl LineBuffer {
    /// Feed a chunk, returning every completed line (CR/LF stripped).
    pub(super) fn feed(&mut self, chunk: &[u8]) -> Vec<String> {
        self.partial.extend_from_slice(chunk);
        let mut lines = Vec::new();
        while let Some(pos) = self.partial.iter().position(|&b| b == b'\n') {
            let mut line: Vec<u8> = self.partial.drain(..=pos).collect();
            line.pop();
            if line.last() == Some(&b'\r') {
                line.pop();
            }
            lines.push(String::from_utf8_lossy(&line).into_owned());
        }
        lines
    }

    /// Emit any trailing partial line.
    pub(super) fn flush(&mut self) -> Vec<String> {
        if self.partial.is_empty() {
            return Vec::new();
        }
        let line = String::from_utf8_lossy(&self.partial).into_owned();
        self.partial.clear();
        vec![line]
    }
}

#[cfg(test)]
#[path = "stream_tests.rs"]
mod tests;
