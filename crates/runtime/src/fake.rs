// SPDX-License-Identifier: MIT

//! Scripted in-memory runtime for tests.
//!
//! Streams, exits, CPU counters, and signal deliveries are all scripted up
//! front, so timing scenarios run deterministically under
//! `#[tokio::test(start_paused = true)]`.

use crate::{ContainerRuntime, ExecOutput, RuntimeError, Signal, StreamEvent};
use async_trait::async_trait;
use parking_lot::Mutex;
use std::collections::VecDeque;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;

/// One scripted event on a streamed execution.
#[derive(Debug, Clone)]
pub struct StreamStep {
    /// Delay before this event fires, relative to the previous one.
    pub delay: Duration,
    pub event: StreamEvent,
}

impl StreamStep {
    pub fn chunk(delay: Duration, text: impl Into<String>) -> Self {
        Self { delay, event: StreamEvent::Chunk(text.into()) }
    }

    pub fn exited(delay: Duration, code: Option<i32>) -> Self {
        Self { delay, event: StreamEvent::Exited(code) }
    }
}

#[derive(Default)]
struct Inner {
    streams: VecDeque<Vec<StreamStep>>,
    exec_results: VecDeque<(Duration, ExecOutput)>,
    cpu_readings: VecDeque<u64>,
    last_cpu: u64,
    signals: Vec<(Vec<String>, Signal)>,
    commands: Vec<String>,
}

/// Scripted [`ContainerRuntime`] double.
#[derive(Clone, Default)]
pub struct FakeRuntime {
    inner: Arc<Mutex<Inner>>,
}

impl FakeRuntime {
    pub fn new() -> Self {
        Self::default()
    }

    /// Queue the event script for the next `exec_streamed` call.
    ///
    /// A script that runs out without an `Exited` closes the stream; to
    /// model a hung process, script an exit far beyond the timeout under
    /// test.
    pub fn script_stream(&self, steps: Vec<StreamStep>) {
        self.inner.lock().streams.push_back(steps);
    }

    /// Queue the result of the next `exec` call.
    pub fn script_exec(&self, exit_code: Option<i32>, output: impl Into<String>) {
        self.script_exec_after(Duration::ZERO, exit_code, output);
    }

    /// Queue the result of the next `exec` call, delivered after `delay`.
    pub fn script_exec_after(
        &self,
        delay: Duration,
        exit_code: Option<i32>,
        output: impl Into<String>,
    ) {
        self.inner
            .lock()
            .exec_results
            .push_back((delay, ExecOutput { exit_code, output: output.into() }));
    }

    /// Queue one CPU counter reading; the last queued value repeats once the
    /// queue drains.
    pub fn script_cpu(&self, ns: u64) {
        self.inner.lock().cpu_readings.push_back(ns);
    }

    /// Signals delivered so far, in order.
    pub fn signals(&self) -> Vec<(Vec<String>, Signal)> {
        self.inner.lock().signals.clone()
    }

    /// Every command handed to `exec` or `exec_streamed`, in order.
    pub fn commands(&self) -> Vec<String> {
        self.inner.lock().commands.clone()
    }
}

#[async_trait]
impl ContainerRuntime for FakeRuntime {
    async fn exec(&self, command: &str, workdir: Option<&str>) -> Result<ExecOutput, RuntimeError> {
        let (delay, result) = {
            let mut inner = self.inner.lock();
            let recorded = match workdir {
                Some(dir) => format!("cd {dir} && {command}"),
                None => command.to_string(),
            };
            inner.commands.push(recorded);
            inner
                .exec_results
                .pop_front()
                .ok_or_else(|| RuntimeError::Unscripted(command.to_string()))?
        };
        if !delay.is_zero() {
            tokio::time::sleep(delay).await;
        }
        Ok(result)
    }

    async fn exec_streamed(
        &self,
        command: &str,
        workdir: Option<&str>,
    ) -> Result<mpsc::Receiver<StreamEvent>, RuntimeError> {
        let steps = {
            let mut inner = self.inner.lock();
            let recorded = match workdir {
                Some(dir) => format!("cd {dir} && {command}"),
                None => command.to_string(),
            };
            inner.commands.push(recorded);
            inner
                .streams
                .pop_front()
                .ok_or_else(|| RuntimeError::Unscripted(command.to_string()))?
        };

        let (tx, rx) = mpsc::channel(64);
        tokio::spawn(async move {
            for step in steps {
                tokio::time::sleep(step.delay).await;
                if tx.send(step.event).await.is_err() {
                    return;
                }
            }
        });
        Ok(rx)
    }

    async fn cpu_usage_ns(&self) -> Result<u64, RuntimeError> {
        let mut inner = self.inner.lock();
        if let Some(next) = inner.cpu_readings.pop_front() {
            inner.last_cpu = next;
        }
        Ok(inner.last_cpu)
    }

    async fn signal(&self, process_names: &[String], signal: Signal) -> Result<(), RuntimeError> {
        self.inner.lock().signals.push((process_names.to_vec(), signal));
        Ok(())
    }
}

#[cfg(test)]
#[path = "fake_tests.rs"]
mod tests;
