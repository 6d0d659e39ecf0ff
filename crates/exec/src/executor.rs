// SPDX-License-Identifier: MIT

//! The monitored executor: streaming execution under dual timeout clocks.

use crate::monitor::{run_hang_detector, MonitorState};
use crate::prepare::prepare_command;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::time::Instant;
use tracing::{info, info_span, warn, Instrument};
use vouch_core::{ExecutionResult, FabricConfig, TerminationReason, TimeoutPolicy, ToolKind};
use vouch_runtime::{ContainerRuntime, Signal, StreamEvent};

/// How long to wait for an exit event after the kill-signal.
const KILL_WAIT: Duration = Duration::from_secs(5);

/// Runs commands in the container under monitoring.
pub struct MonitoredExecutor {
    runtime: Arc<dyn ContainerRuntime>,
    grace_period: Duration,
    hang_sample_divisor: u32,
    low_cpu_threshold: f64,
    hang_warning_count: u32,
}

impl MonitoredExecutor {
    pub fn new(runtime: Arc<dyn ContainerRuntime>, config: &FabricConfig) -> Self {
        Self {
            runtime,
            grace_period: config.grace_period(),
            hang_sample_divisor: config.hang_sample_divisor.max(1),
            low_cpu_threshold: config.low_cpu_threshold,
            hang_warning_count: config.hang_warning_count,
        }
    }

    /// Run a command under both timeout clocks and hang detection.
    ///
    /// Always produces a terminal result: timeouts come back as
    /// `success=false` with the breaching clock recorded, and streaming or
    /// transport failures as `reason=exception` with the raw error text
    /// preserved. This method never retries.
    pub async fn run(
        &self,
        command: &str,
        workdir: Option<&str>,
        policy: TimeoutPolicy,
    ) -> ExecutionResult {
        let tool = ToolKind::classify(command);
        let prepared = prepare_command(command, tool, policy.absolute);
        let span = info_span!("monitored_exec", tool = %tool, silent_s = policy.silent.as_secs(), absolute_s = policy.absolute.as_secs());
        self.run_prepared(&prepared, workdir, policy).instrument(span).await
    }

    async fn run_prepared(
        &self,
        command: &str,
        workdir: Option<&str>,
        policy: TimeoutPolicy,
    ) -> ExecutionResult {
        info!(command, "starting monitored execution");

        let mut rx = match self.runtime.exec_streamed(command, workdir).await {
            Ok(rx) => rx,
            Err(err) => {
                warn!(error = %err, "failed to start streamed execution");
                return ExecutionResult::terminated(
                    TerminationReason::Exception,
                    format!("failed to start command: {err}"),
                );
            }
        };

        let state = Arc::new(MonitorState::new());
        let detector = tokio::spawn(run_hang_detector(
            self.runtime.clone(),
            state.clone(),
            policy.silent / self.hang_sample_divisor,
            self.low_cpu_threshold,
            self.hang_warning_count,
        ));

        let deadline = Instant::now() + policy.absolute;
        let mut output = String::new();
        let mut exited: Option<Option<i32>> = None;

        let reason = loop {
            let remaining = deadline.saturating_duration_since(Instant::now());
            if remaining.is_zero() {
                break Some(TerminationReason::AbsoluteTimeout);
            }
            // The silent clock restarts at every chunk; the absolute clock
            // never does.
            let wait = remaining.min(policy.silent);
            match tokio::time::timeout(wait, rx.recv()).await {
                Ok(Some(StreamEvent::Chunk(chunk))) => {
                    output.push_str(&chunk);
                    state.record_output();
                }
                Ok(Some(StreamEvent::Exited(code))) => {
                    exited = Some(code);
                    break None;
                }
                Ok(None) => {
                    // Stream dropped without an exit event
                    break Some(TerminationReason::Exception);
                }
                Err(_) => {
                    break Some(if remaining <= policy.silent {
                        TerminationReason::AbsoluteTimeout
                    } else {
                        TerminationReason::SilentTimeout
                    });
                }
            }
        };

        state.mark_terminated();
        detector.abort();

        let result = match reason {
            None => {
                let code = exited.unwrap_or(None);
                info!(exit_code = ?code, chars = output.chars().count(), "command completed");
                ExecutionResult::completed(code, output)
            }
            Some(TerminationReason::Exception) => {
                warn!("output stream ended without an exit event");
                output.push_str("\n[stream ended unexpectedly]");
                ExecutionResult::terminated(TerminationReason::Exception, output)
            }
            Some(reason) => {
                warn!(reason = reason.as_str(), "timeout breached, terminating");
                self.terminate(command, &mut rx, &mut output).await;
                ExecutionResult::terminated(reason, output)
            }
        };

        if state.hang_warnings() > 0 {
            info!(hang_warnings = state.hang_warnings(), "hang warnings were raised during execution");
        }
        result.with_samples(state.take_samples())
    }

    /// Two-stage termination: TERM to the invocation's process names, a
    /// fixed grace wait (skipped early when an exit is observed), then KILL.
    /// Best-effort throughout; signal failures are logged, never raised,
    /// because a terminal result must always come back.
    async fn terminate(
        &self,
        command: &str,
        rx: &mut mpsc::Receiver<StreamEvent>,
        output: &mut String,
    ) {
        let names = process_names(command);
        if let Err(err) = self.runtime.signal(&names, Signal::Term).await {
            warn!(error = %err, "grace signal failed");
        }
        if self.drain_until_exit(rx, output, self.grace_period).await {
            return;
        }

        warn!("grace period expired, force-killing");
        if let Err(err) = self.runtime.signal(&names, Signal::Kill).await {
            warn!(error = %err, "kill signal failed");
        }
        self.drain_until_exit(rx, output, KILL_WAIT).await;
    }

    /// Collect late chunks until an exit event or the deadline. Returns
    /// whether the process was observed exiting.
    async fn drain_until_exit(
        &self,
        rx: &mut mpsc::Receiver<StreamEvent>,
        output: &mut String,
        window: Duration,
    ) -> bool {
        let deadline = Instant::now() + window;
        loop {
            let remaining = deadline.saturating_duration_since(Instant::now());
            if remaining.is_zero() {
                return false;
            }
            match tokio::time::timeout(remaining, rx.recv()).await {
                Ok(Some(StreamEvent::Chunk(chunk))) => output.push_str(&chunk),
                Ok(Some(StreamEvent::Exited(_))) => return true,
                Ok(None) | Err(_) => return false,
            }
        }
    }
}

/// Process names to signal for a command, from its tool family plus the
/// leading token. Name-based signaling can hit unrelated same-named
/// processes in the container; acceptable for a single-tenant build
/// container.
fn process_names(command: &str) -> Vec<String> {
    let mut names: Vec<String> = match ToolKind::classify(command) {
        ToolKind::Maven => vec!["java".into(), "mvn".into()],
        ToolKind::Gradle => vec!["java".into(), "gradle".into()],
        ToolKind::Npm => vec!["node".into(), "npm".into()],
        ToolKind::Python => vec!["python".into(), "pytest".into()],
        ToolKind::Make => vec!["make".into(), "cc".into()],
        ToolKind::Shell => Vec::new(),
    };
    if let Some(first) = command.split_whitespace().next() {
        let base = first.rsplit('/').next().unwrap_or(first).to_string();
        if !names.contains(&base) && base != "cd" {
            names.push(base);
        }
    }
    names
}

#[cfg(test)]
#[path = "executor_tests.rs"]
mod tests;
