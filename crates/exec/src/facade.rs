// SPDX-License-Identifier: MIT

//! The execution facade: single entry point for running commands.
//!
//! Short commands take a one-shot path bounded only by the absolute
//! timeout; tool-classified long-running commands take the monitored path.
//! Oversized output is archived before truncation, so every reference the
//! caller receives is guaranteed resolvable. Build and test commands are
//! recorded in the ledger as a side effect.

use crate::executor::MonitoredExecutor;
use crate::ExecError;
use parking_lot::Mutex;
use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info};
use vouch_archive::{truncate_with_reference, OutputArchive};
use vouch_core::{
    epoch_ms, CommandInvocation, ExecutionResult, FabricConfig, TerminationReason, TimeoutPolicy,
    ToolKind,
};
use vouch_ledger::CommandLedger;
use vouch_runtime::ContainerRuntime;

const DEFAULT_WORKDIR: &str = "/workspace";

/// Bounded result handed back to callers.
#[derive(Debug, Clone)]
pub struct FacadeResult {
    pub result: ExecutionResult,
    /// Set when the full output was archived and the inline output is a
    /// truncation with an embedded reference.
    pub archive_ref: Option<String>,
}

/// Facade over the executor, archive, and ledger.
pub struct ExecutionFacade {
    runtime: Arc<dyn ContainerRuntime>,
    executor: MonitoredExecutor,
    archive: Mutex<OutputArchive>,
    ledger: Mutex<CommandLedger>,
    config: FabricConfig,
    task_id: String,
}

impl ExecutionFacade {
    /// Construct a facade for one session. Opens (or creates) the archive
    /// under the configured state directory.
    pub fn new(
        runtime: Arc<dyn ContainerRuntime>,
        config: FabricConfig,
        task_id: impl Into<String>,
    ) -> Result<Self, ExecError> {
        let task_id = task_id.into();
        let archive = OutputArchive::open(&config.state_dir)?;
        let executor = MonitoredExecutor::new(runtime.clone(), &config);
        Ok(Self {
            runtime,
            executor,
            archive: Mutex::new(archive),
            ledger: Mutex::new(CommandLedger::new(task_id.clone())),
            config,
            task_id,
        })
    }

    /// Run a command, routing long-running tool invocations to the
    /// monitored path and everything else to the one-shot path, with
    /// per-tool default timeouts.
    pub async fn run(
        &self,
        command: &str,
        workdir: Option<&str>,
    ) -> Result<FacadeResult, ExecError> {
        let invocation =
            CommandInvocation::new(command, workdir.map(str::to_string), epoch_ms());
        if invocation.tool.is_long_running(command) {
            debug!(id = %invocation.id, tool = %invocation.tool, "routing to monitored path");
            self.execute_monitored(
                command,
                workdir,
                invocation.policy.silent,
                invocation.policy.absolute,
            )
            .await
        } else {
            debug!(id = %invocation.id, "routing to one-shot path");
            self.execute(command, workdir, Some(invocation.policy.absolute)).await
        }
    }

    /// One-shot execution bounded only by an absolute timeout.
    pub async fn execute(
        &self,
        command: &str,
        workdir: Option<&str>,
        timeout: Option<Duration>,
    ) -> Result<FacadeResult, ExecError> {
        let bound = timeout.unwrap_or(TimeoutPolicy::DEFAULT.absolute);
        let result = match tokio::time::timeout(bound, self.runtime.exec(command, workdir)).await
        {
            Ok(Ok(out)) => ExecutionResult::completed(out.exit_code, out.output),
            Ok(Err(err)) => ExecutionResult::terminated(
                TerminationReason::Exception,
                format!("command failed to execute: {err}"),
            ),
            Err(_) => ExecutionResult::terminated(
                TerminationReason::AbsoluteTimeout,
                String::new(),
            ),
        };
        self.finish(command, workdir, result)
    }

    /// Monitored execution under explicit dual timeouts.
    pub async fn execute_monitored(
        &self,
        command: &str,
        workdir: Option<&str>,
        silent: Duration,
        absolute: Duration,
    ) -> Result<FacadeResult, ExecError> {
        let policy = TimeoutPolicy::new(silent, absolute);
        let result = self.executor.run(command, workdir, policy).await;
        self.finish(command, workdir, result)
    }

    /// Shared post-processing: archive-then-truncate, then ledger recording.
    fn finish(
        &self,
        command: &str,
        workdir: Option<&str>,
        mut result: ExecutionResult,
    ) -> Result<FacadeResult, ExecError> {
        let tool = ToolKind::classify(command);
        let workdir = workdir.unwrap_or(DEFAULT_WORKDIR);

        // Ledger sees the full output, not the truncation
        match ledger_kind(tool, command) {
            Some(LedgerKind::Test) => {
                self.ledger.lock().record_test(
                    command,
                    tool,
                    workdir,
                    result.exit_code,
                    &result.output,
                );
            }
            Some(LedgerKind::Build) => {
                self.ledger.lock().record_build(
                    command,
                    tool,
                    workdir,
                    result.exit_code,
                    &result.output,
                );
            }
            None => {}
        }

        let mut archive_ref = None;
        if result.output.chars().count() > self.config.truncation_threshold {
            let mut metadata = BTreeMap::new();
            metadata.insert("command".to_string(), serde_json::json!(command));
            metadata.insert(
                "termination_reason".to_string(),
                serde_json::json!(result.termination_reason.as_str()),
            );
            // Store first: the reference must resolve before anyone sees it
            let ref_id = self.archive.lock().store(
                &self.task_id,
                tool.as_str(),
                &result.output,
                metadata,
            )?;
            result.output = truncate_with_reference(
                &result.output,
                &ref_id,
                self.config.truncation_max_len,
            );
            info!(ref_id = %ref_id, "output archived and truncated");
            archive_ref = Some(ref_id);
        }

        Ok(FacadeResult { result, archive_ref })
    }

    /// Replay the last recorded build against the current container.
    pub async fn replay_last_build(
        &self,
    ) -> Result<vouch_ledger::ReplayOutcome, ExecError> {
        let ledger = self.snapshot_ledger();
        Ok(ledger.replay_last_build(self.runtime.as_ref()).await?)
    }

    /// Replay every recorded test command and aggregate fresh statistics.
    pub async fn replay_all_tests(
        &self,
    ) -> Result<vouch_ledger::TestReplaySummary, ExecError> {
        let ledger = self.snapshot_ledger();
        Ok(ledger.replay_all_tests(self.runtime.as_ref()).await?)
    }

    /// Retrieve an archived output by reference.
    pub fn retrieve(&self, ref_id: &str) -> Result<Option<String>, ExecError> {
        Ok(self.archive.lock().retrieve(ref_id)?)
    }

    /// Search archived outputs.
    pub fn search(
        &self,
        pattern: Option<&str>,
        task_id: Option<&str>,
        tool: Option<&str>,
        limit: usize,
    ) -> Result<Vec<vouch_archive::SearchHit>, ExecError> {
        Ok(self.archive.lock().search(pattern, task_id, tool, limit)?)
    }

    /// Save the ledger document for later analysis.
    pub fn save_ledger(&self, path: &std::path::Path) -> Result<(), ExecError> {
        Ok(self.ledger.lock().save_to_file(path)?)
    }

    /// Run a closure against the ledger (read-only access for callers).
    pub fn with_ledger<T>(&self, f: impl FnOnce(&CommandLedger) -> T) -> T {
        f(&self.ledger.lock())
    }

    // Replay runs arbitrary commands and must not hold the ledger lock
    // across awaits; it works on a snapshot instead.
    fn snapshot_ledger(&self) -> CommandLedger {
        self.ledger.lock().clone()
    }
}

enum LedgerKind {
    Build,
    Test,
}

/// Which ledger a command belongs in, if any. Test-flavored invocations win
/// over build-flavored ones.
fn ledger_kind(tool: ToolKind, command: &str) -> Option<LedgerKind> {
    let lower = command.to_ascii_lowercase();
    let testish = lower.contains("test") || lower.contains("verify") || lower.contains("pytest");
    match tool {
        ToolKind::Maven | ToolKind::Gradle => {
            Some(if testish { LedgerKind::Test } else { LedgerKind::Build })
        }
        ToolKind::Npm | ToolKind::Python | ToolKind::Make => {
            if testish {
                Some(LedgerKind::Test)
            } else if ["install", "build", "compile", "package"].iter().any(|v| lower.contains(v))
            {
                Some(LedgerKind::Build)
            } else {
                None
            }
        }
        ToolKind::Shell => None,
    }
}

#[cfg(test)]
#[path = "facade_tests.rs"]
mod tests;
