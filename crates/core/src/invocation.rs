// SPDX-License-Identifier: MIT

//! Command invocations and their terminal results.

use crate::policy::TimeoutPolicy;
use crate::tool::ToolKind;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Unique id for one accepted command invocation.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct InvocationId(String);

impl InvocationId {
    pub fn generate() -> Self {
        Self(Uuid::new_v4().to_string())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for InvocationId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One accepted request to run a command. Immutable once started.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CommandInvocation {
    pub id: InvocationId,
    pub command: String,
    pub tool: ToolKind,
    pub workdir: Option<String>,
    /// Epoch milliseconds at acceptance.
    pub started_at_ms: u64,
    pub policy: TimeoutPolicy,
}

impl CommandInvocation {
    pub fn new(command: impl Into<String>, workdir: Option<String>, started_at_ms: u64) -> Self {
        let command = command.into();
        let tool = ToolKind::classify(&command);
        let policy = TimeoutPolicy::for_command(&command);
        Self { id: InvocationId::generate(), command, tool, workdir, started_at_ms, policy }
    }

    pub fn with_policy(mut self, policy: TimeoutPolicy) -> Self {
        self.policy = policy;
        self
    }
}

/// Why a monitored command stopped before (or instead of) exiting on its own.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TerminationReason {
    /// Ran to completion; exit code is authoritative for liveness.
    None,
    /// No output for longer than the silent timeout.
    SilentTimeout,
    /// Total runtime exceeded the absolute timeout.
    AbsoluteTimeout,
    /// Streaming or runtime transport failure; raw error preserved in output.
    Exception,
}

impl TerminationReason {
    pub fn as_str(self) -> &'static str {
        match self {
            TerminationReason::None => "none",
            TerminationReason::SilentTimeout => "silent_timeout",
            TerminationReason::AbsoluteTimeout => "absolute_timeout",
            TerminationReason::Exception => "exception",
        }
    }
}

/// One delta-based CPU utilization sample taken while a command ran.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ResourceSample {
    /// Milliseconds since the invocation started.
    pub at_ms: u64,
    /// CPU utilization over the sampling interval, 0.0..=1.0 per core.
    pub cpu_utilization: f64,
}

/// Terminal outcome of one invocation. Produced exactly once.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExecutionResult {
    pub exit_code: Option<i32>,
    pub success: bool,
    pub output: String,
    pub termination_reason: TerminationReason,
    pub resource_samples: Vec<ResourceSample>,
}

impl ExecutionResult {
    /// A normal completion: success iff the process exited zero.
    pub fn completed(exit_code: Option<i32>, output: String) -> Self {
        Self {
            exit_code,
            success: exit_code == Some(0),
            output,
            termination_reason: TerminationReason::None,
            resource_samples: Vec::new(),
        }
    }

    /// A timeout or transport termination; never successful.
    pub fn terminated(reason: TerminationReason, output: String) -> Self {
        Self {
            exit_code: None,
            success: false,
            output,
            termination_reason: reason,
            resource_samples: Vec::new(),
        }
    }

    pub fn with_samples(mut self, samples: Vec<ResourceSample>) -> Self {
        self.resource_samples = samples;
        self
    }
}

#[cfg(test)]
#[path = "invocation_tests.rs"]
mod tests;
