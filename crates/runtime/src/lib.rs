// SPDX-License-Identifier: MIT

// Allow panic!/unwrap/expect in test code
#![cfg_attr(test, allow(clippy::panic))]
#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::expect_used))]

//! vouch-runtime: the container runtime seam.
//!
//! Everything above this crate talks to a [`ContainerRuntime`] and never to
//! docker directly, so the execution fabric tests against a scripted fake
//! and production swaps in [`DockerRuntime`].

use async_trait::async_trait;
use tokio::sync::mpsc;

pub mod docker;
#[cfg(any(test, feature = "test-support"))]
pub mod fake;

pub use docker::DockerRuntime;
#[cfg(any(test, feature = "test-support"))]
pub use fake::{FakeRuntime, StreamStep};

/// Captured result of a one-shot execution.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExecOutput {
    /// Process exit code; `None` when the process was killed by a signal.
    pub exit_code: Option<i32>,
    /// Interleaved stdout and stderr.
    pub output: String,
}

impl ExecOutput {
    pub fn success(&self) -> bool {
        self.exit_code == Some(0)
    }
}

/// One event on a streamed execution. Chunks arrive in order; `Exited` is
/// always the final event.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StreamEvent {
    Chunk(String),
    Exited(Option<i32>),
}

/// Signals the fabric sends during termination.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Signal {
    Term,
    Kill,
}

impl Signal {
    pub fn as_str(self) -> &'static str {
        match self {
            Signal::Term => "TERM",
            Signal::Kill => "KILL",
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum RuntimeError {
    #[error("failed to spawn runtime process: {0}")]
    Spawn(#[source] std::io::Error),
    #[error("runtime i/o failure: {0}")]
    Io(#[source] std::io::Error),
    #[error("cpu counter unavailable: {0}")]
    CpuCounter(String),
    #[error("no scripted response for: {0}")]
    Unscripted(String),
}

/// Execution primitives the fabric consumes from a container.
#[async_trait]
pub trait ContainerRuntime: Send + Sync {
    /// Run a command to completion and capture its combined output.
    async fn exec(&self, command: &str, workdir: Option<&str>) -> Result<ExecOutput, RuntimeError>;

    /// Run a command and stream its output as it is produced. The receiver
    /// yields `Chunk`s in arrival order and closes after `Exited`.
    async fn exec_streamed(
        &self,
        command: &str,
        workdir: Option<&str>,
    ) -> Result<mpsc::Receiver<StreamEvent>, RuntimeError>;

    /// Cumulative CPU time consumed by the container, in nanoseconds.
    async fn cpu_usage_ns(&self) -> Result<u64, RuntimeError>;

    /// Best-effort signal delivery to processes matched by name. Failures
    /// are reported but callers treat them as advisory.
    async fn signal(&self, process_names: &[String], signal: Signal) -> Result<(), RuntimeError>;
}
