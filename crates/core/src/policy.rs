// SPDX-License-Identifier: MIT

//! Timeout policies for monitored execution.
//!
//! Every monitored command runs under two independent bounds: a silent
//! timeout (maximum gap between output chunks) and an absolute timeout
//! (maximum total duration). Defaults are per tool family: a full Maven
//! build legitimately goes half an hour without printing a line while it
//! downloads dependencies, whereas a plain shell command that is silent for
//! a minute is stuck.

use crate::tool::ToolKind;
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Dual timeout bounds for one invocation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct TimeoutPolicy {
    /// Maximum allowed gap between consecutive output chunks.
    pub silent: Duration,
    /// Maximum allowed total duration regardless of activity.
    pub absolute: Duration,
}

impl TimeoutPolicy {
    pub const fn new(silent: Duration, absolute: Duration) -> Self {
        Self { silent, absolute }
    }

    const fn mins(silent: u64, absolute: u64) -> Self {
        Self::new(Duration::from_secs(silent * 60), Duration::from_secs(absolute * 60))
    }

    /// Default policy for commands with no tool classification.
    pub const DEFAULT: Self = Self::mins(1, 5);

    /// Pick a policy from the command text and its tool classification.
    pub fn for_command(command: &str) -> Self {
        let lower = command.to_ascii_lowercase();
        match ToolKind::classify(command) {
            ToolKind::Maven | ToolKind::Gradle => {
                if lower.contains("clean install")
                    || lower.contains("clean test")
                    || lower.contains("build")
                {
                    // Full builds with tests, including first-run dependency downloads
                    Self::mins(30, 120)
                } else if lower.contains("compile")
                    || lower.contains("package")
                    || lower.contains("test")
                {
                    Self::mins(20, 60)
                } else {
                    Self::mins(15, 40)
                }
            }
            ToolKind::Npm => {
                if lower.contains("install") || lower.contains("ci") {
                    Self::mins(5, 15)
                } else if lower.contains("build") || lower.contains("test") {
                    Self::mins(5, 20)
                } else {
                    Self::mins(3, 10)
                }
            }
            ToolKind::Python => {
                if lower.contains("install") {
                    Self::mins(3, 10)
                } else if lower.contains("test") || lower.contains("pytest") {
                    Self::mins(5, 15)
                } else {
                    Self::mins(2, 5)
                }
            }
            ToolKind::Make => Self::mins(5, 20),
            ToolKind::Shell => {
                if lower.contains("git clone") {
                    Self::mins(5, 20)
                } else if lower.contains("docker build") {
                    Self::mins(10, 30)
                } else if ToolKind::Shell.is_long_running(command) {
                    Self::mins(5, 15)
                } else {
                    Self::DEFAULT
                }
            }
        }
    }
}

impl Default for TimeoutPolicy {
    fn default() -> Self {
        Self::DEFAULT
    }
}

#[cfg(test)]
#[path = "policy_tests.rs"]
mod tests;
