// SPDX-License-Identifier: MIT

//! Ledger entries, recording, replay, and persistence.

use crate::LedgerError;
use chrono::Utc;
use serde::{Deserialize, Serialize};
use std::path::Path;
use tracing::{debug, info, warn};
use vouch_core::{profile_for, TestStats, ToolKind};
use vouch_runtime::ContainerRuntime;

/// Ledger entries keep at most this many chars of output.
const SNIPPET_CHARS: usize = 500;

fn snippet(output: &str) -> String {
    output.chars().take(SNIPPET_CHARS).collect()
}

/// One recorded build command.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BuildEntry {
    pub command: String,
    pub tool: ToolKind,
    pub workdir: String,
    pub timestamp: String,
    pub exit_code: Option<i32>,
    pub output_snippet: String,
    /// Marker verdict at record time; `None` when the output carried no
    /// marker and only the exit code spoke.
    pub marker_success: Option<bool>,
}

/// One recorded test command.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TestEntry {
    pub command: String,
    pub tool: ToolKind,
    pub workdir: String,
    pub timestamp: String,
    pub exit_code: Option<i32>,
    pub output_snippet: String,
    pub marker_success: Option<bool>,
    pub stats: Option<TestStats>,
}

/// Result of replaying the last recorded build.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReplayOutcome {
    /// Derived from fresh output markers, not the exit code.
    pub success: bool,
    pub exit_code: Option<i32>,
    pub command: String,
    pub output_snippet: String,
    pub timestamp: String,
}

/// Aggregated result of replaying every recorded test command.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TestReplaySummary {
    pub success: bool,
    pub total_commands: usize,
    pub successful_replays: usize,
    pub failed_replays: usize,
    pub stats: TestStats,
    pub timestamp: String,
}

/// The persisted document shape.
#[derive(Debug, Serialize, Deserialize)]
struct LedgerDocument {
    project: String,
    timestamp: String,
    build_commands: Vec<BuildEntry>,
    test_commands: Vec<TestEntry>,
    last_successful_build: Option<String>,
    last_successful_test: Option<String>,
}

/// In-memory ledger of build and test commands.
#[derive(Debug, Clone)]
pub struct CommandLedger {
    project: String,
    builds: Vec<BuildEntry>,
    tests: Vec<TestEntry>,
    last_successful_build: Option<String>,
    last_successful_test: Option<String>,
}

impl CommandLedger {
    pub fn new(project: impl Into<String>) -> Self {
        Self {
            project: project.into(),
            builds: Vec::new(),
            tests: Vec::new(),
            last_successful_build: None,
            last_successful_test: None,
        }
    }

    /// Record a build command. Success is derived from the tool's output
    /// markers; exit code alone is untrusted since some tools exit zero on
    /// partial failure.
    pub fn record_build(
        &mut self,
        command: &str,
        tool: ToolKind,
        workdir: &str,
        exit_code: Option<i32>,
        output: &str,
    ) {
        let marker_success = profile_for(tool).detect_success(output);
        let entry = BuildEntry {
            command: command.to_string(),
            tool,
            workdir: workdir.to_string(),
            timestamp: Utc::now().to_rfc3339(),
            exit_code,
            output_snippet: snippet(output),
            marker_success,
        };
        if marker_success == Some(true) {
            self.last_successful_build = Some(command.to_string());
        }
        debug!(tool = %tool, success = ?marker_success, "recorded build command");
        self.builds.push(entry);
    }

    /// Record a test command. The success pointer only moves when the marker
    /// verdict is positive and the extracted stats report zero failures.
    pub fn record_test(
        &mut self,
        command: &str,
        tool: ToolKind,
        workdir: &str,
        exit_code: Option<i32>,
        output: &str,
    ) {
        let profile = profile_for(tool);
        let marker_success = profile.detect_success(output);
        let stats = profile.extract_test_stats(output);
        let entry = TestEntry {
            command: command.to_string(),
            tool,
            workdir: workdir.to_string(),
            timestamp: Utc::now().to_rfc3339(),
            exit_code,
            output_snippet: snippet(output),
            marker_success,
            stats,
        };
        if test_succeeded(marker_success, stats) {
            self.last_successful_test = Some(command.to_string());
        }
        debug!(tool = %tool, success = ?marker_success, stats = ?stats, "recorded test command");
        self.tests.push(entry);
    }

    pub fn last_build(&self) -> Option<&BuildEntry> {
        self.builds.last()
    }

    pub fn last_test(&self) -> Option<&TestEntry> {
        self.tests.last()
    }

    pub fn builds(&self) -> &[BuildEntry] {
        &self.builds
    }

    pub fn tests(&self) -> &[TestEntry] {
        &self.tests
    }

    pub fn last_successful_build(&self) -> Option<&str> {
        self.last_successful_build.as_deref()
    }

    pub fn last_successful_test(&self) -> Option<&str> {
        self.last_successful_test.as_deref()
    }

    /// Re-run the most recent build command and re-derive success from the
    /// fresh output. The ledger itself is not appended to, so replay is
    /// idempotent with respect to the ledger (not the container).
    pub async fn replay_last_build(
        &self,
        runtime: &dyn ContainerRuntime,
    ) -> Result<ReplayOutcome, LedgerError> {
        let last = self.builds.last().ok_or(LedgerError::NothingToReplay("build"))?;
        info!(command = %last.command, "replaying last build command");

        let result = runtime.exec(&last.command, Some(&last.workdir)).await?;
        let success = profile_for(last.tool).detect_success(&result.output) == Some(true);
        Ok(ReplayOutcome {
            success,
            exit_code: result.exit_code,
            command: last.command.clone(),
            output_snippet: snippet(&result.output),
            timestamp: Utc::now().to_rfc3339(),
        })
    }

    /// Re-run every recorded test command and aggregate fresh statistics.
    /// A transport failure on one command counts as a failed replay and the
    /// remaining commands still run.
    pub async fn replay_all_tests(
        &self,
        runtime: &dyn ContainerRuntime,
    ) -> Result<TestReplaySummary, LedgerError> {
        if self.tests.is_empty() {
            return Err(LedgerError::NothingToReplay("test"));
        }

        let mut stats = TestStats::default();
        let mut successful_replays = 0;
        let mut failed_replays = 0;

        for entry in &self.tests {
            info!(command = %entry.command, "replaying test command");
            let profile = profile_for(entry.tool);
            match runtime.exec(&entry.command, Some(&entry.workdir)).await {
                Ok(result) => {
                    let fresh = profile.extract_test_stats(&result.output);
                    if let Some(s) = fresh {
                        stats.merge(s);
                    }
                    if test_succeeded(profile.detect_success(&result.output), fresh) {
                        successful_replays += 1;
                    } else {
                        failed_replays += 1;
                    }
                }
                Err(err) => {
                    warn!(command = %entry.command, error = %err, "test replay failed to execute");
                    failed_replays += 1;
                }
            }
        }

        Ok(TestReplaySummary {
            success: failed_replays == 0 && stats.failed == 0,
            total_commands: self.tests.len(),
            successful_replays,
            failed_replays,
            stats,
            timestamp: Utc::now().to_rfc3339(),
        })
    }

    /// Save the full ledger as one JSON document.
    pub fn save_to_file(&self, path: &Path) -> Result<(), LedgerError> {
        let doc = LedgerDocument {
            project: self.project.clone(),
            timestamp: Utc::now().to_rfc3339(),
            build_commands: self.builds.clone(),
            test_commands: self.tests.clone(),
            last_successful_build: self.last_successful_build.clone(),
            last_successful_test: self.last_successful_test.clone(),
        };
        let text = serde_json::to_string_pretty(&doc)
            .map_err(|source| LedgerError::Malformed { path: path.to_path_buf(), source })?;
        std::fs::write(path, text)
            .map_err(|source| LedgerError::Io { path: path.to_path_buf(), source })?;
        info!(path = %path.display(), builds = self.builds.len(), tests = self.tests.len(), "saved ledger");
        Ok(())
    }

    /// Reload a ledger saved with [`save_to_file`](Self::save_to_file).
    pub fn load_from_file(path: &Path) -> Result<Self, LedgerError> {
        let text = std::fs::read_to_string(path)
            .map_err(|source| LedgerError::Io { path: path.to_path_buf(), source })?;
        let doc: LedgerDocument = serde_json::from_str(&text)
            .map_err(|source| LedgerError::Malformed { path: path.to_path_buf(), source })?;
        Ok(Self {
            project: doc.project,
            builds: doc.build_commands,
            tests: doc.test_commands,
            last_successful_build: doc.last_successful_build,
            last_successful_test: doc.last_successful_test,
        })
    }
}

/// Test success: positive marker verdict plus extracted stats with zero
/// failures. Either signal alone is not enough.
fn test_succeeded(marker: Option<bool>, stats: Option<TestStats>) -> bool {
    marker == Some(true) && matches!(stats, Some(s) if s.failed == 0)
}

#[cfg(test)]
#[path = "ledger_tests.rs"]
mod tests;
