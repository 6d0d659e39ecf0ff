// SPDX-License-Identifier: MIT

//! Build-tool output profiles.
//!
//! Exit codes lie for wrapped build invocations (`cd app && mvn test || true`,
//! shells that swallow status), so outcome detection reads the tool's own
//! markers out of the captured output. Each profile knows its tool's success
//! and failure markers and how to pull test statistics out of a run.

use crate::tool::ToolKind;
use regex::Regex;
use serde::{Deserialize, Serialize};

/// Aggregated test counts extracted from one or more runs.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TestStats {
    pub total: u32,
    pub passed: u32,
    pub failed: u32,
    pub skipped: u32,
}

impl TestStats {
    pub fn merge(&mut self, other: TestStats) {
        self.total += other.total;
        self.passed += other.passed;
        self.failed += other.failed;
        self.skipped += other.skipped;
    }
}

/// Outcome detection for one build tool family.
pub trait BuildToolProfile: Send + Sync {
    /// Tri-state marker verdict: `Some(true)` when the success marker is
    /// present and the failure marker is not, `Some(false)` when the failure
    /// marker is present, `None` when the output carries no verdict and the
    /// exit code is all we have.
    fn detect_success(&self, output: &str) -> Option<bool>;

    /// Pull test statistics out of the output, if this tool reports any.
    fn extract_test_stats(&self, output: &str) -> Option<TestStats>;
}

/// Marker verdict for tools with a success string and failure strings.
fn marker_verdict(output: &str, success: &str, failures: &[&str]) -> Option<bool> {
    if failures.iter().any(|f| output.contains(f)) {
        Some(false)
    } else if output.contains(success) {
        Some(true)
    } else {
        None
    }
}

struct MavenProfile;

impl BuildToolProfile for MavenProfile {
    fn detect_success(&self, output: &str) -> Option<bool> {
        marker_verdict(output, "BUILD SUCCESS", &["BUILD FAILURE", "Failed to execute goal"])
    }

    fn extract_test_stats(&self, output: &str) -> Option<TestStats> {
        // Surefire prints per-module lines and a final aggregate; the last
        // match is the aggregate.
        let re = Regex::new(
            r"Tests run:\s*(\d+),\s*Failures:\s*(\d+),\s*Errors:\s*(\d+),\s*Skipped:\s*(\d+)",
        )
        .ok()?;
        let caps = re.captures_iter(output).last()?;
        let total: u32 = caps.get(1)?.as_str().parse().ok()?;
        let failures: u32 = caps.get(2)?.as_str().parse().ok()?;
        let errors: u32 = caps.get(3)?.as_str().parse().ok()?;
        let skipped: u32 = caps.get(4)?.as_str().parse().ok()?;
        let failed = failures + errors;
        Some(TestStats {
            total,
            passed: total.saturating_sub(failed + skipped),
            failed,
            skipped,
        })
    }
}

struct GradleProfile;

impl BuildToolProfile for GradleProfile {
    fn detect_success(&self, output: &str) -> Option<bool> {
        marker_verdict(
            output,
            "BUILD SUCCESSFUL",
            &["BUILD FAILED", "Execution failed for task"],
        )
    }

    fn extract_test_stats(&self, output: &str) -> Option<TestStats> {
        let re = Regex::new(r"(\d+)\s+tests?\s+completed(?:,\s*(\d+)\s+failed)?").ok()?;
        let caps = re.captures_iter(output).last()?;
        let total: u32 = caps.get(1)?.as_str().parse().ok()?;
        let failed: u32 = caps.get(2).and_then(|m| m.as_str().parse().ok()).unwrap_or(0);
        Some(TestStats {
            total,
            passed: total.saturating_sub(failed),
            failed,
            skipped: 0,
        })
    }
}

struct NpmProfile;

impl BuildToolProfile for NpmProfile {
    fn detect_success(&self, output: &str) -> Option<bool> {
        if output.contains("npm ERR!") {
            Some(false)
        } else {
            None
        }
    }

    fn extract_test_stats(&self, output: &str) -> Option<TestStats> {
        // Jest summary line: "Tests: 12 passed, 14 total"
        let re = Regex::new(r"Tests?:\s*(\d+)\s+passed,\s*(\d+)\s+total").ok()?;
        let caps = re.captures_iter(output).last()?;
        let passed: u32 = caps.get(1)?.as_str().parse().ok()?;
        let total: u32 = caps.get(2)?.as_str().parse().ok()?;
        Some(TestStats {
            total,
            passed,
            failed: total.saturating_sub(passed),
            skipped: 0,
        })
    }
}

struct PythonProfile;

impl BuildToolProfile for PythonProfile {
    fn detect_success(&self, output: &str) -> Option<bool> {
        if output.contains("ERROR:") || output.contains("FAILED") {
            Some(false)
        } else if output.contains("Successfully installed") {
            Some(true)
        } else {
            None
        }
    }

    fn extract_test_stats(&self, output: &str) -> Option<TestStats> {
        let re = Regex::new(r"(\d+)\s+passed(?:,\s*(\d+)\s+failed)?").ok()?;
        let caps = re.captures_iter(output).last()?;
        let passed: u32 = caps.get(1)?.as_str().parse().ok()?;
        let failed: u32 = caps.get(2).and_then(|m| m.as_str().parse().ok()).unwrap_or(0);
        Some(TestStats {
            total: passed + failed,
            passed,
            failed,
            skipped: 0,
        })
    }
}

struct MakeProfile;

impl BuildToolProfile for MakeProfile {
    fn detect_success(&self, output: &str) -> Option<bool> {
        // make prints "*** [target] Error N" on rule failure
        if output.contains("*** [") {
            Some(false)
        } else {
            None
        }
    }

    fn extract_test_stats(&self, _output: &str) -> Option<TestStats> {
        None
    }
}

struct ShellProfile;

impl BuildToolProfile for ShellProfile {
    fn detect_success(&self, _output: &str) -> Option<bool> {
        None
    }

    fn extract_test_stats(&self, _output: &str) -> Option<TestStats> {
        None
    }
}

/// The marker profile for a tool family.
pub fn profile_for(kind: ToolKind) -> &'static dyn BuildToolProfile {
    match kind {
        ToolKind::Maven => &MavenProfile,
        ToolKind::Gradle => &GradleProfile,
        ToolKind::Npm => &NpmProfile,
        ToolKind::Python => &PythonProfile,
        ToolKind::Make => &MakeProfile,
        ToolKind::Shell => &ShellProfile,
    }
}

#[cfg(test)]
#[path = "profile_tests.rs"]
mod tests;
