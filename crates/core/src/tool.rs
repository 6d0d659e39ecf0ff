// SPDX-License-Identifier: MIT

//! Tool classification from raw command text.
//!
//! The fabric never parses full command lines; it only needs to know which
//! build tool (if any) a command belongs to, so it can pick marker profiles,
//! timeout defaults, and the monitored execution path.

use serde::{Deserialize, Serialize};

/// Build tool family a command belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ToolKind {
    Maven,
    Gradle,
    Npm,
    Python,
    Make,
    /// Anything without a recognized build-tool prefix.
    Shell,
}

impl ToolKind {
    /// Classify a command line by its tool prefix.
    ///
    /// Matches the tool anywhere in the command (builds are often invoked as
    /// `cd proj && mvn ...`), checking the more specific tools first.
    pub fn classify(command: &str) -> Self {
        let lower = command.to_ascii_lowercase();
        let has_word = |w: &str| {
            lower
                .split(|c: char| !c.is_ascii_alphanumeric() && c != '.' && c != '/' && c != '-')
                .any(|t| t == w)
        };

        if has_word("mvn") || has_word("mvnw") || has_word("./mvnw") {
            ToolKind::Maven
        } else if has_word("gradle") || has_word("gradlew") || has_word("./gradlew") {
            ToolKind::Gradle
        } else if has_word("npm") || has_word("yarn") || has_word("pnpm") {
            ToolKind::Npm
        } else if has_word("pip") || has_word("pip3") || has_word("pytest") || has_word("python")
            || has_word("python3")
        {
            ToolKind::Python
        } else if has_word("make") || has_word("cmake") {
            ToolKind::Make
        } else {
            ToolKind::Shell
        }
    }

    /// Whether commands of this kind take the monitored execution path when
    /// they look like builds, tests, or installs.
    ///
    /// Plain shell commands still qualify when they contain a long-running
    /// verb (clone, install, download); dependency fetches routinely go
    /// minutes between output lines.
    pub fn is_long_running(self, command: &str) -> bool {
        let lower = command.to_ascii_lowercase();
        match self {
            ToolKind::Maven | ToolKind::Gradle | ToolKind::Make => true,
            ToolKind::Npm | ToolKind::Python => {
                ["install", "build", "test", "ci"].iter().any(|v| lower.contains(v))
            }
            ToolKind::Shell => ["clone", "install", "download", "build", "compile", "wget", "curl -o"]
                .iter()
                .any(|v| lower.contains(v)),
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            ToolKind::Maven => "maven",
            ToolKind::Gradle => "gradle",
            ToolKind::Npm => "npm",
            ToolKind::Python => "python",
            ToolKind::Make => "make",
            ToolKind::Shell => "shell",
        }
    }
}

impl std::fmt::Display for ToolKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[cfg(test)]
#[path = "tool_tests.rs"]
mod tests;
