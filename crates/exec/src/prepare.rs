// SPDX-License-Identifier: MIT

//! Tool-aware command pre-processing.
//!
//! A pure text transform applied only to recognized tool prefixes: batch and
//! non-interactive flags, bounded parallelism, and tool-internal timeouts
//! sized above the external absolute timeout so the external clock always
//! fires first with its better diagnostics. Unrecognized commands pass
//! through untouched.

use std::time::Duration;
use vouch_core::ToolKind;

const GRADLE_MAX_WORKERS: u32 = 2;
/// Headroom added to the tool-internal timeout so the external clock wins.
const INTERNAL_TIMEOUT_SLACK_SECS: u64 = 60;

/// Rewrite a command with the flags its tool family needs for unattended
/// execution. Identity for tools with no recognized rewrite.
pub fn prepare_command(command: &str, tool: ToolKind, absolute: Duration) -> String {
    match tool {
        ToolKind::Maven => prepare_maven(command, absolute),
        ToolKind::Gradle => prepare_gradle(command),
        ToolKind::Npm => prepare_npm(command),
        ToolKind::Python | ToolKind::Make | ToolKind::Shell => command.to_string(),
    }
}

fn prepare_maven(command: &str, absolute: Duration) -> String {
    let mut flags = Vec::new();
    if !command.contains("-B") && !command.contains("--batch-mode") {
        flags.push("-B".to_string());
    }
    if !command.contains("surefire.timeout") {
        let secs = absolute.as_secs() + INTERNAL_TIMEOUT_SLACK_SECS;
        flags.push(format!("-Dsurefire.timeout={secs}"));
    }
    insert_after_tool(command, &["mvn", "mvnw"], &flags)
}

fn prepare_gradle(command: &str) -> String {
    let mut flags = Vec::new();
    if !command.contains("--console") {
        flags.push("--console=plain".to_string());
    }
    if !command.contains("--no-daemon") && !command.contains("--daemon") {
        flags.push("--no-daemon".to_string());
    }
    if !command.contains("--max-workers") {
        flags.push(format!("--max-workers={GRADLE_MAX_WORKERS}"));
    }
    insert_after_tool(command, &["gradle", "gradlew"], &flags)
}

fn prepare_npm(command: &str) -> String {
    let mut flags = Vec::new();
    if !command.contains("--no-audit") {
        flags.push("--no-audit".to_string());
    }
    if !command.contains("--no-fund") {
        flags.push("--no-fund".to_string());
    }
    insert_after_tool(command, &["npm"], &flags)
}

/// Insert flags right after the tool token so they bind to the tool even in
/// chained commands like `cd app && mvn test`. Identity when the token is
/// not found or there is nothing to add.
fn insert_after_tool(command: &str, tool_names: &[&str], flags: &[String]) -> String {
    if flags.is_empty() {
        return command.to_string();
    }

    let mut cursor = 0;
    for token in command.split_whitespace() {
        // Locate this token's span in the original string
        let Some(rel) = command[cursor..].find(token) else { break };
        let start = cursor + rel;
        let end = start + token.len();
        cursor = end;

        let base = token.rsplit('/').next().unwrap_or(token);
        if tool_names.contains(&base) {
            let joined = flags.join(" ");
            return format!("{} {}{}", &command[..end], joined, &command[end..]);
        }
    }
    command.to_string()
}

#[cfg(test)]
#[path = "prepare_tests.rs"]
mod tests;
