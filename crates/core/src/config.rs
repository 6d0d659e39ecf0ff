// SPDX-License-Identifier: MIT

//! Fabric configuration, loaded from a toml file or built in code.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

fn default_container() -> String {
    "workspace".to_string()
}

fn default_state_dir() -> PathBuf {
    PathBuf::from(".vouch")
}

fn default_truncation_threshold() -> usize {
    10_000
}

fn default_truncation_max_len() -> usize {
    800
}

fn default_grace_secs() -> u64 {
    30
}

fn default_hang_sample_divisor() -> u32 {
    2
}

fn default_low_cpu_threshold() -> f64 {
    0.01
}

fn default_hang_warning_count() -> u32 {
    3
}

/// Top-level configuration for the execution fabric.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FabricConfig {
    /// Name of the container commands run in.
    #[serde(default = "default_container")]
    pub container: String,
    /// Directory holding the archive and ledger files.
    #[serde(default = "default_state_dir")]
    pub state_dir: PathBuf,
    /// Outputs longer than this are archived and truncated (chars).
    #[serde(default = "default_truncation_threshold")]
    pub truncation_threshold: usize,
    /// Target length of a truncated output, reference block included (chars).
    #[serde(default = "default_truncation_max_len")]
    pub truncation_max_len: usize,
    /// Wait between TERM and KILL during termination (seconds).
    #[serde(default = "default_grace_secs")]
    pub grace_period_secs: u64,
    /// Hang detector samples every `silent / hang_sample_divisor`.
    #[serde(default = "default_hang_sample_divisor")]
    pub hang_sample_divisor: u32,
    /// CPU utilization below this fraction counts as idle (0.0..=1.0).
    #[serde(default = "default_low_cpu_threshold")]
    pub low_cpu_threshold: f64,
    /// Consecutive idle samples before a hang warning is logged.
    #[serde(default = "default_hang_warning_count")]
    pub hang_warning_count: u32,
}

impl Default for FabricConfig {
    fn default() -> Self {
        Self {
            container: default_container(),
            state_dir: default_state_dir(),
            truncation_threshold: default_truncation_threshold(),
            truncation_max_len: default_truncation_max_len(),
            grace_period_secs: default_grace_secs(),
            hang_sample_divisor: default_hang_sample_divisor(),
            low_cpu_threshold: default_low_cpu_threshold(),
            hang_warning_count: default_hang_warning_count(),
        }
    }
}

impl FabricConfig {
    /// Parse a toml document; missing fields take their defaults.
    pub fn from_toml(text: &str) -> Result<Self, toml::de::Error> {
        toml::from_str(text)
    }

    /// Load from a toml file on disk.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let text = std::fs::read_to_string(path)
            .map_err(|source| ConfigError::Read { path: path.to_path_buf(), source })?;
        Self::from_toml(&text)
            .map_err(|source| ConfigError::Parse { path: path.to_path_buf(), source })
    }

    pub fn grace_period(&self) -> Duration {
        Duration::from_secs(self.grace_period_secs)
    }
}

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("failed to read config {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to parse config {path}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: toml::de::Error,
    },
}

#[cfg(test)]
#[path = "config_tests.rs"]
mod tests;
