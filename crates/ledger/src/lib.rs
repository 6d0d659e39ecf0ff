// SPDX-License-Identifier: MIT

// Allow panic!/unwrap/expect in test code
#![cfg_attr(test, allow(clippy::panic))]
#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::expect_used))]

//! vouch-ledger: the command ledger and replay validator.
//!
//! Records every build and test command with its derived outcome, giving a
//! source of truth that does not depend on anyone's narrative claim. Replay
//! re-runs recorded commands against the current container and re-derives
//! the outcome from fresh output.

use std::path::PathBuf;

pub mod ledger;

pub use ledger::{BuildEntry, CommandLedger, ReplayOutcome, TestEntry, TestReplaySummary};

#[derive(Debug, thiserror::Error)]
pub enum LedgerError {
    #[error("no recorded {0} commands to replay")]
    NothingToReplay(&'static str),
    #[error("ledger i/o failure at {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("malformed ledger document at {path}: {source}")]
    Malformed {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
    #[error(transparent)]
    Runtime(#[from] vouch_runtime::RuntimeError),
}
