// SPDX-License-Identifier: MIT

// Allow panic!/unwrap/expect in test code
#![cfg_attr(test, allow(clippy::panic))]
#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::expect_used))]

//! vouch-exec: monitored command execution and the facade callers use.
//!
//! The executor streams output under two independent timeout clocks while a
//! hang detector samples CPU; the facade routes commands to the right path,
//! archives oversized output, and records build and test commands in the
//! ledger.

pub mod executor;
pub mod facade;
pub mod monitor;
pub mod prepare;

pub use executor::MonitoredExecutor;
pub use facade::{ExecutionFacade, FacadeResult};
pub use monitor::MonitorState;
pub use prepare::prepare_command;

#[derive(Debug, thiserror::Error)]
pub enum ExecError {
    #[error(transparent)]
    Archive(#[from] vouch_archive::ArchiveError),
    #[error(transparent)]
    Ledger(#[from] vouch_ledger::LedgerError),
}
