// SPDX-License-Identifier: MIT

// Allow panic!/unwrap/expect in test code
#![cfg_attr(test, allow(clippy::panic))]
#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::expect_used))]

//! vouch-core: domain types shared across the execution fabric.
//!
//! Invocations, execution results, timeout policies, tool classification,
//! and the build-tool profiles that derive trustworthy outcomes from raw
//! command output.

pub mod clock;
pub mod config;
pub mod invocation;
pub mod policy;
pub mod profile;
pub mod tool;

pub use clock::epoch_ms;
pub use config::FabricConfig;
pub use invocation::{
    CommandInvocation, ExecutionResult, InvocationId, ResourceSample, TerminationReason,
};
pub use policy::TimeoutPolicy;
pub use profile::{profile_for, BuildToolProfile, TestStats};
pub use tool::ToolKind;
