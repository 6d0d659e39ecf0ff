// SPDX-License-Identifier: MIT

// Allow panic!/unwrap/expect in test code
#![cfg_attr(test, allow(clippy::panic))]
#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::expect_used))]

//! vouch-archive: durable storage for full command outputs.
//!
//! Outputs that get truncated for the caller are first archived here, so a
//! truncated result always carries a resolvable reference instead of silently
//! dropping information.

use std::path::PathBuf;

pub mod store;
pub mod truncate;

pub use store::{OutputArchive, Preview, SearchHit};
pub use truncate::truncate_with_reference;

#[derive(Debug, thiserror::Error)]
pub enum ArchiveError {
    #[error("invalid search pattern: {0}")]
    MalformedQuery(#[from] regex::Error),
    #[error("archive i/o failure at {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("corrupt archive record at line {line}: {source}")]
    Corrupt {
        line: usize,
        #[source]
        source: serde_json::Error,
    },
}
