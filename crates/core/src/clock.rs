// SPDX-License-Identifier: MIT

//! Wall-clock helpers.

use std::time::{SystemTime, UNIX_EPOCH};

/// Current time as milliseconds since the unix epoch. Timestamps only;
/// timeout arithmetic runs on the async runtime's clock.
pub fn epoch_ms() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_millis() as u64
}

#[cfg(test)]
#[path = "clock_tests.rs"]
mod tests;
