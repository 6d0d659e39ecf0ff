// SPDX-License-Identifier: MIT

//! Shared monitoring state and the CPU hang detector.
//!
//! The executor owns the write side: it stamps every chunk arrival and sets
//! the terminated flag exactly once. The detector only reads those fields
//! and adds advisory warnings; it never terminates anything, so there is no
//! race between two terminators acting on the same process.

use parking_lot::Mutex;
use std::sync::atomic::{AtomicBool, AtomicU32, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::time::Instant;
use tracing::{debug, warn};
use vouch_core::ResourceSample;
use vouch_runtime::ContainerRuntime;

/// Monitoring record shared between the executor and the hang detector.
pub struct MonitorState {
    started: Instant,
    last_output: Mutex<Instant>,
    terminated: AtomicBool,
    hang_warnings: AtomicU32,
    samples: Mutex<Vec<ResourceSample>>,
}

impl MonitorState {
    pub fn new() -> Self {
        let now = Instant::now();
        Self {
            started: now,
            last_output: Mutex::new(now),
            terminated: AtomicBool::new(false),
            hang_warnings: AtomicU32::new(0),
            samples: Mutex::new(Vec::new()),
        }
    }

    /// Stamp a chunk arrival. Executor only.
    pub fn record_output(&self) {
        *self.last_output.lock() = Instant::now();
    }

    /// Time since the last chunk arrived (or since start).
    pub fn silence(&self) -> Duration {
        self.last_output.lock().elapsed()
    }

    pub fn elapsed(&self) -> Duration {
        self.started.elapsed()
    }

    /// Mark the invocation finished. Executor only; the detector stops at
    /// its next wakeup.
    pub fn mark_terminated(&self) {
        self.terminated.store(true, Ordering::Release);
    }

    pub fn is_terminated(&self) -> bool {
        self.terminated.load(Ordering::Acquire)
    }

    pub(crate) fn add_warning(&self) -> u32 {
        self.hang_warnings.fetch_add(1, Ordering::Relaxed) + 1
    }

    /// Advisory hang warnings accumulated so far.
    pub fn hang_warnings(&self) -> u32 {
        self.hang_warnings.load(Ordering::Relaxed)
    }

    pub(crate) fn push_sample(&self, sample: ResourceSample) {
        self.samples.lock().push(sample);
    }

    /// Drain the collected CPU samples.
    pub fn take_samples(&self) -> Vec<ResourceSample> {
        std::mem::take(&mut self.samples.lock())
    }
}

impl Default for MonitorState {
    fn default() -> Self {
        Self::new()
    }
}

/// Sample container CPU counters until the invocation terminates.
///
/// Utilization is delta-based over the sampling interval. A sample below the
/// low-CPU threshold while output is also silent counts one warning; a run
/// of `warn_after` consecutive idle samples logs loudly. Termination
/// authority stays with the timeout clocks; this task only observes.
pub(crate) async fn run_hang_detector(
    runtime: Arc<dyn ContainerRuntime>,
    state: Arc<MonitorState>,
    interval: Duration,
    low_cpu_threshold: f64,
    warn_after: u32,
) {
    let mut prev = match runtime.cpu_usage_ns().await {
        Ok(v) => v,
        Err(err) => {
            debug!(error = %err, "cpu counters unavailable, hang detection disabled");
            return;
        }
    };

    let mut consecutive_idle = 0u32;
    loop {
        tokio::time::sleep(interval).await;
        if state.is_terminated() {
            break;
        }

        let current = match runtime.cpu_usage_ns().await {
            Ok(v) => v,
            Err(err) => {
                debug!(error = %err, "cpu sample failed, skipping");
                continue;
            }
        };
        let delta = current.saturating_sub(prev);
        prev = current;
        let utilization = delta as f64 / interval.as_nanos() as f64;

        state.push_sample(ResourceSample {
            at_ms: state.elapsed().as_millis() as u64,
            cpu_utilization: utilization,
        });

        let output_silent = state.silence() >= interval;
        if utilization < low_cpu_threshold && output_silent {
            consecutive_idle += 1;
            let total = state.add_warning();
            if consecutive_idle == warn_after {
                warn!(
                    total_warnings = total,
                    utilization,
                    "command looks hung: low cpu while output is silent"
                );
            }
        } else {
            consecutive_idle = 0;
        }
    }
}

#[cfg(test)]
#[path = "monitor_tests.rs"]
mod tests;
