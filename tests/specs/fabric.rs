// SPDX-License-Identifier: MIT

//! Monitored execution specs: the dual timeout clocks and the termination
//! protocol, end to end through the facade.

use crate::prelude::*;

/// Output every 2s for 20s, then silence, under silent=5s / absolute=60s:
/// the silent clock fires and every chunk emitted before termination is
/// preserved in the result.
#[tokio::test(start_paused = true)]
async fn silent_timeout_preserves_all_emitted_chunks() {
    let dir = TempDir::new().unwrap();
    let rt = Arc::new(FakeRuntime::new());
    let mut steps: Vec<StreamStep> = (0..10)
        .map(|i| StreamStep::chunk(Duration::from_secs(2), format!("Downloading artifact {i}\n")))
        .collect();
    steps.push(StreamStep::exited(Duration::from_secs(7_200), Some(0)));
    rt.script_stream(steps);

    let facade = facade(&dir, &rt);
    let out = facade
        .execute_monitored(
            "mvn clean install",
            Some("/workspace/app"),
            Duration::from_secs(5),
            Duration::from_secs(60),
        )
        .await
        .unwrap();

    assert!(!out.result.success);
    assert_eq!(out.result.termination_reason, TerminationReason::SilentTimeout);
    for i in 0..10 {
        assert!(out.result.output.contains(&format!("Downloading artifact {i}")));
    }
}

/// Continuous output for 120s under silent=600s / absolute=60s: the absolute
/// clock fires even though the command is never silent.
#[tokio::test(start_paused = true)]
async fn absolute_timeout_fires_despite_continuous_output() {
    let dir = TempDir::new().unwrap();
    let rt = Arc::new(FakeRuntime::new());
    let steps: Vec<StreamStep> = (0..120)
        .map(|i| StreamStep::chunk(Duration::from_secs(1), format!("line {i}\n")))
        .collect();
    rt.script_stream(steps);

    let facade = facade(&dir, &rt);
    let out = facade
        .execute_monitored(
            "npm run build",
            None,
            Duration::from_secs(600),
            Duration::from_secs(60),
        )
        .await
        .unwrap();

    assert!(!out.result.success);
    assert_eq!(out.result.termination_reason, TerminationReason::AbsoluteTimeout);
}

/// A timeout walks the full termination protocol: TERM to the tool's
/// process names, then KILL after the grace period.
#[tokio::test(start_paused = true)]
async fn timeout_termination_signals_term_then_kill() {
    let dir = TempDir::new().unwrap();
    let rt = Arc::new(FakeRuntime::new());
    rt.script_stream(vec![
        StreamStep::chunk(Duration::from_millis(10), "working\n"),
        // Never reached: keeps the stream open like a hung process
        StreamStep::exited(Duration::from_secs(7_200), Some(137)),
    ]);

    let facade = facade(&dir, &rt);
    let out = facade
        .execute_monitored(
            "gradle build",
            None,
            Duration::from_secs(5),
            Duration::from_secs(600),
        )
        .await
        .unwrap();
    assert_eq!(out.result.termination_reason, TerminationReason::SilentTimeout);

    let signals = rt.signals();
    assert_eq!(signals.len(), 2);
    assert_eq!(signals[0].1, Signal::Term);
    assert_eq!(signals[1].1, Signal::Kill);
    assert!(signals[0].0.contains(&"java".to_string()));
}

/// A clean exit sets reason none and takes success from the exit code;
/// exactly one termination reason per invocation.
#[tokio::test(start_paused = true)]
async fn clean_exit_has_reason_none() {
    let dir = TempDir::new().unwrap();
    let rt = Arc::new(FakeRuntime::new());
    rt.script_stream(vec![
        StreamStep::chunk(Duration::from_secs(1), "BUILD SUCCESSFUL in 1s\n"),
        StreamStep::exited(Duration::from_millis(10), Some(0)),
    ]);

    let facade = facade(&dir, &rt);
    let out = facade
        .execute_monitored(
            "gradle assemble",
            None,
            Duration::from_secs(60),
            Duration::from_secs(600),
        )
        .await
        .unwrap();

    assert!(out.result.success);
    assert_eq!(out.result.exit_code, Some(0));
    assert_eq!(out.result.termination_reason, TerminationReason::None);
    assert!(rt.signals().is_empty());
}
