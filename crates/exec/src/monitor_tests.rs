// SPDX-License-Identifier: MIT

use super::*;
use vouch_runtime::FakeRuntime;

const INTERVAL: Duration = Duration::from_secs(5);

async fn settle() {
    // Let spawned tasks observe the advanced clock
    tokio::task::yield_now().await;
    tokio::task::yield_now().await;
}

#[tokio::test(start_paused = true)]
async fn idle_samples_during_silence_each_count_one_warning() {
    let rt = Arc::new(FakeRuntime::new());
    // Baseline, then two samples with ~zero cpu progress
    rt.script_cpu(1_000_000_000);
    rt.script_cpu(1_000_000_100);
    rt.script_cpu(1_000_000_200);

    let state = Arc::new(MonitorState::new());
    let handle = tokio::spawn(run_hang_detector(
        rt.clone() as Arc<dyn ContainerRuntime>,
        state.clone(),
        INTERVAL,
        0.01,
        3,
    ));

    tokio::time::sleep(INTERVAL * 2 + Duration::from_millis(10)).await;
    settle().await;

    assert_eq!(state.hang_warnings(), 2);
    assert!(!state.is_terminated(), "the detector must never terminate");

    state.mark_terminated();
    tokio::time::sleep(INTERVAL).await;
    let _ = handle.await;
}

#[tokio::test(start_paused = true)]
async fn busy_cpu_resets_the_consecutive_run_but_keeps_the_counter() {
    let rt = Arc::new(FakeRuntime::new());
    rt.script_cpu(0);
    rt.script_cpu(10); // idle: warning 1
    // A full interval of cpu time: clearly busy
    rt.script_cpu(10 + INTERVAL.as_nanos() as u64);
    rt.script_cpu(20 + INTERVAL.as_nanos() as u64); // idle again: warning 2

    let state = Arc::new(MonitorState::new());
    let handle = tokio::spawn(run_hang_detector(
        rt.clone() as Arc<dyn ContainerRuntime>,
        state.clone(),
        INTERVAL,
        0.01,
        3,
    ));

    tokio::time::sleep(INTERVAL * 3 + Duration::from_millis(10)).await;
    settle().await;
    assert_eq!(state.hang_warnings(), 2);

    state.mark_terminated();
    tokio::time::sleep(INTERVAL).await;
    let _ = handle.await;
}

#[tokio::test(start_paused = true)]
async fn recent_output_suppresses_warnings_even_at_low_cpu() {
    let rt = Arc::new(FakeRuntime::new());
    rt.script_cpu(0);
    rt.script_cpu(10);

    let state = Arc::new(MonitorState::new());
    let handle = tokio::spawn(run_hang_detector(
        rt.clone() as Arc<dyn ContainerRuntime>,
        state.clone(),
        INTERVAL,
        0.01,
        3,
    ));

    // Keep stamping output just before each sample fires
    tokio::time::sleep(INTERVAL - Duration::from_millis(50)).await;
    state.record_output();
    tokio::time::sleep(Duration::from_millis(60)).await;
    settle().await;

    assert_eq!(state.hang_warnings(), 0);

    state.mark_terminated();
    tokio::time::sleep(INTERVAL).await;
    let _ = handle.await;
}

#[tokio::test(start_paused = true)]
async fn detector_stops_after_termination() {
    let rt = Arc::new(FakeRuntime::new());
    rt.script_cpu(0);

    let state = Arc::new(MonitorState::new());
    let handle = tokio::spawn(run_hang_detector(
        rt.clone() as Arc<dyn ContainerRuntime>,
        state.clone(),
        INTERVAL,
        0.01,
        3,
    ));

    state.mark_terminated();
    tokio::time::sleep(INTERVAL + Duration::from_millis(10)).await;
    handle.await.unwrap();
    assert_eq!(state.hang_warnings(), 0);
}

#[test]
fn samples_drain_once() {
    let state = MonitorState::new();
    state.push_sample(ResourceSample { at_ms: 5_000, cpu_utilization: 0.5 });
    assert_eq!(state.take_samples().len(), 1);
    assert!(state.take_samples().is_empty());
}
