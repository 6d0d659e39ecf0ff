// SPDX-License-Identifier: MIT

use super::*;
use tempfile::TempDir;
use vouch_runtime::{FakeRuntime, StreamStep};

fn facade_in(dir: &TempDir, rt: &Arc<FakeRuntime>) -> ExecutionFacade {
    let config = FabricConfig {
        state_dir: dir.path().to_path_buf(),
        truncation_threshold: 100,
        truncation_max_len: 200,
        grace_period_secs: 1,
        ..FabricConfig::default()
    };
    ExecutionFacade::new(rt.clone() as Arc<dyn ContainerRuntime>, config, "task-1").unwrap()
}

#[tokio::test]
async fn small_output_is_returned_unmodified_with_no_archive_record() {
    let dir = TempDir::new().unwrap();
    let rt = Arc::new(FakeRuntime::new());
    rt.script_exec(Some(0), "ok\n");

    let facade = facade_in(&dir, &rt);
    let out = facade.execute("echo ok", None, None).await.unwrap();

    assert!(out.result.success);
    assert_eq!(out.result.output, "ok\n");
    assert_eq!(out.archive_ref, None);
    assert!(facade.search(None, None, None, 10).unwrap().is_empty());
}

#[tokio::test]
async fn oversized_output_is_archived_then_truncated() {
    let dir = TempDir::new().unwrap();
    let rt = Arc::new(FakeRuntime::new());
    let big = format!("HEAD{}TAIL", "x".repeat(5_000));
    rt.script_exec(Some(0), big.clone());

    let facade = facade_in(&dir, &rt);
    let out = facade.execute("cat big.log", None, None).await.unwrap();

    let ref_id = out.archive_ref.expect("oversized output must be archived");
    assert!(out.result.output.contains(&ref_id));
    assert!(out.result.output.chars().count() < big.chars().count());
    // The reference resolves to the full original bytes
    assert_eq!(facade.retrieve(&ref_id).unwrap().as_deref(), Some(big.as_str()));
}

#[tokio::test(start_paused = true)]
async fn one_shot_timeout_abandons_a_stuck_exec() {
    let dir = TempDir::new().unwrap();
    let rt = Arc::new(FakeRuntime::new());
    rt.script_exec_after(Duration::from_secs(3_600), Some(0), "too late");

    let facade = facade_in(&dir, &rt);
    let out = facade.execute("ls", None, Some(Duration::from_secs(5))).await.unwrap();

    assert!(!out.result.success);
    assert_eq!(out.result.termination_reason, TerminationReason::AbsoluteTimeout);
    assert!(out.result.output.is_empty());
}

#[tokio::test]
async fn one_shot_transport_error_is_an_exception() {
    let dir = TempDir::new().unwrap();
    let rt = Arc::new(FakeRuntime::new());
    // Nothing scripted: exec fails immediately
    let facade = facade_in(&dir, &rt);
    let out = facade.execute("ls", None, None).await.unwrap();
    assert!(!out.result.success);
    assert_eq!(out.result.termination_reason, TerminationReason::Exception);
}

#[tokio::test]
async fn build_commands_land_in_the_ledger_with_marker_verdicts() {
    let dir = TempDir::new().unwrap();
    let rt = Arc::new(FakeRuntime::new());
    rt.script_exec(Some(0), "[INFO] BUILD SUCCESS");

    let facade = facade_in(&dir, &rt);
    facade.execute("mvn package -DskipTests", None, None).await.unwrap();

    facade.with_ledger(|ledger| {
        assert_eq!(ledger.builds().len(), 1);
        assert_eq!(ledger.tests().len(), 0);
        assert_eq!(ledger.last_successful_build(), Some("mvn package -DskipTests"));
    });
}

#[tokio::test]
async fn test_commands_land_in_the_test_ledger() {
    let dir = TempDir::new().unwrap();
    let rt = Arc::new(FakeRuntime::new());
    rt.script_exec(
        Some(0),
        "Tests run: 4, Failures: 0, Errors: 0, Skipped: 0\nBUILD SUCCESS",
    );

    let facade = facade_in(&dir, &rt);
    facade.execute("mvn test", None, None).await.unwrap();

    facade.with_ledger(|ledger| {
        assert_eq!(ledger.tests().len(), 1);
        assert_eq!(ledger.last_successful_test(), Some("mvn test"));
        assert_eq!(ledger.tests()[0].stats.unwrap().total, 4);
    });
}

#[tokio::test]
async fn plain_shell_commands_stay_out_of_the_ledger() {
    let dir = TempDir::new().unwrap();
    let rt = Arc::new(FakeRuntime::new());
    rt.script_exec(Some(0), "file1\nfile2\n");

    let facade = facade_in(&dir, &rt);
    facade.execute("ls -la", None, None).await.unwrap();

    facade.with_ledger(|ledger| {
        assert!(ledger.builds().is_empty());
        assert!(ledger.tests().is_empty());
    });
}

#[tokio::test(start_paused = true)]
async fn run_routes_long_running_commands_to_the_monitored_path() {
    let dir = TempDir::new().unwrap();
    let rt = Arc::new(FakeRuntime::new());
    rt.script_stream(vec![
        StreamStep::chunk(Duration::from_secs(1), "[INFO] BUILD SUCCESS\n"),
        StreamStep::exited(Duration::from_millis(10), Some(0)),
    ]);

    let facade = facade_in(&dir, &rt);
    let out = facade.run("mvn clean install", Some("/workspace/app")).await.unwrap();
    assert!(out.result.success);

    // The monitored path rewrote the command with batch flags
    let commands = rt.commands();
    assert_eq!(commands.len(), 1);
    assert!(commands[0].contains("-B"));
    assert!(commands[0].contains("surefire.timeout"));
}

#[tokio::test]
async fn run_routes_short_commands_to_the_one_shot_path() {
    let dir = TempDir::new().unwrap();
    let rt = Arc::new(FakeRuntime::new());
    rt.script_exec(Some(0), "hello\n");

    let facade = facade_in(&dir, &rt);
    let out = facade.run("echo hello", None).await.unwrap();
    assert!(out.result.success);
    assert_eq!(rt.commands(), vec!["echo hello".to_string()]);
}

#[tokio::test]
async fn replay_last_build_verifies_against_fresh_output() {
    let dir = TempDir::new().unwrap();
    let rt = Arc::new(FakeRuntime::new());
    rt.script_exec(Some(0), "[INFO] BUILD SUCCESS");
    rt.script_exec(Some(0), "[INFO] BUILD SUCCESS");

    let facade = facade_in(&dir, &rt);
    facade.execute("mvn install", Some("/workspace/app"), None).await.unwrap();

    let outcome = facade.replay_last_build().await.unwrap();
    assert!(outcome.success);
    assert_eq!(outcome.exit_code, Some(0));
    // The replay re-issued the exact recorded command in its workdir
    assert_eq!(rt.commands()[1], "cd /workspace/app && mvn install");
}
