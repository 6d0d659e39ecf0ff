// SPDX-License-Identifier: MIT

//! Replay validation specs: recorded commands re-run against the container
//! and outcomes re-derived from fresh output.

use crate::prelude::*;

const MAVEN_TEST_PASS: &str =
    "Tests run: 12, Failures: 0, Errors: 0, Skipped: 1\n[INFO] BUILD SUCCESS";

/// A build that exits 0 printing a recognized success marker replays as
/// success=true with a matching exit code on an unchanged container.
#[tokio::test]
async fn replay_last_build_confirms_an_unchanged_container() {
    let dir = TempDir::new().unwrap();
    let rt = Arc::new(FakeRuntime::new());
    rt.script_exec(Some(0), "[INFO] BUILD SUCCESS\n[INFO] Total time: 40s");
    rt.script_exec(Some(0), "[INFO] BUILD SUCCESS\n[INFO] Total time: 38s");

    let facade = facade(&dir, &rt);
    let first = facade.execute("mvn clean install", Some("/workspace/app"), None).await.unwrap();
    assert!(first.result.success);

    let outcome = facade.replay_last_build().await.unwrap();
    assert!(outcome.success);
    assert_eq!(outcome.exit_code, Some(0));
    assert_eq!(outcome.command, "mvn clean install");

    // Replay did not append to the ledger
    facade.with_ledger(|ledger| assert_eq!(ledger.builds().len(), 1));
}

/// Replay catches drift: the historical claim said success, the fresh run
/// says otherwise.
#[tokio::test]
async fn replay_detects_a_container_that_no_longer_builds() {
    let dir = TempDir::new().unwrap();
    let rt = Arc::new(FakeRuntime::new());
    rt.script_exec(Some(0), "[INFO] BUILD SUCCESS");
    rt.script_exec(Some(0), "[ERROR] BUILD FAILURE\n[ERROR] Failed to execute goal");

    let facade = facade(&dir, &rt);
    facade.execute("mvn install", None, None).await.unwrap();

    let outcome = facade.replay_last_build().await.unwrap();
    assert!(!outcome.success, "marker verdict wins over exit code");
}

/// Replaying all tests aggregates fresh statistics across every recorded
/// test command.
#[tokio::test]
async fn replay_all_tests_aggregates_across_commands() {
    let dir = TempDir::new().unwrap();
    let rt = Arc::new(FakeRuntime::new());
    rt.script_exec(Some(0), MAVEN_TEST_PASS);
    rt.script_exec(Some(0), "BUILD SUCCESSFUL\n8 tests completed");
    // Replays
    rt.script_exec(Some(0), MAVEN_TEST_PASS);
    rt.script_exec(Some(0), "BUILD SUCCESSFUL\n8 tests completed");

    let facade = facade(&dir, &rt);
    facade.execute("mvn test", Some("/workspace/a"), None).await.unwrap();
    facade.execute("gradle test", Some("/workspace/b"), None).await.unwrap();

    let summary = facade.replay_all_tests().await.unwrap();
    assert!(summary.success);
    assert_eq!(summary.total_commands, 2);
    assert_eq!(summary.successful_replays, 2);
    assert_eq!(summary.stats.total, 20);
    assert_eq!(summary.stats.failed, 0);
}

/// The ledger document round-trips through save and load.
#[tokio::test]
async fn ledger_document_survives_a_restart() {
    let dir = TempDir::new().unwrap();
    let rt = Arc::new(FakeRuntime::new());
    rt.script_exec(Some(0), "[INFO] BUILD SUCCESS");

    let facade = facade(&dir, &rt);
    facade.execute("mvn install", None, None).await.unwrap();

    let path = dir.path().join("ledger.json");
    facade.save_ledger(&path).unwrap();

    let loaded = vouch_ledger::CommandLedger::load_from_file(&path).unwrap();
    assert_eq!(loaded.builds().len(), 1);
    assert_eq!(loaded.last_successful_build(), Some("mvn install"));
}
