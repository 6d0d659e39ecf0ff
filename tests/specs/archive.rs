// SPDX-License-Identifier: MIT

//! Archive specs: archive-then-truncate through the facade, and the
//! reference-resolution guarantees.

use crate::prelude::*;

/// A 50,000-char output: retrieval is exact, and the truncation embeds a
/// resolvable refId while staying near the configured max length.
#[tokio::test]
async fn oversized_output_archives_exactly_and_truncates_with_reference() {
    let dir = TempDir::new().unwrap();
    let rt = Arc::new(FakeRuntime::new());
    let output = format!("FIRSTLINE{}LASTLINE", "z".repeat(50_000 - 17));
    assert_eq!(output.chars().count(), 50_000);
    rt.script_exec(Some(0), output.clone());

    let facade = facade(&dir, &rt);
    let out = facade.execute("cat build.log", None, None).await.unwrap();

    let ref_id = out.archive_ref.expect("50k chars is past the threshold");

    // Retrieval returns the exact original, twice
    let first = facade.retrieve(&ref_id).unwrap().expect("ref resolves");
    assert_eq!(first, output);
    assert_eq!(facade.retrieve(&ref_id).unwrap().as_deref(), Some(output.as_str()));

    // The inline output is a bounded head/tail excerpt with the reference
    let inline = &out.result.output;
    assert!(inline.chars().count() <= 950);
    assert!(inline.starts_with("FIRSTLINE"));
    assert!(inline.ends_with("LASTLINE"));
    assert!(inline.contains(&ref_id));
}

/// Output at or under the threshold passes through unmodified and leaves no
/// archive record behind.
#[tokio::test]
async fn small_output_creates_no_archive_record() {
    let dir = TempDir::new().unwrap();
    let rt = Arc::new(FakeRuntime::new());
    rt.script_exec(Some(0), "short and sweet");

    let facade = facade(&dir, &rt);
    let out = facade.execute("echo hi", None, None).await.unwrap();

    assert_eq!(out.result.output, "short and sweet");
    assert_eq!(out.archive_ref, None);
    assert!(facade.search(None, None, None, 10).unwrap().is_empty());
}

/// Archived outputs are searchable by pattern, and a malformed pattern is
/// rejected before any archive access.
#[tokio::test]
async fn search_finds_archived_output_and_rejects_bad_patterns() {
    let dir = TempDir::new().unwrap();
    let rt = Arc::new(FakeRuntime::new());
    let output = format!("{}\nCaused by: OutOfMemoryError\n{}", "x".repeat(9_000), "y".repeat(9_000));
    rt.script_exec(Some(1), output);

    let facade = facade(&dir, &rt);
    facade.execute("mvn install", None, None).await.unwrap();

    let hits = facade.search(Some("OutOfMemoryError"), Some("task-1"), None, 10).unwrap();
    assert_eq!(hits.len(), 1);

    assert!(facade.search(Some("(unclosed"), None, None, 10).is_err());
}
