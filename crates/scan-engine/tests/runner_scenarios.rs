//! Scan runner integration tests
//!
//! Drives `ScanRunner` end to end against the in-memory store and a scripted oracle:
//! manifest -> eligibility -> oracle -> issues -> progress -> summary.

mod common;

use std::collections::BTreeSet;
use std::sync::Arc;

use tokio_util::sync::CancellationToken;

use codewarden_core::error::{OracleError, ScanError};
use codewarden_core::pipeline::BoxFuture;
use codewarden_core::types::{Issue, ScanJob, ScanStatus};
use codewarden_scan_engine::store::ResultStore;
use codewarden_scan_engine::{
    AnalysisOracle, InvalidationStrategy, OracleResponse, ProgressPolicy, ScanEngineConfigBuilder,
    ScanEngineError, ScanRunner, parse_findings,
};

use common::{
    FailingInsertStore, NO_ISSUES, ProjectFixture, Reply, ScriptedOracle, register, shared_store,
    test_config,
};

const ONE_HIGH: &str = r#"{"issues":[{"type":"X","severity":"high","lines":[3],"description":"d","recommendation":"r"}]}"#;

fn old_issue(scan_id: &str, project_id: &str, path: &str) -> Issue {
    Issue {
        id: format!("{scan_id}-{path}"),
        scan_id: scan_id.to_owned(),
        project_id: project_id.to_owned(),
        file_path: path.to_owned(),
        lines: BTreeSet::from([1]),
        issue_type: "Legacy".to_owned(),
        severity: "LOW".to_owned(),
        name: None,
        description: "old".to_owned(),
        recommendation: "old".to_owned(),
        cwe: None,
        owasp: None,
    }
}

/// Scenario 1: eligible file analyzed, image never sent to the oracle
#[tokio::test]
async fn scenario_eligible_file_is_analyzed_and_image_skipped() {
    // Given
    let fixture = ProjectFixture::new(
        "p1",
        &[("a.py", "import os\nx = 1\nos.system(x)\n"), ("img.png", "PNG..")],
        Some(serde_json::json!([
            { "path": "a.py", "isDir": false, "size": 10 },
            { "path": "img.png", "isDir": false, "size": 5 }
        ])),
    );
    let store = shared_store();
    register(store.as_ref(), &fixture.project, "s1").await;
    let oracle = Arc::new(ScriptedOracle::new().raw("a.py", ONE_HIGH));
    let runner = ScanRunner::new(store.clone(), oracle.clone(), test_config());

    // When
    let summary = runner
        .run(&ScanJob::new("s1", "p1"), &CancellationToken::new())
        .await
        .unwrap();

    // Then
    assert_eq!(summary.total_issues, 1);
    assert_eq!(summary.issues_by_severity.high, 1);
    assert_eq!(summary.scanned_files, 1);
    assert_eq!(oracle.calls(), vec!["a.py".to_owned()]);

    let scan = store.get_scan("s1").await.unwrap();
    assert_eq!(scan.status, ScanStatus::Done);
    assert_eq!(scan.progress, 100);
    assert!(scan.started_at.is_some());
    assert!(scan.finished_at.is_some());
    assert_eq!(scan.results.as_ref(), Some(&summary));

    let issues = store.issues_for_scan("s1").await.unwrap();
    assert_eq!(issues.len(), 1);
    assert_eq!(issues[0].file_path, "a.py");
    assert_eq!(issues[0].severity, "HIGH");
    assert_eq!(issues[0].project_id, "p1");
    assert!(issues[0].lines.contains(&3));
}

/// Scenario 2: reasoning markers are stripped, empty findings are not an error
#[tokio::test]
async fn scenario_reasoning_wrapped_empty_findings() {
    let fixture = ProjectFixture::with_files("p1", &[("main.go", "package main")]);
    let store = shared_store();
    register(store.as_ref(), &fixture.project, "s1").await;
    let oracle = Arc::new(
        ScriptedOracle::new().raw("main.go", "<think>reasoning</think>{\"issues\":[]}"),
    );
    let runner = ScanRunner::new(store.clone(), oracle, test_config());

    let summary = runner
        .run(&ScanJob::new("s1", "p1"), &CancellationToken::new())
        .await
        .unwrap();

    assert_eq!(summary.total_issues, 0);
    assert_eq!(summary.scanned_files, 1);
    assert!(summary.error.is_none());
    assert_eq!(store.get_scan("s1").await.unwrap().status, ScanStatus::Done);
    assert!(store.issues_for_scan("s1").await.unwrap().is_empty());
}

/// Scenario 3: missing manifest fails fast from queued
#[tokio::test]
async fn scenario_missing_manifest_fails_directly_from_queued() {
    let fixture = ProjectFixture::new("p1", &[("a.py", "x")], None);
    let store = shared_store();
    register(store.as_ref(), &fixture.project, "s1").await;
    let oracle = Arc::new(ScriptedOracle::new());
    let runner = ScanRunner::new(store.clone(), oracle.clone(), test_config());

    let err = runner
        .run(&ScanJob::new("s1", "p1"), &CancellationToken::new())
        .await
        .unwrap_err();

    assert!(matches!(
        err,
        ScanEngineError::Scan(ScanError::ManifestMissing { .. })
    ));

    let scan = store.get_scan("s1").await.unwrap();
    assert_eq!(scan.status, ScanStatus::Failed);
    assert!(scan.started_at.is_none(), "scan never entered running");
    assert!(scan.finished_at.is_some());
    let results = scan.results.unwrap();
    assert_eq!(results.total_issues, 0);
    assert_eq!(results.scanned_files, 0);
    assert!(results.issues_by_type.is_empty());
    assert!(!results.error.unwrap_or_default().is_empty());

    assert!(store.progress_log("s1").await.is_empty());
    assert_eq!(store.issue_count("p1").await, 0);
    assert!(oracle.calls().is_empty());
}

/// Scenario 4: skipped entries do not write progress under the default policy
#[tokio::test]
async fn scenario_progress_written_only_for_attempted_entries() {
    let files: Vec<(String, &str)> = (1..=10)
        .map(|i| {
            let name = if (3..=7).contains(&i) {
                format!("asset{i}.png")
            } else {
                format!("mod{i}.py")
            };
            (name, "pass")
        })
        .collect();
    let refs: Vec<(&str, &str)> = files.iter().map(|(p, c)| (p.as_str(), *c)).collect();
    let fixture = ProjectFixture::with_files("p1", &refs);

    let store = shared_store();
    register(store.as_ref(), &fixture.project, "s1").await;
    let runner = ScanRunner::new(store.clone(), Arc::new(ScriptedOracle::new()), test_config());

    runner
        .run(&ScanJob::new("s1", "p1"), &CancellationToken::new())
        .await
        .unwrap();

    assert_eq!(store.progress_log("s1").await, vec![10, 20, 80, 90, 100]);
    assert_eq!(store.get_scan("s1").await.unwrap().progress, 100);
}

/// Every-entry policy records a value for every manifest entry
#[tokio::test]
async fn every_entry_policy_records_skipped_entries_too() {
    let fixture = ProjectFixture::with_files(
        "p1",
        &[("a.png", ""), ("b.py", "pass"), ("c.png", ""), ("d.png", "")],
    );
    let store = shared_store();
    register(store.as_ref(), &fixture.project, "s1").await;
    let config = ScanEngineConfigBuilder::new()
        .progress_policy(ProgressPolicy::EveryEntry)
        .build()
        .unwrap();
    let runner = ScanRunner::new(store.clone(), Arc::new(ScriptedOracle::new()), config);

    runner
        .run(&ScanJob::new("s1", "p1"), &CancellationToken::new())
        .await
        .unwrap();

    assert_eq!(store.progress_log("s1").await, vec![25, 50, 75, 100]);
}

/// Trailing skipped entries still end at 100 via the forced completion write
#[tokio::test]
async fn progress_is_forced_to_100_on_completion() {
    let fixture = ProjectFixture::with_files("p1", &[("a.py", "pass"), ("b.png", "")]);
    let store = shared_store();
    register(store.as_ref(), &fixture.project, "s1").await;
    let runner = ScanRunner::new(store.clone(), Arc::new(ScriptedOracle::new()), test_config());

    runner
        .run(&ScanJob::new("s1", "p1"), &CancellationToken::new())
        .await
        .unwrap();

    let log = store.progress_log("s1").await;
    assert_eq!(log, vec![50, 100]);
    assert!(log.windows(2).all(|w| w[0] <= w[1]));
}

/// Per-file failures never abort the scan
#[tokio::test]
async fn per_file_failures_are_isolated() {
    let fixture = ProjectFixture::new(
        "p1",
        &[
            ("a.py", "a"),
            ("b.py", "b"),
            ("c.py", "c"),
            ("e.py", "e"),
            ("f.py", "f"),
        ],
        Some(serde_json::json!([
            { "path": "a.py", "isDir": false, "size": 1 },
            { "path": "b.py", "isDir": false, "size": 1 },
            { "path": "c.py", "isDir": false, "size": 1 },
            { "path": "d.py", "isDir": false, "size": 1 },
            { "path": "e.py", "isDir": false, "size": 1 },
            { "path": "f.py", "isDir": false, "size": 1 }
        ])),
    );
    let store = shared_store();
    register(store.as_ref(), &fixture.project, "s1").await;
    let oracle = Arc::new(
        ScriptedOracle::new()
            .reply("a.py", Reply::Transport("connection refused".to_owned()))
            .raw("b.py", r#"{"findings": []}"#)
            .reply("c.py", Reply::Status(500))
            .raw("e.py", ONE_HIGH)
            .raw("f.py", "Sorry, I cannot help with that."),
    );
    let runner = ScanRunner::new(store.clone(), oracle.clone(), test_config());

    let summary = runner
        .run(&ScanJob::new("s1", "p1"), &CancellationToken::new())
        .await
        .unwrap();

    // d.py is missing on disk and never reaches the oracle
    assert_eq!(
        oracle.calls(),
        vec!["a.py", "b.py", "c.py", "e.py", "f.py"]
            .into_iter()
            .map(String::from)
            .collect::<Vec<_>>()
    );
    assert_eq!(summary.total_issues, 1);
    assert_eq!(summary.scanned_files, 6);

    let scan = store.get_scan("s1").await.unwrap();
    assert_eq!(scan.status, ScanStatus::Done);
    assert_eq!(scan.progress, 100);
    let issues = store.issues_for_scan("s1").await.unwrap();
    assert_eq!(issues.len(), 1);
    assert_eq!(issues[0].file_path, "e.py");
}

/// Manifest paths leaving the project root are per-file failures
#[tokio::test]
async fn parent_paths_never_leave_project_root() {
    let mut fixture = ProjectFixture::new(
        "p1",
        &[("inner/app.py", "a"), ("secret.py", "KEY = 'abc'")],
        Some(serde_json::json!([
            { "path": "app.py", "isDir": false, "size": 1 },
            { "path": "../secret.py", "isDir": false, "size": 11 },
            { "path": "/../secret.py", "isDir": false, "size": 11 },
            { "path": "nested/../../secret.py", "isDir": false, "size": 11 }
        ])),
    );
    fixture.project.root_path = fixture.dir.path().join("inner");
    let store = shared_store();
    register(store.as_ref(), &fixture.project, "s1").await;
    let oracle = Arc::new(ScriptedOracle::new().raw("app.py", ONE_HIGH));
    let runner = ScanRunner::new(store.clone(), oracle.clone(), test_config());

    let summary = runner
        .run(&ScanJob::new("s1", "p1"), &CancellationToken::new())
        .await
        .unwrap();

    // secret.py exists beside the root but is never read
    assert_eq!(oracle.calls(), vec!["app.py".to_owned()]);
    assert_eq!(summary.scanned_files, 4);
    assert_eq!(summary.total_issues, 1);
    let scan = store.get_scan("s1").await.unwrap();
    assert_eq!(scan.status, ScanStatus::Done);
    assert_eq!(scan.progress, 100);
}

/// Oversized files are per-file failures and never reach the oracle
#[tokio::test]
async fn oversized_file_is_skipped_as_failure() {
    let big = "x".repeat(2048);
    let fixture = ProjectFixture::with_files("p1", &[("big.sql", &big), ("small.sql", "select 1")]);
    let store = shared_store();
    register(store.as_ref(), &fixture.project, "s1").await;
    let oracle = Arc::new(ScriptedOracle::new());
    let config = ScanEngineConfigBuilder::new()
        .max_file_size(1024)
        .build()
        .unwrap();
    let runner = ScanRunner::new(store.clone(), oracle.clone(), config);

    let summary = runner
        .run(&ScanJob::new("s1", "p1"), &CancellationToken::new())
        .await
        .unwrap();

    assert_eq!(oracle.calls(), vec!["small.sql".to_owned()]);
    assert_eq!(summary.scanned_files, 2);
}

/// Malformed manifest is scan-fatal
#[tokio::test]
async fn malformed_manifest_fails_scan() {
    let fixture = ProjectFixture::new("p1", &[], Some(serde_json::json!({ "files": [] })));
    let store = shared_store();
    register(store.as_ref(), &fixture.project, "s1").await;
    let runner = ScanRunner::new(store.clone(), Arc::new(ScriptedOracle::new()), test_config());

    let err = runner
        .run(&ScanJob::new("s1", "p1"), &CancellationToken::new())
        .await
        .unwrap_err();
    assert!(matches!(
        err,
        ScanEngineError::Scan(ScanError::ManifestMalformed { .. })
    ));

    let scan = store.get_scan("s1").await.unwrap();
    assert_eq!(scan.status, ScanStatus::Failed);
    assert!(scan.results.unwrap().error.unwrap().contains("malformed"));
}

/// Unknown project is scan-fatal
#[tokio::test]
async fn unknown_project_fails_scan() {
    let store = shared_store();
    store
        .create_scan(codewarden_core::types::Scan::queued("s1", "ghost"))
        .await
        .unwrap();
    let runner = ScanRunner::new(store.clone(), Arc::new(ScriptedOracle::new()), test_config());

    let err = runner
        .run(&ScanJob::new("s1", "ghost"), &CancellationToken::new())
        .await
        .unwrap_err();
    assert!(matches!(err, ScanEngineError::Store(_)));
    assert_eq!(store.get_scan("s1").await.unwrap().status, ScanStatus::Failed);
}

/// A result store failure inside the loop fails the scan
#[tokio::test]
async fn store_failure_is_scan_fatal() {
    let fixture = ProjectFixture::with_files("p1", &[("a.py", "x"), ("b.py", "y")]);
    let store = Arc::new(FailingInsertStore::new());
    register(store.as_ref(), &fixture.project, "s1").await;
    let oracle = Arc::new(ScriptedOracle::new().raw("a.py", ONE_HIGH));
    let runner = ScanRunner::new(store.clone(), oracle.clone(), test_config());

    let err = runner
        .run(&ScanJob::new("s1", "p1"), &CancellationToken::new())
        .await
        .unwrap_err();

    assert!(matches!(err, ScanEngineError::Store(_)));
    assert_eq!(oracle.calls(), vec!["a.py".to_owned()]);

    let scan = store.get_scan("s1").await.unwrap();
    assert_eq!(scan.status, ScanStatus::Failed);
    let results = scan.results.unwrap();
    assert_eq!(results.total_issues, 0);
    assert!(results.error.unwrap().contains("disk full"));
}

/// New scan clears only its own project's findings
#[tokio::test]
async fn new_scan_resets_only_its_project() {
    let p1 = ProjectFixture::with_files("p1", &[("a.py", "x")]);
    let p2 = ProjectFixture::with_files("p2", &[("b.py", "y")]);
    let store = shared_store();
    register(store.as_ref(), &p1.project, "s-new").await;
    register(store.as_ref(), &p2.project, "s-other").await;
    store
        .insert_issues(vec![
            old_issue("s-old", "p1", "a.py"),
            old_issue("s-old", "p1", "gone.py"),
            old_issue("s-other", "p2", "b.py"),
        ])
        .await
        .unwrap();

    let runner = ScanRunner::new(store.clone(), Arc::new(ScriptedOracle::new()), test_config());
    runner
        .run(&ScanJob::new("s-new", "p1"), &CancellationToken::new())
        .await
        .unwrap();

    assert_eq!(store.issue_count("p1").await, 0);
    assert_eq!(store.issue_count("p2").await, 1);
}

/// Prior-scans strategy deletes other scans' rows of the same project
#[tokio::test]
async fn prior_scans_strategy_keeps_other_projects() {
    let p1 = ProjectFixture::with_files("p1", &[("a.py", "x")]);
    let store = shared_store();
    register(store.as_ref(), &p1.project, "s-new").await;
    store
        .insert_issues(vec![
            old_issue("s-old", "p1", "a.py"),
            old_issue("s-x", "p9", "z.py"),
        ])
        .await
        .unwrap();

    let config = ScanEngineConfigBuilder::new()
        .invalidation(InvalidationStrategy::PriorScansOnly)
        .build()
        .unwrap();
    let oracle = Arc::new(ScriptedOracle::new().raw("a.py", ONE_HIGH));
    let runner = ScanRunner::new(store.clone(), oracle, config);
    runner
        .run(&ScanJob::new("s-new", "p1"), &CancellationToken::new())
        .await
        .unwrap();

    assert_eq!(store.issue_count("p1").await, 1);
    assert_eq!(store.issue_count("p9").await, 1);
    assert_eq!(store.issues_for_scan("s-new").await.unwrap().len(), 1);
}

/// Results are readable through the store's query operations
#[tokio::test]
async fn scan_results_and_history_after_two_scans() {
    let fixture = ProjectFixture::with_files("p1", &[("a.py", "x"), ("b.js", "y")]);
    let store = shared_store();
    register(store.as_ref(), &fixture.project, "s1").await;
    let oracle = Arc::new(
        ScriptedOracle::new()
            .raw(
                "a.py",
                r#"{"issues":[{"type":"Info leak","severity":"low","lines":[1]}]}"#,
            )
            .raw(
                "b.js",
                r#"{"issues":[{"type":"XSS","severity":"critical","lines":[2]}]}"#,
            ),
    );
    let runner = ScanRunner::new(store.clone(), oracle, test_config());
    runner
        .run(&ScanJob::new("s1", "p1"), &CancellationToken::new())
        .await
        .unwrap();

    store
        .create_scan(codewarden_core::types::Scan::queued("s2", "p1"))
        .await
        .unwrap();
    tokio::time::sleep(std::time::Duration::from_millis(5)).await;
    runner
        .run(&ScanJob::new("s2", "p1"), &CancellationToken::new())
        .await
        .unwrap();

    let results = store.scan_results("s2").await.unwrap();
    assert_eq!(results.issues.len(), 2);
    assert_eq!(results.issues[0].severity, "CRITICAL");
    assert_eq!(results.issues[1].severity, "LOW");
    assert!(results.issues.iter().all(|i| i.scan_id == "s2"));

    let history = store.scan_history("p1").await.unwrap();
    let ids: Vec<_> = history.iter().map(|s| s.id.as_str()).collect();
    assert_eq!(ids, vec!["s2", "s1"]);
}

/// Cancellation before the scan starts records cancelled without running
#[tokio::test]
async fn cancelled_before_start() {
    let fixture = ProjectFixture::with_files("p1", &[("a.py", "x")]);
    let store = shared_store();
    register(store.as_ref(), &fixture.project, "s1").await;
    let oracle = Arc::new(ScriptedOracle::new());
    let runner = ScanRunner::new(store.clone(), oracle.clone(), test_config());

    let token = CancellationToken::new();
    token.cancel();
    let err = runner.run(&ScanJob::new("s1", "p1"), &token).await.unwrap_err();

    assert!(err.is_cancelled());
    let scan = store.get_scan("s1").await.unwrap();
    assert_eq!(scan.status, ScanStatus::Cancelled);
    assert!(oracle.calls().is_empty());
}

/// Oracle that triggers cancellation while the first file is in flight
struct CancellingOracle {
    token: CancellationToken,
}

impl AnalysisOracle for CancellingOracle {
    fn name(&self) -> &str {
        "cancelling"
    }

    fn analyze<'a>(
        &'a self,
        _filename: &'a str,
        _source: &'a str,
    ) -> BoxFuture<'a, Result<OracleResponse, OracleError>> {
        Box::pin(async move {
            self.token.cancel();
            Ok(parse_findings(ONE_HIGH))
        })
    }
}

/// Cancellation mid-scan finishes the in-flight file, then stops
#[tokio::test]
async fn cancelled_mid_scan_after_in_flight_file() {
    let fixture = ProjectFixture::with_files("p1", &[("a.py", "x"), ("b.py", "y"), ("c.py", "z")]);
    let store = shared_store();
    register(store.as_ref(), &fixture.project, "s1").await;
    let token = CancellationToken::new();
    let oracle = Arc::new(CancellingOracle {
        token: token.clone(),
    });
    let runner = ScanRunner::new(store.clone(), oracle, test_config());

    let err = runner.run(&ScanJob::new("s1", "p1"), &token).await.unwrap_err();
    assert!(err.is_cancelled());

    let scan = store.get_scan("s1").await.unwrap();
    assert_eq!(scan.status, ScanStatus::Cancelled);
    assert!(scan.progress < 100);
    assert_eq!(scan.results.unwrap().error.as_deref(), Some("scan cancelled"));
    // the in-flight file's findings are kept
    assert_eq!(store.issues_for_scan("s1").await.unwrap().len(), 1);
}

/// Terminal scans are not re-run
#[tokio::test]
async fn finished_scan_cannot_run_again() {
    let fixture = ProjectFixture::with_files("p1", &[("a.py", "x")]);
    let store = shared_store();
    register(store.as_ref(), &fixture.project, "s1").await;
    let runner = ScanRunner::new(
        store.clone(),
        Arc::new(ScriptedOracle::new().raw("a.py", NO_ISSUES)),
        test_config(),
    );
    runner
        .run(&ScanJob::new("s1", "p1"), &CancellationToken::new())
        .await
        .unwrap();
    let first = store.get_scan("s1").await.unwrap();

    let err = runner
        .run(&ScanJob::new("s1", "p1"), &CancellationToken::new())
        .await
        .unwrap_err();
    assert!(matches!(err, ScanEngineError::Store(_)));

    let second = store.get_scan("s1").await.unwrap();
    assert_eq!(second.status, ScanStatus::Done);
    assert_eq!(second.finished_at, first.finished_at);
    assert_eq!(second.results, first.results);
}
