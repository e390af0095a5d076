//! End-to-end runs of the built-in fixture set.

use std::time::Duration;

use pthread_rs_harness::structured_log::{ArtifactIndex, LogEmitter, sha256_hex, validate_log_text};
use pthread_rs_harness::{ConformanceReport, FixtureSet, TestRunner, VerificationSummary};

fn runner() -> TestRunner {
    TestRunner::new("it").with_timeout(Duration::from_secs(20))
}

#[test]
fn builtin_fixtures_all_pass() {
    let results = runner().run(&FixtureSet::builtin());
    let summary = VerificationSummary::from_results(results);
    for r in summary.results.iter().filter(|r| !r.passed) {
        eprintln!("{}:\n{}", r.case_name, r.diff.as_deref().unwrap_or(""));
    }
    assert!(summary.all_passed(), "failed: {:?}", summary.failures());
    assert_eq!(summary.total, FixtureSet::builtin().cases.len());
}

#[test]
fn corpus_outputs_are_stable_across_runs() {
    let set = FixtureSet::builtin().filtered("cond_wait_incval");
    for _ in 0..5 {
        let results = runner().run(&set);
        assert!(results[0].passed, "{:?}", results[0].diff);
    }
}

#[test]
fn logged_run_emits_valid_jsonl() {
    let set = FixtureSet::builtin().filtered("mutex_");
    let (mut emitter, buffer) = LogEmitter::to_buffer("it", "r7");
    let results = runner().run_logged(&set, &mut emitter).unwrap();
    assert!(results.iter().all(|r| r.passed));

    let text = buffer.contents();
    let (valid, errors) = validate_log_text(&text);
    assert!(errors.is_empty(), "{errors:?}");
    // One run_start line plus one line per case.
    assert_eq!(valid, set.cases.len() + 1);
    assert!(text.contains("\"event\":\"case_result\""));
    assert!(text.contains("\"scenario\":\"mutex_shared_val_auto\""));
    assert!(text.contains("\"exit_code\":100"));
}

#[test]
fn fixture_file_round_trip_and_report() {
    let dir = std::env::temp_dir().join(format!("pthread-rs-harness-{}", std::process::id()));
    std::fs::create_dir_all(&dir).unwrap();
    let path = dir.join("fixtures.json");
    std::fs::write(&path, FixtureSet::builtin().to_json()).unwrap();

    let set = FixtureSet::from_file(&path).unwrap().filtered("join");
    assert!(!set.cases.is_empty());
    let summary = VerificationSummary::from_results(runner().run(&set));
    let report = ConformanceReport {
        title: "it".to_string(),
        campaign: "it".to_string(),
        timestamp: "2026-01-01T00:00:00.000Z".to_string(),
        summary,
        gate_probe: None,
    };
    assert!(report.to_markdown().contains("| join | POSIX pthread_join | PASS |"));

    let mut index = ArtifactIndex::new("r1");
    index.add_file(&path, "fixtures", None).unwrap();
    let bytes = std::fs::read(&path).unwrap();
    assert_eq!(index.artifacts[0].sha256, sha256_hex(&bytes));
    assert_eq!(index.artifacts[0].size_bytes, bytes.len() as u64);

    std::fs::remove_dir_all(&dir).unwrap();
}
