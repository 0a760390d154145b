use replaycheck::config::AppConfig;
use replaycheck::errors::ReplayCheckError;
use replaycheck::logging::JsonlLogger;
use replaycheck::loopback::Loopback;
use replaycheck::pipeline::run_verification;
use replaycheck::run_with_harness;
use replaycheck::runtime::{FakeClock, Harness};
use replaycheck::types::Termination;
use std::ffi::OsString;
use std::sync::Arc;
use std::time::Duration;

struct TestRun {
    loopback: Loopback,
    clock: FakeClock,
    harness: Harness,
    logger: JsonlLogger,
    _log_dir: tempfile::TempDir,
}

fn test_run() -> TestRun {
    let loopback = Loopback::new();
    let clock = FakeClock::default();
    let harness = Harness {
        clock: Arc::new(clock.clone()),
        transport: loopback.transport(),
        archive: loopback.archive(),
    };
    let log_dir = tempfile::tempdir().expect("tempdir");
    let logger = JsonlLogger::new(log_dir.path().join("run-log.jsonl"));
    TestRun {
        loopback,
        clock,
        harness,
        logger,
        _log_dir: log_dir,
    }
}

fn config(message_count: u64) -> AppConfig {
    let mut cfg = AppConfig::default();
    cfg.publish.message_count = message_count;
    cfg
}

#[test]
fn thousand_message_roundtrip_reports_full_efficiency() {
    let run = test_run();
    let cfg = config(1_000);

    let summary = run_verification(&cfg, &run.harness, &run.logger).expect("run");

    assert_eq!(summary.termination, Termination::Complete);
    assert!(summary.report.matched);
    assert_eq!(summary.report.message_count, 1_000);
    assert_eq!(summary.report.first_value, Some(0));
    assert_eq!(summary.report.last_value, Some(999));
    assert_eq!(summary.report.efficiency_pct, 100.0);
    assert_eq!(summary.recording.recorded_bytes(), Some(8_000));
}

#[test]
fn truncated_replay_is_reported_as_a_mismatch_not_an_error() {
    let run = test_run();
    run.loopback.set_replay_truncate_after(500);
    let mut cfg = config(1_000);
    cfg.consume.idle_poll_limit = 50;

    let summary = run_verification(&cfg, &run.harness, &run.logger).expect("run");

    assert_eq!(summary.termination, Termination::Idle);
    assert!(!summary.report.matched);
    assert_eq!(summary.report.message_count, 500);
    assert_eq!(summary.report.last_value, Some(499));
    assert_eq!(summary.report.efficiency_pct, 50.0);
}

#[test]
fn stripped_session_qualifiers_are_recovered_by_the_fallback_lookup() {
    let run = test_run();
    run.loopback.set_strip_session_qualifier(true);
    let cfg = config(100);

    let summary = run_verification(&cfg, &run.harness, &run.logger).expect("run");
    assert!(summary.report.matched);
    assert_eq!(summary.recording.channel, "aeron:ipc");
}

#[test]
fn indexing_lag_within_the_retry_budget_still_verifies() {
    let run = test_run();
    run.loopback.set_index_lag_lookups(6);
    let cfg = config(100);

    let summary = run_verification(&cfg, &run.harness, &run.logger).expect("run");
    assert!(summary.report.matched);
}

#[test]
fn unindexed_recording_fails_after_the_full_retry_schedule() {
    let run = test_run();
    run.loopback.set_index_lag_lookups(u32::MAX);
    let cfg = config(10);

    let err = run_verification(&cfg, &run.harness, &run.logger).expect_err("never indexed");
    assert!(matches!(
        err,
        ReplayCheckError::RecordingNotFound { attempts: 10, .. }
    ));

    // Settle (2s) plus nine 500ms inter-attempt delays.
    let total: Duration = run.clock.sleeps().iter().sum();
    assert_eq!(total, Duration::from_millis(6_500));

    // The failure leaves a diagnostic listing in the run log.
    let log = std::fs::read_to_string(run.logger.path.clone()).expect("read log");
    assert!(log.contains("\"known_recordings\""));
    assert!(log.lines().any(|line| line.contains("\"level\":\"error\"")));
}

#[test]
fn unconnected_publication_aborts_the_run_early() {
    let run = test_run();
    run.loopback.set_publications_never_connect(true);
    let cfg = config(10);

    let err = run_verification(&cfg, &run.harness, &run.logger).expect_err("no consumer");
    assert!(matches!(
        err,
        ReplayCheckError::ConnectTimeout {
            endpoint: "publication",
            polls: 1_000,
            ..
        }
    ));
}

#[test]
fn run_log_traces_every_phase_in_order() {
    let run = test_run();
    let cfg = config(25);

    run_verification(&cfg, &run.harness, &run.logger).expect("run");

    let log = std::fs::read_to_string(run.logger.path.clone()).expect("read log");
    let phases: Vec<String> = log
        .lines()
        .map(|line| {
            let value: serde_json::Value = serde_json::from_str(line).expect("json line");
            value["phase"].as_str().expect("phase").to_string()
        })
        .collect();
    assert_eq!(
        phases,
        vec!["publish", "publish", "locate", "replay", "consume", "report"]
    );
}

fn cli_args(run: &TestRun, extra: &[&str]) -> Vec<OsString> {
    let mut args: Vec<OsString> = ["replaycheck", "--run-log"].iter().map(OsString::from).collect();
    args.push(run._log_dir.path().join("run-log.jsonl").into());
    args.extend(extra.iter().map(OsString::from));
    args
}

#[test]
fn verified_run_maps_to_a_zero_exit_code() {
    let run = test_run();
    let args = cli_args(&run, &["--messages", "200"]);

    let code = run_with_harness(&args, &run.harness).expect("clean run");
    assert_eq!(code, 0);
}

#[test]
fn truncated_replay_maps_to_a_failing_exit_code() {
    let run = test_run();
    run.loopback.set_replay_truncate_after(100);
    let args = cli_args(&run, &["--messages", "200", "--idle-limit", "40"]);

    // The mismatch is a clean run with a failing verdict, not an Err.
    let code = run_with_harness(&args, &run.harness).expect("clean run");
    assert_eq!(code, 1);
}

#[test]
fn repeated_runs_keep_recordings_apart() {
    let run = test_run();
    let cfg = config(10);

    let first = run_verification(&cfg, &run.harness, &run.logger).expect("first run");
    let second = run_verification(&cfg, &run.harness, &run.logger).expect("second run");

    assert!(first.report.matched);
    assert!(second.report.matched);
    assert_ne!(first.recording.recording_id, second.recording.recording_id);
}
