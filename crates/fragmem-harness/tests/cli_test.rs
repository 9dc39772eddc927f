//! Integration tests: `harness` binary subcommands.
//!
//! Run: cargo test -p fragmem-harness --test cli_test

use std::path::{Path, PathBuf};
use std::process::Command;
use std::time::{SystemTime, UNIX_EPOCH};

use fragmem_harness::StressReport;
use fragmem_harness::structured_log::{ArtifactIndex, sha256_hex, validate_log_file};

fn unique_tmp_dir(prefix: &str) -> PathBuf {
    let nanos = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .expect("system time should be after UNIX_EPOCH")
        .as_nanos();
    let dir = std::env::temp_dir().join(format!("{prefix}-{}-{nanos}", std::process::id()));
    std::fs::create_dir_all(&dir).expect("create temp dir");
    dir
}

fn harness() -> Command {
    Command::new(env!("CARGO_BIN_EXE_harness"))
}

fn scripts_dir() -> PathBuf {
    Path::new(env!("CARGO_MANIFEST_DIR")).join("scripts")
}

#[test]
fn demo_prints_walkthrough_and_writes_log() {
    let dir = unique_tmp_dir("fragmem-cli-demo");
    let log = dir.join("demo.jsonl");
    let out = harness()
        .args(["demo", "--log"])
        .arg(&log)
        .output()
        .expect("run harness demo");
    assert!(out.status.success(), "{}", String::from_utf8_lossy(&out.stderr));

    let stdout = String::from_utf8_lossy(&out.stdout);
    assert!(stdout.contains("After freeing blocks 1 and 3:"));
    assert!(stdout.ends_with("Total free memory: 0\n"));

    let (lines, errors) = validate_log_file(&log).unwrap();
    assert!(errors.is_empty(), "{errors:?}");
    assert!(lines > 2);

    std::fs::remove_dir_all(&dir).ok();
}

#[test]
fn replay_writes_transcript_and_artifact_index() {
    let dir = unique_tmp_dir("fragmem-cli-replay");
    let log = dir.join("replay.jsonl");
    let index = dir.join("index.json");
    let script = scripts_dir().join("coalesce.replay");

    let out = harness()
        .arg("replay")
        .arg(&script)
        .arg("--log")
        .arg(&log)
        .arg("--artifact-index")
        .arg(&index)
        .output()
        .expect("run harness replay");
    assert!(out.status.success(), "{}", String::from_utf8_lossy(&out.stderr));
    assert!(String::from_utf8_lossy(&out.stdout).contains("verify ok"));

    let parsed: ArtifactIndex =
        serde_json::from_str(&std::fs::read_to_string(&index).unwrap()).unwrap();
    let kinds: Vec<&str> = parsed.artifacts.iter().map(|a| a.kind.as_str()).collect();
    assert_eq!(kinds, vec!["log", "script"]);
    let log_bytes = std::fs::read(&log).unwrap();
    assert_eq!(parsed.artifacts[0].sha256, sha256_hex(&log_bytes));

    std::fs::remove_dir_all(&dir).ok();
}

#[test]
fn failing_replay_exits_nonzero_but_still_logs() {
    let dir = unique_tmp_dir("fragmem-cli-replay-fail");
    let script = dir.join("bad.replay");
    std::fs::write(&script, "alloc a 4\nexpect-free 999\n").unwrap();
    let log = dir.join("fail.jsonl");

    let out = harness()
        .arg("replay")
        .arg(&script)
        .args(["--capacity", "16", "--log"])
        .arg(&log)
        .output()
        .expect("run harness replay");
    assert!(!out.status.success());
    assert!(String::from_utf8_lossy(&out.stderr).contains("expected 999 free bytes"));

    let content = std::fs::read_to_string(&log).unwrap();
    let last = content.lines().last().unwrap();
    assert!(last.contains("\"outcome\":\"fail\""), "{last}");

    std::fs::remove_dir_all(&dir).ok();
}

#[test]
fn stress_emits_passing_json_report() {
    let dir = unique_tmp_dir("fragmem-cli-stress");
    let report_path = dir.join("stress.json");
    let out = harness()
        .args([
            "stress",
            "--capacity",
            "4096",
            "--threads",
            "3",
            "--ops",
            "1500",
            "--seed",
            "0x1234",
            "--max-size",
            "128",
            "--output",
        ])
        .arg(&report_path)
        .output()
        .expect("run harness stress");
    assert!(out.status.success(), "{}", String::from_utf8_lossy(&out.stderr));

    let report: StressReport =
        serde_json::from_str(&std::fs::read_to_string(&report_path).unwrap()).unwrap();
    assert!(report.passed);
    assert_eq!(report.threads, 3);
    assert_eq!(report.seed, 0x1234);
    assert_eq!(report.final_free_total, 4096);

    std::fs::remove_dir_all(&dir).ok();
}

#[test]
fn artifact_index_requires_log() {
    let out = harness()
        .args(["stress", "--artifact-index", "x.json"])
        .output()
        .expect("run harness stress");
    assert!(!out.status.success());
}

#[test]
fn validate_log_rejects_broken_file() {
    let dir = unique_tmp_dir("fragmem-cli-validate");
    let log = dir.join("broken.jsonl");
    std::fs::write(&log, "{\"level\":\"info\"}\n").unwrap();

    let out = harness()
        .arg("validate-log")
        .arg(&log)
        .output()
        .expect("run harness validate-log");
    assert!(!out.status.success());
    assert!(String::from_utf8_lossy(&out.stderr).contains("trace_id"));

    std::fs::remove_dir_all(&dir).ok();
}
