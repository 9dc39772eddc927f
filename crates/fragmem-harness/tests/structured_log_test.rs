//! Integration tests: structured JSONL logs and artifact index.
//!
//! Validates:
//! 1. Allocator lifecycle records convert into schema-valid log lines.
//! 2. File emitters produce files that `validate_log_file` accepts.
//! 3. Artifact index digests match the bytes on disk.
//!
//! Run: cargo test -p fragmem-harness --test structured_log_test

use std::path::PathBuf;
use std::time::{SystemTime, UNIX_EPOCH};

use fragmem_core::{Allocator, AllocatorConfig, CheckLevel};
use fragmem_harness::structured_log::{
    ArtifactIndex, LogEmitter, LogEntry, LogLevel, Outcome, sha256_hex, validate_log_file,
    validate_log_line,
};

fn unique_tmp_dir(prefix: &str) -> PathBuf {
    let nanos = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .expect("system time should be after UNIX_EPOCH")
        .as_nanos();
    let dir = std::env::temp_dir().join(format!("{prefix}-{}-{nanos}", std::process::id()));
    std::fs::create_dir_all(&dir).expect("create temp dir");
    dir
}

fn busy_allocator() -> Allocator {
    let alloc = Allocator::with_config(
        AllocatorConfig::new(8)
            .with_check(CheckLevel::Full)
            .with_log_capacity(128),
    )
    .unwrap();
    let a = alloc.allocate(3).unwrap();
    let _b = alloc.allocate(3).unwrap();
    alloc.release(&a).unwrap();
    let _ = alloc.allocate(100);
    let _ = alloc.release(&a);
    alloc.allocate(4).unwrap();
    alloc
}

#[test]
fn lifecycle_records_become_valid_lines() {
    let alloc = busy_allocator();
    let records = alloc.drain_lifecycle_logs();
    assert!(!records.is_empty());

    let mut emitter = LogEmitter::to_buffer("unit");
    let written = emitter.emit_allocator_records(&records).unwrap();
    assert_eq!(written, records.len());

    let text = emitter.contents();
    let entries: Vec<LogEntry> = text
        .lines()
        .enumerate()
        .map(|(i, line)| validate_log_line(line, i + 1).unwrap())
        .collect();
    assert_eq!(entries.len(), records.len());

    for (entry, record) in entries.iter().zip(&records) {
        assert_eq!(entry.trace_id, record.trace_id);
        assert_eq!(entry.decision_id, Some(record.decision_id));
        assert_eq!(entry.symbol.as_deref(), Some(record.symbol));
        assert_eq!(entry.decision.as_deref(), Some(record.outcome));
        assert_eq!(entry.free_total, Some(record.free_total));
        assert_eq!(entry.run_id.as_deref(), Some("unit"));
    }

    let oom = entries
        .iter()
        .find(|e| e.event == "out_of_memory")
        .expect("out_of_memory record");
    assert_eq!(oom.level, LogLevel::Info);
    assert_eq!(oom.size, Some(100));

    let double_free = entries
        .iter()
        .find(|e| e.event == "segment_not_found")
        .expect("segment_not_found record");
    assert_eq!(double_free.level, LogLevel::Warn);
    assert_eq!(double_free.decision.as_deref(), Some("denied"));

    let fragmented = entries
        .iter()
        .find(|e| e.event == "alloc" && e.segments == Some(2))
        .expect("fragmented alloc record");
    assert_eq!(fragmented.details.as_ref().unwrap()["text"], "path=fragmented segments=2");
}

#[test]
fn file_emitter_round_trips_through_validator() {
    let dir = unique_tmp_dir("fragmem-log");
    let log_path = dir.join("run.jsonl");

    let alloc = busy_allocator();
    let mut emitter = LogEmitter::to_file(&log_path, "file-run").unwrap();
    emitter.emit(LogLevel::Info, "run_start").unwrap();
    emitter
        .emit_allocator_records(&alloc.drain_lifecycle_logs())
        .unwrap();
    emitter
        .emit_entry(
            LogEntry::new("", LogLevel::Info, "run_done")
                .with_outcome(Outcome::Pass)
                .with_free_total(alloc.free_total()),
        )
        .unwrap();
    let lines = emitter.lines_written();
    emitter.flush().unwrap();

    let (count, errors) = validate_log_file(&log_path).unwrap();
    assert!(errors.is_empty(), "{errors:?}");
    assert_eq!(count, lines);

    let content = std::fs::read_to_string(&log_path).unwrap();
    let last = content.lines().last().unwrap();
    let done = validate_log_line(last, count).unwrap();
    assert_eq!(done.trace_id, "file-run::002");
    assert_eq!(done.outcome, Some(Outcome::Pass));

    std::fs::remove_dir_all(&dir).ok();
}

#[test]
fn validator_reports_every_broken_line() {
    let dir = unique_tmp_dir("fragmem-log-bad");
    let log_path = dir.join("bad.jsonl");
    std::fs::write(
        &log_path,
        concat!(
            r#"{"timestamp":"t","trace_id":"r::1","level":"info","event":"ok"}"#,
            "\n\n",
            r#"{"timestamp":"t","trace_id":"r::2","level":"loud","event":"bad"}"#,
            "\n",
            "garbage\n",
        ),
    )
    .unwrap();

    let (count, errors) = validate_log_file(&log_path).unwrap();
    assert_eq!(count, 3);
    let lines: Vec<usize> = errors.iter().map(|e| e.line_number).collect();
    assert_eq!(lines, vec![3, 4]);

    std::fs::remove_dir_all(&dir).ok();
}

#[test]
fn artifact_index_hashes_files_on_disk() {
    let dir = unique_tmp_dir("fragmem-index");
    let artifact = dir.join("report.json");
    std::fs::write(&artifact, "{\"passed\":true}").unwrap();

    let mut index = ArtifactIndex::new("idx-run");
    index.add_file(&artifact, "report").unwrap();
    let index_path = dir.join("artifact_index.json");
    index.write_to(&index_path).unwrap();

    let parsed: ArtifactIndex =
        serde_json::from_str(&std::fs::read_to_string(&index_path).unwrap()).unwrap();
    assert_eq!(parsed.run_id, "idx-run");
    assert_eq!(parsed.artifacts.len(), 1);
    let entry = &parsed.artifacts[0];
    assert_eq!(entry.kind, "report");
    assert_eq!(entry.size_bytes, Some(15));
    assert_eq!(entry.sha256, sha256_hex(b"{\"passed\":true}"));

    std::fs::remove_dir_all(&dir).ok();
}
