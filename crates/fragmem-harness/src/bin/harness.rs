//! CLI entrypoint for the fragmem harness.

use std::path::{Path, PathBuf};

use clap::{Parser, Subcommand};
use fragmem_core::Allocator;
use fragmem_harness::demo::{self, DEFAULT_DEMO_CAPACITY};
use fragmem_harness::replay::Script;
use fragmem_harness::stress::{self, StressConfig};
use fragmem_harness::structured_log::{
    ArtifactIndex, LogEmitter, LogEntry, LogLevel, Outcome, validate_log_file,
};

/// Tooling for the fragmem allocator.
#[derive(Debug, Parser)]
#[command(name = "fragmem-harness")]
#[command(about = "Demo, replay and stress tooling for the fragmem allocator")]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Print the fragmentation walk-through.
    Demo {
        /// Region size in bytes.
        #[arg(long, default_value_t = DEFAULT_DEMO_CAPACITY)]
        capacity: usize,
        /// Structured JSONL log output path.
        #[arg(long)]
        log: Option<PathBuf>,
    },
    /// Execute a replay script and print its transcript.
    Replay {
        /// Script path.
        script: PathBuf,
        /// Region size, unless the script sets `capacity`.
        #[arg(long, default_value_t = 1024)]
        capacity: usize,
        /// Structured JSONL log output path.
        #[arg(long)]
        log: Option<PathBuf>,
        /// Artifact index output path (requires `--log`).
        #[arg(long, requires = "log")]
        artifact_index: Option<PathBuf>,
    },
    /// Run concurrent allocate/release traffic and report the result as JSON.
    Stress {
        #[arg(long, default_value_t = 64 * 1024)]
        capacity: usize,
        #[arg(long, default_value_t = 4)]
        threads: usize,
        /// Operations per thread.
        #[arg(long, default_value_t = 10_000)]
        ops: usize,
        /// Root seed (decimal or 0x...).
        #[arg(long, default_value = "0xDEAD_BEEF")]
        seed: String,
        /// Largest single request in bytes.
        #[arg(long, default_value_t = 512)]
        max_size: usize,
        /// Report output path (if omitted, prints to stdout).
        #[arg(long)]
        output: Option<PathBuf>,
        /// Structured JSONL log output path.
        #[arg(long)]
        log: Option<PathBuf>,
        /// Artifact index output path (requires `--log`).
        #[arg(long, requires = "log")]
        artifact_index: Option<PathBuf>,
    },
    /// Validate a structured JSONL log file.
    ValidateLog {
        /// Log path.
        log: PathBuf,
    },
}

fn parse_seed(raw: &str) -> Result<u64, String> {
    let cleaned = raw.trim().replace('_', "");
    let parsed = match cleaned
        .strip_prefix("0x")
        .or_else(|| cleaned.strip_prefix("0X"))
    {
        Some(hex) => u64::from_str_radix(hex, 16),
        None => cleaned.parse::<u64>(),
    };
    parsed.map_err(|err| format!("invalid seed '{raw}': {err}"))
}

fn run_id(command: &str) -> String {
    format!("{command}-{}", std::process::id())
}

/// Write allocator lifecycle records framed by start and summary entries.
fn write_run_log(
    path: &Path,
    run_id: &str,
    allocator: Option<&Allocator>,
    summary: LogEntry,
) -> std::io::Result<usize> {
    let mut emitter = LogEmitter::to_file(path, run_id)?;
    emitter.emit(LogLevel::Info, "run_start")?;
    if let Some(allocator) = allocator {
        emitter.emit_allocator_records(&allocator.drain_lifecycle_logs())?;
    }
    emitter.emit_entry(summary)?;
    emitter.flush()?;
    Ok(emitter.lines_written())
}

fn write_index(
    path: &Path,
    run_id: &str,
    artifacts: &[(&Path, &str)],
) -> Result<(), Box<dyn std::error::Error>> {
    let mut index = ArtifactIndex::new(run_id);
    for (artifact, kind) in artifacts {
        index.add_file(artifact, *kind)?;
    }
    index.write_to(path)?;
    eprintln!("Wrote artifact index to {}", path.display());
    Ok(())
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    match cli.command {
        Command::Demo { capacity, log } => {
            let run = demo::run(capacity)?;
            print!("{}", run.transcript);
            if let Some(log) = log {
                let run_id = run_id("demo");
                let summary = LogEntry::new("", LogLevel::Info, "demo_done")
                    .with_outcome(Outcome::Pass)
                    .with_free_total(run.allocator.free_total());
                let lines = write_run_log(&log, &run_id, Some(&run.allocator), summary)?;
                eprintln!("Wrote {lines} log line(s) to {}", log.display());
            }
        }
        Command::Replay {
            script,
            capacity,
            log,
            artifact_index,
        } => {
            let parsed = Script::from_file(&script)?;
            let allocator = parsed.build_allocator(capacity)?;
            let result = parsed.execute(&allocator);

            if let Some(log) = &log {
                let run_id = run_id("replay");
                let summary = match &result {
                    Ok(outcome) => LogEntry::new("", LogLevel::Info, "replay_done")
                        .with_outcome(Outcome::Pass)
                        .with_free_total(outcome.free_total)
                        .with_details(serde_json::json!({
                            "script": script.display().to_string(),
                            "steps": outcome.steps_run,
                            "live_handles": outcome.live_handles,
                        })),
                    Err(err) => LogEntry::new("", LogLevel::Error, "replay_done")
                        .with_outcome(Outcome::Fail)
                        .with_free_total(allocator.free_total())
                        .with_details(serde_json::json!({
                            "script": script.display().to_string(),
                            "error": err.to_string(),
                        })),
                };
                write_run_log(log, &run_id, Some(&allocator), summary)?;
                if let Some(index) = &artifact_index {
                    let artifacts = [(log.as_path(), "log"), (script.as_path(), "script")];
                    write_index(index, &run_id, &artifacts)?;
                }
            }

            let outcome = result?;
            print!("{}", outcome.transcript);
            eprintln!(
                "Replayed {} step(s); {} byte(s) free, {} handle(s) live",
                outcome.steps_run, outcome.free_total, outcome.live_handles
            );
        }
        Command::Stress {
            capacity,
            threads,
            ops,
            seed,
            max_size,
            output,
            log,
            artifact_index,
        } => {
            let config = StressConfig {
                capacity,
                threads,
                ops_per_thread: ops,
                seed: parse_seed(&seed)?,
                max_size,
            };
            let report = stress::run(&config)?;
            let json = report.to_json()?;
            match &output {
                Some(path) => {
                    std::fs::write(path, &json)?;
                    eprintln!("Wrote stress report to {}", path.display());
                }
                None => println!("{json}"),
            }

            if let Some(log) = &log {
                let run_id = run_id("stress");
                let (level, verdict) = if report.passed {
                    (LogLevel::Info, Outcome::Pass)
                } else {
                    (LogLevel::Error, Outcome::Fail)
                };
                let summary = LogEntry::new("", level, "stress_done")
                    .with_outcome(verdict)
                    .with_free_total(report.final_free_total)
                    .with_latency_ns(report.elapsed_ns)
                    .with_details(serde_json::to_value(&report)?);
                write_run_log(log, &run_id, None, summary)?;
                if let Some(index) = &artifact_index {
                    let mut artifacts: Vec<(&Path, &str)> = vec![(log.as_path(), "log")];
                    if let Some(path) = &output {
                        artifacts.push((path.as_path(), "report"));
                    }
                    write_index(index, &run_id, &artifacts)?;
                }
            }

            if !report.passed {
                return Err("stress run failed its final invariant checks".into());
            }
        }
        Command::ValidateLog { log } => {
            let (lines, errors) = validate_log_file(&log)?;
            for err in &errors {
                eprintln!("{err}");
            }
            if !errors.is_empty() {
                return Err(format!("{} error(s) in {lines} line(s)", errors.len()).into());
            }
            eprintln!("{lines} line(s) valid");
        }
    }

    Ok(())
}
