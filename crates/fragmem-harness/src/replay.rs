//! Script replay.
//!
//! A script is a list of commands, one per line, run against one allocator:
//!
//! ```text
//! # comment
//! capacity 10          optional, must come first
//! alloc <name> <size>
//! free <name>
//! dump
//! verify
//! expect-free <bytes>
//! expect-segments <name> <count>
//! expect-error alloc <size> <kind>
//! expect-error free <name> <kind>
//! ```
//!
//! `<kind>` is an error label such as `out_of_memory` or `segment_not_found`.
//! Freed handles stay addressable by name so double frees can be scripted.

use std::collections::HashMap;
use std::fmt::Write as _;
use std::path::Path;

use fragmem_core::{AllocErrorKind, Allocator, AllocatorConfig, CheckLevel, Handle};

use crate::HarnessError;

/// The operation an `expect-error` line exercises.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ExpectedOp {
    Alloc { size: usize },
    Free { name: String },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    Alloc { name: String, size: usize },
    Free { name: String },
    Dump,
    Verify,
    ExpectFree(usize),
    ExpectSegments { name: String, count: usize },
    ExpectError { op: ExpectedOp, kind: AllocErrorKind },
}

/// A command with its 1-based source line.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Step {
    pub line: usize,
    pub command: Command,
}

/// A parsed replay script.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Script {
    pub capacity: Option<usize>,
    pub steps: Vec<Step>,
}

/// What a successful replay produced.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReplayOutcome {
    pub transcript: String,
    pub steps_run: usize,
    pub free_total: usize,
    pub live_handles: usize,
}

impl Script {
    pub fn from_file(path: &Path) -> Result<Self, HarnessError> {
        let text = std::fs::read_to_string(path)?;
        Self::parse(&text)
    }

    pub fn parse(text: &str) -> Result<Self, HarnessError> {
        let mut script = Self::default();
        for (idx, raw) in text.lines().enumerate() {
            let line = idx + 1;
            let body = raw.split('#').next().unwrap_or_default().trim();
            if body.is_empty() {
                continue;
            }
            let words: Vec<&str> = body.split_whitespace().collect();
            if words[0] == "capacity" {
                if !script.steps.is_empty() || script.capacity.is_some() {
                    return Err(parse_err(line, "capacity must be the first command"));
                }
                let [_, n] = words.as_slice() else {
                    return Err(parse_err(line, "usage: capacity <bytes>"));
                };
                script.capacity = Some(number(line, n)?);
                continue;
            }
            let command = parse_command(line, &words)?;
            script.steps.push(Step { line, command });
        }
        Ok(script)
    }

    /// Allocator sized by the script's `capacity`, or `default_capacity`.
    pub fn build_allocator(&self, default_capacity: usize) -> Result<Allocator, HarnessError> {
        let config = AllocatorConfig::new(self.capacity.unwrap_or(default_capacity))
            .with_check(CheckLevel::Full);
        Ok(Allocator::with_config(config)?)
    }

    /// Run every step against `allocator`, stopping at the first failure.
    pub fn execute(&self, allocator: &Allocator) -> Result<ReplayOutcome, HarnessError> {
        let mut live: HashMap<String, Handle> = HashMap::new();
        let mut retired: HashMap<String, Handle> = HashMap::new();
        let mut out = String::new();

        for step in &self.steps {
            let line = step.line;
            match &step.command {
                Command::Alloc { name, size } => {
                    if live.contains_key(name) {
                        return Err(expectation(line, format!("handle '{name}' is still live")));
                    }
                    let handle = allocator.allocate(*size).map_err(|err| {
                        expectation(line, format!("alloc {name} {size} failed: {err}"))
                    })?;
                    let _ = writeln!(out, "alloc {name} {size} -> {handle}");
                    retired.remove(name);
                    live.insert(name.clone(), handle);
                }
                Command::Free { name } => {
                    let handle = live.remove(name).ok_or_else(|| unknown(line, name))?;
                    allocator.release(&handle).map_err(|err| {
                        expectation(line, format!("free {name} failed: {err}"))
                    })?;
                    let _ = writeln!(out, "free {name}");
                    retired.insert(name.clone(), handle);
                }
                Command::Dump => {
                    let _ = writeln!(out, "{}", allocator.dump());
                }
                Command::Verify => {
                    allocator.verify()?;
                    let _ = writeln!(out, "verify ok");
                }
                Command::ExpectFree(expected) => {
                    let actual = allocator.free_total();
                    if actual != *expected {
                        return Err(expectation(
                            line,
                            format!("expected {expected} free bytes, found {actual}"),
                        ));
                    }
                    let _ = writeln!(out, "expect-free {expected} ok");
                }
                Command::ExpectSegments { name, count } => {
                    let handle = live.get(name).ok_or_else(|| unknown(line, name))?;
                    if handle.len() != *count {
                        return Err(expectation(
                            line,
                            format!(
                                "expected '{name}' to have {count} segment(s), found {}",
                                handle.len()
                            ),
                        ));
                    }
                    let _ = writeln!(out, "expect-segments {name} {count} ok");
                }
                Command::ExpectError { op, kind } => {
                    let result = match op {
                        ExpectedOp::Alloc { size } => allocator.allocate(*size).map(|h| {
                            format!("alloc {size} succeeded with {h}")
                        }),
                        ExpectedOp::Free { name } => {
                            let handle = live
                                .get(name)
                                .or_else(|| retired.get(name))
                                .ok_or_else(|| unknown(line, name))?;
                            allocator
                                .release(handle)
                                .map(|()| format!("free {name} succeeded"))
                        }
                    };
                    match result {
                        Err(err) if err.kind() == *kind => {
                            let _ = writeln!(out, "expect-error {} ok", kind.as_str());
                        }
                        Err(err) => {
                            return Err(expectation(
                                line,
                                format!("expected {}, got {}", kind.as_str(), err.kind().as_str()),
                            ));
                        }
                        Ok(what) => {
                            return Err(expectation(
                                line,
                                format!("expected {}, but {what}", kind.as_str()),
                            ));
                        }
                    }
                }
            }
        }

        Ok(ReplayOutcome {
            transcript: out,
            steps_run: self.steps.len(),
            free_total: allocator.free_total(),
            live_handles: live.len(),
        })
    }
}

fn parse_command(line: usize, words: &[&str]) -> Result<Command, HarnessError> {
    let command = match words {
        ["alloc", name, size] => Command::Alloc {
            name: (*name).to_string(),
            size: number(line, size)?,
        },
        ["free", name] => Command::Free {
            name: (*name).to_string(),
        },
        ["dump"] => Command::Dump,
        ["verify"] => Command::Verify,
        ["expect-free", n] => Command::ExpectFree(number(line, n)?),
        ["expect-segments", name, n] => Command::ExpectSegments {
            name: (*name).to_string(),
            count: number(line, n)?,
        },
        ["expect-error", "alloc", size, kind] => Command::ExpectError {
            op: ExpectedOp::Alloc {
                size: number(line, size)?,
            },
            kind: error_kind(line, kind)?,
        },
        ["expect-error", "free", name, kind] => Command::ExpectError {
            op: ExpectedOp::Free {
                name: (*name).to_string(),
            },
            kind: error_kind(line, kind)?,
        },
        [word, ..] => {
            return Err(parse_err(
                line,
                &format!("unknown command or wrong arguments: '{word}'"),
            ));
        }
        [] => return Err(parse_err(line, "empty command")),
    };
    Ok(command)
}

fn number(line: usize, word: &str) -> Result<usize, HarnessError> {
    word.parse()
        .map_err(|_| parse_err(line, &format!("expected a non-negative integer, got '{word}'")))
}

fn error_kind(line: usize, word: &str) -> Result<AllocErrorKind, HarnessError> {
    AllocErrorKind::from_label(word)
        .ok_or_else(|| parse_err(line, &format!("unknown error kind '{word}'")))
}

fn parse_err(line: usize, message: &str) -> HarnessError {
    HarnessError::Parse {
        line,
        message: message.to_string(),
    }
}

fn expectation(line: usize, message: String) -> HarnessError {
    HarnessError::Expectation { line, message }
}

fn unknown(line: usize, name: &str) -> HarnessError {
    HarnessError::UnknownHandle {
        line,
        name: name.to_string(),
    }
}
