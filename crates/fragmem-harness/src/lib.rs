//! Tooling around `fragmem-core`.
//!
//! This crate provides:
//! - Demo: the canonical fragmentation walk-through, rendered as text
//! - Replay: a line-based script language executed against one allocator
//! - Stress: deterministic multi-threaded allocate/release traffic
//! - Structured logs: JSONL records plus a SHA-256 artifact index

#![forbid(unsafe_code)]

pub mod demo;
pub mod error;
pub mod replay;
pub mod stress;
pub mod structured_log;

pub use error::HarnessError;
pub use replay::{ReplayOutcome, Script};
pub use stress::{StressConfig, StressReport};
