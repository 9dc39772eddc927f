//! Harness error type.

use fragmem_core::{AllocError, InvariantViolation};

/// Everything that can stop a harness run.
#[derive(Debug, thiserror::Error)]
pub enum HarnessError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
    #[error("allocator error: {0}")]
    Alloc(#[from] AllocError),
    #[error("allocator invariant broken: {0}")]
    Invariant(#[from] InvariantViolation),
    #[error("script line {line}: {message}")]
    Parse { line: usize, message: String },
    #[error("script line {line}: unknown handle '{name}'")]
    UnknownHandle { line: usize, name: String },
    #[error("script line {line}: expectation failed: {message}")]
    Expectation { line: usize, message: String },
}
