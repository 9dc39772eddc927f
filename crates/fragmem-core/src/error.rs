//! Allocator error taxonomy.
//!
//! Every failure surfaced by [`crate::Allocator`] is one of three kinds:
//! - [`AllocErrorKind::InvalidArgument`]: a caller bug (zero size, bad
//!   capacity, empty handle).
//! - [`AllocErrorKind::OutOfMemory`]: an expected outcome when total free
//!   bytes are insufficient. The allocator state is untouched.
//! - [`AllocErrorKind::SegmentNotFound`]: a release referenced a region that
//!   is not currently allocated exactly as described (double free, corrupted
//!   handle, or a handle from another allocator).

use thiserror::Error;

use crate::segment::Segment;

/// Fieldless discriminant of [`AllocError`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum AllocErrorKind {
    InvalidArgument,
    OutOfMemory,
    SegmentNotFound,
}

impl AllocErrorKind {
    /// Machine-readable label used in lifecycle records and reports.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::InvalidArgument => "invalid_argument",
            Self::OutOfMemory => "out_of_memory",
            Self::SegmentNotFound => "segment_not_found",
        }
    }

    /// Parse a label produced by [`AllocErrorKind::as_str`].
    #[must_use]
    pub fn from_label(label: &str) -> Option<Self> {
        match label.to_ascii_lowercase().replace('-', "_").as_str() {
            "invalid_argument" => Some(Self::InvalidArgument),
            "out_of_memory" | "oom" => Some(Self::OutOfMemory),
            "segment_not_found" => Some(Self::SegmentNotFound),
            _ => None,
        }
    }
}

/// Error returned by allocator operations.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum AllocError {
    #[error("invalid argument: {reason}")]
    InvalidArgument { reason: &'static str },
    #[error("out of memory: requested {requested} bytes but only {available} are free")]
    OutOfMemory { requested: usize, available: usize },
    /// `released` counts the segments of the same handle that were freed
    /// before this one failed. Those releases stay committed.
    #[error("segment not found: {segment} is not an allocated block ({released} earlier segment(s) released)")]
    SegmentNotFound { segment: Segment, released: usize },
}

impl AllocError {
    #[must_use]
    pub const fn kind(&self) -> AllocErrorKind {
        match self {
            Self::InvalidArgument { .. } => AllocErrorKind::InvalidArgument,
            Self::OutOfMemory { .. } => AllocErrorKind::OutOfMemory,
            Self::SegmentNotFound { .. } => AllocErrorKind::SegmentNotFound,
        }
    }
}
