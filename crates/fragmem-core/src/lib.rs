//! # fragmem-core
//!
//! A user-space virtual memory manager over a fixed-size contiguous region.
//!
//! The region is partitioned into an ordered list of blocks, each either free
//! or allocated. Allocation is first-fit in ascending offset order, but a
//! request is allowed to span several disjoint free blocks: it only fails when
//! the *total* free capacity is insufficient. The result of an allocation is a
//! [`Handle`], an ordered list of [`Segment`]s whose sizes sum to the request.
//!
//! ```text
//!   capacity 5, after freeing offsets 1 and 3:
//!
//!   ┌─────┬─────┬─────┬─────┬─────┐
//!   │ A   │ f   │ A   │ f   │ A   │      allocate(2)
//!   └─────┴─────┴─────┴─────┴─────┘  ──▶  Sequence{segments=[
//!      0     1     2     3     4             Segment{start=1, size=1},
//!                                            Segment{start=3, size=1}]}
//! ```
//!
//! Releasing a handle frees each segment and coalesces it with free
//! neighbours, so no two adjacent blocks are ever both free.
//!
//! The backing bytes themselves are never touched: offsets are logical and the
//! caller owns the region.

#![deny(unsafe_code)]

mod block;
pub mod allocator;
pub mod config;
pub mod error;
pub mod invariants;
pub mod lifecycle;
pub mod segment;

pub use allocator::{Allocator, AllocatorStats};
pub use block::{BlockDump, BlockInfo, BlockIter};
pub use config::{AllocatorConfig, CheckLevel, check_level};
pub use error::{AllocError, AllocErrorKind};
pub use invariants::InvariantViolation;
pub use lifecycle::{AllocatorLogLevel, AllocatorLogRecord};
pub use segment::{Handle, Segment};
