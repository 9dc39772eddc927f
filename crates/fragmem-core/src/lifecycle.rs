//! Structured allocator lifecycle records.
//!
//! Each allocator keeps a bounded, in-memory buffer of records describing its
//! decisions. The harness turns them into JSONL log lines.

use std::collections::VecDeque;

/// Allocator lifecycle log level.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum AllocatorLogLevel {
    Trace,
    Debug,
    Info,
    Warn,
    Error,
}

impl AllocatorLogLevel {
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Trace => "trace",
            Self::Debug => "debug",
            Self::Info => "info",
            Self::Warn => "warn",
            Self::Error => "error",
        }
    }
}

/// Structured allocator lifecycle record.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AllocatorLogRecord {
    /// Monotonic decision/event id, starting at 1.
    pub decision_id: u64,
    /// Correlation id: `fragmem::allocator::<symbol>::<decision_id:016x>`.
    pub trace_id: String,
    pub level: AllocatorLogLevel,
    /// API symbol (`new`, `allocate`, `release`).
    pub symbol: &'static str,
    /// Event kind (`alloc`, `release`, `allocator_stats`, ...).
    pub event: &'static str,
    /// Offset involved in the event.
    pub start: Option<usize>,
    /// Size involved in the event.
    pub size: Option<usize>,
    /// Number of segments in the handle involved.
    pub segments: Option<usize>,
    /// Machine-readable outcome label.
    pub outcome: &'static str,
    /// Free-form details for debugging.
    pub details: String,
    /// Snapshot: free bytes after the event.
    pub free_total: usize,
    /// Snapshot: total number of blocks.
    pub block_count: usize,
    /// Snapshot: number of free blocks.
    pub free_block_count: usize,
}

/// Fields of a record that vary per event.
#[derive(Debug, Clone, Default)]
pub(crate) struct LifecycleEvent {
    pub(crate) start: Option<usize>,
    pub(crate) size: Option<usize>,
    pub(crate) segments: Option<usize>,
    pub(crate) details: String,
}

impl LifecycleEvent {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    pub(crate) fn start(mut self, start: usize) -> Self {
        self.start = Some(start);
        self
    }

    pub(crate) fn size(mut self, size: usize) -> Self {
        self.size = Some(size);
        self
    }

    pub(crate) fn segments(mut self, segments: usize) -> Self {
        self.segments = Some(segments);
        self
    }

    pub(crate) fn details(mut self, details: impl Into<String>) -> Self {
        self.details = details.into();
        self
    }
}

/// Allocator state snapshot copied into every record.
#[derive(Debug, Clone, Copy)]
pub(crate) struct Snapshot {
    pub(crate) free_total: usize,
    pub(crate) block_count: usize,
    pub(crate) free_block_count: usize,
}

/// Bounded ring of lifecycle records. Oldest records are evicted first.
#[derive(Debug)]
pub(crate) struct LifecycleLog {
    records: VecDeque<AllocatorLogRecord>,
    capacity: usize,
    next_decision_id: u64,
}

impl LifecycleLog {
    pub(crate) fn new(capacity: usize) -> Self {
        Self {
            records: VecDeque::with_capacity(capacity.min(64)),
            capacity,
            next_decision_id: 1,
        }
    }

    pub(crate) fn is_enabled(&self) -> bool {
        self.capacity > 0
    }

    pub(crate) fn push(
        &mut self,
        level: AllocatorLogLevel,
        symbol: &'static str,
        event: &'static str,
        outcome: &'static str,
        fields: LifecycleEvent,
        snapshot: Snapshot,
    ) {
        if !self.is_enabled() {
            return;
        }
        let decision_id = self.next_decision_id;
        self.next_decision_id = self.next_decision_id.wrapping_add(1);
        if self.records.len() == self.capacity {
            self.records.pop_front();
        }
        self.records.push_back(AllocatorLogRecord {
            decision_id,
            trace_id: format!("fragmem::allocator::{symbol}::{decision_id:016x}"),
            level,
            symbol,
            event,
            start: fields.start,
            size: fields.size,
            segments: fields.segments,
            outcome,
            details: fields.details,
            free_total: snapshot.free_total,
            block_count: snapshot.block_count,
            free_block_count: snapshot.free_block_count,
        });
    }

    pub(crate) fn records(&self) -> Vec<AllocatorLogRecord> {
        self.records.iter().cloned().collect()
    }

    pub(crate) fn drain(&mut self) -> Vec<AllocatorLogRecord> {
        self.records.drain(..).collect()
    }
}
