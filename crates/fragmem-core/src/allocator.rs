//! Core allocator state.
//!
//! [`AllocatorState`] is the unsynchronized block-list engine: first-fit
//! search that may span several free blocks, splitting, and coalescing on
//! release. [`Allocator`] wraps it in a single `parking_lot::Mutex` so that
//! every scan-and-mutate body runs as one critical section.

use parking_lot::Mutex;

use crate::block::{Block, BlockDump};
use crate::config::{AllocatorConfig, CheckLevel};
use crate::error::AllocError;
use crate::invariants::{self, InvariantViolation};
use crate::lifecycle::{AllocatorLogLevel, AllocatorLogRecord, LifecycleEvent, LifecycleLog, Snapshot};
use crate::segment::{Handle, Segment};

/// Summary of the allocator's occupancy and fragmentation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AllocatorStats {
    pub capacity: usize,
    pub free_total: usize,
    pub allocated_total: usize,
    pub block_count: usize,
    pub free_block_count: usize,
    pub largest_free_block: usize,
    /// `1000 - largest_free_block * 1000 / free_total`; 0 when nothing is
    /// free or all free bytes form one block.
    pub fragmentation_permille: u16,
}

/// Block-list engine. Callers go through [`Allocator`].
#[derive(Debug)]
pub(crate) struct AllocatorState {
    /// Ascending, contiguous, covering `[0, capacity)`.
    blocks: Vec<Block>,
    capacity: usize,
    /// Always the sum of free block sizes.
    free_total: usize,
    check: CheckLevel,
    log: LifecycleLog,
}

impl AllocatorState {
    /// `config` must already be validated.
    pub(crate) fn new(config: &AllocatorConfig) -> Self {
        let mut state = Self {
            blocks: vec![Block::free(0, config.capacity)],
            capacity: config.capacity,
            free_total: config.capacity,
            check: config.check,
            log: LifecycleLog::new(config.log_capacity),
        };
        state.record(
            AllocatorLogLevel::Trace,
            "new",
            "init",
            "success",
            LifecycleEvent::new().size(config.capacity).details(format!(
                "region_len={} check={}",
                config.region_len,
                config.check.as_str()
            )),
        );
        state
    }

    fn snapshot(&self) -> Snapshot {
        Snapshot {
            free_total: self.free_total,
            block_count: self.blocks.len(),
            free_block_count: self.blocks.iter().filter(|b| b.is_free).count(),
        }
    }

    fn record(
        &mut self,
        level: AllocatorLogLevel,
        symbol: &'static str,
        event: &'static str,
        outcome: &'static str,
        fields: LifecycleEvent,
    ) {
        if !self.log.is_enabled() {
            return;
        }
        let snapshot = self.snapshot();
        self.log.push(level, symbol, event, outcome, fields, snapshot);
    }

    fn record_failure(&mut self, symbol: &'static str, err: &AllocError, fields: LifecycleEvent) {
        let level = match err {
            AllocError::OutOfMemory { .. } => AllocatorLogLevel::Info,
            AllocError::InvalidArgument { .. } | AllocError::SegmentNotFound { .. } => {
                AllocatorLogLevel::Warn
            }
        };
        let event = match err {
            AllocError::InvalidArgument { .. } => "invalid_argument",
            AllocError::OutOfMemory { .. } => "out_of_memory",
            AllocError::SegmentNotFound { .. } => "segment_not_found",
        };
        self.record(
            level,
            symbol,
            event,
            "denied",
            fields.details(err.to_string()),
        );
    }

    /// Post-operation bookkeeping: optional invariant verification and a
    /// stats snapshot record.
    fn after_mutation(&mut self, symbol: &'static str, releasing: bool) {
        if self.check.verifies_after(releasing) {
            let result = match self.check {
                CheckLevel::Full => self.verify(),
                _ => invariants::check_layout(self.blocks.iter().map(|b| b.info()), self.capacity)
                    .map(|_| ()),
            };
            if let Err(violation) = result {
                self.record(
                    AllocatorLogLevel::Error,
                    symbol,
                    "invariant_violation",
                    violation.label(),
                    LifecycleEvent::new().details(violation.to_string()),
                );
            }
        }
        self.record(
            AllocatorLogLevel::Debug,
            symbol,
            "allocator_stats",
            "snapshot",
            LifecycleEvent::new().details(format!(
                "allocated_total={} largest_free_block={}",
                self.allocated_total(),
                self.largest_free_block()
            )),
        );
    }

    /// Allocates `size` bytes, first-fit, spanning free blocks as needed.
    pub(crate) fn allocate(&mut self, size: usize) -> Result<Handle, AllocError> {
        if size == 0 {
            let err = AllocError::InvalidArgument {
                reason: "allocation size must be positive",
            };
            self.record_failure("allocate", &err, LifecycleEvent::new().size(size));
            return Err(err);
        }
        if self.free_total < size {
            let err = AllocError::OutOfMemory {
                requested: size,
                available: self.free_total,
            };
            self.record_failure("allocate", &err, LifecycleEvent::new().size(size));
            return Err(err);
        }

        let segments = self.take_first_fit(size);
        let first_start = segments.first().map_or(0, |s| s.start());
        let count = segments.len();
        self.record(
            AllocatorLogLevel::Trace,
            "allocate",
            "alloc",
            "success",
            LifecycleEvent::new()
                .start(first_start)
                .size(size)
                .segments(count)
                .details(if count > 1 {
                    format!("path=fragmented segments={count}")
                } else {
                    "path=contiguous".to_string()
                }),
        );
        self.after_mutation("allocate", false);
        Ok(Handle::from_segments(segments))
    }

    /// Walks the block list in ascending order, consuming whole free blocks
    /// and splitting the last one if it is larger than what is still needed.
    ///
    /// Caller guarantees `size <= free_total`.
    fn take_first_fit(&mut self, size: usize) -> Vec<Segment> {
        let mut remaining = size;
        let mut segments = Vec::new();
        let mut index = 0;

        while remaining > 0 && index < self.blocks.len() {
            let block = self.blocks[index];
            if block.is_free {
                if block.size <= remaining {
                    self.blocks[index].is_free = false;
                    segments.push(block.segment());
                    remaining -= block.size;
                    self.free_total -= block.size;
                } else {
                    self.split_allocated_prefix(index, remaining);
                    segments.push(Segment::new(block.start, remaining));
                    self.free_total -= remaining;
                    remaining = 0;
                }
            }
            index += 1;
        }

        if remaining > 0 {
            // free_total claimed more bytes than the free blocks hold.
            self.record(
                AllocatorLogLevel::Error,
                "allocate",
                "invariant_free_total_drift",
                "recovered",
                LifecycleEvent::new()
                    .size(size)
                    .details(format!("unsatisfied={remaining}")),
            );
        }
        segments
    }

    /// Turns `blocks[index]` into an allocated block of `len` bytes followed
    /// by a new free block holding the rest.
    fn split_allocated_prefix(&mut self, index: usize, len: usize) {
        let block = &mut self.blocks[index];
        let suffix = Block::free(block.start + len, block.size - len);
        block.size = len;
        block.is_free = false;
        self.blocks.insert(index + 1, suffix);
    }

    /// Releases every segment of `handle`, coalescing after each one.
    ///
    /// Stops at the first segment that does not match an allocated block.
    /// Segments released before that point stay released.
    pub(crate) fn release(&mut self, handle: &Handle) -> Result<(), AllocError> {
        if handle.is_empty() {
            let err = AllocError::InvalidArgument {
                reason: "handle has no segments",
            };
            self.record_failure("release", &err, LifecycleEvent::new().segments(0));
            return Err(err);
        }

        for (released, segment) in handle.iter().enumerate() {
            if !self.release_segment(segment) {
                let err = AllocError::SegmentNotFound { segment, released };
                self.record_failure(
                    "release",
                    &err,
                    LifecycleEvent::new()
                        .start(segment.start())
                        .size(segment.size())
                        .segments(handle.len()),
                );
                if released > 0 {
                    self.after_mutation("release", true);
                }
                return Err(err);
            }
        }

        self.record(
            AllocatorLogLevel::Trace,
            "release",
            "release",
            "success",
            LifecycleEvent::new()
                .start(handle.segments()[0].start())
                .size(handle.total_size())
                .segments(handle.len()),
        );
        self.after_mutation("release", true);
        Ok(())
    }

    /// Frees the allocated block matching `segment` exactly and merges it
    /// with free neighbours. Returns false if no such block exists.
    fn release_segment(&mut self, segment: Segment) -> bool {
        let Some(index) = self.find_allocated(segment) else {
            return false;
        };
        self.blocks[index].is_free = true;
        self.free_total += segment.size();
        self.coalesce(index);
        true
    }

    fn find_allocated(&self, segment: Segment) -> Option<usize> {
        let index = self
            .blocks
            .binary_search_by_key(&segment.start(), |b| b.start)
            .ok()?;
        let block = self.blocks[index];
        (!block.is_free && block.size == segment.size()).then_some(index)
    }

    /// Merges the free block at `index` with a free predecessor and a free
    /// successor. Returns the index of the merged block.
    fn coalesce(&mut self, mut index: usize) -> usize {
        if index > 0 && self.blocks[index - 1].is_free {
            let current = self.blocks.remove(index);
            index -= 1;
            self.blocks[index].size += current.size;
        }
        if index + 1 < self.blocks.len() && self.blocks[index + 1].is_free {
            let next = self.blocks.remove(index + 1);
            self.blocks[index].size += next.size;
        }
        index
    }

    pub(crate) fn free_total(&self) -> usize {
        self.free_total
    }

    pub(crate) fn allocated_total(&self) -> usize {
        self.capacity - self.free_total
    }

    pub(crate) fn block_count(&self) -> usize {
        self.blocks.len()
    }

    fn largest_free_block(&self) -> usize {
        self.blocks
            .iter()
            .filter(|b| b.is_free)
            .map(|b| b.size)
            .max()
            .unwrap_or(0)
    }

    pub(crate) fn stats(&self) -> AllocatorStats {
        let largest_free_block = self.largest_free_block();
        let fragmentation_permille = if self.free_total == 0 {
            0
        } else {
            let contiguous = (largest_free_block as u128 * 1000) / self.free_total as u128;
            (1000 - contiguous) as u16
        };
        AllocatorStats {
            capacity: self.capacity,
            free_total: self.free_total,
            allocated_total: self.allocated_total(),
            block_count: self.blocks.len(),
            free_block_count: self.blocks.iter().filter(|b| b.is_free).count(),
            largest_free_block,
            fragmentation_permille,
        }
    }

    pub(crate) fn dump(&self) -> BlockDump {
        BlockDump::capture(&self.blocks, self.free_total)
    }

    pub(crate) fn verify(&self) -> Result<(), InvariantViolation> {
        invariants::check_all(
            self.blocks.iter().map(|b| b.info()),
            self.capacity,
            self.free_total,
        )
    }
}

/// Thread-safe allocator over a fixed-size region.
///
/// All operations take `&self`; mutation is serialized by one exclusive lock
/// held only for the in-memory scan. Each instance is independent.
pub struct Allocator {
    capacity: usize,
    state: Mutex<AllocatorState>,
}

impl Allocator {
    /// Manage `capacity` bytes using environment-derived defaults.
    pub fn new(capacity: usize) -> Result<Self, AllocError> {
        Self::with_config(AllocatorConfig::new(capacity))
    }

    /// Manage the first `capacity` bytes of a caller-owned region of
    /// `region_len` bytes. Fails if `capacity > region_len`.
    pub fn for_region(region_len: usize, capacity: usize) -> Result<Self, AllocError> {
        Self::with_config(AllocatorConfig::new(capacity).with_region_len(region_len))
    }

    pub fn with_config(config: AllocatorConfig) -> Result<Self, AllocError> {
        config.validate()?;
        Ok(Self {
            capacity: config.capacity,
            state: Mutex::new(AllocatorState::new(&config)),
        })
    }

    /// Allocates `size` bytes.
    ///
    /// Succeeds whenever at least `size` bytes are free in total, possibly
    /// returning several segments. Fails with `OutOfMemory` otherwise,
    /// leaving the allocator untouched, and with `InvalidArgument` for
    /// `size == 0`.
    pub fn allocate(&self, size: usize) -> Result<Handle, AllocError> {
        self.state.lock().allocate(size)
    }

    /// Releases every segment of `handle`.
    ///
    /// Fails with `InvalidArgument` for an empty handle and with
    /// `SegmentNotFound` for the first segment that is not an allocated
    /// block of exactly that offset and size. Segments released before the
    /// failing one are not rolled back.
    pub fn release(&self, handle: &Handle) -> Result<(), AllocError> {
        self.state.lock().release(handle)
    }

    #[must_use]
    pub fn capacity(&self) -> usize {
        self.capacity
    }

    #[must_use]
    pub fn free_total(&self) -> usize {
        self.state.lock().free_total()
    }

    #[must_use]
    pub fn allocated_total(&self) -> usize {
        self.state.lock().allocated_total()
    }

    #[must_use]
    pub fn block_count(&self) -> usize {
        self.state.lock().block_count()
    }

    #[must_use]
    pub fn stats(&self) -> AllocatorStats {
        self.state.lock().stats()
    }

    /// Snapshot of the block list, copied out under the lock.
    #[must_use]
    pub fn dump(&self) -> BlockDump {
        self.state.lock().dump()
    }

    /// Runs every invariant check against the current state.
    pub fn verify(&self) -> Result<(), InvariantViolation> {
        self.state.lock().verify()
    }

    /// Copy of the buffered lifecycle records.
    #[must_use]
    pub fn lifecycle_logs(&self) -> Vec<AllocatorLogRecord> {
        self.state.lock().log.records()
    }

    /// Drains the buffered lifecycle records.
    pub fn drain_lifecycle_logs(&self) -> Vec<AllocatorLogRecord> {
        self.state.lock().log.drain()
    }
}

impl std::fmt::Debug for Allocator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let state = self.state.lock();
        f.debug_struct("Allocator")
            .field("capacity", &self.capacity)
            .field("free_total", &state.free_total)
            .field("block_count", &state.blocks.len())
            .finish()
    }
}
