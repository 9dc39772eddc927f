//! Concurrent stress runner.
//!
//! Every worker thread drives its own deterministic allocate/release trace
//! against one shared [`Allocator`]. Once all workers have released what they
//! hold, the allocator must be back to a single free block covering the whole
//! region.

use std::thread;
use std::time::Instant;

use fragmem_core::{AllocError, AllocErrorKind, Allocator, AllocatorConfig, CheckLevel, Handle};
use serde::{Deserialize, Serialize};

use crate::HarnessError;

/// Parameters of a stress run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StressConfig {
    pub capacity: usize,
    pub threads: usize,
    pub ops_per_thread: usize,
    pub seed: u64,
    pub max_size: usize,
}

impl Default for StressConfig {
    fn default() -> Self {
        Self {
            capacity: 64 * 1024,
            threads: 4,
            ops_per_thread: 10_000,
            seed: 0xDEAD_BEEF,
            max_size: 512,
        }
    }
}

/// Machine-readable summary of a stress run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StressReport {
    pub capacity: usize,
    pub threads: usize,
    pub ops_per_thread: usize,
    pub seed: u64,
    pub max_size: usize,
    pub allocations: u64,
    pub multi_segment_allocations: u64,
    pub releases: u64,
    pub out_of_memory: u64,
    pub bytes_allocated: u64,
    pub peak_fragmentation_permille: u16,
    pub final_free_total: usize,
    pub final_block_count: usize,
    /// `None` when all invariants held after the run.
    pub invariant_violation: Option<String>,
    pub elapsed_ns: u64,
    pub passed: bool,
}

impl StressReport {
    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string_pretty(self)
    }
}

#[derive(Debug, Default, Clone, Copy)]
struct Tally {
    allocations: u64,
    multi_segment: u64,
    releases: u64,
    out_of_memory: u64,
    bytes: u64,
    peak_fragmentation: u16,
}

impl Tally {
    fn merge(mut self, other: Self) -> Self {
        self.allocations += other.allocations;
        self.multi_segment += other.multi_segment;
        self.releases += other.releases;
        self.out_of_memory += other.out_of_memory;
        self.bytes += other.bytes;
        self.peak_fragmentation = self.peak_fragmentation.max(other.peak_fragmentation);
        self
    }
}

#[derive(Debug, Clone, Copy)]
struct XorShift64 {
    state: u64,
}

impl XorShift64 {
    fn new(seed: u64) -> Self {
        // Zero is a fixed point of xorshift.
        Self {
            state: if seed == 0 { 0x9E37_79B9_7F4A_7C15 } else { seed },
        }
    }

    fn next_u64(&mut self) -> u64 {
        let mut x = self.state;
        x ^= x >> 12;
        x ^= x << 25;
        x ^= x >> 27;
        self.state = x;
        x.wrapping_mul(0x2545_F491_4F6C_DD1D)
    }

    fn below(&mut self, bound: usize) -> usize {
        (self.next_u64() % bound as u64) as usize
    }
}

/// Run the stress workload described by `config`.
pub fn run(config: &StressConfig) -> Result<StressReport, HarnessError> {
    if config.threads == 0 || config.max_size == 0 {
        return Err(AllocError::InvalidArgument {
            reason: "stress needs at least one thread and a positive max size",
        }
        .into());
    }
    let allocator = Allocator::with_config(
        AllocatorConfig::new(config.capacity)
            .with_check(CheckLevel::Release)
            .with_log_capacity(0),
    )?;

    let started = Instant::now();
    let tally = thread::scope(|scope| {
        let workers: Vec<_> = (0..config.threads)
            .map(|t| {
                let allocator = &allocator;
                let seed = config.seed ^ (t as u64 + 1).wrapping_mul(0x9E37_79B9_7F4A_7C15);
                scope.spawn(move || worker(allocator, seed, config.ops_per_thread, config.max_size))
            })
            .collect();
        workers
            .into_iter()
            .map(|w| match w.join() {
                Ok(result) => result,
                Err(panic) => std::panic::resume_unwind(panic),
            })
            .try_fold(Tally::default(), |acc, t| t.map(|t| acc.merge(t)))
    })?;
    let elapsed_ns = u64::try_from(started.elapsed().as_nanos()).unwrap_or(u64::MAX);

    let invariant_violation = allocator.verify().err().map(|v| v.to_string());
    let final_free_total = allocator.free_total();
    let final_block_count = allocator.block_count();
    let passed = invariant_violation.is_none()
        && final_free_total == config.capacity
        && final_block_count == 1;

    Ok(StressReport {
        capacity: config.capacity,
        threads: config.threads,
        ops_per_thread: config.ops_per_thread,
        seed: config.seed,
        max_size: config.max_size,
        allocations: tally.allocations,
        multi_segment_allocations: tally.multi_segment,
        releases: tally.releases,
        out_of_memory: tally.out_of_memory,
        bytes_allocated: tally.bytes,
        peak_fragmentation_permille: tally.peak_fragmentation,
        final_free_total,
        final_block_count,
        invariant_violation,
        elapsed_ns,
        passed,
    })
}

fn worker(
    allocator: &Allocator,
    seed: u64,
    ops: usize,
    max_size: usize,
) -> Result<Tally, AllocError> {
    let mut rng = XorShift64::new(seed);
    let mut live: Vec<Handle> = Vec::new();
    let mut tally = Tally::default();

    for op in 0..ops {
        // Bias towards allocation so the region actually fills up.
        if live.is_empty() || rng.below(10) < 6 {
            let size = 1 + rng.below(max_size);
            match allocator.allocate(size) {
                Ok(handle) => {
                    tally.allocations += 1;
                    tally.bytes += size as u64;
                    if handle.len() > 1 {
                        tally.multi_segment += 1;
                    }
                    live.push(handle);
                }
                Err(err) if err.kind() == AllocErrorKind::OutOfMemory => {
                    tally.out_of_memory += 1;
                }
                Err(err) => return Err(err),
            }
        } else {
            let handle = live.swap_remove(rng.below(live.len()));
            allocator.release(&handle)?;
            tally.releases += 1;
        }
        if op % 64 == 0 {
            let frag = allocator.stats().fragmentation_permille;
            tally.peak_fragmentation = tally.peak_fragmentation.max(frag);
        }
    }

    for handle in live.drain(..) {
        allocator.release(&handle)?;
        tally.releases += 1;
    }
    Ok(tally)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn small(threads: usize, seed: u64) -> StressConfig {
        StressConfig {
            capacity: 2048,
            threads,
            ops_per_thread: 2_000,
            seed,
            max_size: 96,
        }
    }

    #[test]
    fn single_thread_run_is_reproducible() {
        let a = run(&small(1, 7)).unwrap();
        let b = run(&small(1, 7)).unwrap();
        assert!(a.passed);
        assert_eq!(a.allocations, b.allocations);
        assert_eq!(a.out_of_memory, b.out_of_memory);
        assert_eq!(a.multi_segment_allocations, b.multi_segment_allocations);
    }

    #[test]
    fn multi_thread_run_conserves_capacity() {
        let report = run(&small(4, 0xC0FFEE)).unwrap();
        assert!(report.passed, "{report:?}");
        assert_eq!(report.final_free_total, 2048);
        assert_eq!(report.final_block_count, 1);
        assert_eq!(report.allocations, report.releases);
        assert!(report.invariant_violation.is_none());
    }

    #[test]
    fn zero_seed_still_produces_traffic() {
        let report = run(&small(1, 0)).unwrap();
        assert!(report.allocations > 0);
    }

    #[test]
    fn rejects_zero_threads() {
        assert!(matches!(
            run(&small(0, 1)),
            Err(HarnessError::Alloc(AllocError::InvalidArgument { .. }))
        ));
    }

    #[test]
    fn report_serializes_to_json() {
        let report = run(&small(2, 3)).unwrap();
        let parsed: serde_json::Value = serde_json::from_str(&report.to_json().unwrap()).unwrap();
        assert_eq!(parsed["threads"], 2);
        assert_eq!(parsed["passed"], true);
        assert!(parsed["invariant_violation"].is_null());
    }
}
