//! Block-list invariant checks.
//!
//! A healthy layout satisfies all of:
//! - every block has a non-zero size;
//! - blocks are contiguous: `block[i].start + block[i].size == block[i + 1].start`,
//!   starting at offset 0;
//! - the blocks cover exactly `[0, capacity)`;
//! - no two consecutive blocks are both free;
//! - the cached free total equals the sum of free block sizes.
//!
//! A violation is always an allocator bug, never caller misuse.

use thiserror::Error;

use crate::block::BlockInfo;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum InvariantViolation {
    #[error("block {index} at offset {start} has zero size")]
    EmptyBlock { index: usize, start: usize },
    #[error("block {index} starts at {start}, expected {expected}")]
    Discontiguous {
        index: usize,
        start: usize,
        expected: usize,
    },
    #[error("blocks cover [0, {covered}) but capacity is {capacity}")]
    CoverageMismatch { covered: usize, capacity: usize },
    #[error("adjacent free blocks at offsets {first} and {second}")]
    AdjacentFree { first: usize, second: usize },
    #[error("cached free total {cached} does not match free block sum {actual}")]
    FreeTotalDrift { cached: usize, actual: usize },
}

impl InvariantViolation {
    /// Machine-readable label for lifecycle records.
    #[must_use]
    pub const fn label(&self) -> &'static str {
        match self {
            Self::EmptyBlock { .. } => "empty_block",
            Self::Discontiguous { .. } => "discontiguous",
            Self::CoverageMismatch { .. } => "coverage_mismatch",
            Self::AdjacentFree { .. } => "adjacent_free",
            Self::FreeTotalDrift { .. } => "free_total_drift",
        }
    }
}

/// Check ordering, contiguity, coverage and the no-adjacent-free rule.
///
/// Returns the sum of free block sizes on success.
pub fn check_layout<I>(blocks: I, capacity: usize) -> Result<usize, InvariantViolation>
where
    I: IntoIterator<Item = BlockInfo>,
{
    let mut expected = 0usize;
    let mut free_sum = 0usize;
    let mut prev_free: Option<usize> = None;

    for (index, block) in blocks.into_iter().enumerate() {
        if block.size == 0 {
            return Err(InvariantViolation::EmptyBlock {
                index,
                start: block.start,
            });
        }
        if block.start != expected {
            return Err(InvariantViolation::Discontiguous {
                index,
                start: block.start,
                expected,
            });
        }
        if block.is_free {
            if let Some(first) = prev_free {
                return Err(InvariantViolation::AdjacentFree {
                    first,
                    second: block.start,
                });
            }
            prev_free = Some(block.start);
            free_sum += block.size;
        } else {
            prev_free = None;
        }
        expected = block.start.saturating_add(block.size);
    }

    if expected != capacity {
        return Err(InvariantViolation::CoverageMismatch {
            covered: expected,
            capacity,
        });
    }
    Ok(free_sum)
}

/// Full check: [`check_layout`] plus agreement with the cached free total.
pub fn check_all<I>(blocks: I, capacity: usize, free_total: usize) -> Result<(), InvariantViolation>
where
    I: IntoIterator<Item = BlockInfo>,
{
    let actual = check_layout(blocks, capacity)?;
    if actual != free_total {
        return Err(InvariantViolation::FreeTotalDrift {
            cached: free_total,
            actual,
        });
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn info(start: usize, size: usize, is_free: bool) -> BlockInfo {
        BlockInfo {
            start,
            size,
            is_free,
        }
    }

    #[test]
    fn healthy_layout_passes() {
        let blocks = [info(0, 3, false), info(3, 2, true), info(5, 5, false)];
        assert_eq!(check_layout(blocks, 10), Ok(2));
        assert_eq!(check_all(blocks, 10, 2), Ok(()));
    }

    #[test]
    fn gap_is_discontiguous() {
        let blocks = [info(0, 3, false), info(4, 6, true)];
        assert_eq!(
            check_layout(blocks, 10),
            Err(InvariantViolation::Discontiguous {
                index: 1,
                start: 4,
                expected: 3
            })
        );
    }

    #[test]
    fn adjacent_free_blocks_rejected() {
        let blocks = [info(0, 3, true), info(3, 7, true)];
        let err = check_layout(blocks, 10).unwrap_err();
        assert_eq!(err.label(), "adjacent_free");
    }

    #[test]
    fn short_coverage_rejected() {
        let blocks = [info(0, 3, false), info(3, 5, true)];
        assert_eq!(
            check_layout(blocks, 10),
            Err(InvariantViolation::CoverageMismatch {
                covered: 8,
                capacity: 10
            })
        );
    }

    #[test]
    fn zero_size_block_rejected() {
        let blocks = [info(0, 0, false), info(0, 10, true)];
        assert!(matches!(
            check_layout(blocks, 10),
            Err(InvariantViolation::EmptyBlock { index: 0, .. })
        ));
    }

    #[test]
    fn free_total_drift_detected() {
        let blocks = [info(0, 4, true), info(4, 6, false)];
        assert_eq!(
            check_all(blocks, 10, 5),
            Err(InvariantViolation::FreeTotalDrift {
                cached: 5,
                actual: 4
            })
        );
    }
}
