//! Block-list entries and the diagnostic dump.

use std::fmt;

use crate::segment::Segment;

/// Internal partition of the region. Never handed out.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct Block {
    pub(crate) start: usize,
    pub(crate) size: usize,
    pub(crate) is_free: bool,
}

impl Block {
    pub(crate) const fn free(start: usize, size: usize) -> Self {
        Self {
            start,
            size,
            is_free: true,
        }
    }

    pub(crate) const fn end(self) -> usize {
        self.start + self.size
    }

    pub(crate) const fn segment(self) -> Segment {
        Segment::new(self.start, self.size)
    }

    pub(crate) const fn info(self) -> BlockInfo {
        BlockInfo {
            start: self.start,
            size: self.size,
            is_free: self.is_free,
        }
    }
}

/// Copy of one block's `(start, size, is_free)` triple.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct BlockInfo {
    pub start: usize,
    pub size: usize,
    pub is_free: bool,
}

impl From<BlockInfo> for (usize, usize, bool) {
    fn from(info: BlockInfo) -> Self {
        (info.start, info.size, info.is_free)
    }
}

impl fmt::Display for BlockInfo {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "Start: {}, Size: {}, {}",
            self.start,
            self.size,
            if self.is_free { "free" } else { "allocated" }
        )
    }
}

/// Point-in-time snapshot of the block list.
///
/// Taken under the allocator lock and detached from it afterwards, so it can
/// be iterated any number of times without holding up allocations.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BlockDump {
    blocks: Vec<BlockInfo>,
    free_total: usize,
}

pub type BlockIter<'a> = std::iter::Copied<std::slice::Iter<'a, BlockInfo>>;

impl BlockDump {
    pub(crate) fn capture(blocks: &[Block], free_total: usize) -> Self {
        Self {
            blocks: blocks.iter().map(|b| b.info()).collect(),
            free_total,
        }
    }

    /// Blocks in ascending start order. Each call starts from the beginning.
    pub fn iter(&self) -> BlockIter<'_> {
        self.blocks.iter().copied()
    }

    #[must_use]
    pub fn as_slice(&self) -> &[BlockInfo] {
        &self.blocks
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.blocks.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.blocks.is_empty()
    }

    #[must_use]
    pub fn free_total(&self) -> usize {
        self.free_total
    }
}

impl<'a> IntoIterator for &'a BlockDump {
    type Item = BlockInfo;
    type IntoIter = BlockIter<'a>;

    fn into_iter(self) -> Self::IntoIter {
        self.iter()
    }
}

/// Renders one `Start: .., Size: .., free|allocated` line per block followed
/// by `Total free memory: <n>`.
impl fmt::Display for BlockDump {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for block in &self.blocks {
            writeln!(f, "{block}")?;
        }
        write!(f, "Total free memory: {}", self.free_total)
    }
}
