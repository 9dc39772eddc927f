//! Allocation result value types.

use std::fmt;

/// One contiguous allocated range `[start, start + size)`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Segment {
    start: usize,
    size: usize,
}

impl Segment {
    #[must_use]
    pub const fn new(start: usize, size: usize) -> Self {
        Self { start, size }
    }

    #[must_use]
    pub const fn start(self) -> usize {
        self.start
    }

    #[must_use]
    pub const fn size(self) -> usize {
        self.size
    }

    /// One past the last byte of the segment.
    #[must_use]
    pub const fn end(self) -> usize {
        self.start.saturating_add(self.size)
    }
}

impl fmt::Display for Segment {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Segment{{start={}, size={}}}", self.start, self.size)
    }
}

/// The full result of one allocation: segments in allocation order.
///
/// A handle is the capability needed to release the allocation. Handles
/// produced by [`crate::Allocator::allocate`] always hold at least one
/// segment and their sizes sum to the requested size.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Handle {
    segments: Vec<Segment>,
}

impl Handle {
    /// Rebuild a handle from raw segments.
    ///
    /// No validation happens here; releasing a handle that does not match
    /// the allocator's current layout fails with `SegmentNotFound`, and an
    /// empty handle fails with `InvalidArgument`.
    #[must_use]
    pub fn from_segments(segments: Vec<Segment>) -> Self {
        Self { segments }
    }

    #[must_use]
    pub fn segments(&self) -> &[Segment] {
        &self.segments
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.segments.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.segments.is_empty()
    }

    /// Sum of all segment sizes.
    #[must_use]
    pub fn total_size(&self) -> usize {
        self.segments.iter().map(|s| s.size).sum()
    }

    pub fn iter(&self) -> impl Iterator<Item = Segment> + '_ {
        self.segments.iter().copied()
    }

    #[must_use]
    pub fn into_segments(self) -> Vec<Segment> {
        self.segments
    }
}

impl<'a> IntoIterator for &'a Handle {
    type Item = &'a Segment;
    type IntoIter = std::slice::Iter<'a, Segment>;

    fn into_iter(self) -> Self::IntoIter {
        self.segments.iter()
    }
}

impl fmt::Display for Handle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("Sequence{segments=[")?;
        for (i, segment) in self.segments.iter().enumerate() {
            if i > 0 {
                f.write_str(", ")?;
            }
            write!(f, "{segment}")?;
        }
        f.write_str("]}")
    }
}
