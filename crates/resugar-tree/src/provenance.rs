// Copyright (c) Ken Kocienda and other contributors.
//
// This source code is licensed under the MIT license found in the
// LICENSE file in the root directory of this source tree.

//! Instruction-range provenance markers.
//!
//! Every syntax node carries a [`ProvenanceSet`]: the set of original
//! instruction offsets the node was derived from. Rewrite passes move nodes
//! around, merge them, and delete them, but the provenance attached to a
//! subtree must survive every rewrite — ranges may migrate to a different
//! carrier node or merge with a neighbor, but they must never be dropped.
//!
//! The set is kept normalized: ranges are sorted by start offset, disjoint,
//! and compacted (overlapping or adjacent ranges are merged on insertion).

use std::fmt;

use serde::{Deserialize, Serialize};

/// A half-open range `[start, end)` of instruction offsets.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct IlRange {
    /// First instruction offset covered by this range.
    pub start: u32,
    /// One past the last instruction offset covered by this range.
    pub end: u32,
}

impl IlRange {
    /// Create a new range. `start` must not exceed `end`.
    pub fn new(start: u32, end: u32) -> Self {
        assert!(start <= end, "IlRange start {start} exceeds end {end}");
        IlRange { start, end }
    }

    /// Number of instruction offsets covered.
    pub fn len(&self) -> u32 {
        self.end - self.start
    }

    /// True if the range covers no offsets.
    pub fn is_empty(&self) -> bool {
        self.start == self.end
    }

    /// True if `self` and `other` overlap or touch, i.e. their union is a
    /// single contiguous range.
    fn coalesces_with(&self, other: &IlRange) -> bool {
        self.start <= other.end && other.start <= self.end
    }
}

impl fmt::Display for IlRange {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{:#06x}..{:#06x})", self.start, self.end)
    }
}

/// An ordered, de-duplicated, range-compacted set of [`IlRange`] markers.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProvenanceSet {
    // Sorted by start, pairwise disjoint and non-adjacent.
    ranges: Vec<IlRange>,
}

impl ProvenanceSet {
    /// Create an empty set.
    pub fn new() -> Self {
        ProvenanceSet::default()
    }

    /// Create a set holding a single range.
    pub fn from_range(range: IlRange) -> Self {
        let mut set = ProvenanceSet::new();
        set.add(range);
        set
    }

    /// True if the set holds no ranges.
    pub fn is_empty(&self) -> bool {
        self.ranges.is_empty()
    }

    /// Number of (compacted) ranges in the set.
    pub fn len(&self) -> usize {
        self.ranges.len()
    }

    /// The normalized ranges, sorted by start offset.
    pub fn ranges(&self) -> &[IlRange] {
        &self.ranges
    }

    /// Total number of instruction offsets covered.
    pub fn covered(&self) -> u64 {
        self.ranges.iter().map(|r| u64::from(r.len())).sum()
    }

    /// Insert a range, merging it with any overlapping or adjacent ranges.
    pub fn add(&mut self, range: IlRange) {
        if range.is_empty() {
            return;
        }
        // Position of the first existing range that could coalesce.
        let first = self.ranges.partition_point(|r| r.end < range.start);
        let mut merged = range;
        let mut last = first;
        while last < self.ranges.len() && self.ranges[last].coalesces_with(&merged) {
            merged.start = merged.start.min(self.ranges[last].start);
            merged.end = merged.end.max(self.ranges[last].end);
            last += 1;
        }
        self.ranges.splice(first..last, std::iter::once(merged));
    }

    /// Merge another set into this one.
    pub fn merge(&mut self, other: &ProvenanceSet) {
        for range in &other.ranges {
            self.add(*range);
        }
    }

    /// Remove and return the contents, leaving this set empty.
    pub fn take(&mut self) -> ProvenanceSet {
        ProvenanceSet {
            ranges: std::mem::take(&mut self.ranges),
        }
    }

    /// Iterate over the normalized ranges.
    pub fn iter(&self) -> impl Iterator<Item = &IlRange> {
        self.ranges.iter()
    }
}

impl FromIterator<IlRange> for ProvenanceSet {
    fn from_iter<I: IntoIterator<Item = IlRange>>(iter: I) -> Self {
        let mut set = ProvenanceSet::new();
        for range in iter {
            set.add(range);
        }
        set
    }
}

impl fmt::Display for ProvenanceSet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{{")?;
        for (i, range) in self.ranges.iter().enumerate() {
            if i > 0 {
                write!(f, ", ")?;
            }
            write!(f, "{range}")?;
        }
        write!(f, "}}")
    }
}
