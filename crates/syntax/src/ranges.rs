//! Half-open line ranges and their minimal covering merge.

use std::fmt;

/// A half-open range of line indices, `start..stop`.
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Default)]
pub struct LineRange {
	pub start: usize,
	pub stop: usize,
}

impl LineRange {
	/// Creates a range, swapping the bounds if given in reverse.
	pub fn new(start: usize, stop: usize) -> Self {
		if stop < start { Self { start: stop, stop: start } } else { Self { start, stop } }
	}

	/// Number of lines covered.
	pub fn len(&self) -> usize {
		self.stop - self.start
	}

	/// Returns true for an empty range.
	pub fn is_empty(&self) -> bool {
		self.start == self.stop
	}

	/// Returns true if `line` falls inside the range.
	pub fn contains(&self, line: usize) -> bool {
		self.start <= line && line < self.stop
	}

	/// Returns true when the two ranges overlap or touch.
	pub fn touches(&self, other: &Self) -> bool {
		!(self.stop < other.start || other.stop < self.start)
	}

	/// Smallest range covering both.
	pub fn union(&self, other: &Self) -> Self {
		Self {
			start: self.start.min(other.start),
			stop: self.stop.max(other.stop),
		}
	}
}

impl fmt::Debug for LineRange {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		write!(f, "{}..{}", self.start, self.stop)
	}
}

impl From<std::ops::Range<usize>> for LineRange {
	fn from(range: std::ops::Range<usize>) -> Self {
		Self::new(range.start, range.end)
	}
}

impl From<LineRange> for std::ops::Range<usize> {
	fn from(range: LineRange) -> Self {
		range.start..range.stop
	}
}

/// Merges two sets of line ranges into the minimal sorted set covering the
/// same lines.
///
/// Ranges that overlap or touch are fused. The result is sorted ascending and
/// pairwise disjoint, and does not depend on the order of the inputs.
pub fn merge_line_ranges(a: &[LineRange], b: &[LineRange]) -> Vec<LineRange> {
	let mut all: Vec<LineRange> = a.iter().chain(b).copied().collect();
	all.sort_unstable();

	let mut merged: Vec<LineRange> = Vec::with_capacity(all.len());
	for range in all {
		match merged.last_mut() {
			Some(last) if last.touches(&range) => *last = last.union(&range),
			_ => merged.push(range),
		}
	}
	merged
}
