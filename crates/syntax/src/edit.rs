//! Edit records and the backlog of edits waiting for the next parse.

use std::fmt;

use crate::ranges::{LineRange, merge_line_ranges};

/// A zero-based `(row, column)` position.
///
/// The column is a byte offset into the row, not a character index.
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Default)]
pub struct Point {
	pub row: usize,
	pub column: usize,
}

impl Point {
	pub const fn new(row: usize, column: usize) -> Self {
		Self { row, column }
	}

	/// Start of `row`.
	pub const fn line_start(row: usize) -> Self {
		Self { row, column: 0 }
	}
}

impl fmt::Debug for Point {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		write!(f, "({}, {})", self.row, self.column)
	}
}

/// One recorded buffer mutation.
///
/// Bytes `start_byte..old_end_byte` (ending at `old_end_point`) were replaced
/// by bytes `start_byte..new_end_byte` (ending at `new_end_point`).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SyntaxTreeEdit {
	pub start_byte: usize,
	pub old_end_byte: usize,
	pub new_end_byte: usize,
	pub start_point: Point,
	pub old_end_point: Point,
	pub new_end_point: Point,
}

impl SyntaxTreeEdit {
	/// Signed change in line count caused by the edit.
	pub fn line_delta(&self) -> isize {
		self.new_end_point.row as isize - self.old_end_point.row as isize
	}

	/// Lines of the new text touched by the edit, never empty.
	pub fn new_lines(&self) -> LineRange {
		let start = self.start_point.row;
		let stop = line_stop(self.new_end_point);
		LineRange::new(start, stop.max(start + 1))
	}
}

/// Exclusive line bound for a range ending at `end`.
///
/// A range ending at column zero does not include that row.
pub(crate) fn line_stop(end: Point) -> usize {
	if end.column > 0 { end.row + 1 } else { end.row }
}

/// Lines affected since subscribers were last told about a tree, tracked in
/// the coordinates of the most recently applied text.
///
/// Each applied edit shifts every previously recorded range that lies after
/// it, stretches the ranges it overlaps, and then adds the lines it wrote.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AffectedLines {
	ranges: Vec<LineRange>,
}

impl AffectedLines {
	pub fn new() -> Self {
		Self::default()
	}

	pub fn is_empty(&self) -> bool {
		self.ranges.is_empty()
	}

	/// Records ranges that are already expressed in current coordinates.
	pub fn extend(&mut self, ranges: impl IntoIterator<Item = LineRange>) {
		self.ranges.extend(ranges);
	}

	/// Re-expresses recorded ranges after `edit`, then records the lines the
	/// edit produced.
	pub fn record_edit(&mut self, edit: &SyntaxTreeEdit) {
		let start = edit.start_point.row;
		let old_end = edit.old_end_point.row;
		let delta = edit.line_delta();

		if delta != 0 {
			let shift = |line: usize| line.saturating_add_signed(delta);
			for range in &mut self.ranges {
				if range.stop <= start {
					continue;
				}
				if range.start >= old_end {
					*range = LineRange::new(shift(range.start), shift(range.stop));
				} else {
					// Overlaps the replaced lines, which now begin at `start`.
					let stop = if range.stop > old_end { shift(range.stop) } else { start };
					*range = LineRange::new(range.start.min(start), stop);
				}
			}
		}
		self.ranges.push(edit.new_lines());
	}

	/// Minimal sorted set of the recorded ranges.
	pub fn merged(&self) -> Vec<LineRange> {
		merge_line_ranges(&self.ranges, &[])
	}

	/// Returns the merged ranges and forgets them.
	pub fn take(&mut self) -> Vec<LineRange> {
		let merged = self.merged();
		self.ranges.clear();
		merged
	}

	pub fn clear(&mut self) {
		self.ranges.clear();
	}
}

/// Ordered backlog of edits received since the last parse started.
#[derive(Debug, Clone, Default)]
pub struct EditLog {
	pending: Vec<SyntaxTreeEdit>,
}

impl EditLog {
	pub fn new() -> Self {
		Self::default()
	}

	/// Appends an edit.
	pub fn push(&mut self, edit: SyntaxTreeEdit) {
		self.pending.push(edit);
	}

	pub fn is_empty(&self) -> bool {
		self.pending.is_empty()
	}

	pub fn len(&self) -> usize {
		self.pending.len()
	}

	/// Edits in arrival order.
	pub fn pending(&self) -> &[SyntaxTreeEdit] {
		&self.pending
	}

	/// Removes and returns every pending edit in arrival order.
	pub fn drain(&mut self) -> Vec<SyntaxTreeEdit> {
		std::mem::take(&mut self.pending)
	}

	pub fn clear(&mut self) {
		self.pending.clear();
	}
}
