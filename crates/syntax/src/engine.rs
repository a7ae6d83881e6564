//! The seam between the syntax core and an incremental parser.
//!
//! The core never inspects trees itself. It asks the engine to parse with a
//! time budget, tells trees about edits, diffs old and new trees, and runs
//! highlight queries restricted to a range of rows.

use std::ops::Range;
use std::rc::Rc;
use std::time::Duration;

use thiserror::Error;

use crate::edit::{Point, SyntaxTreeEdit, line_stop};
use crate::ranges::LineRange;

/// Reasons a parse attempt produced no tree.
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum ParseError {
	/// The attempt ran out of its time budget. Calling `parse` again with the
	/// same input resumes where it stopped.
	#[error("parse attempt exceeded its time budget")]
	Timeout,
}

/// A region whose syntactic structure differs between two trees.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ChangedRange {
	pub start_byte: usize,
	pub end_byte: usize,
	pub start_point: Point,
	pub end_point: Point,
}

impl ChangedRange {
	/// Lines covered by the change, never empty.
	pub fn lines(&self) -> LineRange {
		let start = self.start_point.row;
		LineRange::new(start, line_stop(self.end_point).max(start + 1))
	}
}

/// Parse result produced by a [`ParseEngine`].
pub trait SyntaxTree: Clone {
	/// Adjusts the tree in place to account for a textual edit made since it
	/// was produced.
	fn edit(&mut self, edit: &SyntaxTreeEdit);

	/// Regions where `self` and `new` differ structurally.
	fn changed_ranges(&self, new: &Self) -> Vec<ChangedRange>;

	/// Indented, human-readable listing of the nodes intersecting `rows`.
	fn dump(&self, rows: Range<usize>) -> String;
}

/// An incremental parser.
pub trait ParseEngine {
	type Tree: SyntaxTree;

	/// Parses `text`, reusing `old_tree` (already edited) where possible.
	///
	/// The engine gives up with [`ParseError::Timeout`] once `budget` has been
	/// spent and keeps its progress for the next call.
	fn parse(&mut self, text: &[u8], old_tree: Option<&Self::Tree>, budget: Duration) -> Result<Self::Tree, ParseError>;

	/// Discards progress kept from a timed-out attempt, so the next call
	/// starts from scratch on different text.
	fn reset(&mut self) {}
}

/// One named node matched by a highlight query.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Capture {
	pub name: Rc<str>,
	pub start: Point,
	pub end: Point,
}

/// A compiled query that turns tree nodes into named captures.
pub trait HighlightQuery {
	type Tree;

	/// Captures for nodes intersecting `range`.
	///
	/// `source` is the text the tree was parsed from; it is needed to evaluate
	/// text predicates.
	fn captures(&self, tree: &Self::Tree, source: &[u8], range: Range<Point>) -> Vec<Capture>;
}
