//! Deterministic engine and query doubles.

use std::cell::{Cell, RefCell};
use std::ops::Range;
use std::rc::Rc;
use std::time::Duration;

use treesit_worker::ManualScheduler;

use crate::edit::{Point, SyntaxTreeEdit};
use crate::engine::{Capture, ChangedRange, HighlightQuery, ParseEngine, ParseError, SyntaxTree};

/// Tree produced by [`MockEngine`]: the parsed lines plus every edit applied
/// to it afterwards.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct MockTree {
	pub generation: u64,
	pub lines: Vec<String>,
	pub edits: Vec<SyntaxTreeEdit>,
}

impl SyntaxTree for MockTree {
	fn edit(&mut self, edit: &SyntaxTreeEdit) {
		self.edits.push(*edit);
	}

	/// One range per row whose text differs.
	fn changed_ranges(&self, new: &Self) -> Vec<ChangedRange> {
		new.lines
			.iter()
			.enumerate()
			.filter(|(row, line)| self.lines.get(*row) != Some(*line))
			.map(|(row, line)| ChangedRange {
				start_byte: 0,
				end_byte: 0,
				start_point: Point::new(row, 0),
				end_point: Point::new(row, line.len().max(1)),
			})
			.collect()
	}

	fn dump(&self, rows: Range<usize>) -> String {
		let mut out = String::new();
		for (row, line) in self.lines.iter().enumerate().take(rows.end).skip(rows.start) {
			out.push_str(&format!("{row}: {line}\n"));
		}
		out
	}
}

/// A parse the mock engine completed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct ParseRecord {
	pub text: String,
	pub old_edits: Option<Vec<SyntaxTreeEdit>>,
}

#[derive(Default)]
pub(crate) struct MockEngineState {
	pub timeouts: usize,
	pub cost: Duration,
	pub attempts: usize,
	pub resets: usize,
	pub parses: Vec<ParseRecord>,
	next_generation: u64,
}

/// Engine that splits text into lines and can be told to time out.
///
/// Clones share state so tests can inspect an engine after handing it to a
/// controller.
#[derive(Clone, Default)]
pub(crate) struct MockEngine {
	pub state: Rc<RefCell<MockEngineState>>,
	clock: Option<Rc<ManualScheduler>>,
}

impl MockEngine {
	pub fn new() -> Self {
		Self::default()
	}

	/// Each attempt advances `clock` by `cost`.
	pub fn with_clock(clock: Rc<ManualScheduler>, cost: Duration) -> Self {
		let engine = Self {
			state: Rc::default(),
			clock: Some(clock),
		};
		engine.state.borrow_mut().cost = cost;
		engine
	}

	/// Makes the next `count` attempts time out.
	pub fn time_out_next(&self, count: usize) {
		self.state.borrow_mut().timeouts = count;
	}

	pub fn set_cost(&self, cost: Duration) {
		self.state.borrow_mut().cost = cost;
	}

	pub fn attempts(&self) -> usize {
		self.state.borrow().attempts
	}

	pub fn parses(&self) -> Vec<ParseRecord> {
		self.state.borrow().parses.clone()
	}
}

impl ParseEngine for MockEngine {
	type Tree = MockTree;

	fn parse(&mut self, text: &[u8], old_tree: Option<&MockTree>, _budget: Duration) -> Result<MockTree, ParseError> {
		let mut state = self.state.borrow_mut();
		state.attempts += 1;
		if let Some(clock) = &self.clock {
			clock.elapse(state.cost);
		}
		if state.timeouts > 0 {
			state.timeouts -= 1;
			return Err(ParseError::Timeout);
		}
		let text = String::from_utf8_lossy(text).into_owned();
		state.parses.push(ParseRecord {
			text: text.clone(),
			old_edits: old_tree.map(|tree| tree.edits.clone()),
		});
		state.next_generation += 1;
		Ok(MockTree {
			generation: state.next_generation,
			lines: text.split('\n').map(str::to_owned).collect(),
			edits: Vec::new(),
		})
	}

	fn reset(&mut self) {
		self.state.borrow_mut().resets += 1;
	}
}

/// Query returning a fixed capture list, filtered to the requested range.
#[derive(Default)]
pub(crate) struct MockQuery {
	pub captures: Vec<Capture>,
	pub calls: Cell<usize>,
}

impl MockQuery {
	pub fn new(captures: Vec<Capture>) -> Self {
		Self {
			captures,
			calls: Cell::new(0),
		}
	}
}

pub(crate) fn capture(name: &str, start: (usize, usize), end: (usize, usize)) -> Capture {
	Capture {
		name: Rc::from(name),
		start: Point::new(start.0, start.1),
		end: Point::new(end.0, end.1),
	}
}

impl HighlightQuery for MockQuery {
	type Tree = MockTree;

	fn captures(&self, _tree: &MockTree, _source: &[u8], range: Range<Point>) -> Vec<Capture> {
		self.calls.set(self.calls.get() + 1);
		self.captures
			.iter()
			.filter(|c| c.start < range.end && c.end > range.start)
			.cloned()
			.collect()
	}
}
