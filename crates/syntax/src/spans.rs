//! Lazy, block-based cache of per-line highlight spans.
//!
//! [`SyntaxLineSpans`] holds a snapshot (the text a tree was parsed from, the
//! tree, and a highlight query). Looking up a line computes spans for the
//! whole block of lines containing it on first access. Columns are converted
//! from bytes to codepoints, and overlapping captures are resolved so that
//! each line carries a sorted list of disjoint spans.

use std::rc::Rc;
use std::time::Duration;

use rustc_hash::{FxHashMap, FxHashSet};

use crate::codepoint::codepoint_map;
use crate::config::SettingsHandle;
use crate::edit::Point;
use crate::engine::HighlightQuery;
use crate::snapshot::TextSnapshot;
use crate::timer::ActionTimer;

/// Column used as a span end when a node continues onto the next line.
pub const TO_END_OF_LINE: usize = 0x7fff_ffff;

/// A highlighted codepoint range `start..end` on a single line.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InlineSpan {
	pub start: usize,
	pub end: usize,
	pub name: Rc<str>,
}

impl InlineSpan {
	pub fn new(start: usize, end: usize, name: impl Into<Rc<str>>) -> Self {
		Self { start, end, name: name.into() }
	}

	/// Returns true when the span runs to the end of its line.
	pub fn is_to_end_of_line(&self) -> bool {
		self.end == TO_END_OF_LINE
	}
}

/// Per-line span cache for one snapshot.
pub struct SyntaxLineSpans<Q: HighlightQuery> {
	settings: SettingsHandle,
	text: Rc<TextSnapshot>,
	tree: Option<Rc<Q::Tree>>,
	query: Option<Rc<Q>>,
	block_size: usize,
	computed: FxHashSet<usize>,
	spans: FxHashMap<usize, Vec<InlineSpan>>,
	build_times: Vec<Duration>,
}

impl<Q: HighlightQuery> Clone for SyntaxLineSpans<Q> {
	fn clone(&self) -> Self {
		Self {
			settings: self.settings.clone(),
			text: self.text.clone(),
			tree: self.tree.clone(),
			query: self.query.clone(),
			block_size: self.block_size,
			computed: self.computed.clone(),
			spans: self.spans.clone(),
			build_times: Vec::new(),
		}
	}
}

impl<Q: HighlightQuery> SyntaxLineSpans<Q> {
	pub fn new(settings: SettingsHandle) -> Self {
		let block_size = settings.with(|s| s.block_size());
		Self {
			settings,
			text: Rc::default(),
			tree: None,
			query: None,
			block_size,
			computed: FxHashSet::default(),
			spans: FxHashMap::default(),
			build_times: Vec::new(),
		}
	}

	/// Replaces the snapshot if `tree` is a different tree.
	///
	/// Identity is pointer identity: a content-identical tree in a new
	/// allocation still invalidates every cached block. The lines are only
	/// kept when both a query and a tree are present.
	pub fn set_snapshot(&mut self, text: Rc<TextSnapshot>, query: Option<Rc<Q>>, tree: Option<Rc<Q::Tree>>) {
		let same = match (&self.tree, &tree) {
			(Some(old), Some(new)) => Rc::ptr_eq(old, new),
			(None, None) => true,
			_ => false,
		};
		if same {
			return;
		}
		self.clear();
		self.text = if query.is_some() && tree.is_some() { text } else { Rc::default() };
		self.query = query;
		self.tree = tree;
	}

	/// Replaces the query and drops every cached block.
	pub fn set_query(&mut self, query: Option<Rc<Q>>) {
		self.query = query;
		self.clear();
	}

	/// Number of lines in the snapshot.
	pub fn line_count(&self) -> usize {
		self.text.line_count()
	}

	/// Number of blocks computed since the snapshot was last replaced.
	pub fn computed_blocks(&self) -> usize {
		self.computed.len()
	}

	/// Spans for `index`, sorted by start and pairwise disjoint.
	///
	/// Lines outside the snapshot have no spans.
	pub fn line_spans(&mut self, index: usize) -> &[InlineSpan] {
		if index >= self.line_count() {
			return &[];
		}
		let block = index / self.block_size;
		if self.computed.insert(block) {
			self.build_block(block);
		}
		self.spans.get(&index).map(Vec::as_slice).unwrap_or(&[])
	}

	/// Time spent computing each block, in order.
	pub fn build_times(&self) -> &[Duration] {
		&self.build_times
	}

	pub fn total_build_time(&self) -> Duration {
		self.build_times.iter().sum()
	}

	pub fn reset_build_times(&mut self) {
		self.build_times.clear();
	}

	fn clear(&mut self) {
		self.computed.clear();
		self.spans.clear();
		self.block_size = self.settings.with(|s| s.block_size());
	}

	fn build_block(&mut self, block: usize) {
		let (Some(tree), Some(query)) = (&self.tree, &self.query) else {
			return;
		};
		let timer = ActionTimer::start();
		let first = block * self.block_size;
		let last = self.line_count().min(first + self.block_size);
		let range = Point::line_start(first)..Point::line_start(last);
		let captures = query.captures(tree, self.text.bytes(), range);

		let mut raw: FxHashMap<usize, Vec<InlineSpan>> = FxHashMap::default();
		let mut push = |row: usize, start: usize, end: usize, name: &Rc<str>| {
			if (first..last).contains(&row) {
				raw.entry(row).or_default().push(InlineSpan::new(start, end, name.clone()));
			}
		};
		for capture in &captures {
			let (start, end) = (capture.start, capture.end);
			if start.row == end.row {
				push(start.row, start.column, end.column, &capture.name);
				continue;
			}
			push(start.row, start.column, TO_END_OF_LINE, &capture.name);
			for row in (start.row + 1).max(first)..end.row.min(last) {
				push(row, 0, TO_END_OF_LINE, &capture.name);
			}
			push(end.row, 0, end.column, &capture.name);
		}

		for (row, spans) in raw {
			let Some(line) = self.text.line(row) else {
				continue;
			};
			let map = codepoint_map(line);
			let remapped = spans
				.into_iter()
				.map(|span| InlineSpan {
					start: map.map(span.start),
					end: if span.is_to_end_of_line() { TO_END_OF_LINE } else { map.map(span.end) },
					name: span.name,
				})
				.filter(|span| span.start < span.end)
				.collect();
			self.spans.insert(row, resolve_overlaps(remapped));
		}

		let elapsed = timer.elapsed();
		tracing::trace!(block, first, last, captures = captures.len(), elapsed_us = elapsed.as_micros() as u64, "spans.block.build");
		self.build_times.push(elapsed);
	}
}

/// Sorts spans by `(start, end)` and removes overlaps.
///
/// Spans are visited from last to first in sorted order, so later (usually
/// narrower) captures win. A span fully covered by kept spans is dropped, and
/// a partially covered one keeps only its uncovered pieces.
pub fn resolve_overlaps(mut spans: Vec<InlineSpan>) -> Vec<InlineSpan> {
	spans.sort_by_key(|span| (span.start, span.end));

	let mut kept: Vec<InlineSpan> = Vec::with_capacity(spans.len());
	for span in spans.into_iter().rev() {
		let mut pieces = vec![(span.start, span.end)];
		for other in &kept {
			pieces = pieces
				.into_iter()
				.flat_map(|(a, b)| {
					if other.end <= a || b <= other.start {
						return vec![(a, b)];
					}
					let mut rest = Vec::with_capacity(2);
					if a < other.start {
						rest.push((a, other.start));
					}
					if other.end < b {
						rest.push((other.end, b));
					}
					rest
				})
				.collect();
			if pieces.is_empty() {
				break;
			}
		}
		kept.extend(pieces.into_iter().map(|(start, end)| InlineSpan {
			start,
			end,
			name: span.name.clone(),
		}));
	}
	kept.sort_by_key(|span| (span.start, span.end));
	kept
}
