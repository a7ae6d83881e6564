//! Compiled highlight queries.

use std::ops::Range;
use std::rc::Rc;

use streaming_iterator::StreamingIterator;
use tree_sitter::{Language, Query, QueryCursor, QueryError};
use treesit_syntax::{Capture, HighlightQuery, Point};

use crate::engine::{TsTree, point, ts_point};

/// A tree-sitter [`Query`] whose captures name highlight groups.
pub struct TsHighlightQuery {
	query: Query,
	names: Vec<Rc<str>>,
}

impl TsHighlightQuery {
	pub fn new(language: &Language, source: &str) -> Result<Self, QueryError> {
		let query = Query::new(language, source)?;
		let names = query.capture_names().iter().map(|name| Rc::from(*name)).collect();
		Ok(Self { query, names })
	}

	/// Capture names, indexed by capture id.
	pub fn capture_names(&self) -> &[Rc<str>] {
		&self.names
	}

	pub fn query(&self) -> &Query {
		&self.query
	}
}

impl HighlightQuery for TsHighlightQuery {
	type Tree = TsTree;

	fn captures(&self, tree: &TsTree, source: &[u8], range: Range<Point>) -> Vec<Capture> {
		let mut cursor = QueryCursor::new();
		cursor.set_point_range(ts_point(range.start)..ts_point(range.end));

		let mut out = Vec::new();
		let mut matches = cursor.captures(&self.query, tree.root_node(), source);
		while let Some((found, index)) = matches.next() {
			let capture = &found.captures[*index];
			let Some(name) = self.names.get(capture.index as usize) else {
				continue;
			};
			out.push(Capture {
				name: name.clone(),
				start: point(capture.node.start_position()),
				end: point(capture.node.end_position()),
			});
		}
		out
	}
}
