//! Tree-sitter parser and tree.

use std::fmt::Write;
use std::ops::Range;
use std::time::Duration;

use tree_sitter::{InputEdit, Language, LanguageError, Node, Parser, Tree};
use treesit_syntax::{ChangedRange, ParseEngine, ParseError, Point, SyntaxTree, SyntaxTreeEdit};

/// A tree-sitter [`Parser`] bound to one language.
pub struct TsEngine {
	parser: Parser,
}

impl TsEngine {
	pub fn new(language: &Language) -> Result<Self, LanguageError> {
		let mut parser = Parser::new();
		parser.set_language(language)?;
		Ok(Self { parser })
	}
}

impl ParseEngine for TsEngine {
	type Tree = TsTree;

	fn parse(&mut self, text: &[u8], old_tree: Option<&TsTree>, budget: Duration) -> Result<TsTree, ParseError> {
		// Zero disables the timeout altogether.
		let micros = u64::try_from(budget.as_micros()).unwrap_or(u64::MAX).max(1);
		self.parser.set_timeout_micros(micros);
		match self.parser.parse(text, old_tree.map(|old| &old.tree)) {
			Some(tree) => Ok(TsTree { tree }),
			None => {
				tracing::trace!(micros, bytes = text.len(), "ts.parse.timeout");
				Err(ParseError::Timeout)
			}
		}
	}

	fn reset(&mut self) {
		self.parser.reset();
	}
}

/// A parsed tree-sitter [`Tree`].
///
/// Cloning is cheap; tree-sitter trees are reference counted internally.
#[derive(Clone, Debug)]
pub struct TsTree {
	tree: Tree,
}

impl TsTree {
	pub fn inner(&self) -> &Tree {
		&self.tree
	}

	pub fn root_node(&self) -> Node<'_> {
		self.tree.root_node()
	}
}

impl SyntaxTree for TsTree {
	fn edit(&mut self, edit: &SyntaxTreeEdit) {
		self.tree.edit(&InputEdit {
			start_byte: edit.start_byte,
			old_end_byte: edit.old_end_byte,
			new_end_byte: edit.new_end_byte,
			start_position: ts_point(edit.start_point),
			old_end_position: ts_point(edit.old_end_point),
			new_end_position: ts_point(edit.new_end_point),
		});
	}

	fn changed_ranges(&self, new: &Self) -> Vec<ChangedRange> {
		self.tree
			.changed_ranges(&new.tree)
			.map(|range| ChangedRange {
				start_byte: range.start_byte,
				end_byte: range.end_byte,
				start_point: point(range.start_point),
				end_point: point(range.end_point),
			})
			.collect()
	}

	/// Lists named nodes touching `rows`, one per line, indented by depth and
	/// prefixed with the field name they fill in their parent.
	fn dump(&self, rows: Range<usize>) -> String {
		let mut out = String::new();
		let mut cursor = self.tree.walk();
		let mut depth = 0usize;
		loop {
			let node = cursor.node();
			let visible = node.start_position().row < rows.end && node.end_position().row >= rows.start;
			if visible && node.is_named() {
				let start = node.start_position();
				let end = node.end_position();
				let _ = write!(out, "{:indent$}", "", indent = depth * 2);
				if let Some(field) = cursor.field_name() {
					let _ = write!(out, "{field}: ");
				}
				let _ = writeln!(out, "{} [{}, {}] - [{}, {}]", node.kind(), start.row, start.column, end.row, end.column);
			}
			if visible && cursor.goto_first_child() {
				depth += 1;
				continue;
			}
			loop {
				if cursor.goto_next_sibling() {
					break;
				}
				if !cursor.goto_parent() {
					return out;
				}
				depth -= 1;
			}
		}
	}
}

pub(crate) fn ts_point(point: Point) -> tree_sitter::Point {
	tree_sitter::Point {
		row: point.row,
		column: point.column,
	}
}

pub(crate) fn point(point: tree_sitter::Point) -> Point {
	Point::new(point.row, point.column)
}
