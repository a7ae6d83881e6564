//! Per-buffer listener tying a host buffer to a parse controller.
//!
//! The listener subscribes to the buffer's change feed and turns each Vim-style
//! `(start_line, end_line, added)` triple into a byte-range edit using a
//! running table of line start offsets. It owns the buffer's span cache and
//! refreshes its snapshot whenever the controller reports, before passing the
//! notification on to its own subscribers.

use std::cell::{Cell, RefCell};
use std::ops::Range;
use std::rc::{Rc, Weak};

use treesit_worker::Scheduler;

use crate::config::SettingsHandle;
use crate::controller::{ConditionCode, ParseCompleteCallback, ParseController};
use crate::edit::{Point, SyntaxTreeEdit};
use crate::engine::{HighlightQuery, ParseEngine};
use crate::host::{BufferChange, BufferEvent, HostBuffer, SubscriptionId};
use crate::ranges::LineRange;
use crate::spans::{InlineSpan, SyntaxLineSpans};

struct Inner<E: ParseEngine, Q: HighlightQuery<Tree = E::Tree>> {
	buffer: Weak<dyn HostBuffer>,
	controller: ParseController<E>,
	query: RefCell<Option<Rc<Q>>>,
	spans: RefCell<SyntaxLineSpans<Q>>,
	byte_offsets: RefCell<Vec<usize>>,
	callbacks: RefCell<Vec<ParseCompleteCallback>>,
	subscription: Cell<Option<SubscriptionId>>,
}

impl<E: ParseEngine, Q: HighlightQuery<Tree = E::Tree>> Drop for Inner<E, Q> {
	fn drop(&mut self) {
		if let (Some(buffer), Some(id)) = (self.buffer.upgrade(), self.subscription.take()) {
			buffer.unsubscribe(id);
		}
	}
}

/// Keeps a syntax tree and span cache in step with one buffer.
pub struct Listener<E: ParseEngine, Q: HighlightQuery<Tree = E::Tree>> {
	inner: Rc<Inner<E, Q>>,
}

impl<E: ParseEngine, Q: HighlightQuery<Tree = E::Tree>> Clone for Listener<E, Q> {
	fn clone(&self) -> Self {
		Self { inner: self.inner.clone() }
	}
}

impl<E, Q> Listener<E, Q>
where
	E: ParseEngine + 'static,
	Q: HighlightQuery<Tree = E::Tree> + 'static,
{
	/// Attaches to `buffer` and requests the first parse.
	///
	/// The parse runs on the next scheduler turn, so callbacks registered
	/// right after construction see the first tree arrive.
	pub fn new(buffer: &Rc<dyn HostBuffer>, engine: E, query: Option<Rc<Q>>, scheduler: Rc<dyn Scheduler>, settings: SettingsHandle) -> Self {
		let controller = ParseController::new(engine, buffer, scheduler, settings.clone());
		let inner = Rc::new(Inner {
			buffer: Rc::downgrade(buffer),
			controller,
			query: RefCell::new(query),
			spans: RefCell::new(SyntaxLineSpans::new(settings)),
			byte_offsets: RefCell::new(line_offsets(buffer.as_ref())),
			callbacks: RefCell::new(Vec::new()),
			subscription: Cell::new(None),
		});

		let weak = Rc::downgrade(&inner);
		inner.controller.subscribe(Rc::new(move |code: ConditionCode, ranges: &[LineRange]| {
			if let Some(inner) = weak.upgrade() {
				Self::handle_parse_complete(&inner, code, ranges);
			}
		}));

		let weak = Rc::downgrade(&inner);
		let id = buffer.subscribe(Rc::new(move |event: &BufferEvent| {
			let Some(inner) = weak.upgrade() else {
				return;
			};
			let listener = Self { inner };
			match event {
				BufferEvent::Changed(change) => listener.handle_changes(change),
				BufferEvent::Reloaded => listener.handle_buffer_reload(),
			}
		}));
		inner.subscription.set(Some(id));
		inner.controller.request_start();
		tracing::debug!(lines = buffer.line_count(), "syntax.listener.attach");
		Self { inner }
	}

	fn handle_parse_complete(inner: &Rc<Inner<E, Q>>, code: ConditionCode, ranges: &[LineRange]) {
		Self::refresh_spans(inner);
		let callbacks: Vec<ParseCompleteCallback> = inner.callbacks.borrow().clone();
		for callback in callbacks {
			callback(code, ranges);
		}
	}

	/// Points the span cache at the controller's latest tree and text.
	fn refresh_spans(inner: &Inner<E, Q>) {
		let query = inner.query.borrow().clone();
		inner
			.spans
			.borrow_mut()
			.set_snapshot(inner.controller.parsed_text(), query, inner.controller.tree());
	}

	/// Converts a host change into an edit and queues it.
	///
	/// Line numbers are clamped to what the listener knows about, so a host
	/// that briefly disagrees with the offset table never causes a panic.
	pub fn handle_changes(&self, change: &BufferChange) {
		let Some(buffer) = self.inner.buffer.upgrade() else {
			return;
		};
		let edit = {
			let mut offsets = self.inner.byte_offsets.borrow_mut();
			let known = offsets.len().saturating_sub(1);
			let old_len = offsets.last().map_or(0, |end| end.saturating_sub(1));

			let mut start = change.start_line;
			if start >= known && known > 0 {
				if start > known {
					tracing::warn!(start, known, "syntax.listener.start_clamped");
				}
				start = known - 1;
			}
			let start = start.min(known);
			let end = change.end_line.min(known).max(start);
			if change.end_line > known {
				tracing::warn!(end = change.end_line, known, "syntax.listener.end_clamped");
			}

			let old_end_byte = offsets[end].min(old_len);
			let old_end_point = point_at(&offsets, old_end_byte);

			let seed = offsets[start];
			offsets.truncate(start + 1);
			let mut next = seed;
			buffer.for_each_line_from(start, &mut |line| {
				next += line.len() + 1;
				offsets.push(next);
			});
			let line_count = offsets.len() - 1;
			let new_len = next.saturating_sub(1);

			// Deleting the last lines also removes the terminator before them,
			// so the edit starts at the new end of text.
			let start_byte = offsets[start].min(old_len).min(new_len);
			let new_end_line = (end as isize + change.added).clamp(start as isize, line_count as isize) as usize;
			let new_end_byte = offsets[new_end_line].min(new_len).max(start_byte);

			SyntaxTreeEdit {
				start_byte,
				old_end_byte,
				new_end_byte,
				start_point: point_at(&offsets, start_byte),
				old_end_point,
				new_end_point: point_at(&offsets, new_end_byte),
			}
		};
		tracing::trace!(start = change.start_line, end = change.end_line, added = change.added, ops = ?change.ops, "syntax.listener.change");
		self.inner.controller.add_edit(edit);
	}

	/// Rebuilds the offset table and reparses from scratch.
	pub fn handle_buffer_reload(&self) {
		if let Some(buffer) = self.inner.buffer.upgrade() {
			*self.inner.byte_offsets.borrow_mut() = line_offsets(buffer.as_ref());
		}
		self.inner.controller.start_clean();
	}

	/// Registers a subscriber.
	///
	/// A subscriber added while a tree exists and no parse is running is
	/// called immediately with [`ConditionCode::NewOutOfDateTree`] and no
	/// ranges, so it can initialise itself from the current tree. That tree
	/// may come from a catch-up parse no subscriber has heard about yet; the
	/// span cache is moved onto it first.
	pub fn add_parse_complete_callback(&self, callback: ParseCompleteCallback) {
		self.inner.callbacks.borrow_mut().push(callback.clone());
		if self.inner.controller.tree().is_some() && !self.inner.controller.is_active() {
			Self::refresh_spans(&self.inner);
			callback(ConditionCode::NewOutOfDateTree, &[]);
		}
	}

	/// The most recently stored tree.
	pub fn tree(&self) -> Option<Rc<E::Tree>> {
		self.inner.controller.tree()
	}

	/// Dump of the current tree restricted to `rows`.
	pub fn print_tree(&self, rows: Range<usize>) -> Option<String> {
		self.inner.controller.dump_tree(rows)
	}

	/// Highlight spans for `line` from the latest published tree.
	pub fn line_spans(&self, line: usize) -> Vec<InlineSpan> {
		self.inner.spans.borrow_mut().line_spans(line).to_vec()
	}

	/// Independent copy of the span cache.
	pub fn spans(&self) -> SyntaxLineSpans<Q> {
		self.inner.spans.borrow().clone()
	}

	/// Replaces the highlight query.
	pub fn set_query(&self, query: Option<Rc<Q>>) {
		*self.inner.query.borrow_mut() = query.clone();
		self.inner.spans.borrow_mut().set_query(query);
	}

	/// Line start offsets as currently tracked.
	pub fn byte_offsets(&self) -> Vec<usize> {
		self.inner.byte_offsets.borrow().clone()
	}

	pub fn controller(&self) -> &ParseController<E> {
		&self.inner.controller
	}
}

/// `offsets[i]` is the byte offset where line `i` starts; the final entry is
/// one past the end, counting a terminator after every line.
fn line_offsets(buffer: &dyn HostBuffer) -> Vec<usize> {
	let mut offsets = Vec::with_capacity(buffer.line_count() + 1);
	let mut next = 0;
	offsets.push(next);
	buffer.for_each_line_from(0, &mut |line| {
		next += line.len() + 1;
		offsets.push(next);
	});
	offsets
}

/// Position of `byte` within the text described by line start `offsets`.
fn point_at(offsets: &[usize], byte: usize) -> Point {
	let row = offsets.partition_point(|&start| start <= byte).saturating_sub(1);
	Point::new(row, byte.saturating_sub(offsets.get(row).copied().unwrap_or(0)))
}

#[cfg(test)]
mod tests;
