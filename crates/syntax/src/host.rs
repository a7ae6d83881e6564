//! The host buffer seam.
//!
//! A host exposes its lines, its line count and a change feed. Changes are
//! reported as Vim-style line triples: lines `start_line..end_line` of the old
//! text were replaced, and the line count grew by `added` (negative for
//! deletions).
//!
//! [`MemoryBuffer`] is a rope-backed host used by tests and by embedders that
//! keep text outside an editor.

use std::borrow::Cow;
use std::cell::{Cell, RefCell};
use std::rc::Rc;

use ropey::Rope;

/// A single primitive operation reported alongside a change.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChangeOp {
	/// The text of `line` was replaced.
	Changed { line: usize },
	/// `count` lines were inserted before `at`.
	Inserted { at: usize, count: usize },
	/// `count` lines starting at `at` were removed.
	Deleted { at: usize, count: usize },
}

/// One change notification.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BufferChange {
	pub start_line: usize,
	pub end_line: usize,
	pub added: isize,
	pub ops: Vec<ChangeOp>,
}

/// Events delivered to buffer subscribers.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BufferEvent {
	Changed(BufferChange),
	/// The whole content was replaced out of band; line tracking must restart.
	Reloaded,
}

pub type ChangeHandler = Rc<dyn Fn(&BufferEvent)>;

/// Handle returned by [`HostBuffer::subscribe`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SubscriptionId(pub u64);

/// A text buffer owned by the host editor.
pub trait HostBuffer {
	fn line_count(&self) -> usize;

	/// Calls `f` with the text of each line from `start` to the end, without
	/// line terminators.
	fn for_each_line_from(&self, start: usize, f: &mut dyn FnMut(&str));

	/// Registers a change handler.
	///
	/// Handlers may read the buffer but must not mutate it.
	fn subscribe(&self, handler: ChangeHandler) -> SubscriptionId;

	/// Removes a handler. Returns false if it was not registered.
	fn unsubscribe(&self, id: SubscriptionId) -> bool;

	/// Copies every line.
	fn lines(&self) -> Vec<String> {
		let mut lines = Vec::with_capacity(self.line_count());
		self.for_each_line_from(0, &mut |line| lines.push(line.to_owned()));
		lines
	}
}

/// A [`HostBuffer`] over a [`Rope`].
///
/// Lines are separated by `\n` with no trailing terminator, so an empty buffer
/// holds a single empty line.
#[derive(Default)]
pub struct MemoryBuffer {
	text: RefCell<Rope>,
	handlers: RefCell<Vec<(SubscriptionId, ChangeHandler)>>,
	next_id: Cell<u64>,
}

impl MemoryBuffer {
	pub fn new() -> Self {
		Self::default()
	}

	/// Creates a buffer holding `lines`.
	pub fn from_lines<S: AsRef<str>>(lines: &[S]) -> Self {
		let buffer = Self::new();
		*buffer.text.borrow_mut() = Rope::from_str(&join(lines));
		buffer
	}

	/// Full text, lines joined by `\n`.
	pub fn text(&self) -> String {
		self.text.borrow().to_string()
	}

	/// Text of `line`, if it exists.
	pub fn line(&self, line: usize) -> Option<String> {
		let text = self.text.borrow();
		(line < text.len_lines()).then(|| strip_terminator(text.line(line).into()).into_owned())
	}

	/// Replaces the text of one line. Out-of-range lines are ignored.
	pub fn set_line(&self, line: usize, content: &str) {
		{
			let mut text = self.text.borrow_mut();
			if line >= text.len_lines() {
				tracing::warn!(line, lines = text.len_lines(), "buffer.set_line.out_of_range");
				return;
			}
			let start = text.line_to_char(line);
			let end = start + content_chars(&text, line);
			text.remove(start..end);
			text.insert(start, content);
		}
		self.notify(&BufferEvent::Changed(BufferChange {
			start_line: line,
			end_line: line + 1,
			added: 0,
			ops: vec![ChangeOp::Changed { line }],
		}));
	}

	/// Inserts `lines` before line `at`. `at` equal to the line count appends.
	pub fn insert_lines<S: AsRef<str>>(&self, at: usize, lines: &[S]) {
		if lines.is_empty() {
			return;
		}
		let at = {
			let mut text = self.text.borrow_mut();
			let count = text.len_lines();
			let at = at.min(count);
			let joined = join(lines);
			if at == count {
				let end = text.len_chars();
				text.insert(end, &format!("\n{joined}"));
			} else {
				let start = text.line_to_char(at);
				text.insert(start, &format!("{joined}\n"));
			}
			at
		};
		self.notify(&BufferEvent::Changed(BufferChange {
			start_line: at,
			end_line: at,
			added: lines.len() as isize,
			ops: vec![ChangeOp::Inserted { at, count: lines.len() }],
		}));
	}

	/// Removes lines `start..end`, clamped to the buffer.
	///
	/// Removing every line leaves a single empty line.
	pub fn delete_lines(&self, start: usize, end: usize) {
		let (start, end) = {
			let mut text = self.text.borrow_mut();
			let count = text.len_lines();
			let end = end.min(count);
			if start >= end {
				return;
			}
			let from = if end == count && start > 0 {
				// Take the terminator of the line before instead.
				text.line_to_char(start) - 1
			} else {
				text.line_to_char(start)
			};
			let to = if end == count { text.len_chars() } else { text.line_to_char(end) };
			text.remove(from..to);
			(start, end)
		};
		self.notify(&BufferEvent::Changed(BufferChange {
			start_line: start,
			end_line: end,
			added: -((end - start) as isize),
			ops: vec![ChangeOp::Deleted { at: start, count: end - start }],
		}));
	}

	/// Replaces the whole content and reports it as a reload.
	pub fn replace_all<S: AsRef<str>>(&self, lines: &[S]) {
		let old_count = {
			let mut text = self.text.borrow_mut();
			let old_count = text.len_lines();
			*text = Rope::from_str(&join(lines));
			old_count
		};
		let new_count = self.line_count();
		self.notify(&BufferEvent::Changed(BufferChange {
			start_line: 0,
			end_line: old_count,
			added: new_count as isize - old_count as isize,
			ops: vec![
				ChangeOp::Deleted { at: 0, count: old_count },
				ChangeOp::Inserted { at: 0, count: new_count },
			],
		}));
		self.notify(&BufferEvent::Reloaded);
	}

	/// Number of registered handlers.
	pub fn subscriber_count(&self) -> usize {
		self.handlers.borrow().len()
	}

	fn notify(&self, event: &BufferEvent) {
		let handlers: Vec<ChangeHandler> = self.handlers.borrow().iter().map(|(_, h)| h.clone()).collect();
		for handler in handlers {
			handler(event);
		}
	}
}

impl HostBuffer for MemoryBuffer {
	fn line_count(&self) -> usize {
		self.text.borrow().len_lines()
	}

	fn for_each_line_from(&self, start: usize, f: &mut dyn FnMut(&str)) {
		let text = self.text.borrow();
		if start >= text.len_lines() {
			return;
		}
		for line in text.lines_at(start) {
			f(&strip_terminator(line.into()));
		}
	}

	fn subscribe(&self, handler: ChangeHandler) -> SubscriptionId {
		let id = SubscriptionId(self.next_id.get());
		self.next_id.set(id.0 + 1);
		self.handlers.borrow_mut().push((id, handler));
		id
	}

	fn unsubscribe(&self, id: SubscriptionId) -> bool {
		let mut handlers = self.handlers.borrow_mut();
		let before = handlers.len();
		handlers.retain(|(other, _)| *other != id);
		handlers.len() != before
	}
}

fn join<S: AsRef<str>>(lines: &[S]) -> String {
	let mut out = String::new();
	for (i, line) in lines.iter().enumerate() {
		if i > 0 {
			out.push('\n');
		}
		out.push_str(line.as_ref());
	}
	out
}

fn strip_terminator(line: Cow<'_, str>) -> Cow<'_, str> {
	match line {
		Cow::Borrowed(s) => Cow::Borrowed(s.strip_suffix('\n').unwrap_or(s)),
		Cow::Owned(mut s) => {
			if s.ends_with('\n') {
				s.pop();
			}
			Cow::Owned(s)
		}
	}
}

/// Characters on `line`, excluding its terminator.
fn content_chars(text: &Rope, line: usize) -> usize {
	let slice = text.line(line);
	let chars = slice.len_chars();
	if chars > 0 && slice.char(chars - 1) == '\n' { chars - 1 } else { chars }
}
