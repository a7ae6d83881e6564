//! Incremental parse controller.
//!
//! [`ParseController`] owns the current tree and the backlog of edits for one
//! buffer. Parsing is split into short, time-budgeted attempts driven by a
//! [`Scheduler`], so a slow parse never blocks the host for longer than one
//! attempt. When an attempt produces a tree, subscribers receive a
//! [`ConditionCode`] and the lines that changed.
//!
//! # Lifecycle
//!
//! - [`ParseController::add_edit`] queues an edit. When idle it announces
//!   [`ConditionCode::PendingChanges`] and requests a start on the next
//!   scheduler turn; requests within one turn collapse into one.
//! - `start` applies queued edits to the tree in arrival order, snapshots the
//!   buffer and makes the first attempt. A timed-out attempt is resumed after
//!   the configured retry delay.
//! - On completion the tree is clean if no edits arrived meanwhile. Otherwise
//!   it is stale: the controller parses again without telling anyone while it
//!   is catching up quickly, and publishes the stale tree once the buffer has
//!   gone longer than `max_unclean_ms` without a clean tree.
//! - [`ParseController::start_clean`] throws away the tree and backlog and
//!   parses from scratch.
//!
//! Only one attempt is ever in flight. No engine failure reaches subscribers.

use std::cell::RefCell;
use std::fmt;
use std::ops::Range;
use std::rc::{Rc, Weak};

use treesit_worker::{Scheduler, TaskKey, TimerId};

use crate::config::SettingsHandle;
use crate::edit::{AffectedLines, EditLog, SyntaxTreeEdit};
use crate::engine::{ChangedRange, ParseEngine, ParseError, SyntaxTree};
use crate::host::HostBuffer;
use crate::ranges::LineRange;
use crate::snapshot::TextSnapshot;
use crate::timer::ActionTimer;

/// State reported to subscribers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ConditionCode {
	/// The tree reflects every edit known when its parse started, and none
	/// arrived meanwhile.
	NewCleanTree,
	/// A tree was produced but edits arrived during parsing. It is usable but
	/// stale; a follow-up parse is already scheduled.
	NewOutOfDateTree,
	/// An edit arrived while idle and a parse has been scheduled.
	PendingChanges,
}

impl ConditionCode {
	pub const fn as_str(self) -> &'static str {
		match self {
			Self::NewCleanTree => "new_clean_tree",
			Self::NewOutOfDateTree => "new_out_of_date_tree",
			Self::PendingChanges => "pending_changes",
		}
	}
}

impl fmt::Display for ConditionCode {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.write_str(self.as_str())
	}
}

/// Subscriber callback receiving a condition and the changed lines.
pub type ParseCompleteCallback = Rc<dyn Fn(ConditionCode, &[LineRange])>;

struct ParseState<T> {
	tree: Option<Rc<T>>,
	pending: EditLog,
	affected: AffectedLines,
	active: bool,
	/// Text of the parse in flight, or of the last one started.
	parsing: Rc<TextSnapshot>,
	/// Text the current tree was produced from.
	parsed: Rc<TextSnapshot>,
	parse_timer: ActionTimer,
	last_clean: ActionTimer,
	retries: u32,
	retry_timer: Option<TimerId>,
	/// Bumped by `start_clean` so stale retry tasks recognise themselves.
	epoch: u64,
}

struct Inner<E: ParseEngine> {
	engine: RefCell<E>,
	buffer: Weak<dyn HostBuffer>,
	scheduler: Rc<dyn Scheduler>,
	settings: SettingsHandle,
	state: RefCell<ParseState<E::Tree>>,
	callbacks: RefCell<Vec<ParseCompleteCallback>>,
}

/// Handle to a buffer's parse controller.
///
/// Clones share the same controller.
pub struct ParseController<E: ParseEngine> {
	inner: Rc<Inner<E>>,
}

impl<E: ParseEngine> Clone for ParseController<E> {
	fn clone(&self) -> Self {
		Self { inner: self.inner.clone() }
	}
}

impl<E: ParseEngine + 'static> ParseController<E> {
	/// Creates an idle controller.
	///
	/// The buffer is held weakly; once it is dropped, starts do nothing.
	pub fn new(engine: E, buffer: &Rc<dyn HostBuffer>, scheduler: Rc<dyn Scheduler>, settings: SettingsHandle) -> Self {
		let now = scheduler.now();
		Self {
			inner: Rc::new(Inner {
				engine: RefCell::new(engine),
				buffer: Rc::downgrade(buffer),
				scheduler,
				settings,
				state: RefCell::new(ParseState {
					tree: None,
					pending: EditLog::new(),
					affected: AffectedLines::new(),
					active: false,
					parsing: Rc::default(),
					parsed: Rc::default(),
					parse_timer: ActionTimer::start_at(now),
					last_clean: ActionTimer::start_at(now),
					retries: 0,
					retry_timer: None,
					epoch: 0,
				}),
				callbacks: RefCell::new(Vec::new()),
			}),
		}
	}

	/// Registers a subscriber.
	pub fn subscribe(&self, callback: ParseCompleteCallback) {
		self.inner.callbacks.borrow_mut().push(callback);
	}

	/// Queues an edit.
	pub fn add_edit(&self, edit: SyntaxTreeEdit) {
		if self.inner.settings.with(|s| s.trace_edits) {
			tracing::debug!(?edit, "syntax.edit");
		}
		let idle = {
			let mut state = self.inner.state.borrow_mut();
			state.pending.push(edit);
			!state.active
		};
		if idle {
			Inner::emit(&self.inner, ConditionCode::PendingChanges, &[]);
			Inner::schedule_start(&self.inner);
		}
	}

	/// Requests a start on the next scheduler turn.
	pub fn request_start(&self) {
		Inner::schedule_start(&self.inner);
	}

	/// Starts a parse unless one is already in flight.
	pub fn start(&self) {
		Inner::start(&self.inner);
	}

	/// Discards the tree, the backlog and any retry in progress, then starts
	/// a full parse.
	pub fn start_clean(&self) {
		Inner::start_clean(&self.inner);
	}

	/// The most recently stored tree.
	pub fn tree(&self) -> Option<Rc<E::Tree>> {
		self.inner.state.borrow().tree.clone()
	}

	/// Text the current tree was produced from.
	pub fn parsed_text(&self) -> Rc<TextSnapshot> {
		self.inner.state.borrow().parsed.clone()
	}

	/// Returns true while a parse is in flight.
	pub fn is_active(&self) -> bool {
		self.inner.state.borrow().active
	}

	/// Number of edits waiting for the next start.
	pub fn pending_edits(&self) -> usize {
		self.inner.state.borrow().pending.len()
	}

	/// Timed-out attempts of the parse in flight.
	pub fn retries(&self) -> u32 {
		self.inner.state.borrow().retries
	}

	/// Textual dump of the current tree limited to `rows`.
	pub fn dump_tree(&self, rows: Range<usize>) -> Option<String> {
		self.tree().map(|tree| tree.dump(rows))
	}
}

impl<E: ParseEngine + 'static> Inner<E> {
	fn key(this: &Rc<Self>) -> TaskKey {
		TaskKey::of(this)
	}

	fn schedule_start(this: &Rc<Self>) {
		let weak = Rc::downgrade(this);
		this.scheduler.call_soon_once(
			Self::key(this),
			Box::new(move || {
				if let Some(inner) = weak.upgrade() {
					Self::start(&inner);
				}
			}),
		);
	}

	fn start(this: &Rc<Self>) {
		let Some(buffer) = this.buffer.upgrade() else {
			tracing::trace!("syntax.start.buffer_gone");
			return;
		};
		{
			let mut guard = this.state.borrow_mut();
			let state = &mut *guard;
			if state.active {
				return;
			}
			let edits = state.pending.drain();
			if let Some(tree) = state.tree.as_mut() {
				let tree = Rc::make_mut(tree);
				for edit in &edits {
					tree.edit(edit);
					state.affected.record_edit(edit);
				}
			}
			state.active = true;
			state.retries = 0;
			state.parsing = Rc::new(TextSnapshot::from_lines(buffer.lines()));
			state.parse_timer = ActionTimer::start_at(this.scheduler.now());
			tracing::trace!(edits = edits.len(), bytes = state.parsing.bytes().len(), "syntax.parse.start");
		}
		Self::try_parse(this);
	}

	fn try_parse(this: &Rc<Self>) {
		let (text, old_tree) = {
			let state = this.state.borrow();
			(state.parsing.clone(), state.tree.clone())
		};
		let budget = this.settings.with(|s| s.parse_timeout());
		let result = this.engine.borrow_mut().parse(text.bytes(), old_tree.as_deref(), budget);
		match result {
			Ok(tree) => Self::complete(this, tree),
			Err(ParseError::Timeout) => Self::schedule_retry(this),
		}
	}

	fn schedule_retry(this: &Rc<Self>) {
		let (delay, warn_at) = this.settings.with(|s| (s.retry_delay(), s.retry_warn_threshold));
		let (retries, epoch) = {
			let mut state = this.state.borrow_mut();
			state.retries += 1;
			(state.retries, state.epoch)
		};
		if retries == warn_at {
			tracing::warn!(retries, "syntax.parse.slow");
		} else {
			tracing::trace!(retries, "syntax.parse.timeout");
		}

		let weak = Rc::downgrade(this);
		let timer = this.scheduler.call_later(
			delay,
			Box::new(move || {
				if let Some(inner) = weak.upgrade() {
					Self::resume(&inner, epoch);
				}
			}),
		);
		this.state.borrow_mut().retry_timer = Some(timer);
	}

	fn resume(this: &Rc<Self>, epoch: u64) {
		{
			let mut state = this.state.borrow_mut();
			if !state.active || state.epoch != epoch {
				return;
			}
			state.retry_timer = None;
		}
		Self::try_parse(this);
	}

	fn complete(this: &Rc<Self>, tree: E::Tree) {
		let now = this.scheduler.now();
		let tree = Rc::new(tree);
		let (max_unclean, trace) = this.settings.with(|s| (s.max_unclean(), s.trace_parses));

		let (code, ranges, reschedule) = {
			let mut guard = this.state.borrow_mut();
			let state = &mut *guard;
			let duration = state.parse_timer.elapsed_at(now);
			state.active = false;
			state.retry_timer = None;

			if let Some(old) = &state.tree {
				let diff = old.changed_ranges(&tree);
				state.affected.extend(diff.iter().map(ChangedRange::lines));
			}
			state.tree = Some(tree);
			state.parsed = state.parsing.clone();

			if state.pending.is_empty() {
				state.last_clean.restart_at(now);
				(Some(ConditionCode::NewCleanTree), state.affected.take(), false)
			} else {
				let unclean = state.last_clean.elapsed_at(state.parse_timer.started()) + duration;
				if unclean < max_unclean {
					tracing::trace!(unclean_us = unclean.as_micros() as u64, "syntax.parse.catch_up");
					(None, Vec::new(), true)
				} else {
					(Some(ConditionCode::NewOutOfDateTree), state.affected.take(), true)
				}
			}
		};

		if let Some(code) = code {
			if trace {
				tracing::debug!(code = code.as_str(), ?ranges, "syntax.parse.complete");
			}
			Self::emit(this, code, &ranges);
		}
		if reschedule {
			Self::schedule_start(this);
		}
	}

	fn start_clean(this: &Rc<Self>) {
		let timer = {
			let mut state = this.state.borrow_mut();
			state.pending.clear();
			state.affected.clear();
			state.active = false;
			state.tree = None;
			state.epoch += 1;
			state.retry_timer.take()
		};
		if let Some(timer) = timer {
			this.scheduler.cancel(timer);
		}
		this.engine.borrow_mut().reset();
		tracing::debug!("syntax.parse.start_clean");
		Self::start(this);
	}

	fn emit(this: &Rc<Self>, code: ConditionCode, ranges: &[LineRange]) {
		let callbacks: Vec<ParseCompleteCallback> = this.callbacks.borrow().clone();
		for callback in callbacks {
			callback(code, ranges);
		}
	}
}
