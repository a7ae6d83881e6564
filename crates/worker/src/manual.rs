//! Deterministic scheduler with a virtual clock.
//!
//! [`ManualScheduler`] never runs anything on its own: the owner drives it by
//! calling [`ManualScheduler::run_pending`] (one "turn" of the event loop,
//! covering what was queued before it started),
//! [`ManualScheduler::advance`] (move the clock and fire due timers) or
//! [`ManualScheduler::run_until_idle`]. Hosts with their own event loop can
//! embed it directly; tests use it to step parse scheduling one turn at a time.

use std::cell::RefCell;
use std::collections::{BTreeMap, VecDeque};
use std::time::{Duration, Instant};

use rustc_hash::FxHashSet;

use crate::{Scheduler, Task, TaskClass, TaskKey, TimerId};

/// Upper bound on turns executed by [`ManualScheduler::run_until_idle`].
const MAX_IDLE_TURNS: usize = 100_000;

struct Queued {
	key: Option<TaskKey>,
	task: Task,
}

struct State {
	origin: Instant,
	elapsed: Duration,
	soon: VecDeque<Queued>,
	keyed: FxHashSet<TaskKey>,
	timers: BTreeMap<(Duration, TimerId), Task>,
	next_timer: u64,
	executed: usize,
}

/// Single-threaded scheduler driven explicitly by its owner.
pub struct ManualScheduler {
	state: RefCell<State>,
}

impl Default for ManualScheduler {
	fn default() -> Self {
		Self::new()
	}
}

impl ManualScheduler {
	/// Creates a scheduler whose virtual clock starts at the current instant.
	pub fn new() -> Self {
		Self {
			state: RefCell::new(State {
				origin: Instant::now(),
				elapsed: Duration::ZERO,
				soon: VecDeque::new(),
				keyed: FxHashSet::default(),
				timers: BTreeMap::new(),
				next_timer: 0,
				executed: 0,
			}),
		}
	}

	/// Virtual time elapsed since construction.
	pub fn elapsed(&self) -> Duration {
		self.state.borrow().elapsed
	}

	/// Moves the virtual clock forward without firing timers.
	///
	/// Used to model time spent inside a task, e.g. a slow parse attempt.
	pub fn elapse(&self, by: Duration) {
		self.state.borrow_mut().elapsed += by;
	}

	/// Number of queued next-turn tasks.
	pub fn pending_soon(&self) -> usize {
		self.state.borrow().soon.len()
	}

	/// Number of armed timers.
	pub fn pending_timers(&self) -> usize {
		self.state.borrow().timers.len()
	}

	/// Total number of tasks executed so far.
	pub fn executed(&self) -> usize {
		self.state.borrow().executed
	}

	/// Returns true when nothing is queued or armed.
	pub fn is_idle(&self) -> bool {
		let state = self.state.borrow();
		state.soon.is_empty() && state.timers.is_empty()
	}

	/// Runs one turn: the tasks queued before the call, in order.
	///
	/// Tasks queued by those tasks wait for the next turn. Returns the number
	/// of tasks executed.
	pub fn run_pending(&self) -> usize {
		let mut ran = 0;
		for _ in 0..self.pending_soon() {
			let next = {
				let mut state = self.state.borrow_mut();
				let next = state.soon.pop_front();
				if let Some(Queued { key: Some(key), .. }) = &next {
					state.keyed.remove(key);
				}
				next
			};
			let Some(item) = next else {
				break;
			};
			(item.task)();
			self.state.borrow_mut().executed += 1;
			ran += 1;
		}
		ran
	}

	/// Runs the current turn, then advances the virtual clock and fires every
	/// timer that falls due, in deadline order.
	///
	/// Tasks the timers queue wait for the next turn.
	pub fn advance(&self, by: Duration) -> usize {
		let target = self.elapsed() + by;
		let mut ran = self.run_pending();
		while let Some(task) = self.pop_due(target) {
			task();
			self.state.borrow_mut().executed += 1;
			ran += 1;
		}
		let mut state = self.state.borrow_mut();
		state.elapsed = state.elapsed.max(target);
		ran
	}

	/// Runs turns and jumps the clock to each next deadline until nothing is
	/// queued or armed.
	pub fn run_until_idle(&self) -> usize {
		let mut ran = 0;
		for _ in 0..MAX_IDLE_TURNS {
			ran += self.run_pending();
			if self.pending_soon() > 0 {
				continue;
			}
			let next_deadline = self.state.borrow().timers.keys().next().map(|(at, _)| *at);
			let Some(at) = next_deadline else {
				return ran;
			};
			let now = self.elapsed();
			ran += self.advance(at.saturating_sub(now));
		}
		tracing::warn!(ran, "scheduler.run_until_idle.turn_limit");
		ran
	}

	fn pop_due(&self, target: Duration) -> Option<Task> {
		let mut state = self.state.borrow_mut();
		let (&(at, id), _) = state.timers.iter().next()?;
		if at > target {
			return None;
		}
		state.elapsed = state.elapsed.max(at);
		tracing::trace!(timer = id.0, "scheduler.timer.fire");
		state.timers.remove(&(at, id))
	}

	fn push(&self, key: Option<TaskKey>, task: Task) {
		self.state.borrow_mut().soon.push_back(Queued { key, task });
	}
}

impl Scheduler for ManualScheduler {
	fn now(&self) -> Instant {
		let state = self.state.borrow();
		state.origin + state.elapsed
	}

	fn call_soon(&self, task: Task) {
		tracing::trace!(class = TaskClass::Soon.as_str(), "scheduler.enqueue");
		self.push(None, task);
	}

	fn call_soon_once(&self, key: TaskKey, task: Task) {
		if !self.state.borrow_mut().keyed.insert(key) {
			tracing::trace!(?key, "scheduler.enqueue.coalesced");
			return;
		}
		tracing::trace!(class = TaskClass::Coalesced.as_str(), ?key, "scheduler.enqueue");
		self.push(Some(key), task);
	}

	fn call_later(&self, delay: Duration, task: Task) -> TimerId {
		let mut state = self.state.borrow_mut();
		let id = TimerId(state.next_timer);
		state.next_timer += 1;
		let at = state.elapsed + delay;
		state.timers.insert((at, id), task);
		tracing::trace!(class = TaskClass::Delayed.as_str(), timer = id.0, delay_us = delay.as_micros() as u64, "scheduler.enqueue");
		id
	}

	fn cancel(&self, timer: TimerId) -> bool {
		let mut state = self.state.borrow_mut();
		let key = state.timers.keys().find(|(_, id)| *id == timer).copied();
		let removed = key.and_then(|key| state.timers.remove(&key)).is_some();
		tracing::trace!(timer = timer.0, removed, "scheduler.timer.cancel");
		removed
	}
}

#[cfg(test)]
mod tests;
