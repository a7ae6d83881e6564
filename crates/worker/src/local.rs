//! Scheduler backed by a tokio [`LocalSet`](tokio::task::LocalSet).
//!
//! Every task is spawned with [`tokio::task::spawn_local`], so callers must be
//! running inside a `LocalSet` on a current-thread runtime. Delayed tasks race
//! a [`CancellationToken`] against [`tokio::time::sleep`]; cancelling a timer
//! cancels its token and forgets it.

use std::cell::{Cell, RefCell};
use std::rc::Rc;
use std::time::{Duration, Instant};

use rustc_hash::{FxHashMap, FxHashSet};
use tokio_util::sync::CancellationToken;

use crate::{Scheduler, Task, TaskClass, TaskKey, TimerId};

#[derive(Default)]
struct Shared {
	keyed: RefCell<FxHashSet<TaskKey>>,
	timers: RefCell<FxHashMap<TimerId, CancellationToken>>,
	next_timer: Cell<u64>,
}

/// Scheduler that runs deferred work on the current tokio `LocalSet`.
#[derive(Default, Clone)]
pub struct LocalScheduler {
	shared: Rc<Shared>,
}

impl LocalScheduler {
	/// Creates a scheduler with no queued work.
	pub fn new() -> Self {
		Self::default()
	}

	/// Number of armed, not yet fired or cancelled timers.
	pub fn pending_timers(&self) -> usize {
		self.shared.timers.borrow().len()
	}

	fn spawn_next_turn(class: TaskClass, task: Task) {
		tracing::trace!(class = class.as_str(), "scheduler.enqueue");
		tokio::task::spawn_local(async move {
			tokio::task::yield_now().await;
			task();
		});
	}
}

impl Scheduler for LocalScheduler {
	fn now(&self) -> Instant {
		tokio::time::Instant::now().into_std()
	}

	fn call_soon(&self, task: Task) {
		Self::spawn_next_turn(TaskClass::Soon, task);
	}

	fn call_soon_once(&self, key: TaskKey, task: Task) {
		if !self.shared.keyed.borrow_mut().insert(key) {
			tracing::trace!(?key, "scheduler.enqueue.coalesced");
			return;
		}
		let shared = self.shared.clone();
		Self::spawn_next_turn(
			TaskClass::Coalesced,
			Box::new(move || {
				shared.keyed.borrow_mut().remove(&key);
				task();
			}),
		);
	}

	fn call_later(&self, delay: Duration, task: Task) -> TimerId {
		let id = TimerId(self.shared.next_timer.get());
		self.shared.next_timer.set(id.0 + 1);

		let token = CancellationToken::new();
		self.shared.timers.borrow_mut().insert(id, token.clone());
		tracing::trace!(class = TaskClass::Delayed.as_str(), timer = id.0, delay_us = delay.as_micros() as u64, "scheduler.enqueue");

		let shared = self.shared.clone();
		tokio::task::spawn_local(async move {
			tokio::select! {
				_ = token.cancelled() => {}
				_ = tokio::time::sleep(delay) => {
					shared.timers.borrow_mut().remove(&id);
					tracing::trace!(timer = id.0, "scheduler.timer.fire");
					task();
				}
			}
		});
		id
	}

	fn cancel(&self, timer: TimerId) -> bool {
		let token = self.shared.timers.borrow_mut().remove(&timer);
		let removed = token.is_some();
		if let Some(token) = token {
			token.cancel();
		}
		tracing::trace!(timer = timer.0, removed, "scheduler.timer.cancel");
		removed
	}
}
