use std::rc::Rc;
use std::time::{Duration, Instant};

/// A unit of deferred work.
///
/// Tasks run on the host's event thread, so they are neither `Send` nor
/// required to be `Sync`.
pub type Task = Box<dyn FnOnce() + 'static>;

/// Opaque identity used to collapse repeated "run soon" requests.
///
/// Two requests carrying the same key while the first is still queued
/// result in a single invocation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TaskKey(usize);

impl TaskKey {
	/// Derives a key from the address of a shared allocation.
	///
	/// The key is stable for as long as the allocation lives, which makes it
	/// a natural per-object identity for controllers held in an `Rc`.
	pub fn of<T: ?Sized>(owner: &Rc<T>) -> Self {
		Self(Rc::as_ptr(owner) as *const () as usize)
	}

	/// Creates a key from a raw value.
	pub const fn from_raw(raw: usize) -> Self {
		Self(raw)
	}
}

/// Handle to a delayed task, used for cancellation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TimerId(pub(crate) u64);

/// Cooperative deferred-execution facility supplied by the host.
///
/// All methods take `&self`: schedulers are shared between every component
/// of a buffer session and are expected to use interior mutability. Tasks must
/// never be run re-entrantly from inside one of these calls.
pub trait Scheduler {
	/// Returns the scheduler's notion of the current time.
	fn now(&self) -> Instant;

	/// Runs `task` on the next scheduler turn.
	fn call_soon(&self, task: Task);

	/// Runs `task` on the next scheduler turn unless a task with the same key
	/// is already queued, in which case `task` is dropped.
	fn call_soon_once(&self, key: TaskKey, task: Task);

	/// Runs `task` once `delay` has elapsed.
	fn call_later(&self, delay: Duration, task: Task) -> TimerId;

	/// Cancels a delayed task.
	///
	/// Returns `false` when the timer already fired or was never known.
	fn cancel(&self, timer: TimerId) -> bool;
}
