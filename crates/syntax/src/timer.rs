use std::time::{Duration, Instant};

/// Measures how long an action has been running.
///
/// Timers read time from an explicit instant rather than the system clock so
/// that callers driven by a virtual clock get consistent measurements.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ActionTimer {
	started: Instant,
}

impl ActionTimer {
	/// Starts a timer at `now`.
	pub const fn start_at(now: Instant) -> Self {
		Self { started: now }
	}

	/// Starts a timer at the current system time.
	pub fn start() -> Self {
		Self::start_at(Instant::now())
	}

	/// Restarts the timer at `now`.
	pub fn restart_at(&mut self, now: Instant) {
		self.started = now;
	}

	/// The instant the timer was started.
	pub const fn started(&self) -> Instant {
		self.started
	}

	/// Time elapsed between the start and `now`; zero if `now` is earlier.
	pub fn elapsed_at(&self, now: Instant) -> Duration {
		now.saturating_duration_since(self.started)
	}

	/// Time elapsed since the start, by the system clock.
	pub fn elapsed(&self) -> Duration {
		self.elapsed_at(Instant::now())
	}
}
