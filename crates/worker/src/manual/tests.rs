use std::cell::RefCell;
use std::rc::Rc;
use std::time::Duration;

use super::*;

fn recorder() -> (Rc<RefCell<Vec<&'static str>>>, impl Fn(&'static str) -> Task) {
	let log = Rc::new(RefCell::new(Vec::new()));
	let sink = log.clone();
	let make = move |label: &'static str| -> Task {
		let sink = sink.clone();
		Box::new(move || sink.borrow_mut().push(label))
	};
	(log, make)
}

#[test]
fn test_call_soon_runs_in_fifo_order_on_next_turn() {
	let sched = ManualScheduler::new();
	let (log, task) = recorder();

	sched.call_soon(task("a"));
	sched.call_soon(task("b"));
	assert!(log.borrow().is_empty(), "nothing runs until the owner drives a turn");

	assert_eq!(sched.run_pending(), 2);
	assert_eq!(*log.borrow(), vec!["a", "b"]);
	assert!(sched.is_idle());
}

#[test]
fn test_call_soon_once_collapses_same_key_within_turn() {
	let sched = ManualScheduler::new();
	let (log, task) = recorder();
	let key = TaskKey::from_raw(7);

	sched.call_soon_once(key, task("first"));
	sched.call_soon_once(key, task("second"));
	sched.call_soon_once(TaskKey::from_raw(8), task("other"));

	sched.run_pending();
	assert_eq!(*log.borrow(), vec!["first", "other"]);

	// Once the keyed task ran, the key is free again.
	sched.call_soon_once(key, task("third"));
	sched.run_pending();
	assert_eq!(*log.borrow(), vec!["first", "other", "third"]);
}

#[test]
fn test_tasks_queued_during_turn_wait_for_next_turn() {
	let sched = Rc::new(ManualScheduler::new());
	let hits = Rc::new(RefCell::new(0));

	let inner_sched = sched.clone();
	let inner_hits = hits.clone();
	sched.call_soon(Box::new(move || {
		*inner_hits.borrow_mut() += 1;
		let hits = inner_hits.clone();
		inner_sched.call_soon(Box::new(move || *hits.borrow_mut() += 1));
	}));

	assert_eq!(sched.run_pending(), 1);
	assert_eq!(*hits.borrow(), 1);
	assert_eq!(sched.pending_soon(), 1);

	assert_eq!(sched.run_pending(), 1);
	assert_eq!(*hits.borrow(), 2);
	assert!(sched.is_idle());
}

#[test]
fn test_work_queued_by_timer_runs_on_next_turn() {
	let sched = Rc::new(ManualScheduler::new());
	let (log, task) = recorder();

	let inner_sched = sched.clone();
	let follow_up = task("follow-up");
	let fired = task("timer");
	sched.call_later(
		Duration::from_millis(5),
		Box::new(move || {
			fired();
			inner_sched.call_soon(follow_up);
		}),
	);

	assert_eq!(sched.advance(Duration::from_millis(5)), 1);
	assert_eq!(*log.borrow(), vec!["timer"]);
	assert_eq!(sched.pending_soon(), 1);

	assert_eq!(sched.run_until_idle(), 1);
	assert_eq!(*log.borrow(), vec!["timer", "follow-up"]);
}

#[test]
fn test_timers_fire_in_deadline_order_and_move_clock() {
	let sched = ManualScheduler::new();
	let (log, task) = recorder();
	let start = sched.now();

	sched.call_later(Duration::from_millis(20), task("late"));
	sched.call_later(Duration::from_millis(10), task("early"));

	sched.advance(Duration::from_millis(5));
	assert!(log.borrow().is_empty());

	sched.advance(Duration::from_millis(10));
	assert_eq!(*log.borrow(), vec!["early"]);
	assert_eq!(sched.now() - start, Duration::from_millis(15));

	sched.run_until_idle();
	assert_eq!(*log.borrow(), vec!["early", "late"]);
	assert_eq!(sched.elapsed(), Duration::from_millis(20));
}

#[test]
fn test_cancel_removes_armed_timer() {
	let sched = ManualScheduler::new();
	let (log, task) = recorder();

	let id = sched.call_later(Duration::from_millis(10), task("never"));
	assert_eq!(sched.pending_timers(), 1);
	assert!(sched.cancel(id));
	assert!(!sched.cancel(id), "second cancel reports nothing removed");

	sched.run_until_idle();
	assert!(log.borrow().is_empty());
}

#[test]
fn test_elapse_moves_clock_without_firing() {
	let sched = ManualScheduler::new();
	let (log, task) = recorder();

	sched.call_later(Duration::from_millis(1), task("timer"));
	sched.elapse(Duration::from_millis(50));
	assert!(log.borrow().is_empty());
	assert_eq!(sched.elapsed(), Duration::from_millis(50));

	sched.advance(Duration::ZERO);
	assert_eq!(*log.borrow(), vec!["timer"]);
}
