use std::cell::RefCell;
use std::rc::Rc;
use std::time::Duration;

use pretty_assertions::assert_eq;
use treesit_worker::{ManualScheduler, Scheduler};

use super::*;
use crate::host::MemoryBuffer;
use crate::test_support::{MockEngine, MockQuery, capture};

type Events = Rc<RefCell<Vec<(ConditionCode, Vec<LineRange>)>>>;

struct Harness {
	sched: Rc<ManualScheduler>,
	buffer: Rc<MemoryBuffer>,
	engine: MockEngine,
	listener: Listener<MockEngine, MockQuery>,
}

fn harness(lines: &[&str], query: Option<MockQuery>) -> Harness {
	let sched = Rc::new(ManualScheduler::new());
	let buffer = Rc::new(MemoryBuffer::from_lines(lines));
	let host: Rc<dyn HostBuffer> = buffer.clone();
	let scheduler: Rc<dyn Scheduler> = sched.clone();
	let engine = MockEngine::new();
	let listener = Listener::new(&host, engine.clone(), query.map(Rc::new), scheduler, SettingsHandle::default());
	Harness {
		sched,
		buffer,
		engine,
		listener,
	}
}

fn record(listener: &Listener<MockEngine, MockQuery>) -> Events {
	let events: Events = Rc::default();
	let sink = events.clone();
	listener.add_parse_complete_callback(Rc::new(move |code: ConditionCode, ranges: &[LineRange]| {
		sink.borrow_mut().push((code, ranges.to_vec()));
	}));
	events
}

fn last_edit(engine: &MockEngine) -> Option<SyntaxTreeEdit> {
	engine.parses().last().and_then(|p| p.old_edits.clone()).and_then(|edits| edits.last().copied())
}

fn expected_edit(bytes: (usize, usize, usize), points: [(usize, usize); 3]) -> SyntaxTreeEdit {
	let [start, old_end, new_end] = points.map(|(row, column)| Point::new(row, column));
	SyntaxTreeEdit {
		start_byte: bytes.0,
		old_end_byte: bytes.1,
		new_end_byte: bytes.2,
		start_point: start,
		old_end_point: old_end,
		new_end_point: new_end,
	}
}

#[test]
fn test_first_parse_waits_for_scheduler() {
	let h = harness(&["def f():", "    pass"], None);
	let events = record(&h.listener);
	assert!(events.borrow().is_empty());
	assert!(h.listener.tree().is_none());

	h.sched.run_pending();
	assert_eq!(*events.borrow(), vec![(ConditionCode::NewCleanTree, vec![])]);
}

#[test]
fn test_initial_offsets_count_terminators() {
	let h = harness(&["ab", "cde"], None);
	assert_eq!(h.listener.byte_offsets(), vec![0, 3, 7]);
	h.buffer.set_line(0, "abcd");
	assert_eq!(h.listener.byte_offsets(), vec![0, 5, 9]);
}

#[test]
fn test_in_place_change_becomes_edit() {
	let h = harness(&["def f():", "    pass"], None);
	let events = record(&h.listener);
	h.sched.run_pending();

	h.buffer.set_line(1, "    return 1");
	assert_eq!(events.borrow().last(), Some(&(ConditionCode::PendingChanges, vec![])));
	h.sched.run_pending();

	let edit = last_edit(&h.engine);
	assert_eq!(edit, Some(expected_edit((9, 17, 21), [(1, 0), (1, 8), (1, 12)])));
	assert_eq!(edit.map(|e| e.start_point.row), Some(1));

	let (code, ranges) = events.borrow().last().cloned().unwrap_or((ConditionCode::PendingChanges, vec![]));
	assert_eq!(code, ConditionCode::NewCleanTree);
	assert!(ranges.iter().any(|range| range.contains(1)));
}

#[test]
fn test_append_past_last_line_starts_at_previous_line() {
	let h = harness(&["a", "b"], None);
	h.sched.run_pending();

	h.buffer.insert_lines(2, &["c"]);
	h.sched.run_pending();

	assert_eq!(h.listener.byte_offsets(), vec![0, 2, 4, 6]);
	assert_eq!(last_edit(&h.engine), Some(expected_edit((2, 3, 5), [(1, 0), (1, 1), (2, 1)])));
}

#[test]
fn test_deletion_shrinks_new_end() {
	let h = harness(&["a", "b", "c"], None);
	h.sched.run_pending();

	h.buffer.delete_lines(1, 2);
	h.sched.run_pending();

	assert_eq!(h.listener.byte_offsets(), vec![0, 2, 4]);
	assert_eq!(last_edit(&h.engine), Some(expected_edit((2, 4, 2), [(1, 0), (2, 0), (1, 0)])));
}

#[test]
fn test_deleting_last_lines_starts_at_new_end_of_text() {
	let h = harness(&["a = 1", "b = 2", "c = 3"], None);
	let events = record(&h.listener);
	h.sched.run_pending();

	h.buffer.delete_lines(2, 3);
	h.sched.run_pending();

	assert_eq!(h.listener.byte_offsets(), vec![0, 6, 12]);
	let edit = last_edit(&h.engine);
	assert_eq!(edit, Some(expected_edit((11, 17, 11), [(1, 5), (2, 5), (1, 5)])));
	assert!(edit.is_some_and(|e| e.start_byte <= e.old_end_byte && e.start_byte <= e.new_end_byte));

	let (code, ranges) = events.borrow().last().cloned().unwrap_or((ConditionCode::PendingChanges, vec![]));
	assert_eq!(code, ConditionCode::NewCleanTree);
	assert_eq!(ranges, vec![LineRange::new(1, 2)]);
}

#[test]
fn test_deleting_every_line_but_first_stays_in_bounds() {
	let h = harness(&["a", "bb", "ccc"], None);
	h.sched.run_pending();

	h.buffer.delete_lines(1, 3);
	h.sched.run_pending();

	assert_eq!(h.listener.byte_offsets(), vec![0, 2]);
	assert_eq!(last_edit(&h.engine), Some(expected_edit((1, 8, 1), [(0, 1), (2, 3), (0, 1)])));
}

#[test]
fn test_change_past_known_lines_is_clamped() {
	let h = harness(&["a", "b"], None);
	h.sched.run_pending();

	h.listener.handle_changes(&BufferChange {
		start_line: 7,
		end_line: 9,
		added: 3,
		ops: Vec::new(),
	});
	h.sched.run_pending();

	let edit = last_edit(&h.engine);
	assert_eq!(edit.map(|e| (e.start_point, e.old_end_point, e.new_end_point)), Some((Point::new(1, 0), Point::new(1, 1), Point::new(1, 1))));
	assert_eq!(edit.map(|e| e.new_end_byte), Some(3));
}

#[test]
fn test_late_subscriber_gets_current_tree() {
	let h = harness(&["x = 1"], None);
	h.sched.run_pending();

	let events = record(&h.listener);
	assert_eq!(*events.borrow(), vec![(ConditionCode::NewOutOfDateTree, vec![])]);
}

#[test]
fn test_late_subscriber_waits_while_parsing() {
	let h = harness(&["x = 1"], None);
	h.sched.run_pending();
	h.engine.time_out_next(1);
	h.buffer.set_line(0, "x = 2");
	h.sched.run_pending();
	assert!(h.listener.controller().is_active());

	let events = record(&h.listener);
	assert!(events.borrow().is_empty());
	h.sched.run_until_idle();
	assert_eq!(events.borrow().len(), 1);
	assert_eq!(events.borrow()[0].0, ConditionCode::NewCleanTree);
}

#[test]
fn test_late_subscriber_after_catch_up_sees_matching_spans() {
	let query = MockQuery::new(vec![capture("keyword", (0, 0), (0, 1))]);
	let h = harness(&["a"], Some(query));
	h.sched.run_pending();
	assert_eq!(h.listener.spans().line_count(), 1);

	h.engine.time_out_next(1);
	h.buffer.insert_lines(1, &["b"]);
	h.sched.run_pending();
	h.buffer.insert_lines(2, &["c"]);
	h.sched.advance(Duration::from_millis(10));
	assert!(!h.listener.controller().is_active());
	assert_eq!(h.listener.controller().pending_edits(), 1);
	assert_eq!(h.listener.tree().map(|tree| tree.lines.len()), Some(2));

	let events = record(&h.listener);
	assert_eq!(*events.borrow(), vec![(ConditionCode::NewOutOfDateTree, vec![])]);
	assert_eq!(h.listener.spans().line_count(), 2);
	assert_eq!(h.listener.line_spans(0), vec![InlineSpan::new(0, 1, "keyword")]);
}

#[test]
fn test_reload_restarts_from_scratch() {
	let h = harness(&["a", "b"], None);
	h.sched.run_pending();

	h.buffer.replace_all(&["xyz"]);
	assert_eq!(h.engine.state.borrow().resets, 1);
	assert_eq!(h.listener.byte_offsets(), vec![0, 4]);
	assert_eq!(h.listener.tree().map(|tree| tree.lines.clone()), Some(vec!["xyz".to_owned()]));
	assert_eq!(h.engine.parses().last().map(|p| p.old_edits.is_none()), Some(true));
}

#[test]
fn test_spans_follow_published_tree() {
	let query = MockQuery::new(vec![capture("keyword", (0, 0), (0, 3)), capture("function", (0, 4), (0, 5))]);
	let h = harness(&["def f():", "    pass"], Some(query));
	assert!(h.listener.line_spans(0).is_empty());

	h.sched.run_pending();
	assert_eq!(h.listener.line_spans(0), vec![InlineSpan::new(0, 3, "keyword"), InlineSpan::new(4, 5, "function")]);
	assert!(h.listener.line_spans(5).is_empty());
	assert_eq!(h.listener.spans().line_count(), 2);
}

#[test]
fn test_callbacks_may_read_spans() {
	let query = MockQuery::new(vec![capture("keyword", (0, 0), (0, 3))]);
	let h = harness(&["def f():"], Some(query));
	let seen = Rc::new(RefCell::new(Vec::new()));
	let (reader, sink) = (h.listener.clone(), seen.clone());
	h.listener.add_parse_complete_callback(Rc::new(move |_: ConditionCode, _: &[LineRange]| {
		sink.borrow_mut().push(reader.line_spans(0));
	}));
	h.sched.run_pending();
	assert_eq!(*seen.borrow(), vec![vec![InlineSpan::new(0, 3, "keyword")]]);
}

#[test]
fn test_set_query_refreshes_spans() {
	let h = harness(&["def f():"], Some(MockQuery::default()));
	h.sched.run_pending();
	assert!(h.listener.line_spans(0).is_empty());

	h.listener.set_query(Some(Rc::new(MockQuery::new(vec![capture("keyword", (0, 0), (0, 3))]))));
	assert_eq!(h.listener.line_spans(0), vec![InlineSpan::new(0, 3, "keyword")]);
}

#[test]
fn test_print_tree_passthrough() {
	let h = harness(&["a", "b"], None);
	assert_eq!(h.listener.print_tree(0..2), None);
	h.sched.run_pending();
	assert_eq!(h.listener.print_tree(0..2).as_deref(), Some("0: a\n1: b\n"));
}

#[test]
fn test_dropping_listener_unsubscribes() {
	let h = harness(&["a"], None);
	assert_eq!(h.buffer.subscriber_count(), 1);
	let Harness { sched, buffer, listener, .. } = h;
	drop(listener);
	assert_eq!(buffer.subscriber_count(), 0);
	buffer.set_line(0, "b");
	sched.run_until_idle();
}
