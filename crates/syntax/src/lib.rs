//! Incremental syntax tracking for live editor buffers.
//!
//! Keeps a parse tree in step with a buffer that is edited continuously and
//! derives a per-line highlight span cache from it, so that an editor only
//! re-highlights what changed.
//!
//! # Architecture
//!
//! * [`edit`]: edit records, the pending-edit backlog and affected-line tracking
//! * [`ranges`]: half-open line ranges and their minimal covering merge
//! * [`controller`]: time-budgeted, multi-turn incremental parsing with
//!   clean / out-of-date / pending condition signalling
//! * [`listener`]: per-buffer glue from host change notifications to edits
//! * [`spans`]: lazy block cache of highlight spans in codepoint columns
//! * [`engine`]: the parser, tree and query seam implemented by backends
//! * [`host`]: the host buffer seam and a rope-backed in-memory buffer
//! * [`config`]: tunables and runtime debug toggles
//!
//! Everything runs on one thread. Deferred work goes through a
//! [`treesit_worker::Scheduler`] supplied by the host.

pub mod codepoint;
pub mod config;
pub mod controller;
pub mod edit;
pub mod engine;
pub mod host;
pub mod listener;
pub mod ranges;
pub mod snapshot;
pub mod spans;
mod timer;

#[cfg(test)]
mod test_support;

pub use codepoint::{CodepointMap, codepoint_map};
pub use config::{SettingsError, SettingsHandle, SyntaxSettings};
pub use controller::{ConditionCode, ParseCompleteCallback, ParseController};
pub use edit::{AffectedLines, EditLog, Point, SyntaxTreeEdit};
pub use engine::{Capture, ChangedRange, HighlightQuery, ParseEngine, ParseError, SyntaxTree};
pub use host::{BufferChange, BufferEvent, ChangeHandler, ChangeOp, HostBuffer, MemoryBuffer, SubscriptionId};
pub use listener::Listener;
pub use ranges::{LineRange, merge_line_ranges};
pub use snapshot::TextSnapshot;
pub use spans::{InlineSpan, SyntaxLineSpans, TO_END_OF_LINE, resolve_overlaps};
pub use timer::ActionTimer;
