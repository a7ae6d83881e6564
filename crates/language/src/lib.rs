// Host editors own the terminal; diagnostics go through tracing only.
#![deny(clippy::print_stderr)]

//! Tree-sitter backend for `treesit-syntax`.
//!
//! # Architecture
//!
//! * [`engine`]: [`TsEngine`] and [`TsTree`], the parser and tree behind
//!   [`treesit_syntax::ParseEngine`]
//! * [`query`]: [`TsHighlightQuery`], compiled highlight queries run over a
//!   row range
//! * [`registry`]: filetype to grammar and highlight source, with lazily
//!   compiled queries
//! * [`setup`]: enabling syntax tracking on a buffer and keeping the
//!   resulting listeners reachable per buffer
//!
//! With the default `python` feature the registry knows the Python grammar
//! from `tree-sitter-python` out of the box.

pub mod engine;
mod error;
pub mod query;
pub mod registry;
pub mod setup;

pub use engine::{TsEngine, TsTree};
pub use error::SetupError;
pub use query::TsHighlightQuery;
pub use registry::LanguageRegistry;
pub use setup::{BufferOptions, SyntaxAttachments, TsListener, enable_syntax};
