//! Turning syntax tracking on for a buffer.

use std::hash::Hash;
use std::rc::Rc;

use rustc_hash::FxHashMap;
use treesit_syntax::{HostBuffer, Listener, SettingsHandle};
use treesit_worker::Scheduler;

use crate::engine::TsEngine;
use crate::error::SetupError;
use crate::query::TsHighlightQuery;
use crate::registry::LanguageRegistry;

pub type TsListener = Listener<TsEngine, TsHighlightQuery>;

/// Buffer properties consulted at setup.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BufferOptions<'a> {
	pub filetype: &'a str,
	pub encoding: &'a str,
}

impl<'a> BufferOptions<'a> {
	pub fn utf8(filetype: &'a str) -> Self {
		Self { filetype, encoding: "utf-8" }
	}
}

fn is_utf8(encoding: &str) -> bool {
	encoding.eq_ignore_ascii_case("utf-8") || encoding.eq_ignore_ascii_case("utf8")
}

/// Starts tracking `buffer` with the grammar registered for its filetype.
///
/// The first parse is queued on `scheduler`. A buffer that has a grammar but
/// no highlight query is still parsed; its span cache stays empty.
pub fn enable_syntax(
	registry: &LanguageRegistry,
	buffer: &Rc<dyn HostBuffer>,
	options: BufferOptions<'_>,
	scheduler: Rc<dyn Scheduler>,
	settings: SettingsHandle,
) -> Result<TsListener, SetupError> {
	if !is_utf8(options.encoding) {
		tracing::warn!(encoding = options.encoding, "ts.setup.unsupported_encoding");
		return Err(SetupError::UnsupportedEncoding(options.encoding.to_owned()));
	}
	let engine = registry.engine(options.filetype)?;
	let query = registry.highlight_query(options.filetype)?;
	tracing::info!(filetype = options.filetype, highlights = query.is_some(), "ts.setup.enabled");
	Ok(Listener::new(buffer, engine, query, scheduler, settings))
}

/// Listeners attached to buffers, keyed by the host's buffer identifier.
///
/// Hosts route out-of-band reloads through [`SyntaxAttachments::reload`] so
/// that the buffer's listener restarts from scratch.
pub struct SyntaxAttachments<K> {
	listeners: FxHashMap<K, TsListener>,
}

impl<K> Default for SyntaxAttachments<K> {
	fn default() -> Self {
		Self {
			listeners: FxHashMap::default(),
		}
	}
}

impl<K: Hash + Eq> SyntaxAttachments<K> {
	pub fn new() -> Self {
		Self::default()
	}

	/// Enables syntax on `buffer` and stores the listener under `key`,
	/// replacing and dropping any listener already attached there.
	pub fn enable(
		&mut self,
		key: K,
		registry: &LanguageRegistry,
		buffer: &Rc<dyn HostBuffer>,
		options: BufferOptions<'_>,
		scheduler: Rc<dyn Scheduler>,
		settings: SettingsHandle,
	) -> Result<&TsListener, SetupError> {
		let listener = enable_syntax(registry, buffer, options, scheduler, settings)?;
		self.listeners.remove(&key);
		Ok(self.listeners.entry(key).or_insert(listener))
	}

	pub fn get(&self, key: &K) -> Option<&TsListener> {
		self.listeners.get(key)
	}

	/// Detaches the listener for `key`. Dropping the last handle unsubscribes
	/// it from its buffer.
	pub fn detach(&mut self, key: &K) -> Option<TsListener> {
		self.listeners.remove(key)
	}

	/// Restarts parsing of the buffer attached under `key`. Returns false if
	/// nothing is attached.
	pub fn reload(&self, key: &K) -> bool {
		match self.listeners.get(key) {
			Some(listener) => {
				listener.handle_buffer_reload();
				true
			}
			None => false,
		}
	}

	pub fn len(&self) -> usize {
		self.listeners.len()
	}

	pub fn is_empty(&self) -> bool {
		self.listeners.is_empty()
	}
}
