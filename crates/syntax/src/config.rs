//! Tunables for parsing and span caching.
//!
//! Settings are an explicit value shared by the controller, listener and span
//! cache of one buffer session through a [`SettingsHandle`]. The debug toggles
//! can be flipped at runtime with [`SettingsHandle::update`]; everything reads
//! the current value on use.

use std::cell::RefCell;
use std::rc::Rc;
use std::time::Duration;

use serde::Deserialize;
use thiserror::Error;

/// Default engine budget per parse attempt, in microseconds.
pub const DEFAULT_PARSE_TIMEOUT_US: u64 = 5_000;
/// Default delay before a timed-out attempt resumes, in milliseconds.
pub const DEFAULT_RETRY_DELAY_MS: u64 = 10;
/// Default staleness threshold, in milliseconds.
pub const DEFAULT_MAX_UNCLEAN_MS: u64 = 300;
/// Default number of lines per span-cache block.
pub const DEFAULT_BLOCK_SIZE: usize = 50;
/// Default retry count after which a slow parse is logged.
pub const DEFAULT_RETRY_WARN_THRESHOLD: u32 = 100;

/// Errors produced while loading [`SyntaxSettings`].
#[derive(Debug, Error)]
pub enum SettingsError {
	#[error("failed to parse syntax settings: {0}")]
	Parse(#[from] toml::de::Error),
	#[error("invalid syntax setting `{key}`: {reason}")]
	Invalid { key: &'static str, reason: &'static str },
}

/// Parse and cache tunables.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct SyntaxSettings {
	/// Engine time budget for one parse attempt.
	pub parse_timeout_us: u64,
	/// Delay before a timed-out parse attempt continues.
	pub retry_delay_ms: u64,
	/// Longest a buffer may go without a clean tree before a stale tree is
	/// published instead of silently reparsing.
	pub max_unclean_ms: u64,
	/// Lines per span-cache block.
	pub block_size: usize,
	/// Retries of a single parse after which a warning is logged.
	pub retry_warn_threshold: u32,
	/// Log every edit handed to the controller.
	pub trace_edits: bool,
	/// Log every parse completion.
	pub trace_parses: bool,
}

impl Default for SyntaxSettings {
	fn default() -> Self {
		Self {
			parse_timeout_us: DEFAULT_PARSE_TIMEOUT_US,
			retry_delay_ms: DEFAULT_RETRY_DELAY_MS,
			max_unclean_ms: DEFAULT_MAX_UNCLEAN_MS,
			block_size: DEFAULT_BLOCK_SIZE,
			retry_warn_threshold: DEFAULT_RETRY_WARN_THRESHOLD,
			trace_edits: false,
			trace_parses: false,
		}
	}
}

impl SyntaxSettings {
	/// Parses settings from TOML. Missing keys keep their defaults.
	pub fn from_toml_str(src: &str) -> Result<Self, SettingsError> {
		let settings: Self = toml::from_str(src)?;
		if settings.parse_timeout_us == 0 {
			return Err(SettingsError::Invalid {
				key: "parse_timeout_us",
				reason: "must be greater than zero",
			});
		}
		Ok(settings)
	}

	pub fn parse_timeout(&self) -> Duration {
		Duration::from_micros(self.parse_timeout_us)
	}

	pub fn retry_delay(&self) -> Duration {
		Duration::from_millis(self.retry_delay_ms)
	}

	pub fn max_unclean(&self) -> Duration {
		Duration::from_millis(self.max_unclean_ms)
	}

	/// Block size, never zero.
	pub fn block_size(&self) -> usize {
		self.block_size.max(1)
	}
}

/// Shared, single-threaded handle to the settings of one buffer session.
#[derive(Debug, Clone, Default)]
pub struct SettingsHandle(Rc<RefCell<SyntaxSettings>>);

impl SettingsHandle {
	pub fn new(settings: SyntaxSettings) -> Self {
		Self(Rc::new(RefCell::new(settings)))
	}

	/// Copy of the current settings.
	pub fn get(&self) -> SyntaxSettings {
		self.0.borrow().clone()
	}

	/// Reads the current settings without cloning.
	pub fn with<R>(&self, f: impl FnOnce(&SyntaxSettings) -> R) -> R {
		f(&self.0.borrow())
	}

	/// Mutates the settings in place.
	pub fn update(&self, f: impl FnOnce(&mut SyntaxSettings)) {
		f(&mut self.0.borrow_mut());
		tracing::debug!(settings = ?self.0.borrow(), "syntax.settings.updated");
	}
}

impl From<SyntaxSettings> for SettingsHandle {
	fn from(settings: SyntaxSettings) -> Self {
		Self::new(settings)
	}
}
