//! Filetype to grammar mapping.
//!
//! Grammars are registered up front; highlight queries are compiled the first
//! time a buffer of that filetype asks for one and shared afterwards.

use std::borrow::Cow;
use std::cell::RefCell;
use std::rc::Rc;

use rustc_hash::FxHashMap;
use tree_sitter::Language;

use crate::engine::TsEngine;
use crate::error::SetupError;
use crate::query::TsHighlightQuery;

struct GrammarEntry {
	language: Language,
	highlights: Option<Cow<'static, str>>,
}

/// Known grammars keyed by editor filetype.
pub struct LanguageRegistry {
	grammars: FxHashMap<String, GrammarEntry>,
	queries: RefCell<FxHashMap<String, Rc<TsHighlightQuery>>>,
}

impl Default for LanguageRegistry {
	fn default() -> Self {
		Self::with_builtins()
	}
}

impl LanguageRegistry {
	/// A registry with nothing registered.
	pub fn empty() -> Self {
		Self {
			grammars: FxHashMap::default(),
			queries: RefCell::default(),
		}
	}

	/// A registry holding the grammars compiled into this crate.
	pub fn with_builtins() -> Self {
		#[allow(unused_mut, reason = "no builtins without grammar features")]
		let mut registry = Self::empty();
		#[cfg(feature = "python")]
		registry.register("python", tree_sitter_python::LANGUAGE.into(), tree_sitter_python::HIGHLIGHTS_QUERY);
		registry
	}

	/// Registers `language` for `filetype` with a highlight query source,
	/// replacing any earlier entry and its compiled query.
	pub fn register(&mut self, filetype: impl Into<String>, language: Language, highlights: impl Into<Cow<'static, str>>) {
		self.insert(filetype.into(), language, Some(highlights.into()));
	}

	/// Registers a grammar that has no highlight query.
	pub fn register_grammar(&mut self, filetype: impl Into<String>, language: Language) {
		self.insert(filetype.into(), language, None);
	}

	fn insert(&mut self, filetype: String, language: Language, highlights: Option<Cow<'static, str>>) {
		self.queries.get_mut().remove(&filetype);
		tracing::debug!(filetype = %filetype, highlights = highlights.is_some(), "ts.registry.register");
		self.grammars.insert(filetype, GrammarEntry { language, highlights });
	}

	pub fn contains(&self, filetype: &str) -> bool {
		self.grammars.contains_key(filetype)
	}

	/// Registered filetypes in sorted order.
	pub fn filetypes(&self) -> Vec<&str> {
		let mut names: Vec<&str> = self.grammars.keys().map(String::as_str).collect();
		names.sort_unstable();
		names
	}

	pub fn language(&self, filetype: &str) -> Result<&Language, SetupError> {
		match self.grammars.get(filetype) {
			Some(entry) => Ok(&entry.language),
			None => {
				tracing::info!(filetype, "ts.registry.no_support");
				Err(SetupError::NoGrammar(filetype.to_owned()))
			}
		}
	}

	/// A fresh parser for `filetype`.
	pub fn engine(&self, filetype: &str) -> Result<TsEngine, SetupError> {
		TsEngine::new(self.language(filetype)?).map_err(|source| SetupError::Language {
			filetype: filetype.to_owned(),
			source,
		})
	}

	/// The compiled highlight query for `filetype`.
	///
	/// `Ok(None)` means the grammar is known but no highlight source was
	/// registered with it.
	pub fn highlight_query(&self, filetype: &str) -> Result<Option<Rc<TsHighlightQuery>>, SetupError> {
		if let Some(query) = self.queries.borrow().get(filetype) {
			return Ok(Some(query.clone()));
		}
		let entry = self.grammars.get(filetype).ok_or_else(|| SetupError::NoGrammar(filetype.to_owned()))?;
		let Some(source) = entry.highlights.as_deref() else {
			tracing::debug!(filetype, "ts.registry.no_highlights");
			return Ok(None);
		};
		let query = TsHighlightQuery::new(&entry.language, source).map_err(|source| SetupError::Query {
			filetype: filetype.to_owned(),
			source,
		})?;
		let query = Rc::new(query);
		tracing::debug!(filetype, captures = query.capture_names().len(), "ts.registry.query_compiled");
		self.queries.borrow_mut().insert(filetype.to_owned(), query.clone());
		Ok(Some(query))
	}
}
