use thiserror::Error;

/// Reasons syntax tracking could not be enabled for a buffer.
#[derive(Error, Debug)]
pub enum SetupError {
	#[error("cannot run tree-sitter on {0} text")]
	UnsupportedEncoding(String),
	#[error("no tree-sitter support registered for filetype {0:?}")]
	NoGrammar(String),
	#[error("grammar for {filetype:?} cannot be loaded: {source}")]
	Language {
		filetype: String,
		#[source]
		source: tree_sitter::LanguageError,
	},
	#[error("highlight query for {filetype:?} failed to compile: {source}")]
	Query {
		filetype: String,
		#[source]
		source: tree_sitter::QueryError,
	},
}
