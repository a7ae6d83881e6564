/// Buffer text captured at the start of a parse.
///
/// Both forms are kept: the engine parses the joined bytes, while the span
/// cache remaps columns line by line.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TextSnapshot {
	lines: Vec<String>,
	bytes: Vec<u8>,
}

impl TextSnapshot {
	/// Joins `lines` with `\n`, without a trailing terminator.
	pub fn from_lines(lines: Vec<String>) -> Self {
		let bytes = lines.join("\n").into_bytes();
		Self { lines, bytes }
	}

	pub fn lines(&self) -> &[String] {
		&self.lines
	}

	pub fn line(&self, index: usize) -> Option<&str> {
		self.lines.get(index).map(String::as_str)
	}

	pub fn line_count(&self) -> usize {
		self.lines.len()
	}

	pub fn bytes(&self) -> &[u8] {
		&self.bytes
	}

	pub fn is_empty(&self) -> bool {
		self.lines.is_empty()
	}
}
