/// Execution classes used for scheduler observability.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TaskClass {
	/// Runs on the next scheduler turn.
	Soon,
	/// Runs on the next turn, collapsed with other requests sharing its key.
	Coalesced,
	/// Runs once a delay has elapsed.
	Delayed,
}

impl TaskClass {
	pub const fn as_str(self) -> &'static str {
		match self {
			Self::Soon => "soon",
			Self::Coalesced => "coalesced",
			Self::Delayed => "delayed",
		}
	}
}
