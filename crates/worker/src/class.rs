/// Execution classes used to tag spawned work for observability.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TaskClass {
	/// Latency-sensitive work on the keystroke path (send lane, synchronizer).
	Interactive,
	/// Stream readers that live for the whole session.
	Io,
	/// Deferred work that nobody is waiting on.
	Background,
}

impl TaskClass {
	pub(crate) const fn as_str(self) -> &'static str {
		match self {
			Self::Interactive => "interactive",
			Self::Io => "io",
			Self::Background => "background",
		}
	}
}
