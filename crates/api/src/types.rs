use tandem_rpc::{HandleKind, Value};

/// A buffer in the editing engine. Handle `0` is the current buffer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct BufferHandle(pub u64);

impl BufferHandle {
	/// Placeholder the engine resolves to its current buffer.
	pub const CURRENT: Self = Self(0);

	/// Returns `true` for the current-buffer placeholder.
	pub const fn is_current(self) -> bool {
		self.0 == 0
	}

	/// Wire representation.
	pub const fn to_value(self) -> Value {
		Value::Handle(HandleKind::Buffer, self.0)
	}

	/// Accepts the buffer extension type or a plain integer.
	pub fn from_value(value: &Value) -> Option<Self> {
		match value {
			Value::Handle(HandleKind::Buffer, id) => Some(Self(*id)),
			other => other.as_u64().map(Self),
		}
	}
}

/// A window in the editing engine. Handle `0` is the current window.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct WindowHandle(pub u64);

impl WindowHandle {
	/// Placeholder the engine resolves to its current window.
	pub const CURRENT: Self = Self(0);

	/// Wire representation.
	pub const fn to_value(self) -> Value {
		Value::Handle(HandleKind::Window, self.0)
	}

	/// Accepts the window extension type or a plain integer.
	pub fn from_value(value: &Value) -> Option<Self> {
		match value {
			Value::Handle(HandleKind::Window, id) => Some(Self(*id)),
			other => other.as_u64().map(Self),
		}
	}
}

/// Result of `nvim_get_mode`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Mode {
	/// Mode short name, e.g. `n`, `i`, `no`.
	pub mode: String,
	/// The engine is waiting for input and would block a request.
	pub blocking: bool,
}
