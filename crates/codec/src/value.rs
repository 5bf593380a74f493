//! In-memory value model for the wire format.

use std::fmt;

/// Kind of remote-object handle carried by an extension value.
///
/// The discriminant is the extension type code used on the wire.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum HandleKind {
	/// A buffer in the editing engine (ext code 0).
	Buffer,
	/// A window in the editing engine (ext code 1).
	Window,
	/// A tab page in the editing engine (ext code 2).
	Tabpage,
}

impl HandleKind {
	/// Returns the extension type code for this kind.
	pub const fn ext_code(self) -> i8 {
		match self {
			Self::Buffer => 0,
			Self::Window => 1,
			Self::Tabpage => 2,
		}
	}

	/// Maps an extension type code back to a handle kind.
	pub const fn from_ext_code(code: i8) -> Option<Self> {
		match code {
			0 => Some(Self::Buffer),
			1 => Some(Self::Window),
			2 => Some(Self::Tabpage),
			_ => None,
		}
	}

	pub(crate) const fn as_str(self) -> &'static str {
		match self {
			Self::Buffer => "buffer",
			Self::Window => "window",
			Self::Tabpage => "tabpage",
		}
	}
}

/// A wire integer.
///
/// Stored canonically: non-negative values are always kept unsigned, so a value
/// decoded from any integer encoding compares equal to the one that was encoded.
#[derive(Clone, Copy, PartialEq, Eq, Hash)]
pub struct Integer(Repr);

#[derive(Clone, Copy, PartialEq, Eq, Hash)]
enum Repr {
	Pos(u64),
	Neg(i64),
}

impl Integer {
	/// Returns the value as `u64` when it is non-negative.
	pub const fn as_u64(self) -> Option<u64> {
		match self.0 {
			Repr::Pos(n) => Some(n),
			Repr::Neg(_) => None,
		}
	}

	/// Returns the value as `i64` when it fits.
	pub const fn as_i64(self) -> Option<i64> {
		match self.0 {
			Repr::Pos(n) if n <= i64::MAX as u64 => Some(n as i64),
			Repr::Pos(_) => None,
			Repr::Neg(n) => Some(n),
		}
	}
}

impl From<u64> for Integer {
	fn from(n: u64) -> Self {
		Self(Repr::Pos(n))
	}
}

impl From<i64> for Integer {
	fn from(n: i64) -> Self {
		if n < 0 { Self(Repr::Neg(n)) } else { Self(Repr::Pos(n as u64)) }
	}
}

impl fmt::Debug for Integer {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		match self.0 {
			Repr::Pos(n) => write!(f, "{n}"),
			Repr::Neg(n) => write!(f, "{n}"),
		}
	}
}

impl fmt::Display for Integer {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		fmt::Debug::fmt(self, f)
	}
}

/// A decoded wire value.
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
	/// The nil value.
	Nil,
	/// A boolean.
	Boolean(bool),
	/// An integer of any width or sign.
	Integer(Integer),
	/// A floating point number. Single precision input is widened.
	Float(f64),
	/// A UTF-8 string.
	String(String),
	/// Raw bytes, including string payloads that were not valid UTF-8.
	Binary(Vec<u8>),
	/// An ordered sequence of values.
	Array(Vec<Value>),
	/// Key/value pairs in wire order.
	Map(Vec<(Value, Value)>),
	/// A remote-object handle.
	Handle(HandleKind, u64),
}

impl Value {
	/// Returns `true` for [`Value::Nil`].
	pub const fn is_nil(&self) -> bool {
		matches!(self, Self::Nil)
	}

	/// Returns the boolean payload.
	pub const fn as_bool(&self) -> Option<bool> {
		match self {
			Self::Boolean(b) => Some(*b),
			_ => None,
		}
	}

	/// Returns the integer payload as `u64`.
	pub const fn as_u64(&self) -> Option<u64> {
		match self {
			Self::Integer(n) => n.as_u64(),
			_ => None,
		}
	}

	/// Returns the integer payload as `i64`.
	pub const fn as_i64(&self) -> Option<i64> {
		match self {
			Self::Integer(n) => n.as_i64(),
			_ => None,
		}
	}

	/// Returns the float payload.
	pub const fn as_f64(&self) -> Option<f64> {
		match self {
			Self::Float(f) => Some(*f),
			_ => None,
		}
	}

	/// Returns the string payload.
	pub fn as_str(&self) -> Option<&str> {
		match self {
			Self::String(s) => Some(s),
			_ => None,
		}
	}

	/// Returns the array payload.
	pub fn as_array(&self) -> Option<&[Value]> {
		match self {
			Self::Array(items) => Some(items),
			_ => None,
		}
	}

	/// Consumes the value, returning the array payload.
	pub fn into_array(self) -> Option<Vec<Value>> {
		match self {
			Self::Array(items) => Some(items),
			_ => None,
		}
	}

	/// Returns the map payload.
	pub fn as_map(&self) -> Option<&[(Value, Value)]> {
		match self {
			Self::Map(entries) => Some(entries),
			_ => None,
		}
	}

	/// Returns the handle payload.
	pub const fn as_handle(&self) -> Option<(HandleKind, u64)> {
		match self {
			Self::Handle(kind, id) => Some((*kind, *id)),
			_ => None,
		}
	}

	/// Looks up a string key in a map value.
	pub fn get(&self, key: &str) -> Option<&Value> {
		self.as_map()?.iter().find(|(k, _)| k.as_str() == Some(key)).map(|(_, v)| v)
	}

	/// Short name of the variant, for diagnostics.
	pub const fn type_name(&self) -> &'static str {
		match self {
			Self::Nil => "nil",
			Self::Boolean(_) => "boolean",
			Self::Integer(_) => "integer",
			Self::Float(_) => "float",
			Self::String(_) => "string",
			Self::Binary(_) => "binary",
			Self::Array(_) => "array",
			Self::Map(_) => "map",
			Self::Handle(kind, _) => kind.as_str(),
		}
	}
}

impl From<bool> for Value {
	fn from(b: bool) -> Self {
		Self::Boolean(b)
	}
}

impl From<u64> for Value {
	fn from(n: u64) -> Self {
		Self::Integer(n.into())
	}
}

impl From<i64> for Value {
	fn from(n: i64) -> Self {
		Self::Integer(n.into())
	}
}

impl From<u32> for Value {
	fn from(n: u32) -> Self {
		Self::Integer(u64::from(n).into())
	}
}

impl From<i32> for Value {
	fn from(n: i32) -> Self {
		Self::Integer(i64::from(n).into())
	}
}

impl From<f64> for Value {
	fn from(f: f64) -> Self {
		Self::Float(f)
	}
}

impl From<&str> for Value {
	fn from(s: &str) -> Self {
		Self::String(s.to_owned())
	}
}

impl From<String> for Value {
	fn from(s: String) -> Self {
		Self::String(s)
	}
}

impl From<Vec<u8>> for Value {
	fn from(bytes: Vec<u8>) -> Self {
		Self::Binary(bytes)
	}
}

impl From<Vec<Value>> for Value {
	fn from(items: Vec<Value>) -> Self {
		Self::Array(items)
	}
}

impl From<Vec<String>> for Value {
	fn from(items: Vec<String>) -> Self {
		Self::Array(items.into_iter().map(Value::String).collect())
	}
}

impl From<()> for Value {
	fn from((): ()) -> Self {
		Self::Nil
	}
}
