//! Wire-level message model.
//!
//! Every message is an array whose first element is the message-type tag:
//!
//! * request: `[0, id, method, args]`
//! * response: `[1, id, error, result]`
//! * notification: `[2, method, args]`

use tandem_codec::Value;

use crate::TransportError;

const TAG_REQUEST: u64 = 0;
const TAG_RESPONSE: u64 = 1;
const TAG_NOTIFICATION: u64 = 2;

/// Counter-based request id generator.
///
/// Ids increase monotonically and wrap; an id is handed out again only once
/// the request that held it is no longer pending.
#[derive(Debug, Default, Clone, Copy)]
pub struct CounterIdGen(pub u64);

impl CounterIdGen {
	/// Creates a new counter starting at 0.
	#[must_use]
	pub const fn new() -> Self {
		Self(0)
	}

	/// Generates the next id and increments the counter.
	#[allow(clippy::should_implement_trait, reason = "convention")]
	pub fn next(&mut self) -> u64 {
		let id = self.0;
		self.0 = self.0.wrapping_add(1);
		id
	}

	/// Generates the next id for which `in_use` returns `false`.
	pub fn next_free(&mut self, in_use: impl Fn(u64) -> bool) -> u64 {
		loop {
			let id = self.next();
			if !in_use(id) {
				return id;
			}
		}
	}
}

/// An outbound or inbound method call expecting a response.
#[derive(Debug, Clone, PartialEq)]
pub struct Request {
	/// Correlation id.
	pub id: u64,
	/// Method name.
	pub method: String,
	/// Positional arguments.
	pub args: Vec<Value>,
}

/// The answer to a [`Request`].
#[derive(Debug, Clone, PartialEq)]
pub struct Response {
	/// Id of the request being answered.
	pub id: u64,
	/// The result, or the remote's error value.
	pub result: Result<Value, Value>,
}

/// A one-way message.
#[derive(Debug, Clone, PartialEq)]
pub struct Notification {
	/// Notification name.
	pub method: String,
	/// Positional arguments.
	pub args: Vec<Value>,
}

/// Any message on the wire.
#[derive(Debug, Clone, PartialEq)]
pub enum Message {
	/// An incoming or outgoing request.
	Request(Request),
	/// An incoming or outgoing response.
	Response(Response),
	/// An incoming or outgoing notification.
	Notification(Notification),
}

impl Message {
	/// Builds the wire array for this message.
	pub fn to_value(&self) -> Value {
		match self {
			Self::Request(req) => Value::Array(vec![
				Value::from(TAG_REQUEST),
				Value::from(req.id),
				Value::from(req.method.as_str()),
				Value::Array(req.args.clone()),
			]),
			Self::Response(resp) => {
				let (error, result) = match &resp.result {
					Ok(result) => (Value::Nil, result.clone()),
					Err(error) => (error.clone(), Value::Nil),
				};
				Value::Array(vec![Value::from(TAG_RESPONSE), Value::from(resp.id), error, result])
			}
			Self::Notification(notif) => Value::Array(vec![
				Value::from(TAG_NOTIFICATION),
				Value::from(notif.method.as_str()),
				Value::Array(notif.args.clone()),
			]),
		}
	}

	/// Classifies a decoded wire value.
	///
	/// # Errors
	///
	/// [`TransportError::Malformed`] when the value does not have one of the
	/// three message shapes.
	pub fn from_value(value: Value) -> Result<Self, TransportError> {
		let Value::Array(items) = value else {
			return Err(malformed(format!("expected array, got {}", value.type_name())));
		};
		let tag = items.first().and_then(Value::as_u64).ok_or_else(|| malformed("missing message type tag"))?;

		match (tag, items.len()) {
			(TAG_REQUEST, 4) => {
				let [_, id, method, args] = take4(items);
				Ok(Self::Request(Request {
					id: id.as_u64().ok_or_else(|| malformed("request id is not an unsigned integer"))?,
					method: into_method(method)?,
					args: into_args(args)?,
				}))
			}
			(TAG_RESPONSE, 4) => {
				let [_, id, error, result] = take4(items);
				let id = id.as_u64().ok_or_else(|| malformed("response id is not an unsigned integer"))?;
				let result = if error.is_nil() { Ok(result) } else { Err(error) };
				Ok(Self::Response(Response { id, result }))
			}
			(TAG_NOTIFICATION, 3) => {
				let mut items = items.into_iter().skip(1);
				let method = into_method(items.next().unwrap_or(Value::Nil))?;
				let args = into_args(items.next().unwrap_or(Value::Nil))?;
				Ok(Self::Notification(Notification { method, args }))
			}
			(tag @ (TAG_REQUEST | TAG_RESPONSE | TAG_NOTIFICATION), len) => Err(malformed(format!("message type {tag} with {len} elements"))),
			(tag, _) => Err(malformed(format!("unknown message type {tag}"))),
		}
	}
}

fn take4(items: Vec<Value>) -> [Value; 4] {
	let mut it = items.into_iter();
	std::array::from_fn(|_| it.next().unwrap_or(Value::Nil))
}

fn into_method(value: Value) -> Result<String, TransportError> {
	match value {
		Value::String(s) => Ok(s),
		other => Err(malformed(format!("method name is {}", other.type_name()))),
	}
}

fn into_args(value: Value) -> Result<Vec<Value>, TransportError> {
	match value {
		Value::Array(args) => Ok(args),
		other => Err(malformed(format!("arguments are {}", other.type_name()))),
	}
}

fn malformed(reason: impl Into<String>) -> TransportError {
	TransportError::Malformed(reason.into())
}
