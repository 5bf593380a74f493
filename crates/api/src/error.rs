use std::fmt;

use tandem_rpc::{RequestError, Value};

/// Category of an error reported by the remote.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RemoteErrorKind {
	/// The call was valid but failed while running.
	Exception,
	/// The call was rejected before running (bad arguments, unknown method).
	Validation,
	/// Any other kind code.
	Unknown(i64),
}

impl RemoteErrorKind {
	/// Maps the wire kind code.
	pub const fn from_code(code: i64) -> Self {
		match code {
			0 => Self::Exception,
			1 => Self::Validation,
			other => Self::Unknown(other),
		}
	}
}

/// An error value returned by the remote, decoded from its `[kind, message]` shape.
#[derive(Debug, Clone, PartialEq)]
pub struct RemoteError {
	/// Error category.
	pub kind: RemoteErrorKind,
	/// Human-readable message.
	pub message: String,
}

impl RemoteError {
	/// Decodes a remote error value. Values without the `[kind, message]`
	/// shape keep their debug rendering as message with an unknown kind.
	pub fn from_value(value: Value) -> Self {
		if let Some([kind, message]) = value.as_array()
			&& let Some(code) = kind.as_i64()
		{
			return Self {
				kind: RemoteErrorKind::from_code(code),
				message: match message {
					Value::String(s) => s.clone(),
					Value::Binary(b) => String::from_utf8_lossy(b).into_owned(),
					other => format!("{other:?}"),
				},
			};
		}
		Self {
			kind: RemoteErrorKind::Unknown(-1),
			message: match value {
				Value::String(s) => s,
				other => format!("{other:?}"),
			},
		}
	}
}

impl fmt::Display for RemoteError {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		match self.kind {
			RemoteErrorKind::Exception => write!(f, "exception: {}", self.message),
			RemoteErrorKind::Validation => write!(f, "validation error: {}", self.message),
			RemoteErrorKind::Unknown(code) => write!(f, "error {code}: {}", self.message),
		}
	}
}

/// Errors returned by [`ApiClient`](crate::ApiClient) calls.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum ApiError {
	/// The remote rejected the call.
	#[error("remote {0}")]
	Remote(RemoteError),
	/// The call could not be delivered or answered.
	#[error(transparent)]
	Transport(RequestError),
	/// The remote answered with a value of an unexpected shape.
	#[error("{method}: expected {expected}, got {got}")]
	UnexpectedResult {
		/// Method that was called.
		method: &'static str,
		/// Expected shape.
		expected: &'static str,
		/// Variant name of the received value.
		got: &'static str,
	},
	/// A notification did not have the documented argument layout.
	#[error("malformed {method}: {reason}")]
	MalformedEvent {
		/// Notification name.
		method: &'static str,
		/// What was wrong.
		reason: String,
	},
}

impl ApiError {
	/// Returns `true` when the session is gone.
	pub const fn is_closed(&self) -> bool {
		matches!(self, Self::Transport(RequestError::SessionClosed))
	}
}

impl From<RequestError> for ApiError {
	fn from(err: RequestError) -> Self {
		match err {
			RequestError::Remote(value) => Self::Remote(RemoteError::from_value(value)),
			other => Self::Transport(other),
		}
	}
}
