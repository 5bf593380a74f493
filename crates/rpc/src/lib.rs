//! Ordered request/response/notification transport.
//!
//! This crate frames a pair of byte streams into messages and multiplexes
//! concurrent callers over them:
//! * [`Transport`]: receive activity plus a single ordered send lane
//! * [`SessionDelegate`]: callbacks for notifications, remote requests and errors
//! * [`Message`]: the request/response/notification wire model

#![warn(missing_docs)]

mod delegate;
pub mod protocol;
mod transport;

pub use delegate::{Responder, SessionDelegate};
pub use protocol::{CounterIdGen, Message, Notification, Request, Response};
pub use tandem_codec::{HandleKind, Value};
pub use transport::{Hook, RequestOptions, ResponseFuture, Transport};

use tandem_codec::CodecError;

/// Failures of the transport itself, reported to the [`SessionDelegate`].
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
#[non_exhaustive]
pub enum TransportError {
	/// The inbound stream could not be framed or a value could not be decoded.
	#[error(transparent)]
	Codec(#[from] CodecError),
	/// A decoded value is not a request, response or notification.
	#[error("malformed message: {0}")]
	Malformed(String),
	/// Reading from or writing to the streams failed.
	#[error("I/O error: {0}")]
	Io(String),
	/// A response arrived for an id with no pending request.
	#[error("response for unknown request id {0}")]
	UnknownRequestId(u64),
}

/// Why a request did not produce a result.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum RequestError {
	/// The remote answered with an error value.
	#[error("remote error: {0:?}")]
	Remote(Value),
	/// The request could not be written.
	#[error("I/O error: {0}")]
	Io(String),
	/// The session is closed; the request was never answered.
	#[error("session closed")]
	SessionClosed,
}

/// A convenient type alias for request outcomes.
pub type Result<T, E = RequestError> = std::result::Result<T, E>;
