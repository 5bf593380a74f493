//! Typed client for the editing engine's msgpack-RPC API.
//!
//! * [`ApiClient`]: method-call surface over a [`Transport`](tandem_rpc::Transport),
//!   with a generic [`ApiClient::call`] escape hatch and typed wrappers
//! * [`Transaction`]: a run of calls no other caller can interleave with
//! * [`EventDispatcher`]: named notification fan-out with [`Subscription`] guards
//! * [`BufferEvent`]: decoded `nvim_buf_*_event` notifications
//! * [`ApiSession`] / [`Connection`]: the session delegate and the owner tying it all together

#![warn(missing_docs)]

mod buffer_events;
mod client;
mod error;
mod events;
mod session;
mod types;

pub use buffer_events::{BufferEvent, LineChangeEvent};
pub use client::{ApiClient, Transaction};
pub use error::{ApiError, RemoteError, RemoteErrorKind};
pub use events::{EventDispatcher, Subscription};
pub use session::{ApiSession, Connection};
pub use tandem_rpc::{RequestError, TransportError, Value};
pub use types::{BufferHandle, Mode, WindowHandle};

/// A convenient type alias for `Result` with `E` = [`ApiError`].
pub type Result<T, E = ApiError> = std::result::Result<T, E>;
