//! Session delegate and connection ownership.

use std::fmt;
use std::future::Future;
use std::sync::Arc;

use parking_lot::Mutex;
use tandem_rpc::{Notification, SessionDelegate, Transport, TransportError};
use tokio::io::{AsyncRead, AsyncWrite};
use tracing::{debug, warn};

use crate::client::ApiClient;
use crate::events::EventDispatcher;

type ErrorHook = Arc<dyn Fn(&TransportError) + Send + Sync>;

/// Delegate that fans notifications out through an [`EventDispatcher`].
///
/// Transport errors are logged and, when set, passed to an error hook.
#[derive(Default)]
pub struct ApiSession {
	events: EventDispatcher,
	on_error: Mutex<Option<ErrorHook>>,
}

impl fmt::Debug for ApiSession {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.debug_struct("ApiSession").field("events", &self.events).finish_non_exhaustive()
	}
}

impl ApiSession {
	/// Creates a session with an empty dispatcher.
	pub fn new() -> Self {
		Self::default()
	}

	/// Dispatcher receiving every inbound notification.
	pub fn events(&self) -> &EventDispatcher {
		&self.events
	}

	/// Sets the hook called for each transport error.
	pub fn set_error_hook(&self, hook: impl Fn(&TransportError) + Send + Sync + 'static) {
		*self.on_error.lock() = Some(Arc::new(hook));
	}
}

impl SessionDelegate for ApiSession {
	fn on_notification(&self, notification: Notification) {
		let handled = self.events.dispatch(&notification.method, &notification.args);
		if handled == 0 {
			debug!(method = %notification.method, "api.notification.unhandled");
		}
	}

	fn on_error(&self, error: TransportError) {
		warn!(error = %error, "api.transport_error");
		// Runs unlocked: the hook may call `set_error_hook`.
		let hook = self.on_error.lock().clone();
		if let Some(hook) = hook {
			hook(&error);
		}
	}

	fn on_closed(&self) {
		debug!("api.session.closed");
	}
}

/// Owner of a session: keeps the delegate alive and detaches it on drop.
///
/// Dropping the connection closes the session; clones of its client then fail
/// with [`ApiError::is_closed`](crate::ApiError::is_closed) errors.
#[derive(Debug)]
pub struct Connection {
	client: ApiClient,
	session: Arc<ApiSession>,
}

impl Connection {
	/// Starts a session over the engine's output (`reader`) and input (`writer`).
	pub fn spawn<R, W>(reader: R, writer: W) -> Self
	where
		R: AsyncRead + Unpin + Send + 'static,
		W: AsyncWrite + Unpin + Send + 'static,
	{
		let session = Arc::new(ApiSession::new());
		let transport = Transport::spawn(reader, writer, &session);
		Self {
			client: ApiClient::new(transport),
			session,
		}
	}

	/// The API client.
	pub fn client(&self) -> &ApiClient {
		&self.client
	}

	/// The session delegate.
	pub fn session(&self) -> &Arc<ApiSession> {
		&self.session
	}

	/// Notification dispatcher of this session.
	pub fn events(&self) -> &EventDispatcher {
		self.session.events()
	}

	/// Resolves once the session closed.
	pub fn closed(&self) -> impl Future<Output = ()> + Send + 'static {
		self.client.transport().closed()
	}
}

impl Drop for Connection {
	fn drop(&mut self) {
		let transport = self.client.transport();
		transport.detach();
		transport.close();
	}
}
