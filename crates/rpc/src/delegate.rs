//! Session delegate: the receive side's only way to reach its owner.

use std::sync::{Arc, Weak};

use parking_lot::RwLock;
use tandem_codec::Value;
use tokio::sync::mpsc;

use crate::protocol::{Notification, Request};
use crate::transport::LaneCmd;
use crate::TransportError;

/// Callbacks invoked by a [`Transport`](crate::Transport).
///
/// Notifications and requests are delivered on the transport's receive
/// activity, one at a time and in arrival order, so those callbacks never race
/// each other. Errors may also come from the send lane. No callback may block:
/// hand work off to another task instead.
pub trait SessionDelegate: Send + Sync {
	/// A notification arrived from the remote.
	fn on_notification(&self, notification: Notification);

	/// The remote issued a request. Every request must be answered through
	/// `responder`; the default rejects it.
	fn on_request(&self, request: Request, responder: Responder) {
		tracing::debug!(method = %request.method, id = request.id, "rpc.request.unhandled");
		responder.respond(Err(Value::Array(vec![
			Value::from(0u64),
			Value::from(format!("no handler for {}", request.method)),
		])));
	}

	/// A transport-level error occurred. The session stays usable unless
	/// [`SessionDelegate::on_closed`] follows.
	fn on_error(&self, error: TransportError);

	/// The session reached its terminal state.
	fn on_closed(&self) {}
}

/// Reply handle for a request originated by the remote.
#[derive(Debug)]
pub struct Responder {
	pub(crate) id: u64,
	pub(crate) lane: mpsc::UnboundedSender<LaneCmd>,
}

impl Responder {
	/// Id of the request being answered.
	pub const fn id(&self) -> u64 {
		self.id
	}

	/// Sends the response through the ordered send lane.
	pub fn respond(self, result: Result<Value, Value>) {
		let _ = self.lane.send(LaneCmd::Respond { id: self.id, result });
	}
}

/// Non-owning, detachable reference to the session delegate.
///
/// The session owns its delegate; the transport only borrows it for the
/// duration of each callback and stops calling it once detached or dropped.
#[derive(Clone)]
pub(crate) struct DelegateHandle {
	slot: Arc<RwLock<Option<Weak<dyn SessionDelegate>>>>,
}

impl DelegateHandle {
	pub(crate) fn new(delegate: Weak<dyn SessionDelegate>) -> Self {
		Self {
			slot: Arc::new(RwLock::new(Some(delegate))),
		}
	}

	pub(crate) fn detach(&self) {
		self.slot.write().take();
	}

	pub(crate) fn get(&self) -> Option<Arc<dyn SessionDelegate>> {
		self.slot.read().as_ref().and_then(Weak::upgrade)
	}

	pub(crate) fn notify(&self, notification: Notification) {
		match self.get() {
			Some(delegate) => delegate.on_notification(notification),
			None => tracing::trace!(method = %notification.method, "rpc.recv.no_delegate"),
		}
	}

	pub(crate) fn request(&self, request: Request, responder: Responder) {
		match self.get() {
			Some(delegate) => delegate.on_request(request, responder),
			None => responder.respond(Err(Value::from("session detached"))),
		}
	}

	pub(crate) fn error(&self, error: TransportError) {
		if let Some(delegate) = self.get() {
			delegate.on_error(error);
		}
	}

	pub(crate) fn closed(&self) {
		if let Some(delegate) = self.get() {
			delegate.on_closed();
		}
	}
}
