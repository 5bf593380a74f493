//! Transport driver: one receive activity and one ordered send lane per session.

use std::collections::HashMap;
use std::fmt;
use std::future::Future;
use std::io;
use std::pin::Pin;
use std::sync::{Arc, Weak};
use std::task::{Context, Poll};

use tandem_codec::{CodecError, FrameDecoder, Value, encode};
use tandem_worker::{AsyncLock, TaskClass, spawn_named};
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};
use tokio::sync::{mpsc, oneshot};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, trace, warn};

use crate::delegate::{DelegateHandle, Responder, SessionDelegate};
use crate::protocol::{CounterIdGen, Message, Notification, Request, Response};
use crate::{RequestError, TransportError};

const READ_CHUNK: usize = 64 * 1024;

/// Instrumentation callback receiving the request id.
pub type Hook = Box<dyn FnOnce(u64) + Send>;

type Reply = oneshot::Sender<Result<Value, RequestError>>;

/// Per-request options for [`Transport::request_with`].
#[derive(Default)]
pub struct RequestOptions {
	/// Lock that must be acquired before the request joins the send lane.
	/// It is held only until the request is enqueued.
	pub gate: Option<AsyncLock>,
	/// Called with the allocated id once the request is written.
	pub on_sent: Option<Hook>,
	/// Called with the id once the matching response arrived.
	pub on_answered: Option<Hook>,
}

impl RequestOptions {
	/// Options gated on `lock`.
	pub fn gated(lock: AsyncLock) -> Self {
		Self {
			gate: Some(lock),
			..Self::default()
		}
	}

	/// Sets the post-send hook.
	pub fn on_sent(mut self, hook: impl FnOnce(u64) + Send + 'static) -> Self {
		self.on_sent = Some(Box::new(hook));
		self
	}

	/// Sets the post-answer hook.
	pub fn on_answered(mut self, hook: impl FnOnce(u64) + Send + 'static) -> Self {
		self.on_answered = Some(Box::new(hook));
		self
	}
}

impl fmt::Debug for RequestOptions {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.debug_struct("RequestOptions")
			.field("gate", &self.gate)
			.field("on_sent", &self.on_sent.is_some())
			.field("on_answered", &self.on_answered.is_some())
			.finish()
	}
}

/// Work items for the send lane.
pub(crate) enum LaneCmd {
	Request {
		method: String,
		args: Vec<Value>,
		reply: Reply,
		on_sent: Option<Hook>,
		on_answered: Option<Hook>,
	},
	Notify {
		method: String,
		args: Vec<Value>,
	},
	Respond {
		id: u64,
		result: Result<Value, Value>,
	},
	Inbound(Response),
}

struct Shared {
	lane: mpsc::UnboundedSender<LaneCmd>,
	closed: CancellationToken,
	delegate: DelegateHandle,
}

/// Handle to a running session over a pair of byte streams.
///
/// Cloning is cheap; all clones share one send lane, so requests reach the
/// remote in the order the calls were made, whichever clone made them.
#[derive(Clone)]
pub struct Transport {
	shared: Arc<Shared>,
}

impl fmt::Debug for Transport {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.debug_struct("Transport").field("closed", &self.is_closed()).finish()
	}
}

impl Transport {
	/// Starts the receive activity and the send lane.
	///
	/// The transport keeps only a weak reference to `delegate`. The owner must
	/// keep it alive for as long as callbacks are wanted, and should call
	/// [`Transport::detach`] before dropping it.
	pub fn spawn<R, W, D>(reader: R, writer: W, delegate: &Arc<D>) -> Self
	where
		R: AsyncRead + Unpin + Send + 'static,
		W: AsyncWrite + Unpin + Send + 'static,
		D: SessionDelegate + 'static,
	{
		let weak = Arc::downgrade(delegate);
		let weak: Weak<dyn SessionDelegate> = weak;
		let delegate = DelegateHandle::new(weak);
		let (lane_tx, lane_rx) = mpsc::unbounded_channel();
		let closed = CancellationToken::new();

		let lane = SendLane {
			writer,
			ids: CounterIdGen::new(),
			pending: HashMap::new(),
			rx: lane_rx,
			closed: closed.clone(),
			delegate: delegate.clone(),
		};
		spawn_named(TaskClass::Interactive, "rpc.send_lane", lane.run());
		spawn_named(
			TaskClass::Io,
			"rpc.receive",
			receive(reader, lane_tx.clone(), delegate.clone(), closed.clone()),
		);

		Self {
			shared: Arc::new(Shared {
				lane: lane_tx,
				closed,
				delegate,
			}),
		}
	}

	/// Sends a request.
	///
	/// The request joins the send lane before this returns, so two calls made
	/// one after the other are written in that order. Awaiting the returned
	/// future is only needed for the result. After the session closed the
	/// request is not written and resolves to [`RequestError::SessionClosed`].
	pub fn request(&self, method: impl Into<String>, args: Vec<Value>) -> ResponseFuture {
		self.enqueue(method.into(), args, None, None)
	}

	/// Sends a request after passing its pre-send gate, with optional hooks.
	pub async fn request_with(&self, method: impl Into<String>, args: Vec<Value>, options: RequestOptions) -> crate::Result<Value> {
		let RequestOptions { gate, on_sent, on_answered } = options;
		let guard = match &gate {
			Some(lock) => Some(lock.acquire().await),
			None => None,
		};
		let response = self.enqueue(method.into(), args, on_sent, on_answered);
		drop(guard);
		response.await
	}

	/// Sends a notification through the same ordered lane as requests.
	/// Dropped without a trace once the session closed.
	pub fn notify(&self, method: impl Into<String>, args: Vec<Value>) {
		if self.is_closed() {
			return;
		}
		let _ = self.shared.lane.send(LaneCmd::Notify {
			method: method.into(),
			args,
		});
	}

	/// Returns `true` once the session reached its terminal state.
	pub fn is_closed(&self) -> bool {
		self.shared.closed.is_cancelled()
	}

	/// Resolves once the session closed, whether by [`Transport::close`] or by
	/// the inbound stream ending.
	pub fn closed(&self) -> impl Future<Output = ()> + Send + 'static {
		let token = self.shared.closed.clone();
		async move { token.cancelled().await }
	}

	/// Closes the session: stops the receive activity and fails every pending
	/// request with [`RequestError::SessionClosed`].
	pub fn close(&self) {
		if !self.shared.closed.is_cancelled() {
			debug!("rpc.close");
			self.shared.closed.cancel();
		}
	}

	/// Stops all further delegate callbacks.
	pub fn detach(&self) {
		self.shared.delegate.detach();
	}

	fn enqueue(&self, method: String, args: Vec<Value>, on_sent: Option<Hook>, on_answered: Option<Hook>) -> ResponseFuture {
		let (reply, rx) = oneshot::channel();
		if !self.is_closed() {
			let _ = self.shared.lane.send(LaneCmd::Request {
				method,
				args,
				reply,
				on_sent,
				on_answered,
			});
		}
		ResponseFuture { rx }
	}
}

/// Completion of a request sent through [`Transport::request`].
#[must_use = "the request is sent regardless; the future only yields its result"]
#[derive(Debug)]
pub struct ResponseFuture {
	rx: oneshot::Receiver<Result<Value, RequestError>>,
}

impl Future for ResponseFuture {
	type Output = crate::Result<Value>;

	fn poll(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
		Pin::new(&mut self.rx)
			.poll(cx)
			.map(|res| res.unwrap_or(Err(RequestError::SessionClosed)))
	}
}

struct PendingRequest {
	method: String,
	reply: Reply,
	on_answered: Option<Hook>,
}

/// Owns the writer, the id counter and the pending-request map.
struct SendLane<W> {
	writer: W,
	ids: CounterIdGen,
	pending: HashMap<u64, PendingRequest>,
	rx: mpsc::UnboundedReceiver<LaneCmd>,
	closed: CancellationToken,
	delegate: DelegateHandle,
}

impl<W: AsyncWrite + Unpin> SendLane<W> {
	async fn run(mut self) {
		loop {
			let cmd = tokio::select! {
				biased;
				() = self.closed.cancelled() => break,
				cmd = self.rx.recv() => match cmd {
					Some(cmd) => cmd,
					None => break,
				},
			};
			self.handle(cmd).await;
		}
		self.shutdown().await;
	}

	async fn handle(&mut self, cmd: LaneCmd) {
		match cmd {
			LaneCmd::Request {
				method,
				args,
				reply,
				on_sent,
				on_answered,
			} => {
				let pending = &self.pending;
				let id = self.ids.next_free(|id| pending.contains_key(&id));
				let message = Message::Request(Request {
					id,
					method: method.clone(),
					args,
				});
				match self.write(&message).await {
					Ok(()) => {
						trace!(id, method = %method, "rpc.send.request");
						if let Some(hook) = on_sent {
							hook(id);
						}
						self.pending.insert(id, PendingRequest { method, reply, on_answered });
					}
					Err(err) => {
						warn!(id, method = %method, error = %err, "rpc.send.io_failed");
						let _ = reply.send(Err(RequestError::Io(err.to_string())));
						self.delegate.error(TransportError::Io(err.to_string()));
					}
				}
			}
			LaneCmd::Notify { method, args } => {
				let message = Message::Notification(Notification { method, args });
				if let Err(err) = self.write(&message).await {
					warn!(error = %err, "rpc.send.io_failed");
					self.delegate.error(TransportError::Io(err.to_string()));
				}
			}
			LaneCmd::Respond { id, result } => {
				let message = Message::Response(Response { id, result });
				if let Err(err) = self.write(&message).await {
					warn!(id, error = %err, "rpc.send.io_failed");
					self.delegate.error(TransportError::Io(err.to_string()));
				}
			}
			LaneCmd::Inbound(response) => self.complete(response),
		}
	}

	async fn write(&mut self, message: &Message) -> io::Result<()> {
		let bytes = encode(&message.to_value());
		self.writer.write_all(&bytes).await?;
		self.writer.flush().await
	}

	fn complete(&mut self, response: Response) {
		let Some(pending) = self.pending.remove(&response.id) else {
			warn!(id = response.id, "rpc.recv.unknown_request_id");
			self.delegate.error(TransportError::UnknownRequestId(response.id));
			return;
		};
		trace!(id = response.id, method = %pending.method, ok = response.result.is_ok(), "rpc.recv.response");
		if let Some(hook) = pending.on_answered {
			hook(response.id);
		}
		let _ = pending.reply.send(response.result.map_err(RequestError::Remote));
	}

	async fn shutdown(mut self) {
		self.rx.close();
		while let Ok(cmd) = self.rx.try_recv() {
			match cmd {
				LaneCmd::Inbound(response) => self.complete(response),
				LaneCmd::Request { reply, .. } => {
					let _ = reply.send(Err(RequestError::SessionClosed));
				}
				LaneCmd::Notify { .. } | LaneCmd::Respond { .. } => {}
			}
		}

		let failed = self.pending.len();
		for (_, pending) in self.pending.drain() {
			let _ = pending.reply.send(Err(RequestError::SessionClosed));
		}
		let _ = self.writer.shutdown().await;
		debug!(failed, "rpc.send_lane.closed");
	}
}

/// Reads the inbound stream until it ends or the session is closed.
async fn receive<R>(mut reader: R, lane: mpsc::UnboundedSender<LaneCmd>, delegate: DelegateHandle, closed: CancellationToken)
where
	R: AsyncRead + Unpin,
{
	let mut decoder = FrameDecoder::new();
	let mut chunk = vec![0u8; READ_CHUNK];

	loop {
		let read = tokio::select! {
			biased;
			() = closed.cancelled() => break,
			read = reader.read(&mut chunk) => read,
		};
		let n = match read {
			Ok(0) => {
				let pending = decoder.pending_bytes();
				if pending > 0 {
					warn!(pending, "rpc.recv.truncated");
					delegate.error(TransportError::Codec(CodecError::Truncated { pending }));
				}
				break;
			}
			Ok(n) => n,
			Err(err) if err.kind() == io::ErrorKind::Interrupted => continue,
			Err(err) => {
				error!(error = %err, "rpc.recv.io_failed");
				delegate.error(TransportError::Io(err.to_string()));
				break;
			}
		};

		decoder.feed(&chunk[..n]);
		loop {
			match decoder.next_value() {
				Ok(Some(value)) => dispatch(value, &lane, &delegate),
				Ok(None) => break,
				Err(err) => {
					warn!(error = %err, "rpc.recv.decode_failed");
					delegate.error(TransportError::Codec(err));
				}
			}
		}
	}

	closed.cancel();
	debug!("rpc.recv.closed");
	delegate.closed();
}

fn dispatch(value: Value, lane: &mpsc::UnboundedSender<LaneCmd>, delegate: &DelegateHandle) {
	match Message::from_value(value) {
		Ok(Message::Response(response)) => {
			let _ = lane.send(LaneCmd::Inbound(response));
		}
		Ok(Message::Notification(notification)) => {
			trace!(method = %notification.method, "rpc.recv.notification");
			delegate.notify(notification);
		}
		Ok(Message::Request(request)) => {
			trace!(id = request.id, method = %request.method, "rpc.recv.request");
			let responder = Responder {
				id: request.id,
				lane: lane.clone(),
			};
			delegate.request(request, responder);
		}
		Err(err) => {
			warn!(error = %err, "rpc.recv.malformed");
			delegate.error(err);
		}
	}
}
