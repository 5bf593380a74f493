//! The editing engine as seen by the synchronizer.

use async_trait::async_trait;
use futures::future::BoxFuture;
use tandem_api::{ApiError, BufferHandle, LineChangeEvent, Subscription};
use tokio::sync::mpsc;

use crate::diff::LineOp;
use crate::edit::LineEdit;
use crate::position::BufferPosition;

/// Line change events of one attached buffer.
///
/// The stream ends when the engine detaches the buffer.
#[derive(Debug)]
pub struct BufferEvents {
	rx: mpsc::UnboundedReceiver<LineChangeEvent>,
	_subscriptions: Vec<Subscription>,
}

impl BufferEvents {
	/// Wraps a receiver.
	pub fn new(rx: mpsc::UnboundedReceiver<LineChangeEvent>) -> Self {
		Self {
			rx,
			_subscriptions: Vec::new(),
		}
	}

	/// Wraps a receiver fed by notification handlers; the handlers stay
	/// registered as long as the stream lives.
	pub fn with_subscriptions(rx: mpsc::UnboundedReceiver<LineChangeEvent>, subscriptions: Vec<Subscription>) -> Self {
		Self {
			rx,
			_subscriptions: subscriptions,
		}
	}

	/// Next event, or `None` once detached.
	pub async fn recv(&mut self) -> Option<LineChangeEvent> {
		self.rx.recv().await
	}
}

/// Operations the synchronizer needs from the editing engine.
#[async_trait]
pub trait EditorEngine: Send + Sync + 'static {
	/// Resolves the current buffer.
	async fn current_buffer(&self) -> Result<BufferHandle, ApiError>;

	/// Starts streaming line changes of `buffer`; with `send_buffer` the first
	/// event carries the whole buffer.
	async fn attach(&self, buffer: BufferHandle, send_buffer: bool) -> Result<BufferEvents, ApiError>;

	/// Full content of `buffer`.
	async fn buffer_lines(&self, buffer: BufferHandle) -> Result<Vec<String>, ApiError>;

	/// Replaces a line range of `buffer`. Returns the buffer's change tick
	/// after the write when the engine tracks one; line events carrying a tick
	/// up to it are the echo of this write.
	async fn set_lines(&self, buffer: BufferHandle, edit: LineEdit) -> Result<Option<u64>, ApiError>;

	/// Applies diff operations in order and returns the change tick after the
	/// last one. Implementations should keep other writers out while the batch
	/// runs.
	async fn replace_ranges(&self, buffer: BufferHandle, ops: Vec<LineOp>) -> Result<Option<u64>, ApiError> {
		let mut tick = None;
		for op in ops {
			tick = self.set_lines(buffer, op.into()).await?.or(tick);
		}
		Ok(tick)
	}

	/// Cursor position in `buffer`.
	async fn cursor(&self, buffer: BufferHandle) -> Result<BufferPosition, ApiError>;

	/// Moves the cursor in `buffer`.
	async fn set_cursor(&self, buffer: BufferHandle, pos: BufferPosition) -> Result<(), ApiError>;

	/// Resolves once the engine session ended.
	fn closed(&self) -> BoxFuture<'static, ()>;
}
