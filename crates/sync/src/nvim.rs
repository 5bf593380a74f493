//! [`EditorEngine`] over a Neovim API session.

use std::sync::Arc;

use async_trait::async_trait;
use futures::FutureExt;
use futures::future::BoxFuture;
use parking_lot::Mutex;
use tandem_api::{ApiClient, ApiError, BufferEvent, BufferHandle, Connection, EventDispatcher, LineChangeEvent, Value, WindowHandle};
use tokio::sync::mpsc;
use tracing::{debug, warn};

use crate::diff::LineOp;
use crate::edit::LineEdit;
use crate::engine::{BufferEvents, EditorEngine};
use crate::position::BufferPosition;

/// Engine adapter driving Neovim through its msgpack-RPC API.
///
/// Cursor operations act on the current window.
#[derive(Debug, Clone)]
pub struct NvimEngine {
	client: ApiClient,
	events: EventDispatcher,
}

impl NvimEngine {
	/// Creates an adapter from a client and the dispatcher of its session.
	pub fn new(client: ApiClient, events: EventDispatcher) -> Self {
		Self { client, events }
	}

	/// Creates an adapter for a connection.
	pub fn from_connection(connection: &Connection) -> Self {
		Self::new(connection.client().clone(), connection.events().clone())
	}
}

fn line_arg(line: usize) -> i64 {
	i64::try_from(line).unwrap_or(i64::MAX)
}

#[async_trait]
impl EditorEngine for NvimEngine {
	async fn current_buffer(&self) -> Result<BufferHandle, ApiError> {
		self.client.get_current_buf().await
	}

	async fn attach(&self, buffer: BufferHandle, send_buffer: bool) -> Result<BufferEvents, ApiError> {
		let (tx, rx) = mpsc::unbounded_channel::<LineChangeEvent>();
		let tx = Arc::new(Mutex::new(Some(tx)));

		let lines = {
			let tx = tx.clone();
			self.events.subscribe(BufferEvent::LINES, move |args: &[Value]| match BufferEvent::decode(BufferEvent::LINES, args) {
				Ok(Some(BufferEvent::Lines(event))) if event.buffer == buffer => {
					if let Some(tx) = &*tx.lock() {
						let _ = tx.send(event);
					}
				}
				Ok(_) => {}
				Err(err) => warn!(error = %err, "sync.nvim.bad_event"),
			})
		};
		let detach = {
			let tx = tx.clone();
			self.events.subscribe(BufferEvent::DETACH, move |args: &[Value]| {
				if let Ok(Some(event)) = BufferEvent::decode(BufferEvent::DETACH, args)
					&& event.buffer() == buffer
				{
					debug!(buffer = buffer.0, "sync.nvim.detached");
					tx.lock().take();
				}
			})
		};

		if !self.client.buf_attach(buffer, send_buffer).await? {
			return Err(ApiError::UnexpectedResult {
				method: "nvim_buf_attach",
				expected: "true",
				got: "false",
			});
		}
		Ok(BufferEvents::with_subscriptions(rx, vec![lines, detach]))
	}

	async fn buffer_lines(&self, buffer: BufferHandle) -> Result<Vec<String>, ApiError> {
		self.client.buf_get_lines(buffer, 0, -1, false).await
	}

	async fn set_lines(&self, buffer: BufferHandle, edit: LineEdit) -> Result<Option<u64>, ApiError> {
		let end = edit.last.map_or(-1, line_arg);
		self.client.buf_set_lines(buffer, line_arg(edit.first), end, true, edit.lines).await?;
		self.client.buf_get_changedtick(buffer).await.map(Some)
	}

	async fn replace_ranges(&self, buffer: BufferHandle, ops: Vec<LineOp>) -> Result<Option<u64>, ApiError> {
		let tx = self.client.begin_transaction().await;
		for op in ops {
			tx.buf_set_lines(buffer, line_arg(op.start), line_arg(op.end), true, op.lines).await?;
		}
		tx.buf_get_changedtick(buffer).await.map(Some)
	}

	async fn cursor(&self, _buffer: BufferHandle) -> Result<BufferPosition, ApiError> {
		let client = self.client.clone();
		let value = self
			.client
			.deferred("nvim_get_current_win", vec![])
			.and_then(move |win| client.deferred("nvim_win_get_cursor", vec![win]))
			.run()
			.await?;
		let position = match value.as_array() {
			Some([row, col]) => row.as_u64().zip(col.as_u64()),
			_ => None,
		};
		position
			.map(|(row, col)| BufferPosition::new(row, col + 1))
			.ok_or_else(|| ApiError::UnexpectedResult {
				method: "nvim_win_get_cursor",
				expected: "[row, col]",
				got: value.type_name(),
			})
	}

	async fn set_cursor(&self, _buffer: BufferHandle, pos: BufferPosition) -> Result<(), ApiError> {
		self.client
			.win_set_cursor(WindowHandle::CURRENT, (pos.line, pos.column.saturating_sub(1)))
			.await
	}

	fn closed(&self) -> BoxFuture<'static, ()> {
		self.client.transport().closed().boxed()
	}
}
