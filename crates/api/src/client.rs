//! Method-call surface over the transport.

use std::ops::Deref;

use tandem_rpc::{RequestOptions, Transport, Value};
use tandem_worker::{AsyncLock, Deferred, LockGuard};
use tracing::trace;

use crate::types::{BufferHandle, Mode, WindowHandle};
use crate::{ApiError, Result};

/// Client for the editing engine's API.
///
/// Cloning is cheap. Every clone shares the transport's ordered send lane and
/// the session's transaction lock: ordinary calls wait for a running
/// [`Transaction`] to finish before they are sent.
#[derive(Debug, Clone)]
pub struct ApiClient {
	transport: Transport,
	lock: AsyncLock,
	gated: bool,
}

impl ApiClient {
	/// Wraps a running transport.
	pub fn new(transport: Transport) -> Self {
		Self {
			transport,
			lock: AsyncLock::new(),
			gated: true,
		}
	}

	/// The underlying transport.
	pub fn transport(&self) -> &Transport {
		&self.transport
	}

	/// Calls any remote method by name.
	pub async fn call(&self, method: &str, args: Vec<Value>) -> Result<Value> {
		trace!(method, gated = self.gated, "api.call");
		let result = if self.gated {
			self.transport
				.request_with(method, args, RequestOptions::gated(self.lock.clone()))
				.await
		} else {
			self.transport.request(method, args).await
		};
		result.map_err(ApiError::from)
	}

	/// Like [`ApiClient::call`], but nothing is sent until the returned
	/// computation runs. Chained steps are sent strictly one after another.
	pub fn deferred(&self, method: &'static str, args: Vec<Value>) -> Deferred<Value, ApiError> {
		let client = self.clone();
		Deferred::new(async move { client.call(method, args).await })
	}

	/// Starts a transaction, waiting for any running one to finish.
	///
	/// Calls made through the returned guard are not gated; all other calls on
	/// this session wait until the guard is dropped.
	pub async fn begin_transaction(&self) -> Transaction {
		let guard = self.lock.acquire().await;
		trace!("api.transaction.begin");
		Transaction {
			client: Self {
				transport: self.transport.clone(),
				lock: self.lock.clone(),
				gated: false,
			},
			_guard: guard,
		}
	}

	/// Returns `true` while a transaction is running.
	pub fn in_transaction(&self) -> bool {
		self.lock.is_locked()
	}

	/// `nvim_get_current_buf`
	pub async fn get_current_buf(&self) -> Result<BufferHandle> {
		const METHOD: &str = "nvim_get_current_buf";
		let value = self.call(METHOD, vec![]).await?;
		BufferHandle::from_value(&value).ok_or_else(|| unexpected(METHOD, "buffer handle", &value))
	}

	/// `nvim_get_current_win`
	pub async fn get_current_win(&self) -> Result<WindowHandle> {
		const METHOD: &str = "nvim_get_current_win";
		let value = self.call(METHOD, vec![]).await?;
		WindowHandle::from_value(&value).ok_or_else(|| unexpected(METHOD, "window handle", &value))
	}

	/// `nvim_buf_attach`: subscribes to line events for `buffer`, optionally
	/// starting with one event carrying the whole buffer.
	pub async fn buf_attach(&self, buffer: BufferHandle, send_buffer: bool) -> Result<bool> {
		const METHOD: &str = "nvim_buf_attach";
		let value = self
			.call(METHOD, vec![buffer.to_value(), Value::from(send_buffer), Value::Map(Vec::new())])
			.await?;
		value.as_bool().ok_or_else(|| unexpected(METHOD, "boolean", &value))
	}

	/// `nvim_buf_detach`
	pub async fn buf_detach(&self, buffer: BufferHandle) -> Result<bool> {
		const METHOD: &str = "nvim_buf_detach";
		let value = self.call(METHOD, vec![buffer.to_value()]).await?;
		value.as_bool().ok_or_else(|| unexpected(METHOD, "boolean", &value))
	}

	/// `nvim_buf_get_lines`: zero-based, end-exclusive; negative indices count
	/// from the end (`-1` is past the last line).
	pub async fn buf_get_lines(&self, buffer: BufferHandle, start: i64, end: i64, strict: bool) -> Result<Vec<String>> {
		const METHOD: &str = "nvim_buf_get_lines";
		let value = self
			.call(METHOD, vec![buffer.to_value(), Value::from(start), Value::from(end), Value::from(strict)])
			.await?;
		lines_from_value(METHOD, value)
	}

	/// `nvim_buf_set_lines`: replaces `[start, end)` with `lines`.
	pub async fn buf_set_lines(&self, buffer: BufferHandle, start: i64, end: i64, strict: bool, lines: Vec<String>) -> Result<()> {
		self.call(
			"nvim_buf_set_lines",
			vec![
				buffer.to_value(),
				Value::from(start),
				Value::from(end),
				Value::from(strict),
				Value::from(lines),
			],
		)
		.await?;
		Ok(())
	}

	/// `nvim_buf_line_count`
	pub async fn buf_line_count(&self, buffer: BufferHandle) -> Result<u64> {
		const METHOD: &str = "nvim_buf_line_count";
		let value = self.call(METHOD, vec![buffer.to_value()]).await?;
		value.as_u64().ok_or_else(|| unexpected(METHOD, "unsigned integer", &value))
	}

	/// `nvim_buf_get_changedtick`: counter bumped by every change to `buffer`.
	pub async fn buf_get_changedtick(&self, buffer: BufferHandle) -> Result<u64> {
		const METHOD: &str = "nvim_buf_get_changedtick";
		let value = self.call(METHOD, vec![buffer.to_value()]).await?;
		value.as_u64().ok_or_else(|| unexpected(METHOD, "unsigned integer", &value))
	}

	/// `nvim_win_get_cursor`: `(row, col)` with a 1-based row and a 0-based
	/// byte column.
	pub async fn win_get_cursor(&self, window: WindowHandle) -> Result<(u64, u64)> {
		const METHOD: &str = "nvim_win_get_cursor";
		let value = self.call(METHOD, vec![window.to_value()]).await?;
		match value.as_array() {
			Some([row, col]) => match (row.as_u64(), col.as_u64()) {
				(Some(row), Some(col)) => Ok((row, col)),
				_ => Err(unexpected(METHOD, "[row, col]", &value)),
			},
			_ => Err(unexpected(METHOD, "[row, col]", &value)),
		}
	}

	/// `nvim_win_set_cursor`, same coordinates as [`ApiClient::win_get_cursor`].
	pub async fn win_set_cursor(&self, window: WindowHandle, (row, col): (u64, u64)) -> Result<()> {
		self.call(
			"nvim_win_set_cursor",
			vec![window.to_value(), Value::Array(vec![Value::from(row), Value::from(col)])],
		)
		.await?;
		Ok(())
	}

	/// `nvim_input`: queues raw keys; returns the number of bytes consumed.
	pub async fn input(&self, keys: &str) -> Result<u64> {
		const METHOD: &str = "nvim_input";
		let value = self.call(METHOD, vec![Value::from(keys)]).await?;
		value.as_u64().ok_or_else(|| unexpected(METHOD, "unsigned integer", &value))
	}

	/// `nvim_command`
	pub async fn command(&self, command: &str) -> Result<()> {
		self.call("nvim_command", vec![Value::from(command)]).await?;
		Ok(())
	}

	/// `nvim_eval`
	pub async fn eval(&self, expr: &str) -> Result<Value> {
		self.call("nvim_eval", vec![Value::from(expr)]).await
	}

	/// `nvim_get_mode`
	pub async fn get_mode(&self) -> Result<Mode> {
		const METHOD: &str = "nvim_get_mode";
		let value = self.call(METHOD, vec![]).await?;
		let mode = value.get("mode").and_then(Value::as_str);
		let blocking = value.get("blocking").and_then(Value::as_bool);
		match (mode, blocking) {
			(Some(mode), Some(blocking)) => Ok(Mode {
				mode: mode.to_owned(),
				blocking,
			}),
			_ => Err(unexpected(METHOD, "{mode, blocking}", &value)),
		}
	}
}

/// A run of calls that no other caller of the session can interleave with.
///
/// Dereferences to an [`ApiClient`] whose calls skip the transaction lock.
/// Dropping the guard ends the transaction and lets queued callers proceed in
/// arrival order.
#[must_use = "the transaction ends as soon as the guard is dropped"]
#[derive(Debug)]
pub struct Transaction {
	client: ApiClient,
	_guard: LockGuard,
}

impl Deref for Transaction {
	type Target = ApiClient;

	fn deref(&self) -> &ApiClient {
		&self.client
	}
}

fn unexpected(method: &'static str, expected: &'static str, got: &Value) -> ApiError {
	ApiError::UnexpectedResult {
		method,
		expected,
		got: got.type_name(),
	}
}

/// Converts a line array; lines that are not valid UTF-8 are decoded lossily.
pub(crate) fn lines_from_value(method: &'static str, value: Value) -> Result<Vec<String>> {
	let got = value.type_name();
	let Some(items) = value.into_array() else {
		return Err(ApiError::UnexpectedResult {
			method,
			expected: "array of strings",
			got,
		});
	};
	items
		.into_iter()
		.map(|item| match item {
			Value::String(s) => Ok(s),
			Value::Binary(b) => Ok(String::from_utf8_lossy(&b).into_owned()),
			other => Err(unexpected(method, "string", &other)),
		})
		.collect()
}
