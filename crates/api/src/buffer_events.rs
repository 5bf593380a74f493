//! Decoding of the notifications sent for attached buffers.

use tandem_rpc::Value;

use crate::client::lines_from_value;
use crate::types::BufferHandle;
use crate::{ApiError, Result};

/// A replaced line range in an attached buffer.
///
/// Lines `[first_line, last_line)` (zero-based) were replaced by `new_lines`;
/// a missing `last_line` means through the end of the buffer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LineChangeEvent {
	/// Buffer the change happened in.
	pub buffer: BufferHandle,
	/// Change tick after the change; absent for changes that did not bump it.
	pub change_tick: Option<u64>,
	/// First replaced line.
	pub first_line: u64,
	/// End of the replaced range, exclusive.
	pub last_line: Option<u64>,
	/// Replacement lines.
	pub new_lines: Vec<String>,
	/// More fragments of the same change follow.
	pub more_coming: bool,
}

/// Any buffer notification.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BufferEvent {
	/// `nvim_buf_lines_event`
	Lines(LineChangeEvent),
	/// `nvim_buf_changedtick_event`: the tick moved without a line change.
	ChangedTick {
		/// Buffer whose tick changed.
		buffer: BufferHandle,
		/// New tick.
		tick: u64,
	},
	/// `nvim_buf_detach_event`: no further events will be sent.
	Detach {
		/// Detached buffer.
		buffer: BufferHandle,
	},
}

impl BufferEvent {
	/// Notification name of [`BufferEvent::Lines`].
	pub const LINES: &'static str = "nvim_buf_lines_event";
	/// Notification name of [`BufferEvent::ChangedTick`].
	pub const CHANGED_TICK: &'static str = "nvim_buf_changedtick_event";
	/// Notification name of [`BufferEvent::Detach`].
	pub const DETACH: &'static str = "nvim_buf_detach_event";

	/// All notification names decoded by [`BufferEvent::decode`].
	pub const NAMES: [&'static str; 3] = [Self::LINES, Self::CHANGED_TICK, Self::DETACH];

	/// Decodes a buffer notification; `Ok(None)` for other notification names.
	pub fn decode(method: &str, args: &[Value]) -> Result<Option<Self>> {
		let event = match method {
			Self::LINES => Self::Lines(decode_lines(args)?),
			Self::CHANGED_TICK => {
				let [buffer, tick] = args else {
					return Err(malformed(Self::CHANGED_TICK, format!("expected 2 arguments, got {}", args.len())));
				};
				Self::ChangedTick {
					buffer: buffer_arg(Self::CHANGED_TICK, buffer)?,
					tick: tick.as_u64().ok_or_else(|| malformed(Self::CHANGED_TICK, "tick is not an unsigned integer"))?,
				}
			}
			Self::DETACH => {
				let [buffer] = args else {
					return Err(malformed(Self::DETACH, format!("expected 1 argument, got {}", args.len())));
				};
				Self::Detach {
					buffer: buffer_arg(Self::DETACH, buffer)?,
				}
			}
			_ => return Ok(None),
		};
		Ok(Some(event))
	}

	/// Buffer the event belongs to.
	pub const fn buffer(&self) -> BufferHandle {
		match self {
			Self::Lines(ev) => ev.buffer,
			Self::ChangedTick { buffer, .. } | Self::Detach { buffer } => *buffer,
		}
	}
}

fn decode_lines(args: &[Value]) -> Result<LineChangeEvent> {
	const METHOD: &str = BufferEvent::LINES;
	let [buffer, tick, first, last, lines, more] = args else {
		return Err(malformed(METHOD, format!("expected 6 arguments, got {}", args.len())));
	};
	let last_line = match last.as_i64() {
		Some(-1) => None,
		Some(n) => Some(u64::try_from(n).map_err(|_| malformed(METHOD, format!("negative lastline {n}")))?),
		None => return Err(malformed(METHOD, "lastline is not an integer")),
	};
	let new_lines = lines_from_value(METHOD, lines.clone()).map_err(|err| malformed(METHOD, err.to_string()))?;
	Ok(LineChangeEvent {
		buffer: buffer_arg(METHOD, buffer)?,
		change_tick: tick.as_u64(),
		first_line: first.as_u64().ok_or_else(|| malformed(METHOD, "firstline is not an unsigned integer"))?,
		last_line,
		new_lines,
		more_coming: more.as_bool().ok_or_else(|| malformed(METHOD, "more is not a boolean"))?,
	})
}

fn buffer_arg(method: &'static str, value: &Value) -> Result<BufferHandle> {
	BufferHandle::from_value(value).ok_or_else(|| malformed(method, format!("buffer is {}", value.type_name())))
}

fn malformed(method: &'static str, reason: impl Into<String>) -> ApiError {
	ApiError::MalformedEvent {
		method,
		reason: reason.into(),
	}
}
