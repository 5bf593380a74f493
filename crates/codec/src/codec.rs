//! Conversion between [`Value`] and MessagePack bytes.

use std::io;

use bytes::BytesMut;

use crate::value::{HandleKind, Value};
use crate::{CodecError, Result};

/// Encodes a value into a fresh byte vector.
pub fn encode(value: &Value) -> Vec<u8> {
	let mut buf = Vec::new();
	// Writes into a Vec never fail.
	let _ = encode_into(value, &mut buf);
	buf
}

/// Encodes a value into `wr`.
pub fn encode_into(value: &Value, wr: &mut impl io::Write) -> io::Result<()> {
	rmpv::encode::write_value(wr, &to_raw(value)).map_err(|e| io::Error::other(e.to_string()))
}

/// Decodes every complete value in `bytes`.
///
/// # Errors
///
/// - [`CodecError::Truncated`] when the input ends inside a value.
/// - [`CodecError::Framing`] when the input is not MessagePack.
/// - [`CodecError::Decode`] when a value is well-formed but not representable,
///   such as an unknown extension type.
pub fn decode_all(bytes: &[u8]) -> Result<Vec<Value>> {
	let mut decoder = FrameDecoder::new();
	decoder.feed(bytes);
	let mut values = Vec::new();
	while let Some(value) = decoder.next_value()? {
		values.push(value);
	}
	match decoder.pending_bytes() {
		0 => Ok(values),
		pending => Err(CodecError::Truncated { pending }),
	}
}

/// Incremental decoder that splits a byte stream into values.
///
/// Bytes are appended with [`FrameDecoder::feed`]; [`FrameDecoder::next_value`]
/// yields values as soon as they are complete and keeps partial input buffered.
#[derive(Debug, Default)]
pub struct FrameDecoder {
	buf: BytesMut,
	scan: FrameScan,
}

impl FrameDecoder {
	/// Creates an empty decoder.
	pub fn new() -> Self {
		Self::default()
	}

	/// Appends raw bytes read from the stream.
	pub fn feed(&mut self, bytes: &[u8]) {
		self.buf.extend_from_slice(bytes);
	}

	/// Number of buffered bytes not yet consumed by a complete value.
	pub fn pending_bytes(&self) -> usize {
		self.buf.len()
	}

	/// Pops the next complete value.
	///
	/// Returns `Ok(None)` when the buffered bytes do not yet hold a complete
	/// value. A [`CodecError::Decode`] consumes the offending value, so the
	/// caller may keep reading. A [`CodecError::Framing`] discards the buffer
	/// since no value boundary can be recovered from it.
	pub fn next_value(&mut self) -> Result<Option<Value>> {
		let len = match self.scan.frame_len(&self.buf) {
			Ok(Some(len)) => len,
			Ok(None) => return Ok(None),
			Err(reason) => {
				let discarded = self.buf.len();
				self.buf.clear();
				self.scan = FrameScan::default();
				return Err(CodecError::Framing(format!("{reason} ({discarded} bytes discarded)")));
			}
		};
		self.scan = FrameScan::default();
		let frame = self.buf.split_to(len);
		let mut cursor: &[u8] = &frame;
		let raw = rmpv::decode::read_value(&mut cursor).map_err(|err| CodecError::Framing(err.to_string()))?;
		from_raw(raw).map(Some)
	}
}

/// Resumable walk over MessagePack headers finding where the first value ends.
///
/// Headers already walked are not read again when more bytes arrive, so a
/// large value split over many reads is scanned once.
#[derive(Debug, Default)]
struct FrameScan {
	/// Offset of the next header.
	pos: usize,
	/// Items still expected by each open container, innermost last.
	open: Vec<u64>,
	started: bool,
}

impl FrameScan {
	/// Length of the first value in `buf`, or `None` until all of it is buffered.
	fn frame_len(&mut self, buf: &[u8]) -> Result<Option<usize>, String> {
		if !self.started {
			self.open.push(1);
			self.started = true;
		}
		while let Some(remaining) = self.open.last_mut() {
			if *remaining == 0 {
				self.open.pop();
				continue;
			}
			let Some(header) = read_header(&buf[self.pos..])? else {
				return Ok(None);
			};
			match self.pos.checked_add(header.size) {
				Some(end) if end <= buf.len() => self.pos = end,
				_ => return Ok(None),
			}
			*remaining -= 1;
			if header.children > 0 {
				self.open.push(header.children);
			}
		}
		Ok(Some(self.pos))
	}
}

/// Bytes taken by a value's marker, length fields and payload, plus the number
/// of nested values that follow it.
struct Header {
	size: usize,
	children: u64,
}

const fn scalar(size: usize) -> Option<Header> {
	Some(Header { size, children: 0 })
}

/// Big-endian length field of `width` bytes after the marker.
fn length(bytes: &[u8], width: usize) -> Option<usize> {
	let field = bytes.get(1..1 + width)?;
	Some(field.iter().fold(0usize, |n, b| (n << 8) | usize::from(*b)))
}

fn payload(bytes: &[u8], width: usize, ext: usize) -> Option<Header> {
	let len = length(bytes, width)?;
	scalar((1 + width + ext).checked_add(len)?)
}

fn container(bytes: &[u8], width: usize, per_item: u64) -> Option<Header> {
	let len = length(bytes, width)? as u64;
	Some(Header {
		size: 1 + width,
		children: len * per_item,
	})
}

fn read_header(bytes: &[u8]) -> Result<Option<Header>, String> {
	let Some(&marker) = bytes.first() else {
		return Ok(None);
	};
	Ok(match marker {
		0x00..=0x7f | 0xe0..=0xff | 0xc0 | 0xc2 | 0xc3 => scalar(1),
		0x80..=0x8f => Some(Header {
			size: 1,
			children: 2 * u64::from(marker & 0x0f),
		}),
		0x90..=0x9f => Some(Header {
			size: 1,
			children: u64::from(marker & 0x0f),
		}),
		0xa0..=0xbf => scalar(1 + usize::from(marker & 0x1f)),
		0xc1 => return Err("reserved marker 0xc1".to_owned()),
		0xc4 | 0xd9 => payload(bytes, 1, 0),
		0xc5 | 0xda => payload(bytes, 2, 0),
		0xc6 | 0xdb => payload(bytes, 4, 0),
		0xc7 => payload(bytes, 1, 1),
		0xc8 => payload(bytes, 2, 1),
		0xc9 => payload(bytes, 4, 1),
		0xcc | 0xd0 => scalar(2),
		0xcd | 0xd1 => scalar(3),
		0xca | 0xce | 0xd2 => scalar(5),
		0xcb | 0xcf | 0xd3 => scalar(9),
		0xd4 => scalar(3),
		0xd5 => scalar(4),
		0xd6 => scalar(6),
		0xd7 => scalar(10),
		0xd8 => scalar(18),
		0xdc => container(bytes, 2, 1),
		0xdd => container(bytes, 4, 1),
		0xde => container(bytes, 2, 2),
		0xdf => container(bytes, 4, 2),
	})
}

fn to_raw(value: &Value) -> rmpv::Value {
	match value {
		Value::Nil => rmpv::Value::Nil,
		Value::Boolean(b) => rmpv::Value::Boolean(*b),
		Value::Integer(n) => match (n.as_u64(), n.as_i64()) {
			(Some(u), _) => rmpv::Value::from(u),
			(None, Some(i)) => rmpv::Value::from(i),
			(None, None) => unreachable!("integers are either non-negative or fit i64"),
		},
		Value::Float(f) => rmpv::Value::F64(*f),
		Value::String(s) => rmpv::Value::String(s.clone().into()),
		Value::Binary(bytes) => rmpv::Value::Binary(bytes.clone()),
		Value::Array(items) => rmpv::Value::Array(items.iter().map(to_raw).collect()),
		Value::Map(entries) => rmpv::Value::Map(entries.iter().map(|(k, v)| (to_raw(k), to_raw(v))).collect()),
		Value::Handle(kind, id) => {
			let mut payload = Vec::new();
			let _ = rmpv::encode::write_value(&mut payload, &rmpv::Value::from(*id));
			rmpv::Value::Ext(kind.ext_code(), payload)
		}
	}
}

fn from_raw(raw: rmpv::Value) -> Result<Value> {
	Ok(match raw {
		rmpv::Value::Nil => Value::Nil,
		rmpv::Value::Boolean(b) => Value::Boolean(b),
		rmpv::Value::Integer(n) => match (n.as_u64(), n.as_i64()) {
			(Some(u), _) => Value::from(u),
			(None, Some(i)) => Value::from(i),
			(None, None) => return Err(CodecError::Decode(format!("integer out of range: {n}"))),
		},
		rmpv::Value::F32(f) => Value::Float(f64::from(f)),
		rmpv::Value::F64(f) => Value::Float(f),
		rmpv::Value::String(s) => {
			if s.as_str().is_some() {
				Value::String(s.into_str().unwrap_or_default())
			} else {
				Value::Binary(s.into_bytes())
			}
		}
		rmpv::Value::Binary(bytes) => Value::Binary(bytes),
		rmpv::Value::Array(items) => Value::Array(items.into_iter().map(from_raw).collect::<Result<_>>()?),
		rmpv::Value::Map(entries) => Value::Map(
			entries
				.into_iter()
				.map(|(k, v)| Ok((from_raw(k)?, from_raw(v)?)))
				.collect::<Result<_>>()?,
		),
		rmpv::Value::Ext(code, payload) => decode_handle(code, &payload)?,
	})
}

fn decode_handle(code: i8, payload: &[u8]) -> Result<Value> {
	let kind = HandleKind::from_ext_code(code).ok_or_else(|| CodecError::Decode(format!("unknown extension type {code}")))?;

	let mut cursor = payload;
	let inner = rmpv::decode::read_value(&mut cursor).map_err(|e| CodecError::Decode(format!("malformed {} handle payload: {e}", kind.as_str())))?;
	if !cursor.is_empty() {
		return Err(CodecError::Decode(format!("{} trailing bytes in {} handle payload", cursor.len(), kind.as_str())));
	}
	let id = inner
		.as_u64()
		.ok_or_else(|| CodecError::Decode(format!("{} handle payload is not an unsigned integer", kind.as_str())))?;
	Ok(Value::Handle(kind, id))
}
