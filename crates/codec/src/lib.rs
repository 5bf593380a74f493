//! MessagePack value model and stream framing.
//!
//! * [`Value`]: typed in-memory wire values, including the three remote-object
//!   handle extension types ([`HandleKind`]).
//! * [`encode`] / [`decode_all`]: whole-buffer conversion.
//! * [`FrameDecoder`]: incremental splitting of a byte stream into values.

#![warn(missing_docs)]

mod codec;
mod value;

pub use codec::{FrameDecoder, decode_all, encode, encode_into};
pub use value::{HandleKind, Integer, Value};

/// A convenient type alias for `Result` with `E` = [`CodecError`].
pub type Result<T, E = CodecError> = std::result::Result<T, E>;

/// Codec failures.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum CodecError {
	/// Input ended in the middle of a value.
	#[error("truncated input: {pending} bytes do not form a complete value")]
	Truncated {
		/// Bytes left over after the last complete value.
		pending: usize,
	},
	/// Input is not a valid MessagePack stream.
	#[error("framing error: {0}")]
	Framing(String),
	/// A well-formed value could not be represented as a [`Value`].
	#[error("decode error: {0}")]
	Decode(String),
}

impl CodecError {
	/// Returns `true` for errors about stream framing rather than value content.
	pub const fn is_framing(&self) -> bool {
		matches!(self, Self::Truncated { .. } | Self::Framing(_))
	}
}
