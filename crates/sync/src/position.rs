//! Buffer positions and element offsets.

use std::fmt;

use ropey::Rope;
use serde::Deserialize;

/// A position in a buffer: 1-based line, 1-based byte column within the line.
///
/// Ordering is by line, then column.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct BufferPosition {
	/// Line number, starting at 1.
	pub line: u64,
	/// Byte column, starting at 1.
	pub column: u64,
}

impl BufferPosition {
	/// Start of the buffer.
	pub const START: Self = Self { line: 1, column: 1 };

	/// Creates a position.
	pub const fn new(line: u64, column: u64) -> Self {
		Self { line, column }
	}
}

impl fmt::Display for BufferPosition {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		write!(f, "{}:{}", self.line, self.column)
	}
}

/// An anchor/head pair of positions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Selection {
	/// Fixed end.
	pub anchor: BufferPosition,
	/// Moving end.
	pub head: BufferPosition,
}

impl Selection {
	/// Collapsed selection at `pos`.
	pub const fn caret(pos: BufferPosition) -> Self {
		Self { anchor: pos, head: pos }
	}

	/// Earlier of the two ends.
	pub fn start(&self) -> BufferPosition {
		self.anchor.min(self.head)
	}

	/// Later of the two ends.
	pub fn end(&self) -> BufferPosition {
		self.anchor.max(self.head)
	}
}

/// Unit in which the host element counts text offsets.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OffsetEncoding {
	/// Bytes.
	Utf8,
	/// UTF-16 code units.
	#[default]
	Utf16,
	/// Unicode scalar values.
	Utf32,
}

/// Line and offset index over a text snapshot.
///
/// Lines are separated by `\n` only, matching how the engine splits buffers.
#[derive(Debug, Clone)]
pub struct TextIndex {
	rope: Rope,
}

impl TextIndex {
	/// Indexes `text`.
	pub fn new(text: &str) -> Self {
		Self { rope: Rope::from_str(text) }
	}

	/// Number of lines; an empty text has one empty line.
	pub fn line_count(&self) -> usize {
		self.rope.len_lines()
	}

	/// Length of the text in `encoding` units.
	pub fn len(&self, encoding: OffsetEncoding) -> usize {
		match encoding {
			OffsetEncoding::Utf8 => self.rope.len_bytes(),
			OffsetEncoding::Utf16 => self.rope.len_utf16_cu(),
			OffsetEncoding::Utf32 => self.rope.len_chars(),
		}
	}

	/// Returns `true` for an empty text.
	pub fn is_empty(&self) -> bool {
		self.rope.len_bytes() == 0
	}

	/// Converts a byte offset to `encoding` units. Offsets inside a character
	/// count from that character's start.
	pub fn encode(&self, byte: usize, encoding: OffsetEncoding) -> usize {
		let byte = byte.min(self.rope.len_bytes());
		match encoding {
			OffsetEncoding::Utf8 => self.rope.char_to_byte(self.rope.byte_to_char(byte)),
			OffsetEncoding::Utf16 => self.rope.char_to_utf16_cu(self.rope.byte_to_char(byte)),
			OffsetEncoding::Utf32 => self.rope.byte_to_char(byte),
		}
	}

	/// Converts an offset in `encoding` units to a byte offset.
	pub fn decode(&self, offset: usize, encoding: OffsetEncoding) -> Option<usize> {
		if offset > self.len(encoding) {
			return None;
		}
		let char_idx = match encoding {
			OffsetEncoding::Utf8 => self.rope.byte_to_char(offset),
			OffsetEncoding::Utf16 => self.rope.utf16_cu_to_char(offset),
			OffsetEncoding::Utf32 => offset,
		};
		Some(self.rope.char_to_byte(char_idx))
	}

	/// Byte offset of `pos`. Columns past the end of the line clamp to the
	/// line end; lines past the end of the text are `None`.
	pub fn byte_of(&self, pos: BufferPosition) -> Option<usize> {
		let line = usize::try_from(pos.line.checked_sub(1)?).ok()?;
		if line >= self.line_count() {
			return None;
		}
		let start = self.rope.line_to_byte(line);
		let slice = self.rope.line(line);
		let mut len = slice.len_bytes();
		if len > 0 && slice.byte(len - 1) == b'\n' {
			len -= 1;
		}
		let column = usize::try_from(pos.column.saturating_sub(1)).unwrap_or(usize::MAX);
		Some(start + column.min(len))
	}

	/// Offset of `pos` in `encoding` units.
	pub fn offset_of(&self, pos: BufferPosition, encoding: OffsetEncoding) -> Option<usize> {
		self.byte_of(pos).map(|byte| self.encode(byte, encoding))
	}

	/// Position of an offset in `encoding` units.
	pub fn position_of(&self, offset: usize, encoding: OffsetEncoding) -> Option<BufferPosition> {
		let byte = self.decode(offset, encoding)?;
		let line = self.rope.byte_to_line(byte);
		let column = byte - self.rope.line_to_byte(line);
		Some(BufferPosition::new(line as u64 + 1, column as u64 + 1))
	}

	/// Selection over `length` units from `start`, anchored at `start`.
	pub fn selection_of(&self, start: usize, length: usize, encoding: OffsetEncoding) -> Option<Selection> {
		Some(Selection {
			anchor: self.position_of(start, encoding)?,
			head: self.position_of(start.checked_add(length)?, encoding)?,
		})
	}

	/// Element range `(start, length)` covered by `selection`.
	pub fn range_of(&self, selection: Selection, encoding: OffsetEncoding) -> Option<(usize, usize)> {
		let start = self.offset_of(selection.start(), encoding)?;
		let end = self.offset_of(selection.end(), encoding)?;
		Some((start, end.saturating_sub(start)))
	}
}
