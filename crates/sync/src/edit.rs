//! Line-range replacements and their text-offset equivalents.

use tandem_api::LineChangeEvent;

use crate::SyncError;

/// Replacement of lines `[first, last)` (zero-based) by `lines`.
/// A missing `last` means through the end of the buffer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LineEdit {
	/// First replaced line.
	pub first: usize,
	/// End of the replaced range, exclusive.
	pub last: Option<usize>,
	/// Replacement lines.
	pub lines: Vec<String>,
}

impl LineEdit {
	/// Creates an edit with an explicit end.
	pub fn new(first: usize, last: usize, lines: Vec<String>) -> Self {
		Self {
			first,
			last: Some(last),
			lines,
		}
	}

	/// End of the replaced range in a buffer of `len` lines.
	pub fn end(&self, len: usize) -> usize {
		self.last.unwrap_or(len)
	}

	fn check(&self, len: usize) -> Result<usize, SyncError> {
		let last = self.end(len);
		if self.first > last || last > len {
			return Err(SyncError::OutOfBounds {
				first: self.first,
				last,
				len,
			});
		}
		Ok(last)
	}
}

impl From<&LineChangeEvent> for LineEdit {
	fn from(event: &LineChangeEvent) -> Self {
		Self {
			first: to_index(event.first_line),
			last: event.last_line.map(to_index),
			lines: event.new_lines.clone(),
		}
	}
}

fn to_index(line: u64) -> usize {
	usize::try_from(line).unwrap_or(usize::MAX)
}

/// Replacement of the byte range `[start, end)` of a text by `text`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TextEdit {
	/// Start byte.
	pub start: usize,
	/// End byte, exclusive.
	pub end: usize,
	/// Inserted text.
	pub text: String,
}

/// Applies `edit` to a line vector. A buffer never has zero lines: removing
/// every line leaves one empty line.
pub fn apply_to_lines(lines: &mut Vec<String>, edit: &LineEdit) -> Result<(), SyncError> {
	let last = edit.check(lines.len())?;
	lines.splice(edit.first..last, edit.lines.iter().cloned());
	if lines.is_empty() {
		lines.push(String::new());
	}
	Ok(())
}

/// Expresses `edit` as a byte-range replacement on `lines.join("\n")`.
pub fn to_text_edit(lines: &[String], edit: &LineEdit) -> Result<TextEdit, SyncError> {
	let len = lines.len();
	let last = edit.check(len)?;

	// starts[i] is the byte offset of line i; starts[len] is one past the final newline.
	let mut starts = Vec::with_capacity(len + 1);
	let mut offset = 0;
	starts.push(0);
	for line in lines {
		offset += line.len() + 1;
		starts.push(offset);
	}
	let text_end = offset.saturating_sub(1);
	let joined = edit.lines.join("\n");

	let (start, end, text) = if last < len {
		let text = if edit.lines.is_empty() { String::new() } else { joined + "\n" };
		(starts[edit.first], starts[last], text)
	} else if edit.lines.is_empty() {
		// Removing through the end also removes the newline ending the kept part.
		let start = if edit.first == 0 { 0 } else { starts[edit.first] - 1 };
		(start, text_end, String::new())
	} else if edit.first == len {
		(text_end, text_end, format!("\n{joined}"))
	} else {
		(starts[edit.first], text_end, joined)
	};
	Ok(TextEdit { start, end, text })
}

/// Splits element text into lines the way the engine stores them.
pub fn split_lines(text: &str) -> Vec<String> {
	text.split('\n').map(str::to_owned).collect()
}
