//! The host application's text element.

use crate::ElementError;

/// Read/write access to the host's text element.
///
/// Offsets and lengths are in the element's own unit, see
/// [`OffsetEncoding`](crate::OffsetEncoding). All calls are synchronous and
/// may have visible side effects in the host UI.
pub trait TextElement: Send + 'static {
	/// Full text of the element.
	fn text(&mut self) -> Result<String, ElementError>;

	/// Current selection as `(start, length)`.
	fn selected_range(&mut self) -> Result<(usize, usize), ElementError>;

	/// Selects `length` units starting at `start`.
	fn set_selected_range(&mut self, start: usize, length: usize) -> Result<(), ElementError>;

	/// Replaces the current selection with `text`.
	fn replace_selected_range(&mut self, text: &str) -> Result<(), ElementError>;

	/// Replaces `length` units at `start` with `text`.
	fn replace_range(&mut self, start: usize, length: usize, text: &str) -> Result<(), ElementError> {
		self.set_selected_range(start, length)?;
		self.replace_selected_range(text)
	}
}
