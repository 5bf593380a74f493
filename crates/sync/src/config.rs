//! Synchronizer configuration.

use std::path::Path;
use std::time::Duration;

use serde::Deserialize;

use crate::ConfigError;
use crate::position::OffsetEncoding;

/// Synchronizer settings, loadable from TOML:
///
/// ```toml
/// debounce_ms = 100
/// offset_encoding = "utf16"
/// sync_cursor = true
/// event_queue = 256
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct SyncConfig {
	/// Quiet period after the owner's last edit before ownership is released.
	pub debounce_ms: u64,
	/// Unit of the text element's offsets.
	pub offset_encoding: OffsetEncoding,
	/// Whether a release moves the subordinate's cursor to the owner's.
	pub sync_cursor: bool,
	/// Capacity of the synchronizer's command queue.
	pub event_queue: usize,
}

impl Default for SyncConfig {
	fn default() -> Self {
		Self {
			debounce_ms: 100,
			offset_encoding: OffsetEncoding::default(),
			sync_cursor: true,
			event_queue: 256,
		}
	}
}

impl SyncConfig {
	/// Parses and validates a TOML document.
	pub fn from_toml_str(input: &str) -> Result<Self, ConfigError> {
		let config: Self = toml::from_str(input)?;
		config.validate()
	}

	/// Loads configuration from a file.
	pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
		let path = path.as_ref();
		let content = std::fs::read_to_string(path).map_err(|error| ConfigError::Io {
			path: path.to_path_buf(),
			error,
		})?;
		Self::from_toml_str(&content)
	}

	/// Debounce window.
	pub const fn debounce(&self) -> Duration {
		Duration::from_millis(self.debounce_ms)
	}

	/// Sets the debounce window.
	pub fn with_debounce(mut self, window: Duration) -> Self {
		self.debounce_ms = u64::try_from(window.as_millis()).unwrap_or(u64::MAX);
		self
	}

	/// Sets the element offset unit.
	pub fn with_offset_encoding(mut self, encoding: OffsetEncoding) -> Self {
		self.offset_encoding = encoding;
		self
	}

	/// Enables or disables cursor synchronization.
	pub fn with_sync_cursor(mut self, enabled: bool) -> Self {
		self.sync_cursor = enabled;
		self
	}

	/// Sets the command queue capacity.
	pub fn with_event_queue(mut self, capacity: usize) -> Self {
		self.event_queue = capacity;
		self
	}

	fn validate(self) -> Result<Self, ConfigError> {
		if self.debounce_ms == 0 {
			return Err(ConfigError::Invalid {
				field: "debounce_ms",
				reason: "must be at least 1",
			});
		}
		if self.event_queue == 0 {
			return Err(ConfigError::Invalid {
				field: "event_queue",
				reason: "must be at least 1",
			});
		}
		Ok(self)
	}
}
