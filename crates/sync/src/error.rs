use std::path::PathBuf;

use tandem_api::ApiError;

/// Failures of the host text element.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ElementError {
	/// The element went away or cannot be reached.
	#[error("text element unavailable")]
	Unavailable,
	/// The element refused a read or write.
	#[error("text element rejected the operation: {0}")]
	Rejected(String),
}

/// Synchronization errors.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum SyncError {
	/// A line range does not fit the buffer it is applied to.
	#[error("line range {first}..{last} out of bounds for {len} lines")]
	OutOfBounds {
		/// First replaced line.
		first: usize,
		/// End of the replaced range.
		last: usize,
		/// Lines in the buffer.
		len: usize,
	},
	/// An element offset does not fall inside its text.
	#[error("offset {0} out of bounds")]
	InvalidOffset(usize),
	/// The host text element failed.
	#[error(transparent)]
	Element(#[from] ElementError),
	/// The editing engine failed.
	#[error("engine: {0}")]
	Engine(#[from] ApiError),
	/// The engine session closed or the buffer detached; synchronization stopped for good.
	#[error("synchronization disabled")]
	Disabled,
	/// The synchronizer task is gone.
	#[error("synchronizer stopped")]
	Stopped,
}

/// Configuration errors.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
	/// Error reading a configuration file.
	#[error("I/O error reading {path}: {error}")]
	Io {
		/// Path to the file that failed to read.
		path: PathBuf,
		/// The underlying I/O error.
		error: std::io::Error,
	},
	/// Error parsing TOML.
	#[error("TOML parse error: {0}")]
	Parse(#[from] toml::de::Error),
	/// A value is out of range.
	#[error("invalid {field}: {reason}")]
	Invalid {
		/// Offending field.
		field: &'static str,
		/// What is wrong with it.
		reason: &'static str,
	},
}
