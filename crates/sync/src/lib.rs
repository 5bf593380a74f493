//! Bidirectional buffer and cursor synchronization.
//!
//! Two buffers hold the same document: the editing engine's and a host UI
//! text element's. Whichever side edits first owns the [`EditionToken`]; its
//! edits are propagated to the other side line range by line range. Once the
//! owner has been quiet for the debounce window, ownership is released and a
//! diff-based full resync ([`diff_lines`]) makes both sides identical again.
//!
//! * [`Synchronizer`] / [`SyncHandle`]: the actor and its command surface
//! * [`EditorEngine`] / [`TextElement`]: the two collaborators, with
//!   [`NvimEngine`] as the engine implementation
//! * [`SyncConfig`]: TOML-loadable settings

#![warn(missing_docs)]

mod config;
mod diff;
mod edit;
mod element;
mod engine;
mod error;
mod nvim;
mod position;
mod synchronizer;
mod token;

pub use config::SyncConfig;
pub use diff::{LineOp, diff_lines};
pub use edit::{LineEdit, TextEdit, apply_to_lines, split_lines, to_text_edit};
pub use element::TextElement;
pub use engine::{BufferEvents, EditorEngine};
pub use error::{ConfigError, ElementError, SyncError};
pub use nvim::NvimEngine;
pub use position::{BufferPosition, OffsetEncoding, Selection, TextIndex};
pub use synchronizer::{SyncHandle, SyncState, Synchronizer};
pub use tandem_api::{BufferHandle, LineChangeEvent};
pub use token::{EditionToken, Observation, Side, TokenState};

/// A convenient type alias for `Result` with `E` = [`SyncError`].
pub type Result<T, E = SyncError> = std::result::Result<T, E>;
