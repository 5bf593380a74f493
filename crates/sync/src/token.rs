//! Edition token: which side is the source of truth right now.

use std::fmt;
use std::time::Duration;

use tokio::time::Instant;
use tracing::debug;

/// One of the two synchronized buffers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Side {
	/// The editing engine's buffer.
	Engine,
	/// The host application's text element.
	Element,
}

impl Side {
	/// The opposite side.
	pub const fn other(self) -> Self {
		match self {
			Self::Engine => Self::Element,
			Self::Element => Self::Engine,
		}
	}
}

impl fmt::Display for Side {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.write_str(match self {
			Self::Engine => "engine",
			Self::Element => "element",
		})
	}
}

/// Token state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TokenState {
	/// Nobody edits; the next edit takes ownership.
	Idle,
	/// `main` is authoritative until `deadline` passes without a new edit from it.
	Owned {
		/// Owning side.
		main: Side,
		/// Release deadline.
		deadline: Instant,
	},
	/// Terminal: the session ended.
	Disabled,
}

/// What an observed edit did to the token.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Observation {
	/// The side took ownership from idle.
	Acquired,
	/// The owner edited again; its deadline moved.
	Refreshed,
	/// The edit came from the subordinate side (or the token is disabled) and must be dropped.
	Ignored,
}

impl Observation {
	/// Returns `true` when the edit must be propagated.
	pub const fn propagates(self) -> bool {
		!matches!(self, Self::Ignored)
	}
}

/// Exclusive, time-bounded ownership marker.
#[derive(Debug, Clone)]
pub struct EditionToken {
	state: TokenState,
	window: Duration,
}

impl EditionToken {
	/// An idle token whose ownership lasts `window` past the owner's last edit.
	pub const fn new(window: Duration) -> Self {
		Self {
			state: TokenState::Idle,
			window,
		}
	}

	/// Current state.
	pub const fn state(&self) -> TokenState {
		self.state
	}

	/// Owning side, if any.
	pub const fn main(&self) -> Option<Side> {
		match self.state {
			TokenState::Owned { main, .. } => Some(main),
			_ => None,
		}
	}

	/// Release deadline while owned.
	pub const fn deadline(&self) -> Option<Instant> {
		match self.state {
			TokenState::Owned { deadline, .. } => Some(deadline),
			_ => None,
		}
	}

	/// Returns `true` once disabled.
	pub const fn is_disabled(&self) -> bool {
		matches!(self.state, TokenState::Disabled)
	}

	/// Records an edit from `side` at `now`.
	pub fn observe(&mut self, side: Side, now: Instant) -> Observation {
		match self.state {
			TokenState::Idle => {
				self.state = TokenState::Owned {
					main: side,
					deadline: now + self.window,
				};
				debug!(main = %side, "sync.token.acquire");
				Observation::Acquired
			}
			TokenState::Owned { main, .. } if main == side => {
				self.state = TokenState::Owned {
					main,
					deadline: now + self.window,
				};
				Observation::Refreshed
			}
			TokenState::Owned { .. } | TokenState::Disabled => Observation::Ignored,
		}
	}

	/// Moves the deadline of an owned token to `now + window` without an edit.
	pub fn extend(&mut self, now: Instant) {
		if let TokenState::Owned { main, .. } = self.state {
			self.state = TokenState::Owned {
				main,
				deadline: now + self.window,
			};
		}
	}

	/// Releases the token if its deadline passed; returns the previous owner.
	pub fn expire(&mut self, now: Instant) -> Option<Side> {
		match self.state {
			TokenState::Owned { deadline, .. } if deadline <= now => self.release(),
			_ => None,
		}
	}

	/// Releases the token unconditionally; returns the previous owner.
	pub fn release(&mut self) -> Option<Side> {
		let main = self.main()?;
		self.state = TokenState::Idle;
		debug!(main = %main, "sync.token.release");
		Some(main)
	}

	/// Enters the terminal state.
	pub fn disable(&mut self) {
		if !self.is_disabled() {
			debug!("sync.token.disable");
			self.state = TokenState::Disabled;
		}
	}
}
