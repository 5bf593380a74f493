//! Shared async building blocks.
//!
//! * [`spawn`]: task spawning tagged with a [`TaskClass`].
//! * [`Deferred`]: lazily-run, single-shot computations with combinators.
//! * [`AsyncLock`]: FIFO lock whose waiters queue instead of blocking a thread.

#![warn(missing_docs)]

mod class;
mod deferred;
mod lock;
mod spawn;

pub use class::TaskClass;
pub use deferred::Deferred;
pub use lock::{AsyncLock, LockGuard};
pub use spawn::{spawn, spawn_named};
