//! Non-blocking mutual exclusion with FIFO hand-off.

use std::collections::VecDeque;
use std::fmt;
use std::sync::Arc;

use parking_lot::Mutex;
use tokio::sync::oneshot;

#[derive(Default)]
struct LockState {
	held: bool,
	waiters: VecDeque<oneshot::Sender<()>>,
}

/// A lock that never parks a thread.
///
/// [`AsyncLock::acquire`] completes immediately when the lock is free and
/// otherwise enqueues the caller. Releasing hands the lock directly to the
/// oldest live waiter, so holders are served strictly in arrival order and a
/// late arrival can never barge ahead of a queued waiter.
#[derive(Clone, Default)]
pub struct AsyncLock {
	state: Arc<Mutex<LockState>>,
}

impl fmt::Debug for AsyncLock {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		let state = self.state.lock();
		f.debug_struct("AsyncLock")
			.field("held", &state.held)
			.field("waiters", &state.waiters.len())
			.finish()
	}
}

impl AsyncLock {
	/// Creates an unlocked lock.
	pub fn new() -> Self {
		Self::default()
	}

	/// Takes the lock if it is free.
	pub fn try_acquire(&self) -> Option<LockGuard> {
		let mut state = self.state.lock();
		if state.held {
			return None;
		}
		state.held = true;
		Some(LockGuard { lock: self.clone() })
	}

	/// Waits for the lock.
	///
	/// Cancel-safe: dropping the future while queued removes the waiter, and a
	/// hand-off that races with the drop is passed on to the next waiter.
	pub async fn acquire(&self) -> LockGuard {
		loop {
			let rx = {
				let mut state = self.state.lock();
				if !state.held {
					state.held = true;
					return LockGuard { lock: self.clone() };
				}
				let (tx, rx) = oneshot::channel();
				state.waiters.push_back(tx);
				rx
			};

			let mut waiting = Waiting { rx, lock: Some(self.clone()) };
			let granted = (&mut waiting.rx).await.is_ok();
			waiting.lock = None;
			if granted {
				return LockGuard { lock: self.clone() };
			}
		}
	}

	/// Returns `true` while some holder owns the lock.
	pub fn is_locked(&self) -> bool {
		self.state.lock().held
	}

	/// Number of queued waiters, including ones whose futures were dropped but
	/// not yet skipped by a release.
	pub fn waiters(&self) -> usize {
		self.state.lock().waiters.len()
	}

	fn release(&self) {
		let mut state = self.state.lock();
		while let Some(waiter) = state.waiters.pop_front() {
			if waiter.send(()).is_ok() {
				return;
			}
		}
		state.held = false;
	}
}

/// Ownership of an [`AsyncLock`]; released on drop.
#[must_use = "the lock is released as soon as the guard is dropped"]
pub struct LockGuard {
	lock: AsyncLock,
}

impl fmt::Debug for LockGuard {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.debug_struct("LockGuard").finish_non_exhaustive()
	}
}

impl Drop for LockGuard {
	fn drop(&mut self) {
		self.lock.release();
	}
}

/// Queued waiter; passes on a grant that arrives after the future was dropped.
struct Waiting {
	rx: oneshot::Receiver<()>,
	lock: Option<AsyncLock>,
}

impl Drop for Waiting {
	fn drop(&mut self) {
		if let Some(lock) = self.lock.take() {
			self.rx.close();
			if self.rx.try_recv().is_ok() {
				lock.release();
			}
		}
	}
}
