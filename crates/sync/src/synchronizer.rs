//! Ownership state machine reconciling the engine buffer with the host element.
//!
//! The synchronizer is an actor: the token, the dirty flag and the debounce
//! timer are owned by its task and only change through [`SyncHandle`]
//! commands, engine events and the timer, all handled one at a time.

use std::pin::Pin;
use std::sync::Arc;

use futures::future::BoxFuture;
use tandem_api::{BufferHandle, LineChangeEvent};
use tandem_worker::{TaskClass, spawn_named};
use tokio::sync::{mpsc, oneshot};
use tokio::time::{Instant, Sleep};
use tracing::{debug, trace, warn};

use crate::config::SyncConfig;
use crate::diff::diff_lines;
use crate::edit::{LineEdit, apply_to_lines, split_lines, to_text_edit};
use crate::element::TextElement;
use crate::engine::{BufferEvents, EditorEngine};
use crate::position::{Selection, TextIndex};
use crate::token::{EditionToken, Side};
use crate::{Result, SyncError};

/// Snapshot of the synchronizer's state.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SyncState {
	/// The synchronized engine buffer.
	pub buffer: BufferHandle,
	/// Current owner, if any.
	pub main: Option<Side>,
	/// Terminal state reached.
	pub disabled: bool,
	/// A partial update failed; the next settled owner edit forces a full resync.
	pub dirty: bool,
	/// Cursor synchronization is suspended.
	pub frozen: bool,
	/// The engine is in the middle of a batched change.
	pub settling: bool,
	/// Full resynchronizations run so far.
	pub resyncs: u64,
}

/// Commands for the synchronizer actor.
#[derive(Debug)]
enum SyncCmd {
	ElementChanged {
		edit: Option<LineEdit>,
		reply: oneshot::Sender<Result<()>>,
	},
	SetFrozen {
		frozen: bool,
		reply: oneshot::Sender<Result<()>>,
	},
	ForceResync {
		owner: Option<Side>,
		reply: oneshot::Sender<Result<()>>,
	},
	State {
		reply: oneshot::Sender<SyncState>,
	},
	Shutdown {
		reply: oneshot::Sender<()>,
	},
}

/// Handle for communicating with a running [`Synchronizer`].
#[derive(Clone, Debug)]
pub struct SyncHandle {
	tx: mpsc::Sender<SyncCmd>,
}

impl SyncHandle {
	/// Reports an edit made in the host element.
	///
	/// With line detail the edit is forwarded to the engine right away while
	/// the element owns the document; without it the change is picked up by
	/// the full resync when ownership is released. Edits made while the engine
	/// owns the document are dropped. After a failed partial update any edit
	/// releases ownership at once and resyncs from the element.
	pub async fn element_changed(&self, edit: Option<LineEdit>) -> Result<()> {
		let (reply, rx) = oneshot::channel();
		self.send(SyncCmd::ElementChanged { edit, reply }).await?;
		rx.await.map_err(|_| SyncError::Stopped)?
	}

	/// Suspends or resumes cursor synchronization.
	pub async fn set_frozen(&self, frozen: bool) -> Result<()> {
		let (reply, rx) = oneshot::channel();
		self.send(SyncCmd::SetFrozen { frozen, reply }).await?;
		rx.await.map_err(|_| SyncError::Stopped)?
	}

	/// Releases ownership and runs a full resync from `owner`; defaults to the
	/// current owner, or the engine when idle.
	pub async fn force_resync(&self, owner: Option<Side>) -> Result<()> {
		let (reply, rx) = oneshot::channel();
		self.send(SyncCmd::ForceResync { owner, reply }).await?;
		rx.await.map_err(|_| SyncError::Stopped)?
	}

	/// Current state.
	pub async fn state(&self) -> Result<SyncState> {
		let (reply, rx) = oneshot::channel();
		self.send(SyncCmd::State { reply }).await?;
		rx.await.map_err(|_| SyncError::Stopped)
	}

	/// Stops the synchronizer.
	pub async fn shutdown(&self) {
		let (reply, rx) = oneshot::channel();
		if self.send(SyncCmd::Shutdown { reply }).await.is_ok() {
			let _ = rx.await;
		}
	}

	async fn send(&self, cmd: SyncCmd) -> Result<()> {
		self.tx.send(cmd).await.map_err(|_| SyncError::Stopped)
	}
}

/// Keeps one engine buffer and one host text element consistent.
pub struct Synchronizer<E, T> {
	engine: Arc<E>,
	element: T,
	config: SyncConfig,
	buffer: BufferHandle,
	token: EditionToken,
	dirty: bool,
	frozen: bool,
	settling: bool,
	resyncs: u64,
	/// Change tick reached by our own writes to the buffer.
	written_tick: Option<u64>,
	rx: mpsc::Receiver<SyncCmd>,
	events: BufferEvents,
	timer: Pin<Box<Sleep>>,
	engine_closed: BoxFuture<'static, ()>,
}

impl<E, T> Synchronizer<E, T>
where
	E: EditorEngine,
	T: TextElement,
{
	/// Attaches to `buffer` (`0` for the engine's current buffer) and spawns
	/// the synchronizer task.
	pub async fn start(engine: Arc<E>, element: T, buffer: BufferHandle, config: SyncConfig) -> Result<SyncHandle> {
		let buffer = if buffer.is_current() { engine.current_buffer().await? } else { buffer };
		let events = engine.attach(buffer, false).await?;
		let (tx, rx) = mpsc::channel(config.event_queue.max(1));

		let sync = Self {
			engine_closed: engine.closed(),
			engine,
			element,
			token: EditionToken::new(config.debounce()),
			config,
			buffer,
			dirty: false,
			frozen: false,
			settling: false,
			resyncs: 0,
			written_tick: None,
			rx,
			events,
			timer: Box::pin(tokio::time::sleep_until(Instant::now())),
		};
		debug!(buffer = buffer.0, "sync.start");
		spawn_named(TaskClass::Interactive, "sync.synchronizer", sync.run());
		Ok(SyncHandle { tx })
	}

	async fn run(mut self) {
		loop {
			let live = !self.token.is_disabled();
			let armed = self.token.deadline().is_some();
			tokio::select! {
				biased;
				cmd = self.rx.recv() => {
					let Some(cmd) = cmd else {
						break;
					};
					if !self.handle(cmd).await {
						break;
					}
				}
				event = self.events.recv(), if live => match event {
					Some(event) => self.on_engine_event(event).await,
					None => self.disable("buffer detached"),
				},
				() = &mut self.timer, if live && armed => self.on_deadline().await,
				() = &mut self.engine_closed, if live => self.disable("engine closed"),
			}
		}
		debug!(buffer = self.buffer.0, "sync.stop");
	}

	/// Returns `false` when the actor must stop.
	async fn handle(&mut self, cmd: SyncCmd) -> bool {
		match cmd {
			SyncCmd::ElementChanged { edit, reply } => {
				let result = self.on_element_change(edit).await;
				let _ = reply.send(result);
			}
			SyncCmd::SetFrozen { frozen, reply } => {
				let result = if self.token.is_disabled() {
					Err(SyncError::Disabled)
				} else {
					self.frozen = frozen;
					Ok(())
				};
				let _ = reply.send(result);
			}
			SyncCmd::ForceResync { owner, reply } => {
				let result = if self.token.is_disabled() {
					Err(SyncError::Disabled)
				} else {
					let owner = owner.or(self.token.main()).unwrap_or(Side::Engine);
					self.token.release();
					self.resync(owner).await;
					if self.token.is_disabled() { Err(SyncError::Disabled) } else { Ok(()) }
				};
				let _ = reply.send(result);
			}
			SyncCmd::State { reply } => {
				let _ = reply.send(self.snapshot());
			}
			SyncCmd::Shutdown { reply } => {
				let _ = reply.send(());
				return false;
			}
		}
		true
	}

	async fn on_element_change(&mut self, edit: Option<LineEdit>) -> Result<()> {
		if self.token.is_disabled() {
			return Err(SyncError::Disabled);
		}
		if !self.token.observe(Side::Element, Instant::now()).propagates() {
			trace!(side = %Side::Element, "sync.edit.dropped");
			return Ok(());
		}
		self.arm();

		if self.dirty {
			self.release_now().await;
			return if self.token.is_disabled() { Err(SyncError::Disabled) } else { Ok(()) };
		}
		let Some(edit) = edit else {
			return Ok(());
		};
		match self.engine.set_lines(self.buffer, edit).await {
			Ok(tick) => {
				self.wrote(tick);
				Ok(())
			}
			Err(err) if err.is_closed() => {
				self.disable("engine closed");
				Err(SyncError::Disabled)
			}
			Err(err) => {
				self.mark_dirty(&err.into());
				self.release_now().await;
				Ok(())
			}
		}
	}

	async fn on_engine_event(&mut self, event: LineChangeEvent) {
		if event.buffer != self.buffer {
			return;
		}
		if let (Some(tick), Some(written)) = (event.change_tick, self.written_tick)
			&& tick <= written
		{
			trace!(tick, "sync.edit.echo");
			return;
		}
		if !self.token.observe(Side::Engine, Instant::now()).propagates() {
			trace!(side = %Side::Engine, "sync.edit.dropped");
			return;
		}
		self.settling = event.more_coming;
		self.arm();

		if !self.dirty
			&& let Err(err) = self.apply_to_element(&LineEdit::from(&event))
		{
			self.mark_dirty(&err);
		}
		if self.dirty && !event.more_coming {
			self.release_now().await;
		}
	}

	async fn on_deadline(&mut self) {
		let now = Instant::now();
		if self.settling && self.token.main() == Some(Side::Engine) {
			debug!("sync.release.postponed");
			self.token.extend(now);
			self.arm();
			return;
		}
		if let Some(main) = self.token.expire(now) {
			self.resync(main).await;
		}
	}

	/// Releases ownership ahead of the deadline and resyncs from the owner.
	async fn release_now(&mut self) {
		if let Some(main) = self.token.release() {
			self.resync(main).await;
		}
	}

	async fn resync(&mut self, main: Side) {
		self.resyncs += 1;
		self.settling = false;
		match self.full_resync(main).await {
			Ok(()) => self.dirty = false,
			Err(SyncError::Engine(err)) if err.is_closed() => self.disable("engine closed"),
			Err(err) => {
				warn!(main = %main, error = %err, "sync.resync.failed");
				self.dirty = true;
			}
		}
	}

	async fn full_resync(&mut self, main: Side) -> Result<()> {
		let engine_lines = self.engine.buffer_lines(self.buffer).await?;
		let text = self.element.text()?;
		let element_lines = split_lines(&text);
		let encoding = self.config.offset_encoding;

		match main {
			Side::Engine => {
				let ops = diff_lines(&element_lines, &engine_lines);
				debug!(main = %main, ops = ops.len(), "sync.resync");
				let mut lines = element_lines;
				for op in ops {
					let edit = LineEdit::from(op);
					self.replace_in_element(&lines, &edit)?;
					apply_to_lines(&mut lines, &edit)?;
				}
				if self.cursor_sync() {
					let caret = Selection::caret(self.engine.cursor(self.buffer).await?);
					let index = TextIndex::new(&lines.join("\n"));
					let (start, length) = index.range_of(caret, encoding).unwrap_or((index.len(encoding), 0));
					self.element.set_selected_range(start, length)?;
				}
			}
			Side::Element => {
				let ops = diff_lines(&engine_lines, &element_lines);
				debug!(main = %main, ops = ops.len(), "sync.resync");
				if !ops.is_empty() {
					let tick = self.engine.replace_ranges(self.buffer, ops).await?;
					self.wrote(tick);
				}
				if self.cursor_sync() {
					let (start, length) = self.element.selected_range()?;
					let selection = TextIndex::new(&text)
						.selection_of(start, length, encoding)
						.ok_or(SyncError::InvalidOffset(start.saturating_add(length)))?;
					self.engine.set_cursor(self.buffer, selection.start()).await?;
				}
			}
		}
		Ok(())
	}

	/// Applies an engine-side line edit to the element.
	fn apply_to_element(&mut self, edit: &LineEdit) -> Result<()> {
		let text = self.element.text()?;
		self.replace_in_element(&split_lines(&text), edit)
	}

	fn replace_in_element(&mut self, lines: &[String], edit: &LineEdit) -> Result<()> {
		let change = to_text_edit(lines, edit)?;
		let index = TextIndex::new(&lines.join("\n"));
		let encoding = self.config.offset_encoding;
		let start = index.encode(change.start, encoding);
		let end = index.encode(change.end, encoding);
		self.element.replace_range(start, end - start, &change.text)?;
		Ok(())
	}

	fn wrote(&mut self, tick: Option<u64>) {
		self.written_tick = self.written_tick.max(tick);
	}

	fn cursor_sync(&self) -> bool {
		if self.frozen {
			debug!("sync.cursor.frozen");
		}
		self.config.sync_cursor && !self.frozen
	}

	fn mark_dirty(&mut self, err: &SyncError) {
		warn!(error = %err, "sync.partial.failed");
		self.dirty = true;
	}

	fn arm(&mut self) {
		if let Some(deadline) = self.token.deadline() {
			self.timer.as_mut().reset(deadline);
		}
	}

	fn disable(&mut self, reason: &'static str) {
		if !self.token.is_disabled() {
			warn!(buffer = self.buffer.0, reason, "sync.disabled");
		}
		self.token.disable();
		self.settling = false;
	}

	fn snapshot(&self) -> SyncState {
		SyncState {
			buffer: self.buffer,
			main: self.token.main(),
			disabled: self.token.is_disabled(),
			dirty: self.dirty,
			frozen: self.frozen,
			settling: self.settling,
			resyncs: self.resyncs,
		}
	}
}
