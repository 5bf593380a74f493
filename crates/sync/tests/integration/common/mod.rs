//! In-memory engine and element for synchronizer tests.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use futures::FutureExt;
use futures::future::BoxFuture;
use parking_lot::Mutex;
use tandem_api::{ApiError, BufferHandle, LineChangeEvent, RemoteError, RemoteErrorKind, RequestError};
use tandem_sync::{BufferEvents, BufferPosition, EditorEngine, ElementError, LineEdit, LineOp, SyncConfig, SyncHandle, Synchronizer, TextElement, apply_to_lines};
use tokio::sync::mpsc;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;

pub const BUFFER: BufferHandle = BufferHandle(7);

pub fn lines(items: &[&str]) -> Vec<String> {
	items.iter().map(|s| (*s).to_owned()).collect()
}

/// Engine double holding a single buffer.
#[derive(Debug)]
pub struct FakeEngine {
	lines: Mutex<Vec<String>>,
	cursor: Mutex<BufferPosition>,
	events: Mutex<Option<mpsc::UnboundedSender<LineChangeEvent>>>,
	closed: CancellationToken,
	/// Methods called by the synchronizer, in order.
	calls: Mutex<Vec<&'static str>>,
	/// Instants at which the buffer content was read back.
	pub reads: Mutex<Vec<Instant>>,
	/// Makes the next `set_lines` fail with a validation error.
	pub reject_next_edit: Mutex<bool>,
	/// Makes writes notify their own line events, as Neovim does.
	pub echo: Mutex<bool>,
	tick: Mutex<u64>,
}

impl FakeEngine {
	pub fn new(content: &[&str]) -> Arc<Self> {
		Arc::new(Self {
			lines: Mutex::new(lines(content)),
			cursor: Mutex::new(BufferPosition::START),
			events: Mutex::new(None),
			closed: CancellationToken::new(),
			calls: Mutex::new(Vec::new()),
			reads: Mutex::new(Vec::new()),
			reject_next_edit: Mutex::new(false),
			echo: Mutex::new(false),
			tick: Mutex::new(1),
		})
	}

	pub fn lines(&self) -> Vec<String> {
		self.lines.lock().clone()
	}

	pub fn set_content(&self, content: &[&str]) {
		*self.lines.lock() = lines(content);
	}

	pub fn place_cursor(&self, line: u64, column: u64) {
		*self.cursor.lock() = BufferPosition::new(line, column);
	}

	pub fn cursor_position(&self) -> BufferPosition {
		*self.cursor.lock()
	}

	pub fn calls(&self) -> Vec<&'static str> {
		self.calls.lock().clone()
	}

	/// Edits the buffer as a user of the engine would, and notifies.
	pub fn edit(&self, first: u64, last: u64, new_lines: &[&str], more_coming: bool) {
		let edit = LineEdit::new(first as usize, last as usize, lines(new_lines));
		apply_to_lines(&mut self.lines.lock(), &edit).unwrap();
		self.notify(first, Some(last), new_lines, more_coming);
	}

	/// Sends a line event without touching the buffer.
	pub fn notify(&self, first: u64, last: Option<u64>, new_lines: &[&str], more_coming: bool) {
		let event = LineChangeEvent {
			buffer: BUFFER,
			change_tick: Some(self.bump()),
			first_line: first,
			last_line: last,
			new_lines: lines(new_lines),
			more_coming,
		};
		self.send(event);
	}

	pub fn send(&self, event: LineChangeEvent) {
		if let Some(tx) = &*self.events.lock() {
			tx.send(event).unwrap();
		}
	}

	/// Ends the event stream as a buffer detach does.
	pub fn detach(&self) {
		self.events.lock().take();
	}

	/// Ends the session.
	pub fn close(&self) {
		self.closed.cancel();
	}

	fn bump(&self) -> u64 {
		let mut tick = self.tick.lock();
		*tick += 1;
		*tick
	}

	fn record(&self, method: &'static str) {
		self.calls.lock().push(method);
	}

	fn check_open(&self) -> Result<(), ApiError> {
		if self.closed.is_cancelled() {
			return Err(ApiError::Transport(RequestError::SessionClosed));
		}
		Ok(())
	}
}

#[async_trait]
impl EditorEngine for FakeEngine {
	async fn current_buffer(&self) -> Result<BufferHandle, ApiError> {
		self.check_open()?;
		Ok(BUFFER)
	}

	async fn attach(&self, buffer: BufferHandle, send_buffer: bool) -> Result<BufferEvents, ApiError> {
		assert_eq!(buffer, BUFFER);
		assert!(!send_buffer);
		self.check_open()?;
		let (tx, rx) = mpsc::unbounded_channel();
		*self.events.lock() = Some(tx);
		Ok(BufferEvents::new(rx))
	}

	async fn buffer_lines(&self, _buffer: BufferHandle) -> Result<Vec<String>, ApiError> {
		self.check_open()?;
		self.reads.lock().push(Instant::now());
		Ok(self.lines())
	}

	async fn set_lines(&self, _buffer: BufferHandle, edit: LineEdit) -> Result<Option<u64>, ApiError> {
		self.check_open()?;
		self.record("set_lines");
		if std::mem::take(&mut *self.reject_next_edit.lock()) {
			return Err(ApiError::Remote(RemoteError {
				kind: RemoteErrorKind::Validation,
				message: "Index out of bounds".into(),
			}));
		}
		apply_to_lines(&mut self.lines.lock(), &edit).map_err(|err| ApiError::Remote(RemoteError {
			kind: RemoteErrorKind::Validation,
			message: err.to_string(),
		}))?;
		let tick = self.bump();
		if *self.echo.lock() {
			self.send(LineChangeEvent {
				buffer: BUFFER,
				change_tick: Some(tick),
				first_line: edit.first as u64,
				last_line: edit.last.map(|last| last as u64),
				new_lines: edit.lines,
				more_coming: false,
			});
		}
		Ok(Some(tick))
	}

	async fn replace_ranges(&self, buffer: BufferHandle, ops: Vec<LineOp>) -> Result<Option<u64>, ApiError> {
		self.record("replace_ranges");
		let mut tick = None;
		for op in ops {
			tick = self.set_lines(buffer, op.into()).await?;
		}
		Ok(tick)
	}

	async fn cursor(&self, _buffer: BufferHandle) -> Result<BufferPosition, ApiError> {
		self.check_open()?;
		self.record("cursor");
		Ok(self.cursor_position())
	}

	async fn set_cursor(&self, _buffer: BufferHandle, pos: BufferPosition) -> Result<(), ApiError> {
		self.check_open()?;
		self.record("set_cursor");
		*self.cursor.lock() = pos;
		Ok(())
	}

	fn closed(&self) -> BoxFuture<'static, ()> {
		self.closed.clone().cancelled_owned().boxed()
	}
}

#[derive(Debug, Default)]
struct ElementState {
	text: String,
	selection: (usize, usize),
	broken: bool,
}

/// Text element double with UTF-16 offsets. Clones share state.
#[derive(Debug, Clone, Default)]
pub struct FakeElement {
	state: Arc<Mutex<ElementState>>,
}

impl FakeElement {
	pub fn new(content: &[&str]) -> Self {
		let element = Self::default();
		element.type_text(&content.join("\n"));
		element
	}

	pub fn text_now(&self) -> String {
		self.state.lock().text.clone()
	}

	pub fn lines_now(&self) -> Vec<String> {
		self.text_now().split('\n').map(str::to_owned).collect()
	}

	pub fn selection(&self) -> (usize, usize) {
		self.state.lock().selection
	}

	pub fn select(&self, start: usize, length: usize) {
		self.state.lock().selection = (start, length);
	}

	/// Replaces the whole text as a host user would.
	pub fn type_text(&self, text: &str) {
		self.state.lock().text = text.to_owned();
	}

	/// Makes every call fail until repaired.
	pub fn set_broken(&self, broken: bool) {
		self.state.lock().broken = broken;
	}

	fn with<R>(&self, f: impl FnOnce(&mut ElementState) -> R) -> Result<R, ElementError> {
		let mut state = self.state.lock();
		if state.broken {
			return Err(ElementError::Unavailable);
		}
		Ok(f(&mut state))
	}
}

fn byte_at(text: &str, units: usize) -> usize {
	let mut count = 0;
	for (i, c) in text.char_indices() {
		if count >= units {
			return i;
		}
		count += c.len_utf16();
	}
	text.len()
}

impl TextElement for FakeElement {
	fn text(&mut self) -> Result<String, ElementError> {
		self.with(|s| s.text.clone())
	}

	fn selected_range(&mut self) -> Result<(usize, usize), ElementError> {
		self.with(|s| s.selection)
	}

	fn set_selected_range(&mut self, start: usize, length: usize) -> Result<(), ElementError> {
		self.with(|s| s.selection = (start, length))
	}

	fn replace_selected_range(&mut self, text: &str) -> Result<(), ElementError> {
		self.with(|s| {
			let (start, length) = s.selection;
			let from = byte_at(&s.text, start);
			let to = byte_at(&s.text, start + length);
			s.text.replace_range(from..to, text);
			s.selection = (start + text.encode_utf16().count(), 0);
		})
	}
}

/// Starts a synchronizer over fresh doubles.
pub async fn start(engine_text: &[&str], element_text: &[&str], config: SyncConfig) -> (Arc<FakeEngine>, FakeElement, SyncHandle) {
	let _ = tracing_subscriber::fmt::try_init();
	let engine = FakeEngine::new(engine_text);
	let element = FakeElement::new(element_text);
	let handle = Synchronizer::start(engine.clone(), element.clone(), BufferHandle::CURRENT, config).await.unwrap();
	(engine, element, handle)
}

/// Lets the synchronizer drain its queues. Under a paused clock this advances
/// time by one millisecond.
pub async fn settle() {
	tokio::time::sleep(Duration::from_millis(1)).await;
}
