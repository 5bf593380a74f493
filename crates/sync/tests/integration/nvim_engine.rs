//! The Neovim adapter against a scripted peer.

use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;
use pretty_assertions::assert_eq;
use tandem_api::{BufferEvent, BufferHandle, Connection, Value};
use tandem_codec::{FrameDecoder, HandleKind, encode};
use tandem_rpc::{Message, Notification, Request, Response};
use tandem_sync::{BufferPosition, EditorEngine, LineEdit, LineOp, NvimEngine};
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

use crate::common::lines;

/// Scripted Neovim: answers every request through `reply` and forwards
/// queued notifications.
struct Peer {
	requests: Arc<Mutex<Vec<(String, Vec<Value>)>>>,
	notify: mpsc::UnboundedSender<Notification>,
	stop: CancellationToken,
}

impl Peer {
	fn requests(&self) -> Vec<(String, Vec<Value>)> {
		self.requests.lock().clone()
	}

	fn send(&self, method: &str, args: Vec<Value>) {
		self.notify
			.send(Notification {
				method: method.to_owned(),
				args,
			})
			.unwrap();
	}
}

fn reply(request: &Request) -> Value {
	match request.method.as_str() {
		"nvim_buf_attach" => Value::from(true),
		"nvim_get_current_win" => Value::Handle(HandleKind::Window, 1000),
		"nvim_win_get_cursor" => Value::Array(vec![Value::from(2u64), Value::from(0u64)]),
		"nvim_buf_get_lines" => Value::from(lines(&["one", "two"])),
		"nvim_buf_get_changedtick" => Value::from(42u64),
		_ => Value::Nil,
	}
}

fn connect() -> (NvimEngine, Connection, Peer) {
	let _ = tracing_subscriber::fmt::try_init();
	let (local, remote) = tokio::io::duplex(64 * 1024);
	let (reader, writer) = tokio::io::split(local);
	let connection = Connection::spawn(reader, writer);
	let engine = NvimEngine::from_connection(&connection);

	let requests = Arc::new(Mutex::new(Vec::new()));
	let (notify, mut notify_rx) = mpsc::unbounded_channel::<Notification>();
	let stop = CancellationToken::new();
	let log = requests.clone();
	let token = stop.clone();
	tokio::spawn(async move {
		let (mut reader, mut writer) = tokio::io::split(remote);
		let mut decoder = FrameDecoder::new();
		let mut chunk = [0u8; 4096];
		loop {
			tokio::select! {
				() = token.cancelled() => break,
				read = reader.read(&mut chunk) => {
					let n = match read {
						Ok(0) | Err(_) => break,
						Ok(n) => n,
					};
					decoder.feed(&chunk[..n]);
					while let Some(value) = decoder.next_value().unwrap() {
						let Message::Request(request) = Message::from_value(value).unwrap() else {
							continue;
						};
						let result = Ok(reply(&request));
						log.lock().push((request.method.clone(), request.args.clone()));
						let bytes = encode(&Message::Response(Response { id: request.id, result }).to_value());
						writer.write_all(&bytes).await.unwrap();
					}
				}
				Some(notification) = notify_rx.recv() => {
					writer.write_all(&encode(&Message::Notification(notification).to_value())).await.unwrap();
				}
			}
		}
	});

	(engine, connection, Peer { requests, notify, stop })
}

fn lines_event(buffer: u64, first: i64, last: i64, new_lines: &[&str], more: bool) -> Vec<Value> {
	vec![
		Value::Handle(HandleKind::Buffer, buffer),
		Value::from(12u64),
		Value::from(first),
		Value::from(last),
		Value::from(lines(new_lines)),
		Value::from(more),
	]
}

#[tokio::test(flavor = "current_thread")]
async fn attached_stream_carries_only_its_buffer() {
	let (engine, _connection, peer) = connect();
	let mut events = engine.attach(BufferHandle(3), false).await.unwrap();
	assert_eq!(
		peer.requests(),
		[(
			"nvim_buf_attach".to_owned(),
			vec![Value::Handle(HandleKind::Buffer, 3), Value::from(false), Value::Map(vec![])]
		)]
	);

	peer.send(BufferEvent::LINES, lines_event(4, 0, 1, &["elsewhere"], false));
	peer.send(BufferEvent::LINES, lines_event(3, 1, -1, &["x"], true));
	let event = tokio::time::timeout(Duration::from_secs(1), events.recv()).await.unwrap().unwrap();
	assert_eq!(event.buffer, BufferHandle(3));
	assert_eq!(event.first_line, 1);
	assert_eq!(event.last_line, None);
	assert_eq!(event.new_lines, ["x"]);
	assert!(event.more_coming);

	peer.send(BufferEvent::DETACH, vec![Value::Handle(HandleKind::Buffer, 3)]);
	let end = tokio::time::timeout(Duration::from_secs(1), events.recv()).await.unwrap();
	assert!(end.is_none());
}

#[tokio::test(flavor = "current_thread")]
async fn line_writes_are_strict_and_report_the_change_tick() {
	let (engine, _connection, peer) = connect();
	let buffer = BufferHandle(3);
	let edit = LineEdit {
		first: 2,
		last: None,
		lines: lines(&["x"]),
	};
	assert_eq!(engine.set_lines(buffer, edit).await.unwrap(), Some(42));
	let tick = engine
		.replace_ranges(
			buffer,
			vec![
				LineOp {
					start: 0,
					end: 1,
					lines: vec![],
				},
				LineOp {
					start: 4,
					end: 4,
					lines: lines(&["y"]),
				},
			],
		)
		.await
		.unwrap();
	assert_eq!(tick, Some(42));
	assert_eq!(engine.buffer_lines(buffer).await.unwrap(), ["one", "two"]);

	let handle = Value::Handle(HandleKind::Buffer, 3);
	let set = |start: i64, end: i64, new_lines: &[&str]| {
		(
			"nvim_buf_set_lines".to_owned(),
			vec![handle.clone(), Value::from(start), Value::from(end), Value::from(true), Value::from(lines(new_lines))],
		)
	};
	let tick = ("nvim_buf_get_changedtick".to_owned(), vec![handle.clone()]);
	assert_eq!(
		peer.requests(),
		[
			set(2, -1, &["x"]),
			tick.clone(),
			set(0, 1, &[]),
			set(4, 4, &["y"]),
			tick,
			(
				"nvim_buf_get_lines".to_owned(),
				vec![handle.clone(), Value::from(0i64), Value::from(-1i64), Value::from(false)]
			),
		]
	);
}

#[tokio::test(flavor = "current_thread")]
async fn cursor_columns_become_one_based() {
	let (engine, _connection, peer) = connect();
	let buffer = BufferHandle(3);

	assert_eq!(engine.cursor(buffer).await.unwrap(), BufferPosition::new(2, 1));
	engine.set_cursor(buffer, BufferPosition::new(3, 5)).await.unwrap();

	assert_eq!(
		peer.requests(),
		[
			("nvim_get_current_win".to_owned(), vec![]),
			("nvim_win_get_cursor".to_owned(), vec![Value::Handle(HandleKind::Window, 1000)]),
			(
				"nvim_win_set_cursor".to_owned(),
				vec![
					Value::Handle(HandleKind::Window, 0),
					Value::Array(vec![Value::from(3u64), Value::from(4u64)])
				]
			),
		]
	);
}

#[tokio::test(flavor = "current_thread")]
async fn closed_resolves_when_the_peer_goes_away() {
	let (engine, _connection, peer) = connect();
	let closed = engine.closed();

	peer.stop.cancel();
	tokio::time::timeout(Duration::from_secs(1), closed).await.unwrap();
	assert!(engine.current_buffer().await.unwrap_err().is_closed());
}
