//! Ownership and propagation between the engine and the element.

use std::time::Duration;

use pretty_assertions::assert_eq;
use tandem_sync::{BufferPosition, LineEdit, Side, SyncConfig};
use tokio::time::sleep;

use crate::common::{BUFFER, lines, settle, start};

#[tokio::test(flavor = "current_thread", start_paused = true)]
async fn current_buffer_is_resolved_on_start() {
	let (_engine, _element, sync) = start(&["a"], &["a"], SyncConfig::default()).await;
	let state = sync.state().await.unwrap();
	assert_eq!(state.buffer, BUFFER);
	assert_eq!(state.main, None);
	assert!(!state.disabled);
}

#[tokio::test(flavor = "current_thread", start_paused = true)]
async fn engine_edit_reaches_the_element_in_place() {
	let (engine, element, sync) = start(&["a", "b", "c"], &["a", "b", "c"], SyncConfig::default()).await;

	engine.edit(1, 2, &["B"], false);
	settle().await;

	assert_eq!(element.text_now(), "a\nB\nc");
	let state = sync.state().await.unwrap();
	assert_eq!(state.main, Some(Side::Engine));
	assert_eq!(state.resyncs, 0);
}

#[tokio::test(flavor = "current_thread", start_paused = true)]
async fn element_edits_are_dropped_while_the_engine_owns() {
	let (engine, element, sync) = start(&["a", "b", "c"], &["a", "b", "c"], SyncConfig::default()).await;

	engine.edit(0, 1, &["x"], false);
	settle().await;
	element.type_text("y\nb\nc");
	sync.element_changed(Some(LineEdit::new(0, 1, lines(&["y"])))).await.unwrap();

	assert_eq!(engine.lines(), ["x", "b", "c"]);
	assert!(!engine.calls().contains(&"set_lines"));
	assert_eq!(sync.state().await.unwrap().main, Some(Side::Engine));

	// The release overwrites the stray element edit with the engine's text.
	sleep(Duration::from_millis(150)).await;
	assert_eq!(element.lines_now(), ["x", "b", "c"]);
	let state = sync.state().await.unwrap();
	assert_eq!(state.main, None);
	assert_eq!(state.resyncs, 1);
}

#[tokio::test(flavor = "current_thread", start_paused = true)]
async fn element_edit_reaches_the_engine_and_moves_its_cursor() {
	let (engine, element, sync) = start(&["a", "b", "c"], &["a", "b", "c"], SyncConfig::default()).await;

	element.type_text("a\nZ\nc");
	element.select(3, 0);
	sync.element_changed(Some(LineEdit::new(1, 2, lines(&["Z"])))).await.unwrap();
	assert_eq!(engine.lines(), ["a", "Z", "c"]);
	assert_eq!(sync.state().await.unwrap().main, Some(Side::Element));

	sleep(Duration::from_millis(150)).await;
	// Nothing left to diff, only the cursor follows.
	assert_eq!(engine.calls(), ["set_lines", "set_cursor"]);
	assert_eq!(engine.cursor_position(), BufferPosition::new(2, 2));
	assert_eq!(sync.state().await.unwrap().main, None);
}

#[tokio::test(flavor = "current_thread", start_paused = true)]
async fn element_edit_without_detail_is_diffed_on_release() {
	let (engine, element, sync) = start(&["a", "b", "c", "d"], &["a", "b", "c", "d"], SyncConfig::default()).await;

	element.type_text("a\nc\nd\ne");
	sync.element_changed(None).await.unwrap();
	assert_eq!(engine.lines(), ["a", "b", "c", "d"]);

	sleep(Duration::from_millis(150)).await;
	assert_eq!(engine.lines(), ["a", "c", "d", "e"]);
	assert_eq!(engine.calls(), ["replace_ranges", "set_lines", "set_lines", "set_cursor"]);
}

#[tokio::test(flavor = "current_thread", start_paused = true)]
async fn engine_cursor_lands_on_the_element_in_utf16_units() {
	let (engine, element, _sync) = start(&["héllo", "wörld"], &["héllo", "wörld"], SyncConfig::default()).await;

	engine.edit(1, 2, &["wörld!"], false);
	// Byte column 4 of line 2 sits right after the 'ö'.
	engine.place_cursor(2, 4);
	sleep(Duration::from_millis(150)).await;

	assert_eq!(element.lines_now(), ["héllo", "wörld!"]);
	assert_eq!(element.selection(), (8, 0));
}

#[tokio::test(flavor = "current_thread", start_paused = true)]
async fn frozen_synchronizer_leaves_cursors_alone() {
	let (engine, element, sync) = start(&["a", "b"], &["a", "b"], SyncConfig::default()).await;
	sync.set_frozen(true).await.unwrap();

	engine.edit(0, 1, &["x"], false);
	sleep(Duration::from_millis(150)).await;
	assert_eq!(element.lines_now(), ["x", "b"]);
	assert!(!engine.calls().contains(&"cursor"));
	assert!(sync.state().await.unwrap().frozen);

	sync.set_frozen(false).await.unwrap();
	engine.edit(1, 2, &["y"], false);
	sleep(Duration::from_millis(150)).await;
	assert_eq!(engine.calls(), ["cursor"]);
}

#[tokio::test(flavor = "current_thread", start_paused = true)]
async fn cursor_sync_can_be_turned_off() {
	let config = SyncConfig::default().with_sync_cursor(false);
	let (engine, element, sync) = start(&["a"], &["a"], config).await;

	element.type_text("b");
	sync.element_changed(None).await.unwrap();
	sleep(Duration::from_millis(150)).await;

	assert_eq!(engine.lines(), ["b"]);
	assert!(!engine.calls().contains(&"set_cursor"));
}

#[tokio::test(flavor = "current_thread", start_paused = true)]
async fn forced_resync_from_the_element_seeds_the_engine() {
	let (engine, element, sync) = start(&["old"], &["new", "text"], SyncConfig::default()).await;
	element.select(4, 0);

	sync.force_resync(Some(Side::Element)).await.unwrap();

	assert_eq!(engine.lines(), ["new", "text"]);
	assert_eq!(engine.cursor_position(), BufferPosition::new(2, 1));
	let state = sync.state().await.unwrap();
	assert_eq!(state.main, None);
	assert_eq!(state.resyncs, 1);
}

#[tokio::test(flavor = "current_thread", start_paused = true)]
async fn forced_resync_defaults_to_the_engine_when_idle() {
	let (engine, element, sync) = start(&["engine"], &["element"], SyncConfig::default()).await;

	sync.force_resync(None).await.unwrap();

	assert_eq!(element.text_now(), "engine");
	assert_eq!(engine.lines(), ["engine"]);
}

#[tokio::test(flavor = "current_thread", start_paused = true)]
async fn own_writes_echoed_by_the_engine_are_ignored() {
	let (engine, element, sync) = start(&["a", "b"], &["a", "b"], SyncConfig::default()).await;
	*engine.echo.lock() = true;

	element.type_text("a\nb\nc");
	element.select(0, 0);
	sync.element_changed(None).await.unwrap();
	sleep(Duration::from_millis(150)).await;

	assert_eq!(engine.lines(), ["a", "b", "c"]);
	let state = sync.state().await.unwrap();
	assert_eq!(state.main, None);
	assert_eq!(state.resyncs, 1);
	assert_eq!(element.selection(), (0, 0));

	// The echo must not hand ownership to the engine and trigger a resync back.
	sleep(Duration::from_millis(200)).await;
	assert_eq!(sync.state().await.unwrap().resyncs, 1);

	engine.edit(0, 1, &["x"], false);
	settle().await;
	assert_eq!(element.lines_now(), ["x", "b", "c"]);
	assert_eq!(sync.state().await.unwrap().main, Some(Side::Engine));
}
