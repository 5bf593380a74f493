//! Failed partial updates, resync failures and the terminal state.

use std::time::Duration;

use pretty_assertions::assert_eq;
use tandem_sync::{LineEdit, Side, SyncConfig, SyncError};
use tokio::time::sleep;

use crate::common::{lines, settle, start};

#[tokio::test(flavor = "current_thread", start_paused = true)]
async fn inconsistent_engine_edit_forces_an_immediate_resync() {
	let (engine, element, sync) = start(&["a", "b", "c"], &["a", "b", "c"], SyncConfig::default()).await;

	engine.set_content(&["a", "b", "c", "d"]);
	engine.notify(5, Some(6), &["x"], false);
	settle().await;

	assert_eq!(element.lines_now(), ["a", "b", "c", "d"]);
	let state = sync.state().await.unwrap();
	assert_eq!(state.resyncs, 1);
	assert!(!state.dirty);
	assert_eq!(state.main, None);
}

#[tokio::test(flavor = "current_thread", start_paused = true)]
async fn dirty_batch_resyncs_when_it_settles() {
	let (engine, element, sync) = start(&["a", "b", "c"], &["a", "b", "c"], SyncConfig::default()).await;

	engine.notify(5, Some(6), &["x"], true);
	settle().await;
	let state = sync.state().await.unwrap();
	assert!(state.dirty);
	assert_eq!(state.resyncs, 0);

	// Later fragments are not applied while dirty.
	engine.set_content(&["q"]);
	engine.notify(0, None, &["q"], true);
	settle().await;
	assert_eq!(element.lines_now(), ["a", "b", "c"]);

	engine.notify(0, None, &["q"], false);
	settle().await;
	assert_eq!(element.lines_now(), ["q"]);
	let state = sync.state().await.unwrap();
	assert!(!state.dirty);
	assert_eq!(state.resyncs, 1);
}

#[tokio::test(flavor = "current_thread", start_paused = true)]
async fn rejected_element_edit_is_repaired_by_a_resync() {
	let (engine, element, sync) = start(&["a", "b"], &["a", "b"], SyncConfig::default()).await;
	*engine.reject_next_edit.lock() = true;

	element.type_text("a\nB");
	sync.element_changed(Some(LineEdit::new(1, 2, lines(&["B"])))).await.unwrap();

	assert_eq!(engine.lines(), ["a", "B"]);
	let state = sync.state().await.unwrap();
	assert!(!state.dirty);
	assert_eq!(state.resyncs, 1);
	assert_eq!(state.main, None);
}

#[tokio::test(flavor = "current_thread", start_paused = true)]
async fn failed_resync_stays_dirty_until_the_next_settled_edit() {
	let (engine, element, sync) = start(&["a"], &["a"], SyncConfig::default()).await;
	element.set_broken(true);

	engine.edit(0, 1, &["b"], false);
	settle().await;
	let state = sync.state().await.unwrap();
	assert!(state.dirty);
	assert_eq!(state.resyncs, 1);

	element.set_broken(false);
	engine.edit(0, 1, &["c"], false);
	settle().await;
	assert_eq!(element.lines_now(), ["c"]);
	let state = sync.state().await.unwrap();
	assert!(!state.dirty);
	assert_eq!(state.resyncs, 2);
}

#[tokio::test(flavor = "current_thread", start_paused = true)]
async fn element_edit_after_a_failed_resync_resyncs_at_once() {
	let (engine, element, sync) = start(&["a"], &["a"], SyncConfig::default()).await;
	element.set_broken(true);

	sync.element_changed(None).await.unwrap();
	sleep(Duration::from_millis(150)).await;
	let state = sync.state().await.unwrap();
	assert!(state.dirty);
	assert_eq!(state.resyncs, 1);

	element.set_broken(false);
	element.type_text("a\nb");
	sync.element_changed(Some(LineEdit::new(1, 1, lines(&["b"])))).await.unwrap();

	assert_eq!(engine.lines(), ["a", "b"]);
	let state = sync.state().await.unwrap();
	assert!(!state.dirty);
	assert_eq!(state.resyncs, 2);
	assert_eq!(state.main, None);
}

#[tokio::test(flavor = "current_thread", start_paused = true)]
async fn closed_engine_disables_the_synchronizer() {
	let (engine, element, sync) = start(&["a"], &["a"], SyncConfig::default()).await;

	engine.close();
	settle().await;

	assert!(sync.state().await.unwrap().disabled);
	element.type_text("b");
	assert_eq!(sync.element_changed(None).await, Err(SyncError::Disabled));
	assert_eq!(sync.force_resync(Some(Side::Element)).await, Err(SyncError::Disabled));
	assert_eq!(sync.set_frozen(true).await, Err(SyncError::Disabled));

	sleep(Duration::from_millis(200)).await;
	assert_eq!(sync.state().await.unwrap().resyncs, 0);
}

#[tokio::test(flavor = "current_thread", start_paused = true)]
async fn detached_buffer_disables_the_synchronizer() {
	let (engine, _element, sync) = start(&["a"], &["a"], SyncConfig::default()).await;

	engine.detach();
	settle().await;

	let state = sync.state().await.unwrap();
	assert!(state.disabled);
	assert_eq!(state.main, None);
}

#[tokio::test(flavor = "current_thread", start_paused = true)]
async fn stopped_synchronizer_rejects_commands() {
	let (_engine, _element, sync) = start(&["a"], &["a"], SyncConfig::default()).await;

	sync.shutdown().await;

	assert_eq!(sync.state().await, Err(SyncError::Stopped));
	assert_eq!(sync.element_changed(None).await, Err(SyncError::Stopped));
}
