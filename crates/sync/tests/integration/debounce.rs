//! Release timing.

use std::time::Duration;

use pretty_assertions::assert_eq;
use tandem_sync::{Side, SyncConfig};
use tokio::time::{Instant, sleep};

use crate::common::{settle, start};

#[tokio::test(flavor = "current_thread", start_paused = true)]
async fn burst_of_edits_releases_once_after_the_last() {
	let (engine, element, sync) = start(&["a"], &["a"], SyncConfig::default()).await;
	let t0 = Instant::now();

	for (at, text) in [(0, "ab"), (50, "abc"), (140, "abcd")] {
		sleep(Duration::from_millis(at).saturating_sub(t0.elapsed())).await;
		element.type_text(text);
		sync.element_changed(None).await.unwrap();
	}

	sleep(Duration::from_millis(200)).await;
	let reads = engine.reads.lock().clone();
	assert_eq!(reads.len(), 1, "expected a single release");
	let released_after = reads[0] - t0;
	assert!(released_after >= Duration::from_millis(240), "released after {released_after:?}");
	assert!(released_after < Duration::from_millis(250), "released after {released_after:?}");

	let state = sync.state().await.unwrap();
	assert_eq!(state.resyncs, 1);
	assert_eq!(state.main, None);
	assert_eq!(engine.lines(), ["abcd"]);
}

#[tokio::test(flavor = "current_thread", start_paused = true)]
async fn window_follows_the_configuration() {
	let config = SyncConfig::default().with_debounce(Duration::from_millis(20));
	let (engine, _element, sync) = start(&["a"], &["a"], config).await;

	engine.edit(0, 1, &["b"], false);
	sleep(Duration::from_millis(15)).await;
	assert_eq!(sync.state().await.unwrap().main, Some(Side::Engine));
	sleep(Duration::from_millis(10)).await;
	assert_eq!(sync.state().await.unwrap().main, None);
}

#[tokio::test(flavor = "current_thread", start_paused = true)]
async fn batched_engine_change_postpones_release() {
	let (engine, element, sync) = start(&["a", "b"], &["a", "b"], SyncConfig::default()).await;

	engine.edit(0, 1, &["x"], true);
	sleep(Duration::from_millis(300)).await;
	let state = sync.state().await.unwrap();
	assert_eq!(state.main, Some(Side::Engine));
	assert!(state.settling);
	assert_eq!(state.resyncs, 0);

	engine.edit(1, 2, &["y"], false);
	sleep(Duration::from_millis(50)).await;
	assert_eq!(sync.state().await.unwrap().resyncs, 0);

	sleep(Duration::from_millis(100)).await;
	let state = sync.state().await.unwrap();
	assert_eq!(state.main, None);
	assert!(!state.settling);
	assert_eq!(state.resyncs, 1);
	assert_eq!(element.lines_now(), ["x", "y"]);
}

#[tokio::test(flavor = "current_thread", start_paused = true)]
async fn ownership_passes_to_the_other_side_after_release() {
	let (engine, element, sync) = start(&["a"], &["a"], SyncConfig::default()).await;

	engine.edit(0, 1, &["b"], false);
	settle().await;
	assert_eq!(sync.state().await.unwrap().main, Some(Side::Engine));

	sleep(Duration::from_millis(150)).await;
	element.type_text("c");
	sync.element_changed(None).await.unwrap();
	assert_eq!(sync.state().await.unwrap().main, Some(Side::Element));

	sleep(Duration::from_millis(150)).await;
	assert_eq!(engine.lines(), ["c"]);
}
