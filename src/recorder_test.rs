#![allow(clippy::float_cmp)]

use serde_json::json;
use uuid::Uuid;

use super::*;
use crate::store::MemoryStore;

fn move_at(x: f64) -> PointerEvent {
    PointerEvent { kind: PointerKind::Move, x, y: 0.0, ts: 0 }
}

fn click_at(x: f64, y: f64) -> PointerEvent {
    PointerEvent { kind: PointerKind::Click, x, y, ts: 0 }
}

// =============================================================
// capture lifecycle
// =============================================================

#[test]
fn record_is_noop_while_inactive() {
    let mut recorder = SessionRecorder::new(10);
    recorder.record(move_at(1.0));
    assert!(recorder.is_empty());
}

#[test]
fn start_twice_returns_false() {
    let mut recorder = SessionRecorder::new(10);
    assert!(recorder.start());
    assert!(!recorder.start());
    assert!(recorder.is_active());
}

#[test]
fn start_clears_previous_buffer() {
    let mut store = MemoryStore::new();
    let mut recorder = SessionRecorder::new(10);
    recorder.start();
    recorder.record(move_at(1.0));
    recorder.stop(&mut store, "a").unwrap();

    recorder.start();
    assert!(recorder.is_empty());
}

#[test]
fn stop_while_inactive_is_none() {
    let mut store = MemoryStore::new();
    let mut recorder = SessionRecorder::new(10);
    assert!(recorder.stop(&mut store, "idle").unwrap().is_none());
}

// =============================================================
// bounded buffer
// =============================================================

#[test]
fn buffer_keeps_most_recent_in_order() {
    let mut store = MemoryStore::new();
    let mut recorder = SessionRecorder::new(5);
    recorder.start();
    for i in 0..8 {
        recorder.record(move_at(f64::from(i)));
    }
    let recording = recorder.stop(&mut store, "bounded").unwrap().unwrap();
    let xs: Vec<f64> = recording.events.iter().map(|e| e.x).collect();
    assert_eq!(xs, vec![3.0, 4.0, 5.0, 6.0, 7.0]);
}

#[test]
fn default_capacity_bounds_long_sessions() {
    let mut store = MemoryStore::new();
    let mut recorder = SessionRecorder::default();
    recorder.start();
    for i in 0..25_000 {
        recorder.record(move_at(f64::from(i)));
    }
    let recording = recorder.stop(&mut store, "long").unwrap().unwrap();
    assert_eq!(recording.events.len(), DEFAULT_RECORDER_CAPACITY);
    assert_eq!(recording.events[0].x, 5000.0);
    assert_eq!(recording.events[DEFAULT_RECORDER_CAPACITY - 1].x, 24_999.0);
}

// =============================================================
// persistence
// =============================================================

#[test]
fn stop_persists_and_listing_finds_it() {
    let mut store = MemoryStore::new();
    let mut recorder = SessionRecorder::new(10);
    recorder.start();
    recorder.record(click_at(1.0, 2.0));
    let recording = recorder.stop(&mut store, "session one").unwrap().unwrap();

    let listed = list_recordings(&store);
    assert_eq!(listed.len(), 1);
    assert_eq!(listed[0].id, recording.id);
    assert_eq!(listed[0].name, "session one");
    assert_eq!(listed[0].events.len(), 1);
}

#[test]
fn load_recording_by_id() {
    let mut store = MemoryStore::new();
    let mut recorder = SessionRecorder::new(10);
    recorder.start();
    let recording = recorder.stop(&mut store, "named").unwrap().unwrap();

    let loaded = load_recording(&store, recording.id).unwrap().unwrap();
    assert_eq!(loaded.name, "named");
    assert!(load_recording(&store, Uuid::new_v4()).unwrap().is_none());
}

#[test]
fn corrupt_recording_is_skipped_not_fatal() {
    let mut store = MemoryStore::new();
    store.save("recording:garbage", &json!({ "events": "nope" })).unwrap();

    let mut recorder = SessionRecorder::new(10);
    recorder.start();
    recorder.record(click_at(0.0, 0.0));
    recorder.stop(&mut store, "good").unwrap();

    let listed = list_recordings(&store);
    assert_eq!(listed.len(), 1);
    assert_eq!(listed[0].name, "good");
}

#[test]
fn listing_ignores_unrelated_keys() {
    let mut store = MemoryStore::new();
    store.save("project:thing", &json!({})).unwrap();
    assert!(list_recordings(&store).is_empty());
}

#[test]
fn delete_removes_from_listing() {
    let mut store = MemoryStore::new();
    let mut recorder = SessionRecorder::new(10);
    recorder.start();
    let recording = recorder.stop(&mut store, "gone").unwrap().unwrap();

    delete_recording(&mut store, recording.id).unwrap();
    assert!(list_recordings(&store).is_empty());
    // Deleting again is a no-op.
    delete_recording(&mut store, recording.id).unwrap();
}

// =============================================================
// heatmap
// =============================================================

fn recording_with(events: Vec<PointerEvent>) -> Recording {
    Recording { id: Uuid::new_v4(), name: "r".to_owned(), created_at: 0, events }
}

#[test]
fn heatmap_stamps_clicks_only() {
    let recording = recording_with(vec![move_at(10.0), click_at(50.0, 50.0)]);
    let overlay = render_heatmap(&recording, 100, 100);
    assert!(overlay.get_pixel(50, 50)[3] > 0);
    // The move at (10, 0) leaves no heat.
    assert_eq!(overlay.get_pixel(10, 0)[3], 0);
}

#[test]
fn heat_falls_off_with_distance() {
    let recording = recording_with(vec![click_at(50.0, 50.0)]);
    let overlay = render_heatmap(&recording, 100, 100);
    let center = overlay.get_pixel(50, 50)[0];
    let rim = overlay.get_pixel(75, 50)[0];
    assert!(center > rim);
    // Beyond the stamp radius there is nothing.
    assert_eq!(overlay.get_pixel(95, 50)[0], 0);
}

#[test]
fn overlapping_clicks_accumulate() {
    let one = recording_with(vec![click_at(50.0, 50.0)]);
    let two = recording_with(vec![click_at(50.0, 50.0), click_at(50.0, 50.0)]);
    let single = render_heatmap(&one, 100, 100).get_pixel(50, 50)[0];
    let double = render_heatmap(&two, 100, 100).get_pixel(50, 50)[0];
    assert!(double > single);
}

#[test]
fn clicks_near_the_edge_clip_cleanly() {
    let recording = recording_with(vec![click_at(0.0, 0.0), click_at(99.0, 99.0)]);
    let overlay = render_heatmap(&recording, 100, 100);
    assert!(overlay.get_pixel(0, 0)[3] > 0);
    assert!(overlay.get_pixel(99, 99)[3] > 0);
}

#[test]
fn empty_recording_renders_transparent_overlay() {
    let recording = recording_with(Vec::new());
    let overlay = render_heatmap(&recording, 10, 10);
    assert!(overlay.pixels().all(|p| p[3] == 0));
}
