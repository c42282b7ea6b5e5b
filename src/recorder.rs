//! Session Recorder & Heatmap — bounded pointer capture with a click-density
//! overlay.
//!
//! DESIGN
//! ======
//! While active, the recorder appends pointer events (surface-relative) to a
//! ring buffer capped at a configured size, oldest-evicted. Stopping
//! finalizes an immutable [`Recording`] and persists it under its own store
//! key. The heatmap renders an additive radial stamp per click; overlapping
//! clicks saturate rather than normalize.
//!
//! Listing tolerates corrupt rows: a recording that fails to decode is
//! logged and skipped, never fails the listing.

#[cfg(test)]
#[path = "recorder_test.rs"]
mod recorder_test;

use std::collections::VecDeque;

use image::{Rgba, RgbaImage};
use serde::{Deserialize, Serialize};
use tracing::warn;
use uuid::Uuid;

use crate::object::now_ms;
use crate::store::{Store, StoreError};

pub const DEFAULT_RECORDER_CAPACITY: usize = 20_000;

/// Store key prefix for persisted recordings.
pub const RECORDING_KEY_PREFIX: &str = "recording:";

/// Radius in pixels of one click's heat stamp.
const HEAT_RADIUS: i64 = 36;

/// Pointer event category captured on the editing surface.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PointerKind {
    Move,
    Click,
}

/// One captured pointer event, relative to the editing-surface origin.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct PointerEvent {
    #[serde(rename = "type")]
    pub kind: PointerKind,
    pub x: f64,
    pub y: f64,
    pub ts: i64,
}

/// A finalized, named capture. Immutable after stop, except for deletion.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Recording {
    pub id: Uuid,
    pub name: String,
    pub created_at: i64,
    pub events: Vec<PointerEvent>,
}

/// Bounded in-memory capture buffer.
pub struct SessionRecorder {
    buffer: VecDeque<PointerEvent>,
    capacity: usize,
    active: bool,
}

impl SessionRecorder {
    #[must_use]
    pub fn new(capacity: usize) -> Self {
        Self { buffer: VecDeque::new(), capacity: capacity.max(1), active: false }
    }

    #[must_use]
    pub fn is_active(&self) -> bool {
        self.active
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.buffer.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.buffer.is_empty()
    }

    /// Begin capturing. Returns `false` if a recording is already active
    /// (the existing buffer keeps accumulating).
    pub fn start(&mut self) -> bool {
        if self.active {
            return false;
        }
        self.buffer.clear();
        self.active = true;
        true
    }

    /// Append one event. No-op while inactive. Evicts the oldest event once
    /// the buffer is at capacity.
    pub fn record(&mut self, event: PointerEvent) {
        if !self.active {
            return;
        }
        if self.buffer.len() == self.capacity {
            self.buffer.pop_front();
        }
        self.buffer.push_back(event);
    }

    /// Stop capturing, finalize and persist a [`Recording`], and clear the
    /// buffer. Returns `None` when no recording was active.
    ///
    /// # Errors
    ///
    /// Returns the store error if persisting fails; the buffer is cleared
    /// either way.
    pub fn stop(&mut self, store: &mut dyn Store, name: &str) -> Result<Option<Recording>, StoreError> {
        if !self.active {
            return Ok(None);
        }
        self.active = false;
        let recording = Recording {
            id: Uuid::new_v4(),
            name: name.to_owned(),
            created_at: now_ms(),
            events: self.buffer.drain(..).collect(),
        };
        let value = serde_json::to_value(&recording)?;
        store.save(&recording_key(recording.id), &value)?;
        Ok(Some(recording))
    }
}

impl Default for SessionRecorder {
    fn default() -> Self {
        Self::new(DEFAULT_RECORDER_CAPACITY)
    }
}

fn recording_key(id: Uuid) -> String {
    format!("{RECORDING_KEY_PREFIX}{id}")
}

/// All persisted recordings, newest first. Corrupt rows are logged and
/// skipped.
#[must_use]
pub fn list_recordings(store: &dyn Store) -> Vec<Recording> {
    let keys = match store.list() {
        Ok(keys) => keys,
        Err(e) => {
            warn!(error = %e, "recording list failed");
            return Vec::new();
        }
    };

    let mut recordings = Vec::new();
    for key in keys {
        if !key.starts_with(RECORDING_KEY_PREFIX) {
            continue;
        }
        match store.load(&key) {
            Ok(Some(value)) => match serde_json::from_value::<Recording>(value) {
                Ok(rec) => recordings.push(rec),
                Err(e) => warn!(%key, error = %e, "corrupt recording skipped"),
            },
            Ok(None) => {}
            Err(e) => warn!(%key, error = %e, "recording load failed; skipped"),
        }
    }
    recordings.sort_by(|a, b| b.created_at.cmp(&a.created_at));
    recordings
}

/// Load one recording by id.
///
/// # Errors
///
/// Returns the store error if the backend fails.
pub fn load_recording(store: &dyn Store, id: Uuid) -> Result<Option<Recording>, StoreError> {
    let Some(value) = store.load(&recording_key(id))? else {
        return Ok(None);
    };
    Ok(serde_json::from_value(value).ok())
}

/// Delete one persisted recording.
///
/// # Errors
///
/// Returns the store error if the backend fails.
pub fn delete_recording(store: &mut dyn Store, id: Uuid) -> Result<(), StoreError> {
    store.remove(&recording_key(id))
}

/// Render a click-density overlay from a recording's click events. Each
/// click stamps a radial falloff, accumulated with saturating addition —
/// overlapping clicks visually saturate by design.
#[must_use]
pub fn render_heatmap(recording: &Recording, width: u32, height: u32) -> RgbaImage {
    let mut overlay = RgbaImage::from_pixel(width, height, Rgba([0, 0, 0, 0]));
    for event in &recording.events {
        if event.kind != PointerKind::Click {
            continue;
        }
        #[allow(clippy::cast_possible_truncation)]
        let (cx, cy) = (event.x as i64, event.y as i64);
        for dy in -HEAT_RADIUS..=HEAT_RADIUS {
            for dx in -HEAT_RADIUS..=HEAT_RADIUS {
                let (px, py) = (cx + dx, cy + dy);
                if px < 0 || py < 0 || px >= i64::from(width) || py >= i64::from(height) {
                    continue;
                }
                #[allow(clippy::cast_precision_loss)]
                let dist = ((dx * dx + dy * dy) as f64).sqrt();
                #[allow(clippy::cast_precision_loss)]
                let radius = HEAT_RADIUS as f64;
                if dist > radius {
                    continue;
                }
                // Linear falloff from center to rim.
                #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
                let heat = ((1.0 - dist / radius) * 96.0) as u8;
                #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
                let pixel = overlay.get_pixel_mut(px as u32, py as u32);
                pixel[0] = pixel[0].saturating_add(heat);
                pixel[1] = pixel[1].saturating_add(heat / 4);
                pixel[3] = pixel[3].saturating_add(heat);
            }
        }
    }
    overlay
}
