//! Scene data model: visual objects, sparse updates, and serialized trees.
//!
//! DESIGN
//! ======
//! A [`VisualObject`] is one renderable entity with a stable `id` assigned at
//! creation and never reassigned. The editor-owned tags (`component_id`,
//! `is_instance`, `overrides`) record template lineage; geometry and style
//! live in plain fields plus the open-ended `props` bag.
//!
//! A [`SceneTree`] is the serialized form that everything round-trips
//! through: history snapshots, component templates, and project files. Trees
//! are deep and self-contained — image pixels ride inside `props` as data
//! URLs, never as live references.

#[cfg(test)]
#[path = "object_test.rs"]
mod object_test;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Unique identifier for a visual object.
pub type ObjectId = Uuid;

/// The kind of a visual object.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ObjectKind {
    /// Axis-aligned rectangle.
    Rect,
    /// Ellipse inscribed within the bounding box.
    Ellipse,
    /// Text block.
    Text,
    /// Raster image; pixels stored as a PNG data URL in `props.src`.
    Image,
    /// Positioned wrapper around child objects.
    Group,
}

/// One renderable entity in the scene.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VisualObject {
    /// Stable identity. Immutable once assigned, unique across the live scene.
    pub id: ObjectId,
    pub kind: ObjectKind,
    /// Left edge of the bounding box in surface coordinates.
    pub x: f64,
    /// Top edge of the bounding box in surface coordinates.
    pub y: f64,
    pub width: f64,
    pub height: f64,
    /// Clockwise rotation in degrees around the bounding-box center.
    pub rotation: f64,
    /// Stacking order; lower values are drawn beneath higher values.
    pub z_index: i64,
    /// Open-ended style bag (fill, stroke, text, src, ...).
    pub props: serde_json::Value,
    /// Back-reference to the component this object is an instance of.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub component_id: Option<Uuid>,
    /// True if the object was produced by instantiating a component.
    #[serde(default)]
    pub is_instance: bool,
    /// Per-instance attribute deviations from the template. Carried but never
    /// diffed or reapplied: components are non-propagating templates.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub overrides: Option<serde_json::Value>,
    /// Child objects for `Group`; coordinates are absolute, not group-relative.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub children: Vec<VisualObject>,
}

impl VisualObject {
    /// Construct a fresh object of `kind` at the given position with a new id.
    #[must_use]
    pub fn new(kind: ObjectKind, x: f64, y: f64, width: f64, height: f64) -> Self {
        Self {
            id: Uuid::new_v4(),
            kind,
            x,
            y,
            width,
            height,
            rotation: 0.0,
            z_index: 0,
            props: serde_json::json!({}),
            component_id: None,
            is_instance: false,
            overrides: None,
            children: Vec::new(),
        }
    }

    /// A deep copy with fresh ids on this object and every descendant.
    /// Template tags are NOT copied — the caller decides lineage.
    #[must_use]
    pub fn with_fresh_ids(&self) -> Self {
        let mut copy = self.clone();
        copy.id = Uuid::new_v4();
        copy.component_id = None;
        copy.is_instance = false;
        copy.children = self.children.iter().map(Self::with_fresh_ids).collect();
        copy
    }
}

/// Sparse update for a visual object. Only present fields are applied.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PartialObject {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub x: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub y: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub width: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub height: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub rotation: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub z_index: Option<i64>,
    /// Props keys to merge or remove (null values delete keys).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub props: Option<serde_json::Value>,
}

/// A deep, self-contained serialization of one or more visual objects.
///
/// This is the one structural contract preserved exactly: history snapshots,
/// component templates, and project files all round-trip through it.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SceneTree {
    pub objects: Vec<VisualObject>,
}

impl SceneTree {
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.objects.is_empty()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.objects.len()
    }
}

/// Typed access to common props fields from a `VisualObject.props` value.
pub struct Props<'a> {
    value: &'a serde_json::Value,
}

impl<'a> Props<'a> {
    #[must_use]
    pub fn new(value: &'a serde_json::Value) -> Self {
        Self { value }
    }

    /// Fill color as a CSS color string. Defaults to `"#4B6FD9"` when absent.
    #[must_use]
    pub fn fill(&self) -> &str {
        self.value
            .get("fill")
            .and_then(|v| v.as_str())
            .unwrap_or("#4B6FD9")
    }

    /// Stroke color as a CSS color string. Defaults to `"#1F1A17"` when absent.
    #[must_use]
    pub fn stroke(&self) -> &str {
        self.value
            .get("stroke")
            .and_then(|v| v.as_str())
            .unwrap_or("#1F1A17")
    }

    /// Label text displayed on the object. Empty string when absent.
    #[must_use]
    pub fn text(&self) -> &str {
        self.value
            .get("text")
            .and_then(|v| v.as_str())
            .unwrap_or("")
    }

    /// Image source data URL. Empty string when absent.
    #[must_use]
    pub fn src(&self) -> &str {
        self.value
            .get("src")
            .and_then(|v| v.as_str())
            .unwrap_or("")
    }
}

/// Current time as milliseconds since Unix epoch.
#[must_use]
pub fn now_ms() -> i64 {
    use std::time::{SystemTime, UNIX_EPOCH};
    let Ok(dur) = SystemTime::now().duration_since(UNIX_EPOCH) else {
        return 0;
    };
    i64::try_from(dur.as_millis()).unwrap_or(0)
}
