//! Object Model Adapter — the contract between the editor core and the
//! rendering engine, plus the in-process reference implementation.
//!
//! DESIGN
//! ======
//! The core never talks to a renderer directly; it drives a [`ObjectModel`]
//! trait object. `serialize`/`instantiate` must round-trip: inflating a tree
//! produces attribute-equal objects with fresh ids, without mutating the
//! source tree. `restore` is the reload sequence (clear scene, inflate from
//! snapshot) and preserves ids verbatim — history and project load depend on
//! that.
//!
//! [`MemoryModel`] is the headless implementation used by tests and by hosts
//! that bring their own compositor. Image pixels are carried inside
//! `props.src` as PNG data URLs so every serialized tree stays deep and
//! self-contained.

#[cfg(test)]
#[path = "model_test.rs"]
mod model_test;

use std::collections::HashMap;

use base64::Engine as _;
use base64::engine::general_purpose::STANDARD as BASE64;
use image::{ImageEncoder, Rgba, RgbaImage};

use crate::error::{ErrorCode, Severity};
use crate::object::{ObjectId, ObjectKind, PartialObject, Props, SceneTree, VisualObject};

const DATA_URL_PREFIX: &str = "data:image/png;base64,";

#[derive(Debug, thiserror::Error)]
pub enum ModelError {
    #[error("object not found: {0}")]
    NotFound(ObjectId),
    #[error("duplicate object id in tree: {0}")]
    DuplicateId(ObjectId),
    #[error("object has no readable image data: {0}")]
    UnreadableImage(ObjectId),
    #[error("raster encode failed: {0}")]
    EncodeFailed(String),
}

impl ErrorCode for ModelError {
    fn error_code(&self) -> &'static str {
        match self {
            Self::NotFound(_) => "E_OBJECT_NOT_FOUND",
            Self::DuplicateId(_) => "E_DUPLICATE_ID",
            Self::UnreadableImage(_) => "E_UNREADABLE_IMAGE",
            Self::EncodeFailed(_) => "E_RASTER_ENCODE",
        }
    }

    fn severity(&self) -> Severity {
        match self {
            Self::NotFound(_) | Self::UnreadableImage(_) => Severity::UserActionable,
            Self::DuplicateId(_) | Self::EncodeFailed(_) => Severity::Internal,
        }
    }
}

/// Scene-level change notifications the editor broadcasts to the host UI.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SceneEvent {
    Added(ObjectId),
    Removed(ObjectId),
    Modified(ObjectId),
    SelectionChanged(Option<ObjectId>),
}

/// Contract consumed by the editor core. One live scene per model.
pub trait ObjectModel {
    /// Create an object and add it to the live scene. Returns its fresh id.
    fn create(&mut self, kind: ObjectKind, x: f64, y: f64, width: f64, height: f64, props: serde_json::Value)
    -> ObjectId;

    /// Insert a pre-built object verbatim (id preserved).
    ///
    /// # Errors
    ///
    /// Returns `DuplicateId` if the id is already live.
    fn insert(&mut self, obj: VisualObject) -> Result<(), ModelError>;

    /// Apply a sparse update to an existing object.
    ///
    /// # Errors
    ///
    /// Returns `NotFound` if the object doesn't exist.
    fn update(&mut self, id: ObjectId, partial: &PartialObject) -> Result<(), ModelError>;

    /// Remove an object from the scene, returning it.
    ///
    /// # Errors
    ///
    /// Returns `NotFound` if the object doesn't exist.
    fn remove(&mut self, id: ObjectId) -> Result<VisualObject, ModelError>;

    /// Serialize a selection to a deep tree. Pure; must round-trip through
    /// [`ObjectModel::instantiate`].
    ///
    /// # Errors
    ///
    /// Returns `NotFound` if any id is not live.
    fn serialize(&self, ids: &[ObjectId]) -> Result<SceneTree, ModelError>;

    /// Serialize the whole scene in draw order. Ids are preserved verbatim.
    fn serialize_scene(&self) -> SceneTree;

    /// Inflate a serialized tree into live objects with fresh ids. The source
    /// tree is not mutated. Returns the new ids in tree order.
    fn instantiate(&mut self, tree: &SceneTree) -> Vec<ObjectId>;

    /// Replace the live scene with a snapshot: clear, then inflate with ids
    /// preserved verbatim. On error the caller must treat the scene as
    /// unusable and restore from another snapshot.
    ///
    /// # Errors
    ///
    /// Returns `DuplicateId` if the snapshot violates id uniqueness.
    fn restore(&mut self, tree: &SceneTree) -> Result<(), ModelError>;

    /// Mark an object as the active selection, or clear it with `None`.
    ///
    /// # Errors
    ///
    /// Returns `NotFound` if the id is not live.
    fn set_active(&mut self, id: Option<ObjectId>) -> Result<(), ModelError>;

    /// The currently active object, if any.
    fn active(&self) -> Option<&VisualObject>;

    /// Look up one object by id.
    fn get(&self, id: ObjectId) -> Option<&VisualObject>;

    /// All live objects in draw order (`z_index`, then id).
    fn objects(&self) -> Vec<&VisualObject>;

    /// A pixel buffer for one object, rasterizing if the object does not
    /// carry raw pixels.
    ///
    /// # Errors
    ///
    /// Returns `UnreadableImage` if pixel data exists but cannot be decoded.
    fn rasterize(&self, id: ObjectId) -> Result<RgbaImage, ModelError>;

    /// Composite the whole scene onto a fresh surface.
    fn rasterize_scene(&self, width: u32, height: u32) -> RgbaImage;

    /// Create an image object from raw pixels at the given position.
    ///
    /// # Errors
    ///
    /// Returns `EncodeFailed` if the pixels cannot be encoded.
    fn insert_raster(&mut self, img: &RgbaImage, x: f64, y: f64) -> Result<ObjectId, ModelError>;
}

// =============================================================================
// DATA URLS
// =============================================================================

/// Encode an RGBA buffer as a PNG data URL for transport inside `props.src`.
///
/// # Errors
///
/// Returns `EncodeFailed` if the PNG encoder rejects the buffer.
pub fn encode_data_url(img: &RgbaImage) -> Result<String, ModelError> {
    let mut png = Vec::new();
    image::codecs::png::PngEncoder::new(&mut png)
        .write_image(img.as_raw(), img.width(), img.height(), image::ExtendedColorType::Rgba8)
        .map_err(|e| ModelError::EncodeFailed(e.to_string()))?;
    Ok(format!("{DATA_URL_PREFIX}{}", BASE64.encode(&png)))
}

/// Decode a PNG data URL back into an RGBA buffer.
pub fn decode_data_url(src: &str) -> Option<RgbaImage> {
    let b64 = src.strip_prefix(DATA_URL_PREFIX)?;
    let png = BASE64.decode(b64).ok()?;
    let decoded = image::load_from_memory(&png).ok()?;
    Some(decoded.to_rgba8())
}

/// Parse a `#RRGGBB` fill into an opaque RGBA pixel. Unparseable fills map to
/// mid gray rather than failing the compositor.
fn parse_fill(fill: &str) -> Rgba<u8> {
    let hex = fill.strip_prefix('#').unwrap_or(fill);
    if hex.len() == 6 {
        if let (Ok(r), Ok(g), Ok(b)) = (
            u8::from_str_radix(&hex[0..2], 16),
            u8::from_str_radix(&hex[2..4], 16),
            u8::from_str_radix(&hex[4..6], 16),
        ) {
            return Rgba([r, g, b, 255]);
        }
    }
    Rgba([128, 128, 128, 255])
}

// =============================================================================
// MEMORY MODEL
// =============================================================================

/// Headless in-process scene, keyed by object id with z-order draw sorting.
#[derive(Default)]
pub struct MemoryModel {
    objects: HashMap<ObjectId, VisualObject>,
    active: Option<ObjectId>,
}

impl MemoryModel {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    fn sorted_ids(&self) -> Vec<ObjectId> {
        let mut objs: Vec<&VisualObject> = self.objects.values().collect();
        objs.sort_by(|a, b| a.z_index.cmp(&b.z_index).then_with(|| a.id.cmp(&b.id)));
        objs.into_iter().map(|o| o.id).collect()
    }

    fn blit(target: &mut RgbaImage, src: &RgbaImage, x: f64, y: f64) {
        #[allow(clippy::cast_possible_truncation)]
        let (ox, oy) = (x as i64, y as i64);
        for (px, py, pixel) in src.enumerate_pixels() {
            let tx = ox + i64::from(px);
            let ty = oy + i64::from(py);
            if tx < 0 || ty < 0 {
                continue;
            }
            #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
            let (tx, ty) = (tx as u32, ty as u32);
            if tx < target.width() && ty < target.height() && pixel[3] > 0 {
                target.put_pixel(tx, ty, *pixel);
            }
        }
    }

    fn fill_rect(target: &mut RgbaImage, obj: &VisualObject) {
        let color = parse_fill(Props::new(&obj.props).fill());
        #[allow(clippy::cast_possible_truncation)]
        let (x0, y0) = (obj.x.max(0.0) as u32, obj.y.max(0.0) as u32);
        #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
        let (x1, y1) = (
            ((obj.x + obj.width).max(0.0) as u32).min(target.width()),
            ((obj.y + obj.height).max(0.0) as u32).min(target.height()),
        );
        for y in y0..y1 {
            for x in x0..x1 {
                target.put_pixel(x, y, color);
            }
        }
    }

    fn draw(&self, target: &mut RgbaImage, obj: &VisualObject) {
        match obj.kind {
            ObjectKind::Image => {
                if let Some(src) = decode_data_url(Props::new(&obj.props).src()) {
                    Self::blit(target, &src, obj.x, obj.y);
                }
            }
            ObjectKind::Group => {
                for child in &obj.children {
                    self.draw(target, child);
                }
            }
            ObjectKind::Rect | ObjectKind::Ellipse | ObjectKind::Text => Self::fill_rect(target, obj),
        }
    }
}

impl ObjectModel for MemoryModel {
    fn create(
        &mut self,
        kind: ObjectKind,
        x: f64,
        y: f64,
        width: f64,
        height: f64,
        props: serde_json::Value,
    ) -> ObjectId {
        let mut obj = VisualObject::new(kind, x, y, width, height);
        #[allow(clippy::cast_possible_wrap)]
        {
            obj.z_index = self.objects.len() as i64;
        }
        obj.props = props;
        let id = obj.id;
        self.objects.insert(id, obj);
        id
    }

    fn insert(&mut self, obj: VisualObject) -> Result<(), ModelError> {
        if self.objects.contains_key(&obj.id) {
            return Err(ModelError::DuplicateId(obj.id));
        }
        self.objects.insert(obj.id, obj);
        Ok(())
    }

    fn update(&mut self, id: ObjectId, partial: &PartialObject) -> Result<(), ModelError> {
        let obj = self.objects.get_mut(&id).ok_or(ModelError::NotFound(id))?;
        if let Some(x) = partial.x {
            obj.x = x;
        }
        if let Some(y) = partial.y {
            obj.y = y;
        }
        if let Some(w) = partial.width {
            obj.width = w;
        }
        if let Some(h) = partial.height {
            obj.height = h;
        }
        if let Some(r) = partial.rotation {
            obj.rotation = r;
        }
        if let Some(z) = partial.z_index {
            obj.z_index = z;
        }
        if let Some(ref incoming) = partial.props {
            if let Some(incoming) = incoming.as_object() {
                if !obj.props.is_object() {
                    obj.props = serde_json::json!({});
                }
                if let Some(existing) = obj.props.as_object_mut() {
                    for (k, v) in incoming {
                        if v.is_null() {
                            existing.remove(k);
                        } else {
                            existing.insert(k.clone(), v.clone());
                        }
                    }
                }
            }
        }
        Ok(())
    }

    fn remove(&mut self, id: ObjectId) -> Result<VisualObject, ModelError> {
        let obj = self.objects.remove(&id).ok_or(ModelError::NotFound(id))?;
        if self.active == Some(id) {
            self.active = None;
        }
        Ok(obj)
    }

    fn serialize(&self, ids: &[ObjectId]) -> Result<SceneTree, ModelError> {
        let mut objects = Vec::with_capacity(ids.len());
        for id in ids {
            let obj = self.objects.get(id).ok_or(ModelError::NotFound(*id))?;
            objects.push(obj.clone());
        }
        Ok(SceneTree { objects })
    }

    fn serialize_scene(&self) -> SceneTree {
        let objects = self
            .sorted_ids()
            .into_iter()
            .filter_map(|id| self.objects.get(&id).cloned())
            .collect();
        SceneTree { objects }
    }

    fn instantiate(&mut self, tree: &SceneTree) -> Vec<ObjectId> {
        let mut ids = Vec::with_capacity(tree.objects.len());
        for template in &tree.objects {
            let copy = template.with_fresh_ids();
            let id = copy.id;
            self.objects.insert(id, copy);
            ids.push(id);
        }
        ids
    }

    fn restore(&mut self, tree: &SceneTree) -> Result<(), ModelError> {
        let mut next: HashMap<ObjectId, VisualObject> = HashMap::with_capacity(tree.objects.len());
        for obj in &tree.objects {
            if next.insert(obj.id, obj.clone()).is_some() {
                return Err(ModelError::DuplicateId(obj.id));
            }
        }
        self.objects = next;
        if let Some(active) = self.active {
            if !self.objects.contains_key(&active) {
                self.active = None;
            }
        }
        Ok(())
    }

    fn set_active(&mut self, id: Option<ObjectId>) -> Result<(), ModelError> {
        if let Some(id) = id {
            if !self.objects.contains_key(&id) {
                return Err(ModelError::NotFound(id));
            }
        }
        self.active = id;
        Ok(())
    }

    fn active(&self) -> Option<&VisualObject> {
        self.active.and_then(|id| self.objects.get(&id))
    }

    fn get(&self, id: ObjectId) -> Option<&VisualObject> {
        self.objects.get(&id)
    }

    fn objects(&self) -> Vec<&VisualObject> {
        self.sorted_ids()
            .into_iter()
            .filter_map(|id| self.objects.get(&id))
            .collect()
    }

    fn rasterize(&self, id: ObjectId) -> Result<RgbaImage, ModelError> {
        let obj = self.objects.get(&id).ok_or(ModelError::NotFound(id))?;
        match obj.kind {
            ObjectKind::Image => {
                decode_data_url(Props::new(&obj.props).src()).ok_or(ModelError::UnreadableImage(id))
            }
            _ => {
                // No raw pixels; rasterize the bounding box with the fill.
                #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
                let (w, h) = (obj.width.max(1.0) as u32, obj.height.max(1.0) as u32);
                let color = parse_fill(Props::new(&obj.props).fill());
                Ok(RgbaImage::from_pixel(w, h, color))
            }
        }
    }

    fn rasterize_scene(&self, width: u32, height: u32) -> RgbaImage {
        let mut target = RgbaImage::from_pixel(width, height, Rgba([255, 255, 255, 255]));
        for id in self.sorted_ids() {
            if let Some(obj) = self.objects.get(&id) {
                self.draw(&mut target, obj);
            }
        }
        target
    }

    fn insert_raster(&mut self, img: &RgbaImage, x: f64, y: f64) -> Result<ObjectId, ModelError> {
        let src = encode_data_url(img)?;
        let id = self.create(
            ObjectKind::Image,
            x,
            y,
            f64::from(img.width()),
            f64::from(img.height()),
            serde_json::json!({ "src": src }),
        );
        Ok(id)
    }
}
