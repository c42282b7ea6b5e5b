//! Editor facade — wires the object model, history, components, recorder,
//! presence channel, and persistence into one session.
//!
//! DESIGN
//! ======
//! The editor owns the scene for the session. Every structural mutation
//! entry point is synchronous: mutate, emit a scene event, push a history
//! snapshot — in that order, completing before the call returns. That
//! synchronous tail is the only ordering guarantee the core needs: a push
//! always happens-after the mutation it captures and happens-before the next
//! mutation is accepted.
//!
//! ERROR HANDLING
//! ==============
//! Adapter-boundary failures are caught here and mapped to the severity
//! taxonomy. Undo/redo restore failures are logged and abandoned with the
//! stacks untouched; user-actionable conditions come back as typed errors;
//! nothing propagates uncaught.

#[cfg(test)]
#[path = "editor_test.rs"]
mod editor_test;

use std::fmt::Write as _;

use image::RgbaImage;
use tokio::sync::broadcast;
use tracing::{info, warn};
use uuid::Uuid;

use crate::bgremove::{self, Tolerance};
use crate::channel::PresenceChannel;
use crate::component::{ComponentError, ComponentRegistry};
use crate::error::{ErrorCode, Severity};
use crate::history::{DEFAULT_HISTORY_LIMIT, History};
use crate::loader::DEFAULT_ENGINE_TIMEOUT_MS;
use crate::model::{ModelError, ObjectModel, SceneEvent};
use crate::object::{ObjectId, ObjectKind, PartialObject, Props, SceneTree, VisualObject};
use crate::recorder::{
    DEFAULT_RECORDER_CAPACITY, PointerEvent, Recording, SessionRecorder, delete_recording, list_recordings,
    load_recording, render_heatmap,
};
use crate::store::{Store, StoreError};

/// Store key prefix for saved projects.
pub const PROJECT_KEY_PREFIX: &str = "project:";

const EVENT_CHANNEL_CAPACITY: usize = 256;

#[derive(Debug, thiserror::Error)]
pub enum EditorError {
    #[error("select an image first")]
    NotAnImage,
    #[error("nothing selected")]
    NoSelection,
    #[error("project not found: {0}")]
    ProjectNotFound(String),
    #[error("recording not found: {0}")]
    RecordingNotFound(Uuid),
    #[error(transparent)]
    Component(#[from] ComponentError),
    #[error(transparent)]
    Model(#[from] ModelError),
    #[error(transparent)]
    Store(#[from] StoreError),
}

impl ErrorCode for EditorError {
    fn error_code(&self) -> &'static str {
        match self {
            Self::NotAnImage => "E_NOT_AN_IMAGE",
            Self::NoSelection => "E_NO_SELECTION",
            Self::ProjectNotFound(_) => "E_PROJECT_NOT_FOUND",
            Self::RecordingNotFound(_) => "E_RECORDING_NOT_FOUND",
            Self::Component(e) => e.error_code(),
            Self::Model(e) => e.error_code(),
            Self::Store(e) => e.error_code(),
        }
    }

    fn severity(&self) -> Severity {
        match self {
            Self::NotAnImage | Self::NoSelection | Self::ProjectNotFound(_) | Self::RecordingNotFound(_) => {
                Severity::UserActionable
            }
            Self::Component(e) => e.severity(),
            Self::Model(e) => e.severity(),
            Self::Store(e) => e.severity(),
        }
    }
}

/// Tuning knobs, loaded from environment variables with defaults.
#[derive(Debug, Clone, Copy)]
pub struct EditorConfig {
    /// Maximum undo stack depth.
    pub history_limit: usize,
    /// Pointer-event ring buffer capacity.
    pub recorder_capacity: usize,
    /// Per-channel flood-fill tolerance.
    pub tolerance: Tolerance,
    /// Bounded wait per engine source at startup, in milliseconds.
    pub engine_timeout_ms: u64,
}

impl EditorConfig {
    #[must_use]
    pub fn from_env() -> Self {
        Self {
            history_limit: env_parse("ATELIER_HISTORY_LIMIT", DEFAULT_HISTORY_LIMIT),
            recorder_capacity: env_parse("ATELIER_RECORDER_CAPACITY", DEFAULT_RECORDER_CAPACITY),
            tolerance: Tolerance::uniform(env_parse("ATELIER_FILL_TOLERANCE", bgremove::DEFAULT_TOLERANCE)),
            engine_timeout_ms: env_parse("ATELIER_ENGINE_TIMEOUT_MS", DEFAULT_ENGINE_TIMEOUT_MS),
        }
    }
}

impl Default for EditorConfig {
    fn default() -> Self {
        Self {
            history_limit: DEFAULT_HISTORY_LIMIT,
            recorder_capacity: DEFAULT_RECORDER_CAPACITY,
            tolerance: Tolerance::default(),
            engine_timeout_ms: DEFAULT_ENGINE_TIMEOUT_MS,
        }
    }
}

pub(crate) fn env_parse<T>(key: &str, default: T) -> T
where
    T: std::str::FromStr + Copy,
{
    std::env::var(key)
        .ok()
        .and_then(|v| v.parse::<T>().ok())
        .unwrap_or(default)
}

/// Target position for a component instance.
#[derive(Debug, Clone, Copy)]
pub struct Placement {
    pub x: f64,
    pub y: f64,
}

/// One editing session over a live scene.
pub struct Editor {
    model: Box<dyn ObjectModel>,
    store: Box<dyn Store>,
    history: History,
    components: ComponentRegistry,
    recorder: SessionRecorder,
    channel: PresenceChannel,
    events: broadcast::Sender<SceneEvent>,
    config: EditorConfig,
}

impl Editor {
    /// Start a session over a loaded engine and a local store. The component
    /// list is hydrated from the store; corruption degrades to empty.
    #[must_use]
    pub fn new(model: Box<dyn ObjectModel>, store: Box<dyn Store>, config: EditorConfig) -> Self {
        let components = ComponentRegistry::load(&*store);
        let (events, _) = broadcast::channel(EVENT_CHANNEL_CAPACITY);
        Self {
            model,
            store,
            history: History::new(config.history_limit),
            components,
            recorder: SessionRecorder::new(config.recorder_capacity),
            channel: PresenceChannel::new(),
            events,
            config,
        }
    }

    /// Subscribe to scene change notifications (inspector refresh seam).
    #[must_use]
    pub fn subscribe(&self) -> broadcast::Receiver<SceneEvent> {
        self.events.subscribe()
    }

    fn emit(&self, event: SceneEvent) {
        // No receivers is fine; events are advisory.
        let _ = self.events.send(event);
    }

    fn push_history(&mut self) {
        self.history.push(self.model.serialize_scene());
    }

    // =========================================================================
    // SCENE MUTATION
    // =========================================================================

    /// Create an object and snapshot the scene.
    pub fn create_object(
        &mut self,
        kind: ObjectKind,
        x: f64,
        y: f64,
        width: f64,
        height: f64,
        props: serde_json::Value,
    ) -> ObjectId {
        let id = self.model.create(kind, x, y, width, height, props);
        self.emit(SceneEvent::Added(id));
        self.push_history();
        id
    }

    /// Apply a sparse update and snapshot the scene.
    ///
    /// # Errors
    ///
    /// Returns the model error; no snapshot is pushed on failure.
    pub fn update_object(&mut self, id: ObjectId, partial: &PartialObject) -> Result<(), EditorError> {
        self.model.update(id, partial)?;
        self.emit(SceneEvent::Modified(id));
        self.push_history();
        Ok(())
    }

    /// Remove an object and snapshot the scene.
    ///
    /// # Errors
    ///
    /// Returns the model error; no snapshot is pushed on failure.
    pub fn remove_object(&mut self, id: ObjectId) -> Result<(), EditorError> {
        self.model.remove(id)?;
        self.emit(SceneEvent::Removed(id));
        self.push_history();
        Ok(())
    }

    /// Change the active selection. Not a structural mutation: no snapshot.
    ///
    /// # Errors
    ///
    /// Returns the model error if the id is not live.
    pub fn select(&mut self, id: Option<ObjectId>) -> Result<(), EditorError> {
        self.model.set_active(id)?;
        self.emit(SceneEvent::SelectionChanged(id));
        Ok(())
    }

    #[must_use]
    pub fn selection(&self) -> Option<ObjectId> {
        self.model.active().map(|o| o.id)
    }

    #[must_use]
    pub fn object(&self, id: ObjectId) -> Option<&VisualObject> {
        self.model.get(id)
    }

    #[must_use]
    pub fn objects(&self) -> Vec<&VisualObject> {
        self.model.objects()
    }

    // =========================================================================
    // HISTORY
    // =========================================================================

    /// Step the scene back one snapshot. Returns `false` when there is
    /// nothing to undo. A failed restore is logged and abandoned: stacks and
    /// scene keep their pre-operation state.
    pub fn undo(&mut self) -> bool {
        let Some(target) = self.history.undo_target() else {
            return false;
        };
        match self.model.restore(&target) {
            Ok(()) => {
                self.history.commit_undo();
                self.emit(SceneEvent::SelectionChanged(self.selection()));
                true
            }
            Err(e) => {
                warn!(error = %e, "undo restore failed; abandoned");
                false
            }
        }
    }

    /// Step the scene forward one snapshot. Symmetric with [`Editor::undo`].
    pub fn redo(&mut self) -> bool {
        let Some(target) = self.history.redo_target() else {
            return false;
        };
        match self.model.restore(&target) {
            Ok(()) => {
                self.history.commit_redo();
                self.emit(SceneEvent::SelectionChanged(self.selection()));
                true
            }
            Err(e) => {
                warn!(error = %e, "redo restore failed; abandoned");
                false
            }
        }
    }

    #[must_use]
    pub fn history(&self) -> &History {
        &self.history
    }

    // =========================================================================
    // COMPONENTS
    // =========================================================================

    /// Register a component from the current selection.
    ///
    /// # Errors
    ///
    /// Returns `NoSelection` when nothing is active.
    pub fn register_component(&mut self, name: &str) -> Result<Uuid, EditorError> {
        let Some(active) = self.model.active() else {
            return Err(EditorError::NoSelection);
        };
        let tree = self.model.serialize(&[active.id])?;
        Ok(self.components.register(&mut *self.store, name, tree)?)
    }

    /// Register a component from an explicit object set (multi-select).
    ///
    /// # Errors
    ///
    /// Returns the model error if any id is not live, or `EmptyTree` for an
    /// empty set.
    pub fn register_component_from(&mut self, name: &str, ids: &[ObjectId]) -> Result<Uuid, EditorError> {
        let tree = self.model.serialize(ids)?;
        Ok(self.components.register(&mut *self.store, name, tree)?)
    }

    #[must_use]
    pub fn components(&self) -> &ComponentRegistry {
        &self.components
    }

    /// Delete a component. Existing instances are unaffected.
    ///
    /// # Errors
    ///
    /// Returns `NotFound` if no component has the given id.
    pub fn remove_component(&mut self, id: Uuid) -> Result<(), EditorError> {
        Ok(self.components.remove(&mut *self.store, id)?)
    }

    /// Instantiate a component into the scene as one positioned unit with a
    /// fresh root id, tagged with its template lineage. Template coordinates
    /// are kept when `placement` is omitted. The instance becomes the active
    /// object and the scene is snapshotted.
    ///
    /// # Errors
    ///
    /// Returns `Component(NotFound)` for an unknown id — user-actionable,
    /// never fatal.
    pub fn instantiate_component(&mut self, id: Uuid, placement: Option<Placement>) -> Result<ObjectId, EditorError> {
        let Some(component) = self.components.get(id) else {
            return Err(ComponentError::NotFound(id).into());
        };
        let tree = component.tree.clone();
        if tree.is_empty() {
            // Only reachable via an imported list that skipped validation.
            return Err(ComponentError::EmptyTree.into());
        }

        let root = if tree.len() == 1 {
            let ids = self.model.instantiate(&tree);
            ids[0]
        } else {
            // Wrap multiple roots into a single positioned group.
            let inflated: Vec<VisualObject> = tree.objects.iter().map(VisualObject::with_fresh_ids).collect();
            let (min_x, min_y) = inflated
                .iter()
                .fold((f64::INFINITY, f64::INFINITY), |(mx, my), o| (mx.min(o.x), my.min(o.y)));
            let (max_x, max_y) = inflated.iter().fold((f64::NEG_INFINITY, f64::NEG_INFINITY), |(mx, my), o| {
                (mx.max(o.x + o.width), my.max(o.y + o.height))
            });
            let mut group = VisualObject::new(ObjectKind::Group, min_x, min_y, max_x - min_x, max_y - min_y);
            group.children = inflated;
            let group_id = group.id;
            self.model.insert(group)?;
            group_id
        };

        let mut partial = PartialObject::default();
        if let Some(placement) = placement {
            partial.x = Some(placement.x);
            partial.y = Some(placement.y);
        }
        self.model.update(root, &partial)?;
        self.tag_instance(root, id)?;
        self.model.set_active(Some(root))?;
        self.emit(SceneEvent::Added(root));
        self.push_history();
        Ok(root)
    }

    fn tag_instance(&mut self, root: ObjectId, component_id: Uuid) -> Result<(), EditorError> {
        // Lineage tags live outside `props`; reach through the serialized
        // form to keep the adapter contract narrow.
        let mut tree = self.model.serialize(&[root])?;
        if let Some(obj) = tree.objects.first_mut() {
            obj.component_id = Some(component_id);
            obj.is_instance = true;
        }
        self.model.remove(root)?;
        for obj in tree.objects {
            self.model.insert(obj)?;
        }
        Ok(())
    }

    /// Export the component list as plain JSON.
    #[must_use]
    pub fn export_components(&self) -> serde_json::Value {
        self.components.export()
    }

    /// Import a previously exported component list.
    ///
    /// # Errors
    ///
    /// Returns `EmptyTree` if the value is not a component list.
    pub fn import_components(&mut self, value: &serde_json::Value) -> Result<usize, EditorError> {
        Ok(self.components.import(&mut *self.store, value)?)
    }

    // =========================================================================
    // BACKGROUND REMOVAL
    // =========================================================================

    /// Remove the near-uniform border-connected background of the active
    /// image: rasterize, flood-clear, replace the object with the edited
    /// raster at the same position and display scale, activate it, snapshot.
    ///
    /// # Errors
    ///
    /// Returns `NotAnImage` unless the active object is an image (no side
    /// effects), or the model error if its pixels are unreadable (original
    /// untouched).
    pub fn remove_background(&mut self) -> Result<ObjectId, EditorError> {
        self.remove_background_with(self.config.tolerance)
    }

    /// [`Editor::remove_background`] with an explicit tolerance.
    ///
    /// # Errors
    ///
    /// Same as [`Editor::remove_background`].
    pub fn remove_background_with(&mut self, tolerance: Tolerance) -> Result<ObjectId, EditorError> {
        let Some(active) = self.model.active() else {
            return Err(EditorError::NotAnImage);
        };
        if active.kind != ObjectKind::Image {
            return Err(EditorError::NotAnImage);
        }
        let (old_id, x, y) = (active.id, active.x, active.y);
        let (width, height) = (active.width, active.height);
        let (rotation, z_index) = (active.rotation, active.z_index);

        // Unreadable pixels abort here with the scene untouched.
        let mut raster = self.model.rasterize(old_id)?;
        let cleared = bgremove::clear_background(&mut raster, tolerance);
        info!(object = %old_id, cleared, "background removal");

        // insert_raster sizes the object to the raster's native dimensions;
        // the original's display scale must win.
        let new_id = self.model.insert_raster(&raster, x, y)?;
        self.model.update(
            new_id,
            &PartialObject {
                width: Some(width),
                height: Some(height),
                rotation: Some(rotation),
                z_index: Some(z_index),
                ..Default::default()
            },
        )?;
        self.model.remove(old_id)?;
        self.model.set_active(Some(new_id))?;
        self.emit(SceneEvent::Removed(old_id));
        self.emit(SceneEvent::Added(new_id));
        self.push_history();
        Ok(new_id)
    }

    // =========================================================================
    // PROJECTS
    // =========================================================================

    /// Persist the whole scene under `project:{name}`.
    ///
    /// # Errors
    ///
    /// Returns the store error if the write fails.
    pub fn save_project(&mut self, name: &str) -> Result<(), EditorError> {
        let tree = self.model.serialize_scene();
        let value = serde_json::to_value(&tree).map_err(StoreError::from)?;
        self.store.save(&project_key(name), &value)?;
        info!(%name, objects = tree.len(), "project saved");
        Ok(())
    }

    /// Replace the live scene with a saved project and snapshot the result.
    ///
    /// # Errors
    ///
    /// Returns `ProjectNotFound` for an unknown name; a corrupt project is a
    /// store error and the scene is left untouched.
    pub fn load_project(&mut self, name: &str) -> Result<(), EditorError> {
        let Some(value) = self.store.load(&project_key(name))? else {
            return Err(EditorError::ProjectNotFound(name.to_owned()));
        };
        let tree: SceneTree = serde_json::from_value(value).map_err(StoreError::from)?;
        self.model.restore(&tree)?;
        self.emit(SceneEvent::SelectionChanged(self.selection()));
        self.push_history();
        Ok(())
    }

    /// Names of all saved projects, sorted.
    ///
    /// # Errors
    ///
    /// Returns the store error if the listing fails.
    pub fn list_projects(&self) -> Result<Vec<String>, EditorError> {
        let keys = self.store.list()?;
        Ok(keys
            .into_iter()
            .filter_map(|k| k.strip_prefix(PROJECT_KEY_PREFIX).map(ToOwned::to_owned))
            .collect())
    }

    // =========================================================================
    // RECORDER
    // =========================================================================

    /// Begin capturing pointer events. Returns `false` if already recording.
    pub fn start_recording(&mut self) -> bool {
        self.recorder.start()
    }

    /// Capture one pointer event (surface-relative coordinates).
    pub fn record_pointer(&mut self, event: PointerEvent) {
        self.recorder.record(event);
    }

    /// Stop and persist the capture. `None` when no recording was active.
    ///
    /// # Errors
    ///
    /// Returns the store error if persisting fails.
    pub fn stop_recording(&mut self, name: &str) -> Result<Option<Recording>, EditorError> {
        Ok(self.recorder.stop(&mut *self.store, name)?)
    }

    /// All persisted recordings, newest first; corrupt rows skipped.
    #[must_use]
    pub fn recordings(&self) -> Vec<Recording> {
        list_recordings(&*self.store)
    }

    /// Delete one persisted recording.
    ///
    /// # Errors
    ///
    /// Returns the store error if the removal fails.
    pub fn delete_recording(&mut self, id: Uuid) -> Result<(), EditorError> {
        Ok(delete_recording(&mut *self.store, id)?)
    }

    /// Render a click-density overlay for one recording.
    ///
    /// # Errors
    ///
    /// Returns `RecordingNotFound` for an unknown id.
    pub fn heatmap(&self, id: Uuid, width: u32, height: u32) -> Result<RgbaImage, EditorError> {
        let Some(recording) = load_recording(&*self.store, id)? else {
            return Err(EditorError::RecordingNotFound(id));
        };
        Ok(render_heatmap(&recording, width, height))
    }

    // =========================================================================
    // CHANNEL
    // =========================================================================

    /// The presence channel. Independent of the scene: received operations
    /// are never applied here.
    pub fn channel(&mut self) -> &mut PresenceChannel {
        &mut self.channel
    }

    // =========================================================================
    // EXPORT SURFACES
    // =========================================================================

    /// Export the scene as a flat style-token stylesheet: one CSS custom
    /// property block with fill/stroke/geometry per object.
    #[must_use]
    pub fn export_style_tokens(&self) -> String {
        let mut css = String::from(":root {\n");
        for obj in self.model.objects() {
            let hex = obj.id.simple().to_string();
            let tag = &hex[..8];
            let props = Props::new(&obj.props);
            let _ = writeln!(css, "  --obj-{tag}-fill: {};", props.fill());
            let _ = writeln!(css, "  --obj-{tag}-stroke: {};", props.stroke());
            let _ = writeln!(css, "  --obj-{tag}-left: {}px;", obj.x);
            let _ = writeln!(css, "  --obj-{tag}-top: {}px;", obj.y);
        }
        css.push_str("}\n");
        css
    }

    /// Export the rendered scene as a raster.
    #[must_use]
    pub fn export_scene_raster(&self, width: u32, height: u32) -> RgbaImage {
        self.model.rasterize_scene(width, height)
    }
}

fn project_key(name: &str) -> String {
    format!("{PROJECT_KEY_PREFIX}{name}")
}
