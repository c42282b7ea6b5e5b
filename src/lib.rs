//! Headless core for a visual canvas editor.
//!
//! The crate owns the editing semantics — scene state, undo/redo, reusable
//! components, background removal, presence messaging, session recording, and
//! persistence — behind a rendering-engine trait. Hosts bring a renderer (or
//! use the in-process [`model::MemoryModel`]) and a store backend, then drive
//! everything through the [`editor::Editor`] facade.
//!
//! ## Module layout
//!
//! | Module | Role |
//! |--------|------|
//! | [`editor`] | Session facade: mutations, history, projects, exports |
//! | [`object`] | Visual object types and the serialized [`object::SceneTree`] |
//! | [`model`] | Rendering-engine contract and the in-memory reference model |
//! | [`loader`] | Ordered fail-over loading of engine sources |
//! | [`history`] | Bounded snapshot stacks for undo/redo |
//! | [`component`] | Named reusable templates captured from selections |
//! | [`bgremove`] | Border-seeded flood fill background removal |
//! | [`channel`] | Presence and operation pub/sub over a pluggable transport |
//! | [`recorder`] | Bounded pointer capture and click-density heatmaps |
//! | [`store`] | Local key/value persistence with stubbed remote hooks |
//! | [`error`] | Error code and severity taxonomy shared by all modules |

pub mod bgremove;
pub mod channel;
pub mod component;
pub mod editor;
pub mod error;
pub mod history;
pub mod loader;
pub mod model;
pub mod object;
pub mod recorder;
pub mod store;

pub use editor::{Editor, EditorConfig, EditorError, Placement};
pub use error::{ErrorCode, Severity};
pub use model::{MemoryModel, ObjectModel, SceneEvent};
pub use object::{ObjectId, ObjectKind, PartialObject, SceneTree, VisualObject};
pub use store::{FileStore, MemoryStore, Store};
