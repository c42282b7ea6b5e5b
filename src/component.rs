//! Component Registry — named reusable templates of serialized subtrees.
//!
//! DESIGN
//! ======
//! A component is a deep [`SceneTree`] captured from a selection at save
//! time. Components are templates, not live links: deleting one never touches
//! existing instances, and instances never re-sync from the template. A new
//! save always creates a new component; nothing is mutated in place.
//!
//! The registry persists the full list under one store key on every change.
//! Load failures at startup are swallowed with a log — a corrupt component
//! set degrades to an empty registry, never a failed editor.

#[cfg(test)]
#[path = "component_test.rs"]
mod component_test;

use serde::{Deserialize, Serialize};
use tracing::warn;
use uuid::Uuid;

use crate::error::{ErrorCode, Severity};
use crate::object::{SceneTree, now_ms};
use crate::store::Store;

/// Store key the component list persists under.
pub const COMPONENTS_KEY: &str = "components";

#[derive(Debug, thiserror::Error)]
pub enum ComponentError {
    #[error("component template is empty")]
    EmptyTree,
    #[error("component not found: {0}")]
    NotFound(Uuid),
}

impl ErrorCode for ComponentError {
    fn error_code(&self) -> &'static str {
        match self {
            Self::EmptyTree => "E_EMPTY_COMPONENT",
            Self::NotFound(_) => "E_COMPONENT_NOT_FOUND",
        }
    }

    fn severity(&self) -> Severity {
        Severity::UserActionable
    }
}

/// A named, reusable serialized template of one or more visual objects.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Component {
    pub id: Uuid,
    pub name: String,
    /// Milliseconds since Unix epoch at save time.
    pub created_at: i64,
    /// The captured subtree. Never mutated after registration.
    pub tree: SceneTree,
}

/// In-memory component list, most-recently-created first, mirrored to a store.
#[derive(Default)]
pub struct ComponentRegistry {
    components: Vec<Component>,
}

impl ComponentRegistry {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Hydrate the registry from the store. A missing key yields an empty
    /// registry; an unreadable list is logged and discarded.
    pub fn load(store: &dyn Store) -> Self {
        let components = match store.load(COMPONENTS_KEY) {
            Ok(Some(value)) => match serde_json::from_value::<Vec<Component>>(value) {
                Ok(list) => list,
                Err(e) => {
                    warn!(error = %e, "component list unreadable; starting empty");
                    Vec::new()
                }
            },
            Ok(None) => Vec::new(),
            Err(e) => {
                warn!(error = %e, "component list load failed; starting empty");
                Vec::new()
            }
        };
        Self { components }
    }

    /// Register a new component from a captured tree. Prepends to the list
    /// and persists it; the live scene is not touched.
    ///
    /// # Errors
    ///
    /// Returns `EmptyTree` if the tree contains no objects.
    pub fn register(&mut self, store: &mut dyn Store, name: &str, tree: SceneTree) -> Result<Uuid, ComponentError> {
        if tree.is_empty() {
            return Err(ComponentError::EmptyTree);
        }
        let component = Component {
            id: Uuid::new_v4(),
            name: name.to_owned(),
            created_at: now_ms(),
            tree,
        };
        let id = component.id;
        self.components.insert(0, component);
        self.persist(store);
        Ok(id)
    }

    /// All components, most-recently-created first.
    #[must_use]
    pub fn list(&self) -> &[Component] {
        &self.components
    }

    #[must_use]
    pub fn get(&self, id: Uuid) -> Option<&Component> {
        self.components.iter().find(|c| c.id == id)
    }

    /// Remove a component from the list and persist. Existing instances keep
    /// their `component_id` tag and are unaffected.
    ///
    /// # Errors
    ///
    /// Returns `NotFound` if no component has the given id.
    pub fn remove(&mut self, store: &mut dyn Store, id: Uuid) -> Result<(), ComponentError> {
        let before = self.components.len();
        self.components.retain(|c| c.id != id);
        if self.components.len() == before {
            return Err(ComponentError::NotFound(id));
        }
        self.persist(store);
        Ok(())
    }

    /// Export the component list as a plain JSON value.
    #[must_use]
    pub fn export(&self) -> serde_json::Value {
        serde_json::to_value(&self.components).unwrap_or_else(|_| serde_json::json!([]))
    }

    /// Import components from a plain JSON value, prepending them, and
    /// persist the merged list. Returns how many were imported.
    ///
    /// # Errors
    ///
    /// Returns `EmptyTree` if the value is not a component list.
    pub fn import(&mut self, store: &mut dyn Store, value: &serde_json::Value) -> Result<usize, ComponentError> {
        let imported: Vec<Component> =
            serde_json::from_value(value.clone()).map_err(|_| ComponentError::EmptyTree)?;
        let count = imported.len();
        for component in imported.into_iter().rev() {
            self.components.insert(0, component);
        }
        self.persist(store);
        Ok(count)
    }

    fn persist(&self, store: &mut dyn Store) {
        let value = self.export();
        if let Err(e) = store.save(COMPONENTS_KEY, &value) {
            warn!(error = %e, "component list persist failed");
        }
    }
}
