//! Persistence Adapter — local key/value storage with stubbed remote hooks.
//!
//! DESIGN
//! ======
//! Everything persisted (projects, components, recordings) goes through the
//! [`Store`] trait as plain JSON values. [`MemoryStore`] backs tests;
//! [`FileStore`] is the localStorage stand-in, one JSON file per key.
//!
//! Writes are read-modify-write with no transactional guarantee: concurrent
//! writers racing the same key are last-writer-wins. Documented limitation,
//! not fixed here.
//!
//! `upload`/`download` are the integration seam to a backend. They are
//! defined but stubbed: upload acknowledges without network effect, download
//! finds nothing. A real implementation overrides both.

#[cfg(test)]
#[path = "store_test.rs"]
mod store_test;

use std::collections::BTreeMap;
use std::path::PathBuf;

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::{ErrorCode, Severity};
use crate::object::now_ms;

#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("invalid store key: {0}")]
    InvalidKey(String),
    #[error("store io error: {0}")]
    Io(#[from] std::io::Error),
    #[error("store serialization error: {0}")]
    Serde(#[from] serde_json::Error),
}

impl ErrorCode for StoreError {
    fn error_code(&self) -> &'static str {
        match self {
            Self::InvalidKey(_) => "E_INVALID_KEY",
            Self::Io(_) => "E_STORE_IO",
            Self::Serde(_) => "E_STORE_SERDE",
        }
    }
}

/// Acknowledgement returned by the stubbed remote hooks.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RemoteAck {
    pub key: String,
    pub ts: i64,
    /// Always true for the stub: the payload was accepted, nowhere.
    pub accepted: bool,
}

/// Local key/value persistence over plain JSON values.
pub trait Store {
    /// Persist a value under a key, replacing any previous value.
    ///
    /// # Errors
    ///
    /// Returns a backend error; the previous value is unspecified on failure.
    fn save(&mut self, key: &str, value: &serde_json::Value) -> Result<(), StoreError>;

    /// Load the value under a key, or `None` if absent.
    ///
    /// # Errors
    ///
    /// Returns a backend error if the key exists but cannot be read.
    fn load(&self, key: &str) -> Result<Option<serde_json::Value>, StoreError>;

    /// All keys currently present, sorted.
    ///
    /// # Errors
    ///
    /// Returns a backend error if the listing fails.
    fn list(&self) -> Result<Vec<String>, StoreError>;

    /// Remove a key. Removing an absent key is a no-op.
    ///
    /// # Errors
    ///
    /// Returns a backend error if the removal fails.
    fn remove(&mut self, key: &str) -> Result<(), StoreError>;

    /// Push a value to the remote backend. Stub: acknowledges without any
    /// network effect.
    ///
    /// # Errors
    ///
    /// The stub never fails; real backends may.
    fn upload(&mut self, key: &str, _value: &serde_json::Value) -> Result<RemoteAck, StoreError> {
        debug!(%key, "remote upload stubbed");
        Ok(RemoteAck { key: key.to_owned(), ts: now_ms(), accepted: true })
    }

    /// Fetch a value from the remote backend. Stub: always `None`.
    ///
    /// # Errors
    ///
    /// The stub never fails; real backends may.
    fn download(&self, key: &str) -> Result<Option<serde_json::Value>, StoreError> {
        debug!(%key, "remote download stubbed");
        Ok(None)
    }
}

// =============================================================================
// MEMORY STORE
// =============================================================================

/// In-memory store. `BTreeMap` keeps listings deterministic.
#[derive(Default)]
pub struct MemoryStore {
    entries: BTreeMap<String, serde_json::Value>,
}

impl MemoryStore {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }
}

impl Store for MemoryStore {
    fn save(&mut self, key: &str, value: &serde_json::Value) -> Result<(), StoreError> {
        self.entries.insert(key.to_owned(), value.clone());
        Ok(())
    }

    fn load(&self, key: &str) -> Result<Option<serde_json::Value>, StoreError> {
        Ok(self.entries.get(key).cloned())
    }

    fn list(&self) -> Result<Vec<String>, StoreError> {
        Ok(self.entries.keys().cloned().collect())
    }

    fn remove(&mut self, key: &str) -> Result<(), StoreError> {
        self.entries.remove(key);
        Ok(())
    }
}

// =============================================================================
// FILE STORE
// =============================================================================

/// One JSON file per key under a directory. Keys are restricted to
/// `[A-Za-z0-9:_-]` and escaped on disk so every key round-trips through a
/// listing: `_` doubles itself and `:` becomes `_c`.
pub struct FileStore {
    dir: PathBuf,
}

/// Escape a key into a portable file stem.
fn encode_key(key: &str) -> String {
    let mut out = String::with_capacity(key.len());
    for c in key.chars() {
        match c {
            '_' => out.push_str("__"),
            ':' => out.push_str("_c"),
            c => out.push(c),
        }
    }
    out
}

/// Invert [`encode_key`]. `None` for stems this store did not write.
fn decode_key(stem: &str) -> Option<String> {
    let mut out = String::with_capacity(stem.len());
    let mut chars = stem.chars();
    while let Some(c) = chars.next() {
        if c == '_' {
            match chars.next() {
                Some('_') => out.push('_'),
                Some('c') => out.push(':'),
                _ => return None,
            }
        } else {
            out.push(c);
        }
    }
    Some(out)
}

impl FileStore {
    /// Open (creating if needed) a file store rooted at `dir`.
    ///
    /// # Errors
    ///
    /// Returns an io error if the directory cannot be created.
    pub fn open(dir: impl Into<PathBuf>) -> Result<Self, StoreError> {
        let dir = dir.into();
        std::fs::create_dir_all(&dir)?;
        Ok(Self { dir })
    }

    fn path_for(&self, key: &str) -> Result<PathBuf, StoreError> {
        if key.is_empty() || !key.chars().all(|c| c.is_ascii_alphanumeric() || matches!(c, ':' | '_' | '-')) {
            return Err(StoreError::InvalidKey(key.to_owned()));
        }
        Ok(self.dir.join(format!("{}.json", encode_key(key))))
    }
}

impl Store for FileStore {
    fn save(&mut self, key: &str, value: &serde_json::Value) -> Result<(), StoreError> {
        let path = self.path_for(key)?;
        let bytes = serde_json::to_vec(value)?;
        std::fs::write(path, bytes)?;
        Ok(())
    }

    fn load(&self, key: &str) -> Result<Option<serde_json::Value>, StoreError> {
        let path = self.path_for(key)?;
        let bytes = match std::fs::read(path) {
            Ok(bytes) => bytes,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(e.into()),
        };
        Ok(Some(serde_json::from_slice(&bytes)?))
    }

    fn list(&self) -> Result<Vec<String>, StoreError> {
        let mut keys = Vec::new();
        for entry in std::fs::read_dir(&self.dir)? {
            let entry = entry?;
            let name = entry.file_name();
            let Some(name) = name.to_str() else { continue };
            if let Some(key) = name.strip_suffix(".json").and_then(decode_key) {
                keys.push(key);
            }
        }
        keys.sort();
        Ok(keys)
    }

    fn remove(&mut self, key: &str) -> Result<(), StoreError> {
        let path = self.path_for(key)?;
        match std::fs::remove_file(path) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e.into()),
        }
    }
}
