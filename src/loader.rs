//! Engine loader — ordered fail-over across rendering-engine sources.
//!
//! DESIGN
//! ======
//! The rendering engine arrives from outside the core (a dynamic module, a
//! bundled fallback, a headless stand-in). Startup walks an ordered source
//! list: each source gets a bounded wait; on timeout or failure the loader
//! logs and moves on. Exhausting the list is fatal-at-startup — the editor
//! shows one message and does not start.

#[cfg(test)]
#[path = "loader_test.rs"]
mod loader_test;

use std::future::Future;
use std::pin::Pin;
use std::time::Duration;

use tracing::{info, warn};

use crate::error::{ErrorCode, Severity};
use crate::model::ObjectModel;

pub const DEFAULT_ENGINE_TIMEOUT_MS: u64 = 8_000;

type ModelFuture = Pin<Box<dyn Future<Output = Result<Box<dyn ObjectModel>, LoadError>> + Send>>;

#[derive(Debug, thiserror::Error)]
pub enum LoadError {
    #[error("engine source failed: {0}")]
    SourceFailed(String),
    #[error("all engine sources exhausted")]
    Exhausted,
}

impl ErrorCode for LoadError {
    fn error_code(&self) -> &'static str {
        match self {
            Self::SourceFailed(_) => "E_ENGINE_SOURCE",
            Self::Exhausted => "E_ENGINE_EXHAUSTED",
        }
    }

    fn severity(&self) -> Severity {
        Severity::Fatal
    }
}

/// One candidate origin for the rendering engine.
pub struct EngineSource {
    pub name: String,
    factory: Box<dyn Fn() -> ModelFuture + Send>,
}

impl EngineSource {
    pub fn new<F, Fut>(name: impl Into<String>, factory: F) -> Self
    where
        F: Fn() -> Fut + Send + 'static,
        Fut: Future<Output = Result<Box<dyn ObjectModel>, LoadError>> + Send + 'static,
    {
        Self { name: name.into(), factory: Box::new(move || Box::pin(factory())) }
    }
}

/// Try each source in order with a bounded wait, returning the first engine
/// that comes up.
///
/// # Errors
///
/// Returns `Exhausted` after every source timed out or failed.
pub async fn load_engine(sources: Vec<EngineSource>, per_source: Duration) -> Result<Box<dyn ObjectModel>, LoadError> {
    for source in sources {
        match tokio::time::timeout(per_source, (source.factory)()).await {
            Ok(Ok(model)) => {
                info!(source = %source.name, "engine loaded");
                return Ok(model);
            }
            Ok(Err(e)) => {
                warn!(source = %source.name, error = %e, "engine source failed; trying next");
            }
            Err(_) => {
                warn!(source = %source.name, timeout = ?per_source, "engine source timed out; trying next");
            }
        }
    }
    Err(LoadError::Exhausted)
}
