//! Error classification shared across the editor core.
//!
//! DESIGN
//! ======
//! Every public operation returns a typed error; nothing propagates uncaught.
//! Each error enum implements [`ErrorCode`] so callers get a grepable code
//! and a severity bucket instead of matching on display strings:
//!
//! - `Fatal` — the editor cannot start (engine load exhausted, no mount).
//! - `UserActionable` — invalid op for the current selection; surface a
//!   notification, state unchanged.
//! - `Degraded` — a collaborator is unavailable; log and continue inert.
//! - `Internal` — swallowed-with-log failures inside best-effort operations.

/// Severity bucket for a core error. Decides how the surrounding UI reacts.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Severity {
    /// Editor cannot start or continue.
    Fatal,
    /// Invalid operation for the current state; notify the user, no side effects.
    UserActionable,
    /// A collaborator is unavailable; the feature goes inert, not the editor.
    Degraded,
    /// Caught and logged inside a best-effort operation.
    Internal,
}

/// Grepable error code and severity for structured error reporting.
pub trait ErrorCode: std::fmt::Display {
    fn error_code(&self) -> &'static str;

    fn severity(&self) -> Severity {
        Severity::Internal
    }
}
