//! Domain-specific error types for PTZ control.
//!
//! All fallible operations return `Result<T, PtzError>`.
//! Nothing here is fatal: every failure degrades to "camera unresponsive".

use std::time::Duration;
use thiserror::Error;

/// The canonical error type for the PTZ subsystem.
#[derive(Debug, Error)]
pub enum PtzError {
    // ── Transport Errors ─────────────────────────────────────────
    /// Connecting to or sending to the camera failed.
    #[error("camera unreachable: {0}")]
    Unreachable(String),

    /// No reply arrived within the request deadline.
    #[error("timeout after {0:?}")]
    Timeout(Duration),

    /// A reply could not be decoded.
    #[error("malformed reply: {0}")]
    Malformed(String),

    /// The camera answered with an error code.
    #[error("camera rejected command (code {0:#04x})")]
    Rejected(u8),

    // ── Configuration Errors ─────────────────────────────────────
    /// Host or port rejected before any I/O was attempted.
    #[error("invalid config: {0}")]
    InvalidConfig(String),

    // ── Application Errors ───────────────────────────────────────
    /// A preset or endpoint id did not resolve.
    #[error("{kind} not found: {id}")]
    NotFound { kind: &'static str, id: String },

    /// An argument was out of its domain (NaN, empty name, ...).
    #[error("invalid input: {0}")]
    InvalidInput(String),

    /// The persistence collaborator failed.
    #[error("storage error: {0}")]
    Storage(String),

    /// The command actor for the active endpoint has gone away.
    #[error("channel closed")]
    ChannelClosed,

    /// Local socket setup failed.
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

impl PtzError {
    /// Whether a request that failed this way is worth one more attempt.
    pub fn is_retryable(&self) -> bool {
        matches!(self, PtzError::Timeout(_) | PtzError::Unreachable(_))
    }

    pub(crate) fn not_found(kind: &'static str, id: impl Into<String>) -> Self {
        PtzError::NotFound {
            kind,
            id: id.into(),
        }
    }
}

// ── Convenient From implementations ──────────────────────────────

impl<T> From<tokio::sync::mpsc::error::SendError<T>> for PtzError {
    fn from(_: tokio::sync::mpsc::error::SendError<T>) -> Self {
        PtzError::ChannelClosed
    }
}

impl From<tokio::sync::oneshot::error::RecvError> for PtzError {
    fn from(_: tokio::sync::oneshot::error::RecvError) -> Self {
        PtzError::ChannelClosed
    }
}

impl From<serde_json::Error> for PtzError {
    fn from(e: serde_json::Error) -> Self {
        PtzError::Storage(e.to_string())
    }
}
