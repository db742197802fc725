//! Error types for the core model.

use thiserror::Error;

/// Result type alias for core operations.
pub type CoreResult<T> = Result<T, CoreError>;

/// Errors that can occur while building or loading the resource model.
#[derive(Error, Debug)]
pub enum CoreError {
    #[error("Invalid provider: {0}")]
    InvalidProvider(String),

    #[error("Invalid filter '{expression}': {reason}")]
    InvalidFilter { expression: String, reason: String },

    #[error("Invalid resource document: {0}")]
    InvalidDocument(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}
