//! Error types for IaC generation.

use std::path::PathBuf;
use std::time::Duration;

use thiserror::Error;

use crate::result::GenerationIssue;

/// Result type alias for mapping and rendering operations.
pub type IacResult<T> = Result<T, IacError>;

/// Result type alias for engine operations.
pub type GenerationEngineResult<T> = Result<T, GenerationError>;

/// Errors raised while mapping, analysing or rendering a single resource or
/// file. The engine records these as issues instead of failing the run.
#[derive(Error, Debug)]
pub enum IacError {
    #[error("Unsupported resource type: {0}")]
    UnsupportedResourceType(String),

    #[error("Missing attribute '{attribute}' on {resource_id}")]
    MissingAttribute { resource_id: String, attribute: String },

    #[error("Invalid mapping for {resource_id}: {reason}")]
    InvalidMapping { resource_id: String, reason: String },

    #[error("Render failed: {0}")]
    Render(String),

    #[error("Syntax error at line {line}: {message}")]
    Syntax { line: usize, message: String },

    #[error("Cyclic dependency: {0}")]
    CyclicDependency(String),

    #[error("Invalid pattern: {0}")]
    Pattern(#[from] regex::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl IacError {
    pub fn missing(resource_id: impl Into<String>, attribute: impl Into<String>) -> Self {
        IacError::MissingAttribute {
            resource_id: resource_id.into(),
            attribute: attribute.into(),
        }
    }

    pub fn invalid(resource_id: impl Into<String>, reason: impl Into<String>) -> Self {
        IacError::InvalidMapping {
            resource_id: resource_id.into(),
            reason: reason.into(),
        }
    }
}

/// Errors that fail a whole generation call.
#[derive(Error, Debug)]
pub enum GenerationError {
    #[error("Invalid generation options: {0}")]
    InvalidOptions(String),

    #[error("No renderer registered for format: {0}")]
    NoRendererForFormat(String),

    #[error("No resources could be mapped ({} issues recorded)", .issues.len())]
    NothingMapped { issues: Vec<GenerationIssue> },

    #[error("Output file already exists: {0} (use force to overwrite)")]
    OutputExists(PathBuf),

    #[error("Generation timed out after {0:?}")]
    Timeout(Duration),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}
