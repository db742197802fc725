//! Error types for discovery.

use std::time::Duration;

use thiserror::Error;

use stratus_core::CloudProvider;

/// Result type alias for connector operations.
pub type ConnectorResult<T> = Result<T, ConnectorError>;

/// Result type alias for engine operations.
pub type DiscoveryEngineResult<T> = Result<T, DiscoveryEngineError>;

/// Errors raised by a single provider connector. Recorded per provider,
/// never fatal to a whole discovery run.
#[derive(Error, Debug)]
pub enum ConnectorError {
    #[error("Credential validation failed: {0}")]
    Credentials(String),

    #[error("Provider API error: {0}")]
    Api(String),

    #[error("Unsupported region: {0}")]
    UnsupportedRegion(String),

    #[error("Unsupported resource type: {0}")]
    UnsupportedResourceType(String),

    #[error("Snapshot error: {0}")]
    Snapshot(#[from] stratus_core::CoreError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Errors that fail a whole engine call.
#[derive(Error, Debug)]
pub enum DiscoveryEngineError {
    #[error("Invalid discovery options: {0}")]
    InvalidOptions(String),

    #[error("No connector registered for provider: {0}")]
    ProviderNotRegistered(CloudProvider),

    #[error("Credential validation failed for {}", .0.join("; "))]
    CredentialsFailed(Vec<String>),

    #[error("Discovery timed out after {0:?} before any provider returned resources")]
    Timeout(Duration),

    #[error("Discovery was cancelled before any provider returned resources")]
    Cancelled,

    #[error("Connector error: {0}")]
    Connector(#[from] ConnectorError),
}
