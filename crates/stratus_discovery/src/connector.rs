//! Provider connector contracts.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use stratus_core::{CloudProvider, Filter, Resource};

use crate::config::DiscoveryOptions;
use crate::error::ConnectorResult;

/// Scope handed to one provider's connector.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ProviderDiscoveryOptions {
    pub regions: Vec<String>,
    pub resource_types: Vec<String>,
    pub filters: Vec<Filter>,
}

/// Discovery for a single cloud.
///
/// Implementations issue the provider's list/describe calls. They are
/// registered with the `DiscoveryEngine` before any run and shared across
/// concurrent tasks, hence `Send + Sync`.
#[async_trait]
pub trait ProviderConnector: Send + Sync {
    fn provider(&self) -> CloudProvider;

    async fn validate_credentials(&self) -> ConnectorResult<()>;

    async fn regions(&self) -> ConnectorResult<Vec<String>>;

    async fn resource_types(&self) -> ConnectorResult<Vec<String>>;

    async fn discover(&self, options: &ProviderDiscoveryOptions) -> ConnectorResult<Vec<Resource>>;
}

/// A single entry point able to discover several providers at once, e.g. an
/// external inventory service.
#[async_trait]
pub trait MultiProviderDiscoverer: Send + Sync {
    fn supports(&self, provider: CloudProvider) -> bool;

    async fn discover(&self, options: &DiscoveryOptions) -> ConnectorResult<Vec<Resource>>;
}
