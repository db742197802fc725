//! Offline connector backed by a JSON inventory file.
//!
//! A snapshot is either a saved `DiscoveryResult` or a bare resource array.
//! Only resources of the connector's provider are served, narrowed by the
//! requested regions and resource types.

use std::collections::BTreeSet;
use std::path::{Path, PathBuf};

use async_trait::async_trait;
use tracing::debug;

use stratus_core::{CloudProvider, FilterEvaluator, Resource, ResourceDocument};

use crate::connector::{ProviderConnector, ProviderDiscoveryOptions};
use crate::error::{ConnectorError, ConnectorResult};

pub struct SnapshotConnector {
    provider: CloudProvider,
    path: PathBuf,
}

impl SnapshotConnector {
    pub fn new(provider: CloudProvider, path: impl Into<PathBuf>) -> Self {
        Self {
            provider,
            path: path.into(),
        }
    }

    /// Conventional snapshot location: `<dir>/<provider>.json`.
    pub fn in_dir(provider: CloudProvider, dir: &Path) -> Self {
        Self::new(provider, dir.join(format!("{}.json", provider.as_str())))
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    async fn load(&self) -> ConnectorResult<Vec<Resource>> {
        let content = tokio::fs::read_to_string(&self.path).await?;
        let document = ResourceDocument::from_json(&content)?;
        Ok(document
            .into_resources()
            .into_iter()
            .filter(|r| r.provider == self.provider)
            .collect())
    }
}

#[async_trait]
impl ProviderConnector for SnapshotConnector {
    fn provider(&self) -> CloudProvider {
        self.provider
    }

    async fn validate_credentials(&self) -> ConnectorResult<()> {
        if tokio::fs::try_exists(&self.path).await? {
            Ok(())
        } else {
            Err(ConnectorError::Credentials(format!(
                "snapshot not found: {}",
                self.path.display()
            )))
        }
    }

    async fn regions(&self) -> ConnectorResult<Vec<String>> {
        let regions: BTreeSet<String> = self
            .load()
            .await?
            .into_iter()
            .map(|r| r.region)
            .filter(|r| !r.is_empty())
            .collect();
        Ok(regions.into_iter().collect())
    }

    async fn resource_types(&self) -> ConnectorResult<Vec<String>> {
        let types: BTreeSet<String> = self
            .load()
            .await?
            .into_iter()
            .map(|r| r.resource_type)
            .collect();
        Ok(types.into_iter().collect())
    }

    async fn discover(&self, options: &ProviderDiscoveryOptions) -> ConnectorResult<Vec<Resource>> {
        let resources: Vec<Resource> = self
            .load()
            .await?
            .into_iter()
            .filter(|r| options.regions.is_empty() || options.regions.contains(&r.region))
            .filter(|r| options.resource_types.is_empty() || options.resource_types.contains(&r.resource_type))
            .filter(|r| FilterEvaluator::matches_all(r, &options.filters))
            .collect();

        debug!(
            provider = %self.provider,
            path = %self.path.display(),
            count = resources.len(),
            "Loaded resources from snapshot"
        );
        Ok(resources)
    }
}
