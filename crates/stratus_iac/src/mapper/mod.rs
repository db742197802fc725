//! Resource mappers: discovered resources to Terraform resource blocks.

mod aws;
mod index;
mod model;
pub mod naming;

use std::collections::HashMap;
use std::sync::Arc;

use tracing::debug;

use stratus_core::{CloudProvider, Resource};

use crate::error::{IacError, IacResult};

pub use aws::{AwsMapper, MappingInput, MappingStrategy};
pub use index::{IndexEntry, ResourceIndex};
pub use model::{ConfigValue, MappedResource, Output, ProviderConfig, Variable};
pub use naming::{is_valid_identifier, normalize_file_stem, sanitize_resource_name};

/// Translates one provider's resources.
///
/// Implementations are stateless and shared across generation runs.
pub trait ResourceMapper: Send + Sync {
    fn provider(&self) -> CloudProvider;

    /// Resource types this mapper can translate.
    fn supported_types(&self) -> Vec<String>;

    fn supports(&self, resource_type: &str) -> bool {
        self.supported_types().iter().any(|t| t == resource_type)
    }

    /// Map a resource on its own. References to other resources stay literal.
    fn map_resource(&self, resource: &Resource) -> IacResult<MappedResource> {
        let index = ResourceIndex::build(std::slice::from_ref(resource));
        self.map_resource_in(resource, &index)
    }

    /// Map a resource as part of a batch, resolving references through `index`.
    fn map_resource_in(&self, resource: &Resource, index: &ResourceIndex) -> IacResult<MappedResource>;

    /// Provider block settings for a set of this provider's resources.
    fn provider_config(&self, resources: &[Resource]) -> ProviderConfig {
        let mut regions: Vec<&str> = resources
            .iter()
            .map(|r| r.region.as_str())
            .filter(|r| !r.is_empty())
            .collect();
        regions.sort_unstable();

        let region = regions
            .first()
            .copied()
            .or_else(|| self.provider().default_region())
            .unwrap_or_default();
        ProviderConfig::for_provider(self.provider()).with_region(region)
    }

    /// Addresses within `batch` that `resource` refers to.
    fn dependencies(&self, resource: &Resource, batch: &[Resource]) -> Vec<String> {
        let index = ResourceIndex::build(batch);
        match self.map_resource_in(resource, &index) {
            Ok(mapped) => mapped
                .dependencies
                .into_iter()
                .filter(|address| index.contains_address(address))
                .collect(),
            Err(_) => Vec::new(),
        }
    }

    /// Structural checks on a mapping result.
    fn validate_mapping(&self, resource: &Resource, mapped: &MappedResource) -> IacResult<()> {
        check_mapping(self.provider(), resource, mapped)
    }
}

/// Checks every mapping must pass: the type carries the provider's prefix
/// and the name is a valid identifier.
pub fn check_mapping(provider: CloudProvider, resource: &Resource, mapped: &MappedResource) -> IacResult<()> {
    if !mapped.resource_type.starts_with(provider.resource_prefix()) {
        return Err(IacError::invalid(
            &resource.id,
            format!(
                "resource type '{}' does not start with '{}'",
                mapped.resource_type,
                provider.resource_prefix()
            ),
        ));
    }
    if !is_valid_identifier(&mapped.resource_name) {
        return Err(IacError::invalid(
            &resource.id,
            format!("'{}' is not a valid resource name", mapped.resource_name),
        ));
    }
    Ok(())
}

/// One mapper per cloud provider.
pub struct MapperRegistry {
    mappers: HashMap<CloudProvider, Arc<dyn ResourceMapper>>,
}

impl MapperRegistry {
    pub fn new() -> Self {
        Self {
            mappers: HashMap::new(),
        }
    }

    /// Registry with the built-in mappers.
    pub fn with_defaults() -> Self {
        let mut registry = Self::new();
        registry.register(Arc::new(AwsMapper::new()));
        registry
    }

    /// Register a mapper under its `provider()`, replacing any existing one.
    pub fn register(&mut self, mapper: Arc<dyn ResourceMapper>) {
        let provider = mapper.provider();
        debug!("Registering mapper: {}", provider);
        self.mappers.insert(provider, mapper);
    }

    pub fn get(&self, provider: CloudProvider) -> Option<Arc<dyn ResourceMapper>> {
        self.mappers.get(&provider).cloned()
    }

    pub fn contains(&self, provider: CloudProvider) -> bool {
        self.mappers.contains_key(&provider)
    }

    /// Registered providers, sorted.
    pub fn providers(&self) -> Vec<CloudProvider> {
        let mut providers: Vec<_> = self.mappers.keys().copied().collect();
        providers.sort();
        providers
    }

    /// Whether some registered mapper can translate this resource.
    pub fn can_map(&self, resource: &Resource) -> bool {
        self.mappers
            .get(&resource.provider)
            .is_some_and(|m| m.supports(&resource.resource_type))
    }

    pub fn len(&self) -> usize {
        self.mappers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.mappers.is_empty()
    }
}

impl Default for MapperRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for MapperRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MapperRegistry")
            .field("mappers", &self.providers())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_registry_defaults() {
        let registry = MapperRegistry::with_defaults();
        assert_eq!(registry.providers(), vec![CloudProvider::Aws]);
        assert!(registry.get(CloudProvider::Gcp).is_none());

        let vpc = Resource::new(CloudProvider::Aws, "aws_vpc", "vpc-1");
        let widget = Resource::new(CloudProvider::Aws, "aws_unknown_widget", "w-1");
        assert!(registry.can_map(&vpc));
        assert!(!registry.can_map(&widget));
    }

    #[test]
    fn test_check_mapping_rejects_foreign_prefix() {
        let resource = Resource::new(CloudProvider::Aws, "aws_vpc", "vpc-1");
        let mapped = MappedResource::new(&resource, "google_compute_network", "vpc_1");
        assert!(matches!(
            check_mapping(CloudProvider::Aws, &resource, &mapped),
            Err(IacError::InvalidMapping { .. })
        ));

        let mapped = MappedResource::new(&resource, "aws_vpc", "Bad-Name");
        assert!(check_mapping(CloudProvider::Aws, &resource, &mapped).is_err());
    }
}
