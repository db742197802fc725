//! Batch-wide name assignment.

use std::collections::{HashMap, HashSet};

use stratus_core::{CloudProvider, Resource};

use super::naming::sanitize_resource_name;

/// A resource as seen from the rest of the batch.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IndexEntry {
    pub id: String,
    pub resource_type: String,
    pub name: String,
}

impl IndexEntry {
    pub fn address(&self) -> String {
        format!("{}.{}", self.resource_type, self.name)
    }
}

/// Unique Terraform names for every resource of a batch.
///
/// Names come from [`sanitize_resource_name`]; a clash within the same
/// resource type gets a `_2`, `_3`... suffix in batch order. Lookups by
/// provider and provider-native id let mappers turn `vpc_id = "vpc-123"`
/// into a reference to the VPC's real address.
#[derive(Debug, Clone, Default)]
pub struct ResourceIndex {
    entries: Vec<IndexEntry>,
    by_key: HashMap<(CloudProvider, String, String), usize>,
    by_id: HashMap<(CloudProvider, String), usize>,
    by_address: HashMap<String, usize>,
}

impl ResourceIndex {
    pub fn build(resources: &[Resource]) -> Self {
        let mut index = Self::default();
        let mut taken: HashSet<(String, String)> = HashSet::new();

        for resource in resources {
            let key = (resource.provider, resource.region.clone(), resource.id.clone());
            if index.by_key.contains_key(&key) {
                continue;
            }

            let base = sanitize_resource_name(&resource.name, &resource.id);
            let mut name = base.clone();
            let mut suffix = 2;
            while taken.contains(&(resource.resource_type.clone(), name.clone())) {
                name = format!("{}_{}", base, suffix);
                suffix += 1;
            }
            taken.insert((resource.resource_type.clone(), name.clone()));

            let entry = IndexEntry {
                id: resource.id.clone(),
                resource_type: resource.resource_type.clone(),
                name,
            };
            let position = index.entries.len();
            index.by_address.insert(entry.address(), position);
            index.by_key.insert(key, position);
            index
                .by_id
                .entry((resource.provider, resource.id.clone()))
                .or_insert(position);
            index.entries.push(entry);
        }

        index
    }

    /// Assigned name for a resource, or its plain sanitized name when the
    /// resource is not part of the batch.
    pub fn name_for(&self, resource: &Resource) -> String {
        let key = (resource.provider, resource.region.clone(), resource.id.clone());
        match self.by_key.get(&key) {
            Some(position) => self.entries[*position].name.clone(),
            None => sanitize_resource_name(&resource.name, &resource.id),
        }
    }

    /// First resource in the batch with this provider and provider-native id.
    pub fn lookup(&self, provider: CloudProvider, id: &str) -> Option<&IndexEntry> {
        self.by_id
            .get(&(provider, id.to_string()))
            .map(|position| &self.entries[*position])
    }

    /// Like [`lookup`](Self::lookup), restricted to one resource type.
    pub fn lookup_typed(&self, provider: CloudProvider, id: &str, resource_type: &str) -> Option<&IndexEntry> {
        self.lookup(provider, id)
            .filter(|entry| entry.resource_type == resource_type)
    }

    pub fn contains_id(&self, provider: CloudProvider, id: &str) -> bool {
        self.by_id.contains_key(&(provider, id.to_string()))
    }

    pub fn by_address(&self, address: &str) -> Option<&IndexEntry> {
        self.by_address.get(address).map(|position| &self.entries[*position])
    }

    pub fn contains_address(&self, address: &str) -> bool {
        self.by_address.contains_key(address)
    }

    pub fn entries(&self) -> &[IndexEntry] {
        &self.entries
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_duplicate_names_get_suffixes() {
        let resources = vec![
            Resource::new(CloudProvider::Aws, "aws_vpc", "vpc-1").with_name("main"),
            Resource::new(CloudProvider::Aws, "aws_vpc", "vpc-2").with_name("Main"),
            Resource::new(CloudProvider::Aws, "aws_vpc", "vpc-3").with_name("main"),
            Resource::new(CloudProvider::Aws, "aws_subnet", "subnet-1").with_name("main"),
        ];
        let index = ResourceIndex::build(&resources);

        assert_eq!(index.name_for(&resources[0]), "main");
        assert_eq!(index.name_for(&resources[1]), "main_2");
        assert_eq!(index.name_for(&resources[2]), "main_3");
        // Names only need to be unique within a type.
        assert_eq!(index.name_for(&resources[3]), "main");
        assert!(index.contains_address("aws_vpc.main_3"));
    }

    #[test]
    fn test_lookup_by_id() {
        let resources = vec![Resource::new(CloudProvider::Aws, "aws_vpc", "vpc-0abc")];
        let index = ResourceIndex::build(&resources);

        let entry = index.lookup(CloudProvider::Aws, "vpc-0abc").unwrap();
        assert_eq!(entry.address(), "aws_vpc.vpc_0abc");
        assert!(index.lookup(CloudProvider::Aws, "vpc-missing").is_none());
        assert_eq!(index.by_address("aws_vpc.vpc_0abc").unwrap().id, "vpc-0abc");
    }

    #[test]
    fn test_lookup_respects_provider_and_type() {
        let resources = vec![
            Resource::new(CloudProvider::Gcp, "google_compute_network", "net-1"),
            Resource::new(CloudProvider::Aws, "aws_internet_gateway", "igw-1"),
        ];
        let index = ResourceIndex::build(&resources);

        assert!(index.lookup(CloudProvider::Aws, "net-1").is_none());
        assert!(index.contains_id(CloudProvider::Gcp, "net-1"));
        assert!(index.lookup_typed(CloudProvider::Aws, "igw-1", "aws_vpc").is_none());
        assert!(index
            .lookup_typed(CloudProvider::Aws, "igw-1", "aws_internet_gateway")
            .is_some());
    }

    #[test]
    fn test_resource_outside_batch_falls_back_to_sanitized_name() {
        let index = ResourceIndex::build(&[]);
        let stray = Resource::new(CloudProvider::Aws, "aws_vpc", "vpc-9").with_name("Edge VPC");
        assert_eq!(index.name_for(&stray), "edge_vpc");
        assert!(index.is_empty());
    }
}
