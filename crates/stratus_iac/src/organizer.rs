//! Grouping of mapped resources into output files.

use std::collections::BTreeMap;

use tracing::debug;

use crate::mapper::{normalize_file_stem, MappedResource};
use crate::options::OrganizationPattern;

/// File stems reserved for generated declaration files.
pub const RESERVED_STEMS: &[&str] = &["variables", "outputs", "providers", "versions"];

/// Service family for well-known types, keyed by resource type.
const SERVICE_FAMILIES: &[(&str, &str)] = &[
    ("aws_vpc", "vpc"),
    ("aws_subnet", "vpc"),
    ("aws_security_group", "vpc"),
    ("aws_internet_gateway", "vpc"),
    ("aws_nat_gateway", "vpc"),
    ("aws_route_table", "vpc"),
    ("aws_route_table_association", "vpc"),
    ("aws_network_acl", "vpc"),
    ("aws_instance", "ec2"),
    ("aws_eip", "ec2"),
    ("aws_ebs_volume", "ec2"),
    ("aws_launch_template", "ec2"),
    ("aws_s3_bucket", "s3"),
    ("aws_s3_bucket_policy", "s3"),
    ("aws_db_instance", "rds"),
    ("aws_db_subnet_group", "rds"),
    ("aws_rds_cluster", "rds"),
];

/// Service family of a resource type: the table entry, or the first segment
/// after the provider prefix.
pub fn service_family(resource_type: &str, provider_prefix: &str) -> String {
    if let Some((_, family)) = SERVICE_FAMILIES.iter().find(|(t, _)| *t == resource_type) {
        return family.to_string();
    }

    let rest = resource_type.strip_prefix(provider_prefix).unwrap_or(resource_type);
    rest.split('_')
        .find(|segment| !segment.is_empty())
        .unwrap_or(resource_type)
        .to_string()
}

#[derive(Debug, Default)]
pub struct FileOrganizer;

impl FileOrganizer {
    pub fn new() -> Self {
        Self
    }

    /// File name a resource lands in under `pattern`.
    pub fn file_for(&self, resource: &MappedResource, pattern: OrganizationPattern) -> String {
        let group = match pattern {
            OrganizationPattern::Flat => return "main.tf".to_string(),
            OrganizationPattern::ByProvider => resource.provider().as_str().to_string(),
            OrganizationPattern::ByService => {
                service_family(&resource.resource_type, resource.provider().resource_prefix())
            }
            OrganizationPattern::ByRegion => {
                let region = resource.region().trim();
                if region.is_empty() {
                    "global".to_string()
                } else {
                    region.to_string()
                }
            }
            OrganizationPattern::ByResourceType => resource.resource_type.clone(),
        };

        let mut stem = normalize_file_stem(&group);
        if stem.is_empty() {
            stem = "main".to_string();
        }
        if RESERVED_STEMS.contains(&stem.as_str()) {
            stem.push_str("_resources");
        }
        format!("{}.tf", stem)
    }

    /// Group resources by file. Order within a file follows the input.
    pub fn organize_files(
        &self,
        resources: &[MappedResource],
        pattern: OrganizationPattern,
    ) -> BTreeMap<String, Vec<MappedResource>> {
        let mut files: BTreeMap<String, Vec<MappedResource>> = BTreeMap::new();
        for resource in resources {
            files
                .entry(self.file_for(resource, pattern))
                .or_default()
                .push(resource.clone());
        }

        debug!(pattern = %pattern, files = files.len(), "Organized resources");
        files
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use stratus_core::{CloudProvider, Resource};

    fn mapped(provider: CloudProvider, resource_type: &str, name: &str, region: &str) -> MappedResource {
        let resource = Resource::new(provider, resource_type, name).with_region(region);
        MappedResource::new(&resource, resource_type, name)
    }

    fn sample() -> Vec<MappedResource> {
        vec![
            mapped(CloudProvider::Aws, "aws_vpc", "main", "us-east-1"),
            mapped(CloudProvider::Aws, "aws_instance", "web", "us-east-1"),
            mapped(CloudProvider::Aws, "aws_subnet", "a", "eu-west-1"),
            mapped(CloudProvider::Aws, "aws_s3_bucket", "logs", ""),
            mapped(CloudProvider::Gcp, "google_compute_network", "net", "us-central1"),
        ]
    }

    fn layout(pattern: OrganizationPattern) -> Vec<(String, Vec<String>)> {
        FileOrganizer::new()
            .organize_files(&sample(), pattern)
            .into_iter()
            .map(|(file, resources)| (file, resources.iter().map(|r| r.resource_name.clone()).collect()))
            .collect()
    }

    #[test]
    fn test_flat() {
        let files = layout(OrganizationPattern::Flat);
        assert_eq!(files.len(), 1);
        assert_eq!(files[0].0, "main.tf");
        assert_eq!(files[0].1, vec!["main", "web", "a", "logs", "net"]);
    }

    #[test]
    fn test_by_provider() {
        let files = layout(OrganizationPattern::ByProvider);
        assert_eq!(files[0].0, "aws.tf");
        assert_eq!(files[0].1.len(), 4);
        assert_eq!(files[1].0, "gcp.tf");
    }

    #[test]
    fn test_by_service() {
        let files: BTreeMap<_, _> = layout(OrganizationPattern::ByService).into_iter().collect();
        assert_eq!(files["vpc.tf"], vec!["main", "a"]);
        assert_eq!(files["ec2.tf"], vec!["web"]);
        assert_eq!(files["s3.tf"], vec!["logs"]);
        assert_eq!(files["compute.tf"], vec!["net"]);
    }

    #[test]
    fn test_by_region() {
        let files: BTreeMap<_, _> = layout(OrganizationPattern::ByRegion).into_iter().collect();
        assert_eq!(files["us-east-1.tf"], vec!["main", "web"]);
        assert_eq!(files["global.tf"], vec!["logs"]);
        assert!(files.contains_key("eu-west-1.tf"));
    }

    #[test]
    fn test_by_resource_type() {
        let files: BTreeMap<_, _> = layout(OrganizationPattern::ByResourceType).into_iter().collect();
        assert_eq!(files.len(), 5);
        assert!(files.contains_key("aws_vpc.tf"));
        assert!(files.contains_key("google_compute_network.tf"));
    }

    #[test]
    fn test_reserved_names_are_suffixed() {
        let resource = mapped(CloudProvider::Aws, "aws_thing", "x", "Variables");
        let file = FileOrganizer::new().file_for(&resource, OrganizationPattern::ByRegion);
        assert_eq!(file, "variables_resources.tf");
    }

    #[test]
    fn test_service_family_fallback() {
        assert_eq!(service_family("aws_lambda_function", "aws_"), "lambda");
        assert_eq!(service_family("azurerm_virtual_network", "azurerm_"), "virtual");
        assert_eq!(service_family("custom", "aws_"), "custom");
    }

    #[test]
    fn test_assignment_independent_of_input_order() {
        let organizer = FileOrganizer::new();
        let mut reversed = sample();
        reversed.reverse();

        let forward = organizer.organize_files(&sample(), OrganizationPattern::ByService);
        let backward = organizer.organize_files(&reversed, OrganizationPattern::ByService);
        assert_eq!(
            forward.keys().collect::<Vec<_>>(),
            backward.keys().collect::<Vec<_>>()
        );
    }
}
