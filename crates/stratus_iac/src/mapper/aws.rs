//! AWS resource mapper.
//!
//! Each supported type has a mapping strategy. Attributes that name another
//! resource (`vpc_id`, `subnet_id`, security groups...) become references
//! when the target is part of the same batch and stay literal otherwise.

use std::collections::BTreeMap;

use tracing::debug;

use stratus_core::{CloudProvider, MetadataValue, Resource};

use super::index::{IndexEntry, ResourceIndex};
use super::model::{ConfigValue, MappedResource, Output, Variable};
use super::naming::sanitize_resource_name;
use super::ResourceMapper;
use crate::error::{IacError, IacResult};

/// Tag added to every managed resource.
pub const MANAGED_BY_TAG: &str = "ManagedBy";

/// Everything a strategy gets to look at.
pub struct MappingInput<'a> {
    pub resource: &'a Resource,
    pub index: &'a ResourceIndex,
}

/// Maps one resource type.
pub type MappingStrategy = fn(&MappingInput<'_>) -> IacResult<MappedResource>;

impl MappingInput<'_> {
    /// Start a mapping with the batch-assigned name and the tag map.
    fn start(&self) -> MappedResource {
        let name = self.index.name_for(self.resource);
        let mut mapped = MappedResource::new(self.resource, &self.resource.resource_type, name);

        let mut tags: BTreeMap<String, ConfigValue> = self
            .resource
            .tags
            .iter()
            .map(|(k, v)| (k.clone(), ConfigValue::String(v.clone())))
            .collect();
        tags.insert(MANAGED_BY_TAG.to_string(), ConfigValue::from("terraform"));
        mapped.set("tags", ConfigValue::Map(tags));
        mapped
    }

    fn required(&self, key: &str) -> IacResult<&str> {
        self.resource
            .metadata_str(key)
            .ok_or_else(|| IacError::missing(&self.resource.id, key))
    }

    fn optional(&self, key: &str) -> Option<String> {
        self.resource.metadata_str(key).map(str::to_string)
    }

    fn flag(&self, key: &str) -> Option<bool> {
        self.resource.metadata_value(key).and_then(MetadataValue::as_bool)
    }

    /// Reference to `target_id` if a `target_type` resource of the same
    /// provider with that id is in the batch, otherwise the literal id. Both
    /// cases are recorded as dependencies; the unresolved one is later
    /// reported as dangling.
    fn resolve(&self, mapped: &mut MappedResource, target_id: &str, target_type: &str) -> ConfigValue {
        match self.target(target_id, target_type) {
            Some(entry) => {
                mapped.add_dependency(entry.address());
                ConfigValue::reference(format!("{}.id", entry.address()))
            }
            None => {
                mapped.add_dependency(format!(
                    "{}.{}",
                    target_type,
                    sanitize_resource_name("", target_id)
                ));
                ConfigValue::String(target_id.to_string())
            }
        }
    }

    /// Like [`resolve`](Self::resolve) but unknown targets are kept literal
    /// without a dependency, for attributes that also accept keywords such
    /// as `local`.
    fn resolve_soft(&self, mapped: &mut MappedResource, target_id: &str, target_type: &str) -> ConfigValue {
        match self.target(target_id, target_type) {
            Some(entry) => {
                mapped.add_dependency(entry.address());
                ConfigValue::reference(format!("{}.id", entry.address()))
            }
            None => ConfigValue::String(target_id.to_string()),
        }
    }

    fn target(&self, target_id: &str, target_type: &str) -> Option<&IndexEntry> {
        self.index
            .lookup_typed(self.resource.provider, target_id, target_type)
    }

    fn link(&self, mapped: &mut MappedResource, attribute: &str, target_type: &str) {
        if let Some(target) = self.resource.metadata_str(attribute) {
            let value = self.resolve(mapped, target, target_type);
            mapped.set(attribute, value);
        }
    }

    /// Collect ids from the first metadata key present and link each one.
    fn link_list(&self, mapped: &mut MappedResource, attribute: &str, keys: &[&str], target_type: &str) {
        let Some(ids) = keys
            .iter()
            .map(|k| self.resource.metadata_string_list(k))
            .find(|ids| !ids.is_empty())
        else {
            return;
        };

        let values = ids
            .iter()
            .map(|id| self.resolve(mapped, id, target_type))
            .collect();
        mapped.set(attribute, ConfigValue::List(values));
    }

    /// Nested blocks from a JSON array of objects, e.g. security group rules.
    fn blocks(&self, key: &str) -> IacResult<Vec<BTreeMap<String, ConfigValue>>> {
        let Some(value) = self.resource.metadata_value(key) else {
            return Ok(Vec::new());
        };
        let items = value
            .list_items()
            .ok_or_else(|| IacError::invalid(&self.resource.id, format!("'{}' must be a list", key)))?;

        items
            .iter()
            .map(|item| match ConfigValue::from_metadata(item) {
                Some(ConfigValue::Map(fields)) => Ok(fields),
                _ => Err(IacError::invalid(
                    &self.resource.id,
                    format!("'{}' entries must be objects", key),
                )),
            })
            .collect()
    }
}

fn expose_id(mapped: &mut MappedResource, description: &str) {
    let name = format!("{}_id", mapped.address().replace('.', "_"));
    let value = ConfigValue::reference(mapped.attribute_ref("id"));
    mapped.declare_output(name, Output::new(value, description));
}

fn map_vpc(input: &MappingInput<'_>) -> IacResult<MappedResource> {
    let mut mapped = input.start();
    mapped.set("cidr_block", input.required("cidr_block")?);
    mapped.set("enable_dns_support", input.flag("enable_dns_support").unwrap_or(true));
    mapped.set("enable_dns_hostnames", input.flag("enable_dns_hostnames").unwrap_or(false));
    mapped.set_opt("instance_tenancy", input.optional("instance_tenancy"));
    expose_id(&mut mapped, "VPC id");
    Ok(mapped)
}

fn map_subnet(input: &MappingInput<'_>) -> IacResult<MappedResource> {
    let mut mapped = input.start();
    input.link(&mut mapped, "vpc_id", "aws_vpc");
    if mapped.get("vpc_id").is_none() {
        return Err(IacError::missing(&input.resource.id, "vpc_id"));
    }
    mapped.set("cidr_block", input.required("cidr_block")?);

    let zone = input
        .optional("availability_zone")
        .or_else(|| Some(input.resource.zone.clone()).filter(|z| !z.is_empty()));
    mapped.set_opt("availability_zone", zone);
    mapped.set_opt("map_public_ip_on_launch", input.flag("map_public_ip_on_launch"));
    expose_id(&mut mapped, "Subnet id");
    Ok(mapped)
}

fn map_security_group(input: &MappingInput<'_>) -> IacResult<MappedResource> {
    let mut mapped = input.start();
    let group_name = input
        .optional("group_name")
        .unwrap_or_else(|| input.resource.display_name().to_string());
    mapped.set("name", group_name);
    mapped.set(
        "description",
        input
            .optional("description")
            .unwrap_or_else(|| "Managed by Terraform".to_string()),
    );
    input.link(&mut mapped, "vpc_id", "aws_vpc");

    for direction in ["ingress", "egress"] {
        let mut rules = Vec::new();
        for mut rule in input.blocks(direction)? {
            // Rules may point at other groups of the batch.
            if let Some(ConfigValue::List(groups)) = rule.remove("security_groups") {
                let linked = groups
                    .iter()
                    .filter_map(ConfigValue::as_str)
                    .map(|id| input.resolve_soft(&mut mapped, id, "aws_security_group"))
                    .collect();
                rule.insert("security_groups".to_string(), ConfigValue::List(linked));
            }
            rules.push(ConfigValue::Block(rule));
        }
        if !rules.is_empty() {
            mapped.set(direction, ConfigValue::List(rules));
        }
    }

    expose_id(&mut mapped, "Security group id");
    Ok(mapped)
}

fn map_internet_gateway(input: &MappingInput<'_>) -> IacResult<MappedResource> {
    let mut mapped = input.start();
    input.link(&mut mapped, "vpc_id", "aws_vpc");
    expose_id(&mut mapped, "Internet gateway id");
    Ok(mapped)
}

fn map_route_table(input: &MappingInput<'_>) -> IacResult<MappedResource> {
    let mut mapped = input.start();
    input.link(&mut mapped, "vpc_id", "aws_vpc");

    let mut routes = Vec::new();
    for mut route in input.blocks("routes")? {
        if let Some(ConfigValue::String(gateway)) = route.remove("gateway_id") {
            let value = input.resolve_soft(&mut mapped, &gateway, "aws_internet_gateway");
            route.insert("gateway_id".to_string(), value);
        }
        routes.push(ConfigValue::Block(route));
    }
    if !routes.is_empty() {
        mapped.set("route", ConfigValue::List(routes));
    }

    expose_id(&mut mapped, "Route table id");
    Ok(mapped)
}

fn map_instance(input: &MappingInput<'_>) -> IacResult<MappedResource> {
    let mut mapped = input.start();
    mapped.set("ami", input.required("ami")?);
    mapped.set("instance_type", input.required("instance_type")?);
    input.link(&mut mapped, "subnet_id", "aws_subnet");
    input.link_list(
        &mut mapped,
        "vpc_security_group_ids",
        &["vpc_security_group_ids", "security_group_ids", "security_groups"],
        "aws_security_group",
    );
    mapped.set_opt("key_name", input.optional("key_name"));
    mapped.set_opt("associate_public_ip_address", input.flag("associate_public_ip_address"));
    mapped.set_opt("ebs_optimized", input.flag("ebs_optimized"));
    mapped.set_opt("monitoring", input.flag("monitoring"));

    let zone = input
        .optional("availability_zone")
        .or_else(|| Some(input.resource.zone.clone()).filter(|z| !z.is_empty()));
    mapped.set_opt("availability_zone", zone);

    let mut root = BTreeMap::new();
    if let Some(size) = input.resource.metadata_i64("root_volume_size") {
        root.insert("volume_size".to_string(), ConfigValue::Int(size));
    }
    if let Some(kind) = input.optional("root_volume_type") {
        root.insert("volume_type".to_string(), ConfigValue::String(kind));
    }
    if !root.is_empty() {
        mapped.set("root_block_device", ConfigValue::Block(root));
    }

    expose_id(&mut mapped, "Instance id");
    let private_ip = ConfigValue::reference(mapped.attribute_ref("private_ip"));
    let name = format!("{}_private_ip", mapped.address().replace('.', "_"));
    mapped.declare_output(name, Output::new(private_ip, "Instance private IP"));
    Ok(mapped)
}

fn map_s3_bucket(input: &MappingInput<'_>) -> IacResult<MappedResource> {
    let mut mapped = input.start();
    let bucket = input
        .optional("bucket")
        .unwrap_or_else(|| input.resource.display_name().to_string());
    mapped.set("bucket", bucket);
    mapped.set_opt("force_destroy", input.flag("force_destroy"));

    let arn = ConfigValue::reference(mapped.attribute_ref("arn"));
    let name = format!("{}_arn", mapped.address().replace('.', "_"));
    mapped.declare_output(name, Output::new(arn, "Bucket ARN"));
    Ok(mapped)
}

fn map_db_instance(input: &MappingInput<'_>) -> IacResult<MappedResource> {
    let mut mapped = input.start();
    let identifier = input
        .optional("identifier")
        .unwrap_or_else(|| input.resource.id.clone());
    mapped.set("identifier", identifier);
    mapped.set("engine", input.required("engine")?);
    mapped.set_opt("engine_version", input.optional("engine_version"));
    mapped.set("instance_class", input.required("instance_class")?);
    mapped.set_opt("allocated_storage", input.resource.metadata_i64("allocated_storage"));
    mapped.set_opt(
        "username",
        input.optional("master_username").or_else(|| input.optional("username")),
    );
    mapped.set_opt("db_subnet_group_name", input.optional("db_subnet_group_name"));
    mapped.set_opt("storage_encrypted", input.flag("storage_encrypted"));
    mapped.set_opt("multi_az", input.flag("multi_az"));
    mapped.set("skip_final_snapshot", input.flag("skip_final_snapshot").unwrap_or(true));
    input.link_list(
        &mut mapped,
        "vpc_security_group_ids",
        &["vpc_security_group_ids", "security_group_ids"],
        "aws_security_group",
    );

    // Passwords are never discovered; the caller supplies one per instance.
    let variable = format!("{}_password", mapped.resource_name);
    mapped.set("password", ConfigValue::reference(format!("var.{}", variable)));
    mapped.declare_variable(
        variable,
        Variable::new("string", format!("Master password for {}", input.resource.display_name())).sensitive(),
    );

    let endpoint = ConfigValue::reference(mapped.attribute_ref("endpoint"));
    let name = format!("{}_endpoint", mapped.address().replace('.', "_"));
    mapped.declare_output(name, Output::new(endpoint, "Database endpoint"));
    Ok(mapped)
}

/// Reference mapper for AWS.
pub struct AwsMapper {
    strategies: BTreeMap<String, MappingStrategy>,
}

impl AwsMapper {
    pub fn new() -> Self {
        Self::empty()
            .with_strategy("aws_vpc", map_vpc)
            .with_strategy("aws_subnet", map_subnet)
            .with_strategy("aws_security_group", map_security_group)
            .with_strategy("aws_internet_gateway", map_internet_gateway)
            .with_strategy("aws_route_table", map_route_table)
            .with_strategy("aws_instance", map_instance)
            .with_strategy("aws_s3_bucket", map_s3_bucket)
            .with_strategy("aws_db_instance", map_db_instance)
    }

    /// A mapper with no strategies.
    pub fn empty() -> Self {
        Self {
            strategies: BTreeMap::new(),
        }
    }

    /// Add or replace the strategy for a resource type.
    pub fn with_strategy(mut self, resource_type: impl Into<String>, strategy: MappingStrategy) -> Self {
        self.strategies.insert(resource_type.into(), strategy);
        self
    }
}

impl Default for AwsMapper {
    fn default() -> Self {
        Self::new()
    }
}

impl ResourceMapper for AwsMapper {
    fn provider(&self) -> CloudProvider {
        CloudProvider::Aws
    }

    fn supported_types(&self) -> Vec<String> {
        self.strategies.keys().cloned().collect()
    }

    fn supports(&self, resource_type: &str) -> bool {
        self.strategies.contains_key(resource_type)
    }

    fn map_resource_in(&self, resource: &Resource, index: &ResourceIndex) -> IacResult<MappedResource> {
        let strategy = self
            .strategies
            .get(&resource.resource_type)
            .ok_or_else(|| IacError::UnsupportedResourceType(resource.resource_type.clone()))?;

        debug!(id = %resource.id, resource_type = %resource.resource_type, "Mapping resource");
        strategy(&MappingInput { resource, index })
    }
}
