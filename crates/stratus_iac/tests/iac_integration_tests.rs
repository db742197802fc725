//! End-to-end generation tests: resources in, Terraform files out.

use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration;

use regex::Regex;
use tempfile::TempDir;

use stratus_core::{CloudProvider, Resource};
use stratus_iac::{
    ConfigValue, FileType, GenerationEngine, GenerationError, GenerationOptions, IacError, IacRenderer, IacResult,
    IssueKind, MappedResource, OrganizationPattern, Output, OutputFormat, ProviderConfig, ResourceIndex,
    ResourceMapper, Severity, TerraformRenderer, Variable,
};

fn vpc() -> Resource {
    Resource::new(CloudProvider::Aws, "aws_vpc", "vpc-123")
        .with_name("main")
        .with_region("us-east-1")
        .with_metadata("cidr_block", "10.0.0.0/16")
}

fn subnet(vpc_id: &str) -> Resource {
    Resource::new(CloudProvider::Aws, "aws_subnet", "subnet-1")
        .with_name("public-a")
        .with_region("us-east-1")
        .with_zone("us-east-1a")
        .with_metadata("vpc_id", vpc_id)
        .with_metadata("cidr_block", "10.0.1.0/24")
}

fn widget() -> Resource {
    Resource::new(CloudProvider::Aws, "aws_unknown_widget", "w-1").with_region("us-east-1")
}

fn engine() -> GenerationEngine {
    GenerationEngine::with_defaults()
}

fn assert_matches(content: &str, pattern: &str) {
    let re = Regex::new(pattern).unwrap();
    assert!(re.is_match(content), "pattern {:?} not found in:\n{}", pattern, content);
}

#[test]
fn test_flat_vpc() {
    let result = engine().generate(&[vpc()], &GenerationOptions::default()).unwrap();

    let main = result.file("main.tf").unwrap();
    assert_eq!(main.file_type, FileType::Main);
    assert_eq!(main.resource_count, 1);
    assert!(main.content.starts_with("# Generated by stratus. DO NOT EDIT.\n# Generated at: "));
    assert!(main.content.contains(r#"resource "aws_vpc" "main" {"#));
    assert_matches(&main.content, r#"cidr_block\s+= "10\.0\.0\.0/16""#);
    assert_matches(&main.content, r#"ManagedBy\s+= "terraform""#);

    let paths: Vec<&str> = result.files.iter().map(|f| f.path.as_str()).collect();
    assert_eq!(
        paths,
        vec!["main.tf", "providers_aws_us-east-1.tf", "versions.tf", "outputs.tf"]
    );
    assert!(result.errors.is_empty());
    assert_eq!(result.metadata.mapped_resources, 1);
    assert_eq!(result.metadata.provider_stats.get(&CloudProvider::Aws), Some(&1));
    assert_eq!(result.metadata.file_count, 4);
    assert!(result.metadata.written_to.is_none());
}

#[test]
fn test_subnet_references_vpc() {
    let result = engine()
        .generate(&[vpc(), subnet("vpc-123")], &GenerationOptions::default())
        .unwrap();

    let main = result.file("main.tf").unwrap();
    assert_eq!(main.resource_count, 2);
    assert_matches(&main.content, r#"vpc_id\s+= aws_vpc\.main\.id\n"#);
    assert_matches(&main.content, r#"availability_zone\s+= "us-east-1a""#);
    assert!(result
        .warnings
        .iter()
        .all(|w| w.kind != IssueKind::Dependency));
}

#[test]
fn test_forward_reference_resolves() {
    // Subnet listed before its VPC.
    let result = engine()
        .generate(&[subnet("vpc-123"), vpc()], &GenerationOptions::default())
        .unwrap();
    let main = result.file("main.tf").unwrap();
    assert_matches(&main.content, r#"vpc_id\s+= aws_vpc\.main\.id"#);
}

#[test]
fn test_unsupported_type_is_high_severity() {
    let result = engine()
        .generate(&[vpc(), widget()], &GenerationOptions::default())
        .unwrap();

    assert_eq!(result.errors.len(), 1);
    let error = &result.errors[0];
    assert_eq!(error.kind, IssueKind::Mapping);
    assert_eq!(error.severity, Severity::High);
    assert_eq!(error.resource_id.as_deref(), Some("w-1"));
    assert!(error.message.contains("aws_unknown_widget"));

    assert_eq!(result.metadata.total_resources, 2);
    assert_eq!(result.metadata.mapped_resources, 1);
    assert!(!result.file("main.tf").unwrap().content.contains("widget"));
}

#[test]
fn test_missing_attribute_is_medium_severity() {
    let broken = Resource::new(CloudProvider::Aws, "aws_instance", "i-1").with_metadata("ami", "ami-1");
    let result = engine()
        .generate(&[vpc(), broken], &GenerationOptions::default())
        .unwrap();

    assert_eq!(result.errors.len(), 1);
    assert_eq!(result.errors[0].severity, Severity::Medium);
    assert!(result.errors[0].message.contains("instance_type"));
}

#[test]
fn test_no_mapper_for_provider() {
    let vnet = Resource::new(CloudProvider::Azure, "azurerm_virtual_network", "vnet-1");
    let result = engine()
        .generate(&[vpc(), vnet], &GenerationOptions::default())
        .unwrap();

    assert_eq!(result.errors.len(), 1);
    assert_eq!(result.errors[0].severity, Severity::High);
    assert!(result.errors[0].message.contains("azure"));
}

#[test]
fn test_nothing_mapped() {
    let err = engine()
        .generate(&[widget()], &GenerationOptions::default())
        .unwrap_err();
    match err {
        GenerationError::NothingMapped { issues } => {
            assert_eq!(issues.len(), 1);
            assert_eq!(issues[0].kind, IssueKind::Mapping);
        }
        other => panic!("expected NothingMapped, got {other:?}"),
    }
}

#[test]
fn test_generation_is_deterministic() {
    let resources = vec![vpc(), subnet("vpc-123"), widget()];
    let options = GenerationOptions::new().pattern(OrganizationPattern::ByService);

    let first = engine().generate(&resources, &options).unwrap();
    let second = engine().generate(&resources, &options).unwrap();

    let summary = |files: &[stratus_iac::GeneratedFile]| -> Vec<(String, String)> {
        files.iter().map(|f| (f.path.clone(), f.checksum.clone())).collect()
    };
    assert_eq!(summary(&first.files), summary(&second.files));
}

#[test]
fn test_dangling_dependency_warning() {
    let result = engine()
        .generate(&[subnet("vpc-404")], &GenerationOptions::default())
        .unwrap();

    let dangling: Vec<_> = result
        .warnings
        .iter()
        .filter(|w| w.kind == IssueKind::Dependency)
        .collect();
    assert_eq!(dangling.len(), 1);
    assert_eq!(dangling[0].resource_id.as_deref(), Some("subnet-1"));
    assert!(dangling[0].message.contains("vpc_404"));

    let main = result.file("main.tf").unwrap();
    assert_matches(&main.content, r#"vpc_id\s+= "vpc-404""#);
}

#[test]
fn test_generated_names_are_identifiers() {
    let names = ["My Web-Server!", "123abc", "", "___", "prod.db/primary", "main", "main"];
    let resources: Vec<Resource> = names
        .iter()
        .enumerate()
        .map(|(i, name)| {
            Resource::new(CloudProvider::Aws, "aws_s3_bucket", format!("bucket-{}", i)).with_name(*name)
        })
        .collect();

    let result = engine().generate(&resources, &GenerationOptions::default()).unwrap();
    let main = result.file("main.tf").unwrap();
    let summary = TerraformRenderer::new().summarize(&main.content).unwrap();
    assert_eq!(summary.resources.len(), names.len());

    let identifier = Regex::new(r"^[a-z_][a-z0-9_]*$").unwrap();
    for address in &summary.resources {
        let (_, name) = address.split_once('.').unwrap();
        assert!(identifier.is_match(name), "{name} is not an identifier");
    }
    assert!(summary.resources.contains(&"aws_s3_bucket.main".to_string()));
    assert!(summary.resources.contains(&"aws_s3_bucket.main_2".to_string()));
    assert!(summary.resources.contains(&"aws_s3_bucket.r_123abc".to_string()));
}

#[test]
fn test_write_refuses_to_overwrite() {
    let dir = TempDir::new().unwrap();
    let out = dir.path().join("terraform");
    let options = GenerationOptions::new().output_path(&out);

    let result = engine().generate(&[vpc()], &options).unwrap();
    assert_eq!(result.metadata.written_to.as_deref(), Some(out.as_path()));
    let on_disk = std::fs::read_to_string(out.join("main.tf")).unwrap();
    assert_eq!(on_disk, result.file("main.tf").unwrap().content);

    let err = engine().generate(&[vpc()], &options).unwrap_err();
    assert!(matches!(err, GenerationError::OutputExists(ref p) if p.starts_with(&out)));

    let forced = engine().generate(&[vpc()], &options.clone().force(true)).unwrap();
    assert_eq!(forced.files.len(), result.files.len());
}

#[test]
fn test_multi_region_by_region() {
    let west = Resource::new(CloudProvider::Aws, "aws_vpc", "vpc-eu")
        .with_name("eu")
        .with_region("eu-west-1")
        .with_metadata("cidr_block", "10.1.0.0/16");
    let options = GenerationOptions::new().pattern(OrganizationPattern::ByRegion);
    let result = engine().generate(&[vpc(), west], &options).unwrap();

    let east = result.file("us-east-1.tf").unwrap();
    assert!(east.content.contains("provider = aws.us_east_1"));
    let eu = result.file("eu-west-1.tf").unwrap();
    assert!(!eu.content.contains("provider ="));

    let aliased = result.file("providers_aws_us-east-1.tf").unwrap();
    assert_matches(&aliased.content, r#"alias\s+= "us_east_1""#);
    assert_eq!(aliased.file_type, FileType::Provider);
    assert!(result.file("providers_aws_eu-west-1.tf").is_some());

    let versions = result.file("versions.tf").unwrap();
    assert_eq!(versions.content.matches("hashicorp/aws").count(), 1);
}

#[test]
fn test_without_provider_files() {
    let options = GenerationOptions::new()
        .include_provider(false)
        .include_outputs(false);
    let result = engine().generate(&[vpc()], &options).unwrap();
    let paths: Vec<&str> = result.files.iter().map(|f| f.path.as_str()).collect();
    assert_eq!(paths, vec!["main.tf"]);
}

#[test]
fn test_database_password_variable() {
    let db = Resource::new(CloudProvider::Aws, "aws_db_instance", "db-1")
        .with_name("orders")
        .with_region("us-east-1")
        .with_metadata("engine", "postgres")
        .with_metadata("instance_class", "db.t3.micro");
    let result = engine().generate(&[db], &GenerationOptions::default()).unwrap();

    let main = result.file("main.tf").unwrap();
    assert_matches(&main.content, r"password\s+= var\.orders_password");
    let variables = result.file("variables.tf").unwrap();
    assert_eq!(variables.file_type, FileType::Variables);
    assert!(variables.content.contains(r#"variable "orders_password" {"#));
    assert_matches(&variables.content, r"sensitive\s+= true");
    assert!(!variables.content.contains("default"));
}

#[test]
fn test_exclude_records_filter_warning() {
    let options = GenerationOptions::new().exclude("aws_subnet");
    let result = engine()
        .generate(&[vpc(), subnet("vpc-123")], &options)
        .unwrap();

    assert_eq!(result.metadata.filtered_resources, 1);
    let filtered: Vec<_> = result
        .warnings
        .iter()
        .filter(|w| w.kind == IssueKind::Filter)
        .collect();
    assert_eq!(filtered.len(), 1);
    assert_eq!(filtered[0].severity, Severity::Low);
    assert!(!result.file("main.tf").unwrap().content.contains("aws_subnet"));
}

#[test]
fn test_validate_passes_on_generated_output() {
    let sg = Resource::new(CloudProvider::Aws, "aws_security_group", "sg-1")
        .with_name("web")
        .with_region("us-east-1")
        .with_metadata("vpc_id", "vpc-123")
        .with_metadata(
            "ingress",
            serde_json::json!([
                {"from_port": 443, "to_port": 443, "protocol": "tcp", "cidr_blocks": ["0.0.0.0/0"]}
            ]),
        );
    let options = GenerationOptions::new().validate(true);
    let result = engine().generate(&[vpc(), sg], &options).unwrap();

    assert!(result.warnings.iter().all(|w| w.kind != IssueKind::Validation));
    let renderer = TerraformRenderer::new();
    for file in &result.files {
        renderer.validate_syntax(&file.content).unwrap();
    }
    assert!(result.file("main.tf").unwrap().content.contains("  ingress {\n"));
}

#[test]
fn test_single_file_rejects_other_patterns() {
    let options = GenerationOptions::new()
        .single_file(true)
        .pattern(OrganizationPattern::ByProvider);
    let err = engine().generate(&[vpc()], &options).unwrap_err();
    assert!(matches!(err, GenerationError::InvalidOptions(_)));
}

#[test]
fn test_preview() {
    let vnet = Resource::new(CloudProvider::Azure, "azurerm_virtual_network", "vnet-1");
    let resources = vec![vpc(), subnet("vpc-123"), widget(), vnet];
    let preview = engine()
        .preview(&resources, &GenerationOptions::new().pattern(OrganizationPattern::ByResourceType))
        .unwrap();

    assert_eq!(preview.total_resources, 4);
    assert_eq!(preview.filtered_resources, 4);
    assert_eq!(preview.mappable_resources, 2);
    assert_eq!(preview.unmapped, vec!["w-1", "vnet-1"]);
    assert_eq!(preview.providers, vec![CloudProvider::Aws]);

    let files: BTreeMap<&str, (FileType, usize)> = preview
        .files
        .iter()
        .map(|f| (f.path.as_str(), (f.file_type, f.resource_count)))
        .collect();
    assert_eq!(files["aws_vpc.tf"], (FileType::Main, 1));
    assert_eq!(files["aws_subnet.tf"], (FileType::Main, 1));
    assert_eq!(files["versions.tf"].0, FileType::Versions);
    assert!(files.contains_key("providers_aws_us-east-1.tf"));
    assert!(files.contains_key("outputs.tf"));
}

/// Maps Cloud SQL instances; the tier variable is required only when the
/// resource says so.
struct SqlMapper;

impl ResourceMapper for SqlMapper {
    fn provider(&self) -> CloudProvider {
        CloudProvider::Gcp
    }

    fn supported_types(&self) -> Vec<String> {
        vec!["google_sql_database_instance".to_string()]
    }

    fn map_resource_in(&self, resource: &Resource, index: &ResourceIndex) -> IacResult<MappedResource> {
        let mut mapped = MappedResource::new(resource, &resource.resource_type, index.name_for(resource));
        mapped.set("tier", ConfigValue::reference("var.sql_tier"));

        let tier = if resource.metadata_bool("tier_required", false) {
            Variable::new("string", "Machine tier")
        } else {
            Variable::new("string", "Machine tier").with_default("db-f1-micro")
        };
        mapped.declare_variable("sql_tier", tier);
        mapped.declare_output(
            "sql_connection",
            Output::new(ConfigValue::reference(mapped.attribute_ref("connection_name")), ""),
        );
        Ok(mapped)
    }
}

#[test]
fn test_custom_mapper_variable_clash() {
    let engine = engine().with_mapper(std::sync::Arc::new(SqlMapper));
    let resources = vec![
        Resource::new(CloudProvider::Gcp, "google_sql_database_instance", "sql-a").with_region("us-central1"),
        Resource::new(CloudProvider::Gcp, "google_sql_database_instance", "sql-b")
            .with_region("us-central1")
            .with_metadata("tier_required", true),
    ];
    let result = engine.generate(&resources, &GenerationOptions::default()).unwrap();

    let variables = result.file("variables.tf").unwrap();
    assert!(variables.content.contains(r#"variable "sql_tier" {"#));
    assert!(!variables.content.contains("default"));

    let clashes: Vec<_> = result
        .warnings
        .iter()
        .filter(|w| w.kind == IssueKind::Output)
        .collect();
    assert_eq!(clashes.len(), 1);
    assert_eq!(clashes[0].resource_id.as_deref(), Some("sql-b"));

    let outputs = result.file("outputs.tf").unwrap();
    assert!(outputs.content.contains("google_sql_database_instance.sql_a.connection_name"));
    assert!(result.file("providers_gcp_us-central1.tf").is_some());
}

#[test]
fn test_reference_to_unmapped_resource_falls_back_to_id() {
    let broken_vpc = Resource::new(CloudProvider::Aws, "aws_vpc", "vpc-123")
        .with_name("main")
        .with_region("us-east-1");
    let result = engine()
        .generate(&[broken_vpc, subnet("vpc-123")], &GenerationOptions::default())
        .unwrap();

    assert_eq!(result.errors.len(), 1);
    assert_eq!(result.errors[0].kind, IssueKind::Mapping);

    let main = result.file("main.tf").unwrap();
    assert!(!main.content.contains("aws_vpc.main"));
    assert_matches(&main.content, r#"vpc_id\s+= "vpc-123""#);

    let dependency: Vec<_> = result
        .warnings
        .iter()
        .filter(|w| w.kind == IssueKind::Dependency)
        .collect();
    assert_eq!(dependency.len(), 1);
    assert_eq!(dependency[0].resource_id.as_deref(), Some("subnet-1"));
    assert!(dependency[0].message.contains("aws_vpc.main"));
}

#[test]
fn test_reference_to_wrong_type_is_not_linked() {
    let gateway = |id: &str, vpc_id: &str| {
        Resource::new(CloudProvider::Aws, "aws_internet_gateway", id)
            .with_region("us-east-1")
            .with_metadata("vpc_id", vpc_id)
    };
    let result = engine()
        .generate(&[gateway("igw-1", "igw-2"), gateway("igw-2", "igw-1")], &GenerationOptions::default())
        .unwrap();

    let main = result.file("main.tf").unwrap();
    assert!(!main.content.contains("aws_internet_gateway.igw_"));
    assert_matches(&main.content, r#"vpc_id\s+= "igw-2""#);
    assert!(result
        .warnings
        .iter()
        .any(|w| w.kind == IssueKind::Dependency && w.message.contains("aws_vpc.igw_2")));
}

#[test]
fn test_cycle_is_a_warning() {
    let looped_vpc = vpc().with_metadata("main_route_table_id", "rtb-1");
    let route_table = Resource::new(CloudProvider::Aws, "aws_route_table", "rtb-1")
        .with_name("public")
        .with_region("us-east-1")
        .with_metadata("vpc_id", "vpc-123");
    let result = engine()
        .generate(&[looped_vpc, route_table], &GenerationOptions::default())
        .unwrap();

    assert!(result.errors.is_empty());
    assert_eq!(result.rendered_resources(), 2);
    let cycles: Vec<_> = result
        .warnings
        .iter()
        .filter(|w| w.kind == IssueKind::Dependency && w.message.starts_with("Cyclic dependency"))
        .collect();
    assert_eq!(cycles.len(), 1);
    assert!(cycles[0].message.contains("vpc-123") && cycles[0].message.contains("rtb-1"));
}

/// HCL renderer with injectable failures.
struct FaultyRenderer {
    inner: TerraformRenderer,
    fail_render_of: Option<&'static str>,
    reject_containing: Option<&'static str>,
    check_delay: Option<Duration>,
}

impl FaultyRenderer {
    fn new() -> Self {
        Self {
            inner: TerraformRenderer::new(),
            fail_render_of: None,
            reject_containing: None,
            check_delay: None,
        }
    }
}

impl IacRenderer for FaultyRenderer {
    fn format(&self) -> OutputFormat {
        OutputFormat::Hcl
    }

    fn extension(&self) -> &'static str {
        self.inner.extension()
    }

    fn render_resource(&self, resource: &MappedResource) -> IacResult<String> {
        if self.fail_render_of == Some(resource.resource_type.as_str()) {
            return Err(IacError::Render(format!("cannot render {}", resource.address())));
        }
        self.inner.render_resource(resource)
    }

    fn render_provider(&self, config: &ProviderConfig) -> IacResult<String> {
        self.inner.render_provider(config)
    }

    fn render_variables(&self, variables: &BTreeMap<String, Variable>) -> IacResult<String> {
        self.inner.render_variables(variables)
    }

    fn render_outputs(&self, outputs: &BTreeMap<String, Output>) -> IacResult<String> {
        self.inner.render_outputs(outputs)
    }

    fn render_versions(&self, providers: &[ProviderConfig]) -> IacResult<String> {
        self.inner.render_versions(providers)
    }

    fn comment(&self, text: &str) -> String {
        self.inner.comment(text)
    }

    fn validate_syntax(&self, content: &str) -> IacResult<()> {
        if let Some(delay) = self.check_delay {
            std::thread::sleep(delay);
        }
        match self.reject_containing {
            Some(needle) if content.contains(needle) => Err(IacError::Syntax {
                line: 1,
                message: format!("unexpected {}", needle),
            }),
            _ => self.inner.validate_syntax(content),
        }
    }
}

#[test]
fn test_render_failure_drops_only_that_file() {
    let renderer = FaultyRenderer {
        fail_render_of: Some("aws_subnet"),
        ..FaultyRenderer::new()
    };
    let engine = engine().with_renderer(Arc::new(renderer));
    let options = GenerationOptions::new().pattern(OrganizationPattern::ByResourceType);
    let result = engine.generate(&[vpc(), subnet("vpc-123")], &options).unwrap();

    assert!(result.file("aws_subnet.tf").is_none());
    assert_eq!(result.file("aws_vpc.tf").unwrap().resource_count, 1);
    assert!(result.file("versions.tf").is_some());

    assert_eq!(result.errors.len(), 1);
    let error = &result.errors[0];
    assert_eq!(error.kind, IssueKind::Render);
    assert_eq!(error.file.as_deref(), Some("aws_subnet.tf"));
    assert_eq!(result.rendered_resources(), 1);
}

#[test]
fn test_syntax_check_failure_is_a_warning() {
    let renderer = FaultyRenderer {
        reject_containing: Some(r#"resource "aws_subnet""#),
        ..FaultyRenderer::new()
    };
    let engine = engine().with_renderer(Arc::new(renderer));
    let dir = TempDir::new().unwrap();
    let options = GenerationOptions::new()
        .pattern(OrganizationPattern::ByResourceType)
        .output_path(dir.path())
        .validate(true);
    let result = engine.generate(&[vpc(), subnet("vpc-123")], &options).unwrap();

    let failures: Vec<_> = result
        .warnings
        .iter()
        .filter(|w| w.kind == IssueKind::Validation)
        .collect();
    assert_eq!(failures.len(), 1);
    assert_eq!(failures[0].file.as_deref(), Some("aws_subnet.tf"));
    assert!(result.errors.is_empty());
    assert!(result.file("aws_subnet.tf").is_some());
    assert!(dir.path().join("aws_subnet.tf").is_file());
}

#[test]
fn test_deadline_during_syntax_check_keeps_result() {
    let renderer = FaultyRenderer {
        check_delay: Some(Duration::from_millis(400)),
        ..FaultyRenderer::new()
    };
    let engine = engine().with_renderer(Arc::new(renderer));
    let dir = TempDir::new().unwrap();
    let options = GenerationOptions::new()
        .output_path(dir.path())
        .validate(true)
        .timeout(Duration::from_millis(200));
    let result = engine.generate(&[vpc()], &options).unwrap();

    assert_eq!(result.metadata.written_to.as_deref(), Some(dir.path()));
    assert!(dir.path().join("main.tf").is_file());
    assert!(result
        .warnings
        .iter()
        .any(|w| w.kind == IssueKind::Validation
            && w.severity == Severity::Low
            && w.message.contains("syntax check skipped")));
}
