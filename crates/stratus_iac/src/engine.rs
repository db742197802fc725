//! Generation engine.
//!
//! Runs the pipeline in a fixed order: validate options, filter, map,
//! analyse dependencies, assign provider configurations, organize, render,
//! write and finally check syntax. Problems with individual resources or
//! files are collected as issues; only option errors, an empty mapping,
//! existing output files and the deadline fail the whole call.

use std::collections::{BTreeMap, BTreeSet, HashMap, HashSet};
use std::fs;
use std::path::Path;
use std::sync::Arc;
use std::time::{Duration, Instant};

use chrono::Utc;
use tracing::{debug, info, warn};

use stratus_core::{CloudProvider, Resource};

use crate::dependency::DependencyResolver;
use crate::error::{GenerationEngineResult, GenerationError, IacError, IacResult};
use crate::mapper::{
    normalize_file_stem, sanitize_resource_name, MappedResource, MapperRegistry, Output, ProviderConfig,
    ResourceIndex, ResourceMapper, Variable,
};
use crate::options::{GenerationOptions, OrganizationPattern, OutputFormat};
use crate::organizer::FileOrganizer;
use crate::renderer::{IacRenderer, TerraformRenderer};
use crate::result::{
    FileType, GeneratedFile, GenerationIssue, GenerationMetadata, GenerationPreview, GenerationResult,
    IssueKind, PreviewFile, Severity,
};

const PREAMBLE: &str = "Generated by stratus. DO NOT EDIT.";
const VARIABLES_FILE: &str = "variables.tf";
const OUTPUTS_FILE: &str = "outputs.tf";
const VERSIONS_FILE: &str = "versions.tf";

/// `providers_<provider>_<region>.tf`
pub fn provider_file_name(config: &ProviderConfig) -> String {
    let region = if config.region.is_empty() {
        "global".to_string()
    } else {
        normalize_file_stem(&config.region)
    };
    format!("providers_{}_{}.tf", config.provider.as_str(), region)
}

/// Provider alias for a non-default region, e.g. `eu-west-1` -> `eu_west_1`.
pub fn region_alias(region: &str) -> String {
    normalize_file_stem(region).replace('-', "_")
}

struct Deadline {
    started: Instant,
    at: Option<Instant>,
    timeout: Duration,
}

impl Deadline {
    fn start(timeout: Option<Duration>) -> Self {
        let started = Instant::now();
        Self {
            started,
            at: timeout.and_then(|t| started.checked_add(t)),
            timeout: timeout.unwrap_or_default(),
        }
    }

    fn expired(&self) -> bool {
        self.at.is_some_and(|at| Instant::now() >= at)
    }

    fn check(&self, stage: &str) -> GenerationEngineResult<()> {
        if self.expired() {
            warn!(stage, timeout = ?self.timeout, "Generation deadline exceeded");
            return Err(GenerationError::Timeout(self.timeout));
        }
        Ok(())
    }
}

/// Everything decided before rendering.
struct Plan {
    total: usize,
    filtered: usize,
    mapped: Vec<MappedResource>,
    unmapped: Vec<String>,
    files: BTreeMap<String, Vec<MappedResource>>,
    providers: Vec<ProviderConfig>,
    variables: BTreeMap<String, Variable>,
    outputs: BTreeMap<String, Output>,
    errors: Vec<GenerationIssue>,
    warnings: Vec<GenerationIssue>,
}

impl Plan {
    /// Declaration files the plan produces, in emission order.
    fn declaration_files(&self, options: &GenerationOptions) -> Vec<(String, FileType)> {
        let mut files = Vec::new();
        if options.include_provider && !self.providers.is_empty() {
            files.extend(
                self.providers
                    .iter()
                    .map(|config| (provider_file_name(config), FileType::Provider)),
            );
            files.push((VERSIONS_FILE.to_string(), FileType::Versions));
        }
        if options.include_variables && !self.variables.is_empty() {
            files.push((VARIABLES_FILE.to_string(), FileType::Variables));
        }
        if options.include_outputs && !self.outputs.is_empty() {
            files.push((OUTPUTS_FILE.to_string(), FileType::Outputs));
        }
        files
    }
}

/// Collects rendered files, turning render failures into issues.
struct FileSink<'a> {
    preamble: &'a str,
    format: OutputFormat,
    files: Vec<GeneratedFile>,
    errors: Vec<GenerationIssue>,
}

impl FileSink<'_> {
    fn push(&mut self, path: &str, file_type: FileType, resource_count: usize, rendered: IacResult<String>) {
        match rendered {
            Ok(body) => {
                debug!(file = path, resources = resource_count, "Rendered file");
                self.files.push(GeneratedFile::new(
                    path,
                    self.preamble,
                    &body,
                    file_type,
                    self.format,
                    resource_count,
                ));
            }
            Err(e) => {
                warn!(file = path, error = %e, "Dropping file after render failure");
                self.errors.push(
                    GenerationIssue::new(IssueKind::Render, Severity::High, e.to_string()).in_file(path),
                );
            }
        }
    }
}

/// Turns discovered resources into Terraform files.
pub struct GenerationEngine {
    mappers: MapperRegistry,
    renderers: HashMap<OutputFormat, Arc<dyn IacRenderer>>,
    resolver: DependencyResolver,
    organizer: FileOrganizer,
}

impl GenerationEngine {
    /// An engine with no mappers or renderers.
    pub fn new() -> Self {
        Self {
            mappers: MapperRegistry::new(),
            renderers: HashMap::new(),
            resolver: DependencyResolver::new(),
            organizer: FileOrganizer::new(),
        }
    }

    /// An engine with the built-in mappers and the HCL renderer.
    pub fn with_defaults() -> Self {
        Self {
            mappers: MapperRegistry::with_defaults(),
            ..Self::new()
        }
        .with_renderer(Arc::new(TerraformRenderer::new()))
    }

    pub fn register_mapper(&mut self, mapper: Arc<dyn ResourceMapper>) {
        self.mappers.register(mapper);
    }

    pub fn with_mapper(mut self, mapper: Arc<dyn ResourceMapper>) -> Self {
        self.register_mapper(mapper);
        self
    }

    /// Register a renderer under its `format()`, replacing any existing one.
    pub fn register_renderer(&mut self, renderer: Arc<dyn IacRenderer>) {
        let format = renderer.format();
        debug!("Registering renderer: {}", format);
        self.renderers.insert(format, renderer);
    }

    pub fn with_renderer(mut self, renderer: Arc<dyn IacRenderer>) -> Self {
        self.register_renderer(renderer);
        self
    }

    pub fn mappers(&self) -> &MapperRegistry {
        &self.mappers
    }

    pub fn renderer(&self, format: OutputFormat) -> Option<Arc<dyn IacRenderer>> {
        self.renderers.get(&format).cloned()
    }

    pub fn validate_options(&self, resources: &[Resource], options: &GenerationOptions) -> GenerationEngineResult<()> {
        if resources.is_empty() {
            return Err(GenerationError::InvalidOptions(
                "no resources to generate from".to_string(),
            ));
        }
        if !self.renderers.contains_key(&options.format) {
            return Err(GenerationError::NoRendererForFormat(options.format.to_string()));
        }
        if options.single_file && options.pattern != OrganizationPattern::Flat {
            return Err(GenerationError::InvalidOptions(format!(
                "single_file cannot be combined with the {} pattern",
                options.pattern
            )));
        }
        Ok(())
    }

    pub fn generate(&self, resources: &[Resource], options: &GenerationOptions) -> GenerationEngineResult<GenerationResult> {
        let started_at = Utc::now();
        let deadline = Deadline::start(options.timeout);

        self.validate_options(resources, options)?;
        let renderer = self
            .renderer(options.format)
            .ok_or_else(|| GenerationError::NoRendererForFormat(options.format.to_string()))?;

        info!(
            resources = resources.len(),
            pattern = %options.effective_pattern(),
            format = %options.format,
            "Generating infrastructure code"
        );

        let plan = self.plan(resources, options, &deadline)?;
        if plan.mapped.is_empty() {
            warn!(errors = plan.errors.len(), "No resources could be mapped");
            let mut issues = plan.errors;
            issues.extend(plan.warnings);
            return Err(GenerationError::NothingMapped { issues });
        }

        let preamble = format!(
            "{}\n{}\n\n",
            renderer.comment(PREAMBLE),
            renderer.comment(&format!("Generated at: {}", started_at.to_rfc3339()))
        );
        let mut sink = FileSink {
            preamble: &preamble,
            format: options.format,
            files: Vec::new(),
            errors: Vec::new(),
        };

        for (path, group) in &plan.files {
            deadline.check("render")?;
            let rendered = render_group(renderer.as_ref(), group);
            sink.push(path, FileType::Main, group.len(), rendered);
        }

        for (path, file_type) in plan.declaration_files(options) {
            deadline.check("render")?;
            let rendered = match file_type {
                FileType::Provider => match plan.providers.iter().find(|c| provider_file_name(c) == path) {
                    Some(config) => renderer.render_provider(config),
                    None => Err(IacError::Render(format!("no provider configuration for {}", path))),
                },
                FileType::Versions => renderer.render_versions(&plan.providers),
                FileType::Variables => renderer.render_variables(&plan.variables),
                FileType::Outputs => renderer.render_outputs(&plan.outputs),
                FileType::Main => continue,
            };
            sink.push(&path, file_type, 0, rendered);
        }

        let FileSink { files, errors: render_errors, .. } = sink;
        let mut errors = plan.errors;
        errors.extend(render_errors);
        let mut warnings = plan.warnings;

        deadline.check("write")?;
        let written_to = match &options.output_path {
            Some(dir) => {
                write_files(dir, &files, options.force)?;
                info!(dir = %dir.display(), files = files.len(), "Wrote generated files");
                Some(dir.clone())
            }
            None => None,
        };

        if options.validate {
            for (checked, file) in files.iter().enumerate() {
                // Files are already rendered (and maybe written); running out
                // of time here only cuts the syntax check short.
                if deadline.expired() {
                    warn!(timeout = ?deadline.timeout, "Generation deadline exceeded during syntax check");
                    warnings.push(GenerationIssue::new(
                        IssueKind::Validation,
                        Severity::Low,
                        format!(
                            "Deadline of {:?} reached; syntax check skipped for {} file(s)",
                            deadline.timeout,
                            files.len() - checked
                        ),
                    ));
                    break;
                }
                if let Err(e) = renderer.validate_syntax(&file.content) {
                    warn!(file = %file.path, error = %e, "Generated file failed syntax check");
                    warnings.push(
                        GenerationIssue::new(IssueKind::Validation, Severity::Medium, e.to_string())
                            .in_file(&file.path),
                    );
                }
            }
        }

        let mut provider_stats: BTreeMap<CloudProvider, usize> = BTreeMap::new();
        for mapped in &plan.mapped {
            *provider_stats.entry(mapped.provider()).or_default() += 1;
        }

        let metadata = GenerationMetadata {
            started_at,
            duration_ms: deadline.started.elapsed().as_millis() as u64,
            total_resources: plan.total,
            filtered_resources: plan.filtered,
            mapped_resources: plan.mapped.len(),
            file_count: files.len(),
            total_lines: files.iter().map(|f| f.line_count).sum(),
            total_bytes: files.iter().map(|f| f.size).sum(),
            provider_stats,
            error_count: errors.len(),
            warning_count: warnings.len(),
            written_to,
        };

        info!(
            mapped = metadata.mapped_resources,
            files = metadata.file_count,
            errors = metadata.error_count,
            warnings = metadata.warning_count,
            duration_ms = metadata.duration_ms,
            "Generation complete"
        );

        Ok(GenerationResult {
            files,
            errors,
            warnings,
            metadata,
        })
    }

    /// File layout and mapping outcome without rendering or writing.
    pub fn preview(&self, resources: &[Resource], options: &GenerationOptions) -> GenerationEngineResult<GenerationPreview> {
        let deadline = Deadline::start(options.timeout);
        self.validate_options(resources, options)?;

        let plan = self.plan(resources, options, &deadline)?;

        let mut files: Vec<PreviewFile> = plan
            .files
            .iter()
            .map(|(path, group)| PreviewFile {
                path: path.clone(),
                file_type: FileType::Main,
                resource_count: group.len(),
            })
            .collect();
        files.extend(
            plan.declaration_files(options)
                .into_iter()
                .map(|(path, file_type)| PreviewFile {
                    path,
                    file_type,
                    resource_count: 0,
                }),
        );

        let providers: BTreeSet<CloudProvider> = plan.mapped.iter().map(|m| m.provider()).collect();

        Ok(GenerationPreview {
            total_resources: plan.total,
            filtered_resources: plan.filtered,
            mappable_resources: plan.mapped.len(),
            files,
            providers: providers.into_iter().collect(),
            unmapped: plan.unmapped,
        })
    }

    fn plan(&self, resources: &[Resource], options: &GenerationOptions, deadline: &Deadline) -> GenerationEngineResult<Plan> {
        let mut errors = Vec::new();
        let mut warnings = Vec::new();
        deadline.check("validate")?;

        let kept = filter_resources(resources, options, &mut warnings);
        debug!(total = resources.len(), kept = kept.len(), "Filtered resources");
        deadline.check("filter")?;

        let index = ResourceIndex::build(&kept);
        let mut mapped = Vec::with_capacity(kept.len());
        let mut unmapped = Vec::new();
        for resource in &kept {
            match self.map_one(resource, &index) {
                Ok(m) => mapped.push(m),
                Err(issue) => {
                    debug!(resource = %resource.id, issue = %issue, "Resource not mapped");
                    errors.push(issue);
                    unmapped.push(resource.id.clone());
                }
            }
        }
        info!(mapped = mapped.len(), unmapped = unmapped.len(), "Mapped resources");
        deadline.check("mapping")?;

        self.check_dependencies(&kept, &mut mapped, &index, &mut warnings);
        deadline.check("dependencies")?;

        let providers = if options.include_provider {
            self.assign_providers(&mut mapped)
        } else {
            Vec::new()
        };

        let files = self.organizer.organize_files(&mapped, options.effective_pattern());
        let (variables, outputs) = collect_declarations(&mapped, &mut warnings);
        deadline.check("organize")?;

        Ok(Plan {
            total: resources.len(),
            filtered: kept.len(),
            mapped,
            unmapped,
            files,
            providers,
            variables,
            outputs,
            errors,
            warnings,
        })
    }

    fn map_one(&self, resource: &Resource, index: &ResourceIndex) -> Result<MappedResource, GenerationIssue> {
        let issue = |severity: Severity, message: String| {
            GenerationIssue::new(IssueKind::Mapping, severity, message).for_resource(&resource.id)
        };

        let Some(mapper) = self.mappers.get(resource.provider) else {
            return Err(issue(
                Severity::High,
                format!("No mapper registered for provider {}", resource.provider),
            ));
        };
        if !mapper.supports(&resource.resource_type) {
            let error = IacError::UnsupportedResourceType(resource.resource_type.clone());
            return Err(issue(Severity::High, error.to_string()));
        }

        let mapped = mapper.map_resource_in(resource, index).map_err(|e| match e {
            IacError::UnsupportedResourceType(_) => issue(Severity::High, e.to_string()),
            other => issue(Severity::Medium, other.to_string()),
        })?;
        mapper
            .validate_mapping(resource, &mapped)
            .map_err(|e| issue(Severity::Medium, e.to_string()))?;
        Ok(mapped)
    }

    fn check_dependencies(
        &self,
        kept: &[Resource],
        mapped: &mut [MappedResource],
        index: &ResourceIndex,
        warnings: &mut Vec<GenerationIssue>,
    ) {
        // (resource id, target name) pairs already reported
        let mut reported: HashSet<(String, String)> = HashSet::new();
        let rendered: HashSet<String> = mapped.iter().map(MappedResource::address).collect();

        for resource in mapped.iter_mut() {
            for dependency in resource.dependencies.clone() {
                if rendered.contains(&dependency) {
                    continue;
                }
                // In the batch but not mapped: keep the literal id so the
                // output never names an undeclared resource.
                if let Some(entry) = index.by_address(&dependency) {
                    resource.unlink(&dependency, &entry.id);
                    warnings.push(
                        GenerationIssue::new(
                            IssueKind::Dependency,
                            Severity::Medium,
                            format!(
                                "{} depends on {}, which could not be mapped; using id {}",
                                resource.address(),
                                dependency,
                                entry.id
                            ),
                        )
                        .for_resource(&resource.original.id),
                    );
                    reported.insert((resource.original.id.clone(), sanitize_resource_name("", &entry.id)));
                    continue;
                }
                let target = dependency
                    .split_once('.')
                    .map(|(_, name)| name)
                    .unwrap_or(dependency.as_str());
                if reported.insert((resource.original.id.clone(), target.to_string())) {
                    warnings.push(
                        GenerationIssue::new(
                            IssueKind::Dependency,
                            Severity::Medium,
                            format!("{} depends on {}, which is not part of this batch", resource.address(), dependency),
                        )
                        .for_resource(&resource.original.id),
                    );
                }
            }
        }

        for dangling in self.resolver.dangling_references(kept) {
            let target = sanitize_resource_name("", &dangling.target_id);
            if reported.insert((dangling.resource_id.clone(), target)) {
                warnings.push(
                    GenerationIssue::new(
                        IssueKind::Dependency,
                        Severity::Medium,
                        format!(
                            "{} refers to {}, which is not part of this batch",
                            dangling.attribute, dangling.target_id
                        ),
                    )
                    .for_resource(dangling.resource_id),
                );
            }
        }

        let deps = self.resolver.analyze_dependencies(kept);
        for cycle in self.resolver.find_cycles(&deps) {
            let mut issue = GenerationIssue::new(
                IssueKind::Dependency,
                Severity::Medium,
                format!("Cyclic dependency: {}", cycle.join(" -> ")),
            );
            if let Some(first) = cycle.first() {
                issue = issue.for_resource(first);
            }
            warnings.push(issue);
        }
    }

    /// One configuration per `(provider, region)` in use. The mapper's
    /// configuration is the default; every other region gets an aliased copy
    /// and its resources are pointed at the alias.
    fn assign_providers(&self, mapped: &mut [MappedResource]) -> Vec<ProviderConfig> {
        let mut by_provider: BTreeMap<CloudProvider, Vec<Resource>> = BTreeMap::new();
        for resource in mapped.iter() {
            by_provider
                .entry(resource.provider())
                .or_default()
                .push(resource.original.clone());
        }

        let mut configs = Vec::new();
        let mut aliases: HashMap<(CloudProvider, String), String> = HashMap::new();
        for (provider, originals) in &by_provider {
            let Some(mapper) = self.mappers.get(*provider) else {
                continue;
            };
            let base = mapper.provider_config(originals);
            let others: BTreeSet<&str> = originals
                .iter()
                .map(|r| r.region.as_str())
                .filter(|region| !region.is_empty() && *region != base.region)
                .collect();

            configs.push(base.clone());
            for region in others {
                let alias = region_alias(region);
                debug!(provider = %provider, region, alias = %alias, "Aliasing provider region");
                aliases.insert((*provider, region.to_string()), alias.clone());
                configs.push(base.clone().with_region(region).with_alias(alias));
            }
        }

        for resource in mapped.iter_mut() {
            let key = (resource.provider(), resource.region().to_string());
            if let Some(alias) = aliases.get(&key) {
                resource.provider_alias = Some(alias.clone());
            }
        }
        configs
    }
}

impl Default for GenerationEngine {
    fn default() -> Self {
        Self::with_defaults()
    }
}

impl std::fmt::Debug for GenerationEngine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let mut formats: Vec<_> = self.renderers.keys().map(OutputFormat::as_str).collect();
        formats.sort_unstable();
        f.debug_struct("GenerationEngine")
            .field("mappers", &self.mappers)
            .field("renderers", &formats)
            .finish()
    }
}

/// Apply include/exclude patterns and drop repeated resources. Exclusion
/// wins over inclusion.
fn filter_resources(
    resources: &[Resource],
    options: &GenerationOptions,
    warnings: &mut Vec<GenerationIssue>,
) -> Vec<Resource> {
    let matches = |resource: &Resource, patterns: &[String]| {
        patterns
            .iter()
            .any(|p| resource.resource_type.contains(p.as_str()) || resource.id.contains(p.as_str()))
    };

    let mut seen = HashSet::new();
    let mut kept = Vec::with_capacity(resources.len());
    for resource in resources {
        let reason = if matches(resource, &options.exclude) {
            Some("Excluded by pattern")
        } else if !options.include.is_empty() && !matches(resource, &options.include) {
            Some("Not matched by any include pattern")
        } else if !seen.insert(resource.key()) {
            Some("Duplicate resource")
        } else {
            None
        };

        match reason {
            Some(reason) => warnings.push(
                GenerationIssue::new(IssueKind::Filter, Severity::Low, reason).for_resource(&resource.id),
            ),
            None => kept.push(resource.clone()),
        }
    }
    kept
}

/// Merge variable and output declarations. A required variable wins over an
/// optional one of the same name; the first output of a name is kept.
fn collect_declarations(
    mapped: &[MappedResource],
    warnings: &mut Vec<GenerationIssue>,
) -> (BTreeMap<String, Variable>, BTreeMap<String, Output>) {
    let mut variables: BTreeMap<String, Variable> = BTreeMap::new();
    let mut outputs: BTreeMap<String, Output> = BTreeMap::new();

    for resource in mapped {
        for (name, variable) in &resource.variables {
            match variables.get(name) {
                Some(existing) if existing.required || !variable.required => {}
                _ => {
                    variables.insert(name.clone(), variable.clone());
                }
            }
        }

        for (name, output) in &resource.outputs {
            if outputs.contains_key(name) {
                warnings.push(
                    GenerationIssue::new(
                        IssueKind::Output,
                        Severity::Low,
                        format!("Output '{}' is declared more than once; keeping the first", name),
                    )
                    .for_resource(&resource.original.id),
                );
            } else {
                outputs.insert(name.clone(), output.clone());
            }
        }
    }
    (variables, outputs)
}

fn render_group(renderer: &dyn IacRenderer, group: &[MappedResource]) -> IacResult<String> {
    let blocks = group
        .iter()
        .map(|resource| renderer.render_resource(resource))
        .collect::<IacResult<Vec<_>>>()?;
    Ok(blocks.join("\n"))
}

fn write_files(dir: &Path, files: &[GeneratedFile], force: bool) -> GenerationEngineResult<()> {
    if !force {
        if let Some(existing) = files.iter().map(|f| dir.join(&f.path)).find(|p| p.exists()) {
            return Err(GenerationError::OutputExists(existing));
        }
    }

    fs::create_dir_all(dir)?;
    for file in files {
        let path = dir.join(&file.path);
        debug!(file = %path.display(), bytes = file.size, "Writing file");
        fs::write(&path, &file.content)?;
    }
    Ok(())
}
