//! Generate command - Render Terraform from a resource inventory.

use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{Context, Result};
use clap::Args;
use tracing::info;

use stratus_core::{Resource, ResourceDocument};
use stratus_iac::{GenerationEngine, GenerationIssue, GenerationOptions, OrganizationPattern};

use super::CommandError;
use crate::config::StratusConfig;

#[derive(Args)]
pub struct GenerateArgs {
    /// Inventory file (discovery result or resource array)
    #[arg(short, long)]
    input: PathBuf,

    /// Directory to write into; omit for a dry run
    #[arg(short, long)]
    output: Option<PathBuf>,

    /// File layout: flat, by_provider, by_service, by_region, by_resource_type
    #[arg(long)]
    organize: Option<OrganizationPattern>,

    /// Put every resource in main.tf
    #[arg(long)]
    single_file: bool,

    /// Skip provider and version files
    #[arg(long)]
    no_provider: bool,

    /// Check the syntax of every generated file
    #[arg(long)]
    validate: bool,

    /// Overwrite existing files
    #[arg(long)]
    force: bool,

    /// Only resources whose type or id contains this (repeatable)
    #[arg(long)]
    include: Vec<String>,

    /// Skip resources whose type or id contains this (repeatable)
    #[arg(long)]
    exclude: Vec<String>,

    /// Overall timeout in seconds
    #[arg(long)]
    timeout: Option<u64>,
}

/// Read an inventory file.
pub(crate) fn load_resources(path: &Path) -> Result<Vec<Resource>> {
    let document =
        ResourceDocument::from_file(path).with_context(|| format!("failed to read {}", path.display()))?;
    Ok(document.into_resources())
}

/// Configured options with the command-line flags applied on top.
pub(crate) fn build_options(
    base: &GenerationOptions,
    organize: Option<OrganizationPattern>,
    single_file: bool,
    no_provider: bool,
    include: Vec<String>,
    exclude: Vec<String>,
) -> GenerationOptions {
    let mut options = base.clone();
    if let Some(pattern) = organize {
        options.pattern = pattern;
    }
    options.single_file |= single_file;
    if no_provider {
        options.include_provider = false;
    }
    options.include.extend(include);
    options.exclude.extend(exclude);
    options
}

pub(crate) fn print_issues(errors: &[GenerationIssue], warnings: &[GenerationIssue]) {
    for error in errors {
        println!("   ❌ {}", error);
    }
    for warning in warnings {
        println!("   ⚠️  {}", warning);
    }
}

pub async fn execute(args: GenerateArgs, config: &StratusConfig) -> Result<()> {
    let resources = load_resources(&args.input)?;
    info!("Loaded {} resource(s) from {}", resources.len(), args.input.display());

    let mut options = build_options(
        &config.generation,
        args.organize,
        args.single_file,
        args.no_provider,
        args.include,
        args.exclude,
    );
    if let Some(output) = args.output {
        options.output_path = Some(output);
    }
    options.validate |= args.validate;
    options.force |= args.force;
    if let Some(secs) = args.timeout {
        options.timeout = Some(Duration::from_secs(secs));
    }

    let engine = GenerationEngine::with_defaults();
    let result = engine
        .generate(&resources, &options)
        .context("generation failed")?;

    println!("🏗️  Generated {} file(s):", result.files.len());
    for file in &result.files {
        println!(
            "   {:<40} {:>4} resource(s) {:>6} lines",
            file.path, file.resource_count, file.line_count
        );
    }
    print_issues(&result.errors, &result.warnings);

    let meta = &result.metadata;
    println!();
    println!(
        "📊 discovered: {}  mapped: {}  rendered: {}  errors: {}  warnings: {}",
        meta.total_resources,
        meta.mapped_resources,
        result.rendered_resources(),
        meta.error_count,
        meta.warning_count
    );
    match &meta.written_to {
        Some(dir) => println!("💾 Wrote files to {}", dir.display()),
        None => println!("ℹ️  Dry run, nothing written (use --output)"),
    }

    if result.rendered_resources() == 0 {
        return Err(CommandError::NothingRendered.into());
    }
    Ok(())
}
