//! Preview command - Show the file layout without rendering.

use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Args;

use stratus_iac::{GenerationEngine, OrganizationPattern};

use super::generate::{build_options, load_resources};
use crate::config::StratusConfig;

#[derive(Args)]
pub struct PreviewArgs {
    /// Inventory file (discovery result or resource array)
    #[arg(short, long)]
    input: PathBuf,

    /// File layout: flat, by_provider, by_service, by_region, by_resource_type
    #[arg(long)]
    organize: Option<OrganizationPattern>,

    /// Put every resource in main.tf
    #[arg(long)]
    single_file: bool,

    /// Skip provider and version files
    #[arg(long)]
    no_provider: bool,

    /// Only resources whose type or id contains this (repeatable)
    #[arg(long)]
    include: Vec<String>,

    /// Skip resources whose type or id contains this (repeatable)
    #[arg(long)]
    exclude: Vec<String>,

    /// Print the preview as JSON
    #[arg(long)]
    json: bool,
}

pub async fn execute(args: PreviewArgs, config: &StratusConfig) -> Result<()> {
    let resources = load_resources(&args.input)?;
    let options = build_options(
        &config.generation,
        args.organize,
        args.single_file,
        args.no_provider,
        args.include,
        args.exclude,
    );

    let preview = GenerationEngine::with_defaults()
        .preview(&resources, &options)
        .context("preview failed")?;

    if args.json {
        println!("{}", serde_json::to_string_pretty(&preview)?);
        return Ok(());
    }

    println!(
        "📋 {} resource(s), {} after filtering, {} mappable",
        preview.total_resources, preview.filtered_resources, preview.mappable_resources
    );
    println!("   Layout ({}):", options.effective_pattern());
    for file in &preview.files {
        if file.resource_count > 0 {
            println!("   {:<40} {:>4} resource(s)", file.path, file.resource_count);
        } else {
            println!("   {:<40} {}", file.path, file.file_type);
        }
    }
    if !preview.unmapped.is_empty() {
        println!("   ⚠️  Not mappable: {}", preview.unmapped.join(", "));
    }

    Ok(())
}
