//! Discover command - Collect resources from provider snapshots.

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use clap::Args;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use stratus_core::{CloudProvider, Filter};
use stratus_discovery::{DiscoveryEngine, DiscoveryOptions, SnapshotConnector};

use super::{or_configured, CommandError};
use crate::config::StratusConfig;

#[derive(Args)]
pub struct DiscoverArgs {
    /// Directory holding one <provider>.json snapshot per provider
    #[arg(short, long)]
    snapshot_dir: Option<PathBuf>,

    /// Providers to discover (comma separated)
    #[arg(short, long, value_delimiter = ',')]
    provider: Vec<String>,

    /// Restrict to these regions (comma separated)
    #[arg(short, long, value_delimiter = ',')]
    region: Vec<String>,

    /// Restrict to these resource types (comma separated)
    #[arg(short = 't', long = "type", value_delimiter = ',')]
    resource_type: Vec<String>,

    /// Filter expression, e.g. tags.env=prod (repeatable, all must match)
    #[arg(short, long)]
    filter: Vec<String>,

    /// Maximum providers discovered at once
    #[arg(long)]
    max_concurrency: Option<usize>,

    /// Overall timeout in seconds
    #[arg(long)]
    timeout: Option<u64>,

    /// Write the discovery result to this file
    #[arg(short, long)]
    out: Option<PathBuf>,
}

pub async fn execute(args: DiscoverArgs, config: &StratusConfig) -> Result<()> {
    let section = &config.discovery;

    let providers: Vec<CloudProvider> = if args.provider.is_empty() {
        section.parsed_providers()?
    } else {
        args.provider
            .iter()
            .map(|p| CloudProvider::parse(p))
            .collect::<Result<_, _>>()?
    };
    if providers.is_empty() {
        return Err(CommandError::InvalidArguments("no providers given (use --provider)".to_string()).into());
    }

    let snapshot_dir = args
        .snapshot_dir
        .or_else(|| section.snapshot_dir.clone())
        .ok_or_else(|| CommandError::InvalidArguments("no snapshot directory given (use --snapshot-dir)".to_string()))?;

    let filters: Vec<Filter> = if args.filter.is_empty() {
        section.parsed_filters()?
    } else {
        args.filter
            .iter()
            .map(|f| Filter::parse(f))
            .collect::<Result<_, _>>()?
    };

    let mut engine = DiscoveryEngine::new(section.engine.clone());
    for provider in &providers {
        engine.register_connector(Arc::new(SnapshotConnector::in_dir(*provider, &snapshot_dir)));
    }

    let mut options = DiscoveryOptions::new(providers.iter().copied());
    options.regions = or_configured(args.region, &section.regions);
    options.resource_types = or_configured(args.resource_type, &section.resource_types);
    options.filters = filters;
    options.max_concurrency = args.max_concurrency;
    options.timeout = args.timeout.map(Duration::from_secs);

    info!(
        "Discovering {} provider(s) from {}",
        providers.len(),
        snapshot_dir.display()
    );

    let cancel = CancellationToken::new();
    let on_interrupt = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            warn!("Interrupted, returning what was collected so far");
            on_interrupt.cancel();
        }
    });

    let result = engine
        .discover_with_cancel(&options, cancel)
        .await
        .context("discovery failed")?;

    println!(
        "🔍 Discovered {} resource(s) in {} ms",
        result.resources.len(),
        result.metadata.duration_ms
    );
    for (provider, count) in &result.metadata.provider_counts {
        println!("   {:<12} {}", provider.as_str(), count);
    }
    for error in &result.errors {
        println!("   ⚠️  {}", error);
    }

    if let Some(out) = &args.out {
        result
            .to_file(out)
            .with_context(|| format!("failed to write {}", out.display()))?;
        println!("💾 Saved inventory to {}", out.display());
    }

    Ok(())
}
