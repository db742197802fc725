//! stratus CLI - Main entry point.
//!
//! Exit codes:
//! - 0: Success
//! - 1: General error
//! - 2: Invalid arguments
//! - 3: Validation failure
//! - 4: Discovery error
//! - 5: Generation error

use std::process::ExitCode;

use clap::Parser;
use tracing::debug;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

mod commands;
mod config;

use commands::{Cli, CommandError, Commands};
use config::{ConfigError, StratusConfig};

/// CI-friendly exit codes
pub struct ExitCodes;

impl ExitCodes {
    pub const SUCCESS: u8 = 0;
    pub const GENERAL_ERROR: u8 = 1;
    pub const INVALID_ARGS: u8 = 2;
    pub const VALIDATION_FAILURE: u8 = 3;
    pub const DISCOVERY_ERROR: u8 = 4;
    pub const GENERATION_ERROR: u8 = 5;
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();
    init_logging(cli.verbose, cli.quiet);

    let result = match StratusConfig::resolve(cli.config.as_deref()) {
        Ok(config) => {
            debug!(?config, "Loaded configuration");
            match cli.command {
                Commands::Discover(args) => commands::discover::execute(args, &config).await,
                Commands::Generate(args) => commands::generate::execute(args, &config).await,
                Commands::Preview(args) => commands::preview::execute(args, &config).await,
                Commands::Validate(args) => commands::validate::execute(args).await,
            }
        }
        Err(e) => Err(e.into()),
    };

    match result {
        Ok(()) => ExitCode::from(ExitCodes::SUCCESS),
        Err(e) => {
            let exit_code = categorize_error(&e);
            eprintln!("❌ Error: {:#}", e);
            ExitCode::from(exit_code)
        }
    }
}

/// Default directive `stratus=info`; `--verbose` lowers it to debug and
/// `--quiet` raises it to warn. `RUST_LOG` wins when set.
fn init_logging(verbose: bool, quiet: bool) {
    let level = if verbose {
        "debug"
    } else if quiet {
        "warn"
    } else {
        "info"
    };
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(format!("warn,stratus={}", level)));

    // A subscriber may already be installed, e.g. under a test harness.
    let _ = tracing_subscriber::registry()
        .with(fmt::layer().with_target(false))
        .with(filter)
        .try_init();
}

/// Map an error chain to an exit code by the first recognised cause.
fn categorize_error(e: &anyhow::Error) -> u8 {
    for cause in e.chain() {
        if let Some(error) = cause.downcast_ref::<CommandError>() {
            return match error {
                CommandError::InvalidArguments(_) => ExitCodes::INVALID_ARGS,
                CommandError::ValidationFailed(_) => ExitCodes::VALIDATION_FAILURE,
                CommandError::NothingRendered => ExitCodes::GENERATION_ERROR,
            };
        }
        if let Some(error) = cause.downcast_ref::<stratus_iac::GenerationError>() {
            return match error {
                stratus_iac::GenerationError::InvalidOptions(_)
                | stratus_iac::GenerationError::NoRendererForFormat(_) => ExitCodes::INVALID_ARGS,
                _ => ExitCodes::GENERATION_ERROR,
            };
        }
        if let Some(error) = cause.downcast_ref::<stratus_discovery::DiscoveryEngineError>() {
            return match error {
                stratus_discovery::DiscoveryEngineError::InvalidOptions(_)
                | stratus_discovery::DiscoveryEngineError::ProviderNotRegistered(_) => ExitCodes::INVALID_ARGS,
                _ => ExitCodes::DISCOVERY_ERROR,
            };
        }
        if cause.is::<ConfigError>() || cause.is::<stratus_core::CoreError>() {
            return ExitCodes::INVALID_ARGS;
        }
    }
    ExitCodes::GENERAL_ERROR
}

#[cfg(test)]
mod tests {
    use super::*;
    use anyhow::Context;

    #[test]
    fn test_categorize_error() {
        let err = anyhow::Error::new(CommandError::ValidationFailed(2));
        assert_eq!(categorize_error(&err), ExitCodes::VALIDATION_FAILURE);

        let err = Err::<(), _>(stratus_iac::GenerationError::NothingMapped { issues: vec![] })
            .context("generation failed")
            .unwrap_err();
        assert_eq!(categorize_error(&err), ExitCodes::GENERATION_ERROR);

        let err = anyhow::Error::new(stratus_discovery::DiscoveryEngineError::Cancelled);
        assert_eq!(categorize_error(&err), ExitCodes::DISCOVERY_ERROR);

        let err = anyhow::Error::new(stratus_core::CoreError::InvalidProvider("oracle".into()));
        assert_eq!(categorize_error(&err), ExitCodes::INVALID_ARGS);

        assert_eq!(categorize_error(&anyhow::anyhow!("boom")), ExitCodes::GENERAL_ERROR);
    }
}
