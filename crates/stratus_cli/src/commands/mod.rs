//! CLI command definitions.
//!
//! Each subcommand maps to one stage of the discover, generate and validate
//! workflow.

use std::path::PathBuf;

use clap::{Parser, Subcommand};
use thiserror::Error;

pub mod discover;
pub mod generate;
pub mod preview;
pub mod validate;

/// stratus - discover cloud resources and generate Terraform
#[derive(Parser)]
#[command(name = "stratus")]
#[command(version, about = "stratus - discover cloud resources and generate Terraform")]
#[command(long_about = r#"
stratus inventories existing cloud infrastructure and turns the inventory
into Terraform configuration.

WORKFLOWS:
  discover  → Collect resources from provider snapshots into one inventory
  generate  → Render Terraform files from an inventory
  preview   → Show the file layout generate would produce
  validate  → Check the syntax of a directory of .tf files

CONFIGURATION:
  stratus.yaml, stratus.yml or stratus.toml in the working directory,
  or the file given with --config. Flags override file values.

EXIT CODES:
  0 - Success
  1 - General error
  2 - Invalid arguments
  3 - Validation failure
  4 - Discovery error
  5 - Generation error
"#)]
#[command(propagate_version = true)]
pub struct Cli {
    /// Enable verbose output
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Suppress non-essential output
    #[arg(short, long, global = true)]
    pub quiet: bool,

    /// Configuration file
    #[arg(short, long, global = true, env = "STRATUS_CONFIG")]
    pub config: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Discover resources across providers
    Discover(discover::DiscoverArgs),

    /// Generate Terraform from a resource inventory
    Generate(generate::GenerateArgs),

    /// Preview the generated file layout without rendering
    Preview(preview::PreviewArgs),

    /// Validate the syntax of generated Terraform files
    Validate(validate::ValidateArgs),
}

/// Command outcomes that map to dedicated exit codes.
#[derive(Error, Debug)]
pub enum CommandError {
    #[error("Invalid arguments: {0}")]
    InvalidArguments(String),

    #[error("Validation failed: {0} file(s) with errors")]
    ValidationFailed(usize),

    #[error("Generation produced no resource blocks")]
    NothingRendered,
}

/// Command-line values when given, otherwise the configured ones.
pub(crate) fn or_configured<T: Clone>(flags: Vec<T>, configured: &[T]) -> Vec<T> {
    if flags.is_empty() {
        configured.to_vec()
    } else {
        flags
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn test_cli_definition() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_parse_generate() {
        let cli = Cli::parse_from([
            "stratus",
            "generate",
            "--input",
            "inventory.json",
            "--output",
            "tf",
            "--organize",
            "by-service",
            "--exclude",
            "aws_s3",
        ]);
        assert!(matches!(cli.command, Commands::Generate(_)));
    }

    #[test]
    fn test_flags_override_config() {
        let configured = vec!["aws".to_string()];
        assert_eq!(or_configured(vec![], &configured), configured);
        assert_eq!(or_configured(vec!["gcp".to_string()], &configured), vec!["gcp"]);
    }
}
