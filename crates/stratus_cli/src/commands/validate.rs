//! Validate command - Check the syntax of Terraform files.

use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use clap::Args;
use tracing::{debug, info};
use walkdir::WalkDir;

use stratus_iac::{HclSummary, IacRenderer, TerraformRenderer};

use super::CommandError;

#[derive(Args)]
pub struct ValidateArgs {
    /// Directory to scan for .tf files
    #[arg(short, long, default_value = ".")]
    dir: PathBuf,
}

/// Outcome for one file.
#[derive(Debug)]
pub struct FileCheck {
    pub path: PathBuf,
    pub summary: HclSummary,
    pub error: Option<String>,
}

/// `.tf` files under `dir`, sorted, skipping hidden directories such as
/// `.terraform`.
pub fn terraform_files(dir: &Path) -> Vec<PathBuf> {
    let mut files: Vec<PathBuf> = WalkDir::new(dir)
        .into_iter()
        .filter_entry(|entry| {
            entry.depth() == 0 || !entry.file_name().to_string_lossy().starts_with('.')
        })
        .filter_map(|entry| entry.ok())
        .filter(|entry| entry.file_type().is_file())
        .filter(|entry| entry.path().extension().is_some_and(|ext| ext == "tf"))
        .map(|entry| entry.into_path())
        .collect();
    files.sort();
    files
}

pub fn check_files(files: &[PathBuf]) -> Result<Vec<FileCheck>> {
    let renderer = TerraformRenderer::new();
    let mut checks = Vec::with_capacity(files.len());

    for path in files {
        debug!("Checking {}", path.display());
        let content =
            fs::read_to_string(path).with_context(|| format!("failed to read {}", path.display()))?;
        let summary = renderer.summarize(&content)?;
        let error = renderer.validate_syntax(&content).err().map(|e| e.to_string());
        checks.push(FileCheck {
            path: path.clone(),
            summary,
            error,
        });
    }
    Ok(checks)
}

pub async fn execute(args: ValidateArgs) -> Result<()> {
    if !args.dir.is_dir() {
        return Err(CommandError::InvalidArguments(format!("not a directory: {}", args.dir.display())).into());
    }

    let files = terraform_files(&args.dir);
    info!("Validating {} file(s) under {}", files.len(), args.dir.display());
    if files.is_empty() {
        println!("⚠️  No .tf files found in {}", args.dir.display());
        return Ok(());
    }

    let checks = check_files(&files)?;
    let mut failed = 0;
    for check in &checks {
        let display = check.path.strip_prefix(&args.dir).unwrap_or(&check.path);
        match &check.error {
            None => println!(
                "   ✅ {} ({} resource(s), {} variable(s), {} output(s))",
                display.display(),
                check.summary.resources.len(),
                check.summary.variables.len(),
                check.summary.outputs.len()
            ),
            Some(error) => {
                failed += 1;
                println!("   ❌ {}: {}", display.display(), error);
            }
        }
    }

    let resources: usize = checks.iter().map(|c| c.summary.resources.len()).sum();
    println!();
    println!("📊 files: {}  resources: {}  failed: {}", checks.len(), resources, failed);

    if failed > 0 {
        return Err(CommandError::ValidationFailed(failed).into());
    }
    println!("✅ All files passed");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_walks_tf_files_only() {
        let dir = TempDir::new().unwrap();
        fs::create_dir_all(dir.path().join("modules/net")).unwrap();
        fs::create_dir_all(dir.path().join(".terraform")).unwrap();
        fs::write(dir.path().join("main.tf"), "resource \"aws_vpc\" \"main\" {}\n").unwrap();
        fs::write(dir.path().join("modules/net/subnet.tf"), "variable \"x\" {}\n").unwrap();
        fs::write(dir.path().join(".terraform/cached.tf"), "{").unwrap();
        fs::write(dir.path().join("README.md"), "# readme").unwrap();

        let files = terraform_files(dir.path());
        assert_eq!(files.len(), 2);

        let checks = check_files(&files).unwrap();
        assert!(checks.iter().all(|c| c.error.is_none()));
        assert_eq!(checks[0].summary.resources, vec!["aws_vpc.main"]);
    }

    #[test]
    fn test_reports_syntax_errors() {
        let dir = TempDir::new().unwrap();
        fs::write(dir.path().join("broken.tf"), "resource \"a\" \"b\" {\n").unwrap();

        let checks = check_files(&terraform_files(dir.path())).unwrap();
        assert_eq!(checks.len(), 1);
        assert!(checks[0].error.as_deref().unwrap().contains("line 1"));
    }
}
