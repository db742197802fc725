//! Project configuration file (`stratus.yaml`, `stratus.yml` or `stratus.toml`).
//!
//! Command-line flags override values read from the file.

use std::fs;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::debug;

use stratus_core::{CloudProvider, CoreResult, Filter};
use stratus_discovery::DiscoveryConfig;
use stratus_iac::GenerationOptions;

/// Looked up in the working directory, in this order.
pub const CONFIG_FILE_NAMES: &[&str] = &["stratus.yaml", "stratus.yml", "stratus.toml"];

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Unsupported config file format: {0} (expected .yaml, .yml or .toml)")]
    UnsupportedFormat(PathBuf),

    #[error("IO error reading config: {0}")]
    Io(#[from] std::io::Error),

    #[error("YAML error: {0}")]
    Yaml(#[from] serde_yaml::Error),

    #[error("TOML error: {0}")]
    Toml(#[from] toml::de::Error),
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct StratusConfig {
    pub discovery: DiscoverySection,
    pub generation: GenerationOptions,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct DiscoverySection {
    /// Engine limits: concurrency, retries, timeout.
    #[serde(flatten)]
    pub engine: DiscoveryConfig,
    pub providers: Vec<String>,
    pub regions: Vec<String>,
    pub resource_types: Vec<String>,
    /// Filter shorthand, e.g. `tags.env=prod`.
    pub filters: Vec<String>,
    /// Directory with `<provider>.json` snapshots.
    pub snapshot_dir: Option<PathBuf>,
}

impl DiscoverySection {
    pub fn parsed_providers(&self) -> CoreResult<Vec<CloudProvider>> {
        self.providers.iter().map(|p| CloudProvider::parse(p)).collect()
    }

    pub fn parsed_filters(&self) -> CoreResult<Vec<Filter>> {
        self.filters.iter().map(|f| Filter::parse(f)).collect()
    }
}

impl StratusConfig {
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let content = fs::read_to_string(path)?;
        let config = match path.extension().and_then(|e| e.to_str()) {
            Some("yaml") | Some("yml") => serde_yaml::from_str(&content)?,
            Some("toml") => toml::from_str(&content)?,
            _ => return Err(ConfigError::UnsupportedFormat(path.to_path_buf())),
        };
        debug!("Loaded config from {:?}", path);
        Ok(config)
    }

    /// The explicit file if given, else the first conventional file in `dir`,
    /// else defaults.
    pub fn resolve_in(dir: &Path, explicit: Option<&Path>) -> Result<Self, ConfigError> {
        if let Some(path) = explicit {
            return Self::load(path);
        }
        match CONFIG_FILE_NAMES
            .iter()
            .map(|name| dir.join(name))
            .find(|candidate| candidate.is_file())
        {
            Some(path) => Self::load(&path),
            None => Ok(Self::default()),
        }
    }

    pub fn resolve(explicit: Option<&Path>) -> Result<Self, ConfigError> {
        let cwd = std::env::current_dir()?;
        Self::resolve_in(&cwd, explicit)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use stratus_iac::OrganizationPattern;
    use tempfile::TempDir;

    #[test]
    fn test_load_yaml() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("stratus.yaml");
        fs::write(
            &path,
            r#"
discovery:
  max_concurrency: 4
  retry_attempts: 2
  providers: [aws, gcp]
  filters: ["tags.env=prod"]
  snapshot_dir: inventory
generation:
  pattern: by_service
  validate: true
  exclude: [aws_s3]
"#,
        )
        .unwrap();

        let config = StratusConfig::resolve_in(dir.path(), None).unwrap();
        assert_eq!(config.discovery.engine.max_concurrency, 4);
        assert_eq!(config.discovery.engine.retry_attempts, 2);
        assert_eq!(config.discovery.engine.timeout_seconds, 300);
        assert_eq!(
            config.discovery.parsed_providers().unwrap(),
            vec![CloudProvider::Aws, CloudProvider::Gcp]
        );
        assert_eq!(config.discovery.parsed_filters().unwrap().len(), 1);
        assert_eq!(config.generation.pattern, OrganizationPattern::ByService);
        assert!(config.generation.validate);
        assert!(config.generation.include_provider);
    }

    #[test]
    fn test_load_toml() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("stratus.toml");
        fs::write(
            &path,
            r#"
[discovery]
timeout_seconds = 60
regions = ["us-east-1"]

[generation]
single_file = true
output_path = "terraform"
"#,
        )
        .unwrap();

        let config = StratusConfig::load(&path).unwrap();
        assert_eq!(config.discovery.engine.timeout_seconds, 60);
        assert_eq!(config.discovery.regions, vec!["us-east-1"]);
        assert!(config.generation.single_file);
        assert_eq!(config.generation.output_path, Some(PathBuf::from("terraform")));
    }

    #[test]
    fn test_defaults_without_file() {
        let dir = TempDir::new().unwrap();
        let config = StratusConfig::resolve_in(dir.path(), None).unwrap();
        assert!(config.discovery.providers.is_empty());
        assert_eq!(config.discovery.engine.max_concurrency, 10);
    }

    #[test]
    fn test_unsupported_extension() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("stratus.json");
        fs::write(&path, "{}").unwrap();
        assert!(matches!(
            StratusConfig::load(&path),
            Err(ConfigError::UnsupportedFormat(_))
        ));
    }

    #[test]
    fn test_invalid_provider_reported() {
        let section = DiscoverySection {
            providers: vec!["oracle".to_string()],
            ..Default::default()
        };
        assert!(section.parsed_providers().is_err());
    }
}
