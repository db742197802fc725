//! Generation options.

use std::fmt;
use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::GenerationError;

/// Output syntax.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OutputFormat {
    /// Terraform native syntax (`.tf`).
    #[default]
    Hcl,
    /// Terraform JSON syntax (`.tf.json`).
    Json,
}

impl OutputFormat {
    pub fn as_str(&self) -> &'static str {
        match self {
            OutputFormat::Hcl => "hcl",
            OutputFormat::Json => "json",
        }
    }
}

impl fmt::Display for OutputFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for OutputFormat {
    type Err = GenerationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "hcl" | "tf" | "terraform" => Ok(OutputFormat::Hcl),
            "json" | "tf.json" => Ok(OutputFormat::Json),
            other => Err(GenerationError::InvalidOptions(format!("unknown format '{}'", other))),
        }
    }
}

/// How mapped resources are grouped into files.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OrganizationPattern {
    /// Everything in `main.tf`.
    #[default]
    Flat,
    ByProvider,
    ByService,
    ByRegion,
    ByResourceType,
}

impl OrganizationPattern {
    pub fn as_str(&self) -> &'static str {
        match self {
            OrganizationPattern::Flat => "flat",
            OrganizationPattern::ByProvider => "by_provider",
            OrganizationPattern::ByService => "by_service",
            OrganizationPattern::ByRegion => "by_region",
            OrganizationPattern::ByResourceType => "by_resource_type",
        }
    }

    pub fn all() -> [OrganizationPattern; 5] {
        [
            OrganizationPattern::Flat,
            OrganizationPattern::ByProvider,
            OrganizationPattern::ByService,
            OrganizationPattern::ByRegion,
            OrganizationPattern::ByResourceType,
        ]
    }
}

impl fmt::Display for OrganizationPattern {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for OrganizationPattern {
    type Err = GenerationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let normalized = s.trim().to_lowercase().replace('-', "_");
        match normalized.as_str() {
            "flat" => Ok(OrganizationPattern::Flat),
            "by_provider" | "provider" => Ok(OrganizationPattern::ByProvider),
            "by_service" | "service" => Ok(OrganizationPattern::ByService),
            "by_region" | "region" => Ok(OrganizationPattern::ByRegion),
            "by_resource_type" | "by_type" | "resource_type" | "type" => {
                Ok(OrganizationPattern::ByResourceType)
            }
            _ => Err(GenerationError::InvalidOptions(format!(
                "unknown organization pattern '{}'",
                s
            ))),
        }
    }
}

/// Options for one generation run.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct GenerationOptions {
    pub format: OutputFormat,
    pub pattern: OrganizationPattern,
    /// Put every resource in one file. Only valid with the flat pattern.
    pub single_file: bool,
    pub include_provider: bool,
    pub include_variables: bool,
    pub include_outputs: bool,
    /// Directory to write into; nothing is written when unset.
    pub output_path: Option<PathBuf>,
    /// Overwrite existing files.
    pub force: bool,
    /// Run the renderer's syntax check on every file.
    pub validate: bool,
    /// Keep only resources whose type or id contains one of these.
    pub include: Vec<String>,
    /// Drop resources whose type or id contains one of these. Wins over `include`.
    pub exclude: Vec<String>,
    #[serde(skip)]
    pub timeout: Option<Duration>,
}

impl Default for GenerationOptions {
    fn default() -> Self {
        Self {
            format: OutputFormat::Hcl,
            pattern: OrganizationPattern::Flat,
            single_file: false,
            include_provider: true,
            include_variables: true,
            include_outputs: true,
            output_path: None,
            force: false,
            validate: false,
            include: Vec::new(),
            exclude: Vec::new(),
            timeout: None,
        }
    }
}

impl GenerationOptions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn format(mut self, format: OutputFormat) -> Self {
        self.format = format;
        self
    }

    pub fn pattern(mut self, pattern: OrganizationPattern) -> Self {
        self.pattern = pattern;
        self
    }

    pub fn single_file(mut self, single_file: bool) -> Self {
        self.single_file = single_file;
        self
    }

    pub fn include_provider(mut self, include: bool) -> Self {
        self.include_provider = include;
        self
    }

    pub fn include_variables(mut self, include: bool) -> Self {
        self.include_variables = include;
        self
    }

    pub fn include_outputs(mut self, include: bool) -> Self {
        self.include_outputs = include;
        self
    }

    pub fn output_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.output_path = Some(path.into());
        self
    }

    pub fn force(mut self, force: bool) -> Self {
        self.force = force;
        self
    }

    pub fn validate(mut self, validate: bool) -> Self {
        self.validate = validate;
        self
    }

    pub fn include(mut self, pattern: impl Into<String>) -> Self {
        self.include.push(pattern.into());
        self
    }

    pub fn exclude(mut self, pattern: impl Into<String>) -> Self {
        self.exclude.push(pattern.into());
        self
    }

    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    /// Pattern actually applied: `single_file` forces flat.
    pub fn effective_pattern(&self) -> OrganizationPattern {
        if self.single_file {
            OrganizationPattern::Flat
        } else {
            self.pattern
        }
    }
}
