//! Discovery result document and the JSON interchange format.

use std::collections::BTreeMap;
use std::fs;
use std::path::Path;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::{CoreError, CoreResult};
use crate::filter::Filter;
use crate::provider::CloudProvider;
use crate::resource::Resource;

/// Why a provider's discovery did not produce resources.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DiscoveryErrorKind {
    Credentials,
    Discovery,
    Timeout,
    Cancelled,
}

/// A per-provider partial failure.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DiscoveryError {
    pub provider: CloudProvider,
    pub message: String,
    #[serde(default = "default_error_kind")]
    pub kind: DiscoveryErrorKind,
}

fn default_error_kind() -> DiscoveryErrorKind {
    DiscoveryErrorKind::Discovery
}

impl DiscoveryError {
    pub fn new(provider: CloudProvider, kind: DiscoveryErrorKind, message: impl Into<String>) -> Self {
        Self {
            provider,
            message: message.into(),
            kind,
        }
    }

    pub fn is_timeout(&self) -> bool {
        matches!(self.kind, DiscoveryErrorKind::Timeout | DiscoveryErrorKind::Cancelled)
    }
}

impl std::fmt::Display for DiscoveryError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}: {}", self.provider, self.message)
    }
}

/// Run metadata computed at the end of a discovery call.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DiscoveryMetadata {
    pub run_id: String,
    pub started_at: DateTime<Utc>,
    pub completed_at: DateTime<Utc>,
    pub duration_ms: u64,
    pub providers: Vec<CloudProvider>,
    pub total_resources: usize,
    pub provider_counts: BTreeMap<CloudProvider, usize>,
    pub error_count: usize,
    #[serde(default)]
    pub applied_filters: Vec<Filter>,
}

/// Outcome of one discovery call. Built once, not mutated afterwards.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DiscoveryResult {
    pub resources: Vec<Resource>,
    pub metadata: DiscoveryMetadata,
    #[serde(default)]
    pub errors: Vec<DiscoveryError>,
}

impl DiscoveryResult {
    pub fn has_errors(&self) -> bool {
        !self.errors.is_empty()
    }

    pub fn resources_for(&self, provider: CloudProvider) -> impl Iterator<Item = &Resource> {
        self.resources.iter().filter(move |r| r.provider == provider)
    }

    /// Save the result as pretty-printed JSON.
    pub fn to_file(&self, path: &Path) -> CoreResult<()> {
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent)?;
        }
        let json = serde_json::to_string_pretty(self)?;
        fs::write(path, json)?;
        debug!("Saved discovery result to {:?}", path);
        Ok(())
    }
}

/// Accepted input shapes for generation: a full discovery result or a bare
/// resource array.
#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
pub enum ResourceDocument {
    Discovery(DiscoveryResult),
    Resources(Vec<Resource>),
}

impl ResourceDocument {
    pub fn from_json(content: &str) -> CoreResult<Self> {
        let trimmed = content.trim_start();
        if trimmed.starts_with('[') {
            let resources: Vec<Resource> = serde_json::from_str(trimmed)?;
            return Ok(ResourceDocument::Resources(resources));
        }
        if trimmed.starts_with('{') {
            // Only the resources are required; a hand-written document may
            // omit metadata.
            let value: serde_json::Value = serde_json::from_str(trimmed)?;
            if value.get("metadata").is_some() {
                let result: DiscoveryResult = serde_json::from_value(value)?;
                return Ok(ResourceDocument::Discovery(result));
            }
            let resources = value
                .get("resources")
                .cloned()
                .ok_or_else(|| CoreError::InvalidDocument("missing 'resources' field".to_string()))?;
            let resources: Vec<Resource> = serde_json::from_value(resources)?;
            return Ok(ResourceDocument::Resources(resources));
        }
        Err(CoreError::InvalidDocument(
            "expected a JSON object or array".to_string(),
        ))
    }

    pub fn from_file(path: &Path) -> CoreResult<Self> {
        debug!("Reading resource document from {:?}", path);
        let content = fs::read_to_string(path)?;
        Self::from_json(&content)
    }

    pub fn into_resources(self) -> Vec<Resource> {
        match self {
            ResourceDocument::Discovery(result) => result.resources,
            ResourceDocument::Resources(resources) => resources,
        }
    }

    pub fn resources(&self) -> &[Resource] {
        match self {
            ResourceDocument::Discovery(result) => &result.resources,
            ResourceDocument::Resources(resources) => resources,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_bare_array_document() {
        let json = r#"[{"id": "vpc-1", "type": "aws_vpc", "provider": "aws", "region": "us-east-1"}]"#;
        let doc = ResourceDocument::from_json(json).unwrap();
        assert!(matches!(doc, ResourceDocument::Resources(_)));
        assert_eq!(doc.resources()[0].id, "vpc-1");
    }

    #[test]
    fn test_object_without_metadata() {
        let json = r#"{"resources": [{"id": "b", "type": "aws_s3_bucket", "provider": "aws"}]}"#;
        let doc = ResourceDocument::from_json(json).unwrap();
        assert_eq!(doc.into_resources().len(), 1);
    }

    #[test]
    fn test_rejects_scalar() {
        assert!(ResourceDocument::from_json("42").is_err());
        assert!(ResourceDocument::from_json(r#"{"items": []}"#).is_err());
    }
}
