//! Provider-agnostic resource model.
//!
//! A [`Resource`] is produced once per discovery call and treated as
//! immutable afterwards. Provider-specific attributes live in `metadata` as
//! [`MetadataValue`]s so consumers extract them through typed accessors
//! instead of probing raw JSON.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::provider::CloudProvider;

/// A single metadata attribute value.
///
/// Serialized untagged, so the JSON interchange format stays plain JSON.
/// Variant order matters for deserialization: anything that is not a scalar
/// or a list of strings lands in [`MetadataValue::Json`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum MetadataValue {
    Bool(bool),
    Int(i64),
    Float(f64),
    String(String),
    StringList(Vec<String>),
    Json(serde_json::Value),
}

impl MetadataValue {
    pub fn as_str(&self) -> Option<&str> {
        match self {
            MetadataValue::String(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            MetadataValue::Bool(b) => Some(*b),
            MetadataValue::String(s) => match s.as_str() {
                "true" => Some(true),
                "false" => Some(false),
                _ => None,
            },
            _ => None,
        }
    }

    pub fn as_i64(&self) -> Option<i64> {
        match self {
            MetadataValue::Int(i) => Some(*i),
            MetadataValue::String(s) => s.parse().ok(),
            _ => None,
        }
    }

    pub fn as_f64(&self) -> Option<f64> {
        match self {
            MetadataValue::Int(i) => Some(*i as f64),
            MetadataValue::Float(f) => Some(*f),
            _ => None,
        }
    }

    /// String list view. A single string is promoted to a one-element list.
    pub fn as_string_list(&self) -> Option<Vec<String>> {
        match self {
            MetadataValue::StringList(items) => Some(items.clone()),
            MetadataValue::String(s) => Some(vec![s.clone()]),
            MetadataValue::Json(serde_json::Value::Array(items)) => items
                .iter()
                .map(|v| v.as_str().map(str::to_string))
                .collect(),
            _ => None,
        }
    }

    /// List elements as metadata values, if this value is a list.
    pub fn list_items(&self) -> Option<Vec<MetadataValue>> {
        match self {
            MetadataValue::StringList(items) => {
                Some(items.iter().cloned().map(MetadataValue::String).collect())
            }
            MetadataValue::Json(serde_json::Value::Array(items)) => {
                Some(items.iter().cloned().map(MetadataValue::from).collect())
            }
            _ => None,
        }
    }

    /// Equality that treats `Int` and `Float` holding the same number as equal.
    pub fn loosely_equals(&self, other: &MetadataValue) -> bool {
        match (self, other) {
            (MetadataValue::Int(_), MetadataValue::Float(_))
            | (MetadataValue::Float(_), MetadataValue::Int(_)) => self.as_f64() == other.as_f64(),
            (MetadataValue::Json(a), b) | (b, MetadataValue::Json(a)) => {
                serde_json::to_value(b).map(|b| *a == b).unwrap_or(false)
            }
            _ => self == other,
        }
    }
}

impl From<&str> for MetadataValue {
    fn from(value: &str) -> Self {
        MetadataValue::String(value.to_string())
    }
}

impl From<String> for MetadataValue {
    fn from(value: String) -> Self {
        MetadataValue::String(value)
    }
}

impl From<bool> for MetadataValue {
    fn from(value: bool) -> Self {
        MetadataValue::Bool(value)
    }
}

impl From<i64> for MetadataValue {
    fn from(value: i64) -> Self {
        MetadataValue::Int(value)
    }
}

impl From<f64> for MetadataValue {
    fn from(value: f64) -> Self {
        MetadataValue::Float(value)
    }
}

impl From<Vec<String>> for MetadataValue {
    fn from(value: Vec<String>) -> Self {
        MetadataValue::StringList(value)
    }
}

impl From<serde_json::Value> for MetadataValue {
    fn from(value: serde_json::Value) -> Self {
        match value {
            serde_json::Value::Bool(b) => MetadataValue::Bool(b),
            serde_json::Value::Number(n) => match n.as_i64() {
                Some(i) => MetadataValue::Int(i),
                None => MetadataValue::Float(n.as_f64().unwrap_or_default()),
            },
            serde_json::Value::String(s) => MetadataValue::String(s),
            serde_json::Value::Array(items) if items.iter().all(|v| v.is_string()) => {
                MetadataValue::StringList(
                    items
                        .into_iter()
                        .filter_map(|v| v.as_str().map(str::to_string))
                        .collect(),
                )
            }
            other => MetadataValue::Json(other),
        }
    }
}

/// A discovered infrastructure object.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Resource {
    /// Provider-native identifier, unique within provider + region.
    pub id: String,
    /// Human label, may be empty.
    #[serde(default)]
    pub name: String,
    /// Provider-specific type tag, e.g. `aws_vpc`.
    #[serde(rename = "type")]
    pub resource_type: String,
    pub provider: CloudProvider,
    #[serde(default)]
    pub region: String,
    #[serde(default)]
    pub zone: String,
    #[serde(default)]
    pub project: String,
    #[serde(default, rename = "resourceGroup", alias = "resource_group")]
    pub resource_group: String,
    #[serde(default)]
    pub metadata: BTreeMap<String, MetadataValue>,
    #[serde(default)]
    pub tags: BTreeMap<String, String>,
    #[serde(default, rename = "createdAt", alias = "created_at", skip_serializing_if = "Option::is_none")]
    pub created_at: Option<DateTime<Utc>>,
}

impl Resource {
    pub fn new(
        provider: CloudProvider,
        resource_type: impl Into<String>,
        id: impl Into<String>,
    ) -> Self {
        Self {
            id: id.into(),
            name: String::new(),
            resource_type: resource_type.into(),
            provider,
            region: String::new(),
            zone: String::new(),
            project: String::new(),
            resource_group: String::new(),
            metadata: BTreeMap::new(),
            tags: BTreeMap::new(),
            created_at: None,
        }
    }

    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }

    pub fn with_region(mut self, region: impl Into<String>) -> Self {
        self.region = region.into();
        self
    }

    pub fn with_zone(mut self, zone: impl Into<String>) -> Self {
        self.zone = zone.into();
        self
    }

    pub fn with_project(mut self, project: impl Into<String>) -> Self {
        self.project = project.into();
        self
    }

    pub fn with_resource_group(mut self, group: impl Into<String>) -> Self {
        self.resource_group = group.into();
        self
    }

    pub fn with_metadata(mut self, key: impl Into<String>, value: impl Into<MetadataValue>) -> Self {
        self.metadata.insert(key.into(), value.into());
        self
    }

    pub fn with_tag(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.tags.insert(key.into(), value.into());
        self
    }

    pub fn with_created_at(mut self, created_at: DateTime<Utc>) -> Self {
        self.created_at = Some(created_at);
        self
    }

    /// Identity triple: `(provider, region, id)`.
    pub fn key(&self) -> (CloudProvider, &str, &str) {
        (self.provider, &self.region, &self.id)
    }

    /// Name if set, otherwise the id.
    pub fn display_name(&self) -> &str {
        if self.name.trim().is_empty() {
            &self.id
        } else {
            &self.name
        }
    }

    pub fn metadata_value(&self, key: &str) -> Option<&MetadataValue> {
        self.metadata.get(key)
    }

    /// Non-empty string metadata.
    pub fn metadata_str(&self, key: &str) -> Option<&str> {
        self.metadata
            .get(key)
            .and_then(MetadataValue::as_str)
            .filter(|s| !s.is_empty())
    }

    pub fn metadata_bool(&self, key: &str, default: bool) -> bool {
        self.metadata
            .get(key)
            .and_then(MetadataValue::as_bool)
            .unwrap_or(default)
    }

    pub fn metadata_i64(&self, key: &str) -> Option<i64> {
        self.metadata.get(key).and_then(MetadataValue::as_i64)
    }

    pub fn metadata_string_list(&self, key: &str) -> Vec<String> {
        self.metadata
            .get(key)
            .and_then(MetadataValue::as_string_list)
            .unwrap_or_default()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_resource_builder() {
        let resource = Resource::new(CloudProvider::Aws, "aws_vpc", "vpc-1")
            .with_region("us-east-1")
            .with_metadata("cidr_block", "10.0.0.0/16")
            .with_tag("env", "prod");

        assert_eq!(resource.key(), (CloudProvider::Aws, "us-east-1", "vpc-1"));
        assert_eq!(resource.metadata_str("cidr_block"), Some("10.0.0.0/16"));
        assert_eq!(resource.display_name(), "vpc-1");
        assert_eq!(resource.tags.get("env"), Some(&"prod".to_string()));
    }

    #[test]
    fn test_metadata_deserializes_into_variants() {
        let json = r#"{
            "id": "i-1",
            "type": "aws_instance",
            "provider": "aws",
            "metadata": {
                "monitoring": true,
                "cpu_count": 2,
                "ratio": 0.5,
                "instance_type": "t3.micro",
                "security_group_ids": ["sg-1", "sg-2"],
                "root_block_device": {"volume_size": 8}
            }
        }"#;
        let resource: Resource = serde_json::from_str(json).unwrap();

        assert_eq!(resource.metadata["monitoring"], MetadataValue::Bool(true));
        assert_eq!(resource.metadata["cpu_count"], MetadataValue::Int(2));
        assert_eq!(resource.metadata["ratio"], MetadataValue::Float(0.5));
        assert_eq!(resource.metadata_str("instance_type"), Some("t3.micro"));
        assert_eq!(resource.metadata_string_list("security_group_ids"), vec!["sg-1", "sg-2"]);
        assert!(matches!(resource.metadata["root_block_device"], MetadataValue::Json(_)));
        assert!(resource.region.is_empty());
    }

    #[test]
    fn test_typed_accessor_defaults() {
        let resource = Resource::new(CloudProvider::Aws, "aws_vpc", "vpc-1")
            .with_metadata("enable_dns_support", "true");

        assert!(resource.metadata_bool("enable_dns_support", false));
        assert!(!resource.metadata_bool("enable_dns_hostnames", false));
        assert!(resource.metadata_string_list("missing").is_empty());
    }

    #[test]
    fn test_loose_numeric_equality() {
        assert!(MetadataValue::Int(2).loosely_equals(&MetadataValue::Float(2.0)));
        assert!(!MetadataValue::Int(2).loosely_equals(&MetadataValue::String("2".into())));
    }
}
