//! Target-side representation of a mapped resource.

use std::collections::BTreeMap;

use stratus_core::{CloudProvider, MetadataValue, Resource};

/// An attribute value in a resource's configuration.
#[derive(Debug, Clone, PartialEq)]
pub enum ConfigValue {
    String(String),
    Int(i64),
    Float(f64),
    Bool(bool),
    List(Vec<ConfigValue>),
    /// Rendered as `key = { ... }`.
    Map(BTreeMap<String, ConfigValue>),
    /// Rendered as a nested block `key { ... }`. A `List` of blocks renders as
    /// repeated blocks.
    Block(BTreeMap<String, ConfigValue>),
    /// Bare expression such as `aws_vpc.main.id` or `var.db_password`.
    Reference(String),
}

impl ConfigValue {
    pub fn reference(expression: impl Into<String>) -> Self {
        ConfigValue::Reference(expression.into())
    }

    pub fn string_list<I, S>(items: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        ConfigValue::List(items.into_iter().map(|s| ConfigValue::String(s.into())).collect())
    }

    pub fn is_block(&self) -> bool {
        matches!(self, ConfigValue::Block(_))
    }

    /// A non-empty list made only of blocks.
    pub fn is_block_list(&self) -> bool {
        match self {
            ConfigValue::List(items) => !items.is_empty() && items.iter().all(ConfigValue::is_block),
            _ => false,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            ConfigValue::String(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_reference(&self) -> Option<&str> {
        match self {
            ConfigValue::Reference(r) => Some(r),
            _ => None,
        }
    }

    /// Replace every reference into `address` (`<address>` or
    /// `<address>.<attr>`) with `literal`, recursing into collections.
    /// Returns the number of replacements.
    pub fn replace_references(&mut self, address: &str, literal: &str) -> usize {
        match self {
            ConfigValue::Reference(r) if refers_to(r, address) => {
                *self = ConfigValue::String(literal.to_string());
                1
            }
            ConfigValue::List(items) => items
                .iter_mut()
                .map(|item| item.replace_references(address, literal))
                .sum(),
            ConfigValue::Map(map) | ConfigValue::Block(map) => map
                .values_mut()
                .map(|value| value.replace_references(address, literal))
                .sum(),
            _ => 0,
        }
    }

    /// Convert a discovered metadata value. JSON nulls have no counterpart
    /// and yield `None`.
    pub fn from_metadata(value: &MetadataValue) -> Option<Self> {
        match value {
            MetadataValue::Bool(b) => Some(ConfigValue::Bool(*b)),
            MetadataValue::Int(i) => Some(ConfigValue::Int(*i)),
            MetadataValue::Float(f) => Some(ConfigValue::Float(*f)),
            MetadataValue::String(s) => Some(ConfigValue::String(s.clone())),
            MetadataValue::StringList(items) => Some(ConfigValue::string_list(items.iter().cloned())),
            MetadataValue::Json(json) => Self::from_json(json),
        }
    }

    pub fn from_json(value: &serde_json::Value) -> Option<Self> {
        use serde_json::Value;

        match value {
            Value::Null => None,
            Value::Bool(b) => Some(ConfigValue::Bool(*b)),
            Value::Number(n) => match n.as_i64() {
                Some(i) => Some(ConfigValue::Int(i)),
                None => n.as_f64().map(ConfigValue::Float),
            },
            Value::String(s) => Some(ConfigValue::String(s.clone())),
            Value::Array(items) => Some(ConfigValue::List(
                items.iter().filter_map(Self::from_json).collect(),
            )),
            Value::Object(map) => Some(ConfigValue::Map(
                map.iter()
                    .filter_map(|(k, v)| Self::from_json(v).map(|v| (k.clone(), v)))
                    .collect(),
            )),
        }
    }
}

fn refers_to(expression: &str, address: &str) -> bool {
    expression
        .strip_prefix(address)
        .is_some_and(|rest| rest.is_empty() || rest.starts_with('.'))
}

impl From<&str> for ConfigValue {
    fn from(value: &str) -> Self {
        ConfigValue::String(value.to_string())
    }
}

impl From<String> for ConfigValue {
    fn from(value: String) -> Self {
        ConfigValue::String(value)
    }
}

impl From<bool> for ConfigValue {
    fn from(value: bool) -> Self {
        ConfigValue::Bool(value)
    }
}

impl From<i64> for ConfigValue {
    fn from(value: i64) -> Self {
        ConfigValue::Int(value)
    }
}

impl From<f64> for ConfigValue {
    fn from(value: f64) -> Self {
        ConfigValue::Float(value)
    }
}

impl From<Vec<String>> for ConfigValue {
    fn from(value: Vec<String>) -> Self {
        ConfigValue::string_list(value)
    }
}

/// An input variable declared by a mapped resource.
#[derive(Debug, Clone, PartialEq)]
pub struct Variable {
    pub var_type: String,
    pub description: String,
    pub default: Option<ConfigValue>,
    pub required: bool,
    pub sensitive: bool,
}

impl Variable {
    /// A required variable without a default.
    pub fn new(var_type: impl Into<String>, description: impl Into<String>) -> Self {
        Self {
            var_type: var_type.into(),
            description: description.into(),
            default: None,
            required: true,
            sensitive: false,
        }
    }

    /// Giving a default makes the variable optional.
    pub fn with_default(mut self, default: impl Into<ConfigValue>) -> Self {
        self.default = Some(default.into());
        self.required = false;
        self
    }

    pub fn sensitive(mut self) -> Self {
        self.sensitive = true;
        self
    }
}

/// An output value declared by a mapped resource.
#[derive(Debug, Clone, PartialEq)]
pub struct Output {
    pub value: ConfigValue,
    pub description: String,
    pub sensitive: bool,
}

impl Output {
    pub fn new(value: ConfigValue, description: impl Into<String>) -> Self {
        Self {
            value,
            description: description.into(),
            sensitive: false,
        }
    }

    pub fn sensitive(mut self) -> Self {
        self.sensitive = true;
        self
    }
}

/// A resource translated into a Terraform resource block.
#[derive(Debug, Clone, PartialEq)]
pub struct MappedResource {
    pub original: Resource,
    pub resource_type: String,
    pub resource_name: String,
    pub configuration: BTreeMap<String, ConfigValue>,
    /// Addresses (`<type>.<name>`) this resource refers to.
    pub dependencies: Vec<String>,
    pub variables: BTreeMap<String, Variable>,
    pub outputs: BTreeMap<String, Output>,
    /// Provider alias for resources outside the provider's default region.
    pub provider_alias: Option<String>,
}

impl MappedResource {
    pub fn new(original: &Resource, resource_type: impl Into<String>, resource_name: impl Into<String>) -> Self {
        Self {
            original: original.clone(),
            resource_type: resource_type.into(),
            resource_name: resource_name.into(),
            configuration: BTreeMap::new(),
            dependencies: Vec::new(),
            variables: BTreeMap::new(),
            outputs: BTreeMap::new(),
            provider_alias: None,
        }
    }

    /// `<type>.<name>`
    pub fn address(&self) -> String {
        format!("{}.{}", self.resource_type, self.resource_name)
    }

    /// Expression for one of this resource's attributes, e.g. `aws_vpc.main.id`.
    pub fn attribute_ref(&self, attribute: &str) -> String {
        format!("{}.{}", self.address(), attribute)
    }

    pub fn provider(&self) -> CloudProvider {
        self.original.provider
    }

    pub fn region(&self) -> &str {
        &self.original.region
    }

    pub fn set(&mut self, key: impl Into<String>, value: impl Into<ConfigValue>) {
        self.configuration.insert(key.into(), value.into());
    }

    pub fn set_opt<V: Into<ConfigValue>>(&mut self, key: impl Into<String>, value: Option<V>) {
        if let Some(value) = value {
            self.set(key, value);
        }
    }

    pub fn get(&self, key: &str) -> Option<&ConfigValue> {
        self.configuration.get(key)
    }

    /// Point references to `address` at `literal` instead and drop the
    /// dependency. Used when the target ends up not being rendered.
    pub fn unlink(&mut self, address: &str, literal: &str) -> usize {
        self.dependencies.retain(|d| d != address);
        self.configuration
            .values_mut()
            .map(|value| value.replace_references(address, literal))
            .sum()
    }

    pub fn add_dependency(&mut self, address: impl Into<String>) {
        let address = address.into();
        if address != self.address() && !self.dependencies.contains(&address) {
            self.dependencies.push(address);
        }
    }

    pub fn declare_variable(&mut self, name: impl Into<String>, variable: Variable) {
        self.variables.insert(name.into(), variable);
    }

    pub fn declare_output(&mut self, name: impl Into<String>, output: Output) {
        self.outputs.insert(name.into(), output);
    }
}

/// Provider block settings for one `(provider, region)` pair.
#[derive(Debug, Clone, PartialEq)]
pub struct ProviderConfig {
    pub provider: CloudProvider,
    /// Terraform provider name, e.g. `aws` or `azurerm`.
    pub name: String,
    pub source: String,
    pub version: String,
    pub region: String,
    /// Argument carrying the region, if the provider takes one.
    pub region_key: Option<String>,
    pub alias: Option<String>,
    pub settings: BTreeMap<String, ConfigValue>,
}

impl ProviderConfig {
    pub fn for_provider(provider: CloudProvider) -> Self {
        let region_key = match provider {
            CloudProvider::Aws | CloudProvider::Gcp => Some("region".to_string()),
            _ => None,
        };
        let mut settings = BTreeMap::new();
        if provider == CloudProvider::Azure {
            settings.insert("features".to_string(), ConfigValue::Block(BTreeMap::new()));
        }
        Self {
            provider,
            name: provider.terraform_name().to_string(),
            source: provider.registry_source().to_string(),
            version: provider.default_version().to_string(),
            region: String::new(),
            region_key,
            alias: None,
            settings,
        }
    }

    pub fn with_region(mut self, region: impl Into<String>) -> Self {
        self.region = region.into();
        self
    }

    pub fn with_alias(mut self, alias: impl Into<String>) -> Self {
        self.alias = Some(alias.into());
        self
    }

    pub fn with_setting(mut self, key: impl Into<String>, value: impl Into<ConfigValue>) -> Self {
        self.settings.insert(key.into(), value.into());
        self
    }

    /// Meta-argument value selecting this configuration: `aws` or `aws.<alias>`.
    pub fn reference(&self) -> String {
        match &self.alias {
            Some(alias) => format!("{}.{}", self.name, alias),
            None => self.name.clone(),
        }
    }
}
