//! Discovery configuration and per-call options.

use std::time::Duration;

use serde::{Deserialize, Serialize};

use stratus_core::{CloudProvider, Filter};

/// Engine-wide settings, fixed at construction.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DiscoveryConfig {
    /// Upper bound on providers discovered at the same time.
    pub max_concurrency: usize,
    /// Total connector calls per provider, including the first one.
    pub retry_attempts: usize,
    /// Fixed delay between attempts, in milliseconds.
    pub retry_delay_ms: u64,
    /// Wall-clock budget for a whole discovery call, in seconds.
    pub timeout_seconds: u64,
}

impl Default for DiscoveryConfig {
    fn default() -> Self {
        Self {
            max_concurrency: 10,
            retry_attempts: 3,
            retry_delay_ms: 2_000,
            timeout_seconds: 300, // 5 minutes
        }
    }
}

impl DiscoveryConfig {
    pub fn max_concurrency(mut self, limit: usize) -> Self {
        self.max_concurrency = limit;
        self
    }

    pub fn retry_attempts(mut self, attempts: usize) -> Self {
        self.retry_attempts = attempts;
        self
    }

    pub fn retry_delay(mut self, delay: Duration) -> Self {
        self.retry_delay_ms = delay.as_millis() as u64;
        self
    }

    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout_seconds = timeout.as_secs().max(1);
        self
    }

    pub fn retry_delay_duration(&self) -> Duration {
        Duration::from_millis(self.retry_delay_ms)
    }

    pub fn timeout_duration(&self) -> Duration {
        Duration::from_secs(self.timeout_seconds)
    }
}

/// Options for one `discover` call.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct DiscoveryOptions {
    pub providers: Vec<CloudProvider>,
    #[serde(default)]
    pub regions: Vec<String>,
    #[serde(default)]
    pub resource_types: Vec<String>,
    /// Overrides `DiscoveryConfig::max_concurrency` when set.
    #[serde(default)]
    pub max_concurrency: Option<usize>,
    /// Overrides `DiscoveryConfig::timeout_seconds` when set.
    #[serde(default, with = "optional_millis")]
    pub timeout: Option<Duration>,
    #[serde(default)]
    pub filters: Vec<Filter>,
}

impl DiscoveryOptions {
    pub fn new(providers: impl IntoIterator<Item = CloudProvider>) -> Self {
        Self {
            providers: providers.into_iter().collect(),
            ..Self::default()
        }
    }

    pub fn region(mut self, region: impl Into<String>) -> Self {
        self.regions.push(region.into());
        self
    }

    pub fn resource_type(mut self, resource_type: impl Into<String>) -> Self {
        self.resource_types.push(resource_type.into());
        self
    }

    pub fn filter(mut self, filter: Filter) -> Self {
        self.filters.push(filter);
        self
    }

    pub fn max_concurrency(mut self, limit: usize) -> Self {
        self.max_concurrency = Some(limit);
        self
    }

    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    /// Resource types relevant to one provider: those carrying its prefix, or
    /// the full list when none do.
    pub fn resource_types_for(&self, provider: CloudProvider) -> Vec<String> {
        let scoped: Vec<String> = self
            .resource_types
            .iter()
            .filter(|t| t.starts_with(provider.resource_prefix()))
            .cloned()
            .collect();
        if scoped.is_empty() {
            self.resource_types.clone()
        } else {
            scoped
        }
    }
}

mod optional_millis {
    use std::time::Duration;

    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(value: &Option<Duration>, serializer: S) -> Result<S::Ok, S::Error> {
        match value {
            Some(d) => serializer.serialize_some(&(d.as_millis() as u64)),
            None => serializer.serialize_none(),
        }
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Option<Duration>, D::Error> {
        Ok(Option::<u64>::deserialize(deserializer)?.map(Duration::from_millis))
    }
}
