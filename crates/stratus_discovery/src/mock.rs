//! Mock connector for testing.
//!
//! Provides a configurable [`ProviderConnector`] that returns canned
//! resources, fails on demand, simulates latency and records every call, so
//! engine behaviour can be verified without touching a cloud API.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use parking_lot::RwLock;

use stratus_core::{CloudProvider, Resource};

use crate::connector::{ProviderConnector, ProviderDiscoveryOptions};
use crate::error::{ConnectorError, ConnectorResult};

/// Tracks how many discover calls run at the same time. Share one probe
/// between several connectors to observe engine-wide concurrency.
#[derive(Debug, Default)]
pub struct ConcurrencyProbe {
    in_flight: AtomicUsize,
    peak: AtomicUsize,
}

impl ConcurrencyProbe {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    /// Highest number of overlapping calls observed.
    pub fn peak(&self) -> usize {
        self.peak.load(Ordering::SeqCst)
    }

    fn enter(&self) {
        let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.peak.fetch_max(now, Ordering::SeqCst);
    }

    fn exit(&self) {
        self.in_flight.fetch_sub(1, Ordering::SeqCst);
    }
}

struct ProbeGuard(Option<Arc<ConcurrencyProbe>>);

impl Drop for ProbeGuard {
    fn drop(&mut self) {
        if let Some(probe) = &self.0 {
            probe.exit();
        }
    }
}

/// How the mock responds to `discover`.
#[derive(Debug, Clone)]
enum FailureMode {
    Never,
    Always(String),
    /// Fail this many calls, then succeed.
    FirstN(usize, String),
}

/// Mock connector for testing.
#[derive(Clone)]
pub struct MockConnector {
    provider: CloudProvider,
    resources: Arc<RwLock<Vec<Resource>>>,
    regions: Arc<RwLock<Vec<String>>>,
    resource_types: Arc<RwLock<Vec<String>>>,
    credentials_valid: Arc<RwLock<bool>>,
    failure: Arc<RwLock<FailureMode>>,
    latency: Arc<RwLock<Duration>>,
    probe: Arc<RwLock<Option<Arc<ConcurrencyProbe>>>>,
    discover_calls: Arc<AtomicUsize>,
    credential_calls: Arc<AtomicUsize>,
    captured_options: Arc<RwLock<Vec<ProviderDiscoveryOptions>>>,
}

impl MockConnector {
    pub fn new(provider: CloudProvider) -> Self {
        Self {
            provider,
            resources: Arc::new(RwLock::new(Vec::new())),
            regions: Arc::new(RwLock::new(
                provider.default_region().map(|r| vec![r.to_string()]).unwrap_or_default(),
            )),
            resource_types: Arc::new(RwLock::new(Vec::new())),
            credentials_valid: Arc::new(RwLock::new(true)),
            failure: Arc::new(RwLock::new(FailureMode::Never)),
            latency: Arc::new(RwLock::new(Duration::ZERO)),
            probe: Arc::new(RwLock::new(None)),
            discover_calls: Arc::new(AtomicUsize::new(0)),
            credential_calls: Arc::new(AtomicUsize::new(0)),
            captured_options: Arc::new(RwLock::new(Vec::new())),
        }
    }

    /// Resources returned by every successful `discover` call.
    pub fn with_resources(self, resources: Vec<Resource>) -> Self {
        *self.resources.write() = resources;
        self
    }

    pub fn with_regions(self, regions: Vec<String>) -> Self {
        *self.regions.write() = regions;
        self
    }

    pub fn with_resource_types(self, types: Vec<String>) -> Self {
        *self.resource_types.write() = types;
        self
    }

    pub fn with_invalid_credentials(self) -> Self {
        *self.credentials_valid.write() = false;
        self
    }

    /// Fail every `discover` call with the given message.
    pub fn always_fail(self, message: impl Into<String>) -> Self {
        *self.failure.write() = FailureMode::Always(message.into());
        self
    }

    /// Fail the first `count` calls, then succeed.
    pub fn fail_first(self, count: usize, message: impl Into<String>) -> Self {
        *self.failure.write() = FailureMode::FirstN(count, message.into());
        self
    }

    /// Sleep this long inside each `discover` call.
    pub fn with_latency(self, latency: Duration) -> Self {
        *self.latency.write() = latency;
        self
    }

    pub fn with_probe(self, probe: Arc<ConcurrencyProbe>) -> Self {
        *self.probe.write() = Some(probe);
        self
    }

    /// Number of `discover` calls made so far.
    pub fn discover_calls(&self) -> usize {
        self.discover_calls.load(Ordering::SeqCst)
    }

    pub fn credential_calls(&self) -> usize {
        self.credential_calls.load(Ordering::SeqCst)
    }

    /// Options passed to each `discover` call, in call order.
    pub fn captured_options(&self) -> Vec<ProviderDiscoveryOptions> {
        self.captured_options.read().clone()
    }

    fn check_failure(&self, call_index: usize) -> ConnectorResult<()> {
        match &*self.failure.read() {
            FailureMode::Never => Ok(()),
            FailureMode::Always(message) => Err(ConnectorError::Api(message.clone())),
            FailureMode::FirstN(count, message) if call_index < *count => {
                Err(ConnectorError::Api(message.clone()))
            }
            FailureMode::FirstN(..) => Ok(()),
        }
    }
}

#[async_trait]
impl ProviderConnector for MockConnector {
    fn provider(&self) -> CloudProvider {
        self.provider
    }

    async fn validate_credentials(&self) -> ConnectorResult<()> {
        self.credential_calls.fetch_add(1, Ordering::SeqCst);
        if *self.credentials_valid.read() {
            Ok(())
        } else {
            Err(ConnectorError::Credentials(format!(
                "mock credentials rejected for {}",
                self.provider
            )))
        }
    }

    async fn regions(&self) -> ConnectorResult<Vec<String>> {
        Ok(self.regions.read().clone())
    }

    async fn resource_types(&self) -> ConnectorResult<Vec<String>> {
        Ok(self.resource_types.read().clone())
    }

    async fn discover(&self, options: &ProviderDiscoveryOptions) -> ConnectorResult<Vec<Resource>> {
        let call_index = self.discover_calls.fetch_add(1, Ordering::SeqCst);
        self.captured_options.write().push(options.clone());

        let probe = self.probe.read().clone();
        if let Some(probe) = &probe {
            probe.enter();
        }
        let _guard = ProbeGuard(probe);

        let latency = *self.latency.read();
        if !latency.is_zero() {
            tokio::time::sleep(latency).await;
        }

        self.check_failure(call_index)?;
        Ok(self.resources.read().clone())
    }
}
