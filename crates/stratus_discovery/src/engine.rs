//! Discovery engine.
//!
//! Fans out one task per requested provider, bounded by a semaphore, with a
//! fixed-delay retry around each connector call. Every suspension point
//! (permit acquisition, connector call, back-off sleep) races against the
//! run's cancellation token and deadline, so a slow provider never holds up
//! the result of the others.

use std::collections::{BTreeMap, BTreeSet, HashMap, HashSet};
use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use tokio::sync::Semaphore;
use tokio::task::JoinSet;
use tokio::time::{sleep, sleep_until, Instant};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};
use uuid::Uuid;

use stratus_core::{
    CloudProvider, DiscoveryError, DiscoveryErrorKind, DiscoveryMetadata, DiscoveryResult,
    FilterEvaluator, Resource,
};

use crate::config::{DiscoveryConfig, DiscoveryOptions};
use crate::connector::{MultiProviderDiscoverer, ProviderConnector, ProviderDiscoveryOptions};
use crate::error::{ConnectorError, ConnectorResult, DiscoveryEngineError, DiscoveryEngineResult};

/// Retry settings copied into each task.
#[derive(Debug, Clone, Copy)]
struct RetryPolicy {
    attempts: usize,
    delay: Duration,
}

/// Why a task stopped before its connector answered.
#[derive(Debug, Clone, Copy)]
enum Interrupt {
    Cancelled,
    TimedOut,
}

enum Failure {
    Interrupted(Interrupt),
    Connector(ConnectorError),
}

/// What a retried call talks to.
enum Target<'a> {
    Connector(&'a dyn ProviderConnector, &'a ProviderDiscoveryOptions),
    Unified(&'a dyn MultiProviderDiscoverer, &'a DiscoveryOptions),
}

impl Target<'_> {
    async fn call(&self) -> ConnectorResult<Vec<Resource>> {
        match self {
            Target::Connector(connector, options) => connector.discover(options).await,
            Target::Unified(discoverer, options) => discoverer.discover(options).await,
        }
    }
}

/// Orchestrates discovery across registered connectors.
pub struct DiscoveryEngine {
    config: DiscoveryConfig,
    connectors: HashMap<CloudProvider, Arc<dyn ProviderConnector>>,
    unified: Option<Arc<dyn MultiProviderDiscoverer>>,
}

impl DiscoveryEngine {
    pub fn new(config: DiscoveryConfig) -> Self {
        Self {
            config,
            connectors: HashMap::new(),
            unified: None,
        }
    }

    /// Register a connector under its `provider()`. Replaces any existing one.
    pub fn register_connector(&mut self, connector: Arc<dyn ProviderConnector>) {
        let provider = connector.provider();
        debug!("Registering connector: {}", provider);
        self.connectors.insert(provider, connector);
    }

    pub fn with_connector(mut self, connector: Arc<dyn ProviderConnector>) -> Self {
        self.register_connector(connector);
        self
    }

    /// Configure a unified multi-provider discovery path.
    pub fn with_unified(mut self, discoverer: Arc<dyn MultiProviderDiscoverer>) -> Self {
        self.unified = Some(discoverer);
        self
    }

    pub fn config(&self) -> &DiscoveryConfig {
        &self.config
    }

    pub fn connector(&self, provider: CloudProvider) -> Option<Arc<dyn ProviderConnector>> {
        self.connectors.get(&provider).cloned()
    }

    /// Registered providers, sorted.
    pub fn providers(&self) -> Vec<CloudProvider> {
        let mut providers: Vec<_> = self.connectors.keys().copied().collect();
        providers.sort();
        providers
    }

    fn connector_required(&self, provider: CloudProvider) -> DiscoveryEngineResult<Arc<dyn ProviderConnector>> {
        self.connector(provider)
            .ok_or(DiscoveryEngineError::ProviderNotRegistered(provider))
    }

    pub async fn list_regions(&self, provider: CloudProvider) -> DiscoveryEngineResult<Vec<String>> {
        Ok(self.connector_required(provider)?.regions().await?)
    }

    pub async fn list_resource_types(&self, provider: CloudProvider) -> DiscoveryEngineResult<Vec<String>> {
        Ok(self.connector_required(provider)?.resource_types().await?)
    }

    /// Validate credentials for every listed provider, reporting all failures.
    pub async fn validate_credentials(&self, providers: &[CloudProvider]) -> DiscoveryEngineResult<()> {
        let mut failures = Vec::new();
        for provider in providers {
            let connector = self.connector_required(*provider)?;
            if let Err(e) = connector.validate_credentials().await {
                warn!(provider = %provider, error = %e, "Credential validation failed");
                failures.push(format!("{}: {}", provider, e));
            }
        }

        if failures.is_empty() {
            Ok(())
        } else {
            Err(DiscoveryEngineError::CredentialsFailed(failures))
        }
    }

    /// Check options before any work starts.
    pub fn validate_options(&self, options: &DiscoveryOptions) -> DiscoveryEngineResult<()> {
        if options.providers.is_empty() {
            return Err(DiscoveryEngineError::InvalidOptions(
                "at least one provider is required".to_string(),
            ));
        }
        if options.max_concurrency == Some(0) || self.config.max_concurrency == 0 {
            return Err(DiscoveryEngineError::InvalidOptions(
                "max_concurrency must be at least 1".to_string(),
            ));
        }

        for provider in &options.providers {
            let unified_covers = self.unified.as_ref().is_some_and(|u| u.supports(*provider));
            if !self.connectors.contains_key(provider) && !unified_covers {
                return Err(DiscoveryEngineError::InvalidOptions(format!(
                    "no connector registered for provider '{}'",
                    provider
                )));
            }
        }
        Ok(())
    }

    pub async fn discover(&self, options: &DiscoveryOptions) -> DiscoveryEngineResult<DiscoveryResult> {
        self.discover_with_cancel(options, CancellationToken::new()).await
    }

    /// Discover with a caller-owned cancellation token. Cancelling it stops
    /// in-flight providers; whatever was collected is still returned.
    pub async fn discover_with_cancel(
        &self,
        options: &DiscoveryOptions,
        cancel: CancellationToken,
    ) -> DiscoveryEngineResult<DiscoveryResult> {
        self.validate_options(options)?;

        let started_at = Utc::now();
        let start = Instant::now();
        let timeout = options.timeout.unwrap_or_else(|| self.config.timeout_duration());
        let deadline = start + timeout;
        let providers = dedup_providers(&options.providers);

        info!(
            providers = ?providers,
            timeout_ms = timeout.as_millis() as u64,
            "Starting discovery"
        );

        let outcomes = match self.unified_for(&providers) {
            Some(unified) => self.run_unified(unified, options, &providers, &cancel, deadline).await,
            None => self.fan_out(options, &providers, &cancel, deadline).await,
        };

        let mut collected = Vec::new();
        let mut errors = Vec::new();
        for (provider, outcome) in outcomes {
            match outcome {
                Ok(resources) => {
                    info!(provider = %provider, count = resources.len(), "Provider discovery finished");
                    collected.extend(resources);
                }
                Err(e) => errors.push(e),
            }
        }

        let all_interrupted = errors.len() == providers.len() && errors.iter().all(DiscoveryError::is_timeout);
        if collected.is_empty() && all_interrupted {
            return Err(if cancel.is_cancelled() {
                DiscoveryEngineError::Cancelled
            } else {
                DiscoveryEngineError::Timeout(timeout)
            });
        }

        let resources: Vec<Resource> = dedup_resources(collected)
            .into_iter()
            .filter(|r| FilterEvaluator::matches_all(r, &options.filters))
            .collect();

        let mut provider_counts: BTreeMap<CloudProvider, usize> =
            providers.iter().map(|p| (*p, 0)).collect();
        for resource in &resources {
            *provider_counts.entry(resource.provider).or_default() += 1;
        }

        errors.sort_by_key(|e| e.provider);
        let metadata = DiscoveryMetadata {
            run_id: Uuid::new_v4().to_string(),
            started_at,
            completed_at: Utc::now(),
            duration_ms: start.elapsed().as_millis() as u64,
            providers,
            total_resources: resources.len(),
            provider_counts,
            error_count: errors.len(),
            applied_filters: options.filters.clone(),
        };

        info!(
            resources = metadata.total_resources,
            errors = metadata.error_count,
            duration_ms = metadata.duration_ms,
            "Discovery complete"
        );

        Ok(DiscoveryResult {
            resources,
            metadata,
            errors,
        })
    }

    fn unified_for(&self, providers: &[CloudProvider]) -> Option<Arc<dyn MultiProviderDiscoverer>> {
        let unified = self.unified.clone()?;
        let needs_unified = providers.iter().any(|p| !self.connectors.contains_key(p));
        (providers.len() > 1 || needs_unified).then_some(unified)
    }

    fn policy(&self) -> RetryPolicy {
        RetryPolicy {
            attempts: self.config.retry_attempts.max(1),
            delay: self.config.retry_delay_duration(),
        }
    }

    async fn run_unified(
        &self,
        unified: Arc<dyn MultiProviderDiscoverer>,
        options: &DiscoveryOptions,
        providers: &[CloudProvider],
        cancel: &CancellationToken,
        deadline: Instant,
    ) -> Vec<(CloudProvider, Result<Vec<Resource>, DiscoveryError>)> {
        debug!("Using unified discovery for {} providers", providers.len());
        let target = Target::Unified(unified.as_ref(), options);

        match run_with_retry(&target, "unified", self.policy(), cancel, deadline).await {
            Ok(resources) => {
                let mut by_provider: BTreeMap<CloudProvider, Vec<Resource>> =
                    providers.iter().map(|p| (*p, Vec::new())).collect();
                for resource in resources {
                    if let Some(bucket) = by_provider.get_mut(&resource.provider) {
                        bucket.push(resource);
                    }
                }
                by_provider.into_iter().map(|(p, r)| (p, Ok(r))).collect()
            }
            Err(failure) => providers
                .iter()
                .map(|p| (*p, Err(failure_to_error(*p, &failure))))
                .collect(),
        }
    }

    async fn fan_out(
        &self,
        options: &DiscoveryOptions,
        providers: &[CloudProvider],
        cancel: &CancellationToken,
        deadline: Instant,
    ) -> Vec<(CloudProvider, Result<Vec<Resource>, DiscoveryError>)> {
        let limit = options.max_concurrency.unwrap_or(self.config.max_concurrency);
        let semaphore = Arc::new(Semaphore::new(limit));
        let policy = self.policy();
        let mut tasks = JoinSet::new();

        for provider in providers {
            let provider = *provider;
            let Some(connector) = self.connector(provider) else {
                continue;
            };
            let provider_options = ProviderDiscoveryOptions {
                regions: options.regions.clone(),
                resource_types: options.resource_types_for(provider),
                filters: options.filters.clone(),
            };
            let semaphore = semaphore.clone();
            let cancel = cancel.clone();

            tasks.spawn(async move {
                let outcome =
                    discover_provider(connector, provider_options, semaphore, policy, cancel, deadline).await;
                (provider, outcome)
            });
        }

        let mut pending: BTreeSet<CloudProvider> = providers.iter().copied().collect();
        let mut outcomes = Vec::with_capacity(providers.len());
        while let Some(joined) = tasks.join_next().await {
            match joined {
                Ok((provider, outcome)) => {
                    pending.remove(&provider);
                    outcomes.push((provider, outcome));
                }
                Err(e) => warn!(error = %e, "Discovery task aborted"),
            }
        }

        for provider in pending {
            outcomes.push((
                provider,
                Err(DiscoveryError::new(
                    provider,
                    DiscoveryErrorKind::Discovery,
                    "discovery task aborted unexpectedly",
                )),
            ));
        }
        outcomes
    }
}

/// One provider's task: permit, credentials, retried discovery.
async fn discover_provider(
    connector: Arc<dyn ProviderConnector>,
    options: ProviderDiscoveryOptions,
    semaphore: Arc<Semaphore>,
    policy: RetryPolicy,
    cancel: CancellationToken,
    deadline: Instant,
) -> Result<Vec<Resource>, DiscoveryError> {
    let provider = connector.provider();

    let _permit = tokio::select! {
        biased;
        _ = cancel.cancelled() => return Err(interrupted(provider, Interrupt::Cancelled)),
        _ = sleep_until(deadline) => return Err(interrupted(provider, Interrupt::TimedOut)),
        permit = semaphore.acquire_owned() => permit.map_err(|_| {
            DiscoveryError::new(provider, DiscoveryErrorKind::Cancelled, "concurrency limiter closed")
        })?,
    };
    debug!(provider = %provider, "Acquired discovery slot");

    let credentials = tokio::select! {
        biased;
        _ = cancel.cancelled() => return Err(interrupted(provider, Interrupt::Cancelled)),
        _ = sleep_until(deadline) => return Err(interrupted(provider, Interrupt::TimedOut)),
        result = connector.validate_credentials() => result,
    };
    if let Err(e) = credentials {
        warn!(provider = %provider, error = %e, "Skipping provider with invalid credentials");
        return Err(DiscoveryError::new(provider, DiscoveryErrorKind::Credentials, e.to_string()));
    }

    let target = Target::Connector(connector.as_ref(), &options);
    run_with_retry(&target, provider.as_str(), policy, &cancel, deadline)
        .await
        .map_err(|failure| failure_to_error(provider, &failure))
}

async fn run_with_retry(
    target: &Target<'_>,
    label: &str,
    policy: RetryPolicy,
    cancel: &CancellationToken,
    deadline: Instant,
) -> Result<Vec<Resource>, Failure> {
    let mut last_error = None;

    for attempt in 1..=policy.attempts {
        let result = tokio::select! {
            biased;
            _ = cancel.cancelled() => return Err(Failure::Interrupted(Interrupt::Cancelled)),
            _ = sleep_until(deadline) => return Err(Failure::Interrupted(Interrupt::TimedOut)),
            result = target.call() => result,
        };

        match result {
            Ok(resources) => {
                debug!(connector = label, attempt, "Discovery call succeeded");
                return Ok(resources);
            }
            Err(e) => {
                warn!(
                    connector = label,
                    attempt,
                    max_attempts = policy.attempts,
                    error = %e,
                    "Discovery call failed"
                );
                last_error = Some(e);
            }
        }

        if attempt < policy.attempts {
            tokio::select! {
                biased;
                _ = cancel.cancelled() => return Err(Failure::Interrupted(Interrupt::Cancelled)),
                _ = sleep_until(deadline) => return Err(Failure::Interrupted(Interrupt::TimedOut)),
                _ = sleep(policy.delay) => {}
            }
        }
    }

    Err(Failure::Connector(last_error.unwrap_or_else(|| {
        ConnectorError::Api("no discovery attempt was made".to_string())
    })))
}

fn failure_to_error(provider: CloudProvider, failure: &Failure) -> DiscoveryError {
    match failure {
        Failure::Interrupted(interrupt) => interrupted(provider, *interrupt),
        Failure::Connector(e) => DiscoveryError::new(
            provider,
            DiscoveryErrorKind::Discovery,
            format!("discovery failed after retries: {}", e),
        ),
    }
}

fn interrupted(provider: CloudProvider, interrupt: Interrupt) -> DiscoveryError {
    match interrupt {
        Interrupt::Cancelled => {
            DiscoveryError::new(provider, DiscoveryErrorKind::Cancelled, "discovery cancelled")
        }
        Interrupt::TimedOut => DiscoveryError::new(
            provider,
            DiscoveryErrorKind::Timeout,
            "discovery timed out before the provider responded",
        ),
    }
}

fn dedup_providers(providers: &[CloudProvider]) -> Vec<CloudProvider> {
    let mut seen = HashSet::new();
    providers.iter().copied().filter(|p| seen.insert(*p)).collect()
}

/// Keep the first resource per `(provider, region, id)`.
fn dedup_resources(resources: Vec<Resource>) -> Vec<Resource> {
    let mut seen = HashSet::new();
    resources
        .into_iter()
        .filter(|r| {
            let fresh = seen.insert((r.provider, r.region.clone(), r.id.clone()));
            if !fresh {
                debug!(id = %r.id, provider = %r.provider, "Dropping duplicate resource");
            }
            fresh
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mock::MockConnector;
    use stratus_core::Filter;

    fn vpc(provider: CloudProvider, id: &str) -> Resource {
        Resource::new(provider, format!("{}vpc", provider.resource_prefix()), id).with_region("r1")
    }

    fn fast_config() -> DiscoveryConfig {
        DiscoveryConfig::default()
            .retry_attempts(2)
            .retry_delay(Duration::from_millis(5))
    }

    #[tokio::test]
    async fn test_rejects_empty_provider_list() {
        let engine = DiscoveryEngine::new(fast_config());
        let err = engine.discover(&DiscoveryOptions::default()).await.unwrap_err();
        assert!(matches!(err, DiscoveryEngineError::InvalidOptions(_)));
    }

    #[tokio::test]
    async fn test_rejects_unregistered_provider() {
        let engine = DiscoveryEngine::new(fast_config())
            .with_connector(Arc::new(MockConnector::new(CloudProvider::Aws)));
        let options = DiscoveryOptions::new([CloudProvider::Aws, CloudProvider::Gcp]);
        let err = engine.discover(&options).await.unwrap_err();
        assert!(matches!(err, DiscoveryEngineError::InvalidOptions(_)));
    }

    #[tokio::test]
    async fn test_rejects_zero_concurrency() {
        let engine = DiscoveryEngine::new(fast_config())
            .with_connector(Arc::new(MockConnector::new(CloudProvider::Aws)));
        let options = DiscoveryOptions::new([CloudProvider::Aws]).max_concurrency(0);
        assert!(engine.discover(&options).await.is_err());
    }

    #[tokio::test]
    async fn test_aggregates_and_counts() {
        let engine = DiscoveryEngine::new(fast_config())
            .with_connector(Arc::new(
                MockConnector::new(CloudProvider::Aws)
                    .with_resources(vec![vpc(CloudProvider::Aws, "a"), vpc(CloudProvider::Aws, "b")]),
            ))
            .with_connector(Arc::new(
                MockConnector::new(CloudProvider::Gcp).with_resources(vec![vpc(CloudProvider::Gcp, "c")]),
            ));

        let options = DiscoveryOptions::new([CloudProvider::Aws, CloudProvider::Gcp]);
        let result = engine.discover(&options).await.unwrap();

        assert_eq!(result.resources.len(), 3);
        assert_eq!(result.metadata.total_resources, 3);
        assert_eq!(result.metadata.provider_counts[&CloudProvider::Aws], 2);
        assert_eq!(result.metadata.provider_counts[&CloudProvider::Gcp], 1);
        assert_eq!(result.metadata.error_count, 0);
    }

    #[tokio::test]
    async fn test_filters_applied_after_fan_in() {
        let engine = DiscoveryEngine::new(fast_config()).with_connector(Arc::new(
            MockConnector::new(CloudProvider::Aws).with_resources(vec![
                vpc(CloudProvider::Aws, "a").with_tag("env", "prod"),
                vpc(CloudProvider::Aws, "b").with_tag("env", "dev"),
            ]),
        ));

        let options = DiscoveryOptions::new([CloudProvider::Aws]).filter(Filter::eq("tags.env", "prod"));
        let result = engine.discover(&options).await.unwrap();

        assert_eq!(result.resources.len(), 1);
        assert_eq!(result.resources[0].id, "a");
        assert_eq!(result.metadata.applied_filters.len(), 1);
    }

    #[tokio::test]
    async fn test_credential_failure_is_not_retried() {
        let connector = Arc::new(MockConnector::new(CloudProvider::Aws).with_invalid_credentials());
        let engine = DiscoveryEngine::new(fast_config()).with_connector(connector.clone());

        let result = engine
            .discover(&DiscoveryOptions::new([CloudProvider::Aws]))
            .await
            .unwrap();

        assert_eq!(result.errors.len(), 1);
        assert_eq!(result.errors[0].kind, DiscoveryErrorKind::Credentials);
        assert_eq!(connector.discover_calls(), 0);
    }

    #[tokio::test]
    async fn test_duplicate_resources_dropped() {
        let engine = DiscoveryEngine::new(fast_config()).with_connector(Arc::new(
            MockConnector::new(CloudProvider::Aws)
                .with_resources(vec![vpc(CloudProvider::Aws, "a"), vpc(CloudProvider::Aws, "a")]),
        ));

        let result = engine
            .discover(&DiscoveryOptions::new([CloudProvider::Aws]))
            .await
            .unwrap();
        assert_eq!(result.resources.len(), 1);
    }

    #[tokio::test]
    async fn test_validate_credentials_reports_all_failures() {
        let engine = DiscoveryEngine::new(fast_config())
            .with_connector(Arc::new(MockConnector::new(CloudProvider::Aws).with_invalid_credentials()))
            .with_connector(Arc::new(MockConnector::new(CloudProvider::Gcp).with_invalid_credentials()))
            .with_connector(Arc::new(MockConnector::new(CloudProvider::Azure)));

        let err = engine
            .validate_credentials(&[CloudProvider::Aws, CloudProvider::Azure, CloudProvider::Gcp])
            .await
            .unwrap_err();
        match err {
            DiscoveryEngineError::CredentialsFailed(failures) => assert_eq!(failures.len(), 2),
            other => panic!("unexpected error: {other}"),
        }
    }

    #[tokio::test]
    async fn test_list_regions_passthrough() {
        let engine = DiscoveryEngine::new(fast_config()).with_connector(Arc::new(
            MockConnector::new(CloudProvider::Aws).with_regions(vec!["us-east-1".into(), "eu-west-1".into()]),
        ));

        let regions = engine.list_regions(CloudProvider::Aws).await.unwrap();
        assert_eq!(regions.len(), 2);
        assert!(engine.list_regions(CloudProvider::Gcp).await.is_err());
    }
}
