//! # stratus_discovery
//!
//! Concurrent, retried discovery across pluggable provider connectors.
//!
//! The [`DiscoveryEngine`] runs one task per requested provider, capped by
//! `max_concurrency`, retries failed connector calls with a fixed delay and
//! aggregates everything into a single [`DiscoveryResult`]. A failing or slow
//! provider is recorded as a [`DiscoveryError`] and never blocks the others.
//!
//! ## Example
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use std::path::Path;
//! use stratus_core::{CloudProvider, Filter};
//! use stratus_discovery::{DiscoveryConfig, DiscoveryEngine, DiscoveryOptions, SnapshotConnector};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let engine = DiscoveryEngine::new(DiscoveryConfig::default())
//!         .with_connector(Arc::new(SnapshotConnector::in_dir(CloudProvider::Aws, Path::new("inventory"))));
//!
//!     let options = DiscoveryOptions::new([CloudProvider::Aws])
//!         .region("us-east-1")
//!         .filter(Filter::parse("tags.env=prod")?);
//!
//!     let result = engine.discover(&options).await?;
//!     println!("{} resources, {} errors", result.resources.len(), result.errors.len());
//!     Ok(())
//! }
//! ```
//!
//! [`DiscoveryResult`]: stratus_core::DiscoveryResult
//! [`DiscoveryError`]: stratus_core::DiscoveryError

pub mod config;
pub mod connector;
pub mod engine;
pub mod error;
pub mod mock;
pub mod snapshot;

pub use config::{DiscoveryConfig, DiscoveryOptions};
pub use connector::{MultiProviderDiscoverer, ProviderConnector, ProviderDiscoveryOptions};
pub use engine::DiscoveryEngine;
pub use error::{ConnectorError, ConnectorResult, DiscoveryEngineError, DiscoveryEngineResult};
pub use mock::{ConcurrencyProbe, MockConnector};
pub use snapshot::SnapshotConnector;
