//! # stratus_core
//!
//! Provider-agnostic resource model shared by discovery and generation.
//!
//! ## Features
//!
//! - [`Resource`] records with typed [`MetadataValue`] attributes
//! - [`Filter`] predicates and the [`FilterEvaluator`]
//! - [`DiscoveryResult`] documents and the JSON interchange loader
//!
//! ## Example
//!
//! ```rust
//! use stratus_core::{CloudProvider, Filter, FilterEvaluator, Resource};
//!
//! let vpc = Resource::new(CloudProvider::Aws, "aws_vpc", "vpc-1")
//!     .with_region("us-east-1")
//!     .with_tag("env", "prod");
//!
//! let filters = vec![Filter::parse("tags.env=prod").unwrap()];
//! assert!(FilterEvaluator::matches_all(&vpc, &filters));
//! ```

pub mod document;
pub mod error;
pub mod filter;
pub mod provider;
pub mod resource;

pub use document::{DiscoveryError, DiscoveryErrorKind, DiscoveryMetadata, DiscoveryResult, ResourceDocument};
pub use error::{CoreError, CoreResult};
pub use filter::{Filter, FilterEvaluator, FilterOperator};
pub use provider::CloudProvider;
pub use resource::{MetadataValue, Resource};
