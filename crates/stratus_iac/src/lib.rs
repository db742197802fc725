//! # stratus_iac
//!
//! Terraform generation from discovered resources.
//!
//! The [`GenerationEngine`] maps each [`Resource`] through the mapper
//! registered for its provider, resolves references between resources of the
//! same batch, groups the results into files and renders them as HCL.
//!
//! ## Features
//!
//! - Per-type AWS mapping strategies with batch-wide naming
//! - Dependency analysis with dangling reference and cycle reporting
//! - Flat, per-provider, per-service, per-region and per-type layouts
//! - Provider, version, variable and output files
//! - Structural HCL syntax check
//!
//! ## Example
//!
//! ```rust
//! use stratus_core::{CloudProvider, Resource};
//! use stratus_iac::{GenerationEngine, GenerationOptions};
//!
//! let vpc = Resource::new(CloudProvider::Aws, "aws_vpc", "vpc-123")
//!     .with_name("main")
//!     .with_region("us-east-1")
//!     .with_metadata("cidr_block", "10.0.0.0/16");
//!
//! let engine = GenerationEngine::with_defaults();
//! let result = engine.generate(&[vpc], &GenerationOptions::default()).unwrap();
//!
//! let main = result.file("main.tf").unwrap();
//! assert!(main.content.contains(r#"resource "aws_vpc" "main""#));
//! ```
//!
//! [`Resource`]: stratus_core::Resource

pub mod dependency;
pub mod engine;
pub mod error;
pub mod mapper;
pub mod options;
pub mod organizer;
pub mod renderer;
pub mod result;

pub use dependency::{DanglingReference, DependencyGraph, DependencyMap, DependencyResolver};
pub use engine::GenerationEngine;
pub use error::{GenerationEngineResult, GenerationError, IacError, IacResult};
pub use mapper::{
    AwsMapper, ConfigValue, MappedResource, MapperRegistry, MappingInput, MappingStrategy, Output,
    ProviderConfig, ResourceIndex, ResourceMapper, Variable,
};
pub use options::{GenerationOptions, OrganizationPattern, OutputFormat};
pub use organizer::FileOrganizer;
pub use renderer::{HclSummary, IacRenderer, TerraformRenderer};
pub use result::{
    FileType, GeneratedFile, GenerationIssue, GenerationMetadata, GenerationPreview, GenerationResult,
    IssueKind, PreviewFile, Severity,
};
