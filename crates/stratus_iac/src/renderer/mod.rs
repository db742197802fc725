//! IaC renderers.

mod terraform;

use std::collections::BTreeMap;

use crate::error::IacResult;
use crate::mapper::{MappedResource, Output, ProviderConfig, Variable};
use crate::options::OutputFormat;

pub use terraform::{HclSummary, TerraformRenderer};

/// Turns mapped resources and declarations into source text.
///
/// Rendering is pure: the same input always yields the same text.
pub trait IacRenderer: Send + Sync {
    fn format(&self) -> OutputFormat;

    /// File extension without the dot, e.g. `tf`.
    fn extension(&self) -> &'static str;

    fn render_resource(&self, resource: &MappedResource) -> IacResult<String>;

    fn render_provider(&self, config: &ProviderConfig) -> IacResult<String>;

    fn render_variables(&self, variables: &BTreeMap<String, Variable>) -> IacResult<String>;

    fn render_outputs(&self, outputs: &BTreeMap<String, Output>) -> IacResult<String>;

    /// Version constraints for every provider in use.
    fn render_versions(&self, providers: &[ProviderConfig]) -> IacResult<String>;

    /// Single-line comment in the target syntax.
    fn comment(&self, text: &str) -> String;

    fn validate_syntax(&self, content: &str) -> IacResult<()>;
}
