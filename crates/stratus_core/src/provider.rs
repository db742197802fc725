//! Cloud provider definitions.

use serde::{Deserialize, Serialize};

use crate::error::{CoreError, CoreResult};

/// Infrastructure providers a resource can originate from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CloudProvider {
    Aws,
    Azure,
    Gcp,
    Vmware,
    Kvm,
    Kubernetes,
}

impl CloudProvider {
    pub fn as_str(&self) -> &'static str {
        match self {
            CloudProvider::Aws => "aws",
            CloudProvider::Azure => "azure",
            CloudProvider::Gcp => "gcp",
            CloudProvider::Vmware => "vmware",
            CloudProvider::Kvm => "kvm",
            CloudProvider::Kubernetes => "kubernetes",
        }
    }

    /// Parse a provider name, accepting the Terraform provider aliases.
    pub fn parse(s: &str) -> CoreResult<Self> {
        match s.trim().to_lowercase().as_str() {
            "aws" => Ok(CloudProvider::Aws),
            "azure" | "azurerm" => Ok(CloudProvider::Azure),
            "gcp" | "google" => Ok(CloudProvider::Gcp),
            "vmware" | "vsphere" => Ok(CloudProvider::Vmware),
            "kvm" | "libvirt" => Ok(CloudProvider::Kvm),
            "kubernetes" | "k8s" => Ok(CloudProvider::Kubernetes),
            other => Err(CoreError::InvalidProvider(other.to_string())),
        }
    }

    pub fn all() -> Vec<Self> {
        vec![
            CloudProvider::Aws,
            CloudProvider::Azure,
            CloudProvider::Gcp,
            CloudProvider::Vmware,
            CloudProvider::Kvm,
            CloudProvider::Kubernetes,
        ]
    }

    /// Get the Terraform provider name.
    pub fn terraform_name(&self) -> &'static str {
        match self {
            CloudProvider::Aws => "aws",
            CloudProvider::Azure => "azurerm",
            CloudProvider::Gcp => "google",
            CloudProvider::Vmware => "vsphere",
            CloudProvider::Kvm => "libvirt",
            CloudProvider::Kubernetes => "kubernetes",
        }
    }

    /// Prefix every Terraform resource type of this provider starts with.
    pub fn resource_prefix(&self) -> &'static str {
        match self {
            CloudProvider::Aws => "aws_",
            CloudProvider::Azure => "azurerm_",
            CloudProvider::Gcp => "google_",
            CloudProvider::Vmware => "vsphere_",
            CloudProvider::Kvm => "libvirt_",
            CloudProvider::Kubernetes => "kubernetes_",
        }
    }

    /// Registry source used in `required_providers`.
    pub fn registry_source(&self) -> &'static str {
        match self {
            CloudProvider::Aws => "hashicorp/aws",
            CloudProvider::Azure => "hashicorp/azurerm",
            CloudProvider::Gcp => "hashicorp/google",
            CloudProvider::Vmware => "hashicorp/vsphere",
            CloudProvider::Kvm => "dmacvicar/libvirt",
            CloudProvider::Kubernetes => "hashicorp/kubernetes",
        }
    }

    pub fn default_version(&self) -> &'static str {
        match self {
            CloudProvider::Aws => "~> 5.0",
            CloudProvider::Azure => "~> 3.0",
            CloudProvider::Gcp => "~> 5.0",
            CloudProvider::Vmware => "~> 2.0",
            CloudProvider::Kvm => "~> 0.7",
            CloudProvider::Kubernetes => "~> 2.0",
        }
    }

    /// Get default region for the provider.
    pub fn default_region(&self) -> Option<&'static str> {
        match self {
            CloudProvider::Aws => Some("us-east-1"),
            CloudProvider::Azure => Some("eastus"),
            CloudProvider::Gcp => Some("us-central1"),
            CloudProvider::Vmware | CloudProvider::Kvm | CloudProvider::Kubernetes => None,
        }
    }
}

impl std::fmt::Display for CloudProvider {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl std::str::FromStr for CloudProvider {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}
