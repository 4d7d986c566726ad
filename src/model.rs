//! Core records: cluster candidates, subscriptions, managed cluster
//! properties, the persisted cluster context, and the status envelope.

use serde::{Deserialize, Serialize};

/// A cluster candidate returned by enumeration, prior to fetching full properties.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Cluster {
    /// Full ARM resource id.
    pub cluster_id: String,
    /// Display name. May be empty.
    pub name: String,
    pub resource_group: String,
    pub subscription_id: String,
}

/// A cloud subscription the operator has access to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Subscription {
    pub subscription_id: String,
    pub display_name: String,
}

/// Detailed managed cluster properties, as returned by the properties fetch.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ManagedCluster {
    pub id: String,
    pub name: String,
    pub location: String,
    pub kubernetes_version: Option<String>,
    pub fqdn: Option<String>,
    pub provisioning_state: Option<String>,
    /// True when the cluster uses Entra ID (AAD) integration.
    pub aad_enabled: bool,
}

/// The single "current cluster" record persisted by the context store.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CurrentClusterContext {
    pub subscription_id: String,
    pub cluster_name: String,
    pub cluster_id: String,
    pub resource_group: String,
    #[serde(
        rename = "kubeConfigYAML",
        default,
        skip_serializing_if = "Option::is_none"
    )]
    pub kube_config_yaml: Option<String>,
}

/// Outcome of a dispatched plugin function.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Status {
    Success,
    Error,
    Cancelled,
}

/// Uniform response returned by every plugin function.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StatusEnvelope {
    pub status: Status,
    pub message: String,
}

impl StatusEnvelope {
    pub fn success(message: impl Into<String>) -> Self {
        Self {
            status: Status::Success,
            message: message.into(),
        }
    }

    pub fn error(message: impl Into<String>) -> Self {
        Self {
            status: Status::Error,
            message: message.into(),
        }
    }

    pub fn cancelled(message: impl Into<String>) -> Self {
        Self {
            status: Status::Cancelled,
            message: message.into(),
        }
    }

    pub fn is_error(&self) -> bool {
        self.status == Status::Error
    }
}
