//! Local plugins: a manifest of callable functions plus the handler that
//! executes them.

pub mod cluster_context;
pub mod manifest;

use std::sync::Arc;

use async_trait::async_trait;

use crate::model::StatusEnvelope;

pub use cluster_context::{ClusterContextCommand, ClusterContextPlugin};
pub use manifest::{FunctionDescriptor, ParameterDescriptor, PluginManifest, ReturnParameter};

/// A host request to run one plugin function.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct PluginRequest {
    pub function_name: String,
    /// Opaque arguments supplied by the host.
    pub parameters: serde_json::Map<String, serde_json::Value>,
}

impl PluginRequest {
    pub fn new(function_name: impl Into<String>) -> Self {
        Self {
            function_name: function_name.into(),
            parameters: serde_json::Map::new(),
        }
    }
}

/// Executes functions named in a plugin manifest.
///
/// Every name the manifest declares must be handled, and unknown names must
/// still produce an envelope.
#[async_trait]
pub trait PluginHandler: Send + Sync {
    async fn execute(&self, request: PluginRequest) -> StatusEnvelope;
}

/// A manifest paired with its handler.
#[derive(Clone)]
pub struct PluginEntry {
    pub manifest: PluginManifest,
    pub handler: Arc<dyn PluginHandler>,
}

impl std::fmt::Debug for PluginEntry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PluginEntry")
            .field("manifest", &self.manifest)
            .finish_non_exhaustive()
    }
}
