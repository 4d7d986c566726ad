//! AKS cluster-context plugins for AI coding assistants.
//!
//! Plugins declare callable functions in a manifest; the registry exposes the
//! included plugins to an MCP client as namespaced tools. The bundled
//! `manageClusterContextPlugin` lets the operator pick an AKS cluster, fetches
//! its kubeconfig, and remembers it as the current cluster.

pub mod azure;
pub mod config;
pub mod context_store;
pub mod error;
pub mod experimentation;
pub mod host;
pub mod kubectl;
pub mod model;
pub mod namespace;
pub mod plugin;
pub mod registry;
pub mod selector;
pub mod standalone;

pub use config::PluginsConfig;
pub use context_store::ContextStore;
pub use error::{PluginError, Result};
pub use model::{CurrentClusterContext, Status, StatusEnvelope};
pub use plugin::{ClusterContextPlugin, PluginEntry, PluginHandler, PluginRequest};
pub use registry::{get_plugins, InclusionPolicy, PluginRegistry};
pub use standalone::hot_reload::run_hot_reload;
pub use standalone::server::PluginMcpServer;
