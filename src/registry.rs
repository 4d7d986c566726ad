//! PluginRegistry: the set of plugins exposed to the host.
//!
//! The registry decides which plugins are included (unconditionally or behind
//! an experiment flag), aggregates their functions into namespaced tools, and
//! routes tool calls to the owning plugin's handler.

use std::sync::Arc;
use std::time::Duration;

use rmcp::model::Tool;

use crate::azure::{ArmClusterService, AzCli, AzCliSessionProvider, AzureSubscriptions};
use crate::config::{InclusionConfig, InclusionKind, PluginsConfig};
use crate::context_store::ContextStore;
use crate::error::PluginError;
use crate::experimentation::{ConfiguredExperiments, ExperimentationService};
use crate::host::TracingNotifier;
use crate::kubectl::KubectlBinary;
use crate::model::StatusEnvelope;
use crate::namespace::{function_tool, split_tool_name};
use crate::plugin::cluster_context::{ClusterContextCollaborators, ClusterContextPlugin};
use crate::plugin::{PluginEntry, PluginRequest};
use crate::selector::TerminalQuickPick;

/// Decides whether plugins are offered to the host.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum InclusionPolicy {
    Always,
    /// Included only when the named treatment flag is on. An undefined flag
    /// counts as off.
    ExperimentFlag { config_id: String, name: String },
}

impl InclusionPolicy {
    pub fn from_config(config: &InclusionConfig) -> Self {
        match config.inclusion {
            InclusionKind::Always => InclusionPolicy::Always,
            InclusionKind::Flag => InclusionPolicy::ExperimentFlag {
                config_id: config.flag_config_id.clone(),
                name: config.flag_name.clone(),
            },
        }
    }

    pub fn includes(&self, experiments: &dyn ExperimentationService) -> bool {
        match self {
            InclusionPolicy::Always => true,
            InclusionPolicy::ExperimentFlag { config_id, name } => experiments
                .treatment_flag(config_id, name)
                .unwrap_or(false),
        }
    }
}

/// Filter `available` down to the plugins `policy` admits.
pub fn get_plugins(
    available: Vec<PluginEntry>,
    policy: &InclusionPolicy,
    experiments: &dyn ExperimentationService,
) -> Vec<PluginEntry> {
    if policy.includes(experiments) {
        available
    } else {
        tracing::info!(policy = ?policy, "plugins excluded by inclusion policy");
        Vec::new()
    }
}

/// Plugins currently offered to the host.
#[derive(Debug, Default)]
pub struct PluginRegistry {
    plugins: Vec<PluginEntry>,
}

impl PluginRegistry {
    pub fn new(plugins: Vec<PluginEntry>) -> Self {
        Self { plugins }
    }

    /// Build a registry from validated config.
    ///
    /// Calls `config.validate()` first. `store` is owned by the caller so the
    /// current cluster survives registry rebuilds.
    pub fn from_config(config: PluginsConfig, store: Arc<ContextStore>) -> crate::Result<Self> {
        config.validate()?;

        let az = AzCli::new(
            config.azure.az_command.clone(),
            Duration::from_secs(config.azure.timeout_secs),
        );
        let picker = Arc::new(TerminalQuickPick::new(config.selector.tty.clone()));
        let collaborators = ClusterContextCollaborators {
            sessions: Arc::new(AzCliSessionProvider::new(
                az.clone(),
                &config.azure.arm_endpoint,
            )),
            tool_check: Arc::new(KubectlBinary::from_config(&config.kubectl)),
            subscriptions: Arc::new(AzureSubscriptions::new(
                az,
                picker.clone(),
                config.azure.subscriptions.clone(),
            )),
            clusters: Arc::new(ArmClusterService::new(
                &config.azure.arm_endpoint,
                Duration::from_secs(config.azure.timeout_secs),
            )?),
            picker,
            notifier: Arc::new(TracingNotifier),
        };

        let experiments = ConfiguredExperiments::from_config(&config.experiments);
        let policy = InclusionPolicy::from_config(&config.plugins);
        let available = vec![ClusterContextPlugin::new(collaborators, store).into_entry()];

        Ok(Self::new(get_plugins(available, &policy, &experiments)))
    }

    pub fn plugins(&self) -> &[PluginEntry] {
        &self.plugins
    }

    pub fn plugin_count(&self) -> usize {
        self.plugins.len()
    }

    /// One tool per function of every included plugin, in manifest order.
    pub fn tools(&self) -> Vec<Tool> {
        self.plugins
            .iter()
            .flat_map(|entry| {
                entry
                    .manifest
                    .functions
                    .iter()
                    .map(|function| function_tool(&entry.manifest.name, function))
            })
            .collect()
    }

    /// Call a plugin function by its namespaced tool name.
    ///
    /// Routing failures are protocol errors; anything the plugin itself
    /// reports comes back as an envelope.
    pub async fn call_tool(
        &self,
        namespaced_name: &str,
        arguments: Option<serde_json::Map<String, serde_json::Value>>,
    ) -> crate::Result<StatusEnvelope> {
        let (plugin, function) = split_tool_name(namespaced_name).ok_or_else(|| {
            PluginError::Protocol(
                "unknown".into(),
                format!("tool name '{}' has no namespace prefix", namespaced_name),
            )
        })?;

        let entry = self
            .plugins
            .iter()
            .find(|entry| entry.manifest.name == plugin)
            .ok_or_else(|| {
                PluginError::Protocol(plugin.to_string(), format!("no plugin named '{}'", plugin))
            })?;

        let request = PluginRequest {
            function_name: function.to_string(),
            parameters: arguments.unwrap_or_default(),
        };
        Ok(entry.handler.execute(request).await)
    }
}
