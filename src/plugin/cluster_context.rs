//! `manageClusterContextPlugin`: set and show the current AKS cluster.
//!
//! `setClusterContext` walks the operator through picking a cluster across
//! their selected subscriptions, fetches its properties and kubeconfig, and
//! persists the result in the shared [`ContextStore`]. `showClusterContext`
//! reports what was last persisted. Every path returns a [`StatusEnvelope`].

use std::sync::Arc;

use async_trait::async_trait;
use futures::future::try_join_all;

use super::manifest::{FunctionDescriptor, PluginManifest, ReturnParameter};
use super::{PluginEntry, PluginHandler, PluginRequest};
use crate::azure::{ClusterService, Session, SessionProvider, SubscriptionSource};
use crate::context_store::ContextStore;
use crate::error::PluginError;
use crate::host::{long_running, Notifier};
use crate::kubectl::ToolCheck;
use crate::model::{Cluster, CurrentClusterContext, StatusEnvelope, Subscription};
use crate::selector::{select_cluster, QuickPick};

pub const PLUGIN_NAME: &str = "manageClusterContextPlugin";
pub const PLUGIN_VERSION: &str = "1.0.0";

const UNRECOGNIZED_COMMAND: &str = "Unrecognized command.";
const CLUSTER_NOT_SELECTED: &str = "Cluster is not selected.";

/// The functions this plugin handles.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ClusterContextCommand {
    SetClusterContext,
    ShowClusterContext,
}

impl ClusterContextCommand {
    pub const ALL: [ClusterContextCommand; 2] = [
        ClusterContextCommand::SetClusterContext,
        ClusterContextCommand::ShowClusterContext,
    ];

    pub fn function_name(&self) -> &'static str {
        match self {
            ClusterContextCommand::SetClusterContext => "setClusterContext",
            ClusterContextCommand::ShowClusterContext => "showClusterContext",
        }
    }

    pub fn from_function_name(name: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|c| c.function_name() == name)
    }

    /// Like [`Self::from_function_name`], failing with
    /// [`PluginError::UnrecognizedCommand`].
    pub fn parse(name: &str) -> crate::Result<Self> {
        Self::from_function_name(name)
            .ok_or_else(|| PluginError::UnrecognizedCommand(name.to_string()))
    }

    fn description(&self) -> &'static str {
        match self {
            ClusterContextCommand::SetClusterContext => {
                "Select an AKS cluster from the chosen subscriptions and set it as the current cluster."
            }
            ClusterContextCommand::ShowClusterContext => {
                "Show the current AKS cluster, its resource group and subscription."
            }
        }
    }
}

/// External services the plugin drives.
#[derive(Clone)]
pub struct ClusterContextCollaborators {
    pub sessions: Arc<dyn SessionProvider>,
    pub tool_check: Arc<dyn ToolCheck>,
    pub subscriptions: Arc<dyn SubscriptionSource>,
    pub clusters: Arc<dyn ClusterService>,
    pub picker: Arc<dyn QuickPick>,
    pub notifier: Arc<dyn Notifier>,
}

pub struct ClusterContextPlugin {
    collaborators: ClusterContextCollaborators,
    store: Arc<ContextStore>,
}

impl ClusterContextPlugin {
    pub fn new(collaborators: ClusterContextCollaborators, store: Arc<ContextStore>) -> Self {
        Self {
            collaborators,
            store,
        }
    }

    /// Manifest declaring every [`ClusterContextCommand`].
    pub fn manifest() -> PluginManifest {
        PluginManifest {
            name: PLUGIN_NAME.to_string(),
            version: PLUGIN_VERSION.to_string(),
            functions: ClusterContextCommand::ALL
                .iter()
                .map(|command| FunctionDescriptor {
                    name: command.function_name().to_string(),
                    description: command.description().to_string(),
                    parameters: vec![],
                    return_parameter: ReturnParameter {
                        kind: "string".to_string(),
                    },
                    will_handle_user_response: false,
                })
                .collect(),
        }
    }

    pub fn into_entry(self) -> PluginEntry {
        PluginEntry {
            manifest: Self::manifest(),
            handler: Arc::new(self),
        }
    }

    async fn set_cluster_context(&self) -> StatusEnvelope {
        let c = &self.collaborators;

        let session = match c.sessions.get_ready_session().await {
            Ok(session) => session,
            Err(e) => {
                let message = e.to_string();
                c.notifier.show_error(&message);
                return StatusEnvelope::error(message);
            }
        };

        if !c.tool_check.is_available().await {
            let message =
                PluginError::ToolUnavailable(c.tool_check.tool_name().to_string()).to_string();
            c.notifier.show_warning(&message);
            return StatusEnvelope::error(message);
        }

        c.subscriptions.prompt_select_subscriptions().await;
        let subscriptions = c.subscriptions.filtered_subscriptions();

        let candidates = match self.enumerate_clusters(&session, &subscriptions).await {
            Ok(candidates) => candidates,
            Err(e) => {
                tracing::warn!(error = %e, "cluster enumeration failed");
                return StatusEnvelope::error(e.to_string());
            }
        };

        let selected = match select_cluster(c.picker.as_ref(), &candidates).await {
            Ok(Some(cluster)) => cluster,
            Ok(None) => {
                c.notifier.show_warning("Cluster not selected.");
                return StatusEnvelope::cancelled(CLUSTER_NOT_SELECTED);
            }
            Err(e) => {
                let message = e.to_string();
                c.notifier.show_error(&message);
                return StatusEnvelope::error(message);
            }
        };

        let properties = long_running(
            &format!("Getting properties for cluster {}.", selected.name),
            c.clusters.get_managed_cluster(
                &session,
                &selected.subscription_id,
                &selected.resource_group,
                &selected.name,
            ),
        )
        .await;
        let properties = match properties {
            Ok(properties) => properties,
            Err(e) => {
                let message = e.to_string();
                c.notifier.show_error(&message);
                return StatusEnvelope::error(message);
            }
        };

        let kubeconfig = match c
            .clusters
            .get_kubeconfig_yaml(
                &session,
                &selected.subscription_id,
                &selected.resource_group,
                &properties,
            )
            .await
        {
            Ok(yaml) => yaml,
            Err(e) => return StatusEnvelope::error(e.to_string()),
        };

        let context = CurrentClusterContext {
            subscription_id: selected.subscription_id,
            cluster_name: selected.name,
            cluster_id: properties.id,
            resource_group: selected.resource_group,
            kube_config_yaml: Some(kubeconfig),
        };

        if let Err(e) = self.store.save(&context).await {
            let message = e.to_string();
            c.notifier.show_error(&message);
            return StatusEnvelope::error(message);
        }

        tracing::info!(
            cluster = %context.cluster_name,
            subscription = %context.subscription_id,
            "current cluster set"
        );
        StatusEnvelope::success(format!(
            "Cluster {} is set as current cluster.",
            context.cluster_name
        ))
    }

    /// List clusters in every subscription concurrently. Results keep
    /// subscription order; any single failure fails the whole enumeration.
    async fn enumerate_clusters(
        &self,
        session: &Session,
        subscriptions: &[Subscription],
    ) -> crate::Result<Vec<Cluster>> {
        let clusters = &self.collaborators.clusters;
        let per_subscription = try_join_all(
            subscriptions
                .iter()
                .map(|s| clusters.list_clusters(session, &s.subscription_id)),
        )
        .await?;
        Ok(per_subscription.into_iter().flatten().collect())
    }

    async fn show_cluster_context(&self) -> StatusEnvelope {
        match self.store.load().await {
            Ok(Some(context)) => StatusEnvelope::success(format!(
                "Current cluster : {}, resource group: {}, subscription: {}",
                context.cluster_name, context.resource_group, context.subscription_id
            )),
            Ok(None) => StatusEnvelope::error(PluginError::NotSet.to_string()),
            Err(e) => {
                tracing::warn!(error = %e, "failed to load current cluster context");
                StatusEnvelope::error(e.to_string())
            }
        }
    }
}

#[async_trait]
impl PluginHandler for ClusterContextPlugin {
    async fn execute(&self, request: PluginRequest) -> StatusEnvelope {
        let command = match ClusterContextCommand::parse(&request.function_name) {
            Ok(command) => command,
            Err(e) => {
                tracing::warn!(plugin = %PLUGIN_NAME, error = %e, "rejecting plugin request");
                return StatusEnvelope::error(UNRECOGNIZED_COMMAND);
            }
        };

        tracing::debug!(plugin = %PLUGIN_NAME, function = %command.function_name(), "executing");
        let envelope = match command {
            ClusterContextCommand::SetClusterContext => self.set_cluster_context().await,
            ClusterContextCommand::ShowClusterContext => self.show_cluster_context().await,
        };
        tracing::info!(
            plugin = %PLUGIN_NAME,
            function = %command.function_name(),
            status = ?envelope.status,
            "plugin function finished"
        );
        envelope
    }
}
