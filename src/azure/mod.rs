//! Azure collaborators: session resolution, subscription selection, and the
//! managed-cluster API.
//!
//! Each concern is a trait so the cluster-context dispatcher can be driven by
//! fakes in tests. The production adapters shell out to the Azure CLI for
//! sign-in state and subscription listing, and talk to Azure Resource Manager
//! over HTTPS for cluster data.

pub mod arm;
pub mod az_cli;
pub mod auth;
pub mod subscriptions;

use async_trait::async_trait;

use crate::model::{Cluster, ManagedCluster, Subscription};

pub use arm::ArmClusterService;
pub use auth::AzCliSessionProvider;
pub use az_cli::AzCli;
pub use subscriptions::AzureSubscriptions;

/// An authenticated Azure Resource Manager session.
#[derive(Clone)]
pub struct Session {
    pub access_token: String,
    pub tenant_id: Option<String>,
    /// Token expiry as unix seconds, when the provider reports it.
    pub expires_on: Option<i64>,
}

impl std::fmt::Debug for Session {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Session")
            .field("access_token", &"<redacted>")
            .field("tenant_id", &self.tenant_id)
            .field("expires_on", &self.expires_on)
            .finish()
    }
}

/// Resolves a ready-to-use session, performing whatever sign-in or refresh
/// the provider supports. Failure carries an operator-readable message.
#[async_trait]
pub trait SessionProvider: Send + Sync {
    async fn get_ready_session(&self) -> crate::Result<Session>;
}

/// Subscription selection and the resulting filtered set.
#[async_trait]
pub trait SubscriptionSource: Send + Sync {
    /// Let the operator choose subscriptions. May be a no-op when a filter is
    /// already configured. Failures are logged, never returned.
    async fn prompt_select_subscriptions(&self);

    /// The currently selected subscriptions. Never fails; may be empty.
    fn filtered_subscriptions(&self) -> Vec<Subscription>;
}

/// Managed Kubernetes cluster operations.
#[async_trait]
pub trait ClusterService: Send + Sync {
    async fn list_clusters(
        &self,
        session: &Session,
        subscription_id: &str,
    ) -> crate::Result<Vec<Cluster>>;

    async fn get_managed_cluster(
        &self,
        session: &Session,
        subscription_id: &str,
        resource_group: &str,
        name: &str,
    ) -> crate::Result<ManagedCluster>;

    async fn get_kubeconfig_yaml(
        &self,
        session: &Session,
        subscription_id: &str,
        resource_group: &str,
        cluster: &ManagedCluster,
    ) -> crate::Result<String>;
}
