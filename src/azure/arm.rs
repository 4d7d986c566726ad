//! Azure Resource Manager client for AKS managed clusters.

use std::time::Duration;

use async_trait::async_trait;
use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine;
use reqwest::Url;
use serde::de::DeserializeOwned;
use serde::Deserialize;

use super::{ClusterService, Session};
use crate::error::PluginError;
use crate::model::{Cluster, ManagedCluster};

const API_VERSION: &str = "2024-05-01";
const PROVIDER: [&str; 3] = ["providers", "Microsoft.ContainerService", "managedClusters"];

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ClusterList {
    #[serde(default)]
    value: Vec<ClusterResource>,
    next_link: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ClusterResource {
    id: String,
    #[serde(default)]
    name: String,
    #[serde(default)]
    location: String,
    #[serde(default)]
    properties: ClusterProperties,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ClusterProperties {
    kubernetes_version: Option<String>,
    fqdn: Option<String>,
    provisioning_state: Option<String>,
    aad_profile: Option<serde_json::Value>,
}

#[derive(Debug, Deserialize)]
struct CredentialResults {
    #[serde(default)]
    kubeconfigs: Vec<CredentialResult>,
}

#[derive(Debug, Deserialize)]
struct CredentialResult {
    value: String,
}

#[derive(Debug, Deserialize)]
struct ArmErrorResponse {
    error: ArmErrorBody,
}

#[derive(Debug, Deserialize)]
struct ArmErrorBody {
    code: String,
    message: String,
}

pub struct ArmClusterService {
    http: reqwest::Client,
    endpoint: String,
}

impl ArmClusterService {
    pub fn new(endpoint: &str, timeout: Duration) -> crate::Result<Self> {
        let http = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| PluginError::Transport("arm".to_string(), e.to_string()))?;
        Ok(Self {
            http,
            endpoint: endpoint.trim_end_matches('/').to_string(),
        })
    }

    /// `<endpoint>/<segments..>?api-version=..`, each segment percent-encoded.
    fn resource_url(&self, segments: &[&str]) -> std::result::Result<Url, String> {
        let mut url =
            Url::parse(&self.endpoint).map_err(|e| format!("invalid ARM endpoint: {}", e))?;
        url.path_segments_mut()
            .map_err(|_| format!("invalid ARM endpoint: {}", self.endpoint))?
            .pop_if_empty()
            .extend(segments);
        url.query_pairs_mut().append_pair("api-version", API_VERSION);
        Ok(url)
    }

    fn cluster_url(
        &self,
        subscription_id: &str,
        resource_group: &str,
        name: &str,
        action: Option<&str>,
    ) -> std::result::Result<Url, String> {
        let mut segments = vec!["subscriptions", subscription_id, "resourceGroups", resource_group];
        segments.extend(PROVIDER);
        segments.push(name);
        segments.extend(action);
        self.resource_url(&segments)
    }

    /// Send `request` with the session's bearer token and decode a JSON body.
    /// Non-success statuses become an error carrying ARM's own message.
    async fn send_json<T: DeserializeOwned>(
        &self,
        request: reqwest::RequestBuilder,
        session: &Session,
    ) -> std::result::Result<T, String> {
        let response = request
            .bearer_auth(&session.access_token)
            .send()
            .await
            .map_err(|e| e.to_string())?;

        let status = response.status();
        let body = response.text().await.map_err(|e| e.to_string())?;

        if !status.is_success() {
            return Err(arm_error_message(status.as_u16(), &body));
        }

        serde_json::from_str(&body).map_err(|e| format!("unexpected response body: {}", e))
    }
}

#[async_trait]
impl ClusterService for ArmClusterService {
    async fn list_clusters(
        &self,
        session: &Session,
        subscription_id: &str,
    ) -> crate::Result<Vec<Cluster>> {
        let enumeration = |msg: String| PluginError::Enumeration(subscription_id.to_string(), msg);
        let mut segments = vec!["subscriptions", subscription_id];
        segments.extend(PROVIDER);
        let mut url = self.resource_url(&segments).map_err(enumeration)?;
        let mut clusters = Vec::new();

        loop {
            let page: ClusterList = self
                .send_json(self.http.get(url.clone()), session)
                .await
                .map_err(enumeration)?;

            clusters.extend(page.value.into_iter().map(|resource| Cluster {
                resource_group: resource_group_from_id(&resource.id).unwrap_or_default(),
                cluster_id: resource.id,
                name: resource.name,
                subscription_id: subscription_id.to_string(),
            }));

            match page.next_link {
                Some(next) if !next.is_empty() => {
                    url = Url::parse(&next)
                        .map_err(|e| enumeration(format!("invalid nextLink: {}", e)))?;
                }
                _ => break,
            }
        }

        tracing::debug!(
            subscription = %subscription_id,
            count = %clusters.len(),
            "listed managed clusters"
        );
        Ok(clusters)
    }

    async fn get_managed_cluster(
        &self,
        session: &Session,
        subscription_id: &str,
        resource_group: &str,
        name: &str,
    ) -> crate::Result<ManagedCluster> {
        let property_fetch = |msg: String| PluginError::PropertyFetch(name.to_string(), msg);
        let url = self
            .cluster_url(subscription_id, resource_group, name, None)
            .map_err(property_fetch)?;
        let resource: ClusterResource = self
            .send_json(self.http.get(url), session)
            .await
            .map_err(property_fetch)?;

        Ok(ManagedCluster {
            id: resource.id,
            name: resource.name,
            location: resource.location,
            kubernetes_version: resource.properties.kubernetes_version,
            fqdn: resource.properties.fqdn,
            provisioning_state: resource.properties.provisioning_state,
            aad_enabled: resource
                .properties
                .aad_profile
                .is_some_and(|profile| !profile.is_null()),
        })
    }

    async fn get_kubeconfig_yaml(
        &self,
        session: &Session,
        subscription_id: &str,
        resource_group: &str,
        cluster: &ManagedCluster,
    ) -> crate::Result<String> {
        let credential_fetch =
            |msg: String| PluginError::CredentialFetch(cluster.name.clone(), msg);
        let mut url = self
            .cluster_url(
                subscription_id,
                resource_group,
                &cluster.name,
                Some("listClusterUserCredential"),
            )
            .map_err(credential_fetch)?;
        if cluster.aad_enabled {
            // AAD clusters hand out exec-plugin (kubelogin) kubeconfigs.
            url.query_pairs_mut().append_pair("format", "exec");
        }

        let credentials: CredentialResults = self
            .send_json(self.http.post(url), session)
            .await
            .map_err(credential_fetch)?;

        decode_kubeconfig(&credentials).map_err(credential_fetch)
    }
}

/// Extract the resource group segment from an ARM resource id.
pub fn resource_group_from_id(id: &str) -> Option<String> {
    let mut segments = id.split('/');
    while let Some(segment) = segments.next() {
        if segment.eq_ignore_ascii_case("resourceGroups") {
            return segments.next().filter(|s| !s.is_empty()).map(str::to_string);
        }
    }
    None
}

fn decode_kubeconfig(credentials: &CredentialResults) -> std::result::Result<String, String> {
    let first = credentials
        .kubeconfigs
        .first()
        .ok_or_else(|| "no kubeconfig returned".to_string())?;
    let bytes = BASE64
        .decode(first.value.trim())
        .map_err(|e| format!("kubeconfig is not valid base64: {}", e))?;
    String::from_utf8(bytes).map_err(|e| format!("kubeconfig is not valid UTF-8: {}", e))
}

fn arm_error_message(status: u16, body: &str) -> String {
    match serde_json::from_str::<ArmErrorResponse>(body) {
        Ok(parsed) => format!("{} ({})", parsed.error.message, parsed.error.code),
        Err(_) if body.trim().is_empty() => format!("HTTP {}", status),
        Err(_) => format!("HTTP {}: {}", status, body.trim()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::extract::{Path, Query, State};
    use axum::http::{HeaderMap, StatusCode};
    use axum::routing::{get, post};
    use axum::{Json, Router};
    use serde_json::json;
    use std::collections::HashMap;

    const KUBECONFIG: &str = "apiVersion: v1\nkind: Config\nclusters: []\n";

    fn session() -> Session {
        Session {
            access_token: "token".to_string(),
            tenant_id: None,
            expires_on: None,
        }
    }

    fn authorized(headers: &HeaderMap) -> bool {
        headers
            .get("authorization")
            .and_then(|v| v.to_str().ok())
            .is_some_and(|v| v == "Bearer token")
    }

    async fn list_page(
        State(base): State<String>,
        Path(sub): Path<String>,
        Query(query): Query<HashMap<String, String>>,
        headers: HeaderMap,
    ) -> (StatusCode, Json<serde_json::Value>) {
        if !authorized(&headers) {
            return (StatusCode::UNAUTHORIZED, Json(json!({})));
        }
        if sub == "broken" {
            return (
                StatusCode::FORBIDDEN,
                Json(json!({"error": {"code": "AuthorizationFailed", "message": "no access"}})),
            );
        }
        let id = |rg: &str, name: &str| {
            format!(
                "/subscriptions/{}/resourceGroups/{}/providers/Microsoft.ContainerService/managedClusters/{}",
                sub, rg, name
            )
        };
        if query.get("page").map(String::as_str) == Some("2") {
            return (
                StatusCode::OK,
                Json(json!({"value": [{"id": id("rg2", "c"), "name": "c"}]})),
            );
        }
        let next = format!(
            "{}/subscriptions/{}/providers/Microsoft.ContainerService/managedClusters?api-version={}&page=2",
            base, sub, API_VERSION
        );
        (
            StatusCode::OK,
            Json(json!({
                "value": [
                    {"id": id("rg1", "a"), "name": "a"},
                    {"id": id("rg1", "b"), "name": "b"}
                ],
                "nextLink": next
            })),
        )
    }

    async fn get_cluster(
        Path((sub, rg, name)): Path<(String, String, String)>,
    ) -> (StatusCode, Json<serde_json::Value>) {
        if name == "missing" {
            return (
                StatusCode::NOT_FOUND,
                Json(json!({"error": {"code": "ResourceNotFound", "message": "cluster not found"}})),
            );
        }
        let id = format!(
            "/subscriptions/{}/resourceGroups/{}/providers/Microsoft.ContainerService/managedClusters/{}",
            sub, rg, name
        );
        let aad_profile = if name == "aad" {
            json!({"managed": true})
        } else {
            serde_json::Value::Null
        };
        (
            StatusCode::OK,
            Json(json!({
                "id": id,
                "name": name,
                "location": "eastus",
                "properties": {
                    "kubernetesVersion": "1.30.3",
                    "fqdn": "demo-dns.hcp.eastus.azmk8s.io",
                    "provisioningState": "Succeeded",
                    "aadProfile": aad_profile
                }
            })),
        )
    }

    async fn list_credentials(
        Path((_sub, _rg, name)): Path<(String, String, String)>,
        Query(query): Query<HashMap<String, String>>,
    ) -> (StatusCode, Json<serde_json::Value>) {
        // The AAD cluster only answers when exec format was requested
        if name == "aad" && query.get("format").map(String::as_str) != Some("exec") {
            return (
                StatusCode::BAD_REQUEST,
                Json(json!({"error": {"code": "BadRequest", "message": "format=exec required"}})),
            );
        }
        (
            StatusCode::OK,
            Json(json!({"kubeconfigs": [{"name": "clusterUser", "value": BASE64.encode(KUBECONFIG)}]})),
        )
    }

    /// Start a local stand-in for ARM and return its base URL.
    async fn spawn_fake_arm() -> String {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let base = format!("http://{}", listener.local_addr().unwrap());
        let app = Router::new()
            .route(
                "/subscriptions/:sub/providers/Microsoft.ContainerService/managedClusters",
                get(list_page),
            )
            .route(
                "/subscriptions/:sub/resourceGroups/:rg/providers/Microsoft.ContainerService/managedClusters/:name",
                get(get_cluster),
            )
            .route(
                "/subscriptions/:sub/resourceGroups/:rg/providers/Microsoft.ContainerService/managedClusters/:name/listClusterUserCredential",
                post(list_credentials),
            )
            .with_state(base.clone());
        tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });
        base
    }

    #[test]
    fn test_resource_group_from_id() {
        assert_eq!(
            resource_group_from_id(
                "/subscriptions/s/resourceGroups/my-rg/providers/Microsoft.ContainerService/managedClusters/c"
            ),
            Some("my-rg".to_string())
        );
        assert_eq!(
            resource_group_from_id("/subscriptions/s/resourcegroups/lower/providers/x"),
            Some("lower".to_string())
        );
        assert_eq!(resource_group_from_id("/subscriptions/s"), None);
    }

    #[test]
    fn test_arm_error_message() {
        assert_eq!(
            arm_error_message(
                404,
                r#"{"error": {"code": "ResourceNotFound", "message": "gone"}}"#
            ),
            "gone (ResourceNotFound)"
        );
        assert_eq!(arm_error_message(502, ""), "HTTP 502");
        assert_eq!(arm_error_message(500, "oops"), "HTTP 500: oops");
    }

    #[test]
    fn test_decode_kubeconfig_empty() {
        let result = decode_kubeconfig(&CredentialResults { kubeconfigs: vec![] });
        assert_eq!(result, Err("no kubeconfig returned".to_string()));
    }

    #[tokio::test]
    async fn test_list_clusters_follows_next_link() {
        let base = spawn_fake_arm().await;
        let arm = ArmClusterService::new(&base, Duration::from_secs(5)).unwrap();

        let clusters = arm.list_clusters(&session(), "sub1").await.unwrap();
        let names: Vec<&str> = clusters.iter().map(|c| c.name.as_str()).collect();
        assert_eq!(names, vec!["a", "b", "c"]);
        assert_eq!(clusters[0].resource_group, "rg1");
        assert_eq!(clusters[2].resource_group, "rg2");
        assert!(clusters.iter().all(|c| c.subscription_id == "sub1"));
    }

    #[tokio::test]
    async fn test_list_clusters_surfaces_arm_error() {
        let base = spawn_fake_arm().await;
        let arm = ArmClusterService::new(&base, Duration::from_secs(5)).unwrap();

        let result = arm.list_clusters(&session(), "broken").await;
        assert!(matches!(
            result,
            Err(PluginError::Enumeration(sub, msg)) if sub == "broken" && msg == "no access (AuthorizationFailed)"
        ));
    }

    #[tokio::test]
    async fn test_get_managed_cluster_and_kubeconfig() {
        let base = spawn_fake_arm().await;
        let arm = ArmClusterService::new(&base, Duration::from_secs(5)).unwrap();

        let cluster = arm
            .get_managed_cluster(&session(), "sub1", "rg1", "demo")
            .await
            .unwrap();
        assert_eq!(cluster.name, "demo");
        assert_eq!(cluster.location, "eastus");
        assert_eq!(cluster.kubernetes_version.as_deref(), Some("1.30.3"));
        assert!(!cluster.aad_enabled);

        let yaml = arm
            .get_kubeconfig_yaml(&session(), "sub1", "rg1", &cluster)
            .await
            .unwrap();
        assert_eq!(yaml, KUBECONFIG);
    }

    #[tokio::test]
    async fn test_aad_cluster_requests_exec_format() {
        let base = spawn_fake_arm().await;
        let arm = ArmClusterService::new(&base, Duration::from_secs(5)).unwrap();

        let cluster = arm
            .get_managed_cluster(&session(), "sub1", "rg1", "aad")
            .await
            .unwrap();
        assert!(cluster.aad_enabled);
        let yaml = arm
            .get_kubeconfig_yaml(&session(), "sub1", "rg1", &cluster)
            .await
            .unwrap();
        assert_eq!(yaml, KUBECONFIG);
    }

    #[tokio::test]
    async fn test_get_managed_cluster_not_found() {
        let base = spawn_fake_arm().await;
        let arm = ArmClusterService::new(&base, Duration::from_secs(5)).unwrap();

        let result = arm
            .get_managed_cluster(&session(), "sub1", "rg1", "missing")
            .await;
        assert!(matches!(
            result,
            Err(PluginError::PropertyFetch(name, msg)) if name == "missing" && msg.contains("cluster not found")
        ));
    }

    #[test]
    fn test_cluster_url_encodes_each_segment() {
        let arm = ArmClusterService::new("https://management.example/", Duration::from_secs(5))
            .unwrap();
        let url = arm
            .cluster_url("sub1", "team/a", "demo?x", Some("listClusterUserCredential"))
            .unwrap();
        assert_eq!(
            url.path(),
            "/subscriptions/sub1/resourceGroups/team%2Fa/providers/Microsoft.ContainerService/managedClusters/demo%3Fx/listClusterUserCredential"
        );
        assert_eq!(url.query(), Some("api-version=2024-05-01"));
    }

    #[tokio::test]
    async fn test_resource_group_with_slash_stays_one_segment() {
        let base = spawn_fake_arm().await;
        let arm = ArmClusterService::new(&base, Duration::from_secs(5)).unwrap();

        let cluster = arm
            .get_managed_cluster(&session(), "sub1", "team/a", "demo")
            .await
            .unwrap();
        assert!(cluster.id.contains("/resourceGroups/team/a/"));
    }
}
