//! PluginMcpServer: rmcp ServerHandler backed by PluginRegistry.
//!
//! The registry is stored behind an Arc<RwLock<Arc<PluginRegistry>>> to
//! support hot-reload: the hot-reload task swaps the inner Arc while every
//! session shares the outer one and sees the new registry on next access.
//!
//! Connected MCP client peers are stored in a shared Vec so the hot-reload task
//! can broadcast tools-list-changed notifications after each reload.

use std::sync::Arc;

use rmcp::handler::server::ServerHandler;
use rmcp::model::{
    CallToolRequestParams, CallToolResult, Content, ListToolsResult, PaginatedRequestParams,
    ServerCapabilities, ServerInfo,
};
use rmcp::service::{NotificationContext, Peer, RequestContext, RoleServer};
use rmcp::ErrorData as McpError;
use tokio::sync::RwLock;

use crate::error::PluginError;
use crate::model::StatusEnvelope;
use crate::PluginRegistry;

/// MCP server exposing every included plugin function as a tool.
///
/// `StreamableHttpService` calls the factory closure per session; each clone
/// shares the same outer `Arc`s, so hot-reload reaches all sessions.
#[derive(Clone)]
pub struct PluginMcpServer {
    registry: Arc<RwLock<Arc<PluginRegistry>>>,
    /// Stale peers are pruned on notification error.
    peers: Arc<tokio::sync::Mutex<Vec<Peer<RoleServer>>>>,
}

impl PluginMcpServer {
    pub fn new(registry: PluginRegistry) -> Self {
        Self {
            registry: Arc::new(RwLock::new(Arc::new(registry))),
            peers: Arc::new(tokio::sync::Mutex::new(Vec::new())),
        }
    }

    /// Return the registry handle for the hot-reload task to swap the inner registry.
    pub fn registry_handle(&self) -> Arc<RwLock<Arc<PluginRegistry>>> {
        self.registry.clone()
    }

    /// Return the peers handle for the hot-reload task to broadcast notifications.
    pub fn peers_handle(&self) -> Arc<tokio::sync::Mutex<Vec<Peer<RoleServer>>>> {
        self.peers.clone()
    }
}

/// Wrap a plugin envelope as a tool result. Only `error` envelopes set `is_error`.
pub fn envelope_result(envelope: &StatusEnvelope) -> crate::Result<CallToolResult> {
    let content = Content::json(envelope).map_err(|e| {
        PluginError::Protocol("envelope".into(), format!("JSON content error: {}", e))
    })?;
    Ok(CallToolResult {
        content: vec![content],
        is_error: Some(envelope.is_error()),
        structured_content: None,
        meta: None,
    })
}

impl ServerHandler for PluginMcpServer {
    fn get_info(&self) -> ServerInfo {
        ServerInfo {
            server_info: rmcp::model::Implementation {
                name: "aks-copilot-plugins".into(),
                version: env!("CARGO_PKG_VERSION").into(),
                title: None,
                icons: None,
                website_url: None,
            },
            instructions: Some(
                "AKS assistant plugins: set and show the current Azure Kubernetes Service cluster."
                    .into(),
            ),
            capabilities: ServerCapabilities::builder().enable_tools().build(),
            ..Default::default()
        }
    }

    async fn list_tools(
        &self,
        _request: Option<PaginatedRequestParams>,
        _context: RequestContext<RoleServer>,
    ) -> Result<ListToolsResult, McpError> {
        let registry = self.registry.read().await.clone();
        Ok(ListToolsResult {
            tools: registry.tools(),
            next_cursor: None,
            meta: None,
        })
    }

    /// Route a namespaced call to its plugin and return the envelope.
    async fn call_tool(
        &self,
        request: CallToolRequestParams,
        _context: RequestContext<RoleServer>,
    ) -> Result<CallToolResult, McpError> {
        // Release the lock before running: set may wait on the operator.
        let registry = self.registry.read().await.clone();
        let envelope = registry
            .call_tool(&request.name, request.arguments)
            .await
            .map_err(|e| McpError::invalid_params(e.to_string(), None))?;
        envelope_result(&envelope).map_err(|e| McpError::internal_error(e.to_string(), None))
    }

    /// Store the connected peer for later tools-list-changed notifications.
    async fn on_initialized(&self, context: NotificationContext<RoleServer>) {
        tracing::info!("MCP client initialized, storing peer for hot-reload notifications");
        self.peers.lock().await.push(context.peer.clone());
    }
}
