//! aks-plugins: serve the AKS cluster-context plugins to an MCP client.
//!
//! Two subcommands:
//! - `aks-plugins serve`: Streamable HTTP MCP server
//! - `aks-plugins stdio`: STDIO transport for assistants that spawn their tools

use std::path::{Path, PathBuf};
use std::sync::Arc;

use aks_copilot_plugins::{
    run_hot_reload, ContextStore, PluginMcpServer, PluginRegistry, PluginsConfig,
};
use anyhow::Result;
use axum::http::Request;
use axum::response::IntoResponse;
use axum::Router;
use clap::{Parser, Subcommand};
use rmcp::transport::streamable_http_server::{
    session::local::LocalSessionManager, StreamableHttpServerConfig, StreamableHttpService,
};
use rmcp::ServiceExt;
use tokio_util::sync::CancellationToken;
use tower::ServiceExt as TowerServiceExt;
use tracing_subscriber::EnvFilter;

const CONFIG_FILE: &str = "aks-plugins.toml";

#[derive(Parser)]
#[command(
    name = "aks-plugins",
    version,
    about = "Serve the AKS cluster-context plugins to an MCP client"
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Start a Streamable HTTP MCP server exposing the plugin functions
    Serve {
        /// Path to aks-plugins.toml [default: ./aks-plugins.toml or ~/.config/aks-plugins/aks-plugins.toml]
        #[arg(short, long)]
        config: Option<PathBuf>,
        /// HTTP port to listen on
        #[arg(short, long, default_value = "3000")]
        port: u16,
        /// Bind address
        #[arg(long, default_value = "127.0.0.1")]
        host: String,
    },
    /// Serve the plugin functions over STDIO
    Stdio {
        /// Path to aks-plugins.toml [default: ./aks-plugins.toml or ~/.config/aks-plugins/aks-plugins.toml]
        #[arg(short, long)]
        config: Option<PathBuf>,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    // stdout belongs to the STDIO transport; logs go to stderr
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let cancel = CancellationToken::new();

    let cancel_for_signal = cancel.clone();
    tokio::spawn(async move {
        tokio::signal::ctrl_c().await.ok();
        tracing::info!("shutting down aks-plugins");
        cancel_for_signal.cancel();
    });

    match cli.command {
        Commands::Serve { config, port, host } => {
            let config_path = resolve_config(config)?;
            run_serve(config_path, host, port, cancel).await?;
        }
        Commands::Stdio { config } => {
            let config_path = resolve_config(config)?;
            run_stdio(config_path, cancel).await?;
        }
    }

    Ok(())
}

/// Build the registry and its shared context store from `config_path`.
async fn build(config_path: Option<&Path>) -> Result<(PluginRegistry, Arc<ContextStore>)> {
    let config = load_config(config_path).await?;
    let store = Arc::new(ContextStore::new(config.context.dir.clone()));
    let registry = PluginRegistry::from_config(config, store.clone())
        .map_err(|e| anyhow::anyhow!("Failed to build plugin registry: {}", e))?;
    tracing::info!(plugins = %registry.plugin_count(), "plugin registry ready");
    Ok((registry, store))
}

/// Serve over Streamable HTTP, hot-reloading the config file when there is one.
async fn run_serve(
    config_path: Option<PathBuf>,
    host: String,
    port: u16,
    cancel: CancellationToken,
) -> Result<()> {
    let (registry, store) = build(config_path.as_deref()).await?;
    let server = PluginMcpServer::new(registry);

    if let Some(path) = config_path {
        tokio::spawn(run_hot_reload(
            path,
            store,
            server.registry_handle(),
            server.peers_handle(),
            cancel.child_token(),
        ));
    }

    let session_manager = Arc::new(LocalSessionManager::default());
    let http_config = StreamableHttpServerConfig {
        cancellation_token: cancel.clone(),
        ..Default::default()
    };
    let server_for_factory = server.clone();
    let mcp_service = StreamableHttpService::new(
        move || Ok(server_for_factory.clone()),
        session_manager,
        http_config,
    );

    let app = Router::new().fallback(move |req: Request<axum::body::Body>| {
        let svc = mcp_service.clone();
        async move {
            match svc.oneshot(req).await {
                Ok(response) => response.into_response(),
                Err(never) => match never {},
            }
        }
    });

    let addr = format!("{}:{}", host, port);
    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .map_err(|e| anyhow::anyhow!("Failed to bind to {}: {}", addr, e))?;

    tracing::info!(host = %host, port = %port, "aks-plugins HTTP server listening");
    tracing::info!("Connect your MCP client to http://{}:{}/mcp", host, port);

    axum::serve(listener, app)
        .with_graceful_shutdown(cancel.cancelled_owned())
        .await
        .map_err(|e| anyhow::anyhow!("aks-plugins HTTP server error: {}", e))?;

    tracing::info!("aks-plugins HTTP server stopped");
    Ok(())
}

async fn run_stdio(config_path: Option<PathBuf>, cancel: CancellationToken) -> Result<()> {
    let (registry, _store) = build(config_path.as_deref()).await?;
    let server = PluginMcpServer::new(registry);

    let transport = (tokio::io::stdin(), tokio::io::stdout());
    let running = server
        .serve_with_ct(transport, cancel.clone())
        .await
        .map_err(|e| anyhow::anyhow!("Failed to initialize stdio transport: {:?}", e))?;

    tracing::info!("stdio transport initialized, waiting for messages");

    tokio::select! {
        result = running.waiting() => {
            match result {
                Ok(reason) => {
                    tracing::info!(?reason, "stdio transport completed");
                }
                Err(e) => {
                    tracing::error!(error = %e, "stdio transport error");
                    return Err(anyhow::anyhow!("stdio transport error: {}", e));
                }
            }
        }
        _ = cancel.cancelled() => {
            tracing::info!("stdio transport cancelled");
        }
    }

    Ok(())
}

/// Resolve the config file: explicit flag → ./aks-plugins.toml →
/// <config_dir>/aks-plugins/aks-plugins.toml. `None` means run on defaults.
fn resolve_config(explicit: Option<PathBuf>) -> Result<Option<PathBuf>> {
    if let Some(path) = explicit {
        if !path.exists() {
            return Err(anyhow::anyhow!("Config file {:?} does not exist", path));
        }
        return Ok(Some(path));
    }

    let local = Path::new(CONFIG_FILE);
    if local.exists() {
        return Ok(Some(local.to_path_buf()));
    }

    if let Some(config_dir) = dirs::config_dir() {
        let user = config_dir.join("aks-plugins").join(CONFIG_FILE);
        if user.exists() {
            return Ok(Some(user));
        }
    }

    tracing::info!("no {} found, using defaults", CONFIG_FILE);
    Ok(None)
}

async fn load_config(config_path: Option<&Path>) -> Result<PluginsConfig> {
    let Some(config_path) = config_path else {
        return Ok(PluginsConfig::default());
    };
    let content = tokio::fs::read_to_string(config_path)
        .await
        .map_err(|e| anyhow::anyhow!("Failed to read config file {:?}: {}", config_path, e))?;
    let config: PluginsConfig = toml::from_str(&content)
        .map_err(|e| anyhow::anyhow!("Failed to parse config file {:?}: {}", config_path, e))?;
    Ok(config)
}
