//! Hot-reload for `aks-plugins serve`.
//!
//! Watches the config file using the `notify` crate. On each detected change
//! (with 100ms debounce), it re-parses the config and rebuilds the
//! PluginRegistry against the same ContextStore, so the current cluster
//! survives the reload. On success the inner Arc<PluginRegistry> is swapped
//! and all connected MCP client peers receive a tools-list-changed
//! notification. On failure the previous registry is kept.

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use notify::RecursiveMode;
use notify::Watcher;
use rmcp::service::{Peer, RoleServer};
use tokio::sync::RwLock;
use tokio_util::sync::CancellationToken;

use crate::config::PluginsConfig;
use crate::context_store::ContextStore;
use crate::error::PluginError;
use crate::PluginRegistry;

/// Watch `config_path` for changes and reload the registry on each change.
pub async fn run_hot_reload(
    config_path: PathBuf,
    store: Arc<ContextStore>,
    registry_handle: Arc<RwLock<Arc<PluginRegistry>>>,
    peers_handle: Arc<tokio::sync::Mutex<Vec<Peer<RoleServer>>>>,
    cancel: CancellationToken,
) {
    let (tx, mut rx) = tokio::sync::mpsc::unbounded_channel::<notify::Result<notify::Event>>();

    // notify's EventHandler is implemented for FnMut but not for tokio senders.
    let mut watcher = match notify::recommended_watcher(move |event| {
        let _ = tx.send(event);
    }) {
        Ok(w) => w,
        Err(e) => {
            tracing::error!(error = %e, "failed to create file watcher for hot-reload");
            return;
        }
    };

    if let Err(e) = watcher.watch(&config_path, RecursiveMode::NonRecursive) {
        tracing::error!(
            path = %config_path.display(),
            error = %e,
            "failed to watch config file for hot-reload"
        );
        return;
    }

    // Dropping the watcher stops the OS-level watch.
    let _watcher = watcher;

    tracing::info!(
        path = %config_path.display(),
        "hot-reload watching config file"
    );

    loop {
        tokio::select! {
            event = rx.recv() => {
                match event {
                    Some(Ok(_)) => {
                        // Debounce
                        tokio::time::sleep(Duration::from_millis(100)).await;
                        while rx.try_recv().is_ok() {}

                        match reload_registry(&config_path, store.clone()).await {
                            Ok(new_registry) => {
                                let plugin_count = new_registry.plugin_count();
                                {
                                    let mut guard = registry_handle.write().await;
                                    *guard = Arc::new(new_registry);
                                }
                                tracing::info!(
                                    plugins = %plugin_count,
                                    path = %config_path.display(),
                                    "config reloaded"
                                );
                                notify_peers(&peers_handle).await;
                            }
                            Err(e) => {
                                tracing::warn!(
                                    error = %e,
                                    path = %config_path.display(),
                                    "hot-reload failed, keeping previous config"
                                );
                            }
                        }
                    }
                    Some(Err(e)) => {
                        tracing::warn!(error = %e, "file watcher error during hot-reload");
                    }
                    None => {
                        tracing::debug!("hot-reload watcher channel closed");
                        return;
                    }
                }
            }
            _ = cancel.cancelled() => {
                tracing::debug!("hot-reload cancelled");
                return;
            }
        }
    }
}

/// Notify all connected peers of a tools-list-changed event.
///
/// Peers that fail with a transport error are pruned from the vec.
async fn notify_peers(peers_handle: &Arc<tokio::sync::Mutex<Vec<Peer<RoleServer>>>>) {
    let mut peers = peers_handle.lock().await;
    let mut live_peers = Vec::with_capacity(peers.len());
    for peer in peers.drain(..) {
        match peer.notify_tool_list_changed().await {
            Ok(_) => live_peers.push(peer),
            Err(e) => {
                tracing::debug!(error = %e, "pruning stale peer after tools-list-changed error");
            }
        }
    }
    *peers = live_peers;
}

/// Parse the config file and build a new PluginRegistry over `store`.
async fn reload_registry(
    config_path: &Path,
    store: Arc<ContextStore>,
) -> crate::Result<PluginRegistry> {
    let content = tokio::fs::read_to_string(config_path)
        .await
        .map_err(|e| PluginError::InvalidConfig("hot-reload".into(), e.to_string()))?;
    let config: PluginsConfig = toml::from_str(&content)
        .map_err(|e| PluginError::InvalidConfig("hot-reload".into(), e.to_string()))?;
    if context_dir_changed(&config, &store) {
        tracing::warn!(
            configured = ?config.context.dir,
            in_use = ?store.dir(),
            "[context] dir changed; it takes effect after a restart"
        );
    }
    PluginRegistry::from_config(config, store)
}

/// The store is shared across reloads, so a new `[context] dir` is not applied.
fn context_dir_changed(config: &PluginsConfig, store: &ContextStore) -> bool {
    config.context.dir.as_deref() != store.dir()
}
