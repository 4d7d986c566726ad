//! Single-slot store for the current cluster context.
//!
//! Each `save` writes the record to a fresh `current-cluster*.json` file and
//! moves the store's pointer to it; the superseded file is then removed.
//! `load` reads whatever the pointer references. The pointer lives in the
//! store instance, so a process shares one context by sharing one
//! `Arc<ContextStore>`.
//!
//! Concurrent saves are last-writer-wins on the pointer. There is no
//! atomicity between "file written" and "pointer updated".

use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use crate::error::PluginError;
use crate::model::CurrentClusterContext;

const FILE_PREFIX: &str = "current-cluster";
const FILE_SUFFIX: &str = ".json";

pub struct ContextStore {
    /// Directory for context files; `None` means the OS temp dir.
    dir: Option<PathBuf>,
    current: Mutex<Option<PathBuf>>,
}

impl ContextStore {
    pub fn new(dir: Option<PathBuf>) -> Self {
        Self {
            dir,
            current: Mutex::new(None),
        }
    }

    /// Directory new context files are written to; `None` is the OS temp dir.
    pub fn dir(&self) -> Option<&Path> {
        self.dir.as_deref()
    }

    /// Path of the most recently saved context, if any.
    pub fn location(&self) -> Option<PathBuf> {
        self.lock_current().clone()
    }

    /// Persist `context` to a new file and make it the current one.
    pub async fn save(&self, context: &CurrentClusterContext) -> crate::Result<PathBuf> {
        let content = serde_json::to_string(context)
            .map_err(|e| PluginError::ContextWrite(e.to_string()))?;
        let dir = self.dir.clone();

        let path = tokio::task::spawn_blocking(move || write_context_file(dir.as_deref(), &content))
            .await
            .map_err(|e| PluginError::ContextWrite(format!("write task failed: {}", e)))??;

        let previous = self.lock_current().replace(path.clone());

        if let Some(previous) = previous.filter(|p| p != &path) {
            if let Err(e) = tokio::fs::remove_file(&previous).await {
                tracing::warn!(
                    path = %previous.display(),
                    error = %e,
                    "failed to remove superseded cluster context file"
                );
            }
        }

        tracing::debug!(
            path = %path.display(),
            cluster = %context.cluster_name,
            "current cluster context saved"
        );
        Ok(path)
    }

    /// Read the current context. `Ok(None)` when nothing has been saved yet.
    pub async fn load(&self) -> crate::Result<Option<CurrentClusterContext>> {
        let Some(path) = self.location() else {
            return Ok(None);
        };

        let content = tokio::fs::read_to_string(&path)
            .await
            .map_err(|e| PluginError::ContextRead(format!("{}: {}", path.display(), e)))?;

        let context = serde_json::from_str(&content)
            .map_err(|e| PluginError::Deserialization(e.to_string()))?;
        Ok(Some(context))
    }

    fn lock_current(&self) -> std::sync::MutexGuard<'_, Option<PathBuf>> {
        self.current.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

fn write_context_file(dir: Option<&Path>, content: &str) -> crate::Result<PathBuf> {
    let mut builder = tempfile::Builder::new();
    builder.prefix(FILE_PREFIX).suffix(FILE_SUFFIX);

    let mut file = match dir {
        Some(dir) => builder.tempfile_in(dir),
        None => builder.tempfile(),
    }
    .map_err(|e| PluginError::ContextWrite(e.to_string()))?;

    file.write_all(content.as_bytes())
        .map_err(|e| PluginError::ContextWrite(e.to_string()))?;

    let (_file, path) = file
        .keep()
        .map_err(|e| PluginError::ContextWrite(e.to_string()))?;
    Ok(path)
}
