//! Availability check for the `kubectl` binary.

use std::process::Stdio;
use std::time::Duration;

use async_trait::async_trait;

use crate::config::KubectlConfig;

/// Capability check for the cluster tooling the plugins depend on.
#[async_trait]
pub trait ToolCheck: Send + Sync {
    /// Human-readable tool name used in "<tool> is unavailable." messages.
    fn tool_name(&self) -> &str;

    async fn is_available(&self) -> bool;
}

/// Checks a local `kubectl` by running `kubectl version --client`.
pub struct KubectlBinary {
    command: String,
    timeout: Duration,
}

impl KubectlBinary {
    pub fn new(command: impl Into<String>, timeout: Duration) -> Self {
        Self {
            command: command.into(),
            timeout,
        }
    }

    pub fn from_config(config: &KubectlConfig) -> Self {
        Self::new(config.command.clone(), Duration::from_secs(config.timeout_secs))
    }
}

#[async_trait]
impl ToolCheck for KubectlBinary {
    fn tool_name(&self) -> &str {
        "Kubectl"
    }

    async fn is_available(&self) -> bool {
        let mut cmd = tokio::process::Command::new(&self.command);
        cmd.args(["version", "--client", "--output=json"]);
        cmd.stdin(Stdio::null());
        cmd.stdout(Stdio::null());
        cmd.stderr(Stdio::null());
        cmd.kill_on_drop(true);

        let mut child = match cmd.spawn() {
            Ok(child) => child,
            Err(e) => {
                tracing::debug!(command = %self.command, error = %e, "kubectl not runnable");
                return false;
            }
        };

        match tokio::time::timeout(self.timeout, child.wait()).await {
            Ok(Ok(status)) => status.success(),
            Ok(Err(e)) => {
                tracing::debug!(command = %self.command, error = %e, "kubectl wait failed");
                false
            }
            Err(_) => {
                let _ = child.kill().await;
                tracing::debug!(command = %self.command, "kubectl version check timed out");
                false
            }
        }
    }
}
