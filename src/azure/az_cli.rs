//! Azure CLI runner: spawns `az` with structured args and timeout-kill.

use std::process::Stdio;
use std::time::{Duration, Instant};

use tokio::io::AsyncReadExt;

use crate::error::PluginError;

/// Captured result of one `az` invocation.
#[derive(Debug, Clone)]
pub struct AzOutput {
    pub success: bool,
    pub stdout: String,
    pub stderr: String,
}

/// Handle for invoking the Azure CLI.
#[derive(Debug, Clone)]
pub struct AzCli {
    command: String,
    timeout: Duration,
}

impl AzCli {
    pub fn new(command: impl Into<String>, timeout: Duration) -> Self {
        Self {
            command: command.into(),
            timeout,
        }
    }

    /// Run `az <args>`.
    ///
    /// Spawns the process directly (never via a shell) and kills it if it
    /// exceeds the timeout. A non-zero exit is not an error here; callers
    /// inspect `success` and `stderr`.
    pub async fn run(&self, args: &[&str]) -> crate::Result<AzOutput> {
        let start = Instant::now();

        let mut cmd = tokio::process::Command::new(&self.command);
        cmd.args(args);
        cmd.stdin(Stdio::null());
        cmd.stdout(Stdio::piped());
        cmd.stderr(Stdio::piped());

        let mut child = cmd.spawn().map_err(|e| {
            PluginError::Transport(
                "az".to_string(),
                format!("failed to spawn '{}': {}", self.command, e),
            )
        })?;

        let stdout_pipe = child.stdout.take();
        let stderr_pipe = child.stderr.take();

        let output = tokio::select! {
            result = async {
                // Both pipes drain together so a chatty stderr cannot stall stdout.
                let read_stdout = async {
                    let mut bytes = Vec::new();
                    if let Some(mut out) = stdout_pipe {
                        let _ = out.read_to_end(&mut bytes).await;
                    }
                    bytes
                };
                let read_stderr = async {
                    let mut bytes = Vec::new();
                    if let Some(mut err) = stderr_pipe {
                        let _ = err.read_to_end(&mut bytes).await;
                    }
                    bytes
                };
                let (stdout_bytes, stderr_bytes) = tokio::join!(read_stdout, read_stderr);
                let status = child.wait().await.map_err(|e| PluginError::Transport(
                    "az".to_string(),
                    format!("process wait error: {}", e),
                ))?;
                Ok::<AzOutput, PluginError>(AzOutput {
                    success: status.success(),
                    stdout: String::from_utf8_lossy(&stdout_bytes).into_owned(),
                    stderr: String::from_utf8_lossy(&stderr_bytes).into_owned(),
                })
            } => result?,
            _ = tokio::time::sleep(self.timeout) => {
                let _ = child.kill().await;
                return Err(PluginError::CallTimeout("az".to_string()));
            }
        };

        tracing::debug!(
            command = %self.command,
            args = ?args,
            success = %output.success,
            duration_ms = %start.elapsed().as_millis(),
            "az invocation"
        );

        Ok(output)
    }
}

/// First non-empty line of CLI stderr, with az's `ERROR: ` prefix removed.
pub fn first_error_line(stderr: &str) -> Option<&str> {
    stderr
        .lines()
        .map(str::trim)
        .find(|line| !line.is_empty())
        .map(|line| line.strip_prefix("ERROR:").map(str::trim).unwrap_or(line))
}
