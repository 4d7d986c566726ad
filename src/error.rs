//! Error types for cluster-context plugin operations.

use thiserror::Error;

/// Main error type for plugin operations
///
/// Collaborator failures carry the collaborator's own message so it can be
/// surfaced verbatim in a status envelope.
#[derive(Error, Debug)]
pub enum PluginError {
    /// No authenticated cloud session could be resolved
    #[error("{0}")]
    AuthNotReady(String),

    /// A required local tool is not installed or not runnable
    #[error("{0} is unavailable.")]
    ToolUnavailable(String),

    /// Listing clusters in a subscription failed
    #[error("failed to list clusters in subscription '{0}': {1}")]
    Enumeration(String, String),

    /// Fetching managed cluster properties failed
    #[error("failed to get properties for cluster '{0}': {1}")]
    PropertyFetch(String, String),

    /// Fetching kubeconfig credentials failed
    #[error("failed to get kubeconfig for cluster '{0}': {1}")]
    CredentialFetch(String, String),

    /// Show was requested before any cluster was set
    #[error("Current cluster is not set.")]
    NotSet,

    /// The persisted cluster context could not be parsed
    #[error("failed to parse current cluster context: {0}")]
    Deserialization(String),

    /// No handler exists for the requested function
    #[error("unrecognized command '{0}'")]
    UnrecognizedCommand(String),

    /// Writing the cluster context failed
    #[error("failed to write current cluster context: {0}")]
    ContextWrite(String),

    /// Reading the cluster context failed
    #[error("failed to read current cluster context: {0}")]
    ContextRead(String),

    /// A quick-pick prompt could not be shown to the operator
    #[error("selection prompt failed: {0}")]
    Selection(String),

    /// Invalid configuration for a named section
    #[error("invalid config for '{0}': {1}")]
    InvalidConfig(String, String),

    /// MCP protocol or routing error
    #[error("protocol error for '{0}': {1}")]
    Protocol(String, String),

    /// Transport-level error talking to an external service
    #[error("transport error for '{0}': {1}")]
    Transport(String, String),

    /// External command or request timed out
    #[error("call timeout for '{0}'")]
    CallTimeout(String),
}

/// Result type alias for plugin operations
pub type Result<T> = std::result::Result<T, PluginError>;
