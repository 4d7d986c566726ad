//! Plugin host configuration: deserialization and validation.

use crate::error::PluginError;
use serde::Deserialize;
use std::collections::HashMap;
use std::path::PathBuf;

/// Top-level configuration, parsed from TOML.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct PluginsConfig {
    #[serde(default)]
    pub azure: AzureConfig,
    #[serde(default)]
    pub kubectl: KubectlConfig,
    #[serde(default)]
    pub context: ContextConfig,
    #[serde(default)]
    pub selector: SelectorConfig,
    #[serde(default)]
    pub experiments: ExperimentsConfig,
    #[serde(default)]
    pub plugins: InclusionConfig,
}

/// Azure CLI and Resource Manager settings.
#[derive(Debug, Clone, Deserialize)]
pub struct AzureConfig {
    #[serde(default = "default_az_command")]
    pub az_command: String,
    #[serde(default = "default_arm_endpoint")]
    pub arm_endpoint: String,
    /// Pre-configured subscription filter. Empty means the operator is prompted.
    #[serde(default)]
    pub subscriptions: Vec<String>,
    #[serde(default = "default_azure_timeout_secs")]
    pub timeout_secs: u64,
}

impl Default for AzureConfig {
    fn default() -> Self {
        Self {
            az_command: default_az_command(),
            arm_endpoint: default_arm_endpoint(),
            subscriptions: Vec::new(),
            timeout_secs: default_azure_timeout_secs(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct KubectlConfig {
    #[serde(default = "default_kubectl_command")]
    pub command: String,
    #[serde(default = "default_kubectl_timeout_secs")]
    pub timeout_secs: u64,
}

impl Default for KubectlConfig {
    fn default() -> Self {
        Self {
            command: default_kubectl_command(),
            timeout_secs: default_kubectl_timeout_secs(),
        }
    }
}

/// Where the current cluster context file is written. Defaults to the OS temp dir.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ContextConfig {
    pub dir: Option<PathBuf>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct SelectorConfig {
    #[serde(default = "default_tty")]
    pub tty: PathBuf,
}

impl Default for SelectorConfig {
    fn default() -> Self {
        Self { tty: default_tty() }
    }
}

/// Experiment treatments, keyed by config id then flag name.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ExperimentsConfig {
    /// Product quality: `stable`, `insider` or `exploration`.
    pub quality: Option<String>,
    #[serde(default)]
    pub treatments: HashMap<String, HashMap<String, bool>>,
}

/// How plugins are admitted into the registry.
#[derive(Debug, Clone, Copy, Default, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum InclusionKind {
    #[default]
    Always,
    Flag,
}

#[derive(Debug, Clone, Deserialize)]
pub struct InclusionConfig {
    #[serde(default)]
    pub inclusion: InclusionKind,
    #[serde(default = "default_flag_config_id")]
    pub flag_config_id: String,
    #[serde(default = "default_flag_name")]
    pub flag_name: String,
}

impl Default for InclusionConfig {
    fn default() -> Self {
        Self {
            inclusion: InclusionKind::default(),
            flag_config_id: default_flag_config_id(),
            flag_name: default_flag_name(),
        }
    }
}

fn default_az_command() -> String {
    "az".to_string()
}

fn default_arm_endpoint() -> String {
    "https://management.azure.com".to_string()
}

fn default_azure_timeout_secs() -> u64 {
    30
}

fn default_kubectl_command() -> String {
    "kubectl".to_string()
}

fn default_kubectl_timeout_secs() -> u64 {
    10
}

fn default_tty() -> PathBuf {
    PathBuf::from("/dev/tty")
}

fn default_flag_config_id() -> String {
    "vscode".to_string()
}

fn default_flag_name() -> String {
    "AzureGHCopilotAKS".to_string()
}

impl PluginsConfig {
    /// Validate the config, failing fast before any collaborator is built.
    pub fn validate(&self) -> crate::Result<()> {
        if self.azure.az_command.trim().is_empty() {
            return Err(PluginError::InvalidConfig(
                "azure".to_string(),
                "'az_command' must not be empty".to_string(),
            ));
        }

        if !(self.azure.arm_endpoint.starts_with("https://")
            || self.azure.arm_endpoint.starts_with("http://"))
        {
            return Err(PluginError::InvalidConfig(
                "azure".to_string(),
                format!(
                    "'arm_endpoint' must be an http(s) URL, got '{}'",
                    self.azure.arm_endpoint
                ),
            ));
        }

        if self.azure.timeout_secs == 0 {
            return Err(PluginError::InvalidConfig(
                "azure".to_string(),
                "'timeout_secs' must be > 0".to_string(),
            ));
        }

        if let Some(sub) = self.azure.subscriptions.iter().find(|s| s.trim().is_empty()) {
            return Err(PluginError::InvalidConfig(
                "azure".to_string(),
                format!("subscription filter contains an empty id: '{}'", sub),
            ));
        }

        if self.kubectl.command.trim().is_empty() {
            return Err(PluginError::InvalidConfig(
                "kubectl".to_string(),
                "'command' must not be empty".to_string(),
            ));
        }

        if self.kubectl.timeout_secs == 0 {
            return Err(PluginError::InvalidConfig(
                "kubectl".to_string(),
                "'timeout_secs' must be > 0".to_string(),
            ));
        }

        if self.plugins.inclusion == InclusionKind::Flag
            && (self.plugins.flag_config_id.is_empty() || self.plugins.flag_name.is_empty())
        {
            return Err(PluginError::InvalidConfig(
                "plugins".to_string(),
                "flag inclusion requires 'flag_config_id' and 'flag_name'".to_string(),
            ));
        }

        Ok(())
    }
}
