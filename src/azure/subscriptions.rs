//! Subscription filter: either fixed by config or chosen by the operator
//! from `az account list`.

use std::sync::{Arc, RwLock};

use async_trait::async_trait;
use serde::Deserialize;

use super::az_cli::{first_error_line, AzCli};
use super::SubscriptionSource;
use crate::error::PluginError;
use crate::model::Subscription;
use crate::selector::{QuickPick, QuickPickItem, QuickPickOptions};

/// One entry of `az account list --output json`.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct AccountEntry {
    id: String,
    name: String,
    #[serde(default)]
    state: Option<String>,
}

pub struct AzureSubscriptions {
    az: AzCli,
    picker: Arc<dyn QuickPick>,
    /// Subscriptions pinned by config; when non-empty the prompt is skipped.
    configured: Vec<String>,
    selected: RwLock<Vec<Subscription>>,
}

impl AzureSubscriptions {
    pub fn new(az: AzCli, picker: Arc<dyn QuickPick>, configured: Vec<String>) -> Self {
        let selected = configured
            .iter()
            .map(|id| Subscription {
                subscription_id: id.clone(),
                display_name: id.clone(),
            })
            .collect();
        Self {
            az,
            picker,
            configured,
            selected: RwLock::new(selected),
        }
    }

    async fn list_enabled_subscriptions(&self) -> crate::Result<Vec<Subscription>> {
        let output = self
            .az
            .run(&["account", "list", "--output", "json"])
            .await?;
        if !output.success {
            return Err(PluginError::AuthNotReady(
                first_error_line(&output.stderr)
                    .unwrap_or("failed to list subscriptions")
                    .to_string(),
            ));
        }
        parse_account_list(&output.stdout)
    }

    async fn prompt(&self) -> crate::Result<()> {
        let available = self.list_enabled_subscriptions().await?;

        let items: Vec<QuickPickItem> = available
            .iter()
            .map(|s| QuickPickItem {
                label: s.display_name.clone(),
                description: s.subscription_id.clone(),
            })
            .collect();
        let options = QuickPickOptions {
            placeholder: "Select Subscriptions".to_string(),
            can_pick_many: true,
        };

        let Some(indices) = self.picker.choose(&items, &options).await? else {
            tracing::debug!("subscription selection dismissed, keeping previous filter");
            return Ok(());
        };

        let chosen: Vec<Subscription> = indices
            .into_iter()
            .filter_map(|i| available.get(i).cloned())
            .collect();
        tracing::info!(count = %chosen.len(), "subscription filter updated");
        *self.write_selected() = chosen;
        Ok(())
    }

    fn write_selected(&self) -> std::sync::RwLockWriteGuard<'_, Vec<Subscription>> {
        self.selected.write().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

#[async_trait]
impl SubscriptionSource for AzureSubscriptions {
    async fn prompt_select_subscriptions(&self) {
        if !self.configured.is_empty() {
            return;
        }
        if let Err(e) = self.prompt().await {
            tracing::warn!(error = %e, "subscription selection failed");
        }
    }

    fn filtered_subscriptions(&self) -> Vec<Subscription> {
        self.selected
            .read()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .clone()
    }
}

fn parse_account_list(stdout: &str) -> crate::Result<Vec<Subscription>> {
    let entries: Vec<AccountEntry> = serde_json::from_str(stdout).map_err(|e| {
        PluginError::Protocol("az".to_string(), format!("unexpected account list: {}", e))
    })?;
    Ok(entries
        .into_iter()
        .filter(|e| e.state.as_deref().is_none_or(|s| s.eq_ignore_ascii_case("enabled")))
        .map(|e| Subscription {
            subscription_id: e.id,
            display_name: e.name,
        })
        .collect())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::os::unix::fs::PermissionsExt;
    use std::time::Duration;
    use tempfile::TempDir;

    struct FixedPick(Option<Vec<usize>>);

    #[async_trait]
    impl QuickPick for FixedPick {
        async fn choose(
            &self,
            _items: &[QuickPickItem],
            options: &QuickPickOptions,
        ) -> crate::Result<Option<Vec<usize>>> {
            assert!(options.can_pick_many);
            Ok(self.0.clone())
        }
    }

    #[test]
    fn test_parse_account_list_skips_disabled() {
        let subs = parse_account_list(
            r#"[
                {"id": "sub1", "name": "Dev", "state": "Enabled", "isDefault": true},
                {"id": "sub2", "name": "Old", "state": "Disabled", "isDefault": false},
                {"id": "sub3", "name": "Prod"}
            ]"#,
        )
        .unwrap();
        let ids: Vec<&str> = subs.iter().map(|s| s.subscription_id.as_str()).collect();
        assert_eq!(ids, vec!["sub1", "sub3"]);
        assert_eq!(subs[0].display_name, "Dev");
    }

    #[test]
    fn test_parse_account_list_garbage() {
        assert!(parse_account_list("ERROR").is_err());
    }

    #[tokio::test]
    async fn test_configured_filter_skips_prompt() {
        // The az command would fail if it were ever invoked
        let source = AzureSubscriptions::new(
            AzCli::new("definitely-not-az-xyz", Duration::from_secs(1)),
            Arc::new(FixedPick(Some(vec![]))),
            vec!["sub1".to_string(), "sub2".to_string()],
        );
        source.prompt_select_subscriptions().await;
        let ids: Vec<String> = source
            .filtered_subscriptions()
            .into_iter()
            .map(|s| s.subscription_id)
            .collect();
        assert_eq!(ids, vec!["sub1", "sub2"]);
    }

    #[tokio::test]
    async fn test_prompt_failure_keeps_empty_filter() {
        let source = AzureSubscriptions::new(
            AzCli::new("definitely-not-az-xyz", Duration::from_secs(1)),
            Arc::new(FixedPick(Some(vec![0]))),
            vec![],
        );
        source.prompt_select_subscriptions().await;
        assert!(source.filtered_subscriptions().is_empty());
    }

    /// Write an executable `az` stand-in that prints a fixed account list.
    fn fake_az(dir: &TempDir) -> AzCli {
        let path = dir.path().join("az");
        std::fs::write(
            &path,
            r#"#!/bin/sh
cat <<'JSON'
[
  {"id": "sub1", "name": "Dev", "state": "Enabled"},
  {"id": "sub2", "name": "Prod", "state": "Enabled"},
  {"id": "sub3", "name": "Old", "state": "Disabled"}
]
JSON
"#,
        )
        .unwrap();
        std::fs::set_permissions(&path, std::fs::Permissions::from_mode(0o755)).unwrap();
        AzCli::new(path.to_string_lossy().into_owned(), Duration::from_secs(5))
    }

    fn ids(source: &AzureSubscriptions) -> Vec<String> {
        source
            .filtered_subscriptions()
            .into_iter()
            .map(|s| s.subscription_id)
            .collect()
    }

    #[tokio::test]
    async fn test_picked_subscriptions_become_filter() {
        let dir = TempDir::new().unwrap();
        let source =
            AzureSubscriptions::new(fake_az(&dir), Arc::new(FixedPick(Some(vec![1]))), vec![]);

        source.prompt_select_subscriptions().await;

        let filtered = source.filtered_subscriptions();
        assert_eq!(filtered.len(), 1);
        assert_eq!(filtered[0].subscription_id, "sub2");
        assert_eq!(filtered[0].display_name, "Prod");
    }

    /// Answers each prompt with the next scripted reply.
    struct ScriptedPick(std::sync::Mutex<Vec<Option<Vec<usize>>>>);

    #[async_trait]
    impl QuickPick for ScriptedPick {
        async fn choose(
            &self,
            _items: &[QuickPickItem],
            _options: &QuickPickOptions,
        ) -> crate::Result<Option<Vec<usize>>> {
            Ok(self.0.lock().unwrap().remove(0))
        }
    }

    #[tokio::test]
    async fn test_dismissed_prompt_keeps_previous_filter() {
        let dir = TempDir::new().unwrap();
        let picker = ScriptedPick(std::sync::Mutex::new(vec![Some(vec![0, 1]), None]));
        let source = AzureSubscriptions::new(fake_az(&dir), Arc::new(picker), vec![]);

        source.prompt_select_subscriptions().await;
        assert_eq!(ids(&source), vec!["sub1", "sub2"]);

        source.prompt_select_subscriptions().await;
        assert_eq!(ids(&source), vec!["sub1", "sub2"]);
    }
}
