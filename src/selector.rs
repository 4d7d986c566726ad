//! Quick-pick selection: the operator-facing prompt and the cluster selector
//! built on top of it.
//!
//! `QuickPick` is the seam to whatever UI presents choices. The shipped
//! implementation, `TerminalQuickPick`, shows a `dialoguer` select on a
//! terminal device (normally `/dev/tty`, so it keeps working while
//! stdin/stdout carry the MCP STDIO transport).

use std::fs::OpenOptions;
use std::path::{Path, PathBuf};

use async_trait::async_trait;
use console::Term;
use dialoguer::theme::ColorfulTheme;
use dialoguer::{MultiSelect, Select};

use crate::error::PluginError;
use crate::model::Cluster;

/// One choice in a quick pick.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QuickPickItem {
    pub label: String,
    pub description: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QuickPickOptions {
    pub placeholder: String,
    pub can_pick_many: bool,
}

/// Presents items to the operator and blocks until they choose or dismiss.
///
/// Returns the indices of the chosen items (at most one unless
/// `can_pick_many`), or `None` when the prompt is dismissed. Dismissal is a
/// normal outcome; `Err` is reserved for a prompt that could not be shown.
#[async_trait]
pub trait QuickPick: Send + Sync {
    async fn choose(
        &self,
        items: &[QuickPickItem],
        options: &QuickPickOptions,
    ) -> crate::Result<Option<Vec<usize>>>;
}

/// Ask the operator to pick one cluster from `clusters`.
///
/// Presentation order is the order received. The returned cluster is an owned
/// copy of the chosen candidate.
pub async fn select_cluster(
    picker: &dyn QuickPick,
    clusters: &[Cluster],
) -> crate::Result<Option<Cluster>> {
    let items: Vec<QuickPickItem> = clusters
        .iter()
        .map(|cluster| QuickPickItem {
            label: cluster.name.clone(),
            description: cluster.cluster_id.clone(),
        })
        .collect();

    let options = QuickPickOptions {
        placeholder: "Select Cluster".to_string(),
        can_pick_many: false,
    };

    let chosen = picker.choose(&items, &options).await?;
    Ok(chosen
        .and_then(|indices| indices.first().copied())
        .and_then(|index| clusters.get(index).cloned()))
}

/// Quick pick rendered with `dialoguer` on a terminal device.
pub struct TerminalQuickPick {
    tty: PathBuf,
}

impl TerminalQuickPick {
    pub fn new(tty: impl Into<PathBuf>) -> Self {
        Self { tty: tty.into() }
    }
}

#[async_trait]
impl QuickPick for TerminalQuickPick {
    async fn choose(
        &self,
        items: &[QuickPickItem],
        options: &QuickPickOptions,
    ) -> crate::Result<Option<Vec<usize>>> {
        let tty = self.tty.clone();
        let items = items.to_vec();
        let options = options.clone();

        tokio::task::spawn_blocking(move || prompt_on_terminal(&tty, &items, &options))
            .await
            .map_err(|e| PluginError::Selection(format!("prompt task failed: {}", e)))?
    }
}

fn prompt_on_terminal(
    tty: &Path,
    items: &[QuickPickItem],
    options: &QuickPickOptions,
) -> crate::Result<Option<Vec<usize>>> {
    let open_err = |e: std::io::Error| {
        PluginError::Selection(format!("cannot open terminal {}: {}", tty.display(), e))
    };
    let tty_read = OpenOptions::new().read(true).open(tty).map_err(open_err)?;
    let tty_write = OpenOptions::new().write(true).open(tty).map_err(open_err)?;
    let term = Term::read_write_pair(tty_read, tty_write);

    if items.is_empty() {
        tracing::debug!(prompt = %options.placeholder, "nothing to select");
        return Ok(None);
    }

    let labels: Vec<String> = items
        .iter()
        .map(|item| format!("{}  ({})", item.label, item.description))
        .collect();
    let theme = ColorfulTheme::default();
    let prompt_err = |e: dialoguer::Error| PluginError::Selection(e.to_string());

    if options.can_pick_many {
        MultiSelect::with_theme(&theme)
            .with_prompt(options.placeholder.as_str())
            .items(&labels[..])
            .interact_on_opt(&term)
            .map_err(prompt_err)
    } else {
        let chosen = Select::with_theme(&theme)
            .with_prompt(options.placeholder.as_str())
            .items(&labels[..])
            .default(0)
            .interact_on_opt(&term)
            .map_err(prompt_err)?;
        Ok(chosen.map(|index| vec![index]))
    }
}
