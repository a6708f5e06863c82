//! `triad workspace`: list the files in the sandbox root.

use anyhow::{Context, Result};
use clap::Args;
use serde::Serialize;
use std::path::PathBuf;

use crate::cli::output::{output, CommandOutput, TableFormatter};
use crate::domain::models::{Config, WorkspaceInventory};
use crate::services::WorkspaceWriter;

#[derive(Args, Debug)]
pub struct WorkspaceArgs {
    /// Sandbox root (defaults to the configured workspace)
    #[arg(short, long)]
    pub workspace: Option<PathBuf>,
}

#[derive(Debug, Serialize)]
#[serde(transparent)]
struct InventoryOutput {
    inventory: WorkspaceInventory,
}

impl CommandOutput for InventoryOutput {
    fn to_human(&self) -> String {
        let inv = &self.inventory;
        if !inv.exists {
            return format!("Workspace {} does not exist yet.", inv.workspace_path.display());
        }
        if inv.files.is_empty() {
            return format!("Workspace {} is empty.", inv.workspace_path.display());
        }
        format!(
            "Workspace {}: {} file(s), {} byte(s)\n{}",
            inv.workspace_path.display(),
            inv.total_files,
            inv.total_size,
            TableFormatter::new().format_inventory(inv)
        )
    }
}

pub async fn execute(args: WorkspaceArgs, config: &Config, json_mode: bool) -> Result<()> {
    let root = args.workspace.unwrap_or_else(|| PathBuf::from(&config.workspace.root));
    let writer = WorkspaceWriter::new(root);
    let inventory = tokio::task::spawn_blocking(move || writer.inventory())
        .await
        .context("Inventory task failed")?;

    output(&InventoryOutput { inventory }, json_mode);
    Ok(())
}
