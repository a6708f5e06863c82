//! `triad generate`: run the three-agent pipeline.

use anyhow::Result;
use clap::Args;
use serde::Serialize;
use std::path::PathBuf;
use tokio_util::sync::CancellationToken;

use crate::cli::output::{create_spinner_with_message, output, CommandOutput, ProgressBarExt, TableFormatter};
use crate::cli::service::{build_services, ServiceOptions};
use crate::domain::models::{Config, WorkflowOutcome, WorkflowResult};

#[derive(Args, Debug)]
pub struct GenerateArgs {
    /// What to build, in plain language
    pub instruction: String,

    /// Write the generated files into the workspace
    #[arg(short, long)]
    pub apply: bool,

    /// Use the built-in demo model and passages instead of live backends
    #[arg(long)]
    pub dry_run: bool,

    /// Skip retrieval and run without knowledge-base context
    #[arg(long)]
    pub no_context: bool,

    /// Sandbox root (defaults to the configured workspace)
    #[arg(short, long)]
    pub workspace: Option<PathBuf>,
}

#[derive(Debug, Serialize)]
#[serde(transparent)]
struct GenerateOutput {
    result: WorkflowResult,
}

impl CommandOutput for GenerateOutput {
    fn to_human(&self) -> String {
        let result = &self.result;
        let formatter = TableFormatter::new();

        let headline = match &result.outcome {
            WorkflowOutcome::Completed if result.partial_apply => {
                console::style("Completed with write failures".to_string()).yellow().bold()
            }
            WorkflowOutcome::Completed => console::style("Completed".to_string()).green().bold(),
            WorkflowOutcome::Failed { stage, kind, message } => {
                console::style(format!("Failed at {stage} ({kind:?}): {message}")).red().bold()
            }
            WorkflowOutcome::Cancelled { stage } => {
                console::style(format!("Cancelled during {stage}")).yellow().bold()
            }
        };

        let mut lines = vec![format!("Run {}: {headline}", result.run_id)];
        if !result.context_sources.is_empty() {
            lines.push(format!("Context: {}", result.context_sources.join(", ")));
        }
        if !result.agents_involved().is_empty() {
            lines.push(formatter.format_agents(result));
        }
        if result.has_degraded_output() {
            lines.push(
                console::style("Some agent output was recovered heuristically; review it before use.")
                    .yellow()
                    .to_string(),
            );
        }

        if !result.candidate_files.is_empty() {
            let heading = if result.applied { "Files:" } else { "Files (preview, use --apply to write):" };
            lines.push(heading.to_string());
            lines.push(formatter.format_files(&result.candidate_files, &result.write_results));
        }

        if !result.commands.is_empty() {
            lines.push("Commands:".to_string());
            lines.extend(result.commands.iter().map(|c| format!("  $ {c}")));
        }
        if !result.notes.is_empty() {
            lines.push(format!("Notes: {}", result.notes));
        }
        lines.join("\n")
    }
}

pub async fn execute(args: GenerateArgs, config: &Config, json_mode: bool) -> Result<()> {
    let instruction = args.instruction.trim();
    anyhow::ensure!(!instruction.is_empty(), "Instruction is empty");

    let services = build_services(
        config,
        &ServiceOptions {
            dry_run: args.dry_run,
            no_context: args.no_context,
            workspace: args.workspace,
        },
    )?;

    let cancel = CancellationToken::new();
    let on_interrupt = cancel.clone();
    let ctrl_c = tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            on_interrupt.cancel();
        }
    });

    let spinner = (!json_mode).then(|| create_spinner_with_message("Running product manager, developer and tester..."));
    let result = services
        .coordinator
        .generate_code_with_cancellation(instruction, args.apply, cancel)
        .await;
    ctrl_c.abort();

    if let Some(spinner) = spinner {
        match &result.outcome {
            WorkflowOutcome::Completed => spinner.finish_success("Pipeline finished"),
            WorkflowOutcome::Failed { .. } => spinner.finish_error("Pipeline failed"),
            WorkflowOutcome::Cancelled { .. } => spinner.finish_warning("Pipeline cancelled"),
        }
    }

    let completed = result.is_completed();
    let state = result.state.name();
    output(&GenerateOutput { result }, json_mode);

    anyhow::ensure!(completed, "Workflow ended in state {state}");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    async fn demo_result(apply: bool, root: &std::path::Path) -> WorkflowResult {
        let services = build_services(
            &Config::default(),
            &ServiceOptions {
                dry_run: true,
                workspace: Some(root.to_path_buf()),
                ..ServiceOptions::default()
            },
        )
        .unwrap();
        services.coordinator.generate_code("add a health check endpoint", apply).await
    }

    #[tokio::test]
    async fn test_preview_output_mentions_apply() {
        let dir = tempfile::TempDir::new().unwrap();
        let result = demo_result(false, dir.path()).await;
        let human = GenerateOutput { result }.to_human();

        assert!(human.contains("Completed"));
        assert!(human.contains("use --apply to write"));
        assert!(human.contains("app/main.py"));
    }

    #[tokio::test]
    async fn test_json_output_is_workflow_result() {
        let dir = tempfile::TempDir::new().unwrap();
        let result = demo_result(true, dir.path()).await;
        let json = GenerateOutput { result }.to_json();

        assert_eq!(json["applied"], true);
        assert_eq!(json["outcome"]["status"], "completed");
        assert!(dir.path().join("app/main.py").is_file());
    }
}
