//! `triad ask`: answer a question from the knowledge base.

use anyhow::{Context, Result};
use clap::Args;
use serde::Serialize;

use crate::cli::output::{create_spinner_with_message, output, CommandOutput, TableFormatter};
use crate::cli::service::{build_services, ServiceOptions};
use crate::domain::models::Config;
use crate::services::Answer;

#[derive(Args, Debug)]
pub struct AskArgs {
    /// The question
    pub question: String,

    /// Use the built-in demo model and passages instead of live backends
    #[arg(long)]
    pub dry_run: bool,
}

#[derive(Debug, Serialize)]
#[serde(transparent)]
struct AskOutput {
    answer: Answer,
}

impl CommandOutput for AskOutput {
    fn to_human(&self) -> String {
        let mut out = self.answer.answer.trim().to_string();
        if self.answer.sources.is_empty() {
            out.push_str("\n\n(no sources found)");
        } else {
            out.push_str("\n\nSources:\n");
            out.push_str(&TableFormatter::new().format_sources(&self.answer.sources));
        }
        out
    }
}

pub async fn execute(args: AskArgs, config: &Config, json_mode: bool) -> Result<()> {
    let services = build_services(
        config,
        &ServiceOptions {
            dry_run: args.dry_run,
            ..ServiceOptions::default()
        },
    )?;

    let spinner = (!json_mode).then(|| create_spinner_with_message("Searching the knowledge base..."));
    let answer = services.answerer.ask(&args.question).await;
    if let Some(spinner) = spinner {
        spinner.finish_and_clear();
    }

    output(&AskOutput { answer: answer.context("Failed to answer question")? }, json_mode);
    Ok(())
}
