//! Command-line interface.

pub mod commands;
pub mod output;
pub mod service;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use std::path::{Path, PathBuf};

use crate::domain::models::Config;
use crate::infrastructure::config::ConfigLoader;

pub use output::{create_spinner, create_spinner_with_message, ProgressBarExt};

#[derive(Parser, Debug)]
#[command(name = "triad")]
#[command(about = "Retrieval-augmented code generation with a PM, developer and tester agent", long_about = None)]
#[command(version)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// Output in JSON format
    #[arg(short, long, global = true)]
    pub json: bool,

    /// Load configuration from this file instead of .triad/
    #[arg(short, long, global = true, env = "TRIAD_CONFIG")]
    pub config: Option<PathBuf>,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Run the PM -> Developer -> Tester pipeline for an instruction
    Generate(commands::generate::GenerateArgs),
    /// Ask a question against the knowledge base
    Ask(commands::ask::AskArgs),
    /// Start the HTTP server
    Serve(commands::serve::ServeArgs),
    /// Show the files in the sandbox workspace
    Workspace(commands::workspace::WorkspaceArgs),
    /// Check the model backend
    Health,
    /// Print the effective configuration
    Config,
}

/// Load configuration from `path`, or hierarchically when `None`.
pub fn load_config(path: Option<&Path>) -> Result<Config> {
    match path {
        Some(path) => ConfigLoader::load_from_file(path),
        None => ConfigLoader::load(),
    }
    .context("Failed to load configuration")
}

/// Dispatch a parsed command.
pub async fn run(cli: Cli, config: Config) -> Result<()> {
    match cli.command {
        Commands::Generate(args) => commands::generate::execute(args, &config, cli.json).await,
        Commands::Ask(args) => commands::ask::execute(args, &config, cli.json).await,
        Commands::Serve(args) => commands::serve::execute(args, &config, cli.json).await,
        Commands::Workspace(args) => commands::workspace::execute(args, &config, cli.json).await,
        Commands::Health => commands::health::execute(&config, cli.json).await,
        Commands::Config => commands::config::execute(&config, cli.json),
    }
}

/// Print an error and exit with status 1.
pub fn handle_error(err: anyhow::Error, json_mode: bool) -> ! {
    if json_mode {
        let chain: Vec<String> = err.chain().skip(1).map(ToString::to_string).collect();
        let body = serde_json::json!({
            "error": err.to_string(),
            "causes": chain,
        });
        eprintln!("{}", serde_json::to_string_pretty(&body).unwrap_or_default());
    } else {
        eprintln!("{} {err:#}", console::style("Error:").red().bold());
    }
    std::process::exit(1);
}
