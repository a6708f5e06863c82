//! Wiring of services from configuration for CLI commands.

use anyhow::{Context, Result};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use crate::adapters::index::{ChromaIndex, FixedIndex};
use crate::adapters::models::{OllamaModelClient, ScriptedModelClient};
use crate::domain::models::Config;
use crate::domain::ports::{ModelClient, VectorIndex};
use crate::services::{
    AgentExecutor, MultiAgentCoordinator, QuestionAnswerer, RetrievalContextBuilder, WorkspaceWriter,
};

/// How the backends should be chosen.
#[derive(Debug, Clone, Default)]
pub struct ServiceOptions {
    /// Use the scripted demo model and fixed demo passages.
    pub dry_run: bool,
    /// Skip the vector index and run without context.
    pub no_context: bool,
    /// Override the configured sandbox root.
    pub workspace: Option<PathBuf>,
}

/// Fully wired services.
pub struct Services {
    pub coordinator: MultiAgentCoordinator,
    pub answerer: QuestionAnswerer,
    pub model: Arc<dyn ModelClient>,
}

pub fn build_services(config: &Config, options: &ServiceOptions) -> Result<Services> {
    let model: Arc<dyn ModelClient> = if options.dry_run {
        Arc::new(ScriptedModelClient::demo())
    } else {
        Arc::new(
            OllamaModelClient::new(&config.model, &config.retry, &config.rate_limit)
                .context("Failed to create model client")?,
        )
    };

    let index: Arc<dyn VectorIndex> = if options.no_context {
        Arc::new(FixedIndex::new(Vec::new()))
    } else if options.dry_run {
        Arc::new(FixedIndex::demo())
    } else {
        let embedding_host = config.index.embedding_host_or(&config.model.host);
        Arc::new(ChromaIndex::new(&config.index, embedding_host).context("Failed to create vector index")?)
    };

    let retrieval = RetrievalContextBuilder::new(index, config.index.max_context_chars)
        .with_timeout(Duration::from_secs(config.index.timeout_secs));

    let executor = AgentExecutor::new(model.clone())
        .with_call_timeout(Duration::from_secs(config.model.timeout_secs))
        .with_limits(config.pipeline.prompt_limits.clone());

    let root = options
        .workspace
        .clone()
        .unwrap_or_else(|| PathBuf::from(&config.workspace.root));

    let coordinator = MultiAgentCoordinator::new(retrieval.clone(), executor, WorkspaceWriter::new(root))
        .with_top_k(config.index.top_k)
        .with_request_timeout(Some(Duration::from_secs(config.pipeline.request_timeout_secs)));

    let answerer = QuestionAnswerer::new(retrieval, model.clone())
        .with_call_timeout(Duration::from_secs(config.model.timeout_secs));

    Ok(Services {
        coordinator,
        answerer,
        model,
    })
}
