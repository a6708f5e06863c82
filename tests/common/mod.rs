//! Common test utilities for integration tests
//!
//! Builds coordinators over the in-memory fixtures with a temporary
//! sandbox root.

#![allow(dead_code)]

use std::sync::Arc;
use std::time::Duration;
use tempfile::TempDir;

use triad::adapters::index::FixedIndex;
use triad::adapters::models::ScriptedModelClient;
use triad::services::{AgentExecutor, MultiAgentCoordinator, RetrievalContextBuilder, WorkspaceWriter};

pub const INSTRUCTION: &str = "add a health check endpoint";

/// A coordinator plus the handles tests assert against.
pub struct Harness {
    pub coordinator: MultiAgentCoordinator,
    pub model: Arc<ScriptedModelClient>,
    pub sandbox: TempDir,
}

pub fn harness(model: ScriptedModelClient) -> Harness {
    harness_with(model, FixedIndex::demo(), Duration::from_secs(30))
}

pub fn harness_with(model: ScriptedModelClient, index: FixedIndex, call_timeout: Duration) -> Harness {
    let model = Arc::new(model);
    let sandbox = tempfile::tempdir().expect("Failed to create temp dir");
    let coordinator = MultiAgentCoordinator::new(
        RetrievalContextBuilder::new(Arc::new(index), 6000),
        AgentExecutor::new(model.clone()).with_call_timeout(call_timeout),
        WorkspaceWriter::new(sandbox.path()),
    );
    Harness {
        coordinator,
        model,
        sandbox,
    }
}

/// Setup test logging
pub fn setup_test_logging() {
    let _ = tracing_subscriber::fmt()
        .with_test_writer()
        .with_max_level(tracing::Level::DEBUG)
        .try_init();
}
