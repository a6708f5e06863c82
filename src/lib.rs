//! triad - retrieval-augmented multi-agent code generation
//!
//! An instruction is answered by three agents in a fixed order: a product
//! manager turns it into a specification, a developer proposes files, and a
//! tester reviews the code and adds tests. Every agent sees passages
//! retrieved from a vector index, and proposed files can be written into a
//! sandboxed workspace directory.
//!
//! # Architecture
//!
//! - **Domain Layer** (`domain`): data model, error taxonomy and port traits
//! - **Service Layer** (`services`): retrieval, agents, orchestration, sandbox writes
//! - **Adapters** (`adapters`): Ollama, Chroma, in-memory fixtures, HTTP server
//! - **Infrastructure Layer** (`infrastructure`): configuration and logging
//! - **CLI Layer** (`cli`): command-line interface
//!
//! # Example
//!
//! ```no_run
//! use std::sync::Arc;
//! use triad::adapters::index::FixedIndex;
//! use triad::adapters::models::ScriptedModelClient;
//! use triad::services::{AgentExecutor, MultiAgentCoordinator, RetrievalContextBuilder, WorkspaceWriter};
//!
//! # async fn demo() {
//! let model = Arc::new(ScriptedModelClient::demo());
//! let retrieval = RetrievalContextBuilder::new(Arc::new(FixedIndex::demo()), 6000);
//! let coordinator = MultiAgentCoordinator::new(retrieval, AgentExecutor::new(model), WorkspaceWriter::new("workspace"));
//! let result = coordinator.generate_code("add a health check endpoint", false).await;
//! assert!(result.is_completed());
//! # }
//! ```

pub mod adapters;
pub mod cli;
pub mod domain;
pub mod infrastructure;
pub mod services;

pub use domain::models::{Config, WorkflowOutcome, WorkflowResult};
pub use domain::ports::{ModelClient, VectorIndex};
pub use infrastructure::config::{ConfigError, ConfigLoader};
pub use services::{MultiAgentCoordinator, QuestionAnswerer, WorkspaceWriter};
