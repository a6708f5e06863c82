//! Application services: retrieval, agents, orchestration and the workspace writer.

pub mod agents;
pub mod coordinator;
pub mod prompt_budget;
pub mod question_answering;
pub mod response_parser;
pub mod retrieval_context;
pub mod workspace_writer;

pub use agents::{Agent, AgentExecutor};
pub use coordinator::MultiAgentCoordinator;
pub use question_answering::{Answer, AnswerSource, AskError, QuestionAnswerer};
pub use retrieval_context::RetrievalContextBuilder;
pub use workspace_writer::{normalize_relative, StagedWrite, WorkspaceWriter};
