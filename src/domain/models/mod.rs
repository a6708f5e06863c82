pub mod agent;
pub mod config;
pub mod outputs;
pub mod passage;
pub mod workflow;
pub mod workspace;

pub use agent::{
    AgentReport, AgentRequest, AgentRole, AgentRun, ParseMode, StructuredOutput, UpstreamOutputs,
};
pub use config::{
    Config, IndexConfig, LoggingConfig, ModelConfig, PipelineConfig, PromptLimits,
    RateLimitConfig, RetryConfig, ServerConfig, WorkspaceConfig,
};
pub use outputs::{Component, DevOutput, GeneratedFile, PmSpec, ReviewIssue, TestOutput};
pub use passage::{RetrievalContext, RetrievedPassage};
pub use workflow::{
    CandidateFile, WorkflowOutcome, WorkflowResult, WorkflowStage, WorkflowState,
};
pub use workspace::{
    InventoryEntry, PathRejection, WorkspaceInventory, WriteResult, WrittenFile,
};
