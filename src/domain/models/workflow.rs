//! Workflow state machine and run results.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::agent::{AgentReport, AgentRole};
use super::outputs::{DevOutput, PmSpec, TestOutput};
use super::workspace::{WriteResult, WrittenFile};
use crate::domain::errors::{DomainError, DomainResult, FailureKind};

/// Stage of the pipeline a run was in when something happened.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum WorkflowStage {
    Retrieval,
    ProductManager,
    Developer,
    Tester,
    Finalize,
}

impl From<AgentRole> for WorkflowStage {
    fn from(role: AgentRole) -> Self {
        match role {
            AgentRole::ProductManager => Self::ProductManager,
            AgentRole::Developer => Self::Developer,
            AgentRole::Tester => Self::Tester,
        }
    }
}

impl std::fmt::Display for WorkflowStage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Self::Retrieval => "Retrieval",
            Self::ProductManager => "ProductManager",
            Self::Developer => "Developer",
            Self::Tester => "Tester",
            Self::Finalize => "Finalize",
        };
        f.write_str(s)
    }
}

/// Progress of one workflow run.
///
/// ```text
/// Start → PmDone → DevDone → TestDone → Finalized
///   ↘        ↘         ↘         ↘
///    Failed | Cancelled (terminal, carry the stage that was in flight)
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "state", rename_all = "snake_case")]
pub enum WorkflowState {
    Start,
    PmDone,
    DevDone,
    TestDone,
    Finalized,
    Failed {
        stage: WorkflowStage,
        kind: FailureKind,
    },
    Cancelled {
        stage: WorkflowStage,
    },
}

impl WorkflowState {
    pub fn name(&self) -> &'static str {
        match self {
            Self::Start => "start",
            Self::PmDone => "pm_done",
            Self::DevDone => "dev_done",
            Self::TestDone => "test_done",
            Self::Finalized => "finalized",
            Self::Failed { .. } => "failed",
            Self::Cancelled { .. } => "cancelled",
        }
    }

    /// Whether this is a terminal state.
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Finalized | Self::Failed { .. } | Self::Cancelled { .. })
    }

    /// The stage that runs next from this state, if any.
    pub fn next_stage(&self) -> Option<WorkflowStage> {
        match self {
            Self::Start => Some(WorkflowStage::ProductManager),
            Self::PmDone => Some(WorkflowStage::Developer),
            Self::DevDone => Some(WorkflowStage::Tester),
            Self::TestDone => Some(WorkflowStage::Finalize),
            _ => None,
        }
    }

    /// Move to the next state in the fixed sequence.
    pub fn advance(&self) -> DomainResult<Self> {
        let next = match self {
            Self::Start => Self::PmDone,
            Self::PmDone => Self::DevDone,
            Self::DevDone => Self::TestDone,
            Self::TestDone => Self::Finalized,
            terminal => {
                return Err(DomainError::InvalidStateTransition {
                    from: terminal.name().to_string(),
                    to: "next".to_string(),
                })
            }
        };
        Ok(next)
    }

    /// Terminate with a hard failure.
    pub fn fail(&self, stage: WorkflowStage, kind: FailureKind) -> DomainResult<Self> {
        self.ensure_active("failed")?;
        Ok(Self::Failed { stage, kind })
    }

    /// Terminate because the run was cancelled or timed out.
    pub fn cancel(&self, stage: WorkflowStage) -> DomainResult<Self> {
        self.ensure_active("cancelled")?;
        Ok(Self::Cancelled { stage })
    }

    fn ensure_active(&self, to: &str) -> DomainResult<()> {
        if self.is_terminal() {
            return Err(DomainError::InvalidStateTransition {
                from: self.name().to_string(),
                to: to.to_string(),
            });
        }
        Ok(())
    }
}

/// How a run ended.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum WorkflowOutcome {
    Completed,
    Failed {
        stage: WorkflowStage,
        kind: FailureKind,
        message: String,
    },
    Cancelled {
        stage: WorkflowStage,
    },
}

/// A file proposed for writing, before any write is attempted.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CandidateFile {
    pub path: String,
    pub bytes: u64,
    pub origin: AgentRole,
}

/// Everything a workflow run produced.
///
/// Failed and cancelled runs still carry whatever earlier roles produced.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WorkflowResult {
    pub run_id: Uuid,
    pub instruction: String,
    pub outcome: WorkflowOutcome,
    pub state: WorkflowState,
    /// True only when writing was requested and the run reached `Finalized`.
    pub applied: bool,
    /// True when writing was attempted and at least one file was not written.
    pub partial_apply: bool,
    pub context_sources: Vec<String>,
    pub product_manager: Option<AgentReport<PmSpec>>,
    pub developer: Option<AgentReport<DevOutput>>,
    pub tester: Option<AgentReport<TestOutput>>,
    pub candidate_files: Vec<CandidateFile>,
    /// Files actually written.
    pub files: Vec<WrittenFile>,
    pub write_results: Vec<WriteResult>,
    pub commands: Vec<String>,
    pub notes: String,
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
}

impl WorkflowResult {
    pub fn is_completed(&self) -> bool {
        matches!(self.outcome, WorkflowOutcome::Completed)
    }

    /// The stage a failed or cancelled run stopped at.
    pub fn stopped_at(&self) -> Option<WorkflowStage> {
        match &self.outcome {
            WorkflowOutcome::Completed => None,
            WorkflowOutcome::Failed { stage, .. } | WorkflowOutcome::Cancelled { stage } => Some(*stage),
        }
    }

    /// Roles that produced an output in this run.
    pub fn agents_involved(&self) -> Vec<AgentRole> {
        let mut roles = Vec::with_capacity(3);
        if self.product_manager.is_some() {
            roles.push(AgentRole::ProductManager);
        }
        if self.developer.is_some() {
            roles.push(AgentRole::Developer);
        }
        if self.tester.is_some() {
            roles.push(AgentRole::Tester);
        }
        roles
    }

    /// Whether any role's output came from heuristic fallback parsing.
    pub fn has_degraded_output(&self) -> bool {
        self.product_manager.as_ref().is_some_and(|r| r.parse_mode.is_degraded())
            || self.developer.as_ref().is_some_and(|r| r.parse_mode.is_degraded())
            || self.tester.as_ref().is_some_and(|r| r.parse_mode.is_degraded())
    }

    /// Write results that did not produce a file.
    pub fn failed_writes(&self) -> Vec<&WriteResult> {
        self.write_results.iter().filter(|r| !r.is_written()).collect()
    }
}
