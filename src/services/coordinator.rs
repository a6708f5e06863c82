//! Multi-agent coordinator.
//!
//! Runs one workflow: retrieval, then product manager, developer and tester
//! strictly in sequence, each stage reading the outputs of the stages
//! before it. The run ends `Finalized`, `Failed` (hard model or index
//! error) or `Cancelled` (token or deadline). Non-finalized runs keep every
//! output produced so far and never write files.

use std::collections::HashSet;
use std::future::Future;
use std::time::Duration;

use chrono::Utc;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, instrument, warn, Span};
use uuid::Uuid;

use crate::domain::errors::FailureKind;
use crate::domain::models::{
    AgentReport, AgentRequest, AgentRole, AgentRun, CandidateFile, GeneratedFile,
    RetrievalContext, StructuredOutput, UpstreamOutputs, WorkflowOutcome, WorkflowResult,
    WorkflowStage, WorkflowState, WriteResult,
};
use crate::services::agents::AgentExecutor;
use crate::services::retrieval_context::RetrievalContextBuilder;
use crate::services::workspace_writer::{normalize_relative, WorkspaceWriter};

/// Default number of passages retrieved per run.
const DEFAULT_TOP_K: usize = 5;

/// Why an in-flight stage was abandoned.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Interrupt {
    Cancelled,
    DeadlineExceeded,
}

/// Sequences the three agents and optionally materializes their files.
#[derive(Clone)]
pub struct MultiAgentCoordinator {
    retrieval: RetrievalContextBuilder,
    executor: AgentExecutor,
    writer: WorkspaceWriter,
    top_k: usize,
    request_timeout: Option<Duration>,
}

/// Mutable bookkeeping for one run.
struct Run {
    state: WorkflowState,
    outcome: Option<WorkflowOutcome>,
    upstream: UpstreamOutputs,
    result: WorkflowResult,
}

impl Run {
    fn new(instruction: &str) -> Self {
        let now = Utc::now();
        Self {
            state: WorkflowState::Start,
            outcome: None,
            upstream: UpstreamOutputs::new(),
            result: WorkflowResult {
                run_id: Uuid::new_v4(),
                instruction: instruction.to_string(),
                outcome: WorkflowOutcome::Completed,
                state: WorkflowState::Start,
                applied: false,
                partial_apply: false,
                context_sources: Vec::new(),
                product_manager: None,
                developer: None,
                tester: None,
                candidate_files: Vec::new(),
                files: Vec::new(),
                write_results: Vec::new(),
                commands: Vec::new(),
                notes: String::new(),
                started_at: now,
                finished_at: now,
            },
        }
    }

    fn transition(&mut self, next: WorkflowState) {
        info!(from = self.state.name(), to = next.name(), "Workflow state transition");
        self.state = next;
    }

    /// Advance past `completed`, which must be the stage due from the
    /// current state.
    fn advance(&mut self, completed: WorkflowStage) {
        debug_assert_eq!(
            self.state.next_stage(),
            Some(completed),
            "stage {completed} completed out of order from state {}",
            self.state.name()
        );
        match self.state.advance() {
            Ok(next) => self.transition(next),
            Err(e) => error!(error = %e, %completed, "Workflow state machine out of sequence"),
        }
    }

    fn fail(&mut self, stage: WorkflowStage, kind: FailureKind, message: String) {
        warn!(%stage, %kind, %message, "Workflow failed");
        if let Ok(next) = self.state.fail(stage, kind) {
            self.transition(next);
            self.outcome = Some(WorkflowOutcome::Failed { stage, kind, message });
        }
    }

    fn cancel(&mut self, stage: WorkflowStage, interrupt: Interrupt) {
        warn!(%stage, ?interrupt, "Workflow cancelled");
        if let Ok(next) = self.state.cancel(stage) {
            self.transition(next);
            self.outcome = Some(WorkflowOutcome::Cancelled { stage });
        }
    }

    /// Record an agent's output for the result and for later stages.
    fn record(&mut self, run: AgentRun) {
        self.upstream.insert(run.output.clone());
        let AgentRun {
            output,
            raw_text,
            parse_mode,
            duration_ms,
            ..
        } = run;

        match output {
            StructuredOutput::ProductManager(spec) => {
                self.result.product_manager = Some(AgentReport {
                    output: spec,
                    raw_text,
                    parse_mode,
                    duration_ms,
                });
            }
            StructuredOutput::Developer(dev) => {
                self.result.commands.clone_from(&dev.commands);
                self.result.developer = Some(AgentReport {
                    output: dev,
                    raw_text,
                    parse_mode,
                    duration_ms,
                });
            }
            StructuredOutput::Tester(review) => {
                self.result.tester = Some(AgentReport {
                    output: review,
                    raw_text,
                    parse_mode,
                    duration_ms,
                });
            }
        }
    }

    fn finish(mut self) -> WorkflowResult {
        self.result.notes = build_notes(&self.result);
        self.result.outcome = self.outcome.unwrap_or(WorkflowOutcome::Completed);
        self.result.state = self.state;
        self.result.finished_at = Utc::now();
        self.result
    }
}

impl MultiAgentCoordinator {
    pub fn new(
        retrieval: RetrievalContextBuilder,
        executor: AgentExecutor,
        writer: WorkspaceWriter,
    ) -> Self {
        Self {
            retrieval,
            executor,
            writer,
            top_k: DEFAULT_TOP_K,
            request_timeout: None,
        }
    }

    #[must_use]
    pub fn with_top_k(mut self, top_k: usize) -> Self {
        self.top_k = top_k;
        self
    }

    /// Overall deadline for a run. `None` disables it.
    #[must_use]
    pub fn with_request_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.request_timeout = timeout;
        self
    }

    pub fn writer(&self) -> &WorkspaceWriter {
        &self.writer
    }

    pub fn index_name(&self) -> &str {
        self.retrieval.index_name()
    }

    pub fn model_id(&self) -> &str {
        self.executor.model_id()
    }

    /// Run the whole pipeline for `instruction`.
    ///
    /// With `apply == false` nothing is written; the candidate files are
    /// still reported for preview.
    pub async fn generate_code(&self, instruction: &str, apply: bool) -> WorkflowResult {
        self.generate_code_with_cancellation(instruction, apply, CancellationToken::new())
            .await
    }

    /// Like [`generate_code`](Self::generate_code), abandoning the run when
    /// `cancel` fires. Cancellation after finalization does not stop writes.
    #[instrument(skip(self, instruction, cancel), fields(run_id = tracing::field::Empty))]
    pub async fn generate_code_with_cancellation(
        &self,
        instruction: &str,
        apply: bool,
        cancel: CancellationToken,
    ) -> WorkflowResult {
        let mut run = Run::new(instruction);
        Span::current().record("run_id", tracing::field::display(run.result.run_id));
        info!(chars = instruction.len(), "Workflow started");

        let deadline = self.request_timeout.map(|t| Instant::now() + t);

        let context = match guarded(&cancel, deadline, self.retrieval.build(instruction, self.top_k)).await {
            Err(interrupt) => {
                run.cancel(WorkflowStage::Retrieval, interrupt);
                return run.finish();
            }
            Ok(Err(e)) => {
                run.fail(WorkflowStage::Retrieval, FailureKind::RetrievalUnavailable, e.to_string());
                return run.finish();
            }
            Ok(Ok(context)) => context,
        };
        run.result.context_sources = context.source_ids();

        for role in AgentRole::ALL {
            if !self.run_stage(&mut run, role, instruction, &context, &cancel, deadline).await {
                return run.finish();
            }
        }

        // TestDone -> Finalized: from here on the run is no longer cancellable.
        run.advance(WorkflowStage::Finalize);
        let candidates = candidate_set(&run.result);
        run.result.candidate_files = candidates
            .iter()
            .map(|(file, origin)| CandidateFile {
                path: file.relative_path.clone(),
                bytes: file.byte_len(),
                origin: *origin,
            })
            .collect();

        if apply {
            let results = self.write_all(candidates.into_iter().map(|(f, _)| f).collect()).await;
            run.result.files = results.iter().filter_map(WriteResult::written_file).collect();
            run.result.partial_apply = results.iter().any(|r| !r.is_written());
            run.result.applied = true;
            run.result.write_results = results;

            if run.result.partial_apply {
                warn!(
                    written = run.result.files.len(),
                    failed = run.result.failed_writes().len(),
                    "Partial apply"
                );
            }
        }

        let result = run.finish();
        info!(
            files = result.candidate_files.len(),
            written = result.files.len(),
            degraded = result.has_degraded_output(),
            "Workflow finalized"
        );
        result
    }

    /// Run one agent stage. Returns false when the run has terminated.
    async fn run_stage(
        &self,
        run: &mut Run,
        role: AgentRole,
        instruction: &str,
        context: &RetrievalContext,
        cancel: &CancellationToken,
        deadline: Option<Instant>,
    ) -> bool {
        let stage = WorkflowStage::from(role);
        let request = AgentRequest::new(role, instruction, context.clone())
            .with_upstream(run.upstream.clone());

        match guarded(cancel, deadline, self.executor.run(request)).await {
            Err(interrupt) => {
                run.cancel(stage, interrupt);
                false
            }
            Ok(Err(e)) => {
                run.fail(stage, e.kind(), e.to_string());
                false
            }
            Ok(Ok(agent_run)) => {
                run.record(agent_run);
                run.advance(stage);
                true
            }
        }
    }

    /// Write every candidate, continuing past individual failures.
    async fn write_all(&self, files: Vec<GeneratedFile>) -> Vec<WriteResult> {
        let writer = self.writer.clone();
        let paths: Vec<String> = files.iter().map(|f| f.relative_path.clone()).collect();

        let joined = tokio::task::spawn_blocking(move || {
            files
                .iter()
                .map(|f| writer.write(&f.relative_path, &f.content))
                .collect::<Vec<_>>()
        })
        .await;

        joined.unwrap_or_else(|e| {
            warn!(error = %e, "Write task failed");
            paths
                .into_iter()
                .map(|path| WriteResult::Failed {
                    path,
                    error: e.to_string(),
                })
                .collect()
        })
    }
}

/// Await `fut` unless the token fires or the deadline passes first.
async fn guarded<F: Future>(
    cancel: &CancellationToken,
    deadline: Option<Instant>,
    fut: F,
) -> Result<F::Output, Interrupt> {
    let expired = async {
        match deadline {
            Some(at) => tokio::time::sleep_until(at).await,
            None => std::future::pending().await,
        }
    };

    tokio::select! {
        biased;
        () = cancel.cancelled() => Err(Interrupt::Cancelled),
        () = expired => Err(Interrupt::DeadlineExceeded),
        out = fut => Ok(out),
    }
}

/// Developer files then tester files, first proposal per normalized path.
fn candidate_set(result: &WorkflowResult) -> Vec<(GeneratedFile, AgentRole)> {
    let dev_files = result
        .developer
        .iter()
        .flat_map(|r| r.output.files.iter().map(|f| (f, AgentRole::Developer)));
    let test_files = result
        .tester
        .iter()
        .flat_map(|r| r.output.test_files.iter().map(|f| (f, AgentRole::Tester)));

    let mut seen = HashSet::new();
    let mut candidates = Vec::new();
    for (file, origin) in dev_files.chain(test_files) {
        let key = normalize_relative(&file.relative_path).unwrap_or_else(|_| file.relative_path.clone());
        if seen.insert(key) {
            candidates.push((file.clone(), origin));
        } else {
            warn!(path = %file.relative_path, %origin, "Duplicate candidate path, keeping first proposal");
        }
    }
    candidates
}

/// Join each produced role's summary with `" | "`.
fn build_notes(result: &WorkflowResult) -> String {
    let mut parts = Vec::with_capacity(3);
    if let Some(pm) = &result.product_manager {
        parts.push(format!("PM Analysis: {}", pm.output.summary()));
    }
    if let Some(dev) = &result.developer {
        parts.push(format!("Dev Notes: {}", dev.output.summary()));
    }
    if let Some(qa) = &result.tester {
        parts.push(format!("QA Review: {}", qa.output.summary()));
    }
    parts.join(" | ")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapters::index::FixedIndex;
    use crate::adapters::models::{ScriptStep, ScriptedModelClient};
    use crate::domain::errors::{IndexError, ModelError};
    use crate::domain::models::{DevOutput, ParseMode, PmSpec, TestOutput};
    use std::sync::Arc;
    use tempfile::TempDir;

    fn coordinator(model: Arc<ScriptedModelClient>, index: FixedIndex, root: &std::path::Path) -> MultiAgentCoordinator {
        MultiAgentCoordinator::new(
            RetrievalContextBuilder::new(Arc::new(index), 4_000),
            AgentExecutor::new(model),
            WorkspaceWriter::new(root),
        )
    }

    fn dev_json(paths: &[&str]) -> String {
        serde_json::to_string(&DevOutput {
            files: paths.iter().map(|p| GeneratedFile::new(*p, format!("# {p}\n"))).collect(),
            commands: vec!["make run".into()],
            notes: "done".into(),
            ..Default::default()
        })
        .unwrap()
    }

    fn tester_json(paths: &[&str]) -> String {
        serde_json::to_string(&TestOutput {
            test_files: paths.iter().map(|p| GeneratedFile::new(*p, "assert True\n")).collect(),
            review_notes: "fine".into(),
            quality_score: Some(8.0),
            ..Default::default()
        })
        .unwrap()
    }

    fn pm_json() -> String {
        serde_json::to_string(&PmSpec {
            requirements: vec!["r".into()],
            ..Default::default()
        })
        .unwrap()
    }

    #[tokio::test]
    async fn test_outputs_thread_downstream() {
        let tmp = TempDir::new().unwrap();
        let model = Arc::new(
            ScriptedModelClient::new()
                .with_step(AgentRole::ProductManager, ScriptStep::respond(pm_json()))
                .with_step(AgentRole::Developer, ScriptStep::respond(dev_json(&["app/main.py"])))
                .with_step(AgentRole::Tester, ScriptStep::respond(tester_json(&[]))),
        );
        let result = coordinator(model.clone(), FixedIndex::demo(), tmp.path())
            .generate_code("do it", false)
            .await;

        assert!(result.is_completed());
        assert_eq!(result.state, WorkflowState::Finalized);
        let dev_prompt = &model.calls_for(AgentRole::Developer)[0].user_prompt;
        assert!(dev_prompt.contains("Product Manager Specification"));
        let qa_prompt = &model.calls_for(AgentRole::Tester)[0].user_prompt;
        assert!(qa_prompt.contains("File: app/main.py"));
        assert_eq!(result.commands, vec!["make run"]);
        assert_eq!(result.context_sources.len(), 2);
        assert!(result.notes.starts_with("PM Analysis: "));
        assert!(result.notes.contains(" | Dev Notes: done | QA Review: fine"));
    }

    #[tokio::test]
    async fn test_retrieval_failure_runs_no_agents() {
        let tmp = TempDir::new().unwrap();
        let model = Arc::new(ScriptedModelClient::demo());
        let result = coordinator(
            model.clone(),
            FixedIndex::failing(IndexError::Unreachable("refused".into())),
            tmp.path(),
        )
        .generate_code("x", true)
        .await;

        assert!(matches!(
            result.outcome,
            WorkflowOutcome::Failed {
                stage: WorkflowStage::Retrieval,
                kind: FailureKind::RetrievalUnavailable,
                ..
            }
        ));
        assert!(model.calls().is_empty());
        assert!(!result.applied);
        assert!(result.agents_involved().is_empty());
    }

    #[tokio::test]
    async fn test_tester_failure_keeps_earlier_outputs() {
        let tmp = TempDir::new().unwrap();
        let model = Arc::new(
            ScriptedModelClient::new()
                .with_step(AgentRole::ProductManager, ScriptStep::respond(pm_json()))
                .with_step(AgentRole::Developer, ScriptStep::respond(dev_json(&["a.py"])))
                .with_step(
                    AgentRole::Tester,
                    ScriptStep::fail(ModelError::Unavailable("gone".into())),
                ),
        );
        let result = coordinator(model, FixedIndex::new(vec![]), tmp.path())
            .generate_code("x", true)
            .await;

        assert_eq!(result.stopped_at(), Some(WorkflowStage::Tester));
        assert!(result.product_manager.is_some());
        assert!(result.developer.is_some());
        assert!(result.tester.is_none());
        assert!(result.files.is_empty());
        assert!(!result.applied);
        assert!(!tmp.path().join("a.py").exists());
    }

    #[tokio::test]
    async fn test_duplicate_paths_first_proposal_wins() {
        let tmp = TempDir::new().unwrap();
        let model = Arc::new(
            ScriptedModelClient::new()
                .with_step(AgentRole::ProductManager, ScriptStep::respond(pm_json()))
                .with_step(AgentRole::Developer, ScriptStep::respond(dev_json(&["app/x.py"])))
                .with_step(
                    AgentRole::Tester,
                    ScriptStep::respond(tester_json(&["./app/x.py", "tests/test_x.py"])),
                ),
        );
        let result = coordinator(model, FixedIndex::new(vec![]), tmp.path())
            .generate_code("x", true)
            .await;

        let origins: Vec<_> = result.candidate_files.iter().map(|c| (c.path.as_str(), c.origin)).collect();
        assert_eq!(
            origins,
            vec![("app/x.py", AgentRole::Developer), ("tests/test_x.py", AgentRole::Tester)]
        );
        assert_eq!(
            std::fs::read_to_string(tmp.path().join("app/x.py")).unwrap(),
            "# app/x.py\n"
        );
    }

    #[tokio::test]
    async fn test_cancelled_token_before_start() {
        let tmp = TempDir::new().unwrap();
        let model = Arc::new(ScriptedModelClient::demo());
        let token = CancellationToken::new();
        token.cancel();

        let result = coordinator(model.clone(), FixedIndex::demo(), tmp.path())
            .generate_code_with_cancellation("x", true, token)
            .await;

        assert_eq!(
            result.outcome,
            WorkflowOutcome::Cancelled {
                stage: WorkflowStage::Retrieval
            }
        );
        assert!(model.calls().is_empty());
    }

    #[tokio::test]
    async fn test_deadline_cancels_in_flight_stage() {
        let tmp = TempDir::new().unwrap();
        let model = Arc::new(
            ScriptedModelClient::new()
                .with_step(AgentRole::ProductManager, ScriptStep::respond(pm_json()))
                .with_step(
                    AgentRole::Developer,
                    ScriptStep::respond(dev_json(&["slow.py"])).after(Duration::from_secs(5)),
                ),
        );
        let result = coordinator(model, FixedIndex::new(vec![]), tmp.path())
            .with_request_timeout(Some(Duration::from_millis(100)))
            .generate_code("x", true)
            .await;

        assert_eq!(
            result.outcome,
            WorkflowOutcome::Cancelled {
                stage: WorkflowStage::Developer
            }
        );
        assert!(result.product_manager.is_some());
        assert!(result.developer.is_none());
        assert!(!tmp.path().join("slow.py").exists());
    }

    #[tokio::test]
    async fn test_fallback_output_is_flagged() {
        let tmp = TempDir::new().unwrap();
        let model = Arc::new(
            ScriptedModelClient::new()
                .with_step(AgentRole::ProductManager, ScriptStep::respond("Add a route.\nReturn 200."))
                .with_step(AgentRole::Developer, ScriptStep::respond("```python\nprint(1)\n```"))
                .with_step(AgentRole::Tester, ScriptStep::respond("Looks fine.")),
        );
        let result = coordinator(model, FixedIndex::new(vec![]), tmp.path())
            .generate_code("x", false)
            .await;

        assert!(result.is_completed());
        assert!(result.has_degraded_output());
        let pm = result.product_manager.unwrap();
        assert_eq!(pm.parse_mode, ParseMode::Fallback);
        assert_eq!(pm.output.requirements, vec!["Add a route.", "Return 200."]);
        assert_eq!(result.candidate_files[0].path, "file_1.py");
    }

    #[test]
    fn test_run_advances_through_stages_in_order() {
        let mut run = Run::new("x");
        for stage in [
            WorkflowStage::ProductManager,
            WorkflowStage::Developer,
            WorkflowStage::Tester,
            WorkflowStage::Finalize,
        ] {
            run.advance(stage);
        }
        assert_eq!(run.state, WorkflowState::Finalized);
    }

    #[test]
    #[cfg(debug_assertions)]
    #[should_panic(expected = "completed out of order")]
    fn test_run_advance_out_of_order_is_caught() {
        let mut run = Run::new("x");
        run.advance(WorkflowStage::Developer);
    }

    #[test]
    #[cfg(debug_assertions)]
    #[should_panic(expected = "completed out of order")]
    fn test_run_advance_after_terminal_is_caught() {
        let mut run = Run::new("x");
        run.fail(WorkflowStage::ProductManager, FailureKind::ModelTimeout, "slow".into());
        run.advance(WorkflowStage::ProductManager);
    }
}
