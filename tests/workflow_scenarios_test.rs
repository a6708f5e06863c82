//! End-to-end pipeline runs over the scripted model and fixed index.

mod common;

use std::time::Duration;
use tokio_util::sync::CancellationToken;

use common::{harness, harness_with, setup_test_logging, INSTRUCTION};
use triad::adapters::index::FixedIndex;
use triad::adapters::models::{ScriptStep, ScriptedModelClient};
use triad::domain::errors::{FailureKind, IndexError, ModelError};
use triad::domain::models::{
    AgentRole, ParseMode, PathRejection, WorkflowOutcome, WorkflowStage, WorkflowState, WriteResult,
};

const DEV_WITH_ESCAPE: &str = r##"{
    "files": [
        {"path": "app/main.py", "content": "print('ok')\n"},
        {"path": "../../etc/passwd", "content": "root::0:0::/:/bin/sh\n"},
        {"path": "README.md", "content": "# Health\n"}
    ],
    "commands": []
}"##;

#[tokio::test]
async fn test_preview_run_writes_nothing() {
    setup_test_logging();
    let h = harness(ScriptedModelClient::demo());

    let result = h.coordinator.generate_code(INSTRUCTION, false).await;

    assert!(result.is_completed(), "outcome: {:?}", result.outcome);
    assert_eq!(result.state, WorkflowState::Finalized);
    let pm = result.product_manager.as_ref().expect("pm output");
    assert!(!pm.output.components.is_empty());
    let dev = result.developer.as_ref().expect("dev output");
    assert!(!dev.output.files.is_empty());
    assert!(!result.applied);
    assert!(result.files.is_empty());
    assert!(result.write_results.is_empty());
    assert!(!result.candidate_files.is_empty());
    assert_eq!(std::fs::read_dir(h.sandbox.path()).unwrap().count(), 0);
    assert_eq!(
        result.agents_involved(),
        vec![AgentRole::ProductManager, AgentRole::Developer, AgentRole::Tester]
    );
}

#[tokio::test]
async fn test_apply_writes_into_sandbox() {
    let h = harness(ScriptedModelClient::demo());

    let result = h.coordinator.generate_code(INSTRUCTION, true).await;

    assert!(result.is_completed());
    assert!(result.applied);
    assert!(!result.partial_apply);

    let dev = result.developer.as_ref().unwrap();
    let main = dev
        .output
        .files
        .iter()
        .find(|f| f.relative_path == "app/main.py")
        .expect("developer proposed app/main.py");

    let target = h.sandbox.path().join("app/main.py");
    let on_disk = std::fs::read(&target).unwrap();
    assert_eq!(on_disk.len(), main.content.len());
    assert_eq!(on_disk, main.content.as_bytes());

    let written = result.files.iter().find(|f| f.path == "app/main.py").unwrap();
    assert_eq!(written.bytes, main.content.len() as u64);
    assert!(h.sandbox.path().join("tests/test_health.py").is_file());
    assert_eq!(
        result.commands,
        vec!["pip install -r requirements.txt", "uvicorn app.main:app --reload"]
    );
}

#[tokio::test]
async fn test_escaping_path_is_rejected_others_written() {
    let model = ScriptedModelClient::demo().replace_step(AgentRole::Developer, ScriptStep::respond(DEV_WITH_ESCAPE));
    let h = harness(model);

    let result = h.coordinator.generate_code(INSTRUCTION, true).await;

    assert!(result.is_completed());
    assert!(result.partial_apply);
    // Three developer files plus the tester's test file.
    assert_eq!(result.write_results.len(), 4);

    let rejected = result
        .write_results
        .iter()
        .find(|r| r.path() == "../../etc/passwd")
        .unwrap();
    assert!(matches!(
        rejected,
        WriteResult::PathRejected {
            reason: PathRejection::EscapesRoot,
            ..
        }
    ));

    assert!(h.sandbox.path().join("app/main.py").is_file());
    assert!(h.sandbox.path().join("README.md").is_file());
    assert_eq!(result.files.len(), 3);
}

#[tokio::test]
async fn test_developer_timeout_fails_run() {
    let model = ScriptedModelClient::demo().replace_step(
        AgentRole::Developer,
        ScriptStep::respond("never used").after(Duration::from_secs(5)),
    );
    let h = harness_with(model, FixedIndex::demo(), Duration::from_millis(100));

    let result = h.coordinator.generate_code(INSTRUCTION, true).await;

    match &result.outcome {
        WorkflowOutcome::Failed { stage, kind, .. } => {
            assert_eq!(*stage, WorkflowStage::Developer);
            assert_eq!(*kind, FailureKind::ModelTimeout);
        }
        other => panic!("expected failure, got {other:?}"),
    }
    assert!(result.product_manager.is_some());
    assert!(result.developer.is_none());
    assert!(result.tester.is_none());
    assert!(!result.applied);
    assert!(result.files.is_empty());
    assert!(result.candidate_files.is_empty());
    assert_eq!(std::fs::read_dir(h.sandbox.path()).unwrap().count(), 0);
}

#[tokio::test]
async fn test_retrieval_failure_stops_before_agents() {
    let h = harness_with(
        ScriptedModelClient::demo(),
        FixedIndex::failing(IndexError::Unreachable("connection refused".into())),
        Duration::from_secs(30),
    );

    let result = h.coordinator.generate_code(INSTRUCTION, true).await;

    assert!(matches!(
        result.outcome,
        WorkflowOutcome::Failed {
            stage: WorkflowStage::Retrieval,
            kind: FailureKind::RetrievalUnavailable,
            ..
        }
    ));
    assert!(h.model.calls().is_empty());
}

#[tokio::test]
async fn test_model_unavailable_for_tester_keeps_upstream() {
    let model = ScriptedModelClient::demo().replace_step(
        AgentRole::Tester,
        ScriptStep::fail(ModelError::Unavailable("connection reset".into())),
    );
    let h = harness(model);

    let result = h.coordinator.generate_code(INSTRUCTION, true).await;

    assert_eq!(result.stopped_at(), Some(WorkflowStage::Tester));
    assert!(result.product_manager.is_some());
    assert!(result.developer.is_some());
    assert!(result.tester.is_none());
    assert!(result.files.is_empty());
}

#[tokio::test]
async fn test_cancellation_during_developer() {
    let model = ScriptedModelClient::demo().replace_step(
        AgentRole::Developer,
        ScriptStep::respond("slow").after(Duration::from_secs(5)),
    );
    let h = harness(model);
    let cancel = CancellationToken::new();

    let trigger = cancel.clone();
    tokio::spawn(async move {
        tokio::time::sleep(Duration::from_millis(100)).await;
        trigger.cancel();
    });

    let result = h
        .coordinator
        .generate_code_with_cancellation(INSTRUCTION, true, cancel)
        .await;

    assert_eq!(
        result.outcome,
        WorkflowOutcome::Cancelled {
            stage: WorkflowStage::Developer
        }
    );
    assert!(result.product_manager.is_some());
    assert!(result.developer.is_none());
    assert_eq!(std::fs::read_dir(h.sandbox.path()).unwrap().count(), 0);
}

#[tokio::test]
async fn test_unstructured_replies_still_complete() {
    let model = ScriptedModelClient::new().with_default(ScriptStep::respond(
        "- expose GET /health\n- return 200\n\n```python\nprint('hi')\n```\n",
    ));
    let h = harness(model);

    let result = h.coordinator.generate_code(INSTRUCTION, false).await;

    assert!(result.is_completed());
    assert!(result.has_degraded_output());
    assert_eq!(result.product_manager.as_ref().unwrap().parse_mode, ParseMode::Fallback);
    let dev = result.developer.as_ref().unwrap();
    assert_eq!(dev.output.files[0].relative_path, "file_1.py");
}

#[tokio::test]
async fn test_prompts_carry_context_and_upstream_output() {
    let h = harness(ScriptedModelClient::demo());

    h.coordinator.generate_code(INSTRUCTION, false).await;

    let calls = h.model.calls();
    assert_eq!(calls.len(), 3);
    assert!(calls[0].user_prompt.contains("[Context 1] (source: docs/architecture.md"));
    assert!(calls[1].user_prompt.contains("HealthRoute"));
    let tester = h.model.calls_for(AgentRole::Tester);
    assert!(tester[0].user_prompt.contains("app/main.py"));
}
