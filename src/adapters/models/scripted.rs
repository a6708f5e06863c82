//! Scripted model client for tests and dry runs.
//!
//! Responses are selected by the role named in the system prompt, so one
//! client can serve a whole workflow run. Every call is recorded.

use async_trait::async_trait;
use std::collections::{HashMap, VecDeque};
use std::sync::{Mutex, PoisonError};
use std::time::Duration;

use crate::domain::errors::ModelError;
use crate::domain::models::AgentRole;
use crate::domain::ports::{ModelClient, ModelHealth};

/// One scripted reply.
#[derive(Debug, Clone)]
pub struct ScriptStep {
    /// Text to return, or the error to fail with.
    pub reply: Result<String, ModelError>,
    /// Simulated latency before replying.
    pub delay: Option<Duration>,
}

impl ScriptStep {
    pub fn respond(text: impl Into<String>) -> Self {
        Self {
            reply: Ok(text.into()),
            delay: None,
        }
    }

    pub fn fail(error: ModelError) -> Self {
        Self {
            reply: Err(error),
            delay: None,
        }
    }

    #[must_use]
    pub fn after(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }
}

/// A call the client received.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RecordedCall {
    /// Role detected from the system prompt, if any.
    pub role: Option<AgentRole>,
    pub system_prompt: String,
    pub user_prompt: String,
}

/// Deterministic [`ModelClient`] driven by per-role scripts.
///
/// Each role has a queue of steps. The last step of a queue is repeated once
/// the queue is down to it. Calls that match no role, or a role without a
/// script, use the default step.
#[derive(Debug, Default)]
pub struct ScriptedModelClient {
    scripts: Mutex<HashMap<AgentRole, VecDeque<ScriptStep>>>,
    default_step: Option<ScriptStep>,
    calls: Mutex<Vec<RecordedCall>>,
}

impl ScriptedModelClient {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a step to a role's script.
    #[must_use]
    pub fn with_step(self, role: AgentRole, step: ScriptStep) -> Self {
        self.scripts
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .entry(role)
            .or_default()
            .push_back(step);
        self
    }

    /// Replace a role's whole script with a single step.
    #[must_use]
    pub fn replace_step(self, role: AgentRole, step: ScriptStep) -> Self {
        self.scripts
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(role, VecDeque::from([step]));
        self
    }

    /// Step used when no role script applies.
    #[must_use]
    pub fn with_default(mut self, step: ScriptStep) -> Self {
        self.default_step = Some(step);
        self
    }

    /// Canned responses for the "health check endpoint" walkthrough.
    pub fn demo() -> Self {
        Self::new()
            .with_step(AgentRole::ProductManager, ScriptStep::respond(DEMO_PM_RESPONSE))
            .with_step(AgentRole::Developer, ScriptStep::respond(DEMO_DEV_RESPONSE))
            .with_step(AgentRole::Tester, ScriptStep::respond(DEMO_TESTER_RESPONSE))
            .with_default(ScriptStep::respond(DEMO_ANSWER))
    }

    /// All calls received so far, in order.
    pub fn calls(&self) -> Vec<RecordedCall> {
        self.calls
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// Calls received for one role.
    pub fn calls_for(&self, role: AgentRole) -> Vec<RecordedCall> {
        self.calls()
            .into_iter()
            .filter(|c| c.role == Some(role))
            .collect()
    }

    fn next_step(&self, role: Option<AgentRole>) -> Option<ScriptStep> {
        let scripted = role.and_then(|role| {
            let mut scripts = self.scripts.lock().unwrap_or_else(PoisonError::into_inner);
            let queue = scripts.get_mut(&role)?;
            if queue.len() > 1 {
                queue.pop_front()
            } else {
                queue.front().cloned()
            }
        });
        scripted.or_else(|| self.default_step.clone())
    }
}

/// Detect which agent a system prompt belongs to.
pub fn role_from_system_prompt(system_prompt: &str) -> Option<AgentRole> {
    AgentRole::ALL
        .into_iter()
        .find(|role| system_prompt.contains(&format!("You are an expert {}", role.title())))
}

#[async_trait]
impl ModelClient for ScriptedModelClient {
    fn model_id(&self) -> &str {
        "scripted"
    }

    async fn complete(&self, system_prompt: &str, user_prompt: &str) -> Result<String, ModelError> {
        let role = role_from_system_prompt(system_prompt);
        self.calls
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(RecordedCall {
                role,
                system_prompt: system_prompt.to_string(),
                user_prompt: user_prompt.to_string(),
            });

        let step = self.next_step(role).ok_or_else(|| {
            ModelError::NotConfigured(format!(
                "no scripted response for {}",
                role.map_or("unmatched prompt", |r| r.as_str())
            ))
        })?;

        if let Some(delay) = step.delay {
            tokio::time::sleep(delay).await;
        }
        step.reply
    }

    async fn health_check(&self) -> Result<ModelHealth, ModelError> {
        Ok(ModelHealth {
            reachable: true,
            model_available: true,
            models: vec!["scripted".to_string()],
        })
    }
}

const DEMO_PM_RESPONSE: &str = r#"{
    "analysis": "Add a lightweight endpoint reporting service health.",
    "components": [
        {"name": "HealthRoute", "description": "GET /health handler returning service status"},
        {"name": "App", "description": "FastAPI application wiring the route"}
    ],
    "requirements": [
        "Expose GET /health",
        "Respond with JSON {\"status\": \"healthy\"}",
        "Respond within 100ms without touching external services"
    ],
    "acceptance_criteria": [
        "GET /health returns HTTP 200",
        "Body contains status=healthy"
    ],
    "technical_considerations": ["Keep the handler free of I/O"]
}"#;

const DEMO_DEV_RESPONSE: &str = r#"Here is the implementation:
```json
{
    "implementation_plan": "Create a FastAPI app with a /health route.",
    "files": [
        {
            "path": "app/main.py",
            "content": "from fastapi import FastAPI\n\napp = FastAPI()\n\n\n@app.get(\"/health\")\ndef health():\n    return {\"status\": \"healthy\"}\n",
            "description": "Application entry point with the health route"
        },
        {
            "path": "requirements.txt",
            "content": "fastapi\nuvicorn\n",
            "description": "Runtime dependencies"
        }
    ],
    "dependencies": ["fastapi", "uvicorn"],
    "commands": ["pip install -r requirements.txt", "uvicorn app.main:app --reload"],
    "notes": "Health route has no external dependencies."
}
```"#;

const DEMO_TESTER_RESPONSE: &str = r#"{
    "review_notes": "Implementation is minimal and correct. Consider adding a version field.",
    "issues": [
        {"severity": "low", "file": "app/main.py", "issue": "No version in payload", "suggestion": "Include the app version"}
    ],
    "test_files": [
        {
            "path": "tests/test_health.py",
            "content": "from fastapi.testclient import TestClient\n\nfrom app.main import app\n\n\ndef test_health():\n    client = TestClient(app)\n    response = client.get(\"/health\")\n    assert response.status_code == 200\n    assert response.json() == {\"status\": \"healthy\"}\n",
            "description": "Checks the health endpoint"
        }
    ],
    "recommendations": ["Add the endpoint to monitoring"],
    "quality_score": "8/10"
}"#;

const DEMO_ANSWER: &str =
    "Based on [Context 1], the service exposes its health at GET /health.";
