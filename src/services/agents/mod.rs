//! The three pipeline agents and the executor that runs them.
//!
//! Roles are a closed set: [`Agent`] is an enum over exactly the product
//! manager, developer and tester, each providing a system prompt, a user
//! prompt builder and a response parser. [`AgentExecutor`] owns the model
//! client and performs the call.

pub mod developer;
pub mod product_manager;
pub mod tester;

use std::sync::Arc;
use std::time::{Duration, Instant};

use tracing::{debug, info, instrument, warn};

use crate::domain::errors::ModelError;
use crate::domain::models::{
    AgentRequest, AgentRole, AgentRun, ParseMode, PromptLimits, StructuredOutput,
};
use crate::domain::ports::ModelClient;

pub use developer::DeveloperAgent;
pub use product_manager::ProductManagerAgent;
pub use tester::TesterAgent;

/// Default per-call model timeout.
const DEFAULT_CALL_TIMEOUT: Duration = Duration::from_secs(300);

/// One of the three pipeline roles.
#[derive(Debug, Clone)]
pub enum Agent {
    ProductManager(ProductManagerAgent),
    Developer(DeveloperAgent),
    Tester(TesterAgent),
}

impl Agent {
    pub fn for_role(role: AgentRole, limits: &PromptLimits) -> Self {
        match role {
            AgentRole::ProductManager => Self::ProductManager(ProductManagerAgent),
            AgentRole::Developer => Self::Developer(DeveloperAgent::new(limits.clone())),
            AgentRole::Tester => Self::Tester(TesterAgent::new(limits.clone())),
        }
    }

    pub fn role(&self) -> AgentRole {
        match self {
            Self::ProductManager(_) => AgentRole::ProductManager,
            Self::Developer(_) => AgentRole::Developer,
            Self::Tester(_) => AgentRole::Tester,
        }
    }

    pub fn system_prompt(&self) -> &'static str {
        match self {
            Self::ProductManager(a) => a.system_prompt(),
            Self::Developer(a) => a.system_prompt(),
            Self::Tester(a) => a.system_prompt(),
        }
    }

    /// Build the user prompt from the parts of the request this role reads.
    pub fn build_user_prompt(&self, request: &AgentRequest) -> String {
        let upstream = &request.upstream_outputs;
        match self {
            Self::ProductManager(a) => a.build_user_prompt(&request.instruction, &request.context),
            Self::Developer(a) => {
                a.build_user_prompt(&request.instruction, &request.context, upstream.spec())
            }
            Self::Tester(a) => {
                a.build_user_prompt(&request.instruction, upstream.spec(), upstream.code())
            }
        }
    }

    /// Parse a raw response. Never fails.
    pub fn parse_response(&self, raw: &str) -> (StructuredOutput, ParseMode) {
        match self {
            Self::ProductManager(a) => {
                let (spec, mode) = a.parse(raw);
                (StructuredOutput::ProductManager(spec), mode)
            }
            Self::Developer(a) => {
                let (dev, mode) = a.parse(raw);
                (StructuredOutput::Developer(dev), mode)
            }
            Self::Tester(a) => {
                let (review, mode) = a.parse(raw);
                (StructuredOutput::Tester(review), mode)
            }
        }
    }
}

/// Runs agents against an injected model client.
#[derive(Clone)]
pub struct AgentExecutor {
    model: Arc<dyn ModelClient>,
    call_timeout: Duration,
    limits: PromptLimits,
}

impl AgentExecutor {
    pub fn new(model: Arc<dyn ModelClient>) -> Self {
        Self {
            model,
            call_timeout: DEFAULT_CALL_TIMEOUT,
            limits: PromptLimits::default(),
        }
    }

    #[must_use]
    pub fn with_call_timeout(mut self, call_timeout: Duration) -> Self {
        self.call_timeout = call_timeout;
        self
    }

    #[must_use]
    pub fn with_limits(mut self, limits: PromptLimits) -> Self {
        self.limits = limits;
        self
    }

    pub fn model_id(&self) -> &str {
        self.model.model_id()
    }

    /// Run one agent: build prompts, call the model, parse the response.
    ///
    /// Only transport failures and timeouts are errors. Malformed output is
    /// recovered by the parse layers and reported through `parse_mode`.
    #[instrument(skip(self, request), fields(role = %request.role, model = %self.model.model_id()))]
    pub async fn run(&self, request: AgentRequest) -> Result<AgentRun, ModelError> {
        let agent = Agent::for_role(request.role, &self.limits);
        let system_prompt = agent.system_prompt();
        let user_prompt = agent.build_user_prompt(&request);

        debug!(
            system_chars = system_prompt.len(),
            user_chars = user_prompt.len(),
            upstream = request.upstream_outputs.len(),
            "Invoking model"
        );

        let started = Instant::now();
        let raw_text = tokio::time::timeout(
            self.call_timeout,
            self.model.complete(system_prompt, &user_prompt),
        )
        .await
        .map_err(|_| ModelError::Timeout(self.call_timeout.as_secs()))??;
        let duration_ms = u64::try_from(started.elapsed().as_millis()).unwrap_or(u64::MAX);

        debug!(raw_text = %raw_text, "Model response");

        let (output, parse_mode) = agent.parse_response(&raw_text);
        if parse_mode.is_degraded() {
            warn!(
                response_chars = raw_text.len(),
                "Response did not match the schema, used fallback parsing"
            );
        }
        info!(?parse_mode, duration_ms, summary = %output.summary(), "Agent completed");

        Ok(AgentRun {
            role: agent.role(),
            output,
            raw_text,
            parse_mode,
            duration_ms,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapters::models::{ScriptStep, ScriptedModelClient};
    use crate::domain::models::{PmSpec, RetrievalContext, UpstreamOutputs};

    #[test]
    fn test_system_prompts_name_their_role() {
        let limits = PromptLimits::default();
        for role in AgentRole::ALL {
            let agent = Agent::for_role(role, &limits);
            assert_eq!(agent.role(), role);
            assert!(agent.system_prompt().contains(role.title()));
        }
    }

    #[test]
    fn test_plain_text_never_fails_to_parse() {
        let limits = PromptLimits::default();
        for role in AgentRole::ALL {
            let (output, mode) = Agent::for_role(role, &limits).parse_response("just some prose");
            assert_eq!(output.role(), role);
            assert_eq!(mode, ParseMode::Fallback);
        }
    }

    #[tokio::test]
    async fn test_run_returns_raw_text_and_structured_output() {
        let spec = PmSpec {
            requirements: vec!["Return 200".into()],
            ..Default::default()
        };
        let raw = serde_json::to_string(&spec).unwrap();
        let model = Arc::new(
            ScriptedModelClient::new()
                .with_step(AgentRole::ProductManager, ScriptStep::respond(raw.clone())),
        );
        let executor = AgentExecutor::new(model.clone());

        let run = executor
            .run(AgentRequest::new(
                AgentRole::ProductManager,
                "add health",
                RetrievalContext::empty(),
            ))
            .await
            .unwrap();

        assert_eq!(run.raw_text, raw);
        assert_eq!(run.parse_mode, ParseMode::Strict);
        assert_eq!(run.output, StructuredOutput::ProductManager(spec));
        assert_eq!(model.calls().len(), 1);
    }

    #[tokio::test]
    async fn test_run_times_out() {
        let model = Arc::new(ScriptedModelClient::new().with_step(
            AgentRole::Developer,
            ScriptStep::respond("{}").after(Duration::from_millis(200)),
        ));
        let executor = AgentExecutor::new(model).with_call_timeout(Duration::from_millis(20));

        let err = executor
            .run(
                AgentRequest::new(AgentRole::Developer, "x", RetrievalContext::empty())
                    .with_upstream(UpstreamOutputs::new()),
            )
            .await
            .unwrap_err();
        assert!(matches!(err, ModelError::Timeout(_)));
    }

    #[tokio::test]
    async fn test_run_propagates_model_errors() {
        let model = Arc::new(ScriptedModelClient::new().with_step(
            AgentRole::Tester,
            ScriptStep::fail(ModelError::Unavailable("connection refused".into())),
        ));
        let err = AgentExecutor::new(model)
            .run(AgentRequest::new(AgentRole::Tester, "x", RetrievalContext::empty()))
            .await
            .unwrap_err();
        assert_eq!(err.kind(), crate::domain::errors::FailureKind::ModelUnavailable);
    }
}
