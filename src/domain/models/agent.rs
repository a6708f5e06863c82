//! Agent roles, requests and structured results.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use super::outputs::{DevOutput, PmSpec, TestOutput};
use super::passage::RetrievalContext;

/// The three pipeline roles, in execution order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum AgentRole {
    ProductManager,
    Developer,
    Tester,
}

impl AgentRole {
    /// All roles in pipeline order.
    pub const ALL: [AgentRole; 3] = [Self::ProductManager, Self::Developer, Self::Tester];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::ProductManager => "ProductManager",
            Self::Developer => "Developer",
            Self::Tester => "Tester",
        }
    }

    /// Human-facing title used in prompts.
    pub fn title(&self) -> &'static str {
        match self {
            Self::ProductManager => "Product Manager",
            Self::Developer => "Software Developer",
            Self::Tester => "Quality Assurance Tester",
        }
    }
}

impl std::fmt::Display for AgentRole {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A parsed agent result, tagged by role.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "role", content = "output")]
pub enum StructuredOutput {
    ProductManager(PmSpec),
    Developer(DevOutput),
    Tester(TestOutput),
}

impl StructuredOutput {
    pub fn role(&self) -> AgentRole {
        match self {
            Self::ProductManager(_) => AgentRole::ProductManager,
            Self::Developer(_) => AgentRole::Developer,
            Self::Tester(_) => AgentRole::Tester,
        }
    }

    pub fn summary(&self) -> String {
        match self {
            Self::ProductManager(spec) => spec.summary(),
            Self::Developer(dev) => dev.summary(),
            Self::Tester(review) => review.summary(),
        }
    }
}

/// Outputs of earlier roles forwarded to a later one.
///
/// Entries are inserted by the coordinator and never modified after.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct UpstreamOutputs(BTreeMap<AgentRole, StructuredOutput>);

impl UpstreamOutputs {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record an output. A role already present is kept as-is.
    pub fn insert(&mut self, output: StructuredOutput) {
        self.0.entry(output.role()).or_insert(output);
    }

    pub fn get(&self, role: AgentRole) -> Option<&StructuredOutput> {
        self.0.get(&role)
    }

    pub fn spec(&self) -> Option<&PmSpec> {
        match self.get(AgentRole::ProductManager) {
            Some(StructuredOutput::ProductManager(spec)) => Some(spec),
            _ => None,
        }
    }

    pub fn code(&self) -> Option<&DevOutput> {
        match self.get(AgentRole::Developer) {
            Some(StructuredOutput::Developer(dev)) => Some(dev),
            _ => None,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }
}

/// Input to one agent invocation.
#[derive(Debug, Clone)]
pub struct AgentRequest {
    pub role: AgentRole,
    pub instruction: String,
    pub context: RetrievalContext,
    pub upstream_outputs: UpstreamOutputs,
}

impl AgentRequest {
    pub fn new(role: AgentRole, instruction: impl Into<String>, context: RetrievalContext) -> Self {
        Self {
            role,
            instruction: instruction.into(),
            context,
            upstream_outputs: UpstreamOutputs::new(),
        }
    }

    #[must_use]
    pub fn with_upstream(mut self, upstream_outputs: UpstreamOutputs) -> Self {
        self.upstream_outputs = upstream_outputs;
        self
    }
}

/// Which parse layer produced a structured output.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ParseMode {
    /// The full response was valid JSON matching the schema.
    Strict,
    /// A balanced JSON span inside the response matched the schema.
    Extracted,
    /// Neither JSON layer matched; the role heuristic was applied.
    Fallback,
}

impl ParseMode {
    /// Whether the output came from degraded parsing.
    pub fn is_degraded(&self) -> bool {
        matches!(self, Self::Fallback)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Strict => "strict",
            Self::Extracted => "extracted",
            Self::Fallback => "fallback",
        }
    }
}

/// The outcome of running one agent: its structured output plus the
/// untouched model text for diagnostics.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AgentRun {
    pub role: AgentRole,
    pub output: StructuredOutput,
    pub raw_text: String,
    pub parse_mode: ParseMode,
    pub duration_ms: u64,
}

/// Per-role report embedded in a workflow result.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AgentReport<T> {
    pub output: T,
    pub raw_text: String,
    pub parse_mode: ParseMode,
    pub duration_ms: u64,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_role_names() {
        assert_eq!(AgentRole::Developer.to_string(), "Developer");
        assert_eq!(
            serde_json::to_string(&AgentRole::ProductManager).unwrap(),
            "\"ProductManager\""
        );
        assert_eq!(AgentRole::ALL[2], AgentRole::Tester);
    }

    #[test]
    fn test_upstream_outputs_keep_first_insert() {
        let mut upstream = UpstreamOutputs::new();
        upstream.insert(StructuredOutput::ProductManager(PmSpec {
            requirements: vec!["first".into()],
            ..Default::default()
        }));
        upstream.insert(StructuredOutput::ProductManager(PmSpec {
            requirements: vec!["second".into()],
            ..Default::default()
        }));

        assert_eq!(upstream.len(), 1);
        assert_eq!(upstream.spec().unwrap().requirements, vec!["first"]);
        assert!(upstream.code().is_none());
    }

    #[test]
    fn test_structured_output_role() {
        let out = StructuredOutput::Tester(TestOutput::default());
        assert_eq!(out.role(), AgentRole::Tester);
        assert!(ParseMode::Fallback.is_degraded());
        assert!(!ParseMode::Extracted.is_degraded());
    }
}
