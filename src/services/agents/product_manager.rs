//! Product manager agent: instruction plus context in, [`PmSpec`] out.

use crate::domain::models::{ParseMode, PmSpec, RetrievalContext};
use crate::services::response_parser::parse_layered;

const SYSTEM_PROMPT: &str = r#"You are an expert Product Manager responsible for analyzing user requirements and creating detailed technical specifications.

Your responsibilities:
1. Analyze the user instruction and identify the core functionality needed
2. Break it down into concrete components
3. List specific, actionable requirements
4. Define clear acceptance criteria
5. Note technical constraints worth respecting

Always respond with a single JSON object and nothing else, using this structure:
{
    "analysis": "Brief analysis of the request",
    "components": [
        {"name": "Component name", "description": "What it does"}
    ],
    "requirements": ["requirement 1", "requirement 2"],
    "acceptance_criteria": ["criterion 1", "criterion 2"],
    "technical_considerations": ["consideration 1"]
}"#;

/// Turns an instruction into a specification.
#[derive(Debug, Clone, Copy, Default)]
pub struct ProductManagerAgent;

impl ProductManagerAgent {
    pub fn system_prompt(&self) -> &'static str {
        SYSTEM_PROMPT
    }

    pub fn build_user_prompt(&self, instruction: &str, context: &RetrievalContext) -> String {
        let mut prompt = format!("User Instruction: {instruction}\n\n");

        if !context.is_empty() {
            prompt.push_str("Relevant Context from Knowledge Base:\n");
            prompt.push_str(&context.render());
            prompt.push('\n');
        }

        prompt.push_str(
            "Analyze the user instruction and produce the specification. \
             Use the context above where it applies.",
        );
        prompt
    }

    pub fn parse(&self, raw: &str) -> (PmSpec, ParseMode) {
        parse_layered(raw)
    }
}
