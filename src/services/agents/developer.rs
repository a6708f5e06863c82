//! Developer agent: specification plus context in, [`DevOutput`] out.

use std::fmt::Write as _;

use crate::domain::models::{DevOutput, ParseMode, PmSpec, PromptLimits, RetrievalContext};
use crate::services::prompt_budget::cap_spec;
use crate::services::response_parser::parse_layered;

const SYSTEM_PROMPT: &str = r#"You are an expert Software Developer responsible for implementing code from a product specification.

Your responsibilities:
1. Write clean, maintainable, documented code
2. Implement every listed requirement
3. Organise the code into a sensible file layout
4. Include the imports and dependencies the code needs

File paths must be relative (no leading "/" and no ".." segments).

Always respond with a single JSON object and nothing else, using this structure:
{
    "implementation_plan": "Brief plan of what you are implementing",
    "files": [
        {
            "path": "relative/path/to/file.py",
            "content": "complete file content",
            "description": "what this file does"
        }
    ],
    "dependencies": ["dependency1"],
    "commands": ["shell command to set up or run the code"],
    "notes": "Anything important about the implementation"
}"#;

/// Turns a specification into source files.
#[derive(Debug, Clone, Default)]
pub struct DeveloperAgent {
    limits: PromptLimits,
}

impl DeveloperAgent {
    pub fn new(limits: PromptLimits) -> Self {
        Self { limits }
    }

    pub fn system_prompt(&self) -> &'static str {
        SYSTEM_PROMPT
    }

    pub fn build_user_prompt(
        &self,
        instruction: &str,
        context: &RetrievalContext,
        spec: Option<&PmSpec>,
    ) -> String {
        let mut prompt = format!("Original User Instruction: {instruction}\n\n");

        match spec {
            Some(spec) => {
                let capped = cap_spec(spec, &self.limits);
                let rendered = serde_json::to_string_pretty(&capped.value).unwrap_or_default();
                let _ = writeln!(prompt, "Product Manager Specification:\n{rendered}");
                if capped.omitted > 0 {
                    let _ = writeln!(
                        prompt,
                        "({} further specification item(s) omitted for length)",
                        capped.omitted
                    );
                }
                prompt.push('\n');
            }
            None => prompt.push_str("No product specification is available.\n\n"),
        }

        if !context.is_empty() {
            prompt.push_str("Relevant Code Examples and Documentation from Knowledge Base:\n");
            prompt.push_str(&context.render());
            prompt.push('\n');
        }

        prompt.push_str(
            "Implement the specification. Produce complete, working files that \
             fulfil every requirement, with proper error handling.",
        );
        prompt
    }

    pub fn parse(&self, raw: &str) -> (DevOutput, ParseMode) {
        parse_layered(raw)
    }
}
