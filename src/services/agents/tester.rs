//! Tester agent: specification and code in, [`TestOutput`] out.

use std::fmt::Write as _;

use crate::domain::models::{DevOutput, ParseMode, PmSpec, PromptLimits, TestOutput};
use crate::services::prompt_budget::{cap_dev_output, cap_spec};
use crate::services::response_parser::parse_layered;

const SYSTEM_PROMPT: &str = r#"You are an expert Quality Assurance Tester responsible for reviewing generated code and writing tests for it.

Your responsibilities:
1. Review the code for bugs, security issues and poor practice
2. Write practical, executable tests for the functionality
3. Check the code against the original requirements
4. Suggest concrete improvements

Test file paths must be relative (no leading "/" and no ".." segments).

Always respond with a single JSON object and nothing else, using this structure:
{
    "review_notes": "Overall assessment of the code",
    "issues": [
        {"severity": "high|medium|low", "file": "filename", "issue": "description", "suggestion": "fix"}
    ],
    "test_files": [
        {"path": "tests/test_file.py", "content": "test file content", "description": "what it covers"}
    ],
    "recommendations": ["recommendation 1"],
    "quality_score": 7.5
}

quality_score is a number from 0 to 10."#;

/// Reviews generated code and proposes tests.
#[derive(Debug, Clone, Default)]
pub struct TesterAgent {
    limits: PromptLimits,
}

impl TesterAgent {
    pub fn new(limits: PromptLimits) -> Self {
        Self { limits }
    }

    pub fn system_prompt(&self) -> &'static str {
        SYSTEM_PROMPT
    }

    pub fn build_user_prompt(
        &self,
        instruction: &str,
        spec: Option<&PmSpec>,
        code: Option<&DevOutput>,
    ) -> String {
        let mut prompt = format!("Original User Instruction: {instruction}\n\n");

        if let Some(spec) = spec {
            let capped = cap_spec(spec, &self.limits);
            let rendered = serde_json::to_string_pretty(&capped.value).unwrap_or_default();
            let _ = writeln!(prompt, "Product Manager Specification:\n{rendered}\n");
        }

        prompt.push_str("Generated Code to Review:\n");
        match code {
            Some(dev) => {
                let capped = cap_dev_output(dev, &self.limits);
                for file in &capped.value.files {
                    let _ = writeln!(prompt, "\nFile: {}", file.relative_path);
                    let _ = writeln!(
                        prompt,
                        "Description: {}",
                        file.description.as_deref().unwrap_or("No description")
                    );
                    let _ = writeln!(prompt, "Content:\n{}", file.content);
                    let _ = writeln!(prompt, "{}", "=".repeat(50));
                }
                if capped.omitted > 0 {
                    let _ = writeln!(prompt, "({} more file(s) not shown)", capped.omitted);
                }
                let _ = writeln!(prompt, "\nDependencies: {:?}", dev.dependencies);
                let _ = writeln!(prompt, "Commands: {:?}", dev.commands);
                if !dev.notes.trim().is_empty() {
                    let _ = writeln!(prompt, "Implementation Notes: {}", dev.notes.trim());
                }
            }
            None => prompt.push_str("(no code was produced)\n"),
        }

        prompt.push_str(
            "\nReview the code and write tests. Focus on correctness, security, \
             edge cases and coverage of the original requirements.",
        );
        prompt
    }

    pub fn parse(&self, raw: &str) -> (TestOutput, ParseMode) {
        parse_layered(raw)
    }
}
