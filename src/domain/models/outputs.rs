//! Structured outputs produced by the three agents.
//!
//! The serde shape of each type is the JSON schema the corresponding
//! agent's system prompt asks the model for, so a well-formed model
//! response deserializes straight into these types.

use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;

/// A component identified by the product manager.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Component {
    #[serde(alias = "component")]
    pub name: String,
    #[serde(default)]
    pub description: String,
}

/// Product manager specification.
///
/// Produced once per workflow run and read-only afterwards.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PmSpec {
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub analysis: String,
    #[serde(default)]
    pub components: Vec<Component>,
    #[serde(default)]
    pub requirements: Vec<String>,
    #[serde(default)]
    pub acceptance_criteria: Vec<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub technical_considerations: Vec<String>,
}

impl PmSpec {
    /// One-line summary used in workflow notes.
    pub fn summary(&self) -> String {
        if self.analysis.trim().is_empty() {
            format!(
                "{} component(s), {} requirement(s)",
                self.components.len(),
                self.requirements.len()
            )
        } else {
            self.analysis.trim().to_string()
        }
    }
}

/// A file proposed by the developer or tester.
///
/// `relative_path` is always interpreted relative to the sandbox root.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GeneratedFile {
    #[serde(rename = "path", alias = "relative_path")]
    pub relative_path: String,
    pub content: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
}

impl GeneratedFile {
    pub fn new(relative_path: impl Into<String>, content: impl Into<String>) -> Self {
        Self {
            relative_path: relative_path.into(),
            content: content.into(),
            description: None,
        }
    }

    #[must_use]
    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    /// Size of the content in bytes.
    pub fn byte_len(&self) -> u64 {
        self.content.len() as u64
    }
}

/// Developer output.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DevOutput {
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub implementation_plan: String,
    #[serde(default)]
    pub files: Vec<GeneratedFile>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub dependencies: Vec<String>,
    #[serde(default, alias = "setup_commands")]
    pub commands: Vec<String>,
    #[serde(default)]
    pub notes: String,
}

impl DevOutput {
    pub fn summary(&self) -> String {
        if !self.notes.trim().is_empty() {
            self.notes.trim().to_string()
        } else if !self.implementation_plan.trim().is_empty() {
            self.implementation_plan.trim().to_string()
        } else {
            format!("{} file(s) proposed", self.files.len())
        }
    }
}

/// An issue raised by the tester's review.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReviewIssue {
    #[serde(default)]
    pub severity: String,
    #[serde(default)]
    pub file: String,
    #[serde(default)]
    pub issue: String,
    #[serde(default)]
    pub suggestion: String,
}

/// Tester output.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TestOutput {
    #[serde(default)]
    pub test_files: Vec<GeneratedFile>,
    #[serde(default, alias = "review_summary")]
    pub review_notes: String,
    #[serde(default, alias = "issues_found", skip_serializing_if = "Vec::is_empty")]
    pub issues: Vec<ReviewIssue>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub recommendations: Vec<String>,
    /// Quality rating in [0, 10]; out-of-range model values are clamped.
    #[serde(default, deserialize_with = "deserialize_score")]
    pub quality_score: Option<f32>,
}

impl TestOutput {
    pub fn summary(&self) -> String {
        const MAX_SUMMARY_CHARS: usize = 300;

        let notes = self.review_notes.trim();
        let mut summary: String = notes.chars().take(MAX_SUMMARY_CHARS).collect();
        if notes.chars().count() > MAX_SUMMARY_CHARS {
            summary.push_str("...");
        }
        match self.quality_score {
            Some(score) if summary.is_empty() => format!("quality {score:.1}/10"),
            Some(score) => format!("{summary} (quality {score:.1}/10)"),
            None if summary.is_empty() => format!("{} test file(s)", self.test_files.len()),
            None => summary,
        }
    }
}

/// Clamp a raw score into [0, 10]. Non-finite values yield `None`.
pub fn clamp_score(raw: f64) -> Option<f32> {
    if raw.is_finite() {
        #[allow(clippy::cast_possible_truncation)]
        Some(raw.clamp(0.0, 10.0) as f32)
    } else {
        None
    }
}

/// Interpret a JSON value as a quality score.
///
/// Accepts numbers and strings with a leading number (`"8"`, `"7.5/10"`,
/// `"9 out of 10"`). Anything else is treated as absent.
pub fn score_from_value(value: &Value) -> Option<f32> {
    let raw = match value {
        Value::Number(n) => n.as_f64()?,
        Value::String(s) => leading_number(s)?,
        _ => return None,
    };
    clamp_score(raw)
}

fn leading_number(s: &str) -> Option<f64> {
    let trimmed = s.trim();
    let end = trimmed
        .char_indices()
        .take_while(|(i, c)| c.is_ascii_digit() || *c == '.' || (*i == 0 && (*c == '-' || *c == '+')))
        .last()
        .map(|(i, c)| i + c.len_utf8())?;
    trimmed[..end].parse().ok()
}

fn deserialize_score<'de, D>(deserializer: D) -> Result<Option<f32>, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Option::<Value>::deserialize(deserializer)?;
    Ok(value.as_ref().and_then(score_from_value))
}
