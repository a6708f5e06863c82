//! Layered parsing of model responses.
//!
//! Model output is not guaranteed to be well-formed JSON. Each layer here
//! is a pure function from raw text to an optional structured value; they
//! are tried left to right and the first success wins:
//!
//! 1. [`parse_strict`]: the whole response is JSON matching the schema.
//! 2. [`parse_extracted`]: the first balanced `{...}` / `[...]` span
//!    inside the response that matches the schema.
//! 3. [`ResponseSchema::heuristic`]: a role-specific recovery that always
//!    produces a value.
//!
//! A JSON object only matches a schema when it carries at least one of the
//! schema's keys; missing keys then read as empty. Parsing therefore never
//! fails, and [`parse_layered`] reports which layer produced the value.

use serde::de::DeserializeOwned;
use serde::Deserialize;
use serde_json::{Map, Value};

use crate::domain::models::{Component, DevOutput, GeneratedFile, ParseMode, PmSpec, TestOutput};

/// A structured agent output that can be recovered from model text.
pub trait ResponseSchema: Sized {
    /// Top-level keys (including aliases) that identify this schema.
    const SCHEMA_KEYS: &'static [&'static str];

    /// Interpret an already-parsed JSON value, `None` if it does not match.
    fn from_json(value: Value) -> Option<Self>;

    /// Best-effort recovery from unstructured text. Never fails.
    fn heuristic(raw: &str) -> Self;
}

/// Layer 1: the trimmed response is exactly one JSON document.
pub fn parse_strict<T: ResponseSchema>(raw: &str) -> Option<T> {
    let value = serde_json::from_str::<Value>(raw.trim()).ok()?;
    T::from_json(value)
}

/// Layer 2: try each balanced JSON-looking span, in order of appearance.
pub fn parse_extracted<T: ResponseSchema>(raw: &str) -> Option<T> {
    balanced_spans(raw).find_map(|span| {
        serde_json::from_str::<Value>(span)
            .ok()
            .and_then(T::from_json)
    })
}

/// Run all layers and report which one succeeded.
pub fn parse_layered<T: ResponseSchema>(raw: &str) -> (T, ParseMode) {
    if let Some(value) = parse_strict(raw) {
        return (value, ParseMode::Strict);
    }
    if let Some(value) = parse_extracted(raw) {
        return (value, ParseMode::Extracted);
    }
    (T::heuristic(raw), ParseMode::Fallback)
}

/// Iterate balanced bracket spans in order of their opening bracket.
///
/// Brackets inside double-quoted strings (with backslash escapes) are
/// ignored. An opener whose span is unbalanced is skipped and scanning
/// resumes at the next opener.
pub fn balanced_spans(text: &str) -> impl Iterator<Item = &str> {
    let mut pos = 0;
    std::iter::from_fn(move || {
        while let Some(offset) = text[pos..].find(['{', '[']) {
            let start = pos + offset;
            if let Some(end) = span_end(text, start) {
                pos = end;
                return Some(&text[start..end]);
            }
            pos = start + 1;
        }
        pos = text.len();
        None
    })
}

/// Byte offset one past the bracket closing the one at `start`.
fn span_end(text: &str, start: usize) -> Option<usize> {
    let mut expected: Vec<char> = Vec::new();
    let mut in_string = false;
    let mut escaped = false;

    for (i, c) in text[start..].char_indices() {
        if in_string {
            if escaped {
                escaped = false;
            } else if c == '\\' {
                escaped = true;
            } else if c == '"' {
                in_string = false;
            }
            continue;
        }

        match c {
            '"' => in_string = true,
            '{' => expected.push('}'),
            '[' => expected.push(']'),
            '}' | ']' => {
                if expected.pop() != Some(c) {
                    return None;
                }
                if expected.is_empty() {
                    return Some(start + i + c.len_utf8());
                }
            }
            _ => {}
        }
    }
    None
}

fn from_value<T: DeserializeOwned>(value: Value) -> Option<T> {
    serde_json::from_value(value).ok()
}

fn has_schema_key<T: ResponseSchema>(map: &Map<String, Value>) -> bool {
    T::SCHEMA_KEYS.iter().any(|key| map.contains_key(*key))
}

/// Deserialize `map` as `T` if it carries at least one of `T`'s keys.
fn object_as<T: ResponseSchema + DeserializeOwned>(map: Map<String, Value>) -> Option<T> {
    if has_schema_key::<T>(&map) {
        from_value(Value::Object(map))
    } else {
        None
    }
}

/// A non-empty JSON list of files.
fn file_list(value: Value) -> Option<Vec<GeneratedFile>> {
    from_value::<Vec<GeneratedFile>>(value).filter(|files| !files.is_empty())
}

/// Spec shape that groups requirements per component.
#[derive(Deserialize)]
struct SectionedSpec {
    #[serde(default)]
    analysis: String,
    specifications: Vec<SpecSection>,
    #[serde(default)]
    technical_considerations: Vec<String>,
}

#[derive(Deserialize)]
struct SpecSection {
    #[serde(alias = "name")]
    component: String,
    #[serde(default)]
    description: String,
    #[serde(default)]
    requirements: Vec<String>,
    #[serde(default)]
    acceptance_criteria: Vec<String>,
}

impl From<SectionedSpec> for PmSpec {
    fn from(sectioned: SectionedSpec) -> Self {
        let mut spec = Self {
            analysis: sectioned.analysis,
            technical_considerations: sectioned.technical_considerations,
            ..Self::default()
        };
        for section in sectioned.specifications {
            spec.components.push(Component {
                name: section.component,
                description: section.description,
            });
            spec.requirements.extend(section.requirements);
            spec.acceptance_criteria.extend(section.acceptance_criteria);
        }
        spec
    }
}

impl ResponseSchema for PmSpec {
    const SCHEMA_KEYS: &'static [&'static str] = &[
        "components",
        "requirements",
        "acceptance_criteria",
        "analysis",
        "technical_considerations",
    ];

    fn from_json(value: Value) -> Option<Self> {
        let Value::Object(map) = value else {
            return None;
        };
        if map.contains_key("specifications") && !map.contains_key("components") {
            if let Some(sectioned) = from_value::<SectionedSpec>(Value::Object(map.clone())) {
                return Some(sectioned.into());
            }
        }
        object_as(map)
    }

    fn heuristic(raw: &str) -> Self {
        let requirements = raw
            .lines()
            .map(strip_list_marker)
            .filter(|line| !line.is_empty())
            .map(ToString::to_string)
            .collect();

        Self {
            requirements,
            ..Self::default()
        }
    }
}

impl ResponseSchema for DevOutput {
    const SCHEMA_KEYS: &'static [&'static str] = &[
        "files",
        "implementation_plan",
        "dependencies",
        "commands",
        "setup_commands",
        "notes",
    ];

    fn from_json(value: Value) -> Option<Self> {
        match value {
            Value::Object(map) => object_as(map),
            Value::Array(_) => file_list(value).map(|files| Self {
                files,
                ..Self::default()
            }),
            _ => None,
        }
    }

    fn heuristic(raw: &str) -> Self {
        let files = fenced_blocks(raw)
            .into_iter()
            .enumerate()
            .map(|(i, block)| {
                let path = format!("file_{}.{}", i + 1, extension_for(&block.language));
                GeneratedFile::new(path, block.body)
                    .with_description(format!("Recovered {} code block", block.language))
            })
            .collect();

        Self {
            files,
            ..Self::default()
        }
    }
}

impl ResponseSchema for TestOutput {
    const SCHEMA_KEYS: &'static [&'static str] = &[
        "test_files",
        "review_notes",
        "review_summary",
        "issues",
        "issues_found",
        "recommendations",
        "quality_score",
    ];

    fn from_json(value: Value) -> Option<Self> {
        match value {
            Value::Object(map) => object_as(map),
            Value::Array(_) => file_list(value).map(|test_files| Self {
                test_files,
                ..Self::default()
            }),
            _ => None,
        }
    }

    fn heuristic(raw: &str) -> Self {
        Self {
            review_notes: raw.to_string(),
            ..Self::default()
        }
    }
}

/// Trim a line and drop a leading bullet or `1.` / `1)` marker.
fn strip_list_marker(line: &str) -> &str {
    let line = line.trim();
    if let Some(rest) = line
        .strip_prefix("- ")
        .or_else(|| line.strip_prefix("* "))
        .or_else(|| line.strip_prefix("• "))
    {
        return rest.trim();
    }

    let digits = line.chars().take_while(char::is_ascii_digit).count();
    if digits > 0 {
        let rest = &line[digits..];
        if let Some(rest) = rest.strip_prefix(". ").or_else(|| rest.strip_prefix(") ")) {
            return rest.trim();
        }
    }
    line
}

/// A language-tagged fenced code block.
#[derive(Debug, Clone, PartialEq, Eq)]
struct FencedBlock {
    language: String,
    body: String,
}

/// Collect language-tagged fenced blocks. Untagged fences are skipped but
/// still consumed so their closing fence is not mistaken for an opener.
/// A block left open at the end of the text runs to the end.
fn fenced_blocks(raw: &str) -> Vec<FencedBlock> {
    let mut blocks = Vec::new();
    let mut current: Option<(String, Vec<&str>)> = None;

    for line in raw.lines() {
        let trimmed = line.trim_start();
        match current.take() {
            None => {
                if let Some(tag) = trimmed.strip_prefix("```") {
                    let language = tag
                        .split_whitespace()
                        .next()
                        .unwrap_or_default()
                        .to_ascii_lowercase();
                    current = Some((language, Vec::new()));
                }
            }
            Some((language, mut body)) => {
                if trimmed.starts_with("```") {
                    if !language.is_empty() {
                        blocks.push(finish_block(language, &body));
                    }
                } else {
                    body.push(line);
                    current = Some((language, body));
                }
            }
        }
    }

    if let Some((language, body)) = current {
        if !language.is_empty() {
            blocks.push(finish_block(language, &body));
        }
    }
    blocks
}

fn finish_block(language: String, body: &[&str]) -> FencedBlock {
    let mut text = body.join("\n");
    text.push('\n');
    FencedBlock { language, body: text }
}

/// File extension for a fence language tag.
fn extension_for(language: &str) -> &'static str {
    match language {
        "python" | "py" => "py",
        "bash" | "sh" | "shell" | "zsh" => "sh",
        "javascript" | "js" => "js",
        "typescript" | "ts" => "ts",
        "rust" | "rs" => "rs",
        "go" | "golang" => "go",
        "java" => "java",
        "html" => "html",
        "css" => "css",
        "json" => "json",
        "yaml" | "yml" => "yaml",
        "toml" => "toml",
        "sql" => "sql",
        "markdown" | "md" => "md",
        _ => "txt",
    }
}
