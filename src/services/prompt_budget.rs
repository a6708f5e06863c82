//! Prompt budgeting for upstream outputs.
//!
//! Later agents see earlier agents' structured output embedded in their
//! prompt. These helpers cap list lengths and file bodies so a verbose
//! upstream response cannot blow up the next prompt. Counting is in chars,
//! and cuts never split a UTF-8 sequence.

use crate::domain::models::{DevOutput, GeneratedFile, PmSpec, PromptLimits};

/// Marker appended to text cut by [`truncate_chars`].
pub const TRUNCATION_MARKER: &str = "\n[... truncated ...]";

/// A capped copy of some upstream value plus what was left out.
#[derive(Debug, Clone, PartialEq)]
pub struct Capped<T> {
    pub value: T,
    /// Items removed from lists to respect the limits.
    pub omitted: usize,
}

/// Keep at most `max_chars` characters of `text`, cutting at the last
/// newline inside the window when there is one.
pub fn truncate_chars(text: &str, max_chars: usize) -> String {
    let Some((cut, _)) = text.char_indices().nth(max_chars) else {
        return text.to_string();
    };

    let window = &text[..cut];
    let end = match window.rfind('\n') {
        Some(nl) if nl > 0 => nl,
        _ => cut,
    };
    format!("{}{}", &text[..end], TRUNCATION_MARKER)
}

/// Keep the first `max` items, returning how many were dropped.
pub fn cap_list<T: Clone>(items: &[T], max: usize) -> (Vec<T>, usize) {
    let kept = items.iter().take(max).cloned().collect::<Vec<_>>();
    let omitted = items.len().saturating_sub(kept.len());
    (kept, omitted)
}

/// Cap a product manager spec before embedding it into a prompt.
pub fn cap_spec(spec: &PmSpec, limits: &PromptLimits) -> Capped<PmSpec> {
    let (components, c) = cap_list(&spec.components, limits.max_components);
    let (requirements, r) = cap_list(&spec.requirements, limits.max_requirements);
    let (acceptance_criteria, a) =
        cap_list(&spec.acceptance_criteria, limits.max_acceptance_criteria);

    Capped {
        value: PmSpec {
            analysis: spec.analysis.clone(),
            components,
            requirements,
            acceptance_criteria,
            technical_considerations: spec.technical_considerations.clone(),
        },
        omitted: c + r + a,
    }
}

/// Cap the developer's files: at most `max_files`, each body cut to
/// `max_file_chars`.
pub fn cap_files(files: &[GeneratedFile], limits: &PromptLimits) -> Capped<Vec<GeneratedFile>> {
    let (kept, omitted) = cap_list(files, limits.max_files);
    let value = kept
        .into_iter()
        .map(|mut f| {
            f.content = truncate_chars(&f.content, limits.max_file_chars);
            f
        })
        .collect();
    Capped { value, omitted }
}

/// Cap a developer output for the tester's prompt.
pub fn cap_dev_output(dev: &DevOutput, limits: &PromptLimits) -> Capped<DevOutput> {
    let files = cap_files(&dev.files, limits);
    Capped {
        value: DevOutput {
            files: files.value,
            ..dev.clone()
        },
        omitted: files.omitted,
    }
}
