//! Table output formatting for CLI commands
//!
//! Formats workflow reports, write results, sources and the workspace
//! inventory with comfy-table.

use comfy_table::{presets, Attribute, Cell, Color, ContentArrangement, Table};
use std::env;

use super::truncate;
use crate::domain::models::{
    AgentRole, CandidateFile, ParseMode, WorkflowResult, WorkspaceInventory, WriteResult,
};
use crate::services::AnswerSource;

/// Table formatter for CLI output
pub struct TableFormatter {
    /// Whether to use colors in output
    use_colors: bool,
}

impl TableFormatter {
    pub fn new() -> Self {
        Self {
            use_colors: supports_color(),
        }
    }

    pub fn with_colors(use_colors: bool) -> Self {
        Self { use_colors }
    }

    /// One row per agent that produced output.
    pub fn format_agents(&self, result: &WorkflowResult) -> String {
        let mut table = self.create_base_table(&["Agent", "Parse", "Time", "Summary"]);

        let rows = [
            result
                .product_manager
                .as_ref()
                .map(|r| (AgentRole::ProductManager, r.parse_mode, r.duration_ms, r.output.summary())),
            result
                .developer
                .as_ref()
                .map(|r| (AgentRole::Developer, r.parse_mode, r.duration_ms, r.output.summary())),
            result
                .tester
                .as_ref()
                .map(|r| (AgentRole::Tester, r.parse_mode, r.duration_ms, r.output.summary())),
        ];

        for (role, mode, duration_ms, summary) in rows.into_iter().flatten() {
            table.add_row(vec![
                Cell::new(role.title()),
                self.parse_mode_cell(mode),
                Cell::new(format!("{:.1}s", duration_ms as f64 / 1000.0)),
                Cell::new(truncate(&summary, 80)),
            ]);
        }
        table.to_string()
    }

    /// Candidate files with their write outcome. Write results are in
    /// candidate order; a missing result means the run was a preview.
    pub fn format_files(&self, candidates: &[CandidateFile], writes: &[WriteResult]) -> String {
        let mut table = self.create_base_table(&["Path", "Bytes", "From", "Status"]);

        for (i, candidate) in candidates.iter().enumerate() {
            table.add_row(vec![
                Cell::new(&candidate.path),
                Cell::new(candidate.bytes),
                Cell::new(candidate.origin.title()),
                self.write_status_cell(writes.get(i)),
            ]);
        }
        table.to_string()
    }

    pub fn format_sources(&self, sources: &[AnswerSource]) -> String {
        let mut table = self.create_base_table(&["#", "Source", "Score", "Preview"]);
        for (i, source) in sources.iter().enumerate() {
            table.add_row(vec![
                Cell::new(format!("[{}]", i + 1)),
                Cell::new(&source.source_id),
                Cell::new(format!("{:.3}", source.score)),
                Cell::new(truncate(&source.preview.replace('\n', " "), 60)),
            ]);
        }
        table.to_string()
    }

    pub fn format_inventory(&self, inventory: &WorkspaceInventory) -> String {
        let mut table = self.create_base_table(&["Path", "Size", "Modified"]);
        for entry in &inventory.files {
            table.add_row(vec![
                Cell::new(&entry.path),
                Cell::new(entry.size),
                Cell::new(
                    entry
                        .modified
                        .map_or_else(|| "-".to_string(), |m| m.format("%Y-%m-%d %H:%M:%S").to_string()),
                ),
            ]);
        }
        table.to_string()
    }

    fn parse_mode_cell(&self, mode: ParseMode) -> Cell {
        let cell = Cell::new(mode.as_str());
        if !self.use_colors {
            return cell;
        }
        match mode {
            ParseMode::Strict => cell.fg(Color::Green),
            ParseMode::Extracted => cell.fg(Color::Cyan),
            ParseMode::Fallback => cell.fg(Color::Yellow),
        }
    }

    fn write_status_cell(&self, write: Option<&WriteResult>) -> Cell {
        let (text, color) = match write {
            None => ("preview".to_string(), Color::Grey),
            Some(WriteResult::Written { .. }) => ("written".to_string(), Color::Green),
            Some(WriteResult::PathRejected { reason, .. }) => (format!("rejected: {reason}"), Color::Red),
            Some(WriteResult::Failed { error, .. }) => (format!("failed: {}", truncate(error, 40)), Color::Red),
        };
        if self.use_colors {
            Cell::new(text).fg(color)
        } else {
            Cell::new(text)
        }
    }

    fn create_base_table(&self, headers: &[&str]) -> Table {
        let mut table = Table::new();
        table
            .load_preset(presets::UTF8_FULL)
            .set_content_arrangement(ContentArrangement::Dynamic)
            .set_header(headers.iter().map(|h| Cell::new(h).add_attribute(Attribute::Bold)));
        if !self.use_colors {
            table.force_no_tty();
        }
        table
    }
}

impl Default for TableFormatter {
    fn default() -> Self {
        Self::new()
    }
}

/// Check if color output is supported
fn supports_color() -> bool {
    if env::var("NO_COLOR").is_ok() {
        return false;
    }
    if let Ok(term) = env::var("TERM") {
        if term == "dumb" {
            return false;
        }
    }
    true
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::models::PathRejection;
    use std::path::PathBuf;

    #[test]
    fn test_format_files_marks_outcomes() {
        let candidates = vec![
            CandidateFile {
                path: "app/main.py".to_string(),
                bytes: 12,
                origin: AgentRole::Developer,
            },
            CandidateFile {
                path: "../../etc/passwd".to_string(),
                bytes: 4,
                origin: AgentRole::Developer,
            },
            CandidateFile {
                path: "README.md".to_string(),
                bytes: 3,
                origin: AgentRole::Tester,
            },
        ];
        let writes = vec![
            WriteResult::Written {
                path: "app/main.py".to_string(),
                absolute_path: PathBuf::from("/tmp/app/main.py"),
                bytes: 12,
            },
            WriteResult::PathRejected {
                path: "../../etc/passwd".to_string(),
                reason: PathRejection::EscapesRoot,
            },
        ];

        let rendered = TableFormatter::with_colors(false).format_files(&candidates, &writes);
        assert!(rendered.contains("written"));
        assert!(rendered.contains("preview"));
        assert!(rendered.contains("../../etc/passwd"));
        assert!(rendered.contains("rejected: path escapes the sandbox root"));
    }

    #[test]
    fn test_format_sources() {
        let sources = vec![AnswerSource {
            source_id: "docs/a.md".to_string(),
            score: 0.5,
            preview: "line one\nline two".to_string(),
        }];
        let rendered = TableFormatter::with_colors(false).format_sources(&sources);
        assert!(rendered.contains("[1]"));
        assert!(rendered.contains("0.500"));
        assert!(rendered.contains("line one line two"));
    }
}
