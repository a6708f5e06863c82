//! Sandbox write results and workspace inventory.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Why a proposed path was refused.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case", tag = "reason", content = "detail")]
pub enum PathRejection {
    Empty,
    Absolute,
    EscapesRoot,
    InvalidCharacters,
    /// A symlink under the root resolves outside it.
    SymlinkEscape(String),
}

impl std::fmt::Display for PathRejection {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Empty => f.write_str("path is empty"),
            Self::Absolute => f.write_str("path is absolute"),
            Self::EscapesRoot => f.write_str("path escapes the sandbox root"),
            Self::InvalidCharacters => f.write_str("path contains invalid characters"),
            Self::SymlinkEscape(target) => {
                write!(f, "path resolves outside the sandbox root via {target}")
            }
        }
    }
}

/// A file that was materialized under the sandbox root.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WrittenFile {
    /// Normalized path relative to the sandbox root.
    pub path: String,
    pub bytes: u64,
}

/// Outcome of a single sandboxed write. Never raised as an error.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum WriteResult {
    Written {
        path: String,
        absolute_path: PathBuf,
        bytes: u64,
    },
    PathRejected {
        path: String,
        reason: PathRejection,
    },
    Failed {
        path: String,
        error: String,
    },
}

impl WriteResult {
    /// The path as proposed (or normalized, for successful writes).
    pub fn path(&self) -> &str {
        match self {
            Self::Written { path, .. } | Self::PathRejected { path, .. } | Self::Failed { path, .. } => {
                path
            }
        }
    }

    pub fn is_written(&self) -> bool {
        matches!(self, Self::Written { .. })
    }

    pub fn is_rejected(&self) -> bool {
        matches!(self, Self::PathRejected { .. })
    }

    pub fn written_file(&self) -> Option<WrittenFile> {
        match self {
            Self::Written { path, bytes, .. } => Some(WrittenFile {
                path: path.clone(),
                bytes: *bytes,
            }),
            _ => None,
        }
    }
}

/// One file found under the sandbox root.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InventoryEntry {
    pub path: String,
    pub size: u64,
    pub modified: Option<DateTime<Utc>>,
}

/// Snapshot of the sandbox root.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct WorkspaceInventory {
    pub exists: bool,
    pub workspace_path: PathBuf,
    pub files: Vec<InventoryEntry>,
    pub total_files: usize,
    pub total_size: u64,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_write_result_accessors() {
        let written = WriteResult::Written {
            path: "app/main.py".into(),
            absolute_path: PathBuf::from("/ws/app/main.py"),
            bytes: 12,
        };
        assert!(written.is_written());
        assert_eq!(
            written.written_file(),
            Some(WrittenFile {
                path: "app/main.py".into(),
                bytes: 12
            })
        );

        let rejected = WriteResult::PathRejected {
            path: "../x".into(),
            reason: PathRejection::EscapesRoot,
        };
        assert!(rejected.is_rejected());
        assert_eq!(rejected.path(), "../x");
        assert!(rejected.written_file().is_none());
    }

    #[test]
    fn test_write_result_serialization_is_tagged() {
        let rejected = WriteResult::PathRejected {
            path: "/etc/passwd".into(),
            reason: PathRejection::Absolute,
        };
        let value = serde_json::to_value(&rejected).unwrap();
        assert_eq!(value["status"], "path_rejected");
        assert_eq!(value["reason"]["reason"], "absolute");
    }
}
