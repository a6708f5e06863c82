//! Sandboxed, atomic file writes under a single workspace root.
//!
//! Every proposed path is normalized lexically first (`.` and `..` resolved,
//! backslashes treated as separators). Absolute paths and paths that climb
//! above the root are rejected before the filesystem is touched. Accepted
//! paths are then checked against symlinks already present under the root.
//!
//! Writes go to a temporary file in the target's directory and are renamed
//! into place, so the target only ever holds the old or the new content.

use std::fs::{self, File};
use std::io::Write;
use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::domain::models::{InventoryEntry, PathRejection, WorkspaceInventory, WriteResult};

/// Writes generated files into a sandbox root.
#[derive(Debug, Clone)]
pub struct WorkspaceWriter {
    root: PathBuf,
}

/// A write whose content is on disk in a temporary file but not yet
/// visible at the target path.
#[derive(Debug)]
pub struct StagedWrite {
    normalized: String,
    temp_path: PathBuf,
    target: PathBuf,
    bytes: u64,
}

impl StagedWrite {
    pub fn temp_path(&self) -> &Path {
        &self.temp_path
    }

    pub fn target(&self) -> &Path {
        &self.target
    }

    /// Publish the staged content at the target path.
    pub fn commit(self) -> WriteResult {
        match fs::rename(&self.temp_path, &self.target) {
            Ok(()) => {
                info!(path = %self.normalized, bytes = self.bytes, "File written");
                WriteResult::Written {
                    path: self.normalized,
                    absolute_path: self.target,
                    bytes: self.bytes,
                }
            }
            Err(e) => {
                let _ = fs::remove_file(&self.temp_path);
                warn!(path = %self.normalized, error = %e, "Rename into place failed");
                WriteResult::Failed {
                    path: self.normalized,
                    error: e.to_string(),
                }
            }
        }
    }

    /// Discard the staged content.
    pub fn abort(self) {
        let _ = fs::remove_file(&self.temp_path);
    }
}

impl WorkspaceWriter {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Write `content` at `relative_path` under this writer's root.
    pub fn write(&self, relative_path: &str, content: &str) -> WriteResult {
        Self::write_file(&self.root, relative_path, content)
    }

    /// Write `content` at `relative_path` under `root`.
    ///
    /// Never panics and never returns an error: rejections and I/O failures
    /// are reported in the [`WriteResult`].
    pub fn write_file(root: &Path, relative_path: &str, content: &str) -> WriteResult {
        match Self::new(root).stage(relative_path, content) {
            Ok(staged) => staged.commit(),
            Err(result) => result,
        }
    }

    /// Validate the path and write the content to a temporary file next to
    /// the target, without publishing it.
    pub fn stage(&self, relative_path: &str, content: &str) -> Result<StagedWrite, WriteResult> {
        let (normalized, target) = self.resolve(relative_path).map_err(|reason| {
            warn!(path = relative_path, %reason, "Rejected workspace path");
            WriteResult::PathRejected {
                path: relative_path.to_string(),
                reason,
            }
        })?;

        let failed = |error: std::io::Error| WriteResult::Failed {
            path: normalized.clone(),
            error: error.to_string(),
        };

        let parent = target.parent().unwrap_or(self.root.as_path());
        fs::create_dir_all(parent).map_err(failed)?;

        let file_name = target
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default();
        let temp_path = parent.join(format!(".{file_name}.{}.tmp", Uuid::new_v4()));

        let written = File::create(&temp_path).and_then(|mut file| {
            file.write_all(content.as_bytes())?;
            file.sync_all()
        });
        if let Err(e) = written {
            let _ = fs::remove_file(&temp_path);
            return Err(failed(e));
        }

        debug!(path = %normalized, temp = %temp_path.display(), "Staged write");
        Ok(StagedWrite {
            normalized,
            temp_path,
            target,
            bytes: content.len() as u64,
        })
    }

    /// Normalize `relative_path` and map it to an absolute target under the
    /// root, following any symlinks that already exist on the way.
    pub fn resolve(&self, relative_path: &str) -> Result<(String, PathBuf), PathRejection> {
        let normalized = normalize_relative(relative_path)?;
        let target = self.root.join(&normalized);
        self.check_symlinks(&target)?;
        Ok((normalized, target))
    }

    /// Reject targets whose deepest existing ancestor resolves outside the
    /// root. A missing root has nothing to follow.
    fn check_symlinks(&self, target: &Path) -> Result<(), PathRejection> {
        let Ok(canonical_root) = self.root.canonicalize() else {
            return Ok(());
        };

        let existing = target
            .ancestors()
            .take_while(|p| p.starts_with(&self.root))
            .find(|p| fs::symlink_metadata(p).is_ok());

        let Some(existing) = existing else {
            return Ok(());
        };

        match existing.canonicalize() {
            Ok(resolved) if resolved.starts_with(&canonical_root) => Ok(()),
            Ok(resolved) => Err(PathRejection::SymlinkEscape(resolved.display().to_string())),
            // Dangling link.
            Err(_) => Err(PathRejection::SymlinkEscape(existing.display().to_string())),
        }
    }

    /// List every regular file under the root.
    pub fn inventory(&self) -> WorkspaceInventory {
        if !self.root.is_dir() {
            return WorkspaceInventory {
                exists: false,
                workspace_path: self.root.clone(),
                ..WorkspaceInventory::default()
            };
        }

        let mut files = Vec::new();
        collect_files(&self.root, &self.root, &mut files);
        files.sort_by(|a, b| a.path.cmp(&b.path));

        WorkspaceInventory {
            exists: true,
            workspace_path: self.root.clone(),
            total_files: files.len(),
            total_size: files.iter().map(|f| f.size).sum(),
            files,
        }
    }
}

/// Lexically normalize a proposed relative path.
///
/// Returns the `/`-joined path, or why it was refused.
pub fn normalize_relative(path: &str) -> Result<String, PathRejection> {
    if path.trim().is_empty() {
        return Err(PathRejection::Empty);
    }
    if path.contains('\0') {
        return Err(PathRejection::InvalidCharacters);
    }

    let unified = path.replace('\\', "/");
    if unified.starts_with('/') || has_drive_prefix(&unified) {
        return Err(PathRejection::Absolute);
    }

    let mut parts: Vec<&str> = Vec::new();
    for segment in unified.split('/') {
        match segment {
            "" | "." => {}
            ".." => {
                if parts.pop().is_none() {
                    return Err(PathRejection::EscapesRoot);
                }
            }
            other => parts.push(other),
        }
    }

    if parts.is_empty() {
        return Err(PathRejection::Empty);
    }
    Ok(parts.join("/"))
}

fn has_drive_prefix(path: &str) -> bool {
    let bytes = path.as_bytes();
    bytes.len() >= 2 && bytes[0].is_ascii_alphabetic() && bytes[1] == b':'
}

fn is_leftover_temp(name: &str) -> bool {
    name.starts_with('.') && name.ends_with(".tmp")
}

fn collect_files(root: &Path, dir: &Path, out: &mut Vec<InventoryEntry>) {
    let Ok(entries) = fs::read_dir(dir) else {
        return;
    };

    for entry in entries.flatten() {
        let path = entry.path();
        let Ok(meta) = fs::symlink_metadata(&path) else {
            continue;
        };

        if meta.is_dir() {
            collect_files(root, &path, out);
        } else if meta.is_file() && !is_leftover_temp(&entry.file_name().to_string_lossy()) {
            let relative = path
                .strip_prefix(root)
                .unwrap_or(&path)
                .to_string_lossy()
                .replace('\\', "/");
            out.push(InventoryEntry {
                path: relative,
                size: meta.len(),
                modified: meta.modified().ok().map(DateTime::<Utc>::from),
            });
        }
    }
}
