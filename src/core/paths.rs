//! Path helpers for the planning directory layout.

use std::path::{Component, Path, PathBuf};

use crate::workflow::{WorkflowError, WorkflowResult};

/// Roadmap document filename.
pub const ROADMAP_FILE: &str = "ROADMAP.md";

/// State document filename.
pub const STATE_FILE: &str = "STATE.md";

/// Requirements document filename.
pub const REQUIREMENTS_FILE: &str = "REQUIREMENTS.md";

/// Active milestone document filename.
pub const MILESTONE_FILE: &str = "MILESTONE.md";

/// Directory holding one subdirectory per phase.
pub const PHASES_DIR: &str = "phases";

/// Directory holding milestone archives.
pub const MILESTONES_DIR: &str = "milestones";

/// Append-only archive log inside [`MILESTONES_DIR`].
pub const MILESTONES_LOG: &str = "MILESTONES.md";

/// Join `segment` onto `base`, refusing results that escape `base`.
///
/// The check is lexical: `..` components are resolved without touching the
/// filesystem, so it also works for paths that don't exist yet.
pub fn safe_join(base: &Path, segment: impl AsRef<Path>) -> WorkflowResult<PathBuf> {
    let segment = segment.as_ref();
    let mut depth: usize = 0;

    for component in segment.components() {
        match component {
            Component::Normal(_) => depth += 1,
            Component::CurDir => {}
            Component::ParentDir => {
                if depth == 0 {
                    return Err(WorkflowError::PathTraversal(segment.to_path_buf()));
                }
                depth -= 1;
            }
            Component::RootDir | Component::Prefix(_) => {
                return Err(WorkflowError::PathTraversal(segment.to_path_buf()));
            }
        }
    }

    Ok(base.join(segment))
}

/// Reduce a directory entry name to its final component.
pub fn sanitize_entry(entry: &str) -> &str {
    Path::new(entry).file_name().and_then(|n| n.to_str()).unwrap_or("")
}

/// List the names of regular entries in `dir`, sorted. Missing dirs yield nothing.
pub fn list_entries(dir: &Path) -> Vec<String> {
    let mut names: Vec<String> = match std::fs::read_dir(dir) {
        Ok(entries) => entries
            .filter_map(Result::ok)
            .filter_map(|e| e.file_name().to_str().map(|s| sanitize_entry(s).to_string()))
            .filter(|s| !s.is_empty())
            .collect(),
        Err(_) => Vec::new(),
    };
    names.sort();
    names
}
