//! Pausing and resuming work through git stashes.
//!
//! Both operations always produce a [`StashResult`]; git failures become
//! unsuccessful results rather than errors.

use once_cell::sync::Lazy;
use regex::Regex;
use serde::Serialize;

use crate::git::GitRepository;

static STASH_REF_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"^stash@\{\d+\}$").unwrap());

/// Default tag for pause stash messages.
pub const DEFAULT_STASH_TAG: &str = "mz";

/// Outcome of a stash operation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct StashResult {
    /// Whether the operation did what was asked
    pub success: bool,

    /// Stash created by a pause, or the ref left in place by a failed resume
    pub stash_ref: Option<String>,

    /// Human-readable summary
    pub message: String,

    /// Whether a resume stopped on merge conflicts
    pub conflict: bool,
}

impl StashResult {
    fn ok(stash_ref: Option<String>, message: impl Into<String>) -> Self {
        Self { success: true, stash_ref, message: message.into(), conflict: false }
    }

    fn failed(stash_ref: Option<String>, message: impl Into<String>) -> Self {
        Self { success: false, stash_ref, message: message.into(), conflict: false }
    }
}

/// Stash all local changes under `{tag}:pause -- {description}`.
pub fn stash_pause(git: &GitRepository<'_>, tag: &str, description: &str) -> StashResult {
    let attempt = || -> Result<StashResult, crate::core::CommandError> {
        let changed = git.status_porcelain()?;
        if changed.is_empty() {
            return Ok(StashResult::ok(None, "No modified files to stash"));
        }

        let before = git.stash_list()?.len();
        git.stash_push(&format!("{tag}:pause -- {description}"))?;
        let after = git.stash_list()?.len();

        if after <= before {
            return Ok(StashResult::ok(None, "No changes stashed (all files committed)"));
        }

        let stash_ref = git.newest_stash_ref()?;
        Ok(StashResult::ok(stash_ref, format!("Stashed {} file(s)", changed.len())))
    };

    attempt().unwrap_or_else(|e| {
        tracing::warn!(error = %e, "Stash pause failed");
        StashResult::failed(None, format!("Stash failed: {e}"))
    })
}

/// Restore a stash created by [`stash_pause`].
pub fn stash_resume(git: &GitRepository<'_>, stash_ref: &str) -> StashResult {
    let keep = || Some(stash_ref.to_string());

    if !STASH_REF_RE.is_match(stash_ref) {
        return StashResult::failed(keep(), format!("Invalid stash ref format: {stash_ref}"));
    }

    let entries = match git.stash_list() {
        Ok(entries) => entries,
        Err(e) => return StashResult::failed(keep(), format!("Stash pop failed: {e}")),
    };
    let prefix = format!("{stash_ref}:");
    if !entries.iter().any(|entry| entry.starts_with(&prefix)) {
        return StashResult::failed(
            keep(),
            format!("Stash {stash_ref} not found. It may have been popped manually."),
        );
    }

    match git.stash_pop(stash_ref) {
        Ok(()) => StashResult::ok(None, "Stash restored successfully"),
        Err(e) if e.output_text().contains("CONFLICT") => {
            tracing::warn!(stash = stash_ref, "Stash pop hit merge conflicts");
            StashResult {
                success: false,
                stash_ref: keep(),
                message: "Stash pop failed: merge conflicts detected. Resolve conflicts manually, then run `git stash drop`.".to_string(),
                conflict: true,
            }
        }
        Err(e) => StashResult::failed(keep(), format!("Stash pop failed: {e}")),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::git::testing::ScriptedRunner;

    const STATUS: &str = "git status --porcelain";
    const LIST: &str = "git stash list";

    #[test]
    fn test_pause_with_clean_tree() {
        let runner = ScriptedRunner::new().on(STATUS, "");
        let result = stash_pause(&GitRepository::new("/repo", &runner), "mz", "lunch");

        assert!(result.success);
        assert_eq!(result.stash_ref, None);
        assert_eq!(result.message, "No modified files to stash");
        assert_eq!(runner.calls(), vec![STATUS]);
    }

    #[test]
    fn test_pause_stashes_changes() {
        let runner = ScriptedRunner::new()
            .on(STATUS, " M a.rs\n M b.rs\n")
            .on(LIST, "")
            .on("git stash push -m mz:pause -- end of day", "Saved working directory")
            .on(LIST, "stash@{0}: On main: mz:pause -- end of day\n")
            .on("git stash list --format=%gd -1", "stash@{0}\n");

        let result = stash_pause(&GitRepository::new("/repo", &runner), "mz", "end of day");
        assert!(result.success);
        assert_eq!(result.stash_ref.as_deref(), Some("stash@{0}"));
        assert_eq!(result.message, "Stashed 2 file(s)");
    }

    #[test]
    fn test_pause_reports_git_failure() {
        let runner = ScriptedRunner::new().fail(STATUS, "fatal: not a git repository");
        let result = stash_pause(&GitRepository::new("/tmp", &runner), "mz", "x");

        assert!(!result.success);
        assert!(result.message.starts_with("Stash failed:"));
        assert!(result.message.contains("not a git repository"));
    }

    #[test]
    fn test_resume_rejects_bad_ref() {
        let runner = ScriptedRunner::new();
        let result = stash_resume(&GitRepository::new("/repo", &runner), "stash@{x}; rm -rf /");

        assert!(!result.success);
        assert!(result.message.starts_with("Invalid stash ref format"));
        assert!(runner.calls().is_empty());
    }

    #[test]
    fn test_resume_missing_ref() {
        let runner = ScriptedRunner::new().on(LIST, "stash@{0}: On main: other\n");
        let result = stash_resume(&GitRepository::new("/repo", &runner), "stash@{1}");

        assert!(!result.success);
        assert_eq!(result.message, "Stash stash@{1} not found. It may have been popped manually.");
    }

    #[test]
    fn test_resume_pops() {
        let runner = ScriptedRunner::new()
            .on(LIST, "stash@{0}: On main: mz:pause -- x\n")
            .on("git stash pop stash@{0}", "");
        let result = stash_resume(&GitRepository::new("/repo", &runner), "stash@{0}");

        assert!(result.success);
        assert_eq!(result.stash_ref, None);
        assert!(!result.conflict);
    }

    #[test]
    fn test_resume_conflict() {
        let runner = ScriptedRunner::new()
            .on(LIST, "stash@{0}: On main: mz:pause -- x\n")
            .fail("git stash pop stash@{0}", "CONFLICT (content): Merge conflict in a.rs");
        let result = stash_resume(&GitRepository::new("/repo", &runner), "stash@{0}");

        assert!(!result.success);
        assert!(result.conflict);
        assert_eq!(result.stash_ref.as_deref(), Some("stash@{0}"));
        assert!(result.message.contains("git stash drop"));
    }
}
