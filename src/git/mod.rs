//! Git integration module.
//!
//! Thin wrapper over the `git` CLI for the handful of operations the planning
//! engine needs: working-tree status, stashes and annotated tags. Every call
//! goes through a [`CommandRunner`] so tests can script git's answers.

use std::path::{Path, PathBuf};

use crate::core::{CommandError, CommandRunner};

const GIT: &str = "git";

/// A git working tree driven through the command line.
pub struct GitRepository<'a> {
    root: PathBuf,
    runner: &'a dyn CommandRunner,
}

impl<'a> GitRepository<'a> {
    /// Wrap the working tree at `root`.
    pub fn new(root: impl Into<PathBuf>, runner: &'a dyn CommandRunner) -> Self {
        Self { root: root.into(), runner }
    }

    /// Working tree root.
    pub fn root(&self) -> &Path {
        &self.root
    }

    fn git(&self, args: &[&str]) -> Result<String, CommandError> {
        self.runner.run(GIT, args, &self.root)
    }

    /// Check whether the root is inside a git working tree.
    pub fn is_repository(&self) -> bool {
        self.git(&["rev-parse", "--is-inside-work-tree"]).is_ok_and(|out| out.trim() == "true")
    }

    /// Modified and untracked paths, one porcelain line each.
    pub fn status_porcelain(&self) -> Result<Vec<String>, CommandError> {
        Ok(non_empty_lines(&self.git(&["status", "--porcelain"])?))
    }

    /// Stash entries, newest first.
    pub fn stash_list(&self) -> Result<Vec<String>, CommandError> {
        Ok(non_empty_lines(&self.git(&["stash", "list"])?))
    }

    /// Stash all local changes under `message`.
    pub fn stash_push(&self, message: &str) -> Result<(), CommandError> {
        self.git(&["stash", "push", "-m", message]).map(drop)
    }

    /// Reference of the newest stash (`stash@{0}`), if any.
    pub fn newest_stash_ref(&self) -> Result<Option<String>, CommandError> {
        let out = self.git(&["stash", "list", "--format=%gd", "-1"])?;
        let reference = out.trim();
        Ok((!reference.is_empty()).then(|| reference.to_string()))
    }

    /// Apply and drop a stash.
    pub fn stash_pop(&self, reference: &str) -> Result<(), CommandError> {
        self.git(&["stash", "pop", reference]).map(drop)
    }

    /// Create an annotated tag on HEAD.
    pub fn create_tag(&self, name: &str, message: &str) -> Result<(), CommandError> {
        self.git(&["tag", "-a", name, "-m", message]).map(drop)
    }
}

fn non_empty_lines(out: &str) -> Vec<String> {
    out.lines().filter(|l| !l.trim().is_empty()).map(str::to_string).collect()
}
