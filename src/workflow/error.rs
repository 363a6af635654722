//! Workflow engine error types.

use std::path::PathBuf;

use thiserror::Error;

/// Result type for workflow operations.
pub type WorkflowResult<T> = Result<T, WorkflowError>;

/// Errors that can occur while reading or editing planning documents.
#[derive(Debug, Error)]
pub enum WorkflowError {
    /// Plan descriptor frontmatter failed validation.
    #[error("Invalid frontmatter in {}: {reason}", path.display())]
    Validation { path: PathBuf, reason: String },

    /// A document the operation must edit does not exist.
    #[error("Document not found: {}", .0.display())]
    DocumentMissing(PathBuf),

    /// The referenced phase is not in the roadmap.
    #[error("Phase {0} not found in ROADMAP.md")]
    PhaseNotFound(String),

    /// The operation's precondition does not hold; nothing was written.
    #[error("{0}")]
    Precondition(String),

    /// A joined path would escape its base directory.
    #[error("Path traversal detected: {} escapes base directory", .0.display())]
    PathTraversal(PathBuf),

    /// Project configuration problem.
    #[error("Configuration error: {0}")]
    Config(String),

    /// IO error.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON (de)serialization error.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl WorkflowError {
    /// Build a validation error for a descriptor file.
    pub fn validation(path: impl Into<PathBuf>, reason: impl Into<String>) -> Self {
        Self::Validation { path: path.into(), reason: reason.into() }
    }
}
