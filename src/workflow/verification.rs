//! Phase verification lookup.
//!
//! A phase is verified when its directory holds a `*VERIFICATION.md` file
//! whose `status:` is `passed` or `human_needed`.

use std::path::{Path, PathBuf};

use serde::Serialize;

use super::frontmatter;
use super::phase::{find_phase_dir, PhaseNumber};
use crate::core::paths::{list_entries, safe_join};

/// Statuses that let the next phase proceed.
const PASSING_STATUSES: &[&str] = &["passed", "human_needed"];

/// Outcome of a verification gate check.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct VerificationGate {
    /// Whether a verification file was found
    pub exists: bool,

    /// Status read from the file, if any
    pub status: Option<String>,

    /// Whether the status lets the next phase proceed
    pub passed: bool,

    /// Human-readable summary
    pub message: String,
}

/// Whether a verification status counts as passing.
pub fn is_passing(status: Option<&str>) -> bool {
    status.is_some_and(|s| PASSING_STATUSES.contains(&s))
}

/// Locate the verification file inside a phase directory.
pub fn find_verification_file(phase_dir: &Path) -> Option<PathBuf> {
    list_entries(phase_dir)
        .into_iter()
        .find(|name| name.ends_with("VERIFICATION.md"))
        .and_then(|name| safe_join(phase_dir, name).ok())
}

/// Check a phase's verification gate. Never fails; problems become messages.
pub fn check_gate(planning_dir: &Path, number: PhaseNumber) -> VerificationGate {
    let not_found = |message: String| VerificationGate {
        exists: false,
        status: None,
        passed: false,
        message,
    };

    let Some(phase_dir) = find_phase_dir(planning_dir, number) else {
        return not_found(format!("Phase directory for phase {number} not found"));
    };

    let Some(file) = find_verification_file(&phase_dir) else {
        return not_found(format!("No VERIFICATION.md found for phase {number}"));
    };

    let status = match std::fs::read_to_string(&file) {
        Ok(content) => frontmatter::scalar_field(&content, "status"),
        Err(e) => {
            tracing::warn!(file = ?file, error = %e, "Cannot read verification file");
            None
        }
    };
    let passed = is_passing(status.as_deref());

    let message = if passed {
        format!("Phase {number} verification: {}", status.as_deref().unwrap_or_default())
    } else {
        format!(
            "Phase {number} verification has not passed (status: {})",
            status.as_deref().unwrap_or("unknown")
        )
    };

    tracing::debug!(phase = %number, passed, "Checked verification gate");
    VerificationGate { exists: true, status, passed, message }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::paths::PHASES_DIR;
    use tempfile::TempDir;

    fn phase_dir(temp: &TempDir, name: &str) -> PathBuf {
        let dir = temp.path().join(PHASES_DIR).join(name);
        std::fs::create_dir_all(&dir).unwrap();
        dir
    }

    #[test]
    fn test_missing_phase_dir() {
        let temp = TempDir::new().unwrap();
        let gate = check_gate(temp.path(), PhaseNumber::Integer(3));
        assert!(!gate.exists);
        assert!(!gate.passed);
        assert_eq!(gate.message, "Phase directory for phase 3 not found");
    }

    #[test]
    fn test_missing_verification_file() {
        let temp = TempDir::new().unwrap();
        phase_dir(&temp, "03-core");
        let gate = check_gate(temp.path(), PhaseNumber::Integer(3));
        assert!(!gate.exists);
        assert_eq!(gate.message, "No VERIFICATION.md found for phase 3");
    }

    #[test]
    fn test_passing_statuses() {
        let temp = TempDir::new().unwrap();
        let dir = phase_dir(&temp, "03-core");
        std::fs::write(dir.join("03-VERIFICATION.md"), "---\nstatus: human_needed\n---\n").unwrap();

        let gate = check_gate(temp.path(), PhaseNumber::Integer(3));
        assert!(gate.exists);
        assert!(gate.passed);
        assert_eq!(gate.status.as_deref(), Some("human_needed"));
        assert_eq!(gate.message, "Phase 3 verification: human_needed");
    }

    #[test]
    fn test_gaps_found_does_not_pass() {
        let temp = TempDir::new().unwrap();
        let dir = phase_dir(&temp, "02.1-hotfix");
        std::fs::write(dir.join("02.1-VERIFICATION.md"), "---\nstatus: gaps_found\n---\n").unwrap();

        let gate = check_gate(temp.path(), PhaseNumber::Decimal { base: 2, sub: 1 });
        assert!(gate.exists);
        assert!(!gate.passed);
        assert_eq!(gate.message, "Phase 2.1 verification has not passed (status: gaps_found)");
    }

    #[test]
    fn test_missing_status_is_unknown() {
        let temp = TempDir::new().unwrap();
        let dir = phase_dir(&temp, "01-setup");
        std::fs::write(dir.join("01-VERIFICATION.md"), "# Verification\n").unwrap();

        let gate = check_gate(temp.path(), PhaseNumber::Integer(1));
        assert!(gate.exists);
        assert_eq!(gate.status, None);
        assert!(gate.message.ends_with("(status: unknown)"));
    }
}
