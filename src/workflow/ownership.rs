//! File ownership manifests for parallel agents.
//!
//! Each plan's `files_modified` list becomes the write scope of the agent
//! that executes it.

use std::collections::BTreeMap;
use std::path::Path;

use serde::Serialize;

use super::error::WorkflowResult;
use super::plan::PlanFile;

/// Agent name -> paths (or path prefixes) the agent may modify.
pub type OwnershipManifest = BTreeMap<String, Vec<String>>;

/// Default agent name prefix.
pub const DEFAULT_AGENT_PREFIX: &str = "exec";

/// Outcome of a file access check.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AccessCheck {
    /// Whether the write is permitted
    pub allowed: bool,

    /// Human-readable explanation
    pub reason: String,
}

/// Build a manifest keyed by `{prefix}-{plan}`.
pub fn generate_manifest(plans: &[PlanFile], agent_prefix: &str) -> OwnershipManifest {
    plans
        .iter()
        .map(|p| {
            (format!("{agent_prefix}-{}", p.descriptor.plan), p.descriptor.files_modified.clone())
        })
        .collect()
}

/// Write a manifest as pretty JSON.
pub fn write_manifest(manifest: &OwnershipManifest, path: &Path) -> WorkflowResult<()> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    let json = serde_json::to_string_pretty(manifest)?;
    std::fs::write(path, json)?;
    Ok(())
}

/// Check whether `agent` may modify `file`.
///
/// Agents missing from the manifest, or with an empty scope, are unrestricted.
/// Scope entries match by prefix so a directory entry covers its contents.
pub fn validate_file_access(manifest: &OwnershipManifest, agent: &str, file: &str) -> AccessCheck {
    let Some(allowed) = manifest.get(agent) else {
        return AccessCheck {
            allowed: true,
            reason: "Agent not in manifest (unrestricted)".to_string(),
        };
    };

    if allowed.is_empty() {
        return AccessCheck { allowed: true, reason: "Agent has no file restrictions".to_string() };
    }

    if allowed.iter().any(|scope| file.starts_with(scope.as_str())) {
        return AccessCheck { allowed: true, reason: "File within declared scope".to_string() };
    }

    AccessCheck {
        allowed: false,
        reason: format!("File '{file}' outside declared scope. Allowed: {}", allowed.join(", ")),
    }
}

#[cfg(test)]
mod tests {
    use std::path::PathBuf;

    use super::*;
    use crate::workflow::plan::PlanDescriptor;

    fn manifest() -> OwnershipManifest {
        let mut m = OwnershipManifest::new();
        m.insert("exec-01".to_string(), vec!["src/lib/".to_string(), "README.md".to_string()]);
        m.insert("exec-02".to_string(), Vec::new());
        m
    }

    #[test]
    fn test_generate_manifest() {
        let mut descriptor = PlanDescriptor::new("02-state", "1");
        descriptor.files_modified = vec!["src/state.rs".to_string()];
        let plans = vec![PlanFile {
            path: PathBuf::from("02-01-PLAN.md"),
            filename: "02-01-PLAN.md".to_string(),
            descriptor,
            content: String::new(),
        }];

        let m = generate_manifest(&plans, DEFAULT_AGENT_PREFIX);
        assert_eq!(m["exec-01"], vec!["src/state.rs".to_string()]);
    }

    #[test]
    fn test_prefix_scope_allows_nested_file() {
        assert!(validate_file_access(&manifest(), "exec-01", "src/lib/config.ts").allowed);
        assert!(validate_file_access(&manifest(), "exec-01", "README.md").allowed);
    }

    #[test]
    fn test_outside_scope_denied() {
        let check = validate_file_access(&manifest(), "exec-01", "src/cli/index.ts");
        assert!(!check.allowed);
        assert!(check.reason.contains("src/lib/"));
    }

    #[test]
    fn test_unknown_and_unrestricted_agents() {
        assert!(validate_file_access(&manifest(), "reviewer", "anything").allowed);
        let check = validate_file_access(&manifest(), "exec-02", "anything");
        assert!(check.allowed);
        assert_eq!(check.reason, "Agent has no file restrictions");
    }

    #[test]
    fn test_write_manifest() {
        let temp = tempfile::TempDir::new().unwrap();
        let path = temp.path().join("teams").join("ownership.json");
        write_manifest(&manifest(), &path).unwrap();

        let loaded: OwnershipManifest =
            serde_json::from_str(&std::fs::read_to_string(&path).unwrap()).unwrap();
        assert_eq!(loaded, manifest());
    }
}
