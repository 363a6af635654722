//! Milestones: creation, archival and verification audit.

use std::path::{Path, PathBuf};

use serde::{de, Deserialize, Deserializer, Serialize};
use serde_yaml::Value;
use walkdir::WalkDir;

use super::error::{WorkflowError, WorkflowResult};
use super::frontmatter;
use super::phase::PhaseNumber;
use super::verification;
use crate::core::paths::{
    safe_join, MILESTONES_DIR, MILESTONES_LOG, MILESTONE_FILE, PHASES_DIR, REQUIREMENTS_FILE,
    ROADMAP_FILE,
};
use crate::git::GitRepository;

/// Default prefix for milestone tags.
pub const DEFAULT_TAG_PREFIX: &str = "milestone";

const LOG_HEADER: &str = "# Milestones Log\n\n| Version | Date | Status | Details |\n|---------|------|--------|---------|\n";

/// `MILESTONE.md` frontmatter.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MilestoneRecord {
    #[serde(deserialize_with = "scalar_string")]
    pub version: String,

    #[serde(deserialize_with = "scalar_string")]
    pub name: String,

    #[serde(default)]
    pub phases: Vec<u32>,

    pub status: String,

    #[serde(deserialize_with = "scalar_string")]
    pub created: String,
}

/// Accept unquoted YAML scalars (`version: 1.0`) as strings.
fn scalar_string<'de, D: Deserializer<'de>>(deserializer: D) -> Result<String, D::Error> {
    match Value::deserialize(deserializer)? {
        Value::String(s) => Ok(s),
        Value::Number(n) => Ok(n.to_string()),
        Value::Bool(b) => Ok(b.to_string()),
        _ => Err(de::Error::custom("expected a scalar value")),
    }
}

impl MilestoneRecord {
    fn render(&self) -> WorkflowResult<String> {
        let yaml = serde_yaml::to_string(self)
            .map_err(|e| WorkflowError::Config(format!("cannot render milestone frontmatter: {e}")))?;
        let mut lines = vec![
            format!("---\n{yaml}---"),
            String::new(),
            format!("# Milestone: {} - {}", self.version, self.name),
            String::new(),
            "## Phases".to_string(),
            String::new(),
        ];
        lines.extend(self.phases.iter().map(|p| format!("- Phase {p}")));
        lines.extend([
            String::new(),
            "## Status".to_string(),
            String::new(),
            "Active - In progress".to_string(),
            String::new(),
            format!("*Created: {}*", self.created),
            String::new(),
        ]);
        Ok(lines.join("\n"))
    }
}

/// Result of [`MilestoneManager::create`].
#[derive(Debug, Clone, Serialize)]
pub struct CreatedMilestone {
    #[serde(flatten)]
    pub record: MilestoneRecord,
    pub path: PathBuf,
}

/// Result of [`MilestoneManager::archive`].
#[derive(Debug, Clone, Serialize)]
pub struct ArchiveResult {
    pub version: String,
    pub date: String,

    /// Archive copies that were written
    pub archived: Vec<PathBuf>,

    /// Whether the milestone tag was created
    pub tagged: bool,
}

/// Verification state of one phase in an audit.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AuditDetail {
    pub phase: u32,
    pub verification_exists: bool,
    pub status: Option<String>,
    pub passed: bool,
}

/// Verification state of every phase in a milestone.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AuditReport {
    pub all_passed: bool,
    pub details: Vec<AuditDetail>,
    pub failed_phases: Vec<u32>,
    pub missing_verification: Vec<u32>,
}

/// Milestone operations for a planning directory.
#[derive(Debug, Clone)]
pub struct MilestoneManager {
    planning_dir: PathBuf,
    tag_prefix: String,
}

impl MilestoneManager {
    /// Create a manager for `planning_dir`.
    pub fn new(planning_dir: impl Into<PathBuf>) -> Self {
        Self { planning_dir: planning_dir.into(), tag_prefix: DEFAULT_TAG_PREFIX.to_string() }
    }

    /// Set the tag prefix (`{prefix}/{version}`).
    #[must_use]
    pub fn tag_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.tag_prefix = prefix.into();
        self
    }

    /// Path to `MILESTONE.md`.
    pub fn path(&self) -> PathBuf {
        self.planning_dir.join(MILESTONE_FILE)
    }

    /// Write `MILESTONE.md` for a new active milestone.
    pub fn create(&self, version: &str, name: &str, phases: &[u32]) -> WorkflowResult<CreatedMilestone> {
        validate_version(version)?;
        std::fs::create_dir_all(&self.planning_dir)?;

        let record = MilestoneRecord {
            version: version.to_string(),
            name: name.to_string(),
            phases: phases.to_vec(),
            status: "active".to_string(),
            created: today(),
        };
        let path = self.path();
        std::fs::write(&path, record.render()?)?;

        tracing::info!(version, phases = phases.len(), "Created milestone");
        Ok(CreatedMilestone { record, path })
    }

    /// Read the active milestone, `None` if there isn't one.
    pub fn current(&self) -> WorkflowResult<Option<MilestoneRecord>> {
        let path = self.path();
        if !path.exists() {
            return Ok(None);
        }
        let content = std::fs::read_to_string(&path)?;
        let (yaml, _) = frontmatter::split(&content)
            .ok_or_else(|| WorkflowError::validation(&path, "missing frontmatter block"))?;
        let record = serde_yaml::from_str(yaml)
            .map_err(|e| WorkflowError::validation(&path, e.to_string()))?;
        Ok(Some(record))
    }

    /// Copy the milestone's documents into `milestones/` and log the archive.
    ///
    /// Tagging needs `git`; a tag failure is logged and reported as
    /// `tagged: false`.
    pub fn archive(
        &self,
        version: &str,
        include_phases: bool,
        git: Option<&GitRepository<'_>>,
    ) -> WorkflowResult<ArchiveResult> {
        validate_version(version)?;
        let milestones_dir = self.planning_dir.join(MILESTONES_DIR);
        std::fs::create_dir_all(&milestones_dir)?;

        let mut archived = Vec::new();
        for file in [ROADMAP_FILE, REQUIREMENTS_FILE] {
            let src = self.planning_dir.join(file);
            if src.is_file() {
                let dst = safe_join(&milestones_dir, format!("{version}-{file}"))?;
                std::fs::copy(&src, &dst)?;
                archived.push(dst);
            }
        }

        let phases_dir = self.planning_dir.join(PHASES_DIR);
        if include_phases && phases_dir.is_dir() {
            let dst = safe_join(&milestones_dir, format!("{version}-phases"))?;
            let copied = copy_tree(&phases_dir, &dst)?;
            tracing::debug!(files = copied, "Archived phase directories");
            archived.push(dst);
        }

        let date = today();
        let log_path = milestones_dir.join(MILESTONES_LOG);
        let mut log = if log_path.exists() {
            std::fs::read_to_string(&log_path)?
        } else {
            LOG_HEADER.to_string()
        };
        if !log.is_empty() && !log.ends_with('\n') {
            log.push('\n');
        }
        log.push_str(&format!("| {version} | {date} | Archived | {} files |\n", archived.len()));
        std::fs::write(&log_path, log)?;

        let tagged = git.is_some_and(|git| {
            let tag = format!("{}/{version}", self.tag_prefix);
            match git.create_tag(&tag, &format!("Milestone {version} archived on {date}")) {
                Ok(()) => true,
                Err(e) => {
                    tracing::debug!(tag = %tag, error = %e, "Skipping milestone tag");
                    false
                }
            }
        });

        tracing::info!(version, files = archived.len(), tagged, "Archived milestone");
        Ok(ArchiveResult { version: version.to_string(), date, archived, tagged })
    }

    /// Check verification for each phase of a milestone.
    pub fn audit(&self, phases: &[u32]) -> AuditReport {
        let details: Vec<AuditDetail> = phases
            .iter()
            .map(|&phase| {
                let gate = verification::check_gate(&self.planning_dir, PhaseNumber::Integer(phase));
                AuditDetail {
                    phase,
                    verification_exists: gate.exists,
                    status: gate.status,
                    passed: gate.passed,
                }
            })
            .collect();

        let missing_verification: Vec<u32> =
            details.iter().filter(|d| !d.verification_exists).map(|d| d.phase).collect();
        let failed_phases: Vec<u32> = details
            .iter()
            .filter(|d| d.verification_exists && !d.passed)
            .map(|d| d.phase)
            .collect();

        AuditReport {
            all_passed: failed_phases.is_empty() && missing_verification.is_empty(),
            details,
            failed_phases,
            missing_verification,
        }
    }
}

fn validate_version(version: &str) -> WorkflowResult<()> {
    if version.trim().is_empty() || version.contains(['/', '\\']) || version.starts_with('.') {
        return Err(WorkflowError::Precondition(format!("Invalid milestone version: '{version}'")));
    }
    Ok(())
}

fn today() -> String {
    chrono::Utc::now().format("%Y-%m-%d").to_string()
}

/// Recursively copy `src` into `dst`, returning the number of files copied.
fn copy_tree(src: &Path, dst: &Path) -> WorkflowResult<usize> {
    let mut files = 0;
    for entry in WalkDir::new(src).follow_links(false) {
        let entry = entry.map_err(|e| WorkflowError::Io(e.into()))?;
        let Ok(relative) = entry.path().strip_prefix(src) else {
            continue;
        };
        let target = safe_join(dst, relative)?;

        if entry.file_type().is_dir() {
            std::fs::create_dir_all(&target)?;
        } else if entry.file_type().is_file() {
            if let Some(parent) = target.parent() {
                std::fs::create_dir_all(parent)?;
            }
            std::fs::copy(entry.path(), &target)?;
            files += 1;
        }
    }
    Ok(files)
}
