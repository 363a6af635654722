//! Workflow context management.
//!
//! Resolves the planning directory for a project root and hands out the
//! document handles that operate on it.

use std::path::{Path, PathBuf};

use serde::Serialize;

use super::config::{Preset, ProjectConfig};
use super::error::{WorkflowError, WorkflowResult};
use super::milestone::MilestoneManager;
use super::phase::{find_phase_dir, PhaseNumber};
use super::plan::PlanCatalog;
use super::roadmap::RoadmapDocument;
use super::state::StateDocument;
use crate::core::paths::{PHASES_DIR, ROADMAP_FILE, STATE_FILE};
use crate::core::Config;

/// Planning workspace rooted at a project directory.
#[derive(Debug, Clone)]
pub struct WorkflowContext {
    /// Project root
    pub root: PathBuf,

    /// Planning directory (`.planning` unless configured otherwise)
    pub planning_dir: PathBuf,

    /// Tool configuration in effect
    pub config: Config,
}

/// Files written by [`WorkflowContext::init`].
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct InitResult {
    /// Planning directory
    pub planning_dir: PathBuf,

    /// Documents created by this call
    pub created: Vec<PathBuf>,

    /// Documents that already existed and were left alone
    pub skipped: Vec<PathBuf>,
}

impl WorkflowContext {
    /// Create a context with an explicit tool configuration.
    pub fn new(root: impl Into<PathBuf>, config: Config) -> Self {
        let root = root.into();
        let planning_dir = config.planning_dir(&root);
        Self { root, planning_dir, config }
    }

    /// Load the tool configuration for `root` and build a context.
    pub fn load(root: &Path) -> anyhow::Result<Self> {
        let config = Config::load(root)?;
        let ctx = Self::new(root, config);
        tracing::debug!(planning_dir = ?ctx.planning_dir, "Loaded workflow context");
        Ok(ctx)
    }

    /// Whether a roadmap exists.
    pub fn is_initialized(&self) -> bool {
        self.planning_dir.join(ROADMAP_FILE).exists()
    }

    pub fn roadmap(&self) -> RoadmapDocument {
        RoadmapDocument::new(&self.planning_dir)
    }

    pub fn state(&self) -> StateDocument {
        StateDocument::new(&self.planning_dir)
    }

    /// Milestone manager using the configured tag prefix.
    pub fn milestones(&self) -> MilestoneManager {
        MilestoneManager::new(&self.planning_dir).tag_prefix(&self.config.git.tag_prefix)
    }

    /// Plan catalog for a phase's directory.
    pub fn plans(&self, phase: PhaseNumber) -> WorkflowResult<PlanCatalog> {
        find_phase_dir(&self.planning_dir, phase)
            .map(PlanCatalog::new)
            .ok_or_else(|| {
                WorkflowError::Precondition(format!("Phase {phase} not found: no phase directory"))
            })
    }

    /// Project config from the planning directory.
    pub fn project_config(&self) -> WorkflowResult<ProjectConfig> {
        ProjectConfig::load(&self.planning_dir)
    }

    /// Create the planning directory with template documents.
    ///
    /// Existing ROADMAP.md, STATE.md and project config are never overwritten.
    pub fn init(&self, project_name: &str, preset: Option<Preset>) -> WorkflowResult<InitResult> {
        if project_name.trim().is_empty() {
            return Err(WorkflowError::Precondition("Project name must not be empty".to_string()));
        }
        std::fs::create_dir_all(self.planning_dir.join(PHASES_DIR))?;

        let mut result = InitResult { planning_dir: self.planning_dir.clone(), ..Default::default() };

        let templates = [
            (self.planning_dir.join(ROADMAP_FILE), roadmap_template(project_name)),
            (self.planning_dir.join(STATE_FILE), state_template(project_name)),
        ];
        for (path, content) in templates {
            if path.exists() {
                result.skipped.push(path);
            } else {
                std::fs::write(&path, content)?;
                result.created.push(path);
            }
        }

        let config_path = ProjectConfig::path(&self.planning_dir);
        if config_path.exists() {
            result.skipped.push(config_path);
        } else {
            let mut config = ProjectConfig::new(project_name);
            if let Some(preset) = preset {
                config.apply_preset(preset);
            }
            result.created.push(config.save(&self.planning_dir)?);
        }

        tracing::info!(project = project_name, created = result.created.len(), "Initialized planning directory");
        Ok(result)
    }
}

fn roadmap_template(project_name: &str) -> String {
    format!(
        "# Roadmap: {project_name}

## Overview

TBD

## Phases

## Phase Details

## Progress

| Phase | Plans Complete | Status | Completed |
|-------|----------------|--------|-----------|
"
    )
}

fn state_template(project_name: &str) -> String {
    let today = chrono::Utc::now().format("%Y-%m-%d");
    format!(
        "# Project State

## Project Reference

Project: {project_name}

## Current Position

Phase: 1 of 1 (TBD) -- Not started
Plan: 0 of 0 in current phase
Status: Not started
Last activity: {today} -- Project initialized

Progress: [░░░░░░░░░░░░░░░░░░░░] 0%

## Performance Metrics

**Velocity:**
- Total plans completed: 0
- Average duration: 0min
- Total execution time: 0.00 hours

**By Phase:**

| Phase | Plans | Total | Avg/Plan |
|-------|-------|-------|----------|

## Accumulated Context

### Decisions

### Blockers/Concerns

None yet.

## Session Continuity

Last session: {today}
Stopped at: Project initialized
Resume file: None
Stash ref: None
Last error: None
"
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::workflow::config::ModelProfile;
    use tempfile::TempDir;

    #[test]
    fn test_context_uses_configured_planning_dir() {
        let mut config = Config::default();
        config.general.planning_dir = "plans".to_string();
        let ctx = WorkflowContext::new("/project", config);
        assert_eq!(ctx.planning_dir, PathBuf::from("/project/plans"));
        assert_eq!(ctx.roadmap().path(), PathBuf::from("/project/plans/ROADMAP.md"));
    }

    #[test]
    fn test_init_writes_templates_once() {
        let temp = TempDir::new().unwrap();
        let ctx = WorkflowContext::new(temp.path(), Config::default());
        assert!(!ctx.is_initialized());

        let first = ctx.init("Demo", Some(Preset::Balanced)).unwrap();
        assert_eq!(first.created.len(), 3);
        assert!(ctx.is_initialized());
        assert!(ctx.planning_dir.join(PHASES_DIR).is_dir());
        assert_eq!(ctx.project_config().unwrap().model_profile, ModelProfile::Balanced);

        std::fs::write(ctx.planning_dir.join(STATE_FILE), "custom").unwrap();
        let second = ctx.init("Demo", None).unwrap();
        assert!(second.created.is_empty());
        assert_eq!(second.skipped.len(), 3);
        assert_eq!(std::fs::read_to_string(ctx.planning_dir.join(STATE_FILE)).unwrap(), "custom");
    }

    #[test]
    fn test_templates_parse() {
        let temp = TempDir::new().unwrap();
        let ctx = WorkflowContext::new(temp.path(), Config::default());
        ctx.init("Demo", None).unwrap();

        let position = ctx.state().read_position().unwrap().unwrap();
        assert_eq!(position.phase, 1);
        assert_eq!(position.status, "Not started");
        assert!(ctx.roadmap().parse_phases().unwrap().is_empty());

        let session = ctx.state().read_session_continuity().unwrap().unwrap();
        assert_eq!(session.resume_file, "None");
        assert_eq!(session.stash_ref, None);

        assert!(ctx.state().add_decision("1", "Start small").unwrap());
        let content = std::fs::read_to_string(ctx.state().path()).unwrap();
        assert!(content.contains("### Decisions\n- Phase 1: Start small\n"));
    }

    #[test]
    fn test_plans_for_missing_phase() {
        let temp = TempDir::new().unwrap();
        let ctx = WorkflowContext::new(temp.path(), Config::default());
        assert!(matches!(ctx.plans(PhaseNumber::Integer(2)), Err(WorkflowError::Precondition(_))));
    }

    #[test]
    fn test_init_rejects_blank_name() {
        let temp = TempDir::new().unwrap();
        let ctx = WorkflowContext::new(temp.path(), Config::default());
        assert!(ctx.init("  ", None).is_err());
    }
}
