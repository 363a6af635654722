//! Project configuration stored in the planning directory.
//!
//! `megazord.config.json` holds per-project workflow settings: execution
//! mode, planning depth, quality gates and which model each agent role uses.
//! Older planning directories carry a `config.json` without a `version`
//! field; [`detect_legacy`] and [`migrate_legacy`] bring those forward.

use std::fmt;
use std::path::{Path, PathBuf};
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use super::error::{WorkflowError, WorkflowResult};

/// Project config filename inside the planning directory.
pub const PROJECT_CONFIG_FILE: &str = "megazord.config.json";

/// Pre-versioning config filename.
pub const LEGACY_CONFIG_FILE: &str = "config.json";

/// Current schema version.
pub const CONFIG_VERSION: u32 = 1;

/// Execution mode.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Mode {
    /// Run autonomously
    #[default]
    Yolo,
    /// Confirm at each step
    Interactive,
}

/// Planning depth.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Depth {
    Quick,
    Standard,
    #[default]
    Comprehensive,
}

/// Model selection profile for agents.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ModelProfile {
    #[default]
    Quality,
    Balanced,
    Budget,
}

/// Model an agent runs on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Model {
    Opus,
    Sonnet,
    Haiku,
    /// Defer to the profile
    Inherit,
}

impl fmt::Display for Model {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Opus => "opus",
            Self::Sonnet => "sonnet",
            Self::Haiku => "haiku",
            Self::Inherit => "inherit",
        };
        f.write_str(name)
    }
}

/// Agent roles that support model selection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AgentRole {
    Researcher,
    Planner,
    Executor,
    Reviewer,
    Verifier,
    Mapper,
}

impl FromStr for AgentRole {
    type Err = WorkflowError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "researcher" => Ok(Self::Researcher),
            "planner" => Ok(Self::Planner),
            "executor" => Ok(Self::Executor),
            "reviewer" => Ok(Self::Reviewer),
            "verifier" => Ok(Self::Verifier),
            "mapper" => Ok(Self::Mapper),
            other => Err(WorkflowError::Config(format!(
                "Unknown agent role: {other}. Available: researcher, planner, executor, reviewer, verifier, mapper"
            ))),
        }
    }
}

/// Code review mode.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ReviewMode {
    #[default]
    Auto,
    Manual,
    Off,
}

/// Debugging discipline.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DebugMode {
    #[default]
    Systematic,
    Quick,
}

/// When to coordinate agent teams.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TeamsMode {
    #[default]
    Auto,
    Always,
    Never,
}

/// Per-role model overrides. An override wins over the profile.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ModelOverrides {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub researcher: Option<Model>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub planner: Option<Model>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub executor: Option<Model>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reviewer: Option<Model>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub verifier: Option<Model>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub mapper: Option<Model>,
}

impl ModelOverrides {
    /// Override for a role, if set.
    pub fn get(&self, role: AgentRole) -> Option<Model> {
        match role {
            AgentRole::Researcher => self.researcher,
            AgentRole::Planner => self.planner,
            AgentRole::Executor => self.executor,
            AgentRole::Reviewer => self.reviewer,
            AgentRole::Verifier => self.verifier,
            AgentRole::Mapper => self.mapper,
        }
    }
}

/// Quality discipline settings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct QualityConfig {
    pub tdd: bool,
    pub review: ReviewMode,
    pub brainstorming: bool,
    pub cortex: bool,
    pub debug: DebugMode,
}

impl Default for QualityConfig {
    fn default() -> Self {
        Self {
            tdd: true,
            review: ReviewMode::Auto,
            brainstorming: true,
            cortex: true,
            debug: DebugMode::Systematic,
        }
    }
}

/// Workflow agent toggles.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct WorkflowToggles {
    pub research: bool,
    pub plan_check: bool,
    pub verifier: bool,
}

impl Default for WorkflowToggles {
    fn default() -> Self {
        Self { research: true, plan_check: true, verifier: true }
    }
}

/// Agent team coordination settings.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct AgentTeamsConfig {
    pub enabled: TeamsMode,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub worktree_dir: Option<String>,

    pub strict_ownership: bool,
}

fn default_version() -> u32 {
    CONFIG_VERSION
}

fn default_true() -> bool {
    true
}

/// Project configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProjectConfig {
    /// Schema version
    #[serde(default = "default_version")]
    pub version: u32,

    /// Project identity
    pub project_name: String,

    /// Plugin installation directory
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub plugin_path: Option<String>,

    #[serde(default)]
    pub mode: Mode,

    #[serde(default)]
    pub depth: Depth,

    /// Run independent plans in parallel
    #[serde(default = "default_true")]
    pub parallelization: bool,

    /// Commit planning docs alongside code
    #[serde(default = "default_true")]
    pub commit_docs: bool,

    #[serde(default)]
    pub model_profile: ModelProfile,

    #[serde(default)]
    pub model_overrides: ModelOverrides,

    #[serde(default)]
    pub quality: QualityConfig,

    #[serde(default)]
    pub workflow: WorkflowToggles,

    #[serde(default)]
    pub agent_teams: AgentTeamsConfig,
}

/// Named configuration presets.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Preset {
    Strict,
    Balanced,
    Minimal,
}

impl FromStr for Preset {
    type Err = WorkflowError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "strict" => Ok(Self::Strict),
            "balanced" => Ok(Self::Balanced),
            "minimal" => Ok(Self::Minimal),
            other => Err(WorkflowError::Config(format!(
                "Unknown preset: {other}. Available: strict, balanced, minimal"
            ))),
        }
    }
}

impl ProjectConfig {
    /// Default configuration for a project.
    pub fn new(project_name: impl Into<String>) -> Self {
        Self {
            version: CONFIG_VERSION,
            project_name: project_name.into(),
            plugin_path: None,
            mode: Mode::default(),
            depth: Depth::default(),
            parallelization: true,
            commit_docs: true,
            model_profile: ModelProfile::default(),
            model_overrides: ModelOverrides::default(),
            quality: QualityConfig::default(),
            workflow: WorkflowToggles::default(),
            agent_teams: AgentTeamsConfig::default(),
        }
    }

    /// Overwrite the profile, quality, workflow and team settings with a preset.
    pub fn apply_preset(&mut self, preset: Preset) {
        self.model_overrides = ModelOverrides::default();
        match preset {
            Preset::Strict => {
                self.model_profile = ModelProfile::Quality;
                self.quality = QualityConfig::default();
                self.workflow = WorkflowToggles::default();
                self.agent_teams = AgentTeamsConfig { strict_ownership: true, ..Default::default() };
            }
            Preset::Balanced => {
                self.model_profile = ModelProfile::Balanced;
                self.quality = QualityConfig {
                    tdd: false,
                    review: ReviewMode::Auto,
                    brainstorming: true,
                    cortex: false,
                    debug: DebugMode::Quick,
                };
                self.workflow = WorkflowToggles::default();
                self.agent_teams = AgentTeamsConfig::default();
            }
            Preset::Minimal => {
                self.model_profile = ModelProfile::Budget;
                self.quality = QualityConfig {
                    tdd: false,
                    review: ReviewMode::Off,
                    brainstorming: false,
                    cortex: false,
                    debug: DebugMode::Quick,
                };
                self.workflow = WorkflowToggles { research: false, plan_check: false, verifier: false };
                self.agent_teams = AgentTeamsConfig { enabled: TeamsMode::Never, ..Default::default() };
            }
        }
    }

    /// Model for an agent role.
    ///
    /// A concrete override wins. Otherwise the balanced and budget profiles
    /// give the planner one tier up, and every other role maps uniformly.
    pub fn resolve_agent_model(&self, role: AgentRole) -> Model {
        if let Some(model) = self.model_overrides.get(role).filter(|m| *m != Model::Inherit) {
            return model;
        }

        match (self.model_profile, role) {
            (ModelProfile::Balanced, AgentRole::Planner) => Model::Opus,
            (ModelProfile::Budget, AgentRole::Planner) => Model::Sonnet,
            (ModelProfile::Quality, _) => Model::Opus,
            (ModelProfile::Balanced, _) => Model::Sonnet,
            (ModelProfile::Budget, _) => Model::Haiku,
        }
    }

    /// Path of the config file inside `planning_dir`.
    pub fn path(planning_dir: &Path) -> PathBuf {
        planning_dir.join(PROJECT_CONFIG_FILE)
    }

    /// Load and validate the project config.
    pub fn load(planning_dir: &Path) -> WorkflowResult<Self> {
        let path = Self::path(planning_dir);
        if !path.exists() {
            return Err(WorkflowError::Config(format!(
                "Config not found: {}. Run `phasekit init` first.",
                path.display()
            )));
        }

        let content = std::fs::read_to_string(&path)?;
        let config: Self = serde_json::from_str(&content).map_err(|e| {
            WorkflowError::Config(format!("Invalid config at {}: {e}", path.display()))
        })?;

        if config.version != CONFIG_VERSION {
            return Err(WorkflowError::Config(format!(
                "Invalid config at {}: unsupported version {}",
                path.display(),
                config.version
            )));
        }
        Ok(config)
    }

    /// Write the config as pretty JSON.
    pub fn save(&self, planning_dir: &Path) -> WorkflowResult<PathBuf> {
        std::fs::create_dir_all(planning_dir)?;
        let path = Self::path(planning_dir);
        let mut json = serde_json::to_string_pretty(self)?;
        json.push('\n');
        std::fs::write(&path, json)?;
        tracing::debug!(path = ?path, "Saved project config");
        Ok(path)
    }
}

/// Workflow toggles as written by the pre-versioning format.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct LegacyWorkflow {
    pub research: Option<bool>,
    pub plan_check: Option<bool>,
    pub verifier: Option<bool>,
}

/// Pre-versioning config shape. Unknown keys are ignored.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct LegacyConfig {
    pub mode: Option<Mode>,
    pub depth: Option<Depth>,
    pub parallelization: Option<bool>,
    pub commit_docs: Option<bool>,
    pub model_profile: Option<ModelProfile>,
    pub workflow: Option<LegacyWorkflow>,
}

/// Read `config.json` if it is a pre-versioning config.
pub fn detect_legacy(planning_dir: &Path) -> WorkflowResult<Option<LegacyConfig>> {
    let path = planning_dir.join(LEGACY_CONFIG_FILE);
    if !path.exists() {
        return Ok(None);
    }

    let raw: serde_json::Value = serde_json::from_str(&std::fs::read_to_string(&path)?)?;
    if raw.get("version").is_some() {
        return Ok(None);
    }

    let legacy = serde_json::from_value(raw).map_err(|e| {
        WorkflowError::Config(format!("Invalid legacy config at {}: {e}", path.display()))
    })?;
    Ok(Some(legacy))
}

/// Convert a legacy config, filling gaps with defaults and strict quality settings.
pub fn migrate_legacy(legacy: LegacyConfig, project_name: impl Into<String>) -> ProjectConfig {
    let mut config = ProjectConfig::new(project_name);
    let workflow = legacy.workflow.unwrap_or_default();

    config.mode = legacy.mode.unwrap_or_default();
    config.depth = legacy.depth.unwrap_or_default();
    config.parallelization = legacy.parallelization.unwrap_or(true);
    config.commit_docs = legacy.commit_docs.unwrap_or(true);
    config.model_profile = legacy.model_profile.unwrap_or_default();
    config.workflow = WorkflowToggles {
        research: workflow.research.unwrap_or(true),
        plan_check: workflow.plan_check.unwrap_or(true),
        verifier: workflow.verifier.unwrap_or(true),
    };
    config.quality = QualityConfig::default();
    config
}
