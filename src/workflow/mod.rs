//! Planning document state engine.
//!
//! Reads and rewrites the markdown planning documents that persist a
//! project's progress across sessions.
//!
//! ## Documents
//!
//! - `ROADMAP.md` - Phase checklist, phase details, progress table
//! - `STATE.md` - Current position, metrics, decisions, session continuity
//! - `MILESTONE.md` - The active milestone's frontmatter record
//! - `phases/NN-slug/*-PLAN.md` - Plans with YAML frontmatter
//! - `megazord.config.json` - Project workflow settings
//!
//! ## Components
//!
//! - `PlanCatalog` - Lists and parses plan files in a phase directory
//! - `compute_waves` / `detect_conflicts` - Groups plans for execution
//! - `RoadmapDocument` - Adds, removes and inserts phases
//! - `StateDocument` - Updates position and session continuity
//! - `MilestoneManager` - Creates, archives and audits milestones

mod config;
mod context;
mod error;
mod frontmatter;
mod milestone;
mod ownership;
mod phase;
mod plan;
mod progress;
mod roadmap;
mod sections;
mod stash;
mod state;
mod verification;
mod waves;

pub use config::{
    detect_legacy, migrate_legacy, AgentRole, AgentTeamsConfig, DebugMode, Depth, LegacyConfig,
    Mode, Model, ModelOverrides, ModelProfile, Preset, ProjectConfig, QualityConfig, ReviewMode,
    TeamsMode, WorkflowToggles, CONFIG_VERSION, LEGACY_CONFIG_FILE, PROJECT_CONFIG_FILE,
};
pub use context::{InitResult, WorkflowContext};
pub use error::{WorkflowError, WorkflowResult};
pub use milestone::{
    ArchiveResult, AuditDetail, AuditReport, CreatedMilestone, MilestoneManager, MilestoneRecord,
    DEFAULT_TAG_PREFIX,
};
pub use ownership::{
    generate_manifest, validate_file_access, write_manifest, AccessCheck, OwnershipManifest,
    DEFAULT_AGENT_PREFIX,
};
pub use phase::{find_phase_dir, generate_slug, pad_phase, PhaseNumber};
pub use plan::{PlanCatalog, PlanDescriptor, PlanFile};
pub use progress::{calculate_progress, PhaseProgress, Progress};
pub use roadmap::{
    parse_phases, AddPhaseResult, InsertPhaseResult, PhaseStatus, RemovePhaseResult,
    RoadmapDocument, RoadmapPhase,
};
pub use sections::{extract_field, extract_section, replace_section};
pub use stash::{stash_pause, stash_resume, StashResult, DEFAULT_STASH_TAG};
pub use state::{
    progress_bar, AdvancePlanResult, PositionUpdate, SessionContinuity, SessionUpdate,
    StateDocument, StatePosition,
};
pub use verification::{check_gate, VerificationGate};
pub use waves::{compute_waves, detect_conflicts, wave_conflicts, ConflictMap, PlanWave};
