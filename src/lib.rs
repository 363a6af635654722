//! # Phasekit
//!
//! Planning document state engine - keeps a project's roadmap, plans and
//! session state in plain markdown that both people and agents can edit.
//!
//! Phasekit reads and rewrites the documents of a `.planning/` directory:
//! it lists plans and groups them into execution waves, adds, removes and
//! inserts roadmap phases (renumbering later phases), tracks the current
//! position in STATE.md, and archives finished milestones.
//!
//! ## Features
//!
//! - **Plan waves**: Groups plans by wave and flags files touched by more than one plan
//! - **Roadmap editing**: Phase add/remove/insert with renumbering of references and directories
//! - **Session state**: Position, metrics, decisions and pause/resume through git stashes
//! - **Milestones**: Create, archive (with git tag) and audit verification status
//!
//! ## Quick Start
//!
//! ```bash
//! phasekit init "My Project"
//! phasekit roadmap add "Core Engine" --goal "Parse every document"
//! phasekit progress
//! ```

#![forbid(unsafe_code)]
#![warn(clippy::all, clippy::pedantic, clippy::nursery)]
// Allow common patterns that are intentional in this codebase
#![allow(clippy::module_name_repetitions)]
#![allow(clippy::similar_names)]
#![allow(clippy::must_use_candidate)]
#![allow(clippy::missing_errors_doc)]
#![allow(clippy::missing_const_for_fn)]
#![allow(clippy::doc_markdown)]
#![allow(clippy::manual_let_else)]
#![allow(clippy::derivable_impls)]
#![allow(clippy::return_self_not_must_use)]
#![allow(clippy::struct_excessive_bools)]
#![allow(clippy::struct_field_names)]
#![allow(clippy::option_if_let_else)]
#![allow(clippy::map_unwrap_or)]
#![allow(clippy::match_same_arms)]
#![allow(clippy::too_many_lines)]
#![allow(clippy::uninlined_format_args)]
#![allow(clippy::missing_panics_doc)]
#![allow(clippy::items_after_statements)]
#![allow(clippy::redundant_closure_for_method_calls)]

pub mod core;
pub mod git;
pub mod workflow;

// Re-export commonly used types
pub use core::{CommandError, CommandRunner, Config, Executor};
pub use git::GitRepository;
pub use workflow::{
    MilestoneManager, PhaseNumber, PlanCatalog, ProjectConfig, RoadmapDocument, StateDocument,
    WorkflowContext, WorkflowError, WorkflowResult,
};

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Application name
pub const APP_NAME: &str = "phasekit";
