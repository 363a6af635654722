//! Phasekit - planning document state engine.
//!
//! Every subcommand prints its result as pretty JSON on stdout. Failures
//! print `{"error": "..."}` and exit non-zero; logs go to stderr.

use std::io;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use clap::{CommandFactory, Parser, Subcommand};
use clap_complete::{generate, Shell};
use serde::Serialize;
use serde_json::{json, Value};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use phasekit::core::Executor;
use phasekit::git::GitRepository;
use phasekit::workflow::{
    calculate_progress, compute_waves, detect_conflicts, detect_legacy, generate_manifest,
    migrate_legacy, stash_pause, stash_resume, validate_file_access, wave_conflicts,
    write_manifest, AgentRole, OwnershipManifest, PhaseNumber, PlanFile, PositionUpdate, Preset,
    SessionUpdate, WorkflowContext, DEFAULT_AGENT_PREFIX,
};

/// Planning document state engine
#[derive(Parser)]
#[command(name = "phasekit")]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
struct Cli {
    /// Subcommand to run
    #[command(subcommand)]
    command: Commands,

    /// Project root containing the planning directory
    #[arg(long, global = true, env = "PHASEKIT_ROOT", default_value = ".")]
    root: PathBuf,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Create the planning directory with template documents
    Init {
        /// Project name
        name: String,

        /// Config preset (strict, balanced, minimal)
        #[arg(short, long)]
        preset: Option<Preset>,
    },

    /// Inspect a phase's plans
    Plan {
        #[command(subcommand)]
        operation: PlanOperation,
    },

    /// Edit the roadmap
    Roadmap {
        #[command(subcommand)]
        operation: RoadmapOperation,
    },

    /// Read and update STATE.md
    State {
        #[command(subcommand)]
        operation: StateOperation,
    },

    /// Pause and resume work through git stashes
    Stash {
        #[command(subcommand)]
        operation: StashOperation,
    },

    /// Show overall and current-phase progress
    Progress,

    /// Manage milestones
    Milestone {
        #[command(subcommand)]
        operation: MilestoneOperation,
    },

    /// File ownership manifests for parallel agents
    Ownership {
        #[command(subcommand)]
        operation: OwnershipOperation,
    },

    /// Project configuration
    Config {
        #[command(subcommand)]
        operation: ConfigOperation,
    },

    /// Generate shell completions
    Completions {
        /// Shell to generate completions for
        shell: Shell,
    },
}

#[derive(Subcommand)]
enum PlanOperation {
    /// List plans with completion flags
    List {
        /// Phase number
        phase: PhaseNumber,
    },

    /// Group plans into execution waves
    Waves {
        /// Phase number
        phase: PhaseNumber,
    },

    /// Report files claimed by more than one plan
    Conflicts {
        /// Phase number
        phase: PhaseNumber,
    },

    /// List plans without a summary
    Incomplete {
        /// Phase number
        phase: PhaseNumber,
    },
}

#[derive(Subcommand)]
enum RoadmapOperation {
    /// List phases with their status
    List,

    /// Append a phase after the last one
    Add {
        /// Phase name
        description: String,

        /// Phase goal
        #[arg(short, long)]
        goal: Option<String>,
    },

    /// Remove a phase that has not started
    Remove {
        /// Phase number
        phase: PhaseNumber,
    },

    /// Insert a decimal phase after an existing phase
    Insert {
        /// Integer phase to insert after
        after: u32,

        /// Phase name
        description: String,

        /// Phase goal
        #[arg(short, long)]
        goal: Option<String>,
    },

    /// Check a phase's verification gate
    Gate {
        /// Phase number
        phase: PhaseNumber,
    },
}

#[derive(Subcommand)]
enum StateOperation {
    /// Show the current position
    Position,

    /// Show or update session continuity
    Session {
        /// Where work stopped
        #[arg(long)]
        stopped_at: Option<String>,

        /// File to resume from
        #[arg(long)]
        resume_file: Option<String>,

        /// Last error encountered
        #[arg(long)]
        last_error: Option<String>,
    },

    /// Update fields of the current position
    Update {
        #[arg(long)]
        phase: Option<u32>,

        #[arg(long)]
        total_phases: Option<u32>,

        #[arg(long)]
        phase_name: Option<String>,

        #[arg(long)]
        plan: Option<u32>,

        #[arg(long)]
        total_plans: Option<u32>,

        #[arg(long)]
        status: Option<String>,

        #[arg(long)]
        last_activity: Option<String>,

        /// Progress percentage, 0-100
        #[arg(long)]
        progress: Option<u32>,
    },

    /// Move to the next plan of the current phase
    Advance,

    /// Record a finished plan's metrics
    Metric {
        /// Phase identifier (`03`)
        phase: String,

        /// Plan identifier (`01`)
        plan: String,

        /// Duration (`12min`)
        duration: String,

        #[arg(long, default_value_t = 0)]
        tasks: u32,

        #[arg(long, default_value_t = 0)]
        files: u32,
    },

    /// Record a decision
    Decision {
        /// Phase identifier
        phase: String,

        /// Decision text
        text: String,
    },
}

#[derive(Subcommand)]
enum StashOperation {
    /// Stash local changes and record the ref in STATE.md
    Pause {
        /// What was being worked on
        description: String,
    },

    /// Pop a pause stash (defaults to the ref recorded in STATE.md)
    Resume {
        /// Stash reference (`stash@{0}`)
        stash_ref: Option<String>,
    },
}

#[derive(Subcommand)]
enum MilestoneOperation {
    /// Write MILESTONE.md for a new milestone
    Create {
        /// Version (`v1.0`)
        #[arg(value_name = "VERSION")]
        milestone_version: String,

        /// Milestone name
        name: String,

        /// Phases covered by the milestone
        #[arg(long, value_delimiter = ',')]
        phases: Vec<u32>,
    },

    /// Show the active milestone
    Show,

    /// Archive a finished milestone
    Archive {
        /// Version to archive
        #[arg(value_name = "VERSION")]
        milestone_version: String,

        /// Skip copying the phases directory
        #[arg(long)]
        no_phases: bool,

        /// Skip the git tag
        #[arg(long)]
        no_tag: bool,
    },

    /// Check verification status of the milestone's phases
    Audit {
        /// Phases to audit (defaults to the active milestone's phases)
        #[arg(long, value_delimiter = ',')]
        phases: Vec<u32>,
    },
}

#[derive(Subcommand)]
enum OwnershipOperation {
    /// Build a manifest from a phase's plans
    Generate {
        /// Phase number
        phase: PhaseNumber,

        /// Agent name prefix
        #[arg(long, default_value = DEFAULT_AGENT_PREFIX)]
        prefix: String,

        /// Write the manifest to this file
        #[arg(short, long)]
        output: Option<PathBuf>,
    },

    /// Check whether an agent may modify a file
    Check {
        /// Manifest file
        #[arg(short, long)]
        manifest: PathBuf,

        /// Agent name
        agent: String,

        /// File path
        file: String,
    },
}

#[derive(Subcommand)]
enum ConfigOperation {
    /// Show the project config
    Show,

    /// Resolve the model for an agent role
    Model {
        /// Agent role (researcher, planner, executor, reviewer, verifier, mapper)
        role: AgentRole,
    },

    /// Convert a legacy config.json to the current format
    Migrate {
        /// Project name (defaults to the root directory name)
        #[arg(long)]
        name: Option<String>,
    },
}

fn main() {
    let cli = Cli::parse();

    // Setup logging
    let filter = if cli.verbose { EnvFilter::new("debug") } else { EnvFilter::new("warn") };
    tracing_subscriber::registry()
        .with(fmt::layer().with_target(false).with_writer(io::stderr))
        .with(filter)
        .init();

    if let Commands::Completions { shell } = cli.command {
        cmd_completions(shell);
        return;
    }

    match run(cli) {
        Ok(value) => print_json(&value),
        Err(e) => {
            tracing::debug!(error = ?e, "Command failed");
            print_json(&json!({ "error": format!("{e:#}") }));
            std::process::exit(1);
        }
    }
}

fn run(cli: Cli) -> Result<Value> {
    let ctx = WorkflowContext::load(&cli.root)?;

    match cli.command {
        Commands::Init { name, preset } => to_json(ctx.init(&name, preset)?),
        Commands::Plan { operation } => cmd_plan(&ctx, operation),
        Commands::Roadmap { operation } => cmd_roadmap(&ctx, operation),
        Commands::State { operation } => cmd_state(&ctx, operation),
        Commands::Stash { operation } => cmd_stash(&ctx, operation),
        Commands::Progress => to_json(calculate_progress(&ctx.planning_dir)?),
        Commands::Milestone { operation } => cmd_milestone(&ctx, operation),
        Commands::Ownership { operation } => cmd_ownership(&ctx, operation),
        Commands::Config { operation } => cmd_config(&ctx, operation),
        Commands::Completions { .. } => Ok(Value::Null),
    }
}

fn to_json(value: impl Serialize) -> Result<Value> {
    Ok(serde_json::to_value(value)?)
}

fn print_json(value: &Value) {
    match serde_json::to_string_pretty(value) {
        Ok(text) => println!("{text}"),
        Err(e) => eprintln!("Failed to render output: {e}"),
    }
}

/// Plan file with its completion flag.
#[derive(Serialize)]
struct PlanEntry<'a> {
    id: String,
    complete: bool,

    #[serde(flatten)]
    plan: &'a PlanFile,
}

fn cmd_plan(ctx: &WorkflowContext, operation: PlanOperation) -> Result<Value> {
    match operation {
        PlanOperation::List { phase } => {
            let catalog = ctx.plans(phase)?;
            let plans = catalog.list_all()?;
            let entries: Vec<PlanEntry<'_>> = plans
                .iter()
                .map(|plan| PlanEntry {
                    id: plan.descriptor.id(),
                    complete: catalog.is_complete(&plan.descriptor),
                    plan,
                })
                .collect();
            to_json(entries)
        }
        PlanOperation::Waves { phase } => {
            let plans = ctx.plans(phase)?.list_all()?;
            let waves = compute_waves(&plans);
            Ok(json!({ "waves": waves, "conflicts": wave_conflicts(&waves) }))
        }
        PlanOperation::Conflicts { phase } => {
            let plans = ctx.plans(phase)?.list_all()?;
            to_json(detect_conflicts(&plans))
        }
        PlanOperation::Incomplete { phase } => to_json(ctx.plans(phase)?.incomplete()?),
    }
}

fn cmd_roadmap(ctx: &WorkflowContext, operation: RoadmapOperation) -> Result<Value> {
    let roadmap = ctx.roadmap();
    match operation {
        RoadmapOperation::List => to_json(roadmap.phases_with_position()?),
        RoadmapOperation::Add { description, goal } => {
            to_json(roadmap.add_phase(&description, goal.as_deref())?)
        }
        RoadmapOperation::Remove { phase } => to_json(roadmap.remove_phase(phase)?),
        RoadmapOperation::Insert { after, description, goal } => {
            to_json(roadmap.insert_phase(after, &description, goal.as_deref())?)
        }
        RoadmapOperation::Gate { phase } => to_json(roadmap.check_verification_gate(phase)),
    }
}

fn cmd_state(ctx: &WorkflowContext, operation: StateOperation) -> Result<Value> {
    let state = ctx.state();
    match operation {
        StateOperation::Position => to_json(state.read_position()?),
        StateOperation::Session { stopped_at, resume_file, last_error } => {
            if stopped_at.is_none() && resume_file.is_none() && last_error.is_none() {
                return to_json(state.read_session_continuity()?);
            }
            let updated = state.update_session_continuity(SessionUpdate {
                last_session: Some(today()),
                stopped_at,
                resume_file,
                last_error: last_error.map(Some),
                ..SessionUpdate::default()
            })?;
            Ok(json!({ "updated": updated }))
        }
        StateOperation::Update {
            phase,
            total_phases,
            phase_name,
            plan,
            total_plans,
            status,
            last_activity,
            progress,
        } => {
            let updated = state.update_position(PositionUpdate {
                phase,
                total_phases,
                phase_name,
                plan,
                total_plans,
                status,
                last_activity,
                progress_percent: progress,
            })?;
            Ok(json!({ "updated": updated }))
        }
        StateOperation::Advance => to_json(state.advance_plan()?),
        StateOperation::Metric { phase, plan, duration, tasks, files } => {
            let recorded = state.record_metric(&phase, &plan, &duration, tasks, files)?;
            Ok(json!({ "recorded": recorded }))
        }
        StateOperation::Decision { phase, text } => {
            let recorded = state.add_decision(&phase, &text)?;
            Ok(json!({ "recorded": recorded }))
        }
    }
}

fn git_runner(ctx: &WorkflowContext) -> Executor {
    Executor::new().timeout(ctx.config.git_timeout()).working_dir(&ctx.root)
}

fn cmd_stash(ctx: &WorkflowContext, operation: StashOperation) -> Result<Value> {
    let runner = git_runner(ctx);
    let git = GitRepository::new(&ctx.root, &runner);
    let state = ctx.state();

    match operation {
        StashOperation::Pause { description } => {
            let result = stash_pause(&git, &ctx.config.git.stash_tag, &description);
            if let Some(stash_ref) = result.stash_ref.clone().filter(|_| result.success) {
                state.update_session_continuity(SessionUpdate {
                    last_session: Some(today()),
                    stopped_at: Some(description),
                    stash_ref: Some(Some(stash_ref)),
                    ..SessionUpdate::default()
                })?;
            }
            to_json(result)
        }
        StashOperation::Resume { stash_ref } => {
            let stash_ref = match stash_ref {
                Some(r) => r,
                None => state
                    .read_session_continuity()?
                    .and_then(|s| s.stash_ref)
                    .context("No stash ref given and none recorded in STATE.md")?,
            };

            let result = stash_resume(&git, &stash_ref);
            if result.success {
                state.update_session_continuity(SessionUpdate {
                    stash_ref: Some(None),
                    ..SessionUpdate::default()
                })?;
            }
            to_json(result)
        }
    }
}

fn cmd_milestone(ctx: &WorkflowContext, operation: MilestoneOperation) -> Result<Value> {
    let milestones = ctx.milestones();
    match operation {
        MilestoneOperation::Create { milestone_version, name, phases } => {
            to_json(milestones.create(&milestone_version, &name, &phases)?)
        }
        MilestoneOperation::Show => to_json(milestones.current()?),
        MilestoneOperation::Archive { milestone_version, no_phases, no_tag } => {
            let runner = git_runner(ctx);
            let git = GitRepository::new(&ctx.root, &runner);
            let git = (!no_tag && git.is_repository()).then_some(&git);
            let include_phases = ctx.config.milestone.archive_phases && !no_phases;
            to_json(milestones.archive(&milestone_version, include_phases, git)?)
        }
        MilestoneOperation::Audit { phases } => {
            let phases = if phases.is_empty() { default_audit_phases(ctx)? } else { phases };
            to_json(milestones.audit(&phases))
        }
    }
}

/// Phases of the active milestone, else every integer roadmap phase.
fn default_audit_phases(ctx: &WorkflowContext) -> Result<Vec<u32>> {
    if let Some(record) = ctx.milestones().current()?.filter(|r| !r.phases.is_empty()) {
        return Ok(record.phases);
    }
    Ok(ctx
        .roadmap()
        .parse_phases()?
        .iter()
        .filter(|p| p.number.is_integer())
        .map(|p| p.number.base())
        .collect())
}

fn cmd_ownership(ctx: &WorkflowContext, operation: OwnershipOperation) -> Result<Value> {
    match operation {
        OwnershipOperation::Generate { phase, prefix, output } => {
            let plans = ctx.plans(phase)?.list_all()?;
            let manifest = generate_manifest(&plans, &prefix);
            if let Some(path) = output {
                write_manifest(&manifest, &path)?;
            }
            to_json(manifest)
        }
        OwnershipOperation::Check { manifest, agent, file } => {
            let content = std::fs::read_to_string(&manifest)
                .with_context(|| format!("Failed to read manifest {}", manifest.display()))?;
            let parsed: OwnershipManifest = serde_json::from_str(&content)
                .with_context(|| format!("Invalid manifest {}", manifest.display()))?;
            to_json(validate_file_access(&parsed, &agent, &file))
        }
    }
}

fn cmd_config(ctx: &WorkflowContext, operation: ConfigOperation) -> Result<Value> {
    match operation {
        ConfigOperation::Show => to_json(ctx.project_config()?),
        ConfigOperation::Model { role } => {
            let model = ctx.project_config()?.resolve_agent_model(role);
            Ok(json!({ "role": role, "model": model }))
        }
        ConfigOperation::Migrate { name } => {
            let legacy = detect_legacy(&ctx.planning_dir)?
                .context("No legacy config.json found in the planning directory")?;
            let name = name.unwrap_or_else(|| root_name(&ctx.root));
            let config = migrate_legacy(legacy, name);
            let path = config.save(&ctx.planning_dir)?;
            Ok(json!({ "migrated": true, "path": path, "config": config }))
        }
    }
}

fn root_name(root: &Path) -> String {
    root.canonicalize()
        .ok()
        .and_then(|p| p.file_name().map(|n| n.to_string_lossy().into_owned()))
        .unwrap_or_else(|| "project".to_string())
}

fn today() -> String {
    chrono::Utc::now().format("%Y-%m-%d").to_string()
}

/// Generate shell completions.
fn cmd_completions(shell: Shell) {
    let mut cmd = Cli::command();
    generate(shell, &mut cmd, "phasekit", &mut io::stdout());
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cli_definition_is_valid() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_milestone_version_is_positional() {
        let cli = Cli::parse_from(["phasekit", "milestone", "archive", "1.10", "--no-tag"]);
        match cli.command {
            Commands::Milestone {
                operation: MilestoneOperation::Archive { milestone_version, no_tag, .. },
            } => {
                assert_eq!(milestone_version, "1.10");
                assert!(no_tag);
            }
            _ => panic!("expected milestone archive"),
        }
    }
}
