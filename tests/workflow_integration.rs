//! Integration tests for the planning engine.
//!
//! Drives a planning directory through a project lifecycle using only the
//! public library API.

use std::fs;
use std::path::Path;

use phasekit::core::Config;
use phasekit::workflow::{
    calculate_progress, compute_waves, detect_conflicts, PhaseNumber, PhaseStatus, PositionUpdate,
    Preset, SessionUpdate, WorkflowContext, WorkflowError,
};
use tempfile::TempDir;

fn write_plan(dir: &Path, phase: &str, plan: u32, wave: u32, files: &[&str]) {
    let prefix = phase.split('-').next().unwrap();
    let files = files.iter().map(|f| format!("  - {f}\n")).collect::<String>();
    fs::write(
        dir.join(format!("{prefix}-{plan:02}-PLAN.md")),
        format!("---\nphase: {phase}\nplan: {plan}\nwave: {wave}\nfiles_modified:\n{files}---\n\n# Plan {plan}\n"),
    )
    .unwrap();
}

fn context() -> (TempDir, WorkflowContext) {
    let temp = TempDir::new().unwrap();
    let ctx = WorkflowContext::new(temp.path(), Config::default());
    ctx.init("Lifecycle", Some(Preset::Strict)).unwrap();
    (temp, ctx)
}

#[test]
fn test_project_lifecycle() {
    let (_temp, ctx) = context();
    let roadmap = ctx.roadmap();

    let first = roadmap.add_phase("Foundation", Some("Scaffold")).unwrap();
    let second = roadmap.add_phase("Core Engine", Some("Parse documents")).unwrap();
    roadmap.add_phase("Release", None).unwrap();
    assert_eq!((first.phase_number, second.phase_number), (1, 2));

    // Two waves in phase 2, with a shared file inside wave 1.
    write_plan(&second.directory, "02-core-engine", 1, 1, &["src/a.rs", "src/shared.rs"]);
    write_plan(&second.directory, "02-core-engine", 2, 1, &["src/shared.rs"]);
    write_plan(&second.directory, "02-core-engine", 3, 2, &["src/b.rs"]);

    let plans = ctx.plans(PhaseNumber::Integer(2)).unwrap().list_all().unwrap();
    let waves = compute_waves(&plans);
    assert_eq!(waves.len(), 2);
    assert_eq!(waves[0].plans.len(), 2);
    assert_eq!(detect_conflicts(&waves[0].plans)["src/shared.rs"], vec!["02-01", "02-02"]);

    ctx.state()
        .update_position(PositionUpdate {
            phase: Some(2),
            total_phases: Some(3),
            phase_name: Some("Core Engine".to_string()),
            plan: Some(0),
            total_plans: Some(3),
            status: Some("Executing".to_string()),
            ..PositionUpdate::default()
        })
        .unwrap();

    // Finish plan 1 and advance.
    fs::write(second.directory.join("02-01-SUMMARY.md"), "done\n").unwrap();
    let advanced = ctx.state().advance_plan().unwrap();
    assert!(advanced.success);
    assert_eq!(advanced.plan, 1);
    assert!(!advanced.is_last);

    let progress = calculate_progress(&ctx.planning_dir).unwrap();
    assert_eq!(progress.current_phase.completed, 1);
    assert_eq!(progress.current_phase.total, 3);
    assert_eq!(progress.overall, 11);

    // Phase 2 is in progress and can't be removed; phase 3 can.
    let err = roadmap.remove_phase(PhaseNumber::Integer(2)).unwrap_err();
    assert!(matches!(err, WorkflowError::Precondition(_)));
    roadmap.remove_phase(PhaseNumber::Integer(3)).unwrap();

    let phases = roadmap.phases_with_position().unwrap();
    assert_eq!(phases.len(), 2);
    assert_eq!(phases[1].status, PhaseStatus::InProgress);
}

#[test]
fn test_insert_then_remove_renumbers_following_phases() {
    let (_temp, ctx) = context();
    let roadmap = ctx.roadmap();
    for name in ["One", "Two", "Three", "Four"] {
        roadmap.add_phase(name, None).unwrap();
    }

    let inserted = roadmap.insert_phase(2, "Hotfix", Some("Patch it")).unwrap();
    assert_eq!(inserted.phase_number.to_string(), "2.1");
    assert!(inserted.directory.ends_with("phases/02.1-hotfix"));

    let removed = roadmap.remove_phase(PhaseNumber::Integer(3)).unwrap();
    assert_eq!(removed.renumbered.get(&4), Some(&3));

    let phases = roadmap.parse_phases().unwrap();
    let names: Vec<(String, String)> =
        phases.iter().map(|p| (p.number.to_string(), p.name.clone())).collect();
    assert_eq!(
        names,
        vec![
            ("1".to_string(), "One".to_string()),
            ("2".to_string(), "Two".to_string()),
            ("2.1".to_string(), "Hotfix".to_string()),
            ("3".to_string(), "Four".to_string()),
        ]
    );
    assert!(ctx.planning_dir.join("phases/03-four").is_dir());
    assert!(!ctx.planning_dir.join("phases/04-four").exists());
}

#[test]
fn test_session_continuity_round_trip() {
    let (_temp, ctx) = context();
    let state = ctx.state();

    state
        .update_session_continuity(SessionUpdate {
            stopped_at: Some("Plan 2 task 3".to_string()),
            stash_ref: Some(Some("stash@{0}".to_string())),
            ..SessionUpdate::default()
        })
        .unwrap();
    let session = state.read_session_continuity().unwrap().unwrap();
    assert_eq!(session.stopped_at, "Plan 2 task 3");
    assert_eq!(session.stash_ref.as_deref(), Some("stash@{0}"));

    state
        .update_session_continuity(SessionUpdate { stash_ref: Some(None), ..SessionUpdate::default() })
        .unwrap();
    let session = state.read_session_continuity().unwrap().unwrap();
    assert_eq!(session.stash_ref, None);
    assert_eq!(session.stopped_at, "Plan 2 task 3");
}

#[test]
fn test_milestone_archive_and_audit() {
    let (_temp, ctx) = context();
    let roadmap = ctx.roadmap();
    let one = roadmap.add_phase("One", None).unwrap();
    let two = roadmap.add_phase("Two", None).unwrap();

    fs::write(one.directory.join("01-VERIFICATION.md"), "---\nstatus: passed\n---\n").unwrap();
    fs::write(two.directory.join("02-VERIFICATION.md"), "---\nstatus: gaps_found\n---\n").unwrap();

    let milestones = ctx.milestones();
    milestones.create("v0.1", "Preview", &[1, 2]).unwrap();

    let report = milestones.audit(&milestones.current().unwrap().unwrap().phases);
    assert!(!report.all_passed);
    assert_eq!(report.failed_phases, vec![2]);
    assert!(report.missing_verification.is_empty());

    let archived = milestones.archive("v0.1", true, None).unwrap();
    assert!(!archived.tagged);
    assert!(ctx.planning_dir.join("milestones/v0.1-ROADMAP.md").is_file());
    assert!(ctx.planning_dir.join("milestones/v0.1-phases/01-one/01-VERIFICATION.md").is_file());

    let log = fs::read_to_string(ctx.planning_dir.join("milestones/MILESTONES.md")).unwrap();
    assert!(log.contains("| v0.1 |"));
}

#[test]
fn test_operations_on_empty_workspace() {
    let temp = TempDir::new().unwrap();
    let ctx = WorkflowContext::new(temp.path(), Config::default());

    assert!(ctx.roadmap().parse_phases().unwrap().is_empty());
    assert!(!ctx.state().update_position(PositionUpdate::default()).unwrap());
    assert!(ctx.milestones().current().unwrap().is_none());
    assert!(matches!(
        ctx.roadmap().add_phase("Anything", None),
        Err(WorkflowError::DocumentMissing(_))
    ));
    assert!(ctx.project_config().is_err());
}
