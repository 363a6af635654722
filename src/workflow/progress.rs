//! Overall project progress from the roadmap checklist and plan artifacts.

use std::path::Path;

use serde::Serialize;

use super::error::WorkflowResult;
use super::phase::{find_phase_dir, PhaseNumber};
use super::plan::PlanCatalog;
use super::roadmap::{PhaseStatus, RoadmapDocument};
use super::state::StateDocument;

/// Plan completion inside the current phase.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct PhaseProgress {
    pub completed: usize,
    pub total: usize,
}

/// Project progress snapshot.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct Progress {
    /// Whole-project percentage, 0-100
    pub overall: u32,

    /// Plans of the phase being worked on
    pub current_phase: PhaseProgress,
}

/// Compute progress for a planning directory.
///
/// Completed phases count fully; the current phase (STATE.md's position,
/// else the first unfinished one) counts by its share of finished plans.
pub fn calculate_progress(planning_dir: &Path) -> WorkflowResult<Progress> {
    let phases = RoadmapDocument::new(planning_dir).parse_phases()?;
    if phases.is_empty() {
        return Ok(Progress::default());
    }

    let total = phases.len();
    let completed = phases.iter().filter(|p| p.status == PhaseStatus::Completed).count();

    let current = match StateDocument::new(planning_dir).read_position()? {
        Some(position) => position.phase,
        None => u32::try_from(completed + 1).unwrap_or(u32::MAX),
    };

    let current_phase = find_phase_dir(planning_dir, PhaseNumber::Integer(current))
        .map(|dir| {
            let (done, plans) = PlanCatalog::new(dir).count_files();
            PhaseProgress { completed: done, total: plans }
        })
        .unwrap_or_default();

    let fraction = if current_phase.total > 0 {
        current_phase.completed as f64 / current_phase.total as f64
    } else {
        0.0
    };
    let overall = ((completed as f64 + fraction) / total as f64 * 100.0).round() as u32;

    tracing::debug!(overall, phase = current, "Calculated progress");
    Ok(Progress { overall, current_phase })
}
