//! `STATE.md`: current position, session continuity, metrics and decisions.
//!
//! Only the sections an operation owns are rewritten; every other section is
//! preserved as-is. Mutations on a planning directory without a STATE.md are
//! no-ops and report `false`.

use std::path::PathBuf;

use once_cell::sync::Lazy;
use regex::Regex;
use serde::Serialize;

use super::error::WorkflowResult;
use super::progress::calculate_progress;
use super::sections::{extract_field, extract_section, replace_section};
use crate::core::paths::STATE_FILE;

const POSITION_HEADING: &str = "Current Position";
const CONTINUITY_HEADING: &str = "Session Continuity";

/// Sentinel written for absent optional fields.
const NONE_SENTINEL: &str = "None";

const UNKNOWN_STATUS: &str = "Unknown";
const PHASE_COMPLETE_STATUS: &str = "Phase complete";

/// `N of M (Name)`, each part after the first optional.
static PHASE_LINE_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^(\d+)(?:\s+of\s+(\d+))?(?:\s*\(([^)]+)\))?").unwrap());

/// `N of M`, the second part optional.
static COUNT_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"^(\d+)(?:\s+of\s+(\d+))?").unwrap());

static PERCENT_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"(\d+)%").unwrap());

/// Where the project currently stands.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct StatePosition {
    pub phase: u32,
    pub total_phases: u32,
    pub phase_name: String,
    pub plan: u32,
    pub total_plans: u32,
    pub status: String,
    pub last_activity: String,
    pub progress_percent: u32,
}

impl StatePosition {
    fn parse(lines: &[&str]) -> Option<Self> {
        let phase_line = extract_field(lines, "Phase")?;
        let phase = PHASE_LINE_RE.captures(&phase_line);
        let number = |i: usize| {
            phase.as_ref().and_then(|c| c.get(i)).and_then(|m| m.as_str().parse().ok())
        };

        let plan_line = extract_field(lines, "Plan").unwrap_or_default();
        let plan = COUNT_RE.captures(&plan_line);
        let plan_number =
            |i: usize| plan.as_ref().and_then(|c| c.get(i)).and_then(|m| m.as_str().parse().ok());

        let progress_percent = lines
            .iter()
            .find(|l| l.trim_start().starts_with("Progress:"))
            .and_then(|l| PERCENT_RE.captures(l))
            .and_then(|c| c[1].parse().ok())
            .unwrap_or(0);

        Some(Self {
            phase: number(1).unwrap_or(0),
            total_phases: number(2).unwrap_or(0),
            phase_name: phase
                .as_ref()
                .and_then(|c| c.get(3))
                .map(|m| m.as_str().trim().to_string())
                .unwrap_or_default(),
            plan: plan_number(1).unwrap_or(0),
            total_plans: plan_number(2).unwrap_or(0),
            status: extract_field(lines, "Status").unwrap_or_else(|| UNKNOWN_STATUS.to_string()),
            last_activity: extract_field(lines, "Last activity").unwrap_or_default(),
            progress_percent,
        })
    }

    fn render(&self) -> String {
        let suffix = if self.status == UNKNOWN_STATUS {
            String::new()
        } else {
            format!(" -- {}", self.status)
        };
        [
            format!(
                "Phase: {} of {} ({}){suffix}",
                self.phase, self.total_phases, self.phase_name
            ),
            format!("Plan: {} of {} in current phase", self.plan, self.total_plans),
            format!("Status: {}", self.status),
            format!("Last activity: {}", self.last_activity),
            String::new(),
            format!("Progress: {}", progress_bar(i64::from(self.progress_percent))),
        ]
        .join("\n")
    }

    fn apply(&mut self, update: PositionUpdate) {
        let PositionUpdate {
            phase,
            total_phases,
            phase_name,
            plan,
            total_plans,
            status,
            last_activity,
            progress_percent,
        } = update;

        if let Some(v) = phase {
            self.phase = v;
        }
        if let Some(v) = total_phases {
            self.total_phases = v;
        }
        if let Some(v) = phase_name {
            self.phase_name = v;
        }
        if let Some(v) = plan {
            self.plan = v;
        }
        if let Some(v) = total_plans {
            self.total_plans = v;
        }
        if let Some(v) = status {
            self.status = v;
        }
        if let Some(v) = last_activity {
            self.last_activity = v;
        }
        if let Some(v) = progress_percent {
            self.progress_percent = v.min(100);
        }
    }
}

/// Partial update for [`StatePosition`]; `None` keeps the current value.
#[derive(Debug, Clone, Default)]
pub struct PositionUpdate {
    pub phase: Option<u32>,
    pub total_phases: Option<u32>,
    pub phase_name: Option<String>,
    pub plan: Option<u32>,
    pub total_plans: Option<u32>,
    pub status: Option<String>,
    pub last_activity: Option<String>,
    pub progress_percent: Option<u32>,
}

/// Where the last session stopped.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct SessionContinuity {
    pub last_session: String,
    pub stopped_at: String,
    pub resume_file: String,
    pub stash_ref: Option<String>,
    pub last_error: Option<String>,
}

impl SessionContinuity {
    fn parse(lines: &[&str]) -> Self {
        let optional = |field: &str| {
            extract_field(lines, field).filter(|v| !v.eq_ignore_ascii_case(NONE_SENTINEL))
        };
        Self {
            last_session: extract_field(lines, "Last session").unwrap_or_default(),
            stopped_at: extract_field(lines, "Stopped at").unwrap_or_default(),
            resume_file: extract_field(lines, "Resume file").unwrap_or_default(),
            stash_ref: optional("Stash ref"),
            last_error: optional("Last error"),
        }
    }

    fn render(&self) -> String {
        [
            format!("Last session: {}", self.last_session),
            format!("Stopped at: {}", self.stopped_at),
            format!("Resume file: {}", self.resume_file),
            format!("Stash ref: {}", self.stash_ref.as_deref().unwrap_or(NONE_SENTINEL)),
            format!("Last error: {}", self.last_error.as_deref().unwrap_or(NONE_SENTINEL)),
        ]
        .join("\n")
    }
}

/// Partial update for [`SessionContinuity`].
///
/// For the optional fields, `Some(None)` clears the value.
#[derive(Debug, Clone, Default)]
pub struct SessionUpdate {
    pub last_session: Option<String>,
    pub stopped_at: Option<String>,
    pub resume_file: Option<String>,
    pub stash_ref: Option<Option<String>>,
    pub last_error: Option<Option<String>>,
}

/// Result of [`StateDocument::advance_plan`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AdvancePlanResult {
    pub success: bool,
    pub plan: u32,
    pub total_plans: u32,
    pub is_last: bool,
}

/// Render a 20-glyph progress bar, e.g. `[████████░░░░░░░░░░░░] 40%`.
pub fn progress_bar(percent: i64) -> String {
    let clamped = percent.clamp(0, 100);
    let filled = ((clamped + 2) / 5) as usize;
    format!("[{}{}] {clamped}%", "\u{2588}".repeat(filled), "\u{2591}".repeat(20 - filled))
}

/// Leading integer of a duration such as `"12min"`.
fn duration_minutes(duration: &str) -> u32 {
    let digits: String = duration.trim().chars().take_while(char::is_ascii_digit).collect();
    digits.parse().unwrap_or(0)
}

/// Value after a `- Label:` bullet.
fn bullet_value<'a>(line: &'a str, label: &str) -> Option<&'a str> {
    line.strip_prefix('-')?.trim_start().strip_prefix(label)?.strip_prefix(':').map(str::trim)
}

fn leading_number(text: &str) -> Option<f64> {
    let number: String =
        text.chars().take_while(|c| c.is_ascii_digit() || *c == '.').collect();
    number.parse().ok()
}

/// Handle on a planning directory's `STATE.md`.
#[derive(Debug, Clone)]
pub struct StateDocument {
    planning_dir: PathBuf,
}

impl StateDocument {
    /// Create a handle for the state document inside `planning_dir`.
    pub fn new(planning_dir: impl Into<PathBuf>) -> Self {
        Self { planning_dir: planning_dir.into() }
    }

    /// Path to `STATE.md`.
    pub fn path(&self) -> PathBuf {
        self.planning_dir.join(STATE_FILE)
    }

    /// Read the document, `None` if it doesn't exist.
    pub fn read(&self) -> WorkflowResult<Option<String>> {
        let path = self.path();
        if !path.exists() {
            return Ok(None);
        }
        Ok(Some(std::fs::read_to_string(path)?))
    }

    fn write(&self, content: &str) -> WorkflowResult<()> {
        std::fs::write(self.path(), content)?;
        Ok(())
    }

    /// Parse the current position. `None` without a STATE.md or `Phase:` line.
    pub fn read_position(&self) -> WorkflowResult<Option<StatePosition>> {
        let Some(content) = self.read()? else {
            return Ok(None);
        };
        let lines = extract_section(&content, POSITION_HEADING).unwrap_or_default();
        Ok(StatePosition::parse(&lines))
    }

    /// Parse the session continuity fields. `None` without a STATE.md.
    pub fn read_session_continuity(&self) -> WorkflowResult<Option<SessionContinuity>> {
        let Some(content) = self.read()? else {
            return Ok(None);
        };
        let lines = extract_section(&content, CONTINUITY_HEADING).unwrap_or_default();
        Ok(Some(SessionContinuity::parse(&lines)))
    }

    /// Merge `update` into the current position and rewrite the section.
    pub fn update_position(&self, update: PositionUpdate) -> WorkflowResult<bool> {
        let Some(content) = self.read()? else {
            return Ok(false);
        };
        let lines = extract_section(&content, POSITION_HEADING).unwrap_or_default();
        let Some(mut position) = StatePosition::parse(&lines) else {
            tracing::debug!("No current position to update");
            return Ok(false);
        };

        position.apply(update);
        self.write(&replace_section(&content, POSITION_HEADING, &position.render()))?;
        tracing::debug!(phase = position.phase, plan = position.plan, "Updated position");
        Ok(true)
    }

    /// Merge `update` into session continuity and rewrite the section.
    pub fn update_session_continuity(&self, update: SessionUpdate) -> WorkflowResult<bool> {
        let Some(content) = self.read()? else {
            return Ok(false);
        };
        let lines = extract_section(&content, CONTINUITY_HEADING).unwrap_or_default();
        let mut session = SessionContinuity::parse(&lines);

        if let Some(v) = update.last_session {
            session.last_session = v;
        }
        if let Some(v) = update.stopped_at {
            session.stopped_at = v;
        }
        if let Some(v) = update.resume_file {
            session.resume_file = v;
        }
        if let Some(v) = update.stash_ref {
            session.stash_ref = v;
        }
        if let Some(v) = update.last_error {
            session.last_error = v;
        }

        self.write(&replace_section(&content, CONTINUITY_HEADING, &session.render()))?;
        tracing::debug!("Updated session continuity");
        Ok(true)
    }

    /// Move to the next plan and refresh the progress bar.
    pub fn advance_plan(&self) -> WorkflowResult<AdvancePlanResult> {
        let Some(current) = self.read_position()? else {
            return Ok(AdvancePlanResult { success: false, plan: 0, total_plans: 0, is_last: false });
        };

        let plan = current.plan + 1;
        let is_last = plan >= current.total_plans;
        let progress = calculate_progress(&self.planning_dir)?;

        self.update_position(PositionUpdate {
            plan: Some(plan),
            progress_percent: Some(progress.overall),
            status: is_last.then(|| PHASE_COMPLETE_STATUS.to_string()),
            ..PositionUpdate::default()
        })?;

        tracing::info!(plan, total = current.total_plans, is_last, "Advanced plan");
        Ok(AdvancePlanResult { success: true, plan, total_plans: current.total_plans, is_last })
    }

    /// Record a finished plan's duration in the performance metrics.
    pub fn record_metric(
        &self,
        phase: &str,
        plan: &str,
        duration: &str,
        tasks: u32,
        files: u32,
    ) -> WorkflowResult<bool> {
        let Some(content) = self.read()? else {
            return Ok(false);
        };
        let minutes = duration_minutes(duration);
        let mut lines: Vec<String> = content.split('\n').map(str::to_string).collect();

        update_by_phase_table(&mut lines, phase, minutes);
        update_velocity(&mut lines, minutes);

        self.write(&lines.join("\n"))?;
        tracing::info!(phase, plan, minutes, tasks, files, "Recorded plan metrics");
        Ok(true)
    }

    /// Append `- Phase {phase}: {decision}` to the decisions list.
    pub fn add_decision(&self, phase: &str, decision: &str) -> WorkflowResult<bool> {
        let Some(content) = self.read()? else {
            return Ok(false);
        };
        let mut lines: Vec<String> = content.split('\n').map(str::to_string).collect();

        let Some(heading) = lines.iter().position(|l| l.trim() == "### Decisions") else {
            tracing::debug!("No decisions list in STATE.md");
            return Ok(false);
        };

        let last_decision = lines[heading + 1..]
            .iter()
            .take_while(|l| !l.starts_with("### ") && !l.starts_with("## "))
            .enumerate()
            .filter(|(_, l)| l.starts_with("- "))
            .map(|(i, _)| heading + 1 + i)
            .last()
            .unwrap_or(heading);

        lines.insert(last_decision + 1, format!("- Phase {phase}: {decision}"));
        self.write(&lines.join("\n"))?;
        tracing::debug!(phase, "Recorded decision");
        Ok(true)
    }
}

/// Update or create the phase's row in the `**By Phase:**` table.
fn update_by_phase_table(lines: &mut Vec<String>, phase: &str, minutes: u32) {
    let Some(marker) = lines.iter().position(|l| l.contains("**By Phase:**")) else {
        tracing::debug!("No By Phase table in STATE.md");
        return;
    };
    let Some(start) = lines[marker + 1..]
        .iter()
        .position(|l| !l.trim().is_empty())
        .map(|offset| marker + 1 + offset)
        .filter(|&i| lines[i].starts_with('|'))
    else {
        return;
    };
    let end = start + lines[start..].iter().take_while(|l| l.starts_with('|')).count();

    let existing = (start..end).find(|&i| {
        lines[i].strip_prefix('|').and_then(|r| r.split('|').next()).map(str::trim)
            == Some(phase)
    });

    match existing {
        Some(i) => {
            let cells: Vec<&str> = lines[i].trim().trim_matches('|').split('|').map(str::trim).collect();
            let plans = cells.get(1).and_then(|c| c.parse::<u32>().ok());
            let total = cells
                .get(2)
                .and_then(|c| c.strip_suffix("min"))
                .and_then(|c| c.trim().parse::<u32>().ok());

            let (Some(plans), Some(total)) = (plans, total) else {
                tracing::warn!(phase, row = %lines[i], "Unparseable metrics row, leaving it");
                return;
            };

            let plans = plans + 1;
            let total = total + minutes;
            let average = if total % plans == 0 {
                format!("{}", total / plans)
            } else {
                format!("{:.1}", f64::from(total) / f64::from(plans))
            };
            lines[i] = format!("| {phase} | {plans} | {total}min | {average}min |");
        }
        None => {
            lines.insert(end, format!("| {phase} | 1 | {minutes}min | {minutes}min |"));
        }
    }
}

/// Update the velocity totals and recompute the average duration.
fn update_velocity(lines: &mut [String], minutes: u32) {
    let mut total_plans: Option<u32> = None;
    let mut total_hours: Option<f64> = None;

    for line in lines.iter_mut() {
        if let Some(count) =
            bullet_value(line, "Total plans completed").and_then(leading_number)
        {
            let updated = count as u32 + 1;
            *line = format!("- Total plans completed: {updated}");
            total_plans = Some(updated);
        } else if let Some(hours) =
            bullet_value(line, "Total execution time").and_then(leading_number)
        {
            let updated = hours + f64::from(minutes) / 60.0;
            *line = format!("- Total execution time: {updated:.2} hours");
            total_hours = Some(updated);
        }
    }

    let (Some(plans), Some(hours)) = (total_plans, total_hours) else {
        return;
    };
    let hours: f64 = format!("{hours:.2}").parse().unwrap_or(hours);
    let average = (hours * 60.0 / f64::from(plans.max(1))).round() as u32;

    for line in lines.iter_mut() {
        if bullet_value(line, "Average duration").is_some() {
            *line = format!("- Average duration: {average}min");
        }
    }
}
