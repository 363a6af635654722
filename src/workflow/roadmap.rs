//! `ROADMAP.md` parsing and phase management.
//!
//! The roadmap is edited as text: a checklist line per phase, a `### Phase N:`
//! detail block per phase, and a progress table. Every mutation is a full
//! read-modify-write of the document; anything it doesn't recognize is kept
//! byte-for-byte.

use std::collections::{BTreeMap, BTreeSet};
use std::path::PathBuf;

use once_cell::sync::Lazy;
use regex::{Captures, Regex};
use serde::Serialize;

use super::error::{WorkflowError, WorkflowResult};
use super::phase::{find_phase_dir, generate_slug, pad_phase, PhaseNumber};
use super::state::StateDocument;
use super::verification::{self, VerificationGate};
use crate::core::paths::{list_entries, safe_join, PHASES_DIR, ROADMAP_FILE};

/// `- [x] **Phase N: Name** - Description (completed DATE)`
static CHECKLIST_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(
        r"^-\s+\[([ xX])\]\s+\*\*Phase\s+([\d.]+):\s+(.+?)\*\*(?:\s*-\s*(.+?))?(?:\s*\(completed\s+(.+?)\))?\s*$",
    )
    .unwrap()
});

/// `Phase N:` definitions, used to find the highest integer phase.
static PHASE_DEF_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"Phase\s+(\d+):").unwrap());

/// Any `Phase N` or `Phase N.k` reference.
static PHASE_REF_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"Phase(\s+)(\d+)(\.\d+)?").unwrap());

/// Progress table row prefix: `| N. Name`.
static TABLE_ROW_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"^(\|\s*)(\d+)(\.\s)").unwrap());

const INSERTED_MARKER: &str = "(INSERTED)";
const TBD: &str = "TBD";

/// Phase status as recorded in the roadmap.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum PhaseStatus {
    Completed,
    InProgress,
    NotStarted,
}

/// A phase parsed from the roadmap checklist and its detail block.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RoadmapPhase {
    /// Phase number
    pub number: PhaseNumber,

    /// Display name
    pub name: String,

    /// Directory slug derived from the name
    pub slug: String,

    /// Checklist status
    pub status: PhaseStatus,

    /// Goal from the detail block, else the checklist description
    pub goal: String,

    /// Requirement identifiers
    pub requirements: Vec<String>,

    /// Raw `Depends on` text
    pub depends_on: String,

    /// Date from a `(completed DATE)` marker
    #[serde(skip_serializing_if = "Option::is_none")]
    pub completed_on: Option<String>,
}

/// Result of [`RoadmapDocument::add_phase`].
#[derive(Debug, Clone, Serialize)]
pub struct AddPhaseResult {
    pub phase_number: u32,
    pub padded: String,
    pub name: String,
    pub slug: String,
    pub directory: PathBuf,
}

/// Result of [`RoadmapDocument::remove_phase`].
#[derive(Debug, Clone, Serialize)]
pub struct RemovePhaseResult {
    /// The phase that was removed
    pub removed: PhaseNumber,

    /// Old number -> new number for every shifted phase
    pub renumbered: BTreeMap<u32, u32>,
}

/// Result of [`RoadmapDocument::insert_phase`].
#[derive(Debug, Clone, Serialize)]
pub struct InsertPhaseResult {
    pub phase_number: PhaseNumber,
    pub name: String,
    pub slug: String,
    pub directory: PathBuf,
}

/// One checklist line, borrowed from the document.
struct ChecklistEntry<'a> {
    checked: bool,
    number: PhaseNumber,
    name: &'a str,
    description: &'a str,
    completed_on: Option<&'a str>,
}

fn parse_checklist_line(line: &str) -> Option<ChecklistEntry<'_>> {
    let caps = CHECKLIST_RE.captures(line)?;
    let raw_number = caps.get(2)?.as_str();
    let Ok(number) = raw_number.parse::<PhaseNumber>() else {
        tracing::warn!(number = raw_number, "Skipping checklist line with bad phase number");
        return None;
    };

    let description = caps.get(4).map_or("", |m| m.as_str().trim());
    let description = description.strip_suffix(INSERTED_MARKER).unwrap_or(description).trim_end();

    Some(ChecklistEntry {
        checked: caps[1].eq_ignore_ascii_case("x"),
        number,
        name: caps.get(3)?.as_str().trim(),
        description,
        completed_on: caps.get(5).map(|m| m.as_str().trim()),
    })
}

/// Phase number of a `### Phase N: Name` detail heading.
fn detail_heading_number(line: &str) -> Option<PhaseNumber> {
    let rest = line.strip_prefix("### ")?.trim_start().strip_prefix("Phase")?;
    let (number, _) = rest.trim_start().split_once(':')?;
    number.parse().ok()
}

/// Phase number at the start of a progress table row (`| N. Name | ...`).
fn table_row_number(line: &str) -> Option<PhaseNumber> {
    let cell = line.strip_prefix('|')?.trim_start();
    let (number, _) = cell.split_once(". ")?;
    number.parse().ok()
}

/// Value of a `**Field**: value` line.
fn bold_field<'a>(line: &'a str, field: &str) -> Option<&'a str> {
    let value = line.strip_prefix("**")?.strip_prefix(field)?.strip_prefix("**:")?.trim();
    (!value.is_empty()).then_some(value)
}

fn is_heading(line: &str) -> bool {
    line.starts_with('#')
}

/// Insertion index for appending, keeping a trailing newline last.
fn end_index(lines: &[String]) -> usize {
    match lines.last() {
        Some(last) if last.is_empty() => lines.len() - 1,
        _ => lines.len(),
    }
}

/// Insert a block at `at`, padding it with blank lines only where needed.
fn splice_block(lines: &mut Vec<String>, at: usize, body: Vec<String>) {
    let mut block = Vec::with_capacity(body.len() + 2);
    if at > 0 && !lines[at - 1].trim().is_empty() {
        block.push(String::new());
    }
    block.extend(body);
    if at < lines.len() && !lines[at].trim().is_empty() {
        block.push(String::new());
    }
    lines.splice(at..at, block);
}

fn detail_block(number: PhaseNumber, name: &str, goal: &str, depends_on: &str) -> Vec<String> {
    vec![
        format!("### Phase {number}: {name}"),
        format!("**Goal**: {goal}"),
        format!("**Depends on**: {depends_on}"),
        format!("**Requirements**: {TBD}"),
        "**Success Criteria** (what must be TRUE):".to_string(),
        format!("  1. {TBD}"),
        "**Plans**: 0 plans".to_string(),
        String::new(),
        "Plans:".to_string(),
        "- (none yet)".to_string(),
    ]
}

/// Index of the last line of the progress table, if the document has one.
fn progress_table_end(lines: &[String]) -> Option<usize> {
    let header =
        lines.iter().position(|l| l.starts_with('|') && l.contains("Plans Complete"))?;
    let rows = lines[header + 1..].iter().take_while(|l| l.starts_with('|')).count();
    Some(header + rows)
}

/// Parse every phase from roadmap text, sorted by phase number.
pub fn parse_phases(content: &str) -> Vec<RoadmapPhase> {
    let lines: Vec<&str> = content.lines().collect();

    let mut phases: Vec<RoadmapPhase> = lines
        .iter()
        .filter_map(|line| parse_checklist_line(line))
        .map(|entry| {
            let mut phase = RoadmapPhase {
                number: entry.number,
                name: entry.name.to_string(),
                slug: generate_slug(entry.name),
                status: if entry.checked {
                    PhaseStatus::Completed
                } else {
                    PhaseStatus::NotStarted
                },
                goal: String::new(),
                requirements: Vec::new(),
                depends_on: String::new(),
                completed_on: entry.completed_on.map(str::to_string),
            };

            if let Some(start) =
                lines.iter().position(|l| detail_heading_number(l) == Some(entry.number))
            {
                for line in lines[start + 1..].iter().take_while(|l| !is_heading(l)) {
                    if let Some(goal) = bold_field(line, "Goal") {
                        phase.goal = goal.to_string();
                    } else if let Some(reqs) = bold_field(line, "Requirements") {
                        phase.requirements = reqs
                            .split(',')
                            .map(str::trim)
                            .filter(|r| !r.is_empty())
                            .map(str::to_string)
                            .collect();
                    } else if let Some(deps) = bold_field(line, "Depends on") {
                        phase.depends_on = deps.to_string();
                    }
                }
            }

            if phase.goal.is_empty() {
                phase.goal = entry.description.to_string();
            }
            phase
        })
        .collect();

    phases.sort_by(|a, b| a.number.cmp(&b.number));
    phases
}

/// Highest integer phase defined anywhere in the document.
fn max_integer_phase(content: &str) -> u32 {
    PHASE_DEF_RE
        .captures_iter(content)
        .filter_map(|c| c[1].parse::<u32>().ok())
        .max()
        .unwrap_or(0)
}

/// Rewrite integer phase references according to `map`.
///
/// Fractional references (`Phase 3.1`) are left alone.
fn renumber_references(content: &str, map: &BTreeMap<u32, u32>) -> String {
    let content = PHASE_REF_RE.replace_all(content, |caps: &Captures| {
        let renamed = caps
            .get(3)
            .is_none()
            .then(|| caps[2].parse::<u32>().ok().and_then(|old| map.get(&old)))
            .flatten();
        match renamed {
            Some(new) => format!("Phase{}{new}", &caps[1]),
            None => caps[0].to_string(),
        }
    });

    content
        .split('\n')
        .map(|line| {
            TABLE_ROW_RE
                .replace(line, |caps: &Captures| {
                    match caps[2].parse::<u32>().ok().and_then(|old| map.get(&old)) {
                        Some(new) => format!("{}{new}{}", &caps[1], &caps[3]),
                        None => caps[0].to_string(),
                    }
                })
                .into_owned()
        })
        .collect::<Vec<_>>()
        .join("\n")
}

/// Handle on a planning directory's `ROADMAP.md`.
#[derive(Debug, Clone)]
pub struct RoadmapDocument {
    planning_dir: PathBuf,
}

impl RoadmapDocument {
    /// Create a handle for the roadmap inside `planning_dir`.
    pub fn new(planning_dir: impl Into<PathBuf>) -> Self {
        Self { planning_dir: planning_dir.into() }
    }

    /// Path to `ROADMAP.md`.
    pub fn path(&self) -> PathBuf {
        self.planning_dir.join(ROADMAP_FILE)
    }

    fn phases_dir(&self) -> PathBuf {
        self.planning_dir.join(PHASES_DIR)
    }

    /// Read the roadmap, `None` if it doesn't exist.
    pub fn read(&self) -> WorkflowResult<Option<String>> {
        let path = self.path();
        if !path.exists() {
            return Ok(None);
        }
        Ok(Some(std::fs::read_to_string(path)?))
    }

    fn read_required(&self) -> WorkflowResult<String> {
        self.read()?.ok_or_else(|| WorkflowError::DocumentMissing(self.path()))
    }

    /// Parse all phases. A missing roadmap has no phases.
    pub fn parse_phases(&self) -> WorkflowResult<Vec<RoadmapPhase>> {
        Ok(self.read()?.map(|content| parse_phases(&content)).unwrap_or_default())
    }

    /// Parse all phases, marking STATE.md's current phase as in progress.
    pub fn phases_with_position(&self) -> WorkflowResult<Vec<RoadmapPhase>> {
        let mut phases = self.parse_phases()?;
        if let Some(position) = StateDocument::new(&self.planning_dir).read_position()? {
            let current = PhaseNumber::Integer(position.phase);
            for phase in phases.iter_mut().filter(|p| p.number == current) {
                if phase.status == PhaseStatus::NotStarted {
                    phase.status = PhaseStatus::InProgress;
                }
            }
        }
        Ok(phases)
    }

    /// Append a new integer phase after the highest existing one.
    pub fn add_phase(&self, description: &str, goal: Option<&str>) -> WorkflowResult<AddPhaseResult> {
        let content = self.read_required()?;
        let slug = slug_for(description)?;
        let goal = goal.map(str::trim).filter(|g| !g.is_empty()).unwrap_or(TBD);

        let previous = max_integer_phase(&content);
        let number = previous + 1;
        let padded = pad_phase(number);
        let directory = safe_join(&self.phases_dir(), format!("{padded}-{slug}"))?;

        let mut lines: Vec<String> = content.split('\n').map(str::to_string).collect();

        let checklist = format!("- [ ] **Phase {number}: {description}** - {goal}");
        if let Some(idx) = lines.iter().rposition(|l| parse_checklist_line(l).is_some()) {
            lines.insert(idx + 1, checklist);
        } else if let Some(idx) = lines.iter().position(|l| l.trim() == "## Phases") {
            splice_block(&mut lines, idx + 1, vec![checklist]);
        }

        let depends_on = if previous == 0 {
            "Nothing (first phase)".to_string()
        } else {
            format!("Phase {previous}")
        };
        let at = lines
            .iter()
            .position(|l| l.starts_with("## Progress"))
            .unwrap_or_else(|| end_index(&lines));
        splice_block(
            &mut lines,
            at,
            detail_block(PhaseNumber::Integer(number), description, goal, &depends_on),
        );

        if let Some(idx) = progress_table_end(&lines) {
            lines.insert(idx + 1, format!("| {number}. {description} | 0/0 | Not started | - |"));
        }

        std::fs::create_dir_all(&directory)?;
        std::fs::write(self.path(), lines.join("\n"))?;

        tracing::info!(phase = number, name = description, "Added phase");
        Ok(AddPhaseResult { phase_number: number, padded, name: description.to_string(), slug, directory })
    }

    /// Remove a phase that hasn't started, shifting later integer phases down.
    ///
    /// A phase is in progress when STATE.md's current position points at it.
    pub fn remove_phase(&self, number: PhaseNumber) -> WorkflowResult<RemovePhaseResult> {
        let content = self.read_required()?;
        let phases = parse_phases(&content);

        let target = phases
            .iter()
            .find(|p| p.number == number)
            .ok_or_else(|| WorkflowError::PhaseNotFound(number.to_string()))?;

        if target.status == PhaseStatus::Completed {
            return Err(WorkflowError::Precondition(format!(
                "Phase {number} is completed and cannot be removed"
            )));
        }
        if self.is_in_progress(number)? {
            return Err(WorkflowError::Precondition(format!(
                "Phase {number} is in-progress and cannot be removed"
            )));
        }

        let mut lines: Vec<String> = content.split('\n').map(str::to_string).collect();
        lines.retain(|l| parse_checklist_line(l).map_or(true, |e| e.number != number));

        if let Some(start) = lines.iter().position(|l| detail_heading_number(l) == Some(number)) {
            let end = lines[start + 1..]
                .iter()
                .position(|l| is_heading(l))
                .map_or_else(|| end_index(&lines), |offset| start + 1 + offset);
            lines.drain(start..end);
        }

        lines.retain(|l| table_row_number(l) != Some(number));

        let renumbered: BTreeMap<u32, u32> = match number {
            PhaseNumber::Integer(removed) => phases
                .iter()
                .filter_map(|p| match p.number {
                    PhaseNumber::Integer(n) if n > removed => Some((n, n - 1)),
                    _ => None,
                })
                .collect(),
            PhaseNumber::Decimal { .. } => BTreeMap::new(),
        };

        let mut updated = lines.join("\n");
        if !renumbered.is_empty() {
            updated = renumber_references(&updated, &renumbered);
        }
        std::fs::write(self.path(), updated)?;

        self.discard_phase_dir(number);
        self.rename_phase_dirs(&renumbered)?;

        tracing::info!(phase = %number, shifted = renumbered.len(), "Removed phase");
        Ok(RemovePhaseResult { removed: number, renumbered })
    }

    /// Insert a fractional phase after integer phase `after` without renumbering.
    pub fn insert_phase(
        &self,
        after: u32,
        description: &str,
        goal: Option<&str>,
    ) -> WorkflowResult<InsertPhaseResult> {
        let content = self.read_required()?;
        let phases = parse_phases(&content);
        let after_number = PhaseNumber::Integer(after);

        if !phases.iter().any(|p| p.number == after_number) {
            return Err(WorkflowError::PhaseNotFound(after.to_string()));
        }

        let slug = slug_for(description)?;
        let goal = goal.map(str::trim).filter(|g| !g.is_empty()).unwrap_or(TBD);

        let sub = self.next_fraction(&content, after);
        let number = PhaseNumber::Decimal { base: after, sub };
        let directory = safe_join(&self.phases_dir(), format!("{}-{slug}", number.dir_prefix()))?;

        let mut lines: Vec<String> = content.split('\n').map(str::to_string).collect();

        if let Some(idx) = lines
            .iter()
            .position(|l| parse_checklist_line(l).is_some_and(|e| e.number == after_number))
        {
            lines.insert(
                idx + 1,
                format!("- [ ] **Phase {number}: {description}** - {goal} {INSERTED_MARKER}"),
            );
        }

        let after_detail = lines
            .iter()
            .position(|l| detail_heading_number(l).is_some_and(|n| n == after_number));
        match after_detail {
            Some(start) => {
                let at = lines[start + 1..]
                    .iter()
                    .position(|l| l.starts_with("### ") || l.starts_with("## "))
                    .map_or_else(|| end_index(&lines), |offset| start + 1 + offset);
                splice_block(
                    &mut lines,
                    at,
                    detail_block(number, description, goal, &format!("Phase {after}")),
                );
            }
            None => tracing::debug!(phase = after, "No detail block to insert after"),
        }

        std::fs::create_dir_all(&directory)?;
        std::fs::write(self.path(), lines.join("\n"))?;

        tracing::info!(phase = %number, name = description, "Inserted phase");
        Ok(InsertPhaseResult { phase_number: number, name: description.to_string(), slug, directory })
    }

    /// Check whether a phase's verification lets the next phase proceed.
    pub fn check_verification_gate(&self, number: PhaseNumber) -> VerificationGate {
        verification::check_gate(&self.planning_dir, number)
    }

    fn is_in_progress(&self, number: PhaseNumber) -> WorkflowResult<bool> {
        let position = StateDocument::new(&self.planning_dir).read_position()?;
        Ok(position.is_some_and(|p| PhaseNumber::Integer(p.phase) == number))
    }

    /// Smallest `k` such that `after.k` is used neither in the text nor on disk.
    fn next_fraction(&self, content: &str, after: u32) -> u32 {
        let mut used: BTreeSet<u32> = PHASE_REF_RE
            .captures_iter(content)
            .filter(|c| c[2].parse::<u32>().ok() == Some(after))
            .filter_map(|c| c.get(3)?.as_str().strip_prefix('.')?.parse().ok())
            .collect();

        let dir_prefix = format!("{}.", pad_phase(after));
        used.extend(list_entries(&self.phases_dir()).iter().filter_map(|name| {
            let (sub, _) = name.strip_prefix(&dir_prefix)?.split_once('-')?;
            sub.parse::<u32>().ok()
        }));

        let mut k = 1;
        while used.contains(&k) {
            k += 1;
        }
        k
    }

    /// Delete a removed phase's directory unless it holds summaries.
    fn discard_phase_dir(&self, number: PhaseNumber) {
        let Some(dir) = find_phase_dir(&self.planning_dir, number) else {
            return;
        };
        if list_entries(&dir).iter().any(|name| name.ends_with("SUMMARY.md")) {
            tracing::debug!(dir = ?dir, "Keeping phase directory with summaries");
            return;
        }
        if let Err(e) = std::fs::remove_dir_all(&dir) {
            tracing::warn!(dir = ?dir, error = %e, "Failed to remove phase directory");
        }
    }

    fn rename_phase_dirs(&self, renumbered: &BTreeMap<u32, u32>) -> WorkflowResult<()> {
        let phases_dir = self.phases_dir();
        for (&old, &new) in renumbered {
            let Some(dir) = find_phase_dir(&self.planning_dir, PhaseNumber::Integer(old)) else {
                continue;
            };
            let name = dir.file_name().and_then(|n| n.to_str()).unwrap_or_default();
            let Some(rest) = name.strip_prefix(&pad_phase(old)) else {
                continue;
            };

            let dest = safe_join(&phases_dir, format!("{}{rest}", pad_phase(new)))?;
            if dest.exists() {
                tracing::warn!(from = ?dir, to = ?dest, "Phase directory target exists, not renaming");
                continue;
            }
            std::fs::rename(&dir, &dest)?;
            tracing::debug!(from = ?dir, to = ?dest, "Renamed phase directory");
        }
        Ok(())
    }
}

fn slug_for(description: &str) -> WorkflowResult<String> {
    let slug = generate_slug(description);
    if slug.is_empty() {
        return Err(WorkflowError::Precondition(format!(
            "Phase description '{description}' must contain a letter or digit"
        )));
    }
    Ok(slug)
}
