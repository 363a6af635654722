//! Plan descriptor parsing and listing.
//!
//! A phase directory holds one `NN-NN-PLAN.md` per unit of work. Each file
//! opens with a YAML frontmatter block describing the plan; a matching
//! `NN-NN-SUMMARY.md` next to it marks the plan as done.

use std::path::{Path, PathBuf};

use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};
use serde_yaml::{Mapping, Value};

use super::error::{WorkflowError, WorkflowResult};
use super::frontmatter;
use crate::core::paths::{list_entries, safe_join};

/// Plan descriptor filenames: two numeric segments and a fixed suffix.
pub(crate) static PLAN_FILENAME_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^\d+-\d+-PLAN\.md$").unwrap());

/// Completion artifact filenames, same shape as plan filenames.
pub(crate) static SUMMARY_FILENAME_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^\d+-\d+-SUMMARY\.md$").unwrap());

/// Validated plan frontmatter.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PlanDescriptor {
    /// Phase identifier, often the phase directory name (`04-atomic-commits`)
    pub phase: String,

    /// Two-digit plan number, unique within the phase
    pub plan: String,

    /// Free-form classification
    #[serde(rename = "type")]
    pub plan_type: String,

    /// Declared execution batch
    pub wave: u32,

    /// Plans that must complete first
    pub depends_on: Vec<String>,

    /// Files the plan declares it will touch
    pub files_modified: Vec<String>,

    /// Whether the plan can run without a human checkpoint
    pub autonomous: bool,

    /// Requirement identifiers covered by the plan
    pub requirements: Vec<String>,
}

impl PlanDescriptor {
    /// Create a descriptor with default optional fields.
    pub fn new(phase: impl Into<String>, plan: impl Into<String>) -> Self {
        Self {
            phase: phase.into(),
            plan: pad_plan(&plan.into()),
            plan_type: "execute".to_string(),
            wave: 1,
            depends_on: Vec::new(),
            files_modified: Vec::new(),
            autonomous: true,
            requirements: Vec::new(),
        }
    }

    /// Phase number prefix (`"04"` from `"04-atomic-commits"`).
    pub fn phase_prefix(&self) -> &str {
        self.phase.split('-').next().unwrap_or(&self.phase)
    }

    /// Composite plan ID used for ownership and conflict reports (`"04-01"`).
    pub fn id(&self) -> String {
        format!("{}-{}", self.phase_prefix(), self.plan)
    }

    /// Filename of the summary artifact that marks this plan complete.
    pub fn summary_filename(&self) -> String {
        format!("{}-SUMMARY.md", self.id())
    }

    /// Render the descriptor as a frontmatter block.
    pub fn to_frontmatter(&self) -> WorkflowResult<String> {
        let yaml = serde_yaml::to_string(self)
            .map_err(|e| WorkflowError::Config(format!("cannot render frontmatter: {e}")))?;
        Ok(format!("---\n{yaml}---\n"))
    }

    /// Validate a frontmatter mapping read from `path`.
    fn from_yaml(path: &Path, yaml: &str) -> WorkflowResult<Self> {
        let value: Value = serde_yaml::from_str(yaml)
            .map_err(|e| WorkflowError::validation(path, format!("malformed YAML: {e}")))?;
        let map = match value {
            Value::Mapping(map) => map,
            Value::Null => Mapping::new(),
            _ => return Err(WorkflowError::validation(path, "frontmatter must be a mapping")),
        };
        let fields = Fields { path, map: &map };

        let phase = fields.required_string("phase")?;
        let plan = match map.get("plan") {
            None | Some(Value::Null) => return Err(fields.missing("plan")),
            Some(Value::String(s)) if !s.trim().is_empty() => pad_plan(s.trim()),
            Some(Value::Number(n)) => match n.as_u64() {
                Some(n) => format!("{n:02}"),
                None => return Err(fields.invalid("plan", "expected a non-negative integer")),
            },
            Some(other) => return Err(fields.wrong_type("plan", "string or number", other)),
        };

        let wave = match map.get("wave") {
            None | Some(Value::Null) => 1,
            Some(Value::Number(n)) => match n.as_u64() {
                Some(w) if w >= 1 && w <= u64::from(u32::MAX) => w as u32,
                _ => return Err(fields.invalid("wave", "expected a positive integer")),
            },
            Some(other) => return Err(fields.wrong_type("wave", "number", other)),
        };

        Ok(Self {
            phase,
            plan,
            plan_type: fields.optional_string("type")?.unwrap_or_else(|| "execute".to_string()),
            wave,
            depends_on: fields.string_list("depends_on")?,
            files_modified: fields.string_list("files_modified")?,
            autonomous: fields.optional_bool("autonomous")?.unwrap_or(true),
            requirements: fields.string_list("requirements")?,
        })
    }
}

/// Field accessors that turn shape mismatches into validation errors.
struct Fields<'a> {
    path: &'a Path,
    map: &'a Mapping,
}

impl Fields<'_> {
    fn missing(&self, field: &str) -> WorkflowError {
        WorkflowError::validation(self.path, format!("missing required field '{field}'"))
    }

    fn invalid(&self, field: &str, reason: &str) -> WorkflowError {
        WorkflowError::validation(self.path, format!("field '{field}': {reason}"))
    }

    fn wrong_type(&self, field: &str, expected: &str, found: &Value) -> WorkflowError {
        self.invalid(field, &format!("expected {expected}, found {}", type_name(found)))
    }

    fn required_string(&self, field: &str) -> WorkflowResult<String> {
        match self.map.get(field) {
            None | Some(Value::Null) => Err(self.missing(field)),
            Some(Value::String(s)) => Ok(s.clone()),
            Some(other) => Err(self.wrong_type(field, "string", other)),
        }
    }

    fn optional_string(&self, field: &str) -> WorkflowResult<Option<String>> {
        match self.map.get(field) {
            None | Some(Value::Null) => Ok(None),
            Some(Value::String(s)) => Ok(Some(s.clone())),
            Some(other) => Err(self.wrong_type(field, "string", other)),
        }
    }

    fn optional_bool(&self, field: &str) -> WorkflowResult<Option<bool>> {
        match self.map.get(field) {
            None | Some(Value::Null) => Ok(None),
            Some(Value::Bool(b)) => Ok(Some(*b)),
            Some(other) => Err(self.wrong_type(field, "boolean", other)),
        }
    }

    fn string_list(&self, field: &str) -> WorkflowResult<Vec<String>> {
        match self.map.get(field) {
            None | Some(Value::Null) => Ok(Vec::new()),
            Some(Value::Sequence(items)) => items
                .iter()
                .enumerate()
                .map(|(i, item)| match item {
                    Value::String(s) => Ok(s.clone()),
                    other => Err(self.wrong_type(&format!("{field}[{i}]"), "string", other)),
                })
                .collect(),
            Some(other) => Err(self.wrong_type(field, "list of strings", other)),
        }
    }
}

fn type_name(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Sequence(_) => "list",
        Value::Mapping(_) => "mapping",
        Value::Tagged(_) => "tagged value",
    }
}

/// Left-pad a plan number to two digits.
fn pad_plan(plan: &str) -> String {
    format!("{plan:0>2}")
}

/// A parsed plan file with its validated descriptor and full content.
#[derive(Debug, Clone, Serialize)]
pub struct PlanFile {
    /// Absolute path to the plan file
    pub path: PathBuf,

    /// Bare filename (`04-01-PLAN.md`)
    pub filename: String,

    /// Validated frontmatter
    pub descriptor: PlanDescriptor,

    /// Full file content including frontmatter
    #[serde(skip)]
    pub content: String,
}

impl PlanFile {
    /// Body text after the frontmatter block.
    pub fn body(&self) -> &str {
        frontmatter::split(&self.content).map_or(self.content.as_str(), |(_, body)| body)
    }
}

/// Plan catalog for a single phase directory.
#[derive(Debug, Clone)]
pub struct PlanCatalog {
    dir: PathBuf,
}

impl PlanCatalog {
    /// Create a catalog over a phase directory.
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    /// The phase directory this catalog reads.
    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Parse a single plan file.
    pub fn parse_one(path: &Path) -> WorkflowResult<PlanFile> {
        let content = std::fs::read_to_string(path)?;
        let (yaml, _) = frontmatter::split(&content)
            .ok_or_else(|| WorkflowError::validation(path, "missing frontmatter block"))?;
        let descriptor = PlanDescriptor::from_yaml(path, yaml)?;

        let filename =
            path.file_name().and_then(|n| n.to_str()).unwrap_or_default().to_string();

        Ok(PlanFile { path: path.to_path_buf(), filename, descriptor, content })
    }

    /// List every plan in the directory, sorted by filename.
    ///
    /// A missing directory is an empty catalog, not an error.
    pub fn list_all(&self) -> WorkflowResult<Vec<PlanFile>> {
        if !self.dir.is_dir() {
            tracing::debug!(dir = ?self.dir, "Phase directory missing, no plans");
            return Ok(Vec::new());
        }

        list_entries(&self.dir)
            .iter()
            .filter(|name| PLAN_FILENAME_RE.is_match(name))
            .map(|name| Self::parse_one(&safe_join(&self.dir, name)?))
            .collect()
    }

    /// Check whether a plan's summary artifact exists.
    pub fn is_complete(&self, descriptor: &PlanDescriptor) -> bool {
        safe_join(&self.dir, descriptor.summary_filename()).is_ok_and(|p| p.exists())
    }

    /// Plans without a summary artifact.
    pub fn incomplete(&self) -> WorkflowResult<Vec<PlanFile>> {
        Ok(self.list_all()?.into_iter().filter(|p| !self.is_complete(&p.descriptor)).collect())
    }

    /// Count `(completed, total)` plan files without parsing them.
    pub fn count_files(&self) -> (usize, usize) {
        let entries = list_entries(&self.dir);
        let total = entries.iter().filter(|n| PLAN_FILENAME_RE.is_match(n)).count();
        let completed = entries.iter().filter(|n| SUMMARY_FILENAME_RE.is_match(n)).count();
        (completed, total)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn write(dir: &Path, name: &str, content: &str) -> PathBuf {
        let path = dir.join(name);
        std::fs::write(&path, content).unwrap();
        path
    }

    #[test]
    fn test_parse_full_descriptor() {
        let temp = TempDir::new().unwrap();
        let path = write(
            temp.path(),
            "04-02-PLAN.md",
            "---\nphase: 04-atomic-commits\nplan: 2\ntype: tdd\nwave: 2\ndepends_on: [\"04-01\"]\nfiles_modified:\n  - src/lib/plan.ts\nautonomous: false\nrequirements: [EXEC-01]\n---\n\n# Plan body\n",
        );

        let file = PlanCatalog::parse_one(&path).unwrap();
        let d = &file.descriptor;
        assert_eq!(file.filename, "04-02-PLAN.md");
        assert_eq!(d.phase, "04-atomic-commits");
        assert_eq!(d.plan, "02");
        assert_eq!(d.plan_type, "tdd");
        assert_eq!(d.wave, 2);
        assert_eq!(d.depends_on, vec!["04-01"]);
        assert_eq!(d.files_modified, vec!["src/lib/plan.ts"]);
        assert!(!d.autonomous);
        assert_eq!(d.requirements, vec!["EXEC-01"]);
        assert_eq!(d.id(), "04-02");
        assert!(file.body().contains("# Plan body"));
    }

    #[test]
    fn test_defaults_applied() {
        let temp = TempDir::new().unwrap();
        let path = write(temp.path(), "01-01-PLAN.md", "---\nphase: 01-setup\nplan: \"1\"\n---\n");

        let d = PlanCatalog::parse_one(&path).unwrap().descriptor;
        assert_eq!(d.plan, "01");
        assert_eq!(d.plan_type, "execute");
        assert_eq!(d.wave, 1);
        assert!(d.autonomous);
        assert!(d.files_modified.is_empty());
    }

    #[test]
    fn test_missing_required_field_names_file() {
        let temp = TempDir::new().unwrap();
        let path = write(temp.path(), "01-01-PLAN.md", "---\nplan: 1\n---\n");

        let err = PlanCatalog::parse_one(&path).unwrap_err();
        let msg = err.to_string();
        assert!(matches!(err, WorkflowError::Validation { .. }));
        assert!(msg.contains("01-01-PLAN.md"));
        assert!(msg.contains("'phase'"));
    }

    #[test]
    fn test_wrong_type_rejected() {
        let temp = TempDir::new().unwrap();
        let path =
            write(temp.path(), "01-01-PLAN.md", "---\nphase: 01-setup\nplan: 1\nwave: first\n---\n");
        let msg = PlanCatalog::parse_one(&path).unwrap_err().to_string();
        assert!(msg.contains("'wave'"));
        assert!(msg.contains("expected number, found string"));

        let path = write(
            temp.path(),
            "01-02-PLAN.md",
            "---\nphase: 01-setup\nplan: 2\nautonomous: \"yes\"\n---\n",
        );
        assert!(PlanCatalog::parse_one(&path).unwrap_err().to_string().contains("'autonomous'"));
    }

    #[test]
    fn test_zero_wave_rejected() {
        let temp = TempDir::new().unwrap();
        let path = write(temp.path(), "01-01-PLAN.md", "---\nphase: 01-setup\nplan: 1\nwave: 0\n---\n");
        assert!(PlanCatalog::parse_one(&path).unwrap_err().to_string().contains("positive"));
    }

    #[test]
    fn test_missing_frontmatter() {
        let temp = TempDir::new().unwrap();
        let path = write(temp.path(), "01-01-PLAN.md", "# No metadata\n");
        assert!(PlanCatalog::parse_one(&path).unwrap_err().to_string().contains("frontmatter"));
    }

    #[test]
    fn test_list_all_filters_and_sorts() {
        let temp = TempDir::new().unwrap();
        write(temp.path(), "01-02-PLAN.md", "---\nphase: 01-setup\nplan: 2\n---\n");
        write(temp.path(), "01-01-PLAN.md", "---\nphase: 01-setup\nplan: 1\n---\n");
        write(temp.path(), "01-CONTEXT.md", "notes");
        write(temp.path(), "01-01-SUMMARY.md", "done");

        let catalog = PlanCatalog::new(temp.path());
        let plans = catalog.list_all().unwrap();
        let names: Vec<_> = plans.iter().map(|p| p.filename.as_str()).collect();
        assert_eq!(names, vec!["01-01-PLAN.md", "01-02-PLAN.md"]);

        assert!(catalog.is_complete(&plans[0].descriptor));
        assert!(!catalog.is_complete(&plans[1].descriptor));

        let incomplete = catalog.incomplete().unwrap();
        assert_eq!(incomplete.len(), 1);
        assert_eq!(incomplete[0].descriptor.plan, "02");
        assert_eq!(catalog.count_files(), (1, 2));
    }

    #[test]
    fn test_list_all_missing_dir_is_empty() {
        let catalog = PlanCatalog::new("/definitely/not/a/phase/dir");
        assert!(catalog.list_all().unwrap().is_empty());
    }

    #[test]
    fn test_frontmatter_round_trip() {
        let temp = TempDir::new().unwrap();
        let mut descriptor = PlanDescriptor::new("03-core-skills", "7");
        descriptor.wave = 3;
        descriptor.depends_on = vec!["03-01".to_string()];
        descriptor.files_modified = vec!["src/a.ts".to_string(), "src/b.ts".to_string()];
        descriptor.autonomous = false;
        descriptor.requirements = vec!["STATE-02".to_string()];

        let content = format!("{}\n# Plan\n", descriptor.to_frontmatter().unwrap());
        let path = write(temp.path(), "03-07-PLAN.md", &content);

        assert_eq!(PlanCatalog::parse_one(&path).unwrap().descriptor, descriptor);
    }
}
