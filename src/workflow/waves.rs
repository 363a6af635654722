//! Wave scheduling.
//!
//! Groups plans into ordered execution waves and flags files that more than
//! one plan in the same wave intends to modify.

use std::collections::BTreeMap;

use serde::Serialize;

use super::plan::PlanFile;

/// File path -> IDs of the plans that declare it.
pub type ConflictMap = BTreeMap<String, Vec<String>>;

/// A group of plans declared safe to run in parallel.
#[derive(Debug, Clone, Serialize)]
pub struct PlanWave {
    /// Wave number
    pub wave: u32,

    /// Plans in catalog order
    pub plans: Vec<PlanFile>,
}

/// Partition plans by their `wave` field.
///
/// Waves come back in ascending order; plans keep their input order within a
/// wave. Every input plan lands in exactly one wave.
pub fn compute_waves(plans: &[PlanFile]) -> Vec<PlanWave> {
    let mut by_wave: BTreeMap<u32, Vec<PlanFile>> = BTreeMap::new();
    for plan in plans {
        by_wave.entry(plan.descriptor.wave).or_default().push(plan.clone());
    }

    by_wave.into_iter().map(|(wave, plans)| PlanWave { wave, plans }).collect()
}

/// Find files claimed by two or more plans.
pub fn detect_conflicts(plans: &[PlanFile]) -> ConflictMap {
    let mut owners: ConflictMap = BTreeMap::new();
    for plan in plans {
        let id = plan.descriptor.id();
        for file in &plan.descriptor.files_modified {
            owners.entry(file.clone()).or_default().push(id.clone());
        }
    }

    owners.retain(|_, ids| ids.len() >= 2);
    owners
}

/// Conflict maps for every wave that has at least one conflict.
pub fn wave_conflicts(waves: &[PlanWave]) -> BTreeMap<u32, ConflictMap> {
    waves
        .iter()
        .filter_map(|w| {
            let conflicts = detect_conflicts(&w.plans);
            if conflicts.is_empty() {
                None
            } else {
                tracing::warn!(wave = w.wave, files = conflicts.len(), "File conflicts in wave");
                Some((w.wave, conflicts))
            }
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use std::path::PathBuf;

    use super::*;
    use crate::workflow::plan::PlanDescriptor;

    fn plan(number: u32, wave: u32, files: &[&str]) -> PlanFile {
        let mut descriptor = PlanDescriptor::new("04-atomic-commits", number.to_string());
        descriptor.wave = wave;
        descriptor.files_modified = files.iter().map(|f| (*f).to_string()).collect();
        PlanFile {
            path: PathBuf::from(format!("04-{number:02}-PLAN.md")),
            filename: format!("04-{number:02}-PLAN.md"),
            descriptor,
            content: String::new(),
        }
    }

    #[test]
    fn test_compute_waves_partitions_exactly() {
        let plans =
            vec![plan(1, 2, &[]), plan(2, 1, &[]), plan(3, 3, &[]), plan(4, 1, &[]), plan(5, 2, &[])];

        let waves = compute_waves(&plans);
        let total: usize = waves.iter().map(|w| w.plans.len()).sum();
        assert_eq!(total, plans.len());

        let numbers: Vec<u32> = waves.iter().map(|w| w.wave).collect();
        assert_eq!(numbers, vec![1, 2, 3]);
        assert!(numbers.windows(2).all(|w| w[0] < w[1]));

        let first: Vec<&str> = waves[0].plans.iter().map(|p| p.descriptor.plan.as_str()).collect();
        assert_eq!(first, vec!["02", "04"]);
        let second: Vec<&str> =
            waves[1].plans.iter().map(|p| p.descriptor.plan.as_str()).collect();
        assert_eq!(second, vec!["01", "05"]);
    }

    #[test]
    fn test_compute_waves_empty() {
        assert!(compute_waves(&[]).is_empty());
    }

    #[test]
    fn test_detect_conflicts_shared_file() {
        let plans = vec![plan(1, 1, &["src/a.ts", "src/b.ts"]), plan(2, 1, &["src/a.ts"])];
        let conflicts = detect_conflicts(&plans);

        assert_eq!(conflicts.len(), 1);
        assert_eq!(conflicts["src/a.ts"], vec!["04-01".to_string(), "04-02".to_string()]);
    }

    #[test]
    fn test_detect_conflicts_disjoint() {
        let plans = vec![plan(1, 1, &["src/a.ts"]), plan(2, 1, &["src/b.ts"])];
        assert!(detect_conflicts(&plans).is_empty());
    }

    #[test]
    fn test_wave_conflicts_only_reports_conflicting_waves() {
        let plans = vec![
            plan(1, 1, &["src/a.ts"]),
            plan(2, 1, &["src/a.ts"]),
            plan(3, 2, &["src/a.ts"]),
            plan(4, 2, &["src/c.ts"]),
        ];
        let report = wave_conflicts(&compute_waves(&plans));

        assert_eq!(report.len(), 1);
        assert!(report.contains_key(&1));
    }
}
