//! Performance benchmarks for Phasekit.
//!
//! This module contains benchmarks for:
//! - Roadmap parsing with large phase lists
//! - Wave computation and conflict detection
//! - STATE.md section replacement
//!
//! Run with: `cargo bench`

use std::path::PathBuf;

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion, Throughput};
use phasekit::workflow::{
    compute_waves, detect_conflicts, parse_phases, replace_section, PlanDescriptor, PlanFile,
};

// ============================================================================
// Mock Data Fixtures
// ============================================================================

mod fixtures {
    use super::*;

    /// Roadmap with a checklist, detail blocks and a progress table.
    pub fn generate_roadmap(num_phases: u32) -> String {
        let mut checklist = String::new();
        let mut details = String::new();
        let mut table = String::new();

        for n in 1..=num_phases {
            let mark = if n <= num_phases / 2 { "x" } else { " " };
            checklist.push_str(&format!("- [{mark}] **Phase {n}: Phase number {n}** - Deliver part {n}\n"));
            details.push_str(&format!(
                "### Phase {n}: Phase number {n}\n**Goal**: Deliver part {n}\n**Depends on**: Phase {}\n**Requirements**: REQ-{n:02}, REQ-{:02}\n\n",
                n.saturating_sub(1),
                n + 100
            ));
            table.push_str(&format!("| {n}. Phase number {n} | 0/3 | Not started | - |\n"));
        }

        format!(
            "# Roadmap: Bench\n\n## Phases\n\n{checklist}\n## Phase Details\n\n{details}## Progress\n\n| Phase | Plans Complete | Status | Completed |\n|-------|----------------|--------|-----------|\n{table}"
        )
    }

    /// Plans spread over a few waves, every fifth one touching a shared file.
    pub fn generate_plans(count: usize) -> Vec<PlanFile> {
        (1..=count)
            .map(|i| {
                let mut descriptor = PlanDescriptor::new("07-bench", i.to_string());
                descriptor.wave = (i % 4) as u32 + 1;
                descriptor.files_modified = vec![format!("src/module_{i}.rs")];
                if i % 5 == 0 {
                    descriptor.files_modified.push("src/lib.rs".to_string());
                }
                PlanFile {
                    path: PathBuf::from(format!("/bench/07-{i:02}-PLAN.md")),
                    filename: format!("07-{i:02}-PLAN.md"),
                    descriptor,
                    content: String::new(),
                }
            })
            .collect()
    }

    /// STATE.md with every section the engine rewrites.
    pub fn generate_state(decisions: usize) -> String {
        let decisions: String =
            (1..=decisions).map(|i| format!("- Phase {i}: Decision number {i}\n")).collect();
        format!(
            "# Project State\n\n## Current Position\n\nPhase: 3 of 8 (Core) -- Executing\nPlan: 1 of 3 in current phase\nStatus: Executing\nLast activity: 2026-02-17\n\nProgress: [██████░░░░░░░░░░░░░░] 30%\n\n## Accumulated Context\n\n### Decisions\n\n{decisions}\n## Session Continuity\n\nLast session: 2026-02-17\nStopped at: Plan 1\nResume file: None\n"
        )
    }
}

// ============================================================================
// Roadmap Benchmarks
// ============================================================================

fn bench_parse_phases(c: &mut Criterion) {
    let mut group = c.benchmark_group("roadmap");

    for num_phases in &[10u32, 50, 200] {
        let content = fixtures::generate_roadmap(*num_phases);
        group.throughput(Throughput::Elements(u64::from(*num_phases)));
        group.bench_with_input(
            BenchmarkId::new("parse_phases", num_phases),
            &content,
            |b, content| b.iter(|| parse_phases(black_box(content))),
        );
    }

    group.finish();
}

// ============================================================================
// Wave Benchmarks
// ============================================================================

fn bench_waves(c: &mut Criterion) {
    let mut group = c.benchmark_group("waves");

    for count in &[10usize, 100, 1000] {
        let plans = fixtures::generate_plans(*count);
        group.throughput(Throughput::Elements(*count as u64));
        group.bench_with_input(BenchmarkId::new("compute_waves", count), &plans, |b, plans| {
            b.iter(|| compute_waves(black_box(plans)));
        });
        group.bench_with_input(BenchmarkId::new("detect_conflicts", count), &plans, |b, plans| {
            b.iter(|| detect_conflicts(black_box(plans)));
        });
    }

    group.finish();
}

// ============================================================================
// Section Benchmarks
// ============================================================================

fn bench_replace_section(c: &mut Criterion) {
    let mut group = c.benchmark_group("sections");
    let body = "Phase: 4 of 8 (Next) -- Planning\nPlan: 0 of 2 in current phase\nStatus: Planning\nLast activity: 2026-02-18\n\nProgress: [████████░░░░░░░░░░░░] 40%";

    for decisions in &[10usize, 500] {
        let content = fixtures::generate_state(*decisions);
        group.bench_with_input(
            BenchmarkId::new("replace_current_position", decisions),
            &content,
            |b, content| b.iter(|| replace_section(black_box(content), "Current Position", body)),
        );
    }

    group.finish();
}

criterion_group!(benches, bench_parse_phases, bench_waves, bench_replace_section);
criterion_main!(benches);
