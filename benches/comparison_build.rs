//! Comparison tree construction benchmark
//!
//! Measures building a full comparison tree (grouping, per-leaf statistics,
//! Welch tests) for two commits with a growing number of repetitions.
//!
//! # Run Instructions
//!
//! ```bash
//! cargo bench --bench comparison_build
//! ```

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};
use phasestats::comparison::statistics::{student_t_critical, student_t_two_sided_p};
use phasestats::comparison::{ComparisonBuilder, ComparisonCase};
use phasestats::config::StatisticsConfig;
use phasestats::model::{PhaseStatRow, StatKind};

const PHASES: usize = 6;
const METRICS: usize = 12;

/// Rows of `repetitions` runs for each of two commits
fn create_bench_rows(repetitions: usize) -> Vec<PhaseStatRow> {
    let mut rows = Vec::with_capacity(2 * repetitions * PHASES * METRICS);
    for commit in 0..2 {
        for rep in 0..repetitions {
            for phase in 0..PHASES {
                for metric in 0..METRICS {
                    let value = 1_000.0 + (commit * 50 + rep * 7 + metric) as f64;
                    rows.push(PhaseStatRow {
                        phase: format!("{:03}_[PHASE{}]", phase, phase),
                        metric: format!("metric_{}_energy_machine", metric),
                        detail_name: "[MACHINE]".to_string(),
                        value,
                        kind: StatKind::Total,
                        max_value: Some(value * 1.1),
                        min_value: Some(value * 0.9),
                        unit: "mJ".to_string(),
                        repository: "https://github.com/example/app".to_string(),
                        machine_id: 1,
                        machine_description: "Cluster node 1".to_string(),
                        filename: "usage_scenario.yml".to_string(),
                        commit_hash: format!("commit{}", commit),
                        branch: "main / master".to_string(),
                        run_created_at: rep as i64,
                    });
                }
            }
        }
    }
    rows
}

/// Benchmark: full tree build for two commits
fn bench_build_commit_comparison(c: &mut Criterion) {
    let mut group = c.benchmark_group("comparison_build");
    let config = StatisticsConfig::default();

    for repetitions in [1, 5, 20, 50] {
        let rows = create_bench_rows(repetitions);
        group.bench_with_input(
            BenchmarkId::from_parameter(repetitions),
            &rows,
            |b, rows| {
                b.iter(|| {
                    let mut builder = ComparisonBuilder::new(&config);
                    black_box(builder.build(black_box(rows), Some(ComparisonCase::Commit)));
                });
            },
        );
    }

    group.finish();
}

/// Benchmark: t-distribution primitives used per leaf
fn bench_t_distribution(c: &mut Criterion) {
    c.bench_function("student_t_two_sided_p", |b| {
        b.iter(|| black_box(student_t_two_sided_p(black_box(2.3), black_box(9.0))));
    });

    c.bench_function("student_t_critical", |b| {
        b.iter(|| black_box(student_t_critical(black_box(0.95), black_box(9.0))));
    });
}

criterion_group!(benches, bench_build_commit_comparison, bench_t_distribution);
criterion_main!(benches);
