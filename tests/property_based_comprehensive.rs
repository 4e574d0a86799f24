//! Property-based tests for the aggregation and comparison core
//!
//! Properties covered:
//! 1. Comparison trees do not depend on the order rows arrive in
//! 2. Every phase gets exactly one phase_time row equal to its duration
//! 3. The classifier is total and only ever rejects with a reason
//! 4. Statistics stay within their mathematical bounds

use phasestats::aggregator::PhaseAggregator;
use phasestats::comparison::statistics::{student_t_two_sided_p, welch_ttest};
use phasestats::comparison::{classify, ComparisonBuilder, ComparisonCase};
use phasestats::config::{CarbonConfig, StatisticsConfig};
use phasestats::model::{DimensionCounts, Phase, PhaseStatRow, Run, StatKind};
use phasestats::rollup::PHASE_TIME_METRIC;
use phasestats::store::MemoryStore;
use proptest::prelude::*;

fn row(phase: usize, metric: usize, commit: usize, created_at: i64, value: f64) -> PhaseStatRow {
    PhaseStatRow {
        phase: format!("{:03}_[PHASE{}]", phase, phase),
        metric: format!("metric_{}_system", metric),
        detail_name: "[SYSTEM]".to_string(),
        value,
        kind: StatKind::Total,
        max_value: Some(value + 1.0),
        min_value: Some(value - 1.0),
        unit: "us".to_string(),
        repository: "https://github.com/example/app".to_string(),
        machine_id: 1,
        machine_description: "Cluster node 1".to_string(),
        filename: "usage_scenario.yml".to_string(),
        commit_hash: format!("commit{}", commit),
        branch: "main / master".to_string(),
        run_created_at: created_at,
    }
}

/// Each generated row stands for a distinct run, so `run_created_at` is unique
fn rows_strategy() -> impl Strategy<Value = Vec<PhaseStatRow>> {
    prop::collection::vec((0usize..3, 0usize..3, 0usize..2, 0.0f64..1e6), 1..40).prop_map(
        |specs| {
            specs
                .into_iter()
                .enumerate()
                .map(|(i, (p, m, c, v))| row(p, m, c, 1_000 + i as i64, v))
                .collect()
        },
    )
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(100))]

    #[test]
    fn prop_tree_independent_of_row_order(rows in rows_strategy(), seed in any::<u64>()) {
        let mut shuffled = rows.clone();
        // deterministic rotation plus reversal
        let len = shuffled.len();
        shuffled.rotate_left((seed as usize) % len);
        if seed % 2 == 0 {
            shuffled.reverse();
        }

        let config = StatisticsConfig::default();
        let a = ComparisonBuilder::new(&config).build(&rows, Some(ComparisonCase::Commit));
        let b = ComparisonBuilder::new(&config).build(&shuffled, Some(ComparisonCase::Commit));

        // the whole tree, p-values and significance flags included
        prop_assert_eq!(a, b);
    }
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(100))]

    #[test]
    fn prop_phase_time_matches_duration(durations in prop::collection::vec(1i64..10_000_000, 1..8)) {
        let mut start = 0;
        let phases: Vec<Phase> = durations
            .iter()
            .enumerate()
            .map(|(i, d)| {
                let phase = Phase::new(format!("phase{}", i), start, start + d);
                start += d;
                phase
            })
            .collect();
        let run = Run {
            id: "r1".to_string(),
            repository: "https://github.com/example/app".to_string(),
            filename: "usage_scenario.yml".to_string(),
            branch: None,
            commit_hash: "abc".to_string(),
            machine_id: 1,
            phases,
            created_at: 0,
        };

        let carbon = CarbonConfig::default();
        let rows = PhaseAggregator::new(&carbon)
            .aggregate_run(&MemoryStore::new(), &run)
            .unwrap();

        let phase_times: Vec<f64> = rows
            .iter()
            .filter(|r| r.metric == PHASE_TIME_METRIC)
            .map(|r| r.value)
            .collect();
        let expected: Vec<f64> = durations.iter().map(|d| *d as f64).collect();
        prop_assert_eq!(phase_times, expected);
    }
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(200))]

    #[test]
    fn prop_classifier_is_total(
        repos in 0u64..4,
        scenarios in 0u64..4,
        machines in 0u64..4,
        commits in 1u64..5,
        branches in 1u64..4,
    ) {
        let counts = DimensionCounts::new(repos, scenarios, machines, commits, branches);
        match classify(&counts) {
            Ok(case) => {
                // only supported shapes classify
                prop_assert!(repos == 1 || repos == 2);
                prop_assert!(machines == 1 || machines == 2);
                if case == ComparisonCase::RepeatedRun {
                    prop_assert_eq!(commits, 1);
                }
            }
            Err(err) => prop_assert!(!err.to_string().is_empty()),
        }
    }
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(100))]

    #[test]
    fn prop_p_values_are_probabilities(t in -50.0f64..50.0, df in 1.0f64..200.0) {
        let p = student_t_two_sided_p(t, df);
        prop_assert!((0.0..=1.0).contains(&p));
        // symmetric in t
        prop_assert!((p - student_t_two_sided_p(-t, df)).abs() < 1e-9);
    }

    #[test]
    fn prop_welch_p_value_in_range(
        a in prop::collection::vec(0.0f64..1000.0, 2..10),
        b in prop::collection::vec(0.0f64..1000.0, 2..10),
    ) {
        if let Some(outcome) = welch_ttest(&a, &b) {
            prop_assert!((0.0..=1.0).contains(&outcome.p_value));
            prop_assert!(outcome.df > 0.0);
        }
    }
}
