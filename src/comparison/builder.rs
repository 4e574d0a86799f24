// Comparison tree construction
//
// Three passes over the rows of the compared runs:
// 1. sort into canonical order and accumulate values per comparison key
// 2. per-leaf descriptive statistics, CI and leave-one-out t-test
// 3. Welch t-test between the keys when exactly two keys are present

use super::statistics::{
    mean, one_sample_ttest, population_stddev, welch_ttest, TCriticalCache,
};
use super::tree::{ComparisonNode, DetailNode, LeafStats, MetricNode, OrderedMap, PhaseNode};
use super::{comparison_key, ComparisonCase};
use crate::config::StatisticsConfig;
use crate::model::{strip_phase_ordinal, PhaseStatRow};
use tracing::debug;

/// Builds comparison trees from joined phase-stat rows
///
/// # Example
/// ```
/// use phasestats::comparison::ComparisonBuilder;
/// use phasestats::config::StatisticsConfig;
///
/// let mut builder = ComparisonBuilder::new(&StatisticsConfig::default());
/// let node = builder.build(&[], None);
/// assert!(node.data.is_empty());
/// ```
#[derive(Debug, Clone)]
pub struct ComparisonBuilder {
    significance_level: f64,
    t_critical: TCriticalCache,
}

impl ComparisonBuilder {
    pub fn new(config: &StatisticsConfig) -> Self {
        Self {
            significance_level: config.significance_level,
            t_critical: TCriticalCache::new(config.confidence_level),
        }
    }

    /// Build the full tree for `rows` under `case` (`None` for a single-run view)
    ///
    /// Rows may arrive in any order; they are put into canonical order
    /// first so the value sequences are deterministic.
    pub fn build(&mut self, rows: &[PhaseStatRow], case: Option<ComparisonCase>) -> ComparisonNode {
        let mut sorted: Vec<&PhaseStatRow> = rows.iter().collect();
        sorted.sort_by(|a, b| a.canonical_cmp(b));

        let mut node = ComparisonNode {
            comparison_case: case,
            ..ComparisonNode::default()
        };

        if let Some(first) = sorted.first() {
            node.common_info = common_info(case, first);
        }

        for row in &sorted {
            let key = comparison_key(case, row);
            if !node.comparison_details.iter().any(|k| k == key) {
                node.comparison_details.push(key.to_string());
            }

            node.data
                .get_or_insert_with(strip_phase_ordinal(&row.phase), PhaseNode::default)
                .metrics
                .get_or_insert_with(&row.metric, || MetricNode::from_row(row))
                .data
                .get_or_insert_with(&row.detail_name, || DetailNode::new(&row.detail_name))
                .data
                .get_or_insert_with(key, LeafStats::default)
                .push(row.value, row.max_value, row.min_value);
        }

        self.add_leaf_statistics(&mut node);
        if node.comparison_details.len() == 2 {
            let key1 = node.comparison_details[0].clone();
            let key2 = node.comparison_details[1].clone();
            self.add_key_comparison(&mut node, &key1, &key2);
        }

        debug!(
            rows = rows.len(),
            keys = node.comparison_details.len(),
            "built comparison tree"
        );
        node
    }

    fn add_leaf_statistics(&mut self, node: &mut ComparisonNode) {
        for phase in node.data.values_mut() {
            for metric in phase.metrics.values_mut() {
                for detail in metric.data.values_mut() {
                    for leaf in detail.data.values_mut() {
                        self.fill_leaf(leaf);
                    }
                }
            }
        }
    }

    fn fill_leaf(&mut self, leaf: &mut LeafStats) {
        let n = leaf.values.len();
        match n {
            0 => {}
            1 => {
                let only = leaf.values[0];
                leaf.mean = Some(only);
                leaf.max_mean = Some(only);
                leaf.min_mean = Some(only);
            }
            _ => {
                let stddev = population_stddev(&leaf.values);
                leaf.mean = Some(mean(&leaf.values));
                leaf.stddev = Some(stddev);
                leaf.max_mean = leaf.values.iter().copied().reduce(f64::max);
                leaf.min_mean = leaf.values.iter().copied().reduce(f64::min);
                leaf.ci = self
                    .t_critical
                    .get(n)
                    .map(|t_crit| stddev * t_crit / (n as f64).sqrt());

                if n >= 3 {
                    // newest repeat against the ones before it
                    let (rest, last) = leaf.values.split_at(n - 1);
                    match one_sample_ttest(rest, last[0]) {
                        Some(outcome) => {
                            leaf.p_value = Some(outcome.p_value);
                            leaf.is_significant = Some(outcome.p_value <= self.significance_level);
                        }
                        None => debug!(n, "one-sample t-test undefined, leaving p_value unset"),
                    }
                }
            }
        }
    }

    fn add_key_comparison(&self, node: &mut ComparisonNode, key1: &str, key2: &str) {
        for (phase_name, phase) in node.data.iter_mut() {
            for (metric_name, metric) in phase.metrics.iter_mut() {
                for (detail_name, detail) in metric.data.iter_mut() {
                    let (Some(a), Some(b)) = (detail.data.get(key1), detail.data.get(key2)) else {
                        continue;
                    };
                    match welch_ttest(&a.values, &b.values) {
                        Some(outcome) => {
                            detail.p_value = Some(outcome.p_value);
                            detail.is_significant = Some(outcome.p_value <= self.significance_level);
                        }
                        None => debug!(
                            phase = phase_name,
                            metric = metric_name,
                            detail = detail_name,
                            "Welch t-test undefined, leaving p_value unset"
                        ),
                    }
                }
            }
        }
    }
}

/// Attributes shared by all compared runs, taken from the first row
///
/// Only the dimensions that cannot differ under `case` are listed.
pub fn common_info(case: Option<ComparisonCase>, row: &PhaseStatRow) -> OrderedMap<String> {
    let mut info = OrderedMap::new();
    let (repository, filename, machine, branch, commit) = match case {
        None | Some(ComparisonCase::RepeatedRun) => (true, true, true, true, true),
        Some(ComparisonCase::UsageScenario) => (true, false, true, true, true),
        Some(ComparisonCase::Machine) => (true, true, false, true, true),
        Some(ComparisonCase::Commit) => (true, true, true, false, false),
        Some(ComparisonCase::Branch) => (true, true, true, false, false),
        Some(ComparisonCase::Repository) => (false, false, true, true, false),
    };

    if repository {
        info.insert("Repository", row.repository.clone());
    }
    if filename {
        info.insert("Filename", row.filename.clone());
    }
    if machine {
        info.insert("Machine", row.machine_description.clone());
    }
    if branch {
        info.insert("Branch", row.branch.clone());
    }
    if commit {
        info.insert("Commit", row.commit_hash.clone());
    }
    info
}
