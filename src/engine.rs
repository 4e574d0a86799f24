//! Exposed operations: aggregate a run, compare runs, single-run statistics
//!
//! Every call reads from the store, computes in memory and returns; nothing
//! is cached between calls. Serializing concurrent aggregation of the same
//! run is up to the caller.

use crate::aggregator::PhaseAggregator;
use crate::comparison::{classify, ComparisonBuilder, ComparisonCase, ComparisonError, ComparisonNode};
use crate::config::EngineConfig;
use crate::store::{MeasurementStore, StoreError};
use thiserror::Error;

/// Errors surfaced to callers of [`Engine`]
#[derive(Error, Debug)]
pub enum EngineError {
    #[error(transparent)]
    Store(#[from] StoreError),

    #[error(transparent)]
    Comparison(#[from] ComparisonError),

    #[error("No phase stats found for runs: {}", ids.join(", "))]
    NoData { ids: Vec<String> },

    #[error("No run IDs given")]
    EmptyRequest,
}

impl EngineError {
    /// Whether the request itself was unacceptable (as opposed to missing
    /// data or a backend failure)
    pub fn is_validation(&self) -> bool {
        matches!(self, Self::Comparison(_) | Self::EmptyRequest)
    }
}

/// Phase aggregation and comparison over a [`MeasurementStore`]
pub struct Engine<S: MeasurementStore> {
    store: S,
    config: EngineConfig,
}

impl<S: MeasurementStore> Engine<S> {
    pub fn new(store: S, config: EngineConfig) -> Self {
        Self { store, config }
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    pub fn store_mut(&mut self) -> &mut S {
        &mut self.store
    }

    pub fn into_store(self) -> S {
        self.store
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    /// Produce and persist the phase stats of a completed run
    ///
    /// Returns the number of rows written. Calling this twice for the same
    /// run is rejected by the store's uniqueness constraint.
    pub fn aggregate(&mut self, run_id: &str) -> Result<usize, EngineError> {
        let run = self.store.get_run(run_id)?;
        let rows = PhaseAggregator::new(&self.config.carbon).aggregate_run(&self.store, &run)?;
        if rows.is_empty() {
            return Ok(0);
        }

        self.store.bulk_insert_phase_stats(&rows)?;
        tracing::info!(run_id, rows = rows.len(), "stored phase stats");
        Ok(rows.len())
    }

    /// Comparison case of a set of runs, from their distinct dimension counts
    pub fn classify(&self, run_ids: &[String]) -> Result<ComparisonCase, EngineError> {
        let counts = self.store.distinct_run_dimension_counts(run_ids)?;
        tracing::debug!(?counts, runs = run_ids.len(), "classifying runs");
        Ok(classify(&counts)?)
    }

    /// Compare runs, classifying them unless a case is forced
    ///
    /// A forced case skips the decision table entirely, so the tree may
    /// hold any number of comparison keys.
    pub fn compare_runs(
        &self,
        run_ids: &[String],
        force: Option<ComparisonCase>,
    ) -> Result<ComparisonNode, EngineError> {
        let ids = dedup_ids(run_ids);
        if ids.is_empty() {
            return Err(EngineError::EmptyRequest);
        }

        let case = match force {
            Some(case) => case,
            None => self.classify(&ids)?,
        };

        self.build(&ids, Some(case))
    }

    /// Statistics of a single run; every leaf holds one value
    pub fn single_run_stats(&self, run_id: &str) -> Result<ComparisonNode, EngineError> {
        self.build(&[run_id.to_string()], None)
    }

    fn build(
        &self,
        ids: &[String],
        case: Option<ComparisonCase>,
    ) -> Result<ComparisonNode, EngineError> {
        let rows = self.store.fetch_phase_stats(ids)?;
        if rows.is_empty() {
            return Err(EngineError::NoData { ids: ids.to_vec() });
        }

        let mut builder = ComparisonBuilder::new(&self.config.statistics);
        Ok(builder.build(&rows, case))
    }
}

/// Drop repeated IDs, keeping first-seen order
fn dedup_ids(run_ids: &[String]) -> Vec<String> {
    let mut ids: Vec<String> = Vec::with_capacity(run_ids.len());
    for id in run_ids {
        let id = id.trim();
        if !id.is_empty() && !ids.iter().any(|seen| seen == id) {
            ids.push(id.to_string());
        }
    }
    ids
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::comparison::Rejection;
    use crate::model::{Machine, Phase, RawMeasurement, Run};
    use crate::store::MemoryStore;

    fn run(id: &str, commit: &str, machine_id: i64) -> Run {
        Run {
            id: id.to_string(),
            repository: "https://github.com/example/app".to_string(),
            filename: "usage_scenario.yml".to_string(),
            branch: None,
            commit_hash: commit.to_string(),
            machine_id,
            phases: vec![
                Phase::new("[BASELINE]", 0, 1_000_000),
                Phase::new("[RUNTIME]", 1_000_000, 3_000_000),
            ],
            created_at: 0,
        }
    }

    fn energy(run_id: &str, time_us: i64, value: f64) -> RawMeasurement {
        RawMeasurement {
            run_id: run_id.to_string(),
            metric: "psu_energy_ac_ipmi_machine".to_string(),
            detail_name: "[MACHINE]".to_string(),
            time_us,
            value,
            unit: "mJ".to_string(),
        }
    }

    fn engine_with_runs(runs: Vec<Run>) -> Engine<MemoryStore> {
        let mut store = MemoryStore::new();
        store.insert_machine(Machine {
            id: 1,
            description: "Cluster node 1".to_string(),
        });
        store.insert_machine(Machine {
            id: 2,
            description: "Cluster node 2".to_string(),
        });
        for (i, r) in runs.into_iter().enumerate() {
            let offset = i as f64 * 100.0;
            store.insert_measurements(vec![
                energy(&r.id, 500_000, 1_000.0 + offset),
                energy(&r.id, 1_500_000, 2_000.0 + offset),
            ]);
            store.insert_run(r);
        }
        Engine::new(store, EngineConfig::default())
    }

    fn ids(ids: &[&str]) -> Vec<String> {
        ids.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn test_aggregate_persists_rows() {
        let mut engine = engine_with_runs(vec![run("r1", "a", 1)]);
        let written = engine.aggregate("r1").unwrap();
        // per phase: energy, power, co2, phase_time
        assert_eq!(written, 8);
        assert_eq!(engine.store().phase_stats().len(), 8);
    }

    #[test]
    fn test_aggregate_twice_is_rejected() {
        let mut engine = engine_with_runs(vec![run("r1", "a", 1)]);
        engine.aggregate("r1").unwrap();
        let err = engine.aggregate("r1").unwrap_err();
        assert!(matches!(
            err,
            EngineError::Store(StoreError::DuplicatePhaseStat { .. })
        ));
        assert!(!err.is_validation());
    }

    #[test]
    fn test_aggregate_unknown_run() {
        let mut engine = engine_with_runs(vec![]);
        assert!(matches!(
            engine.aggregate("nope"),
            Err(EngineError::Store(StoreError::RunNotFound(_)))
        ));
    }

    #[test]
    fn test_compare_commits() {
        let mut engine = engine_with_runs(vec![run("r1", "a", 1), run("r2", "b", 1)]);
        engine.aggregate("r1").unwrap();
        engine.aggregate("r2").unwrap();

        let node = engine.compare_runs(&ids(&["r1", "r2"]), None).unwrap();
        assert_eq!(node.comparison_case, Some(ComparisonCase::Commit));
        assert_eq!(node.comparison_details, vec!["a", "b"]);
        assert_eq!(node.common_info.get("Machine").map(String::as_str), Some("Cluster node 1"));

        let leaf = node
            .leaf("[RUNTIME]", "psu_energy_ac_ipmi_machine", "[MACHINE]", "b")
            .unwrap();
        assert_eq!(leaf.values, vec![2_100.0]);
    }

    #[test]
    fn test_compare_rejects_unsupported_combination() {
        let mut engine = engine_with_runs(vec![run("r1", "a", 1), run("r2", "b", 2)]);
        engine.aggregate("r1").unwrap();
        engine.aggregate("r2").unwrap();

        let err = engine.compare_runs(&ids(&["r1", "r2"]), None).unwrap_err();
        assert!(err.is_validation());
        assert!(matches!(
            err,
            EngineError::Comparison(ComparisonError::Unsupported(Rejection::MachinesAndCommits))
        ));

        // forcing bypasses the table
        let node = engine
            .compare_runs(&ids(&["r1", "r2"]), Some(ComparisonCase::Machine))
            .unwrap();
        assert_eq!(node.comparison_details, vec!["Cluster node 1", "Cluster node 2"]);
    }

    #[test]
    fn test_compare_empty_request() {
        let engine = engine_with_runs(vec![]);
        let err = engine.compare_runs(&ids(&["", " "]), None).unwrap_err();
        assert!(matches!(err, EngineError::EmptyRequest));
        assert!(err.is_validation());
    }

    #[test]
    fn test_no_data_is_not_validation() {
        let engine = engine_with_runs(vec![run("r1", "a", 1)]);
        let err = engine.single_run_stats("r1").unwrap_err();
        assert!(matches!(err, EngineError::NoData { .. }));
        assert!(!err.is_validation());
    }

    #[test]
    fn test_duplicate_ids_count_once() {
        let mut engine = engine_with_runs(vec![run("r1", "a", 1)]);
        engine.aggregate("r1").unwrap();

        let node = engine.compare_runs(&ids(&["r1", "r1"]), None).unwrap();
        assert_eq!(node.comparison_case, Some(ComparisonCase::RepeatedRun));
        let leaf = node
            .leaf("[BASELINE]", "phase_time_syscall_system", "[SYSTEM]", "a")
            .unwrap();
        assert_eq!(leaf.values.len(), 1);
    }

    #[test]
    fn test_single_run_stats() {
        let mut engine = engine_with_runs(vec![run("r1", "a", 1)]);
        engine.aggregate("r1").unwrap();

        let node = engine.single_run_stats("r1").unwrap();
        assert_eq!(node.comparison_case, None);
        assert_eq!(node.comparison_details, vec!["a"]);
        node.for_each_leaf(|_, _, _, _, leaf| {
            assert_eq!(leaf.values.len(), 1);
            assert!(leaf.stddev.is_none());
        });
    }
}
