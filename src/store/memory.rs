//! In-memory store

use super::{Dataset, MeasurementStore, StoreError};
use crate::model::{
    sort_phase_stat_rows, DimensionCounts, Machine, MetricSeries, PhaseStat, PhaseStatRow,
    RawMeasurement, Run, WindowAggregate,
};
use std::collections::BTreeSet;

const UNKNOWN_MACHINE: &str = "Unknown machine";

/// Vector-backed store with the same semantics as the SQLite backend
#[derive(Debug, Default, Clone)]
pub struct MemoryStore {
    machines: Vec<Machine>,
    runs: Vec<Run>,
    measurements: Vec<RawMeasurement>,
    phase_stats: Vec<PhaseStat>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert_machine(&mut self, machine: Machine) {
        self.machines.retain(|m| m.id != machine.id);
        self.machines.push(machine);
    }

    pub fn insert_run(&mut self, run: Run) {
        self.runs.retain(|r| r.id != run.id);
        self.runs.push(run);
    }

    pub fn insert_measurements(&mut self, measurements: impl IntoIterator<Item = RawMeasurement>) {
        self.measurements.extend(measurements);
    }

    pub fn load_dataset(&mut self, dataset: &Dataset) {
        for machine in &dataset.machines {
            self.insert_machine(machine.clone());
        }
        for run in &dataset.runs {
            self.insert_run(run.clone());
        }
        self.insert_measurements(dataset.measurements.iter().cloned());
    }

    /// All stored phase stats, in insertion order
    pub fn phase_stats(&self) -> &[PhaseStat] {
        &self.phase_stats
    }

    fn find_run(&self, run_id: &str) -> Option<&Run> {
        self.runs.iter().find(|r| r.id == run_id)
    }

    fn machine_description(&self, machine_id: i64) -> String {
        self.machines
            .iter()
            .find(|m| m.id == machine_id)
            .map(|m| m.description.clone())
            .unwrap_or_else(|| UNKNOWN_MACHINE.to_string())
    }
}

fn count_distinct<F>(runs: &[&Run], key: F) -> u64
where
    F: Fn(&Run) -> String,
{
    runs.iter().map(|r| key(*r)).collect::<BTreeSet<_>>().len() as u64
}

impl MeasurementStore for MemoryStore {
    fn get_run(&self, run_id: &str) -> Result<Run, StoreError> {
        self.find_run(run_id)
            .cloned()
            .ok_or_else(|| StoreError::RunNotFound(run_id.to_string()))
    }

    fn metric_series(&self, run_id: &str) -> Result<Vec<MetricSeries>, StoreError> {
        let series: BTreeSet<MetricSeries> = self
            .measurements
            .iter()
            .filter(|m| m.run_id == run_id)
            .map(|m| MetricSeries {
                metric: m.metric.clone(),
                unit: m.unit.clone(),
                detail_name: m.detail_name.clone(),
            })
            .collect();
        Ok(series.into_iter().collect())
    }

    fn aggregate_raw_measurement(
        &self,
        run_id: &str,
        metric: &str,
        detail_name: &str,
        start_us: i64,
        end_us: i64,
    ) -> Result<WindowAggregate, StoreError> {
        let values: Vec<f64> = self
            .measurements
            .iter()
            .filter(|m| {
                m.run_id == run_id
                    && m.metric == metric
                    && m.detail_name == detail_name
                    && m.time_us >= start_us
                    && m.time_us < end_us
            })
            .map(|m| m.value)
            .collect();
        Ok(WindowAggregate::from_values(&values))
    }

    fn distinct_run_dimension_counts(
        &self,
        run_ids: &[String],
    ) -> Result<DimensionCounts, StoreError> {
        let runs: Vec<&Run> = self
            .runs
            .iter()
            .filter(|r| run_ids.contains(&r.id))
            .collect();

        Ok(DimensionCounts {
            repos: count_distinct(&runs, |r| r.repository.clone()),
            scenarios: count_distinct(&runs, |r| r.filename.clone()),
            machines: count_distinct(&runs, |r| r.machine_id.to_string()),
            commits: count_distinct(&runs, |r| r.commit_hash.clone()),
            branches: count_distinct(&runs, |r| r.branch_or_default().to_string()),
        })
    }

    fn fetch_phase_stats(&self, run_ids: &[String]) -> Result<Vec<PhaseStatRow>, StoreError> {
        let mut rows = Vec::new();
        for stat in self
            .phase_stats
            .iter()
            .filter(|s| run_ids.contains(&s.run_id))
        {
            let run = self
                .find_run(&stat.run_id)
                .ok_or_else(|| StoreError::RunNotFound(stat.run_id.clone()))?;

            rows.push(PhaseStatRow {
                phase: stat.phase.clone(),
                metric: stat.metric.clone(),
                detail_name: stat.detail_name.clone(),
                value: stat.value,
                kind: stat.kind,
                max_value: stat.max_value,
                min_value: stat.min_value,
                unit: stat.unit.clone(),
                repository: run.repository.clone(),
                machine_id: run.machine_id,
                machine_description: self.machine_description(run.machine_id),
                filename: run.filename.clone(),
                commit_hash: run.commit_hash.clone(),
                branch: run.branch_or_default().to_string(),
                run_created_at: run.created_at,
            });
        }

        sort_phase_stat_rows(&mut rows);
        Ok(rows)
    }

    fn bulk_insert_phase_stats(&mut self, rows: &[PhaseStat]) -> Result<(), StoreError> {
        // all-or-nothing, like the SQLite transaction
        for (idx, row) in rows.iter().enumerate() {
            let same_key = |other: &PhaseStat| {
                other.run_id == row.run_id
                    && other.phase == row.phase
                    && other.metric == row.metric
                    && other.detail_name == row.detail_name
            };
            if self.phase_stats.iter().any(same_key) || rows[..idx].iter().any(same_key) {
                return Err(StoreError::DuplicatePhaseStat {
                    run_id: row.run_id.clone(),
                    phase: row.phase.clone(),
                    metric: row.metric.clone(),
                    detail_name: row.detail_name.clone(),
                });
            }
        }

        self.phase_stats.extend_from_slice(rows);
        Ok(())
    }
}
