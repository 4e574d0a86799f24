//! Run / measurement / phase-stat persistence
//!
//! The aggregation and comparison code only talks to [`MeasurementStore`].
//! Two backends are provided:
//! - [`MemoryStore`]: plain vectors, used by tests and for embedding
//! - [`SqliteStore`]: `rusqlite` backed, used by the command line tool
//!
//! Neither backend coordinates concurrent aggregation of the same run;
//! callers serialize that themselves.

mod memory;
mod sqlite;

pub use memory::MemoryStore;
pub use sqlite::SqliteStore;

use crate::model::{
    DimensionCounts, Machine, MetricSeries, PhaseStat, PhaseStatRow, RawMeasurement, Run,
    WindowAggregate,
};
use serde::{Deserialize, Serialize};
use std::path::Path;
use thiserror::Error;

/// Errors raised by store backends
#[derive(Error, Debug)]
pub enum StoreError {
    #[error("Run not found: {0}")]
    RunNotFound(String),

    #[error("Duplicate phase stat for run {run_id}: {phase} / {metric} / {detail_name}")]
    DuplicatePhaseStat {
        run_id: String,
        phase: String,
        metric: String,
        detail_name: String,
    },

    #[error("Corrupt stored data: {0}")]
    Corrupt(String),

    #[error("SQLite error: {0}")]
    Sqlite(#[from] rusqlite::Error),
}

/// Query contracts the engine needs from the run store
pub trait MeasurementStore {
    /// Fetch a run including its ordered phase list
    fn get_run(&self, run_id: &str) -> Result<Run, StoreError>;

    /// Distinct (metric, unit, detail) series recorded for a run, ordered by metric
    fn metric_series(&self, run_id: &str) -> Result<Vec<MetricSeries>, StoreError>;

    /// sum/max/min/avg/count of one series where `start_us <= time < end_us`
    fn aggregate_raw_measurement(
        &self,
        run_id: &str,
        metric: &str,
        detail_name: &str,
        start_us: i64,
        end_us: i64,
    ) -> Result<WindowAggregate, StoreError>;

    /// Distinct repositories, scenarios, machines, commits and branches over the runs
    fn distinct_run_dimension_counts(
        &self,
        run_ids: &[String],
    ) -> Result<DimensionCounts, StoreError>;

    /// Phase stats of the runs joined with run metadata, in canonical order
    fn fetch_phase_stats(&self, run_ids: &[String]) -> Result<Vec<PhaseStatRow>, StoreError>;

    /// Persist freshly aggregated rows; rows are never updated afterwards
    fn bulk_insert_phase_stats(&mut self, rows: &[PhaseStat]) -> Result<(), StoreError>;
}

/// Importable bundle of machines, runs and raw measurements
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Dataset {
    #[serde(default)]
    pub machines: Vec<Machine>,
    #[serde(default)]
    pub runs: Vec<Run>,
    #[serde(default)]
    pub measurements: Vec<RawMeasurement>,
}

impl Dataset {
    /// Read a JSON dataset file
    pub fn from_json_file(path: &Path) -> anyhow::Result<Self> {
        let content = std::fs::read_to_string(path)
            .map_err(|e| anyhow::anyhow!("Failed to read dataset {}: {}", path.display(), e))?;
        let dataset = serde_json::from_str(&content)
            .map_err(|e| anyhow::anyhow!("Invalid dataset {}: {}", path.display(), e))?;
        Ok(dataset)
    }
}
