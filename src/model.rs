//! Core data model: runs, raw measurements and per-phase rollup rows
//!
//! Timestamps are microseconds since the epoch throughout.

use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::fmt;

/// Branch name reported for runs that did not record one
pub const DEFAULT_BRANCH: &str = "main / master";

/// Detail name used for rows that describe the phase itself
pub const DETAIL_SYSTEM: &str = "[SYSTEM]";

/// Detail name used for rows derived by formula instead of measurement
pub const DETAIL_FORMULA: &str = "[FORMULA]";

/// Idle phase whose machine power is the reference for container attribution
pub const BASELINE_PHASE: &str = "[BASELINE]";

pub const RUNTIME_PHASE: &str = "[RUNTIME]";

/// A named, time-bounded stage of a run
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Phase {
    pub name: String,
    pub start_us: i64,
    pub end_us: i64,
}

impl Phase {
    pub fn new(name: impl Into<String>, start_us: i64, end_us: i64) -> Self {
        Self {
            name: name.into(),
            start_us,
            end_us,
        }
    }

    /// Phase duration in microseconds
    pub fn duration_us(&self) -> i64 {
        self.end_us - self.start_us
    }

    /// Label stored on phase-stat rows: `"{ordinal:03}_{name}"`
    ///
    /// The ordinal prefix only forces a stable sort order; use
    /// [`strip_phase_ordinal`] before treating the label as a key.
    pub fn label(&self, ordinal: usize) -> String {
        format!("{:03}_{}", ordinal, self.name)
    }

    /// User-named steps of the runtime; system phases are bracketed
    pub fn is_runtime_sub_phase(&self) -> bool {
        !self.name.contains('[')
    }
}

/// Remove the `NNN_` ordering prefix from a stored phase label
pub fn strip_phase_ordinal(label: &str) -> &str {
    match label.split_once('_') {
        Some((_, name)) => name,
        None => label,
    }
}

/// One measured software execution
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Run {
    pub id: String,
    pub repository: String,
    pub filename: String,
    #[serde(default)]
    pub branch: Option<String>,
    pub commit_hash: String,
    pub machine_id: i64,
    #[serde(default)]
    pub phases: Vec<Phase>,
    /// Creation time, used as the last tie-breaker when ordering rows
    #[serde(default)]
    pub created_at: i64,
}

impl Run {
    /// Branch, or [`DEFAULT_BRANCH`] when none was recorded
    pub fn branch_or_default(&self) -> &str {
        self.branch.as_deref().unwrap_or(DEFAULT_BRANCH)
    }
}

/// A machine runs are measured on
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Machine {
    pub id: i64,
    pub description: String,
}

/// A single raw telemetry sample produced by a metric provider
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RawMeasurement {
    pub run_id: String,
    pub metric: String,
    pub detail_name: String,
    pub time_us: i64,
    pub value: f64,
    pub unit: String,
}

/// A distinct (metric, unit, detail) time series observed for a run
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct MetricSeries {
    pub metric: String,
    pub unit: String,
    pub detail_name: String,
}

/// Aggregates of a series inside one half-open time window
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct WindowAggregate {
    pub sum: f64,
    pub max: f64,
    pub min: f64,
    pub avg: f64,
    pub count: u64,
}

impl WindowAggregate {
    /// Fold a slice of values into an aggregate; an empty slice yields `count == 0`
    pub fn from_values(values: &[f64]) -> Self {
        if values.is_empty() {
            return Self::default();
        }

        let sum: f64 = values.iter().sum();
        let max = values.iter().copied().fold(f64::NEG_INFINITY, f64::max);
        let min = values.iter().copied().fold(f64::INFINITY, f64::min);

        Self {
            sum,
            max,
            min,
            avg: sum / values.len() as f64,
            count: values.len() as u64,
        }
    }
}

/// How a phase-stat value was rolled up
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum StatKind {
    Mean,
    Total,
}

impl StatKind {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Mean => "MEAN",
            Self::Total => "TOTAL",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "MEAN" => Some(Self::Mean),
            "TOTAL" => Some(Self::Total),
            _ => None,
        }
    }
}

impl fmt::Display for StatKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Per-phase summary row, written once per (run, phase, metric, detail)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PhaseStat {
    pub run_id: String,
    pub phase: String,
    pub metric: String,
    pub detail_name: String,
    pub value: f64,
    pub kind: StatKind,
    pub max_value: Option<f64>,
    pub min_value: Option<f64>,
    pub unit: String,
    pub created_at: i64,
}

/// A phase-stat row joined with the metadata of the run it belongs to
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PhaseStatRow {
    pub phase: String,
    pub metric: String,
    pub detail_name: String,
    pub value: f64,
    pub kind: StatKind,
    pub max_value: Option<f64>,
    pub min_value: Option<f64>,
    pub unit: String,
    pub repository: String,
    pub machine_id: i64,
    pub machine_description: String,
    pub filename: String,
    pub commit_hash: String,
    pub branch: String,
    pub run_created_at: i64,
}

impl PhaseStatRow {
    /// Canonical ordering of joined rows
    ///
    /// phase, metric, detail, repository, machine, filename, commit, branch,
    /// run creation time. The one-sample test treats the last value of a
    /// leaf specially, so this order must be deterministic.
    pub fn canonical_cmp(&self, other: &Self) -> Ordering {
        self.phase
            .cmp(&other.phase)
            .then_with(|| self.metric.cmp(&other.metric))
            .then_with(|| self.detail_name.cmp(&other.detail_name))
            .then_with(|| self.repository.cmp(&other.repository))
            .then_with(|| self.machine_id.cmp(&other.machine_id))
            .then_with(|| self.filename.cmp(&other.filename))
            .then_with(|| self.commit_hash.cmp(&other.commit_hash))
            .then_with(|| self.branch.cmp(&other.branch))
            .then_with(|| self.run_created_at.cmp(&other.run_created_at))
    }
}

/// Sort joined rows into canonical order (stable)
pub fn sort_phase_stat_rows(rows: &mut [PhaseStatRow]) {
    rows.sort_by(PhaseStatRow::canonical_cmp);
}

/// Distinct dimension counts over a set of runs
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct DimensionCounts {
    pub repos: u64,
    pub scenarios: u64,
    pub machines: u64,
    pub commits: u64,
    pub branches: u64,
}

impl DimensionCounts {
    pub fn new(repos: u64, scenarios: u64, machines: u64, commits: u64, branches: u64) -> Self {
        Self {
            repos,
            scenarios,
            machines,
            commits,
            branches,
        }
    }
}
