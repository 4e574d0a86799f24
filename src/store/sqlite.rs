//! SQLite store
//!
//! Phases are kept as a JSON column on `runs`, the same shape the
//! collectors write them in.

use super::{Dataset, MeasurementStore, StoreError};
use crate::model::{
    DimensionCounts, Machine, MetricSeries, Phase, PhaseStat, PhaseStatRow, RawMeasurement, Run,
    StatKind, WindowAggregate, DEFAULT_BRANCH,
};
use rusqlite::{params, params_from_iter, Connection, OptionalExtension};
use std::path::Path;

const SCHEMA: &str = r#"
CREATE TABLE IF NOT EXISTS machines (
    id INTEGER PRIMARY KEY,
    description TEXT NOT NULL
);

CREATE TABLE IF NOT EXISTS runs (
    id TEXT PRIMARY KEY,
    uri TEXT NOT NULL,
    filename TEXT NOT NULL,
    branch TEXT,
    commit_hash TEXT NOT NULL,
    machine_id INTEGER NOT NULL,
    phases TEXT NOT NULL DEFAULT '[]',
    created_at INTEGER NOT NULL DEFAULT 0
);

CREATE TABLE IF NOT EXISTS measurements (
    run_id TEXT NOT NULL,
    metric TEXT NOT NULL,
    detail_name TEXT NOT NULL,
    time INTEGER NOT NULL,
    value REAL NOT NULL,
    unit TEXT NOT NULL
);

CREATE INDEX IF NOT EXISTS idx_measurements_series
    ON measurements(run_id, metric, detail_name, time);

CREATE TABLE IF NOT EXISTS phase_stats (
    run_id TEXT NOT NULL,
    phase TEXT NOT NULL,
    metric TEXT NOT NULL,
    detail_name TEXT NOT NULL,
    value REAL NOT NULL,
    type TEXT NOT NULL,
    max_value REAL,
    min_value REAL,
    unit TEXT NOT NULL,
    created_at INTEGER NOT NULL,
    UNIQUE(run_id, phase, metric, detail_name)
);
"#;

/// `rusqlite` backed store
pub struct SqliteStore {
    conn: Connection,
}

impl SqliteStore {
    /// Open (or create) a database file and apply the schema
    pub fn open(path: &Path) -> Result<Self, StoreError> {
        Self::with_connection(Connection::open(path)?)
    }

    /// Private in-memory database
    pub fn open_in_memory() -> Result<Self, StoreError> {
        Self::with_connection(Connection::open_in_memory()?)
    }

    fn with_connection(conn: Connection) -> Result<Self, StoreError> {
        conn.execute_batch(SCHEMA)?;
        Ok(Self { conn })
    }

    pub fn insert_machine(&self, machine: &Machine) -> Result<(), StoreError> {
        self.conn.execute(
            "INSERT OR REPLACE INTO machines(id, description) VALUES (?1, ?2)",
            params![machine.id, machine.description],
        )?;
        Ok(())
    }

    pub fn insert_run(&self, run: &Run) -> Result<(), StoreError> {
        let phases = serde_json::to_string(&run.phases)
            .map_err(|e| StoreError::Corrupt(format!("cannot encode phases: {}", e)))?;
        self.conn.execute(
            "INSERT OR REPLACE INTO runs(id, uri, filename, branch, commit_hash, machine_id, phases, created_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)",
            params![
                run.id,
                run.repository,
                run.filename,
                run.branch,
                run.commit_hash,
                run.machine_id,
                phases,
                run.created_at
            ],
        )?;
        Ok(())
    }

    pub fn insert_measurements(&mut self, measurements: &[RawMeasurement]) -> Result<(), StoreError> {
        let tx = self.conn.transaction()?;
        {
            let mut stmt = tx.prepare_cached(
                "INSERT INTO measurements(run_id, metric, detail_name, time, value, unit)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
            )?;
            for m in measurements {
                stmt.execute(params![
                    m.run_id,
                    m.metric,
                    m.detail_name,
                    m.time_us,
                    m.value,
                    m.unit
                ])?;
            }
        }
        tx.commit()?;
        Ok(())
    }

    /// Import a dataset; returns the number of measurements written
    pub fn load_dataset(&mut self, dataset: &Dataset) -> Result<usize, StoreError> {
        for machine in &dataset.machines {
            self.insert_machine(machine)?;
        }
        for run in &dataset.runs {
            self.insert_run(run)?;
        }
        self.insert_measurements(&dataset.measurements)?;
        Ok(dataset.measurements.len())
    }

    /// Number of phase-stat rows stored for a run
    pub fn phase_stat_count(&self, run_id: &str) -> Result<u64, StoreError> {
        let count: i64 = self.conn.query_row(
            "SELECT COUNT(*) FROM phase_stats WHERE run_id = ?1",
            params![run_id],
            |row| row.get(0),
        )?;
        Ok(count as u64)
    }
}

fn placeholders(n: usize) -> String {
    (1..=n)
        .map(|i| format!("?{}", i))
        .collect::<Vec<_>>()
        .join(", ")
}

impl MeasurementStore for SqliteStore {
    fn get_run(&self, run_id: &str) -> Result<Run, StoreError> {
        let row = self
            .conn
            .query_row(
                "SELECT id, uri, filename, branch, commit_hash, machine_id, phases, created_at
                 FROM runs WHERE id = ?1",
                params![run_id],
                |row| {
                    Ok((
                        Run {
                            id: row.get(0)?,
                            repository: row.get(1)?,
                            filename: row.get(2)?,
                            branch: row.get(3)?,
                            commit_hash: row.get(4)?,
                            machine_id: row.get(5)?,
                            phases: Vec::new(),
                            created_at: row.get(7)?,
                        },
                        row.get::<_, String>(6)?,
                    ))
                },
            )
            .optional()?;

        let (mut run, phases_json) = row.ok_or_else(|| StoreError::RunNotFound(run_id.to_string()))?;
        run.phases = serde_json::from_str::<Vec<Phase>>(&phases_json)
            .map_err(|e| StoreError::Corrupt(format!("phases of run {}: {}", run_id, e)))?;
        Ok(run)
    }

    fn metric_series(&self, run_id: &str) -> Result<Vec<MetricSeries>, StoreError> {
        let mut stmt = self.conn.prepare(
            "SELECT DISTINCT metric, unit, detail_name FROM measurements
             WHERE run_id = ?1
             ORDER BY metric ASC, unit ASC, detail_name ASC",
        )?;
        let rows = stmt.query_map(params![run_id], |row| {
            Ok(MetricSeries {
                metric: row.get(0)?,
                unit: row.get(1)?,
                detail_name: row.get(2)?,
            })
        })?;

        let mut out = Vec::new();
        for r in rows {
            out.push(r?);
        }
        Ok(out)
    }

    fn aggregate_raw_measurement(
        &self,
        run_id: &str,
        metric: &str,
        detail_name: &str,
        start_us: i64,
        end_us: i64,
    ) -> Result<WindowAggregate, StoreError> {
        let agg = self.conn.query_row(
            "SELECT SUM(value), MAX(value), MIN(value), AVG(value), COUNT(value)
             FROM measurements
             WHERE run_id = ?1 AND metric = ?2 AND detail_name = ?3
               AND time >= ?4 AND time < ?5",
            params![run_id, metric, detail_name, start_us, end_us],
            |row| {
                Ok(WindowAggregate {
                    sum: row.get::<_, Option<f64>>(0)?.unwrap_or(0.0),
                    max: row.get::<_, Option<f64>>(1)?.unwrap_or(0.0),
                    min: row.get::<_, Option<f64>>(2)?.unwrap_or(0.0),
                    avg: row.get::<_, Option<f64>>(3)?.unwrap_or(0.0),
                    count: row.get::<_, i64>(4)? as u64,
                })
            },
        )?;
        Ok(agg)
    }

    fn distinct_run_dimension_counts(
        &self,
        run_ids: &[String],
    ) -> Result<DimensionCounts, StoreError> {
        if run_ids.is_empty() {
            return Ok(DimensionCounts::default());
        }

        let sql = format!(
            "SELECT COUNT(DISTINCT uri), COUNT(DISTINCT filename), COUNT(DISTINCT machine_id),
                    COUNT(DISTINCT commit_hash), COUNT(DISTINCT COALESCE(branch, '{}'))
             FROM runs WHERE id IN ({})",
            DEFAULT_BRANCH,
            placeholders(run_ids.len())
        );

        let counts = self
            .conn
            .query_row(&sql, params_from_iter(run_ids.iter()), |row| {
                Ok(DimensionCounts {
                    repos: row.get::<_, i64>(0)? as u64,
                    scenarios: row.get::<_, i64>(1)? as u64,
                    machines: row.get::<_, i64>(2)? as u64,
                    commits: row.get::<_, i64>(3)? as u64,
                    branches: row.get::<_, i64>(4)? as u64,
                })
            })?;
        Ok(counts)
    }

    fn fetch_phase_stats(&self, run_ids: &[String]) -> Result<Vec<PhaseStatRow>, StoreError> {
        if run_ids.is_empty() {
            return Ok(Vec::new());
        }

        let sql = format!(
            "SELECT
                a.phase, a.metric, a.detail_name, a.value, a.type, a.max_value, a.min_value, a.unit,
                b.uri, b.machine_id, COALESCE(c.description, 'Unknown machine'), b.filename,
                b.commit_hash, COALESCE(b.branch, '{branch}') AS branch, b.created_at
             FROM phase_stats AS a
             JOIN runs AS b ON b.id = a.run_id
             LEFT JOIN machines AS c ON c.id = b.machine_id
             WHERE a.run_id IN ({ids})
             ORDER BY
                a.phase ASC,
                a.metric ASC,
                a.detail_name ASC,
                b.uri ASC,
                b.machine_id ASC,
                b.filename ASC,
                b.commit_hash ASC,
                branch ASC,
                b.created_at ASC",
            branch = DEFAULT_BRANCH,
            ids = placeholders(run_ids.len())
        );

        let mut stmt = self.conn.prepare(&sql)?;
        let rows = stmt.query_map(params_from_iter(run_ids.iter()), |row| {
            Ok((
                PhaseStatRow {
                    phase: row.get(0)?,
                    metric: row.get(1)?,
                    detail_name: row.get(2)?,
                    value: row.get(3)?,
                    kind: StatKind::Total,
                    max_value: row.get(5)?,
                    min_value: row.get(6)?,
                    unit: row.get(7)?,
                    repository: row.get(8)?,
                    machine_id: row.get(9)?,
                    machine_description: row.get(10)?,
                    filename: row.get(11)?,
                    commit_hash: row.get(12)?,
                    branch: row.get(13)?,
                    run_created_at: row.get(14)?,
                },
                row.get::<_, String>(4)?,
            ))
        })?;

        let mut out = Vec::new();
        for r in rows {
            let (mut row, kind) = r?;
            row.kind = StatKind::parse(&kind)
                .ok_or_else(|| StoreError::Corrupt(format!("unknown phase stat type {}", kind)))?;
            out.push(row);
        }
        Ok(out)
    }

    fn bulk_insert_phase_stats(&mut self, rows: &[PhaseStat]) -> Result<(), StoreError> {
        let tx = self.conn.transaction()?;
        {
            let mut stmt = tx.prepare_cached(
                "INSERT INTO phase_stats
                    (run_id, phase, metric, detail_name, value, type, max_value, min_value, unit, created_at)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10)",
            )?;
            for row in rows {
                stmt.execute(params![
                    row.run_id,
                    row.phase,
                    row.metric,
                    row.detail_name,
                    row.value,
                    row.kind.as_str(),
                    row.max_value,
                    row.min_value,
                    row.unit,
                    row.created_at
                ])?;
            }
        }
        tx.commit()?;
        Ok(())
    }
}
