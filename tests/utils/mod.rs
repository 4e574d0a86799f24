// Integration test utilities
//
// Builders for small but realistic datasets: two phases per run, one
// machine-level energy meter and one CPU utilization gauge.

#![allow(dead_code)]

use phasestats::model::{Machine, Phase, RawMeasurement, Run};
use phasestats::store::Dataset;

pub const SECOND: i64 = 1_000_000;

pub const ENERGY_METRIC: &str = "psu_energy_ac_ipmi_machine";
pub const CPU_METRIC: &str = "cpu_utilization_procfs_system";

/// Run attributes that vary between comparison cases
#[derive(Debug, Clone)]
pub struct RunSpec {
    pub id: String,
    pub repository: String,
    pub filename: String,
    pub branch: Option<String>,
    pub commit_hash: String,
    pub machine_id: i64,
    pub created_at: i64,
    /// Added to every energy sample, so runs differ measurably
    pub energy_offset: f64,
}

impl RunSpec {
    pub fn new(id: &str) -> Self {
        Self {
            id: id.to_string(),
            repository: "https://github.com/example/app".to_string(),
            filename: "usage_scenario.yml".to_string(),
            branch: None,
            commit_hash: "c0ffee".to_string(),
            machine_id: 1,
            created_at: 0,
            energy_offset: 0.0,
        }
    }

    pub fn commit(mut self, commit: &str) -> Self {
        self.commit_hash = commit.to_string();
        self
    }

    pub fn branch(mut self, branch: &str) -> Self {
        self.branch = Some(branch.to_string());
        self
    }

    pub fn machine(mut self, machine_id: i64) -> Self {
        self.machine_id = machine_id;
        self
    }

    pub fn repository(mut self, repository: &str) -> Self {
        self.repository = repository.to_string();
        self
    }

    pub fn filename(mut self, filename: &str) -> Self {
        self.filename = filename.to_string();
        self
    }

    pub fn created_at(mut self, created_at: i64) -> Self {
        self.created_at = created_at;
        self
    }

    pub fn energy_offset(mut self, offset: f64) -> Self {
        self.energy_offset = offset;
        self
    }

    pub fn to_run(&self) -> Run {
        Run {
            id: self.id.clone(),
            repository: self.repository.clone(),
            filename: self.filename.clone(),
            branch: self.branch.clone(),
            commit_hash: self.commit_hash.clone(),
            machine_id: self.machine_id,
            phases: vec![
                Phase::new("[BASELINE]", 0, SECOND),
                Phase::new("[RUNTIME]", SECOND, 3 * SECOND),
            ],
            created_at: self.created_at,
        }
    }

    pub fn measurements(&self) -> Vec<RawMeasurement> {
        let sample = |metric: &str, detail: &str, time_us: i64, value: f64, unit: &str| {
            RawMeasurement {
                run_id: self.id.clone(),
                metric: metric.to_string(),
                detail_name: detail.to_string(),
                time_us,
                value,
                unit: unit.to_string(),
            }
        };

        let mut out = Vec::new();
        for i in 0..6 {
            let time_us = i * SECOND / 2;
            out.push(sample(
                ENERGY_METRIC,
                "[MACHINE]",
                time_us,
                1_000.0 + self.energy_offset,
                "mJ",
            ));
            out.push(sample(CPU_METRIC, "[SYSTEM]", time_us, 10.0 * (i + 1) as f64, "Ratio"));
        }
        out
    }
}

pub fn machines() -> Vec<Machine> {
    vec![
        Machine {
            id: 1,
            description: "Cluster node 1".to_string(),
        },
        Machine {
            id: 2,
            description: "Cluster node 2".to_string(),
        },
    ]
}

/// Dataset holding every run of `specs`
pub fn dataset(specs: &[RunSpec]) -> Dataset {
    Dataset {
        machines: machines(),
        runs: specs.iter().map(RunSpec::to_run).collect(),
        measurements: specs.iter().flat_map(RunSpec::measurements).collect(),
    }
}

pub fn ids(specs: &[RunSpec]) -> Vec<String> {
    specs.iter().map(|s| s.id.clone()).collect()
}
