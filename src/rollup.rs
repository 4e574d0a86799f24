//! Metric rollup rules and unit-conversion formulas
//!
//! Maps a metric name/unit to the policy used to collapse its raw samples
//! inside a phase, and holds the derived-row formulas (power, CO2, network
//! energy, embodied carbon). The constants here are shared with the
//! dashboard, so numeric behaviour must not drift.

use crate::config::{CarbonConfig, EmbodiedCarbon};
use thiserror::Error;

/// Gauges that are averaged over the phase
pub const MEAN_METRICS: &[&str] = &[
    "lm_sensors_temperature_component",
    "lm_sensors_fan_component",
    "lmsensors_temperature_component",
    "lmsensors_fan_component",
    "cpu_utilization_procfs_system",
    "cpu_utilization_mach_system",
    "cpu_utilization_cgroup_container",
    "cpu_utilization_cgroup_system",
    "cpu_frequency_sysfs_core",
    "memory_total_cgroup_container",
    "memory_used_cgroup_container",
    "memory_used_procfs_system",
];

/// Monotonic byte counters; the phase value is the delta over the window
pub const CUMULATIVE_METRICS: &[&str] = &[
    "network_io_cgroup_container",
    "network_io_docker_stats_container",
];

/// macOS relative energy-impact gauge
pub const ENERGY_IMPACT_METRIC: &str = "energy_impact_powermetrics_vm";

/// Unit every energy metric is expected to be reported in
pub const ENERGY_UNIT: &str = "mJ";

pub const PHASE_TIME_METRIC: &str = "phase_time_syscall_system";
pub const NETWORK_ENERGY_METRIC: &str = "network_energy_formula_global";
pub const NETWORK_POWER_METRIC: &str = "network_power_formula_global";
pub const NETWORK_CO2_METRIC: &str = "network_co2_formula_global";
pub const EMBODIED_CARBON_METRIC: &str = "embodied_carbon_share_machine";
pub const SCI_METRIC: &str = "software_carbon_intensity_global";

/// Whole-machine CPU utilization gauges
pub const MACHINE_CPU_UTILIZATION_METRICS: &[&str] =
    &["cpu_utilization_procfs_system", "cpu_utilization_mach_system"];

/// Per-container CPU utilization gauges; the detail name is the container
pub const CONTAINER_CPU_UTILIZATION_METRICS: &[&str] =
    &["cpu_utilization_cgroup_container", "cpu_utilization_cgroup_system"];

/// Container share of the whole machine draw
pub const SLICE_ENERGY_METRIC: &str = "psu_energy_cgroup_slice";
pub const SLICE_POWER_METRIC: &str = "psu_power_cgroup_slice";
/// Container share of the draw above the baseline
pub const CONTAINER_ENERGY_METRIC: &str = "psu_energy_cgroup_container";
pub const CONTAINER_POWER_METRIC: &str = "psu_power_cgroup_container";

const SECONDS_PER_YEAR: f64 = 60.0 * 60.0 * 24.0 * 365.0;

/// Errors from unit-conversion helpers
///
/// These indicate a caller bug, not bad input data.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ConversionError {
    #[error("Unexpected unit for {operation}: expected {expected}, got {actual}")]
    UnexpectedUnit {
        operation: &'static str,
        expected: &'static str,
        actual: String,
    },
}

/// How the raw samples of a metric are rolled up per phase
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RollupPolicy {
    /// `MEAN` of the samples, with max/min
    Mean,
    /// `TOTAL` as `max - min` of a cumulative counter; feeds the network formula
    CumulativeDelta,
    /// `TOTAL` energy plus derived power (and CO2 for machine-level meters)
    Energy,
    /// Energy-impact gauge, rolled up like [`RollupPolicy::Mean`]
    EnergyImpact,
    /// `TOTAL` sum with max/min
    Default,
}

impl RollupPolicy {
    /// Select the policy for a metric series
    ///
    /// # Example
    /// ```
    /// use phasestats::rollup::RollupPolicy;
    ///
    /// assert_eq!(
    ///     RollupPolicy::for_metric("cpu_energy_rapl_msr_component", "mJ"),
    ///     RollupPolicy::Energy
    /// );
    /// assert_eq!(
    ///     RollupPolicy::for_metric("cpu_energy_rapl_msr_component", "uJ"),
    ///     RollupPolicy::Default
    /// );
    /// ```
    pub fn for_metric(metric: &str, unit: &str) -> Self {
        if MEAN_METRICS.contains(&metric) {
            Self::Mean
        } else if CUMULATIVE_METRICS.contains(&metric) {
            Self::CumulativeDelta
        } else if is_energy_metric(metric) && unit == ENERGY_UNIT {
            Self::Energy
        } else if metric == ENERGY_IMPACT_METRIC {
            Self::EnergyImpact
        } else {
            Self::Default
        }
    }
}

/// Whether the metric name denotes an energy counter
pub fn is_energy_metric(metric: &str) -> bool {
    metric.contains("_energy_")
}

/// Whether an energy metric measures the whole machine
pub fn is_machine_metric(metric: &str) -> bool {
    metric.ends_with("_machine")
}

/// Name of the power row derived from an energy metric
pub fn power_metric_name(energy_metric: &str) -> String {
    energy_metric.replace("_energy_", "_power_")
}

/// Name of the CO2 row derived from a machine energy metric
pub fn co2_metric_name(energy_metric: &str) -> String {
    energy_metric.replace("_energy_", "_co2_")
}

/// Power derived from an energy window, in mW
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DerivedPower {
    pub avg: f64,
    pub max: f64,
    pub min: f64,
}

impl DerivedPower {
    /// `avg = sum * 1e6 / duration_us`
    ///
    /// max/min divide by the mean sampling interval `duration_us / count`,
    /// which the dashboard depends on numerically.
    pub fn from_energy(sum: f64, max: f64, min: f64, count: u64, duration_us: f64) -> Self {
        let sample_interval_us = duration_us / count as f64;
        Self {
            avg: sum * 1e6 / duration_us,
            max: max * 1e6 / sample_interval_us,
            min: min * 1e6 / sample_interval_us,
        }
    }
}

/// Operational CO2 of an energy amount: `(mJ / 3600) * intensity`, in µg
pub fn energy_to_co2_ug(energy_mj: f64, grid_intensity_g_per_kwh: f64) -> f64 {
    (energy_mj / 3600.0) * grid_intensity_g_per_kwh
}

/// Network transfer footprint derived by formula
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct NetworkFootprint {
    pub kwh: f64,
    pub energy_mj: f64,
    pub co2_ug: f64,
}

impl NetworkFootprint {
    /// `kWh = (bytes / 1e9) * N`, `mJ = kWh * 3.6e9`, `µg = kWh * I * 1e6`
    pub fn from_bytes(total_bytes: f64, carbon: &CarbonConfig) -> Self {
        let kwh = (total_bytes / 1e9) * carbon.network_kwh_per_gb;
        Self {
            kwh,
            energy_mj: kwh * 3.6e9,
            co2_ug: kwh * carbon.grid_intensity_g_per_kwh * 1e6,
        }
    }

    /// Average power over the phase in mW
    pub fn power_mw(&self, duration_us: f64) -> f64 {
        self.energy_mj / (duration_us / 1e6)
    }
}

/// Share of the machine's embodied carbon attributable to a phase, in µg
pub fn embodied_carbon_ug(duration_us: f64, embodied: &EmbodiedCarbon) -> f64 {
    let duration_years = duration_us / 1e6 / SECONDS_PER_YEAR;
    (duration_years / embodied.expected_lifespan_years)
        * embodied.total_embodied_g
        * embodied.resource_share
        * 1e6
}

/// Fraction of the machine draw attributed to one container
///
/// Proportional to the container's share of total container CPU
/// utilization. A total below one utilization unit means nothing ran, and
/// every container gets 0.
pub fn container_split_ratio(utilization: f64, total_utilization: f64) -> f64 {
    if total_utilization.trunc() == 0.0 {
        0.0
    } else {
        utilization / total_utilization
    }
}

/// Machine draw of one phase, as measured by a `_machine` energy meter
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct MachineDraw {
    pub energy_mj: f64,
    pub power_mw: f64,
}

/// Machine draw attributed to a single container
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ContainerAttribution {
    /// Share of the total machine energy, in mJ
    pub slice_energy_mj: f64,
    /// Share of the average machine power, in mW
    pub slice_power_mw: f64,
    /// Share of the energy above what the baseline power would draw, in mJ
    pub surplus_energy_mj: f64,
    /// Share of the power above the baseline power, in mW
    pub surplus_power_mw: f64,
}

impl ContainerAttribution {
    /// Split `draw` by `ratio`, with the baseline subtracted for the surplus
    ///
    /// The baseline energy is derived from its power and the phase duration,
    /// since phases differ in length.
    pub fn split(draw: MachineDraw, baseline_power_mw: f64, duration_us: f64, ratio: f64) -> Self {
        let surplus_power_mw = draw.power_mw - baseline_power_mw;
        let surplus_energy_mj = draw.energy_mj - baseline_power_mw * (duration_us / 1e6);
        Self {
            slice_energy_mj: draw.energy_mj * ratio,
            slice_power_mw: draw.power_mw * ratio,
            surplus_energy_mj: surplus_energy_mj * ratio,
            surplus_power_mw: surplus_power_mw * ratio,
        }
    }
}

/// Software Carbon Intensity: `(operational + embodied) / R`, in µg per unit
pub fn software_carbon_intensity_ug(operational_ug: f64, embodied_ug: f64, functional_units: f64) -> f64 {
    (operational_ug + embodied_ug) / functional_units
}

/// Unit of the SCI row for a functional unit name
pub fn sci_unit(functional_unit_name: &str) -> String {
    format!("ugCO2e/{}", functional_unit_name)
}

/// Rescale an energy value in mJ to the most readable unit
///
/// Any unit other than mJ is a programming error and is reported as such.
///
/// # Example
/// ```
/// use phasestats::rollup::rescale_energy_value;
///
/// assert_eq!(rescale_energy_value(2_500.0, "mJ").unwrap(), (2.5, "J"));
/// assert!(rescale_energy_value(2_500.0, "uJ").is_err());
/// ```
pub fn rescale_energy_value(value: f64, unit: &str) -> Result<(f64, &'static str), ConversionError> {
    if unit != ENERGY_UNIT {
        return Err(ConversionError::UnexpectedUnit {
            operation: "energy rescaling",
            expected: ENERGY_UNIT,
            actual: unit.to_string(),
        });
    }

    let rescaled = if value > 1e12 {
        (value / 1e12, "GJ")
    } else if value > 1e9 {
        (value / 1e9, "MJ")
    } else if value > 1e6 {
        (value / 1e6, "kJ")
    } else if value > 1e3 {
        (value / 1e3, "J")
    } else if value < 1e-3 {
        (value * 1e3, "uJ")
    } else {
        (value, "mJ")
    };

    Ok(rescaled)
}
