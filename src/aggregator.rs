//! Per-phase rollup of raw measurements
//!
//! For every phase of a run and every metric series recorded for it, the
//! samples inside the half-open window `[start_us, end_us)` are collapsed
//! into phase-stat rows according to [`RollupPolicy`]. Derived rows (power,
//! CO2, network formula, embodied carbon, per-container energy, phase
//! duration) are emitted alongside.
//!
//! Two derivations span phases. Container attribution compares each phase's
//! machine power with the `[BASELINE]` phase. The Software Carbon Intensity
//! row sums machine CO2 and embodied carbon over the runtime sub-phases and
//! is stored on the `[RUNTIME]` phase.

use crate::config::CarbonConfig;
use crate::model::{
    MetricSeries, Phase, PhaseStat, Run, StatKind, WindowAggregate, BASELINE_PHASE,
    DETAIL_FORMULA, DETAIL_SYSTEM, RUNTIME_PHASE,
};
use crate::rollup::{
    co2_metric_name, container_split_ratio, embodied_carbon_ug, energy_to_co2_ug,
    is_machine_metric, power_metric_name, sci_unit, software_carbon_intensity_ug,
    ContainerAttribution, DerivedPower, MachineDraw, NetworkFootprint, RollupPolicy,
    CONTAINER_CPU_UTILIZATION_METRICS, CONTAINER_ENERGY_METRIC, CONTAINER_POWER_METRIC,
    EMBODIED_CARBON_METRIC, ENERGY_UNIT, MACHINE_CPU_UTILIZATION_METRICS, NETWORK_CO2_METRIC,
    NETWORK_ENERGY_METRIC, NETWORK_POWER_METRIC, PHASE_TIME_METRIC, SCI_METRIC,
    SLICE_ENERGY_METRIC, SLICE_POWER_METRIC,
};
use crate::store::{MeasurementStore, StoreError};
use std::collections::BTreeMap;
use std::time::{SystemTime, UNIX_EPOCH};

/// Rows of one phase under construction
struct PhaseRows<'a> {
    run_id: &'a str,
    label: String,
    created_at: i64,
    rows: &'a mut Vec<PhaseStat>,
}

impl PhaseRows<'_> {
    fn push(
        &mut self,
        metric: &str,
        detail_name: &str,
        value: f64,
        kind: StatKind,
        bounds: Option<(f64, f64)>,
        unit: &str,
    ) {
        self.rows.push(PhaseStat {
            run_id: self.run_id.to_string(),
            phase: self.label.clone(),
            metric: metric.to_string(),
            detail_name: detail_name.to_string(),
            value,
            kind,
            max_value: bounds.map(|(max, _)| max),
            min_value: bounds.map(|(_, min)| min),
            unit: unit.to_string(),
            created_at: self.created_at,
        });
    }
}

/// State carried across the phases of one run
#[derive(Debug, Default)]
struct RunTotals {
    /// Average machine power of the `[BASELINE]` phase
    baseline_power_mw: Option<f64>,
    /// Machine CO2 summed over runtime sub-phases
    sub_phase_co2_ug: Option<f64>,
    /// Embodied carbon summed over runtime sub-phases
    sub_phase_embodied_ug: Option<f64>,
}

fn accumulate(total: &mut Option<f64>, value: f64) {
    *total = Some(total.unwrap_or(0.0) + value);
}

/// What one phase measured about the machine and its containers
#[derive(Debug, Default)]
struct PhaseUsage {
    /// Last machine-level energy meter seen in the phase
    machine_draw: Option<MachineDraw>,
    machine_co2_ug: Option<f64>,
    machine_cpu_utilization: Option<f64>,
    /// container → mean CPU utilization
    container_cpu_utilization: BTreeMap<String, f64>,
}

/// Turns the raw measurements of a run into phase-stat rows
///
/// # Example
/// ```
/// use phasestats::aggregator::PhaseAggregator;
/// use phasestats::config::CarbonConfig;
/// use phasestats::model::{Phase, Run};
/// use phasestats::store::MemoryStore;
///
/// let run = Run {
///     id: "run-1".to_string(),
///     repository: "https://github.com/example/app".to_string(),
///     filename: "usage_scenario.yml".to_string(),
///     branch: None,
///     commit_hash: "abc123".to_string(),
///     machine_id: 1,
///     phases: vec![Phase::new("[BASELINE]", 0, 5_000_000)],
///     created_at: 0,
/// };
///
/// let carbon = CarbonConfig::default();
/// let rows = PhaseAggregator::new(&carbon)
///     .aggregate_run(&MemoryStore::new(), &run)
///     .unwrap();
///
/// // no metrics recorded: only the phase duration
/// assert_eq!(rows.len(), 1);
/// assert_eq!(rows[0].phase, "000_[BASELINE]");
/// assert_eq!(rows[0].value, 5_000_000.0);
/// ```
pub struct PhaseAggregator<'a> {
    carbon: &'a CarbonConfig,
}

impl<'a> PhaseAggregator<'a> {
    pub fn new(carbon: &'a CarbonConfig) -> Self {
        Self { carbon }
    }

    /// Aggregate every phase of `run`
    ///
    /// A run without phases yields no rows. Windows without samples are
    /// skipped; that happens for phases shorter than a provider's sampling
    /// interval.
    pub fn aggregate_run<S>(&self, store: &S, run: &Run) -> Result<Vec<PhaseStat>, StoreError>
    where
        S: MeasurementStore + ?Sized,
    {
        if run.phases.is_empty() {
            tracing::warn!(run_id = %run.id, "Run has no phases, no phase stats created");
            return Ok(Vec::new());
        }

        let series = store.metric_series(&run.id)?;
        if series.is_empty() {
            tracing::warn!(run_id = %run.id, "Run has no metrics, only phase durations created");
        }

        let created_at = now_us();
        let mut rows = Vec::new();
        let mut totals = RunTotals::default();
        let mut runtime_label = None;
        for (ordinal, phase) in run.phases.iter().enumerate() {
            let label = phase.label(ordinal);
            if phase.name == RUNTIME_PHASE {
                runtime_label = Some(label.clone());
            }
            let mut sink = PhaseRows {
                run_id: &run.id,
                label,
                created_at,
                rows: &mut rows,
            };
            self.aggregate_phase(store, &run.id, phase, &series, &mut sink, &mut totals)?;
        }

        if let Some((functional_units, unit_name)) = self.carbon.functional_unit() {
            match (runtime_label, totals.sub_phase_co2_ug, totals.sub_phase_embodied_ug) {
                (Some(label), Some(co2_ug), Some(embodied_ug)) => {
                    let mut sink = PhaseRows {
                        run_id: &run.id,
                        label,
                        created_at,
                        rows: &mut rows,
                    };
                    sink.push(
                        SCI_METRIC,
                        DETAIL_SYSTEM,
                        software_carbon_intensity_ug(co2_ug, embodied_ug, functional_units),
                        StatKind::Total,
                        None,
                        &sci_unit(unit_name),
                    );
                }
                _ => tracing::debug!(
                    run_id = %run.id,
                    "No runtime sub-phase carbon or no [RUNTIME] phase, SCI row skipped"
                ),
            }
        }

        tracing::debug!(run_id = %run.id, rows = rows.len(), "aggregated run");
        Ok(rows)
    }

    fn aggregate_phase<S>(
        &self,
        store: &S,
        run_id: &str,
        phase: &Phase,
        series: &[MetricSeries],
        sink: &mut PhaseRows<'_>,
        totals: &mut RunTotals,
    ) -> Result<(), StoreError>
    where
        S: MeasurementStore + ?Sized,
    {
        let duration_us = phase.duration_us() as f64;
        let mut network_bytes: Vec<f64> = Vec::new();
        let mut usage = PhaseUsage::default();

        for s in series {
            let agg = store.aggregate_raw_measurement(
                run_id,
                &s.metric,
                &s.detail_name,
                phase.start_us,
                phase.end_us,
            )?;

            if agg.count == 0 {
                tracing::debug!(
                    phase = %phase.name,
                    metric = %s.metric,
                    detail = %s.detail_name,
                    "no samples in phase window"
                );
                continue;
            }

            match RollupPolicy::for_metric(&s.metric, &s.unit) {
                RollupPolicy::Mean | RollupPolicy::EnergyImpact => {
                    sink.push(
                        &s.metric,
                        &s.detail_name,
                        agg.avg,
                        StatKind::Mean,
                        Some((agg.max, agg.min)),
                        &s.unit,
                    );
                    if MACHINE_CPU_UTILIZATION_METRICS.contains(&s.metric.as_str()) {
                        usage.machine_cpu_utilization = Some(agg.avg);
                    }
                    if CONTAINER_CPU_UTILIZATION_METRICS.contains(&s.metric.as_str()) {
                        usage
                            .container_cpu_utilization
                            .insert(s.detail_name.clone(), agg.avg);
                    }
                }
                RollupPolicy::CumulativeDelta => {
                    let delta = agg.max - agg.min;
                    sink.push(&s.metric, &s.detail_name, delta, StatKind::Total, None, &s.unit);
                    network_bytes.push(delta);
                }
                RollupPolicy::Energy => self.push_energy(sink, s, &agg, duration_us, &mut usage),
                RollupPolicy::Default => {
                    tracing::warn!(
                        metric = %s.metric,
                        unit = %s.unit,
                        "Unmapped phase stat, using TOTAL of all samples"
                    );
                    sink.push(
                        &s.metric,
                        &s.detail_name,
                        agg.sum,
                        StatKind::Total,
                        Some((agg.max, agg.min)),
                        &s.unit,
                    );
                }
            }
        }

        if !network_bytes.is_empty() {
            let footprint = NetworkFootprint::from_bytes(network_bytes.iter().sum(), self.carbon);
            sink.push(
                NETWORK_ENERGY_METRIC,
                DETAIL_FORMULA,
                footprint.energy_mj,
                StatKind::Total,
                None,
                "mJ",
            );
            sink.push(
                NETWORK_POWER_METRIC,
                DETAIL_FORMULA,
                footprint.power_mw(duration_us),
                StatKind::Total,
                None,
                "mW",
            );
            sink.push(
                NETWORK_CO2_METRIC,
                DETAIL_FORMULA,
                footprint.co2_ug,
                StatKind::Total,
                None,
                "ug",
            );
        }

        if let Some(embodied) = &self.carbon.embodied {
            let embodied_ug = embodied_carbon_ug(duration_us, embodied);
            sink.push(
                EMBODIED_CARBON_METRIC,
                DETAIL_SYSTEM,
                embodied_ug,
                StatKind::Total,
                None,
                "ug",
            );
            if phase.is_runtime_sub_phase() {
                accumulate(&mut totals.sub_phase_embodied_ug, embodied_ug);
            }
        }

        if phase.is_runtime_sub_phase() {
            if let Some(co2_ug) = usage.machine_co2_ug {
                accumulate(&mut totals.sub_phase_co2_ug, co2_ug);
            }
        }

        if phase.name == BASELINE_PHASE {
            totals.baseline_power_mw = usage.machine_draw.map(|draw| draw.power_mw);
        } else {
            push_container_attribution(sink, &usage, totals.baseline_power_mw, duration_us);
        }

        sink.push(
            PHASE_TIME_METRIC,
            DETAIL_SYSTEM,
            duration_us,
            StatKind::Total,
            None,
            "us",
        );

        Ok(())
    }

    fn push_energy(
        &self,
        sink: &mut PhaseRows<'_>,
        s: &MetricSeries,
        agg: &WindowAggregate,
        duration_us: f64,
        usage: &mut PhaseUsage,
    ) {
        sink.push(
            &s.metric,
            &s.detail_name,
            agg.sum,
            StatKind::Total,
            Some((agg.max, agg.min)),
            &s.unit,
        );

        let power = DerivedPower::from_energy(agg.sum, agg.max, agg.min, agg.count, duration_us);
        sink.push(
            &power_metric_name(&s.metric),
            &s.detail_name,
            power.avg,
            StatKind::Mean,
            Some((power.max, power.min)),
            "mW",
        );

        if is_machine_metric(&s.metric) {
            let co2_ug = energy_to_co2_ug(agg.sum, self.carbon.grid_intensity_g_per_kwh);
            sink.push(
                &co2_metric_name(&s.metric),
                &s.detail_name,
                co2_ug,
                StatKind::Total,
                None,
                "ug",
            );
            accumulate(&mut usage.machine_co2_ug, co2_ug);
            usage.machine_draw = Some(MachineDraw {
                energy_mj: agg.sum,
                power_mw: power.avg,
            });
        }
    }
}

/// Split the machine draw of a phase across its containers
///
/// Needs a non-zero machine power in this phase and in the baseline, a
/// non-zero machine CPU utilization and at least one container.
fn push_container_attribution(
    sink: &mut PhaseRows<'_>,
    usage: &PhaseUsage,
    baseline_power_mw: Option<f64>,
    duration_us: f64,
) {
    let Some(draw) = usage.machine_draw.filter(|draw| draw.power_mw != 0.0) else {
        return;
    };
    let Some(baseline_power_mw) = baseline_power_mw.filter(|power| *power != 0.0) else {
        return;
    };
    if !matches!(usage.machine_cpu_utilization, Some(u) if u != 0.0)
        || usage.container_cpu_utilization.is_empty()
    {
        return;
    }

    let total_utilization: f64 = usage.container_cpu_utilization.values().sum();
    for (container, utilization) in &usage.container_cpu_utilization {
        let ratio = container_split_ratio(*utilization, total_utilization);
        let share = ContainerAttribution::split(draw, baseline_power_mw, duration_us, ratio);
        let rows = [
            (SLICE_ENERGY_METRIC, share.slice_energy_mj, ENERGY_UNIT),
            (SLICE_POWER_METRIC, share.slice_power_mw, "mW"),
            (CONTAINER_ENERGY_METRIC, share.surplus_energy_mj, ENERGY_UNIT),
            (CONTAINER_POWER_METRIC, share.surplus_power_mw, "mW"),
        ];
        for (metric, value, unit) in rows {
            sink.push(metric, container, value, StatKind::Total, None, unit);
        }
    }
}

fn now_us() -> i64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_micros() as i64)
        .unwrap_or(0)
}
