//! Display metadata for known metrics

use serde::Serialize;

/// Human-facing description of a metric
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct MetricInfo {
    pub clean_name: String,
    pub source: String,
    pub explanation: String,
}

// (metric, clean name, source, explanation)
#[rustfmt::skip]
const CATALOG: &[(&str, &str, &str, &str)] = &[
    ("phase_time_syscall_system", "Phase Duration", "Syscall", "Duration of the phase measured through a syscall"),
    ("psu_co2_ac_ipmi_machine", "Machine CO2", "Formula (IPMI)", "Machine CO2 calculated by formula via IPMI measurement"),
    ("psu_co2_dc_picolog_mainboard", "Machine CO2", "Formula (PicoLog)", "Machine CO2 calculated by formula via PicoLog HRDL ADC-24 measurement"),
    ("psu_co2_ac_powerspy2_machine", "Machine CO2", "PowerSpy2", "Machine CO2 calculated by formula via PowerSpy2 measurement"),
    ("psu_co2_ac_xgboost_machine", "Machine CO2", "Formula (XGBoost)", "Machine CO2 calculated by formula via XGBoost estimation"),
    ("network_energy_formula_global", "Network Energy", "Formula", "Network Energy calculated by formula"),
    ("network_power_formula_global", "Network Power", "Formula", "Network Power calculated by formula"),
    ("network_co2_formula_global", "Network CO2", "Formula", "Network CO2 calculated by formula"),
    ("embodied_carbon_share_machine", "Embodied Carbon", "Formula (SCI)", "Share of the machine's embodied carbon attributed to the phase"),
    ("software_carbon_intensity_global", "SCI", "Formula (SCI)", "Operational and embodied carbon of the runtime sub-phases per functional unit"),
    ("psu_energy_cgroup_slice", "Container Energy (Slice)", "Formula", "Machine energy split by the container's share of CPU utilization"),
    ("psu_power_cgroup_slice", "Container Power (Slice)", "Formula", "Machine power split by the container's share of CPU utilization"),
    ("psu_energy_cgroup_container", "Container Energy", "Formula", "Machine energy above the baseline, split by the container's share of CPU utilization"),
    ("psu_power_cgroup_container", "Container Power", "Formula", "Machine power above the baseline, split by the container's share of CPU utilization"),
    ("lm_sensors_temperature_component", "CPU Temperature", "lm_sensors", "CPU Temperature as reported by lm_sensors"),
    ("lm_sensors_fan_component", "Fan Speed", "lm_sensors", "Fan speed as reported by lm_sensors"),
    ("psu_energy_ac_powerspy2_machine", "Machine Energy", "PowerSpy2", "Full machine energy (AC) as reported by PowerSpy2"),
    ("psu_power_ac_powerspy2_machine", "Machine Power", "PowerSpy2", "Full machine power (AC) as reported by PowerSpy2"),
    ("psu_energy_ac_xgboost_machine", "Machine Energy", "XGBoost", "Full machine energy (AC) as estimated by XGBoost model"),
    ("psu_power_ac_xgboost_machine", "Machine Power", "XGBoost", "Full machine power (AC) as estimated by XGBoost model"),
    ("psu_energy_ac_ipmi_machine", "Machine Energy", "IPMI", "Full machine energy (AC) as reported by IPMI"),
    ("psu_power_ac_ipmi_machine", "Machine Power", "IPMI", "Full machine power (AC) as reported by IPMI"),
    ("psu_energy_dc_picolog_mainboard", "Machine Energy", "PicoLog", "Full machine energy (DC) as reported by PicoLog HRDL ADC-24"),
    ("psu_power_dc_picolog_mainboard", "Machine Power", "PicoLog", "Full machine power (DC) as reported by PicoLog HRDL ADC-24"),
    ("cpu_frequency_sysfs_core", "CPU Frequency", "sysfs", "CPU Frequency per core as reported by sysfs"),
    ("ane_power_powermetrics_component", "ANE Power", "powermetrics", "Apple Neural Engine"),
    ("ane_energy_powermetrics_component", "ANE Energy", "powermetrics", "Apple Neural Engine"),
    ("gpu_power_powermetrics_component", "GPU Power", "powermetrics", "Apple M1 GPU / Intel GPU"),
    ("gpu_energy_powermetrics_component", "GPU Energy", "powermetrics", "Apple M1 GPU / Intel GPU"),
    ("cores_power_powermetrics_component", "CPU Power (Cores)", "powermetrics", "Power of the cores only without GPU, ANE, DRAM etc."),
    ("cores_energy_powermetrics_component", "CPU Energy (Cores)", "powermetrics", "Energy of the cores only without GPU, ANE, DRAM etc."),
    ("cpu_time_powermetrics_vm", "CPU time", "powermetrics", "Effective execution time of the CPU for all cores combined"),
    ("disk_io_bytesread_powermetrics_vm", "Bytes read (HDD/SDD)", "powermetrics", "Bytes read from disk"),
    ("disk_io_byteswritten_powermetrics_vm", "Bytes written (HDD/SDD)", "powermetrics", "Bytes written to disk"),
    ("energy_impact_powermetrics_vm", "Energy impact", "powermetrics", "macOS proprietary value for relative energy impact on device"),
    ("cpu_utilization_cgroup_container", "CPU %", "cgroup", "CPU Utilization per container"),
    ("cpu_utilization_procfs_system", "CPU %", "procfs", "CPU Utilization of total system"),
    ("memory_total_cgroup_container", "Memory Usage", "cgroup", "Memory Usage per container"),
    ("network_io_cgroup_container", "Network I/O", "cgroup", "Network I/O bytes transferred per container"),
    ("cpu_energy_rapl_msr_component", "CPU Energy (Package)", "RAPL", "RAPL based CPU energy of package domain"),
    ("cpu_power_rapl_msr_component", "CPU Power (Package)", "RAPL", "Derived RAPL based CPU energy of package domain"),
    ("memory_energy_rapl_msr_component", "Memory Energy (DRAM)", "RAPL", "RAPL based memory energy of DRAM domain"),
    ("memory_power_rapl_msr_component", "Memory Power (DRAM)", "RAPL", "Derived RAPL based memory energy of DRAM domain"),
];

/// Look up display metadata; unknown metrics fall back to their raw name
pub fn metric_info(metric: &str) -> MetricInfo {
    match CATALOG.iter().find(|(name, ..)| *name == metric) {
        Some((_, clean_name, source, explanation)) => MetricInfo {
            clean_name: (*clean_name).to_string(),
            source: (*source).to_string(),
            explanation: (*explanation).to_string(),
        },
        None => MetricInfo {
            clean_name: metric.to_string(),
            source: "Unknown".to_string(),
            explanation: String::new(),
        },
    }
}
