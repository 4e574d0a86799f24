//! Engine configuration
//!
//! Carbon constants and statistical thresholds. The defaults reproduce the
//! values the rollup and comparison code has always used, so an empty
//! configuration file behaves exactly like no file at all.

use serde::{Deserialize, Serialize};
use std::path::Path;

/// Embodied-carbon parameters (Software Carbon Intensity `TE`, `EL`, `RS`)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EmbodiedCarbon {
    /// Total embodied emissions of the machine in grams CO2e (`TE`)
    pub total_embodied_g: f64,

    /// Expected lifespan of the machine in years (`EL`)
    pub expected_lifespan_years: f64,

    /// Share of the machine reserved for the measured software (`RS`)
    pub resource_share: f64,
}

/// Constants used to turn energy and transferred bytes into CO2
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CarbonConfig {
    /// Grid carbon intensity in gCO2e/kWh (`I`)
    ///
    /// Default: 475 (global average)
    pub grid_intensity_g_per_kwh: f64,

    /// Network transfer energy intensity in kWh/GB (`N`)
    ///
    /// Default: 0.00375
    pub network_kwh_per_gb: f64,

    /// When set, every phase also gets an embodied-carbon share row
    pub embodied: Option<EmbodiedCarbon>,

    /// Functional units one run performs (`R`), e.g. requests served
    ///
    /// Together with `functional_unit_name` and `embodied`, the runtime
    /// phase gets a Software Carbon Intensity row. Absent or 0 disables it.
    pub functional_unit_count: Option<f64>,

    /// Name of the functional unit (`R_d`); the SCI row unit is `ugCO2e/<name>`
    pub functional_unit_name: Option<String>,
}

impl CarbonConfig {
    /// Functional unit `(count, name)` when the SCI row can be computed
    pub fn functional_unit(&self) -> Option<(f64, &str)> {
        match (self.functional_unit_count, self.functional_unit_name.as_deref()) {
            (Some(count), Some(name)) if count != 0.0 => Some((count, name)),
            _ => None,
        }
    }
}

impl Default for CarbonConfig {
    fn default() -> Self {
        Self {
            grid_intensity_g_per_kwh: 475.0,
            network_kwh_per_gb: 0.00375,
            embodied: None,
            functional_unit_count: None,
            functional_unit_name: None,
        }
    }
}

/// Thresholds for descriptive and inferential statistics
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct StatisticsConfig {
    /// A test is significant when `p_value <= significance_level`
    ///
    /// - 0.05 (default): 95% confidence
    /// - 0.01: stricter, fewer false positives
    pub significance_level: f64,

    /// Two-sided confidence level of the reported confidence interval
    ///
    /// Default: 0.95
    pub confidence_level: f64,
}

impl Default for StatisticsConfig {
    fn default() -> Self {
        Self {
            significance_level: 0.05,
            confidence_level: 0.95,
        }
    }
}

/// Complete engine configuration
///
/// # Example
/// ```
/// use phasestats::config::EngineConfig;
///
/// let config = EngineConfig::default();
/// assert_eq!(config.carbon.grid_intensity_g_per_kwh, 475.0);
/// assert_eq!(config.statistics.significance_level, 0.05);
/// ```
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    pub carbon: CarbonConfig,
    pub statistics: StatisticsConfig,
}

impl EngineConfig {
    /// Stricter statistics: 99% confidence, significance at 0.01
    pub fn strict() -> Self {
        Self {
            carbon: CarbonConfig::default(),
            statistics: StatisticsConfig {
                significance_level: 0.01,
                confidence_level: 0.99,
            },
        }
    }

    /// Parse a TOML document; missing keys keep their defaults
    pub fn from_toml_str(s: &str) -> anyhow::Result<Self> {
        let config: Self = toml::from_str(s)?;
        config.validate().map_err(|e| anyhow::anyhow!(e))?;
        Ok(config)
    }

    /// Load and validate a TOML configuration file
    pub fn from_file(path: &Path) -> anyhow::Result<Self> {
        let content = std::fs::read_to_string(path)
            .map_err(|e| anyhow::anyhow!("Failed to read config {}: {}", path.display(), e))?;
        Self::from_toml_str(&content)
    }

    /// Validate configuration
    pub fn validate(&self) -> Result<(), String> {
        let stats = &self.statistics;
        if !(stats.significance_level > 0.0 && stats.significance_level < 1.0) {
            return Err(format!(
                "significance_level must be in (0, 1), got {}",
                stats.significance_level
            ));
        }

        if !(stats.confidence_level > 0.0 && stats.confidence_level < 1.0) {
            return Err(format!(
                "confidence_level must be in (0, 1), got {}",
                stats.confidence_level
            ));
        }

        let carbon = &self.carbon;
        if carbon.grid_intensity_g_per_kwh < 0.0 {
            return Err(format!(
                "grid_intensity_g_per_kwh must be non-negative, got {}",
                carbon.grid_intensity_g_per_kwh
            ));
        }

        if carbon.network_kwh_per_gb < 0.0 {
            return Err(format!(
                "network_kwh_per_gb must be non-negative, got {}",
                carbon.network_kwh_per_gb
            ));
        }

        if let Some(embodied) = &carbon.embodied {
            if embodied.expected_lifespan_years <= 0.0 {
                return Err(format!(
                    "expected_lifespan_years must be positive, got {}",
                    embodied.expected_lifespan_years
                ));
            }
            if !(0.0..=1.0).contains(&embodied.resource_share) {
                return Err(format!(
                    "resource_share must be in [0, 1], got {}",
                    embodied.resource_share
                ));
            }
        }

        if let Some(count) = carbon.functional_unit_count {
            if !(count.is_finite() && count >= 0.0) {
                return Err(format!(
                    "functional_unit_count must be a non-negative number, got {}",
                    count
                ));
            }
        }

        if let Some(name) = &carbon.functional_unit_name {
            if name.trim().is_empty() {
                return Err("functional_unit_name must not be blank".to_string());
            }
        }

        Ok(())
    }
}
