//! Engine configuration.
//!
//! Coefficient tables, analysis horizon, session defaults and logging are
//! read from a TOML file. Every section falls back to built-in defaults, so
//! a file only needs the values it overrides.
//!
//! Lookup order: explicit path, then `TCO2_CONFIG`, then defaults.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use tracing::info;

use crate::catalog::{CpuId, RegionId};
use crate::error::{EngineError, Result};
use crate::model::{ScalingPolicy, Workload};
use crate::telemetry::LogConfig;

pub const CONFIG_ENV_VAR: &str = "TCO2_CONFIG";

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    pub power: PowerCoefficients,
    pub embodied: EmbodiedCoefficients,
    pub analysis: AnalysisConfig,
    pub session: SessionDefaults,
    pub logging: LogConfig,
}

/// Linear power draw per GB of capacity, in watts.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PowerCoefficients {
    pub ram_w_per_gb: f64,
    pub ssd_w_per_gb: f64,
    pub hdd_w_per_gb: f64,
}

impl Default for PowerCoefficients {
    fn default() -> Self {
        Self {
            ram_w_per_gb: 0.375,   // ~3 W per 8 GB DDR4 RDIMM
            ssd_w_per_gb: 0.0025,  // ~5 W per 2 TB NVMe drive
            hdd_w_per_gb: 0.0017,  // ~7 W per 4 TB nearline drive
        }
    }
}

/// Embodied carbon per unit, in kgCO2.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EmbodiedCoefficients {
    /// Fixed package contribution per CPU.
    pub cpu_base_kg: f64,
    /// Per mm2 of die area.
    pub cpu_kg_per_mm2: f64,
    pub cpu_kg_per_core: f64,
    pub ram_kg_per_gb: f64,
    pub ssd_kg_per_gb: f64,
    pub hdd_kg_per_gb: f64,
}

impl Default for EmbodiedCoefficients {
    fn default() -> Self {
        Self {
            cpu_base_kg: 1.5,
            cpu_kg_per_mm2: 0.02,
            cpu_kg_per_core: 0.1,
            ram_kg_per_gb: 0.45,
            ssd_kg_per_gb: 0.11,
            hdd_kg_per_gb: 0.005,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AnalysisConfig {
    /// Hours of operation per year (constant utilization is assumed).
    pub hours_per_year: f64,
    /// Length of the sampled carbon timeline.
    pub horizon_years: f64,
    pub timeline_step_years: f64,
}

impl Default for AnalysisConfig {
    fn default() -> Self {
        Self {
            hours_per_year: 8760.0,
            horizon_years: 20.0,
            timeline_step_years: 1.0,
        }
    }
}

/// Selections a fresh session starts with.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SessionDefaults {
    pub current_cpu: CpuId,
    pub new_cpu: CpuId,
    pub ram_gb: f64,
    pub ssd_gb: f64,
    pub hdd_gb: f64,
    pub utilization: f64,
    pub region: RegionId,
    pub workload: Workload,
    pub scaling: ScalingPolicy,
    pub single_comparison: bool,
}

impl Default for SessionDefaults {
    fn default() -> Self {
        Self {
            current_cpu: CpuId::from("Intel Xeon E7-4880 v2"),
            new_cpu: CpuId::from("Intel Xeon Platinum 8480CL"),
            ram_gb: 128.0,
            ssd_gb: 512.0,
            hdd_gb: 0.0,
            utilization: 40.0,
            region: RegionId::from("Germany"),
            workload: Workload::SpecRate,
            scaling: ScalingPolicy::None,
            single_comparison: false,
        }
    }
}

impl EngineConfig {
    pub fn from_toml_str(content: &str) -> Result<Self> {
        let config: EngineConfig = toml::from_str(content)
            .map_err(|e| EngineError::config(format!("invalid TOML: {e}")))?;
        config.validate()?;
        Ok(config)
    }

    /// Load from `path`, or from the file named by `TCO2_CONFIG`, or fall
    /// back to the defaults when neither is given.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let path: Option<PathBuf> = match path {
            Some(p) => Some(p.to_path_buf()),
            None => std::env::var_os(CONFIG_ENV_VAR).map(PathBuf::from),
        };

        match path {
            Some(path) => {
                let content = std::fs::read_to_string(&path)
                    .map_err(|e| EngineError::config(format!("{}: {e}", path.display())))?;
                let config = Self::from_toml_str(&content)?;
                info!(path = %path.display(), "configuration loaded");
                Ok(config)
            }
            None => {
                let config = Self::default();
                config.validate()?;
                Ok(config)
            }
        }
    }

    pub fn validate(&self) -> Result<()> {
        let p = &self.power;
        check_coefficient("power.ram_w_per_gb", p.ram_w_per_gb)?;
        check_coefficient("power.ssd_w_per_gb", p.ssd_w_per_gb)?;
        check_coefficient("power.hdd_w_per_gb", p.hdd_w_per_gb)?;

        let e = &self.embodied;
        check_coefficient("embodied.cpu_base_kg", e.cpu_base_kg)?;
        check_coefficient("embodied.cpu_kg_per_mm2", e.cpu_kg_per_mm2)?;
        check_coefficient("embodied.cpu_kg_per_core", e.cpu_kg_per_core)?;
        check_coefficient("embodied.ram_kg_per_gb", e.ram_kg_per_gb)?;
        check_coefficient("embodied.ssd_kg_per_gb", e.ssd_kg_per_gb)?;
        check_coefficient("embodied.hdd_kg_per_gb", e.hdd_kg_per_gb)?;

        let a = &self.analysis;
        check_positive("analysis.hours_per_year", a.hours_per_year)?;
        check_positive("analysis.horizon_years", a.horizon_years)?;
        check_positive("analysis.timeline_step_years", a.timeline_step_years)?;

        let s = &self.session;
        if !(s.utilization.is_finite() && (0.0..=100.0).contains(&s.utilization)) {
            return Err(EngineError::config(
                "session.utilization must be within [0, 100]",
            ));
        }
        check_coefficient("session.ram_gb", s.ram_gb)?;
        check_coefficient("session.ssd_gb", s.ssd_gb)?;
        check_coefficient("session.hdd_gb", s.hdd_gb)?;

        Ok(())
    }
}

fn check_coefficient(name: &str, value: f64) -> Result<()> {
    if value.is_finite() && value >= 0.0 {
        Ok(())
    } else {
        Err(EngineError::config(format!(
            "{name} must be non-negative and finite, got {value}"
        )))
    }
}

fn check_positive(name: &str, value: f64) -> Result<()> {
    if value.is_finite() && value > 0.0 {
        Ok(())
    } else {
        Err(EngineError::config(format!(
            "{name} must be positive and finite, got {value}"
        )))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_is_valid() {
        let config = EngineConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.analysis.hours_per_year, 8760.0);
        assert_eq!(config.session.workload, Workload::SpecRate);
    }

    #[test]
    fn partial_toml_keeps_defaults() {
        let config = EngineConfig::from_toml_str(
            r#"
            [embodied]
            ram_kg_per_gb = 0.9

            [session]
            region = "France"
            scaling = "emissions"
            "#,
        )
        .unwrap();

        assert_eq!(config.embodied.ram_kg_per_gb, 0.9);
        assert_eq!(config.embodied.ssd_kg_per_gb, EmbodiedCoefficients::default().ssd_kg_per_gb);
        assert_eq!(config.session.region.as_str(), "France");
        assert_eq!(config.session.scaling, ScalingPolicy::Resources);
        assert_eq!(config.power, PowerCoefficients::default());
    }

    #[test]
    fn rejects_negative_coefficients() {
        let err = EngineConfig::from_toml_str("[power]\nram_w_per_gb = -1.0\n").unwrap_err();
        assert!(matches!(err, EngineError::Config { .. }));
        assert!(err.to_string().contains("power.ram_w_per_gb"));
    }

    #[test]
    fn rejects_zero_horizon_and_bad_utilization() {
        assert!(EngineConfig::from_toml_str("[analysis]\nhorizon_years = 0.0\n").is_err());
        assert!(EngineConfig::from_toml_str("[session]\nutilization = 140.0\n").is_err());
    }

    #[test]
    fn rejects_malformed_toml() {
        let err = EngineConfig::from_toml_str("[power\n").unwrap_err();
        assert!(err.to_string().contains("invalid TOML"));
    }

    #[test]
    fn loads_from_explicit_path() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("tco2.toml");
        std::fs::write(&path, "[analysis]\nhorizon_years = 8.0\n").unwrap();

        let config = EngineConfig::load(Some(&path)).unwrap();
        assert_eq!(config.analysis.horizon_years, 8.0);
    }

    #[test]
    fn missing_file_is_config_error() {
        let dir = tempfile::tempdir().unwrap();
        let err = EngineConfig::load(Some(&dir.path().join("absent.toml"))).unwrap_err();
        assert!(matches!(err, EngineError::Config { .. }));
    }

    #[test]
    fn round_trips_through_toml() {
        let config = EngineConfig::default();
        let text = toml::to_string_pretty(&config).unwrap();
        assert_eq!(EngineConfig::from_toml_str(&text).unwrap(), config);
    }
}
