//! Instantaneous power draw of a server configuration.
//!
//! The CPU draws its TDP scaled by utilization; memory and storage draw a
//! fixed amount per GB of capacity regardless of load:
//!
//! ```text
//! P = TDP * u/100 + ram_gb * w_ram + ssd_gb * w_ssd + hdd_gb * w_hdd   [W]
//! ```
//!
//! Results are reported in kW per component so the operational carbon can
//! later be split by each component's share of the draw.

use crate::config::PowerCoefficients;
use crate::error::Result;
use crate::model::{Component, ComponentBreakdown, ResolvedServer};

const WATTS_PER_KW: f64 = 1000.0;

/// Power draw per component, kW.
pub type PowerBreakdown = ComponentBreakdown;

#[derive(Debug, Clone, PartialEq)]
pub struct PowerModel {
    coefficients: PowerCoefficients,
}

impl PowerModel {
    pub fn new(coefficients: PowerCoefficients) -> Self {
        Self { coefficients }
    }

    /// Draw of the CPU alone in kW.
    #[inline]
    pub fn cpu_kw(tdp_w: f64, utilization: f64) -> f64 {
        tdp_w * (utilization / 100.0) / WATTS_PER_KW
    }

    /// Draw of one resource component in kW.
    #[inline]
    pub fn resource_kw(&self, component: Component, capacity_gb: f64) -> f64 {
        let w_per_gb = match component {
            Component::Cpu => 0.0,
            Component::Ram => self.coefficients.ram_w_per_gb,
            Component::Ssd => self.coefficients.ssd_w_per_gb,
            Component::Hdd => self.coefficients.hdd_w_per_gb,
        };
        capacity_gb * w_per_gb / WATTS_PER_KW
    }

    /// Per-component draw in kW. Out-of-range utilization and negative
    /// capacities are rejected, not clamped.
    pub fn breakdown(&self, server: &ResolvedServer<'_>) -> Result<PowerBreakdown> {
        let config = server.config;
        config.validate(server.side)?;

        Ok(ComponentBreakdown::from_fn(|component| match component {
            Component::Cpu => Self::cpu_kw(server.spec.tdp_w, config.utilization),
            resource => self.resource_kw(resource, config.capacity(resource)),
        }))
    }

    /// Total draw in kW.
    pub fn draw_kw(&self, server: &ResolvedServer<'_>) -> Result<f64> {
        Ok(self.breakdown(server)?.total())
    }
}

impl Default for PowerModel {
    fn default() -> Self {
        Self::new(PowerCoefficients::default())
    }
}
