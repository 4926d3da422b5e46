//! Operational ("opex") carbon from power draw and grid intensity.
//!
//! Operational carbon is linear in time:
//!
//! ```text
//! opex(t) = P[kW] * I[gCO2/kWh] * t[h] / 1000   [kgCO2]
//! ```
//!
//! The per-component breakdown splits the total by each component's share
//! of the modeled power draw.

use crate::model::{Component, OpexBreakdown};
use crate::power::PowerBreakdown;

const GRAMS_PER_KG: f64 = 1000.0;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct OpexCalculator {
    hours_per_year: f64,
}

impl OpexCalculator {
    pub fn new(hours_per_year: f64) -> Self {
        Self { hours_per_year }
    }

    /// Cumulative operational carbon in kgCO2 after `hours` of operation.
    #[inline]
    pub fn operational_kg(power_kw: f64, intensity_g_per_kwh: f64, hours: f64) -> f64 {
        power_kw * intensity_g_per_kwh * hours / GRAMS_PER_KG
    }

    /// Accumulation rate in kgCO2 per year of constant operation.
    #[inline]
    pub fn rate_kg_per_year(&self, power_kw: f64, intensity_g_per_kwh: f64) -> f64 {
        Self::operational_kg(power_kw, intensity_g_per_kwh, self.hours_per_year)
    }

    /// Operational carbon after `hours`, distributed over the components in
    /// proportion to their power draw. An idle breakdown yields all zeros.
    pub fn breakdown(power: &PowerBreakdown, intensity_g_per_kwh: f64, hours: f64) -> OpexBreakdown {
        let total = Self::operational_kg(power.total(), intensity_g_per_kwh, hours);
        OpexBreakdown::from_fn(|component: Component| total * power.share(component))
    }

    /// Per-component accumulation rate in kgCO2 per year.
    pub fn rate_breakdown(&self, power: &PowerBreakdown, intensity_g_per_kwh: f64) -> OpexBreakdown {
        Self::breakdown(power, intensity_g_per_kwh, self.hours_per_year)
    }
}

impl Default for OpexCalculator {
    fn default() -> Self {
        Self::new(8760.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn power() -> PowerBreakdown {
        PowerBreakdown {
            cpu: 0.2,
            ram: 0.1,
            ssd: 0.05,
            hdd: 0.05,
        }
    }

    #[test]
    fn linear_in_time() {
        let one = OpexCalculator::operational_kg(0.4, 400.0, 1000.0);
        let two = OpexCalculator::operational_kg(0.4, 400.0, 2000.0);
        assert!((one - 160.0).abs() < 1e-9);
        assert!((two - 2.0 * one).abs() < 1e-9);
        assert_eq!(OpexCalculator::operational_kg(0.4, 400.0, 0.0), 0.0);
    }

    #[test]
    fn yearly_rate_uses_configured_hours() {
        let opex = OpexCalculator::new(8760.0);
        // 1 kW at 1000 g/kWh for a year is 8760 kg
        assert!((opex.rate_kg_per_year(1.0, 1000.0) - 8760.0).abs() < 1e-9);
        let half = OpexCalculator::new(4380.0);
        assert!((half.rate_kg_per_year(1.0, 1000.0) - 4380.0).abs() < 1e-9);
    }

    #[test]
    fn breakdown_follows_power_share() {
        let b = OpexCalculator::breakdown(&power(), 500.0, 100.0);
        let total = OpexCalculator::operational_kg(0.4, 500.0, 100.0);
        assert!((b.total() - total).abs() < 1e-9);
        assert!((b.cpu - total * 0.5).abs() < 1e-9);
        assert!((b.ram - total * 0.25).abs() < 1e-9);
        assert!((b.ssd - b.hdd).abs() < 1e-12);
    }

    #[test]
    fn zero_power_gives_zero_breakdown() {
        let b = OpexCalculator::breakdown(&PowerBreakdown::default(), 500.0, 8760.0);
        assert_eq!(b, OpexBreakdown::default());
        assert!(b.is_finite());
    }

    #[test]
    fn zero_intensity_gives_zero_rate() {
        let opex = OpexCalculator::default();
        assert_eq!(opex.rate_breakdown(&power(), 0.0).total(), 0.0);
    }
}
