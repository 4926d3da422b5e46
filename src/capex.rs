//! Embodied ("capex") carbon of a server configuration.
//!
//! Each component contributes a per-unit carbon intensity times its
//! quantity. The CPU is charged by package, die area and core count; RAM,
//! SSD and HDD by capacity. All values are kgCO2.

use crate::config::EmbodiedCoefficients;
use crate::error::Result;
use crate::model::{CapexBreakdown, Component, ComponentBreakdown, ResolvedServer};

#[derive(Debug, Clone, PartialEq)]
pub struct CapexCalculator {
    coefficients: EmbodiedCoefficients,
}

impl CapexCalculator {
    pub fn new(coefficients: EmbodiedCoefficients) -> Self {
        Self { coefficients }
    }

    /// Embodied carbon of the CPU package in kgCO2.
    #[inline]
    pub fn cpu_kg(&self, die_size_mm2: f64, core_count: u32) -> f64 {
        let c = &self.coefficients;
        c.cpu_base_kg + die_size_mm2 * c.cpu_kg_per_mm2 + core_count as f64 * c.cpu_kg_per_core
    }

    #[inline]
    pub fn resource_kg(&self, component: Component, capacity_gb: f64) -> f64 {
        let kg_per_gb = match component {
            Component::Cpu => 0.0,
            Component::Ram => self.coefficients.ram_kg_per_gb,
            Component::Ssd => self.coefficients.ssd_kg_per_gb,
            Component::Hdd => self.coefficients.hdd_kg_per_gb,
        };
        capacity_gb * kg_per_gb
    }

    pub fn breakdown(&self, server: &ResolvedServer<'_>) -> Result<CapexBreakdown> {
        let config = server.config;
        config.validate(server.side)?;

        Ok(ComponentBreakdown::from_fn(|component| match component {
            Component::Cpu => self.cpu_kg(server.spec.die_size_mm2, server.spec.core_count),
            resource => self.resource_kg(resource, config.capacity(resource)),
        }))
    }

    pub fn total_kg(&self, server: &ResolvedServer<'_>) -> Result<f64> {
        Ok(self.breakdown(server)?.total())
    }
}

impl Default for CapexCalculator {
    fn default() -> Self {
        Self::new(EmbodiedCoefficients::default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::CpuSpec;
    use crate::model::{ServerConfiguration, Side};

    fn calculator() -> CapexCalculator {
        CapexCalculator::new(EmbodiedCoefficients {
            cpu_base_kg: 2.0,
            cpu_kg_per_mm2: 0.01,
            cpu_kg_per_core: 0.5,
            ram_kg_per_gb: 1.0,
            ssd_kg_per_gb: 0.1,
            hdd_kg_per_gb: 0.01,
        })
    }

    #[test]
    fn breakdown_uses_per_unit_intensities() {
        let cpu = CpuSpec::fixture("Test CPU", 150.0, 100.0);
        let config = ServerConfiguration::new("Test CPU", 64.0, 1000.0, 2000.0, 30.0);
        let server = ResolvedServer::new(Side::Current, &config, &cpu);

        let b = calculator().breakdown(&server).unwrap();
        // 2 + 400 mm2 * 0.01 + 16 cores * 0.5
        assert!((b.cpu - 14.0).abs() < 1e-12);
        assert!((b.ram - 64.0).abs() < 1e-12);
        assert!((b.ssd - 100.0).abs() < 1e-12);
        assert!((b.hdd - 20.0).abs() < 1e-12);
        assert!((b.total() - 198.0).abs() < 1e-9);
    }

    #[test]
    fn independent_of_utilization() {
        let cpu = CpuSpec::fixture("Test CPU", 150.0, 100.0);
        let idle = ServerConfiguration::new("Test CPU", 64.0, 512.0, 0.0, 0.0);
        let busy = ServerConfiguration { utilization: 100.0, ..idle.clone() };

        let a = calculator().breakdown(&ResolvedServer::new(Side::New, &idle, &cpu)).unwrap();
        let b = calculator().breakdown(&ResolvedServer::new(Side::New, &busy, &cpu)).unwrap();
        assert_eq!(a, b);
    }

    #[test]
    fn more_capacity_never_reduces_capex() {
        let cpu = CpuSpec::fixture("Test CPU", 150.0, 100.0);
        let mut prev = 0.0;
        for ram in [0.0, 64.0, 128.0, 512.0, 2048.0] {
            let config = ServerConfiguration::new("Test CPU", ram, 512.0, 0.0, 50.0);
            let total = calculator()
                .total_kg(&ResolvedServer::new(Side::Current, &config, &cpu))
                .unwrap();
            assert!(total >= prev, "ram={ram}: {total} < {prev}");
            prev = total;
        }
    }
}
