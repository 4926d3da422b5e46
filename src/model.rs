//! Core data model shared by every engine component.
//!
//! A comparison always has two sides, the hardware in service today and the
//! candidate replacement. Each side is a [`ServerConfiguration`]; the shared
//! selections (workload, scaling policy) are small closed enumerations so
//! every branch on them is an exhaustive match.
//!
//! Units used throughout the crate:
//! - capacities in GB, utilization in percent `[0, 100]`
//! - power in kW, grid intensity in gCO2/kWh
//! - carbon in kgCO2, time in years unless a name says otherwise

use std::fmt;

use serde::ser::SerializeStruct;
use serde::{Deserialize, Serialize, Serializer};

use crate::catalog::{CpuId, CpuSpec};
use crate::error::{EngineError, Result};

/// Which configuration of the comparison a value belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Side {
    Current,
    New,
}

impl Side {
    pub const BOTH: [Side; 2] = [Side::Current, Side::New];

    pub fn other(self) -> Self {
        match self {
            Self::Current => Self::New,
            Self::New => Self::Current,
        }
    }

    /// Label used in reports.
    pub fn label(self) -> &'static str {
        match self {
            Self::Current => "Current Hardware",
            Self::New => "New Hardware",
        }
    }
}

impl fmt::Display for Side {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Current => "current",
            Self::New => "new",
        })
    }
}

/// Server components that carry embodied and operational carbon.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Component {
    Cpu,
    Ram,
    Ssd,
    Hdd,
}

impl Component {
    pub const ALL: [Component; 4] = [Component::Cpu, Component::Ram, Component::Ssd, Component::Hdd];

    /// Components whose quantity is a storage or memory capacity.
    pub const RESOURCES: [Component; 3] = [Component::Ram, Component::Ssd, Component::Hdd];
}

impl fmt::Display for Component {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Cpu => "CPU",
            Self::Ram => "RAM",
            Self::Ssd => "SSD",
            Self::Hdd => "HDD",
        })
    }
}

// ============================================================================
// Workload and Scaling Selections
// ============================================================================

/// Benchmark workload used as the performance indicator of a CPU.
///
/// Each workload maps to exactly one performance counter of [`CpuSpec`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Workload {
    /// Multi-threaded throughput (SPECrate).
    #[serde(rename = "specrate")]
    SpecRate,
    /// Single-thread speed (SPECspeed).
    #[serde(rename = "specspeed")]
    SpecSpeed,
    /// Sort throughput (sorted tuples per second).
    #[serde(rename = "sorting")]
    Sorting,
    /// Analytical query throughput (TPC-H runs per hour).
    #[serde(rename = "tpch")]
    TpcH,
}

impl Workload {
    /// Enumeration order; the first member is the fallback selection.
    pub const ALL: [Workload; 4] = [
        Workload::SpecRate,
        Workload::SpecSpeed,
        Workload::Sorting,
        Workload::TpcH,
    ];

    pub fn first() -> Self {
        Self::ALL[0]
    }

    /// Parse from string, case-insensitive.
    pub fn from_str(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "specrate" | "spec-rate" | "rate" => Some(Self::SpecRate),
            "specspeed" | "spec-speed" | "speed" => Some(Self::SpecSpeed),
            "sorting" | "sort" => Some(Self::Sorting),
            "tpch" | "tpc-h" => Some(Self::TpcH),
            _ => None,
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            Self::SpecRate => "SPECrate",
            Self::SpecSpeed => "SPECspeed",
            Self::Sorting => "Sorting",
            Self::TpcH => "TPC-H",
        }
    }

    pub fn description(&self) -> &'static str {
        match self {
            Self::SpecRate => "Multi-threaded performance, as in database and web servers",
            Self::SpecSpeed => "Single-threaded performance for general purpose tasks",
            Self::Sorting => "Time to sort a vector of four billion random 32-bit integers",
            Self::TpcH => "TPC-H at scale factor 10 with 25 read-only query streams",
        }
    }

    /// Performance counter this workload reads from a CPU, `None` when the
    /// benchmark is unsupported on that part.
    #[inline]
    pub fn indicator(&self, spec: &CpuSpec) -> Option<f64> {
        match self {
            Self::SpecRate => spec.specrate,
            Self::SpecSpeed => spec.specspeed,
            Self::Sorting => spec.sorted_tuples_per_s,
            Self::TpcH => spec.tpch_runs_per_h,
        }
    }
}

impl fmt::Display for Workload {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Policy that keeps the two sides of a comparison comparable when one side
/// is edited.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ScalingPolicy {
    /// Both sides are edited independently.
    #[default]
    None,
    /// Workload amount is held constant; utilization of the other side is
    /// rescaled by the performance ratio.
    Utilization,
    /// Utilization is held constant; resource quantities of the other side
    /// are rescaled by the inverse performance ratio.
    #[serde(alias = "emissions", alias = "scale")]
    Resources,
    /// Non-CPU fields are copied verbatim to the other side.
    Mirror,
}

impl ScalingPolicy {
    pub const ALL: [ScalingPolicy; 4] = [
        ScalingPolicy::None,
        ScalingPolicy::Utilization,
        ScalingPolicy::Resources,
        ScalingPolicy::Mirror,
    ];

    /// Parse from string, case-insensitive.
    pub fn from_str(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "none" => Some(Self::None),
            "utilization" | "util" => Some(Self::Utilization),
            "resources" | "emissions" | "scale" => Some(Self::Resources),
            "mirror" => Some(Self::Mirror),
            _ => None,
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            Self::None => "None",
            Self::Utilization => "Utilization",
            Self::Resources => "Emissions",
            Self::Mirror => "Mirror",
        }
    }

    pub fn description(&self) -> &'static str {
        match self {
            Self::None => "Utilization and workload stay the same across both configurations",
            Self::Utilization => {
                "Workload stays the same; utilization of the stronger hardware is scaled down"
            }
            Self::Resources => {
                "Utilization stays the same; resources of the stronger hardware are scaled down"
            }
            Self::Mirror => "RAM, SSD, HDD and utilization are copied to the other configuration",
        }
    }
}

impl fmt::Display for ScalingPolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

// ============================================================================
// Server Configuration
// ============================================================================

/// Hardware configuration of one side of the comparison.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ServerConfiguration {
    /// CPU identifier, resolved against the catalog.
    pub cpu: CpuId,
    /// RAM capacity in GB.
    pub ram_gb: f64,
    /// SSD capacity in GB.
    pub ssd_gb: f64,
    /// HDD capacity in GB.
    pub hdd_gb: f64,
    /// CPU utilization in percent, [0, 100].
    pub utilization: f64,
}

impl ServerConfiguration {
    pub fn new(cpu: impl Into<CpuId>, ram_gb: f64, ssd_gb: f64, hdd_gb: f64, utilization: f64) -> Self {
        Self {
            cpu: cpu.into(),
            ram_gb,
            ssd_gb,
            hdd_gb,
            utilization,
        }
    }

    /// Capacity in GB of a resource component. The CPU has no capacity.
    pub fn capacity(&self, component: Component) -> f64 {
        match component {
            Component::Cpu => 0.0,
            Component::Ram => self.ram_gb,
            Component::Ssd => self.ssd_gb,
            Component::Hdd => self.hdd_gb,
        }
    }

    pub fn set_capacity(&mut self, component: Component, gb: f64) {
        match component {
            Component::Cpu => {}
            Component::Ram => self.ram_gb = gb,
            Component::Ssd => self.ssd_gb = gb,
            Component::Hdd => self.hdd_gb = gb,
        }
    }

    /// Reject utilization outside `[0, 100]` and negative or non-finite
    /// capacities. Nothing is clamped here.
    pub fn validate(&self, side: Side) -> Result<()> {
        validate_utilization(side, self.utilization)?;
        for component in Component::RESOURCES {
            validate_capacity(side, component, self.capacity(component))?;
        }
        Ok(())
    }
}

/// A configuration with its CPU resolved against the catalog.
#[derive(Debug, Clone, Copy)]
pub struct ResolvedServer<'a> {
    pub side: Side,
    pub config: &'a ServerConfiguration,
    pub spec: &'a CpuSpec,
}

impl<'a> ResolvedServer<'a> {
    pub fn new(side: Side, config: &'a ServerConfiguration, spec: &'a CpuSpec) -> Self {
        Self { side, config, spec }
    }

    /// Performance indicator for `workload`, `None` when unsupported.
    #[inline]
    pub fn indicator(&self, workload: Workload) -> Option<f64> {
        workload.indicator(self.spec)
    }
}

pub(crate) fn validate_utilization(side: Side, value: f64) -> Result<()> {
    if !value.is_finite() {
        return Err(EngineError::NonFiniteInput {
            field: format!("{side} utilization"),
        });
    }
    if !(0.0..=100.0).contains(&value) {
        return Err(EngineError::UtilizationOutOfRange { side, value });
    }
    Ok(())
}

pub(crate) fn validate_capacity(side: Side, component: Component, value: f64) -> Result<()> {
    if !value.is_finite() {
        return Err(EngineError::NonFiniteInput {
            field: format!("{side} {component} capacity"),
        });
    }
    if value < 0.0 {
        return Err(EngineError::NegativeCapacity {
            side,
            component,
            value,
        });
    }
    Ok(())
}

// ============================================================================
// Component Breakdowns
// ============================================================================

/// Per-component values (embodied carbon, operational carbon or power).
///
/// The total is always derived from the four components and never stored.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct ComponentBreakdown {
    pub cpu: f64,
    pub ram: f64,
    pub ssd: f64,
    pub hdd: f64,
}

/// Embodied carbon per component, kgCO2.
pub type CapexBreakdown = ComponentBreakdown;

/// Operational carbon per component, kgCO2 (rate or accumulated value).
pub type OpexBreakdown = ComponentBreakdown;

impl ComponentBreakdown {
    pub fn from_fn(mut f: impl FnMut(Component) -> f64) -> Self {
        Self {
            cpu: f(Component::Cpu),
            ram: f(Component::Ram),
            ssd: f(Component::Ssd),
            hdd: f(Component::Hdd),
        }
    }

    #[inline]
    pub fn total(&self) -> f64 {
        self.cpu + self.ram + self.ssd + self.hdd
    }

    pub fn get(&self, component: Component) -> f64 {
        match component {
            Component::Cpu => self.cpu,
            Component::Ram => self.ram,
            Component::Ssd => self.ssd,
            Component::Hdd => self.hdd,
        }
    }

    /// Fraction of the total held by `component`, 0 for an empty breakdown.
    pub fn share(&self, component: Component) -> f64 {
        let total = self.total();
        if total > 0.0 {
            self.get(component) / total
        } else {
            0.0
        }
    }

    pub fn is_finite(&self) -> bool {
        Component::ALL.iter().all(|&c| self.get(c).is_finite())
    }

    pub fn iter(&self) -> impl Iterator<Item = (Component, f64)> + '_ {
        Component::ALL.into_iter().map(move |c| (c, self.get(c)))
    }
}

impl Serialize for ComponentBreakdown {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        let mut state = serializer.serialize_struct("ComponentBreakdown", 5)?;
        state.serialize_field("cpu", &self.cpu)?;
        state.serialize_field("ram", &self.ram)?;
        state.serialize_field("ssd", &self.ssd)?;
        state.serialize_field("hdd", &self.hdd)?;
        state.serialize_field("total", &self.total())?;
        state.end()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn side_other_is_involution() {
        for side in Side::BOTH {
            assert_ne!(side.other(), side);
            assert_eq!(side.other().other(), side);
        }
    }

    #[test]
    fn workload_parsing() {
        assert_eq!(Workload::from_str("TPC-H"), Some(Workload::TpcH));
        assert_eq!(Workload::from_str("SPECrate"), Some(Workload::SpecRate));
        assert_eq!(Workload::from_str("sort"), Some(Workload::Sorting));
        assert_eq!(Workload::from_str("linpack"), None);
        assert_eq!(Workload::first(), Workload::SpecRate);
    }

    #[test]
    fn scaling_policy_aliases() {
        assert_eq!(ScalingPolicy::from_str("Emissions"), Some(ScalingPolicy::Resources));
        assert_eq!(ScalingPolicy::from_str("scale"), Some(ScalingPolicy::Resources));
        assert_eq!(ScalingPolicy::from_str("MIRROR"), Some(ScalingPolicy::Mirror));
        assert_eq!(ScalingPolicy::default(), ScalingPolicy::None);
    }

    #[test]
    fn selections_are_listable() {
        for workload in Workload::ALL {
            assert_eq!(Workload::from_str(workload.name()), Some(workload));
            assert!(!workload.description().is_empty());
        }
        for policy in ScalingPolicy::ALL {
            assert_eq!(ScalingPolicy::from_str(policy.name()), Some(policy));
            assert!(!policy.description().is_empty());
        }
    }

    #[test]
    fn validate_rejects_out_of_range_utilization() {
        let config = ServerConfiguration::new("cpu", 128.0, 512.0, 0.0, 100.5);
        assert_eq!(
            config.validate(Side::New),
            Err(EngineError::UtilizationOutOfRange {
                side: Side::New,
                value: 100.5
            })
        );

        let config = ServerConfiguration::new("cpu", 128.0, 512.0, 0.0, -0.1);
        assert!(config.validate(Side::Current).is_err());

        let config = ServerConfiguration::new("cpu", 128.0, 512.0, 0.0, 0.0);
        assert!(config.validate(Side::Current).is_ok());
        let config = ServerConfiguration::new("cpu", 128.0, 512.0, 0.0, 100.0);
        assert!(config.validate(Side::Current).is_ok());
    }

    #[test]
    fn validate_rejects_negative_and_nan_capacity() {
        let config = ServerConfiguration::new("cpu", 128.0, -1.0, 0.0, 50.0);
        assert!(matches!(
            config.validate(Side::Current),
            Err(EngineError::NegativeCapacity {
                component: Component::Ssd,
                ..
            })
        ));

        let config = ServerConfiguration::new("cpu", f64::NAN, 0.0, 0.0, 50.0);
        assert!(matches!(
            config.validate(Side::Current),
            Err(EngineError::NonFiniteInput { .. })
        ));
    }

    #[test]
    fn breakdown_total_is_sum_of_components() {
        let b = ComponentBreakdown {
            cpu: 1.5,
            ram: 2.25,
            ssd: 0.125,
            hdd: 4.0,
        };
        assert_eq!(b.total(), 1.5 + 2.25 + 0.125 + 4.0);
        assert!((b.share(Component::Hdd) - 4.0 / b.total()).abs() < 1e-12);
        assert_eq!(ComponentBreakdown::default().share(Component::Cpu), 0.0);
    }

    #[test]
    fn breakdown_serializes_total() {
        let b = ComponentBreakdown {
            cpu: 1.0,
            ram: 2.0,
            ssd: 3.0,
            hdd: 4.0,
        };
        let json = serde_json::to_value(b).unwrap();
        assert_eq!(json["total"], 10.0);
        assert_eq!(json["ssd"], 3.0);
    }
}
