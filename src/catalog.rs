//! Static hardware and grid datasets.
//!
//! The CPU catalog, the grid intensity table and the server presets are
//! loaded once at startup from JSON and never mutated afterwards. Every
//! record is validated at load time so lookups during a session can only
//! fail on unknown identifiers, never on malformed data.

use std::borrow::Borrow;
use std::collections::BTreeMap;
use std::fmt;
use std::path::Path;

use serde::{Deserialize, Serialize};
use tracing::info;

use crate::error::{EngineError, Result};

const BUILTIN_CPUS: &str = include_str!("../data/cpus.json");
const BUILTIN_GRID_INTENSITIES: &str = include_str!("../data/grid_intensities.json");
const BUILTIN_PRESETS: &str = include_str!("../data/presets.json");

pub const CPUS_FILE: &str = "cpus.json";
pub const GRID_INTENSITIES_FILE: &str = "grid_intensities.json";
pub const PRESETS_FILE: &str = "presets.json";

macro_rules! identifier {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
        #[serde(transparent)]
        pub struct $name(String);

        impl $name {
            pub fn as_str(&self) -> &str {
                &self.0
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(&self.0)
            }
        }

        impl From<&str> for $name {
            fn from(s: &str) -> Self {
                Self(s.to_string())
            }
        }

        impl From<String> for $name {
            fn from(s: String) -> Self {
                Self(s)
            }
        }

        impl Borrow<str> for $name {
            fn borrow(&self) -> &str {
                &self.0
            }
        }
    };
}

identifier!(
    /// CPU model name, e.g. `Intel Xeon Platinum 8180`.
    CpuId
);
identifier!(
    /// Country or grid region name, e.g. `Germany`.
    RegionId
);
identifier!(
    /// Server preset key.
    PresetId
);

/// CPU manufacturers present in the catalog.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Manufacturer {
    Intel,
    #[serde(rename = "AMD")]
    Amd,
}

impl fmt::Display for Manufacturer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Intel => "Intel",
            Self::Amd => "AMD",
        })
    }
}

/// Specification of a single CPU model.
///
/// Performance counters are `None` when the benchmark was not run on the
/// part; workloads reading that counter are unavailable for it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CpuSpec {
    #[serde(skip_deserializing)]
    pub id: CpuId,
    pub make: Manufacturer,
    pub launch_year: u16,
    pub core_count: u32,
    pub thread_count: u32,
    /// Thermal design power in watts.
    pub tdp_w: f64,
    /// SPECrate (integer) score.
    pub specrate: Option<f64>,
    /// SPECspeed (integer) score.
    pub specspeed: Option<f64>,
    pub sorted_tuples_per_s: Option<f64>,
    pub tpch_runs_per_h: Option<f64>,
    /// Efficiency counters, reported alongside the spec sheet only.
    #[serde(default)]
    pub sorted_tuples_per_joule: Option<f64>,
    #[serde(default)]
    pub tpch_runs_per_kj: Option<f64>,
    #[serde(default)]
    pub specspeed_per_tdp: Option<f64>,
    #[serde(default)]
    pub specrate_per_tdp: Option<f64>,
    /// Total die area in mm2 (all chiplets).
    pub die_size_mm2: f64,
}

impl CpuSpec {
    fn validate(&self) -> Result<()> {
        let fail = |what: &str| EngineError::dataset(format!("CPU '{}': {what}", self.id));

        if self.core_count == 0 || self.thread_count == 0 {
            return Err(fail("core and thread count must be positive"));
        }
        if !(self.tdp_w.is_finite() && self.tdp_w > 0.0) {
            return Err(fail("TDP must be positive and finite"));
        }
        if !(self.die_size_mm2.is_finite() && self.die_size_mm2 > 0.0) {
            return Err(fail("die size must be positive and finite"));
        }
        let counters = [
            ("specrate", self.specrate),
            ("specspeed", self.specspeed),
            ("sorted_tuples_per_s", self.sorted_tuples_per_s),
            ("tpch_runs_per_h", self.tpch_runs_per_h),
            ("sorted_tuples_per_joule", self.sorted_tuples_per_joule),
            ("tpch_runs_per_kj", self.tpch_runs_per_kj),
            ("specspeed_per_tdp", self.specspeed_per_tdp),
            ("specrate_per_tdp", self.specrate_per_tdp),
        ];
        for (name, value) in counters {
            if let Some(v) = value {
                if !(v.is_finite() && v > 0.0) {
                    return Err(fail(&format!("{name} must be positive and finite when present")));
                }
            }
        }
        Ok(())
    }
}

#[cfg(test)]
impl CpuSpec {
    /// Minimal spec for unit tests: SPECrate/SPECspeed present, sorting and
    /// TPC-H absent.
    pub(crate) fn fixture(id: &str, tdp_w: f64, specrate: f64) -> Self {
        Self {
            id: CpuId::from(id),
            make: Manufacturer::Intel,
            launch_year: 2020,
            core_count: 16,
            thread_count: 32,
            tdp_w,
            specrate: Some(specrate),
            specspeed: Some(specrate / 10.0),
            sorted_tuples_per_s: None,
            tpch_runs_per_h: None,
            sorted_tuples_per_joule: None,
            tpch_runs_per_kj: None,
            specspeed_per_tdp: None,
            specrate_per_tdp: Some(specrate / tdp_w),
            die_size_mm2: 400.0,
        }
    }
}

// ============================================================================
// Catalog Tables
// ============================================================================

/// Immutable mapping from CPU identifier to its specification.
#[derive(Debug, Clone, Default)]
pub struct CpuCatalog {
    cpus: BTreeMap<CpuId, CpuSpec>,
}

impl CpuCatalog {
    pub fn from_json_str(json: &str) -> Result<Self> {
        let raw: BTreeMap<CpuId, CpuSpec> = serde_json::from_str(json)
            .map_err(|e| EngineError::dataset(format!("invalid CPU catalog: {e}")))?;
        let mut cpus = BTreeMap::new();
        for (id, mut spec) in raw {
            spec.id = id.clone();
            spec.validate()?;
            cpus.insert(id, spec);
        }
        if cpus.is_empty() {
            return Err(EngineError::dataset("CPU catalog is empty"));
        }
        Ok(Self { cpus })
    }

    pub fn get(&self, id: &str) -> Result<&CpuSpec> {
        self.cpus
            .get(id)
            .ok_or_else(|| EngineError::UnknownCpu { id: id.to_string() })
    }

    pub fn contains(&self, id: &str) -> bool {
        self.cpus.contains_key(id)
    }

    pub fn len(&self) -> usize {
        self.cpus.len()
    }

    pub fn is_empty(&self) -> bool {
        self.cpus.is_empty()
    }

    /// CPUs ordered by launch year, then name.
    pub fn by_launch_year(&self) -> Vec<&CpuSpec> {
        let mut list: Vec<&CpuSpec> = self.cpus.values().collect();
        list.sort_by(|a, b| a.launch_year.cmp(&b.launch_year).then_with(|| a.id.cmp(&b.id)));
        list
    }
}

/// Immutable mapping from region name to grid carbon intensity (gCO2/kWh).
#[derive(Debug, Clone, Default)]
pub struct GridIntensityTable {
    regions: BTreeMap<RegionId, f64>,
}

impl GridIntensityTable {
    pub fn from_json_str(json: &str) -> Result<Self> {
        let regions: BTreeMap<RegionId, f64> = serde_json::from_str(json)
            .map_err(|e| EngineError::dataset(format!("invalid grid intensity table: {e}")))?;
        for (region, intensity) in &regions {
            if !(intensity.is_finite() && *intensity >= 0.0) {
                return Err(EngineError::dataset(format!(
                    "grid intensity for '{region}' must be non-negative and finite"
                )));
            }
        }
        if regions.is_empty() {
            return Err(EngineError::dataset("grid intensity table is empty"));
        }
        Ok(Self { regions })
    }

    /// Intensity in gCO2/kWh.
    pub fn get(&self, region: &str) -> Result<f64> {
        self.regions
            .get(region)
            .copied()
            .ok_or_else(|| EngineError::UnknownRegion {
                name: region.to_string(),
            })
    }

    pub fn contains(&self, region: &str) -> bool {
        self.regions.contains_key(region)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&RegionId, f64)> + '_ {
        self.regions.iter().map(|(r, i)| (r, *i))
    }

    pub fn len(&self) -> usize {
        self.regions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.regions.is_empty()
    }
}

/// Named hardware configuration (CPU plus capacities) a user can apply to
/// either side in one step.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ServerPreset {
    #[serde(skip_deserializing)]
    pub id: PresetId,
    pub name: String,
    #[serde(default)]
    pub description: String,
    pub cpu: CpuId,
    pub ram_gb: f64,
    pub ssd_gb: f64,
    pub hdd_gb: f64,
}

#[derive(Debug, Clone, Default)]
pub struct PresetTable {
    presets: BTreeMap<PresetId, ServerPreset>,
}

impl PresetTable {
    /// Parse presets and check every referenced CPU exists in `catalog`.
    pub fn from_json_str(json: &str, catalog: &CpuCatalog) -> Result<Self> {
        let raw: BTreeMap<PresetId, ServerPreset> = serde_json::from_str(json)
            .map_err(|e| EngineError::dataset(format!("invalid preset table: {e}")))?;
        let mut presets = BTreeMap::new();
        for (id, mut preset) in raw {
            if !catalog.contains(preset.cpu.as_str()) {
                return Err(EngineError::dataset(format!(
                    "preset '{id}' references unknown CPU '{}'",
                    preset.cpu
                )));
            }
            for (name, gb) in [
                ("RAM", preset.ram_gb),
                ("SSD", preset.ssd_gb),
                ("HDD", preset.hdd_gb),
            ] {
                if !(gb.is_finite() && gb >= 0.0) {
                    return Err(EngineError::dataset(format!(
                        "preset '{id}': {name} capacity must be non-negative and finite"
                    )));
                }
            }
            preset.id = id.clone();
            presets.insert(id, preset);
        }
        Ok(Self { presets })
    }

    pub fn get(&self, id: &str) -> Result<&ServerPreset> {
        self.presets
            .get(id)
            .ok_or_else(|| EngineError::UnknownPreset { id: id.to_string() })
    }

    pub fn iter(&self) -> impl Iterator<Item = &ServerPreset> + '_ {
        self.presets.values()
    }

    pub fn len(&self) -> usize {
        self.presets.len()
    }

    pub fn is_empty(&self) -> bool {
        self.presets.is_empty()
    }
}

// ============================================================================
// Dataset
// ============================================================================

/// All static lookup data the engine consumes.
#[derive(Debug, Clone)]
pub struct Dataset {
    pub cpus: CpuCatalog,
    pub grid: GridIntensityTable,
    pub presets: PresetTable,
}

impl Dataset {
    /// Dataset compiled into the binary.
    pub fn builtin() -> Result<Self> {
        Self::from_json_strs(BUILTIN_CPUS, BUILTIN_GRID_INTENSITIES, BUILTIN_PRESETS)
    }

    pub fn from_json_strs(cpus: &str, grid: &str, presets: &str) -> Result<Self> {
        let cpus = CpuCatalog::from_json_str(cpus)?;
        let grid = GridIntensityTable::from_json_str(grid)?;
        let presets = PresetTable::from_json_str(presets, &cpus)?;
        info!(
            cpus = cpus.len(),
            regions = grid.len(),
            presets = presets.len(),
            "dataset loaded"
        );
        Ok(Self { cpus, grid, presets })
    }

    /// Load `cpus.json`, `grid_intensities.json` and `presets.json` from a
    /// directory.
    pub fn from_dir(dir: &Path) -> Result<Self> {
        let read = |file: &str| {
            let path = dir.join(file);
            std::fs::read_to_string(&path)
                .map_err(|e| EngineError::dataset(format!("{}: {e}", path.display())))
        };
        Self::from_json_strs(
            &read(CPUS_FILE)?,
            &read(GRID_INTENSITIES_FILE)?,
            &read(PRESETS_FILE)?,
        )
    }
}
