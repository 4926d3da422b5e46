//! Command-line interface for the carbon comparison engine.
//!
//! Parameters are organized into categories:
//!
//! ## Configuration
//! - `--config`: TOML engine configuration (falls back to `TCO2_CONFIG`)
//! - `--data-dir`: directory with `cpus.json`, `grid_intensities.json`, `presets.json`
//!
//! ## Current / New Hardware
//! - `--current-preset`, `--new-preset`: apply a server preset
//! - `--current-cpu`, `--new-cpu`: CPU model from the catalog
//! - `--current-ram`, `--current-ssd`, `--current-hdd` (and `--new-*`): capacities in GB
//! - `--current-util`, `--new-util`: CPU utilization in percent
//!
//! ## Analysis
//! - `--workload`: specrate, specspeed, sorting, tpch
//! - `--scaling`: none, utilization, emissions, mirror
//! - `--region`: grid region for operational carbon
//! - `--single`: analyse the current hardware only
//!
//! Values not given on the command line come from the `[session]` section
//! of the configuration. Edits are applied in a fixed order (presets,
//! workload, scaling, CPUs, capacities, utilization) so later edits
//! propagate under the selected scaling policy.

use std::path::PathBuf;

use anyhow::{bail, Result};
use clap::Parser;

use crate::catalog::{CpuId, PresetId, RegionId};
use crate::comparison::Update;
use crate::model::{ScalingPolicy, Side, Workload};

#[derive(Parser, Debug, Default)]
#[command(name = "tco2")]
#[command(author, version, about = "Carbon footprint and break-even analysis for server hardware replacements")]
pub struct Cli {
    // =========================================================================
    // Configuration
    // =========================================================================

    /// Engine configuration file (TOML)
    #[arg(long, help_heading = "Configuration")]
    pub config: Option<PathBuf>,

    /// Directory with replacement JSON datasets
    #[arg(long, help_heading = "Configuration")]
    pub data_dir: Option<PathBuf>,

    /// Log level override: trace, debug, info, warn, error
    #[arg(long, help_heading = "Configuration")]
    pub log_level: Option<String>,

    // =========================================================================
    // Current Hardware
    // =========================================================================

    /// Server preset for the current hardware (see --list-presets)
    #[arg(long, help_heading = "Current Hardware")]
    pub current_preset: Option<String>,

    /// CPU of the current hardware (see --list-cpus)
    #[arg(long, help_heading = "Current Hardware")]
    pub current_cpu: Option<String>,

    /// RAM capacity of the current hardware in GB
    #[arg(long, help_heading = "Current Hardware")]
    pub current_ram: Option<f64>,

    /// SSD capacity of the current hardware in GB
    #[arg(long, help_heading = "Current Hardware")]
    pub current_ssd: Option<f64>,

    /// HDD capacity of the current hardware in GB
    #[arg(long, help_heading = "Current Hardware")]
    pub current_hdd: Option<f64>,

    /// CPU utilization of the current hardware in percent [0, 100]
    #[arg(long, help_heading = "Current Hardware")]
    pub current_util: Option<f64>,

    // =========================================================================
    // New Hardware
    // =========================================================================

    /// Server preset for the new hardware (see --list-presets)
    #[arg(long, help_heading = "New Hardware")]
    pub new_preset: Option<String>,

    /// CPU of the new hardware (see --list-cpus)
    #[arg(long, help_heading = "New Hardware")]
    pub new_cpu: Option<String>,

    /// RAM capacity of the new hardware in GB
    #[arg(long, help_heading = "New Hardware")]
    pub new_ram: Option<f64>,

    /// SSD capacity of the new hardware in GB
    #[arg(long, help_heading = "New Hardware")]
    pub new_ssd: Option<f64>,

    /// HDD capacity of the new hardware in GB
    #[arg(long, help_heading = "New Hardware")]
    pub new_hdd: Option<f64>,

    /// CPU utilization of the new hardware in percent [0, 100]
    #[arg(long, help_heading = "New Hardware")]
    pub new_util: Option<f64>,

    // =========================================================================
    // Analysis
    // =========================================================================

    /// Workload used as performance indicator: specrate, specspeed, sorting, tpch
    #[arg(long, help_heading = "Analysis")]
    pub workload: Option<String>,

    /// Scaling policy: none, utilization, emissions, mirror
    /// [HIGH IMPACT: decides how edits carry over to the other side]
    #[arg(long, help_heading = "Analysis")]
    pub scaling: Option<String>,

    /// Grid region for operational carbon (see --list-regions)
    #[arg(long, help_heading = "Analysis")]
    pub region: Option<String>,

    /// Analyse only the current hardware
    #[arg(long, default_value = "false", help_heading = "Analysis")]
    pub single: bool,

    // =========================================================================
    // Output Modes
    // =========================================================================

    /// Print the comparison result as JSON
    #[arg(long, default_value = "false", help_heading = "Modes")]
    pub json: bool,

    /// Print the cumulative carbon timeline as CSV
    #[arg(long, default_value = "false", help_heading = "Modes")]
    pub timeline: bool,

    /// List CPUs in the catalog
    #[arg(long, default_value = "false", help_heading = "Modes")]
    pub list_cpus: bool,

    /// List grid regions and their carbon intensity
    #[arg(long, default_value = "false", help_heading = "Modes")]
    pub list_regions: bool,

    /// List server presets
    #[arg(long, default_value = "false", help_heading = "Modes")]
    pub list_presets: bool,

    /// List workloads usable as performance indicator
    #[arg(long, default_value = "false", help_heading = "Modes")]
    pub list_workloads: bool,

    /// List scaling policies and how they carry edits over
    #[arg(long, default_value = "false", help_heading = "Modes")]
    pub list_scaling: bool,

    /// Show CPU specifications and timeline in the report
    #[arg(long, default_value = "false", help_heading = "Modes")]
    pub verbose: bool,
}

impl Cli {
    /// Updates requested on the command line, in application order.
    pub fn to_updates(&self) -> Result<Vec<Update>> {
        let mut updates = Vec::new();

        if self.single {
            updates.push(Update::SetSingleComparison(true));
        }
        if let Some(region) = &self.region {
            updates.push(Update::SelectRegion(RegionId::from(region.as_str())));
        }

        for (side, preset) in [
            (Side::Current, &self.current_preset),
            (Side::New, &self.new_preset),
        ] {
            if let Some(preset) = preset {
                updates.push(Update::ApplyPreset {
                    side,
                    preset: PresetId::from(preset.as_str()),
                });
            }
        }

        if let Some(name) = &self.workload {
            let Some(workload) = Workload::from_str(name) else {
                bail!("unknown workload '{name}' (expected specrate, specspeed, sorting or tpch)");
            };
            updates.push(Update::SelectWorkload(workload));
        }
        if let Some(name) = &self.scaling {
            let Some(policy) = ScalingPolicy::from_str(name) else {
                bail!("unknown scaling policy '{name}' (expected none, utilization, emissions or mirror)");
            };
            updates.push(Update::SelectScaling(policy));
        }

        for (side, cpu) in [(Side::Current, &self.current_cpu), (Side::New, &self.new_cpu)] {
            if let Some(cpu) = cpu {
                updates.push(Update::SetCpu {
                    side,
                    cpu: CpuId::from(cpu.as_str()),
                });
            }
        }

        let capacities = [
            (Side::Current, self.current_ram, self.current_ssd, self.current_hdd),
            (Side::New, self.new_ram, self.new_ssd, self.new_hdd),
        ];
        for (side, ram, ssd, hdd) in capacities {
            if let Some(gb) = ram {
                updates.push(Update::SetRam { side, gb });
            }
            if let Some(gb) = ssd {
                updates.push(Update::SetSsd { side, gb });
            }
            if let Some(gb) = hdd {
                updates.push(Update::SetHdd { side, gb });
            }
        }

        for (side, util) in [(Side::Current, self.current_util), (Side::New, self.new_util)] {
            if let Some(percent) = util {
                updates.push(Update::SetUtilization { side, percent });
            }
        }

        Ok(updates)
    }
}

// ============================================================================
// Formatting
// ============================================================================

const DAYS_PER_YEAR: f64 = 365.0;
const DAYS_PER_MONTH: f64 = DAYS_PER_YEAR / 12.0;

fn plural(n: u64, one: &'static str, many: &'static str) -> &'static str {
    if n == 1 {
        one
    } else {
        many
    }
}

/// Format a duration in years as "N years, M months, D days".
///
/// Zero components are omitted; a duration under half a day is "0 days".
pub fn format_years(years: f64) -> String {
    if !years.is_finite() || years <= 0.0 {
        return "0 days".to_string();
    }

    let total_days = years * DAYS_PER_YEAR;
    let whole_years = (total_days / DAYS_PER_YEAR).floor();
    let rest = total_days - whole_years * DAYS_PER_YEAR;
    let whole_months = (rest / DAYS_PER_MONTH).floor();
    let days = (rest - whole_months * DAYS_PER_MONTH).round();

    let (y, m, d) = (whole_years as u64, whole_months as u64, days as u64);
    let mut parts = Vec::with_capacity(3);
    if y > 0 {
        parts.push(format!("{y} {}", plural(y, "year", "years")));
    }
    if m > 0 {
        parts.push(format!("{m} {}", plural(m, "month", "months")));
    }
    if d > 0 {
        parts.push(format!("{d} {}", plural(d, "day", "days")));
    }

    if parts.is_empty() {
        "0 days".to_string()
    } else {
        parts.join(", ")
    }
}

/// Insert thousands separators into the integer part of a formatted number.
pub fn add_commas(value: f64, decimals: usize) -> String {
    let formatted = format!("{value:.decimals$}");
    let (sign, unsigned) = match formatted.strip_prefix('-') {
        Some(rest) => ("-", rest),
        None => ("", formatted.as_str()),
    };
    let (int_part, frac_part) = match unsigned.split_once('.') {
        Some((i, f)) => (i, Some(f)),
        None => (unsigned, None),
    };

    let mut grouped = String::with_capacity(int_part.len() + int_part.len() / 3);
    for (i, ch) in int_part.chars().enumerate() {
        if i > 0 && (int_part.len() - i) % 3 == 0 {
            grouped.push(',');
        }
        grouped.push(ch);
    }

    match frac_part {
        Some(f) => format!("{sign}{grouped}.{f}"),
        None => format!("{sign}{grouped}"),
    }
}

/// Format kilograms of CO2 with one decimal and thousands separators.
pub fn format_kg(kg: f64) -> String {
    format!("{} kgCO2", add_commas(kg, 1))
}

/// Format kW with three decimals.
pub fn format_kw(kw: f64) -> String {
    format!("{kw:.3} kW")
}

/// Format percentage.
pub fn format_pct(value: f64, total: f64) -> String {
    if total > 0.0 {
        format!("{:.0}%", 100.0 * value / total)
    } else {
        "0%".to_string()
    }
}

/// Whether `a` and `b` differ by at most `x` (a fraction) of their mean.
pub fn within_x_percent(a: f64, b: f64, x: f64) -> bool {
    let mean = (a + b) / 2.0;
    if mean == 0.0 {
        return a == b;
    }
    ((a - b).abs() / mean.abs()) <= x
}

/// Decimals for the performance and power ratios: close ratios need more
/// precision to tell apart.
pub fn ratio_decimals(performance_ratio: f64, power_ratio: f64) -> usize {
    if within_x_percent(performance_ratio, power_ratio, 0.1) {
        3
    } else {
        1
    }
}

/// Format a ratio with `decimals`, dropping an all-zero fraction.
pub fn format_ratio(ratio: f64, decimals: usize) -> String {
    let s = format!("{ratio:.decimals$}");
    match s.split_once('.') {
        Some((int, frac)) if frac.chars().all(|c| c == '0') => int.to_string(),
        _ => s,
    }
}

/// Relative increase of the larger over the smaller value in percent,
/// `None` when equal or the smaller value is not positive.
pub fn percent_increase(a: f64, b: f64) -> Option<f64> {
    let (lo, hi) = if a < b { (a, b) } else { (b, a) };
    if lo <= 0.0 || lo == hi {
        return None;
    }
    Some((hi - lo) / lo * 100.0)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn years_are_spelled_out() {
        assert_eq!(format_years(1.0), "1 year");
        assert_eq!(format_years(2.4), "2 years, 4 months, 24 days");
        assert_eq!(format_years(0.0), "0 days");
        assert_eq!(format_years(1.0 / 365.0), "1 day");
        assert_eq!(format_years(3.0 + 45.0 / 365.0), "3 years, 1 month, 15 days");
    }

    #[test]
    fn commas_group_thousands() {
        assert_eq!(add_commas(0.0, 0), "0");
        assert_eq!(add_commas(999.0, 0), "999");
        assert_eq!(add_commas(1000.0, 0), "1,000");
        assert_eq!(add_commas(1234567.891, 1), "1,234,567.9");
        assert_eq!(add_commas(-9876543.0, 0), "-9,876,543");
        assert_eq!(format_kg(12345.67), "12,345.7 kgCO2");
    }

    #[test]
    fn ratio_precision_depends_on_closeness() {
        assert_eq!(ratio_decimals(2.0, 2.1), 3);
        assert_eq!(ratio_decimals(3.0, 1.2), 1);
        assert_eq!(format_ratio(2.0, 3), "2");
        assert_eq!(format_ratio(2.0456, 3), "2.046");
        assert_eq!(format_ratio(1.26, 1), "1.3");
    }

    #[test]
    fn within_percent_is_symmetric() {
        assert!(within_x_percent(100.0, 109.0, 0.1));
        assert!(within_x_percent(109.0, 100.0, 0.1));
        assert!(!within_x_percent(100.0, 120.0, 0.1));
        assert!(within_x_percent(0.0, 0.0, 0.1));
    }

    #[test]
    fn percent_increase_of_larger_value() {
        assert_eq!(percent_increase(100.0, 150.0), Some(50.0));
        assert_eq!(percent_increase(150.0, 100.0), Some(50.0));
        assert_eq!(percent_increase(100.0, 100.0), None);
        assert_eq!(percent_increase(0.0, 100.0), None);
    }

    #[test]
    fn pct_of_total() {
        assert_eq!(format_pct(1.0, 4.0), "25%");
        assert_eq!(format_pct(1.0, 0.0), "0%");
    }

    #[test]
    fn listing_modes_need_no_updates() {
        let cli = Cli::parse_from(["tco2", "--list-workloads", "--list-scaling"]);
        assert!(cli.list_workloads && cli.list_scaling);
        assert!(!cli.list_cpus);
        assert!(cli.to_updates().unwrap().is_empty());
    }

    #[test]
    fn cli_arguments_become_ordered_updates() {
        let cli = Cli::parse_from([
            "tco2",
            "--new-util",
            "30",
            "--scaling",
            "utilization",
            "--new-preset",
            "genoa-2022",
            "--current-ram",
            "256",
            "--region",
            "France",
        ]);
        let updates = cli.to_updates().unwrap();
        assert_eq!(
            updates,
            vec![
                Update::SelectRegion(RegionId::from("France")),
                Update::ApplyPreset {
                    side: Side::New,
                    preset: PresetId::from("genoa-2022"),
                },
                Update::SelectScaling(ScalingPolicy::Utilization),
                Update::SetRam {
                    side: Side::Current,
                    gb: 256.0,
                },
                Update::SetUtilization {
                    side: Side::New,
                    percent: 30.0,
                },
            ]
        );
    }

    #[test]
    fn unknown_selection_names_are_rejected() {
        let cli = Cli {
            workload: Some("linpack".into()),
            ..Cli::default()
        };
        assert!(cli.to_updates().is_err());

        let cli = Cli {
            scaling: Some("double".into()),
            ..Cli::default()
        };
        assert!(cli.to_updates().is_err());
    }
}
