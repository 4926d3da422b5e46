//! Break-even between the current and the new configuration.
//!
//! Each side accumulates carbon along an affine line
//! `carbon(t) = capex + rate * t` (t in years). The new hardware breaks even
//! once its line drops below the current one, which requires a strictly
//! lower operational rate.

use serde::Serialize;

/// Upper bound on sampled timeline rows; a far-away break-even widens the
/// step instead of growing the table.
pub const MAX_TIMELINE_POINTS: usize = 1000;

/// Cumulative carbon of one configuration over time.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct CarbonTrajectory {
    /// Embodied carbon paid up front, kgCO2.
    pub capex_kg: f64,
    /// Operational carbon per year, kgCO2/yr.
    pub rate_kg_per_year: f64,
}

impl CarbonTrajectory {
    pub fn new(capex_kg: f64, rate_kg_per_year: f64) -> Self {
        Self {
            capex_kg,
            rate_kg_per_year,
        }
    }

    /// Cumulative carbon after `years`.
    #[inline]
    pub fn at(&self, years: f64) -> f64 {
        self.capex_kg + self.rate_kg_per_year * years
    }

    pub fn is_finite(&self) -> bool {
        self.capex_kg.is_finite() && self.rate_kg_per_year.is_finite()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct BreakEvenPoint {
    pub time_years: f64,
    /// Cumulative carbon of the new configuration at `time_years`, kgCO2.
    pub cumulative_kg: f64,
}

pub struct BreakEvenSolver;

impl BreakEvenSolver {
    /// Solve `current(t) = new(t)` for `t >= 0`.
    ///
    /// Returns `None` when the new rate is not strictly lower (the lines
    /// never cross in positive time) or an input is not finite. A crossing
    /// in the past is reported at `t = 0`.
    pub fn solve(current: &CarbonTrajectory, new: &CarbonTrajectory) -> Option<BreakEvenPoint> {
        if !(current.is_finite() && new.is_finite()) {
            return None;
        }

        match new.rate_kg_per_year.partial_cmp(&current.rate_kg_per_year) {
            Some(std::cmp::Ordering::Less) => {
                let savings = current.rate_kg_per_year - new.rate_kg_per_year;
                let t = ((new.capex_kg - current.capex_kg) / savings).max(0.0);
                if !t.is_finite() {
                    return None;
                }
                Some(BreakEvenPoint {
                    time_years: t,
                    cumulative_kg: new.at(t),
                })
            }
            Some(std::cmp::Ordering::Equal) | Some(std::cmp::Ordering::Greater) | None => None,
        }
    }
}

// ============================================================================
// Timeline
// ============================================================================

/// One sample of the cumulative carbon chart.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct TimelinePoint {
    pub year: f64,
    pub current_kg: f64,
    /// Absent in single-configuration mode.
    pub new_kg: Option<f64>,
}

impl TimelinePoint {
    pub fn is_finite(&self) -> bool {
        self.year.is_finite()
            && self.current_kg.is_finite()
            && self.new_kg.map_or(true, f64::is_finite)
    }

    /// CSV header.
    pub fn csv_header() -> &'static str {
        "year,current_kg,new_kg"
    }

    /// Format as CSV row. A missing new-side value leaves the column empty.
    pub fn to_csv(&self) -> String {
        match self.new_kg {
            Some(new_kg) => format!("{:.2},{:.1},{:.1}", self.year, self.current_kg, new_kg),
            None => format!("{:.2},{:.1},", self.year, self.current_kg),
        }
    }
}

/// Sample both trajectories every `step_years` from 0 to `horizon_years`.
///
/// The range is extended to the first step at or after the break-even time
/// so the crossing is always on the chart. Rows are capped at
/// [`MAX_TIMELINE_POINTS`] by widening the step.
pub fn sample_timeline(
    current: &CarbonTrajectory,
    new: Option<&CarbonTrajectory>,
    horizon_years: f64,
    step_years: f64,
    break_even: Option<&BreakEvenPoint>,
) -> Vec<TimelinePoint> {
    if !(horizon_years.is_finite() && step_years.is_finite() && horizon_years > 0.0 && step_years > 0.0) {
        return Vec::new();
    }

    let mut end = horizon_years;
    if let Some(point) = break_even {
        if point.time_years > end {
            let aligned = (point.time_years / step_years).ceil() * step_years;
            end = if aligned.is_finite() { aligned } else { point.time_years };
        }
    }

    // Cap in f64: a far break-even overflows the step count as an integer.
    let max_steps = MAX_TIMELINE_POINTS - 1;
    let raw_steps = (end / step_years).ceil();
    let (steps, step) = if raw_steps <= max_steps as f64 {
        (raw_steps as usize, step_years)
    } else {
        (max_steps, end / max_steps as f64)
    };

    (0..=steps)
        .map(|i| {
            let year = (i as f64 * step).min(end);
            TimelinePoint {
                year,
                current_kg: current.at(year),
                new_kg: new.map(|t| t.at(year)),
            }
        })
        .take_while(TimelinePoint::is_finite)
        .collect()
}
