//! Comparison orchestrator.
//!
//! [`ComparisonState`] is owned by the caller and only changes through
//! [`ComparisonModel::update`]. Every update is applied to a copy of the
//! state, the full result is recomputed from that copy, and the copy is
//! committed only when both steps succeed. A rejected update leaves the
//! caller's state exactly as it was.
//!
//! Flow of one update:
//!
//! ```text
//! Update -> PerformanceScaler (other side) -> PowerModel (both sides)
//!        -> CapexCalculator / OpexCalculator -> BreakEvenSolver -> ComparisonResult
//! ```

use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::breakeven::{
    sample_timeline, BreakEvenPoint, BreakEvenSolver, CarbonTrajectory, TimelinePoint,
};
use crate::capex::CapexCalculator;
use crate::catalog::{CpuId, CpuSpec, Dataset, PresetId, RegionId};
use crate::config::{AnalysisConfig, EngineConfig, SessionDefaults};
use crate::error::{EngineError, Result};
use crate::model::{
    validate_capacity, validate_utilization, CapexBreakdown, Component, OpexBreakdown,
    ResolvedServer, ScalingPolicy, ServerConfiguration, Side, Workload,
};
use crate::opex::OpexCalculator;
use crate::power::PowerModel;
use crate::scaling::{PerformanceScaler, Propagation, ScaledField};

// ============================================================================
// State and Updates
// ============================================================================

/// Mutable session state: both configurations and the shared selections.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ComparisonState {
    pub current: ServerConfiguration,
    pub new: ServerConfiguration,
    pub workload: Workload,
    pub scaling: ScalingPolicy,
    pub region: RegionId,
    /// Only the current configuration is analysed.
    pub single_comparison: bool,
}

impl ComparisonState {
    pub fn side(&self, side: Side) -> &ServerConfiguration {
        match side {
            Side::Current => &self.current,
            Side::New => &self.new,
        }
    }

    pub fn side_mut(&mut self, side: Side) -> &mut ServerConfiguration {
        match side {
            Side::Current => &mut self.current,
            Side::New => &mut self.new,
        }
    }

    /// Side whose breakdowns are reported.
    pub fn emphasized_side(&self) -> Side {
        if self.single_comparison {
            Side::Current
        } else {
            Side::New
        }
    }

    fn split_mut(&mut self, anchor: Side) -> (&ServerConfiguration, &mut ServerConfiguration) {
        match anchor {
            Side::Current => (&self.current, &mut self.new),
            Side::New => (&self.new, &mut self.current),
        }
    }
}

/// A single user-driven mutation.
#[derive(Debug, Clone, PartialEq)]
pub enum Update {
    SetCpu { side: Side, cpu: CpuId },
    SetRam { side: Side, gb: f64 },
    SetSsd { side: Side, gb: f64 },
    SetHdd { side: Side, gb: f64 },
    SetUtilization { side: Side, percent: f64 },
    SelectWorkload(Workload),
    SelectScaling(ScalingPolicy),
    SelectRegion(RegionId),
    SetSingleComparison(bool),
    /// Replace CPU and capacities of one side with a named preset.
    ApplyPreset { side: Side, preset: PresetId },
}

// ============================================================================
// Result
// ============================================================================

/// A value for each side of the comparison.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct PerSide<T> {
    pub current: T,
    pub new: T,
}

impl<T: Copy> PerSide<T> {
    pub fn get(&self, side: Side) -> T {
        match side {
            Side::Current => self.current,
            Side::New => self.new,
        }
    }
}

/// Everything the presentation layer shows for one state snapshot.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ComparisonResult {
    pub workload: Workload,
    pub scaling: ScalingPolicy,
    pub region: RegionId,
    /// gCO2/kWh
    pub grid_intensity: f64,
    pub single_comparison: bool,
    pub emphasized: Side,
    /// Performance indicator for the active workload.
    pub performance: PerSide<Option<f64>>,
    pub power_kw: PerSide<f64>,
    /// new / current; `None` for a zero or missing denominator.
    pub performance_ratio: Option<f64>,
    pub power_ratio: Option<f64>,
    /// Embodied carbon totals, kgCO2.
    pub embodied_kg: PerSide<f64>,
    /// Operational carbon rates, kgCO2/yr.
    pub opex_rate_kg_per_year: PerSide<f64>,
    /// Embodied carbon of the emphasized side.
    pub capex_breakdown: CapexBreakdown,
    /// Yearly operational carbon of the emphasized side.
    pub opex_breakdown: OpexBreakdown,
    pub break_even: Option<BreakEvenPoint>,
    pub timeline: Vec<TimelinePoint>,
    pub disabled_workloads: Vec<Workload>,
}

impl ComparisonResult {
    /// Embodied carbon of the emphasized side, kgCO2.
    pub fn emphasized_embodied_kg(&self) -> f64 {
        self.embodied_kg.get(self.emphasized)
    }
}

// ============================================================================
// Model
// ============================================================================

#[derive(Debug, Clone)]
pub struct ComparisonModel {
    dataset: Dataset,
    power: PowerModel,
    capex: CapexCalculator,
    opex: OpexCalculator,
    analysis: AnalysisConfig,
}

impl ComparisonModel {
    pub fn new(dataset: Dataset, config: &EngineConfig) -> Self {
        Self {
            dataset,
            power: PowerModel::new(config.power.clone()),
            capex: CapexCalculator::new(config.embodied.clone()),
            opex: OpexCalculator::new(config.analysis.hours_per_year),
            analysis: config.analysis.clone(),
        }
    }

    pub fn dataset(&self) -> &Dataset {
        &self.dataset
    }

    /// Build the state a fresh session starts with, checked against the
    /// dataset.
    pub fn initial_state(&self, defaults: &SessionDefaults) -> Result<ComparisonState> {
        let config = |cpu: &CpuId| {
            ServerConfiguration::new(
                cpu.clone(),
                defaults.ram_gb,
                defaults.ssd_gb,
                defaults.hdd_gb,
                defaults.utilization,
            )
        };
        let mut state = ComparisonState {
            current: config(&defaults.current_cpu),
            new: config(&defaults.new_cpu),
            workload: defaults.workload,
            scaling: defaults.scaling,
            region: defaults.region.clone(),
            single_comparison: defaults.single_comparison,
        };

        self.dataset.grid.get(state.region.as_str())?;
        for side in Side::BOTH {
            self.spec(&state, side)?;
            state.side(side).validate(side)?;
        }
        self.normalize_workload(&mut state)?;
        self.resync(&mut state, Side::Current)?;
        Ok(state)
    }

    /// Apply `update` and return the recomputed result. On error `state` is
    /// left untouched.
    pub fn update(&self, state: &mut ComparisonState, update: Update) -> Result<ComparisonResult> {
        let outcome = self
            .apply(state, &update)
            .and_then(|next| self.compute(&next).map(|result| (next, result)));

        match outcome {
            Ok((next, result)) => {
                debug!(?update, workload = %next.workload, scaling = %next.scaling, "update applied");
                *state = next;
                Ok(result)
            }
            Err(e) => {
                warn!(?update, error = %e, "update rejected");
                Err(e)
            }
        }
    }

    /// State after `update`, without committing it.
    pub fn apply(&self, state: &ComparisonState, update: &Update) -> Result<ComparisonState> {
        let mut next = state.clone();

        match update {
            Update::SetCpu { side, cpu } => {
                self.dataset.cpus.get(cpu.as_str())?;
                next.side_mut(*side).cpu = cpu.clone();
                self.normalize_workload(&mut next)?;
                self.resync(&mut next, side.other())?;
            }
            Update::SetRam { side, gb } => {
                self.set_capacity(&mut next, *side, Component::Ram, *gb)?;
            }
            Update::SetSsd { side, gb } => {
                self.set_capacity(&mut next, *side, Component::Ssd, *gb)?;
            }
            Update::SetHdd { side, gb } => {
                self.set_capacity(&mut next, *side, Component::Hdd, *gb)?;
            }
            Update::SetUtilization { side, percent } => {
                validate_utilization(*side, *percent)?;
                next.side_mut(*side).utilization = *percent;
                self.propagate(&mut next, *side, ScaledField::Utilization)?;
            }
            Update::SelectWorkload(workload) => {
                next.workload = *workload;
                self.normalize_workload(&mut next)?;
                self.resync(&mut next, Side::Current)?;
            }
            Update::SelectScaling(policy) => {
                next.scaling = *policy;
                self.resync(&mut next, Side::Current)?;
            }
            Update::SelectRegion(region) => {
                self.dataset.grid.get(region.as_str())?;
                next.region = region.clone();
            }
            Update::SetSingleComparison(single) => {
                next.single_comparison = *single;
                self.normalize_workload(&mut next)?;
                self.resync(&mut next, Side::Current)?;
            }
            Update::ApplyPreset { side, preset } => {
                let preset = self.dataset.presets.get(preset.as_str())?;
                let config = next.side_mut(*side);
                config.cpu = preset.cpu.clone();
                config.ram_gb = preset.ram_gb;
                config.ssd_gb = preset.ssd_gb;
                config.hdd_gb = preset.hdd_gb;

                if matches!(next.scaling, ScalingPolicy::Resources | ScalingPolicy::Mirror) {
                    debug!(preset = %preset.id, previous = %next.scaling, "preset resets scaling policy");
                    next.scaling = ScalingPolicy::None;
                }
                self.normalize_workload(&mut next)?;
                self.resync(&mut next, side.other())?;
            }
        }

        for side in Side::BOTH {
            next.side(side).validate(side)?;
        }
        Ok(next)
    }

    /// Recompute the full result for a snapshot. Pure: the same state
    /// always yields an identical result.
    pub fn compute(&self, state: &ComparisonState) -> Result<ComparisonResult> {
        let intensity = self.dataset.grid.get(state.region.as_str())?;
        let current_spec = self.spec(state, Side::Current)?;
        let new_spec = self.spec(state, Side::New)?;
        let current = ResolvedServer::new(Side::Current, &state.current, current_spec);
        let new = ResolvedServer::new(Side::New, &state.new, new_spec);

        let power_current = self.power.breakdown(&current)?;
        let power_new = self.power.breakdown(&new)?;
        let capex_current = self.capex.breakdown(&current)?;
        let capex_new = self.capex.breakdown(&new)?;
        let opex_current = self.opex.rate_breakdown(&power_current, intensity);
        let opex_new = self.opex.rate_breakdown(&power_new, intensity);

        let breakdowns = [
            ("power", &power_current, &power_new),
            ("embodied carbon", &capex_current, &capex_new),
            ("operational carbon", &opex_current, &opex_new),
        ];
        for (name, a, b) in breakdowns {
            if !(a.is_finite() && b.is_finite()) {
                return Err(EngineError::NonFiniteInput {
                    field: format!("computed {name}"),
                });
            }
        }

        let trajectory_current = CarbonTrajectory::new(capex_current.total(), opex_current.total());
        let trajectory_new = CarbonTrajectory::new(capex_new.total(), opex_new.total());
        let break_even = if state.single_comparison {
            None
        } else {
            BreakEvenSolver::solve(&trajectory_current, &trajectory_new)
        };
        let timeline = sample_timeline(
            &trajectory_current,
            (!state.single_comparison).then_some(&trajectory_new),
            self.analysis.horizon_years,
            self.analysis.timeline_step_years,
            break_even.as_ref(),
        );

        let performance = PerSide {
            current: current.indicator(state.workload),
            new: new.indicator(state.workload),
        };
        let power_kw = PerSide {
            current: power_current.total(),
            new: power_new.total(),
        };

        let emphasized = state.emphasized_side();
        let (capex_breakdown, opex_breakdown) = match emphasized {
            Side::Current => (capex_current, opex_current),
            Side::New => (capex_new, opex_new),
        };

        let result = ComparisonResult {
            workload: state.workload,
            scaling: state.scaling,
            region: state.region.clone(),
            grid_intensity: intensity,
            single_comparison: state.single_comparison,
            emphasized,
            performance,
            power_kw,
            performance_ratio: ratio(performance.new, performance.current),
            power_ratio: ratio(Some(power_kw.new), Some(power_kw.current)),
            embodied_kg: PerSide {
                current: capex_current.total(),
                new: capex_new.total(),
            },
            opex_rate_kg_per_year: PerSide {
                current: trajectory_current.rate_kg_per_year,
                new: trajectory_new.rate_kg_per_year,
            },
            capex_breakdown,
            opex_breakdown,
            break_even,
            timeline,
            disabled_workloads: self.disabled_workloads(state)?,
        };

        debug!(
            workload = %result.workload,
            power_current_kw = result.power_kw.current,
            power_new_kw = result.power_kw.new,
            break_even_years = ?result.break_even.map(|p| p.time_years),
            "comparison recomputed"
        );
        Ok(result)
    }

    /// Workloads whose counter is missing on the current CPU, or on the new
    /// CPU unless only one configuration is compared.
    pub fn disabled_workloads(&self, state: &ComparisonState) -> Result<Vec<Workload>> {
        let current = self.spec(state, Side::Current)?;
        let new = if state.single_comparison {
            None
        } else {
            Some(self.spec(state, Side::New)?)
        };

        Ok(Workload::ALL
            .into_iter()
            .filter(|w| {
                w.indicator(current).is_none() || new.is_some_and(|spec| w.indicator(spec).is_none())
            })
            .collect())
    }

    pub fn enabled_workloads(&self, state: &ComparisonState) -> Result<Vec<Workload>> {
        let disabled = self.disabled_workloads(state)?;
        Ok(Workload::ALL
            .into_iter()
            .filter(|w| !disabled.contains(w))
            .collect())
    }

    fn spec(&self, state: &ComparisonState, side: Side) -> Result<&CpuSpec> {
        self.dataset.cpus.get(state.side(side).cpu.as_str())
    }

    fn set_capacity(
        &self,
        state: &mut ComparisonState,
        side: Side,
        component: Component,
        gb: f64,
    ) -> Result<()> {
        validate_capacity(side, component, gb)?;
        state.side_mut(side).set_capacity(component, gb);
        self.propagate(state, side, ScaledField::Capacity(component))
    }

    /// Never leave the selection on a disabled workload.
    fn normalize_workload(&self, state: &mut ComparisonState) -> Result<()> {
        let disabled = self.disabled_workloads(state)?;
        if !disabled.contains(&state.workload) {
            return Ok(());
        }

        let fallback = Workload::ALL
            .into_iter()
            .find(|w| !disabled.contains(w))
            .unwrap_or_else(Workload::first);
        warn!(
            workload = %state.workload,
            fallback = %fallback,
            "workload unsupported by selected hardware, selection reset"
        );
        state.workload = fallback;
        Ok(())
    }

    fn propagate(&self, state: &mut ComparisonState, edited: Side, field: ScaledField) -> Result<()> {
        if state.single_comparison {
            return Ok(());
        }
        let scaler = PerformanceScaler::new(state.scaling, state.workload);
        let edited_spec = self.spec(state, edited)?;
        let other_spec = self.spec(state, edited.other())?;
        let (source, target) = state.split_mut(edited);

        let outcome = scaler.propagate(
            field,
            &ResolvedServer::new(edited, source, edited_spec),
            target,
            other_spec,
        );
        if outcome == Propagation::Applied {
            debug!(side = %edited.other(), ?field, policy = %scaler.policy(), "scaled other side");
        }
        Ok(())
    }

    /// Fresh propagation of every field from `anchor` to the other side.
    fn resync(&self, state: &mut ComparisonState, anchor: Side) -> Result<()> {
        if state.single_comparison || state.scaling == ScalingPolicy::None {
            return Ok(());
        }
        let scaler = PerformanceScaler::new(state.scaling, state.workload);
        let anchor_spec = self.spec(state, anchor)?;
        let other_spec = self.spec(state, anchor.other())?;
        let (source, target) = state.split_mut(anchor);

        let outcome = scaler.resync(
            &ResolvedServer::new(anchor, source, anchor_spec),
            target,
            other_spec,
        );
        debug!(anchor = %anchor, policy = %scaler.policy(), ?outcome, "configurations resynced");
        Ok(())
    }
}

/// `numerator / denominator` when both are present and the result is finite.
fn ratio(numerator: Option<f64>, denominator: Option<f64>) -> Option<f64> {
    let (n, d) = (numerator?, denominator?);
    if d > 0.0 {
        Some(n / d).filter(|r| r.is_finite())
    } else {
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn model() -> ComparisonModel {
        let dataset = Dataset::builtin().unwrap();
        ComparisonModel::new(dataset, &EngineConfig::default())
    }

    fn session() -> (ComparisonModel, ComparisonState) {
        let model = model();
        let state = model.initial_state(&SessionDefaults::default()).unwrap();
        (model, state)
    }

    #[test]
    fn initial_state_follows_defaults() {
        let (model, state) = session();
        assert_eq!(state.current.cpu.as_str(), "Intel Xeon E7-4880 v2");
        assert_eq!(state.new.cpu.as_str(), "Intel Xeon Platinum 8480CL");
        assert_eq!(state.workload, Workload::SpecRate);
        let result = model.compute(&state).unwrap();
        assert_eq!(result.emphasized, Side::New);
        assert!(result.power_kw.current > 0.0);
        assert!(!result.timeline.is_empty());
    }

    #[test]
    fn initial_state_rejects_unknown_references() {
        let model = model();
        let defaults = SessionDefaults {
            current_cpu: CpuId::from("Pentium Pro"),
            ..SessionDefaults::default()
        };
        assert!(matches!(
            model.initial_state(&defaults),
            Err(EngineError::UnknownCpu { .. })
        ));

        let defaults = SessionDefaults {
            region: RegionId::from("Atlantis"),
            ..SessionDefaults::default()
        };
        assert!(matches!(
            model.initial_state(&defaults),
            Err(EngineError::UnknownRegion { .. })
        ));
    }

    #[test]
    fn rejected_update_keeps_state() {
        let (model, mut state) = session();
        let before = state.clone();

        let err = model
            .update(&mut state, Update::SetUtilization { side: Side::New, percent: 101.0 })
            .unwrap_err();
        assert!(err.is_input_error());
        assert_eq!(state, before);

        assert!(model
            .update(&mut state, Update::SetRam { side: Side::Current, gb: -8.0 })
            .is_err());
        assert!(model
            .update(&mut state, Update::SetCpu { side: Side::New, cpu: CpuId::from("Z80") })
            .is_err());
        assert!(model
            .update(&mut state, Update::SelectRegion(RegionId::from("Mars")))
            .is_err());
        assert_eq!(state, before);
    }

    #[test]
    fn region_changes_rates_only() {
        let (model, mut state) = session();
        let germany = model.compute(&state).unwrap();
        let france = model
            .update(&mut state, Update::SelectRegion(RegionId::from("France")))
            .unwrap();

        assert_eq!(germany.embodied_kg, france.embodied_kg);
        assert_eq!(germany.power_kw, france.power_kw);
        assert!(france.opex_rate_kg_per_year.current < germany.opex_rate_kg_per_year.current);
    }

    #[test]
    fn single_comparison_emphasizes_current_and_has_no_break_even() {
        let (model, mut state) = session();
        let result = model.update(&mut state, Update::SetSingleComparison(true)).unwrap();
        assert_eq!(result.emphasized, Side::Current);
        assert_eq!(result.break_even, None);
        assert!(result.timeline.iter().all(|p| p.new_kg.is_none()));
        assert_eq!(result.capex_breakdown.total(), result.embodied_kg.current);
        assert_eq!(result.emphasized_embodied_kg(), result.embodied_kg.current);

        let result = model.update(&mut state, Update::SetSingleComparison(false)).unwrap();
        assert_eq!(result.emphasized_embodied_kg(), result.embodied_kg.new);
    }

    #[test]
    fn preset_sets_hardware_and_clears_propagating_policy() {
        let (model, mut state) = session();
        model
            .update(&mut state, Update::SelectScaling(ScalingPolicy::Mirror))
            .unwrap();

        model
            .update(
                &mut state,
                Update::ApplyPreset {
                    side: Side::New,
                    preset: PresetId::from("genoa-2022"),
                },
            )
            .unwrap();
        assert_eq!(state.new.cpu.as_str(), "AMD EPYC 9554");
        assert_eq!(state.new.ram_gb, 768.0);
        assert_eq!(state.scaling, ScalingPolicy::None);
    }

    #[test]
    fn ratios_are_new_over_current() {
        let (model, state) = session();
        let result = model.compute(&state).unwrap();
        let perf = result.performance_ratio.unwrap();
        let expected = result.performance.new.unwrap() / result.performance.current.unwrap();
        assert_eq!(perf, expected);
        assert_eq!(
            result.power_ratio,
            Some(result.power_kw.new / result.power_kw.current)
        );
    }

    #[test]
    fn ratio_guards_zero_and_missing() {
        assert_eq!(ratio(Some(1.0), Some(0.0)), None);
        assert_eq!(ratio(None, Some(2.0)), None);
        assert_eq!(ratio(Some(3.0), None), None);
        assert_eq!(ratio(Some(3.0), Some(2.0)), Some(1.5));
    }
}
