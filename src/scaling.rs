//! Cross-side propagation of edits under a scaling policy.
//!
//! When one side of the comparison is edited, the policy decides whether
//! and how the other side follows:
//!
//! | Policy        | utilization edit                    | RAM/SSD/HDD edit                  |
//! |---------------|-------------------------------------|-----------------------------------|
//! | `None`        | -                                   | -                                 |
//! | `Utilization` | `u_other = clamp(u * r, 0, 100)`    | -                                 |
//! | `Resources`   | copied verbatim                     | `gb_other = gb * r`               |
//! | `Mirror`      | copied verbatim                     | copied verbatim                   |
//!
//! with `r = PI_edited / PI_other` for the active workload. When either
//! indicator is missing or not positive, `r` is undefined and the edit stays
//! on its own side.

use tracing::debug;

use crate::catalog::CpuSpec;
use crate::model::{Component, ResolvedServer, ScalingPolicy, ServerConfiguration, Workload};

/// Field of a [`ServerConfiguration`] that an edit touched.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScaledField {
    Utilization,
    Capacity(Component),
}

impl ScaledField {
    pub const ALL: [ScaledField; 4] = [
        ScaledField::Utilization,
        ScaledField::Capacity(Component::Ram),
        ScaledField::Capacity(Component::Ssd),
        ScaledField::Capacity(Component::Hdd),
    ];
}

/// What happened to the other side.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Propagation {
    /// The other side was adjusted.
    Applied,
    /// The policy does not carry this field across.
    NotPropagated,
    /// The performance ratio is undefined; the other side was left as is.
    Skipped,
}

impl Propagation {
    /// Combine outcomes of several fields. A skip wins over an applied
    /// change, which wins over nothing.
    fn merge(self, other: Propagation) -> Propagation {
        match (self, other) {
            (Self::Skipped, _) | (_, Self::Skipped) => Self::Skipped,
            (Self::Applied, _) | (_, Self::Applied) => Self::Applied,
            _ => Self::NotPropagated,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PerformanceScaler {
    policy: ScalingPolicy,
    workload: Workload,
}

impl PerformanceScaler {
    pub fn new(policy: ScalingPolicy, workload: Workload) -> Self {
        Self { policy, workload }
    }

    pub fn policy(&self) -> ScalingPolicy {
        self.policy
    }

    /// `PI_edited / PI_other` for the active workload, `None` when either
    /// indicator is absent or not positive.
    pub fn performance_ratio(&self, edited: &CpuSpec, other: &CpuSpec) -> Option<f64> {
        let edited_pi = self.workload.indicator(edited)?;
        let other_pi = self.workload.indicator(other)?;
        if !(edited_pi > 0.0 && other_pi > 0.0) {
            return None;
        }
        let ratio = edited_pi / other_pi;
        ratio.is_finite().then_some(ratio)
    }

    /// Carry one edited field of `edited` over to `other`.
    pub fn propagate(
        &self,
        field: ScaledField,
        edited: &ResolvedServer<'_>,
        other: &mut ServerConfiguration,
        other_spec: &CpuSpec,
    ) -> Propagation {
        let source = edited.config;

        match (self.policy, field) {
            (ScalingPolicy::None, _) => Propagation::NotPropagated,

            (_, ScaledField::Capacity(Component::Cpu)) => Propagation::NotPropagated,

            (ScalingPolicy::Mirror, ScaledField::Utilization)
            | (ScalingPolicy::Resources, ScaledField::Utilization) => {
                other.utilization = source.utilization;
                Propagation::Applied
            }

            (ScalingPolicy::Mirror, ScaledField::Capacity(component)) => {
                other.set_capacity(component, source.capacity(component));
                Propagation::Applied
            }

            (ScalingPolicy::Utilization, ScaledField::Utilization) => {
                match self.ratio_or_skip(edited, other_spec) {
                    Some(ratio) => {
                        other.utilization = (source.utilization * ratio).clamp(0.0, 100.0);
                        Propagation::Applied
                    }
                    None => Propagation::Skipped,
                }
            }

            (ScalingPolicy::Utilization, ScaledField::Capacity(_)) => Propagation::NotPropagated,

            (ScalingPolicy::Resources, ScaledField::Capacity(component)) => {
                match self.ratio_or_skip(edited, other_spec) {
                    Some(ratio) => {
                        other.set_capacity(component, source.capacity(component) * ratio);
                        Propagation::Applied
                    }
                    None => Propagation::Skipped,
                }
            }
        }
    }

    /// Bring `other` in line with `anchor` for every field the policy
    /// carries, as if each had just been edited on the anchor side.
    pub fn resync(
        &self,
        anchor: &ResolvedServer<'_>,
        other: &mut ServerConfiguration,
        other_spec: &CpuSpec,
    ) -> Propagation {
        ScaledField::ALL
            .into_iter()
            .map(|field| self.propagate(field, anchor, other, other_spec))
            .fold(Propagation::NotPropagated, Propagation::merge)
    }

    fn ratio_or_skip(&self, edited: &ResolvedServer<'_>, other_spec: &CpuSpec) -> Option<f64> {
        let ratio = self.performance_ratio(edited.spec, other_spec);
        if ratio.is_none() {
            debug!(
                policy = %self.policy,
                workload = %self.workload,
                edited_cpu = %edited.spec.id,
                other_cpu = %other_spec.id,
                "performance ratio undefined, scaling skipped"
            );
        }
        ratio
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::Side;

    fn slow() -> CpuSpec {
        CpuSpec::fixture("Slow", 100.0, 100.0)
    }

    fn fast() -> CpuSpec {
        CpuSpec::fixture("Fast", 100.0, 200.0)
    }

    fn config(cpu: &str, util: f64) -> ServerConfiguration {
        ServerConfiguration::new(cpu, 128.0, 512.0, 1000.0, util)
    }

    #[test]
    fn none_policy_leaves_other_side_alone() {
        let scaler = PerformanceScaler::new(ScalingPolicy::None, Workload::SpecRate);
        let (a, b) = (slow(), fast());
        let edited = config("Slow", 90.0);
        let mut other = config("Fast", 10.0);
        let before = other.clone();

        let server = ResolvedServer::new(Side::Current, &edited, &a);
        for field in ScaledField::ALL {
            assert_eq!(scaler.propagate(field, &server, &mut other, &b), Propagation::NotPropagated);
        }
        assert_eq!(other, before);
    }

    #[test]
    fn utilization_holds_workload_constant() {
        let scaler = PerformanceScaler::new(ScalingPolicy::Utilization, Workload::SpecRate);
        let (a, b) = (slow(), fast());
        let edited = config("Slow", 50.0);
        let mut other = config("Fast", 50.0);

        let outcome = scaler.propagate(
            ScaledField::Utilization,
            &ResolvedServer::new(Side::Current, &edited, &a),
            &mut other,
            &b,
        );
        assert_eq!(outcome, Propagation::Applied);
        // Twice the performance needs half the utilization.
        assert!((other.utilization - 25.0).abs() < 1e-12);
        // Implied absolute workload is equal on both sides.
        assert!((edited.utilization * 100.0 - other.utilization * 200.0).abs() < 1e-9);
    }

    #[test]
    fn utilization_is_clamped() {
        let scaler = PerformanceScaler::new(ScalingPolicy::Utilization, Workload::SpecRate);
        let (a, b) = (slow(), fast());
        let edited = config("Fast", 80.0);
        let mut other = config("Slow", 10.0);

        scaler.propagate(
            ScaledField::Utilization,
            &ResolvedServer::new(Side::New, &edited, &b),
            &mut other,
            &a,
        );
        assert_eq!(other.utilization, 100.0);
    }

    #[test]
    fn utilization_policy_ignores_capacity_edits() {
        let scaler = PerformanceScaler::new(ScalingPolicy::Utilization, Workload::SpecRate);
        let (a, b) = (slow(), fast());
        let edited = config("Slow", 50.0);
        let mut other = config("Fast", 50.0);
        let outcome = scaler.propagate(
            ScaledField::Capacity(Component::Ram),
            &ResolvedServer::new(Side::Current, &edited, &a),
            &mut other,
            &b,
        );
        assert_eq!(outcome, Propagation::NotPropagated);
        assert_eq!(other.ram_gb, 128.0);
    }

    #[test]
    fn resources_scale_by_inverse_performance() {
        let scaler = PerformanceScaler::new(ScalingPolicy::Resources, Workload::SpecRate);
        let (a, b) = (slow(), fast());
        let mut edited = config("Slow", 60.0);
        edited.ram_gb = 256.0;
        let mut other = config("Fast", 20.0);

        let server = ResolvedServer::new(Side::Current, &edited, &a);
        scaler.propagate(ScaledField::Capacity(Component::Ram), &server, &mut other, &b);
        assert!((other.ram_gb - 128.0).abs() < 1e-12);

        scaler.propagate(ScaledField::Utilization, &server, &mut other, &b);
        assert_eq!(other.utilization, 60.0);
    }

    #[test]
    fn mirror_copies_verbatim() {
        let scaler = PerformanceScaler::new(ScalingPolicy::Mirror, Workload::SpecRate);
        let (a, b) = (slow(), fast());
        let edited = ServerConfiguration::new("Slow", 64.0, 2048.0, 4096.0, 33.0);
        let mut other = config("Fast", 90.0);

        let outcome = scaler.resync(&ResolvedServer::new(Side::Current, &edited, &a), &mut other, &b);
        assert_eq!(outcome, Propagation::Applied);
        assert_eq!(other.cpu.as_str(), "Fast");
        assert_eq!(
            (other.ram_gb, other.ssd_gb, other.hdd_gb, other.utilization),
            (64.0, 2048.0, 4096.0, 33.0)
        );
    }

    #[test]
    fn missing_indicator_skips_without_touching_other() {
        let scaler = PerformanceScaler::new(ScalingPolicy::Utilization, Workload::TpcH);
        let (a, b) = (slow(), fast());
        let edited = config("Slow", 70.0);
        let mut other = config("Fast", 30.0);

        let outcome = scaler.propagate(
            ScaledField::Utilization,
            &ResolvedServer::new(Side::Current, &edited, &a),
            &mut other,
            &b,
        );
        assert_eq!(outcome, Propagation::Skipped);
        assert_eq!(other.utilization, 30.0);
        assert_eq!(scaler.performance_ratio(&a, &b), None);
    }

    #[test]
    fn resync_under_resources_reports_skip_but_copies_utilization() {
        let scaler = PerformanceScaler::new(ScalingPolicy::Resources, Workload::Sorting);
        let (a, b) = (slow(), fast());
        let edited = config("Slow", 45.0);
        let mut other = ServerConfiguration::new("Fast", 1.0, 2.0, 3.0, 5.0);

        let outcome = scaler.resync(&ResolvedServer::new(Side::Current, &edited, &a), &mut other, &b);
        assert_eq!(outcome, Propagation::Skipped);
        assert_eq!(other.utilization, 45.0);
        assert_eq!((other.ram_gb, other.ssd_gb, other.hdd_gb), (1.0, 2.0, 3.0));
    }
}
