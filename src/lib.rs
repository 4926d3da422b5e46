//! Server replacement carbon analysis.
//!
//! Compares a server in service today with a candidate replacement and
//! estimates the carbon cost of the swap: embodied ("capex") carbon of both
//! machines, operational ("opex") carbon accumulating from their power draw
//! on a regional grid, and the point in time at which the new machine's
//! operational savings repay its embodied carbon.
//!
//! ```text
//! Update -> PerformanceScaler -> PowerModel -> Capex/OpexCalculator -> BreakEvenSolver
//!                                                   \__________ ComparisonResult
//! ```
//!
//! The engine is synchronous and pure: [`comparison::ComparisonModel`]
//! holds only immutable data, and every call recomputes a fresh
//! [`comparison::ComparisonResult`] from a caller-owned state snapshot.

pub mod breakeven;
pub mod capex;
pub mod catalog;
pub mod cli;
pub mod comparison;
pub mod config;
pub mod error;
pub mod model;
pub mod opex;
pub mod power;
pub mod scaling;
pub mod telemetry;


pub use breakeven::{BreakEvenPoint, BreakEvenSolver, CarbonTrajectory, TimelinePoint};
pub use capex::CapexCalculator;
pub use catalog::{CpuId, CpuSpec, Dataset, PresetId, RegionId};
pub use comparison::{ComparisonModel, ComparisonResult, ComparisonState, Update};
pub use config::EngineConfig;
pub use error::{EngineError, Result};
pub use model::{
    CapexBreakdown, Component, ComponentBreakdown, OpexBreakdown, ScalingPolicy,
    ServerConfiguration, Side, Workload,
};
pub use opex::OpexCalculator;
pub use power::PowerModel;
pub use scaling::PerformanceScaler;
