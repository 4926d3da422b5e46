//! Error taxonomy for the carbon engine.
//!
//! Only invalid input and broken static data are errors. Unsupported
//! workloads and degenerate comparisons are modeled as `Option`/skip results
//! by the components that encounter them.

use thiserror::Error;

use crate::model::{Component, Side};

/// Errors raised at mutation entry points and while loading data or config.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum EngineError {
    #[error("utilization for {side} hardware must be within [0, 100], got {value}")]
    UtilizationOutOfRange { side: Side, value: f64 },

    #[error("{component} capacity for {side} hardware must not be negative, got {value}")]
    NegativeCapacity {
        side: Side,
        component: Component,
        value: f64,
    },

    #[error("non-finite value for {field}")]
    NonFiniteInput { field: String },

    #[error("unknown CPU: {id}")]
    UnknownCpu { id: String },

    #[error("unknown region: {name}")]
    UnknownRegion { name: String },

    #[error("unknown server preset: {id}")]
    UnknownPreset { id: String },

    #[error("dataset error: {message}")]
    Dataset { message: String },

    #[error("config error: {message}")]
    Config { message: String },
}

impl EngineError {
    pub(crate) fn dataset(message: impl Into<String>) -> Self {
        Self::Dataset {
            message: message.into(),
        }
    }

    pub(crate) fn config(message: impl Into<String>) -> Self {
        Self::Config {
            message: message.into(),
        }
    }

    /// Input errors leave the session state untouched and can be retried
    /// with corrected input.
    pub fn is_input_error(&self) -> bool {
        matches!(
            self,
            Self::UtilizationOutOfRange { .. }
                | Self::NegativeCapacity { .. }
                | Self::NonFiniteInput { .. }
                | Self::UnknownCpu { .. }
                | Self::UnknownRegion { .. }
                | Self::UnknownPreset { .. }
        )
    }
}

pub type Result<T> = std::result::Result<T, EngineError>;
