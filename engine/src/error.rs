//! Engine error types

use std::time::Duration;
use thiserror::Error;

/// Failure of a single measurement routine.
///
/// The orchestrator turns every variant except [`MeasureError::Cancelled`]
/// into a fallback value, so callers that only want numbers never see these.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum MeasureError {
    #[error("Transport failure: {0}")]
    Transport(String),

    #[error("Timed out after {0:?}")]
    Timeout(Duration),

    #[error("No successful samples collected")]
    EmptySampleSet,

    #[error("Measurement cancelled")]
    Cancelled,
}

impl MeasureError {
    pub fn transport(err: impl std::fmt::Display) -> Self {
        Self::Transport(err.to_string())
    }
}

/// Failure of an external analysis or coverage call.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ServiceError {
    #[error("Service request failed: {0}")]
    Transport(String),

    #[error("Unparseable service response: {0}")]
    Parse(String),

    #[error("Location permission denied: {0}")]
    PermissionDenied(String),
}
