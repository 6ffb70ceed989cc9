//! Error types for operator configuration and evaluation.

use std::fmt;

use larmor_compute::ComputeError;

/// Errors reported by linear-operator configuration and evaluation.
#[derive(Debug)]
pub enum OperatorError {
    /// Array shape disagrees with the configured domain or codomain.
    ShapeMismatch { expected: Vec<usize>, got: Vec<usize> },
    /// Evaluation before the named configuration step.
    NotConfigured(&'static str),
    /// Malformed configuration argument.
    InvalidArgument(String),
    /// Array lives on a different device than the evaluation targets.
    DeviceMismatch { expected: usize, got: usize },
    /// Failure in the underlying array/device layer.
    Compute(ComputeError),
}

impl fmt::Display for OperatorError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::ShapeMismatch { expected, got } => {
                write!(f, "shape mismatch: expected {expected:?}, got {got:?}")
            }
            Self::NotConfigured(what) => write!(f, "operator is missing {what}"),
            Self::InvalidArgument(msg) => write!(f, "invalid argument: {msg}"),
            Self::DeviceMismatch { expected, got } => {
                write!(f, "array on device {got}, evaluation targets device {expected}")
            }
            Self::Compute(e) => write!(f, "compute error: {e}"),
        }
    }
}

impl std::error::Error for OperatorError {}

impl From<ComputeError> for OperatorError {
    fn from(e: ComputeError) -> Self {
        Self::Compute(e)
    }
}
