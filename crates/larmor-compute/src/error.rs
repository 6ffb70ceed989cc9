//! Error types for device arrays and backends.

use std::fmt;

/// Errors reported by device buffers, arrays, and backends.
#[derive(Debug)]
pub enum ComputeError {
    /// Device memory could not be reserved.
    AllocationFailed { device: usize, elements: usize },
    /// Device ordinal outside the pool.
    InvalidDevice { device: usize, count: usize },
    /// Host↔device or device↔device copy failed.
    TransferFailed(String),
    /// Backend/driver-level failure (device init, kernel compile or launch).
    Backend(String),
    /// Axis order is not a bijection over `[0, rank)`.
    InvalidPermutation(Vec<usize>),
    /// Array shape disagrees with the shape an operation requires.
    ShapeMismatch { expected: Vec<usize>, got: Vec<usize> },
    /// Buffer length disagrees with the shape's element count.
    BufferSizeMismatch { expected: usize, got: usize },
    /// Write access to a shared (externally owned) buffer.
    SharedWrite,
    /// An array shape must have at least one dimension.
    EmptyShape,
}

impl fmt::Display for ComputeError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::AllocationFailed { device, elements } => {
                write!(f, "failed to allocate {elements} elements on device {device}")
            }
            Self::InvalidDevice { device, count } => {
                write!(f, "device ordinal {device} out of range (pool holds {count})")
            }
            Self::TransferFailed(msg) => write!(f, "memory transfer failed: {msg}"),
            Self::Backend(msg) => write!(f, "backend error: {msg}"),
            Self::InvalidPermutation(order) => {
                write!(f, "axis order {order:?} is not a permutation")
            }
            Self::ShapeMismatch { expected, got } => {
                write!(f, "shape mismatch: expected {expected:?}, got {got:?}")
            }
            Self::BufferSizeMismatch { expected, got } => {
                write!(f, "buffer holds {got} elements, shape requires {expected}")
            }
            Self::SharedWrite => write!(f, "cannot write through a shared buffer"),
            Self::EmptyShape => write!(f, "array shape must have at least one dimension"),
        }
    }
}

impl std::error::Error for ComputeError {}

#[cfg(feature = "cuda")]
impl From<cudarc::driver::DriverError> for ComputeError {
    fn from(e: cudarc::driver::DriverError) -> Self {
        Self::Backend(e.to_string())
    }
}
