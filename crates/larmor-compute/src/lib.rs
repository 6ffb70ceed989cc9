//! larmor-compute — Device-resident n-dimensional arrays for streaming MR
//! reconstruction.
//!
//! Provides a unified `Device` trait with backends for:
//! - Host memory (always available; the reference backend and staging path)
//! - CUDA (NVIDIA GPUs via cudarc, feature `cuda`)
//!
//! Arrays carry their shape and the ordinal of the device their buffer lives
//! on; there is no process-global "current device". Every allocation,
//! transfer, and kernel call takes the device handle explicitly, and
//! cross-device migration goes through a [`DevicePool`].

pub mod array;
pub mod cpu;
pub mod device;
pub mod element;
pub mod error;
pub mod host;
pub mod kernels;
pub mod shape;

#[cfg(feature = "cuda")]
pub mod cuda;


pub use array::DeviceArray;
pub use cpu::{CpuBuffer, CpuDevice};
pub use device::{Device, DeviceBuffer, DevicePool};
pub use element::{Element, ElementKind};
pub use error::ComputeError;
pub use host::HostArray;
pub use shape::{Shape, Shaped};

#[cfg(feature = "cuda")]
pub use cuda::{CudaBuffer, CudaDevice};
