//! CUDA kernel sources, NVRTC-compiled at first use.
//!
//! Sources are templates: `$T$` is the element type, `$R$` the matching real
//! component type for complex kernels. The CUDA backend renders and caches
//! one module per element kind.

pub mod index_cuda;
pub mod permute_cuda;
pub mod weight_cuda;
