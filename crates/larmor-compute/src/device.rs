//! Device and buffer traits plus the device pool.

use crate::element::Element;
use crate::error::ComputeError;

/// Device-resident buffer holding elements of type `E`.
pub trait DeviceBuffer<E: Element>: Send + Sync {
    /// Number of elements.
    fn len(&self) -> usize;

    /// Whether the buffer is empty.
    fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Compute device abstraction over the host-memory reference backend and CUDA.
///
/// All calls are blocking: when a method returns, its effect is visible to
/// subsequent calls on the same device. Kernel offsets are in elements; the
/// caller is responsible for keeping `offset + len` within the buffers it
/// hands in.
pub trait Device: Send + Sync + 'static {
    /// The buffer type of this backend.
    type Buffer<E: Element>: DeviceBuffer<E>;

    /// Position of this device within its pool.
    fn ordinal(&self) -> usize;

    // -- Buffer lifecycle --

    /// Allocate a zero-initialized buffer of `len` elements.
    fn alloc_zeros<E: Element>(&self, len: usize) -> Result<Self::Buffer<E>, ComputeError>;

    /// Copy host data into a new device buffer.
    fn upload<E: Element>(&self, data: &[E]) -> Result<Self::Buffer<E>, ComputeError>;

    /// Copy buffer contents back to the host.
    fn download<E: Element>(&self, buf: &Self::Buffer<E>) -> Result<Vec<E>, ComputeError>;

    /// Duplicate a buffer on this device.
    fn copy_buffer<E: Element>(&self, src: &Self::Buffer<E>) -> Result<Self::Buffer<E>, ComputeError>;

    /// Overwrite every element with zero.
    fn fill_zero<E: Element>(&self, buf: &mut Self::Buffer<E>) -> Result<(), ComputeError>;

    // -- Kernels --

    /// Element-wise weighting:
    /// `out[out_off + i] (+)= in[in_off + i] * w[w_off + i]` for `i < len`,
    /// conjugating the weight when `conjugate` is set and adding into the
    /// existing output when `accumulate` is set.
    #[allow(clippy::too_many_arguments)]
    fn weight_slice<E: Element>(
        &self,
        input: &Self::Buffer<E>,
        input_offset: usize,
        weight: &Self::Buffer<E>,
        weight_offset: usize,
        output: &mut Self::Buffer<E>,
        output_offset: usize,
        len: usize,
        conjugate: bool,
        accumulate: bool,
    ) -> Result<(), ComputeError>;

    /// Index gather: `out[out_off + j] (+)= in[in_off + idx[j]]` for every
    /// index in `indices`.
    fn gather<E: Element>(
        &self,
        input: &Self::Buffer<E>,
        input_offset: usize,
        indices: &Self::Buffer<u32>,
        output: &mut Self::Buffer<E>,
        output_offset: usize,
        accumulate: bool,
    ) -> Result<(), ComputeError>;

    /// Index scatter: `out[out_off + idx[j]] (+)= in[in_off + j]` for every
    /// index in `indices`.
    fn scatter<E: Element>(
        &self,
        input: &Self::Buffer<E>,
        input_offset: usize,
        indices: &Self::Buffer<u32>,
        output: &mut Self::Buffer<E>,
        output_offset: usize,
        accumulate: bool,
    ) -> Result<(), ComputeError>;

    /// Reorder a contiguous row-major array of dimensions `dims` into
    /// `output` according to the axis permutation `order`.
    fn permute<E: Element>(
        &self,
        input: &Self::Buffer<E>,
        dims: &[usize],
        order: &[usize],
        output: &mut Self::Buffer<E>,
    ) -> Result<(), ComputeError>;

    /// Block until all queued work on this device has completed.
    fn sync(&self) -> Result<(), ComputeError>;
}

/// Ordered collection of backend devices, indexed by ordinal.
///
/// Replaces a process-global "current device": cross-device operations take
/// the pool and name source and target explicitly.
pub struct DevicePool<D: Device> {
    devices: Vec<D>,
}

impl<D: Device> DevicePool<D> {
    pub fn new(devices: Vec<D>) -> Self {
        Self { devices }
    }

    /// Number of devices in the pool.
    pub fn len(&self) -> usize {
        self.devices.len()
    }

    pub fn is_empty(&self) -> bool {
        self.devices.is_empty()
    }

    /// Device at `ordinal`, or `InvalidDevice` when out of range.
    pub fn get(&self, ordinal: usize) -> Result<&D, ComputeError> {
        self.devices.get(ordinal).ok_or(ComputeError::InvalidDevice {
            device: ordinal,
            count: self.devices.len(),
        })
    }
}
