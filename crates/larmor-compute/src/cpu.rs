//! Host-memory reference backend.
//!
//! Implements the full `Device` contract on plain vectors. It is the backend
//! the test suite runs against and the staging path for cross-device
//! migration; a pool of several `CpuDevice`s stands in for a multi-GPU node
//! when no hardware is present.

use crate::device::{Device, DeviceBuffer, DevicePool};
use crate::element::Element;
use crate::error::ComputeError;
use crate::shape::Shape;

/// Host-memory buffer: a plain `Vec<E>`.
pub struct CpuBuffer<E: Element> {
    data: Vec<E>,
}

impl<E: Element> CpuBuffer<E> {
    pub fn as_slice(&self) -> &[E] {
        &self.data
    }

    pub fn as_mut_slice(&mut self) -> &mut [E] {
        &mut self.data
    }
}

impl<E: Element> DeviceBuffer<E> for CpuBuffer<E> {
    fn len(&self) -> usize {
        self.data.len()
    }
}

/// Host-memory device.
pub struct CpuDevice {
    ordinal: usize,
}

impl CpuDevice {
    pub fn new() -> Self {
        Self { ordinal: 0 }
    }

    /// A host device taking the given position in a pool.
    pub fn with_ordinal(ordinal: usize) -> Self {
        Self { ordinal }
    }
}

impl Default for CpuDevice {
    fn default() -> Self {
        Self::new()
    }
}

fn alloc_vec<E: Element>(ordinal: usize, len: usize) -> Result<Vec<E>, ComputeError> {
    let mut data = Vec::new();
    data.try_reserve_exact(len)
        .map_err(|_| ComputeError::AllocationFailed { device: ordinal, elements: len })?;
    Ok(data)
}

impl Device for CpuDevice {
    type Buffer<E: Element> = CpuBuffer<E>;

    fn ordinal(&self) -> usize {
        self.ordinal
    }

    fn alloc_zeros<E: Element>(&self, len: usize) -> Result<CpuBuffer<E>, ComputeError> {
        let mut data = alloc_vec::<E>(self.ordinal, len)?;
        data.resize(len, E::zero());
        Ok(CpuBuffer { data })
    }

    fn upload<E: Element>(&self, src: &[E]) -> Result<CpuBuffer<E>, ComputeError> {
        let mut data = alloc_vec::<E>(self.ordinal, src.len())?;
        data.extend_from_slice(src);
        Ok(CpuBuffer { data })
    }

    fn download<E: Element>(&self, buf: &CpuBuffer<E>) -> Result<Vec<E>, ComputeError> {
        Ok(buf.data.clone())
    }

    fn copy_buffer<E: Element>(&self, src: &CpuBuffer<E>) -> Result<CpuBuffer<E>, ComputeError> {
        self.upload(&src.data)
    }

    fn fill_zero<E: Element>(&self, buf: &mut CpuBuffer<E>) -> Result<(), ComputeError> {
        for v in buf.data.iter_mut() {
            *v = E::zero();
        }
        Ok(())
    }

    fn weight_slice<E: Element>(
        &self,
        input: &CpuBuffer<E>,
        input_offset: usize,
        weight: &CpuBuffer<E>,
        weight_offset: usize,
        output: &mut CpuBuffer<E>,
        output_offset: usize,
        len: usize,
        conjugate: bool,
        accumulate: bool,
    ) -> Result<(), ComputeError> {
        for i in 0..len {
            let w = weight.data[weight_offset + i];
            let w = if conjugate { w.conj() } else { w };
            let v = input.data[input_offset + i] * w;
            let out = &mut output.data[output_offset + i];
            *out = if accumulate { *out + v } else { v };
        }
        Ok(())
    }

    fn gather<E: Element>(
        &self,
        input: &CpuBuffer<E>,
        input_offset: usize,
        indices: &CpuBuffer<u32>,
        output: &mut CpuBuffer<E>,
        output_offset: usize,
        accumulate: bool,
    ) -> Result<(), ComputeError> {
        for (j, &ix) in indices.data.iter().enumerate() {
            let v = input.data[input_offset + ix as usize];
            let out = &mut output.data[output_offset + j];
            *out = if accumulate { *out + v } else { v };
        }
        Ok(())
    }

    fn scatter<E: Element>(
        &self,
        input: &CpuBuffer<E>,
        input_offset: usize,
        indices: &CpuBuffer<u32>,
        output: &mut CpuBuffer<E>,
        output_offset: usize,
        accumulate: bool,
    ) -> Result<(), ComputeError> {
        for (j, &ix) in indices.data.iter().enumerate() {
            let v = input.data[input_offset + j];
            let out = &mut output.data[output_offset + ix as usize];
            *out = if accumulate { *out + v } else { v };
        }
        Ok(())
    }

    fn permute<E: Element>(
        &self,
        input: &CpuBuffer<E>,
        dims: &[usize],
        order: &[usize],
        output: &mut CpuBuffer<E>,
    ) -> Result<(), ComputeError> {
        let shape = Shape::from_slice(dims);
        let in_strides = shape.contiguous_strides();
        let out_dims: Vec<usize> = order.iter().map(|&a| dims[a]).collect();
        let out_strides = Shape::from_slice(&out_dims).contiguous_strides();

        let ndim = dims.len();
        let mut coords = vec![0usize; ndim];
        for (lin, &v) in input.data.iter().enumerate() {
            let mut rem = lin;
            for k in 0..ndim {
                coords[k] = rem / in_strides[k];
                rem %= in_strides[k];
            }
            let mut dst = 0;
            for k in 0..ndim {
                dst += coords[order[k]] * out_strides[k];
            }
            output.data[dst] = v;
        }
        Ok(())
    }

    fn sync(&self) -> Result<(), ComputeError> {
        Ok(())
    }
}

impl DevicePool<CpuDevice> {
    /// A pool of `count` host devices (multi-device emulation).
    pub fn host(count: usize) -> Self {
        Self::new((0..count).map(CpuDevice::with_ordinal).collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use num_complex::Complex32;

    #[test]
    fn upload_download_roundtrip() {
        let dev = CpuDevice::new();
        let data = [1.0f32, 2.0, 3.0];
        let buf = dev.upload(&data).unwrap();
        assert_eq!(dev.download(&buf).unwrap(), data);
    }

    #[test]
    fn weight_slice_conjugates_and_accumulates() {
        let dev = CpuDevice::new();
        let x = dev.upload(&[Complex32::new(1.0, 1.0)]).unwrap();
        let w = dev.upload(&[Complex32::new(0.0, 2.0)]).unwrap();
        let mut out = dev.upload(&[Complex32::new(10.0, 0.0)]).unwrap();

        // (1 + i) * conj(2i) = (1 + i) * (-2i) = 2 - 2i, accumulated onto 10
        dev.weight_slice(&x, 0, &w, 0, &mut out, 0, 1, true, true).unwrap();
        assert_eq!(dev.download(&out).unwrap(), vec![Complex32::new(12.0, -2.0)]);
    }

    #[test]
    fn gather_and_scatter_are_adjoint_index_maps() {
        let dev = CpuDevice::new();
        let x = dev.upload(&[10.0f32, 20.0, 30.0, 40.0]).unwrap();
        let idx = dev.upload(&[3u32, 1]).unwrap();

        let mut compact = dev.alloc_zeros::<f32>(2).unwrap();
        dev.gather(&x, 0, &idx, &mut compact, 0, false).unwrap();
        assert_eq!(dev.download(&compact).unwrap(), vec![40.0, 20.0]);

        let mut full = dev.alloc_zeros::<f32>(4).unwrap();
        dev.scatter(&compact, 0, &idx, &mut full, 0, false).unwrap();
        assert_eq!(dev.download(&full).unwrap(), vec![0.0, 20.0, 0.0, 40.0]);
    }

    #[test]
    fn permute_transposes_2d() {
        let dev = CpuDevice::new();
        let x = dev.upload(&[1.0f32, 2.0, 3.0, 4.0, 5.0, 6.0]).unwrap();
        let mut out = dev.alloc_zeros::<f32>(6).unwrap();
        dev.permute(&x, &[2, 3], &[1, 0], &mut out).unwrap();
        assert_eq!(dev.download(&out).unwrap(), vec![1.0, 4.0, 2.0, 5.0, 3.0, 6.0]);
    }
}
