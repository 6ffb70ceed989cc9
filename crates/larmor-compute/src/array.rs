//! Device-resident n-dimensional array.

use std::sync::Arc;

use tracing::{debug, trace};

use crate::device::{Device, DeviceBuffer, DevicePool};
use crate::element::Element;
use crate::error::ComputeError;
use crate::host::HostArray;
use crate::shape::{Shape, Shaped};

/// Buffer ownership: exclusive by default, `Shared` only when wrapping
/// externally managed memory. A shared array never releases the buffer and
/// refuses write access.
enum Storage<B> {
    Owned(B),
    Shared(Arc<B>),
}

impl<B> Storage<B> {
    fn get(&self) -> &B {
        match self {
            Storage::Owned(b) => b,
            Storage::Shared(b) => b,
        }
    }
}

/// N-dimensional array resident on one device of a backend `D`.
///
/// Every array records the ordinal of the device its buffer lives on. Calls
/// that touch raw memory take the device handle explicitly; handing in a
/// different device than the recorded one is a caller error, checked only in
/// debug builds.
pub struct DeviceArray<E: Element, D: Device> {
    storage: Storage<D::Buffer<E>>,
    shape: Shape,
    device: usize,
}

impl<E: Element, D: Device> DeviceArray<E, D> {
    /// Allocate a zero-initialized array of `shape` on `dev`.
    pub fn zeros(dev: &D, shape: Shape) -> Result<Self, ComputeError> {
        if shape.ndim() == 0 {
            return Err(ComputeError::EmptyShape);
        }
        let buf = dev.alloc_zeros::<E>(shape.numel())?;
        trace!(device = dev.ordinal(), elements = shape.numel(), "allocated device array");
        Ok(Self { storage: Storage::Owned(buf), shape, device: dev.ordinal() })
    }

    /// Copy a host array into fresh device memory.
    pub fn from_host(dev: &D, host: &HostArray<E>) -> Result<Self, ComputeError> {
        let buf = dev.upload(host.as_slice())?;
        Ok(Self {
            storage: Storage::Owned(buf),
            shape: host.shape().clone(),
            device: dev.ordinal(),
        })
    }

    /// Take ownership of an existing buffer on `dev`. The buffer is released
    /// when the array is dropped.
    pub fn from_buffer(dev: &D, buffer: D::Buffer<E>, shape: Shape) -> Result<Self, ComputeError> {
        Self::check_wrap(&buffer, &shape)?;
        Ok(Self { storage: Storage::Owned(buffer), shape, device: dev.ordinal() })
    }

    /// Wrap externally owned device memory without taking ownership. The
    /// array never releases the buffer; `buffer_mut` fails with
    /// `SharedWrite`.
    pub fn wrap_shared(dev: &D, buffer: Arc<D::Buffer<E>>, shape: Shape) -> Result<Self, ComputeError> {
        Self::check_wrap(&buffer, &shape)?;
        Ok(Self { storage: Storage::Shared(buffer), shape, device: dev.ordinal() })
    }

    fn check_wrap(buffer: &D::Buffer<E>, shape: &Shape) -> Result<(), ComputeError> {
        if shape.ndim() == 0 {
            return Err(ComputeError::EmptyShape);
        }
        if buffer.len() != shape.numel() {
            return Err(ComputeError::BufferSizeMismatch {
                expected: shape.numel(),
                got: buffer.len(),
            });
        }
        Ok(())
    }

    /// Ordinal of the device this array lives on.
    pub fn device(&self) -> usize {
        self.device
    }

    /// Whether this array owns (and will release) its buffer.
    pub fn is_owned(&self) -> bool {
        matches!(self.storage, Storage::Owned(_))
    }

    pub fn buffer(&self) -> &D::Buffer<E> {
        self.storage.get()
    }

    /// Mutable buffer access; fails for shared storage.
    pub fn buffer_mut(&mut self) -> Result<&mut D::Buffer<E>, ComputeError> {
        match &mut self.storage {
            Storage::Owned(b) => Ok(b),
            Storage::Shared(_) => Err(ComputeError::SharedWrite),
        }
    }

    /// Synchronously copy device contents into a new host array.
    pub fn to_host(&self, dev: &D) -> Result<HostArray<E>, ComputeError> {
        debug_assert_eq!(dev.ordinal(), self.device, "array read through wrong device");
        let data = dev.download(self.buffer())?;
        HostArray::from_vec(data, self.shape.clone())
    }

    /// On-device copy into a new owned array.
    pub fn try_clone(&self, dev: &D) -> Result<Self, ComputeError> {
        debug_assert_eq!(dev.ordinal(), self.device, "array read through wrong device");
        let buf = dev.copy_buffer(self.buffer())?;
        Ok(Self { storage: Storage::Owned(buf), shape: self.shape.clone(), device: self.device })
    }

    /// Overwrite every element with zero.
    pub fn fill_zero(&mut self, dev: &D) -> Result<(), ComputeError> {
        debug_assert_eq!(dev.ordinal(), self.device, "array written through wrong device");
        let buf = self.buffer_mut()?;
        dev.fill_zero(buf)
    }

    /// Migrate this array to the device at `ordinal`, staging through the
    /// host. No-op when the array already lives there. A shared array
    /// becomes an owned copy on the target device.
    pub fn set_device(&mut self, pool: &DevicePool<D>, ordinal: usize) -> Result<(), ComputeError> {
        if ordinal == self.device {
            return pool.get(ordinal).map(|_| ());
        }
        let src = pool.get(self.device)?;
        let dst = pool.get(ordinal)?;
        let staged = src.download(self.buffer())?;
        let buf = dst.upload(&staged)?;
        debug!(from = self.device, to = ordinal, elements = staged.len(), "migrated device array");
        self.storage = Storage::Owned(buf);
        self.device = ordinal;
        Ok(())
    }

    /// Axis-reordered copy of this array. `order` must be a bijection over
    /// `[0, rank)`.
    pub fn permute(&self, dev: &D, order: &[usize]) -> Result<Self, ComputeError> {
        let out_shape = self
            .shape
            .permuted(order)
            .ok_or_else(|| ComputeError::InvalidPermutation(order.to_vec()))?;
        let mut out = Self::zeros(dev, out_shape)?;
        self.permute_raw(dev, order, &mut out)?;
        Ok(out)
    }

    /// Axis-reordered copy written into an existing array, whose shape must
    /// equal the permuted shape.
    pub fn permute_into(&self, dev: &D, order: &[usize], out: &mut Self) -> Result<(), ComputeError> {
        let out_shape = self
            .shape
            .permuted(order)
            .ok_or_else(|| ComputeError::InvalidPermutation(order.to_vec()))?;
        if *out.shape() != out_shape {
            return Err(ComputeError::ShapeMismatch {
                expected: out_shape.dims().to_vec(),
                got: out.shape().dims().to_vec(),
            });
        }
        self.permute_raw(dev, order, out)
    }

    fn permute_raw(&self, dev: &D, order: &[usize], out: &mut Self) -> Result<(), ComputeError> {
        debug_assert_eq!(dev.ordinal(), self.device, "array read through wrong device");
        let dims = self.shape.dims().to_vec();
        dev.permute(self.buffer(), &dims, order, out.buffer_mut()?)
    }

    /// Cyclic axis rotation: axis `k` of the result is axis
    /// `(k + shift) mod rank` of this array.
    pub fn shift_dim(&self, dev: &D, shift: isize) -> Result<Self, ComputeError> {
        let ndim = self.rank() as isize;
        let order: Vec<usize> = (0..ndim).map(|k| (k + shift).rem_euclid(ndim) as usize).collect();
        self.permute(dev, &order)
    }
}

impl<E: Element, D: Device> Shaped for DeviceArray<E, D> {
    fn shape(&self) -> &Shape {
        &self.shape
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cpu::CpuDevice;
    use num_complex::Complex32;

    fn iota(n: usize) -> Vec<f32> {
        (0..n).map(|i| i as f32).collect()
    }

    #[test]
    fn host_roundtrip_is_exact() {
        let dev = CpuDevice::new();
        let host = HostArray::from_vec(iota(24), Shape::from_slice(&[2, 3, 4])).unwrap();
        let arr = DeviceArray::from_host(&dev, &host).unwrap();
        let back = arr.to_host(&dev).unwrap();
        assert_eq!(back, host);
    }

    #[test]
    fn zeros_is_zero_filled() {
        let dev = CpuDevice::new();
        let arr = DeviceArray::<Complex32, _>::zeros(&dev, Shape::from_slice(&[4, 4])).unwrap();
        assert_eq!(arr.numel(), 16);
        let host = arr.to_host(&dev).unwrap();
        assert!(host.as_slice().iter().all(|v| v.norm() == 0.0));
    }

    #[test]
    fn empty_shape_is_rejected() {
        let dev = CpuDevice::new();
        let r = DeviceArray::<f32, _>::zeros(&dev, Shape::from_slice(&[]));
        assert!(matches!(r, Err(ComputeError::EmptyShape)));
    }

    #[test]
    fn from_buffer_checks_capacity() {
        let dev = CpuDevice::new();
        let buf = dev.upload(&iota(6)).unwrap();
        let r = DeviceArray::from_buffer(&dev, buf, Shape::from_slice(&[2, 4]));
        assert!(matches!(r, Err(ComputeError::BufferSizeMismatch { expected: 8, got: 6 })));
    }

    #[test]
    fn shared_wrap_refuses_writes_and_never_owns() {
        let dev = CpuDevice::new();
        let buf = Arc::new(dev.upload(&iota(4)).unwrap());
        let mut arr =
            DeviceArray::wrap_shared(&dev, Arc::clone(&buf), Shape::from_slice(&[4])).unwrap();
        assert!(!arr.is_owned());
        assert!(matches!(arr.buffer_mut(), Err(ComputeError::SharedWrite)));
        drop(arr);
        // External owner still holds the buffer.
        assert_eq!(Arc::strong_count(&buf), 1);
        assert_eq!(dev.download(&buf).unwrap(), iota(4));
    }

    #[test]
    fn permute_then_inverse_restores_layout() {
        let dev = CpuDevice::new();
        let host = HostArray::from_vec(iota(24), Shape::from_slice(&[2, 3, 4])).unwrap();
        let arr = DeviceArray::from_host(&dev, &host).unwrap();

        let p = arr.permute(&dev, &[2, 0, 1]).unwrap();
        assert_eq!(p.shape().dims(), &[4, 2, 3]);

        // inverse of [2, 0, 1] is [1, 2, 0]
        let back = p.permute(&dev, &[1, 2, 0]).unwrap();
        assert_eq!(back.to_host(&dev).unwrap(), host);
    }

    #[test]
    fn permute_rejects_invalid_order() {
        let dev = CpuDevice::new();
        let arr = DeviceArray::<f32, _>::zeros(&dev, Shape::from_slice(&[2, 3])).unwrap();
        assert!(matches!(
            arr.permute(&dev, &[0, 0]),
            Err(ComputeError::InvalidPermutation(_))
        ));
        assert!(matches!(
            arr.permute(&dev, &[0]),
            Err(ComputeError::InvalidPermutation(_))
        ));
    }

    #[test]
    fn permute_into_checks_output_shape() {
        let dev = CpuDevice::new();
        let arr = DeviceArray::<f32, _>::zeros(&dev, Shape::from_slice(&[2, 3])).unwrap();
        let mut wrong = DeviceArray::<f32, _>::zeros(&dev, Shape::from_slice(&[2, 3])).unwrap();
        assert!(matches!(
            arr.permute_into(&dev, &[1, 0], &mut wrong),
            Err(ComputeError::ShapeMismatch { .. })
        ));

        let mut right = DeviceArray::<f32, _>::zeros(&dev, Shape::from_slice(&[3, 2])).unwrap();
        arr.permute_into(&dev, &[1, 0], &mut right).unwrap();
    }

    #[test]
    fn shift_dim_rotates_axes() {
        let dev = CpuDevice::new();
        let arr = DeviceArray::<f32, _>::zeros(&dev, Shape::from_slice(&[2, 3, 4])).unwrap();
        let s = arr.shift_dim(&dev, 1).unwrap();
        assert_eq!(s.shape().dims(), &[3, 4, 2]);
        let s = arr.shift_dim(&dev, -1).unwrap();
        assert_eq!(s.shape().dims(), &[4, 2, 3]);
    }

    #[test]
    fn set_device_migrates_contents() {
        let pool = DevicePool::host(2);
        let dev0 = pool.get(0).unwrap();
        let host = HostArray::from_vec(iota(6), Shape::from_slice(&[2, 3])).unwrap();
        let mut arr = DeviceArray::from_host(dev0, &host).unwrap();

        arr.set_device(&pool, 1).unwrap();
        assert_eq!(arr.device(), 1);
        let back = arr.to_host(pool.get(1).unwrap()).unwrap();
        assert_eq!(back, host);
    }

    #[test]
    fn set_device_rejects_out_of_range_ordinal() {
        let pool = DevicePool::host(2);
        let dev0 = pool.get(0).unwrap();
        let mut arr = DeviceArray::<f32, _>::zeros(dev0, Shape::from_slice(&[4])).unwrap();
        assert!(matches!(
            arr.set_device(&pool, 5),
            Err(ComputeError::InvalidDevice { device: 5, count: 2 })
        ));
        assert_eq!(arr.device(), 0);
    }
}
