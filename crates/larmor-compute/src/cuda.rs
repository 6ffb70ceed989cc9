//! CUDA backend via cudarc.
//!
//! Buffers are raw device byte ranges tagged with their element type; kernels
//! are rendered from the templates in [`crate::kernels`], NVRTC-compiled, and
//! cached per device. Element counts are limited to `u32` range, matching the
//! kernel index type.

use std::collections::hash_map::DefaultHasher;
use std::collections::HashMap;
use std::hash::{Hash, Hasher};
use std::marker::PhantomData;
use std::sync::{Arc, Mutex};

use cudarc::driver::{CudaDevice as CudaDeviceInner, CudaSlice, LaunchAsync, LaunchConfig};
use cudarc::nvrtc;

use crate::device::{Device, DeviceBuffer, DevicePool};
use crate::element::{Element, ElementKind};
use crate::error::ComputeError;
use crate::kernels::{index_cuda, permute_cuda, weight_cuda};
use crate::shape::Shape;

/// CUDA buffer: a device byte range holding `len` elements of `E`.
pub struct CudaBuffer<E: Element> {
    data: CudaSlice<u8>,
    len: usize,
    _marker: PhantomData<E>,
}

impl<E: Element> DeviceBuffer<E> for CudaBuffer<E> {
    fn len(&self) -> usize {
        self.len
    }
}

/// One CUDA device of a pool.
pub struct CudaDevice {
    device: Arc<CudaDeviceInner>,
    ordinal: usize,
    module_cache: Mutex<HashMap<u64, String>>, // source hash → module name
}

/// Device-side type names for an element kind: `(element, real_component)`.
fn cuda_type(kind: ElementKind) -> (&'static str, &'static str) {
    match kind {
        ElementKind::Real32 => ("float", "float"),
        ElementKind::Real64 => ("double", "double"),
        ElementKind::Complex32 => ("float2", "float"),
        ElementKind::Complex64 => ("double2", "double"),
        ElementKind::Index32 => ("unsigned int", "unsigned int"),
    }
}

fn launch_cfg(n: usize) -> LaunchConfig {
    LaunchConfig {
        block_dim: (256, 1, 1),
        grid_dim: (((n as u32) + 255) / 256, 1, 1),
        shared_mem_bytes: 0,
    }
}

impl CudaDevice {
    /// Bind the CUDA device at `ordinal`.
    pub fn new(ordinal: usize) -> Result<Self, ComputeError> {
        let device = CudaDeviceInner::new(ordinal)?;
        Ok(Self { device, ordinal, module_cache: Mutex::new(HashMap::new()) })
    }

    /// Number of CUDA devices visible to the driver.
    pub fn count() -> Result<usize, ComputeError> {
        Ok(CudaDeviceInner::count()? as usize)
    }

    /// Render a kernel template for an element kind.
    fn render(template: &str, kind: ElementKind) -> String {
        let (t, r) = cuda_type(kind);
        template.replace("$T$", t).replace("$R$", r)
    }

    /// Compile and load a rendered kernel, returning the module name.
    fn get_module(&self, source: &str, fn_name: &str) -> Result<String, ComputeError> {
        let mut hasher = DefaultHasher::new();
        source.hash(&mut hasher);
        let hash = hasher.finish();

        let mut cache = self.module_cache.lock().expect("module cache poisoned");
        if let Some(name) = cache.get(&hash) {
            return Ok(name.clone());
        }

        let module_name = format!("m{hash:x}");
        let ptx = nvrtc::compile_ptx(source).map_err(|e| ComputeError::Backend(e.to_string()))?;
        self.device.load_ptx(ptx, &module_name, &[fn_name])?;
        cache.insert(hash, module_name.clone());
        Ok(module_name)
    }

    fn get_func(
        &self,
        template: &str,
        fn_name: &str,
        kind: ElementKind,
    ) -> Result<cudarc::driver::CudaFunction, ComputeError> {
        let source = Self::render(template, kind);
        let module = self.get_module(&source, fn_name)?;
        self.device
            .get_func(&module, fn_name)
            .ok_or_else(|| ComputeError::Backend(format!("kernel {fn_name} missing from module")))
    }

    fn upload_bytes<E: Element>(&self, data: &[E]) -> Result<CudaSlice<u8>, ComputeError> {
        let bytes = unsafe {
            std::slice::from_raw_parts(data.as_ptr() as *const u8, std::mem::size_of_val(data))
        };
        self.device
            .htod_sync_copy(bytes)
            .map_err(|e| ComputeError::TransferFailed(e.to_string()))
    }
}

impl Device for CudaDevice {
    type Buffer<E: Element> = CudaBuffer<E>;

    fn ordinal(&self) -> usize {
        self.ordinal
    }

    fn alloc_zeros<E: Element>(&self, len: usize) -> Result<CudaBuffer<E>, ComputeError> {
        let data = self
            .device
            .alloc_zeros::<u8>(len * std::mem::size_of::<E>())
            .map_err(|_| ComputeError::AllocationFailed { device: self.ordinal, elements: len })?;
        Ok(CudaBuffer { data, len, _marker: PhantomData })
    }

    fn upload<E: Element>(&self, src: &[E]) -> Result<CudaBuffer<E>, ComputeError> {
        let data = self.upload_bytes(src)?;
        Ok(CudaBuffer { data, len: src.len(), _marker: PhantomData })
    }

    fn download<E: Element>(&self, buf: &CudaBuffer<E>) -> Result<Vec<E>, ComputeError> {
        let bytes = self
            .device
            .dtoh_sync_copy(&buf.data)
            .map_err(|e| ComputeError::TransferFailed(e.to_string()))?;
        let mut out: Vec<E> = Vec::with_capacity(buf.len);
        unsafe {
            std::ptr::copy_nonoverlapping(bytes.as_ptr(), out.as_mut_ptr() as *mut u8, bytes.len());
            out.set_len(buf.len);
        }
        Ok(out)
    }

    fn copy_buffer<E: Element>(&self, src: &CudaBuffer<E>) -> Result<CudaBuffer<E>, ComputeError> {
        // Host round-trip; device-to-device copy is not worth a kernel here.
        let staged = self.download(src)?;
        self.upload(&staged)
    }

    fn fill_zero<E: Element>(&self, buf: &mut CudaBuffer<E>) -> Result<(), ComputeError> {
        buf.data = self.device.alloc_zeros::<u8>(buf.len * std::mem::size_of::<E>())?;
        Ok(())
    }

    fn weight_slice<E: Element>(
        &self,
        input: &CudaBuffer<E>,
        input_offset: usize,
        weight: &CudaBuffer<E>,
        weight_offset: usize,
        output: &mut CudaBuffer<E>,
        output_offset: usize,
        len: usize,
        conjugate: bool,
        accumulate: bool,
    ) -> Result<(), ComputeError> {
        if E::KIND.is_complex() {
            let func = self.get_func(weight_cuda::WEIGHT_COMPLEX_CUDA, "weight_complex", E::KIND)?;
            unsafe {
                func.launch(
                    launch_cfg(len),
                    (
                        &input.data,
                        input_offset as u32,
                        &weight.data,
                        weight_offset as u32,
                        &output.data,
                        output_offset as u32,
                        len as u32,
                        conjugate as i32,
                        accumulate as i32,
                    ),
                )?;
            }
        } else {
            let func = self.get_func(weight_cuda::WEIGHT_REAL_CUDA, "weight_real", E::KIND)?;
            unsafe {
                func.launch(
                    launch_cfg(len),
                    (
                        &input.data,
                        input_offset as u32,
                        &weight.data,
                        weight_offset as u32,
                        &output.data,
                        output_offset as u32,
                        len as u32,
                        accumulate as i32,
                    ),
                )?;
            }
        }
        self.device.synchronize()?;
        Ok(())
    }

    fn gather<E: Element>(
        &self,
        input: &CudaBuffer<E>,
        input_offset: usize,
        indices: &CudaBuffer<u32>,
        output: &mut CudaBuffer<E>,
        output_offset: usize,
        accumulate: bool,
    ) -> Result<(), ComputeError> {
        let (template, name) = if E::KIND.is_complex() {
            (index_cuda::GATHER_COMPLEX_CUDA, "gather_complex")
        } else {
            (index_cuda::GATHER_REAL_CUDA, "gather_real")
        };
        let func = self.get_func(template, name, E::KIND)?;
        unsafe {
            func.launch(
                launch_cfg(indices.len),
                (
                    &input.data,
                    input_offset as u32,
                    &indices.data,
                    &output.data,
                    output_offset as u32,
                    indices.len as u32,
                    accumulate as i32,
                ),
            )?;
        }
        self.device.synchronize()?;
        Ok(())
    }

    fn scatter<E: Element>(
        &self,
        input: &CudaBuffer<E>,
        input_offset: usize,
        indices: &CudaBuffer<u32>,
        output: &mut CudaBuffer<E>,
        output_offset: usize,
        accumulate: bool,
    ) -> Result<(), ComputeError> {
        let (template, name) = if E::KIND.is_complex() {
            (index_cuda::SCATTER_COMPLEX_CUDA, "scatter_complex")
        } else {
            (index_cuda::SCATTER_REAL_CUDA, "scatter_real")
        };
        let func = self.get_func(template, name, E::KIND)?;
        unsafe {
            func.launch(
                launch_cfg(indices.len),
                (
                    &input.data,
                    input_offset as u32,
                    &indices.data,
                    &output.data,
                    output_offset as u32,
                    indices.len as u32,
                    accumulate as i32,
                ),
            )?;
        }
        self.device.synchronize()?;
        Ok(())
    }

    fn permute<E: Element>(
        &self,
        input: &CudaBuffer<E>,
        dims: &[usize],
        order: &[usize],
        output: &mut CudaBuffer<E>,
    ) -> Result<(), ComputeError> {
        let shape = Shape::from_slice(dims);
        let out_dims: Vec<usize> = order.iter().map(|&a| dims[a]).collect();

        let to_u32 = |v: &[usize]| v.iter().map(|&x| x as u32).collect::<Vec<u32>>();
        let dims_dev = self.device.htod_sync_copy(&to_u32(dims))?;
        let in_strides_dev = self.device.htod_sync_copy(&to_u32(&shape.contiguous_strides()))?;
        let out_strides_dev = self
            .device
            .htod_sync_copy(&to_u32(&Shape::from_slice(&out_dims).contiguous_strides()))?;
        let order_dev = self.device.htod_sync_copy(&to_u32(order))?;

        let func = self.get_func(permute_cuda::PERMUTE_CUDA, "permute_nd", E::KIND)?;
        unsafe {
            func.launch(
                launch_cfg(input.len),
                (
                    &input.data,
                    &output.data,
                    &dims_dev,
                    &in_strides_dev,
                    &out_strides_dev,
                    &order_dev,
                    dims.len() as u32,
                    input.len as u32,
                ),
            )?;
        }
        self.device.synchronize()?;
        Ok(())
    }

    fn sync(&self) -> Result<(), ComputeError> {
        Ok(self.device.synchronize()?)
    }
}

impl DevicePool<CudaDevice> {
    /// A pool holding every CUDA device the driver reports.
    pub fn cuda() -> Result<Self, ComputeError> {
        let count = CudaDevice::count()?;
        let devices = (0..count).map(CudaDevice::new).collect::<Result<Vec<_>, _>>()?;
        Ok(Self::new(devices))
    }
}
