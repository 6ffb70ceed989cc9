//! Host-resident staging array.

use crate::element::Element;
use crate::error::ComputeError;
use crate::shape::{Shape, Shaped};

/// CPU-resident n-dimensional array used for host↔device staging.
#[derive(Debug, Clone, PartialEq)]
pub struct HostArray<E: Element> {
    data: Vec<E>,
    shape: Shape,
}

impl<E: Element> HostArray<E> {
    /// Zero-filled host array.
    pub fn zeros(shape: Shape) -> Result<Self, ComputeError> {
        if shape.ndim() == 0 {
            return Err(ComputeError::EmptyShape);
        }
        Ok(Self { data: vec![E::zero(); shape.numel()], shape })
    }

    /// Wrap row-major data; the length must match the shape's element count.
    pub fn from_vec(data: Vec<E>, shape: Shape) -> Result<Self, ComputeError> {
        if shape.ndim() == 0 {
            return Err(ComputeError::EmptyShape);
        }
        if data.len() != shape.numel() {
            return Err(ComputeError::BufferSizeMismatch {
                expected: shape.numel(),
                got: data.len(),
            });
        }
        Ok(Self { data, shape })
    }

    pub fn as_slice(&self) -> &[E] {
        &self.data
    }

    pub fn as_mut_slice(&mut self) -> &mut [E] {
        &mut self.data
    }

    pub fn into_vec(self) -> Vec<E> {
        self.data
    }
}

impl<E: Element> Shaped for HostArray<E> {
    fn shape(&self) -> &Shape {
        &self.shape
    }
}
