//! Element types storable in device buffers.
//!
//! The set is closed: real samples (f32/f64), complex k-space samples
//! (Complex32/Complex64), and unsigned sampling indices (u32). Backends that
//! must name a concrete device-side type dispatch on [`ElementKind`].

use core::fmt::Debug;
use core::ops::{Add, Mul};

use num_complex::{Complex32, Complex64};
use num_traits::Zero;

/// Discriminant for the supported element kinds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ElementKind {
    Real32,
    Real64,
    Complex32,
    Complex64,
    Index32,
}

impl ElementKind {
    /// Whether values of this kind carry an imaginary component.
    pub fn is_complex(self) -> bool {
        matches!(self, ElementKind::Complex32 | ElementKind::Complex64)
    }
}

/// An element a device buffer can hold.
pub trait Element:
    Copy + Send + Sync + Debug + PartialEq + Zero + Mul<Output = Self> + 'static
{
    const KIND: ElementKind;

    /// Complex conjugate; identity for real and index elements.
    fn conj(self) -> Self;
}

impl Element for f32 {
    const KIND: ElementKind = ElementKind::Real32;

    fn conj(self) -> Self {
        self
    }
}

impl Element for f64 {
    const KIND: ElementKind = ElementKind::Real64;

    fn conj(self) -> Self {
        self
    }
}

impl Element for Complex32 {
    const KIND: ElementKind = ElementKind::Complex32;

    fn conj(self) -> Self {
        Complex32::conj(&self)
    }
}

impl Element for Complex64 {
    const KIND: ElementKind = ElementKind::Complex64;

    fn conj(self) -> Self {
        Complex64::conj(&self)
    }
}

impl Element for u32 {
    const KIND: ElementKind = ElementKind::Index32;

    fn conj(self) -> Self {
        self
    }
}
