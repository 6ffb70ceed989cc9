//! Coil-sensitivity encoding.

use std::sync::Arc;

use tracing::debug;

use larmor_compute::{Device, DeviceArray, Element, Shape, Shaped};

use crate::error::OperatorError;
use crate::operator::{check_device, check_shape, LinearOperator};

fn with_coil_axis(spatial: &Shape, ncoils: usize) -> Shape {
    let mut dims = spatial.dims().to_vec();
    dims.push(ncoils);
    Shape::new(dims)
}

/// Sensitivity encoding operator.
///
/// Forward: weight the image by each coil's complex sensitivity map into the
/// corresponding coil slice of the output. Adjoint: conjugate-weight each
/// coil slice and sum across coils (coil combination). The maps are one
/// array with a trailing coil axis, shared and read-only; the operator holds
/// a non-owning reference.
pub struct SenseOperator<E: Element, D: Device> {
    domain: Option<Shape>,
    codomain: Option<Shape>,
    maps: Option<Arc<DeviceArray<E, D>>>,
    ncoils: usize,
}

impl<E: Element, D: Device> SenseOperator<E, D> {
    pub fn new() -> Self {
        Self { domain: None, codomain: None, maps: None, ncoils: 0 }
    }

    /// Store a shared reference to the per-coil sensitivity maps, shaped
    /// `[spatial…, coils]`. Derives the domain (spatial shape), the coil
    /// count, and the codomain `[spatial…, coils]`.
    pub fn set_sensitivity_maps(&mut self, maps: Arc<DeviceArray<E, D>>) -> Result<(), OperatorError> {
        if maps.rank() < 2 {
            return Err(OperatorError::InvalidArgument(
                "sensitivity maps need a trailing coil axis".into(),
            ));
        }
        let dims = maps.shape().dims();
        let ncoils = dims[dims.len() - 1];
        if ncoils == 0 {
            return Err(OperatorError::InvalidArgument("coil count must be nonzero".into()));
        }
        let spatial = Shape::from_slice(&dims[..dims.len() - 1]);
        debug!(coils = ncoils, spatial = ?spatial.dims(), "configured sensitivity maps");

        self.ncoils = ncoils;
        self.codomain = Some(with_coil_axis(&spatial, ncoils));
        self.domain = Some(spatial);
        self.maps = Some(maps);
        Ok(())
    }

    pub fn num_coils(&self) -> usize {
        self.ncoils
    }

    pub(crate) fn domain_ref(&self) -> Result<&Shape, OperatorError> {
        self.domain.as_ref().ok_or(OperatorError::NotConfigured("a domain shape"))
    }

    pub(crate) fn codomain_ref(&self) -> Result<&Shape, OperatorError> {
        self.codomain.as_ref().ok_or(OperatorError::NotConfigured("a codomain shape"))
    }

    pub(crate) fn maps_ref(&self) -> Result<&DeviceArray<E, D>, OperatorError> {
        self.maps.as_deref().ok_or(OperatorError::NotConfigured("sensitivity maps"))
    }

    /// Common evaluation checks: configuration present, maps consistent with
    /// the domain, arrays shaped as `in_shape`/`out_shape`, and everything on
    /// the evaluation device.
    pub(crate) fn validate_eval(
        &self,
        dev: &D,
        input: &DeviceArray<E, D>,
        output: &DeviceArray<E, D>,
        in_shape: &Shape,
        out_shape: &Shape,
    ) -> Result<(), OperatorError> {
        let maps = self.maps_ref()?;
        let domain = self.domain_ref()?;
        if maps.numel() != domain.numel() * self.ncoils {
            return Err(OperatorError::ShapeMismatch {
                expected: with_coil_axis(domain, self.ncoils).dims().to_vec(),
                got: maps.shape().dims().to_vec(),
            });
        }
        check_shape(in_shape, input.shape())?;
        check_shape(out_shape, output.shape())?;
        check_device(dev, maps)?;
        check_device(dev, input)?;
        check_device(dev, output)?;
        Ok(())
    }

    /// Per-coil weighting of a dense image buffer into per-coil slices:
    /// `out[c] (+)= in * csm_c`.
    pub(crate) fn weight_forward(
        &self,
        dev: &D,
        input: &D::Buffer<E>,
        output: &mut D::Buffer<E>,
        accumulate: bool,
    ) -> Result<(), OperatorError> {
        let maps = self.maps_ref()?;
        let npix = self.domain_ref()?.numel();
        for c in 0..self.ncoils {
            dev.weight_slice(input, 0, maps.buffer(), c * npix, output, c * npix, npix, false, accumulate)?;
        }
        Ok(())
    }

    /// Conjugate-weighted coil combination of per-coil slices into a dense
    /// image buffer: `out (+)= Σ_c conj(csm_c) * in[c]`.
    pub(crate) fn weight_adjoint(
        &self,
        dev: &D,
        input: &D::Buffer<E>,
        output: &mut D::Buffer<E>,
        accumulate: bool,
    ) -> Result<(), OperatorError> {
        let maps = self.maps_ref()?;
        let npix = self.domain_ref()?.numel();
        if !accumulate {
            dev.fill_zero(output)?;
        }
        for c in 0..self.ncoils {
            dev.weight_slice(input, c * npix, maps.buffer(), c * npix, output, 0, npix, true, true)?;
        }
        Ok(())
    }
}

impl<E: Element, D: Device> Default for SenseOperator<E, D> {
    fn default() -> Self {
        Self::new()
    }
}

impl<E: Element, D: Device> Clone for SenseOperator<E, D> {
    fn clone(&self) -> Self {
        Self {
            domain: self.domain.clone(),
            codomain: self.codomain.clone(),
            maps: self.maps.clone(),
            ncoils: self.ncoils,
        }
    }
}

impl<E: Element, D: Device> LinearOperator<E, D> for SenseOperator<E, D> {
    fn domain(&self) -> Option<&Shape> {
        self.domain.as_ref()
    }

    fn codomain(&self) -> Option<&Shape> {
        self.codomain.as_ref()
    }

    fn set_domain(&mut self, shape: Shape) {
        if self.ncoils > 0 {
            self.codomain = Some(with_coil_axis(&shape, self.ncoils));
        }
        self.domain = Some(shape);
    }

    fn set_codomain(&mut self, shape: Shape) {
        self.codomain = Some(shape);
    }

    fn mult_m(
        &self,
        dev: &D,
        input: &DeviceArray<E, D>,
        output: &mut DeviceArray<E, D>,
        accumulate: bool,
    ) -> Result<(), OperatorError> {
        self.validate_eval(dev, input, output, self.domain_ref()?, self.codomain_ref()?)?;
        self.weight_forward(dev, input.buffer(), output.buffer_mut()?, accumulate)
    }

    fn mult_mh(
        &self,
        dev: &D,
        input: &DeviceArray<E, D>,
        output: &mut DeviceArray<E, D>,
        accumulate: bool,
    ) -> Result<(), OperatorError> {
        self.validate_eval(dev, input, output, self.codomain_ref()?, self.domain_ref()?)?;
        self.weight_adjoint(dev, input.buffer(), output.buffer_mut()?, accumulate)
    }

    fn clone_operator(&self) -> Box<dyn LinearOperator<E, D> + Send> {
        Box::new(self.clone())
    }
}
