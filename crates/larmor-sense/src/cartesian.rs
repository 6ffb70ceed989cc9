//! Cartesian-grid subsampled sensitivity encoding.

use std::sync::Arc;

use tracing::debug;

use larmor_compute::{Device, DeviceArray, Element, Shape, Shaped};

use crate::error::OperatorError;
use crate::operator::{check_device, LinearOperator};
use crate::sense::SenseOperator;

/// Sensitivity encoding restricted to a Cartesian sampling pattern.
///
/// An explicit index set names the retained k-space grid positions per coil,
/// so the codomain shrinks to `[samples, coils]`. Forward evaluation weights
/// the image per coil and gathers the retained positions; adjoint evaluation
/// scatters samples back to their grid positions (skipped positions
/// contribute zero) and coil-combines with conjugate weighting.
pub struct CartesianSenseOperator<E: Element, D: Device> {
    sense: SenseOperator<E, D>,
    indices: Option<Arc<DeviceArray<u32, D>>>,
    /// Largest stored index, re-checked whenever the domain changes.
    max_index: usize,
}

impl<E: Element, D: Device> CartesianSenseOperator<E, D> {
    pub fn new() -> Self {
        Self { sense: SenseOperator::new(), indices: None, max_index: 0 }
    }

    pub fn num_coils(&self) -> usize {
        self.sense.num_coils()
    }

    pub fn sampling_indices(&self) -> Option<&Arc<DeviceArray<u32, D>>> {
        self.indices.as_ref()
    }

    /// Store the sensitivity maps (see
    /// [`SenseOperator::set_sensitivity_maps`]) and re-derive the sampled
    /// codomain from any configured index set. Fails without touching the
    /// configuration when a stored index set does not fit the new maps.
    pub fn set_sensitivity_maps(&mut self, maps: Arc<DeviceArray<E, D>>) -> Result<(), OperatorError> {
        if self.indices.is_some() && maps.rank() >= 2 {
            let npix: usize = maps.shape().dims()[..maps.rank() - 1].iter().product();
            check_index_bound(self.max_index, npix)?;
        }
        self.sense.set_sensitivity_maps(maps)?;
        self.refresh_codomain();
        Ok(())
    }

    /// Store the sampling index set and set the codomain to
    /// `[samples, coils]`. An empty index set is a no-op: the configuration
    /// is left unchanged. Indices are validated against the per-coil
    /// image-space element count when the domain is already configured.
    pub fn set_sampling_indices(
        &mut self,
        dev: &D,
        indices: Arc<DeviceArray<u32, D>>,
    ) -> Result<(), OperatorError> {
        if indices.numel() == 0 {
            return Ok(());
        }
        let staged = indices.to_host(dev)?;
        let max = staged.as_slice().iter().copied().max().unwrap_or(0) as usize;
        if let Some(domain) = self.sense.domain() {
            check_index_bound(max, domain.numel())?;
        }

        debug!(samples = indices.numel(), "configured sampling index set");
        self.max_index = max;
        self.indices = Some(indices);
        self.refresh_codomain();
        Ok(())
    }

    /// Sampled codomain `[samples, coils]`, once both sides are known.
    fn refresh_codomain(&mut self) {
        if let Some(indices) = &self.indices {
            if self.sense.num_coils() > 0 {
                self.sense
                    .set_codomain(Shape::from_slice(&[indices.numel(), self.sense.num_coils()]));
            }
        }
    }

    fn indices_ref(&self) -> Result<&DeviceArray<u32, D>, OperatorError> {
        self.indices.as_deref().ok_or(OperatorError::NotConfigured("sampling indices"))
    }
}

/// Indices must address per-coil image-space elements.
fn check_index_bound(max_index: usize, npix: usize) -> Result<(), OperatorError> {
    if max_index >= npix {
        return Err(OperatorError::InvalidArgument(format!(
            "sampling index {max_index} out of range for {npix} image-space elements"
        )));
    }
    Ok(())
}

impl<E: Element, D: Device> Default for CartesianSenseOperator<E, D> {
    fn default() -> Self {
        Self::new()
    }
}

impl<E: Element, D: Device> Clone for CartesianSenseOperator<E, D> {
    fn clone(&self) -> Self {
        Self {
            sense: self.sense.clone(),
            indices: self.indices.clone(),
            max_index: self.max_index,
        }
    }
}

impl<E: Element, D: Device> LinearOperator<E, D> for CartesianSenseOperator<E, D> {
    fn domain(&self) -> Option<&Shape> {
        self.sense.domain()
    }

    fn codomain(&self) -> Option<&Shape> {
        self.sense.codomain()
    }

    fn set_domain(&mut self, shape: Shape) {
        self.sense.set_domain(shape);
        self.refresh_codomain();
    }

    fn set_codomain(&mut self, shape: Shape) {
        self.sense.set_codomain(shape);
    }

    fn mult_m(
        &self,
        dev: &D,
        input: &DeviceArray<E, D>,
        output: &mut DeviceArray<E, D>,
        accumulate: bool,
    ) -> Result<(), OperatorError> {
        let indices = self.indices_ref()?;
        self.sense
            .validate_eval(dev, input, output, self.sense.domain_ref()?, self.sense.codomain_ref()?)?;
        check_device(dev, indices)?;

        let npix = self.sense.domain_ref()?.numel();
        check_index_bound(self.max_index, npix)?;
        let ncoils = self.sense.num_coils();
        let nsamp = indices.numel();

        let mut coil_images = dev.alloc_zeros::<E>(npix * ncoils)?;
        self.sense.weight_forward(dev, input.buffer(), &mut coil_images, false)?;

        let out = output.buffer_mut()?;
        for c in 0..ncoils {
            dev.gather(&coil_images, c * npix, indices.buffer(), out, c * nsamp, accumulate)?;
        }
        Ok(())
    }

    fn mult_mh(
        &self,
        dev: &D,
        input: &DeviceArray<E, D>,
        output: &mut DeviceArray<E, D>,
        accumulate: bool,
    ) -> Result<(), OperatorError> {
        let indices = self.indices_ref()?;
        self.sense
            .validate_eval(dev, input, output, self.sense.codomain_ref()?, self.sense.domain_ref()?)?;
        check_device(dev, indices)?;

        let npix = self.sense.domain_ref()?.numel();
        check_index_bound(self.max_index, npix)?;
        let ncoils = self.sense.num_coils();
        let nsamp = indices.numel();

        // Skipped grid positions stay zero in the scattered coil images.
        let mut coil_images = dev.alloc_zeros::<E>(npix * ncoils)?;
        for c in 0..ncoils {
            dev.scatter(input.buffer(), c * nsamp, indices.buffer(), &mut coil_images, c * npix, false)?;
        }

        self.sense.weight_adjoint(dev, &coil_images, output.buffer_mut()?, accumulate)
    }

    fn clone_operator(&self) -> Box<dyn LinearOperator<E, D> + Send> {
        Box::new(self.clone())
    }
}
