//! The linear-operator contract iterative solvers evaluate against.

use larmor_compute::{Device, DeviceArray, Element, Shape};

use crate::error::OperatorError;

/// A linear operator with fixed domain and codomain shapes.
///
/// `mult_m` is the forward (encoding) evaluation, `mult_mh` the adjoint
/// (decoding) evaluation with the shape roles reversed. Both overwrite the
/// output unless `accumulate` is set, in which case the result is added onto
/// the existing contents; a solver composes operators by summing into a
/// shared output buffer. Evaluation never mutates operator state, so a
/// configured operator may be evaluated any number of times; concurrent
/// evaluation from several threads requires independent instances obtained
/// through [`clone_operator`](LinearOperator::clone_operator).
pub trait LinearOperator<E: Element, D: Device> {
    /// Expected input shape of `mult_m`, `None` while unconfigured.
    fn domain(&self) -> Option<&Shape>;

    /// Expected output shape of `mult_m`, `None` while unconfigured.
    fn codomain(&self) -> Option<&Shape>;

    fn set_domain(&mut self, shape: Shape);

    fn set_codomain(&mut self, shape: Shape);

    /// Forward evaluation: encode `input` (domain shape) into `output`
    /// (codomain shape).
    fn mult_m(
        &self,
        dev: &D,
        input: &DeviceArray<E, D>,
        output: &mut DeviceArray<E, D>,
        accumulate: bool,
    ) -> Result<(), OperatorError>;

    /// Adjoint evaluation: decode `input` (codomain shape) into `output`
    /// (domain shape).
    fn mult_mh(
        &self,
        dev: &D,
        input: &DeviceArray<E, D>,
        output: &mut DeviceArray<E, D>,
        accumulate: bool,
    ) -> Result<(), OperatorError>;

    /// Duplicate this operator with its full configuration, so a solver can
    /// run independent evaluation contexts without reconfiguring.
    fn clone_operator(&self) -> Box<dyn LinearOperator<E, D> + Send>;
}

pub(crate) fn check_shape(expected: &Shape, got: &Shape) -> Result<(), OperatorError> {
    if expected != got {
        return Err(OperatorError::ShapeMismatch {
            expected: expected.dims().to_vec(),
            got: got.dims().to_vec(),
        });
    }
    Ok(())
}

pub(crate) fn check_device<E: Element, D: Device>(
    dev: &D,
    arr: &DeviceArray<E, D>,
) -> Result<(), OperatorError> {
    if arr.device() != dev.ordinal() {
        return Err(OperatorError::DeviceMismatch {
            expected: dev.ordinal(),
            got: arr.device(),
        });
    }
    Ok(())
}
