//! larmor-sense — Coil-sensitivity encoding operators for iterative MR
//! reconstruction.
//!
//! Exposes the [`LinearOperator`] contract an external solver composes into
//! convergence loops, plus two implementations: [`SenseOperator`]
//! (sensitivity weighting / coil combination) and
//! [`CartesianSenseOperator`] (the same, restricted to a Cartesian sampling
//! pattern through an explicit index set). Operators are pure evaluation
//! logic over `larmor-compute` device arrays; no iteration lives here.

pub mod cartesian;
pub mod error;
pub mod operator;
pub mod sense;

pub use cartesian::CartesianSenseOperator;
pub use error::OperatorError;
pub use operator::LinearOperator;
pub use sense::SenseOperator;
