//! Shared numeric kernels backing the statistical and financial functions
//!
//! Every kernel is a pure function over `f64` with an explicit tolerance
//! and iteration cap; non-convergence and out-of-domain arguments are
//! reported as errors, never by looping or returning NaN. The function
//! library maps [`KernelError`] onto `#NUM!`.

pub mod gamma;
pub mod matrix;
pub mod regress;
pub mod roots;

#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum KernelError {
    #[error("argument out of domain")]
    Domain,
    #[error("no convergence within {0} iterations")]
    NoConvergence(usize),
}

pub type KernelResult = std::result::Result<f64, KernelError>;
