//! Adapter exposing a [`LogLikelihood`] as an Argmin minimization problem.
//!
//! Argmin minimizes, so the cost is `c(θ) = -ℓ(θ)`. A user gradient of `ℓ`
//! is negated; without one, the cost is differentiated numerically through
//! [`fd_gradient`], which already carries the sign.
use crate::optimization::{
    errors::{OptError, OptResult},
    loglik_optimizer::{
        finite_diff::fd_gradient,
        traits::LogLikelihood,
        types::{Cost, Grad, Theta},
        validation::validate_grad,
    },
};
use argmin::core::{CostFunction, Error, Gradient};

/// Borrowed `(model, data)` pair handed to the Argmin executor.
#[derive(Debug, Clone)]
pub struct ArgMinAdapter<'a, F: LogLikelihood> {
    pub f: &'a F,
    pub data: &'a F::Data,
}

impl<'a, F: LogLikelihood> ArgMinAdapter<'a, F> {
    pub fn new(f: &'a F, data: &'a F::Data) -> Self {
        Self { f, data }
    }

    /// `-ℓ(θ)`, rejecting non-finite log-likelihoods.
    ///
    /// A non-finite value is how the model reports an impossible capture
    /// history or a non-positive-definite correlation. Inside a line search
    /// the error ends the run as [`OptError::SolverExit`].
    pub fn neg_loglik(&self, theta: &Theta) -> OptResult<Cost> {
        let value = self.f.value(theta, self.data)?;
        if !value.is_finite() {
            log::debug!("rejecting trial point with non-finite log-likelihood {value}");
            return Err(OptError::NonFiniteCost { value });
        }
        Ok(-value)
    }
}

impl<'a, F: LogLikelihood> CostFunction for ArgMinAdapter<'a, F> {
    type Param = Theta;
    type Output = Cost;

    fn cost(&self, theta: &Self::Param) -> Result<Self::Output, Error> {
        Ok(self.neg_loglik(theta)?)
    }
}

impl<'a, F: LogLikelihood> Gradient for ArgMinAdapter<'a, F> {
    type Param = Theta;
    type Gradient = Grad;

    /// Gradient of the cost.
    ///
    /// Uses `-∇ℓ(θ)` from [`LogLikelihood::grad`] when implemented;
    /// [`OptError::GradientNotImplemented`] selects the finite-difference
    /// path, and any other error is propagated.
    fn gradient(&self, theta: &Self::Param) -> Result<Self::Gradient, Error> {
        match self.f.grad(theta, self.data) {
            Ok(g) => {
                validate_grad(&g, theta.len())?;
                Ok(-g)
            }
            Err(OptError::GradientNotImplemented) => {
                Ok(fd_gradient(theta, |t| self.neg_loglik(t))?)
            }
            Err(e) => Err(e.into()),
        }
    }
}
