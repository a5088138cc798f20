//! inference::hessian — observed-information standard errors.
//!
//! Purpose
//! -------
//! Turn a fallible log-likelihood into classical standard errors at its
//! maximizer: the finite-difference Hessian `H = ∇²ℓ(θ̂)` gives the
//! observed information `J = −H`, and the standard errors are the square
//! roots of the diagonal of its pseudoinverse.
//!
//! Key behaviors
//! -------------
//! - [`calc_standard_errors`] evaluates the Hessian with
//!   [`fd_hessian`], copies `J` into a `nalgebra::DMatrix`, and forms
//!   `Var(θ̂_i) = Σ_{k: λ_k > EIGEN_EPS} Q[i,k]² / λ_k` from the symmetric
//!   eigendecomposition `J = Q Λ Qᵀ`.
//! - [`observed_information_covariance`] exposes the full pseudoinverse for
//!   callers that need covariances rather than standard errors.
//!
//! Invariants & assumptions
//! ------------------------
//! - The Hessian is already symmetrized by [`fd_hessian`].
//! - Eigenvalues at most [`EIGEN_EPS`] are treated as zero, so weakly
//!   identified directions contribute nothing instead of dividing by a tiny
//!   eigenvalue. A direction with no curvature gets a standard error of 0
//!   and should be read as "not identified", not "exact".
//!
//! Conventions
//! -----------
//! - The log-likelihood is on the summed (not averaged) scale, so no
//!   sample-size rescaling is applied.
//! - No explicit inverse is formed.
use crate::optimization::{
    errors::OptResult,
    loglik_optimizer::{Hessian, Theta, fd_hessian},
    numerical_stability::transformations::EIGEN_EPS,
};
use nalgebra::DMatrix;
use ndarray::{Array1, Array2};

/// Classical standard errors of `θ̂` from the observed information of
/// `loglik`.
///
/// # Errors
/// The first error `loglik` raises while the Hessian is evaluated, or a
/// Hessian validation failure for non-finite curvature.
pub fn calc_standard_errors<G>(loglik: G, theta_hat: &Theta) -> OptResult<Array1<f64>>
where
    G: Fn(&Theta) -> OptResult<f64>,
{
    let cov = observed_information_covariance(loglik, theta_hat)?;
    Ok(cov.diag().mapv(|v| v.max(0.0).sqrt()))
}

/// Pseudoinverse of the observed information `−∇²ℓ(θ̂)`.
///
/// # Errors
/// As [`calc_standard_errors`].
pub fn observed_information_covariance<G>(loglik: G, theta_hat: &Theta) -> OptResult<Array2<f64>>
where
    G: Fn(&Theta) -> OptResult<f64>,
{
    let hess = fd_hessian(theta_hat, loglik)?;
    Ok(pseudo_inverse(to_dmatrix(&hess, -1.0)))
}

// ---- Helper methods ----

fn to_dmatrix(hess: &Hessian, scale: f64) -> DMatrix<f64> {
    let n = hess.nrows();
    DMatrix::from_fn(n, n, |i, j| scale * hess[[i, j]])
}

fn pseudo_inverse(info: DMatrix<f64>) -> Array2<f64> {
    let n = info.nrows();
    let eigen = info.symmetric_eigen();
    let q = eigen.eigenvectors;
    let lambdas = eigen.eigenvalues;
    Array2::from_shape_fn((n, n), |(i, j)| {
        lambdas
            .iter()
            .enumerate()
            .filter(|(_, lambda)| **lambda > EIGEN_EPS)
            .map(|(k, &lambda)| q[(i, k)] * q[(j, k)] / lambda)
            .sum()
    })
}
