//! Validation helpers for the optimizer layer.
//!
//! Every check returns a specific [`OptError`] variant naming the offending
//! index or value, so failures inside a long L-BFGS run can be traced back
//! to a single parameter slot of the packed vector.
use crate::optimization::{
    errors::{OptError, OptResult},
    loglik_optimizer::{Grad, Theta, types::Hessian},
};

/// Accept `None`, or a finite, strictly positive gradient-norm tolerance.
pub fn verify_tol_grad(tol: Option<f64>) -> OptResult<()> {
    match tol {
        Some(tol) if !tol.is_finite() => {
            Err(OptError::InvalidTolGrad { tol, reason: "Tolerance must be finite." })
        }
        Some(tol) if tol <= 0.0 => {
            Err(OptError::InvalidTolGrad { tol, reason: "Tolerance must be positive." })
        }
        _ => Ok(()),
    }
}

/// Accept `None`, or a finite, strictly positive cost-change tolerance.
pub fn verify_tol_cost(tol: Option<f64>) -> OptResult<()> {
    match tol {
        Some(tol) if !tol.is_finite() => {
            Err(OptError::InvalidTolCost { tol, reason: "Tolerance must be finite." })
        }
        Some(tol) if tol <= 0.0 => {
            Err(OptError::InvalidTolCost { tol, reason: "Tolerance must be positive." })
        }
        _ => Ok(()),
    }
}

/// Check a starting vector before it reaches the solver.
///
/// # Errors
/// - [`OptError::ThetaLengthMismatch`] when `theta.len() != dim`.
/// - [`OptError::InvalidThetaInput`] for the first non-finite entry.
pub fn validate_theta(theta: &Theta, dim: usize) -> OptResult<()> {
    if theta.len() != dim {
        return Err(OptError::ThetaLengthMismatch { expected: dim, actual: theta.len() });
    }
    match theta.iter().position(|v| !v.is_finite()) {
        Some(index) => Err(OptError::InvalidThetaInput { index, value: theta[index] }),
        None => Ok(()),
    }
}

/// Check gradient length and finiteness.
///
/// # Errors
/// - [`OptError::GradientDimMismatch`] on a length mismatch.
/// - [`OptError::InvalidGradient`] for the first non-finite entry.
pub fn validate_grad(grad: &Grad, dim: usize) -> OptResult<()> {
    if grad.len() != dim {
        return Err(OptError::GradientDimMismatch { expected: dim, found: grad.len() });
    }
    match grad.iter().position(|v| !v.is_finite()) {
        Some(index) => Err(OptError::InvalidGradient {
            index,
            value: grad[index],
            reason: "Gradient elements must be finite.",
        }),
        None => Ok(()),
    }
}

/// Unwrap the solver's best parameter vector, rejecting absent or
/// non-finite estimates.
pub fn validate_theta_hat(theta_hat: Option<Theta>) -> OptResult<Theta> {
    let theta_hat = theta_hat.ok_or(OptError::MissingThetaHat)?;
    if let Some(index) = theta_hat.iter().position(|v| !v.is_finite()) {
        return Err(OptError::InvalidThetaHat {
            index,
            value: theta_hat[index],
            reason: "Parameter estimates must be finite.",
        });
    }
    Ok(theta_hat)
}

/// Reject a non-finite log-likelihood value.
pub fn validate_value(value: f64) -> OptResult<()> {
    if !value.is_finite() {
        return Err(OptError::NonFiniteCost { value });
    }
    Ok(())
}

/// Check that a Hessian is `dim × dim` with finite entries.
///
/// # Errors
/// - [`OptError::HessianDimMismatch`] on a shape mismatch.
/// - [`OptError::InvalidHessian`] with the first offending `(row, col)`.
pub fn validate_hessian(hessian: &Hessian, dim: usize) -> OptResult<()> {
    if hessian.nrows() != dim || hessian.ncols() != dim {
        return Err(OptError::HessianDimMismatch {
            expected: dim,
            found: (hessian.nrows(), hessian.ncols()),
        });
    }
    match hessian.indexed_iter().find(|(_, v)| !v.is_finite()) {
        Some(((row, col), &value)) => Err(OptError::InvalidHessian { row, col, value }),
        None => Ok(()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::{Array2, array};

    // -------------------------------------------------------------------------
    // Scope
    // -----
    // Tolerance, parameter-vector, gradient, and Hessian checks.
    // -------------------------------------------------------------------------

    #[test]
    // Purpose
    // -------
    // Tolerances must be finite and strictly positive; `None` passes.
    fn tolerance_checks_reject_non_positive_and_non_finite() {
        assert!(verify_tol_grad(None).is_ok());
        assert!(verify_tol_grad(Some(1e-6)).is_ok());
        assert!(matches!(verify_tol_grad(Some(0.0)), Err(OptError::InvalidTolGrad { .. })));
        assert!(matches!(
            verify_tol_cost(Some(f64::INFINITY)),
            Err(OptError::InvalidTolCost { .. })
        ));
    }

    #[test]
    // Purpose
    // -------
    // `validate_theta` reports the first non-finite slot and length
    // mismatches.
    //
    // Given
    // -----
    // - A length-3 vector with a NaN in slot 1.
    //
    // Expect
    // ------
    // - `InvalidThetaInput { index: 1 }` for the right length.
    // - `ThetaLengthMismatch` for the wrong length.
    fn validate_theta_reports_offending_slot() {
        // Arrange
        let theta = array![0.0, f64::NAN, 1.0];

        // Act
        let bad_value = validate_theta(&theta, 3);
        let bad_len = validate_theta(&theta, 4);

        // Assert
        assert!(matches!(bad_value, Err(OptError::InvalidThetaInput { index: 1, .. })));
        assert_eq!(bad_len, Err(OptError::ThetaLengthMismatch { expected: 4, actual: 3 }));
    }

    #[test]
    // Purpose
    // -------
    // `validate_grad` and `validate_hessian` catch shape and finiteness
    // problems.
    fn gradient_and_hessian_checks() {
        let grad = array![1.0, f64::INFINITY];
        assert!(matches!(validate_grad(&grad, 2), Err(OptError::InvalidGradient { index: 1, .. })));
        assert!(matches!(validate_grad(&grad, 3), Err(OptError::GradientDimMismatch { .. })));

        let mut hess = Array2::<f64>::eye(2);
        assert!(validate_hessian(&hess, 2).is_ok());
        hess[[1, 0]] = f64::NAN;
        assert!(matches!(
            validate_hessian(&hess, 2),
            Err(OptError::InvalidHessian { row: 1, col: 0, .. })
        ));
    }

    #[test]
    // Purpose
    // -------
    // `validate_theta_hat` rejects a missing estimate.
    fn validate_theta_hat_requires_estimate() {
        assert_eq!(validate_theta_hat(None), Err(OptError::MissingThetaHat));
        assert!(validate_theta_hat(Some(array![0.5])).is_ok());
    }
}
