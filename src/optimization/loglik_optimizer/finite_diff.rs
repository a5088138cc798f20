//! loglik_optimizer::finite_diff — numerical derivatives of fallible objectives.
//!
//! Purpose
//! -------
//! The capture-recapture objective has no analytic gradient, so every
//! derivative the optimizer and the inference layer need is taken
//! numerically with `finitediff`. The objective itself is fallible
//! (`OptResult<f64>`), while `finitediff` expects a plain `Fn(&Theta) -> f64`;
//! this module bridges the two by capturing the first error raised inside a
//! difference stencil and surfacing it once the stencil completes.
//!
//! Key behaviors
//! -------------
//! - [`fd_gradient`]: central differences first; on a captured error or a
//!   non-finite entry, retry once with forward differences.
//! - [`fd_hessian`]: central Hessian of a central-difference gradient, with
//!   the same forward-difference retry, symmetrized before returning.
//!
//! Invariants & assumptions
//! ------------------------
//! - Returned gradients have length `theta.len()` and finite entries.
//! - Returned Hessians are `dim × dim`, finite, and exactly symmetric.
//!
//! Testing notes
//! -------------
//! - Unit tests use quadratic objectives with known derivatives and an
//!   objective that fails at every point.
use std::cell::RefCell;

use finitediff::FiniteDiff;

use crate::optimization::{
    errors::{OptError, OptResult},
    loglik_optimizer::{
        types::{Grad, Hessian, Theta},
        validation::{validate_grad, validate_hessian},
    },
};

/// Finite-difference gradient of a fallible scalar objective.
///
/// Parameters
/// ----------
/// - `theta`: point at which to differentiate.
/// - `func`: objective; an `Err` anywhere in the stencil is captured and
///   returned after the stencil finishes.
///
/// Returns
/// -------
/// Central-difference gradient when it evaluates cleanly, otherwise a
/// forward-difference gradient.
///
/// Errors
/// ------
/// - The first error raised by `func` during the forward-difference retry.
/// - [`OptError::InvalidGradient`] when the forward-difference gradient is
///   still non-finite.
pub fn fd_gradient<G>(theta: &Theta, func: G) -> OptResult<Grad>
where
    G: Fn(&Theta) -> OptResult<f64>,
{
    let captured: RefCell<Option<OptError>> = RefCell::new(None);
    let plain = |t: &Theta| capture(&captured, func(t));
    let dim = theta.len();

    let central = theta.central_diff(&plain);
    if captured.borrow().is_none() && validate_grad(&central, dim).is_ok() {
        return Ok(central);
    }

    captured.replace(None);
    let forward = theta.forward_diff(&plain);
    if let Some(err) = captured.take() {
        return Err(err);
    }
    validate_grad(&forward, dim)?;
    Ok(forward)
}

/// Finite-difference Hessian of a fallible scalar objective.
///
/// The gradient inside the Hessian stencil is itself a central-difference
/// gradient of `func`. A failed or non-finite central Hessian triggers one
/// forward-difference retry. The result is symmetrized by averaging each
/// off-diagonal pair.
///
/// Errors
/// ------
/// - The first error raised by `func` during either stencil.
/// - [`OptError::InvalidHessian`] / [`OptError::HessianDimMismatch`] when
///   the forward-difference Hessian fails validation.
pub fn fd_hessian<G>(theta: &Theta, func: G) -> OptResult<Hessian>
where
    G: Fn(&Theta) -> OptResult<f64>,
{
    let captured: RefCell<Option<OptError>> = RefCell::new(None);
    let plain = |t: &Theta| capture(&captured, func(t));
    let grad_fn = |t: &Theta| -> Grad { t.central_diff(&plain) };
    let dim = theta.len();

    let mut hess = theta.central_hessian(&grad_fn);
    if let Some(err) = captured.take() {
        return Err(err);
    }
    if validate_hessian(&hess, dim).is_err() {
        hess = theta.forward_hessian(&grad_fn);
        if let Some(err) = captured.take() {
            return Err(err);
        }
        validate_hessian(&hess, dim)?;
    }
    symmetrize_hess(&mut hess);
    Ok(hess)
}

// ---- Helper methods ----

fn capture(slot: &RefCell<Option<OptError>>, result: OptResult<f64>) -> f64 {
    match result {
        Ok(value) => value,
        Err(err) => {
            let mut slot = slot.borrow_mut();
            if slot.is_none() {
                *slot = Some(err);
            }
            f64::NAN
        }
    }
}

fn symmetrize_hess(hess: &mut Hessian) {
    for i in 0..hess.nrows() {
        for j in 0..i {
            let avg = 0.5 * (hess[[i, j]] + hess[[j, i]]);
            hess[[i, j]] = avg;
            hess[[j, i]] = avg;
        }
    }
}
