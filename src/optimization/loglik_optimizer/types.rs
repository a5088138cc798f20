//! loglik_optimizer::types — numeric aliases and L-BFGS wiring.
//!
//! Purpose
//! -------
//! Name the vector, matrix, and solver types shared by the optimizer so the
//! rest of the layer never spells out `ndarray` or Argmin generics. The
//! capture-recapture objective packs every fixed effect, random effect,
//! covariance parameter, and mixing-proportion logit into one flat
//! [`Theta`], so these aliases are also what the model layer produces and
//! consumes.
//!
//! Conventions
//! -----------
//! - `Theta` / `Grad` are column vectors of length equal to the number of
//!   free parameters in the packed layout.
//! - `Hessian` is dense `dim × dim`.
//! - `Cost` is the negative log-likelihood seen by Argmin.
use argmin::solver::{
    linesearch::{HagerZhangLineSearch, MoreThuenteLineSearch},
    quasinewton::LBFGS,
};
use ndarray::{Array1, Array2};
use std::collections::HashMap;

/// Packed unconstrained parameter vector.
pub type Theta = Array1<f64>;

/// Gradient vector with the same layout as [`Theta`].
pub type Grad = Array1<f64>;

/// Dense second-derivative matrix, `Theta.len() × Theta.len()`.
pub type Hessian = Array2<f64>;

/// Scalar objective value handed to Argmin (`-ℓ(θ)`).
pub type Cost = f64;

/// Argmin function-evaluation counters keyed by counter name.
pub type FnEvalMap = HashMap<String, u64>;

/// History length used by L-BFGS when the options leave it unset.
pub const DEFAULT_LBFGS_MEM: usize = 7;

pub type HagerZhangLS = HagerZhangLineSearch<Theta, Grad, Cost>;

pub type MoreThuenteLS = MoreThuenteLineSearch<Theta, Grad, Cost>;

/// L-BFGS with the Hager–Zhang line search.
pub type LbfgsHagerZhang = LBFGS<HagerZhangLS, Theta, Grad, Cost>;

/// L-BFGS with the More–Thuente line search.
pub type LbfgsMoreThuente = LBFGS<MoreThuenteLS, Theta, Grad, Cost>;
