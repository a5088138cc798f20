//! numerical_stability — overflow-safe link and squashing transforms.
//!
//! Purpose
//! -------
//! Collect the scalar transforms that map unconstrained optimizer
//! coordinates into model space: logistic links for survival and detection
//! probabilities, a three-category multinomial logit for return-age
//! probabilities, and bounded squashing maps for correlation parameters.
//! Centralizing them keeps every consumer on the same numerically guarded
//! formulas.
//!
//! Key behaviors
//! -------------
//! - Provide `safe_logistic` for probability links.
//! - Provide `squash_unit` and `compound_symmetry_rho` so correlation
//!   parameters stay inside their positive-definite ranges without
//!   constrained optimization.
//! - Provide `mlogit3` for the return-age split.
//! - Expose `EIGEN_EPS` as the shared eigenvalue floor for standard errors.
//!
//! Invariants & assumptions
//! ------------------------
//! - All transforms accept any finite `f64`; non-finite inputs propagate as
//!   non-finite outputs instead of panicking.
//! - Outputs of the probability links lie in `[0, 1]`.
//!
//! Conventions
//! -----------
//! - This module never logs, performs I/O, or touches global state.
//!
//! Testing notes
//! -------------
//! - Unit tests in [`transformations`] cover agreement with naive formulas
//!   on safe grids, tail behavior, range guarantees, and mass conservation.

pub mod transformations;

// ---- Re-exports (primary public surface) ----------------------------------

pub use self::transformations::{
    EIGEN_EPS, compound_symmetry_rho, mlogit3, safe_logistic, squash_unit,
};

// ---- Optional convenience prelude for downstream crates -------------------

pub mod prelude {
    pub use super::transformations::{
        EIGEN_EPS, compound_symmetry_rho, mlogit3, safe_logistic, squash_unit,
    };
}
