//! loglik_optimizer — Argmin-backed maximum-likelihood fitting.
//!
//! Purpose
//! -------
//! Fit models that expose a log-likelihood over a flat, unconstrained
//! parameter vector. The capture-recapture driver implements
//! [`LogLikelihood`] and calls [`maximize`]; everything between (sign
//! flipping, numerical derivatives, solver construction, result
//! normalization) lives here.
//!
//! Key behaviors
//! -------------
//! - [`adapter::ArgMinAdapter`] turns `ℓ(θ)` into the cost `-ℓ(θ)` and
//!   rejects non-finite values so the line search backs away from
//!   impossible parameter regions.
//! - [`finite_diff`] supplies central-then-forward numerical gradients and
//!   Hessians of fallible objectives.
//! - [`builders`] and [`run`] construct and execute L-BFGS with either
//!   line search and the configured stopping rules.
//! - [`validation`] holds the shared shape / finiteness checks.
//!
//! Invariants & assumptions
//! ------------------------
//! - Models return log-likelihoods, never costs.
//! - Structural input problems are errors; numeric degeneracies may be
//!   reported as non-finite values and are turned into
//!   [`OptError::NonFiniteCost`](crate::optimization::errors::OptError) here.
//!
//! Testing notes
//! -------------
//! - Submodule tests cover sign conventions, derivative accuracy on
//!   quadratics, option validation, and full L-BFGS runs on a binomial
//!   survival likelihood with a closed-form MLE.

pub mod adapter;
pub mod api;
pub mod builders;
pub mod finite_diff;
pub mod run;
pub mod traits;
pub mod types;
pub mod validation;

// ---- Re-exports (primary public surface) ----------------------------------

pub use self::api::maximize;
pub use self::finite_diff::{fd_gradient, fd_hessian};
pub use self::traits::{LineSearcher, LogLikelihood, MLEOptions, OptimOutcome, Tolerances};
pub use self::types::{Cost, DEFAULT_LBFGS_MEM, FnEvalMap, Grad, Hessian, Theta};

pub mod prelude {
    pub use super::api::maximize;
    pub use super::traits::{LineSearcher, LogLikelihood, MLEOptions, OptimOutcome, Tolerances};
    pub use super::types::{Cost, Grad, Theta};
}
