//! optimization — MLE stack, numerical transforms, and the optimizer error
//! surface.
//!
//! Purpose
//! -------
//! Everything needed to turn the capture-recapture objective into fitted
//! parameters: an Argmin L-BFGS driver with finite-difference derivatives
//! (`loglik_optimizer`), the overflow-safe link and squashing transforms the
//! model uses to map unconstrained coordinates into probabilities and
//! correlations (`numerical_stability`), and one error enum for the whole
//! layer (`errors`).
//!
//! Conventions
//! -----------
//! - Solvers maximize `ℓ(θ)` by minimizing `-ℓ(θ)`; user-facing values are
//!   log-likelihoods.
//! - Parameters, gradients, and Hessians are `ndarray` containers.
//! - Model-side failures reach callers as
//!   [`OptError::ModelFailure`](errors::OptError::ModelFailure) or a
//!   structured parameter-vector variant.
//! - Progress is reported through the `log` facade, plus the optional
//!   `obs_slog` terminal observer.

pub mod errors;
pub mod loglik_optimizer;
pub mod numerical_stability;

pub mod prelude {
    pub use super::errors::{OptError, OptResult};
    pub use super::loglik_optimizer::prelude::*;
    pub use super::numerical_stability::prelude::*;
}
