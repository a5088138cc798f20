//! inference — post-estimation uncertainty for fitted models.
//!
//! Classical standard errors from the observed information at the fitted
//! parameter vector, computed in the unconstrained optimizer space `θ`.
//! See [`hessian`].

pub mod hessian;

pub use self::hessian::{calc_standard_errors, observed_information_covariance};
