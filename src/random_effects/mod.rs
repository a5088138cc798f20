//! random_effects — covariance structures for Gaussian random effects.
//!
//! Purpose
//! -------
//! Score (and optionally redraw) the random-effect vectors attached to the
//! survival, detection and transition components. Each component carries
//! an ordered list of covariance terms; each term maps an unconstrained
//! theta slice to a realized covariance and contributes a negative
//! log-density.
//!
//! Key behaviors
//! -------------
//! - [`term`]: structure kinds, integer codes, theta counts, validated term
//!   descriptors and per-term reports.
//! - [`engine`]: one builder per structure; independent, dense
//!   multivariate-normal, or sequential (AR1 / OU) scoring and drawing.
//! - [`aggregator`]: offset precomputation, shared-theta carry-over, summed
//!   density over terms.
//! - [`linalg`] / [`kernels`]: Cholesky-based Gaussian helpers and spatial
//!   correlation kernels.
//!
//! Invariants & assumptions
//! ------------------------
//! - Shape and domain problems are [`CovError`](errors::CovError)s.
//! - Numeric degeneracies in density evaluation propagate as non-finite
//!   values.
//!
//! Testing notes
//! -------------
//! - Each structure is checked against the independent-normal density at
//!   its uncorrelated boundary; aggregation is checked as a pure sum.

pub mod aggregator;
pub mod engine;
pub mod errors;
pub mod kernels;
pub mod linalg;
pub mod term;

// ---- Re-exports (primary public surface) ----------------------------------

pub use self::aggregator::{AggregateEvaluation, RandomEffectTerms};
pub use self::engine::{TermEvaluation, evaluate, evaluate_and_draw};
pub use self::errors::{CovError, CovResult};
pub use self::term::{CovStructure, CovarianceTerm, TermReport};

pub mod prelude {
    pub use super::aggregator::{AggregateEvaluation, RandomEffectTerms};
    pub use super::errors::{CovError, CovResult};
    pub use super::term::{CovStructure, CovarianceTerm, TermReport};
}
