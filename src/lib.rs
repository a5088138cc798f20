//! mscjs — multistate Cormack–Jolly–Seber models with random effects.
//!
//! Purpose
//! -------
//! Estimate survival, detection and return-age probabilities of migrating
//! fish from multistate capture-recapture histories, and generate expected
//! and simulated detection tables from release cohorts under a parameter
//! set.
//!
//! Key behaviors
//! -------------
//! - [`random_effects`]: ten covariance structures scoring (and redrawing)
//!   Gaussian random effects from unconstrained parameters.
//! - [`model`]: data containers, the link stage, the scaled forward
//!   likelihood, the cohort simulator, and the
//!   [`MscjsModel`](model::MscjsModel) driver.
//! - [`optimization`]: L-BFGS maximum likelihood with finite-difference
//!   derivatives.
//! - [`inference`]: observed-information standard errors.
//!
//! Invariants & assumptions
//! ------------------------
//! - Shape and domain problems are typed errors raised before any
//!   recursion runs.
//! - Numeric degeneracies (impossible histories, singular correlations,
//!   collapsed standard deviations) propagate as non-finite objective
//!   values. The optimizer rejects them, and a run whose line search finds
//!   nothing else fails with an error rather than reporting convergence.
//!
//! Conventions
//! -----------
//! - All parameters live on an unconstrained scale: logits for
//!   probabilities, logs for standard deviations, squashed or logistic
//!   transforms for correlations.
//! - Per-history and per-cohort work runs on the rayon pool when
//!   `ModelOptions::parallel` is set; results are collected in input order
//!   so totals do not depend on scheduling.
//!
//! Testing notes
//! -------------
//! - Unit tests live next to each module; `tests/` exercises evaluate,
//!   simulate and fit end to end.

pub mod inference;
pub mod model;
pub mod optimization;
pub mod random_effects;
