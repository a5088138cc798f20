//! Errors for the capture-recapture model (data validation, parameter
//! packing, and random-effect failures).
//!
//! ## Conventions
//! - **Indices are 0-based**: histories, cohorts, occasions, and PIM rows.
//! - Occasions run downstream → ocean → upstream; the ocean occasion is
//!   `n_ds_occ` and must be followed by at least one more column.
//! - Downstream detection codes are `0`/`1`; from the ocean occasion on,
//!   codes are `0..=3` (the observed return state).
//! - A zero renormalization sum inside the forward recursion is NOT an
//!   error; it yields a non-finite objective.
use crate::random_effects::errors::CovError;

/// Result alias for model-layer operations.
pub type ModelResult<T> = Result<T, ModelError>;

#[derive(Debug, Clone, PartialEq)]
pub enum ModelError {
    // ---- Occasions and histories ----
    /// Occasion counts that cannot hold a downstream → ocean → upstream run.
    InvalidOccasionLayout { n_occ: usize, n_ds_occ: usize, reason: &'static str },

    /// No capture histories or cohorts supplied.
    EmptyData { what: &'static str },

    /// Detection vector length differs from the number of occasions.
    HistoryLengthMismatch { history: usize, expected: usize, found: usize },

    /// Detection code outside the range allowed at that occasion.
    InvalidDetectionCode { history: usize, occasion: usize, code: u8 },

    /// Release occasion after the ocean occasion.
    InvalidReleaseOccasion { index: usize, release_occasion: usize, n_ds_occ: usize },

    // ---- Parameter index matrices ----
    /// PIM shape differs from `(rows, n_occ)`.
    PimShapeMismatch {
        family: &'static str,
        state: usize,
        expected: (usize, usize),
        found: (usize, usize),
    },

    /// PIM entry pointing outside its probability vector.
    PimIndexOutOfBounds {
        family: &'static str,
        state: usize,
        row: usize,
        occasion: usize,
        index: usize,
        len: usize,
    },

    /// Transition group outside `0..n_groups`.
    PsiGroupOutOfBounds { index: usize, group: usize, n_groups: usize },

    /// Unknown-life-history blending map is malformed.
    InvalidBlendMap { family: &'static str, row: usize, reason: &'static str },

    // ---- Trap dependence ----
    /// Trap-dependent occasions are misconfigured.
    InvalidTrapDependence { occasion: usize, reason: &'static str },

    // ---- Design and parameters ----
    /// Design matrix or linear predictor with the wrong shape.
    DesignShapeMismatch {
        component: &'static str,
        what: &'static str,
        expected: usize,
        found: usize,
    },

    /// Packed parameter vector has the wrong length.
    ParamLengthMismatch { expected: usize, actual: usize },

    /// Packed parameter vector has a NaN/±inf entry.
    NonFiniteParam { index: usize, value: f64 },

    /// Standard errors were requested before a successful fit.
    ModelNotFitted,

    // ---- Random effects ----
    /// Failure in a covariance term of the named component.
    Covariance { component: &'static str, source: CovError },
}

impl std::error::Error for ModelError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            ModelError::Covariance { source, .. } => Some(source),
            _ => None,
        }
    }
}

impl std::fmt::Display for ModelError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            // ---- Occasions and histories ----
            ModelError::InvalidOccasionLayout { n_occ, n_ds_occ, reason } => {
                write!(f, "Invalid occasion layout (n_occ = {n_occ}, n_ds_occ = {n_ds_occ}): {reason}")
            }
            ModelError::EmptyData { what } => write!(f, "No {what} supplied"),
            ModelError::HistoryLengthMismatch { history, expected, found } => {
                write!(
                    f,
                    "Capture history {history} has {found} occasions, expected {expected}"
                )
            }
            ModelError::InvalidDetectionCode { history, occasion, code } => {
                write!(
                    f,
                    "Invalid detection code {code} in history {history} at occasion {occasion}"
                )
            }
            ModelError::InvalidReleaseOccasion { index, release_occasion, n_ds_occ } => {
                write!(
                    f,
                    "Release occasion {release_occasion} of entry {index} is after the ocean occasion {n_ds_occ}"
                )
            }

            // ---- Parameter index matrices ----
            ModelError::PimShapeMismatch { family, state, expected, found } => {
                write!(
                    f,
                    "{family} PIM for state {} has shape {found:?}, expected {expected:?}",
                    state + 1
                )
            }
            ModelError::PimIndexOutOfBounds { family, state, row, occasion, index, len } => {
                write!(
                    f,
                    "{family} PIM for state {} at ({row}, {occasion}) points to {index}, but only {len} values exist",
                    state + 1
                )
            }
            ModelError::PsiGroupOutOfBounds { index, group, n_groups } => {
                write!(f, "Entry {index} uses psi group {group}, but only {n_groups} groups exist")
            }
            ModelError::InvalidBlendMap { family, row, reason } => {
                write!(f, "Invalid {family} blending map at row {row}: {reason}")
            }

            // ---- Trap dependence ----
            ModelError::InvalidTrapDependence { occasion, reason } => {
                write!(f, "Invalid trap-dependent occasion {occasion}: {reason}")
            }

            // ---- Design and parameters ----
            ModelError::DesignShapeMismatch { component, what, expected, found } => {
                write!(f, "{component} {what} mismatch: expected {expected}, found {found}")
            }
            ModelError::ParamLengthMismatch { expected, actual } => {
                write!(f, "Parameter vector length mismatch: expected {expected}, found {actual}")
            }
            ModelError::NonFiniteParam { index, value } => {
                write!(f, "Non-finite parameter at index {index}: {value}")
            }
            ModelError::ModelNotFitted => write!(f, "Model has not been fitted"),

            // ---- Random effects ----
            ModelError::Covariance { component, source } => {
                write!(f, "{component} random effects: {source}")
            }
        }
    }
}
