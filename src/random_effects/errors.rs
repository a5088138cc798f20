//! Errors for random-effect covariance terms and their aggregation.
//!
//! Covers shape problems (distance matrices, time vectors, theta and
//! random-effect vector lengths, a shared-theta term with nothing to share)
//! and domain problems (unknown structure codes or names). Numeric
//! degeneracies during density evaluation are not errors; they surface as
//! non-finite densities. Simulation is the exception: a draw from a
//! non-positive-definite correlation matrix is impossible and is reported
//! as [`CovError::NotPositiveDefinite`].

/// Result alias for covariance-term operations.
pub type CovResult<T> = Result<T, CovError>;

#[derive(Debug, Clone, PartialEq)]
pub enum CovError {
    // ---- Structure kind ----
    /// Integer structure code outside the known set.
    UnknownStructureCode { code: i32 },

    /// Structure name outside the known set.
    UnknownStructureName { name: String },

    // ---- Term shape ----
    /// Block size must be at least one.
    InvalidBlockSize { block_size: usize },

    /// Replicate count must be at least one.
    InvalidReplicateCount { block_reps: usize },

    /// Declared or supplied theta count does not match the structure.
    ThetaCountMismatch { structure: &'static str, expected: usize, found: usize },

    /// The structure needs a time vector.
    MissingTimes { structure: &'static str },

    /// Time vector length differs from the block size.
    TimesLengthMismatch { expected: usize, found: usize },

    /// Times must be finite and strictly ascending.
    InvalidTimes { index: usize, value: f64, reason: &'static str },

    /// The structure needs a distance matrix.
    MissingDistances { structure: &'static str },

    /// Distance matrix is not `block_size × block_size`.
    DistanceShapeMismatch { expected: usize, found: (usize, usize) },

    /// Distances must be finite and non-negative.
    InvalidDistance { row: usize, col: usize, value: f64 },

    // ---- Aggregation ----
    /// Random-effect vector length differs from the summed term sizes.
    RandomEffectLengthMismatch { expected: usize, found: usize },

    /// Theta vector length differs from the summed theta counts.
    ThetaLengthMismatch { expected: usize, found: usize },

    /// A shared-theta term has no preceding term to borrow from.
    NoPrecedingThetaSlice { term: usize },

    // ---- Simulation ----
    /// Correlation matrix could not be factorized for a draw.
    NotPositiveDefinite { structure: &'static str },
}

impl std::error::Error for CovError {}

impl std::fmt::Display for CovError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            // ---- Structure kind ----
            CovError::UnknownStructureCode { code } => {
                write!(f, "Unknown covariance structure code {code}")
            }
            CovError::UnknownStructureName { name } => {
                write!(f, "Unknown covariance structure '{name}'")
            }

            // ---- Term shape ----
            CovError::InvalidBlockSize { block_size } => {
                write!(f, "Invalid block size {block_size}: must be at least 1")
            }
            CovError::InvalidReplicateCount { block_reps } => {
                write!(f, "Invalid replicate count {block_reps}: must be at least 1")
            }
            CovError::ThetaCountMismatch { structure, expected, found } => {
                write!(
                    f,
                    "Theta count mismatch for '{structure}': expected {expected}, found {found}"
                )
            }
            CovError::MissingTimes { structure } => {
                write!(f, "Structure '{structure}' requires a time vector")
            }
            CovError::TimesLengthMismatch { expected, found } => {
                write!(f, "Time vector length mismatch: expected {expected}, found {found}")
            }
            CovError::InvalidTimes { index, value, reason } => {
                write!(f, "Invalid time at index {index}: {value}: {reason}")
            }
            CovError::MissingDistances { structure } => {
                write!(f, "Structure '{structure}' requires a distance matrix")
            }
            CovError::DistanceShapeMismatch { expected, found } => {
                write!(
                    f,
                    "Dimension of distance matrix must equal block size: expected ({expected}, {expected}), found {found:?}"
                )
            }
            CovError::InvalidDistance { row, col, value } => {
                write!(f, "Invalid distance at ({row}, {col}): {value}, must be finite and >= 0")
            }

            // ---- Aggregation ----
            CovError::RandomEffectLengthMismatch { expected, found } => {
                write!(f, "Random-effect vector length mismatch: expected {expected}, found {found}")
            }
            CovError::ThetaLengthMismatch { expected, found } => {
                write!(f, "Theta vector length mismatch: expected {expected}, found {found}")
            }
            CovError::NoPrecedingThetaSlice { term } => {
                write!(f, "Term {term} shares theta but has no preceding term")
            }

            // ---- Simulation ----
            CovError::NotPositiveDefinite { structure } => {
                write!(f, "Correlation matrix for '{structure}' is not positive definite")
            }
        }
    }
}
