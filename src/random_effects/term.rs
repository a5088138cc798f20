//! Covariance-term descriptors.
//!
//! Purpose
//! -------
//! Describe one random-effect grouping: which covariance structure it uses,
//! how large each correlated block is, how many independent replicates of
//! the block exist, how many theta values the term consumes, and any
//! auxiliary data (times for Ornstein–Uhlenbeck, distances for spatial
//! kernels). Terms are built once before fitting and never change.
//!
//! Key behaviors
//! -------------
//! - [`CovStructure`] is the closed set of supported structures, with the
//!   integer codes and short names used by upstream model-building tools.
//! - [`CovStructure::theta_count`] gives the theta length each structure
//!   consumes for a block of size `n`.
//! - [`CovarianceTerm::new`] validates sizes and auxiliary data so the
//!   engine can index without further checks.
//!
//! Invariants & assumptions
//! ------------------------
//! - `block_size ≥ 1`, `block_reps ≥ 1`.
//! - `theta_count` is either `0` (reuse the preceding term's theta slice)
//!   or exactly `structure.theta_count(block_size)`.
//! - Ornstein–Uhlenbeck terms carry `block_size` finite, strictly ascending
//!   times.
//! - Spatial terms carry a finite, non-negative `block_size × block_size`
//!   distance matrix.
//!
//! Conventions
//! -----------
//! - A term's random effects are `block_reps` contiguous blocks of
//!   `block_size` values.
use std::{fmt, str::FromStr};

use ndarray::{Array1, Array2};

use crate::random_effects::errors::{CovError, CovResult};

/// Supported random-effect covariance structures.
///
/// | variant                | code | name   | theta values        |
/// |------------------------|------|--------|---------------------|
/// | `Diagonal`             | 0    | `diag` | `n`                 |
/// | `Unstructured`         | 1    | `us`   | `n + n(n−1)/2`      |
/// | `CompoundSymmetry`     | 2    | `cs`   | `n + 1`             |
/// | `Ar1`                  | 3    | `ar1`  | `2`                 |
/// | `OrnsteinUhlenbeck`    | 4    | `ou`   | `2`                 |
/// | `ExponentialSpatial`   | 5    | `exp`  | `2`                 |
/// | `GaussianSpatial`      | 6    | `gau`  | `2`                 |
/// | `MaternSpatial`        | 7    | `mat`  | `3`                 |
/// | `Toeplitz`             | 8    | `toep` | `2n − 1`            |
/// | `PenalizedComplexity`  | 9    | `pc`   | `n`                 |
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CovStructure {
    Diagonal,
    Unstructured,
    CompoundSymmetry,
    Ar1,
    OrnsteinUhlenbeck,
    ExponentialSpatial,
    GaussianSpatial,
    MaternSpatial,
    Toeplitz,
    PenalizedComplexity,
}

impl CovStructure {
    pub const ALL: [CovStructure; 10] = [
        CovStructure::Diagonal,
        CovStructure::Unstructured,
        CovStructure::CompoundSymmetry,
        CovStructure::Ar1,
        CovStructure::OrnsteinUhlenbeck,
        CovStructure::ExponentialSpatial,
        CovStructure::GaussianSpatial,
        CovStructure::MaternSpatial,
        CovStructure::Toeplitz,
        CovStructure::PenalizedComplexity,
    ];

    /// Map an integer structure code to a variant.
    ///
    /// # Errors
    /// [`CovError::UnknownStructureCode`] for codes outside `0..=9`.
    pub fn from_code(code: i32) -> CovResult<Self> {
        usize::try_from(code)
            .ok()
            .and_then(|i| Self::ALL.get(i).copied())
            .ok_or(CovError::UnknownStructureCode { code })
    }

    pub fn code(self) -> i32 {
        match self {
            CovStructure::Diagonal => 0,
            CovStructure::Unstructured => 1,
            CovStructure::CompoundSymmetry => 2,
            CovStructure::Ar1 => 3,
            CovStructure::OrnsteinUhlenbeck => 4,
            CovStructure::ExponentialSpatial => 5,
            CovStructure::GaussianSpatial => 6,
            CovStructure::MaternSpatial => 7,
            CovStructure::Toeplitz => 8,
            CovStructure::PenalizedComplexity => 9,
        }
    }

    /// Short name, as accepted by `FromStr`.
    pub fn name(self) -> &'static str {
        match self {
            CovStructure::Diagonal => "diag",
            CovStructure::Unstructured => "us",
            CovStructure::CompoundSymmetry => "cs",
            CovStructure::Ar1 => "ar1",
            CovStructure::OrnsteinUhlenbeck => "ou",
            CovStructure::ExponentialSpatial => "exp",
            CovStructure::GaussianSpatial => "gau",
            CovStructure::MaternSpatial => "mat",
            CovStructure::Toeplitz => "toep",
            CovStructure::PenalizedComplexity => "pc",
        }
    }

    /// Number of theta values consumed for a block of size `n`.
    pub fn theta_count(self, n: usize) -> usize {
        match self {
            CovStructure::Diagonal | CovStructure::PenalizedComplexity => n,
            CovStructure::Unstructured => n + n * n.saturating_sub(1) / 2,
            CovStructure::CompoundSymmetry => n + 1,
            CovStructure::Toeplitz => 2 * n - 1,
            CovStructure::Ar1
            | CovStructure::OrnsteinUhlenbeck
            | CovStructure::ExponentialSpatial
            | CovStructure::GaussianSpatial => 2,
            CovStructure::MaternSpatial => 3,
        }
    }

    pub fn is_spatial(self) -> bool {
        matches!(
            self,
            CovStructure::ExponentialSpatial
                | CovStructure::GaussianSpatial
                | CovStructure::MaternSpatial
        )
    }
}

impl FromStr for CovStructure {
    type Err = CovError;

    /// Case-insensitive short name (`"diag"`, `"us"`, `"cs"`, `"ar1"`,
    /// `"ou"`, `"exp"`, `"gau"`, `"mat"`, `"toep"`, `"pc"`).
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let lower = s.trim().to_lowercase();
        Self::ALL
            .iter()
            .copied()
            .find(|structure| structure.name() == lower)
            .ok_or_else(|| CovError::UnknownStructureName { name: s.to_string() })
    }
}

impl fmt::Display for CovStructure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// One random-effect grouping factor.
///
/// Fields
/// ------
/// - `structure`: covariance structure of each block.
/// - `block_size`: number of correlated effects per block.
/// - `block_reps`: number of independent blocks.
/// - `theta_count`: theta values consumed; `0` reuses the previous slice.
/// - `times`: observation times (Ornstein–Uhlenbeck only).
/// - `distances`: pairwise distances (spatial structures only).
#[derive(Debug, Clone, PartialEq)]
pub struct CovarianceTerm {
    pub structure: CovStructure,
    pub block_size: usize,
    pub block_reps: usize,
    pub theta_count: usize,
    pub times: Option<Array1<f64>>,
    pub distances: Option<Array2<f64>>,
}

impl CovarianceTerm {
    /// Validated constructor.
    ///
    /// Errors
    /// ------
    /// - [`CovError::InvalidBlockSize`] / [`CovError::InvalidReplicateCount`]
    ///   for zero sizes.
    /// - [`CovError::ThetaCountMismatch`] when `theta_count` is neither `0`
    ///   nor the structure's count.
    /// - [`CovError::MissingTimes`], [`CovError::TimesLengthMismatch`],
    ///   [`CovError::InvalidTimes`] for Ornstein–Uhlenbeck time problems.
    /// - [`CovError::MissingDistances`], [`CovError::DistanceShapeMismatch`],
    ///   [`CovError::InvalidDistance`] for spatial distance problems.
    pub fn new(
        structure: CovStructure, block_size: usize, block_reps: usize, theta_count: usize,
        times: Option<Array1<f64>>, distances: Option<Array2<f64>>,
    ) -> CovResult<Self> {
        if block_size == 0 {
            return Err(CovError::InvalidBlockSize { block_size });
        }
        if block_reps == 0 {
            return Err(CovError::InvalidReplicateCount { block_reps });
        }
        let expected = structure.theta_count(block_size);
        if theta_count != 0 && theta_count != expected {
            return Err(CovError::ThetaCountMismatch {
                structure: structure.name(),
                expected,
                found: theta_count,
            });
        }
        if structure == CovStructure::OrnsteinUhlenbeck {
            let t = times.as_ref().ok_or(CovError::MissingTimes { structure: structure.name() })?;
            validate_times(t, block_size)?;
        }
        if structure.is_spatial() {
            let d = distances
                .as_ref()
                .ok_or(CovError::MissingDistances { structure: structure.name() })?;
            validate_distances(d, block_size)?;
        }
        Ok(Self { structure, block_size, block_reps, theta_count, times, distances })
    }

    /// Term with its own theta slice and no auxiliary data.
    pub fn simple(structure: CovStructure, block_size: usize, block_reps: usize) -> CovResult<Self> {
        Self::new(structure, block_size, block_reps, structure.theta_count(block_size), None, None)
    }

    /// Number of random effects the term covers.
    pub fn n_effects(&self) -> usize {
        self.block_size * self.block_reps
    }

    /// `true` when the term reuses the preceding term's theta slice.
    pub fn shares_theta(&self) -> bool {
        self.theta_count == 0
    }
}

/// Correlation matrix and standard deviations realized at a theta slice.
#[derive(Debug, Clone, PartialEq)]
pub struct TermReport {
    pub corr: Array2<f64>,
    pub sd: Array1<f64>,
}

// ---- Helper methods ----

pub(crate) fn validate_times(times: &Array1<f64>, block_size: usize) -> CovResult<()> {
    if times.len() != block_size {
        return Err(CovError::TimesLengthMismatch { expected: block_size, found: times.len() });
    }
    for (index, &value) in times.iter().enumerate() {
        if !value.is_finite() {
            return Err(CovError::InvalidTimes { index, value, reason: "Times must be finite." });
        }
        if index > 0 && value <= times[index - 1] {
            return Err(CovError::InvalidTimes {
                index,
                value,
                reason: "Times must be strictly ascending.",
            });
        }
    }
    Ok(())
}

pub(crate) fn validate_distances(distances: &Array2<f64>, block_size: usize) -> CovResult<()> {
    if distances.nrows() != block_size || distances.ncols() != block_size {
        return Err(CovError::DistanceShapeMismatch {
            expected: block_size,
            found: (distances.nrows(), distances.ncols()),
        });
    }
    match distances.indexed_iter().find(|(_, d)| !(d.is_finite() && **d >= 0.0)) {
        Some(((row, col), &value)) => Err(CovError::InvalidDistance { row, col, value }),
        None => Ok(()),
    }
}
