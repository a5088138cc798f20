//! Per-term covariance engine.
//!
//! Purpose
//! -------
//! Turn one term's theta slice into a realized covariance, then score (and
//! optionally redraw) that term's random-effect block under it.
//!
//! Key behaviors
//! -------------
//! - Each structure has its own builder returning a [`Realized`] covariance
//!   in one of three shapes:
//!   - `Independent` (diag, pc): per-dimension SDs, optional penalized
//!     complexity penalty.
//!   - `Dense` (us, cs, toep, exp, gau, mat): SDs plus a full correlation
//!     matrix, scored by the multivariate normal density.
//!   - `Sequential` (ar1, ou): one SD and per-step correlations, scored by
//!     the conditional-normal chain `x₀ ~ N(0, sd)`,
//!     `xᵢ ~ N(ρᵢ xᵢ₋₁, sd √(1 − ρᵢ²))`.
//! - [`evaluate`] returns the negative log-density summed over replicates.
//! - [`evaluate_and_draw`] scores the incoming block, then overwrites it
//!   with a fresh draw from the same covariance.
//!
//! Invariants & assumptions
//! ------------------------
//! - `block.len() == block_size × block_reps` and
//!   `theta.len() == structure.theta_count(block_size)`; both are checked.
//! - OU times and spatial distances match `block_size`; rechecked on every
//!   call.
//! - A correlation matrix that fails to factorize scores as `NaN`; drawing
//!   from it is [`CovError::NotPositiveDefinite`].
//!
//! Conventions
//! -----------
//! - SDs are `exp(θ)`; bounded correlations go through the squashing maps in
//!   `numerical_stability`.
//! - Replicate `r` occupies `block[r·n .. (r+1)·n]`.
use ndarray::{Array1, Array2, ArrayView1, ArrayViewMut1, s};
use rand::Rng;
use rand_distr::StandardNormal;

use crate::{
    optimization::numerical_stability::{compound_symmetry_rho, squash_unit},
    random_effects::{
        errors::{CovError, CovResult},
        kernels::spatial_corr,
        linalg::{CorrFactor, normal_ln_pdf, unstructured_corr},
        term::{CovStructure, CovarianceTerm, TermReport, validate_distances, validate_times},
    },
};

/// Density and realized covariance of one term.
#[derive(Debug, Clone, PartialEq)]
pub struct TermEvaluation {
    pub nll: f64,
    pub report: TermReport,
}

/// Negative log-density of `block` under `term` at `theta`.
///
/// # Errors
/// - [`CovError::RandomEffectLengthMismatch`] / [`CovError::ThetaCountMismatch`]
///   for slices that do not fit the term.
/// - Missing auxiliary data for OU or spatial structures.
pub fn evaluate(
    term: &CovarianceTerm, block: ArrayView1<f64>, theta: ArrayView1<f64>,
) -> CovResult<TermEvaluation> {
    check_lengths(term, block.len(), theta.len())?;
    let realized = Realized::from_term(term, theta)?;
    Ok(TermEvaluation {
        nll: realized.neg_log_density(block, term.block_size),
        report: realized.report(term.block_size),
    })
}

/// Score `block`, then overwrite it with a draw from the same covariance.
///
/// The returned density is that of the incoming values.
///
/// # Errors
/// As [`evaluate`], plus [`CovError::NotPositiveDefinite`] when the realized
/// correlation cannot be factorized.
pub fn evaluate_and_draw<R: Rng + ?Sized>(
    term: &CovarianceTerm, mut block: ArrayViewMut1<f64>, theta: ArrayView1<f64>, rng: &mut R,
) -> CovResult<TermEvaluation> {
    check_lengths(term, block.len(), theta.len())?;
    let realized = Realized::from_term(term, theta)?;
    let nll = realized.neg_log_density(block.view(), term.block_size);
    realized.draw_into(&mut block, term, rng)?;
    Ok(TermEvaluation { nll, report: realized.report(term.block_size) })
}

/// Covariance of one block realized at a theta slice.
#[derive(Debug, Clone)]
pub enum Realized {
    Independent { sd: Array1<f64>, pc_penalty: Option<f64> },
    Dense { sd: Array1<f64>, corr: Array2<f64>, factor: Option<CorrFactor> },
    /// `rho[0]` is unused; `rho[i]` links effect `i − 1` to effect `i`.
    Sequential { sd: f64, rho: Array1<f64> },
}

impl Realized {
    /// Dispatch to the structure's builder.
    ///
    /// Times and distances are rechecked against `block_size` here, since a
    /// term's fields can change after construction.
    ///
    /// # Errors
    /// Missing, mis-shaped or invalid times and distances.
    pub fn from_term(term: &CovarianceTerm, theta: ArrayView1<f64>) -> CovResult<Self> {
        let n = term.block_size;
        match term.structure {
            CovStructure::Diagonal => Ok(diagonal(theta)),
            CovStructure::PenalizedComplexity => Ok(penalized_complexity(theta)),
            CovStructure::Unstructured => Ok(unstructured(n, theta)),
            CovStructure::CompoundSymmetry => Ok(compound_symmetry(n, theta)),
            CovStructure::Toeplitz => Ok(toeplitz(n, theta)),
            CovStructure::Ar1 => Ok(ar1(n, theta)),
            CovStructure::OrnsteinUhlenbeck => {
                let times = term
                    .times
                    .as_ref()
                    .ok_or(CovError::MissingTimes { structure: term.structure.name() })?;
                validate_times(times, n)?;
                Ok(ornstein_uhlenbeck(times, theta))
            }
            CovStructure::ExponentialSpatial
            | CovStructure::GaussianSpatial
            | CovStructure::MaternSpatial => {
                let distances = term
                    .distances
                    .as_ref()
                    .ok_or(CovError::MissingDistances { structure: term.structure.name() })?;
                validate_distances(distances, n)?;
                Ok(spatial(term.structure, distances, theta))
            }
        }
    }

    /// Sum of per-replicate negative log-densities of `block`.
    pub fn neg_log_density(&self, block: ArrayView1<f64>, n: usize) -> f64 {
        block.exact_chunks(n).into_iter().map(|x| self.replicate_nll(x)).sum()
    }

    fn replicate_nll(&self, x: ArrayView1<f64>) -> f64 {
        match self {
            Realized::Independent { sd, pc_penalty } => {
                let base: f64 =
                    x.iter().zip(sd.iter()).map(|(&xi, &si)| -normal_ln_pdf(xi, 0.0, si)).sum();
                base + pc_penalty.unwrap_or(0.0)
            }
            Realized::Dense { sd, factor, .. } => match factor {
                Some(factor) => factor.neg_log_density(x, sd.view()),
                None => f64::NAN,
            },
            Realized::Sequential { sd, rho } => {
                let mut nll = -normal_ln_pdf(x[0], 0.0, *sd);
                for i in 1..x.len() {
                    let cond_sd = sd * (1.0 - rho[i] * rho[i]).sqrt();
                    nll -= normal_ln_pdf(x[i], rho[i] * x[i - 1], cond_sd);
                }
                nll
            }
        }
    }

    /// Overwrite every replicate of `block` with a fresh draw.
    pub fn draw_into<R: Rng + ?Sized>(
        &self, block: &mut ArrayViewMut1<f64>, term: &CovarianceTerm, rng: &mut R,
    ) -> CovResult<()> {
        let n = term.block_size;
        for r in 0..term.block_reps {
            let mut x = block.slice_mut(s![r * n..(r + 1) * n]);
            match self {
                Realized::Independent { sd, .. } => {
                    for (xi, &si) in x.iter_mut().zip(sd.iter()) {
                        *xi = si * rng.sample::<f64, _>(StandardNormal);
                    }
                }
                Realized::Dense { sd, factor, .. } => {
                    let factor = factor.as_ref().ok_or(CovError::NotPositiveDefinite {
                        structure: term.structure.name(),
                    })?;
                    x.assign(&factor.draw(sd.view(), rng));
                }
                Realized::Sequential { sd, rho } => {
                    x[0] = sd * rng.sample::<f64, _>(StandardNormal);
                    for i in 1..n {
                        let cond_sd = sd * (1.0 - rho[i] * rho[i]).sqrt();
                        x[i] = rho[i] * x[i - 1] + cond_sd * rng.sample::<f64, _>(StandardNormal);
                    }
                }
            }
        }
        Ok(())
    }

    /// Correlation matrix and SD vector for reporting.
    pub fn report(&self, n: usize) -> TermReport {
        match self {
            Realized::Independent { sd, .. } => {
                TermReport { corr: Array2::eye(n), sd: sd.clone() }
            }
            Realized::Dense { sd, corr, .. } => TermReport { corr: corr.clone(), sd: sd.clone() },
            Realized::Sequential { sd, rho } => {
                let corr = Array2::from_shape_fn((n, n), |(i, j)| {
                    let (lo, hi) = if i <= j { (i, j) } else { (j, i) };
                    (lo + 1..=hi).map(|k| rho[k]).product::<f64>()
                });
                TermReport { corr, sd: Array1::from_elem(n, *sd) }
            }
        }
    }
}

// ---- Structure builders ----

fn diagonal(theta: ArrayView1<f64>) -> Realized {
    Realized::Independent { sd: theta.mapv(f64::exp), pc_penalty: None }
}

/// Diagonal plus `Σ sd − Σ θ` per replicate: an exponential(1) prior on each
/// SD with its log-scale Jacobian.
fn penalized_complexity(theta: ArrayView1<f64>) -> Realized {
    let sd = theta.mapv(f64::exp);
    let penalty = sd.sum() - theta.sum();
    Realized::Independent { sd, pc_penalty: Some(penalty) }
}

fn unstructured(n: usize, theta: ArrayView1<f64>) -> Realized {
    let sd = theta.slice(s![..n]).mapv(f64::exp);
    let corr = unstructured_corr(theta.slice(s![n..]), n);
    dense(sd, corr)
}

fn compound_symmetry(n: usize, theta: ArrayView1<f64>) -> Realized {
    let sd = theta.slice(s![..n]).mapv(f64::exp);
    let rho = compound_symmetry_rho(theta[n], n);
    let corr = Array2::from_shape_fn((n, n), |(i, j)| if i == j { 1.0 } else { rho });
    dense(sd, corr)
}

fn toeplitz(n: usize, theta: ArrayView1<f64>) -> Realized {
    let sd = theta.slice(s![..n]).mapv(f64::exp);
    let lags = theta.slice(s![n..]).mapv(squash_unit);
    let corr = Array2::from_shape_fn((n, n), |(i, j)| {
        if i == j { 1.0 } else { lags[i.abs_diff(j) - 1] }
    });
    dense(sd, corr)
}

fn ar1(n: usize, theta: ArrayView1<f64>) -> Realized {
    let phi = squash_unit(theta[1]);
    let mut rho = Array1::from_elem(n, phi);
    rho[0] = 0.0;
    Realized::Sequential { sd: theta[0].exp(), rho }
}

fn ornstein_uhlenbeck(times: &Array1<f64>, theta: ArrayView1<f64>) -> Realized {
    let rate = theta[1].exp();
    let rho = Array1::from_shape_fn(times.len(), |i| {
        if i == 0 { 0.0 } else { (-rate * (times[i] - times[i - 1])).exp() }
    });
    Realized::Sequential { sd: theta[0].exp(), rho }
}

fn spatial(structure: CovStructure, distances: &Array2<f64>, theta: ArrayView1<f64>) -> Realized {
    let n = distances.nrows();
    let range = theta[1].exp();
    let kappa = if structure == CovStructure::MaternSpatial { theta[2].exp() } else { 0.0 };
    let corr = spatial_corr(structure, distances, range, kappa);
    dense(Array1::from_elem(n, theta[0].exp()), corr)
}

fn dense(sd: Array1<f64>, corr: Array2<f64>) -> Realized {
    let factor = CorrFactor::new(&corr);
    Realized::Dense { sd, corr, factor }
}

fn check_lengths(term: &CovarianceTerm, block_len: usize, theta_len: usize) -> CovResult<()> {
    if block_len != term.n_effects() {
        return Err(CovError::RandomEffectLengthMismatch {
            expected: term.n_effects(),
            found: block_len,
        });
    }
    let expected = term.structure.theta_count(term.block_size);
    if theta_len != expected {
        return Err(CovError::ThetaCountMismatch {
            structure: term.structure.name(),
            expected,
            found: theta_len,
        });
    }
    Ok(())
}
