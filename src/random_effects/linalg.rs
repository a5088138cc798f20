//! Dense Gaussian helpers for the covariance engine.
//!
//! Purpose
//! -------
//! Provide the few linear-algebra and density primitives the covariance
//! structures share: a Cholesky factor of a correlation matrix with its log
//! determinant, the scaled multivariate-normal negative log-density, a
//! correlated draw, the unstructured correlation transform, and a
//! univariate normal log-density.
//!
//! Conventions
//! -----------
//! - Correlation matrices are `ndarray::Array2<f64>`; factorizations go
//!   through `nalgebra` and come back as plain `f64` or `ndarray` values.
//! - Failure to factorize is `None`; density callers turn that into a
//!   non-finite value, simulation callers into an error.
use nalgebra::{DMatrix, DVector};
use ndarray::{Array1, Array2, ArrayView1};
use rand::Rng;
use rand_distr::StandardNormal;
use statrs::distribution::{Continuous, Normal};

/// `ln(2π)`.
pub const LN_2PI: f64 = 1.837_877_066_409_345_5;

/// Lower Cholesky factor of a correlation matrix.
#[derive(Debug, Clone)]
pub struct CorrFactor {
    chol_l: DMatrix<f64>,
    log_det: f64,
}

impl CorrFactor {
    /// Factorize `corr`; `None` if it is not positive definite.
    pub fn new(corr: &Array2<f64>) -> Option<Self> {
        let n = corr.nrows();
        let m = DMatrix::from_fn(n, n, |i, j| corr[[i, j]]);
        let chol_l = m.cholesky()?.l();
        let log_det = 2.0 * (0..n).map(|i| chol_l[(i, i)].ln()).sum::<f64>();
        if !log_det.is_finite() {
            return None;
        }
        Some(Self { chol_l, log_det })
    }

    pub fn dim(&self) -> usize {
        self.chol_l.nrows()
    }

    /// Negative log-density of `x` under `N(0, diag(sd) R diag(sd))`.
    ///
    /// `0.5·ln|R| + 0.5·zᵀR⁻¹z + (n/2)·ln 2π + Σ ln sd_i` with `z = x / sd`.
    pub fn neg_log_density(&self, x: ArrayView1<f64>, sd: ArrayView1<f64>) -> f64 {
        let n = x.len();
        let z = DVector::from_iterator(n, x.iter().zip(sd.iter()).map(|(&xi, &si)| xi / si));
        let Some(w) = self.chol_l.solve_lower_triangular(&z) else {
            return f64::NAN;
        };
        0.5 * self.log_det
            + 0.5 * w.norm_squared()
            + 0.5 * n as f64 * LN_2PI
            + sd.iter().map(|s| s.ln()).sum::<f64>()
    }

    /// One draw from `N(0, diag(sd) R diag(sd))`.
    pub fn draw<R: Rng + ?Sized>(&self, sd: ArrayView1<f64>, rng: &mut R) -> Array1<f64> {
        let n = self.dim();
        let e = DVector::from_fn(n, |_, _| rng.sample::<f64, _>(StandardNormal));
        let z = &self.chol_l * e;
        z.iter().zip(sd.iter()).map(|(zi, si)| zi * si).collect()
    }
}

/// Normal log-density; `−∞` when `sd` is not a valid scale (zero,
/// negative or `NaN`), so negative log-densities become `+∞` rather than
/// `NaN`.
pub fn normal_ln_pdf(x: f64, mean: f64, sd: f64) -> f64 {
    Normal::new(mean, sd).map_or(f64::NEG_INFINITY, |d| d.ln_pdf(x))
}

/// Correlation matrix from `n(n−1)/2` unconstrained parameters.
///
/// A unit lower-triangular `L` is filled row by row below the diagonal;
/// the result is `D^{-1/2} L Lᵀ D^{-1/2}` with `D = diag(L Lᵀ)`. Positive
/// definite for any finite input.
pub fn unstructured_corr(params: ArrayView1<f64>, n: usize) -> Array2<f64> {
    let mut l = Array2::<f64>::eye(n);
    let mut k = 0;
    for i in 0..n {
        for j in 0..i {
            l[[i, j]] = params[k];
            k += 1;
        }
    }
    let llt = l.dot(&l.t());
    let scale: Array1<f64> = llt.diag().mapv(|v| 1.0 / v.sqrt());
    Array2::from_shape_fn((n, n), |(i, j)| llt[[i, j]] * scale[i] * scale[j])
}
