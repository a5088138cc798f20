//! Numerical stability utilities.
//!
//! Provides overflow-safe versions of the link and squashing transforms that
//! map unconstrained optimizer coordinates into probabilities and
//! correlations. Every transform here is a plain `f64 -> f64` map (or a
//! small fixed-size variant of one) so it can sit inside the per-occasion
//! inner loops of the likelihood without allocation.
//!
//! # Provided items
//! - [`EIGEN_EPS`]: eigenvalue floor used when pseudo-inverting observed
//!   information matrices.
//! - [`safe_logistic(x)`]: inverse-logit `1 / (1 + exp(-x))`, evaluated on
//!   the branch that cannot overflow.
//! - [`squash_unit(x)`]: `x / sqrt(1 + x²)`, mapping ℝ → (−1, 1).
//! - [`compound_symmetry_rho(x, n)`]: maps ℝ into the positive-definite
//!   range `(−1/(n−1), 1)` of an `n × n` exchangeable correlation.
//! - [`mlogit3(eta_1, eta_3)`]: three-category multinomial logit against
//!   an implicit baseline category.

/// Eigenvalue floor for pseudo-inverses of observed information.
///
/// Eigenvalues at or below this threshold are treated as zero when
/// computing standard errors.
pub const EIGEN_EPS: f64 = 1e-10;

/// Numerically stable logistic function `σ(x) = 1 / (1 + exp(-x))`.
///
/// - For `x ≥ 0` evaluates `1 / (1 + exp(-x))`.
/// - For `x < 0` evaluates `exp(x) / (1 + exp(x))`.
///
/// Either branch only exponentiates a non-positive number, so the result
/// never overflows and stays inside `[0, 1]`.
pub fn safe_logistic(x: f64) -> f64 {
    if x >= 0.0 {
        1.0 / (1.0 + (-x).exp())
    } else {
        let e = x.exp();
        e / (1.0 + e)
    }
}

/// Smooth map from ℝ onto the open interval `(−1, 1)`: `x / sqrt(1 + x²)`.
///
/// Used for AR(1) coefficients and Toeplitz lag correlations.
pub fn squash_unit(x: f64) -> f64 {
    x / (1.0 + x * x).sqrt()
}

/// Exchangeable (compound-symmetry) correlation for an `n × n` block.
///
/// Returns `σ(x)·(1 + a) − a` with `a = 1 / (n − 1)`, which covers exactly
/// the interval `(−1/(n−1), 1)` on which the block stays positive definite.
/// For `n ≤ 1` there is no off-diagonal entry and `0.0` is returned.
pub fn compound_symmetry_rho(x: f64, n: usize) -> f64 {
    if n <= 1 {
        return 0.0;
    }
    let a = 1.0 / (n as f64 - 1.0);
    safe_logistic(x) * (1.0 + a) - a
}

/// Three-category multinomial logit with the middle category as baseline.
///
/// Given linear predictors `eta_1` (first category) and `eta_3` (third
/// category), returns
/// `[e₁ / d, 1 / d, e₃ / d]` with `e_k = exp(eta_k)` and `d = e₁ + e₃ + 1`.
/// The three entries are non-negative and sum to one whenever the
/// exponentials are finite.
pub fn mlogit3(eta_1: f64, eta_3: f64) -> [f64; 3] {
    let e1 = eta_1.exp();
    let e3 = eta_3.exp();
    let denom = e1 + e3 + 1.0;
    [e1 / denom, 1.0 / denom, e3 / denom]
}
