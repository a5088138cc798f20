//! Spatial correlation kernels.
//!
//! Exponential, squared-exponential and Matérn correlation as functions of
//! distance, plus the modified Bessel function of the second kind that the
//! Matérn kernel needs. All kernels return `1` at distance zero on the
//! diagonal; Matérn replaces a zero scaled distance `d / range` off the diagonal
//! by `1e-10` so the Bessel term stays finite.
use ndarray::Array2;
use statrs::function::gamma::ln_gamma;

use crate::random_effects::term::CovStructure;

const BESSEL_STEP: f64 = 0.05;
const BESSEL_MAX_STEPS: usize = 200_000;
const MATERN_MIN_SCALED: f64 = 1e-10;

/// `exp(−d / range)`.
pub fn exponential(d: f64, range: f64) -> f64 {
    (-d / range).exp()
}

/// `exp(−(d / range)²)`.
pub fn gaussian(d: f64, range: f64) -> f64 {
    let y = d / range;
    (-y * y).exp()
}

/// Matérn correlation `y^κ K_κ(y) / (Γ(κ) 2^{κ−1})` with `y = d / range`.
pub fn matern(d: f64, range: f64, kappa: f64) -> f64 {
    let y = d / range;
    let y = if y == 0.0 { MATERN_MIN_SCALED } else { y };
    let log_val = kappa * y.ln() + bessel_k(kappa, y).ln()
        - ln_gamma(kappa)
        - (kappa - 1.0) * std::f64::consts::LN_2;
    log_val.exp()
}

/// Modified Bessel function of the second kind, `K_ν(x)` for `x > 0`.
///
/// Trapezoid rule on `K_ν(x) = ∫₀^∞ exp(−x cosh t) cosh(νt) dt`. The
/// integrand is analytic and decays doubly exponentially, so a fixed step
/// gives near machine precision. Returns `NaN` for `x ≤ 0` or non-finite
/// input.
pub fn bessel_k(nu: f64, x: f64) -> f64 {
    if !(x > 0.0) || !x.is_finite() || !nu.is_finite() {
        return f64::NAN;
    }
    let nu = nu.abs();
    let f = |t: f64| {
        let base = -x * t.cosh();
        0.5 * ((base + nu * t).exp() + (base - nu * t).exp())
    };
    // integrand peaks at sinh t = ν / x
    let peak = (nu / x).asinh();
    let mut sum = 0.5 * f(0.0);
    for k in 1..BESSEL_MAX_STEPS {
        let t = k as f64 * BESSEL_STEP;
        let term = f(t);
        sum += term;
        if t > peak && term <= sum * 1e-17 {
            break;
        }
    }
    sum * BESSEL_STEP
}

/// Correlation matrix of a spatial structure at `distances`.
///
/// `range` and `kappa` are already on the natural scale. Non-spatial
/// structures fall back to the exponential kernel.
pub fn spatial_corr(
    structure: CovStructure, distances: &Array2<f64>, range: f64, kappa: f64,
) -> Array2<f64> {
    let n = distances.nrows();
    Array2::from_shape_fn((n, n), |(i, j)| {
        if i == j {
            return 1.0;
        }
        let d = distances[[i, j]];
        match structure {
            CovStructure::GaussianSpatial => gaussian(d, range),
            CovStructure::MaternSpatial => matern(d, range, kappa),
            _ => exponential(d, range),
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use ndarray::array;
    use std::f64::consts::PI;

    // -------------------------------------------------------------------------
    // Scope
    // -----
    // These tests cover:
    // - `bessel_k` against half-integer closed forms.
    // - The Matérn kernel collapsing to the exponential kernel at κ = 1/2.
    // - Diagonal handling in `spatial_corr` and the zero-distance clamp.
    // -------------------------------------------------------------------------

    #[test]
    // Purpose
    // -------
    // Half-integer orders have elementary closed forms.
    //
    // Expect
    // ------
    // - K_{1/2}(x) = √(π/2x) e^{−x}
    // - K_{3/2}(x) = √(π/2x) e^{−x} (1 + 1/x)
    fn bessel_k_half_integer_orders() {
        for &x in &[0.05, 0.3, 1.0, 2.5, 10.0] {
            let base = (PI / (2.0 * x)).sqrt() * (-x).exp();
            assert_relative_eq!(bessel_k(0.5, x), base, max_relative = 1e-9);
            assert_relative_eq!(bessel_k(1.5, x), base * (1.0 + 1.0 / x), max_relative = 1e-9);
        }
        assert!(bessel_k(1.0, 0.0).is_nan());
    }

    #[test]
    // Purpose
    // -------
    // Matérn with smoothness 1/2 is the exponential kernel.
    fn matern_half_is_exponential() {
        for &d in &[0.1, 0.7, 2.0, 5.0] {
            assert_relative_eq!(matern(d, 1.3, 0.5), exponential(d, 1.3), max_relative = 1e-8);
        }
    }

    #[test]
    // Purpose
    // -------
    // Zero off-diagonal distances give a correlation of (nearly) one and the
    // diagonal is exactly one.
    fn spatial_corr_diagonal_and_zero_distance() {
        let d = array![[0.0, 0.0], [0.0, 0.0]];
        let corr = spatial_corr(CovStructure::MaternSpatial, &d, 1.0, 1.5);
        assert_eq!(corr[[0, 0]], 1.0);
        assert_relative_eq!(corr[[0, 1]], 1.0, max_relative = 1e-6);

        let d = array![[0.0, 2.0], [2.0, 0.0]];
        let corr = spatial_corr(CovStructure::GaussianSpatial, &d, 2.0, 0.0);
        assert_relative_eq!(corr[[1, 0]], (-1.0_f64).exp(), epsilon = 1e-14);
    }

    #[test]
    // Purpose
    // -------
    // A zero distance is clamped after scaling by the range, so the value
    // at coincident locations does not depend on the range.
    fn matern_zero_distance_ignores_range() {
        let small = matern(0.0, 1e-3, 1.5);
        let large = matern(0.0, 10.0, 1.5);
        assert_eq!(small, large);
        assert_relative_eq!(small, 1.0, max_relative = 1e-6);
    }
}
