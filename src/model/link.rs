//! Link stage: linear predictors → survival, detection and return-age
//! probabilities.
//!
//! Purpose
//! -------
//! Map the summed fixed + random linear predictors of each component
//! through its link, then fill the unknown-life-history slots by blending
//! the two known life histories with per-year mixing proportions.
//!
//! Key behaviors
//! -------------
//! - `phi[..n_known_phi] = σ(η_phi)`, `p[..n_known_p] = σ(η_p)`.
//! - `p` carries one trailing slot fixed at `0` for structurally
//!   unobservable states; PIMs point at it explicitly.
//! - Unknown slot `i` of a family is
//!   `π_y · x[src₀] + (1 − π_y) · x[src₁]`, where `π_y = σ(logit_p_subs[y])`
//!   is the subyearling proportion of year `y`.
//! - `psi` row `g` is the three-category multinomial logit of
//!   `(η_psi[g], η_psi[n_groups + g])` against the two-season baseline.
//! - The mixing logits are normal random effects; their negative
//!   log-density under `N(hyper_mean, exp(hyper_log_sd))` joins the
//!   objective.
//!
//! Invariants & assumptions
//! ------------------------
//! - Blend sources index known slots only, and years index the mixing
//!   vector; [`UnknownLifeHistoryMap::validate`] enforces both.
//! - Exactly two life-history types are blended.
use ndarray::{Array1, Array2, ArrayView1};

use crate::{
    model::errors::{ModelError, ModelResult},
    optimization::numerical_stability::{mlogit3, safe_logistic},
    random_effects::linalg::normal_ln_pdf,
};

/// Unknown-life-history slots of one probability family.
///
/// Row `i` of `sources` holds the (subyearling, yearling) known indices
/// blended into unknown slot `i`; `years[i]` selects the mixing proportion.
#[derive(Debug, Clone, PartialEq)]
pub struct BlendMap {
    pub sources: Array2<usize>,
    pub years: Array1<usize>,
}

impl BlendMap {
    /// # Errors
    /// [`ModelError::InvalidBlendMap`] when `sources` is not `n × 2` or
    /// `years` does not have `n` entries.
    pub fn new(sources: Array2<usize>, years: Array1<usize>) -> ModelResult<Self> {
        if sources.ncols() != 2 {
            return Err(ModelError::InvalidBlendMap {
                family: "unknown",
                row: 0,
                reason: "sources must have exactly two columns (subyearling, yearling)",
            });
        }
        if sources.nrows() != years.len() {
            return Err(ModelError::InvalidBlendMap {
                family: "unknown",
                row: sources.nrows().min(years.len()),
                reason: "sources and years must have the same number of rows",
            });
        }
        Ok(Self { sources, years })
    }

    pub fn empty() -> Self {
        Self { sources: Array2::zeros((0, 2)), years: Array1::zeros(0) }
    }

    pub fn len(&self) -> usize {
        self.years.len()
    }

    pub fn is_empty(&self) -> bool {
        self.years.is_empty()
    }

    fn validate(&self, family: &'static str, n_known: usize, n_years: usize) -> ModelResult<()> {
        for (row, (src, &year)) in self.sources.rows().into_iter().zip(&self.years).enumerate() {
            if src.iter().any(|&s| s >= n_known) {
                return Err(ModelError::InvalidBlendMap {
                    family,
                    row,
                    reason: "source index must point to a known life-history slot",
                });
            }
            if year >= n_years {
                return Err(ModelError::InvalidBlendMap {
                    family,
                    row,
                    reason: "year index outside the mixing-proportion vector",
                });
            }
        }
        Ok(())
    }

    fn apply(&self, values: &mut Array1<f64>, n_known: usize, subyearling: &Array1<f64>) {
        for (i, (src, &year)) in self.sources.rows().into_iter().zip(&self.years).enumerate() {
            let pi = subyearling[year];
            values[n_known + i] = pi * values[src[0]] + (1.0 - pi) * values[src[1]];
        }
    }
}

/// Blending maps for survival and detection.
#[derive(Debug, Clone, PartialEq)]
pub struct UnknownLifeHistoryMap {
    pub phi: BlendMap,
    pub p: BlendMap,
}

impl UnknownLifeHistoryMap {
    pub fn none() -> Self {
        Self { phi: BlendMap::empty(), p: BlendMap::empty() }
    }

    /// # Errors
    /// [`ModelError::InvalidBlendMap`] for sources outside the known slots or
    /// years outside `0..n_years`.
    pub fn validate(&self, n_known_phi: usize, n_known_p: usize, n_years: usize) -> ModelResult<()> {
        self.phi.validate("phi", n_known_phi, n_years)?;
        self.p.validate("p", n_known_p, n_years)
    }
}

/// Summed linear predictors of the three components.
#[derive(Debug, Clone, PartialEq)]
pub struct LinearPredictors {
    pub phi: Array1<f64>,
    pub p: Array1<f64>,
    pub psi: Array1<f64>,
}

/// Probability vectors consumed by the recursions.
///
/// - `phi`: known slots then unknown-life-history slots.
/// - `p`: known slots, unknown slots, then the fixed-zero slot.
/// - `psi`: `n_groups × 3`, columns return after 1, 2, 3 seasons.
/// - `subyearling`: per-year mixing proportions.
#[derive(Debug, Clone, PartialEq)]
pub struct Probabilities {
    pub phi: Array1<f64>,
    pub p: Array1<f64>,
    pub psi: Array2<f64>,
    pub subyearling: Array1<f64>,
}

impl Probabilities {
    /// Index of the detection slot fixed at zero.
    pub fn p_zero_index(&self) -> usize {
        self.p.len() - 1
    }

    pub fn n_groups(&self) -> usize {
        self.psi.nrows()
    }
}

/// Apply all links and the life-history blend.
///
/// # Errors
/// [`ModelError::DesignShapeMismatch`] when `eta.psi` is not `2 · n_groups`
/// long.
pub fn apply_links(
    eta: &LinearPredictors, mixing_logits: ArrayView1<f64>, blend: &UnknownLifeHistoryMap,
    n_groups: usize,
) -> ModelResult<Probabilities> {
    let subyearling = mixing_logits.mapv(safe_logistic);

    let n_known_phi = eta.phi.len();
    let mut phi = Array1::zeros(n_known_phi + blend.phi.len());
    phi.slice_mut(ndarray::s![..n_known_phi]).assign(&eta.phi.mapv(safe_logistic));
    blend.phi.apply(&mut phi, n_known_phi, &subyearling);

    let n_known_p = eta.p.len();
    let mut p = Array1::zeros(n_known_p + blend.p.len() + 1);
    p.slice_mut(ndarray::s![..n_known_p]).assign(&eta.p.mapv(safe_logistic));
    blend.p.apply(&mut p, n_known_p, &subyearling);

    let psi = psi_table(eta.psi.view(), n_groups)?;
    Ok(Probabilities { phi, p, psi, subyearling })
}

/// Three-category return-age table from `2 · n_groups` predictors.
///
/// # Errors
/// [`ModelError::DesignShapeMismatch`] for the wrong predictor length.
pub fn psi_table(eta_psi: ArrayView1<f64>, n_groups: usize) -> ModelResult<Array2<f64>> {
    if eta_psi.len() != 2 * n_groups {
        return Err(ModelError::DesignShapeMismatch {
            component: "psi",
            what: "linear predictor length",
            expected: 2 * n_groups,
            found: eta_psi.len(),
        });
    }
    let mut psi = Array2::zeros((n_groups, 3));
    for g in 0..n_groups {
        let row = mlogit3(eta_psi[g], eta_psi[n_groups + g]);
        for (k, value) in row.into_iter().enumerate() {
            psi[[g, k]] = value;
        }
    }
    Ok(psi)
}

/// `−Σ ln N(logit_y; hyper_mean, exp(hyper_log_sd))`.
pub fn mixing_neg_log_density(logits: ArrayView1<f64>, hyper_mean: f64, hyper_log_sd: f64) -> f64 {
    let sd = hyper_log_sd.exp();
    -logits.iter().map(|&x| normal_ln_pdf(x, hyper_mean, sd)).sum::<f64>()
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use ndarray::array;

    // -------------------------------------------------------------------------
    // Scope
    // -----
    // These tests cover:
    // - Logistic links, the fixed-zero detection slot, and blending.
    // - The multinomial psi table.
    // - The mixing-proportion density.
    // - Blend-map validation.
    // -------------------------------------------------------------------------

    #[test]
    // Purpose
    // -------
    // Unknown slots are convex combinations of their known sources, weighted
    // by the year's subyearling proportion; the last detection slot is 0.
    //
    // Given
    // -----
    // - Known phi = σ([0, ln 3]) = [0.5, 0.75]; one unknown phi slot blending
    //   (0, 1) in year 0 with logit 0 ⇒ π = 0.5.
    // - Known p = σ([ln 4]) = [0.8]; one unknown p slot blending (0, 0).
    //
    // Expect
    // ------
    // - phi = [0.5, 0.75, 0.625]; p = [0.8, 0.8, 0.0].
    fn links_and_blending() {
        // Arrange
        let eta = LinearPredictors {
            phi: array![0.0, 3.0_f64.ln()],
            p: array![4.0_f64.ln()],
            psi: array![0.0, 0.0],
        };
        let blend = UnknownLifeHistoryMap {
            phi: BlendMap::new(array![[0, 1]], array![0]).unwrap(),
            p: BlendMap::new(array![[0, 0]], array![0]).unwrap(),
        };

        // Act
        let probs = apply_links(&eta, array![0.0].view(), &blend, 1).unwrap();

        // Assert
        assert_relative_eq!(probs.phi, array![0.5, 0.75, 0.625], epsilon = 1e-12);
        assert_relative_eq!(probs.p, array![0.8, 0.8, 0.0], epsilon = 1e-12);
        assert_eq!(probs.p_zero_index(), 2);
        assert_relative_eq!(probs.subyearling, array![0.5], epsilon = 1e-15);
    }

    #[test]
    // Purpose
    // -------
    // psi rows are `[e₀, 1, e₁] / (e₀ + e₁ + 1)` and sum to one.
    fn psi_table_rows() {
        let eta = array![0.0, 2.0_f64.ln(), 3.0_f64.ln(), 0.0];
        let psi = psi_table(eta.view(), 2).unwrap();
        assert_relative_eq!(psi.row(0).to_owned(), array![0.2, 0.2, 0.6], epsilon = 1e-12);
        assert_relative_eq!(psi.row(1).to_owned(), array![0.5, 0.25, 0.25], epsilon = 1e-12);
        assert!(matches!(
            psi_table(eta.view(), 3),
            Err(ModelError::DesignShapeMismatch { expected: 6, found: 4, .. })
        ));
    }

    #[test]
    // Purpose
    // -------
    // The mixing density uses an exponentiated hyper-SD.
    fn mixing_density_uses_log_sd() {
        let logits = array![0.5, -1.0];
        let nll = mixing_neg_log_density(logits.view(), 0.2, 0.3_f64.ln());
        let expected = -(normal_ln_pdf(0.5, 0.2, 0.3) + normal_ln_pdf(-1.0, 0.2, 0.3));
        assert_relative_eq!(nll, expected, epsilon = 1e-12);
    }

    #[test]
    // Purpose
    // -------
    // Blend maps must reference known slots and valid years.
    fn blend_map_validation() {
        assert!(BlendMap::new(array![[0, 1, 2]], array![0]).is_err());
        assert!(BlendMap::new(array![[0, 1]], array![0, 1]).is_err());

        let map = UnknownLifeHistoryMap {
            phi: BlendMap::new(array![[0, 2]], array![0]).unwrap(),
            p: BlendMap::empty(),
        };
        assert!(matches!(
            map.validate(2, 1, 1),
            Err(ModelError::InvalidBlendMap { family: "phi", row: 0, .. })
        ));
        assert!(map.validate(3, 1, 1).is_ok());
        assert!(map.validate(3, 1, 0).is_err());
    }
}
