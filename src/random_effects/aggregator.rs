//! Reduction over an ordered collection of covariance terms.
//!
//! Purpose
//! -------
//! Slice a flat random-effect vector and a flat theta vector by each term's
//! declared sizes, score every slice with the covariance engine, and sum.
//! The aggregator knows nothing about which model component it serves.
//!
//! Key behaviors
//! -------------
//! - Offsets are computed once in [`RandomEffectTerms::new`]; evaluation is
//!   then direct slicing.
//! - A term with `theta_count == 0` reuses the most recent term's own theta
//!   slice. The carried slice is explicit state of the offset pass.
//! - Shared-theta terms return `None` in the report list; every other term
//!   returns its realized correlation and SDs.
//!
//! Invariants & assumptions
//! ------------------------
//! - `b.len() == Σ block_size × block_reps` and `theta.len() == Σ
//!   theta_count`; mismatches are shape errors.
//! - Term `k` in simulation mode draws from `StdRng::seed_from_u64(seed + k)`.
use std::ops::Range;

use ndarray::{ArrayView1, ArrayViewMut1, s};
use rand::{SeedableRng, rngs::StdRng};

use crate::random_effects::{
    engine::{evaluate, evaluate_and_draw},
    errors::{CovError, CovResult},
    term::{CovarianceTerm, TermReport},
};

/// Summed density over all terms plus per-term reports.
#[derive(Debug, Clone, PartialEq)]
pub struct AggregateEvaluation {
    pub nll: f64,
    pub reports: Vec<Option<TermReport>>,
}

#[derive(Debug, Clone, PartialEq)]
struct TermSlice {
    effects: Range<usize>,
    theta: Range<usize>,
    shared: bool,
}

/// Ordered covariance terms with precomputed slice offsets.
#[derive(Debug, Clone, PartialEq)]
pub struct RandomEffectTerms {
    terms: Vec<CovarianceTerm>,
    slices: Vec<TermSlice>,
    n_effects: usize,
    n_theta: usize,
}

impl RandomEffectTerms {
    /// Compute effect and theta offsets for `terms`.
    ///
    /// Errors
    /// ------
    /// - [`CovError::NoPrecedingThetaSlice`] if the first term shares theta.
    /// - [`CovError::ThetaCountMismatch`] if a shared-theta term's structure
    ///   needs a different number of values than the slice it borrows.
    pub fn new(terms: Vec<CovarianceTerm>) -> CovResult<Self> {
        let mut slices = Vec::with_capacity(terms.len());
        let mut effect_offset = 0;
        let mut theta_offset = 0;
        let mut previous: Option<Range<usize>> = None;

        for (k, term) in terms.iter().enumerate() {
            let effects = effect_offset..effect_offset + term.n_effects();
            effect_offset = effects.end;

            let (theta, shared) = if term.shares_theta() {
                let borrowed = previous.clone().ok_or(CovError::NoPrecedingThetaSlice { term: k })?;
                let expected = term.structure.theta_count(term.block_size);
                if borrowed.len() != expected {
                    return Err(CovError::ThetaCountMismatch {
                        structure: term.structure.name(),
                        expected,
                        found: borrowed.len(),
                    });
                }
                (borrowed, true)
            } else {
                let own = theta_offset..theta_offset + term.theta_count;
                theta_offset = own.end;
                previous = Some(own.clone());
                (own, false)
            };
            slices.push(TermSlice { effects, theta, shared });
        }

        Ok(Self { terms, slices, n_effects: effect_offset, n_theta: theta_offset })
    }

    /// No terms: zero effects, zero theta, zero density.
    pub fn empty() -> Self {
        Self { terms: Vec::new(), slices: Vec::new(), n_effects: 0, n_theta: 0 }
    }

    pub fn terms(&self) -> &[CovarianceTerm] {
        &self.terms
    }

    pub fn len(&self) -> usize {
        self.terms.len()
    }

    pub fn is_empty(&self) -> bool {
        self.terms.is_empty()
    }

    /// Length of the random-effect vector these terms cover.
    pub fn n_effects(&self) -> usize {
        self.n_effects
    }

    /// Length of the theta vector these terms consume.
    pub fn n_theta(&self) -> usize {
        self.n_theta
    }

    /// Total negative log-density of `b` at `theta`.
    ///
    /// # Errors
    /// Shape errors from [`check`](Self::check) or the engine.
    pub fn neg_log_density(
        &self, b: ArrayView1<f64>, theta: ArrayView1<f64>,
    ) -> CovResult<AggregateEvaluation> {
        self.check(b.len(), theta.len())?;
        let mut nll = 0.0;
        let mut reports = Vec::with_capacity(self.terms.len());
        for (term, slice) in self.terms.iter().zip(&self.slices) {
            let eval = evaluate(
                term,
                b.slice(s![slice.effects.clone()]),
                theta.slice(s![slice.theta.clone()]),
            )?;
            nll += eval.nll;
            reports.push((!slice.shared).then_some(eval.report));
        }
        Ok(AggregateEvaluation { nll, reports })
    }

    /// Score `b`, then overwrite every term's segment with a fresh draw.
    ///
    /// # Errors
    /// Shape errors, or [`CovError::NotPositiveDefinite`] for a term whose
    /// correlation cannot be factorized.
    pub fn simulate(
        &self, mut b: ArrayViewMut1<f64>, theta: ArrayView1<f64>, seed: u64,
    ) -> CovResult<AggregateEvaluation> {
        self.check(b.len(), theta.len())?;
        let mut nll = 0.0;
        let mut reports = Vec::with_capacity(self.terms.len());
        for (k, (term, slice)) in self.terms.iter().zip(&self.slices).enumerate() {
            let mut rng = StdRng::seed_from_u64(seed.wrapping_add(k as u64));
            let eval = evaluate_and_draw(
                term,
                b.slice_mut(s![slice.effects.clone()]),
                theta.slice(s![slice.theta.clone()]),
                &mut rng,
            )?;
            nll += eval.nll;
            reports.push((!slice.shared).then_some(eval.report));
        }
        Ok(AggregateEvaluation { nll, reports })
    }

    /// Validate vector lengths against the summed term sizes.
    pub fn check(&self, b_len: usize, theta_len: usize) -> CovResult<()> {
        if b_len != self.n_effects {
            return Err(CovError::RandomEffectLengthMismatch {
                expected: self.n_effects,
                found: b_len,
            });
        }
        if theta_len != self.n_theta {
            return Err(CovError::ThetaLengthMismatch { expected: self.n_theta, found: theta_len });
        }
        Ok(())
    }
}

impl Default for RandomEffectTerms {
    fn default() -> Self {
        Self::empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::random_effects::{linalg::LN_2PI, term::CovStructure};
    use approx::assert_relative_eq;
    use ndarray::{Array1, array, concatenate, Axis};

    // -------------------------------------------------------------------------
    // Scope
    // -----
    // These tests cover:
    // - The total as a pure sum of per-term engine outputs, independent of
    //   term order.
    // - Penalized complexity scored through the aggregate.
    // - The shared-theta carry-over rule and its failure mode.
    // - Vector-length validation.
    // - Seeded, reproducible simulation.
    // -------------------------------------------------------------------------

    fn diag_term() -> CovarianceTerm {
        CovarianceTerm::simple(CovStructure::Diagonal, 2, 2).unwrap()
    }

    fn ar1_term() -> CovarianceTerm {
        CovarianceTerm::simple(CovStructure::Ar1, 3, 1).unwrap()
    }

    #[test]
    // Purpose
    // -------
    // The aggregate equals the per-term sum and does not depend on term order
    // when slices move with their terms.
    fn total_is_order_independent_sum() {
        // Arrange
        let b_diag = array![0.1, -0.4, 0.9, 0.2];
        let b_ar1 = array![0.5, 0.3, -0.6];
        let th_diag = array![0.2, -0.3];
        let th_ar1 = array![-0.1, 0.8];

        let forward = RandomEffectTerms::new(vec![diag_term(), ar1_term()]).unwrap();
        let reversed = RandomEffectTerms::new(vec![ar1_term(), diag_term()]).unwrap();

        // Act
        let f = forward
            .neg_log_density(
                concatenate![Axis(0), b_diag, b_ar1].view(),
                concatenate![Axis(0), th_diag, th_ar1].view(),
            )
            .unwrap();
        let r = reversed
            .neg_log_density(
                concatenate![Axis(0), b_ar1, b_diag].view(),
                concatenate![Axis(0), th_ar1, th_diag].view(),
            )
            .unwrap();

        // Assert
        let parts = evaluate(&diag_term(), b_diag.view(), th_diag.view()).unwrap().nll
            + evaluate(&ar1_term(), b_ar1.view(), th_ar1.view()).unwrap().nll;
        assert_relative_eq!(f.nll, parts, epsilon = 1e-12);
        assert_relative_eq!(r.nll, parts, epsilon = 1e-12);
        assert_eq!(f.reports.len(), 2);
        assert!(f.reports.iter().all(Option::is_some));
    }

    #[test]
    // Purpose
    // -------
    // A zero-theta term consumes no theta and reuses the preceding slice.
    //
    // Given
    // -----
    // - Two diag(2, 2) terms, the second sharing theta.
    //
    // Expect
    // ------
    // - n_theta = 2; total equals two evaluations with the same theta;
    //   the shared term reports `None`.
    fn shared_theta_reuses_previous_slice() {
        let shared = CovarianceTerm::new(CovStructure::Diagonal, 2, 2, 0, None, None).unwrap();
        let terms = RandomEffectTerms::new(vec![diag_term(), shared]).unwrap();
        let b1 = array![0.1, -0.4, 0.9, 0.2];
        let b2 = array![-1.0, 0.3, 0.0, 0.7];
        let th = array![0.4, -0.2];

        let agg = terms
            .neg_log_density(concatenate![Axis(0), b1, b2].view(), th.view())
            .unwrap();

        assert_eq!(terms.n_theta(), 2);
        assert_eq!(terms.n_effects(), 8);
        let expected = evaluate(&diag_term(), b1.view(), th.view()).unwrap().nll
            + evaluate(&diag_term(), b2.view(), th.view()).unwrap().nll;
        assert_relative_eq!(agg.nll, expected, epsilon = 1e-12);
        assert!(agg.reports[0].is_some());
        assert!(agg.reports[1].is_none());
    }

    #[test]
    // Purpose
    // -------
    // A penalized-complexity term scores end to end as independent normals
    // plus the exponential prior on each SD, charged once per replicate.
    //
    // Given
    // -----
    // - pc(2, 3) after an ar1 term; θ_pc = (0.3, −0.5).
    //
    // Expect
    // ------
    // - pc share = Σ_k [½ ln 2π + θ_{k mod 2} + ½ (b_k / sd_{k mod 2})²]
    //   + 3 (Σ sd − Σ θ); the pc report has unit correlation.
    fn penalized_complexity_through_aggregate() {
        // Arrange
        let pc = CovarianceTerm::simple(CovStructure::PenalizedComplexity, 2, 3).unwrap();
        let terms = RandomEffectTerms::new(vec![ar1_term(), pc]).unwrap();
        let b_ar1 = array![0.5, 0.3, -0.6];
        let th_ar1 = array![-0.1, 0.8];
        let b_pc = array![0.4, -1.2, 0.0, 0.7, -0.3, 2.1];
        let th_pc = array![0.3, -0.5];

        // Act
        let agg = terms
            .neg_log_density(
                concatenate![Axis(0), b_ar1, b_pc].view(),
                concatenate![Axis(0), th_ar1, th_pc].view(),
            )
            .unwrap();

        // Assert
        let sd = th_pc.mapv(f64::exp);
        let normals: f64 = b_pc
            .iter()
            .enumerate()
            .map(|(k, &x)| 0.5 * LN_2PI + th_pc[k % 2] + 0.5 * (x / sd[k % 2]).powi(2))
            .sum();
        let penalty = 3.0 * (sd.sum() - th_pc.sum());
        let ar1 = evaluate(&ar1_term(), b_ar1.view(), th_ar1.view()).unwrap().nll;
        assert_relative_eq!(agg.nll, ar1 + normals + penalty, epsilon = 1e-12);
        let report = agg.reports[1].as_ref().unwrap();
        assert_eq!(report.corr, ndarray::Array2::<f64>::eye(2));
        assert_relative_eq!(report.sd, sd, epsilon = 1e-15);
    }

    #[test]
    // Purpose
    // -------
    // A leading shared-theta term has nothing to borrow.
    fn leading_shared_theta_is_an_error() {
        let shared = CovarianceTerm::new(CovStructure::Diagonal, 2, 2, 0, None, None).unwrap();
        assert_eq!(
            RandomEffectTerms::new(vec![shared, diag_term()]),
            Err(CovError::NoPrecedingThetaSlice { term: 0 })
        );
    }

    #[test]
    // Purpose
    // -------
    // Borrowing a slice of the wrong length is a theta-count error.
    fn shared_theta_must_fit_structure() {
        let shared_cs = CovarianceTerm::new(CovStructure::CompoundSymmetry, 2, 1, 0, None, None).unwrap();
        assert_eq!(
            RandomEffectTerms::new(vec![diag_term(), shared_cs]),
            Err(CovError::ThetaCountMismatch { structure: "cs", expected: 3, found: 2 })
        );
    }

    #[test]
    // Purpose
    // -------
    // Vector lengths must match the summed term sizes.
    fn vector_lengths_are_checked() {
        let terms = RandomEffectTerms::new(vec![diag_term(), ar1_term()]).unwrap();
        assert_eq!(
            terms.neg_log_density(Array1::zeros(6).view(), Array1::zeros(4).view()),
            Err(CovError::RandomEffectLengthMismatch { expected: 7, found: 6 })
        );
        assert_eq!(
            terms.neg_log_density(Array1::zeros(7).view(), Array1::zeros(5).view()),
            Err(CovError::ThetaLengthMismatch { expected: 4, found: 5 })
        );
    }

    #[test]
    // Purpose
    // -------
    // Empty collections contribute nothing.
    fn empty_terms_score_zero() {
        let agg = RandomEffectTerms::empty()
            .neg_log_density(Array1::zeros(0).view(), Array1::zeros(0).view())
            .unwrap();
        assert_eq!(agg.nll, 0.0);
        assert!(agg.reports.is_empty());
    }

    #[test]
    // Purpose
    // -------
    // Simulation is reproducible under a seed and differs across seeds.
    fn simulation_is_seeded() {
        let terms = RandomEffectTerms::new(vec![diag_term(), ar1_term()]).unwrap();
        let theta = array![0.2, -0.3, -0.1, 0.8];
        let mut a = Array1::zeros(7);
        let mut b = Array1::zeros(7);
        let mut c = Array1::zeros(7);

        terms.simulate(a.view_mut(), theta.view(), 100).unwrap();
        terms.simulate(b.view_mut(), theta.view(), 100).unwrap();
        terms.simulate(c.view_mut(), theta.view(), 101).unwrap();

        assert_eq!(a, b);
        assert_ne!(a, c);
    }
}
