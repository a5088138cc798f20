//! Scaled forward recursion over latent life-history states.
//!
//! Purpose
//! -------
//! Compute the log-likelihood of each unique capture history by
//! propagating a probability vector over `{dead, state 1, state 2,
//! state 3}` through the downstream, ocean and upstream phases, and sum the
//! frequency-weighted contributions into a negative log-likelihood.
//!
//! Key behaviors
//! -------------
//! - Release: all mass in state 1.
//! - Downstream occasion `t` (from release to `n_ds_occ − 1`): survival
//!   `phi[0](t)` moves `(1 − φ)` of state 1 to dead, then detection code
//!   `y_t ∈ {0, 1}` scales state 1 by `p` or `1 − p` and dead by `1 − y_t`.
//! - Ocean occasion `n_ds_occ`: survival, then the psi row of the history's
//!   group splits state 1 into states 1, 2, 3. No observation.
//! - Upstream occasion `t`: first the observation at `t − 1` (all mass
//!   collapses onto the observed state times its `p`, or each live state
//!   is scaled by its own `1 − p`), then state-specific survival at `t`.
//! - Final occasion: detection is certain; an observed state keeps its mass
//!   and everything else is zeroed, an unobserved history keeps only dead.
//! - After every observation step the vector is renormalized and `ln u` of
//!   the pre-normalization sum is accumulated.
//! - Unknown-life-history histories stop after the downstream phase.
//!
//! Invariants & assumptions
//! ------------------------
//! - Indices have been validated (`CaptureData::validate`); the
//!   recursion indexes directly.
//! - A zero normalization sum yields `−∞`/`NaN` rather than an error.
//! - Parallel evaluation collects contributions in history order before
//!   summing, so totals do not depend on thread scheduling.
use ndarray::Array1;
use rayon::prelude::*;

use crate::model::{
    data::{CaptureData, LifeHistory},
    link::Probabilities,
};

/// Probability mass over `{dead, state 1, state 2, state 3}`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct StateProbs(pub [f64; 4]);

impl StateProbs {
    pub const DEAD: usize = 0;

    /// Conditioning on release: everything in state 1.
    pub fn released() -> Self {
        Self([0.0, 1.0, 0.0, 0.0])
    }

    pub fn total(&self) -> f64 {
        self.0.iter().sum()
    }

    /// Divide by the current sum and return its log.
    pub fn normalize(&mut self) -> f64 {
        let u = self.total();
        for v in &mut self.0 {
            *v /= u;
        }
        u.ln()
    }

    /// Survival of live state `state` with probability `phi`.
    fn survive(&mut self, state: usize, phi: f64) {
        self.0[Self::DEAD] += (1.0 - phi) * self.0[state];
        self.0[state] *= phi;
    }

    /// Keep only `state`, scaled by `weight`.
    fn collapse_onto(&mut self, state: usize, weight: f64) {
        let kept = self.0[state] * weight;
        self.0 = [0.0; 4];
        self.0[state] = kept;
    }
}

/// Log-likelihood of history `h` (not frequency-weighted).
pub fn history_log_likelihood(data: &CaptureData, h: usize, probs: &Probabilities) -> f64 {
    history_log_likelihood_with(data, h, probs, |_| {})
}

/// As [`history_log_likelihood`], calling `observe` with the state vector
/// after every renormalization.
pub fn history_log_likelihood_with<F: FnMut(&StateProbs)>(
    data: &CaptureData, h: usize, probs: &Probabilities, mut observe: F,
) -> f64 {
    let layout = data.layout;
    let history = &data.histories[h];
    let y = &history.detections;
    let pims = &data.pims;
    let phi_at = |state: usize, t: usize| probs.phi[pims.phi[state][[h, t]]];
    let p_at = |state: usize, t: usize| probs.p[pims.p[state][[h, t]]];

    let mut ps = StateProbs::released();
    let mut ll = 0.0;

    // downstream
    for t in history.release_occasion..layout.n_ds_occ {
        ps.survive(1, phi_at(0, t));
        let seen = f64::from(y[t]);
        let p = p_at(0, t);
        ps.0[1] *= p * seen + (1.0 - p) * (1.0 - seen);
        ps.0[StateProbs::DEAD] *= 1.0 - seen;
        ll += ps.normalize();
        observe(&ps);
    }
    if history.life_history == LifeHistory::Unknown {
        return ll;
    }

    // ocean
    let ocean = layout.ocean_occasion();
    ps.survive(1, phi_at(0, ocean));
    let psi = probs.psi.row(history.psi_group);
    ps.0[2] = ps.0[1] * psi[1];
    ps.0[3] = ps.0[1] * psi[2];
    ps.0[1] *= psi[0];

    // upstream: observation one step behind survival
    for t in ocean + 1..layout.n_occ {
        let obs = t - 1;
        match usize::from(y[obs]) {
            0 => {
                for state in 1..4 {
                    ps.0[state] *= 1.0 - p_at(state - 1, obs);
                }
            }
            code => ps.collapse_onto(code, p_at(code - 1, obs)),
        }
        ll += ps.normalize();
        observe(&ps);
        for state in 1..4 {
            ps.survive(state, phi_at(state - 1, t));
        }
    }

    // final occasion, certain detection
    match usize::from(y[layout.n_occ - 1]) {
        0 => {
            ps.0[1] = 0.0;
            ps.0[2] = 0.0;
            ps.0[3] = 0.0;
        }
        code => ps.collapse_onto(code, 1.0),
    }
    ll += ps.normalize();
    observe(&ps);
    ll
}

/// Per-history log-likelihoods, in history order.
pub fn history_log_likelihoods(data: &CaptureData, probs: &Probabilities, parallel: bool) -> Array1<f64> {
    let n = data.n_histories();
    let values: Vec<f64> = if parallel {
        (0..n).into_par_iter().map(|h| history_log_likelihood(data, h, probs)).collect()
    } else {
        (0..n).map(|h| history_log_likelihood(data, h, probs)).collect()
    };
    Array1::from(values)
}

/// `−Σ_h frequency_h · ℓ_h`.
pub fn neg_log_likelihood(data: &CaptureData, probs: &Probabilities, parallel: bool) -> f64 {
    let lls = history_log_likelihoods(data, probs, parallel);
    let nll = -data
        .histories
        .iter()
        .zip(lls.iter())
        .map(|(history, &ll)| f64::from(history.frequency) * ll)
        .sum::<f64>();
    if !nll.is_finite() {
        log::debug!("capture-history likelihood is not finite: {nll}");
    }
    nll
}
