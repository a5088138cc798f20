//! Cohort-level expected and simulated detection tables.
//!
//! Purpose
//! -------
//! Mirror the forward recursion at release-cohort granularity, either
//! propagating exact expectations scaled by the release count
//! ([`expected_detections`]) or drawing binomial counts at every survival,
//! return-age and detection step ([`simulate_detections`]).
//!
//! Key behaviors
//! -------------
//! - Downstream occasion `t`: survival `phi[0](t)`, then detection of the
//!   survivors. Survivors are not thinned by detection.
//! - Trap-dependent occasion `t`: survivors split into those detected at
//!   `t − 1` (detected with the cohort's trap index `p_td`) and the rest
//!   (detected with `p(t)`). A cohort released at `t` counts as detected
//!   at the previous trap and uses `p_td` throughout.
//! - Ocean: survival, then a sequential-binomial multinomial split into
//!   return states 1, 2, 3 (`ψ₁`, then `ψ₂ / (1 − ψ₁)` of the rest).
//! - Upstream occasion `t`: detection of each live state at `t − 1`, then
//!   state-specific survival at `t`.
//! - Final occasion: every live fish is detected.
//!
//! Conventions
//! -----------
//! - `det1` / `state1` columns are occasions; `state1` has one extra
//!   leading column so `state1[t + 1]` holds survivors of occasion `t`.
//! - `det2`, `det3`, `state2`, `state3` columns start at the ocean
//!   occasion.
//! - Unknown-life-history cohorts stop after the downstream phase.
//! - Cohort `i` draws from its own `StdRng::seed_from_u64(seed + i)`, so
//!   parallel and sequential simulation give identical tables.
use ndarray::{Array1, Array2};
use rand::{Rng, SeedableRng, rngs::StdRng};
use rand_distr::{Binomial, Distribution};
use rayon::prelude::*;

use crate::model::{
    data::{CohortData, LifeHistory},
    link::Probabilities,
    options::SimulationOptions,
};

/// Expected live counts and detections per cohort (rows) and occasion
/// (columns).
#[derive(Debug, Clone, PartialEq)]
pub struct ExpectedTables {
    pub state1: Array2<f64>,
    pub state2: Array2<f64>,
    pub state3: Array2<f64>,
    pub det1: Array2<f64>,
    pub det2: Array2<f64>,
    pub det3: Array2<f64>,
}

/// Simulated live counts and detections.
#[derive(Debug, Clone, PartialEq)]
pub struct SimulatedTables {
    pub state1: Array2<u64>,
    pub state2: Array2<u64>,
    pub state3: Array2<u64>,
    pub det1: Array2<u64>,
    pub det2: Array2<u64>,
    pub det3: Array2<u64>,
}

struct CohortRows<T> {
    state1: Array1<T>,
    state2: Array1<T>,
    state3: Array1<T>,
    det1: Array1<T>,
    det2: Array1<T>,
    det3: Array1<T>,
}

/// Expected detection tables under `probs`.
pub fn expected_detections(data: &CohortData, probs: &Probabilities, parallel: bool) -> ExpectedTables {
    let rows = collect_rows(data.n_cohorts(), parallel, |n| expected_cohort(data, n, probs));
    ExpectedTables {
        state1: stack(&rows, |r| &r.state1),
        state2: stack(&rows, |r| &r.state2),
        state3: stack(&rows, |r| &r.state3),
        det1: stack(&rows, |r| &r.det1),
        det2: stack(&rows, |r| &r.det2),
        det3: stack(&rows, |r| &r.det3),
    }
}

/// Simulated tables under `probs`, seeded per cohort from `opts`.
pub fn simulate_detections(
    data: &CohortData, probs: &Probabilities, opts: &SimulationOptions, parallel: bool,
) -> SimulatedTables {
    let rows = collect_rows(data.n_cohorts(), parallel, |n| {
        let mut rng = StdRng::seed_from_u64(opts.cohort_seed(n));
        simulate_cohort(data, n, probs, &mut rng)
    });
    SimulatedTables {
        state1: stack(&rows, |r| &r.state1),
        state2: stack(&rows, |r| &r.state2),
        state3: stack(&rows, |r| &r.state3),
        det1: stack(&rows, |r| &r.det1),
        det2: stack(&rows, |r| &r.det2),
        det3: stack(&rows, |r| &r.det3),
    }
}

// ---- Per-cohort recursions ----

fn expected_cohort(data: &CohortData, n: usize, probs: &Probabilities) -> CohortRows<f64> {
    let layout = data.layout;
    let cohort = &data.cohorts[n];
    let pims = &data.pims;
    let phi_at = |state: usize, t: usize| probs.phi[pims.phi[state][[n, t]]];
    let p_at = |state: usize, t: usize| probs.p[pims.p[state][[n, t]]];
    let released = cohort.release_count as f64;
    let n_post = layout.n_post_ocean();

    let mut rows = CohortRows {
        state1: Array1::zeros(layout.n_occ + 1),
        state2: Array1::zeros(n_post),
        state3: Array1::zeros(n_post),
        det1: Array1::zeros(layout.n_occ),
        det2: Array1::zeros(n_post),
        det3: Array1::zeros(n_post),
    };
    rows.state1[cohort.release_occasion] = released;

    let mut s1 = 1.0;
    for t in cohort.release_occasion..layout.n_ds_occ {
        s1 *= phi_at(0, t);
        let alive = s1 * released;
        rows.state1[t + 1] = alive;
        rows.det1[t] = match data.trap_dependence.at(t) {
            Some(td) => {
                let p_td = probs.p[td.detected_p_index[n]];
                if t == cohort.release_occasion {
                    p_td * alive
                } else {
                    let p_prev = p_at(0, t - 1);
                    p_at(0, t) * alive * (1.0 - p_prev) + p_td * alive * p_prev
                }
            }
            None => p_at(0, t) * alive,
        };
    }
    if cohort.life_history == LifeHistory::Unknown {
        return rows;
    }

    let ocean = layout.ocean_occasion();
    let psi = probs.psi.row(cohort.psi_group);
    s1 *= phi_at(0, ocean);
    let mut s2 = s1 * psi[1];
    let mut s3 = s1 * psi[2];
    s1 *= psi[0];
    rows.state1[ocean + 1] = s1 * released;
    rows.state2[0] = s2 * released;
    rows.state3[0] = s3 * released;

    for t in ocean + 1..layout.n_occ {
        let obs = t - 1;
        rows.det1[obs] = s1 * p_at(0, obs) * released;
        rows.det2[obs - ocean] = s2 * p_at(1, obs) * released;
        rows.det3[obs - ocean] = s3 * p_at(2, obs) * released;
        s1 *= phi_at(0, t);
        s2 *= phi_at(1, t);
        s3 *= phi_at(2, t);
        rows.state1[t + 1] = s1 * released;
        rows.state2[t - ocean] = s2 * released;
        rows.state3[t - ocean] = s3 * released;
    }

    rows.det1[layout.n_occ - 1] = s1 * released;
    rows.det2[n_post - 1] = s2 * released;
    rows.det3[n_post - 1] = s3 * released;
    rows
}

fn simulate_cohort<R: Rng + ?Sized>(
    data: &CohortData, n: usize, probs: &Probabilities, rng: &mut R,
) -> CohortRows<u64> {
    let layout = data.layout;
    let cohort = &data.cohorts[n];
    let pims = &data.pims;
    let phi_at = |state: usize, t: usize| probs.phi[pims.phi[state][[n, t]]];
    let p_at = |state: usize, t: usize| probs.p[pims.p[state][[n, t]]];
    let n_post = layout.n_post_ocean();

    let mut rows = CohortRows {
        state1: Array1::zeros(layout.n_occ + 1),
        state2: Array1::zeros(n_post),
        state3: Array1::zeros(n_post),
        det1: Array1::zeros(layout.n_occ),
        det2: Array1::zeros(n_post),
        det3: Array1::zeros(n_post),
    };
    rows.state1[cohort.release_occasion] = cohort.release_count;

    for t in cohort.release_occasion..layout.n_ds_occ {
        let phi = phi_at(0, t);
        match data.trap_dependence.at(t) {
            Some(td) if t == cohort.release_occasion => {
                let p_td = probs.p[td.detected_p_index[n]];
                rows.state1[t + 1] = binomial(rng, rows.state1[t], phi);
                rows.det1[t] = binomial(rng, rows.state1[t + 1], p_td);
            }
            Some(td) => {
                let p_td = probs.p[td.detected_p_index[n]];
                let seen_before = rows.det1[t - 1];
                let not_seen_surv = binomial(rng, rows.state1[t].saturating_sub(seen_before), phi);
                let seen_surv = binomial(rng, seen_before, phi);
                rows.state1[t + 1] = not_seen_surv + seen_surv;
                rows.det1[t] =
                    binomial(rng, not_seen_surv, p_at(0, t)) + binomial(rng, seen_surv, p_td);
            }
            None => {
                rows.state1[t + 1] = binomial(rng, rows.state1[t], phi);
                rows.det1[t] = binomial(rng, rows.state1[t + 1], p_at(0, t));
            }
        }
    }
    if cohort.life_history == LifeHistory::Unknown {
        return rows;
    }

    let ocean = layout.ocean_occasion();
    let psi = probs.psi.row(cohort.psi_group);
    let ocean_surv = binomial(rng, rows.state1[ocean], phi_at(0, ocean));
    rows.state1[ocean + 1] = binomial(rng, ocean_surv, psi[0]);
    let rest = ocean_surv - rows.state1[ocean + 1];
    rows.state2[0] = binomial(rng, rest, psi[1] / (1.0 - psi[0]));
    rows.state3[0] = rest - rows.state2[0];

    for t in ocean + 1..layout.n_occ {
        let obs = t - 1;
        rows.det1[obs] = binomial(rng, rows.state1[obs + 1], p_at(0, obs));
        rows.det2[obs - ocean] = binomial(rng, rows.state2[obs - ocean], p_at(1, obs));
        rows.det3[obs - ocean] = binomial(rng, rows.state3[obs - ocean], p_at(2, obs));
        rows.state1[t + 1] = binomial(rng, rows.state1[t], phi_at(0, t));
        rows.state2[t - ocean] = binomial(rng, rows.state2[t - ocean - 1], phi_at(1, t));
        rows.state3[t - ocean] = binomial(rng, rows.state3[t - ocean - 1], phi_at(2, t));
    }

    rows.det1[layout.n_occ - 1] = rows.state1[layout.n_occ];
    rows.det2[n_post - 1] = rows.state2[n_post - 1];
    rows.det3[n_post - 1] = rows.state3[n_post - 1];
    rows
}

// ---- Helper methods ----

/// `Binomial(n, p)` draw with `p` clamped into `[0, 1]`; a NaN probability
/// draws nothing.
fn binomial<R: Rng + ?Sized>(rng: &mut R, n: u64, p: f64) -> u64 {
    if n == 0 {
        return 0;
    }
    if p.is_nan() {
        log::warn!("skipping binomial draw of {n} trials with NaN probability");
        return 0;
    }
    match Binomial::new(n, p.clamp(0.0, 1.0)) {
        Ok(dist) => dist.sample(rng),
        Err(err) => {
            log::warn!("skipping binomial draw of {n} trials: {err}");
            0
        }
    }
}

fn collect_rows<T, F>(n: usize, parallel: bool, row: F) -> Vec<CohortRows<T>>
where
    T: Send,
    F: Fn(usize) -> CohortRows<T> + Sync + Send,
{
    if parallel {
        (0..n).into_par_iter().map(row).collect()
    } else {
        (0..n).map(row).collect()
    }
}

fn stack<T: Clone>(
    rows: &[CohortRows<T>], field: impl Fn(&CohortRows<T>) -> &Array1<T>,
) -> Array2<T> {
    let n_cols = rows.first().map_or(0, |r| field(r).len());
    Array2::from_shape_fn((rows.len(), n_cols), |(i, j)| field(&rows[i])[j].clone())
}
