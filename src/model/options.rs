//! Model options — configuration for fitting and simulation.
//!
//! Purpose
//! -------
//! Keep run-time knobs out of the recursions: optimizer settings and the
//! parallel switch for fitting ([`ModelOptions`]), and seed plus
//! random-effect redraw policy for simulation ([`SimulationOptions`]).
//!
//! Invariants & assumptions
//! ------------------------
//! - [`ModelOptions`] relies on `MLEOptions` having been validated by its
//!   own builder.
//! - Parallel and sequential evaluation give the same totals: per-history
//!   contributions are collected in history order before summation.
//!
//! Conventions
//! -----------
//! - Cohort `i` draws from `StdRng::seed_from_u64(seed + i)`.
//! - Random-effect term `k` of component `c` (survival 0, detection 1,
//!   transition 2) redraws from `seed + RE_SEED_OFFSET + c · RE_SEED_STRIDE
//!   + k`; mixing proportions use `seed + MIXING_SEED_OFFSET`.
use crate::optimization::loglik_optimizer::MLEOptions;

/// Offset separating random-effect streams from cohort streams.
pub const RE_SEED_OFFSET: u64 = 1 << 32;
/// Gap between the random-effect streams of consecutive components.
pub const RE_SEED_STRIDE: u64 = 1 << 16;
/// Stream of the redrawn mixing proportions.
pub const MIXING_SEED_OFFSET: u64 = 1 << 33;

/// Fitting options.
#[derive(Debug, Clone, PartialEq)]
pub struct ModelOptions {
    pub mle_opts: MLEOptions,
    /// Evaluate histories and simulate cohorts on the rayon pool.
    pub parallel: bool,
}

impl ModelOptions {
    pub fn new(mle_opts: MLEOptions, parallel: bool) -> Self {
        Self { mle_opts, parallel }
    }
}

impl Default for ModelOptions {
    fn default() -> Self {
        Self { mle_opts: MLEOptions::default(), parallel: true }
    }
}

/// Simulation options.
///
/// Default
/// -------
/// `seed = 0`, random effects kept at their supplied values.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct SimulationOptions {
    pub seed: u64,
    /// Redraw random effects and mixing proportions before simulating.
    pub redraw_random_effects: bool,
}

impl SimulationOptions {
    pub fn new(seed: u64, redraw_random_effects: bool) -> Self {
        Self { seed, redraw_random_effects }
    }

    /// Seed of cohort `i`.
    pub fn cohort_seed(&self, i: usize) -> u64 {
        self.seed.wrapping_add(i as u64)
    }

    /// Base seed of component `component`'s random-effect terms.
    pub fn random_effect_seed(&self, component: u64) -> u64 {
        self.seed.wrapping_add(RE_SEED_OFFSET).wrapping_add(component * RE_SEED_STRIDE)
    }

    pub fn mixing_seed(&self) -> u64 {
        self.seed.wrapping_add(MIXING_SEED_OFFSET)
    }
}
