//! Multistate CJS model: composition of random effects, links, the forward
//! likelihood and the cohort simulator.
//!
//! Purpose
//! -------
//! [`MscjsModel`] owns everything that stays fixed across optimizer steps
//! (design matrices, covariance terms, the unknown-life-history blend, the
//! parameter layout and run-time options) and turns a [`ModelParams`] into
//! either a total objective ([`MscjsModel::evaluate`]) or expected and
//! simulated detection tables ([`MscjsModel::simulate`]).
//!
//! Key behaviors
//! -------------
//! - Linear predictors are `X·β + Z·b` per component; `Z` is dense.
//! - The objective is the sum of the random-effect negative log-densities
//!   of all three components, the mixing-proportion density, and the
//!   frequency-weighted history negative log-likelihood.
//! - [`LogLikelihood`] is implemented over the packed vector with the
//!   optimizer's finite-difference gradient; [`MscjsModel::fit`] maximizes
//!   the joint log density over fixed effects, random effects and
//!   covariance parameters together.
//! - With `redraw_random_effects`, simulation redraws every component's
//!   random effects and the mixing logits. Expected tables then use
//!   fixed-effect-only predictors; simulated tables use the redrawn
//!   effects.
//!
//! Invariants & assumptions
//! ------------------------
//! - `X` and `Z` of a component have the same row count; `Z` has one
//!   column per random effect covered by the component's terms.
//! - The transition design has `2 · n_groups` rows: the first `n_groups`
//!   rows give the one-season logits, the rest the three-season logits.
//! - Structure, shape and index validation happens once per public call
//!   (or once in `check` before an optimizer run), not inside the
//!   objective.
use ndarray::{Array1, Array2, ArrayView1};
use rand::{Rng, SeedableRng, rngs::StdRng};
use rand_distr::StandardNormal;

use crate::{
    inference::hessian::calc_standard_errors,
    model::{
        data::{CaptureData, CohortData},
        errors::{ModelError, ModelResult},
        forward::neg_log_likelihood,
        link::{LinearPredictors, Probabilities, UnknownLifeHistoryMap, apply_links, mixing_neg_log_density},
        options::{ModelOptions, SimulationOptions},
        params::{ModelParams, ParamLayout},
        simulate::{ExpectedTables, SimulatedTables, expected_detections, simulate_detections},
    },
    optimization::{
        errors::OptResult,
        loglik_optimizer::{LogLikelihood, OptimOutcome, Theta, maximize},
    },
    random_effects::{AggregateEvaluation, RandomEffectTerms, TermReport},
};

/// Fixed and random design of one component.
#[derive(Debug, Clone, PartialEq)]
pub struct ComponentDesign {
    pub name: &'static str,
    pub x: Array2<f64>,
    pub z: Array2<f64>,
    pub terms: RandomEffectTerms,
}

impl ComponentDesign {
    /// # Errors
    /// [`ModelError::DesignShapeMismatch`] when `z` and `x` disagree on rows
    /// or `z` does not have one column per random effect in `terms`.
    pub fn new(
        name: &'static str, x: Array2<f64>, z: Array2<f64>, terms: RandomEffectTerms,
    ) -> ModelResult<Self> {
        let design = Self { name, x, z, terms };
        design.check_shapes()?;
        Ok(design)
    }

    /// Re-run the constructor's `z` shape checks.
    ///
    /// # Errors
    /// As [`new`](Self::new).
    pub fn check_shapes(&self) -> ModelResult<()> {
        if self.z.nrows() != self.x.nrows() {
            return Err(ModelError::DesignShapeMismatch {
                component: self.name,
                what: "random-effect design rows",
                expected: self.x.nrows(),
                found: self.z.nrows(),
            });
        }
        if self.z.ncols() != self.terms.n_effects() {
            return Err(ModelError::DesignShapeMismatch {
                component: self.name,
                what: "random-effect design columns",
                expected: self.terms.n_effects(),
                found: self.z.ncols(),
            });
        }
        Ok(())
    }

    /// Fixed effects only.
    pub fn fixed(name: &'static str, x: Array2<f64>) -> Self {
        let z = Array2::zeros((x.nrows(), 0));
        Self { name, x, z, terms: RandomEffectTerms::empty() }
    }

    pub fn n_rows(&self) -> usize {
        self.x.nrows()
    }

    pub fn n_beta(&self) -> usize {
        self.x.ncols()
    }

    pub fn n_b(&self) -> usize {
        self.z.ncols()
    }

    pub fn n_theta(&self) -> usize {
        self.terms.n_theta()
    }

    fn linear_predictor(&self, beta: &Array1<f64>, b: Option<&Array1<f64>>) -> Array1<f64> {
        let eta = self.x.dot(beta);
        match b {
            Some(b) if !b.is_empty() => eta + self.z.dot(b),
            _ => eta,
        }
    }

    fn random_effect_density(
        &self, b: ArrayView1<f64>, theta: ArrayView1<f64>,
    ) -> ModelResult<AggregateEvaluation> {
        self.terms
            .neg_log_density(b, theta)
            .map_err(|source| ModelError::Covariance { component: self.name, source })
    }
}

/// Per-term covariance reports of the three components.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct ComponentReports {
    pub phi: Vec<Option<TermReport>>,
    pub p: Vec<Option<TermReport>>,
    pub psi: Vec<Option<TermReport>>,
}

/// Objective and its parts at one parameter point.
#[derive(Debug, Clone, PartialEq)]
pub struct Evaluation {
    /// Total negative log joint density.
    pub nll: f64,
    pub re_nll: f64,
    pub mixing_nll: f64,
    pub history_nll: f64,
    pub probabilities: Probabilities,
    pub reports: ComponentReports,
}

/// Expected and simulated tables plus the parameters behind them.
#[derive(Debug, Clone, PartialEq)]
pub struct SimulationOutput {
    pub expected: ExpectedTables,
    pub simulated: SimulatedTables,
    /// Probabilities behind the expected tables.
    pub expected_probabilities: Probabilities,
    /// Probabilities behind the simulated tables.
    pub probabilities: Probabilities,
    /// Parameters actually used, including any redrawn random effects and
    /// mixing logits.
    pub params: ModelParams,
    pub reports: ComponentReports,
}

/// Multistate CJS model with random effects.
///
/// After fitting, [`results`](Self::results) stores the optimizer outcome
/// and [`fitted_params`](Self::fitted_params) its unpacked parameters.
#[derive(Debug, Clone, PartialEq)]
pub struct MscjsModel {
    pub phi: ComponentDesign,
    pub p: ComponentDesign,
    pub psi: ComponentDesign,
    pub blend: UnknownLifeHistoryMap,
    pub n_groups: usize,
    pub layout: ParamLayout,
    pub options: ModelOptions,
    /// Fit results (populated after `fit`).
    pub results: Option<OptimOutcome>,
    /// Fitted parameters (populated after `fit`).
    pub fitted_params: Option<ModelParams>,
}

impl MscjsModel {
    /// Assemble a model and derive its parameter layout.
    ///
    /// # Errors
    /// - [`ModelError::DesignShapeMismatch`] when the transition design does
    ///   not have `2 · n_groups` rows.
    /// - [`ModelError::InvalidBlendMap`] for blend sources outside the known
    ///   slots or years outside `0..n_years`.
    pub fn new(
        phi: ComponentDesign, p: ComponentDesign, psi: ComponentDesign,
        blend: UnknownLifeHistoryMap, n_groups: usize, n_years: usize, options: ModelOptions,
    ) -> ModelResult<Self> {
        let layout = ParamLayout {
            n_beta_phi: phi.n_beta(),
            n_beta_p: p.n_beta(),
            n_beta_psi: psi.n_beta(),
            n_b_phi: phi.n_b(),
            n_b_p: p.n_b(),
            n_b_psi: psi.n_b(),
            n_theta_phi: phi.n_theta(),
            n_theta_p: p.n_theta(),
            n_theta_psi: psi.n_theta(),
            n_years,
        };
        let model = Self {
            phi,
            p,
            psi,
            blend,
            n_groups,
            layout,
            options,
            results: None,
            fitted_params: None,
        };
        model.check_structure()?;
        Ok(model)
    }

    /// Designs, transition rows, blend map and parameter layout agree.
    ///
    /// Runs at construction and again on every public call, since the
    /// fields are public.
    ///
    /// # Errors
    /// - [`ModelError::DesignShapeMismatch`] for a `z` that no longer fits
    ///   its component, a transition design without `2 · n_groups` rows, or
    ///   a layout block that disagrees with its design.
    /// - [`ModelError::InvalidBlendMap`] as in [`new`](Self::new).
    pub fn check_structure(&self) -> ModelResult<()> {
        for design in [&self.phi, &self.p, &self.psi] {
            design.check_shapes()?;
        }
        if self.psi.n_rows() != 2 * self.n_groups {
            return Err(ModelError::DesignShapeMismatch {
                component: self.psi.name,
                what: "fixed-effect design rows",
                expected: 2 * self.n_groups,
                found: self.psi.n_rows(),
            });
        }
        self.blend.validate(self.phi.n_rows(), self.p.n_rows(), self.layout.n_years)?;
        let l = &self.layout;
        let blocks = [
            (&self.phi, "fixed effects", l.n_beta_phi, self.phi.n_beta()),
            (&self.p, "fixed effects", l.n_beta_p, self.p.n_beta()),
            (&self.psi, "fixed effects", l.n_beta_psi, self.psi.n_beta()),
            (&self.phi, "random effects", l.n_b_phi, self.phi.n_b()),
            (&self.p, "random effects", l.n_b_p, self.p.n_b()),
            (&self.psi, "random effects", l.n_b_psi, self.psi.n_b()),
            (&self.phi, "covariance parameters", l.n_theta_phi, self.phi.n_theta()),
            (&self.p, "covariance parameters", l.n_theta_p, self.p.n_theta()),
            (&self.psi, "covariance parameters", l.n_theta_psi, self.psi.n_theta()),
        ];
        match blocks.into_iter().find(|(_, _, layout_len, design_len)| layout_len != design_len) {
            Some((design, what, expected, found)) => Err(ModelError::DesignShapeMismatch {
                component: design.name,
                what,
                expected,
                found,
            }),
            None => Ok(()),
        }
    }

    /// Length of the survival probability vector.
    pub fn n_phi(&self) -> usize {
        self.phi.n_rows() + self.blend.phi.len()
    }

    /// Length of the detection probability vector, fixed-zero slot included.
    pub fn n_p(&self) -> usize {
        self.p.n_rows() + self.blend.p.len() + 1
    }

    /// Total negative log joint density at `params`.
    ///
    /// # Errors
    /// - Block-length and index errors from validation.
    /// - [`ModelError::Covariance`] for shape problems inside a covariance
    ///   term.
    ///
    /// Impossible histories and singular correlations are not errors: they
    /// show up as a non-finite `nll`.
    pub fn evaluate(&self, params: &ModelParams, captures: &CaptureData) -> ModelResult<Evaluation> {
        self.check_structure()?;
        self.layout.check_params(params)?;
        captures.validate(self.n_phi(), self.n_p(), self.n_groups)?;
        self.objective(params, captures)
    }

    /// Expected and simulated detection tables for `cohorts`.
    ///
    /// # Errors
    /// - Block-length and index errors from validation.
    /// - [`ModelError::Covariance`], including `NotPositiveDefinite` when a
    ///   redraw hits a singular correlation.
    pub fn simulate(
        &self, params: &ModelParams, cohorts: &CohortData, sim_opts: &SimulationOptions,
    ) -> ModelResult<SimulationOutput> {
        self.check_structure()?;
        self.layout.check_params(params)?;
        cohorts.validate(self.n_phi(), self.n_p(), self.n_groups)?;
        let parallel = self.options.parallel;

        if !sim_opts.redraw_random_effects {
            let (_, reports) = self.random_effects(params)?;
            let probabilities = self.probabilities(params, true)?;
            return Ok(SimulationOutput {
                expected: expected_detections(cohorts, &probabilities, parallel),
                simulated: simulate_detections(cohorts, &probabilities, sim_opts, parallel),
                expected_probabilities: probabilities.clone(),
                probabilities,
                params: params.clone(),
                reports,
            });
        }

        let (drawn, reports) = self.redraw(params, sim_opts)?;
        let expected_probabilities = self.probabilities(&drawn, false)?;
        let probabilities = self.probabilities(&drawn, true)?;
        log::debug!(
            "simulating {} cohorts with redrawn random effects (seed {})",
            cohorts.n_cohorts(),
            sim_opts.seed
        );
        Ok(SimulationOutput {
            expected: expected_detections(cohorts, &expected_probabilities, parallel),
            simulated: simulate_detections(cohorts, &probabilities, sim_opts, parallel),
            expected_probabilities,
            probabilities,
            params: drawn,
            reports,
        })
    }

    /// Fit by maximum likelihood from `theta0` and cache the outcome.
    ///
    /// The objective is the joint density of the data and the random
    /// effects, maximized over every block at once; the random effects are
    /// not integrated out. Without random-effect terms this is ordinary
    /// maximum likelihood. With them the joint density is unbounded as a
    /// log-SD goes to −∞ with its effects at zero, so a run drifting that
    /// way ends in an error once its line search only finds non-finite
    /// values. Such models are meant for [`evaluate`](Self::evaluate) and
    /// [`simulate`](Self::simulate) at supplied parameters, or for fits
    /// started near a known interior mode.
    ///
    /// The optimizer sees the objective divided by the number of individuals
    /// so its first step (the raw gradient) stays on the logit scale;
    /// tolerances in `options.mle_opts` apply on that scale. The stored
    /// `value` and `grad_norm` are rescaled to the summed log-likelihood.
    /// A run that hits the iteration cap is stored with
    /// `converged == false`.
    ///
    /// # Errors
    /// - Anything [`maximize`] returns, including `check` failures on
    ///   `theta0` or the data.
    /// - [`OptError::SolverExit`](crate::optimization::errors::OptError::SolverExit)
    ///   when the line search breaks down; nothing
    ///   is cached in that case.
    pub fn fit(&mut self, theta0: Theta, data: &CaptureData) -> OptResult<()> {
        let scale = data.total_frequency().max(1) as f64;
        let objective = PerIndividual { model: self, scale };
        let mut outcome = maximize(&objective, theta0, data, &self.options.mle_opts)?;
        outcome.value *= scale;
        outcome.grad_norm = outcome.grad_norm.map(|g| g * scale);
        let fitted = self.layout.from_theta(&outcome.theta_hat)?;
        if outcome.converged {
            log::debug!(
                "fit converged: loglik {:.6}, {} iterations",
                outcome.value,
                outcome.iterations
            );
        } else {
            log::warn!(
                "fit stopped without converging ({}): loglik {:.6}, {} iterations",
                outcome.status,
                outcome.value,
                outcome.iterations
            );
        }
        self.fitted_params = Some(fitted);
        self.results = Some(outcome);
        Ok(())
    }

    /// Classical standard errors of the packed parameters at the fitted
    /// point, in [`ParamLayout::names`] order.
    ///
    /// # Errors
    /// - [`ModelError::ModelNotFitted`] before [`fit`](Self::fit).
    /// - Hessian failures from the finite-difference routine.
    pub fn standard_errors(&self, data: &CaptureData) -> OptResult<Array1<f64>> {
        let outcome = self.results.as_ref().ok_or(ModelError::ModelNotFitted)?;
        self.check(&outcome.theta_hat, data)?;
        calc_standard_errors(|theta: &Theta| self.value(theta, data), &outcome.theta_hat)
    }

    // ---- Helper methods ----

    fn objective(&self, params: &ModelParams, captures: &CaptureData) -> ModelResult<Evaluation> {
        let (re_nll, reports) = self.random_effects(params)?;
        let mixing_nll =
            mixing_neg_log_density(params.logit_p_subs.view(), params.hyper_mean, params.hyper_log_sd);
        let probabilities = self.probabilities(params, true)?;
        let history_nll = neg_log_likelihood(captures, &probabilities, self.options.parallel);
        Ok(Evaluation {
            nll: re_nll + mixing_nll + history_nll,
            re_nll,
            mixing_nll,
            history_nll,
            probabilities,
            reports,
        })
    }

    fn random_effects(&self, params: &ModelParams) -> ModelResult<(f64, ComponentReports)> {
        let phi = self.phi.random_effect_density(params.b_phi.view(), params.theta_phi.view())?;
        let p = self.p.random_effect_density(params.b_p.view(), params.theta_p.view())?;
        let psi = self.psi.random_effect_density(params.b_psi.view(), params.theta_psi.view())?;
        let nll = phi.nll + p.nll + psi.nll;
        Ok((nll, ComponentReports { phi: phi.reports, p: p.reports, psi: psi.reports }))
    }

    fn probabilities(&self, params: &ModelParams, with_random: bool) -> ModelResult<Probabilities> {
        let eta = LinearPredictors {
            phi: self.phi.linear_predictor(&params.beta_phi, with_random.then_some(&params.b_phi)),
            p: self.p.linear_predictor(&params.beta_p, with_random.then_some(&params.b_p)),
            psi: self.psi.linear_predictor(&params.beta_psi, with_random.then_some(&params.b_psi)),
        };
        apply_links(&eta, params.logit_p_subs.view(), &self.blend, self.n_groups)
    }

    /// Redraw random effects and mixing logits; reports come from scoring
    /// the supplied effects.
    fn redraw(
        &self, params: &ModelParams, sim_opts: &SimulationOptions,
    ) -> ModelResult<(ModelParams, ComponentReports)> {
        let mut drawn = params.clone();
        let draw = |design: &ComponentDesign, b: &mut Array1<f64>, theta: &Array1<f64>, c: u64| {
            design
                .terms
                .simulate(b.view_mut(), theta.view(), sim_opts.random_effect_seed(c))
                .map_err(|source| ModelError::Covariance { component: design.name, source })
        };
        let phi = draw(&self.phi, &mut drawn.b_phi, &params.theta_phi, 0)?;
        let p = draw(&self.p, &mut drawn.b_p, &params.theta_p, 1)?;
        let psi = draw(&self.psi, &mut drawn.b_psi, &params.theta_psi, 2)?;

        let mut rng = StdRng::seed_from_u64(sim_opts.mixing_seed());
        let sd = params.hyper_log_sd.exp();
        drawn
            .logit_p_subs
            .mapv_inplace(|_| params.hyper_mean + sd * rng.sample::<f64, _>(StandardNormal));

        Ok((drawn, ComponentReports { phi: phi.reports, p: p.reports, psi: psi.reports }))
    }
}

/// Per-individual objective handed to the optimizer by
/// [`MscjsModel::fit`].
struct PerIndividual<'a> {
    model: &'a MscjsModel,
    scale: f64,
}

impl LogLikelihood for PerIndividual<'_> {
    type Data = CaptureData;

    fn value(&self, theta: &Theta, data: &Self::Data) -> OptResult<f64> {
        Ok(self.model.value(theta, data)? / self.scale)
    }

    fn check(&self, theta: &Theta, data: &Self::Data) -> OptResult<()> {
        self.model.check(theta, data)
    }
}

impl LogLikelihood for MscjsModel {
    type Data = CaptureData;

    /// `−nll` at the unpacked `θ`; indices are assumed checked by
    /// [`check`](Self::check).
    fn value(&self, theta: &Theta, data: &Self::Data) -> OptResult<f64> {
        let params = self.layout.from_theta(theta)?;
        Ok(-self.objective(&params, data)?.nll)
    }

    /// Model structure, length and finiteness of `θ`, plus data shapes and
    /// indices against this model's probability vectors.
    fn check(&self, theta: &Theta, data: &Self::Data) -> OptResult<()> {
        self.check_structure()?;
        self.layout.check_theta(theta)?;
        data.validate(self.n_phi(), self.n_p(), self.n_groups)?;
        Ok(())
    }
}
