//! Integration tests for the multistate CJS pipeline.
//!
//! Purpose
//! -------
//! - Validate the end-to-end path from validated capture data and designs,
//!   through evaluation and maximum-likelihood fitting, to standard errors
//!   and cohort simulation.
//!
//! Coverage
//! --------
//! - `model::MscjsModel`: evaluate against a closed-form history, fit on
//!   exact expected frequencies, a failing joint fit with a random effect,
//!   standard errors, simulate with and without redraws.
//! - `random_effects`: a correlated term composed into the objective.
//! - `optimization::loglik_optimizer`: L-BFGS via `MLEOptions` and
//!   `Tolerances`.
//!
//! Exclusions
//! ----------
//! - Per-structure covariance densities, link arithmetic and recursion
//!   details: covered by unit tests.
use approx::assert_relative_eq;
use mscjs::{
    model::{
        CaptureData, CaptureHistory, Cohort, CohortData, ComponentDesign, LifeHistory, ModelOptions,
        ModelParams, MscjsModel, OccasionLayout, SimulationOptions, StatePims, TrapDependence,
        TrapOccasion, UnknownLifeHistoryMap, forward::history_log_likelihoods,
    },
    optimization::{
        errors::OptError,
        loglik_optimizer::{LineSearcher, LogLikelihood, MLEOptions, Tolerances},
        numerical_stability::safe_logistic,
    },
    random_effects::{CovStructure, CovarianceTerm, RandomEffectTerms},
};
use ndarray::{Array1, Array2, array};

/// Constant survival, constant detection, one transition group.
fn constant_model(options: ModelOptions) -> MscjsModel {
    MscjsModel::new(
        ComponentDesign::fixed("phi", array![[1.0]]),
        ComponentDesign::fixed("p", array![[1.0]]),
        ComponentDesign::fixed("psi", Array2::eye(2)),
        UnknownLifeHistoryMap::none(),
        1,
        0,
        options,
    )
    .expect("constant model should build")
}

fn fit_options() -> ModelOptions {
    let tols = Tolerances::new(Some(1e-4), Some(1e-10), Some(500))
        .expect("Tolerances::new should accept positive tolerances");
    let mle_opts = MLEOptions::new(tols, LineSearcher::MoreThuente, false, None)
        .expect("MLEOptions::new should succeed with default memory");
    ModelOptions::new(mle_opts, true)
}

/// Every known-life-history pattern for `n_occ = 3`, `n_ds = 2`: two
/// downstream bits and one final code.
fn all_histories(frequencies: Option<&Array1<f64>>) -> CaptureData {
    let mut histories = Vec::new();
    for d0 in 0..2u8 {
        for d1 in 0..2u8 {
            for last in 0..4u8 {
                let frequency = frequencies.map_or(1, |f| f[histories.len()].round() as u32);
                histories.push(CaptureHistory {
                    detections: array![d0, d1, last],
                    frequency,
                    release_occasion: 0,
                    psi_group: 0,
                    life_history: LifeHistory::Known,
                });
            }
        }
    }
    let n = histories.len();
    CaptureData::new(
        OccasionLayout::new(3, 2).expect("valid layout"),
        histories,
        StatePims::uniform(Array2::zeros((n, 3)), Array2::zeros((n, 3))),
    )
    .expect("valid capture data")
}

fn truth(model: &MscjsModel) -> ModelParams {
    let mut params = model.layout.zeros();
    params.beta_phi = array![1.0];
    params.beta_p = array![0.5];
    params.beta_psi = array![-0.5, 0.3];
    params
}

#[test]
// Purpose
// -------
// The closed-form downstream scenario: released at 0, detected at both
// downstream occasions, all probabilities 0.5.
//
// Expect
// ------
// - Unknown life history (no ocean phase): nll = ln 16.
// - Known life history never seen again at n_occ = 3: nll = ln 32.
fn evaluate_matches_closed_form_history() {
    // Arrange
    let model = constant_model(ModelOptions::default());
    let mut params = model.layout.zeros();
    params.beta_psi = array![0.4_f64.ln(), 0.6_f64.ln()];
    let make = |life_history| {
        CaptureData::new(
            OccasionLayout::new(3, 2).unwrap(),
            vec![CaptureHistory {
                detections: array![1, 1, 0],
                frequency: 1,
                release_occasion: 0,
                psi_group: 0,
                life_history,
            }],
            StatePims::uniform(Array2::zeros((1, 3)), Array2::zeros((1, 3))),
        )
        .unwrap()
    };

    // Act
    let unknown = model.evaluate(&params, &make(LifeHistory::Unknown)).unwrap();
    let known = model.evaluate(&params, &make(LifeHistory::Known)).unwrap();

    // Assert
    assert_relative_eq!(unknown.nll, 16.0_f64.ln(), epsilon = 1e-12);
    assert_relative_eq!(known.nll, 32.0_f64.ln(), epsilon = 1e-12);
}

#[test]
// Purpose
// -------
// Fitting on frequencies proportional to the exact history probabilities
// recovers the generating parameters, and the standard errors are finite
// and positive.
//
// Given
// -----
// - φ = σ(1), p = σ(0.5), psi logits (−0.5, 0.3).
// - All 16 histories with frequency round(10⁴ · P(history)).
//
// Expect
// ------
// - θ̂ within 0.05 of the truth; total probability of the histories is 1.
fn fit_recovers_generating_parameters() {
    // Arrange
    let mut model = constant_model(fit_options());
    let params = truth(&model);
    let template = all_histories(None);
    let probs = model.evaluate(&params, &template).unwrap().probabilities;
    let history_probs = history_log_likelihoods(&template, &probs, false).mapv(f64::exp);
    assert_relative_eq!(history_probs.sum(), 1.0, epsilon = 1e-12);
    let data = all_histories(Some(&(history_probs * 1e4)));
    let theta_true = model.layout.to_theta(&params).unwrap();

    // Act
    model.fit(Array1::zeros(model.layout.len()), &data).expect("fit should succeed");
    let se = model.standard_errors(&data).expect("standard errors should succeed");

    // Assert
    let outcome = model.results.as_ref().unwrap();
    assert!(outcome.converged, "status: {}", outcome.status);
    for (est, truth) in outcome.theta_hat.iter().zip(theta_true.iter()) {
        assert!((est - truth).abs() < 0.05, "estimate {est} too far from {truth}");
    }
    assert!(outcome.value >= model.value(&theta_true, &data).unwrap() - 1e-3);
    assert_eq!(model.fitted_params.as_ref().unwrap().beta_psi.len(), 2);
    assert_eq!(se.len(), model.layout.len());
    assert!(se.iter().all(|s| s.is_finite() && *s > 0.0));
}

#[test]
// Purpose
// -------
// Joint maximization over a random effect and its log-SD has no interior
// maximum from a zero start; the run must fail rather than be reported as
// converged.
//
// Given
// -----
// - A single diagonal random effect on survival, all 16 histories with
//   frequency 50, start at θ = 0.
//
// Expect
// ------
// - Either `OptError::SolverExit` from a broken line search with nothing
//   cached, or an outcome stored with `converged == false`; never a
//   converged fit.
fn fit_with_random_effect_reports_solver_exit() {
    // Arrange
    let terms =
        RandomEffectTerms::new(vec![CovarianceTerm::simple(CovStructure::Diagonal, 1, 1).unwrap()])
            .unwrap();
    let mut model = MscjsModel::new(
        ComponentDesign::new("phi", array![[1.0]], array![[1.0]], terms).unwrap(),
        ComponentDesign::fixed("p", array![[1.0]]),
        ComponentDesign::fixed("psi", Array2::eye(2)),
        UnknownLifeHistoryMap::none(),
        1,
        0,
        fit_options(),
    )
    .unwrap();
    let data = all_histories(Some(&Array1::from_elem(16, 50.0)));

    // Act
    let result = model.fit(Array1::zeros(model.layout.len()), &data);

    // Assert
    match result {
        Err(err) => {
            assert!(matches!(err, OptError::SolverExit { .. }), "got {err:?}");
            assert!(model.results.is_none());
            assert!(model.fitted_params.is_none());
        }
        Ok(()) => {
            let outcome = model.results.as_ref().unwrap();
            assert!(!outcome.converged, "status: {}", outcome.status);
        }
    }
}

#[test]
// Purpose
// -------
// A correlated random effect composes into the objective as its own
// density plus a shifted linear predictor.
//
// Given
// -----
// - Survival rows (two occasions) with an AR1 term over both.
fn correlated_random_effect_in_objective() {
    // Arrange
    let terms = RandomEffectTerms::new(vec![CovarianceTerm::simple(CovStructure::Ar1, 2, 1).unwrap()])
        .unwrap();
    let model = MscjsModel::new(
        ComponentDesign::new("phi", array![[1.0], [1.0]], Array2::eye(2), terms.clone()).unwrap(),
        ComponentDesign::fixed("p", array![[1.0]]),
        ComponentDesign::fixed("psi", Array2::eye(2)),
        UnknownLifeHistoryMap::none(),
        1,
        0,
        ModelOptions::default(),
    )
    .unwrap();
    let mut params = model.layout.zeros();
    params.b_phi = array![0.4, -0.1];
    params.theta_phi = array![-0.3, 0.8];
    let mut data = all_histories(None);
    for h in 0..data.n_histories() {
        data.pims.phi[0][[h, 1]] = 1;
    }

    // Act
    let eval = model.evaluate(&params, &data).unwrap();

    // Assert
    let direct = terms.neg_log_density(params.b_phi.view(), params.theta_phi.view()).unwrap();
    assert_relative_eq!(eval.re_nll, direct.nll, epsilon = 1e-12);
    assert_relative_eq!(eval.probabilities.phi, array![safe_logistic(0.4), safe_logistic(-0.1)], epsilon = 1e-12);
    let report = eval.reports.phi[0].as_ref().unwrap();
    assert_relative_eq!(report.corr[[0, 1]], 0.8 / (1.0_f64 + 0.64).sqrt(), epsilon = 1e-12);
}

#[test]
// Purpose
// -------
// Simulated counts from a very large release track the expected table,
// including a trap-dependent occasion, and repeat exactly under a fixed
// seed.
fn simulation_tracks_expectation() {
    // Arrange
    let model = constant_model(ModelOptions::default());
    let params = truth(&model);
    let n_cohorts = 2;
    let cohorts = CohortData::new(
        OccasionLayout::new(5, 3).unwrap(),
        vec![
            Cohort { release_count: 1_000_000, release_occasion: 0, psi_group: 0, life_history: LifeHistory::Known },
            Cohort { release_count: 1_000_000, release_occasion: 1, psi_group: 0, life_history: LifeHistory::Known },
        ],
        StatePims::uniform(Array2::zeros((n_cohorts, 5)), Array2::zeros((n_cohorts, 5))),
        TrapDependence::new(vec![TrapOccasion { occasion: 2, detected_p_index: array![0, 0] }]).unwrap(),
    )
    .unwrap();
    let opts = SimulationOptions::new(2024, false);

    // Act
    let out = model.simulate(&params, &cohorts, &opts).unwrap();
    let again = model.simulate(&params, &cohorts, &opts).unwrap();

    // Assert
    assert_eq!(out, again);
    for (table_e, table_s) in [
        (&out.expected.det1, &out.simulated.det1),
        (&out.expected.det2, &out.simulated.det2),
        (&out.expected.det3, &out.simulated.det3),
    ] {
        for (&e, &s) in table_e.iter().zip(table_s.iter()) {
            if e > 0.0 {
                assert_relative_eq!(s as f64, e, max_relative = 0.05);
            } else {
                assert_eq!(s, 0);
            }
        }
    }
}
