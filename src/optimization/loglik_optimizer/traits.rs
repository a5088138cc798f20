//! Public optimizer surface: the likelihood trait, options, and outcome.
//!
//! - [`LogLikelihood`]: implemented by models (here, the capture-recapture
//!   driver) that expose `ℓ(θ)` over a packed parameter vector.
//! - [`MLEOptions`] / [`Tolerances`] / [`LineSearcher`]: validated solver
//!   configuration.
//! - [`OptimOutcome`]: what [`maximize`](super::maximize) returns.
//!
//! The optimizer maximizes `ℓ(θ)` by minimizing `-ℓ(θ)`; implementors only
//! ever deal in log-likelihood terms.
use crate::optimization::{
    errors::{OptError, OptResult},
    loglik_optimizer::{
        Cost, FnEvalMap, Grad, Theta,
        validation::{validate_theta_hat, validate_value, verify_tol_cost, verify_tol_grad},
    },
};
use argmin::core::{TerminationReason, TerminationStatus};
use argmin_math::ArgminL2Norm;
use std::str::FromStr;

/// Log-likelihood over an unconstrained parameter vector.
///
/// Required:
/// - `value`: `ℓ(θ)`. Numeric degeneracies may be returned as a non-finite
///   value; structural problems with `θ` or the data are returned as errors.
/// - `check`: called once by [`maximize`](super::maximize) before the solver
///   starts; rejects a starting vector or data set that can never evaluate.
///
/// Optional:
/// - `grad`: `∇ℓ(θ)`. The default returns
///   [`OptError::GradientNotImplemented`], which routes the optimizer to
///   finite differences.
pub trait LogLikelihood {
    type Data: 'static;

    fn value(&self, theta: &Theta, data: &Self::Data) -> OptResult<Cost>;
    fn check(&self, theta: &Theta, data: &Self::Data) -> OptResult<()>;

    fn grad(&self, _theta: &Theta, _data: &Self::Data) -> OptResult<Grad> {
        Err(OptError::GradientNotImplemented)
    }
}

/// Line search used inside L-BFGS.
///
/// Parses case-insensitively from `"MoreThuente"` or `"HagerZhang"`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LineSearcher {
    MoreThuente,
    HagerZhang,
}

impl FromStr for LineSearcher {
    type Err = OptError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "morethuente" => Ok(LineSearcher::MoreThuente),
            "hagerzhang" => Ok(LineSearcher::HagerZhang),
            _ => Err(OptError::InvalidLineSearch {
                name: s.to_string(),
                reason: "Valid options are case insensitive 'MoreThuente' or 'HagerZhang'.",
            }),
        }
    }
}

/// Solver configuration.
///
/// Fields
/// ------
/// - `tols`: stopping rules.
/// - `line_searcher`: line search inside L-BFGS.
/// - `verbose`: attach the terminal observer when built with `obs_slog`.
/// - `lbfgs_mem`: L-BFGS history length; `None` uses
///   [`DEFAULT_LBFGS_MEM`](super::DEFAULT_LBFGS_MEM).
///
/// Default
/// -------
/// `tol_grad = 1e-6`, no cost tolerance, `max_iter = 500`, More–Thuente,
/// quiet, default memory. Capture-recapture fits carry many nuisance random
/// effects, so the iteration cap is set higher than for small models.
#[derive(Debug, Clone, PartialEq)]
pub struct MLEOptions {
    pub tols: Tolerances,
    pub line_searcher: LineSearcher,
    pub verbose: bool,
    pub lbfgs_mem: Option<usize>,
}

impl MLEOptions {
    /// Build options, rejecting a zero L-BFGS memory.
    pub fn new(
        tols: Tolerances, line_searcher: LineSearcher, verbose: bool, lbfgs_mem: Option<usize>,
    ) -> OptResult<Self> {
        if lbfgs_mem == Some(0) {
            return Err(OptError::InvalidLBFGSMem {
                mem: 0,
                reason: "L-BFGS memory must be greater than zero.",
            });
        }
        Ok(Self { tols, line_searcher, verbose, lbfgs_mem })
    }
}

impl Default for MLEOptions {
    fn default() -> Self {
        Self {
            tols: Tolerances { tol_grad: Some(1e-6), tol_cost: None, max_iter: Some(500) },
            line_searcher: LineSearcher::MoreThuente,
            verbose: false,
            lbfgs_mem: None,
        }
    }
}

/// Stopping rules; at least one must be set.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Tolerances {
    /// Stop when the gradient norm falls below this value.
    pub tol_grad: Option<f64>,
    /// Stop when the cost change falls below this value.
    pub tol_cost: Option<f64>,
    /// Hard iteration cap.
    pub max_iter: Option<usize>,
}

impl Tolerances {
    /// Validated constructor.
    ///
    /// # Errors
    /// - [`OptError::NoTolerancesProvided`] when all three are `None`.
    /// - [`OptError::InvalidTolGrad`] / [`OptError::InvalidTolCost`] for a
    ///   non-finite or non-positive tolerance.
    /// - [`OptError::InvalidMaxIter`] for `max_iter == Some(0)`.
    pub fn new(
        tol_grad: Option<f64>, tol_cost: Option<f64>, max_iter: Option<usize>,
    ) -> OptResult<Self> {
        if tol_grad.is_none() && tol_cost.is_none() && max_iter.is_none() {
            return Err(OptError::NoTolerancesProvided);
        }
        verify_tol_cost(tol_cost)?;
        verify_tol_grad(tol_grad)?;
        if max_iter == Some(0) {
            return Err(OptError::InvalidMaxIter {
                max_iter: 0,
                reason: "Maximum iterations must be greater than zero.",
            });
        }
        Ok(Self { tol_grad, tol_cost, max_iter })
    }
}

/// Result of a completed optimization.
///
/// `value` is the maximized log-likelihood `ℓ(θ̂)`, not the cost.
/// `converged` is `true` only when a convergence rule fired (gradient or
/// cost tolerance, or a target cost); hitting the iteration cap, a timeout
/// or an interrupt leaves it `false`.
#[derive(Debug, Clone, PartialEq)]
pub struct OptimOutcome {
    pub theta_hat: Theta,
    pub value: f64,
    pub converged: bool,
    pub status: String,
    pub iterations: usize,
    pub fn_evals: FnEvalMap,
    pub grad_norm: Option<f64>,
}

impl OptimOutcome {
    /// Assemble an outcome from raw solver state.
    ///
    /// # Errors
    /// - [`OptError::MissingThetaHat`] / [`OptError::InvalidThetaHat`] for a
    ///   missing or non-finite estimate.
    /// - [`OptError::NonFiniteCost`] for a non-finite `value`.
    pub fn new(
        theta_hat_opt: Option<Theta>, value: f64, termination: TerminationStatus,
        iterations: u64, fn_evals: FnEvalMap, grad: Option<Grad>,
    ) -> OptResult<Self> {
        let theta_hat = validate_theta_hat(theta_hat_opt)?;
        validate_value(value)?;
        let (converged, status) = match termination {
            TerminationStatus::NotTerminated => (false, "Not terminated".to_string()),
            TerminationStatus::Terminated(reason) => (
                matches!(
                    reason,
                    TerminationReason::SolverConverged | TerminationReason::TargetCostReached
                ),
                reason.text().to_string(),
            ),
        };
        Ok(Self {
            theta_hat,
            value,
            converged,
            status,
            iterations: iterations as usize,
            fn_evals,
            grad_norm: grad.map(|g| g.l2_norm()),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use argmin::core::TerminationReason;
    use ndarray::array;

    // -------------------------------------------------------------------------
    // Scope
    // -----
    // Option validation, line-search parsing, and outcome assembly.
    // -------------------------------------------------------------------------

    #[test]
    // Purpose
    // -------
    // `Tolerances::new` needs at least one rule and rejects a zero cap.
    fn tolerances_validation() {
        assert_eq!(Tolerances::new(None, None, None), Err(OptError::NoTolerancesProvided));
        assert!(matches!(
            Tolerances::new(None, None, Some(0)),
            Err(OptError::InvalidMaxIter { .. })
        ));
        assert!(Tolerances::new(Some(1e-8), None, None).is_ok());
    }

    #[test]
    // Purpose
    // -------
    // `MLEOptions::new` rejects a zero L-BFGS memory; the default is valid.
    fn mle_options_reject_zero_memory() {
        let tols = Tolerances::new(Some(1e-6), None, Some(10)).unwrap();
        assert!(matches!(
            MLEOptions::new(tols, LineSearcher::HagerZhang, false, Some(0)),
            Err(OptError::InvalidLBFGSMem { .. })
        ));
        let default = MLEOptions::default();
        assert_eq!(default.tols.max_iter, Some(500));
        assert_eq!(default.line_searcher, LineSearcher::MoreThuente);
    }

    #[test]
    // Purpose
    // -------
    // Line-search names parse case-insensitively.
    fn line_searcher_parses_case_insensitively() {
        assert_eq!("HAGERZHANG".parse::<LineSearcher>(), Ok(LineSearcher::HagerZhang));
        assert_eq!("moreThuente".parse::<LineSearcher>(), Ok(LineSearcher::MoreThuente));
        assert!("bfgs".parse::<LineSearcher>().is_err());
    }

    #[test]
    // Purpose
    // -------
    // `OptimOutcome::new` maps the termination status and gradient norm;
    // only a convergence rule counts as converged.
    fn outcome_maps_status_and_norm() {
        // Arrange
        let status = TerminationStatus::Terminated(TerminationReason::SolverConverged);

        // Act
        let out = OptimOutcome::new(
            Some(array![0.1, 0.2]),
            -12.5,
            status,
            7,
            FnEvalMap::new(),
            Some(array![3.0, 4.0]),
        )
        .unwrap();
        let not_done = OptimOutcome::new(
            Some(array![0.1]),
            -1.0,
            TerminationStatus::NotTerminated,
            0,
            FnEvalMap::new(),
            None,
        )
        .unwrap();
        let capped = OptimOutcome::new(
            Some(array![0.1]),
            -1.0,
            TerminationStatus::Terminated(TerminationReason::MaxItersReached),
            500,
            FnEvalMap::new(),
            None,
        )
        .unwrap();

        // Assert
        assert!(out.converged);
        assert_eq!(out.iterations, 7);
        assert_eq!(out.grad_norm, Some(5.0));
        assert!(!not_done.converged);
        assert_eq!(not_done.status, "Not terminated");
        assert!(!capped.converged);
        assert_eq!(capped.status, TerminationReason::MaxItersReached.text());
    }
}
