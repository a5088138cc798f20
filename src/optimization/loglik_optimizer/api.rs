//! High-level entry point: maximize a [`LogLikelihood`] with L-BFGS.
use crate::optimization::{
    errors::OptResult,
    loglik_optimizer::{
        OptimOutcome, Theta,
        adapter::ArgMinAdapter,
        builders::{build_optimizer_hager_zhang, build_optimizer_more_thuente},
        run::run_lbfgs,
        traits::{LineSearcher, LogLikelihood, MLEOptions},
    },
};

/// Maximize `ℓ(θ)` starting from `theta0`.
///
/// Steps
/// -----
/// 1. `f.check(&theta0, data)` rejects starting points and data sets that
///    can never evaluate (wrong length, non-finite entries, malformed
///    capture histories).
/// 2. The model is wrapped in an [`ArgMinAdapter`] minimizing `-ℓ(θ)`.
/// 3. An L-BFGS solver with the configured line search runs to one of the
///    stopping rules in `opts.tols`.
///
/// Errors
/// ------
/// - Anything `f.check` returns.
/// - Solver configuration and runtime failures.
///
/// Example
/// -------
/// ```no_run
/// use mscjs::optimization::errors::OptResult;
/// use mscjs::optimization::loglik_optimizer::{LogLikelihood, MLEOptions, Theta, maximize};
/// use ndarray::array;
///
/// // Binomial survival: 40 of 50 released fish detected downstream.
/// struct Survival;
/// impl LogLikelihood for Survival {
///     type Data = (f64, f64);
///     fn value(&self, theta: &Theta, &(k, n): &(f64, f64)) -> OptResult<f64> {
///         let p = 1.0 / (1.0 + (-theta[0]).exp());
///         Ok(k * p.ln() + (n - k) * (1.0 - p).ln())
///     }
///     fn check(&self, _: &Theta, _: &(f64, f64)) -> OptResult<()> {
///         Ok(())
///     }
/// }
///
/// let out = maximize(&Survival, array![0.0], &(40.0, 50.0), &MLEOptions::default())?;
/// println!("logit(phi) = {}", out.theta_hat[0]);
/// # Ok::<(), mscjs::optimization::errors::OptError>(())
/// ```
pub fn maximize<F: LogLikelihood>(
    f: &F, theta0: Theta, data: &F::Data, opts: &MLEOptions,
) -> OptResult<OptimOutcome> {
    f.check(&theta0, data)?;
    let problem = ArgMinAdapter::new(f, data);
    match opts.line_searcher {
        LineSearcher::MoreThuente => {
            let solver = build_optimizer_more_thuente(opts)?;
            run_lbfgs(theta0, opts, problem, solver)
        }
        LineSearcher::HagerZhang => {
            let solver = build_optimizer_hager_zhang(opts)?;
            run_lbfgs(theta0, opts, problem, solver)
        }
    }
}
