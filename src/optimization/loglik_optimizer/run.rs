//! Executor wiring shared by both line-search variants.
use crate::optimization::{
    errors::{OptError, OptResult},
    loglik_optimizer::{
        Grad, LogLikelihood, MLEOptions, OptimOutcome, Theta, adapter::ArgMinAdapter,
    },
};
use argmin::core::{Executor, State, TerminationReason, TerminationStatus};

/// Run `solver` on `problem` from `theta0` and collect an [`OptimOutcome`].
///
/// Applies `opts.tols.max_iter` to the executor state. With the `obs_slog`
/// feature and `opts.verbose`, a non-blocking terminal observer reports
/// every iteration. The starting log-likelihood and the final status are
/// logged at debug / info level through the `log` facade.
///
/// # Errors
/// - Argmin runtime failures, converted into `OptError`.
/// - [`OptError::SolverExit`] when L-BFGS gives up on its own, most often
///   because every trial point of a line search failed to evaluate.
/// - Validation failures while assembling the outcome.
pub fn run_lbfgs<'a, F, S>(
    theta0: Theta, opts: &MLEOptions, problem: ArgMinAdapter<'a, F>, solver: S,
) -> OptResult<OptimOutcome>
where
    F: LogLikelihood,
    S: argmin::core::Solver<
            ArgMinAdapter<'a, F>,
            argmin::core::IterState<Theta, Grad, (), (), (), f64>,
        > + Send
        + 'static,
{
    if log::log_enabled!(log::Level::Debug) {
        match problem.neg_loglik(&theta0) {
            Ok(cost) => log::debug!("starting L-BFGS at log-likelihood {:.6}", -cost),
            Err(err) => log::debug!("starting L-BFGS at a point that does not evaluate: {err}"),
        }
    }

    let executor = Executor::new(problem, solver).configure(|state| {
        let state = state.param(theta0);
        match opts.tols.max_iter {
            Some(max_iter) => state.max_iters(max_iter as u64),
            None => state,
        }
    });
    #[cfg(feature = "obs_slog")]
    let executor = if opts.verbose {
        let observer = argmin_observer_slog::SlogLogger::term_noblock();
        executor.add_observer(observer, argmin::core::observers::ObserverMode::Always)
    } else {
        executor
    };

    let mut state = executor.run()?.state().clone();
    let iterations = state.get_iter();
    let fn_evals = state.get_func_counts().clone();
    let termination = state.get_termination_status().clone();
    if let TerminationStatus::Terminated(TerminationReason::SolverExit(reason)) = &termination {
        log::warn!("L-BFGS stopped after {iterations} iterations: {reason}");
        return Err(OptError::SolverExit { reason: reason.clone() });
    }
    let grad = state.take_gradient();
    let outcome = OptimOutcome::new(
        state.take_best_param(),
        -state.get_best_cost(),
        termination,
        iterations,
        fn_evals,
        grad,
    )?;
    log::info!(
        "L-BFGS finished after {} iterations ({}), log-likelihood {:.6}",
        outcome.iterations,
        outcome.status,
        outcome.value
    );
    Ok(outcome)
}
