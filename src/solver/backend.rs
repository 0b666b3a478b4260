use std::panic::{catch_unwind, AssertUnwindSafe};
use std::time::Instant;

use good_lp::solvers::MipGapError;
use good_lp::{
    variable, Constraint, Expression, ProblemVariables, ResolutionError, Solution, SolutionStatus,
    SolverModel, Variable,
};
#[cfg(not(feature = "highs"))]
use good_lp::{WithMipGap, WithTimeLimit};
use tracing::{info, warn};

use crate::model::{LinearExpr, LinearModel, Sense};
use crate::solver::{MilpSolver, SolveLimits, SolverLog, SolverRun, SolverStatus};

#[derive(Debug, Clone, Copy, Default)]
pub struct GoodLpSolver;

impl MilpSolver for GoodLpSolver {
    fn name(&self) -> &'static str {
        if cfg!(feature = "highs") {
            "highs"
        } else {
            "microlp"
        }
    }

    fn solve(&self, model: &LinearModel, limits: &SolveLimits, log: &SolverLog) -> SolverRun {
        let started = Instant::now();
        log.append(format!(
            "Solving with {}: {} variables, {} rows",
            self.name(),
            model.var_count(),
            model.rows().len()
        ));

        let (status, values) = match catch_unwind(AssertUnwindSafe(|| run(model, limits, log))) {
            Ok(result) => result,
            Err(panic) => {
                let reason = panic
                    .downcast_ref::<&str>()
                    .map(|s| s.to_string())
                    .or_else(|| panic.downcast_ref::<String>().cloned())
                    .unwrap_or_else(|| "solver panicked".to_string());
                warn!("solver panicked: {reason}");
                log.append(format!("Solver aborted: {reason}"));
                (SolverStatus::NotSolved(reason), Vec::new())
            }
        };

        let objective = status
            .has_solution()
            .then(|| model.objective().evaluate(&values));
        let elapsed = started.elapsed();
        info!(
            backend = self.name(),
            elapsed_ms = elapsed.as_millis() as u64,
            ?status,
            "solver finished"
        );
        SolverRun {
            status,
            values,
            objective,
            elapsed,
        }
    }
}

fn to_expression(expr: &LinearExpr, vars: &[Variable]) -> Expression {
    let mut out = Expression::with_capacity(expr.terms.len());
    for (var, coefficient) in &expr.terms {
        out.add_mul(*coefficient, vars[var.0]);
    }
    out + expr.constant
}

fn to_constraints(model: &LinearModel, vars: &[Variable]) -> Vec<Constraint> {
    model
        .rows()
        .iter()
        .map(|row| {
            let lhs = to_expression(&row.expr, vars);
            match row.sense {
                Sense::Le => lhs.leq(row.rhs),
                Sense::Ge => lhs.geq(row.rhs),
                Sense::Eq => lhs.eq(row.rhs),
            }
        })
        .collect()
}

fn declare(model: &LinearModel) -> (ProblemVariables, Vec<Variable>) {
    let mut problem_vars = ProblemVariables::new();
    let vars = model
        .var_names()
        .iter()
        .map(|name| problem_vars.add(variable().binary().name(name.clone())))
        .collect();
    (problem_vars, vars)
}

fn map_error(err: ResolutionError, log: &SolverLog) -> SolverStatus {
    match err {
        ResolutionError::Infeasible => {
            log.append("Problem is infeasible");
            SolverStatus::Infeasible
        }
        ResolutionError::Unbounded => {
            log.append("Problem is unbounded");
            SolverStatus::Unbounded
        }
        other => {
            log.append(format!("Solver error: {other}"));
            SolverStatus::NotSolved(other.to_string())
        }
    }
}

fn solve_with<M>(
    mut problem: M,
    model: &LinearModel,
    vars: &[Variable],
    limits: &SolveLimits,
    log: &SolverLog,
) -> (SolverStatus, Vec<f64>)
where
    M: SolverModel<Error = ResolutionError>,
{
    for constraint in to_constraints(model, vars) {
        problem.add_constraint(constraint);
    }
    match problem.solve() {
        Ok(solution) => {
            let values = vars.iter().map(|v| solution.value(*v)).collect();
            let (status, line) = classify(solution.status(), limits);
            log.append(line);
            (status, values)
        }
        Err(err) => (map_error(err, log), Vec::new()),
    }
}

/// A gap-terminated solve counts as optimal; only the clock yields a timeout.
fn classify(status: SolutionStatus, limits: &SolveLimits) -> (SolverStatus, String) {
    match status {
        SolutionStatus::Optimal => (SolverStatus::Optimal, "Optimal solution found".to_string()),
        SolutionStatus::GapLimit => (
            SolverStatus::Optimal,
            format!("Solution found within relative gap {}", limits.relative_gap),
        ),
        SolutionStatus::TimeLimit => (
            SolverStatus::FeasibleAtTimeout,
            "Time limit reached with a feasible solution".to_string(),
        ),
    }
}

fn rejected_gap(err: MipGapError, log: &SolverLog) -> (SolverStatus, Vec<f64>) {
    log.append(format!("Rejected relative gap: {err}"));
    (SolverStatus::NotSolved(err.to_string()), Vec::new())
}

#[cfg(not(feature = "highs"))]
fn run(model: &LinearModel, limits: &SolveLimits, log: &SolverLog) -> (SolverStatus, Vec<f64>) {
    let (problem_vars, vars) = declare(model);
    let objective = to_expression(model.objective(), &vars);

    let problem = problem_vars
        .minimise(objective)
        .using(good_lp::microlp)
        .with_time_limit(limits.time_limit.as_secs_f64());
    match problem.with_mip_gap(limits.relative_gap as f32) {
        Ok(problem) => solve_with(problem, model, &vars, limits, log),
        Err(err) => rejected_gap(err, log),
    }
}

#[cfg(feature = "highs")]
fn run(model: &LinearModel, limits: &SolveLimits, log: &SolverLog) -> (SolverStatus, Vec<f64>) {
    let (problem_vars, vars) = declare(model);
    let objective = to_expression(model.objective(), &vars);

    let log_file = log.path().to_string_lossy().into_owned();
    let problem = problem_vars
        .minimise(objective)
        .using(good_lp::highs)
        .set_time_limit(limits.time_limit.as_secs_f64())
        .set_option("log_file", log_file.as_str())
        .set_option("log_to_console", false)
        .set_option("output_flag", true);
    match problem.set_mip_rel_gap(limits.relative_gap as f32) {
        Ok(problem) => solve_with(problem, model, &vars, limits, log),
        Err(err) => rejected_gap(err, log),
    }
}
