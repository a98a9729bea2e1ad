//! `good_lp`-backed reference implementation of [`ExternalSolver`].
//!
//! `good_lp`'s public API models linear objectives and constraints; the
//! diagonal quadratic terms this workspace needs (ADMM's augmented-
//! Lagrangian penalty) are handled with a piecewise-linear epigraph
//! outer approximation rather than a native QP term, the same trick
//! `tep::solver` uses for its big-M linearization of integer decisions.
//! Each quadratic term `q * x^2` becomes an auxiliary variable `t >= q *
//! x^2` enforced by tangent cuts at evenly spaced breakpoints across the
//! variable's bounds.

use good_lp::solvers::clarabel::clarabel;
use good_lp::{constraint, variable, variables, Expression, Solution, SolverModel, Variable};
use std::time::Instant;

use crate::model::{ConstraintSense, ExternalSolver, MiqpProblem, MiqpSolution};
use crate::status::{ExternalSolverStatus, SolveOutcome};

/// Number of tangent cuts used to approximate each quadratic term.
const EPIGRAPH_BREAKPOINTS: usize = 6;

pub struct NativeSolver {
    name: String,
}

impl NativeSolver {
    pub fn new() -> Self {
        Self {
            name: "native-clarabel".to_string(),
        }
    }
}

impl Default for NativeSolver {
    fn default() -> Self {
        Self::new()
    }
}

impl ExternalSolver for NativeSolver {
    fn name(&self) -> &str {
        &self.name
    }

    fn solve(&self, problem: &MiqpProblem) -> SolveOutcome<MiqpSolution> {
        let start = Instant::now();
        let mut vars = variables!();
        let mut handles: Vec<Variable> = Vec::with_capacity(problem.vars.len());
        for spec in &problem.vars {
            let lb = if spec.lb.is_finite() { spec.lb } else { -1e9 };
            let ub = if spec.ub.is_finite() { spec.ub } else { 1e9 };
            // MIP support in clarabel is limited; integrality is relaxed
            // here and rounded on extraction, mirroring tep::solver's
            // documented LP-relaxation fallback.
            handles.push(vars.add(variable().min(lb).max(ub)));
        }

        let mut objective = Expression::from(0.0);
        for (i, coeff) in problem.linear_objective.iter().enumerate() {
            if *coeff != 0.0 {
                objective += *coeff * handles[i];
            }
        }

        let mut epigraph_vars = Vec::new();
        for (i, q) in problem.quadratic_diagonal.iter().enumerate() {
            if *q == 0.0 {
                continue;
            }
            let spec = &problem.vars[i];
            let lb = if spec.lb.is_finite() { spec.lb } else { -1e3 };
            let ub = if spec.ub.is_finite() { spec.ub } else { 1e3 };
            let t = vars.add(variable().min(0.0));
            epigraph_vars.push((i, t, *q, lb, ub));
            objective += t;
        }

        let mut model = vars.minimise(objective).using(clarabel);

        for (i, t, q, lb, ub) in &epigraph_vars {
            let x = handles[*i];
            let span = (ub - lb).max(1e-9);
            for k in 0..=EPIGRAPH_BREAKPOINTS {
                let x0 = lb + span * (k as f64) / (EPIGRAPH_BREAKPOINTS as f64);
                // Tangent to q*x^2 at x0: q*x0^2 + 2*q*x0*(x - x0)
                let tangent = 2.0 * q * x0 * x - q * x0 * x0;
                model = model.with(constraint!(*t >= tangent));
            }
        }

        for c in &problem.constraints {
            let mut expr = Expression::from(0.0);
            for (idx, coeff) in &c.coeffs {
                expr += *coeff * handles[*idx];
            }
            model = match c.sense {
                ConstraintSense::LessOrEqual => model.with(constraint!(expr <= c.rhs)),
                ConstraintSense::GreaterOrEqual => model.with(constraint!(expr >= c.rhs)),
                ConstraintSense::Equal => model.with(constraint!(expr == c.rhs)),
            };
        }

        tracing::debug!(n_vars = problem.vars.len(), "dispatching subproblem to {}", self.name);

        match model.solve() {
            Ok(solution) => {
                let values: Vec<f64> = handles
                    .iter()
                    .zip(problem.vars.iter())
                    .map(|(v, spec)| {
                        let raw = solution.value(*v);
                        if spec.is_integer {
                            raw.round()
                        } else {
                            raw
                        }
                    })
                    .collect();
                let objective = problem
                    .linear_objective
                    .iter()
                    .zip(values.iter())
                    .map(|(c, v)| c * v)
                    .sum::<f64>()
                    + problem
                        .quadratic_diagonal
                        .iter()
                        .zip(values.iter())
                        .map(|(q, v)| q * v * v)
                        .sum::<f64>();
                SolveOutcome::Ok(MiqpSolution {
                    status: ExternalSolverStatus::Optimal,
                    values,
                    objective,
                    solve_time: start.elapsed(),
                })
            }
            Err(err) => {
                let message = format!("{err:?}");
                if message.to_lowercase().contains("infeasible") {
                    SolveOutcome::Warn(
                        ExternalSolverStatus::Infeasible,
                        MiqpSolution {
                            status: ExternalSolverStatus::Infeasible,
                            values: vec![0.0; handles.len()],
                            objective: f64::NAN,
                            solve_time: start.elapsed(),
                        },
                    )
                } else {
                    SolveOutcome::Warn(
                        ExternalSolverStatus::NumericalIssue,
                        MiqpSolution {
                            status: ExternalSolverStatus::NumericalIssue,
                            values: vec![0.0; handles.len()],
                            objective: f64::NAN,
                            solve_time: start.elapsed(),
                        },
                    )
                }
            }
        }
    }
}
