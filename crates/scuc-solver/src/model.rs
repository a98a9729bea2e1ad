//! The black-box contract between the coordinator and an external
//! MIQP/QP solver collaborator.
//!
//! A subproblem is shipped as plain data (variable bounds, a linear +
//! diagonal-quadratic objective, linear constraints) rather than as a
//! live model-builder trait, the way `gat_solver_common::problem` ships a
//! `ProblemBatch` across an IPC boundary. [`crate::native::NativeSolver`]
//! is the in-process reference collaborator used by tests and by the
//! default CLI configuration; a real deployment can swap in any other
//! `ExternalSolver`.

use serde::{Deserialize, Serialize};
use std::time::Duration;

use crate::status::{ExternalSolverStatus, SolveOutcome};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConstraintSense {
    LessOrEqual,
    GreaterOrEqual,
    Equal,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VarSpec {
    pub lb: f64,
    pub ub: f64,
    pub is_integer: bool,
}

impl VarSpec {
    pub fn continuous(lb: f64, ub: f64) -> Self {
        Self {
            lb,
            ub,
            is_integer: false,
        }
    }

    pub fn binary() -> Self {
        Self {
            lb: 0.0,
            ub: 1.0,
            is_integer: true,
        }
    }
}

#[derive(Debug, Clone)]
pub struct LinearConstraint {
    /// `(variable index, coefficient)` pairs, sparse.
    pub coeffs: Vec<(usize, f64)>,
    pub sense: ConstraintSense,
    pub rhs: f64,
}

/// A MIQP/QP subproblem: `minimize linear^T x + sum_i quadratic_diag[i] *
/// x[i]^2` subject to `constraints`, with `vars[i].is_integer` toggling
/// the MIQP/QP distinction per variable.
#[derive(Debug, Clone, Default)]
pub struct MiqpProblem {
    pub vars: Vec<VarSpec>,
    pub linear_objective: Vec<f64>,
    /// Diagonal quadratic objective coefficients, same length as `vars`
    /// (zero entries are pure-linear variables).
    pub quadratic_diagonal: Vec<f64>,
    pub constraints: Vec<LinearConstraint>,
    pub warm_start: Option<Vec<f64>>,
    pub time_limit: Duration,
    pub mip_gap: f64,
}

impl MiqpProblem {
    pub fn new(n_vars: usize) -> Self {
        Self {
            vars: vec![VarSpec::continuous(f64::NEG_INFINITY, f64::INFINITY); n_vars],
            linear_objective: vec![0.0; n_vars],
            quadratic_diagonal: vec![0.0; n_vars],
            constraints: Vec::new(),
            warm_start: None,
            time_limit: Duration::from_secs(60),
            mip_gap: 1e-4,
        }
    }

    /// Relaxes every integer variable to continuous in place, the MIQP
    /// to QP mode transition the coordinator drives under stagnation.
    pub fn relax_integers(&mut self) {
        for v in self.vars.iter_mut() {
            v.is_integer = false;
        }
    }

    pub fn is_mixed_integer(&self) -> bool {
        self.vars.iter().any(|v| v.is_integer)
    }
}

#[derive(Debug, Clone)]
pub struct MiqpSolution {
    pub status: ExternalSolverStatus,
    pub values: Vec<f64>,
    pub objective: f64,
    pub solve_time: Duration,
}

/// The external solver collaborator contract. Implementations may be a
/// subprocess, an RPC client, or (as here) an in-process solve.
pub trait ExternalSolver: Send + Sync {
    fn name(&self) -> &str;

    fn solve(&self, problem: &MiqpProblem) -> SolveOutcome<MiqpSolution>;
}
