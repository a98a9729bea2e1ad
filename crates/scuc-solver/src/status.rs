//! Solver status and the tagged `Ok`/`Warn`/`Fatal` outcome the coordinator
//! matches on (no panics, no unwraps on a failed solve).

use serde::{Deserialize, Serialize};
use std::fmt;

/// Status reported by an external solver after a solve attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ExternalSolverStatus {
    Optimal,
    Infeasible,
    Unbounded,
    Timeout,
    IterationLimit,
    /// Numerical difficulties reported with `is_successful == true`; must
    /// still be treated as [`SolveOutcome::Warn`], never `Ok`.
    NumericalIssue,
    Error,
    Unknown,
}

impl ExternalSolverStatus {
    pub fn is_clean(&self) -> bool {
        matches!(self, ExternalSolverStatus::Optimal)
    }
}

impl fmt::Display for ExternalSolverStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            ExternalSolverStatus::Optimal => "optimal",
            ExternalSolverStatus::Infeasible => "infeasible",
            ExternalSolverStatus::Unbounded => "unbounded",
            ExternalSolverStatus::Timeout => "timeout",
            ExternalSolverStatus::IterationLimit => "iteration_limit",
            ExternalSolverStatus::NumericalIssue => "numerical_issue",
            ExternalSolverStatus::Error => "error",
            ExternalSolverStatus::Unknown => "unknown",
        };
        write!(f, "{s}")
    }
}

/// The fatal-vs-recoverable split used throughout §7's error taxonomy:
/// a clean solve is `Ok`, a degraded-but-usable solve is `Warn` (caller
/// reuses the last known value and keeps iterating), and an unrecoverable
/// condition is `Fatal`.
#[derive(Debug, Clone)]
pub enum SolveOutcome<T> {
    Ok(T),
    Warn(ExternalSolverStatus, T),
    Fatal(FatalKind),
}

#[derive(Debug, Clone, thiserror::Error)]
pub enum FatalKind {
    #[error("auxiliary MIP is infeasible: {0}")]
    InfeasibleMip(String),
    #[error("network is disconnected: singular Laplacian in {0}")]
    SingularLaplacian(String),
    #[error("link-matrix normal equations are singular in {0}")]
    SingularNormalEquations(String),
    #[error("model build error: {0}")]
    ModelBuild(String),
    #[error("unsupported security zone count: {0}")]
    UnsupportedSecurityZoneCount(usize),
}

impl<T> SolveOutcome<T> {
    pub fn is_ok(&self) -> bool {
        matches!(self, SolveOutcome::Ok(_))
    }

    pub fn is_fatal(&self) -> bool {
        matches!(self, SolveOutcome::Fatal(_))
    }

    /// Extracts the usable value, if any (`Ok` or `Warn`'s reused value).
    pub fn value(&self) -> Option<&T> {
        match self {
            SolveOutcome::Ok(v) | SolveOutcome::Warn(_, v) => Some(v),
            SolveOutcome::Fatal(_) => None,
        }
    }
}
