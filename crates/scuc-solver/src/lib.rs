//! # scuc-solver: External MIQP/QP Solver Abstraction
//!
//! The generator-level unit commitment MIP and the convex MIQP/QP
//! subproblems solved each ADMM iteration are delegated to an external
//! collaborator behind the [`ExternalSolver`] trait, built from an
//! explicit [`SolverFactory`] rather than a process-wide default. A
//! `good_lp`/`clarabel`-backed [`NativeSolver`] is provided as the
//! in-process reference collaborator used by tests and the CLI's
//! default configuration.

pub mod factory;
pub mod model;
pub mod native;
pub mod status;

pub use factory::SolverFactory;
pub use model::{ConstraintSense, ExternalSolver, LinearConstraint, MiqpProblem, MiqpSolution, VarSpec};
pub use native::NativeSolver;
pub use status::{ExternalSolverStatus, FatalKind, SolveOutcome};
