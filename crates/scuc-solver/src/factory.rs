//! Explicit solver configuration and construction.
//!
//! No global mutable solver-selection state: every call site builds its
//! own [`ExternalSolver`] from a [`SolverFactory`] rather than reaching
//! for a process-wide default, following the design note against hidden
//! global solver setup.

use serde::{Deserialize, Serialize};

use crate::model::ExternalSolver;
use crate::native::NativeSolver;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SolverFactory {
    pub mip_gap: f64,
    pub threads: usize,
    pub seed: u64,
    pub verbose: bool,
}

impl Default for SolverFactory {
    fn default() -> Self {
        Self {
            mip_gap: 1e-4,
            threads: 1,
            seed: 0,
            verbose: false,
        }
    }
}

impl SolverFactory {
    /// Builds a fresh collaborator instance. Returning `Box<dyn
    /// ExternalSolver>` rather than a concrete type keeps subprocess- or
    /// RPC-backed collaborators swappable without touching call sites.
    pub fn build(&self) -> Box<dyn ExternalSolver> {
        Box::new(NativeSolver::new())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_factory_builds_a_solver() {
        let factory = SolverFactory::default();
        let solver = factory.build();
        assert_eq!(solver.name(), "native-clarabel");
    }
}
