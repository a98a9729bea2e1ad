//! # scuc-algo: Sensitivity, Partitioning and Subproblem Construction
//!
//! The algorithmic core shared by the CLI's centralized solve path and
//! the distributed coordinator in `scuc-admm`:
//!
//! - [`sensitivity`]: injection shift factors, line outage distribution
//!   factors and post-contingency sensitivities (C1).
//! - [`partition`]: MIP-based balanced zone partitioning (C2).
//! - [`extract`]: non-owned bus classification and per-zone ISF-derived
//!   boundary link matrices, with a disk cache for large boundaries (C3).
//! - [`subproblem`]: turns a zone into a solvable MIQP, generator
//!   commitment/dispatch plus virtual cross-zone exchange (C4).

pub mod extract;
pub mod partition;
pub mod sensitivity;
pub mod subproblem;

pub use extract::{classify_bus_partitions, extract_base_link, extract_outage_link, ExtractorConfig};
pub use partition::{partition_instance, PartitionConfig, PartitionError};
pub use sensitivity::{
    change_slack, compute_isf, compute_lodf, post_contingency_isf, truncate_small, IsfMatrix,
    LodfMatrix,
};
pub use subproblem::{build_subproblem, AdmmSubproblem, SubproblemConfig, SubproblemLayout};
