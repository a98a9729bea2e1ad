//! Output formats: the instance CSV layout (for round-tripping and for
//! inspecting a partitioned instance) and the per-run solution CSV.

pub mod instance;
pub mod solution;

pub use instance::export_instance;
pub use solution::Solution;
