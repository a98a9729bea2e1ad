//! # scuc-io: Instance and Solution CSV Boundary
//!
//! The only IO surface this workspace has: reading a `buses.csv` /
//! `lines.csv` / `generators.csv` directory into a
//! [`scuc_core::UnitCommitmentInstance`], and writing both an instance
//! and a solved run back out in the same CSV dialect, for the CLI's
//! `import` step and for recording end-to-end results.

pub mod export;
pub mod import;

pub use export::{export_instance, Solution};
pub use import::import_instance;
