//! # scuc-admm: Distributed Sharing-ADMM Coordination
//!
//! Drives one worker thread per zone through the sharing-ADMM
//! iteration: local MIQP/QP solve, post-solve contingency screening,
//! a barrier, a consensus-target reduction, and a dual update, with a
//! dual-mode MIQP/QP state machine that relaxes integers under
//! objective stagnation and restores them under consensus stagnation.
//!
//! - [`communicator`]: the collective-operations abstraction
//!   (`size`/`rank`/`barrier`/`all_reduce_*`) workers synchronize
//!   through (C5's message-passing runtime contract).
//! - [`coordinator`]: the per-worker iteration loop itself (C5).
//! - [`screening`]: the post-solve N-1 contingency screening callback
//!   plugged into each worker (C6).

pub mod communicator;
pub mod coordinator;
pub mod screening;

pub use communicator::{in_process_communicators, Communicator, InProcessCommunicator};
pub use coordinator::{run_admm, AdmmConfig, AdmmResult, BoundarySlot, Mode, ScreeningFn};
pub use screening::{ContingencyScreener, ScreeningConfig};
