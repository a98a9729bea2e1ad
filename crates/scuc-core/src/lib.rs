//! # scuc-core: Security-Constrained Unit Commitment Data Model
//!
//! Provides the fundamental data structures shared by every crate in this
//! workspace: buses, transmission lines, generators, the unit commitment
//! instance they compose into, and the zone partitions the distributed
//! solver coordinates across.
//!
//! ## Quick Start
//!
//! ```
//! use scuc_core::{Bus, BusId, Generator, GenId, TransmissionLine, LineId, UnitCommitmentInstance, ZoneId, CostSegment};
//!
//! let bus0 = Bus::new(BusId::new(0), vec![10.0, 12.0], ZoneId::new(0));
//! let bus1 = Bus::new(BusId::new(1), vec![0.0, 0.0], ZoneId::new(0));
//!
//! let line = TransmissionLine::new(
//!     LineId::new(0), BusId::new(0), BusId::new(1),
//!     0.1, 100.0, 120.0, true, ZoneId::new(0),
//! );
//!
//! let segs = [
//!     CostSegment { mw: 0.0, marginal_cost: 20.0 },
//!     CostSegment { mw: 50.0, marginal_cost: 25.0 },
//!     CostSegment { mw: 100.0, marginal_cost: 30.0 },
//! ];
//! let gen = Generator {
//!     id: GenId::new(0), bus: BusId::new(0),
//!     p_min: 0.0, p_max: 100.0, ramp_up: 20.0, ramp_down: 20.0,
//!     startup_ramp: 50.0, shutdown_ramp: 50.0, initial_power: 0.0,
//!     initial_on_hours: -1, min_up_time: 1, min_down_time: 1,
//!     cost_segments: segs, no_load_cost: 5.0, startup_cost: 100.0,
//! };
//!
//! let instance = UnitCommitmentInstance::new("toy", vec![bus0, bus1], vec![line], vec![gen]);
//! assert!(instance.validate().is_ok());
//! ```

pub mod bus;
pub mod error;
pub mod generator;
pub mod ids;
pub mod instance;
pub mod line;
pub mod matrix;
pub mod violation;
pub mod zone;

pub use bus::Bus;
pub use error::{ScucError, ScucResult};
pub use generator::{CostSegment, Generator};
pub use ids::{BusId, GenId, LineId, ZoneId};
pub use instance::UnitCommitmentInstance;
pub use line::TransmissionLine;
pub use matrix::DenseMatrix;
pub use violation::Violation;
pub use zone::Zone;
