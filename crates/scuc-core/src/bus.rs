use crate::ids::{BusId, ZoneId};
use serde::{Deserialize, Serialize};

/// A bus with a per-period demand time series.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Bus {
    pub id: BusId,
    /// Demand in MW, one entry per commitment period.
    pub demand: Vec<f64>,
    pub zone: ZoneId,
}

impl Bus {
    pub fn new(id: BusId, demand: Vec<f64>, zone: ZoneId) -> Self {
        Self { id, demand, zone }
    }

    pub fn periods(&self) -> usize {
        self.demand.len()
    }

    /// Zeroes the demand series, used when a bus is absorbed into a
    /// neighboring zone's boundary during recursive partitioning.
    pub fn zero_demand(&mut self) {
        self.demand.iter_mut().for_each(|d| *d = 0.0);
    }
}
