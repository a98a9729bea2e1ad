use crate::ids::{BusId, LineId, ZoneId};
use serde::{Deserialize, Serialize};
use std::f64::consts::PI;

/// A transmission line. Susceptance is always derived from reactance
/// (`(100 * pi / 180) / reactance`, matching the per-unit convention used
/// throughout the sensitivity kernel) and is never set independently.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TransmissionLine {
    pub id: LineId,
    pub source: BusId,
    pub target: BusId,
    pub reactance: f64,
    pub normal_capacity: f64,
    pub emergency_capacity: f64,
    pub vulnerable: bool,
    pub zone: ZoneId,
}

impl TransmissionLine {
    pub fn new(
        id: LineId,
        source: BusId,
        target: BusId,
        reactance: f64,
        normal_capacity: f64,
        emergency_capacity: f64,
        vulnerable: bool,
        zone: ZoneId,
    ) -> Self {
        Self {
            id,
            source,
            target,
            reactance,
            normal_capacity,
            emergency_capacity,
            vulnerable,
            zone,
        }
    }

    pub fn susceptance(&self) -> f64 {
        (100.0 * PI / 180.0) / self.reactance
    }

    /// A line is a candidate for N-1 screening only if it is flagged
    /// vulnerable; non-vulnerable lines are assumed to never be outaged.
    pub fn is_contingency_candidate(&self) -> bool {
        self.vulnerable
    }
}
