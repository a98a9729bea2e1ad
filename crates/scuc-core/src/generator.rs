use crate::ids::{BusId, GenId};
use serde::{Deserialize, Serialize};

/// A breakpoint of a 3-segment piecewise-linear marginal cost curve.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct CostSegment {
    pub mw: f64,
    pub marginal_cost: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Generator {
    pub id: GenId,
    pub bus: BusId,
    pub p_min: f64,
    pub p_max: f64,
    pub ramp_up: f64,
    pub ramp_down: f64,
    pub startup_ramp: f64,
    pub shutdown_ramp: f64,
    /// Initial power output at the start of the horizon.
    pub initial_power: f64,
    /// Signed hours the unit has been in its initial state: positive if
    /// on, negative if off.
    pub initial_on_hours: i32,
    pub min_up_time: u32,
    pub min_down_time: u32,
    pub cost_segments: [CostSegment; 3],
    pub no_load_cost: f64,
    pub startup_cost: f64,
}

impl Generator {
    pub fn is_initially_on(&self) -> bool {
        self.initial_on_hours > 0
    }

    /// Marginal cost interpolated linearly across the 3-segment curve.
    pub fn marginal_cost_at(&self, mw: f64) -> f64 {
        let segs = &self.cost_segments;
        if mw <= segs[0].mw {
            return segs[0].marginal_cost;
        }
        for w in segs.windows(2) {
            let (lo, hi) = (w[0], w[1]);
            if mw <= hi.mw {
                if (hi.mw - lo.mw).abs() < f64::EPSILON {
                    return hi.marginal_cost;
                }
                let t = (mw - lo.mw) / (hi.mw - lo.mw);
                return lo.marginal_cost + t * (hi.marginal_cost - lo.marginal_cost);
            }
        }
        segs[2].marginal_cost
    }
}
