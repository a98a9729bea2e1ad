use crate::ids::LineId;
use serde::{Deserialize, Serialize};

/// One transmission-limit violation found by the contingency screening
/// callback: `monitored` is the line whose flow is over limit, `outage`
/// is `None` for a pre-contingency check or `Some(line)` for the N-1
/// post-contingency case.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Violation {
    pub time: usize,
    pub monitored_line: LineId,
    pub outage_line: Option<LineId>,
    pub amount: f64,
    pub limit: f64,
}

impl Violation {
    /// The dedup key used to cap added constraints to one per unique
    /// `(t, monitored, outage)` triple across the whole run.
    pub fn dedup_key(&self) -> (usize, LineId, Option<LineId>) {
        (self.time, self.monitored_line, self.outage_line)
    }
}
