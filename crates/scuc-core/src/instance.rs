use crate::bus::Bus;
use crate::error::{ScucError, ScucResult};
use crate::generator::Generator;
use crate::line::TransmissionLine;
use serde::{Deserialize, Serialize};

/// A unit commitment instance: a fixed network topology plus generators,
/// indexed densely from zero. [`validate`](Self::validate) is the single
/// place that enforces the dense-index invariant every algorithm relies on.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UnitCommitmentInstance {
    pub name: String,
    pub buses: Vec<Bus>,
    pub lines: Vec<TransmissionLine>,
    pub generators: Vec<Generator>,
}

impl UnitCommitmentInstance {
    pub fn new(
        name: impl Into<String>,
        buses: Vec<Bus>,
        lines: Vec<TransmissionLine>,
        generators: Vec<Generator>,
    ) -> Self {
        Self {
            name: name.into(),
            buses,
            lines,
            generators,
        }
    }

    pub fn periods(&self) -> usize {
        self.buses.first().map(|b| b.periods()).unwrap_or(0)
    }

    /// Confirms buses/lines/generators are densely indexed `0..N`, all
    /// referenced buses exist, and every bus's demand series has the same
    /// length. Configuration errors here are fatal at startup per the
    /// error taxonomy.
    pub fn validate(&self) -> ScucResult<()> {
        for (i, bus) in self.buses.iter().enumerate() {
            if bus.id.index() != i {
                return Err(ScucError::Validation(format!(
                    "bus index gap: expected {i}, found {}",
                    bus.id.index()
                )));
            }
        }
        for (i, line) in self.lines.iter().enumerate() {
            if line.id.index() != i {
                return Err(ScucError::Validation(format!(
                    "line index gap: expected {i}, found {}",
                    line.id.index()
                )));
            }
            if line.source.index() >= self.buses.len() || line.target.index() >= self.buses.len()
            {
                return Err(ScucError::Validation(format!(
                    "line {} references an out-of-range bus",
                    line.id
                )));
            }
        }
        for (i, gen) in self.generators.iter().enumerate() {
            if gen.id.index() != i {
                return Err(ScucError::Validation(format!(
                    "generator index gap: expected {i}, found {}",
                    gen.id.index()
                )));
            }
            if gen.bus.index() >= self.buses.len() {
                return Err(ScucError::Validation(format!(
                    "generator {} references an out-of-range bus",
                    gen.id
                )));
            }
        }
        let expected_periods = self.periods();
        for bus in &self.buses {
            if bus.periods() != expected_periods {
                return Err(ScucError::Validation(format!(
                    "bus {} has {} demand periods, expected {}",
                    bus.id,
                    bus.periods(),
                    expected_periods
                )));
            }
        }
        Ok(())
    }
}
