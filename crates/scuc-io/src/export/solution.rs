//! Solution CSV export/import.
//!
//! One row per solved variant: `instance, variation, cost, is_on[g:t],
//! prod[g:t], reserve[g:t], inj[b:t], violations`, where `violations` is
//! a space-separated `monitored:outage` list (`outage` is `none` for a
//! pre-contingency entry).

use std::collections::HashMap;
use std::path::Path;

use scuc_core::{BusId, GenId, LineId, ScucError, ScucResult, Violation};

#[derive(Debug, Clone)]
pub struct Solution {
    pub instance: String,
    pub variation: String,
    pub cost: f64,
    pub n_gens: usize,
    pub n_buses: usize,
    pub periods: usize,
    pub is_on: HashMap<(GenId, usize), bool>,
    pub prod: HashMap<(GenId, usize), f64>,
    pub reserve: HashMap<(GenId, usize), f64>,
    pub inj: HashMap<(BusId, usize), f64>,
    pub violations: Vec<Violation>,
}

impl Solution {
    fn header(&self) -> Vec<String> {
        let mut header = vec!["instance".to_string(), "variation".to_string(), "cost".to_string()];
        for g in 0..self.n_gens {
            for t in 0..self.periods {
                header.push(format!("is_on[{g}:{t}]"));
            }
        }
        for g in 0..self.n_gens {
            for t in 0..self.periods {
                header.push(format!("prod[{g}:{t}]"));
            }
        }
        for g in 0..self.n_gens {
            for t in 0..self.periods {
                header.push(format!("reserve[{g}:{t}]"));
            }
        }
        for b in 0..self.n_buses {
            for t in 0..self.periods {
                header.push(format!("inj[{b}:{t}]"));
            }
        }
        header.push("violations".to_string());
        header
    }

    fn violations_field(&self) -> String {
        self.violations
            .iter()
            .filter(|v| v.time == 0)
            .map(|v| match v.outage_line {
                Some(o) => format!("{}:{}", v.monitored_line.index(), o.index()),
                None => format!("{}:none", v.monitored_line.index()),
            })
            .collect::<Vec<_>>()
            .join(" ")
    }

    pub fn to_csv(&self, path: &Path) -> ScucResult<()> {
        let mut writer = csv::Writer::from_path(path).map_err(csv_err)?;
        writer.write_record(self.header()).map_err(csv_err)?;

        let mut row = vec![self.instance.clone(), self.variation.clone(), self.cost.to_string()];
        for g in 0..self.n_gens {
            for t in 0..self.periods {
                let on = self.is_on.get(&(GenId::new(g), t)).copied().unwrap_or(false);
                row.push((on as u8).to_string());
            }
        }
        for g in 0..self.n_gens {
            for t in 0..self.periods {
                row.push(self.prod.get(&(GenId::new(g), t)).copied().unwrap_or(0.0).to_string());
            }
        }
        for g in 0..self.n_gens {
            for t in 0..self.periods {
                row.push(self.reserve.get(&(GenId::new(g), t)).copied().unwrap_or(0.0).to_string());
            }
        }
        for b in 0..self.n_buses {
            for t in 0..self.periods {
                row.push(self.inj.get(&(BusId::new(b), t)).copied().unwrap_or(0.0).to_string());
            }
        }
        row.push(self.violations_field());
        writer.write_record(&row).map_err(csv_err)?;
        writer.flush()?;
        Ok(())
    }

    pub fn from_csv(path: &Path, n_gens: usize, n_buses: usize, periods: usize) -> ScucResult<Self> {
        let mut reader = csv::Reader::from_path(path).map_err(csv_err)?;
        let record = reader
            .records()
            .next()
            .ok_or_else(|| ScucError::Parse("solution.csv: no data row".into()))?
            .map_err(csv_err)?;

        let instance = record[0].to_string();
        let variation = record[1].to_string();
        let cost: f64 = record[2]
            .parse()
            .map_err(|_| ScucError::Parse("solution.csv: malformed cost".into()))?;

        let mut col = 3;
        let mut is_on = HashMap::new();
        for g in 0..n_gens {
            for t in 0..periods {
                let v: u8 = record[col]
                    .parse()
                    .map_err(|_| ScucError::Parse("solution.csv: malformed is_on".into()))?;
                is_on.insert((GenId::new(g), t), v != 0);
                col += 1;
            }
        }
        let mut prod = HashMap::new();
        for g in 0..n_gens {
            for t in 0..periods {
                let v: f64 = record[col]
                    .parse()
                    .map_err(|_| ScucError::Parse("solution.csv: malformed prod".into()))?;
                prod.insert((GenId::new(g), t), v);
                col += 1;
            }
        }
        let mut reserve = HashMap::new();
        for g in 0..n_gens {
            for t in 0..periods {
                let v: f64 = record[col]
                    .parse()
                    .map_err(|_| ScucError::Parse("solution.csv: malformed reserve".into()))?;
                reserve.insert((GenId::new(g), t), v);
                col += 1;
            }
        }
        let mut inj = HashMap::new();
        for b in 0..n_buses {
            for t in 0..periods {
                let v: f64 = record[col]
                    .parse()
                    .map_err(|_| ScucError::Parse("solution.csv: malformed inj".into()))?;
                inj.insert((BusId::new(b), t), v);
                col += 1;
            }
        }
        let violations = record[col]
            .split_whitespace()
            .filter_map(|pair| {
                let (m, o) = pair.split_once(':')?;
                let monitored = LineId::new(m.parse().ok()?);
                let outage = if o == "none" { None } else { Some(LineId::new(o.parse().ok()?)) };
                Some(Violation {
                    time: 0,
                    monitored_line: monitored,
                    outage_line: outage,
                    amount: 0.0,
                    limit: 0.0,
                })
            })
            .collect();

        Ok(Solution {
            instance,
            variation,
            cost,
            n_gens,
            n_buses,
            periods,
            is_on,
            prod,
            reserve,
            inj,
            violations,
        })
    }
}

fn csv_err(err: csv::Error) -> ScucError {
    ScucError::Io(std::io::Error::new(std::io::ErrorKind::Other, err.to_string()))
}
