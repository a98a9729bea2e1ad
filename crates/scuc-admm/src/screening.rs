//! C6 — Contingency Screening.
//!
//! Runs as the ADMM worker's post-solve callback: all-reduces this
//! worker's contribution to the network-wide per-bus injection vector,
//! recomputes a conservative safety band over the zone's vulnerable
//! internal lines when the outside-zone part of that vector moves, and
//! searches pre- and post-contingency flows on the zone's own internal
//! lines for limit violations — lazily adding a bounding constraint the
//! next time a violation is found, in the style of `tep::problem`'s
//! incremental constraint generation for transmission limits,
//! generalized here to the N-1 case via LODF.

use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use scuc_algo::{IsfMatrix, LodfMatrix};
use scuc_core::{BusId, GenId, LineId, UnitCommitmentInstance, Violation, Zone};
use scuc_solver::{ConstraintSense, LinearConstraint, MiqpSolution, VarSpec};

use crate::communicator::Communicator;
use crate::coordinator::ScreeningFn;
use scuc_algo::AdmmSubproblem;

#[derive(Debug, Clone)]
pub struct ScreeningConfig {
    /// Minimum L2 change in the external-bus injection vector that
    /// triggers recomputing the safety band.
    pub flow_change_threshold: f64,
    /// Minimum margin over a line's limit counted as a violation.
    pub violation_threshold: f64,
}

impl Default for ScreeningConfig {
    fn default() -> Self {
        Self {
            flow_change_threshold: 10.0,
            violation_threshold: 1e-3,
        }
    }
}

/// One zone's contingency screener: owns the zone's own copy of its
/// boundary network (`link_base`/`link_outage`) plus the full-network
/// sensitivity matrices, and the dedup set capping added constraints to
/// one per unique violation triple across the whole run. Generic over
/// the communicator so it can fold its local bus-injection contribution
/// into the network-wide vector every other zone's screener sees too.
pub struct ContingencyScreener<C: Communicator> {
    instance: Arc<UnitCommitmentInstance>,
    zone: Zone,
    isf: Arc<IsfMatrix>,
    lodf: Arc<LodfMatrix>,
    config: ScreeningConfig,
    comm: C,
    /// This zone's own generators, grouped by the bus they sit on.
    bus_generators: HashMap<BusId, Vec<GenId>>,
    /// Position of each network bus in the all-reduced injection vector.
    bus_index: HashMap<BusId, usize>,
    /// This zone's external bus order (BN ∪ BNE ∪ BE), matching
    /// `link_base`/`link_outage`'s column space.
    external_buses: Vec<BusId>,
    previous_external: HashMap<usize, Vec<f64>>,
    seen: HashSet<(usize, LineId, Option<LineId>)>,
    pub violations: Vec<Violation>,
}

impl<C: Communicator> ContingencyScreener<C> {
    pub fn new(
        instance: Arc<UnitCommitmentInstance>,
        zone: Zone,
        isf: Arc<IsfMatrix>,
        lodf: Arc<LodfMatrix>,
        comm: C,
        config: ScreeningConfig,
    ) -> Self {
        let bus_generators = instance.generators.iter().fold(
            HashMap::new(),
            |mut acc: HashMap<BusId, Vec<GenId>>, g| {
                if zone.own_buses().any(|&b| b == g.bus) {
                    acc.entry(g.bus).or_default().push(g.id);
                }
                acc
            },
        );
        let bus_index: HashMap<BusId, usize> =
            instance.buses.iter().enumerate().map(|(i, b)| (b.id, i)).collect();
        let external_buses: Vec<BusId> = zone.external_bus_order().copied().collect();
        Self {
            instance,
            zone,
            isf,
            lodf,
            config,
            comm,
            bus_generators,
            bus_index,
            external_buses,
            previous_external: HashMap::new(),
            seen: HashSet::new(),
            violations: Vec::new(),
        }
    }

    /// Wraps `self` as the per-worker callback `run_admm` expects.
    pub fn into_screening_fn(mut self) -> ScreeningFn
    where
        C: 'static,
    {
        Box::new(move |subproblem, solution| self.screen(subproblem, solution))
    }

    /// This zone's contribution to the full per-bus injection vector at
    /// period `t`: generation minus demand at every bus this zone owns,
    /// zero everywhere else. All-reducing this across every zone's
    /// screener yields the true network-wide injection vector.
    fn local_injection(&self, subproblem: &AdmmSubproblem, solution: &MiqpSolution, t: usize) -> Vec<f64> {
        self.instance
            .buses
            .iter()
            .map(|bus| {
                let Some(gens) = self.bus_generators.get(&bus.id) else {
                    return 0.0;
                };
                let gen: f64 = gens
                    .iter()
                    .filter_map(|gid| subproblem.layout.power.get(&(*gid, t)).map(|&idx| solution.values[idx]))
                    .sum();
                let demand = bus.demand.get(t).copied().unwrap_or(0.0);
                gen - demand
            })
            .collect()
    }

    fn external_injection(&self, global: &[f64]) -> Vec<f64> {
        self.external_buses
            .iter()
            .map(|b| self.bus_index.get(b).map(|&i| global[i]).unwrap_or(0.0))
            .collect()
    }

    fn flow_at(&self, line: LineId, global: &[f64]) -> f64 {
        self.instance
            .buses
            .iter()
            .enumerate()
            .map(|(i, bus)| self.isf.get(line, bus.id) * global[i])
            .sum()
    }

    fn periods(&self) -> usize {
        self.instance.periods()
    }

    fn screen(&mut self, subproblem: &mut AdmmSubproblem, solution: &MiqpSolution) {
        if self.zone.internal_lines.is_empty() {
            return;
        }
        for t in 0..self.periods() {
            let local = self.local_injection(subproblem, solution, t);
            let global = self.comm.all_reduce_sum(&local);
            self.update_safety_band(subproblem, &global, t);
            self.search_violations(subproblem, &global, t);
        }
    }

    /// Recomputes the `(e_max, e_min)` bound on every vulnerable internal
    /// line's safety-band slack once the external-bus injection vector
    /// has moved by more than [`ScreeningConfig::flow_change_threshold`]
    /// since the last recomputation; otherwise reuses the existing bound.
    fn update_safety_band(&mut self, subproblem: &mut AdmmSubproblem, global: &[f64], t: usize) {
        if self.external_buses.is_empty() {
            return;
        }
        let external = self.external_injection(global);
        let w_base = link_matvec(&self.zone.link_base, &external);
        let moved = match self.previous_external.get(&t) {
            Some(prev) => l2_norm(&diff(&w_base, prev)) > self.config.flow_change_threshold,
            None => true,
        };
        if !moved {
            return;
        }
        self.previous_external.insert(t, w_base.clone());

        let mut kept_diffs: Vec<Vec<f64>> = Vec::new();
        for &line_id in &self.zone.internal_lines {
            if !self.instance.lines[line_id.index()].is_contingency_candidate() {
                continue;
            }
            let Some(link_outage) = self.zone.link_outage.get(&line_id) else {
                continue;
            };
            let w_outage = link_matvec(link_outage, &external);
            let d = diff(&w_outage, &w_base);
            if l2_norm(&d) > self.config.flow_change_threshold {
                kept_diffs.push(d);
            }
        }

        for &monitored in &self.zone.internal_lines {
            let Some(&(e_max_idx, e_min_idx)) = subproblem.layout.safety_band.get(&(monitored, t))
            else {
                continue;
            };
            let amounts: Vec<f64> = kept_diffs
                .iter()
                .map(|d| {
                    self.external_buses
                        .iter()
                        .zip(d.iter())
                        .map(|(&b, &v)| self.isf.get(monitored, b) * v)
                        .sum()
                })
                .collect();
            let e_max = amounts.iter().cloned().fold(0.0_f64, f64::max);
            let e_min = amounts.iter().cloned().fold(0.0_f64, f64::min).abs();
            subproblem.problem.vars[e_max_idx].ub = e_max;
            subproblem.problem.vars[e_min_idx].ub = e_min;
        }
    }

    /// Pre-contingency and post-contingency (N-1 via LODF) flow checks
    /// over every internal line this zone monitors, keeping at most one
    /// candidate violation per period (the single largest margin).
    fn search_violations(&mut self, subproblem: &mut AdmmSubproblem, global: &[f64], t: usize) {
        let flows: HashMap<LineId, f64> = self
            .zone
            .internal_lines
            .iter()
            .map(|&l| (l, self.flow_at(l, global)))
            .collect();

        let mut worst: Option<Violation> = None;
        let mut consider = |v: Violation, worst: &mut Option<Violation>| {
            if worst.as_ref().map_or(true, |w| v.amount > w.amount) {
                *worst = Some(v);
            }
        };

        for &monitored in &self.zone.internal_lines {
            let line = &self.instance.lines[monitored.index()];
            let flow = flows[&monitored];
            let amount = flow.abs() - line.normal_capacity;
            if amount > self.config.violation_threshold {
                consider(
                    Violation {
                        time: t,
                        monitored_line: monitored,
                        outage_line: None,
                        amount,
                        limit: line.normal_capacity,
                    },
                    &mut worst,
                );
            }

            for &outage in &self.zone.internal_lines {
                if outage == monitored {
                    continue;
                }
                if !self.instance.lines[outage.index()].is_contingency_candidate() {
                    continue;
                }
                let factor = self.lodf.get(monitored, outage);
                if !factor.is_finite() {
                    continue;
                }
                let post_flow = flow + factor * flows[&outage];
                let post_amount = post_flow.abs() - line.emergency_capacity;
                if post_amount > self.config.violation_threshold {
                    consider(
                        Violation {
                            time: t,
                            monitored_line: monitored,
                            outage_line: Some(outage),
                            amount: post_amount,
                            limit: line.emergency_capacity,
                        },
                        &mut worst,
                    );
                }
            }
        }

        if let Some(v) = worst {
            if self.seen.insert(v.dedup_key()) {
                tracing::debug!(
                    zone = self.zone.id.index(),
                    time = v.time,
                    monitored = v.monitored_line.index(),
                    outage = ?v.outage_line,
                    amount = v.amount,
                    "adding contingency constraint for new violation"
                );
                add_violation_constraint(
                    subproblem,
                    &self.instance,
                    &self.zone,
                    &self.bus_generators,
                    &self.isf,
                    &self.lodf,
                    &v,
                );
                self.violations.push(v);
            }
        }
    }
}

fn link_matvec(link: &scuc_core::DenseMatrix, v: &[f64]) -> Vec<f64> {
    let n = link.rows();
    (0..n)
        .map(|i| (0..link.cols()).map(|j| link[(i, j)] * v[j]).sum())
        .collect()
}

fn diff(a: &[f64], b: &[f64]) -> Vec<f64> {
    a.iter().zip(b.iter()).map(|(x, y)| x - y).collect()
}

fn l2_norm(v: &[f64]) -> f64 {
    v.iter().map(|x| x * x).sum::<f64>().sqrt()
}

fn push_var(problem: &mut scuc_solver::MiqpProblem, spec: VarSpec) -> usize {
    let idx = problem.vars.len();
    problem.vars.push(spec);
    problem.linear_objective.push(0.0);
    problem.quadratic_diagonal.push(0.0);
    idx
}

/// Adds a bounding constraint for a newly found violation: an internal
/// line's flow is a linear combination of this zone's own generator
/// dispatch (ISF-weighted, demand folded into the constant term), so the
/// constraint can live entirely in this zone's own subproblem. Ties a
/// `flow_monitored` variable to that combination, bounds it by the
/// line's normal limit, and for the post-contingency case adds a second
/// `flow_outage` variable combined via the LODF factor and bounded by
/// the emergency limit instead.
fn add_violation_constraint(
    subproblem: &mut AdmmSubproblem,
    instance: &UnitCommitmentInstance,
    zone: &Zone,
    bus_generators: &HashMap<BusId, Vec<GenId>>,
    isf: &IsfMatrix,
    lodf: &LodfMatrix,
    v: &Violation,
) {
    let flow_expr = |line: LineId, t: usize| -> (Vec<(usize, f64)>, f64) {
        let mut coeffs = Vec::new();
        let mut rhs = 0.0;
        for &bus in zone.own_buses() {
            let coef = isf.get(line, bus);
            if coef == 0.0 {
                continue;
            }
            if let Some(gens) = bus_generators.get(&bus) {
                for &gid in gens {
                    if let Some(&idx) = subproblem.layout.power.get(&(gid, t)) {
                        coeffs.push((idx, coef));
                    }
                }
            }
            let demand = instance.buses[bus.index()].demand.get(t).copied().unwrap_or(0.0);
            rhs += coef * demand;
        }
        (coeffs, rhs)
    };

    let flow_monitored = push_var(&mut subproblem.problem, VarSpec::continuous(-v.limit, v.limit));
    let (mut coeffs, rhs) = flow_expr(v.monitored_line, v.time);
    coeffs.push((flow_monitored, -1.0));
    subproblem.problem.constraints.push(LinearConstraint {
        coeffs,
        sense: ConstraintSense::Equal,
        rhs,
    });

    match v.outage_line {
        None => {}
        Some(outage) => {
            let factor = lodf.get(v.monitored_line, outage);
            let flow_outage = push_var(&mut subproblem.problem, VarSpec::continuous(f64::NEG_INFINITY, f64::INFINITY));
            let (mut outage_coeffs, outage_rhs) = flow_expr(outage, v.time);
            outage_coeffs.push((flow_outage, -1.0));
            subproblem.problem.constraints.push(LinearConstraint {
                coeffs: outage_coeffs,
                sense: ConstraintSense::Equal,
                rhs: outage_rhs,
            });
            // post = flow_monitored + factor * flow_outage, bounded by the
            // emergency limit in both directions.
            subproblem.problem.constraints.push(LinearConstraint {
                coeffs: vec![(flow_monitored, 1.0), (flow_outage, factor)],
                sense: ConstraintSense::LessOrEqual,
                rhs: v.limit,
            });
            subproblem.problem.constraints.push(LinearConstraint {
                coeffs: vec![(flow_monitored, 1.0), (flow_outage, factor)],
                sense: ConstraintSense::GreaterOrEqual,
                rhs: -v.limit,
            });
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::communicator::in_process_communicators;
    use scuc_algo::{build_subproblem, classify_bus_partitions, subproblem::SubproblemConfig};
    use scuc_core::{Bus, CostSegment, DenseMatrix, Generator, TransmissionLine, ZoneId};

    /// Two zones joined by one tie line; zone1 additionally has one
    /// strictly-internal line between its own two buses and one generator
    /// at its far bus — the internal line is what the rewritten screener
    /// now monitors instead of the cross-zone tie, and the generator's
    /// dispatch is what its bus injection is now reconstructed from.
    fn two_zone_instance() -> (UnitCommitmentInstance, Vec<Zone>) {
        let buses = vec![
            Bus::new(BusId::new(0), vec![0.0], ZoneId::new(0)),
            Bus::new(BusId::new(1), vec![10.0], ZoneId::new(1)),
            Bus::new(BusId::new(2), vec![0.0], ZoneId::new(1)),
        ];
        let lines = vec![
            TransmissionLine::new(LineId::new(0), BusId::new(0), BusId::new(1), 0.1, 5.0, 6.0, true, ZoneId::new(0)),
            TransmissionLine::new(LineId::new(1), BusId::new(1), BusId::new(2), 0.1, 5.0, 6.0, true, ZoneId::new(1)),
        ];
        let segs = [
            CostSegment { mw: 0.0, marginal_cost: 20.0 },
            CostSegment { mw: 10.0, marginal_cost: 22.0 },
            CostSegment { mw: 20.0, marginal_cost: 25.0 },
        ];
        let gen = Generator {
            id: GenId::new(0),
            bus: BusId::new(2),
            p_min: 0.0,
            p_max: 20.0,
            ramp_up: 20.0,
            ramp_down: 20.0,
            startup_ramp: 20.0,
            shutdown_ramp: 20.0,
            initial_power: 0.0,
            initial_on_hours: -5,
            min_up_time: 1,
            min_down_time: 1,
            cost_segments: segs,
            no_load_cost: 0.0,
            startup_cost: 0.0,
        };
        let instance = UnitCommitmentInstance::new("two-zone", buses, lines, vec![gen]);

        let mut zone0 = Zone::new(ZoneId::new(0), 2);
        zone0.bus_internal = vec![BusId::new(0)];
        zone0.external_lines = vec![LineId::new(0)];
        zone0.neighbors[1] = true;

        let mut zone1 = Zone::new(ZoneId::new(1), 2);
        zone1.bus_boundary = vec![BusId::new(1)];
        zone1.bus_internal = vec![BusId::new(2)];
        zone1.internal_lines = vec![LineId::new(1)];
        zone1.external_lines = vec![LineId::new(0)];
        zone1.neighbors[0] = true;
        zone1.link_base = DenseMatrix::zeros(1, 1);
        zone1.link_base[(0, 0)] = 1.0;

        let mut zones = vec![zone0, zone1];
        classify_bus_partitions(&mut zones, &instance);
        (instance, zones)
    }

    #[test]
    fn no_violation_below_limit_leaves_constraints_untouched() {
        let (instance, zones) = two_zone_instance();
        let isf = scuc_algo::compute_isf(&instance, BusId::new(0)).unwrap();
        let lodf = scuc_algo::compute_lodf(&instance, &isf);
        let config = SubproblemConfig::default();
        let mut sub = build_subproblem(&instance, &zones, 1, &config);
        let before = sub.problem.constraints.len();

        let solution = MiqpSolution {
            status: scuc_solver::ExternalSolverStatus::Optimal,
            values: vec![0.0; sub.problem.vars.len()],
            objective: 0.0,
            solve_time: std::time::Duration::from_secs(0),
        };

        let comm = in_process_communicators(1).remove(0);
        let mut screener = ContingencyScreener::new(
            Arc::new(instance),
            zones[1].clone(),
            Arc::new(isf),
            Arc::new(lodf),
            comm,
            ScreeningConfig::default(),
        );
        screener.screen(&mut sub, &solution);
        assert_eq!(sub.problem.constraints.len(), before);
        assert!(screener.violations.is_empty());
    }

    /// A zone-2 bus injection of 10 MW over its own internal line, whose
    /// normal limit is 5 MW, produces one pre-contingency violation.
    /// Screening the same solution twice must add the bounding
    /// constraint only once: the second call re-finds the same worst
    /// violation but `seen` already holds its dedup key.
    #[test]
    fn repeated_violation_is_added_once_and_then_deduped() {
        let (instance, zones) = two_zone_instance();
        let isf = scuc_algo::compute_isf(&instance, BusId::new(0)).unwrap();
        let lodf = scuc_algo::compute_lodf(&instance, &isf);
        let config = SubproblemConfig::default();
        let mut sub = build_subproblem(&instance, &zones, 1, &config);
        let before = sub.problem.constraints.len();

        let mut values = vec![0.0; sub.problem.vars.len()];
        let idx = sub.layout.power[&(GenId::new(0), 0)];
        values[idx] = 10.0;
        let solution = MiqpSolution {
            status: scuc_solver::ExternalSolverStatus::Optimal,
            values,
            objective: 0.0,
            solve_time: std::time::Duration::from_secs(0),
        };

        let comm = in_process_communicators(1).remove(0);
        let mut screener = ContingencyScreener::new(
            Arc::new(instance),
            zones[1].clone(),
            Arc::new(isf),
            Arc::new(lodf),
            comm,
            ScreeningConfig::default(),
        );

        screener.screen(&mut sub, &solution);
        assert_eq!(screener.violations.len(), 1, "one violation, this instance has one period");
        let after_first = sub.problem.constraints.len();
        assert!(after_first > before);

        screener.screen(&mut sub, &solution);
        assert_eq!(
            screener.violations.len(),
            1,
            "identical violations must not be pushed twice"
        );
        assert_eq!(
            sub.problem.constraints.len(),
            after_first,
            "dedup must stop a repeated violation from adding a second constraint"
        );
    }
}
