//! C2 — Zone Partitioner.
//!
//! Splits the bus/line graph into balanced zones with a small boundary
//! by recursively bisecting with an auxiliary MIP, the way
//! `graph::partition` structures a `NetworkPartition` result and error
//! enum — but the actual split rule here is an explicit MIP formulation
//! (binary cut/boundary variables), not spectral bisection.

use scuc_core::{BusId, UnitCommitmentInstance, Zone, ZoneId};
use scuc_solver::{ConstraintSense, LinearConstraint, MiqpProblem, SolverFactory, VarSpec};
use std::collections::{HashMap, HashSet};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum PartitionError {
    #[error("network has fewer than 2 buses, cannot partition")]
    NetworkTooSmall,
    #[error("balance tolerance must be in [0, 0.5), got {0}")]
    InvalidBalanceTolerance(f64),
    #[error("auxiliary partitioning MIP is infeasible")]
    InfeasibleMip,
}

#[derive(Debug, Clone)]
pub struct PartitionConfig {
    /// ε in the balance constraint `(0.5-ε)*L <= internal lines <= (0.5+ε)*L`.
    pub balance_epsilon: f64,
    pub target_zones: usize,
}

impl Default for PartitionConfig {
    fn default() -> Self {
        Self {
            balance_epsilon: 0.1,
            target_zones: 2,
        }
    }
}

/// Splits `instance` into `config.target_zones` zones. Mutates `instance`
/// in place: boundary buses have their demand redistributed onto an
/// internal bus of the same zone, so the returned zones satisfy the
/// "boundary buses carry zero demand" invariant regardless of how the
/// input instance placed its demand.
pub fn partition_instance(
    instance: &mut UnitCommitmentInstance,
    config: &PartitionConfig,
    factory: &SolverFactory,
) -> Result<Vec<Zone>, PartitionError> {
    if instance.buses.len() < 2 {
        return Err(PartitionError::NetworkTooSmall);
    }
    if !(0.0..0.5).contains(&config.balance_epsilon) {
        return Err(PartitionError::InvalidBalanceTolerance(config.balance_epsilon));
    }

    let mut subsets: Vec<Vec<BusId>> = vec![instance.buses.iter().map(|b| b.id).collect()];
    while subsets.len() < config.target_zones {
        let (idx, _) = subsets
            .iter()
            .enumerate()
            .max_by_key(|(_, s)| s.len())
            .expect("subsets is never empty");
        let subset = subsets.remove(idx);
        if subset.len() < 2 {
            subsets.push(subset);
            break;
        }
        let (side_a, side_b) = bisect(instance, &subset, config, factory)?;
        subsets.push(side_a);
        subsets.push(side_b);
    }

    Ok(build_zones(instance, &subsets))
}

/// Splits `subset` roughly in half by solving the boundary-minimizing
/// MIP: binary `x[b]` assigns each bus a side, `c[l]` marks a line cut
/// across sides, `z[b]` marks a boundary bus. Generator-bearing buses
/// are pinned non-boundary by fixing their `z` upper bound to zero.
fn bisect(
    instance: &UnitCommitmentInstance,
    subset: &[BusId],
    config: &PartitionConfig,
    factory: &SolverFactory,
) -> Result<(Vec<BusId>, Vec<BusId>), PartitionError> {
    let bus_set: HashSet<BusId> = subset.iter().copied().collect();
    let lines: Vec<_> = instance
        .lines
        .iter()
        .filter(|l| bus_set.contains(&l.source) && bus_set.contains(&l.target))
        .collect();

    let gen_buses: HashSet<BusId> = instance.generators.iter().map(|g| g.bus).collect();

    let n_bus = subset.len();
    let n_line = lines.len();
    let bus_index: HashMap<BusId, usize> =
        subset.iter().enumerate().map(|(i, &b)| (b, i)).collect();

    // Variable layout: [0..n_bus) side assignment x, [n_bus..n_bus+n_line) cut c,
    // [n_bus+n_line..2*n_bus+n_line) boundary z.
    let x_offset = 0;
    let c_offset = n_bus;
    let z_offset = n_bus + n_line;
    let n_vars = 2 * n_bus + n_line;

    let mut problem = MiqpProblem::new(n_vars);
    for i in 0..n_bus {
        problem.vars[x_offset + i] = VarSpec::binary();
    }
    for i in 0..n_line {
        problem.vars[c_offset + i] = VarSpec::binary();
    }
    for (i, &bus) in subset.iter().enumerate() {
        problem.vars[z_offset + i] = if gen_buses.contains(&bus) {
            VarSpec { lb: 0.0, ub: 0.0, is_integer: true }
        } else {
            VarSpec::binary()
        };
        problem.linear_objective[z_offset + i] = 1.0;
    }

    for (li, line) in lines.iter().enumerate() {
        let i = bus_index[&line.source];
        let j = bus_index[&line.target];
        let c = c_offset + li;
        // c >= x_i - x_j
        problem.constraints.push(LinearConstraint {
            coeffs: vec![(c, 1.0), (x_offset + i, -1.0), (x_offset + j, 1.0)],
            sense: ConstraintSense::GreaterOrEqual,
            rhs: 0.0,
        });
        // c >= x_j - x_i
        problem.constraints.push(LinearConstraint {
            coeffs: vec![(c, 1.0), (x_offset + j, -1.0), (x_offset + i, 1.0)],
            sense: ConstraintSense::GreaterOrEqual,
            rhs: 0.0,
        });
        // z_i >= c, z_j >= c
        problem.constraints.push(LinearConstraint {
            coeffs: vec![(z_offset + i, 1.0), (c, -1.0)],
            sense: ConstraintSense::GreaterOrEqual,
            rhs: 0.0,
        });
        problem.constraints.push(LinearConstraint {
            coeffs: vec![(z_offset + j, 1.0), (c, -1.0)],
            sense: ConstraintSense::GreaterOrEqual,
            rhs: 0.0,
        });
    }

    if n_line > 0 {
        let lo = (0.5 - config.balance_epsilon) * n_line as f64;
        let hi = (0.5 + config.balance_epsilon) * n_line as f64;
        let cut_coeffs: Vec<(usize, f64)> = (0..n_line).map(|i| (c_offset + i, 1.0)).collect();
        problem.constraints.push(LinearConstraint {
            coeffs: cut_coeffs.clone(),
            sense: ConstraintSense::GreaterOrEqual,
            rhs: lo,
        });
        problem.constraints.push(LinearConstraint {
            coeffs: cut_coeffs,
            sense: ConstraintSense::LessOrEqual,
            rhs: hi,
        });
    }

    // Forbid the trivial all-one-side assignment.
    let all_x: Vec<(usize, f64)> = (0..n_bus).map(|i| (x_offset + i, 1.0)).collect();
    problem.constraints.push(LinearConstraint {
        coeffs: all_x.clone(),
        sense: ConstraintSense::GreaterOrEqual,
        rhs: 1.0,
    });
    problem.constraints.push(LinearConstraint {
        coeffs: all_x,
        sense: ConstraintSense::LessOrEqual,
        rhs: (n_bus - 1) as f64,
    });

    let solver = factory.build();
    let outcome = solver.solve(&problem);
    let solution = outcome.value().ok_or(PartitionError::InfeasibleMip)?;

    let mut side_a = Vec::new();
    let mut side_b = Vec::new();
    for (i, &bus) in subset.iter().enumerate() {
        if solution.values[x_offset + i].round() > 0.5 {
            side_a.push(bus);
        } else {
            side_b.push(bus);
        }
    }
    if side_a.is_empty() || side_b.is_empty() {
        return Err(PartitionError::InfeasibleMip);
    }
    Ok((side_a, side_b))
}

fn build_zones(instance: &mut UnitCommitmentInstance, subsets: &[Vec<BusId>]) -> Vec<Zone> {
    let zone_count = subsets.len();
    let mut bus_zone: HashMap<BusId, usize> = HashMap::new();
    for (zi, subset) in subsets.iter().enumerate() {
        for &bus in subset {
            bus_zone.insert(bus, zi);
        }
    }
    let gen_buses: HashSet<BusId> = instance.generators.iter().map(|g| g.bus).collect();

    let mut zones: Vec<Zone> = (0..zone_count)
        .map(|zi| Zone::new(ZoneId::new(zi), zone_count))
        .collect();

    let mut boundary: HashSet<BusId> = HashSet::new();
    for line in &instance.lines {
        let zs = bus_zone[&line.source];
        let zt = bus_zone[&line.target];
        if zs == zt {
            zones[zs].internal_lines.push(line.id);
        } else {
            zones[zs].external_lines.push(line.id);
            zones[zt].external_lines.push(line.id);
            boundary.insert(line.source);
            boundary.insert(line.target);
            zones[zs].neighbors[zt] = true;
            zones[zt].neighbors[zs] = true;
        }
    }

    // Redistribute demand off every boundary bus onto an internal bus of
    // the same zone, so boundary buses carry zero demand no matter what
    // the input instance placed there.
    let periods = instance.periods();
    for &bin_bus in &boundary {
        let zi = bus_zone[&bin_bus];
        let removed = std::mem::replace(
            &mut instance.buses[bin_bus.index()].demand,
            vec![0.0; periods],
        );
        if removed.iter().all(|&d| d == 0.0) {
            continue;
        }
        let sink = subsets[zi]
            .iter()
            .find(|&&b| b != bin_bus && !boundary.contains(&b));
        match sink {
            Some(&sink) => {
                for (t, d) in removed.into_iter().enumerate() {
                    instance.buses[sink.index()].demand[t] += d;
                }
            }
            None => {
                tracing::warn!(
                    bus = bin_bus.index(),
                    "no internal bus in this zone to absorb boundary demand, dropping it"
                );
            }
        }
    }

    for bus in &instance.buses {
        let zi = bus_zone[&bus.id];
        let is_boundary = boundary.contains(&bus.id);
        let zero_demand = bus.demand.iter().all(|&d| d == 0.0);
        match (is_boundary, zero_demand) {
            (true, _) => zones[zi].bus_boundary.push(bus.id),
            (false, true) => zones[zi].bus_internal_no_demand.push(bus.id),
            (false, false) => zones[zi].bus_internal.push(bus.id),
        }
        debug_assert!(
            !is_boundary || !gen_buses.contains(&bus.id),
            "generator-bearing bus assigned to the boundary"
        );
    }
    // `bus_neighbor`, `bus_neighbor_external` and `bus_far_external` are
    // filled in by the zone extractor (`classify_bus_partitions`), which
    // needs every zone's line lists at once to classify non-owned buses.
    zones
}

#[cfg(test)]
mod tests {
    use super::*;
    use scuc_core::{Bus, LineId, TransmissionLine};

    fn ring_instance(n: usize) -> UnitCommitmentInstance {
        let buses: Vec<Bus> = (0..n)
            .map(|i| Bus::new(BusId::new(i), vec![10.0], ZoneId::new(0)))
            .collect();
        let lines: Vec<TransmissionLine> = (0..n)
            .map(|i| {
                TransmissionLine::new(
                    LineId::new(i),
                    BusId::new(i),
                    BusId::new((i + 1) % n),
                    0.1,
                    100.0,
                    120.0,
                    true,
                    ZoneId::new(0),
                )
            })
            .collect();
        UnitCommitmentInstance::new("ring", buses, lines, vec![])
    }

    #[test]
    fn partition_covers_every_bus_exactly_once() {
        let mut instance = ring_instance(8);
        let config = PartitionConfig {
            balance_epsilon: 0.3,
            target_zones: 2,
        };
        let factory = SolverFactory::default();
        let n_buses = instance.buses.len();
        let zones = partition_instance(&mut instance, &config, &factory).unwrap();
        let mut seen: HashSet<BusId> = HashSet::new();
        for zone in &zones {
            for bus in zone.own_buses() {
                assert!(seen.insert(*bus), "bus assigned to more than one zone");
            }
        }
        assert_eq!(seen.len(), n_buses);
    }

    #[test]
    fn single_target_zone_has_no_boundary_at_all() {
        let mut instance = ring_instance(6);
        let config = PartitionConfig {
            balance_epsilon: 0.3,
            target_zones: 1,
        };
        let factory = SolverFactory::default();
        let n_lines = instance.lines.len();
        let zones = partition_instance(&mut instance, &config, &factory).unwrap();
        assert_eq!(zones.len(), 1);
        assert!(zones[0].bus_boundary.is_empty());
        assert!(zones[0].bus_neighbor.is_empty());
        assert!(zones[0].bus_neighbor_external.is_empty());
        assert!(zones[0].bus_far_external.is_empty());
        assert_eq!(zones[0].internal_lines.len(), n_lines);
        assert!(zones[0].external_lines.is_empty());
    }

    #[test]
    fn boundary_buses_carry_zero_demand_after_partitioning() {
        let mut instance = ring_instance(8);
        let config = PartitionConfig {
            balance_epsilon: 0.3,
            target_zones: 2,
        };
        let factory = SolverFactory::default();
        let zones = partition_instance(&mut instance, &config, &factory).unwrap();
        for zone in &zones {
            for &bus in &zone.bus_boundary {
                assert!(
                    instance.buses[bus.index()].demand.iter().all(|&d| d == 0.0),
                    "boundary bus {bus:?} should have had its demand redistributed"
                );
            }
        }
    }

    #[test]
    fn no_generator_is_bound_to_a_boundary_bus() {
        let mut instance = ring_instance(8);
        // Put a generator on every bus so the partitioner is forced to
        // prove it never picks a generator-bearing bus as a boundary.
        for i in 0..instance.buses.len() {
            instance.generators.push(scuc_core::Generator {
                id: scuc_core::GenId::new(i),
                bus: BusId::new(i),
                p_min: 0.0,
                p_max: 10.0,
                ramp_up: 10.0,
                ramp_down: 10.0,
                startup_ramp: 10.0,
                shutdown_ramp: 10.0,
                initial_power: 0.0,
                initial_on_hours: 1,
                min_up_time: 1,
                min_down_time: 1,
                cost_segments: [
                    scuc_core::CostSegment { mw: 0.0, marginal_cost: 10.0 },
                    scuc_core::CostSegment { mw: 5.0, marginal_cost: 12.0 },
                    scuc_core::CostSegment { mw: 10.0, marginal_cost: 15.0 },
                ],
                no_load_cost: 1.0,
                startup_cost: 1.0,
            });
        }
        let config = PartitionConfig {
            balance_epsilon: 0.3,
            target_zones: 2,
        };
        let factory = SolverFactory::default();
        let zones = partition_instance(&mut instance, &config, &factory).unwrap();
        let gen_buses: HashSet<BusId> = instance.generators.iter().map(|g| g.bus).collect();
        for zone in &zones {
            for &bus in &zone.bus_boundary {
                assert!(!gen_buses.contains(&bus), "generator bus {bus:?} placed on boundary");
            }
        }
    }

    #[test]
    fn partition_balance_stays_within_epsilon() {
        let mut instance = ring_instance(20);
        let epsilon = 0.2;
        let config = PartitionConfig {
            balance_epsilon: epsilon,
            target_zones: 2,
        };
        let factory = SolverFactory::default();
        let n_lines = instance.lines.len();
        let zones = partition_instance(&mut instance, &config, &factory).unwrap();
        let internal: usize = zones.iter().map(|z| z.internal_lines.len()).sum();
        let lo = (0.5 - epsilon) * n_lines as f64;
        let hi = (0.5 + epsilon) * n_lines as f64;
        assert!(
            internal as f64 >= lo - 1e-6 && internal as f64 <= hi + 1e-6,
            "internal line count {internal} outside [{lo},{hi}]"
        );
    }

    #[test]
    fn partitioning_is_stable_across_repeated_runs() {
        let mut a = ring_instance(8);
        let mut b = ring_instance(8);
        let config = PartitionConfig {
            balance_epsilon: 0.3,
            target_zones: 2,
        };
        let factory = SolverFactory::default();
        let zones_a = partition_instance(&mut a, &config, &factory).unwrap();
        let zones_b = partition_instance(&mut b, &config, &factory).unwrap();

        let assignment = |zones: &[Zone]| -> HashMap<BusId, usize> {
            let mut out = HashMap::new();
            for zone in zones {
                for &bus in zone.own_buses() {
                    out.insert(bus, zone.id.index());
                }
            }
            out
        };
        assert_eq!(assignment(&zones_a), assignment(&zones_b));
    }

    #[test]
    fn rejects_too_small_network() {
        let mut instance = ring_instance(1);
        let config = PartitionConfig::default();
        let factory = SolverFactory::default();
        assert!(matches!(
            partition_instance(&mut instance, &config, &factory),
            Err(PartitionError::NetworkTooSmall)
        ));
    }
}
