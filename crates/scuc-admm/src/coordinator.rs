//! C5 — Sharing-ADMM Coordinator.
//!
//! One worker thread per zone, synchronized through [`Communicator`].
//! The iterate/barrier/reduce/dual-update loop shape follows
//! `gat-algo::opf::admm::AdmmOpfSolver`; this is *sharing* ADMM rather
//! than plain *consensus* ADMM (local dual vectors instead of one
//! shared multiplier) and adds an MIQP/QP dual-mode state machine a
//! DC-OPF-only solver never needed.

use scuc_core::{BusId, ZoneId};
use scuc_solver::{ExternalSolver, MiqpSolution, SolverFactory};
use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use std::time::{Duration, Instant};

use crate::communicator::Communicator;
use scuc_algo::AdmmSubproblem;

pub type BoundarySlot = (ZoneId, BusId, usize);

#[derive(Debug, Clone)]
pub struct AdmmConfig {
    pub rho: f64,
    pub rho_max: f64,
    pub rho_multiplier: f64,
    pub rho_update_interval: u32,
    pub obj_change_tolerance: f64,
    pub infeas_improv_tolerance: f64,
    pub min_iterations: u32,
    pub min_feasibility: f64,
    pub max_iterations: u32,
    pub max_time: Duration,
}

impl Default for AdmmConfig {
    fn default() -> Self {
        Self {
            rho: 1.0,
            rho_max: 1e4,
            rho_multiplier: 1.5,
            rho_update_interval: 10,
            obj_change_tolerance: 1e-4,
            infeas_improv_tolerance: 1e-4,
            min_iterations: 2,
            min_feasibility: 1e-3,
            max_iterations: 200,
            max_time: Duration::from_secs(300),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Mode {
    Miqp,
    Qp,
}

#[derive(Debug, Clone)]
pub struct AdmmResult {
    pub objective: f64,
    pub infeasibility: f64,
    pub iterations: u32,
    pub wall_time: Duration,
    pub boundary_values: HashMap<BoundarySlot, f64>,
}

/// Per-worker screening callback: inspects the just-solved subproblem
/// and may append variables/constraints to its local model. Invoked by
/// every worker exactly once per iteration, so a screening function may
/// call `Communicator` operations (e.g. to all-reduce a network-wide
/// quantity) as long as it makes the same calls, in the same order, on
/// every worker — the same symmetry `worker_loop`'s own collective calls
/// already require.
pub type ScreeningFn = Box<dyn FnMut(&mut AdmmSubproblem, &MiqpSolution) + Send>;

struct WorkerState {
    subproblem: AdmmSubproblem,
    base_linear: Vec<f64>,
    base_quadratic: Vec<f64>,
    lambda: HashMap<BoundarySlot, f64>,
    /// Indices relaxed by the most recent MIQP→QP switch, so the
    /// reverse switch restores exactly those variables.
    relaxed_vars: Vec<usize>,
}

impl WorkerState {
    fn new(subproblem: AdmmSubproblem) -> Self {
        let base_linear = subproblem.problem.linear_objective.clone();
        let base_quadratic = subproblem.problem.quadratic_diagonal.clone();
        Self {
            subproblem,
            base_linear,
            base_quadratic,
            lambda: HashMap::new(),
            relaxed_vars: Vec::new(),
        }
    }

    fn local_boundary_values(&self, solution: &MiqpSolution) -> HashMap<BoundarySlot, f64> {
        self.subproblem
            .layout
            .exchange
            .iter()
            .map(|(&slot, &idx)| (slot, solution.values[idx]))
            .collect()
    }

    fn apply_augmented_objective(&mut self, rho: f64, target: &HashMap<BoundarySlot, f64>, mode: Mode) {
        self.subproblem.problem.linear_objective = self.base_linear.clone();
        self.subproblem.problem.quadratic_diagonal = self.base_quadratic.clone();
        for (&slot, &idx) in &self.subproblem.layout.exchange {
            let weight = match mode {
                Mode::Qp => 1.0,
                Mode::Miqp => self
                    .subproblem
                    .layout
                    .exchange_weight
                    .get(&slot)
                    .copied()
                    .unwrap_or(1.0),
            };
            let lambda_g = self.lambda.get(&slot).copied().unwrap_or(0.0);
            let target_g = target.get(&slot).copied().unwrap_or(0.0);
            self.subproblem.problem.linear_objective[idx] += weight * lambda_g - rho * weight * target_g;
            self.subproblem.problem.quadratic_diagonal[idx] += (rho / 2.0) * weight;
        }
    }

    fn dual_update(&mut self, rho: f64, target: &HashMap<BoundarySlot, f64>) {
        for &slot in self.subproblem.layout.exchange.keys() {
            let target_g = target.get(&slot).copied().unwrap_or(0.0);
            let entry = self.lambda.entry(slot).or_insert(0.0);
            *entry += rho * target_g;
        }
    }

    /// Fixes every integer variable at its rounded solved value and
    /// relaxes it to continuous — the MIQP→QP mode switch.
    fn enter_qp_mode(&mut self, solution: &MiqpSolution) {
        self.relaxed_vars.clear();
        for (i, var) in self.subproblem.problem.vars.iter_mut().enumerate() {
            if var.is_integer {
                let rounded = solution.values[i].round();
                var.lb = rounded;
                var.ub = rounded;
                var.is_integer = false;
                self.relaxed_vars.push(i);
            }
        }
    }

    fn enter_miqp_mode(&mut self) {
        for &i in &self.relaxed_vars {
            self.subproblem.problem.vars[i].lb = 0.0;
            self.subproblem.problem.vars[i].ub = 1.0;
            self.subproblem.problem.vars[i].is_integer = true;
        }
        self.relaxed_vars.clear();
    }
}

/// Drives the sharing-ADMM loop across `subproblems.len()` worker
/// threads, one per zone, coordinated through `communicators` (expected
/// to share a single [`crate::communicator::in_process_communicators`]
/// barrier/reduction set). `screening` supplies one callback per worker,
/// consumed in the same order as `subproblems`.
pub fn run_admm<C: Communicator + 'static>(
    subproblems: Vec<AdmmSubproblem>,
    communicators: Vec<C>,
    factory: SolverFactory,
    config: AdmmConfig,
    mut screening: Vec<ScreeningFn>,
) -> AdmmResult {
    assert_eq!(subproblems.len(), communicators.len());
    assert_eq!(subproblems.len(), screening.len());

    // Every worker must hand `all_reduce_sum` a vector of the same length,
    // in the same order, each iteration — the reduction pairs entries by
    // position, not by key. Workers generally disagree on which boundary
    // slots they even have (a zone with few neighbors sees far fewer
    // `exchange` keys than one bordering every other zone), so the slot
    // set is unioned up front and every worker pads its own contribution
    // with zeros for slots it doesn't hold.
    let mut slot_set: HashSet<BoundarySlot> = HashSet::new();
    for sub in &subproblems {
        slot_set.extend(sub.layout.exchange.keys().copied());
    }
    let mut all_slots: Vec<BoundarySlot> = slot_set.into_iter().collect();
    all_slots.sort();
    let all_slots = Arc::new(all_slots);

    let start = Instant::now();
    let results: Vec<(f64, HashMap<BoundarySlot, f64>, u32)> = std::thread::scope(|scope| {
        let mut handles = Vec::new();
        for ((subproblem, comm), mut screen) in subproblems
            .into_iter()
            .zip(communicators.into_iter())
            .zip(screening.drain(..))
        {
            let config = config.clone();
            let factory = factory.clone();
            let all_slots = all_slots.clone();
            handles.push(scope.spawn(move || {
                worker_loop(subproblem, comm, factory, config, &mut *screen, start, &all_slots)
            }));
        }
        handles.into_iter().map(|h| h.join().expect("admm worker panicked")).collect()
    });

    let total_obj: f64 = results.iter().map(|(obj, _, _)| obj).sum();
    let iterations = results.iter().map(|(_, _, it)| *it).max().unwrap_or(0);
    let mut boundary_values: HashMap<BoundarySlot, f64> = HashMap::new();
    for (_, values, _) in &results {
        for (&slot, &v) in values {
            boundary_values.insert(slot, v);
        }
    }
    let infeasibility = boundary_values.values().map(|v| v * v).sum::<f64>().sqrt();

    AdmmResult {
        objective: total_obj,
        infeasibility,
        iterations,
        wall_time: start.elapsed(),
        boundary_values,
    }
}

fn worker_loop(
    subproblem: AdmmSubproblem,
    comm: impl Communicator,
    factory: SolverFactory,
    config: AdmmConfig,
    screening: &mut (dyn FnMut(&mut AdmmSubproblem, &MiqpSolution) + Send),
    start: Instant,
    all_slots: &[BoundarySlot],
) -> (f64, HashMap<BoundarySlot, f64>, u32) {
    let solver = factory.build();
    let mut state = WorkerState::new(subproblem);
    let mut mode = Mode::Miqp;
    let mut rho = config.rho;
    let mut target: HashMap<BoundarySlot, f64> = HashMap::new();
    let mut prev_obj = f64::INFINITY;
    let mut prev_infeas = f64::INFINITY;
    let mut last_solution: Option<MiqpSolution> = None;
    let mut iteration = 0u32;

    loop {
        let remaining = config.max_time.checked_sub(start.elapsed()).unwrap_or_default();
        if remaining.is_zero() || iteration >= config.max_iterations {
            break;
        }

        state.apply_augmented_objective(rho, &target, mode);
        state.subproblem.problem.time_limit = remaining;

        let outcome = solver.solve(&state.subproblem.problem);
        let solution = match outcome.value() {
            Some(sol) => {
                if !outcome.is_ok() {
                    tracing::warn!(iteration, status = %sol.status, "solver warned, reusing last known values");
                }
                last_solution = Some(sol.clone());
                sol.clone()
            }
            None => {
                tracing::error!(iteration, "solve failed fatally, stopping this worker");
                break;
            }
        };

        screening(&mut state.subproblem, &solution);

        comm.barrier();

        let local_values = state.local_boundary_values(&solution);
        // `all_slots` is the union across every worker, in the same fixed
        // order everywhere, so a worker missing a given slot contributes
        // 0.0 for it rather than shifting the whole vector out of step.
        let local_vec: Vec<f64> = all_slots
            .iter()
            .map(|s| local_values.get(s).copied().unwrap_or(0.0))
            .collect();
        let summed = comm.all_reduce_sum(&local_vec);
        let n = comm.size() as f64;

        let mut new_target = target.clone();
        for (slot, sum) in all_slots.iter().zip(summed.iter()) {
            new_target.insert(*slot, sum / n);
        }

        let local_solve_time = solution.solve_time.as_secs_f64();
        let _max_solve_time = comm.all_reduce_max(local_solve_time);

        if new_target.values().any(|v| v.is_nan()) {
            tracing::error!(iteration, "NaN detected in consensus target, stopping");
            break;
        }

        state.dual_update(rho, &new_target);

        let infeas = new_target.values().map(|v| v * v).sum::<f64>().sqrt();
        let obj = solution.objective;

        if iteration > 0 && iteration % config.rho_update_interval == 0 {
            rho = (rho * config.rho_multiplier).min(config.rho_max);
        }

        match mode {
            Mode::Miqp => {
                let rel_change = (prev_obj - obj).abs() / obj.abs().max(1e-9);
                if rel_change < config.obj_change_tolerance {
                    tracing::debug!(iteration, "switching to QP mode, objective stagnated");
                    state.enter_qp_mode(&solution);
                    mode = Mode::Qp;
                }
            }
            Mode::Qp => {
                let rel_change = (prev_infeas - infeas).abs() / infeas.max(1e-9);
                if rel_change < config.infeas_improv_tolerance {
                    tracing::debug!(iteration, "switching to MIQP mode, consensus stalled");
                    state.enter_miqp_mode();
                    mode = Mode::Miqp;
                }
            }
        }

        prev_obj = obj;
        prev_infeas = infeas;
        target = new_target;
        iteration += 1;

        if iteration >= config.min_iterations && infeas < config.min_feasibility {
            break;
        }
    }

    let objective = last_solution.as_ref().map(|s| s.objective).unwrap_or(0.0);
    let values = last_solution
        .as_ref()
        .map(|s| state.local_boundary_values(s))
        .unwrap_or_default();
    (objective, values, iteration)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::communicator::in_process_communicators;
    use scuc_algo::SubproblemLayout;
    use scuc_solver::{MiqpProblem, VarSpec};

    fn box_subproblem(zone: usize, bounds: &[(f64, f64)], costs: &[f64], slot_x: BoundarySlot, slot_y: BoundarySlot) -> AdmmSubproblem {
        let mut problem = MiqpProblem::new(0);
        let mut layout = SubproblemLayout::default();

        let x = problem.vars.len();
        problem.vars.push(VarSpec::continuous(bounds[0].0, bounds[0].1));
        problem.linear_objective.push(costs[0]);
        problem.quadratic_diagonal.push(0.0);
        layout.exchange.insert(slot_x, x);
        layout.exchange_weight.insert(slot_x, 1.0);

        let y = problem.vars.len();
        problem.vars.push(VarSpec::continuous(bounds[1].0, bounds[1].1));
        problem.linear_objective.push(costs[1]);
        problem.quadratic_diagonal.push(0.0);
        layout.exchange.insert(slot_y, y);
        layout.exchange_weight.insert(slot_y, 1.0);

        AdmmSubproblem {
            zone: ZoneId::new(zone),
            problem,
            layout,
        }
    }

    fn no_op_screen() -> ScreeningFn {
        Box::new(|_, _| {})
    }

    /// Two workers sharing one `x` and one `y` consensus slot: worker 1
    /// minimizes `x - y` over `[0,2]`, worker 2 contributes no cost but
    /// narrows the shared box to `[1,3]`. The consensus-feasible region
    /// for both variables is their intersection `[1,2]`, so the joint
    /// optimum is `x=1, y=2`, objective `-1`.
    #[test]
    fn sharing_admm_converges_on_two_disjoint_boxes() {
        let slot_x = (ZoneId::new(0), BusId::new(0), 0);
        let slot_y = (ZoneId::new(0), BusId::new(1), 0);

        let sub1 = box_subproblem(0, &[(0.0, 2.0), (0.0, 2.0)], &[1.0, -1.0], slot_x, slot_y);
        let sub2 = box_subproblem(1, &[(1.0, 3.0), (1.0, 3.0)], &[0.0, 0.0], slot_x, slot_y);

        let communicators = in_process_communicators(2);
        let config = AdmmConfig {
            max_iterations: 500,
            ..Default::default()
        };
        let result = run_admm(
            vec![sub1, sub2],
            communicators,
            SolverFactory::default(),
            config,
            vec![no_op_screen(), no_op_screen()],
        );

        assert!(
            (result.objective - (-1.0)).abs() < 5e-2,
            "expected objective near -1.0, got {}",
            result.objective
        );
    }

    /// Three workers sharing one `z` slot, boxes `[0,2]`, `[1,3]`,
    /// `[0,3]`; only worker 1 pays a cost, minimizing `z`. The joint
    /// feasible region is the intersection `[1,2]`, so the optimum is
    /// `z=1`, objective `1`.
    #[test]
    fn consensus_admm_converges_across_three_subproblems() {
        let slot_z = (ZoneId::new(0), BusId::new(0), 0);

        let make = |zone: usize, lb: f64, ub: f64, cost: f64| {
            let mut problem = MiqpProblem::new(0);
            let mut layout = SubproblemLayout::default();
            problem.vars.push(VarSpec::continuous(lb, ub));
            problem.linear_objective.push(cost);
            problem.quadratic_diagonal.push(0.0);
            layout.exchange.insert(slot_z, 0);
            layout.exchange_weight.insert(slot_z, 1.0);
            AdmmSubproblem {
                zone: ZoneId::new(zone),
                problem,
                layout,
            }
        };

        let subs = vec![
            make(0, 0.0, 2.0, 1.0),
            make(1, 1.0, 3.0, 0.0),
            make(2, 0.0, 3.0, 0.0),
        ];

        let communicators = in_process_communicators(3);
        let config = AdmmConfig {
            max_iterations: 500,
            ..Default::default()
        };
        let result = run_admm(
            subs,
            communicators,
            SolverFactory::default(),
            config,
            vec![no_op_screen(), no_op_screen(), no_op_screen()],
        );

        assert!(
            (result.objective - 1.0).abs() < 5e-2,
            "expected objective near 1.0, got {}",
            result.objective
        );
    }

    /// Realistic `target_zones > 2` shape: three workers share `slot_z`,
    /// but only the third also declares a private `slot_w` nobody else
    /// has. Before the global-slot-union fix, each worker built its
    /// `all_reduce_sum` input from its own key set — two workers passing
    /// length-1 vectors and one passing length-2 — and the positional zip
    /// silently misaligned the reduction. This must still converge `z`
    /// to the same `[1,2]` intersection as the two-worker case and keep
    /// `slot_w` inside its own bounds.
    #[test]
    fn mismatched_slot_sets_across_workers_do_not_corrupt_the_reduction() {
        let slot_z = (ZoneId::new(0), BusId::new(0), 0);
        let slot_w = (ZoneId::new(2), BusId::new(1), 0);

        let mut problem_a = MiqpProblem::new(0);
        problem_a.vars.push(VarSpec::continuous(0.0, 2.0));
        problem_a.linear_objective.push(1.0);
        problem_a.quadratic_diagonal.push(0.0);
        let mut layout_a = SubproblemLayout::default();
        layout_a.exchange.insert(slot_z, 0);
        layout_a.exchange_weight.insert(slot_z, 1.0);
        let sub_a = AdmmSubproblem {
            zone: ZoneId::new(0),
            problem: problem_a,
            layout: layout_a,
        };

        let mut problem_b = MiqpProblem::new(0);
        problem_b.vars.push(VarSpec::continuous(1.0, 3.0));
        problem_b.linear_objective.push(0.0);
        problem_b.quadratic_diagonal.push(0.0);
        let mut layout_b = SubproblemLayout::default();
        layout_b.exchange.insert(slot_z, 0);
        layout_b.exchange_weight.insert(slot_z, 1.0);
        let sub_b = AdmmSubproblem {
            zone: ZoneId::new(1),
            problem: problem_b,
            layout: layout_b,
        };

        let mut problem_c = MiqpProblem::new(0);
        problem_c.vars.push(VarSpec::continuous(0.0, 3.0));
        problem_c.linear_objective.push(0.0);
        problem_c.quadratic_diagonal.push(0.0);
        problem_c.vars.push(VarSpec::continuous(-5.0, 5.0));
        problem_c.linear_objective.push(3.0);
        problem_c.quadratic_diagonal.push(0.0);
        let mut layout_c = SubproblemLayout::default();
        layout_c.exchange.insert(slot_z, 0);
        layout_c.exchange_weight.insert(slot_z, 1.0);
        layout_c.exchange.insert(slot_w, 1);
        layout_c.exchange_weight.insert(slot_w, 1.0);
        let sub_c = AdmmSubproblem {
            zone: ZoneId::new(2),
            problem: problem_c,
            layout: layout_c,
        };

        let communicators = in_process_communicators(3);
        let config = AdmmConfig {
            max_iterations: 500,
            ..Default::default()
        };
        let result = run_admm(
            vec![sub_a, sub_b, sub_c],
            communicators,
            SolverFactory::default(),
            config,
            vec![no_op_screen(), no_op_screen(), no_op_screen()],
        );

        let z = result.boundary_values[&slot_z];
        assert!((0.9..=2.1).contains(&z), "expected z near [1,2], got {z}");
        let w = result.boundary_values[&slot_w];
        assert!((-5.0..=5.0).contains(&w), "slot_w escaped its own bounds: {w}");
    }
}
