//! Message-passing runtime: `size`/`rank`/`barrier`/`all_reduce`.
//!
//! Generalizes the thread-parallel reduction pattern
//! `canos_multiarea::compute_multiarea_reliability_parallel` uses (spawn
//! one task per scenario, `rayon`-reduce the results) into a small
//! collective-operations trait with an in-process implementation backed
//! by `std::thread::scope` worker threads and a shared `Barrier` —
//! enough to drive one worker per zone without an actual MPI dependency.

use std::sync::{Arc, Barrier, Mutex};

/// Collective operations every ADMM worker needs. Every worker must call
/// these in the same order each iteration; a callback invoked between a
/// local solve and the next barrier must never itself call one.
pub trait Communicator: Send + Sync {
    fn size(&self) -> usize;
    fn rank(&self) -> usize;
    fn barrier(&self);
    fn all_reduce_sum(&self, local: &[f64]) -> Vec<f64>;
    fn all_reduce_max(&self, local: f64) -> f64;
}

#[derive(Clone)]
pub struct InProcessCommunicator {
    rank: usize,
    size: usize,
    barrier: Arc<Barrier>,
    sum_slots: Arc<Mutex<Vec<Vec<f64>>>>,
    max_slots: Arc<Mutex<Vec<f64>>>,
}

impl Communicator for InProcessCommunicator {
    fn size(&self) -> usize {
        self.size
    }

    fn rank(&self) -> usize {
        self.rank
    }

    fn barrier(&self) {
        self.barrier.wait();
    }

    fn all_reduce_sum(&self, local: &[f64]) -> Vec<f64> {
        {
            let mut slots = self.sum_slots.lock().expect("sum_slots poisoned");
            slots[self.rank] = local.to_vec();
        }
        self.barrier.wait();
        let total = {
            let slots = self.sum_slots.lock().expect("sum_slots poisoned");
            let n = local.len();
            let mut out = vec![0.0; n];
            for row in slots.iter() {
                for (o, v) in out.iter_mut().zip(row.iter()) {
                    *o += v;
                }
            }
            out
        };
        self.barrier.wait();
        total
    }

    fn all_reduce_max(&self, local: f64) -> f64 {
        {
            let mut slots = self.max_slots.lock().expect("max_slots poisoned");
            slots[self.rank] = local;
        }
        self.barrier.wait();
        let max = {
            let slots = self.max_slots.lock().expect("max_slots poisoned");
            slots.iter().cloned().fold(f64::NEG_INFINITY, f64::max)
        };
        self.barrier.wait();
        max
    }
}

/// Builds `n` communicator handles sharing one barrier and one pair of
/// reduction buffers, one handle per worker thread.
pub fn in_process_communicators(n: usize) -> Vec<InProcessCommunicator> {
    let barrier = Arc::new(Barrier::new(n));
    let sum_slots = Arc::new(Mutex::new(vec![Vec::new(); n]));
    let max_slots = Arc::new(Mutex::new(vec![0.0; n]));
    (0..n)
        .map(|rank| InProcessCommunicator {
            rank,
            size: n,
            barrier: barrier.clone(),
            sum_slots: sum_slots.clone(),
            max_slots: max_slots.clone(),
        })
        .collect()
}
