//! C1 — Sensitivity Kernel.
//!
//! Builds injection shift factors (ISF) from the sparse incidence and
//! susceptance matrices via a Laplacian inversion, derives line outage
//! distribution factors (LODF) from them, and combines the two into
//! post-contingency ISF. Follows the same factor-a-reduced-Laplacian
//! shape as `sparse::sensitivity::SparsePtdf`, generalized with an
//! explicit slack-change operation the unit commitment zones need when
//! re-rooting a subnetwork.

use scuc_core::{BusId, DenseMatrix, LineId, UnitCommitmentInstance};
use scuc_solver::FatalKind;
use std::collections::HashMap;

/// Injection shift factor matrix: `isf[line][bus]` gives the sensitivity
/// of that line's flow to a unit injection at that bus, relative to the
/// configured slack.
#[derive(Debug, Clone)]
pub struct IsfMatrix {
    pub slack: BusId,
    pub values: DenseMatrix,
}

#[derive(Debug, Clone)]
pub struct LodfMatrix {
    pub values: DenseMatrix,
}

impl IsfMatrix {
    pub fn num_lines(&self) -> usize {
        self.values.rows()
    }

    pub fn num_buses(&self) -> usize {
        self.values.cols()
    }

    pub fn get(&self, line: LineId, bus: BusId) -> f64 {
        self.values[(line.index(), bus.index())]
    }
}

impl LodfMatrix {
    pub fn get(&self, monitored: LineId, outaged: LineId) -> f64 {
        self.values[(monitored.index(), outaged.index())]
    }
}

/// Builds the ISF matrix for `instance` relative to `slack`, via
/// `ISF[l,n] = (X[i,n] - X[j,n]) / x_l` where `X` is the inverse of the
/// reduced (slack row/col removed) weighted Laplacian.
pub fn compute_isf(
    instance: &UnitCommitmentInstance,
    slack: BusId,
) -> Result<IsfMatrix, FatalKind> {
    let n_bus = instance.buses.len();
    if n_bus < 2 {
        return Err(FatalKind::SingularLaplacian(instance.name.clone()));
    }

    let reduced_order: Vec<usize> = (0..n_bus).filter(|&b| b != slack.index()).collect();
    let m = reduced_order.len();
    let full_to_reduced: HashMap<usize, usize> = reduced_order
        .iter()
        .enumerate()
        .map(|(ri, &fi)| (fi, ri))
        .collect();

    let mut laplacian = vec![vec![0.0; m]; m];
    for line in &instance.lines {
        let b = line.susceptance();
        let (i, j) = (line.source.index(), line.target.index());
        if let Some(&ri) = full_to_reduced.get(&i) {
            laplacian[ri][ri] += b;
        }
        if let Some(&rj) = full_to_reduced.get(&j) {
            laplacian[rj][rj] += b;
        }
        if let (Some(&ri), Some(&rj)) = (full_to_reduced.get(&i), full_to_reduced.get(&j)) {
            laplacian[ri][rj] -= b;
            laplacian[rj][ri] -= b;
        }
    }

    let inv_reduced = lu_inverse(&laplacian)
        .map_err(|_| FatalKind::SingularLaplacian(instance.name.clone()))?;

    let mut x = vec![vec![0.0; n_bus]; n_bus];
    for (ri, &fi) in reduced_order.iter().enumerate() {
        for (rj, &fj) in reduced_order.iter().enumerate() {
            x[fi][fj] = inv_reduced[ri][rj];
        }
    }

    let n_lines = instance.lines.len();
    let mut isf = DenseMatrix::zeros(n_lines, n_bus);
    for line in &instance.lines {
        let xreact = line.reactance.abs().max(1e-9);
        let (i, j) = (line.source.index(), line.target.index());
        for bus in 0..n_bus {
            isf[(line.id.index(), bus)] = (x[i][bus] - x[j][bus]) / xreact;
        }
    }

    Ok(IsfMatrix { slack, values: isf })
}

/// Re-roots an ISF matrix to a new slack bus in place, by subtracting
/// the new slack's column from every column (the standard single-slack
/// change identity: `ISF'[l,n] = ISF[l,n] - ISF[l,new_slack]`).
pub fn change_slack(isf: &mut IsfMatrix, new_slack: BusId) {
    if isf.slack == new_slack {
        return;
    }
    let n_lines = isf.values.rows();
    let n_buses = isf.values.cols();
    let shift: Vec<f64> = (0..n_lines)
        .map(|l| isf.values[(l, new_slack.index())])
        .collect();
    for l in 0..n_lines {
        for n in 0..n_buses {
            isf.values[(l, n)] -= shift[l];
        }
    }
    isf.slack = new_slack;
}

/// Zeroes ISF/LODF entries below `tolerance`, logging when truncation
/// removes a large fraction of the matrix (a conditioning signal).
pub fn truncate_small(matrix: &mut DenseMatrix, tolerance: f64) {
    let total = matrix.rows() * matrix.cols();
    let truncated = matrix.truncate_small(tolerance);
    if total > 0 && truncated * 2 > total {
        tracing::warn!(
            truncated,
            total,
            "sensitivity truncation removed more than half of the matrix entries"
        );
    }
}

/// `LODF[l,m] = PTDF_transfer[l, i->j] / (1 - PTDF_transfer[m, i->j])`
/// where `(i,j)` are the terminal buses of outaged line `m`. Diagonal is
/// always -1; islanded/radial branches get `f64::INFINITY`.
pub fn compute_lodf(instance: &UnitCommitmentInstance, isf: &IsfMatrix) -> LodfMatrix {
    let n = instance.lines.len();
    let mut lodf = DenseMatrix::zeros(n, n);
    for monitored in &instance.lines {
        for outaged in &instance.lines {
            let (l, m) = (monitored.id.index(), outaged.id.index());
            if l == m {
                lodf[(l, m)] = -1.0;
                continue;
            }
            let (i, j) = (outaged.source, outaged.target);
            let ptdf_m_transfer = isf.get(outaged.id, i) - isf.get(outaged.id, j);
            let ptdf_l_transfer = isf.get(monitored.id, i) - isf.get(monitored.id, j);
            let denom = 1.0 - ptdf_m_transfer;
            lodf[(l, m)] = if denom.abs() < 1e-10 {
                f64::INFINITY
            } else {
                ptdf_l_transfer / denom
            };
        }
    }
    LodfMatrix { values: lodf }
}

/// Post-contingency ISF: sensitivity of every line's flow to injections
/// after `outaged` trips, built from the base ISF and LODF.
/// `ISF_post[l,n] = ISF[l,n] + LODF[l,outaged] * ISF[outaged,n]`
pub fn post_contingency_isf(isf: &IsfMatrix, lodf: &LodfMatrix, outaged: LineId) -> IsfMatrix {
    let n_lines = isf.num_lines();
    let n_buses = isf.num_buses();
    let mut post = DenseMatrix::zeros(n_lines, n_buses);
    for l in 0..n_lines {
        let factor = lodf.values[(l, outaged.index())];
        for n in 0..n_buses {
            post[(l, n)] = isf.values[(l, n)] + factor * isf.values[(outaged.index(), n)];
        }
    }
    IsfMatrix {
        slack: isf.slack,
        values: post,
    }
}

fn lu_inverse(a: &[Vec<f64>]) -> Result<Vec<Vec<f64>>, ()> {
    let n = a.len();
    if n == 0 {
        return Ok(vec![]);
    }
    let mut lu: Vec<Vec<f64>> = a.to_vec();
    let mut perm: Vec<usize> = (0..n).collect();

    for k in 0..n {
        let mut max_val = lu[k][k].abs();
        let mut max_row = k;
        for i in (k + 1)..n {
            if lu[i][k].abs() > max_val {
                max_val = lu[i][k].abs();
                max_row = i;
            }
        }
        if max_val < 1e-12 {
            return Err(());
        }
        if max_row != k {
            lu.swap(k, max_row);
            perm.swap(k, max_row);
        }
        for i in (k + 1)..n {
            lu[i][k] /= lu[k][k];
            for j in (k + 1)..n {
                lu[i][j] -= lu[i][k] * lu[k][j];
            }
        }
    }

    let mut inv = vec![vec![0.0; n]; n];
    for col in 0..n {
        let mut b = vec![0.0; n];
        b[perm[col]] = 1.0;

        let mut y = vec![0.0; n];
        for i in 0..n {
            y[i] = b[i];
            for j in 0..i {
                y[i] -= lu[i][j] * y[j];
            }
        }

        let mut x = vec![0.0; n];
        for i in (0..n).rev() {
            x[i] = y[i];
            for j in (i + 1)..n {
                x[i] -= lu[i][j] * x[j];
            }
            x[i] /= lu[i][i];
        }

        for (i, v) in x.into_iter().enumerate() {
            inv[i][col] = v;
        }
    }

    Ok(inv)
}

#[cfg(test)]
mod tests {
    use super::*;
    use scuc_core::{Bus, TransmissionLine, ZoneId};

    fn triangle_instance() -> UnitCommitmentInstance {
        let buses = (0..3)
            .map(|i| Bus::new(BusId::new(i), vec![0.0], ZoneId::new(0)))
            .collect();
        let lines = vec![
            TransmissionLine::new(
                LineId::new(0),
                BusId::new(0),
                BusId::new(1),
                0.1,
                100.0,
                120.0,
                true,
                ZoneId::new(0),
            ),
            TransmissionLine::new(
                LineId::new(1),
                BusId::new(1),
                BusId::new(2),
                0.1,
                100.0,
                120.0,
                true,
                ZoneId::new(0),
            ),
            TransmissionLine::new(
                LineId::new(2),
                BusId::new(0),
                BusId::new(2),
                0.2,
                100.0,
                120.0,
                true,
                ZoneId::new(0),
            ),
        ];
        UnitCommitmentInstance::new("triangle", buses, lines, vec![])
    }

    #[test]
    fn lodf_diagonal_is_minus_one_and_rows_are_consistent() {
        let instance = triangle_instance();
        let isf = compute_isf(&instance, BusId::new(0)).unwrap();
        let lodf = compute_lodf(&instance, &isf);
        for line in &instance.lines {
            assert_eq!(lodf.get(line.id, line.id), -1.0);
        }
    }

    #[test]
    fn slack_change_is_invariant_for_flows() {
        let instance = triangle_instance();
        let mut isf = compute_isf(&instance, BusId::new(0)).unwrap();
        let isf_ref = isf.clone();
        change_slack(&mut isf, BusId::new(1));
        // injections summing to zero should produce identical flows
        // regardless of slack choice
        for l in 0..isf.num_lines() {
            let flow_a: f64 = (0..isf.num_buses())
                .map(|n| isf_ref.values[(l, n)] * if n == 0 { 1.0 } else { -0.5 })
                .sum();
            let flow_b: f64 = (0..isf.num_buses())
                .map(|n| isf.values[(l, n)] * if n == 0 { 1.0 } else { -0.5 })
                .sum();
            assert!((flow_a - flow_b).abs() < 1e-8);
        }
    }

    #[test]
    fn singular_network_is_fatal() {
        let buses = vec![Bus::new(BusId::new(0), vec![0.0], ZoneId::new(0))];
        let instance = UnitCommitmentInstance::new("single", buses, vec![], vec![]);
        assert!(matches!(
            compute_isf(&instance, BusId::new(0)),
            Err(FatalKind::SingularLaplacian(_))
        ));
    }

    #[test]
    fn isf_slack_column_is_zero() {
        let instance = triangle_instance();
        let isf = compute_isf(&instance, BusId::new(0)).unwrap();
        for l in 0..isf.num_lines() {
            assert_eq!(isf.get(LineId::new(l), BusId::new(0)), 0.0);
        }
    }

    #[test]
    fn post_contingency_identity_matches_recomputed_isf() {
        let instance = triangle_instance();
        let isf = compute_isf(&instance, BusId::new(0)).unwrap();
        let lodf = compute_lodf(&instance, &isf);

        for outaged in &instance.lines {
            let mut outaged_network = instance.clone();
            outaged_network.lines[outaged.id.index()].reactance = f64::INFINITY;
            let recomputed = compute_isf(&outaged_network, BusId::new(0));
            let Ok(recomputed) = recomputed else { continue };

            let predicted = post_contingency_isf(&isf, &lodf, outaged.id);
            for l in 0..isf.num_lines() {
                if l == outaged.id.index() {
                    continue;
                }
                for n in 0..isf.num_buses() {
                    let a = predicted.values[(l, n)];
                    let b = recomputed.values[(l, n)];
                    assert!((a - b).abs() < 1e-6, "line {l} bus {n}: {a} vs {b}");
                }
            }
        }
    }
}
