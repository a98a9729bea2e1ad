//! C3 — Zone Extractor.
//!
//! Classifies every bus the zone partitioner left unassigned to a given
//! zone's own sets (BN/BNE/BE, by graph distance from the zone) and
//! computes each zone's link matrices: `link_base` is the least-squares
//! solution of `ISF[L, BB] * X = ISF[L, BE]` over the zone's internal
//! lines and its own boundary buses, built from the full-network ISF
//! re-rooted to the zone's own slack. `link_outage[l]` repeats the same
//! solve against the post-contingency ISF for each vulnerable external
//! line, reusing `sensitivity::post_contingency_isf`. The normal-equations
//! solve follows the same `faer::Mat` / `partial_piv_lu` / per-column
//! pattern `fast_decoupled::{factorize, solve_factorized}` uses for its
//! whole-network P-theta solve, generalized to an over-determined
//! boundary system instead of a square one.
//!
//! Zones with a large external boundary are memoized to a disk cache
//! keyed by instance name, zone id and (for contingency variants) the
//! outaged line; a cache miss or I/O failure is never fatal, it just
//! falls back to recomputing.

use crate::sensitivity::{change_slack, post_contingency_isf, IsfMatrix, LodfMatrix};
use faer::Mat;
use scuc_core::{BusId, DenseMatrix, LineId, ScucError, ScucResult, UnitCommitmentInstance, Zone};
use scuc_solver::FatalKind;
use std::collections::{HashMap, HashSet};
use std::fs;
use std::path::{Path, PathBuf};

/// Zones with more external lines than this are worth memoizing to disk.
const CACHE_THRESHOLD: usize = 100;

#[derive(Debug, Clone, Default)]
pub struct ExtractorConfig {
    pub cache_dir: Option<PathBuf>,
}

/// Classifies every bus not owned by a zone into BN, BNE or BE by graph
/// distance from that zone: reachable in one hop through a cross-zone
/// line that touches exactly two zones is BN; reachable but through a
/// junction bus touching three or more zones is BNE; unreachable in one
/// hop at all is BE. Must run once over the whole zone list (a bus's
/// classification for zone `z` depends on every zone's external-line
/// incidence, not just `z`'s own), after the partitioner has populated
/// every zone's own buses and line lists.
pub fn classify_bus_partitions(zones: &mut [Zone], instance: &UnitCommitmentInstance) {
    let mut owner: HashMap<BusId, usize> = HashMap::new();
    for (zi, zone) in zones.iter().enumerate() {
        for &bus in zone.own_buses() {
            owner.insert(bus, zi);
        }
    }

    // Every zone that lists a cross-zone line as external touches both of
    // that line's endpoints, regardless of which side owns the bus.
    let mut touching: HashMap<BusId, HashSet<usize>> = HashMap::new();
    for (zi, zone) in zones.iter().enumerate() {
        for &line_id in &zone.external_lines {
            let line = &instance.lines[line_id.index()];
            touching.entry(line.source).or_default().insert(zi);
            touching.entry(line.target).or_default().insert(zi);
        }
    }

    for bus in instance.buses.iter().map(|b| b.id) {
        let Some(&owner_zi) = owner.get(&bus) else {
            continue;
        };
        let mut touches = touching.get(&bus).cloned().unwrap_or_default();
        touches.insert(owner_zi);

        for (zi, zone) in zones.iter_mut().enumerate() {
            if zi == owner_zi {
                continue;
            }
            if touches.contains(&zi) {
                if touches.len() == 2 {
                    zone.bus_neighbor.push(bus);
                } else {
                    zone.bus_neighbor_external.push(bus);
                }
            } else {
                zone.bus_far_external.push(bus);
            }
        }
    }
}

/// Computes `zone.link_base` from the full-network ISF, consulting the
/// disk cache first when the zone qualifies.
pub fn extract_base_link(
    instance: &UnitCommitmentInstance,
    zone: &mut Zone,
    isf: &IsfMatrix,
    config: &ExtractorConfig,
) -> Result<(), FatalKind> {
    if let Some(cached) = try_load_cache(instance, zone.id.index(), None, config) {
        zone.link_base = cached;
        return Ok(());
    }

    let link = compute_link_matrix(instance, zone, isf)?;
    maybe_store_cache(instance, zone.id.index(), None, &link, config, zone.external_lines.len());
    zone.link_base = link;
    Ok(())
}

/// Computes the post-contingency link matrix for one outaged external
/// line: re-solves the same least-squares system against the
/// post-contingency ISF (`ISF[L,:] + LODF[L,outaged] * ISF[outaged,:]`).
pub fn extract_outage_link(
    instance: &UnitCommitmentInstance,
    zone: &mut Zone,
    outaged: LineId,
    isf: &IsfMatrix,
    lodf: &LodfMatrix,
    config: &ExtractorConfig,
) -> Result<(), FatalKind> {
    if let Some(cached) = try_load_cache(instance, zone.id.index(), Some(outaged), config) {
        zone.link_outage.insert(outaged, cached);
        return Ok(());
    }

    let post_isf = post_contingency_isf(isf, lodf, outaged);
    let link = compute_link_matrix(instance, zone, &post_isf)?;
    maybe_store_cache(
        instance,
        zone.id.index(),
        Some(outaged),
        &link,
        config,
        zone.external_lines.len(),
    );
    zone.link_outage.insert(outaged, link);
    Ok(())
}

/// `link_base`/`link_outage`: the least-squares solution `X` of
/// `ISF[L, BB] * X = ISF[L, BE]`, where `L` is this zone's internal
/// lines, `BB` its own boundary buses and `BE` every bus it does not
/// own ([`Zone::external_bus_order`]). Solved via the normal equations
/// `(A^T A) X = A^T C`, with the ISF re-rooted to this zone's own slack
/// (`bus_internal[0]`) first.
fn compute_link_matrix(
    instance: &UnitCommitmentInstance,
    zone: &Zone,
    isf: &IsfMatrix,
) -> Result<DenseMatrix, FatalKind> {
    let mut isf = isf.clone();
    if let Some(&slack) = zone.bus_internal.first() {
        change_slack(&mut isf, slack);
    }

    let rows: Vec<LineId> = zone.internal_lines.clone();
    let bb: Vec<BusId> = zone.bus_boundary.clone();
    let be: Vec<BusId> = zone.external_bus_order().copied().collect();

    let n_rows = rows.len();
    let n_bb = bb.len();
    let n_be = be.len();

    if n_bb == 0 || n_be == 0 || n_rows == 0 {
        return Ok(DenseMatrix::zeros(n_bb, n_be));
    }

    let mut a = Mat::zeros(n_rows, n_bb);
    for (i, &line) in rows.iter().enumerate() {
        for (j, &bus) in bb.iter().enumerate() {
            a.write(i, j, isf.get(line, bus));
        }
    }
    let mut c = Mat::zeros(n_rows, n_be);
    for (i, &line) in rows.iter().enumerate() {
        for (j, &bus) in be.iter().enumerate() {
            c.write(i, j, isf.get(line, bus));
        }
    }

    let mut ata = Mat::zeros(n_bb, n_bb);
    for i in 0..n_bb {
        for j in 0..n_bb {
            let mut sum = 0.0;
            for r in 0..n_rows {
                sum += a.read(r, i) * a.read(r, j);
            }
            ata.write(i, j, sum);
        }
    }
    let mut atc = Mat::zeros(n_bb, n_be);
    for i in 0..n_bb {
        for j in 0..n_be {
            let mut sum = 0.0;
            for r in 0..n_rows {
                sum += a.read(r, i) * c.read(r, j);
            }
            atc.write(i, j, sum);
        }
    }

    let lu = ata.partial_piv_lu();
    let x = lu.solve(&atc);

    let mut out = DenseMatrix::zeros(n_bb, n_be);
    for i in 0..n_bb {
        for j in 0..n_be {
            let v = x.read(i, j);
            if !v.is_finite() {
                return Err(FatalKind::SingularNormalEquations(format!(
                    "{}::zone{}",
                    instance.name,
                    zone.id.index()
                )));
            }
            out[(i, j)] = v;
        }
    }
    Ok(out)
}

fn cache_path(dir: &Path, instance_name: &str, zone: usize, outage: Option<LineId>) -> PathBuf {
    let suffix = match outage {
        Some(l) => format!("zone{zone}_outage{}.json", l.index()),
        None => format!("zone{zone}_base.json"),
    };
    dir.join(format!("{instance_name}_{suffix}"))
}

fn try_load_cache(
    instance: &UnitCommitmentInstance,
    zone: usize,
    outage: Option<LineId>,
    config: &ExtractorConfig,
) -> Option<DenseMatrix> {
    let dir = config.cache_dir.as_ref()?;
    let path = cache_path(dir, &instance.name, zone, outage);
    match fs::read(&path) {
        Ok(bytes) => match serde_json::from_slice(&bytes) {
            Ok(matrix) => Some(matrix),
            Err(err) => {
                tracing::warn!(%err, path = %path.display(), "zone link cache entry is corrupt, recomputing");
                None
            }
        },
        Err(err) if err.kind() == std::io::ErrorKind::NotFound => None,
        Err(err) => {
            tracing::warn!(%err, path = %path.display(), "failed to read zone link cache, recomputing");
            None
        }
    }
}

fn maybe_store_cache(
    instance: &UnitCommitmentInstance,
    zone: usize,
    outage: Option<LineId>,
    matrix: &DenseMatrix,
    config: &ExtractorConfig,
    external_line_count: usize,
) {
    if external_line_count <= CACHE_THRESHOLD {
        return;
    }
    let Some(dir) = config.cache_dir.as_ref() else {
        return;
    };
    if let Err(err) = fs::create_dir_all(dir) {
        tracing::warn!(%err, "failed to create zone link cache directory");
        return;
    }
    let path = cache_path(dir, &instance.name, zone, outage);
    match serde_json::to_vec(matrix) {
        Ok(bytes) => {
            if let Err(err) = fs::write(&path, bytes) {
                tracing::warn!(%err, path = %path.display(), "failed to write zone link cache entry");
            }
        }
        Err(err) => tracing::warn!(%err, "failed to serialize zone link cache entry"),
    }
}

/// Converts a zone-local I/O failure into the workspace error type for
/// callers that surface extraction through [`ScucResult`] rather than
/// the solver's [`FatalKind`].
pub fn io_err(context: &str, err: std::io::Error) -> ScucError {
    ScucError::Io(std::io::Error::new(err.kind(), format!("{context}: {err}")))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sensitivity::compute_isf;
    use scuc_core::{Bus, LineId, TransmissionLine, ZoneId};

    /// Two zones sharing a single tie line: zone 0 has buses {0,1} (1
    /// internal, 1 is boundary), zone 1 has buses {2,3} (2 boundary, 3
    /// internal), tied by a line between buses 1 and 2.
    fn two_zone_instance() -> (UnitCommitmentInstance, Vec<Zone>) {
        let buses = vec![
            Bus::new(BusId::new(0), vec![10.0], ZoneId::new(0)),
            Bus::new(BusId::new(1), vec![0.0], ZoneId::new(0)),
            Bus::new(BusId::new(2), vec![0.0], ZoneId::new(1)),
            Bus::new(BusId::new(3), vec![10.0], ZoneId::new(1)),
        ];
        let lines = vec![
            TransmissionLine::new(LineId::new(0), BusId::new(0), BusId::new(1), 0.1, 100.0, 120.0, true, ZoneId::new(0)),
            TransmissionLine::new(LineId::new(1), BusId::new(1), BusId::new(2), 0.2, 50.0, 60.0, true, ZoneId::new(0)),
            TransmissionLine::new(LineId::new(2), BusId::new(2), BusId::new(3), 0.1, 100.0, 120.0, true, ZoneId::new(1)),
        ];
        let instance = UnitCommitmentInstance::new("two-zone", buses, lines, vec![]);

        let mut zone0 = Zone::new(ZoneId::new(0), 2);
        zone0.bus_internal = vec![BusId::new(0)];
        zone0.bus_boundary = vec![BusId::new(1)];
        zone0.internal_lines = vec![LineId::new(0)];
        zone0.external_lines = vec![LineId::new(1)];
        zone0.neighbors[1] = true;

        let mut zone1 = Zone::new(ZoneId::new(1), 2);
        zone1.bus_boundary = vec![BusId::new(2)];
        zone1.bus_internal = vec![BusId::new(3)];
        zone1.internal_lines = vec![LineId::new(2)];
        zone1.external_lines = vec![LineId::new(1)];
        zone1.neighbors[0] = true;

        (instance, vec![zone0, zone1])
    }

    #[test]
    fn classify_partitions_covers_every_bus_per_zone() {
        let (instance, mut zones) = two_zone_instance();
        classify_bus_partitions(&mut zones, &instance);

        // The tie line's own endpoints (bus 1, bus 2) touch exactly two
        // zones each, so each zone sees the other's boundary bus as BN;
        // each zone's strictly-interior bus has no cross-zone line at all
        // and so is unreachable in one hop, classifying as BE instead.
        assert_eq!(zones[0].bus_neighbor, vec![BusId::new(2)]);
        assert_eq!(zones[0].bus_far_external, vec![BusId::new(3)]);
        assert!(zones[0].bus_neighbor_external.is_empty());
        assert_eq!(zones[1].bus_neighbor, vec![BusId::new(1)]);
        assert_eq!(zones[1].bus_far_external, vec![BusId::new(0)]);

        for zone in &zones {
            let total = zone.bus_internal.len()
                + zone.bus_internal_no_demand.len()
                + zone.bus_boundary.len()
                + zone.bus_neighbor.len()
                + zone.bus_neighbor_external.len()
                + zone.bus_far_external.len();
            assert_eq!(total, instance.buses.len());
        }
    }

    /// Zone 1's single boundary bus (2) is a three-zone junction: it
    /// terminates one tie line to zone 0 and another to zone 2. Each of
    /// the other two zones must see it as BNE, not BN, and each zone's
    /// strictly-interior bus (reachable in no hop at all) must classify
    /// as BE for every zone that doesn't own it.
    #[test]
    fn unreachable_zone_buses_classify_as_far_external() {
        let buses = vec![
            Bus::new(BusId::new(0), vec![10.0], ZoneId::new(0)),
            Bus::new(BusId::new(1), vec![0.0], ZoneId::new(0)),
            Bus::new(BusId::new(2), vec![0.0], ZoneId::new(1)),
            Bus::new(BusId::new(3), vec![10.0], ZoneId::new(2)),
        ];
        let lines = vec![
            TransmissionLine::new(LineId::new(0), BusId::new(0), BusId::new(1), 0.1, 100.0, 120.0, true, ZoneId::new(0)),
            TransmissionLine::new(LineId::new(1), BusId::new(1), BusId::new(2), 0.1, 100.0, 120.0, true, ZoneId::new(0)),
            TransmissionLine::new(LineId::new(2), BusId::new(2), BusId::new(3), 0.1, 100.0, 120.0, true, ZoneId::new(1)),
        ];
        let instance = UnitCommitmentInstance::new("chain", buses, lines, vec![]);

        let mut zone0 = Zone::new(ZoneId::new(0), 3);
        zone0.bus_internal = vec![BusId::new(0)];
        zone0.bus_boundary = vec![BusId::new(1)];
        zone0.internal_lines = vec![LineId::new(0)];
        zone0.external_lines = vec![LineId::new(1)];
        zone0.neighbors[1] = true;

        let mut zone1 = Zone::new(ZoneId::new(1), 3);
        zone1.bus_boundary = vec![BusId::new(2)];
        zone1.external_lines = vec![LineId::new(1), LineId::new(2)];
        zone1.neighbors[0] = true;
        zone1.neighbors[2] = true;

        let mut zone2 = Zone::new(ZoneId::new(2), 3);
        zone2.bus_internal = vec![BusId::new(3)];
        zone2.external_lines = vec![LineId::new(2)];
        zone2.neighbors[1] = true;

        let mut zones = vec![zone0, zone1, zone2];
        classify_bus_partitions(&mut zones, &instance);

        assert!(zones[0].bus_neighbor_external.contains(&BusId::new(2)));
        assert!(zones[2].bus_neighbor_external.contains(&BusId::new(2)));

        // Zone 0 never reaches zone 2's interior bus 3 in one hop.
        assert!(zones[0].bus_far_external.contains(&BusId::new(3)));
        assert!(!zones[0].bus_neighbor.contains(&BusId::new(3)));
        assert!(!zones[0].bus_neighbor_external.contains(&BusId::new(3)));

        // Zone 1's own interior bus 1 (no cross-zone line of its own) is
        // likewise unreachable from zone 1.
        assert!(zones[1].bus_far_external.contains(&BusId::new(0)));
    }

    #[test]
    fn link_base_is_least_squares_solution_of_isf_system() {
        let (instance, mut zones) = two_zone_instance();
        classify_bus_partitions(&mut zones, &instance);
        let isf = compute_isf(&instance, BusId::new(0)).unwrap();

        let config = ExtractorConfig::default();
        extract_base_link(&instance, &mut zones[0], &isf, &config).unwrap();

        let link = &zones[0].link_base;
        // zone 0 has one boundary bus (BB = {1}) and two external buses
        // (BE = {2,3}), both BN, so link_base should come back 1x2.
        assert_eq!(link.rows(), 1);
        assert_eq!(link.cols(), 2);
        for j in 0..link.cols() {
            assert!(link[(0, j)].is_finite());
        }
    }

    #[test]
    fn zone_with_no_boundary_gets_a_zero_sized_link() {
        let (instance, mut zones) = two_zone_instance();
        zones[0].bus_boundary.clear();
        let isf = compute_isf(&instance, BusId::new(0)).unwrap();
        let config = ExtractorConfig::default();
        extract_base_link(&instance, &mut zones[0], &isf, &config).unwrap();
        assert_eq!(zones[0].link_base.rows(), 0);
    }

    #[test]
    fn disk_cache_round_trips_for_large_boundaries() {
        let (instance, mut zones) = two_zone_instance();
        classify_bus_partitions(&mut zones, &instance);
        zones[0].external_lines = vec![LineId::new(1); CACHE_THRESHOLD + 1];
        let isf = compute_isf(&instance, BusId::new(0)).unwrap();
        let dir = tempfile::tempdir().unwrap();
        let config = ExtractorConfig {
            cache_dir: Some(dir.path().to_path_buf()),
        };
        extract_base_link(&instance, &mut zones[0], &isf, &config).unwrap();
        let first = zones[0].link_base.clone();

        let mut zone2 = Zone::new(ZoneId::new(0), 2);
        zone2.external_lines = zones[0].external_lines.clone();
        extract_base_link(&instance, &mut zone2, &isf, &config).unwrap();
        assert_eq!(first, zone2.link_base);
    }

    #[test]
    fn extract_outage_link_differs_from_base_when_lodf_is_nonzero() {
        let (instance, mut zones) = two_zone_instance();
        classify_bus_partitions(&mut zones, &instance);
        let isf = compute_isf(&instance, BusId::new(0)).unwrap();
        let lodf = crate::sensitivity::compute_lodf(&instance, &isf);
        let config = ExtractorConfig::default();

        extract_base_link(&instance, &mut zones[0], &isf, &config).unwrap();
        let base = zones[0].link_base.clone();

        extract_outage_link(&instance, &mut zones[0], LineId::new(2), &isf, &lodf, &config).unwrap();
        let outage = zones[0].link_outage.get(&LineId::new(2)).unwrap();
        assert_eq!(outage.rows(), base.rows());
        assert_eq!(outage.cols(), base.cols());
        for j in 0..base.cols() {
            assert!(outage[(0, j)].is_finite());
        }
    }
}
