/*!
Diffusing (EIGRP-like) engine.

This is a simplified stand-in for DUAL: no feasible successors, no
query/reply state machine. Every router keeps a distance to every destination,
seeded from its direct links, and repeatedly relaxes `dist[r][d]` through each
neighbor `n` as `dist[r][n] + dist[n][d]` until a whole sweep changes nothing.
At the fixed point the distances are the shortest-path costs, so the results
match the link-state engine.
*/

use tracing::{debug, warn};

use crate::{
    network::{router::RouterId, topology::Topology},
    routing::{
        RoutingError,
        table::{Cost, RouteEntry, RoutingTable},
    },
};

/// All-pairs distances, indexed by position in the sorted router list.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DistanceMatrix {
    routers: Vec<RouterId>,
    neighbors: Vec<Vec<usize>>,
    dist: Vec<Vec<Cost>>,
    sweeps: usize,
    converged: bool,
}

impl DistanceMatrix {
    /// Direct-link costs only: 0 on the diagonal, the link cost for neighbors,
    /// infinite elsewhere.
    pub fn seed(topology: &Topology) -> Self {
        let routers: Vec<RouterId> = topology.routers().into_iter().cloned().collect();
        let n = routers.len();
        let mut dist = vec![vec![Cost::Infinite; n]; n];
        let mut neighbors = Vec::with_capacity(n);

        for (i, router) in routers.iter().enumerate() {
            dist[i][i] = Cost::ZERO;
            let mut adjacent = Vec::new();
            for (neighbor, cost) in topology.neighbors(router.as_str()) {
                if let Some(j) = position(&routers, neighbor.as_str()) {
                    dist[i][j] = Cost::Finite(cost);
                    adjacent.push(j);
                }
            }
            neighbors.push(adjacent);
        }

        Self { routers, neighbors, dist, sweeps: 0, converged: false }
    }

    /// Seeds the matrix and relaxes it until a sweep makes no change, or until
    /// `max_sweeps` sweeps have run. Check `is_converged` for which one it was.
    pub fn relax(topology: &Topology, max_sweeps: usize) -> Self {
        let mut matrix = Self::seed(topology);
        while matrix.sweeps < max_sweeps {
            matrix.sweeps += 1;
            if !matrix.sweep() {
                matrix.converged = true;
                break;
            }
        }
        if matrix.converged {
            debug!(sweeps = matrix.sweeps, routers = matrix.routers.len(), "distance matrix converged");
        } else {
            warn!(sweeps = matrix.sweeps, "distance matrix still changing, giving up");
        }
        matrix
    }

    fn sweep(&mut self) -> bool {
        let mut updated = false;
        let n = self.routers.len();
        for r in 0..n {
            for &via in &self.neighbors[r] {
                for d in 0..n {
                    if d == r {
                        continue;
                    }
                    let candidate = self.dist[r][via] + self.dist[via][d];
                    if candidate < self.dist[r][d] {
                        self.dist[r][d] = candidate;
                        updated = true;
                    }
                }
            }
        }
        updated
    }

    pub fn routers(&self) -> &[RouterId] {
        &self.routers
    }

    pub fn sweeps(&self) -> usize {
        self.sweeps
    }

    pub fn is_converged(&self) -> bool {
        self.converged
    }

    pub fn cost(&self, from: &str, to: &str) -> Cost {
        match (position(&self.routers, from), position(&self.routers, to)) {
            (Some(i), Some(j)) => self.dist[i][j],
            _ => Cost::Infinite,
        }
    }

    /// First neighbor, in ID order, lying on a shortest path from `from` to
    /// `to`. None when `to` is unreachable. Each router picks independently, so
    /// zero-cost links can make two routers point at each other.
    pub fn next_hop(&self, from: &str, to: &str) -> Option<&RouterId> {
        let i = position(&self.routers, from)?;
        let j = position(&self.routers, to)?;
        if i == j {
            return Some(&self.routers[i]);
        }
        let target = self.dist[i][j];
        if target.is_infinite() {
            return None;
        }
        self.neighbors[i]
            .iter()
            .find(|&&n| self.dist[i][n] + self.dist[n][j] == target)
            .map(|&n| &self.routers[n])
    }

    /// Table with a single row for `local`.
    pub fn table_for(&self, local: &str) -> Option<RoutingTable> {
        let i = position(&self.routers, local)?;
        let router = &self.routers[i];
        let row = self
            .routers
            .iter()
            .map(|destination| {
                let entry = if destination == router {
                    RouteEntry::local(router)
                } else {
                    RouteEntry::from_cost(self.cost(local, destination.as_str()), self.next_hop(local, destination.as_str()))
                };
                (destination.clone(), entry)
            })
            .collect();

        let mut table = RoutingTable::new();
        table.insert_row(router.clone(), row);
        Some(table)
    }
}

fn position(routers: &[RouterId], id: &str) -> Option<usize> {
    routers.binary_search_by(|r| r.as_str().cmp(id)).ok()
}

/// Relaxed distance matrix for the whole topology.
pub fn distance_matrix(topology: &Topology, max_sweeps: usize) -> DistanceMatrix {
    DistanceMatrix::relax(topology, max_sweeps)
}

/// Routing table of `local`. If the matrix does not settle within
/// `max_sweeps`, the partial table is returned inside the error.
pub fn compute_table(topology: &Topology, local: &str, max_sweeps: usize) -> Result<RoutingTable, RoutingError> {
    if !topology.contains(local) {
        return Err(RoutingError::UnknownRouter(local.to_string()));
    }
    let matrix = distance_matrix(topology, max_sweeps);
    let table = matrix
        .table_for(local)
        .ok_or_else(|| RoutingError::UnknownRouter(local.to_string()))?;

    if matrix.is_converged() {
        Ok(table)
    } else {
        Err(RoutingError::NonConvergence { rounds: matrix.sweeps(), last_table: Box::new(table) })
    }
}

#[cfg(test)]
mod tests {
    use rand::{SeedableRng, rngs::StdRng};

    use super::*;
    use crate::{
        config::DEFAULT_MAX_SWEEPS,
        network::{
            generate::{RandomTopologySpec, random_topology},
            link::LinkMode,
        },
        routing::link_state,
    };

    fn weighted(links: &[(&str, &str, u32)]) -> Topology {
        let mut topology = Topology::new(LinkMode::Weighted);
        for (a, b, cost) in links {
            topology.add_link(a, b, *cost).unwrap();
        }
        topology
    }

    #[test]
    fn test_triangle_settles_in_one_sweep() {
        let topology = weighted(&[("A", "B", 1), ("B", "C", 1), ("A", "C", 1)]);
        let matrix = distance_matrix(&topology, DEFAULT_MAX_SWEEPS);
        assert!(matrix.is_converged());
        assert_eq!(matrix.sweeps(), 1);

        let table = compute_table(&topology, "A", DEFAULT_MAX_SWEEPS).unwrap();
        assert_eq!(table.entry("A", "B"), Some(&RouteEntry::via(&"B".into(), 1)));
        assert_eq!(table.entry("A", "C"), Some(&RouteEntry::via(&"C".into(), 1)));
        assert_eq!(table.entry("A", "A"), Some(&RouteEntry::local(&"A".into())));
    }

    #[test]
    fn test_weighted_square() {
        let topology: Topology = serde_json::from_str(include_str!("../../test_data/square_weighted.json")).unwrap();
        let table = compute_table(&topology, "A", DEFAULT_MAX_SWEEPS).unwrap();
        assert_eq!(table.entry("A", "C"), Some(&RouteEntry::via(&"B".into(), 7)));
        assert_eq!(table.entry("A", "D"), Some(&RouteEntry::via(&"B".into(), 8)));
        assert_eq!(table.entry("A", "E"), Some(&RouteEntry::unreachable()));
    }

    #[test]
    fn test_disconnected_router_has_no_next_hop() {
        let mut topology = weighted(&[("A", "B", 2)]);
        topology.add_router("Z").unwrap();
        let matrix = distance_matrix(&topology, DEFAULT_MAX_SWEEPS);
        assert_eq!(matrix.cost("A", "Z"), Cost::Infinite);
        assert_eq!(matrix.next_hop("A", "Z"), None);
        assert_eq!(matrix.next_hop("Z", "Z").unwrap(), "Z");
    }

    #[test]
    fn test_zero_cost_link_can_bounce_next_hops() {
        let topology = weighted(&[("A", "B", 0), ("B", "C", 1), ("A", "C", 1)]);
        let matrix = distance_matrix(&topology, DEFAULT_MAX_SWEEPS);
        assert_eq!(matrix.cost("A", "C"), Cost::Finite(1));
        assert_eq!(matrix.cost("B", "C"), Cost::Finite(1));
        assert_eq!(matrix.next_hop("A", "C").unwrap(), "B");
        assert_eq!(matrix.next_hop("B", "C").unwrap(), "A");

        // link state walks its own tree and goes direct
        let spf = link_state::compute_table(&topology, "A").unwrap();
        assert_eq!(spf.entry("A", "C"), Some(&RouteEntry::via(&"C".into(), 1)));
    }

    #[test]
    fn test_unknown_router() {
        let topology = weighted(&[("A", "B", 2)]);
        assert!(matches!(
            compute_table(&topology, "Q", DEFAULT_MAX_SWEEPS),
            Err(RoutingError::UnknownRouter(r)) if r == "Q"
        ));
    }

    #[test]
    fn test_sweep_ceiling_returns_partial_table() {
        let topology = weighted(&[("A", "B", 1), ("B", "C", 1), ("C", "D", 1), ("D", "E", 1)]);
        match compute_table(&topology, "A", 1) {
            Err(RoutingError::NonConvergence { rounds, last_table }) => {
                assert_eq!(rounds, 1);
                assert_eq!(last_table.cost("A", "C"), Cost::Finite(2));
                assert_eq!(last_table.cost("A", "E"), Cost::Infinite);
            }
            other => panic!("expected non-convergence, got {other:?}"),
        }
        assert!(matches!(
            compute_table(&topology, "A", 0),
            Err(RoutingError::NonConvergence { rounds: 0, .. })
        ));
    }

    #[test]
    fn test_idempotent() {
        let mut rng = StdRng::seed_from_u64(11);
        let topology = random_topology(&mut rng, &RandomTopologySpec { routers: 15, ..Default::default() });
        assert_eq!(
            compute_table(&topology, "R03", DEFAULT_MAX_SWEEPS).unwrap(),
            compute_table(&topology, "R03", DEFAULT_MAX_SWEEPS).unwrap()
        );
    }

    #[test]
    fn test_agrees_with_link_state() {
        for seed in 0..10 {
            let mut rng = StdRng::seed_from_u64(seed);
            let spec = RandomTopologySpec { routers: 12, extra_link_probability: 0.3, max_cost: 7, mode: LinkMode::Weighted };
            let mut topology = random_topology(&mut rng, &spec);
            topology.add_router("ZZ").unwrap();

            let matrix = distance_matrix(&topology, DEFAULT_MAX_SWEEPS);
            assert!(matrix.is_converged());
            for local in matrix.routers() {
                let spf = link_state::compute_table(&topology, local.as_str()).unwrap();
                let diffusing = matrix.table_for(local.as_str()).unwrap();
                for destination in matrix.routers() {
                    assert_eq!(
                        diffusing.cost(local.as_str(), destination.as_str()),
                        spf.cost(local.as_str(), destination.as_str()),
                        "seed {seed}: {local} -> {destination}"
                    );
                    let entry = diffusing.entry(local.as_str(), destination.as_str()).unwrap();
                    assert!(entry.is_consistent(local, destination));
                }
            }
        }
    }
}
