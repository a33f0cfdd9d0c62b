/*!
RIP-like distance-vector engine.

One call to `compute_round` is one fully synchronous exchange: every router
sends its table to every neighbor, with split horizon and poisoned reverse, and
every neighbor folds the advertisement into its own table. Callers that want to
watch the protocol step by step own the loop (see `RoundStepper`); `converge`
runs rounds until nothing changes.

Before exchanging, every router drops routes whose next hop is no longer a
neighbor and re-reads the cost of its direct links, so a table kept across a
topology change converges again. Advertisements are then taken from that
snapshot, while receivers evaluate them against the table being built for this
round. A receiver follows whatever its current next hop reports, worse or
unreachable included. Routers, neighbors and destinations are walked in
lexicographic order, which decides in which round a change first shows up but
never the converged result.
*/

use tracing::{debug, info, warn};

use crate::{
    config::EngineConfig,
    network::{router::RouterId, topology::Topology},
    routing::{
        RoutingError,
        table::{Cost, RoundDiff, RouteEntry, RoutingTable},
    },
};

/// One destination as advertised by a router to one neighbor.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AdvertisedRoute {
    pub destination: RouterId,
    pub cost: Cost,
    /// The sender reaches the destination through the receiver, so the route
    /// is advertised back as unreachable.
    pub poisoned: bool,
}

/// Result of one round.
#[derive(Debug, Clone)]
pub struct RoundOutcome {
    pub table: RoutingTable,
    pub diff: RoundDiff,
    pub changed: bool,
}

/// Result of running rounds until a fixed point.
#[derive(Debug, Clone)]
pub struct Convergence {
    pub table: RoutingTable,
    /// Rounds executed, including the final round that changed nothing.
    pub rounds: usize,
    /// One diff per executed round.
    pub history: Vec<RoundDiff>,
}

/// What `from` tells `to` about every destination in its table.
pub fn advertisement(table: &RoutingTable, from: &str, to: &str) -> Vec<AdvertisedRoute> {
    let Some(row) = table.row(from) else {
        return Vec::new();
    };
    row.iter()
        .map(|(destination, entry)| {
            let poisoned = entry.next_hop.as_ref().is_some_and(|hop| hop == to);
            AdvertisedRoute {
                destination: destination.clone(),
                cost: if poisoned { Cost::Infinite } else { entry.cost },
                poisoned,
            }
        })
        .collect()
}

/// Brings `previous` in line with the current links before an exchange:
/// routes through a router that is no longer adjacent are withdrawn and direct
/// routes pick up changed link costs. Every change is recorded in `diff`.
fn refresh_links(topology: &Topology, previous: &RoutingTable, diff: &mut RoundDiff) -> RoutingTable {
    let mut refreshed = previous.clone();
    for (router, row) in previous.iter() {
        for (destination, entry) in row {
            let Some(hop) = entry.next_hop.as_ref() else {
                continue;
            };
            if hop == router {
                continue;
            }
            let replacement = match topology.link_cost(router.as_str(), hop.as_str()) {
                None => RouteEntry::unreachable(),
                Some(cost) if hop == destination => RouteEntry::via(hop, cost),
                Some(_) => continue,
            };
            if replacement != *entry {
                debug!(router = %router, destination = %destination, "route refreshed after link change");
                refreshed.set(router, destination, replacement);
                diff.record(router, destination);
            }
        }
    }
    refreshed
}

/// Runs one exchange round over `topology`. `previous` is left untouched.
pub fn compute_round(topology: &Topology, previous: &RoutingTable, max_hop: u32) -> RoundOutcome {
    let mut diff = RoundDiff::default();
    let baseline = refresh_links(topology, previous, &mut diff);
    let mut updated = baseline.clone();

    for router in topology.routers() {
        for (neighbor, link_cost) in topology.neighbors(router.as_str()) {
            for route in advertisement(&baseline, router.as_str(), neighbor.as_str()) {
                let candidate = route.cost.plus(link_cost).capped(max_hop);
                let current = updated
                    .entry(neighbor.as_str(), route.destination.as_str())
                    .cloned()
                    .unwrap_or_else(RouteEntry::unreachable);
                let through_sender = current.next_hop.as_ref() == Some(router) && current.cost.is_finite();

                let mut replacement = None;
                if candidate.is_finite() && (candidate < current.cost || current.is_unusable()) {
                    replacement = Some(RouteEntry::from_cost(candidate, Some(router)));
                } else if through_sender && candidate != current.cost {
                    // the current next hop reports a new cost, up to unreachable
                    replacement = Some(RouteEntry::from_cost(candidate, Some(router)));
                }
                // the sender routes through the receiver: the receiver's route back
                // through the sender is a loop and gets withdrawn
                if route.poisoned && through_sender {
                    replacement = Some(RouteEntry::unreachable());
                }

                if let Some(entry) = replacement {
                    updated.set(neighbor, &route.destination, entry);
                    diff.record(neighbor, &route.destination);
                }
            }
        }
    }

    updated.backfill(topology);
    let changed = !diff.is_empty();
    RoundOutcome { table: updated, diff, changed }
}

/// Runs rounds from `initial` until one changes nothing, or fails after
/// `config.max_rounds` rounds with the last table attached.
pub fn converge(
    topology: &Topology,
    initial: &RoutingTable,
    config: &EngineConfig,
) -> Result<Convergence, RoutingError> {
    let mut table = initial.clone();
    let mut history = Vec::new();

    for round in 1..=config.max_rounds {
        let outcome = compute_round(topology, &table, config.max_hop);
        debug!(round, changed = outcome.diff.len(), "distance-vector round");
        table = outcome.table;
        history.push(outcome.diff);
        if !outcome.changed {
            info!(rounds = round, "distance-vector converged");
            return Ok(Convergence { table, rounds: round, history });
        }
    }

    warn!(rounds = config.max_rounds, "distance-vector did not converge");
    Err(RoutingError::NonConvergence {
        rounds: config.max_rounds,
        last_table: Box::new(table),
    })
}

/// A single step of a `RoundStepper`.
#[derive(Debug, Clone)]
pub struct Step {
    pub round: usize,
    pub diff: RoundDiff,
    pub changed: bool,
}

/// Owns the current snapshot for live, one-round-at-a-time stepping.
#[derive(Debug, Clone)]
pub struct RoundStepper {
    table: RoutingTable,
    round: usize,
    max_hop: u32,
}

impl RoundStepper {
    pub fn new(topology: &Topology, max_hop: u32) -> Self {
        Self {
            table: RoutingTable::initialize(topology),
            round: 0,
            max_hop,
        }
    }

    /// Continues from an existing table, e.g. a converged one after a link change.
    pub fn from_table(table: RoutingTable, max_hop: u32) -> Self {
        Self { table, round: 0, max_hop }
    }

    pub fn table(&self) -> &RoutingTable {
        &self.table
    }

    pub fn round(&self) -> usize {
        self.round
    }

    /// Runs one round and replaces the current snapshot with its result.
    pub fn step(&mut self, topology: &Topology) -> Step {
        let outcome = compute_round(topology, &self.table, self.max_hop);
        self.table = outcome.table;
        self.round += 1;
        Step {
            round: self.round,
            diff: outcome.diff,
            changed: outcome.changed,
        }
    }

    /// Starts over from fresh tables, e.g. after the topology changed.
    pub fn reset(&mut self, topology: &Topology) {
        self.table = RoutingTable::initialize(topology);
        self.round = 0;
    }
}

#[cfg(test)]
mod tests {
    use std::collections::{BTreeMap, VecDeque};

    use rand::{SeedableRng, rngs::StdRng};

    use super::*;
    use crate::network::{
        generate::{RandomTopologySpec, random_topology},
        link::LinkMode,
    };

    fn hop_topology(links: &[(&str, &str)]) -> Topology {
        let mut topology = Topology::new(LinkMode::HopCount);
        for (a, b) in links {
            topology.add_link(a, b, 1).unwrap();
        }
        topology
    }

    fn bfs(topology: &Topology, source: &str) -> BTreeMap<RouterId, u32> {
        let mut distances = BTreeMap::new();
        let mut queue = VecDeque::new();
        distances.insert(RouterId::from(source), 0);
        queue.push_back(RouterId::from(source));
        while let Some(current) = queue.pop_front() {
            let d = distances[&current];
            for (neighbor, _) in topology.neighbors(current.as_str()) {
                if !distances.contains_key(neighbor) {
                    distances.insert(neighbor.clone(), d + 1);
                    queue.push_back(neighbor.clone());
                }
            }
        }
        distances
    }

    fn assert_split_horizon(topology: &Topology, table: &RoutingTable) {
        for router in topology.routers() {
            for (neighbor, _) in topology.neighbors(router.as_str()) {
                for route in advertisement(table, router.as_str(), neighbor.as_str()) {
                    if table.next_hop(router.as_str(), route.destination.as_str()) == Some(neighbor) {
                        assert!(route.poisoned);
                        assert_eq!(route.cost, Cost::Infinite);
                    }
                }
            }
        }
    }

    #[test]
    fn test_triangle_converges_in_first_round() {
        let topology = hop_topology(&[("A", "B"), ("B", "C"), ("A", "C")]);
        let initial = RoutingTable::initialize(&topology);
        let result = converge(&topology, &initial, &EngineConfig::default()).unwrap();

        assert_eq!(result.rounds, 1);
        assert!(result.history[0].is_empty());
        for a in ["A", "B", "C"] {
            for b in ["A", "B", "C"] {
                let expected = if a == b { Cost::ZERO } else { Cost::Finite(1) };
                assert_eq!(result.table.cost(a, b), expected);
            }
        }
    }

    #[test]
    fn test_path_learns_one_hop_per_round() {
        let topology = hop_topology(&[("A", "B"), ("B", "C"), ("C", "D")]);
        let initial = RoutingTable::initialize(&topology);

        let first = compute_round(&topology, &initial, 15);
        assert!(first.changed);
        assert_eq!(first.table.entry("A", "C"), Some(&RouteEntry::via(&"B".into(), 2)));
        assert_eq!(first.table.cost("A", "D"), Cost::Infinite);
        assert!(first.diff.contains("A", "C"));
        assert!(first.diff.contains("D", "B"));
        assert!(!first.diff.contains("A", "D"));

        let second = compute_round(&topology, &first.table, 15);
        assert_eq!(second.table.entry("A", "D"), Some(&RouteEntry::via(&"B".into(), 3)));
        assert_eq!(second.table.entry("D", "A"), Some(&RouteEntry::via(&"C".into(), 3)));

        let third = compute_round(&topology, &second.table, 15);
        assert!(!third.changed);
        assert_eq!(third.table, second.table);
    }

    #[test]
    fn test_previous_table_is_not_mutated() {
        let topology = hop_topology(&[("A", "B"), ("B", "C")]);
        let initial = RoutingTable::initialize(&topology);
        let snapshot = initial.clone();
        let outcome = compute_round(&topology, &initial, 15);
        assert!(outcome.changed);
        assert_eq!(initial, snapshot);
    }

    #[test]
    fn test_poisoned_reverse_withdraws_loop() {
        let mut topology = hop_topology(&[("A", "B")]);
        topology.add_router("C").unwrap();
        let mut table = RoutingTable::initialize(&topology);
        // a stale two-router loop towards C
        table.set(&"A".into(), &"C".into(), RouteEntry::via(&"B".into(), 2));
        table.set(&"B".into(), &"C".into(), RouteEntry::via(&"A".into(), 2));

        let advertised = advertisement(&table, "A", "B");
        let to_c = advertised.iter().find(|r| r.destination == "C").unwrap();
        assert!(to_c.poisoned);
        assert_eq!(to_c.cost, Cost::Infinite);

        let outcome = compute_round(&topology, &table, 15);
        assert_eq!(outcome.table.entry("A", "C"), Some(&RouteEntry::unreachable()));
        assert_eq!(outcome.table.entry("B", "C"), Some(&RouteEntry::unreachable()));
        assert!(outcome.diff.contains("A", "C"));
        assert!(outcome.diff.contains("B", "C"));

        let after = compute_round(&topology, &outcome.table, 15);
        assert!(!after.changed);
    }

    #[test]
    fn test_max_hop_ceiling() {
        let topology = hop_topology(&[("A", "B"), ("B", "C"), ("C", "D"), ("D", "E")]);
        let config = EngineConfig { max_hop: 2, ..Default::default() };
        let result = converge(&topology, &RoutingTable::initialize(&topology), &config).unwrap();
        assert_eq!(result.table.cost("A", "C"), Cost::Finite(2));
        assert_eq!(result.table.entry("A", "D"), Some(&RouteEntry::unreachable()));
        assert_eq!(result.table.entry("E", "B"), Some(&RouteEntry::unreachable()));
    }

    #[test]
    fn test_non_convergence_reports_last_table() {
        let topology = hop_topology(&[("A", "B"), ("B", "C"), ("C", "D"), ("D", "E"), ("E", "F")]);
        let config = EngineConfig { max_rounds: 2, ..Default::default() };
        let err = converge(&topology, &RoutingTable::initialize(&topology), &config).unwrap_err();
        match err {
            RoutingError::NonConvergence { rounds, last_table } => {
                assert_eq!(rounds, 2);
                assert_eq!(last_table.cost("A", "D"), Cost::Finite(3));
                assert_eq!(last_table.cost("A", "F"), Cost::Infinite);
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn test_disconnected_router_is_unreachable() {
        let mut topology = hop_topology(&[("A", "B"), ("B", "C")]);
        topology.add_router("D").unwrap();
        let result = converge(&topology, &RoutingTable::initialize(&topology), &EngineConfig::default()).unwrap();
        for router in ["A", "B", "C"] {
            assert_eq!(result.table.entry(router, "D"), Some(&RouteEntry::unreachable()));
            assert_eq!(result.table.entry("D", router), Some(&RouteEntry::unreachable()));
        }
    }

    #[test]
    fn test_new_router_is_backfilled() {
        let mut topology = hop_topology(&[("A", "B")]);
        let table = RoutingTable::initialize(&topology);
        topology.add_router("Z").unwrap();
        let outcome = compute_round(&topology, &table, 15);
        assert_eq!(outcome.table.entry("A", "Z"), Some(&RouteEntry::unreachable()));
        assert_eq!(outcome.table.entry("Z", "Z"), Some(&RouteEntry::local(&"Z".into())));
        assert!(!outcome.changed);
    }

    #[test]
    fn test_converged_costs_match_bfs() {
        for seed in 0..10 {
            let mut rng = StdRng::seed_from_u64(seed);
            let spec = RandomTopologySpec {
                routers: 12,
                extra_link_probability: 0.15,
                max_cost: 1,
                mode: LinkMode::HopCount,
            };
            let topology = random_topology(&mut rng, &spec);
            let mut table = RoutingTable::initialize(&topology);
            let config = EngineConfig { max_hop: 64, ..Default::default() };

            loop {
                let outcome = compute_round(&topology, &table, config.max_hop);
                assert_split_horizon(&topology, &outcome.table);
                table = outcome.table;
                if !outcome.changed {
                    break;
                }
            }

            for router in topology.routers() {
                let expected = bfs(&topology, router.as_str());
                for destination in topology.routers() {
                    let cost = table.cost(router.as_str(), destination.as_str());
                    assert_eq!(cost, Cost::Finite(expected[destination]), "seed {seed}: {router} -> {destination}");
                    let entry = table.entry(router.as_str(), destination.as_str()).unwrap();
                    assert!(entry.is_consistent(router, destination));
                }
            }
        }
    }

    #[test]
    fn test_weighted_links_reach_shortest_paths() {
        let topology: Topology = serde_json::from_str(include_str!("../../test_data/square_weighted.json")).unwrap();
        let config = EngineConfig { max_hop: 1000, ..Default::default() };
        let result = converge(&topology, &RoutingTable::initialize(&topology), &config).unwrap();
        assert_eq!(result.table.entry("A", "C"), Some(&RouteEntry::via(&"B".into(), 7)));
        assert_eq!(result.table.entry("A", "D"), Some(&RouteEntry::via(&"B".into(), 8)));
        assert_eq!(result.table.cost("D", "B"), Cost::Finite(3));
        assert_eq!(result.table.cost("A", "E"), Cost::Infinite);
    }

    fn step_until_stable(stepper: &mut RoundStepper, topology: &Topology) -> usize {
        let mut rounds = 0;
        loop {
            let step = stepper.step(topology);
            rounds += 1;
            if !step.changed {
                return rounds;
            }
            assert!(rounds <= topology.router_count(), "still changing after {rounds} rounds");
        }
    }

    #[test]
    fn test_removed_link_drives_cost_to_infinity() {
        let mut topology = hop_topology(&[("A", "B"), ("B", "C"), ("C", "D")]);
        let config = EngineConfig::default();
        let converged = converge(&topology, &RoutingTable::initialize(&topology), &config).unwrap();
        assert_eq!(converged.table.cost("A", "D"), Cost::Finite(3));

        topology.remove_link("B", "C").unwrap();
        let mut stepper = RoundStepper::from_table(converged.table, config.max_hop);
        let first = stepper.step(&topology);
        assert!(first.diff.contains("B", "C"));
        assert!(first.diff.contains("C", "B"));
        let withdrawn_at_b: Vec<&str> = first.diff.changed_for("B").unwrap().iter().map(RouterId::as_str).collect();
        assert_eq!(withdrawn_at_b, ["C", "D"]);
        step_until_stable(&mut stepper, &topology);

        let table = stepper.table();
        for (router, destination) in [("A", "D"), ("A", "C"), ("B", "C"), ("C", "A"), ("D", "B")] {
            assert_eq!(table.entry(router, destination), Some(&RouteEntry::unreachable()), "{router} -> {destination}");
        }
        assert_eq!(table.entry("A", "B"), Some(&RouteEntry::via(&"B".into(), 1)));
        assert_eq!(table.entry("C", "D"), Some(&RouteEntry::via(&"D".into(), 1)));
    }

    #[test]
    fn test_removed_link_reroutes_around_ring() {
        let mut topology = hop_topology(&[("A", "B"), ("B", "C"), ("C", "D"), ("D", "A")]);
        let config = EngineConfig::default();
        let converged = converge(&topology, &RoutingTable::initialize(&topology), &config).unwrap();
        assert_eq!(converged.table.entry("A", "B"), Some(&RouteEntry::via(&"B".into(), 1)));

        topology.remove_link("A", "B").unwrap();
        let mut stepper = RoundStepper::from_table(converged.table, config.max_hop);
        step_until_stable(&mut stepper, &topology);

        let table = stepper.table();
        assert_eq!(table.entry("A", "B"), Some(&RouteEntry::via(&"D".into(), 3)));
        assert_eq!(table.entry("B", "A"), Some(&RouteEntry::via(&"C".into(), 3)));
        for router in topology.routers() {
            let expected = bfs(&topology, router.as_str());
            for destination in topology.routers() {
                assert_eq!(table.cost(router.as_str(), destination.as_str()), Cost::Finite(expected[destination]));
            }
        }
    }

    #[test]
    fn test_changed_link_cost_is_followed() {
        let mut topology = Topology::new(LinkMode::Weighted);
        for (a, b) in [("A", "B"), ("B", "C"), ("A", "C")] {
            topology.add_link(a, b, 1).unwrap();
        }
        let config = EngineConfig::default();
        let converged = converge(&topology, &RoutingTable::initialize(&topology), &config).unwrap();
        assert_eq!(converged.table.entry("A", "C"), Some(&RouteEntry::via(&"C".into(), 1)));

        assert_eq!(topology.upsert_link("A", "C", 5).unwrap(), Some(1));
        let mut stepper = RoundStepper::from_table(converged.table, config.max_hop);
        step_until_stable(&mut stepper, &topology);
        assert_eq!(stepper.table().entry("A", "C"), Some(&RouteEntry::via(&"B".into(), 2)));
        assert_eq!(stepper.table().entry("C", "A"), Some(&RouteEntry::via(&"B".into(), 2)));

        // a raised cost is followed as well, until the detour is cheaper
        assert_eq!(topology.upsert_link("A", "B", 9).unwrap(), Some(1));
        step_until_stable(&mut stepper, &topology);
        assert_eq!(stepper.table().entry("A", "B"), Some(&RouteEntry::via(&"C".into(), 6)));
        assert_eq!(stepper.table().entry("B", "A"), Some(&RouteEntry::via(&"C".into(), 6)));
        assert_eq!(stepper.table().entry("A", "C"), Some(&RouteEntry::via(&"C".into(), 5)));
    }

    #[test]
    fn test_stepper_counts_rounds() {
        let topology = hop_topology(&[("A", "B"), ("B", "C")]);
        let mut stepper = RoundStepper::new(&topology, 15);
        assert_eq!(stepper.round(), 0);
        let step = stepper.step(&topology);
        assert_eq!(step.round, 1);
        assert!(step.changed);
        assert_eq!(stepper.table().cost("A", "C"), Cost::Finite(2));
        let step = stepper.step(&topology);
        assert_eq!(step.round, 2);
        assert!(!step.changed);
        stepper.reset(&topology);
        assert_eq!(stepper.round(), 0);
        assert_eq!(stepper.table().cost("A", "C"), Cost::Infinite);
    }
}
