/*!
Link-state (OSPF-like) engine.

With the whole topology known, the table of the observing router is computed in
one pass: Dijkstra from the local router, then the next hop of every destination
is found by walking the predecessor chain back to the first router after the
local one.

`flooding_order` gives the order in which link-state advertisements spread,
for animating the flood. The table never depends on it.
*/

use std::{
    cmp::Ordering,
    collections::{BTreeMap, BinaryHeap, BTreeSet, VecDeque},
};

use tracing::debug;

use crate::{
    network::{router::RouterId, topology::Topology},
    routing::{
        RoutingError,
        table::{Cost, RouteEntry, RoutingTable},
    },
};

/// One advertisement hop of the flood: `from` sends its LSA to `to`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FloodStep {
    pub from: RouterId,
    pub to: RouterId,
}

#[derive(Debug, PartialEq, Eq)]
struct State {
    cost: u32,
    router: RouterId,
}

impl Ord for State {
    fn cmp(&self, other: &Self) -> Ordering {
        // Reverse ordering for min-heap, lower ID first on equal cost
        other
            .cost
            .cmp(&self.cost)
            .then_with(|| other.router.cmp(&self.router))
    }
}

impl PartialOrd for State {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

/// Shortest-path tree rooted at one router.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ShortestPathTree {
    root: RouterId,
    distances: BTreeMap<RouterId, u32>,
    previous: BTreeMap<RouterId, RouterId>,
}

impl ShortestPathTree {
    /// Runs Dijkstra from `root`. Equal-cost paths keep the predecessor found
    /// first, scanning routers by (cost, ID) and neighbors by ID.
    pub fn compute(topology: &Topology, root: &str) -> Result<Self, RoutingError> {
        let root = topology
            .router(root)
            .map_err(|_| RoutingError::UnknownRouter(root.to_string()))?
            .clone();

        let mut distances: BTreeMap<RouterId, u32> = BTreeMap::new();
        let mut previous: BTreeMap<RouterId, RouterId> = BTreeMap::new();
        let mut settled: BTreeSet<RouterId> = BTreeSet::new();
        let mut heap = BinaryHeap::new();

        distances.insert(root.clone(), 0);
        heap.push(State { cost: 0, router: root.clone() });

        while let Some(State { cost, router }) = heap.pop() {
            if !settled.insert(router.clone()) {
                continue;
            }
            for (neighbor, link_cost) in topology.neighbors(router.as_str()) {
                if settled.contains(neighbor) {
                    continue;
                }
                let Some(new_cost) = cost.checked_add(link_cost) else {
                    continue;
                };
                let better = distances.get(neighbor).is_none_or(|&known| new_cost < known);
                if better {
                    distances.insert(neighbor.clone(), new_cost);
                    previous.insert(neighbor.clone(), router.clone());
                    heap.push(State { cost: new_cost, router: neighbor.clone() });
                }
            }
        }

        debug!(root = %root, reachable = distances.len(), "shortest-path tree computed");
        Ok(Self { root, distances, previous })
    }

    pub fn root(&self) -> &RouterId {
        &self.root
    }

    pub fn distance(&self, destination: &str) -> Cost {
        self.distances.get(destination).map_or(Cost::Infinite, |&d| Cost::Finite(d))
    }

    /// First router after the root on the path to `destination`. The root is
    /// its own next hop; unreachable destinations have none.
    pub fn next_hop(&self, destination: &str) -> Option<&RouterId> {
        if self.root == destination {
            return Some(&self.root);
        }
        let mut current = self.previous.get_key_value(destination)?.0;
        while let Some(parent) = self.previous.get(current) {
            if *parent == self.root {
                return Some(current);
            }
            current = parent;
        }
        None
    }

    /// Routers from the root to `destination`, both included.
    pub fn path(&self, destination: &str) -> Option<Vec<RouterId>> {
        let (mut current, _) = self.distances.get_key_value(destination)?;
        let mut path = vec![current.clone()];
        while let Some(parent) = self.previous.get(current) {
            path.push(parent.clone());
            current = parent;
        }
        path.reverse();
        Some(path)
    }

    /// Tree edges as (parent, child), ordered by child.
    pub fn edges(&self) -> Vec<(RouterId, RouterId)> {
        self.previous
            .iter()
            .map(|(child, parent)| (parent.clone(), child.clone()))
            .collect()
    }
}

/// Routing table of `local`: one row with an entry for every router.
pub fn compute_table(topology: &Topology, local: &str) -> Result<RoutingTable, RoutingError> {
    let tree = ShortestPathTree::compute(topology, local)?;
    let mut row = BTreeMap::new();
    for destination in topology.routers() {
        let entry = if destination == tree.root() {
            RouteEntry::local(destination)
        } else {
            RouteEntry::from_cost(tree.distance(destination.as_str()), tree.next_hop(destination.as_str()))
        };
        row.insert(destination.clone(), entry);
    }

    let mut table = RoutingTable::new();
    table.insert_row(tree.root().clone(), row);
    Ok(table)
}

/// Routers on the shortest path from `local` to `destination`, or None when
/// it is unreachable.
pub fn shortest_path(topology: &Topology, local: &str, destination: &str) -> Result<Option<Vec<RouterId>>, RoutingError> {
    if !topology.contains(destination) {
        return Err(RoutingError::UnknownRouter(destination.to_string()));
    }
    Ok(ShortestPathTree::compute(topology, local)?.path(destination))
}

/// Edges of the shortest-path tree rooted at `local`, as (parent, child).
pub fn spf_tree(topology: &Topology, local: &str) -> Result<Vec<(RouterId, RouterId)>, RoutingError> {
    Ok(ShortestPathTree::compute(topology, local)?.edges())
}

/// Order in which LSAs spread from `local`: every reached router forwards to
/// all of its neighbors, in ID order, wave by wave.
pub fn flooding_order(topology: &Topology, local: &str) -> Result<Vec<FloodStep>, RoutingError> {
    let local = topology
        .router(local)
        .map_err(|_| RoutingError::UnknownRouter(local.to_string()))?;

    let mut steps = Vec::new();
    let mut reached: BTreeSet<&RouterId> = BTreeSet::from([local]);
    let mut queue = VecDeque::from([local]);

    while let Some(current) = queue.pop_front() {
        for (neighbor, _) in topology.neighbors(current.as_str()) {
            steps.push(FloodStep { from: current.clone(), to: neighbor.clone() });
            if reached.insert(neighbor) {
                queue.push_back(neighbor);
            }
        }
    }
    Ok(steps)
}
