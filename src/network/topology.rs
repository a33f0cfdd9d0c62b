/*!
Topology store.

Holds the routers and symmetric links an engine computes over. The store has no
routing logic of its own: engines only read it through `routers`, `neighbors`
and `link_cost`, always in lexicographic router order.

Routers are created implicitly by the first link that mentions them (or
explicitly with `add_router` for isolated routers). The store only shrinks
through `remove_link` and `reset`; routers are never removed one by one.
*/

use std::collections::HashMap;

use petgraph::{
    graph::{NodeIndex, UnGraph},
    visit::EdgeRef,
};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{debug, info};

use crate::network::{
    link::{Link, LinkKey, LinkMode},
    router::RouterId,
};

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TopologyError {
    #[error("Invalid router ID: {0:?}")]
    InvalidRouter(String),
    #[error("Invalid link: router {0} cannot be linked to itself")]
    InvalidLink(RouterId),
    #[error("Duplicate link: {} - {} already exists with cost {existing_cost}", .key.a, .key.b)]
    DuplicateLink { key: LinkKey, existing_cost: u32 },
    #[error("Unknown router: {0}")]
    UnknownRouter(String),
    #[error("Unknown link: {} - {}", .0.a, .0.b)]
    UnknownLink(LinkKey),
}

/// What to do when a link is submitted for a pair that is already linked.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DuplicatePolicy {
    /// Fail with `TopologyError::DuplicateLink`.
    #[default]
    Reject,
    /// Replace the stored cost with the submitted one.
    Update,
}

/// Routers and links, stored on an undirected petgraph graph.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(try_from = "TopologySnapshot", into = "TopologySnapshot")]
pub struct Topology {
    graph: UnGraph<RouterId, u32>,
    router_index: HashMap<RouterId, NodeIndex>,
    mode: LinkMode,
}

impl Topology {
    pub fn new(mode: LinkMode) -> Self {
        Self {
            graph: UnGraph::new_undirected(),
            router_index: HashMap::new(),
            mode,
        }
    }

    pub fn mode(&self) -> LinkMode {
        self.mode
    }

    pub fn router_count(&self) -> usize {
        self.graph.node_count()
    }

    pub fn link_count(&self) -> usize {
        self.graph.edge_count()
    }

    pub fn is_empty(&self) -> bool {
        self.graph.node_count() == 0
    }

    pub fn contains(&self, id: &str) -> bool {
        self.router_index.contains_key(id)
    }

    /// Looks up a router by ID, returning the stored identity.
    pub fn router(&self, id: &str) -> Result<&RouterId, TopologyError> {
        self.router_index
            .get(id)
            .map(|&index| &self.graph[index])
            .ok_or_else(|| TopologyError::UnknownRouter(id.to_string()))
    }

    /// All routers, sorted by ID.
    pub fn routers(&self) -> Vec<&RouterId> {
        let mut routers: Vec<&RouterId> = self.graph.node_weights().collect();
        routers.sort();
        routers
    }

    /// All links, sorted by key.
    pub fn links(&self) -> Vec<Link> {
        let mut links: Vec<Link> = self
            .graph
            .edge_references()
            .map(|edge| {
                Link::new(
                    self.graph[edge.source()].clone(),
                    self.graph[edge.target()].clone(),
                    *edge.weight(),
                )
            })
            .collect();
        links.sort_by(|x, y| x.key.cmp(&y.key));
        links
    }

    /// Neighbors of `id` with the cost of the connecting link, sorted by neighbor ID.
    /// An unknown router has no neighbors.
    pub fn neighbors(&self, id: &str) -> Vec<(&RouterId, u32)> {
        let Some(&index) = self.router_index.get(id) else {
            return Vec::new();
        };
        let mut neighbors: Vec<(&RouterId, u32)> = self
            .graph
            .edges(index)
            .map(|edge| {
                let other = if edge.source() == index { edge.target() } else { edge.source() };
                (&self.graph[other], *edge.weight())
            })
            .collect();
        neighbors.sort_by(|x, y| x.0.cmp(y.0));
        neighbors
    }

    /// Cost of the link between `a` and `b`, if they are linked.
    pub fn link_cost(&self, a: &str, b: &str) -> Option<u32> {
        let (&ia, &ib) = (self.router_index.get(a)?, self.router_index.get(b)?);
        self.graph.find_edge(ia, ib).map(|edge| self.graph[edge])
    }

    /// Adds an isolated router. Returns `false` if it was already present.
    pub fn add_router(&mut self, raw: &str) -> Result<bool, TopologyError> {
        let id = RouterId::parse(raw).ok_or_else(|| TopologyError::InvalidRouter(raw.to_string()))?;
        if self.router_index.contains_key(&id) {
            return Ok(false);
        }
        debug!(router = %id, "adding router");
        self.ensure_router(id);
        Ok(true)
    }

    /// Adds a link, creating missing routers. Fails on self-links and on pairs
    /// that are already linked. In hop-count mode the cost is forced to 1.
    pub fn add_link(&mut self, a: &str, b: &str, cost: u32) -> Result<(), TopologyError> {
        let key = Self::validate_pair(a, b)?;
        if let Some(existing_cost) = self.link_cost(key.a.as_str(), key.b.as_str()) {
            return Err(TopologyError::DuplicateLink { key, existing_cost });
        }
        self.insert_link(key, cost);
        Ok(())
    }

    /// Adds a link, or replaces the cost of an existing one (the costs are not summed).
    /// Returns the previous cost when a link was updated.
    pub fn upsert_link(&mut self, a: &str, b: &str, cost: u32) -> Result<Option<u32>, TopologyError> {
        let key = Self::validate_pair(a, b)?;
        let cost = self.mode.effective_cost(cost);
        let existing = match (self.router_index.get(&key.a), self.router_index.get(&key.b)) {
            (Some(&ia), Some(&ib)) => self.graph.find_edge(ia, ib),
            _ => None,
        };
        match existing {
            Some(edge) => {
                let previous = std::mem::replace(&mut self.graph[edge], cost);
                debug!(a = %key.a, b = %key.b, previous, cost, "updated link cost");
                Ok(Some(previous))
            }
            None => {
                self.insert_link(key, cost);
                Ok(None)
            }
        }
    }

    /// Adds a link, resolving an existing pair according to `policy`.
    pub fn add_link_with(
        &mut self,
        a: &str,
        b: &str,
        cost: u32,
        policy: DuplicatePolicy,
    ) -> Result<Option<u32>, TopologyError> {
        match policy {
            DuplicatePolicy::Reject => self.add_link(a, b, cost).map(|_| None),
            DuplicatePolicy::Update => self.upsert_link(a, b, cost),
        }
    }

    /// Removes the link between `a` and `b`, returning its cost. Both routers stay.
    pub fn remove_link(&mut self, a: &str, b: &str) -> Result<u32, TopologyError> {
        let key = Self::validate_pair(a, b)?;
        let edge = match (self.router_index.get(&key.a), self.router_index.get(&key.b)) {
            (Some(&ia), Some(&ib)) => self.graph.find_edge(ia, ib),
            _ => None,
        };
        let edge = edge.ok_or_else(|| TopologyError::UnknownLink(key.clone()))?;
        let cost = self
            .graph
            .remove_edge(edge)
            .ok_or_else(|| TopologyError::UnknownLink(key.clone()))?;
        debug!(a = %key.a, b = %key.b, cost, "removed link");
        Ok(cost)
    }

    /// Clears all routers and links. The link mode is kept.
    pub fn reset(&mut self) {
        info!(routers = self.router_count(), links = self.link_count(), "topology cleared");
        self.graph.clear();
        self.router_index.clear();
    }

    pub(crate) fn validate_pair(a: &str, b: &str) -> Result<LinkKey, TopologyError> {
        let a_id = RouterId::parse(a).ok_or_else(|| TopologyError::InvalidRouter(a.to_string()))?;
        let b_id = RouterId::parse(b).ok_or_else(|| TopologyError::InvalidRouter(b.to_string()))?;
        let key = LinkKey::new(a_id, b_id);
        if key.is_self_link() {
            return Err(TopologyError::InvalidLink(key.a));
        }
        Ok(key)
    }

    fn insert_link(&mut self, key: LinkKey, cost: u32) {
        let cost = self.mode.effective_cost(cost);
        let ia = self.ensure_router(key.a.clone());
        let ib = self.ensure_router(key.b.clone());
        debug!(a = %key.a, b = %key.b, cost, "adding link");
        self.graph.add_edge(ia, ib, cost);
    }

    fn ensure_router(&mut self, id: RouterId) -> NodeIndex {
        if let Some(&index) = self.router_index.get(&id) {
            return index;
        }
        let index = self.graph.add_node(id.clone());
        self.router_index.insert(id, index);
        index
    }
}

/// Plain serde form of a topology, used for fixtures and snapshots.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct TopologySnapshot {
    #[serde(default)]
    pub mode: LinkMode,
    #[serde(default)]
    pub routers: Vec<RouterId>,
    #[serde(default)]
    pub links: Vec<Link>,
}

impl From<Topology> for TopologySnapshot {
    fn from(topology: Topology) -> Self {
        TopologySnapshot {
            mode: topology.mode,
            routers: topology.routers().into_iter().cloned().collect(),
            links: topology.links(),
        }
    }
}

impl TryFrom<TopologySnapshot> for Topology {
    type Error = TopologyError;

    fn try_from(snapshot: TopologySnapshot) -> Result<Self, Self::Error> {
        let mut topology = Topology::new(snapshot.mode);
        for router in &snapshot.routers {
            topology.add_router(router.as_str())?;
        }
        for link in &snapshot.links {
            topology.add_link(link.key.a.as_str(), link.key.b.as_str(), link.cost)?;
        }
        Ok(topology)
    }
}
