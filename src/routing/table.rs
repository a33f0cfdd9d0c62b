/*!
Routing table snapshots shared by all engines.

This module defines:
- `Cost`: a finite non-negative integer or `Infinite` (unreachable).
- `RouteEntry`: cost, next hop and validity of one (router, destination) pair.
- `RoutingTable`: router -> destination -> entry, ordered by router ID.
- `RoundDiff`: the (router, destination) pairs that changed during one round.

Tables are plain values. Engines never modify the table they are given; they
return a new one.
*/

use std::{
    collections::{BTreeMap, BTreeSet},
    fmt::Display,
    ops::Add,
};

use serde::{Deserialize, Serialize};

use crate::network::{router::RouterId, topology::Topology};

/// Text used for an infinite cost in exports and serialized snapshots.
pub const INFINITY_MARKER: &str = "∞";

/// Cost of a route. `Infinite` orders after every finite cost.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Cost {
    Finite(u32),
    Infinite,
}

impl Cost {
    pub const ZERO: Cost = Cost::Finite(0);

    pub fn is_finite(&self) -> bool {
        matches!(self, Cost::Finite(_))
    }

    pub fn is_infinite(&self) -> bool {
        matches!(self, Cost::Infinite)
    }

    pub fn value(&self) -> Option<u32> {
        match self {
            Cost::Finite(v) => Some(*v),
            Cost::Infinite => None,
        }
    }

    /// Adds a link cost. Overflow saturates to `Infinite`.
    pub fn plus(self, link_cost: u32) -> Cost {
        self + Cost::Finite(link_cost)
    }

    /// Turns any finite cost above `ceiling` into `Infinite`.
    pub fn capped(self, ceiling: u32) -> Cost {
        match self {
            Cost::Finite(v) if v > ceiling => Cost::Infinite,
            other => other,
        }
    }
}

impl Add for Cost {
    type Output = Cost;

    fn add(self, rhs: Cost) -> Cost {
        match (self, rhs) {
            (Cost::Finite(a), Cost::Finite(b)) => a.checked_add(b).map_or(Cost::Infinite, Cost::Finite),
            _ => Cost::Infinite,
        }
    }
}

impl From<u32> for Cost {
    fn from(value: u32) -> Self {
        Cost::Finite(value)
    }
}

impl Display for Cost {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Cost::Finite(v) => write!(f, "{v}"),
            Cost::Infinite => write!(f, "{INFINITY_MARKER}"),
        }
    }
}

// Serialized as a plain number, or as the infinity marker string.

impl Serialize for Cost {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: serde::Serializer {
        match self {
            Cost::Finite(v) => serializer.serialize_u32(*v),
            Cost::Infinite => serializer.serialize_str(INFINITY_MARKER),
        }
    }
}

impl<'de> Deserialize<'de> for Cost {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: serde::Deserializer<'de> {
        #[derive(Deserialize)]
        #[serde(untagged)]
        enum Repr {
            Number(u32),
            Text(String),
        }

        match Repr::deserialize(deserializer)? {
            Repr::Number(v) => Ok(Cost::Finite(v)),
            Repr::Text(s) => match s.trim() {
                INFINITY_MARKER | "inf" | "infinity" | "Infinity" => Ok(Cost::Infinite),
                other => other
                    .parse::<u32>()
                    .map(Cost::Finite)
                    .map_err(|_| serde::de::Error::custom(format!("invalid cost: {other:?}"))),
            },
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RouteState {
    Valid,
    /// Poisoned, withdrawn or never learned.
    Invalid,
}

impl Display for RouteState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            RouteState::Valid => write!(f, "valid"),
            RouteState::Invalid => write!(f, "invalid"),
        }
    }
}

/// One routing table entry. Built through the constructors, which keep
/// `Invalid` entries at infinite cost with no next hop.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct RouteEntry {
    pub cost: Cost,
    pub next_hop: Option<RouterId>,
    pub state: RouteState,
}

impl RouteEntry {
    /// The entry a router holds for itself.
    pub fn local(router: &RouterId) -> Self {
        RouteEntry {
            cost: Cost::ZERO,
            next_hop: Some(router.clone()),
            state: RouteState::Valid,
        }
    }

    pub fn via(next_hop: &RouterId, cost: u32) -> Self {
        RouteEntry {
            cost: Cost::Finite(cost),
            next_hop: Some(next_hop.clone()),
            state: RouteState::Valid,
        }
    }

    pub fn unreachable() -> Self {
        RouteEntry {
            cost: Cost::Infinite,
            next_hop: None,
            state: RouteState::Invalid,
        }
    }

    /// `via` for a finite cost with a known next hop, `unreachable` otherwise.
    pub fn from_cost(cost: Cost, next_hop: Option<&RouterId>) -> Self {
        match (cost, next_hop) {
            (Cost::Finite(v), Some(hop)) => RouteEntry::via(hop, v),
            _ => RouteEntry::unreachable(),
        }
    }

    pub fn is_valid(&self) -> bool {
        self.state == RouteState::Valid
    }

    /// Invalid or infinite: a candidate with a finite cost may always replace it.
    pub fn is_unusable(&self) -> bool {
        !self.is_valid() || self.cost.is_infinite()
    }

    /// Checks the entry invariants for the pair (`router`, `destination`).
    pub fn is_consistent(&self, router: &RouterId, destination: &RouterId) -> bool {
        let is_self = router == destination;
        let looks_local = self.cost == Cost::ZERO && self.next_hop.as_ref() == Some(router);
        if is_self != looks_local {
            return false;
        }
        match self.state {
            RouteState::Invalid => self.cost.is_infinite() && self.next_hop.is_none(),
            RouteState::Valid => self.cost.is_finite() && self.next_hop.is_some(),
        }
    }
}

/// A flattened (router, destination) entry, the unit of table export.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TableRow {
    pub router: RouterId,
    pub destination: RouterId,
    pub cost: Cost,
    pub next_hop: Option<RouterId>,
    pub state: RouteState,
}

/// Router -> destination -> entry.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RoutingTable {
    rows: BTreeMap<RouterId, BTreeMap<RouterId, RouteEntry>>,
}

impl RoutingTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Fresh tables for every router: itself at cost 0, direct neighbors at
    /// link cost, everything else unreachable.
    pub fn initialize(topology: &Topology) -> Self {
        let routers = topology.routers();
        let mut table = RoutingTable::new();
        for &router in &routers {
            let mut row = BTreeMap::new();
            for &destination in &routers {
                let entry = if router == destination {
                    RouteEntry::local(router)
                } else {
                    RouteEntry::unreachable()
                };
                row.insert(destination.clone(), entry);
            }
            for (neighbor, cost) in topology.neighbors(router.as_str()) {
                row.insert(neighbor.clone(), RouteEntry::via(neighbor, cost));
            }
            table.rows.insert(router.clone(), row);
        }
        table
    }

    /// Adds placeholder entries (and rows) for routers of `topology` the table
    /// does not know yet. Existing entries are left alone.
    pub fn backfill(&mut self, topology: &Topology) -> usize {
        let routers = topology.routers();
        let mut added = 0;
        for &router in &routers {
            let row = self.rows.entry(router.clone()).or_default();
            for &destination in &routers {
                if !row.contains_key(destination) {
                    let entry = if router == destination {
                        RouteEntry::local(router)
                    } else {
                        RouteEntry::unreachable()
                    };
                    row.insert(destination.clone(), entry);
                    added += 1;
                }
            }
        }
        added
    }

    pub fn insert_row(&mut self, router: RouterId, row: BTreeMap<RouterId, RouteEntry>) {
        self.rows.insert(router, row);
    }

    pub(crate) fn set(&mut self, router: &RouterId, destination: &RouterId, entry: RouteEntry) {
        self.rows
            .entry(router.clone())
            .or_default()
            .insert(destination.clone(), entry);
    }

    pub fn row(&self, router: &str) -> Option<&BTreeMap<RouterId, RouteEntry>> {
        self.rows.get(router)
    }

    pub fn entry(&self, router: &str, destination: &str) -> Option<&RouteEntry> {
        self.rows.get(router)?.get(destination)
    }

    /// Cost from `router` to `destination`; unknown pairs are unreachable.
    pub fn cost(&self, router: &str, destination: &str) -> Cost {
        self.entry(router, destination).map_or(Cost::Infinite, |e| e.cost)
    }

    pub fn next_hop(&self, router: &str, destination: &str) -> Option<&RouterId> {
        self.entry(router, destination)?.next_hop.as_ref()
    }

    pub fn routers(&self) -> impl Iterator<Item = &RouterId> {
        self.rows.keys()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&RouterId, &BTreeMap<RouterId, RouteEntry>)> {
        self.rows.iter()
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// Flattens the table into rows, ordered by router then destination.
    pub fn rows(&self) -> Vec<TableRow> {
        self.rows
            .iter()
            .flat_map(|(router, row)| {
                row.iter().map(move |(destination, entry)| TableRow {
                    router: router.clone(),
                    destination: destination.clone(),
                    cost: entry.cost,
                    next_hop: entry.next_hop.clone(),
                    state: entry.state,
                })
            })
            .collect()
    }
}

/// (router, destination) pairs changed during a round, for highlighting only.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RoundDiff {
    changed: BTreeMap<RouterId, BTreeSet<RouterId>>,
}

impl RoundDiff {
    pub fn record(&mut self, router: &RouterId, destination: &RouterId) {
        self.changed
            .entry(router.clone())
            .or_default()
            .insert(destination.clone());
    }

    pub fn contains(&self, router: &str, destination: &str) -> bool {
        self.changed
            .get(router)
            .is_some_and(|destinations| destinations.contains(destination))
    }

    pub fn changed_for(&self, router: &str) -> Option<&BTreeSet<RouterId>> {
        self.changed.get(router)
    }

    /// Number of changed (router, destination) pairs.
    pub fn len(&self) -> usize {
        self.changed.values().map(BTreeSet::len).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.changed.is_empty()
    }
}
