use serde::{Deserialize, Serialize};

use crate::network::router::RouterId;

/// How link costs are interpreted by a topology.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LinkMode {
    /// Arbitrary non-negative integer costs (link-state, diffusing).
    #[default]
    Weighted,
    /// Every link costs one hop, whatever cost was supplied (distance-vector).
    HopCount,
}

impl LinkMode {
    /// The cost actually stored for a link submitted with `requested`.
    pub fn effective_cost(&self, requested: u32) -> u32 {
        match self {
            LinkMode::Weighted => requested,
            LinkMode::HopCount => 1,
        }
    }
}

/// Unordered pair of router IDs. `a` is always the lexicographically smaller end.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct LinkKey {
    pub a: RouterId,
    pub b: RouterId,
}

impl LinkKey {
    pub fn new(a: RouterId, b: RouterId) -> Self {
        let (a, b) = if a <= b { (a, b) } else { (b, a) };
        LinkKey { a, b }
    }

    pub fn is_self_link(&self) -> bool {
        self.a == self.b
    }
}

/// A symmetric link between two routers.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Link {
    pub key: LinkKey,
    pub cost: u32,
}

impl Link {
    pub fn new(a: RouterId, b: RouterId, cost: u32) -> Self {
        Link { key: LinkKey::new(a, b), cost }
    }
}
