//! Random connected topologies, for demos and for exercising the engines in tests.

use rand::Rng;

use crate::network::{link::LinkMode, topology::Topology};

/// Shape of a generated topology.
#[derive(Debug, Clone, Copy)]
pub struct RandomTopologySpec {
    pub routers: usize,
    /// Probability of each non-tree pair being linked as well.
    pub extra_link_probability: f64,
    pub max_cost: u32,
    pub mode: LinkMode,
}

impl Default for RandomTopologySpec {
    fn default() -> Self {
        Self {
            routers: 8,
            extra_link_probability: 0.2,
            max_cost: 10,
            mode: LinkMode::Weighted,
        }
    }
}

/// Router name for position `i`, zero padded so lexicographic and numeric order agree.
pub fn router_name(i: usize, total: usize) -> String {
    let width = total.max(1).to_string().len();
    format!("R{:0width$}", i + 1, width = width)
}

/// Builds a connected topology: a random spanning tree plus extra links.
pub fn random_topology<R: Rng + ?Sized>(rng: &mut R, spec: &RandomTopologySpec) -> Topology {
    let mut topology = Topology::new(spec.mode);
    let names: Vec<String> = (0..spec.routers).map(|i| router_name(i, spec.routers)).collect();
    let max_cost = spec.max_cost.max(1);
    let probability = spec.extra_link_probability.clamp(0.0, 1.0);

    if let Some(first) = names.first() {
        // a lone router is still a valid topology
        let _ = topology.add_router(first);
    }

    for i in 1..names.len() {
        let parent = rng.random_range(0..i);
        let cost = rng.random_range(1..=max_cost);
        let _ = topology.add_link(&names[i], &names[parent], cost);
    }

    for i in 0..names.len() {
        for j in (i + 1)..names.len() {
            if topology.link_cost(&names[i], &names[j]).is_some() {
                continue;
            }
            if rng.random_bool(probability) {
                let cost = rng.random_range(1..=max_cost);
                let _ = topology.add_link(&names[i], &names[j], cost);
            }
        }
    }

    topology
}
