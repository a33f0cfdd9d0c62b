/*!
This module ties a protocol name to its engine, so callers can pick one at runtime.
*/

use std::{fmt::Display, str::FromStr};

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::{
    config::EngineConfig,
    network::{link::LinkMode, topology::Topology},
    routing::{
        RoutingError, diffusing, distance_vector, link_state,
        table::RoutingTable,
    },
};

#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("Unsupported protocol '{0}', expected rip, ospf or eigrp")]
pub struct ProtocolParseError(pub String);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Protocol {
    DistanceVector,
    LinkState,
    Diffusing,
}

impl Protocol {
    pub const ALL: [Protocol; 3] = [Protocol::DistanceVector, Protocol::LinkState, Protocol::Diffusing];

    /// Distance vector counts hops; the other two use link costs.
    pub fn link_mode(&self) -> LinkMode {
        match self {
            Protocol::DistanceVector => LinkMode::HopCount,
            Protocol::LinkState | Protocol::Diffusing => LinkMode::Weighted,
        }
    }

    pub fn engine(&self, config: &EngineConfig) -> Box<dyn RoutingEngine> {
        match self {
            Protocol::DistanceVector => Box::new(DistanceVectorEngine::new(config.clone())),
            Protocol::LinkState => Box::new(LinkStateEngine),
            Protocol::Diffusing => Box::new(DiffusingEngine::new(config.clone())),
        }
    }
}

impl FromStr for Protocol {
    type Err = ProtocolParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "rip" | "dv" | "distance-vector" | "distance_vector" => Ok(Protocol::DistanceVector),
            "ospf" | "ls" | "link-state" | "link_state" => Ok(Protocol::LinkState),
            "eigrp" | "diffusing" => Ok(Protocol::Diffusing),
            _ => Err(ProtocolParseError(s.to_string())),
        }
    }
}

impl Display for Protocol {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            Protocol::DistanceVector => "rip",
            Protocol::LinkState => "ospf",
            Protocol::Diffusing => "eigrp",
        };
        write!(f, "{name}")
    }
}

/// A routing engine computing the table seen from one router.
pub trait RoutingEngine: Send + Sync {
    fn protocol(&self) -> Protocol;
    /// Computes the table for `local`. Link state and diffusing return the
    /// local row only; distance vector returns every router's row.
    fn compute(&self, topology: &Topology, local: &str) -> Result<RoutingTable, RoutingError>;
}

pub struct DistanceVectorEngine {
    config: EngineConfig,
}

impl DistanceVectorEngine {
    pub fn new(config: EngineConfig) -> Self {
        Self { config }
    }
}

impl RoutingEngine for DistanceVectorEngine {
    fn protocol(&self) -> Protocol {
        Protocol::DistanceVector
    }

    fn compute(&self, topology: &Topology, local: &str) -> Result<RoutingTable, RoutingError> {
        if !topology.contains(local) {
            return Err(RoutingError::UnknownRouter(local.to_string()));
        }
        let initial = RoutingTable::initialize(topology);
        Ok(distance_vector::converge(topology, &initial, &self.config)?.table)
    }
}

pub struct LinkStateEngine;

impl RoutingEngine for LinkStateEngine {
    fn protocol(&self) -> Protocol {
        Protocol::LinkState
    }

    fn compute(&self, topology: &Topology, local: &str) -> Result<RoutingTable, RoutingError> {
        link_state::compute_table(topology, local)
    }
}

pub struct DiffusingEngine {
    config: EngineConfig,
}

impl DiffusingEngine {
    pub fn new(config: EngineConfig) -> Self {
        Self { config }
    }
}

impl RoutingEngine for DiffusingEngine {
    fn protocol(&self) -> Protocol {
        Protocol::Diffusing
    }

    fn compute(&self, topology: &Topology, local: &str) -> Result<RoutingTable, RoutingError> {
        diffusing::compute_table(topology, local, self.config.max_sweeps)
    }
}
