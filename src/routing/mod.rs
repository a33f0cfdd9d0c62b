/*
 * Routing engines. Each one turns a `Topology` into a `RoutingTable`:
 * distance vector by synchronous rounds, link state by Dijkstra and the
 * diffusing engine by relaxing a full distance matrix.
 */

use thiserror::Error;

pub mod table;
pub mod distance_vector;
pub mod link_state;
pub mod diffusing;
pub mod protocol;

pub use protocol::{Protocol, ProtocolParseError, RoutingEngine};
pub use table::{Cost, RoundDiff, RouteEntry, RouteState, RoutingTable, TableRow};

#[derive(Debug, Clone, Error)]
pub enum RoutingError {
    #[error("Router {0} is not part of the topology")]
    UnknownRouter(String),
    #[error("Routing did not converge after {rounds} rounds")]
    NonConvergence {
        rounds: usize,
        /// Table as it stood when the engine gave up.
        last_table: Box<RoutingTable>,
    },
}
