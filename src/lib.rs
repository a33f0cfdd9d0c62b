/*!
Routing-table engines for a classroom routing visualizer.

A [`network::Topology`] holds routers and symmetric weighted links. Three
engines compute routing tables from it: RIP-like distance vector
([`routing::distance_vector`]), OSPF-like link state ([`routing::link_state`])
and an EIGRP-like diffusing computation ([`routing::diffusing`]). Tables come
back as immutable [`routing::RoutingTable`] snapshots that a front end can
render or export with [`parsers::table_csv`].
*/

pub mod config;
pub mod logging;
pub mod network;
pub mod parsers;
pub mod routing;
