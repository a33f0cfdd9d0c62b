/*
 * This module defines the protocol-agnostic topology the routing engines compute over:
 * router identities, symmetric links, the topology store and its bulk loader.
 */

pub mod router;
pub mod link;
pub mod topology;
pub mod bulk;
pub mod generate;

pub use bulk::{BulkLoadError, ImportPolicy, ImportReport, LinkRow, RowErrorReason, RowValidationError};
pub use link::{Link, LinkKey, LinkMode};
pub use router::RouterId;
pub use topology::{DuplicatePolicy, Topology, TopologyError};
