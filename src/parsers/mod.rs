/*
 * CSV collaborators around the core: topology import and routing table export.
 */

pub mod table_csv;
pub mod topology_csv;

pub use table_csv::{export_table, to_csv_string, write_table};
pub use topology_csv::{ImportError, import, load_topology, read_rows};
