//! Routing table export as CSV: one line per (router, destination) pair.

use std::{fs::File, io, path::Path};

use serde::Serialize;

use crate::routing::table::{INFINITY_MARKER, RoutingTable, TableRow};

/// Written in place of a missing next hop.
pub const NO_NEXT_HOP: &str = "-";

#[derive(Debug, Serialize)]
struct ExportRecord<'a> {
    router: &'a str,
    destination: &'a str,
    cost: String,
    next_hop: &'a str,
    state: String,
}

impl<'a> From<&'a TableRow> for ExportRecord<'a> {
    fn from(row: &'a TableRow) -> Self {
        ExportRecord {
            router: row.router.as_str(),
            destination: row.destination.as_str(),
            cost: row.cost.value().map_or_else(|| INFINITY_MARKER.to_string(), |v| v.to_string()),
            next_hop: row.next_hop.as_ref().map_or(NO_NEXT_HOP, |hop| hop.as_str()),
            state: row.state.to_string(),
        }
    }
}

pub fn write_table<W: io::Write>(table: &RoutingTable, writer: W) -> Result<(), csv::Error> {
    let mut writer = csv::Writer::from_writer(writer);
    let rows = table.rows();
    if rows.is_empty() {
        writer.write_record(["router", "destination", "cost", "next_hop", "state"])?;
    }
    for row in &rows {
        writer.serialize(ExportRecord::from(row))?;
    }
    writer.flush()?;
    Ok(())
}

pub fn to_csv_string(table: &RoutingTable) -> Result<String, csv::Error> {
    let mut buffer = Vec::new();
    write_table(table, &mut buffer)?;
    Ok(String::from_utf8_lossy(&buffer).into_owned())
}

pub fn export_table(table: &RoutingTable, path: impl AsRef<Path>) -> Result<(), csv::Error> {
    let file = File::create(path)?;
    write_table(table, file)
}
