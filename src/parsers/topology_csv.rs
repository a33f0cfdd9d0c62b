/*!
Topology import from CSV.

The expected header is `source,target,cost`; the cost column may be missing
entirely or left empty on a row, in which case the link costs 1. Short rows are
accepted by the reader and reported by the bulk loader as missing fields.
*/

use std::{io, path::Path};

use thiserror::Error;
use tracing::info;

use crate::network::{
    bulk::{BulkLoadError, ImportPolicy, ImportReport, LinkRow},
    link::LinkMode,
    topology::{DuplicatePolicy, Topology},
};

#[derive(Debug, Error)]
pub enum ImportError {
    #[error("Failed to read topology CSV: {0}")]
    Csv(#[from] csv::Error),
    #[error(transparent)]
    Rejected(#[from] BulkLoadError),
}

fn reader_builder() -> csv::ReaderBuilder {
    let mut builder = csv::ReaderBuilder::new();
    builder.has_headers(true).flexible(true).trim(csv::Trim::All);
    builder
}

fn collect_rows<R: io::Read>(mut reader: csv::Reader<R>) -> Result<Vec<LinkRow>, ImportError> {
    let mut rows = Vec::new();
    for record in reader.deserialize() {
        let row: LinkRow = record?;
        rows.push(row);
    }
    Ok(rows)
}

/// Reads every data row. Field validation is left to `Topology::bulk_load`.
pub fn read_rows<R: io::Read>(reader: R) -> Result<Vec<LinkRow>, ImportError> {
    collect_rows(reader_builder().from_reader(reader))
}

/// Reads rows from `reader` and loads them into `topology`.
pub fn import<R: io::Read>(
    reader: R,
    topology: &mut Topology,
    policy: ImportPolicy,
    duplicates: DuplicatePolicy,
) -> Result<ImportReport, ImportError> {
    let rows = read_rows(reader)?;
    Ok(topology.bulk_load(&rows, policy, duplicates)?)
}

/// Builds a fresh topology from a CSV file.
pub fn load_topology(
    path: impl AsRef<Path>,
    mode: LinkMode,
    policy: ImportPolicy,
    duplicates: DuplicatePolicy,
) -> Result<(Topology, ImportReport), ImportError> {
    let path = path.as_ref();
    let rows = collect_rows(reader_builder().from_path(path)?)?;

    let mut topology = Topology::new(mode);
    let report = topology.bulk_load(&rows, policy, duplicates)?;
    info!(
        path = %path.display(),
        routers = topology.router_count(),
        links = topology.link_count(),
        "topology loaded"
    );
    Ok((topology, report))
}
