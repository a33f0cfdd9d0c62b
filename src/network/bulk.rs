/*!
Bulk loading of links into a topology.

Rows arrive as raw text triples (source, target, optional cost) from an import
collaborator. Every row is validated on its own and produces at most one
`RowValidationError`; whether a batch with bad rows still commits its good rows
is decided by `ImportPolicy`.
*/

use std::collections::HashSet;

use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{info, warn};

use crate::network::{
    link::LinkKey,
    topology::{DuplicatePolicy, Topology, TopologyError},
};

/// Cost used when a row leaves the cost column empty.
pub const DEFAULT_ROW_COST: u32 = 1;

/// One raw (source, target, cost) row.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct LinkRow {
    pub source: Option<String>,
    pub target: Option<String>,
    pub cost: Option<String>,
}

impl LinkRow {
    pub fn new(source: &str, target: &str, cost: Option<&str>) -> Self {
        LinkRow {
            source: Some(source.to_string()),
            target: Some(target.to_string()),
            cost: cost.map(str::to_string),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RowErrorReason {
    #[error("missing field `{0}`")]
    MissingField(&'static str),
    #[error("cost {0:?} is not a number")]
    NonNumericCost(String),
    #[error("cost {0} is negative")]
    NegativeCost(i64),
    #[error("cost {0} is too large")]
    CostOutOfRange(i64),
    #[error("router {0} cannot be linked to itself")]
    SelfLink(String),
    #[error("link {} - {} is a duplicate", .0.a, .0.b)]
    Duplicate(LinkKey),
    #[error("{0}")]
    Rejected(TopologyError),
}

/// A single malformed row. `row` is the 1-based position among the data rows.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("row {row}: {reason}")]
pub struct RowValidationError {
    pub row: usize,
    pub reason: RowErrorReason,
}

/// Whether a batch containing invalid rows commits its valid rows.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ImportPolicy {
    /// Apply every valid row, report the invalid ones.
    #[default]
    CommitValid,
    /// Apply nothing if any row is invalid.
    Atomic,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ImportReport {
    /// Links that did not exist before the import.
    pub added: usize,
    /// Existing links whose cost was replaced.
    pub updated: usize,
    pub errors: Vec<RowValidationError>,
}

impl ImportReport {
    pub fn is_clean(&self) -> bool {
        self.errors.is_empty()
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum BulkLoadError {
    #[error("import rejected: {} invalid row(s)", .0.len())]
    Rejected(Vec<RowValidationError>),
}

struct ValidRow {
    row: usize,
    key: LinkKey,
    cost: u32,
}

impl Topology {
    /// Applies a batch of rows. See `ImportPolicy` for how invalid rows affect the batch
    /// and `DuplicatePolicy` for rows naming an already linked pair.
    pub fn bulk_load(
        &mut self,
        rows: &[LinkRow],
        policy: ImportPolicy,
        duplicates: DuplicatePolicy,
    ) -> Result<ImportReport, BulkLoadError> {
        let mut seen: HashSet<LinkKey> = HashSet::new();
        let mut valid = Vec::with_capacity(rows.len());
        let mut errors = Vec::new();

        for (position, raw) in rows.iter().enumerate() {
            let row = position + 1;
            match self.validate_row(raw, &mut seen, duplicates) {
                Ok((key, cost)) => valid.push(ValidRow { row, key, cost }),
                Err(reason) => {
                    warn!(row, %reason, "invalid topology row");
                    errors.push(RowValidationError { row, reason });
                }
            }
        }

        if policy == ImportPolicy::Atomic && !errors.is_empty() {
            warn!(invalid = errors.len(), "atomic import rejected");
            return Err(BulkLoadError::Rejected(errors));
        }

        let mut report = ImportReport::default();
        for ValidRow { row, key, cost } in valid {
            match self.add_link_with(key.a.as_str(), key.b.as_str(), cost, duplicates) {
                Ok(Some(_)) => report.updated += 1,
                Ok(None) => report.added += 1,
                Err(e) => errors.push(RowValidationError { row, reason: RowErrorReason::Rejected(e) }),
            }
        }
        errors.sort_by_key(|e| e.row);
        report.errors = errors;

        info!(
            added = report.added,
            updated = report.updated,
            invalid = report.errors.len(),
            "bulk load finished"
        );
        Ok(report)
    }

    fn validate_row(
        &self,
        raw: &LinkRow,
        seen: &mut HashSet<LinkKey>,
        duplicates: DuplicatePolicy,
    ) -> Result<(LinkKey, u32), RowErrorReason> {
        let source = non_blank(raw.source.as_deref()).ok_or(RowErrorReason::MissingField("source"))?;
        let target = non_blank(raw.target.as_deref()).ok_or(RowErrorReason::MissingField("target"))?;
        let cost = parse_cost(raw.cost.as_deref())?;

        let key = match Topology::validate_pair(source, target) {
            Ok(key) => key,
            Err(TopologyError::InvalidLink(id)) => return Err(RowErrorReason::SelfLink(id.to_string())),
            Err(e) => return Err(RowErrorReason::Rejected(e)),
        };

        let already_linked = self.link_cost(key.a.as_str(), key.b.as_str()).is_some();
        let repeated = !seen.insert(key.clone());
        if duplicates == DuplicatePolicy::Reject && (already_linked || repeated) {
            return Err(RowErrorReason::Duplicate(key));
        }
        Ok((key, cost))
    }
}

fn non_blank(field: Option<&str>) -> Option<&str> {
    field.map(str::trim).filter(|s| !s.is_empty())
}

fn parse_cost(field: Option<&str>) -> Result<u32, RowErrorReason> {
    let Some(text) = non_blank(field) else {
        return Ok(DEFAULT_ROW_COST);
    };
    let value: i64 = text
        .parse()
        .map_err(|_| RowErrorReason::NonNumericCost(text.to_string()))?;
    if value < 0 {
        return Err(RowErrorReason::NegativeCost(value));
    }
    u32::try_from(value).map_err(|_| RowErrorReason::CostOutOfRange(value))
}
