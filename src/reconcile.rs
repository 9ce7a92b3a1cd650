//! Column-set alignment between two datasets.
//!
//! After reconciliation both datasets share an identical ordered column set,
//! so position `i` denotes the same field on either side.

use std::collections::HashSet;

use log::warn;
use serde::{Deserialize, Serialize};

use crate::{data::normalize_column_name, dataset::Dataset, error::SchemaError};

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ColumnOrder {
    /// Keep the primary dataset's column order.
    #[default]
    Primary,
    /// Sort by normalized column name.
    Sorted,
}

/// Columns that exist on one side only, ignorable columns excluded.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ColumnDrift {
    pub only_in_primary: Vec<String>,
    pub only_in_secondary: Vec<String>,
}

impl ColumnDrift {
    pub fn is_empty(&self) -> bool {
        self.only_in_primary.is_empty() && self.only_in_secondary.is_empty()
    }
}

#[derive(Debug, Clone)]
pub struct Reconciled {
    pub primary: Dataset,
    pub secondary: Dataset,
    pub drift: ColumnDrift,
}

pub fn reconcile(
    primary: &Dataset,
    secondary: &Dataset,
    ignorable: &[String],
    order: ColumnOrder,
) -> Result<Reconciled, SchemaError> {
    let ignorable = ignorable
        .iter()
        .map(|name| normalize_column_name(name))
        .collect::<HashSet<_>>();
    let secondary_names = secondary
        .columns()
        .iter()
        .map(|c| c.normalized.as_str())
        .collect::<HashSet<_>>();
    let primary_names = primary
        .columns()
        .iter()
        .map(|c| c.normalized.as_str())
        .collect::<HashSet<_>>();

    let mut drift = ColumnDrift::default();
    let mut shared = Vec::new();
    for column in primary.columns().iter() {
        if ignorable.contains(&column.normalized) {
            continue;
        }
        if secondary_names.contains(column.normalized.as_str()) {
            shared.push(column);
        } else {
            drift.only_in_primary.push(column.name.clone());
        }
    }
    drift.only_in_secondary = secondary
        .columns()
        .iter()
        .filter(|c| !ignorable.contains(&c.normalized))
        .filter(|c| !primary_names.contains(c.normalized.as_str()))
        .map(|c| c.name.clone())
        .collect();

    if shared.is_empty() {
        return Err(SchemaError::EmptyIntersection {
            primary: primary.name().to_string(),
            secondary: secondary.name().to_string(),
        });
    }
    if order == ColumnOrder::Sorted {
        shared.sort_by(|a, b| a.normalized.cmp(&b.normalized));
    }

    if !drift.only_in_primary.is_empty() {
        warn!(
            "Columns only in {}: {}",
            primary.name(),
            drift.only_in_primary.join(", ")
        );
    }
    if !drift.only_in_secondary.is_empty() {
        warn!(
            "Columns only in {}: {}",
            secondary.name(),
            drift.only_in_secondary.join(", ")
        );
    }

    let names = shared.iter().map(|c| c.name.clone()).collect::<Vec<_>>();
    Ok(Reconciled {
        primary: primary.project(&names)?,
        secondary: secondary.project(&names)?,
        drift,
    })
}
