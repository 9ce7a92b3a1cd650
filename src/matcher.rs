//! Row alignment between a primary and a secondary dataset.
//!
//! Secondary rows are indexed by composite key up front. Each primary row, in
//! dataset order, claims at most one unconsumed secondary row with the same
//! key: the candidate with the fewest differing cells, the earliest one on a
//! tie. Consumption is tracked with a marker per secondary row, so the
//! secondary dataset itself is never mutated.

use std::collections::{BTreeSet, HashMap};

use log::{debug, warn};
use serde::Serialize;

use crate::{
    dataset::{Dataset, Row},
    diff::diff_rows,
    error::SchemaError,
    key::KeyGenerator,
};

/// Classification of one primary row. Indices refer to rows of the datasets
/// passed to the matcher.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum MatchRecord {
    Exact {
        primary: usize,
        secondary: usize,
    },
    Partial {
        primary: usize,
        secondary: usize,
        differing: BTreeSet<usize>,
    },
    Unmatched {
        primary: usize,
    },
}

impl MatchRecord {
    pub fn primary(&self) -> usize {
        match self {
            MatchRecord::Exact { primary, .. }
            | MatchRecord::Partial { primary, .. }
            | MatchRecord::Unmatched { primary } => *primary,
        }
    }

    pub fn secondary(&self) -> Option<usize> {
        match self {
            MatchRecord::Exact { secondary, .. } | MatchRecord::Partial { secondary, .. } => {
                Some(*secondary)
            }
            MatchRecord::Unmatched { .. } => None,
        }
    }

    /// Differing column positions of a partial match.
    pub fn differing(&self) -> Option<&BTreeSet<usize>> {
        match self {
            MatchRecord::Partial { differing, .. } => Some(differing),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum MatchWarning {
    /// Several unconsumed secondary rows shared the key of a primary row.
    AmbiguousKey {
        key: String,
        primary: usize,
        candidates: Vec<usize>,
        chosen: usize,
    },
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct MatchResult {
    /// One record per primary row, in primary order.
    pub records: Vec<MatchRecord>,
    /// Secondary rows never consumed, in secondary order.
    pub unmatched_secondary: Vec<usize>,
    pub warnings: Vec<MatchWarning>,
}

impl MatchResult {
    pub fn exact(&self) -> impl Iterator<Item = &MatchRecord> {
        self.records
            .iter()
            .filter(|r| matches!(r, MatchRecord::Exact { .. }))
    }

    pub fn partial(&self) -> impl Iterator<Item = &MatchRecord> {
        self.records
            .iter()
            .filter(|r| matches!(r, MatchRecord::Partial { .. }))
    }

    pub fn unmatched_primary(&self) -> impl Iterator<Item = usize> + '_ {
        self.records.iter().filter_map(|r| match r {
            MatchRecord::Unmatched { primary } => Some(*primary),
            _ => None,
        })
    }

    pub fn exact_count(&self) -> usize {
        self.exact().count()
    }

    pub fn partial_count(&self) -> usize {
        self.partial().count()
    }

    pub fn unmatched_primary_count(&self) -> usize {
        self.unmatched_primary().count()
    }
}

/// Matches two reconciled datasets on the composite key built from
/// `key_columns`, comparing every column position.
///
/// Fails before any matching work if a key column is absent on either side.
pub fn match_datasets(
    primary: &Dataset,
    secondary: &Dataset,
    key_columns: &[String],
) -> Result<MatchResult, SchemaError> {
    let primary_keys = KeyGenerator::for_dataset(primary, key_columns)?;
    let secondary_keys = KeyGenerator::for_dataset(secondary, key_columns)?;
    let columns = (0..primary.columns().len()).collect::<Vec<_>>();
    Ok(match_rows(
        primary.rows(),
        secondary.rows(),
        &columns,
        |row| primary_keys.key(row),
        |row| secondary_keys.key(row),
    ))
}

/// Key-function form of the matcher used by [`match_datasets`].
pub fn match_rows<P, S>(
    primary: &[Row],
    secondary: &[Row],
    columns: &[usize],
    primary_key: P,
    secondary_key: S,
) -> MatchResult
where
    P: Fn(&Row) -> String,
    S: Fn(&Row) -> String,
{
    let mut index: HashMap<String, Vec<usize>> = HashMap::new();
    for (idx, row) in secondary.iter().enumerate() {
        index.entry(secondary_key(row)).or_default().push(idx);
    }
    let mut consumed = vec![false; secondary.len()];
    let mut result = MatchResult {
        records: Vec::with_capacity(primary.len()),
        ..MatchResult::default()
    };

    for (p_idx, row) in primary.iter().enumerate() {
        let key = primary_key(row);
        let candidates = index
            .get(&key)
            .map(|rows| {
                rows.iter()
                    .copied()
                    .filter(|&s_idx| !consumed[s_idx])
                    .collect::<Vec<_>>()
            })
            .unwrap_or_default();

        let mut best: Option<(usize, BTreeSet<usize>)> = None;
        for &s_idx in &candidates {
            let differing = diff_rows(row, &secondary[s_idx], columns);
            let better = match &best {
                Some((_, current)) => differing.len() < current.len(),
                None => true,
            };
            if better {
                let exact = differing.is_empty();
                best = Some((s_idx, differing));
                if exact {
                    break;
                }
            }
        }

        let record = match best {
            None => {
                debug!("Primary row {} (key '{key}') has no candidate", row.line);
                MatchRecord::Unmatched { primary: p_idx }
            }
            Some((s_idx, differing)) => {
                consumed[s_idx] = true;
                if candidates.len() > 1 {
                    warn!(
                        "Key '{key}' of primary row {} matched {} secondary rows; kept row {}",
                        row.line,
                        candidates.len(),
                        secondary[s_idx].line
                    );
                    result.warnings.push(MatchWarning::AmbiguousKey {
                        key: key.clone(),
                        primary: p_idx,
                        candidates: candidates.clone(),
                        chosen: s_idx,
                    });
                }
                debug!(
                    "Primary row {} matched secondary row {} with {} differing cell(s)",
                    row.line,
                    secondary[s_idx].line,
                    differing.len()
                );
                if differing.is_empty() {
                    MatchRecord::Exact {
                        primary: p_idx,
                        secondary: s_idx,
                    }
                } else {
                    MatchRecord::Partial {
                        primary: p_idx,
                        secondary: s_idx,
                        differing,
                    }
                }
            }
        };
        result.records.push(record);
    }

    result.unmatched_secondary = consumed
        .iter()
        .enumerate()
        .filter(|(_, used)| !**used)
        .map(|(idx, _)| idx)
        .collect();
    result
}
