//! Field- and file-level accuracy derived from a [`MatchResult`].
//!
//! Accuracy is `100 * (1 - mismatches / total)` rounded to two decimals.
//! Over zero rows the figure is undefined: [`accuracy_percentage`] fails
//! with [`ZeroRowsError`] and the summaries carry `None` for that metric.

use std::collections::{BTreeMap, BTreeSet, HashSet};

use log::warn;
use serde::Serialize;

use crate::{
    data::normalize_column_name,
    dataset::{Dataset, Row},
    diff::normalize_cell,
    error::{SchemaError, ZeroRowsError},
    matcher::{MatchRecord, MatchResult},
};

pub fn accuracy_percentage(
    metric: &str,
    mismatches: usize,
    total: usize,
) -> Result<f64, ZeroRowsError> {
    if total == 0 {
        return Err(ZeroRowsError {
            metric: metric.to_string(),
        });
    }
    let raw = 100.0 * (1.0 - mismatches as f64 / total as f64);
    Ok((raw * 100.0).round() / 100.0)
}

fn defined_accuracy(metric: &str, mismatches: usize, total: usize) -> Option<f64> {
    match accuracy_percentage(metric, mismatches, total) {
        Ok(value) => Some(value),
        Err(err) => {
            warn!("{err}");
            None
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FieldAccuracy {
    pub name: String,
    pub position: usize,
    pub mismatches: usize,
    pub accuracy: Option<f64>,
    pub files_affected: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FileAccuracy {
    pub group: String,
    pub primary_rows: usize,
    pub secondary_rows: usize,
    /// Secondary rows of this group that no primary row claimed.
    pub missing_rows: usize,
    /// Primary rows of this group with no secondary counterpart.
    pub extra_rows: usize,
    /// Primary rows of this group repeating an earlier row's full content.
    pub duplicate_rows: usize,
    /// Mismatch count per field, aligned with [`AccuracySummary::fields`].
    pub field_mismatches: Vec<usize>,
    /// Share of this group's primary rows that matched exactly.
    pub accuracy: Option<f64>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AccuracySummary {
    pub primary_rows: usize,
    pub secondary_rows: usize,
    pub exact: usize,
    pub partial: usize,
    pub unmatched_primary: usize,
    pub unmatched_secondary: usize,
    /// Primary rows whose normalized content repeats an earlier primary row.
    pub duplicate_primary: usize,
    /// Share of primary rows that matched exactly.
    pub row_accuracy: Option<f64>,
    pub fields: Vec<FieldAccuracy>,
    pub files: Vec<FileAccuracy>,
}

#[derive(Default)]
struct GroupTally {
    primary_rows: usize,
    secondary_rows: usize,
    missing_rows: usize,
    extra_rows: usize,
    duplicate_rows: usize,
    imperfect_rows: usize,
    field_mismatches: Vec<usize>,
}

fn group_of(row: &Row, position: usize) -> String {
    row.cell(position).map(|v| v.as_display()).unwrap_or_default()
}

fn tally_for(
    tallies: &mut BTreeMap<String, GroupTally>,
    group: String,
    width: usize,
) -> &mut GroupTally {
    tallies.entry(group).or_insert_with(|| GroupTally {
        field_mismatches: vec![0; width],
        ..GroupTally::default()
    })
}

/// Tallies `result` over the reconciled `primary`/`secondary` pair.
///
/// When `group_column` is given it must exist on both sides; per-file
/// breakdowns are keyed by its display value.
pub fn aggregate(
    result: &MatchResult,
    primary: &Dataset,
    secondary: &Dataset,
    group_column: Option<&str>,
) -> Result<AccuracySummary, SchemaError> {
    let groups = match group_column {
        Some(name) => Some((primary.require_column(name)?, secondary.require_column(name)?)),
        None => None,
    };
    let width = primary.columns().len();
    let mut field_mismatches = vec![0usize; width];
    let mut field_groups: Vec<BTreeSet<String>> = vec![BTreeSet::new(); width];
    let mut tallies: BTreeMap<String, GroupTally> = BTreeMap::new();

    for record in &result.records {
        let row = &primary.rows()[record.primary()];
        let group = groups.map(|(p, _)| group_of(row, p));
        if let Some(differing) = record.differing() {
            for &position in differing {
                if position < width {
                    field_mismatches[position] += 1;
                    if let Some(group) = &group {
                        field_groups[position].insert(group.clone());
                    }
                }
            }
        }
        if let Some(group) = group {
            let tally = tally_for(&mut tallies, group, width);
            tally.primary_rows += 1;
            match record {
                MatchRecord::Exact { .. } => {}
                MatchRecord::Partial { differing, .. } => {
                    tally.imperfect_rows += 1;
                    for &position in differing {
                        if position < width {
                            tally.field_mismatches[position] += 1;
                        }
                    }
                }
                MatchRecord::Unmatched { .. } => {
                    tally.imperfect_rows += 1;
                    tally.extra_rows += 1;
                }
            }
        }
    }

    if let Some((_, s_pos)) = groups {
        for row in secondary.rows() {
            tally_for(&mut tallies, group_of(row, s_pos), width).secondary_rows += 1;
        }
        for &idx in &result.unmatched_secondary {
            let group = group_of(&secondary.rows()[idx], s_pos);
            tally_for(&mut tallies, group, width).missing_rows += 1;
        }
    }

    let mut seen = HashSet::new();
    let mut duplicate_primary = 0usize;
    for row in primary.rows() {
        let content = row
            .cells
            .iter()
            .map(|cell| normalize_cell(cell.as_ref()))
            .collect::<Vec<_>>();
        if !seen.insert(content) {
            duplicate_primary += 1;
            if let Some((p_pos, _)) = groups {
                tally_for(&mut tallies, group_of(row, p_pos), width).duplicate_rows += 1;
            }
        }
    }
    if duplicate_primary > 0 {
        warn!("{duplicate_primary} duplicated row(s) in {}", primary.name());
    }

    let total = primary.len();
    let fields = primary
        .columns()
        .iter()
        .enumerate()
        .map(|(position, column)| FieldAccuracy {
            name: column.name.clone(),
            position,
            mismatches: field_mismatches[position],
            accuracy: defined_accuracy(&column.name, field_mismatches[position], total),
            files_affected: field_groups[position].len(),
        })
        .collect();
    let files = tallies
        .into_iter()
        .map(|(group, tally)| FileAccuracy {
            accuracy: defined_accuracy(&group, tally.imperfect_rows, tally.primary_rows),
            group,
            primary_rows: tally.primary_rows,
            secondary_rows: tally.secondary_rows,
            missing_rows: tally.missing_rows,
            extra_rows: tally.extra_rows,
            duplicate_rows: tally.duplicate_rows,
            field_mismatches: tally.field_mismatches,
        })
        .collect();

    let exact = result.exact_count();
    let partial = result.partial_count();
    let unmatched_primary = result.unmatched_primary_count();
    Ok(AccuracySummary {
        primary_rows: total,
        secondary_rows: secondary.len(),
        exact,
        partial,
        unmatched_primary,
        unmatched_secondary: result.unmatched_secondary.len(),
        duplicate_primary,
        row_accuracy: defined_accuracy("rows", partial + unmatched_primary, total),
        fields,
        files,
    })
}

impl AccuracySummary {
    pub fn field(&self, name: &str) -> Option<&FieldAccuracy> {
        let wanted = normalize_column_name(name);
        self.fields
            .iter()
            .find(|f| normalize_column_name(&f.name) == wanted)
    }

    /// Share of secondary rows that the primary dataset failed to reproduce.
    pub fn missing_accuracy(&self) -> Option<f64> {
        accuracy_percentage("missing rows", self.unmatched_secondary, self.secondary_rows).ok()
    }

    /// Share of primary rows with no secondary counterpart.
    pub fn extra_accuracy(&self) -> Option<f64> {
        accuracy_percentage("extra rows", self.unmatched_primary, self.primary_rows).ok()
    }

    /// Share of primary rows that are not repeats of an earlier row.
    pub fn duplicate_accuracy(&self) -> Option<f64> {
        accuracy_percentage("duplicate rows", self.duplicate_primary, self.primary_rows).ok()
    }

    pub fn files_with_duplicate_rows(&self) -> usize {
        self.files.iter().filter(|f| f.duplicate_rows > 0).count()
    }

    pub fn files_with_missing_rows(&self) -> usize {
        self.files.iter().filter(|f| f.missing_rows > 0).count()
    }

    pub fn files_with_extra_rows(&self) -> usize {
        self.files.iter().filter(|f| f.extra_rows > 0).count()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{data::Value, matcher::match_datasets};

    fn dataset(name: &str, rows: &[(&str, &str, i64)]) -> Dataset {
        let headers = ["file", "sku", "price"]
            .iter()
            .map(|h| h.to_string())
            .collect::<Vec<_>>();
        let rows = rows
            .iter()
            .enumerate()
            .map(|(idx, (file, sku, price))| {
                Row::new(
                    idx + 2,
                    vec![
                        Some(Value::String(file.to_string())),
                        Some(Value::String(sku.to_string())),
                        Some(Value::Integer(*price)),
                    ],
                )
            })
            .collect();
        Dataset::new(name, &headers, rows).unwrap()
    }

    fn keys() -> Vec<String> {
        vec!["file".to_string(), "sku".to_string()]
    }

    #[test]
    fn accuracy_is_rounded_to_two_decimals() {
        assert_eq!(accuracy_percentage("price", 2, 10).unwrap(), 80.0);
        assert_eq!(accuracy_percentage("price", 1, 3).unwrap(), 66.67);
        assert_eq!(accuracy_percentage("price", 0, 7).unwrap(), 100.0);
    }

    #[test]
    fn zero_rows_is_an_error_not_nan() {
        let err = accuracy_percentage("price", 0, 0).unwrap_err();
        assert_eq!(err.metric, "price");
    }

    #[test]
    fn per_field_and_per_file_tallies() {
        let primary = dataset(
            "p",
            &[
                ("f1", "a", 10),
                ("f1", "b", 11),
                ("f2", "c", 12),
                ("f2", "x", 1),
            ],
        );
        let secondary = dataset(
            "s",
            &[
                ("f1", "a", 10),
                ("f1", "b", 99),
                ("f2", "c", 98),
                ("f3", "z", 5),
            ],
        );
        let result = match_datasets(&primary, &secondary, &keys()).unwrap();
        let summary = aggregate(&result, &primary, &secondary, Some("file")).unwrap();

        assert_eq!(summary.exact, 1);
        assert_eq!(summary.partial, 2);
        assert_eq!(summary.unmatched_primary, 1);
        assert_eq!(summary.unmatched_secondary, 1);
        assert_eq!(summary.row_accuracy, Some(25.0));

        let price = summary.field("price").unwrap();
        assert_eq!(price.mismatches, 2);
        assert_eq!(price.accuracy, Some(50.0));
        assert_eq!(price.files_affected, 2);
        assert_eq!(summary.field("sku").unwrap().accuracy, Some(100.0));

        let groups = summary
            .files
            .iter()
            .map(|f| f.group.as_str())
            .collect::<Vec<_>>();
        assert_eq!(groups, vec!["f1", "f2", "f3"]);
        let f2 = &summary.files[1];
        assert_eq!(f2.primary_rows, 2);
        assert_eq!(f2.extra_rows, 1);
        assert_eq!(f2.field_mismatches, vec![0, 0, 1]);
        assert_eq!(f2.accuracy, Some(0.0));
        let f3 = &summary.files[2];
        assert_eq!(f3.missing_rows, 1);
        assert_eq!(f3.accuracy, None);
        assert_eq!(summary.files_with_missing_rows(), 1);
    }

    #[test]
    fn repeated_primary_rows_count_as_duplicates() {
        let primary = dataset(
            "p",
            &[
                ("f1", "a", 10),
                ("F1", " A ", 10),
                ("f1", "a", 11),
                ("f2", "c", 12),
                ("f2", "c", 12),
                ("f2", "c", 12),
            ],
        );
        let secondary = dataset("s", &[("f1", "a", 10), ("f2", "c", 12)]);
        let result = match_datasets(&primary, &secondary, &keys()).unwrap();
        let summary = aggregate(&result, &primary, &secondary, Some("file")).unwrap();

        assert_eq!(summary.duplicate_primary, 3);
        assert_eq!(summary.duplicate_accuracy(), Some(50.0));
        let f2 = summary.files.iter().find(|f| f.group == "f2").unwrap();
        assert_eq!(f2.duplicate_rows, 2);
        assert_eq!(summary.files_with_duplicate_rows(), 2);
    }

    #[test]
    fn empty_primary_reports_undefined_accuracy() {
        let primary = dataset("p", &[]);
        let secondary = dataset("s", &[("f1", "a", 1)]);
        let result = match_datasets(&primary, &secondary, &keys()).unwrap();
        let summary = aggregate(&result, &primary, &secondary, None).unwrap();
        assert!(summary.fields.iter().all(|f| f.accuracy.is_none()));
        assert_eq!(summary.row_accuracy, None);
        assert!(summary.files.is_empty());
    }

    #[test]
    fn missing_group_column_is_a_schema_error() {
        let primary = dataset("p", &[("f1", "a", 1)]);
        let result = match_datasets(&primary, &primary, &keys()).unwrap();
        let err = aggregate(&result, &primary, &primary, Some("File_Name")).unwrap_err();
        assert!(matches!(err, SchemaError::MissingColumn { column, .. } if column == "File_Name"));
    }
}
