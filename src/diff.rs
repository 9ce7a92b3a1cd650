//! Cell-level comparison of matched row pairs.

use std::collections::BTreeSet;

use crate::{data::Value, dataset::Row};

/// Comparison form of a cell: display text, trimmed, lower-cased, with runs
/// of whitespace collapsed. Nulls have no comparison form.
pub fn normalize_cell(cell: Option<&Value>) -> Option<String> {
    cell.map(|value| {
        value
            .as_display()
            .split_whitespace()
            .collect::<Vec<_>>()
            .join(" ")
            .to_lowercase()
    })
}

pub fn cells_equal(left: Option<&Value>, right: Option<&Value>) -> bool {
    normalize_cell(left) == normalize_cell(right)
}

/// Positions among `columns` at which `left` and `right` differ.
pub fn diff_rows(left: &Row, right: &Row, columns: &[usize]) -> BTreeSet<usize> {
    columns
        .iter()
        .copied()
        .filter(|&position| !cells_equal(left.cell(position), right.cell(position)))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn row(cells: Vec<Option<Value>>) -> Row {
        Row::new(2, cells)
    }

    #[test]
    fn comparison_ignores_case_and_whitespace() {
        assert!(cells_equal(
            Some(&Value::String("  Bin   Lift ".into())),
            Some(&Value::String("bin lift".into()))
        ));
        assert!(!cells_equal(
            Some(&Value::String("binlift".into())),
            Some(&Value::String("bin lift".into()))
        ));
    }

    #[test]
    fn numbers_and_strings_compare_by_display_form() {
        assert!(cells_equal(
            Some(&Value::Integer(5)),
            Some(&Value::String("5".into()))
        ));
        assert!(cells_equal(Some(&Value::Float(5.0)), Some(&Value::Integer(5))));
        assert!(!cells_equal(Some(&Value::Float(5.5)), Some(&Value::Integer(5))));
    }

    #[test]
    fn null_equals_only_null() {
        assert!(cells_equal(None, None));
        assert!(!cells_equal(None, Some(&Value::String(String::new()))));
        assert!(!cells_equal(Some(&Value::Integer(0)), None));
    }

    #[test]
    fn diff_reports_differing_positions_only() {
        let a = row(vec![
            Some(Value::String("x".into())),
            Some(Value::Integer(10)),
            None,
        ]);
        let b = row(vec![
            Some(Value::String("X".into())),
            Some(Value::Integer(12)),
            Some(Value::String("new".into())),
        ]);
        assert_eq!(diff_rows(&a, &b, &[0, 1, 2]), BTreeSet::from([1, 2]));
        assert_eq!(diff_rows(&a, &b, &[0]), BTreeSet::new());
        assert!(diff_rows(&a, &a, &[0, 1, 2]).is_empty());
    }
}
