mod common;

use common::dataset;
use gt_recon::{
    Dataset, MatchRecord, Row, Value, aggregate, diff::diff_rows, generate_key, match_datasets,
};
use proptest::prelude::*;

fn keys() -> Vec<String> {
    vec!["key".to_string()]
}

#[test]
fn identical_rows_match_exactly() {
    let primary = dataset("pipeline", &["key", "price"], &[&["a1", "10"]]);
    let secondary = dataset("truth", &["key", "price"], &[&["a1", "10"]]);
    let result = match_datasets(&primary, &secondary, &keys()).unwrap();
    assert_eq!(
        result.records,
        vec![MatchRecord::Exact {
            primary: 0,
            secondary: 0
        }]
    );
    assert!(result.unmatched_secondary.is_empty());
}

#[test]
fn differing_price_is_a_partial_match() {
    let primary = dataset("pipeline", &["key", "price"], &[&["a1", "10"]]);
    let secondary = dataset("truth", &["key", "price"], &[&["a1", "12"]]);
    let result = match_datasets(&primary, &secondary, &keys()).unwrap();
    let record = &result.records[0];
    assert_eq!(record.secondary(), Some(0));
    assert_eq!(
        record.differing().unwrap().iter().copied().collect::<Vec<_>>(),
        vec![1]
    );
}

#[test]
fn key_without_candidates_leaves_primary_unmatched() {
    let primary = dataset("pipeline", &["key", "price"], &[&["a1", "10"]]);
    let secondary = dataset("truth", &["key", "price"], &[&["b2", "10"]]);
    let before = secondary.clone();
    let result = match_datasets(&primary, &secondary, &keys()).unwrap();
    assert_eq!(result.records, vec![MatchRecord::Unmatched { primary: 0 }]);
    assert_eq!(result.unmatched_secondary, vec![0]);
    assert_eq!(secondary, before);
}

#[test]
fn duplicate_secondary_key_consumes_the_exact_candidate_only() {
    let primary = dataset("pipeline", &["key", "price"], &[&["a1", "10"]]);
    let secondary = dataset("truth", &["key", "price"], &[&["a1", "10"], &["a1", "99"]]);
    let result = match_datasets(&primary, &secondary, &keys()).unwrap();
    assert_eq!(
        result.records,
        vec![MatchRecord::Exact {
            primary: 0,
            secondary: 0
        }]
    );
    assert_eq!(result.unmatched_secondary, vec![1]);
    assert_eq!(result.warnings.len(), 1);
}

#[test]
fn leading_zeros_are_a_real_difference() {
    let primary = dataset("pipeline", &["key", "zip"], &[&["a1", "02134"]]);
    let secondary = dataset("truth", &["key", "zip"], &[&["a1", "2134"]]);
    assert_eq!(primary.rows()[0].cell(1), Some(&Value::String("02134".into())));
    let result = match_datasets(&primary, &secondary, &keys()).unwrap();
    assert_eq!(
        result.records,
        vec![MatchRecord::Partial {
            primary: 0,
            secondary: 0,
            differing: [1].into_iter().collect(),
        }]
    );
}

fn keyed_prices(name: &str, rows: &[Vec<String>]) -> Dataset {
    let cells = rows
        .iter()
        .map(|r| r.iter().map(String::as_str).collect::<Vec<_>>())
        .collect::<Vec<_>>();
    let slices = cells.iter().map(Vec::as_slice).collect::<Vec<_>>();
    dataset(name, &["key", "price"], &slices)
}

#[test]
fn two_price_mismatches_in_ten_rows_give_eighty_percent() {
    let primary_rows = (0..10)
        .map(|i| vec![format!("k{i}"), "10".to_string()])
        .collect::<Vec<_>>();
    let secondary_rows = (0..10)
        .map(|i| vec![format!("k{i}"), if i < 2 { "11" } else { "10" }.to_string()])
        .collect::<Vec<_>>();
    let primary = keyed_prices("pipeline", &primary_rows);
    let secondary = keyed_prices("truth", &secondary_rows);
    let result = match_datasets(&primary, &secondary, &keys()).unwrap();
    let summary = aggregate(&result, &primary, &secondary, None).unwrap();
    assert_eq!(summary.field("price").unwrap().accuracy, Some(80.0));
    assert_eq!(summary.field("key").unwrap().accuracy, Some(100.0));
    assert_eq!(summary.row_accuracy, Some(80.0));
}

#[test]
fn fewer_differences_win_regardless_of_secondary_order() {
    let headers = ["key", "price", "uom", "vendor"];
    let primary = dataset("pipeline", &headers, &[&["a1", "10", "ea", "acme"]]);
    let two_off = ["a1", "11", "kg", "acme"];
    let one_off = ["a1", "10", "kg", "acme"];
    for (rows, expected) in [
        ([&two_off[..], &one_off[..]], 1),
        ([&one_off[..], &two_off[..]], 0),
    ] {
        let secondary = dataset("truth", &headers, &rows);
        let result = match_datasets(&primary, &secondary, &keys()).unwrap();
        assert_eq!(result.records[0].secondary(), Some(expected));
        assert_eq!(result.records[0].differing().map(|d| d.len()), Some(1));
    }
}

#[test]
fn key_ignores_unrelated_columns_and_punctuation() {
    let data = dataset(
        "pipeline",
        &["File_Name", "UOM", "price"],
        &[&["Invoice-01.pdf", "EA", "10"], &["invoice 01.PDF", "ea", "99"]],
    );
    let columns = vec!["File_Name".to_string(), "UOM".to_string()];
    let first = generate_key(&data, &data.rows()[0], &columns).unwrap();
    let second = generate_key(&data, &data.rows()[1], &columns).unwrap();
    assert_eq!(first, "invoice01pdfea");
    assert_eq!(first, second);
}

fn build(name: &str, rows: &[(u8, i64, u8)]) -> Dataset {
    let headers = vec!["key".to_string(), "price".to_string(), "uom".to_string()];
    let rows = rows
        .iter()
        .enumerate()
        .map(|(idx, (key, price, uom))| {
            Row::new(
                idx + 2,
                vec![
                    Some(Value::String(format!("k{key}"))),
                    Some(Value::Integer(*price)),
                    Some(Value::String(format!("u{uom}"))),
                ],
            )
        })
        .collect();
    Dataset::new(name, &headers, rows).unwrap()
}

fn rows_strategy() -> impl Strategy<Value = Vec<(u8, i64, u8)>> {
    prop::collection::vec((0u8..4, 0i64..3, 0u8..2), 0..12)
}

proptest! {
    #[test]
    fn matching_is_deterministic(p in rows_strategy(), s in rows_strategy()) {
        let primary = build("pipeline", &p);
        let secondary = build("truth", &s);
        let first = match_datasets(&primary, &secondary, &keys()).unwrap();
        let second = match_datasets(&primary, &secondary, &keys()).unwrap();
        prop_assert_eq!(first, second);
    }

    #[test]
    fn every_row_is_accounted_for_once(p in rows_strategy(), s in rows_strategy()) {
        let primary = build("pipeline", &p);
        let secondary = build("truth", &s);
        let result = match_datasets(&primary, &secondary, &keys()).unwrap();
        let matched = result.exact_count() + result.partial_count();
        prop_assert_eq!(matched + result.unmatched_primary_count(), primary.len());
        prop_assert_eq!(matched + result.unmatched_secondary.len(), secondary.len());

        let mut claimed = result.records.iter().filter_map(MatchRecord::secondary).collect::<Vec<_>>();
        claimed.sort_unstable();
        claimed.dedup();
        prop_assert_eq!(claimed.len(), matched);
    }

    #[test]
    fn a_row_never_differs_from_itself(p in rows_strategy()) {
        let data = build("pipeline", &p);
        for row in data.rows() {
            prop_assert!(diff_rows(row, row, &[0, 1, 2]).is_empty());
        }
    }
}
