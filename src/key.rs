//! Composite key derivation.

use log::debug;

use crate::{
    dataset::{Dataset, Row},
    error::SchemaError,
};

/// Reduces arbitrary text to the lower-case ASCII alphanumerics used in keys.
pub fn normalize_key_text(text: &str) -> String {
    text.chars()
        .filter(|c| c.is_ascii_alphanumeric())
        .map(|c| c.to_ascii_lowercase())
        .collect()
}

/// Key columns resolved to positions in one dataset's schema.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct KeyGenerator {
    columns: Vec<String>,
    positions: Vec<usize>,
}

impl KeyGenerator {
    pub fn for_dataset(dataset: &Dataset, key_columns: &[String]) -> Result<Self, SchemaError> {
        if key_columns.is_empty() {
            return Err(SchemaError::EmptyKeyColumns);
        }
        let positions = key_columns
            .iter()
            .map(|column| dataset.require_column(column))
            .collect::<Result<Vec<_>, _>>()?;
        debug!(
            "Key columns {:?} resolved to positions {:?} in {}",
            key_columns,
            positions,
            dataset.name()
        );
        Ok(Self {
            columns: key_columns.to_vec(),
            positions,
        })
    }

    pub fn columns(&self) -> &[String] {
        &self.columns
    }

    pub fn positions(&self) -> &[usize] {
        &self.positions
    }

    pub fn key(&self, row: &Row) -> String {
        let mut raw = String::new();
        for &position in &self.positions {
            if let Some(value) = row.cell(position) {
                raw.push_str(&value.as_display());
            }
        }
        normalize_key_text(&raw)
    }
}

/// Derives the composite key of `row` in `dataset` for `key_columns`.
pub fn generate_key(
    dataset: &Dataset,
    row: &Row,
    key_columns: &[String],
) -> Result<String, SchemaError> {
    Ok(KeyGenerator::for_dataset(dataset, key_columns)?.key(row))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::Value;

    fn sample() -> Dataset {
        let headers = ["File_Name", "SKU", "UOM", "Price"]
            .iter()
            .map(|h| h.to_string())
            .collect::<Vec<_>>();
        let rows = vec![
            Row::new(
                2,
                vec![
                    Some(Value::String("Invoice-01.pdf".into())),
                    Some(Value::String("Bin Lift (3yd)".into())),
                    None,
                    Some(Value::Float(12.5)),
                ],
            ),
            Row::new(
                3,
                vec![
                    Some(Value::String("invoice 01 pdf".into())),
                    Some(Value::String("BIN LIFT 3YD".into())),
                    None,
                    Some(Value::Float(99.0)),
                ],
            ),
        ];
        Dataset::new("pipeline", &headers, rows).unwrap()
    }

    fn keys() -> Vec<String> {
        vec!["File_Name".into(), "SKU".into(), "UOM".into()]
    }

    #[test]
    fn key_concatenates_and_strips_non_alphanumerics() {
        let ds = sample();
        let key = generate_key(&ds, &ds.rows()[0], &keys()).unwrap();
        assert_eq!(key, "invoice01pdfbinlift3yd");
    }

    #[test]
    fn rows_differing_outside_key_columns_share_a_key() {
        let ds = sample();
        let generator = KeyGenerator::for_dataset(&ds, &keys()).unwrap();
        assert_eq!(generator.key(&ds.rows()[0]), generator.key(&ds.rows()[1]));
    }

    #[test]
    fn numeric_key_values_use_display_form() {
        let headers = vec!["id".to_string()];
        let ds = Dataset::new(
            "p",
            &headers,
            vec![Row::new(2, vec![Some(Value::Float(5.0))])],
        )
        .unwrap();
        let key = generate_key(&ds, &ds.rows()[0], &headers).unwrap();
        assert_eq!(key, "5");
    }

    #[test]
    fn missing_or_empty_key_columns_fail() {
        let ds = sample();
        assert_eq!(
            KeyGenerator::for_dataset(&ds, &[]).unwrap_err(),
            SchemaError::EmptyKeyColumns
        );
        assert!(matches!(
            KeyGenerator::for_dataset(&ds, &["Vendor".to_string()]),
            Err(SchemaError::MissingColumn { column, .. }) if column == "Vendor"
        ));
    }
}
