//! Expected test data: per-product price statistics derived from a flat file.

use std::{collections::HashMap, path::Path};

use anyhow::{Context, Result};
use itertools::Itertools;
use log::info;
use serde::Serialize;

use crate::{
    cli::ExpectedArgs,
    compare::dataset_label,
    config::split_list,
    data::{Cell, CellParser, Value},
    dataset::Dataset,
    error::SchemaError,
    io_utils,
    loader::{LoadOptions, load_dataset},
    report,
};

#[derive(Debug, Clone)]
pub struct ExpectedOptions {
    pub name_column: String,
    pub price_column: String,
    /// Columns copied from the first row of each group, also used for ordering.
    pub carry_columns: Vec<String>,
}

impl Default for ExpectedOptions {
    fn default() -> Self {
        Self {
            name_column: "Product_Service_SKU_Name_Normalized".to_string(),
            price_column: "Unit Price".to_string(),
            carry_columns: vec!["Level 5 Category".to_string(), "UOM".to_string()],
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PricePoint {
    pub name: String,
    pub carried: Vec<Cell>,
    pub price_points: usize,
    pub low_price: f64,
    pub percentile_25: f64,
    pub avg_price: f64,
}

/// Linear-interpolated percentile of `sorted` (ascending, non-empty).
pub fn percentile(sorted: &[f64], pct: f64) -> f64 {
    if sorted.len() == 1 {
        return sorted[0];
    }
    let rank = pct / 100.0 * (sorted.len() - 1) as f64;
    let lower = rank.floor() as usize;
    let upper = rank.ceil() as usize;
    let weight = rank - lower as f64;
    sorted[lower] + (sorted[upper] - sorted[lower]) * weight
}

fn price_of(value: Option<&Value>) -> Option<f64> {
    value
        .and_then(Value::as_f64)
        .filter(|price| *price != 0.0 && price.is_finite())
}

pub fn derive_price_points(
    data: &Dataset,
    options: &ExpectedOptions,
) -> Result<Vec<PricePoint>, SchemaError> {
    let name_pos = data.require_column(&options.name_column)?;
    let price_pos = data.require_column(&options.price_column)?;
    let carry_pos = options
        .carry_columns
        .iter()
        .map(|c| data.require_column(c))
        .collect::<Result<Vec<_>, _>>()?;

    let mut groups: HashMap<String, (Vec<Cell>, Vec<f64>)> = HashMap::new();
    let mut dropped = 0usize;
    for row in data.rows() {
        let (Some(name), Some(price)) = (row.cell(name_pos), price_of(row.cell(price_pos))) else {
            dropped += 1;
            continue;
        };
        groups
            .entry(name.as_display())
            .or_insert_with(|| {
                let carried = carry_pos.iter().map(|&p| row.cell(p).cloned()).collect();
                (carried, Vec::new())
            })
            .1
            .push(price);
    }
    if dropped > 0 {
        info!("Dropped {dropped} row(s) with a null name or a zero/null price");
    }

    let points = groups
        .into_iter()
        .map(|(name, (carried, mut prices))| {
            prices.sort_by(f64::total_cmp);
            let avg = prices.iter().sum::<f64>() / prices.len() as f64;
            PricePoint {
                name,
                carried,
                price_points: prices.len(),
                low_price: prices[0],
                percentile_25: percentile(&prices, 25.0),
                avg_price: avg,
            }
        })
        .sorted_by_cached_key(|point| {
            let mut key = point
                .carried
                .iter()
                .map(|c| c.as_ref().map(|v| v.as_display().to_lowercase()).unwrap_or_default())
                .collect::<Vec<_>>();
            key.push(point.name.to_lowercase());
            key
        })
        .collect();
    Ok(points)
}

pub fn headers(options: &ExpectedOptions) -> Vec<String> {
    let mut headers = options.carry_columns.clone();
    headers.push(options.name_column.clone());
    headers.extend(
        ["No_of_price_points", "Low_Price", "Percentile_25th", "Avg_Price"]
            .iter()
            .map(|h| h.to_string()),
    );
    headers
}

fn to_cells(point: &PricePoint) -> Vec<Cell> {
    let mut cells = point.carried.clone();
    cells.push(Some(Value::String(point.name.clone())));
    cells.push(Some(Value::Integer(point.price_points as i64)));
    cells.push(Some(Value::Float(point.low_price)));
    cells.push(Some(Value::Float(point.percentile_25)));
    cells.push(Some(Value::Float(point.avg_price)));
    cells
}

/// Writes `.xlsx` through the report writer, anything else as CSV.
pub fn write_price_points(
    path: &Path,
    options: &ExpectedOptions,
    points: &[PricePoint],
) -> Result<()> {
    let headers = headers(options);
    let rows = points.iter().map(to_cells).collect::<Vec<_>>();
    if io_utils::is_xlsx_output(path) {
        report::write_table_workbook(path, "Expected_Data", &headers, &rows)?;
    } else {
        let delimiter = io_utils::resolve_input_delimiter(path, None);
        let mut writer = io_utils::open_csv_writer(path, delimiter)?;
        writer.write_record(&headers)?;
        for row in &rows {
            writer.write_record(
                row.iter()
                    .map(|c| c.as_ref().map(Value::as_display).unwrap_or_default()),
            )?;
        }
        writer
            .flush()
            .with_context(|| format!("Flushing output {path:?}"))?;
    }
    info!("Wrote {} price point row(s) to {path:?}", points.len());
    Ok(())
}

pub fn execute(args: &ExpectedArgs) -> Result<()> {
    let load_options = LoadOptions {
        delimiter: args.input.delimiter,
        encoding: args.input.input_encoding.clone(),
        sheet: args.input.sheet.clone(),
        parser: CellParser::default(),
    };
    let data = load_dataset(
        &args.input_path,
        &dataset_label(&args.input_path, "flat file"),
        &load_options,
    )
    .with_context(|| format!("Loading flat file {:?}", args.input_path))?;

    let carry = split_list(&args.carry);
    let options = ExpectedOptions {
        name_column: args.name_column.clone(),
        price_column: args.price_column.clone(),
        carry_columns: if carry.is_empty() {
            ExpectedOptions::default().carry_columns
        } else {
            carry
        },
    };
    let points = derive_price_points(&data, &options)?;
    info!(
        "Derived {} product(s) from {} row(s)",
        points.len(),
        data.len()
    );
    write_price_points(&args.output, &options, &points)
}
