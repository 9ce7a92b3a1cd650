//! Reads a [`Dataset`] from CSV/TSV text or a spreadsheet workbook.

use std::path::{Path, PathBuf};

use anyhow::{Context, Result, anyhow};
use calamine::{Data, Reader, open_workbook_auto};
use log::{debug, info, warn};

use crate::{
    data::{Cell, CellParser, Value},
    dataset::{Dataset, Row},
    io_utils,
};

#[derive(Debug, Clone, Default)]
pub struct LoadOptions {
    pub delimiter: Option<u8>,
    pub encoding: Option<String>,
    /// Worksheet to read; the first sheet when absent.
    pub sheet: Option<String>,
    pub parser: CellParser,
}

pub fn load_dataset(path: &Path, name: &str, options: &LoadOptions) -> Result<Dataset> {
    let dataset = if io_utils::is_spreadsheet(path) {
        load_workbook(path, name, options)?
    } else {
        load_csv(path, name, options)?
    };
    info!(
        "Loaded {} dataset from {:?}: {} row(s), {} column(s)",
        name,
        path,
        dataset.len(),
        dataset.columns().len()
    );
    Ok(dataset)
}

fn load_csv(path: &Path, name: &str, options: &LoadOptions) -> Result<Dataset> {
    let delimiter = io_utils::resolve_input_delimiter(path, options.delimiter);
    let encoding = io_utils::resolve_encoding(options.encoding.as_deref())?;
    let mut reader = io_utils::open_csv_reader_from_path(path, delimiter)?;
    let headers = io_utils::reader_headers(&mut reader, encoding)
        .with_context(|| format!("Reading headers from {path:?}"))?;
    debug!("Headers of {path:?}: {headers:?}");

    let mut rows = Vec::new();
    let mut record = csv::ByteRecord::new();
    let mut line = 1usize;
    while reader
        .read_byte_record(&mut record)
        .with_context(|| format!("Reading row after line {line} of {path:?}"))?
    {
        line = record
            .position()
            .map_or(line + 1, |position| position.line() as usize);
        let fields = io_utils::decode_record(&record, encoding)
            .with_context(|| format!("Decoding row {line} of {path:?}"))?;
        if fields.iter().all(|f| f.trim().is_empty()) {
            continue;
        }
        let cells = fields.iter().map(|f| options.parser.parse(f)).collect();
        rows.push(Row::new(line, cells));
    }
    Ok(Dataset::new(name, &headers, rows)?)
}

fn load_workbook(path: &Path, name: &str, options: &LoadOptions) -> Result<Dataset> {
    let mut workbook =
        open_workbook_auto(path).with_context(|| format!("Opening workbook {path:?}"))?;
    let sheet = match &options.sheet {
        Some(sheet) => sheet.clone(),
        None => workbook
            .sheet_names()
            .first()
            .cloned()
            .ok_or_else(|| anyhow!("Workbook {path:?} contains no sheets"))?,
    };
    let range = workbook
        .worksheet_range(&sheet)
        .with_context(|| format!("Reading sheet '{sheet}' of {path:?}"))?;
    let (start_row, _) = range.start().unwrap_or((0, 0));

    let mut rows_iter = range.rows();
    let headers = match rows_iter.next() {
        Some(header_row) => header_row
            .iter()
            .map(|cell| match cell {
                Data::Empty => String::new(),
                other => other.to_string(),
            })
            .collect::<Vec<_>>(),
        None => Vec::new(),
    };

    let mut rows = Vec::new();
    for (offset, raw) in rows_iter.enumerate() {
        let cells = raw
            .iter()
            .map(|cell| convert_cell(cell, &options.parser))
            .collect::<Vec<_>>();
        if cells.iter().all(Option::is_none) {
            continue;
        }
        // Header sits on the first used row; data lines follow it.
        let line = start_row as usize + offset + 2;
        rows.push(Row::new(line, cells));
    }
    Ok(Dataset::new(name, &headers, rows)?)
}

fn convert_cell(cell: &Data, parser: &CellParser) -> Cell {
    match cell {
        Data::Empty => None,
        Data::String(s) => parser.parse(s),
        Data::Int(n) => Some(Value::Integer(*n)),
        Data::Float(f) if f.is_nan() => None,
        Data::Float(f) => Some(Value::Float(*f)),
        Data::Bool(b) => Some(Value::Boolean(*b)),
        Data::DateTime(dt) => dt
            .as_datetime()
            .map(|value| parser.settle_datetime(value))
            .or_else(|| Some(Value::Float(dt.as_f64()))),
        Data::DateTimeIso(s) => parser.parse(s),
        Data::DurationIso(s) => parser.settle_string(s),
        Data::Error(err) => parser.settle_string(&format!("#{err:?}")),
    }
}

/// Loads an optional lookup table, returning `None` when the path is absent
/// or the file cannot be read.
pub fn load_optional(
    path: Option<&PathBuf>,
    name: &str,
    options: &LoadOptions,
) -> Option<Dataset> {
    let path = path?;
    match load_dataset(path, name, options) {
        Ok(dataset) => Some(dataset),
        Err(err) => {
            warn!("Lookup '{name}' unavailable ({path:?}): {err:#}");
            None
        }
    }
}
