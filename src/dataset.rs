//! In-memory tabular dataset with a validated column schema.
//!
//! Column lookups are resolved once against [`Columns`], which maps a
//! normalized column name (see [`normalize_column_name`]) to its stable
//! position. Rows are plain vectors addressed by those positions.

use std::{cmp::Ordering, collections::HashMap};

use chrono::NaiveDateTime;
use serde::Serialize;

use crate::{
    data::{Cell, Value, normalize_column_name},
    error::SchemaError,
};

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Column {
    /// Header text as it appeared in the source.
    pub name: String,
    /// Lookup form of `name`.
    pub normalized: String,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct Columns {
    columns: Vec<Column>,
    positions: HashMap<String, usize>,
}

impl Columns {
    pub fn new(dataset: &str, names: &[String]) -> Result<Self, SchemaError> {
        let mut columns = Vec::with_capacity(names.len());
        let mut positions = HashMap::with_capacity(names.len());
        for (idx, name) in names.iter().enumerate() {
            let normalized = normalize_column_name(name);
            if positions.insert(normalized.clone(), idx).is_some() {
                return Err(SchemaError::DuplicateColumn {
                    dataset: dataset.to_string(),
                    column: name.clone(),
                });
            }
            columns.push(Column {
                name: name.clone(),
                normalized,
            });
        }
        Ok(Self { columns, positions })
    }

    pub fn len(&self) -> usize {
        self.columns.len()
    }

    pub fn is_empty(&self) -> bool {
        self.columns.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Column> {
        self.columns.iter()
    }

    pub fn get(&self, position: usize) -> Option<&Column> {
        self.columns.get(position)
    }

    pub fn position(&self, name: &str) -> Option<usize> {
        self.positions.get(&normalize_column_name(name)).copied()
    }

    pub fn names(&self) -> Vec<String> {
        self.columns.iter().map(|c| c.name.clone()).collect()
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Row {
    /// 1-based line in the source file (header is line 1).
    pub line: usize,
    pub cells: Vec<Cell>,
}

impl Row {
    pub fn new(line: usize, cells: Vec<Cell>) -> Self {
        Self { line, cells }
    }

    pub fn cell(&self, position: usize) -> Option<&Value> {
        self.cells.get(position).and_then(|c| c.as_ref())
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Dataset {
    name: String,
    columns: Columns,
    rows: Vec<Row>,
}

impl Dataset {
    /// Builds a dataset, padding short rows with nulls and truncating long ones.
    pub fn new(
        name: impl Into<String>,
        headers: &[String],
        rows: Vec<Row>,
    ) -> Result<Self, SchemaError> {
        let name = name.into();
        let columns = Columns::new(&name, headers)?;
        let width = columns.len();
        let rows = rows
            .into_iter()
            .map(|mut row| {
                row.cells.resize(width, None);
                row
            })
            .collect();
        Ok(Self {
            name,
            columns,
            rows,
        })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn columns(&self) -> &Columns {
        &self.columns
    }

    pub fn rows(&self) -> &[Row] {
        &self.rows
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn column_index(&self, name: &str) -> Option<usize> {
        self.columns.position(name)
    }

    pub fn require_column(&self, name: &str) -> Result<usize, SchemaError> {
        self.column_index(name)
            .ok_or_else(|| SchemaError::MissingColumn {
                dataset: self.name.clone(),
                column: name.to_string(),
            })
    }

    /// Returns a copy restricted to `names`, in that order.
    pub fn project(&self, names: &[String]) -> Result<Dataset, SchemaError> {
        let positions = names
            .iter()
            .map(|name| self.require_column(name))
            .collect::<Result<Vec<_>, _>>()?;
        let headers = positions
            .iter()
            .map(|&idx| self.columns.columns[idx].name.clone())
            .collect::<Vec<_>>();
        let rows = self
            .rows
            .iter()
            .map(|row| {
                let cells = positions
                    .iter()
                    .map(|&idx| row.cells.get(idx).cloned().flatten())
                    .collect();
                Row::new(row.line, cells)
            })
            .collect();
        Dataset::new(self.name.clone(), &headers, rows)
    }

    /// Stable ascending sort on one column; nulls sort last.
    pub fn sort_by_column(&mut self, name: &str) -> Result<(), SchemaError> {
        let idx = self.require_column(name)?;
        self.rows
            .sort_by(|a, b| compare_cells(a.cells[idx].as_ref(), b.cells[idx].as_ref()));
        Ok(())
    }

    /// Values in one column, in row order.
    pub fn column_values(&self, position: usize) -> impl Iterator<Item = Option<&Value>> {
        self.rows.iter().map(move |row| row.cell(position))
    }
}

fn compare_cells(left: Option<&Value>, right: Option<&Value>) -> Ordering {
    match (left, right) {
        (None, None) => Ordering::Equal,
        (None, Some(_)) => Ordering::Greater,
        (Some(_), None) => Ordering::Less,
        (Some(l), Some(r)) => compare_values(l, r),
    }
}

/// Numbers, then booleans, then dates, then text; each class ordered within.
fn sort_class(value: &Value) -> u8 {
    match value {
        Value::Integer(_) | Value::Float(_) => 0,
        Value::Boolean(_) => 1,
        Value::Date(_) | Value::DateTime(_) => 2,
        Value::String(_) => 3,
    }
}

fn compare_values(left: &Value, right: &Value) -> Ordering {
    sort_class(left)
        .cmp(&sort_class(right))
        .then_with(|| match (left, right) {
            (Value::Boolean(a), Value::Boolean(b)) => a.cmp(b),
            (Value::Date(_) | Value::DateTime(_), Value::Date(_) | Value::DateTime(_)) => {
                sort_instant(left).cmp(&sort_instant(right))
            }
            (Value::String(a), Value::String(b)) => a.to_lowercase().cmp(&b.to_lowercase()),
            _ => match (left.as_f64(), right.as_f64()) {
                (Some(a), Some(b)) => a.total_cmp(&b),
                _ => Ordering::Equal,
            },
        })
}

fn sort_instant(value: &Value) -> Option<NaiveDateTime> {
    match value {
        Value::Date(d) => d.and_hms_opt(0, 0, 0),
        Value::DateTime(dt) => Some(*dt),
        _ => None,
    }
}
