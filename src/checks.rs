//! Business-rule checks run against a single dataset.
//!
//! Every lookup table is optional. A check whose lookup (or target column) is
//! unavailable reports [`CheckOutcome::Skipped`] and the remaining checks
//! still run.

use std::collections::{HashMap, HashSet};

use anyhow::{Context, Result};
use log::{info, warn};
use regex::Regex;
use serde::Serialize;

use crate::{
    config::{AliasCheck, ChecksConfig},
    data::{Value, ValueKind, normalize_column_name},
    dataset::Dataset,
};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum CheckKind {
    ColumnPresence,
    AllNullColumns,
    MandatoryNulls,
    Dtype,
    AllowedValues,
    Alias,
    NonNegative,
    PriceDate,
    PaymentTerm,
}

impl CheckKind {
    pub fn label(self) -> &'static str {
        match self {
            CheckKind::ColumnPresence => "column presence",
            CheckKind::AllNullColumns => "all-null columns",
            CheckKind::MandatoryNulls => "mandatory nulls",
            CheckKind::Dtype => "dtype",
            CheckKind::AllowedValues => "allowed values",
            CheckKind::Alias => "alias names",
            CheckKind::NonNegative => "non-negative",
            CheckKind::PriceDate => "price date",
            CheckKind::PaymentTerm => "payment term",
        }
    }
}

/// Fill colour family used when a finding is rendered.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Highlight {
    /// Null or negative values.
    Null,
    /// Value absent from a lookup.
    Invalid,
    /// Business-rule violation.
    Rule,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Finding {
    pub check: CheckKind,
    /// Dataset column position; `None` when the column is absent from the data.
    pub position: Option<usize>,
    pub column: String,
    /// Dataset row index; `None` for column-level findings.
    pub row: Option<usize>,
    /// Source line of `row`.
    pub line: Option<usize>,
    pub message: String,
    pub highlight: Highlight,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum CheckOutcome {
    Passed { check: CheckKind },
    Failed { check: CheckKind, findings: usize },
    Skipped { check: CheckKind, reason: String },
}

impl CheckOutcome {
    pub fn check(&self) -> CheckKind {
        match self {
            CheckOutcome::Passed { check }
            | CheckOutcome::Failed { check, .. }
            | CheckOutcome::Skipped { check, .. } => *check,
        }
    }
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct CheckReport {
    pub findings: Vec<Finding>,
    pub outcomes: Vec<CheckOutcome>,
}

impl CheckReport {
    pub fn failed(&self) -> bool {
        self.outcomes
            .iter()
            .any(|o| matches!(o, CheckOutcome::Failed { .. }))
    }

    pub fn skipped(&self) -> impl Iterator<Item = &CheckOutcome> {
        self.outcomes
            .iter()
            .filter(|o| matches!(o, CheckOutcome::Skipped { .. }))
    }

    fn record(&mut self, check: CheckKind, findings: Vec<Finding>) {
        let outcome = if findings.is_empty() {
            CheckOutcome::Passed { check }
        } else {
            CheckOutcome::Failed {
                check,
                findings: findings.len(),
            }
        };
        info!("Check '{}': {} finding(s)", check.label(), findings.len());
        self.findings.extend(findings);
        self.outcomes.push(outcome);
    }

    fn skip(&mut self, check: CheckKind, reason: impl Into<String>) {
        let reason = reason.into();
        warn!("Check '{}' skipped: {reason}", check.label());
        self.outcomes.push(CheckOutcome::Skipped { check, reason });
    }
}

/// Alias table paired with the settings that describe how to read it.
#[derive(Debug, Clone, Copy)]
pub struct AliasLookup<'a> {
    pub check: &'a AliasCheck,
    pub table: Option<&'a Dataset>,
}

#[derive(Debug, Clone, Default)]
pub struct CheckInputs<'a> {
    /// Table with `Fields`, `mandatory_columns` and `dtype` columns.
    pub generic: Option<&'a Dataset>,
    /// Table whose columns list allowed values per data column.
    pub conditional: Option<&'a Dataset>,
    pub aliases: Vec<AliasLookup<'a>>,
}

pub fn run_checks(
    data: &Dataset,
    inputs: &CheckInputs<'_>,
    config: &ChecksConfig,
) -> Result<CheckReport> {
    let mut report = CheckReport::default();

    match inputs.generic.map(FieldCatalog::from_lookup) {
        None => {
            for check in [CheckKind::ColumnPresence, CheckKind::MandatoryNulls, CheckKind::Dtype] {
                report.skip(check, "generic lookup unavailable");
            }
        }
        Some(Err(reason)) => {
            for check in [CheckKind::ColumnPresence, CheckKind::MandatoryNulls, CheckKind::Dtype] {
                report.skip(check, reason.clone());
            }
        }
        Some(Ok(catalog)) => {
            report.record(CheckKind::ColumnPresence, column_presence(data, &catalog));
            report.record(CheckKind::MandatoryNulls, mandatory_nulls(data, &catalog));
            report.record(CheckKind::Dtype, dtype_mismatches(data, &catalog));
        }
    }

    report.record(CheckKind::AllNullColumns, all_null_columns(data));

    match inputs.conditional {
        Some(lookup) => report.record(CheckKind::AllowedValues, allowed_values(data, lookup)),
        None => report.skip(CheckKind::AllowedValues, "conditional lookup unavailable"),
    }

    if inputs.aliases.is_empty() {
        report.skip(CheckKind::Alias, "no alias lookups configured");
    }
    for alias in &inputs.aliases {
        match alias_findings(data, alias) {
            Ok(findings) => report.record(CheckKind::Alias, findings),
            Err(reason) => report.skip(CheckKind::Alias, reason),
        }
    }

    let negatives = config
        .non_negative_columns
        .iter()
        .filter_map(|column| data.column_index(column))
        .collect::<Vec<_>>();
    if negatives.is_empty() {
        report.skip(CheckKind::NonNegative, "no non-negative columns present");
    } else {
        report.record(CheckKind::NonNegative, negative_values(data, &negatives));
    }

    match data.column_index(&config.price_date_column) {
        Some(position) => report.record(
            CheckKind::PriceDate,
            early_price_dates(data, position, config.min_price_date),
        ),
        None => report.skip(
            CheckKind::PriceDate,
            format!("column '{}' not present", config.price_date_column),
        ),
    }

    match data.column_index(&config.payment_term_column) {
        Some(position) => {
            let pattern = Regex::new(&config.payment_term_pattern).with_context(|| {
                format!("Compiling payment term pattern '{}'", config.payment_term_pattern)
            })?;
            report.record(
                CheckKind::PaymentTerm,
                invalid_payment_terms(data, position, &pattern),
            );
        }
        None => report.skip(
            CheckKind::PaymentTerm,
            format!("column '{}' not present", config.payment_term_column),
        ),
    }

    Ok(report)
}

struct FieldRule {
    name: String,
    mandatory: bool,
    dtype: Option<ValueKind>,
}

struct FieldCatalog {
    fields: Vec<FieldRule>,
}

impl FieldCatalog {
    fn from_lookup(lookup: &Dataset) -> std::result::Result<Self, String> {
        let fields_pos = lookup
            .column_index("Fields")
            .ok_or_else(|| "generic lookup has no 'Fields' column".to_string())?;
        let mandatory_pos = lookup.column_index("mandatory_columns");
        let dtype_pos = lookup.column_index("dtype");
        let fields = lookup
            .rows()
            .iter()
            .filter_map(|row| {
                let name = row.cell(fields_pos)?.as_display();
                let mandatory = mandatory_pos
                    .and_then(|p| row.cell(p))
                    .is_some_and(|v| is_yes(&v.as_display()));
                let dtype = dtype_pos
                    .and_then(|p| row.cell(p))
                    .and_then(|v| ValueKind::parse_label(&v.as_display()));
                Some(FieldRule {
                    name,
                    mandatory,
                    dtype,
                })
            })
            .collect();
        Ok(Self { fields })
    }
}

fn is_yes(value: &str) -> bool {
    matches!(
        value.trim().to_ascii_lowercase().as_str(),
        "y" | "yes" | "true" | "1" | "mandatory"
    )
}

fn column_finding(
    check: CheckKind,
    data: &Dataset,
    column: &str,
    message: String,
    highlight: Highlight,
) -> Finding {
    Finding {
        check,
        position: data.column_index(column),
        column: column.to_string(),
        row: None,
        line: None,
        message,
        highlight,
    }
}

fn cell_finding(
    check: CheckKind,
    data: &Dataset,
    position: usize,
    row: usize,
    message: String,
    highlight: Highlight,
) -> Finding {
    Finding {
        check,
        position: Some(position),
        column: data
            .columns()
            .get(position)
            .map(|c| c.name.clone())
            .unwrap_or_default(),
        row: Some(row),
        line: data.rows().get(row).map(|r| r.line),
        message,
        highlight,
    }
}

fn column_presence(data: &Dataset, catalog: &FieldCatalog) -> Vec<Finding> {
    let declared = catalog
        .fields
        .iter()
        .map(|f| normalize_column_name(&f.name))
        .collect::<HashSet<_>>();
    let mut findings = catalog
        .fields
        .iter()
        .filter(|f| data.column_index(&f.name).is_none())
        .map(|f| {
            column_finding(
                CheckKind::ColumnPresence,
                data,
                &f.name,
                format!("Missing column '{}'", f.name),
                Highlight::Invalid,
            )
        })
        .collect::<Vec<_>>();
    findings.extend(
        data.columns()
            .iter()
            .filter(|c| !declared.contains(&c.normalized))
            .map(|c| {
                column_finding(
                    CheckKind::ColumnPresence,
                    data,
                    &c.name,
                    format!("Extra column '{}' not in lookup", c.name),
                    Highlight::Invalid,
                )
            }),
    );
    findings
}

fn all_null_columns(data: &Dataset) -> Vec<Finding> {
    if data.is_empty() {
        return Vec::new();
    }
    data.columns()
        .iter()
        .enumerate()
        .filter(|(position, _)| data.column_values(*position).all(|v| v.is_none()))
        .map(|(_, column)| {
            column_finding(
                CheckKind::AllNullColumns,
                data,
                &column.name,
                format!("Column '{}' is entirely null", column.name),
                Highlight::Null,
            )
        })
        .collect()
}

fn mandatory_nulls(data: &Dataset, catalog: &FieldCatalog) -> Vec<Finding> {
    let mut findings = Vec::new();
    for field in catalog.fields.iter().filter(|f| f.mandatory) {
        let Some(position) = data.column_index(&field.name) else {
            continue;
        };
        for (row, value) in data.column_values(position).enumerate() {
            if value.is_none() {
                findings.push(cell_finding(
                    CheckKind::MandatoryNulls,
                    data,
                    position,
                    row,
                    format!("Null value in mandatory column '{}'", field.name),
                    Highlight::Invalid,
                ));
            }
        }
    }
    findings
}

/// Kind shared by every non-null value; mixed numerics widen to float and any
/// other mix falls back to string. `None` for an all-null column.
pub fn observed_kind<'a>(values: impl Iterator<Item = Option<&'a Value>>) -> Option<ValueKind> {
    widen(values.flatten().map(Value::kind))
}

fn widen(kinds: impl Iterator<Item = ValueKind>) -> Option<ValueKind> {
    kinds.reduce(|acc, kind| match (acc, kind) {
        (a, b) if a == b => a,
        (ValueKind::Integer, ValueKind::Float) | (ValueKind::Float, ValueKind::Integer) => {
            ValueKind::Float
        }
        _ => ValueKind::String,
    })
}

/// Kind of `value` as read against a declared kind. Text kept verbatim by the
/// parser (`02134`, `10.50`) still reads as a number for numeric declarations.
fn kind_against(value: &Value, expected: ValueKind) -> ValueKind {
    match value {
        Value::String(text) if matches!(expected, ValueKind::Integer | ValueKind::Float) => {
            let text = text.trim();
            if text.parse::<i64>().is_ok() {
                ValueKind::Integer
            } else if text.parse::<f64>().is_ok_and(f64::is_finite) {
                ValueKind::Float
            } else {
                ValueKind::String
            }
        }
        other => other.kind(),
    }
}

fn dtype_mismatches(data: &Dataset, catalog: &FieldCatalog) -> Vec<Finding> {
    catalog.fields
        .iter()
        .filter_map(|field| {
            let expected = field.dtype?;
            let position = data.column_index(&field.name)?;
            let observed = widen(
                data.column_values(position)
                    .flatten()
                    .map(|value| kind_against(value, expected)),
            )?;
            (!observed.satisfies(expected)).then(|| {
                column_finding(
                    CheckKind::Dtype,
                    data,
                    &field.name,
                    format!(
                        "Column '{}' holds {observed} values, lookup declares {expected}",
                        field.name
                    ),
                    Highlight::Invalid,
                )
            })
        })
        .collect()
}

fn lookup_text(value: &Value) -> String {
    value.as_display().trim().to_lowercase()
}

fn allowed_values(data: &Dataset, lookup: &Dataset) -> Vec<Finding> {
    let mut findings = Vec::new();
    for (position, column) in data.columns().iter().enumerate() {
        let Some(lookup_pos) = lookup.column_index(&column.name) else {
            continue;
        };
        let allowed = lookup
            .column_values(lookup_pos)
            .flatten()
            .map(lookup_text)
            .collect::<HashSet<_>>();
        for (row, value) in data.column_values(position).enumerate() {
            match value {
                None => findings.push(cell_finding(
                    CheckKind::AllowedValues,
                    data,
                    position,
                    row,
                    format!("Null value in '{}'", column.name),
                    Highlight::Null,
                )),
                Some(value) if !allowed.contains(&lookup_text(value)) => {
                    findings.push(cell_finding(
                        CheckKind::AllowedValues,
                        data,
                        position,
                        row,
                        format!(
                            "Value '{}' in '{}' not found in lookup",
                            value.as_display(),
                            column.name
                        ),
                        Highlight::Invalid,
                    ))
                }
                Some(_) => {}
            }
        }
    }
    findings
}

fn alias_findings(
    data: &Dataset,
    alias: &AliasLookup<'_>,
) -> std::result::Result<Vec<Finding>, String> {
    let check = alias.check;
    let table = alias
        .table
        .ok_or_else(|| format!("alias lookup {:?} unavailable", check.lookup))?;
    let id_pos = data
        .column_index(&check.id_column)
        .ok_or_else(|| format!("column '{}' not present", check.id_column))?;
    let name_pos = data
        .column_index(&check.name_column)
        .ok_or_else(|| format!("column '{}' not present", check.name_column))?;
    let lookup_id = table
        .column_index(&check.lookup_id_column)
        .ok_or_else(|| format!("alias lookup lacks column '{}'", check.lookup_id_column))?;
    let lookup_name = table
        .column_index(&check.lookup_name_column)
        .ok_or_else(|| format!("alias lookup lacks column '{}'", check.lookup_name_column))?;

    let mut accepted: HashMap<String, HashSet<String>> = HashMap::new();
    for row in table.rows() {
        if let (Some(id), Some(name)) = (row.cell(lookup_id), row.cell(lookup_name)) {
            accepted
                .entry(lookup_text(id))
                .or_default()
                .insert(lookup_text(name));
        }
    }

    let findings = data
        .rows()
        .iter()
        .enumerate()
        .filter(|(_, row)| {
            let id = row.cell(id_pos).map(lookup_text);
            let name = row.cell(name_pos).map(lookup_text);
            match (id, name) {
                (Some(id), Some(name)) => !accepted.get(&id).is_some_and(|names| names.contains(&name)),
                _ => true,
            }
        })
        .map(|(row, _)| {
            cell_finding(
                CheckKind::Alias,
                data,
                name_pos,
                row,
                format!(
                    "'{}' does not match an alias of '{}'",
                    check.name_column, check.id_column
                ),
                Highlight::Rule,
            )
        })
        .collect();
    Ok(findings)
}

fn negative_values(data: &Dataset, positions: &[usize]) -> Vec<Finding> {
    let mut findings = Vec::new();
    for &position in positions {
        for (row, value) in data.column_values(position).enumerate() {
            if value
                .and_then(Value::as_f64)
                .is_some_and(|n| n < 0.0)
            {
                findings.push(cell_finding(
                    CheckKind::NonNegative,
                    data,
                    position,
                    row,
                    "Negative value".to_string(),
                    Highlight::Null,
                ));
            }
        }
    }
    findings
}

fn early_price_dates(
    data: &Dataset,
    position: usize,
    minimum: chrono::NaiveDate,
) -> Vec<Finding> {
    data.column_values(position)
        .enumerate()
        .filter_map(|(row, value)| {
            let value = value?;
            let message = match value.as_date() {
                Some(date) if date < minimum => format!("Price date is before {minimum}"),
                Some(_) => return None,
                None => format!("'{}' is not a date", value.as_display()),
            };
            Some(cell_finding(
                CheckKind::PriceDate,
                data,
                position,
                row,
                message,
                Highlight::Rule,
            ))
        })
        .collect()
}

fn invalid_payment_terms(data: &Dataset, position: usize, pattern: &Regex) -> Vec<Finding> {
    data.column_values(position)
        .enumerate()
        .filter_map(|(row, value)| {
            let text = value?.as_display();
            (!pattern.is_match(text.trim())).then(|| {
                cell_finding(
                    CheckKind::PaymentTerm,
                    data,
                    position,
                    row,
                    format!("Invalid payment term '{text}'"),
                    Highlight::Rule,
                )
            })
        })
        .collect()
}
