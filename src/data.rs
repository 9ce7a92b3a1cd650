use std::fmt;

use anyhow::{Result, anyhow};
use chrono::{NaiveDate, NaiveDateTime};
use serde::{Deserialize, Serialize};

/// A typed scalar held by one dataset cell. Nulls are modelled as `None`
/// at the cell level (see [`Cell`]).
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub enum Value {
    String(String),
    Integer(i64),
    Float(f64),
    Boolean(bool),
    Date(NaiveDate),
    DateTime(NaiveDateTime),
}

pub type Cell = Option<Value>;

/// Broad type family used by dtype checks.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
pub enum ValueKind {
    String,
    Integer,
    Float,
    Boolean,
    Date,
}

impl Value {
    pub fn as_display(&self) -> String {
        match self {
            Value::String(s) => s.clone(),
            Value::Integer(i) => i.to_string(),
            Value::Float(f) => {
                if f.fract() == 0.0 && f.abs() < 1e15 {
                    (*f as i64).to_string()
                } else {
                    f.to_string()
                }
            }
            Value::Boolean(b) => b.to_string(),
            Value::Date(d) => d.format("%Y-%m-%d").to_string(),
            Value::DateTime(dt) => dt.format("%Y-%m-%d %H:%M:%S").to_string(),
        }
    }

    pub fn kind(&self) -> ValueKind {
        match self {
            Value::String(_) => ValueKind::String,
            Value::Integer(_) => ValueKind::Integer,
            Value::Float(_) => ValueKind::Float,
            Value::Boolean(_) => ValueKind::Boolean,
            Value::Date(_) | Value::DateTime(_) => ValueKind::Date,
        }
    }

    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Value::Integer(i) => Some(*i as f64),
            Value::Float(f) => Some(*f),
            Value::String(s) => s.trim().parse::<f64>().ok().filter(|f| !f.is_nan()),
            _ => None,
        }
    }

    pub fn as_date(&self) -> Option<NaiveDate> {
        match self {
            Value::Date(d) => Some(*d),
            Value::DateTime(dt) => Some(dt.date()),
            Value::String(s) => parse_naive_date(s.trim())
                .or_else(|_| parse_naive_datetime(s.trim()).map(|dt| dt.date()))
                .ok(),
            _ => None,
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_display())
    }
}

impl fmt::Display for ValueKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            ValueKind::String => "string",
            ValueKind::Integer => "integer",
            ValueKind::Float => "float",
            ValueKind::Boolean => "boolean",
            ValueKind::Date => "date",
        };
        f.write_str(label)
    }
}

impl ValueKind {
    /// Accepts both plain names and the dtype labels found in lookup sheets
    /// exported from dataframe tooling (`object`, `int64`, `datetime64[ns]`).
    pub fn parse_label(label: &str) -> Option<Self> {
        let lowered = label.trim().to_ascii_lowercase();
        let kind = match lowered.as_str() {
            "string" | "str" | "text" | "object" => ValueKind::String,
            "integer" | "int" | "int32" | "int64" => ValueKind::Integer,
            "float" | "float32" | "float64" | "number" | "numeric" => ValueKind::Float,
            "boolean" | "bool" => ValueKind::Boolean,
            other if other == "date" || other == "datetime" || other.starts_with("datetime64") => {
                ValueKind::Date
            }
            _ => return None,
        };
        Some(kind)
    }

    /// Whether a column observed as `self` satisfies a declared `expected` kind.
    pub fn satisfies(self, expected: ValueKind) -> bool {
        self == expected || (self == ValueKind::Integer && expected == ValueKind::Float)
    }
}

pub fn parse_naive_date(value: &str) -> Result<NaiveDate> {
    const DATE_FORMATS: &[&str] = &["%Y-%m-%d", "%d/%m/%Y", "%m/%d/%Y", "%Y/%m/%d", "%d-%m-%Y"];
    for fmt in DATE_FORMATS {
        if let Ok(parsed) = NaiveDate::parse_from_str(value, fmt) {
            return Ok(parsed);
        }
    }
    Err(anyhow!("Failed to parse '{value}' as date"))
}

pub fn parse_naive_datetime(value: &str) -> Result<NaiveDateTime> {
    const DATETIME_FORMATS: &[&str] = &[
        "%Y-%m-%d %H:%M:%S",
        "%Y-%m-%dT%H:%M:%S",
        "%Y-%m-%d %H:%M:%S%.f",
        "%Y-%m-%dT%H:%M:%S%.f",
        "%d/%m/%Y %H:%M:%S",
        "%m/%d/%Y %H:%M:%S",
        "%Y-%m-%d %H:%M",
        "%Y-%m-%dT%H:%M",
    ];
    for fmt in DATETIME_FORMATS {
        if let Ok(parsed) = NaiveDateTime::parse_from_str(value, fmt) {
            return Ok(parsed);
        }
    }
    Err(anyhow!("Failed to parse '{value}' as datetime"))
}

/// Case- and punctuation-insensitive column name used for every lookup.
pub fn normalize_column_name(name: &str) -> String {
    name.chars()
        .filter(|c| c.is_ascii_alphanumeric())
        .collect::<String>()
        .to_ascii_lowercase()
}

/// Settings applied while typing raw text cells.
#[derive(Debug, Clone)]
pub struct CellParser {
    null_tokens: Vec<String>,
    datetime_as_date: bool,
}

impl Default for CellParser {
    fn default() -> Self {
        Self::new(&["nan".to_string(), "null".to_string(), "none".to_string()], true)
    }
}

impl CellParser {
    pub fn new(null_tokens: &[String], datetime_as_date: bool) -> Self {
        Self {
            null_tokens: null_tokens
                .iter()
                .map(|token| token.trim().to_ascii_lowercase())
                .filter(|token| !token.is_empty())
                .collect(),
            datetime_as_date,
        }
    }

    pub fn is_null_token(&self, raw: &str) -> bool {
        let trimmed = raw.trim();
        trimmed.is_empty()
            || self
                .null_tokens
                .iter()
                .any(|token| token.eq_ignore_ascii_case(trimmed))
    }

    /// Infers the most specific value for a raw text cell.
    pub fn parse(&self, raw: &str) -> Cell {
        if self.is_null_token(raw) {
            return None;
        }
        let trimmed = raw.trim();
        // Numeric text is typed only when its display form reproduces it, so
        // codes such as `02134` or `10.50` keep their spelling.
        if let Ok(parsed) = trimmed.parse::<i64>()
            && parsed.to_string() == trimmed
        {
            return Some(Value::Integer(parsed));
        }
        if let Ok(parsed) = trimmed.parse::<f64>()
            && parsed.is_finite()
        {
            let value = Value::Float(parsed);
            if value.as_display() == trimmed {
                return Some(value);
            }
        }
        if trimmed.eq_ignore_ascii_case("true") {
            return Some(Value::Boolean(true));
        }
        if trimmed.eq_ignore_ascii_case("false") {
            return Some(Value::Boolean(false));
        }
        if let Ok(date) = parse_naive_date(trimmed) {
            return Some(Value::Date(date));
        }
        if let Ok(datetime) = parse_naive_datetime(trimmed) {
            return Some(self.settle_datetime(datetime));
        }
        Some(Value::String(raw.to_string()))
    }

    /// Applies the date-collapsing policy to a datetime read from any source.
    pub fn settle_datetime(&self, datetime: NaiveDateTime) -> Value {
        if self.datetime_as_date {
            Value::Date(datetime.date())
        } else {
            Value::DateTime(datetime)
        }
    }

    /// Null-token policy for strings that arrive already typed (spreadsheets).
    pub fn settle_string(&self, raw: &str) -> Cell {
        if self.is_null_token(raw) {
            None
        } else {
            Some(Value::String(raw.to_string()))
        }
    }
}
