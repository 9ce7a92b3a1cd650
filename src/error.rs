//! Typed failures raised by the reconciliation engine.
//!
//! Schema problems abort a run before any output is produced. Data-level
//! anomalies (mismatches, duplicate keys, unmatched rows) are never errors;
//! they surface as classified records and diagnostics instead.

use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum SchemaError {
    #[error("{dataset} dataset is missing required column '{column}'")]
    MissingColumn { dataset: String, column: String },

    #[error("{dataset} dataset declares column '{column}' more than once")]
    DuplicateColumn { dataset: String, column: String },

    #[error("no comparable columns remain between {primary} and {secondary} after reconciliation")]
    EmptyIntersection { primary: String, secondary: String },

    #[error("at least one key column is required to derive a composite key")]
    EmptyKeyColumns,
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("accuracy for '{metric}' is undefined over zero rows")]
pub struct ZeroRowsError {
    pub metric: String,
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ReconError {
    #[error(transparent)]
    Schema(#[from] SchemaError),

    #[error(transparent)]
    ZeroRows(#[from] ZeroRowsError),
}

pub type ReconResult<T> = std::result::Result<T, ReconError>;
