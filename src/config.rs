//! Run configuration loaded from YAML, with CLI overrides applied on top.
//!
//! Every field has a default so an empty file (or no file) is valid.

use std::{
    fs,
    path::{Path, PathBuf},
};

use anyhow::{Context, Result, anyhow};
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use crate::reconcile::ColumnOrder;

/// Which pair of datasets is being compared; selects report sheet names.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "kebab-case")]
pub enum Profile {
    /// Pipeline output against hand-labelled ground truth.
    #[default]
    GroundTruth,
    /// Flat file against a database extract.
    Database,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ValidationConfig {
    pub category: String,
    pub key_columns: Vec<String>,
    pub ignorable_columns: Vec<String>,
    pub group_column: Option<String>,
    pub sort_by: Option<String>,
    pub column_order: ColumnOrder,
    pub null_tokens: Vec<String>,
    pub datetime_as_date: bool,
    pub report_dir: PathBuf,
    pub profile: Profile,
    pub accuracy_threshold: Option<f64>,
    pub checks: ChecksConfig,
}

impl Default for ValidationConfig {
    fn default() -> Self {
        Self {
            category: "general".to_string(),
            key_columns: vec![
                "Product_Service_SKU_Name_Original".to_string(),
                "File_Name".to_string(),
                "UOM".to_string(),
            ],
            ignorable_columns: vec!["System_DateTime".to_string(), "Key".to_string()],
            group_column: Some("File_Name".to_string()),
            sort_by: None,
            column_order: ColumnOrder::Primary,
            null_tokens: vec!["nan".to_string(), "null".to_string(), "none".to_string()],
            datetime_as_date: true,
            report_dir: PathBuf::from("Reports"),
            profile: Profile::GroundTruth,
            accuracy_threshold: None,
            checks: ChecksConfig::default(),
        }
    }
}

/// An id/name column pair validated against an alias table.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct AliasCheck {
    pub id_column: String,
    pub name_column: String,
    pub lookup: PathBuf,
    #[serde(default = "default_alias_lookup_id")]
    pub lookup_id_column: String,
    #[serde(default = "default_alias_lookup_name")]
    pub lookup_name_column: String,
}

fn default_alias_lookup_id() -> String {
    "id".to_string()
}

fn default_alias_lookup_name() -> String {
    "alternative_name".to_string()
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ChecksConfig {
    /// Lookup with `Fields`, `mandatory_columns` and `dtype` columns.
    pub generic_lookup: Option<PathBuf>,
    /// Lookup whose columns list the allowed values of same-named data columns.
    pub conditional_lookup: Option<PathBuf>,
    pub aliases: Vec<AliasCheck>,
    pub non_negative_columns: Vec<String>,
    pub price_date_column: String,
    pub min_price_date: NaiveDate,
    pub payment_term_column: String,
    pub payment_term_pattern: String,
}

impl Default for ChecksConfig {
    fn default() -> Self {
        Self {
            generic_lookup: None,
            conditional_lookup: None,
            aliases: Vec::new(),
            non_negative_columns: vec!["quantity".to_string(), "total_price".to_string()],
            price_date_column: "price_date".to_string(),
            min_price_date: NaiveDate::from_ymd_opt(2017, 1, 1).unwrap_or_default(),
            payment_term_column: "payment_term".to_string(),
            payment_term_pattern: r"(?i)^net\d+$".to_string(),
        }
    }
}

/// Values supplied on the command line; `None`/empty leaves the file value.
#[derive(Debug, Clone, Default)]
pub struct Overrides {
    pub category: Option<String>,
    pub key_columns: Vec<String>,
    pub ignorable_columns: Vec<String>,
    pub group_column: Option<String>,
    pub no_group: bool,
    pub sort_by: Option<String>,
    pub profile: Option<Profile>,
    pub report_dir: Option<PathBuf>,
    pub accuracy_threshold: Option<f64>,
    pub generic_lookup: Option<PathBuf>,
    pub conditional_lookup: Option<PathBuf>,
}

impl ValidationConfig {
    pub fn load(path: &Path) -> Result<Self> {
        let raw = fs::read_to_string(path)
            .with_context(|| format!("Opening configuration file {path:?}"))?;
        Self::from_yaml(&raw).with_context(|| format!("Parsing configuration file {path:?}"))
    }

    pub fn from_yaml(raw: &str) -> Result<Self> {
        if raw.trim().is_empty() {
            return Ok(Self::default());
        }
        let config: ValidationConfig = serde_yaml::from_str(raw)?;
        config.validate()?;
        Ok(config)
    }

    pub fn load_or_default(path: Option<&Path>) -> Result<Self> {
        match path {
            Some(path) => Self::load(path),
            None => Ok(Self::default()),
        }
    }

    pub fn to_yaml(&self) -> Result<String> {
        Ok(serde_yaml::to_string(self)?)
    }

    pub fn apply(mut self, overrides: Overrides) -> Result<Self> {
        if let Some(category) = overrides.category {
            self.category = category;
        }
        if !overrides.key_columns.is_empty() {
            self.key_columns = overrides.key_columns;
        }
        if !overrides.ignorable_columns.is_empty() {
            self.ignorable_columns = overrides.ignorable_columns;
        }
        if overrides.no_group {
            self.group_column = None;
        } else if let Some(group) = overrides.group_column {
            self.group_column = Some(group);
        }
        if let Some(sort_by) = overrides.sort_by {
            self.sort_by = Some(sort_by);
        }
        if let Some(profile) = overrides.profile {
            self.profile = profile;
        }
        if let Some(dir) = overrides.report_dir {
            self.report_dir = dir;
        }
        if let Some(threshold) = overrides.accuracy_threshold {
            self.accuracy_threshold = Some(threshold);
        }
        if let Some(path) = overrides.generic_lookup {
            self.checks.generic_lookup = Some(path);
        }
        if let Some(path) = overrides.conditional_lookup {
            self.checks.conditional_lookup = Some(path);
        }
        self.validate()?;
        Ok(self)
    }

    fn validate(&self) -> Result<()> {
        if self.key_columns.iter().all(|c| c.trim().is_empty()) {
            return Err(anyhow!("key_columns must name at least one column"));
        }
        if let Some(threshold) = self.accuracy_threshold
            && !(0.0..=100.0).contains(&threshold)
        {
            return Err(anyhow!(
                "accuracy_threshold must be between 0 and 100 (got {threshold})"
            ));
        }
        regex::Regex::new(&self.checks.payment_term_pattern).with_context(|| {
            format!(
                "Invalid payment_term_pattern '{}'",
                self.checks.payment_term_pattern
            )
        })?;
        Ok(())
    }
}

/// Splits comma-separated CLI values and drops blanks.
pub fn split_list(values: &[String]) -> Vec<String> {
    values
        .iter()
        .flat_map(|v| v.split(','))
        .map(|v| v.trim())
        .filter(|v| !v.is_empty())
        .map(|v| v.to_string())
        .collect()
}
