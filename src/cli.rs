use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};

use crate::config::Profile;

#[derive(Debug, Parser)]
#[command(
    author,
    version,
    about = "Validate pipeline spreadsheets against ground truth and business rules",
    long_about = None
)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Debug, Subcommand)]
pub enum Commands {
    /// Reconcile pipeline output against ground truth (or a flat file against a database extract)
    Compare(CompareArgs),
    /// Run business-rule checks on one dataset using optional lookup tables
    Check(CheckArgs),
    /// Derive expected price-point statistics from a flat file
    Expected(ExpectedArgs),
}

/// Input options shared by every subcommand.
#[derive(Debug, Args, Clone, Default)]
pub struct InputArgs {
    /// CSV delimiter character (supports ',', 'tab', ';', '|')
    #[arg(long, value_parser = parse_delimiter)]
    pub delimiter: Option<u8>,
    /// Character encoding of CSV inputs (defaults to utf-8)
    #[arg(long = "input-encoding")]
    pub input_encoding: Option<String>,
    /// Worksheet to read from spreadsheet inputs (defaults to the first sheet)
    #[arg(long)]
    pub sheet: Option<String>,
}

#[derive(Debug, Args)]
pub struct CompareArgs {
    /// Dataset under validation (pipeline output or flat file)
    #[arg(short = 'p', long = "primary")]
    pub primary: PathBuf,
    /// Reference dataset (ground truth or database extract)
    #[arg(short = 's', long = "secondary")]
    pub secondary: PathBuf,
    /// YAML configuration file
    #[arg(short, long)]
    pub config: Option<PathBuf>,
    /// Report category used in output file names
    #[arg(long)]
    pub category: Option<String>,
    /// Key columns forming the composite key (repeatable or comma-separated)
    #[arg(short = 'k', long = "key", action = clap::ArgAction::Append)]
    pub key: Vec<String>,
    /// Columns excluded from comparison (repeatable or comma-separated)
    #[arg(long = "ignore", action = clap::ArgAction::Append)]
    pub ignore: Vec<String>,
    /// Column used for per-file accuracy breakdowns
    #[arg(long = "group-column", conflicts_with = "no_group")]
    pub group_column: Option<String>,
    /// Skip per-file accuracy breakdowns
    #[arg(long = "no-group")]
    pub no_group: bool,
    /// Stable pre-sort of both datasets by this column before matching
    #[arg(long = "sort-by")]
    pub sort_by: Option<String>,
    /// Report layout profile
    #[arg(long, value_enum)]
    pub profile: Option<Profile>,
    /// Directory receiving the generated workbooks
    #[arg(long = "report-dir")]
    pub report_dir: Option<PathBuf>,
    /// Fail when overall row accuracy drops below this percentage
    #[arg(long = "fail-under")]
    pub fail_under: Option<f64>,
    /// Also write the accuracy summary as JSON to this path ('-' for stdout)
    #[arg(long = "summary-json")]
    pub summary_json: Option<PathBuf>,
    #[command(flatten)]
    pub input: InputArgs,
}

#[derive(Debug, Args)]
pub struct CheckArgs {
    /// Dataset to check
    #[arg(short = 'i', long = "input")]
    pub input_path: PathBuf,
    /// YAML configuration file
    #[arg(short, long)]
    pub config: Option<PathBuf>,
    /// Report category used in output file names
    #[arg(long)]
    pub category: Option<String>,
    /// Generic lookup with Fields, mandatory_columns and dtype columns
    #[arg(long = "generic-lookup")]
    pub generic_lookup: Option<PathBuf>,
    /// Sheet of the generic lookup workbook (defaults to the first sheet)
    #[arg(long = "generic-sheet")]
    pub generic_sheet: Option<String>,
    /// Conditional lookup listing allowed values per column
    #[arg(long = "conditional-lookup")]
    pub conditional_lookup: Option<PathBuf>,
    /// Directory receiving the generated workbook
    #[arg(long = "report-dir")]
    pub report_dir: Option<PathBuf>,
    /// Exit with an error when any check fails
    #[arg(long)]
    pub strict: bool,
    #[command(flatten)]
    pub input: InputArgs,
}

#[derive(Debug, Args)]
pub struct ExpectedArgs {
    /// Flat file with priced line items
    #[arg(short = 'i', long = "input")]
    pub input_path: PathBuf,
    /// Output file (.xlsx or .csv)
    #[arg(short = 'o', long = "output")]
    pub output: PathBuf,
    /// Column whose values define the groups
    #[arg(long = "name-column", default_value = "Product_Service_SKU_Name_Normalized")]
    pub name_column: String,
    /// Numeric price column
    #[arg(long = "price-column", default_value = "Unit Price")]
    pub price_column: String,
    /// Columns carried from the first row of each group (repeatable or comma-separated)
    #[arg(long = "carry", action = clap::ArgAction::Append)]
    pub carry: Vec<String>,
    #[command(flatten)]
    pub input: InputArgs,
}

pub fn parse_delimiter(value: &str) -> Result<u8, String> {
    match value {
        "tab" | "\t" => Ok(b'\t'),
        "comma" | "," => Ok(b','),
        "|" | "pipe" => Ok(b'|'),
        ";" | "semicolon" => Ok(b';'),
        other => {
            let mut chars = other.chars();
            let first = chars
                .next()
                .ok_or_else(|| "Delimiter cannot be empty".to_string())?;
            if chars.next().is_some() {
                return Err("Delimiter must be a single character".to_string());
            }
            if !first.is_ascii() {
                return Err("Delimiter must be ASCII".to_string());
            }
            Ok(first as u8)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn delimiter_names_resolve() {
        assert_eq!(parse_delimiter("tab"), Ok(b'\t'));
        assert_eq!(parse_delimiter(";"), Ok(b';'));
        assert!(parse_delimiter("ab").is_err());
        assert!(parse_delimiter("").is_err());
    }

    #[test]
    fn compare_arguments_parse() {
        let cli = Cli::try_parse_from([
            "gt-recon",
            "compare",
            "-p",
            "pipeline.xlsx",
            "-s",
            "truth.xlsx",
            "--key",
            "File_Name,UOM",
            "--profile",
            "database",
            "--fail-under",
            "90",
        ])
        .unwrap();
        let Commands::Compare(args) = cli.command else {
            panic!("expected compare");
        };
        assert_eq!(args.key, vec!["File_Name,UOM".to_string()]);
        assert_eq!(args.profile, Some(Profile::Database));
        assert_eq!(args.fail_under, Some(90.0));
    }

    #[test]
    fn cli_definition_is_consistent() {
        use clap::CommandFactory;
        Cli::command().debug_assert();
    }
}
