//! `compare` command: load, reconcile, match, aggregate, report.

use std::{fs::File, io::BufWriter, path::Path};

use anyhow::{Context, Result, bail};
use log::{info, warn};
use serde::Serialize;

use crate::{
    aggregate::{AccuracySummary, aggregate},
    cli::CompareArgs,
    config::{Overrides, ValidationConfig, split_list},
    data::CellParser,
    dataset::Dataset,
    error::ReconResult,
    io_utils,
    loader::{LoadOptions, load_dataset},
    matcher::{MatchResult, MatchWarning, match_datasets},
    reconcile::{ColumnDrift, reconcile},
    report::{self, format_accuracy},
    table,
};

/// Everything a comparison run produces, before rendering.
#[derive(Debug, Clone)]
pub struct Comparison {
    pub primary: Dataset,
    pub secondary: Dataset,
    pub drift: ColumnDrift,
    pub result: MatchResult,
    pub summary: AccuracySummary,
}

/// Runs the engine over two loaded datasets. Only schema problems fail;
/// data-level anomalies end up in the returned [`Comparison`].
pub fn compare_datasets(
    primary: &Dataset,
    secondary: &Dataset,
    config: &ValidationConfig,
) -> ReconResult<Comparison> {
    let reconciled = reconcile(
        primary,
        secondary,
        &config.ignorable_columns,
        config.column_order,
    )?;
    let mut primary = reconciled.primary;
    let mut secondary = reconciled.secondary;
    if let Some(column) = &config.sort_by {
        primary.sort_by_column(column)?;
        secondary.sort_by_column(column)?;
    }

    let result = match_datasets(&primary, &secondary, &config.key_columns)?;
    let summary = aggregate(
        &result,
        &primary,
        &secondary,
        config.group_column.as_deref(),
    )?;
    Ok(Comparison {
        primary,
        secondary,
        drift: reconciled.drift,
        result,
        summary,
    })
}

#[derive(Serialize)]
struct JsonSummary<'a> {
    category: &'a str,
    primary: &'a str,
    secondary: &'a str,
    drift: &'a ColumnDrift,
    summary: &'a AccuracySummary,
    lines: Vec<report::SummaryLine>,
    warnings: &'a [MatchWarning],
}

fn write_summary_json(path: &Path, config: &ValidationConfig, comparison: &Comparison) -> Result<()> {
    let payload = JsonSummary {
        category: &config.category,
        primary: comparison.primary.name(),
        secondary: comparison.secondary.name(),
        drift: &comparison.drift,
        summary: &comparison.summary,
        lines: report::summary_lines(&comparison.summary),
        warnings: &comparison.result.warnings,
    };
    if io_utils::is_dash(path) {
        serde_json::to_writer_pretty(std::io::stdout().lock(), &payload)
            .context("Writing summary JSON to stdout")?;
        println!();
    } else {
        let file = File::create(path).with_context(|| format!("Creating {path:?}"))?;
        serde_json::to_writer_pretty(BufWriter::new(file), &payload)
            .with_context(|| format!("Writing summary JSON to {path:?}"))?;
    }
    Ok(())
}

fn print_summary(summary: &AccuracySummary) {
    let headers = ["Issue Type", "Level", "Count", "Accuracy %", "Files Affected"]
        .iter()
        .map(|h| h.to_string())
        .collect::<Vec<_>>();
    let rows = report::summary_lines(summary)
        .into_iter()
        .map(|line| {
            vec![
                line.issue_type,
                format!("{:?}", line.level),
                line.count.to_string(),
                format_accuracy(line.accuracy),
                line.files_affected.to_string(),
            ]
        })
        .collect::<Vec<_>>();
    table::print_table(&headers, &rows);
}

pub fn execute(args: &CompareArgs) -> Result<()> {
    let config = ValidationConfig::load_or_default(args.config.as_deref())?.apply(Overrides {
        category: args.category.clone(),
        key_columns: split_list(&args.key),
        ignorable_columns: split_list(&args.ignore),
        group_column: args.group_column.clone(),
        no_group: args.no_group,
        sort_by: args.sort_by.clone(),
        profile: args.profile,
        report_dir: args.report_dir.clone(),
        accuracy_threshold: args.fail_under,
        ..Overrides::default()
    })?;
    let options = LoadOptions {
        delimiter: args.input.delimiter,
        encoding: args.input.input_encoding.clone(),
        sheet: args.input.sheet.clone(),
        parser: CellParser::new(&config.null_tokens, config.datetime_as_date),
    };
    let primary_name = dataset_label(&args.primary, "primary");
    let secondary_name = dataset_label(&args.secondary, "secondary");
    let primary = load_dataset(&args.primary, &primary_name, &options)
        .with_context(|| format!("Loading primary dataset {:?}", args.primary))?;
    let secondary = load_dataset(&args.secondary, &secondary_name, &options)
        .with_context(|| format!("Loading secondary dataset {:?}", args.secondary))?;

    let comparison = compare_datasets(&primary, &secondary, &config)
        .with_context(|| format!("Comparing {primary_name} against {secondary_name}"))?;
    let summary = &comparison.summary;
    info!(
        "{} exact, {} partial, {} unmatched primary, {} unmatched secondary",
        summary.exact, summary.partial, summary.unmatched_primary, summary.unmatched_secondary
    );

    let highlight_path =
        report::timestamped_path(&config.report_dir, "highlight_report", &config.category)?;
    report::write_comparison_workbook(
        &highlight_path,
        config.profile,
        &comparison.primary,
        &comparison.secondary,
        &config.key_columns,
        &comparison.result,
    )?;
    let summary_path = report::timestamped_path(&config.report_dir, "summary", &config.category)?;
    report::write_summary_workbook(&summary_path, summary, config.group_column.as_deref())?;
    if let Some(path) = &args.summary_json {
        write_summary_json(path, &config, &comparison)?;
    }
    if args.summary_json.as_deref().is_none_or(|p| !io_utils::is_dash(p)) {
        print_summary(summary);
    }

    if let Some(threshold) = config.accuracy_threshold {
        match summary.row_accuracy {
            Some(accuracy) if accuracy < threshold => {
                bail!("Row accuracy {accuracy:.2}% is below the required {threshold:.2}%")
            }
            Some(accuracy) => info!("Row accuracy {accuracy:.2}% meets {threshold:.2}%"),
            None => warn!("Row accuracy undefined; --fail-under {threshold} not evaluated"),
        }
    }
    Ok(())
}

pub(crate) fn dataset_label(path: &Path, fallback: &str) -> String {
    path.file_stem()
        .map(|stem| stem.to_string_lossy().to_string())
        .filter(|stem| !stem.is_empty() && stem != "-")
        .unwrap_or_else(|| fallback.to_string())
}
