//! Workbook rendering for comparison, summary and check results.
//!
//! Layout differences between the ground-truth and database profiles are
//! confined to [`SheetNames`]; everything else is shared.

use std::{
    collections::HashMap,
    fs,
    path::{Path, PathBuf},
};

use anyhow::{Context, Result};
use chrono::Local;
use log::info;
use rust_xlsxwriter::{Color, Format, Note, Workbook, Worksheet};
use serde::Serialize;

use crate::{
    aggregate::AccuracySummary,
    checks::{CheckOutcome, CheckReport, Highlight},
    config::Profile,
    data::{Cell, Value},
    dataset::{Dataset, Row},
    key::KeyGenerator,
    matcher::{MatchRecord, MatchResult},
};

const MISMATCH_FILL: u32 = 0xFFFF00;
const UNMATCHED_FILL: u32 = 0xFFCCCB;
const RULE_FILL: u32 = 0xFF9999;
const NOTE_AUTHOR: &str = "gt-recon";

pub struct SheetNames {
    pub matched: &'static str,
    pub unmatched_primary: &'static str,
    pub unmatched_secondary: &'static str,
}

impl Profile {
    pub fn sheet_names(self) -> SheetNames {
        match self {
            Profile::GroundTruth => SheetNames {
                matched: "Pipeline_Comparison_Report",
                unmatched_primary: "InPipelineNotIn_GT",
                unmatched_secondary: "ExtraRowsInGT",
            },
            Profile::Database => SheetNames {
                matched: "Flatfile",
                unmatched_primary: "DataInFlatfileNotInDb",
                unmatched_secondary: "DataInDbNotInFlatfile",
            },
        }
    }
}

/// `{dir}/{prefix}_{category}_{YYYYmmdd_HHMMSS}.xlsx`, creating `dir`.
pub fn timestamped_path(dir: &Path, prefix: &str, category: &str) -> Result<PathBuf> {
    fs::create_dir_all(dir).with_context(|| format!("Creating report directory {dir:?}"))?;
    let stamp = Local::now().format("%Y%m%d_%H%M%S");
    Ok(dir.join(format!("{prefix}_{category}_{stamp}.xlsx")))
}

fn fill(color: u32) -> Format {
    Format::new().set_background_color(Color::RGB(color))
}

fn header_format() -> Format {
    Format::new().set_bold()
}

fn write_header(sheet: &mut Worksheet, headers: &[String]) -> Result<()> {
    let bold = header_format();
    for (col, header) in headers.iter().enumerate() {
        sheet.write_string_with_format(0, col as u16, header, &bold)?;
    }
    Ok(())
}

fn write_value(
    sheet: &mut Worksheet,
    row: u32,
    col: u16,
    cell: Option<&Value>,
    format: Option<&Format>,
) -> Result<()> {
    match (cell, format) {
        (Some(Value::Integer(i)), Some(f)) => sheet.write_number_with_format(row, col, *i as f64, f)?,
        (Some(Value::Integer(i)), None) => sheet.write_number(row, col, *i as f64)?,
        (Some(Value::Float(n)), Some(f)) => sheet.write_number_with_format(row, col, *n, f)?,
        (Some(Value::Float(n)), None) => sheet.write_number(row, col, *n)?,
        (Some(value), Some(f)) => sheet.write_string_with_format(row, col, value.as_display(), f)?,
        (Some(value), None) => sheet.write_string(row, col, value.as_display())?,
        (None, Some(f)) => sheet.write_blank(row, col, f)?,
        (None, None) => return Ok(()),
    };
    Ok(())
}

fn display(cell: Option<&Value>) -> String {
    cell.map(Value::as_display)
        .unwrap_or_else(|| "(null)".to_string())
}

fn write_keyed_row(
    sheet: &mut Worksheet,
    row_idx: u32,
    key: &str,
    row: &Row,
    format: Option<&Format>,
) -> Result<()> {
    match format {
        Some(f) => sheet.write_string_with_format(row_idx, 0, key, f)?,
        None => sheet.write_string(row_idx, 0, key)?,
    };
    for (col, cell) in row.cells.iter().enumerate() {
        write_value(sheet, row_idx, col as u16 + 1, cell.as_ref(), format)?;
    }
    Ok(())
}

fn keyed_headers(dataset: &Dataset) -> Vec<String> {
    std::iter::once("Composite_Key".to_string())
        .chain(dataset.columns().names())
        .collect()
}

/// Renders the highlighted comparison workbook.
///
/// The matched sheet lists every primary row in order: differing cells are
/// filled and annotated with the secondary value, unmatched rows are filled
/// whole. The other two sheets list the unmatched rows of each side.
pub fn write_comparison_workbook(
    path: &Path,
    profile: Profile,
    primary: &Dataset,
    secondary: &Dataset,
    key_columns: &[String],
    result: &MatchResult,
) -> Result<()> {
    let names = profile.sheet_names();
    let primary_keys = KeyGenerator::for_dataset(primary, key_columns)?;
    let secondary_keys = KeyGenerator::for_dataset(secondary, key_columns)?;
    let headers = keyed_headers(primary);
    let mismatch = fill(MISMATCH_FILL);
    let unmatched = fill(UNMATCHED_FILL);
    let mut workbook = Workbook::new();

    let sheet = workbook.add_worksheet().set_name(names.matched)?;
    write_header(sheet, &headers)?;
    for (idx, record) in result.records.iter().enumerate() {
        let row_idx = idx as u32 + 1;
        let row = &primary.rows()[record.primary()];
        let key = primary_keys.key(row);
        match record {
            MatchRecord::Exact { .. } => write_keyed_row(sheet, row_idx, &key, row, None)?,
            MatchRecord::Unmatched { .. } => {
                write_keyed_row(sheet, row_idx, &key, row, Some(&unmatched))?
            }
            MatchRecord::Partial {
                secondary: s_idx,
                differing,
                ..
            } => {
                write_keyed_row(sheet, row_idx, &key, row, None)?;
                let other = &secondary.rows()[*s_idx];
                for &position in differing {
                    let col = position as u16 + 1;
                    write_value(sheet, row_idx, col, row.cell(position), Some(&mismatch))?;
                    let note = Note::new(format!(
                        "{}: {}",
                        secondary.name(),
                        display(other.cell(position))
                    ))
                    .set_author(NOTE_AUTHOR);
                    sheet.insert_note(row_idx, col, &note)?;
                }
            }
        }
    }
    sheet.autofit();

    let sheet = workbook.add_worksheet().set_name(names.unmatched_primary)?;
    write_header(sheet, &headers)?;
    for (idx, p_idx) in result.unmatched_primary().enumerate() {
        let row = &primary.rows()[p_idx];
        write_keyed_row(sheet, idx as u32 + 1, &primary_keys.key(row), row, None)?;
    }

    let sheet = workbook
        .add_worksheet()
        .set_name(names.unmatched_secondary)?;
    write_header(sheet, &keyed_headers(secondary))?;
    for (idx, &s_idx) in result.unmatched_secondary.iter().enumerate() {
        let row = &secondary.rows()[s_idx];
        write_keyed_row(sheet, idx as u32 + 1, &secondary_keys.key(row), row, None)?;
    }

    workbook
        .save(path)
        .with_context(|| format!("Writing comparison workbook {path:?}"))?;
    info!("Comparison report written to {path:?}");
    Ok(())
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum IssueLevel {
    Field,
    File,
}

impl IssueLevel {
    fn label(self) -> &'static str {
        match self {
            IssueLevel::Field => "Field",
            IssueLevel::File => "File",
        }
    }
}

/// One line of the category issue summary.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SummaryLine {
    pub issue_type: String,
    pub level: IssueLevel,
    pub count: usize,
    pub accuracy: Option<f64>,
    pub files_affected: usize,
}

pub fn summary_lines(summary: &AccuracySummary) -> Vec<SummaryLine> {
    let mut lines = summary
        .fields
        .iter()
        .map(|field| SummaryLine {
            issue_type: field.name.clone(),
            level: IssueLevel::Field,
            count: field.mismatches,
            accuracy: field.accuracy,
            files_affected: field.files_affected,
        })
        .collect::<Vec<_>>();
    lines.push(SummaryLine {
        issue_type: "Missing Rows (Complete Row)".to_string(),
        level: IssueLevel::File,
        count: summary.unmatched_secondary,
        accuracy: summary.missing_accuracy(),
        files_affected: summary.files_with_missing_rows(),
    });
    lines.push(SummaryLine {
        issue_type: "Extra Rows (Not In Reference)".to_string(),
        level: IssueLevel::File,
        count: summary.unmatched_primary,
        accuracy: summary.extra_accuracy(),
        files_affected: summary.files_with_extra_rows(),
    });
    lines.push(SummaryLine {
        issue_type: "Duplicates Extraction".to_string(),
        level: IssueLevel::File,
        count: summary.duplicate_primary,
        accuracy: summary.duplicate_accuracy(),
        files_affected: summary.files_with_duplicate_rows(),
    });
    lines
}

pub fn format_accuracy(accuracy: Option<f64>) -> String {
    accuracy.map_or_else(|| "n/a".to_string(), |value| format!("{value:.2}"))
}

fn write_accuracy(sheet: &mut Worksheet, row: u32, col: u16, accuracy: Option<f64>) -> Result<()> {
    match accuracy {
        Some(value) => sheet.write_number(row, col, value)?,
        None => sheet.write_string(row, col, "n/a")?,
    };
    Ok(())
}

/// Writes `Category_Issue_Summary` and `File_Level_Accuracy`.
pub fn write_summary_workbook(
    path: &Path,
    summary: &AccuracySummary,
    group_column: Option<&str>,
) -> Result<()> {
    let mut workbook = Workbook::new();

    let sheet = workbook.add_worksheet().set_name("Category_Issue_Summary")?;
    write_header(
        sheet,
        &[
            "Issue Type".to_string(),
            "Issue Level".to_string(),
            "Issue Count".to_string(),
            "Overall Accuracy Percentage".to_string(),
            "Number of Files Affected".to_string(),
        ],
    )?;
    for (idx, line) in summary_lines(summary).iter().enumerate() {
        let row = idx as u32 + 1;
        sheet.write_string(row, 0, &line.issue_type)?;
        sheet.write_string(row, 1, line.level.label())?;
        sheet.write_number(row, 2, line.count as f64)?;
        write_accuracy(sheet, row, 3, line.accuracy)?;
        sheet.write_number(row, 4, line.files_affected as f64)?;
    }
    sheet.autofit();

    let sheet = workbook.add_worksheet().set_name("File_Level_Accuracy")?;
    let mut headers = vec![
        group_column.unwrap_or("Group").to_string(),
        "Primary Rows".to_string(),
        "Secondary Rows".to_string(),
        "Missing Rows".to_string(),
        "Extra Rows".to_string(),
        "Duplicate Rows".to_string(),
    ];
    headers.extend(summary.fields.iter().map(|f| f.name.clone()));
    headers.push("File Accuracy".to_string());
    write_header(sheet, &headers)?;
    for (idx, file) in summary.files.iter().enumerate() {
        let row = idx as u32 + 1;
        sheet.write_string(row, 0, &file.group)?;
        sheet.write_number(row, 1, file.primary_rows as f64)?;
        sheet.write_number(row, 2, file.secondary_rows as f64)?;
        sheet.write_number(row, 3, file.missing_rows as f64)?;
        sheet.write_number(row, 4, file.extra_rows as f64)?;
        sheet.write_number(row, 5, file.duplicate_rows as f64)?;
        for (offset, count) in file.field_mismatches.iter().enumerate() {
            sheet.write_number(row, 6 + offset as u16, *count as f64)?;
        }
        let last = 6 + file.field_mismatches.len() as u16;
        write_accuracy(sheet, row, last, file.accuracy)?;
    }

    workbook
        .save(path)
        .with_context(|| format!("Writing summary workbook {path:?}"))?;
    info!("Summary report written to {path:?}");
    Ok(())
}

fn highlight_fill(highlight: Highlight) -> u32 {
    match highlight {
        Highlight::Null => UNMATCHED_FILL,
        Highlight::Invalid => MISMATCH_FILL,
        Highlight::Rule => RULE_FILL,
    }
}

/// Writes the checked data with highlighted findings, a trailing `Comments`
/// column, a `Findings` sheet and a `Check_Summary` sheet.
pub fn write_check_workbook(path: &Path, data: &Dataset, report: &CheckReport) -> Result<()> {
    let mut cell_notes: HashMap<(usize, usize), (Highlight, Vec<&str>)> = HashMap::new();
    let mut column_fills: HashMap<usize, Highlight> = HashMap::new();
    let mut comments: HashMap<usize, Vec<&str>> = HashMap::new();
    for finding in &report.findings {
        match (finding.row, finding.position) {
            (Some(row), Some(position)) => {
                let entry = cell_notes
                    .entry((row, position))
                    .or_insert((finding.highlight, Vec::new()));
                entry.1.push(&finding.message);
                comments.entry(row).or_default().push(&finding.message);
            }
            (None, Some(position)) => {
                column_fills.entry(position).or_insert(finding.highlight);
            }
            _ => {}
        }
    }

    let mut workbook = Workbook::new();
    let sheet = workbook.add_worksheet().set_name("Data")?;
    let mut headers = data.columns().names();
    let comments_col = headers.len() as u16;
    headers.push("Comments".to_string());
    write_header(sheet, &headers)?;
    for (&position, &highlight) in &column_fills {
        let format = fill(highlight_fill(highlight)).set_bold();
        sheet.write_string_with_format(0, position as u16, &headers[position], &format)?;
    }

    for (row_idx, row) in data.rows().iter().enumerate() {
        let out_row = row_idx as u32 + 1;
        for (position, cell) in row.cells.iter().enumerate() {
            let col = position as u16;
            if let Some((highlight, messages)) = cell_notes.get(&(row_idx, position)) {
                let format = fill(highlight_fill(*highlight));
                write_value(sheet, out_row, col, cell.as_ref(), Some(&format))?;
                let note = Note::new(messages.join("\n")).set_author(NOTE_AUTHOR);
                sheet.insert_note(out_row, col, &note)?;
            } else if let Some(highlight) = column_fills.get(&position) {
                let format = fill(highlight_fill(*highlight));
                write_value(sheet, out_row, col, cell.as_ref(), Some(&format))?;
            } else {
                write_value(sheet, out_row, col, cell.as_ref(), None)?;
            }
        }
        if let Some(messages) = comments.get(&row_idx) {
            sheet.write_string(out_row, comments_col, messages.join("; "))?;
        }
    }

    let sheet = workbook.add_worksheet().set_name("Findings")?;
    write_header(
        sheet,
        &[
            "Check".to_string(),
            "Column".to_string(),
            "Line".to_string(),
            "Message".to_string(),
        ],
    )?;
    for (idx, finding) in report.findings.iter().enumerate() {
        let row = idx as u32 + 1;
        sheet.write_string(row, 0, finding.check.label())?;
        sheet.write_string(row, 1, &finding.column)?;
        if let Some(line) = finding.line {
            sheet.write_number(row, 2, line as f64)?;
        }
        sheet.write_string(row, 3, &finding.message)?;
    }
    sheet.autofit();

    let sheet = workbook.add_worksheet().set_name("Check_Summary")?;
    write_header(
        sheet,
        &["Check".to_string(), "Status".to_string(), "Detail".to_string()],
    )?;
    for (idx, outcome) in report.outcomes.iter().enumerate() {
        let row = idx as u32 + 1;
        let (status, detail) = outcome_text(outcome);
        sheet.write_string(row, 0, outcome.check().label())?;
        sheet.write_string(row, 1, status)?;
        sheet.write_string(row, 2, detail)?;
    }

    workbook
        .save(path)
        .with_context(|| format!("Writing check workbook {path:?}"))?;
    info!("Check report written to {path:?}");
    Ok(())
}

pub fn outcome_text(outcome: &CheckOutcome) -> (&'static str, String) {
    match outcome {
        CheckOutcome::Passed { .. } => ("passed", String::new()),
        CheckOutcome::Failed { findings, .. } => ("failed", format!("{findings} finding(s)")),
        CheckOutcome::Skipped { reason, .. } => ("skipped", reason.clone()),
    }
}

/// Plain single-sheet workbook with a bold header row.
pub fn write_table_workbook(
    path: &Path,
    sheet_name: &str,
    headers: &[String],
    rows: &[Vec<Cell>],
) -> Result<()> {
    let mut workbook = Workbook::new();
    let sheet = workbook.add_worksheet().set_name(sheet_name)?;
    write_header(sheet, headers)?;
    for (idx, row) in rows.iter().enumerate() {
        for (col, cell) in row.iter().enumerate() {
            write_value(sheet, idx as u32 + 1, col as u16, cell.as_ref(), None)?;
        }
    }
    sheet.autofit();
    workbook
        .save(path)
        .with_context(|| format!("Writing workbook {path:?}"))?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{aggregate::aggregate, matcher::match_datasets};
    use calamine::{Data, Reader, open_workbook_auto};

    fn dataset(name: &str, rows: &[(&str, i64)]) -> Dataset {
        let headers = vec!["sku".to_string(), "price".to_string()];
        let rows = rows
            .iter()
            .enumerate()
            .map(|(idx, (sku, price))| {
                Row::new(
                    idx + 2,
                    vec![
                        Some(Value::String(sku.to_string())),
                        Some(Value::Integer(*price)),
                    ],
                )
            })
            .collect();
        Dataset::new(name, &headers, rows).unwrap()
    }

    #[test]
    fn profile_selects_sheet_names() {
        assert_eq!(
            Profile::Database.sheet_names().unmatched_secondary,
            "DataInDbNotInFlatfile"
        );
        assert_eq!(
            Profile::GroundTruth.sheet_names().matched,
            "Pipeline_Comparison_Report"
        );
    }

    #[test]
    fn timestamped_path_embeds_category() {
        let dir = tempfile::tempdir().unwrap();
        let path = timestamped_path(&dir.path().join("Reports"), "summary", "waste").unwrap();
        let name = path.file_name().unwrap().to_string_lossy().to_string();
        assert!(name.starts_with("summary_waste_"));
        assert!(name.ends_with(".xlsx"));
        assert!(dir.path().join("Reports").is_dir());
    }

    #[test]
    fn undefined_accuracy_renders_as_na() {
        assert_eq!(format_accuracy(None), "n/a");
        assert_eq!(format_accuracy(Some(80.0)), "80.00");
    }

    #[test]
    fn comparison_workbook_has_three_sheets() {
        let primary = dataset("pipeline", &[("a", 1), ("b", 2), ("c", 3)]);
        let secondary = dataset("ground truth", &[("a", 1), ("b", 5), ("d", 4)]);
        let keys = vec!["sku".to_string()];
        let result = match_datasets(&primary, &secondary, &keys).unwrap();
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("report.xlsx");
        write_comparison_workbook(&path, Profile::GroundTruth, &primary, &secondary, &keys, &result)
            .unwrap();

        let mut workbook = open_workbook_auto(&path).unwrap();
        assert_eq!(
            workbook.sheet_names(),
            vec![
                "Pipeline_Comparison_Report".to_string(),
                "InPipelineNotIn_GT".to_string(),
                "ExtraRowsInGT".to_string()
            ]
        );
        let matched = workbook.worksheet_range("Pipeline_Comparison_Report").unwrap();
        assert_eq!(matched.height(), 4);
        assert_eq!(
            matched.get_value((0, 0)),
            Some(&Data::String("Composite_Key".into()))
        );
        let extra = workbook.worksheet_range("ExtraRowsInGT").unwrap();
        assert_eq!(extra.get_value((1, 0)), Some(&Data::String("d".into())));
    }

    #[test]
    fn summary_lines_separate_unmatched_counts() {
        let primary = dataset("p", &[("a", 1), ("b", 2)]);
        let secondary = dataset("s", &[("a", 1), ("c", 2)]);
        let result = match_datasets(&primary, &secondary, &["sku".to_string()]).unwrap();
        let summary = aggregate(&result, &primary, &secondary, None).unwrap();
        let lines = summary_lines(&summary);
        assert_eq!(lines.len(), 5);
        assert_eq!(lines[1].issue_type, "price");
        assert_eq!(lines[1].accuracy, Some(100.0));
        assert_eq!(lines[2].level, IssueLevel::File);
        assert_eq!(lines[2].count, 1);
        assert_eq!(lines[2].accuracy, Some(50.0));
        assert_eq!(lines[4].issue_type, "Duplicates Extraction");
        assert_eq!(lines[4].count, 0);
        assert_eq!(lines[4].accuracy, Some(100.0));
    }

    #[test]
    fn summary_workbook_reports_duplicated_rows() {
        let primary = dataset("p", &[("a", 1), ("a", 1), ("b", 2)]);
        let secondary = dataset("s", &[("a", 1), ("b", 2)]);
        let result = match_datasets(&primary, &secondary, &["sku".to_string()]).unwrap();
        let summary = aggregate(&result, &primary, &secondary, Some("sku")).unwrap();
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("summary.xlsx");
        write_summary_workbook(&path, &summary, Some("sku")).unwrap();

        let mut workbook = open_workbook_auto(&path).unwrap();
        let issues = workbook.worksheet_range("Category_Issue_Summary").unwrap();
        assert_eq!(
            issues.get_value((5, 0)),
            Some(&Data::String("Duplicates Extraction".into()))
        );
        assert_eq!(issues.get_value((5, 2)), Some(&Data::Float(1.0)));
        assert_eq!(issues.get_value((5, 3)), Some(&Data::Float(66.67)));
        assert_eq!(issues.get_value((5, 4)), Some(&Data::Float(1.0)));

        let files = workbook.worksheet_range("File_Level_Accuracy").unwrap();
        assert_eq!(
            files.get_value((0, 5)),
            Some(&Data::String("Duplicate Rows".into()))
        );
        assert_eq!(files.get_value((1, 0)), Some(&Data::String("a".into())));
        assert_eq!(files.get_value((1, 5)), Some(&Data::Float(1.0)));
    }
}
