//! `check` command: load one dataset and its lookups, run the business checks, report.

use anyhow::{Context, Result, bail};
use log::info;

use crate::{
    checks::{AliasLookup, CheckInputs, run_checks},
    cli::CheckArgs,
    compare::dataset_label,
    config::{Overrides, ValidationConfig},
    data::CellParser,
    loader::{LoadOptions, load_dataset, load_optional},
    report, table,
};

pub fn execute(args: &CheckArgs) -> Result<()> {
    let config = ValidationConfig::load_or_default(args.config.as_deref())?.apply(Overrides {
        category: args.category.clone(),
        report_dir: args.report_dir.clone(),
        generic_lookup: args.generic_lookup.clone(),
        conditional_lookup: args.conditional_lookup.clone(),
        ..Overrides::default()
    })?;
    let options = LoadOptions {
        delimiter: args.input.delimiter,
        encoding: args.input.input_encoding.clone(),
        sheet: args.input.sheet.clone(),
        parser: CellParser::new(&config.null_tokens, config.datetime_as_date),
    };
    let data = load_dataset(
        &args.input_path,
        &dataset_label(&args.input_path, "data"),
        &options,
    )
    .with_context(|| format!("Loading dataset {:?}", args.input_path))?;

    // --sheet targets the checked dataset only.
    let lookup_options = LoadOptions {
        sheet: None,
        ..options.clone()
    };
    let generic_options = LoadOptions {
        sheet: args.generic_sheet.clone(),
        ..options.clone()
    };
    let generic = load_optional(
        config.checks.generic_lookup.as_ref(),
        "generic lookup",
        &generic_options,
    );
    let conditional = load_optional(
        config.checks.conditional_lookup.as_ref(),
        "conditional lookup",
        &lookup_options,
    );
    let alias_tables = config
        .checks
        .aliases
        .iter()
        .map(|alias| load_optional(Some(&alias.lookup), "alias lookup", &lookup_options))
        .collect::<Vec<_>>();

    let inputs = CheckInputs {
        generic: generic.as_ref(),
        conditional: conditional.as_ref(),
        aliases: config
            .checks
            .aliases
            .iter()
            .zip(&alias_tables)
            .map(|(check, table)| AliasLookup {
                check,
                table: table.as_ref(),
            })
            .collect(),
    };
    let check_report = run_checks(&data, &inputs, &config.checks)?;

    let path = report::timestamped_path(&config.report_dir, "highlighted_report", &config.category)?;
    report::write_check_workbook(&path, &data, &check_report)?;

    let headers = ["Check", "Status", "Detail"]
        .iter()
        .map(|h| h.to_string())
        .collect::<Vec<_>>();
    let rows = check_report
        .outcomes
        .iter()
        .map(|outcome| {
            let (status, detail) = report::outcome_text(outcome);
            vec![
                outcome.check().label().to_string(),
                status.to_string(),
                detail,
            ]
        })
        .collect::<Vec<_>>();
    table::print_table(&headers, &rows);
    info!(
        "{} finding(s) across {} check(s)",
        check_report.findings.len(),
        check_report.outcomes.len()
    );

    if args.strict && check_report.failed() {
        bail!("Business checks failed; see {path:?}");
    }
    Ok(())
}
