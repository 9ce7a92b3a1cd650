pub mod aggregate;
pub mod check_cmd;
pub mod checks;
pub mod cli;
pub mod compare;
pub mod config;
pub mod data;
pub mod dataset;
pub mod diff;
pub mod error;
pub mod expected;
pub mod io_utils;
pub mod key;
pub mod loader;
pub mod matcher;
pub mod reconcile;
pub mod report;
pub mod table;

use std::{env, sync::OnceLock};

use anyhow::Result;
use clap::Parser;
use log::{LevelFilter, debug};

use crate::cli::{Cli, Commands};

pub use crate::{
    aggregate::{AccuracySummary, aggregate},
    data::{Cell, Value},
    dataset::{Dataset, Row},
    error::{ReconError, ReconResult, SchemaError, ZeroRowsError},
    key::generate_key,
    matcher::{MatchRecord, MatchResult, match_datasets},
    reconcile::reconcile,
};

static LOGGER: OnceLock<()> = OnceLock::new();

fn init_logging() {
    LOGGER.get_or_init(|| {
        let mut builder = env_logger::Builder::from_env(env_logger::Env::default());
        if env::var("RUST_LOG").is_err() {
            builder.filter_module("gt_recon", LevelFilter::Info);
        }
        let _ = builder.format_timestamp_millis().try_init();
    });
}

pub fn run() -> Result<()> {
    init_logging();
    let cli = Cli::parse();
    debug!("{:?}", cli.command);
    match cli.command {
        Commands::Compare(args) => compare::execute(&args),
        Commands::Check(args) => check_cmd::execute(&args),
        Commands::Expected(args) => expected::execute(&args),
    }
}
