//! Command-line interface definitions for the box-office ETL job.
//!
//! The four pipeline steps are exposed as subcommands so an external
//! scheduler can invoke them one at a time, in order. `run` chains all four
//! in a single process. Every option can also come from an environment
//! variable or, for the paths and URL, from a YAML config file.

use clap::{Parser, Subcommand};
use std::path::PathBuf;

/// Command-line arguments for the box-office ETL job.
///
/// # Examples
///
/// ```sh
/// # Whole pipeline for the current ISO week
/// box_office_etl run
///
/// # One step at a time, as a scheduler would drive it
/// box_office_etl fetch --year 2024 --week 7
/// box_office_etl load --year 2024 --week 7
/// box_office_etl validate --year 2024 --week 7
/// box_office_etl clean
/// ```
#[derive(Parser, Debug)]
#[command(author, version, about)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,

    /// ISO year of the run (defaults to the current ISO year)
    #[arg(long, env = "BOX_OFFICE_YEAR", requires = "week", global = true)]
    pub year: Option<i32>,

    /// ISO week of the run (defaults to the current ISO week)
    #[arg(long, env = "BOX_OFFICE_WEEK", requires = "year", global = true)]
    pub week: Option<u32>,

    /// Base URL of the weekly ranking pages
    #[arg(long, env = "BOX_OFFICE_BASE_URL", global = true)]
    pub base_url: Option<String>,

    /// Path of the staging file shared between steps
    #[arg(long, env = "BOX_OFFICE_STAGING", global = true)]
    pub staging_path: Option<PathBuf>,

    /// Path of the SQLite database
    #[arg(long = "database", env = "BOX_OFFICE_DB", global = true)]
    pub database_path: Option<PathBuf>,

    /// User-Agent header sent with the page request
    #[arg(long, global = true)]
    pub user_agent: Option<String>,

    /// Optional path to a config.yaml file
    #[arg(short, long, env = "BOX_OFFICE_CONFIG", global = true)]
    pub config: Option<PathBuf>,
}

/// Pipeline steps, plus `run` for all of them.
#[derive(Subcommand, Debug, Clone, Copy, PartialEq, Eq)]
pub enum Command {
    /// Fetch, load, validate and clean in one go
    Run,
    /// Scrape the ranking page into the staging file
    Fetch,
    /// Load the staging file into the database
    Load,
    /// Check stored rows against the staging file
    Validate,
    /// Delete the staging file
    Clean,
}
