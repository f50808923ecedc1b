//! # Box Office ETL
//!
//! A weekly job that scrapes the box-office ranking for one ISO week, stages
//! the rows in a text file, loads them into SQLite, checks that the load is
//! complete, and removes the staging file.
//!
//! ## Usage
//!
//! ```sh
//! box_office_etl run
//! box_office_etl fetch --year 2024 --week 7 --staging-path /tmp/boxoffice.txt
//! ```
//!
//! ## Architecture
//!
//! The job is a strictly linear pipeline:
//! 1. **Fetch**: GET `{base_url}/{year}W{week}/`, parse the table, write the staging file
//! 2. **Load**: insert one `box_office` row per staged line, tagged with year and week
//! 3. **Validate**: stored rows for the week must equal staged lines
//! 4. **Clean**: delete the staging file
//!
//! Any failure aborts the run with a non-zero exit; scheduling and retrying
//! are left to whatever invokes the binary.

use clap::Parser;
use std::error::Error;
use tracing::{debug, info};
use tracing_subscriber::{EnvFilter, fmt as tfmt};

mod cli;
mod config;
mod db;
mod errors;
mod models;
mod pipeline;
mod scrapers;
mod staging;
mod utils;

use cli::{Cli, Command};
use config::{Settings, run_context};
use models::Step;
use pipeline::Pipeline;
use scrapers::HttpPageSource;

#[tokio::main]
async fn main() -> Result<(), Box<dyn Error>> {
    // --- Tracing init ---
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tfmt()
        .with_env_filter(filter)
        .with_target(true)
        .with_file(false)
        .with_line_number(false)
        .with_timer(tracing_subscriber::fmt::time::UtcTime::rfc_3339())
        .init();

    let start_time = std::time::Instant::now();
    info!("box_office_etl starting up");

    let args = Cli::parse();
    debug!(?args, "Parsed CLI arguments");

    let settings = Settings::resolve(&args).await?;
    let ctx = run_context(&args)?;
    info!(
        %ctx,
        command = ?args.command,
        staging_path = %settings.staging_path.display(),
        database_path = %settings.database_path.display(),
        "Resolved run"
    );

    let source = HttpPageSource::new(&settings.user_agent)?;
    let mut pipeline = Pipeline::new(&source, &settings, ctx);

    let result = match args.command {
        Command::Run => pipeline.run().await,
        Command::Fetch => pipeline.execute(Step::Fetch).await,
        Command::Load => pipeline.execute(Step::Load).await,
        Command::Validate => pipeline.execute(Step::Validate).await,
        Command::Clean => pipeline.execute(Step::Clean).await,
    };

    let elapsed = start_time.elapsed();
    if let Err(e) = result {
        info!(%ctx, state = ?pipeline.state(), ?elapsed, "Run aborted");
        return Err(e.into());
    }

    info!(
        %ctx,
        state = ?pipeline.state(),
        ?elapsed,
        secs = elapsed.as_secs(),
        millis = elapsed.subsec_millis(),
        "Execution complete"
    );
    Ok(())
}
