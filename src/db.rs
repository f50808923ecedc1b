//! SQLite storage for loaded rankings.
//!
//! One flat table:
//!
//! ```sql
//! box_office(id INTEGER PRIMARY KEY AUTOINCREMENT, year INT, week INT,
//!            rank INT, title TEXT, gross INT)
//! ```
//!
//! Each step that touches storage opens its own single-connection pool with
//! [`connect`] and closes it before returning; nothing is shared across steps.

use crate::errors::PipelineError;
use crate::models::{Record, RunContext};
use crate::utils::ensure_parent_dir;
use sqlx::SqlitePool;
use sqlx::sqlite::{SqliteConnectOptions, SqlitePoolOptions};
use std::path::Path;
use tracing::{debug, info, instrument};

const CREATE_TABLE: &str = r"
    CREATE TABLE IF NOT EXISTS box_office
    (id INTEGER PRIMARY KEY AUTOINCREMENT, year INT, week INT, rank INT, title TEXT, gross INT)
";

const INSERT_ROW: &str = r"
    INSERT INTO box_office (year, week, rank, title, gross)
    VALUES (?, ?, ?, ?, ?)
";

const COUNT_ROWS: &str = "SELECT COUNT(*) FROM box_office WHERE year = ? AND week = ?";

/// Open the database file, creating it (and its directory) if needed.
#[instrument(level = "info", skip_all, fields(path = %path.display()))]
pub async fn connect(path: &Path) -> Result<SqlitePool, PipelineError> {
    ensure_parent_dir(path).await?;
    let options = SqliteConnectOptions::new()
        .filename(path)
        .create_if_missing(true);
    let pool = SqlitePoolOptions::new()
        .max_connections(1)
        .connect_with(options)
        .await?;
    debug!("Opened database");
    Ok(pool)
}

/// Create `box_office` if it does not exist yet.
pub async fn ensure_schema(pool: &SqlitePool) -> Result<(), PipelineError> {
    sqlx::query(CREATE_TABLE).execute(pool).await?;
    Ok(())
}

/// Insert one row per record, tagged with the run's year and week.
///
/// Rows are appended unconditionally: inserting the same records twice for
/// a week stores them twice. All inserts commit together at the end; if one
/// fails, the transaction is dropped and SQLite rolls the pass back.
#[instrument(level = "info", skip_all, fields(%ctx, count = records.len()))]
pub async fn insert_records(
    pool: &SqlitePool,
    ctx: &RunContext,
    records: &[Record],
) -> Result<u64, PipelineError> {
    let mut tx = pool.begin().await?;
    let mut inserted = 0u64;

    for record in records {
        let gross = i64::try_from(record.gross).map_err(|_| PipelineError::GrossOutOfRange {
            rank: record.rank,
            gross: record.gross,
        })?;
        let result = sqlx::query(INSERT_ROW)
            .bind(ctx.year)
            .bind(ctx.week)
            .bind(record.rank)
            .bind(&record.title)
            .bind(gross)
            .execute(&mut *tx)
            .await?;
        inserted += result.rows_affected();
        debug!(rank = record.rank, title = %record.title, "Inserted row");
    }

    tx.commit().await?;
    info!(inserted, "Committed rows");
    Ok(inserted)
}

/// Rows stored for the run's (year, week).
#[instrument(level = "info", skip_all, fields(%ctx))]
pub async fn count_rows(pool: &SqlitePool, ctx: &RunContext) -> Result<u64, PipelineError> {
    let count: i64 = sqlx::query_scalar(COUNT_ROWS)
        .bind(ctx.year)
        .bind(ctx.week)
        .fetch_one(pool)
        .await?;
    Ok(count as u64)
}
