//! Error taxonomy for a pipeline run.
//!
//! Every step returns [`PipelineError`]. Nothing is recovered locally: an error
//! aborts the run and is surfaced to whatever scheduler invoked the binary.

use std::path::PathBuf;
use thiserror::Error;

/// Any failure that ends a run.
#[derive(Debug, Error)]
pub enum PipelineError {
    /// Transport failure or non-success status while fetching the ranking page.
    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("invalid URL: {0}")]
    Url(#[from] url::ParseError),

    /// A table row on the ranking page could not be turned into a record.
    #[error("could not parse ranking row {row}: {reason}")]
    Parse { row: usize, reason: String },

    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),

    /// Gross does not fit the storage integer column.
    #[error("gross {gross} for rank {rank} exceeds the storable range")]
    GrossOutOfRange { rank: u32, gross: u64 },

    /// A staging line did not split into exactly three fields.
    #[error("malformed staging line {line}: {content:?}")]
    StagingFormat { line: usize, content: String },

    /// Stored rows for the run disagree with the staged records.
    #[error(
        "the amount inserted does not match the amount scraped (inserted {inserted}, scraped {scraped})"
    )]
    CountMismatch { inserted: u64, scraped: u64 },

    #[error("I/O error on {}: {source}", .path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("configuration error: {0}")]
    Config(String),

    #[error("ISO week {0} is out of range (1..=53)")]
    InvalidWeek(u32),
}

impl PipelineError {
    /// Attach a path to an I/O error.
    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        PipelineError::Io {
            path: path.into(),
            source,
        }
    }
}
