//! The staging artifact handed from the fetch step to the load step.
//!
//! Plain text, one record per line as `rank,title,gross`. Fields are not
//! escaped; titles arrive with their commas already stripped by the parser.
//! The file lives at a single fixed path and is not locked, so two runs
//! sharing a path will overwrite each other.

use crate::errors::PipelineError;
use crate::models::Record;
use crate::utils::ensure_parent_dir;
use std::path::Path;
use tokio::fs;
use tracing::{info, instrument};

/// Write `records` to `path`, replacing whatever was there.
#[instrument(level = "info", skip_all, fields(path = %path.display(), count = records.len()))]
pub async fn write_records(path: &Path, records: &[Record]) -> Result<(), PipelineError> {
    ensure_parent_dir(path).await?;

    let body: String = records
        .iter()
        .map(|r| format!("{}\n", r.to_line()))
        .collect();
    fs::write(path, body)
        .await
        .map_err(|e| PipelineError::io(path, e))?;

    info!("Wrote staging artifact");
    Ok(())
}

/// Read every staged record back, in file order. Blank lines are skipped.
#[instrument(level = "info", skip_all, fields(path = %path.display()))]
pub async fn read_records(path: &Path) -> Result<Vec<Record>, PipelineError> {
    let body = read(path).await?;
    let records = body
        .lines()
        .enumerate()
        .filter(|(_, line)| !line.trim().is_empty())
        .map(|(i, line)| parse_line(i + 1, line))
        .collect::<Result<Vec<_>, _>>()?;

    info!(count = records.len(), "Read staging artifact");
    Ok(records)
}

/// Number of non-blank lines in the artifact.
#[instrument(level = "info", skip_all, fields(path = %path.display()))]
pub async fn count_records(path: &Path) -> Result<u64, PipelineError> {
    let body = read(path).await?;
    Ok(body.lines().filter(|l| !l.trim().is_empty()).count() as u64)
}

/// Delete the artifact. A missing file is reported as an error.
#[instrument(level = "info", skip_all, fields(path = %path.display()))]
pub async fn remove(path: &Path) -> Result<(), PipelineError> {
    fs::remove_file(path)
        .await
        .map_err(|e| PipelineError::io(path, e))?;
    info!("Removed staging artifact");
    Ok(())
}

async fn read(path: &Path) -> Result<String, PipelineError> {
    fs::read_to_string(path)
        .await
        .map_err(|e| PipelineError::io(path, e))
}

fn parse_line(line: usize, content: &str) -> Result<Record, PipelineError> {
    let malformed = || PipelineError::StagingFormat {
        line,
        content: content.to_string(),
    };

    let fields: Vec<&str> = content.split(',').collect();
    let [rank, title, gross] = fields.as_slice() else {
        return Err(malformed());
    };

    Ok(Record {
        rank: rank.trim().parse().map_err(|_| malformed())?,
        title: title.to_string(),
        gross: gross.trim().parse().map_err(|_| malformed())?,
    })
}
