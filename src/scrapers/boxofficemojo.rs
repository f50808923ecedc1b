//! Weekly ranking table parser for Box Office Mojo.
//!
//! The weekly page (`/weekly/{year}W{week}/`) renders one `<table>` whose
//! first `<tr>` is the header. Each following row carries, in order:
//!
//! | cell | content |
//! |------|---------|
//! | 1 | rank this week |
//! | 2 | rank last week |
//! | 3 | release title |
//! | 4 | weekly gross, e.g. `$10,000` |
//!
//! Only cells 1, 3 and 4 are kept.

use crate::errors::PipelineError;
use crate::models::Record;
use itertools::Itertools;
use once_cell::sync::Lazy;
use regex::Regex;
use scraper::{ElementRef, Html, Selector};
use tracing::{debug, info, instrument};

static ROW_SELECTOR: Lazy<Selector> = Lazy::new(|| Selector::parse("tr").unwrap());
static CELL_SELECTOR: Lazy<Selector> = Lazy::new(|| Selector::parse("td").unwrap());

/// Currency symbols, thousands separators and whitespace.
static GROSS_NOISE: Lazy<Regex> = Lazy::new(|| Regex::new(r"[\$€£¥,\s]").unwrap());

/// Parse every data row of the ranking table into a [`Record`], in document order.
///
/// # Errors
///
/// Returns [`PipelineError::Parse`] (with the 1-based data row index) if a row
/// has fewer than four cells, a non-positive or non-numeric rank, an empty
/// title, a non-numeric gross, or repeats a rank already seen.
#[instrument(level = "info", skip_all, fields(bytes = html.len()))]
pub fn parse_records(html: &str) -> Result<Vec<Record>, PipelineError> {
    let document = Html::parse_document(html);

    let records = document
        .select(&ROW_SELECTOR)
        .skip(1)
        .enumerate()
        .map(|(i, row)| parse_row(i + 1, row))
        .collect::<Result<Vec<_>, _>>()?;

    if let Some(rank) = records.iter().map(|r| r.rank).duplicates().next() {
        let row = records.iter().positions(|r| r.rank == rank).nth(1).unwrap_or(0) + 1;
        return Err(PipelineError::Parse {
            row,
            reason: format!("rank {rank} appears more than once"),
        });
    }

    info!(count = records.len(), "Parsed ranking rows");
    Ok(records)
}

fn parse_row(row: usize, element: ElementRef<'_>) -> Result<Record, PipelineError> {
    let cells: Vec<String> = element
        .select(&CELL_SELECTOR)
        .map(|td| td.text().collect::<String>())
        .collect();

    if cells.len() < 4 {
        return Err(PipelineError::Parse {
            row,
            reason: format!("expected at least 4 cells, found {}", cells.len()),
        });
    }

    let rank_text = cells[0].trim();
    let rank = match rank_text.parse::<u32>() {
        Ok(r) if r > 0 => r,
        _ => {
            return Err(PipelineError::Parse {
                row,
                reason: format!("rank {rank_text:?} is not a positive integer"),
            });
        }
    };

    let title = clean_title(&cells[2]);
    if title.is_empty() {
        return Err(PipelineError::Parse {
            row,
            reason: "title is empty".to_string(),
        });
    }

    let gross_text = clean_gross(&cells[3]);
    let gross = gross_text.parse::<u64>().map_err(|_| PipelineError::Parse {
        row,
        reason: format!("gross {:?} is not a non-negative integer", cells[3].trim()),
    })?;

    debug!(row, rank, %title, gross, "Parsed row");
    Ok(Record { rank, title, gross })
}

/// Drop commas and fold whitespace runs (line breaks included) into single
/// spaces, so a title always stays on one staging line in one field.
pub fn clean_title(raw: &str) -> String {
    raw.replace(',', "").split_whitespace().join(" ")
}

/// Strip currency symbols and separators, leaving bare digits.
pub fn clean_gross(raw: &str) -> String {
    GROSS_NOISE.replace_all(raw, "").into_owned()
}
