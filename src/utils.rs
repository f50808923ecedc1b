//! Small helpers shared by the steps.
//!
//! - String truncation for log previews
//! - Parent directory creation for the staging file and the database

use crate::errors::PipelineError;
use std::path::Path;
use tokio::fs;
use tracing::{debug, instrument};

/// Truncate a string for logging purposes.
///
/// Long strings are cut to `max` bytes (backed off to a char boundary) with
/// an ellipsis and the number of dropped bytes appended.
///
/// # Examples
///
/// ```ignore
/// assert_eq!(truncate_for_log("short", 100), "short");
/// assert_eq!(truncate_for_log(&"a".repeat(500), 10), "aaaaaaaaaa…(+490 bytes)");
/// ```
pub fn truncate_for_log(s: &str, max: usize) -> String {
    if s.len() <= max {
        return s.to_string();
    }
    let mut end = max;
    while !s.is_char_boundary(end) {
        end -= 1;
    }
    format!("{}…(+{} bytes)", &s[..end], s.len() - end)
}

/// Make sure the directory that will hold `path` exists.
///
/// # Errors
///
/// Returns [`PipelineError::Io`] if the directory cannot be created.
#[instrument(level = "debug", skip_all, fields(path = %path.display()))]
pub async fn ensure_parent_dir(path: &Path) -> Result<(), PipelineError> {
    let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) else {
        return Ok(());
    };
    fs::create_dir_all(parent)
        .await
        .map_err(|e| PipelineError::io(parent, e))?;
    debug!(dir = %parent.display(), "Parent directory ready");
    Ok(())
}
