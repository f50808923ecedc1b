//! Data models for a weekly box-office run.
//!
//! - [`RunContext`]: the ISO year/week key that every step is parameterised by
//! - [`Record`]: one scraped ranking row, as staged between fetch and load
//! - [`RunState`]: where a run currently is in the four-step chain

use crate::errors::PipelineError;
use chrono::{Datelike, Local};
use std::fmt;
use url::Url;

/// The ISO-8601 year and week a run is keyed by.
///
/// Computed once per process and passed explicitly to every step, so no step
/// reads the wall clock on its own.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RunContext {
    pub year: i32,
    pub week: u32,
}

impl RunContext {
    /// Build a context, rejecting week numbers outside `1..=53`.
    pub fn new(year: i32, week: u32) -> Result<Self, PipelineError> {
        if !(1..=53).contains(&week) {
            return Err(PipelineError::InvalidWeek(week));
        }
        Ok(Self { year, week })
    }

    /// The ISO year/week of the local date right now.
    pub fn current() -> Self {
        let iso = Local::now().date_naive().iso_week();
        Self {
            year: iso.year(),
            week: iso.week(),
        }
    }

    /// Ranking page for this week, e.g. `{base}/2024W7/`.
    pub fn source_url(&self, base_url: &str) -> Result<Url, PipelineError> {
        let base = format!("{}/", base_url.trim_end_matches('/'));
        Ok(Url::parse(&base)?.join(&format!("{}W{}/", self.year, self.week))?)
    }
}

impl fmt::Display for RunContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}W{}", self.year, self.week)
    }
}

/// One ranking row scraped from the weekly page.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Record {
    /// 1-based position on the chart.
    pub rank: u32,
    /// Release title with commas stripped.
    pub title: String,
    /// Weekly gross in whole currency units.
    pub gross: u64,
}

impl Record {
    /// Staging form: `rank,title,gross` without a trailing newline.
    pub fn to_line(&self) -> String {
        format!("{},{},{}", self.rank, self.title, self.gross)
    }
}

/// Progress of a run through the step chain.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunState {
    Pending,
    Fetched,
    Loaded,
    Validated,
    Cleaned,
    /// Terminal; carries the step that failed.
    Failed(Step),
}

/// The four invocable units of the pipeline.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Step {
    Fetch,
    Load,
    Validate,
    Clean,
}

impl Step {
    /// State reached when this step succeeds.
    pub fn completes_to(self) -> RunState {
        match self {
            Step::Fetch => RunState::Fetched,
            Step::Load => RunState::Loaded,
            Step::Validate => RunState::Validated,
            Step::Clean => RunState::Cleaned,
        }
    }
}

impl fmt::Display for Step {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Step::Fetch => "fetch",
            Step::Load => "load",
            Step::Validate => "validate",
            Step::Clean => "clean",
        };
        f.write_str(name)
    }
}
