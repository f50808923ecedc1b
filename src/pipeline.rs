//! The four pipeline steps and the run that chains them.
//!
//! ```text
//! PENDING ──fetch──▶ FETCHED ──load──▶ LOADED ──validate──▶ VALIDATED ──clean──▶ CLEANED
//!    │                  │                 │                    │
//!    └──────────────────┴─────────────────┴────────────────────┴──────▶ FAILED(step)
//! ```
//!
//! Every step takes the [`RunContext`] explicitly. Steps hand data to each
//! other only through the staging file and the database, so each one can
//! also be invoked on its own by an external scheduler. A failure stops the
//! run where it is: the staging file and any committed rows are left as they
//! were.

use crate::config::Settings;
use crate::db;
use crate::errors::PipelineError;
use crate::models::{Record, RunContext, RunState, Step};
use crate::scrapers::PageSource;
use crate::scrapers::boxofficemojo::parse_records;
use crate::staging;
use std::time::Instant;
use tracing::{error, info, instrument, warn};

/// Scrape the week's ranking page and stage its rows.
#[instrument(level = "info", skip_all, fields(%ctx))]
pub async fn fetch<S: PageSource>(
    source: &S,
    ctx: &RunContext,
    settings: &Settings,
) -> Result<Vec<Record>, PipelineError> {
    let url = ctx.source_url(&settings.base_url)?;
    info!(%url, "Fetching ranking page");

    let html = source.fetch_page(&url).await?;
    let records = parse_records(&html)?;
    staging::write_records(&settings.staging_path, &records).await?;

    info!(count = records.len(), "Fetch complete");
    Ok(records)
}

/// Load the staging file into `box_office`, tagging rows with the run's week.
#[instrument(level = "info", skip_all, fields(%ctx))]
pub async fn load(ctx: &RunContext, settings: &Settings) -> Result<u64, PipelineError> {
    let records = staging::read_records(&settings.staging_path).await?;

    let pool = db::connect(&settings.database_path).await?;
    let result = async {
        db::ensure_schema(&pool).await?;
        db::insert_records(&pool, ctx, &records).await
    }
    .await;
    pool.close().await;

    let inserted = result?;
    info!(inserted, "Load complete");
    Ok(inserted)
}

/// Compare stored rows for the run's week against staged records.
///
/// # Errors
///
/// [`PipelineError::CountMismatch`] when the counts differ.
#[instrument(level = "info", skip_all, fields(%ctx))]
pub async fn validate(ctx: &RunContext, settings: &Settings) -> Result<u64, PipelineError> {
    let pool = db::connect(&settings.database_path).await?;
    let result = async {
        db::ensure_schema(&pool).await?;
        db::count_rows(&pool, ctx).await
    }
    .await;
    pool.close().await;

    let inserted = result?;
    info!(inserted, "Inserted rows");

    let scraped = staging::count_records(&settings.staging_path).await?;
    info!(inserted, scraped, "DB inserts vs scraped records");

    if inserted != scraped {
        warn!(inserted, scraped, "Count mismatch");
        return Err(PipelineError::CountMismatch { inserted, scraped });
    }

    info!("Data validation complete");
    Ok(inserted)
}

/// Delete the staging file.
#[instrument(level = "info", skip_all)]
pub async fn clean(settings: &Settings) -> Result<(), PipelineError> {
    staging::remove(&settings.staging_path).await
}

/// One run of the pipeline for a single (year, week).
#[derive(Debug)]
pub struct Pipeline<'a, S> {
    source: &'a S,
    settings: &'a Settings,
    ctx: RunContext,
    state: RunState,
}

impl<'a, S: PageSource> Pipeline<'a, S> {
    pub fn new(source: &'a S, settings: &'a Settings, ctx: RunContext) -> Self {
        Self {
            source,
            settings,
            ctx,
            state: RunState::Pending,
        }
    }

    pub fn state(&self) -> RunState {
        self.state
    }

    /// Execute a single step and record the resulting state.
    #[instrument(level = "info", skip(self), fields(ctx = %self.ctx))]
    pub async fn execute(&mut self, step: Step) -> Result<(), PipelineError> {
        let t0 = Instant::now();
        let outcome = match step {
            Step::Fetch => fetch(self.source, &self.ctx, self.settings).await.map(drop),
            Step::Load => load(&self.ctx, self.settings).await.map(drop),
            Step::Validate => validate(&self.ctx, self.settings).await.map(drop),
            Step::Clean => clean(self.settings).await,
        };

        match outcome {
            Ok(()) => {
                self.state = step.completes_to();
                info!(
                    %step,
                    state = ?self.state,
                    elapsed_ms = t0.elapsed().as_millis() as u64,
                    "Step succeeded"
                );
                Ok(())
            }
            Err(e) => {
                self.state = RunState::Failed(step);
                error!(%step, error = %e, "Step failed; run aborted");
                Err(e)
            }
        }
    }

    /// Fetch, load, validate, clean. Stops at the first failure.
    pub async fn run(&mut self) -> Result<(), PipelineError> {
        for step in [Step::Fetch, Step::Load, Step::Validate, Step::Clean] {
            self.execute(step).await?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::tests::rows_for;
    use crate::scrapers::boxofficemojo::tests::ranking_page;
    use tempfile::{TempDir, tempdir};
    use url::Url;

    /// Serves one fixed page and remembers the URL it was asked for.
    struct StaticPage {
        html: String,
        requested: std::sync::Mutex<Vec<String>>,
    }

    impl StaticPage {
        fn new(html: String) -> Self {
            Self {
                html,
                requested: std::sync::Mutex::new(Vec::new()),
            }
        }
    }

    impl PageSource for StaticPage {
        async fn fetch_page(&self, url: &Url) -> Result<String, PipelineError> {
            self.requested.lock().unwrap().push(url.to_string());
            Ok(self.html.clone())
        }
    }

    fn settings(dir: &TempDir) -> Settings {
        Settings {
            base_url: "https://www.boxofficemojo.com/weekly".into(),
            staging_path: dir.path().join("boxoffice.txt"),
            database_path: dir.path().join("boxoffice.db"),
            user_agent: "test".into(),
        }
    }

    fn two_movies() -> StaticPage {
        StaticPage::new(ranking_page(&[
            ("1", "Movie A", "$10,000"),
            ("2", "Movie B", "$5,000"),
        ]))
    }

    async fn stored_count(settings: &Settings, ctx: &RunContext) -> u64 {
        let pool = db::connect(&settings.database_path).await.unwrap();
        let n = db::count_rows(&pool, ctx).await.unwrap();
        pool.close().await;
        n
    }

    #[tokio::test]
    async fn test_end_to_end_run() {
        let dir = tempdir().unwrap();
        let settings = settings(&dir);
        let ctx = RunContext::new(2024, 7).unwrap();
        let source = two_movies();

        let mut pipeline = Pipeline::new(&source, &settings, ctx);
        assert_eq!(pipeline.state(), RunState::Pending);

        pipeline.execute(Step::Fetch).await.unwrap();
        assert_eq!(pipeline.state(), RunState::Fetched);
        assert_eq!(
            source.requested.lock().unwrap().as_slice(),
            ["https://www.boxofficemojo.com/weekly/2024W7/"]
        );
        let staged = std::fs::read_to_string(&settings.staging_path).unwrap();
        assert_eq!(staged, "1,Movie A,10000\n2,Movie B,5000\n");

        pipeline.execute(Step::Load).await.unwrap();
        assert_eq!(pipeline.state(), RunState::Loaded);

        let pool = db::connect(&settings.database_path).await.unwrap();
        let rows = rows_for(&pool, &ctx).await;
        pool.close().await;
        assert_eq!(rows.len(), 2);
        assert!(rows.iter().all(|r| r.year == 2024 && r.week == 7));
        assert_eq!(rows[0].title, "Movie A");
        assert_eq!(rows[0].gross, 10000);
        assert_eq!(rows[1].rank, 2);

        pipeline.execute(Step::Validate).await.unwrap();
        assert_eq!(pipeline.state(), RunState::Validated);

        pipeline.execute(Step::Clean).await.unwrap();
        assert_eq!(pipeline.state(), RunState::Cleaned);
        assert!(!settings.staging_path.exists());
    }

    #[tokio::test]
    async fn test_run_chains_all_steps() {
        let dir = tempdir().unwrap();
        let settings = settings(&dir);
        let ctx = RunContext::new(2024, 7).unwrap();
        let source = two_movies();

        let mut pipeline = Pipeline::new(&source, &settings, ctx);
        pipeline.run().await.unwrap();

        assert_eq!(pipeline.state(), RunState::Cleaned);
        assert_eq!(stored_count(&settings, &ctx).await, 2);
        assert!(!settings.staging_path.exists());
    }

    #[tokio::test]
    async fn test_fetch_preserves_row_count_and_order() {
        let dir = tempdir().unwrap();
        let settings = settings(&dir);
        let ctx = RunContext::new(2024, 7).unwrap();
        let rows: Vec<(String, String, String)> = (1..=10)
            .map(|i| (i.to_string(), format!("Movie {i}"), format!("${},000", 11 - i)))
            .collect();
        let borrowed: Vec<(&str, &str, &str)> = rows
            .iter()
            .map(|(a, b, c)| (a.as_str(), b.as_str(), c.as_str()))
            .collect();
        let source = StaticPage::new(ranking_page(&borrowed));

        let records = fetch(&source, &ctx, &settings).await.unwrap();
        assert_eq!(records.len(), 10);
        assert!(records.iter().enumerate().all(|(i, r)| r.rank == i as u32 + 1));
        assert_eq!(staging::read_records(&settings.staging_path).await.unwrap(), records);
    }

    #[tokio::test]
    async fn test_multiline_title_stages_on_one_line() {
        let dir = tempdir().unwrap();
        let settings = settings(&dir);
        let ctx = RunContext::new(2024, 7).unwrap();
        let source = StaticPage::new(ranking_page(&[
            ("1", "Movie\n  A", "$10"),
            ("2", "Movie B", "$20"),
        ]));

        let records = fetch(&source, &ctx, &settings).await.unwrap();
        assert_eq!(records[0].title, "Movie A");
        assert_eq!(staging::count_records(&settings.staging_path).await.unwrap(), 2);
        assert_eq!(staging::read_records(&settings.staging_path).await.unwrap(), records);
        assert_eq!(load(&ctx, &settings).await.unwrap(), 2);
    }

    #[tokio::test]
    async fn test_loading_twice_duplicates_rows() {
        let dir = tempdir().unwrap();
        let settings = settings(&dir);
        let ctx = RunContext::new(2024, 7).unwrap();

        fetch(&two_movies(), &ctx, &settings).await.unwrap();
        assert_eq!(load(&ctx, &settings).await.unwrap(), 2);
        assert_eq!(load(&ctx, &settings).await.unwrap(), 2);

        assert_eq!(stored_count(&settings, &ctx).await, 4);
    }

    #[tokio::test]
    async fn test_validate_equal_counts() {
        let dir = tempdir().unwrap();
        let settings = settings(&dir);
        let ctx = RunContext::new(2024, 7).unwrap();

        fetch(&two_movies(), &ctx, &settings).await.unwrap();
        load(&ctx, &settings).await.unwrap();
        assert_eq!(validate(&ctx, &settings).await.unwrap(), 2);
    }

    #[tokio::test]
    async fn test_validate_more_rows_than_staged() {
        let dir = tempdir().unwrap();
        let settings = settings(&dir);
        let ctx = RunContext::new(2024, 7).unwrap();

        fetch(&two_movies(), &ctx, &settings).await.unwrap();
        load(&ctx, &settings).await.unwrap();
        std::fs::write(&settings.staging_path, "1,Movie A,10000\n").unwrap();

        match validate(&ctx, &settings).await {
            Err(PipelineError::CountMismatch { inserted, scraped }) => {
                assert_eq!(inserted, 2);
                assert_eq!(scraped, 1);
            }
            other => panic!("expected count mismatch, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_validate_fewer_rows_than_staged() {
        let dir = tempdir().unwrap();
        let settings = settings(&dir);
        let ctx = RunContext::new(2024, 7).unwrap();

        fetch(&two_movies(), &ctx, &settings).await.unwrap();
        load(&ctx, &settings).await.unwrap();
        std::fs::write(
            &settings.staging_path,
            "1,Movie A,10000\n2,Movie B,5000\n3,Movie C,100\n",
        )
        .unwrap();

        assert!(matches!(
            validate(&ctx, &settings).await,
            Err(PipelineError::CountMismatch {
                inserted: 2,
                scraped: 3
            })
        ));
    }

    #[tokio::test]
    async fn test_validate_ignores_other_weeks() {
        let dir = tempdir().unwrap();
        let settings = settings(&dir);
        let last_week = RunContext::new(2024, 6).unwrap();
        let this_week = RunContext::new(2024, 7).unwrap();

        fetch(&two_movies(), &last_week, &settings).await.unwrap();
        load(&last_week, &settings).await.unwrap();

        assert!(matches!(
            validate(&this_week, &settings).await,
            Err(PipelineError::CountMismatch {
                inserted: 0,
                scraped: 2
            })
        ));
    }

    #[tokio::test]
    async fn test_failed_validation_keeps_staging_file() {
        let dir = tempdir().unwrap();
        let settings = settings(&dir);
        let ctx = RunContext::new(2024, 7).unwrap();

        // rows already present for the week make the count come out high
        fetch(&two_movies(), &ctx, &settings).await.unwrap();
        load(&ctx, &settings).await.unwrap();

        let source = two_movies();
        let mut pipeline = Pipeline::new(&source, &settings, ctx);
        let err = pipeline.run().await.unwrap_err();

        assert!(matches!(err, PipelineError::CountMismatch { .. }));
        assert_eq!(pipeline.state(), RunState::Failed(Step::Validate));
        assert!(settings.staging_path.exists());
    }

    #[tokio::test]
    async fn test_parse_failure_stops_before_staging() {
        let dir = tempdir().unwrap();
        let settings = settings(&dir);
        let ctx = RunContext::new(2024, 7).unwrap();
        let source = StaticPage::new(ranking_page(&[("x", "Movie A", "$1")]));

        let mut pipeline = Pipeline::new(&source, &settings, ctx);
        let err = pipeline.run().await.unwrap_err();

        assert!(matches!(err, PipelineError::Parse { row: 1, .. }));
        assert_eq!(pipeline.state(), RunState::Failed(Step::Fetch));
        assert!(!settings.staging_path.exists());
        assert!(!settings.database_path.exists());
    }

    #[tokio::test]
    async fn test_clean_without_staging_file_fails() {
        let dir = tempdir().unwrap();
        let settings = settings(&dir);
        assert!(matches!(
            clean(&settings).await,
            Err(PipelineError::Io { .. })
        ));
    }

    #[tokio::test]
    async fn test_empty_week_validates() {
        let dir = tempdir().unwrap();
        let settings = settings(&dir);
        let ctx = RunContext::new(2024, 1).unwrap();
        let source = StaticPage::new(ranking_page(&[]));

        let mut pipeline = Pipeline::new(&source, &settings, ctx);
        pipeline.run().await.unwrap();
        assert_eq!(pipeline.state(), RunState::Cleaned);
    }
}
