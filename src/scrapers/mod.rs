//! Ranking page retrieval and parsing.
//!
//! Retrieval sits behind the [`PageSource`] trait so the fetch step can run
//! against a live site ([`HttpPageSource`]) or against fixed HTML in tests.
//! Parsing lives in [`boxofficemojo`].
//!
//! One request per run, no retry. A transport error or a non-success status
//! aborts the run.

pub mod boxofficemojo;

use crate::errors::PipelineError;
use crate::utils::truncate_for_log;
use reqwest::Client;
use std::time::Instant;
use tracing::{debug, info, instrument, warn};
use url::Url;

/// Something that can return the HTML body at a URL.
pub trait PageSource {
    async fn fetch_page(&self, url: &Url) -> Result<String, PipelineError>;
}

/// [`PageSource`] backed by a `reqwest` client.
#[derive(Debug, Clone)]
pub struct HttpPageSource {
    client: Client,
}

impl HttpPageSource {
    pub fn new(user_agent: &str) -> Result<Self, PipelineError> {
        let client = Client::builder().user_agent(user_agent).build()?;
        Ok(Self { client })
    }
}

impl PageSource for HttpPageSource {
    #[instrument(level = "info", skip_all, fields(%url))]
    async fn fetch_page(&self, url: &Url) -> Result<String, PipelineError> {
        let t0 = Instant::now();
        let response = self.client.get(url.clone()).send().await?;
        let status = response.status();
        let response = match response.error_for_status() {
            Ok(r) => r,
            Err(e) => {
                warn!(%status, "Ranking page returned an error status");
                return Err(e.into());
            }
        };
        let body = response.text().await?;
        info!(
            %status,
            bytes = body.len(),
            elapsed_ms = t0.elapsed().as_millis() as u64,
            "Fetched ranking page"
        );
        debug!(preview = %truncate_for_log(&body, 300), "Ranking page body");
        Ok(body)
    }
}
