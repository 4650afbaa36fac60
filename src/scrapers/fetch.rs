//! Where the page snapshot comes from.
//!
//! Both sources make exactly one attempt; scheduling a retry is left to
//! whatever invokes the pipeline.

use crate::config::FetchConfig;
use crate::error::PipelineError;
use reqwest::header::{ACCEPT, ACCEPT_LANGUAGE, HeaderMap, HeaderValue};
use std::path::PathBuf;
use std::time::Duration;
use tracing::{info, instrument};

/// Produces the markup snapshot consumed by the extractor.
pub trait SnapshotSource {
    async fn snapshot(&self) -> Result<String, PipelineError>;
}

/// Fetches the source page over HTTP with browser-like headers.
#[derive(Debug)]
pub struct HttpSnapshot {
    client: reqwest::Client,
    url: String,
}

impl HttpSnapshot {
    pub fn new(config: &FetchConfig) -> Result<Self, PipelineError> {
        let mut headers = HeaderMap::new();
        headers.insert(
            ACCEPT,
            HeaderValue::from_static("text/html,application/xhtml+xml,application/xml;q=0.9,*/*;q=0.8"),
        );
        headers.insert(
            ACCEPT_LANGUAGE,
            HeaderValue::from_str(&config.accept_language)
                .map_err(|e| PipelineError::Config(format!("accept_language: {e}")))?,
        );
        let client = reqwest::Client::builder()
            .user_agent(config.user_agent.clone())
            .default_headers(headers)
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .map_err(|e| PipelineError::Fetch(e.to_string()))?;
        Ok(Self {
            client,
            url: config.source_url.clone(),
        })
    }
}

impl SnapshotSource for HttpSnapshot {
    #[instrument(level = "info", skip_all, fields(url = %self.url))]
    async fn snapshot(&self) -> Result<String, PipelineError> {
        let response = self
            .client
            .get(&self.url)
            .send()
            .await
            .and_then(|r| r.error_for_status())
            .map_err(|e| PipelineError::Fetch(e.to_string()))?;
        let html = response
            .text()
            .await
            .map_err(|e| PipelineError::Fetch(e.to_string()))?;
        info!(bytes = html.len(), "Fetched source page");
        Ok(html)
    }
}

/// Reads a snapshot rendered by an external tool.
#[derive(Debug)]
pub struct FileSnapshot {
    pub path: PathBuf,
}

impl SnapshotSource for FileSnapshot {
    #[instrument(level = "info", skip_all, fields(path = %self.path.display()))]
    async fn snapshot(&self) -> Result<String, PipelineError> {
        let html = tokio::fs::read_to_string(&self.path)
            .await
            .map_err(|e| PipelineError::Fetch(format!("{}: {e}", self.path.display())))?;
        info!(bytes = html.len(), "Read snapshot file");
        Ok(html)
    }
}
