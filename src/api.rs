//! The translation and summarization boundary.
//!
//! Translation is the expensive, external step of a run, so the pipeline
//! only reaches this module once the archive has confirmed the essay is new.
//!
//! # Architecture
//!
//! - [`AskAsync`]: one text-in/text-out request to an LLM
//! - [`AskFnWrapper`]: `awful_aj::api::ask` with a fixed chat template and a timeout
//! - [`RetryAsk`]: optional exponential-backoff decorator for any [`AskAsync`]
//! - [`Translator`]: what the pipeline needs (translate by mode, summarize)
//! - [`LlmTranslator`]: a [`Translator`] made of three [`AskAsync`] clients,
//!   one per chat template
//! - [`enrich`]: turns a [`CanonicalRecord`] into an [`EnrichedRecord`]
//!
//! # Retry Strategy
//!
//! The pipeline itself never retries. A non-zero `translation.retries`
//! wraps each client in [`RetryAsk`]:
//!
//! ```text
//! delay = min(base_delay * 2^(attempt-1), max_delay) + random_jitter(0..250ms)
//! ```

use crate::error::PipelineError;
use crate::models::{CanonicalRecord, EnrichedRecord};
use crate::utils::truncate_for_log;
use awful_aj::api::ask;
use awful_aj::{config::AwfulJadeConfig, template::ChatTemplate};
use rand::{Rng, rng};
use std::error::Error;
use std::fmt;
use std::time::{Duration as StdDuration, Instant};
use tokio::time::{sleep, timeout};
use tracing::{error, info, instrument, warn};

/// Trait for async LLM interaction.
///
/// Implementors send text to an LLM and return its response. The same trait
/// is implemented by decorators such as [`RetryAsk`].
pub trait AskAsync {
    /// The type of response returned by the LLM.
    type Response;

    /// Send text to the LLM and receive a response.
    async fn ask(&self, text: &str) -> Result<Self::Response, Box<dyn Error>>;
}

/// Wrapper that adds exponential backoff retry logic to any [`AskAsync`] implementation.
pub struct RetryAsk<T> {
    /// The underlying LLM client to wrap.
    inner: T,
    /// Maximum number of retry attempts before giving up.
    max_retries: usize,
    /// Initial delay between retries (doubles with each attempt).
    base_delay: StdDuration,
    /// Maximum delay cap to prevent excessive waiting.
    max_delay: StdDuration,
}

impl<T> RetryAsk<T>
where
    T: AskAsync,
{
    /// Create a new retry wrapper around an existing [`AskAsync`] implementation.
    ///
    /// # Example
    ///
    /// ```ignore
    /// let client = AskFnWrapper::new(&config, &template, Duration::from_secs(180));
    /// let retry_client = RetryAsk::new(client, 3, Duration::from_secs(1));
    /// ```
    pub fn new(inner: T, max_retries: usize, base_delay: StdDuration) -> Self {
        Self {
            inner,
            max_retries,
            base_delay,
            max_delay: StdDuration::from_secs(30),
        }
    }
}

impl<T> fmt::Debug for RetryAsk<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RetryAsk")
            .field("max_retries", &self.max_retries)
            .field("base_delay", &self.base_delay)
            .field("max_delay", &self.max_delay)
            .finish()
    }
}

impl<T> AskAsync for RetryAsk<T>
where
    T: AskAsync,
{
    type Response = T::Response;

    #[instrument(level = "info", skip_all)]
    async fn ask(&self, text: &str) -> Result<Self::Response, Box<dyn Error>> {
        let total_t0 = Instant::now();
        let mut attempt = 0usize;

        loop {
            let attempt_t0 = Instant::now();
            match self.inner.ask(text).await {
                Ok(resp) => {
                    return Ok(resp);
                }
                Err(e) => {
                    attempt += 1;
                    let attempt_dt = attempt_t0.elapsed();
                    let total_dt = total_t0.elapsed();

                    if attempt > self.max_retries {
                        error!(
                            attempt,
                            max = self.max_retries,
                            elapsed_ms_attempt = attempt_dt.as_millis() as u64,
                            elapsed_ms_total = total_dt.as_millis() as u64,
                            error = %e,
                            "ask() exhausted retries"
                        );
                        return Err(e);
                    }

                    // backoff calc
                    let shift = (attempt - 1).min(16) as u32;
                    let mut delay = self.base_delay.saturating_mul(1 << shift);
                    if delay > self.max_delay {
                        delay = self.max_delay;
                    }
                    let jitter_ms: u64 = rng().random_range(0..=250);
                    let delay = delay + StdDuration::from_millis(jitter_ms);

                    warn!(
                        attempt,
                        max = self.max_retries,
                        elapsed_ms_attempt = attempt_dt.as_millis() as u64,
                        elapsed_ms_total = total_dt.as_millis() as u64,
                        ?delay,
                        error = %e,
                        "ask() attempt failed; backing off"
                    );
                    sleep(delay).await;
                }
            }
        }
    }
}

/// Wrapper around `awful_aj::api::ask` that implements [`AskAsync`].
///
/// Each wrapper is bound to one chat template, which carries the system
/// prompt for its mode (title, essay or summary).
#[derive(Debug)]
pub struct AskFnWrapper<'a> {
    /// LLM configuration (API key, endpoint, model settings).
    pub config: &'a AwfulJadeConfig,
    /// Chat template defining the conversation structure.
    pub template: &'a ChatTemplate,
    /// Upper bound for a single request.
    pub timeout: StdDuration,
}

impl<'a> AskFnWrapper<'a> {
    pub fn new(config: &'a AwfulJadeConfig, template: &'a ChatTemplate, timeout: StdDuration) -> Self {
        Self {
            config,
            template,
            timeout,
        }
    }
}

impl<'a> AskAsync for AskFnWrapper<'a> {
    type Response = String;

    #[instrument(level = "info", skip_all)]
    async fn ask(&self, text: &str) -> Result<Self::Response, Box<dyn Error>> {
        let t0 = Instant::now();
        let res = match timeout(
            self.timeout,
            ask(self.config, text.to_string(), self.template, None, None),
        )
        .await
        {
            Ok(res) => res,
            Err(_) => Err(format!("request timed out after {:?}", self.timeout).into()),
        };
        let dt = t0.elapsed();

        match &res {
            Ok(_) => info!(elapsed_ms = dt.as_millis() as u64, "API call succeeded"),
            Err(e) => warn!(elapsed_ms = dt.as_millis() as u64, error = %e, "API call failed"),
        }
        res
    }
}

/// Which prompt a piece of text is translated with.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TranslationMode {
    /// Short strings: titles and names.
    Title,
    /// The essay body, paragraphs separated by blank lines.
    Body,
}

/// The text services a run depends on.
pub trait Translator {
    async fn translate(&self, text: &str, mode: TranslationMode) -> Result<String, Box<dyn Error>>;
    async fn summarize(&self, text: &str) -> Result<String, Box<dyn Error>>;
}

/// A [`Translator`] backed by one LLM client per chat template.
#[derive(Debug)]
pub struct LlmTranslator<A> {
    pub title: A,
    pub body: A,
    pub summary: A,
}

impl<A> Translator for LlmTranslator<A>
where
    A: AskAsync<Response = String>,
{
    async fn translate(&self, text: &str, mode: TranslationMode) -> Result<String, Box<dyn Error>> {
        match mode {
            TranslationMode::Title => self.title.ask(text).await,
            TranslationMode::Body => self.body.ask(text).await,
        }
    }

    async fn summarize(&self, text: &str) -> Result<String, Box<dyn Error>> {
        self.summary.ask(text).await
    }
}

/// The production translator: `awful_aj` clients, optionally retried.
pub type JadeTranslator<'a> = LlmTranslator<RetryAsk<AskFnWrapper<'a>>>;

/// Chat templates for the three requests a run makes.
#[derive(Debug)]
pub struct Templates {
    pub title: ChatTemplate,
    pub body: ChatTemplate,
    pub summary: ChatTemplate,
}

impl Templates {
    /// Load the named templates from the `awful_aj` template directory.
    #[instrument(level = "info", skip_all)]
    pub async fn load(title: &str, body: &str, summary: &str) -> Result<Self, PipelineError> {
        let load = |name: &str| {
            let name = name.to_string();
            async move {
                awful_aj::template::load_template(&name)
                    .await
                    .map_err(|e| PipelineError::Translation(format!("template {name:?}: {e}")))
            }
        };
        let templates = Self {
            title: load(title).await?,
            body: load(body).await?,
            summary: load(summary).await?,
        };
        info!(title, body, summary, "Loaded chat templates");
        Ok(templates)
    }

    pub fn translator<'a>(
        &'a self,
        config: &'a AwfulJadeConfig,
        request_timeout: StdDuration,
        retries: usize,
    ) -> JadeTranslator<'a> {
        let client = |template: &'a ChatTemplate| {
            RetryAsk::new(
                AskFnWrapper::new(config, template, request_timeout),
                retries,
                StdDuration::from_secs(1),
            )
        };
        LlmTranslator {
            title: client(&self.title),
            body: client(&self.body),
            summary: client(&self.summary),
        }
    }
}

fn required(what: &str, response: Result<String, Box<dyn Error>>) -> Result<String, PipelineError> {
    let text = response.map_err(|e| PipelineError::Translation(format!("{what}: {e}")))?;
    let text = text.trim();
    if text.is_empty() {
        return Err(PipelineError::Translation(format!("{what}: empty response")));
    }
    Ok(text.to_string())
}

/// Translate and summarize `record`.
///
/// Title and author use [`TranslationMode::Title`], the body
/// [`TranslationMode::Body`]; the summary is generated from the translated
/// body. Any failure or empty response aborts with
/// [`PipelineError::Translation`].
#[instrument(level = "info", skip_all, fields(fingerprint = %record.fingerprint))]
pub async fn enrich<T: Translator>(
    record: CanonicalRecord,
    translator: &T,
) -> Result<EnrichedRecord, PipelineError> {
    let t0 = Instant::now();
    let title = required(
        "title",
        translator.translate(&record.title, TranslationMode::Title).await,
    )?;
    let author = required(
        "author",
        translator.translate(&record.author, TranslationMode::Title).await,
    )?;
    let body = required(
        "body",
        translator.translate(&record.body_text(), TranslationMode::Body).await,
    )?;
    let summary = required("summary", translator.summarize(&body).await)?;

    info!(
        elapsed_ms_total = t0.elapsed().as_millis() as u64,
        translated_title = %title,
        summary = %truncate_for_log(&summary, 120),
        "Translated essay"
    );
    Ok(EnrichedRecord::from_canonical(record, title, author, body, summary))
}
