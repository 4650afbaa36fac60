//! Locating the daily essay in a page snapshot.
//!
//! Retrieval and extraction are kept apart:
//!
//! 1. **Snapshot**: a [`SnapshotSource`] returns the page markup, either
//!    fetched over HTTP ([`fetch::HttpSnapshot`]) or read from a file
//!    rendered elsewhere ([`fetch::FileSnapshot`]).
//! 2. **Extraction**: the [`Extractor`] runs the strategies in
//!    [`hobonichi`] in a fixed order and stops at the first one whose body
//!    reaches the minimum length.
//!
//! | Order | Strategy | Looks for |
//! |-------|----------|-----------|
//! | 1 | [`Strategy::Targeted`] | Known title/author/body markers, title in a template attribute |
//! | 2 | [`Strategy::Section`] | A large container mentioning the author |
//! | 3 | [`Strategy::MainContent`] | Kana paragraphs inside the main content area |
//!
//! Titles and authors found by an earlier strategy are kept even when its
//! body is rejected.

pub mod fetch;
pub mod hobonichi;

use crate::config::ExtractConfig;
use crate::error::PipelineError;
use crate::models::CandidateRecord;
use crate::utils::{dated_title, truncate_for_log};
use chrono::NaiveDate;
use regex::Regex;
use scraper::{Html, Selector};
use tracing::{debug, info, instrument, warn};

pub use fetch::{FileSnapshot, HttpSnapshot, SnapshotSource};

/// The extraction strategies, in the order they are tried.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Strategy {
    Targeted,
    Section,
    MainContent,
}

impl Strategy {
    pub const ORDER: [Strategy; 3] = [Strategy::Targeted, Strategy::Section, Strategy::MainContent];

    pub fn name(self) -> &'static str {
        match self {
            Strategy::Targeted => "targeted",
            Strategy::Section => "section",
            Strategy::MainContent => "main_content",
        }
    }
}

/// Compiled selectors and patterns for one extraction configuration.
#[derive(Debug)]
pub struct Extractor {
    pub(crate) title: Selector,
    pub(crate) author: Selector,
    pub(crate) body: Selector,
    pub(crate) paragraph: Selector,
    pub(crate) template_holder: Selector,
    pub(crate) template_attribute: String,
    pub(crate) template_title: Regex,
    pub(crate) main: Vec<Selector>,
    pub(crate) config: ExtractConfig,
}

fn compile(selector: &str) -> Result<Selector, PipelineError> {
    Selector::parse(selector)
        .map_err(|e| PipelineError::Config(format!("selector {selector:?}: {e}")))
}

impl Extractor {
    pub fn new(config: &ExtractConfig) -> Result<Self, PipelineError> {
        let field = regex::escape(&config.template_title_field);
        let template_title = Regex::new(&format!(
            r#"['"]?\b{field}\b['"]?\s*:\s*(?:'([^']*)'|"([^"]*)")"#
        ))
        .map_err(|e| PipelineError::Config(format!("template_title_field: {e}")))?;

        Ok(Self {
            title: compile(&config.title_selector)?,
            author: compile(&config.author_selector)?,
            body: compile(&config.body_selector)?,
            paragraph: compile(&config.paragraph_selector)?,
            template_holder: compile(&format!("[{}]", config.template_attribute))?,
            template_attribute: config.template_attribute.clone(),
            template_title,
            main: config
                .main_selectors
                .iter()
                .map(|s| compile(s))
                .collect::<Result<Vec<_>, _>>()?,
            config: config.clone(),
        })
    }

    /// Locate the essay in `snapshot`.
    ///
    /// `today` is used for the placeholder title when the page yields none.
    /// Fails with [`PipelineError::Extraction`] when no strategy finds a body
    /// of at least `min_body_chars` characters.
    #[instrument(level = "info", skip_all, fields(bytes = snapshot.len()))]
    pub fn extract(&self, snapshot: &str, today: NaiveDate) -> Result<CandidateRecord, PipelineError> {
        let document = Html::parse_document(snapshot);
        let min = self.config.min_body_chars;
        let mut candidate = CandidateRecord::default();

        for strategy in Strategy::ORDER {
            let found = match strategy {
                Strategy::Targeted => hobonichi::targeted(self, &document),
                Strategy::Section => hobonichi::section(self, &document),
                Strategy::MainContent => hobonichi::main_content(self, &document),
            };
            debug!(
                strategy = strategy.name(),
                title = ?found.title,
                body_chars = found.body_chars(),
                "Strategy finished"
            );
            candidate.absorb(found);

            if candidate.has_valid_body(min) {
                let title = candidate
                    .title
                    .take()
                    .unwrap_or_else(|| dated_title(&self.config.title_label, today));
                let author = candidate
                    .author
                    .take()
                    .unwrap_or_else(|| self.config.default_author.clone());
                info!(
                    strategy = strategy.name(),
                    title = %title,
                    author = %author,
                    body_chars = candidate.body_chars(),
                    "Extracted essay"
                );
                return Ok(CandidateRecord {
                    title: Some(title),
                    author: Some(author),
                    body: candidate.body,
                });
            }
        }

        warn!(
            body_chars = candidate.body_chars(),
            min,
            preview = %truncate_for_log(candidate.body.as_deref().unwrap_or(""), 80),
            "No strategy produced a usable body"
        );
        Err(PipelineError::Extraction(format!(
            "no body of at least {min} characters found (best had {})",
            candidate.body_chars()
        )))
    }
}
