//! Pipeline configuration.
//!
//! Every knob the pipeline reads lives here and is handed to the component
//! that needs it. All fields have defaults, so running without a
//! configuration file reproduces the behaviour of the published feed.
//!
//! # Example
//!
//! ```yaml
//! output_dir: ./docs
//! extract:
//!   min_body_chars: 200
//! feed:
//!   window: 30
//!   formats: [rss, atom]
//! translation:
//!   retries: 0
//! ```

use crate::error::PipelineError;
use crate::outputs::feed::FeedFormat;
use crate::scrapers::Extractor;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tracing::{info, instrument};
use url::Url;

/// Top-level configuration for one pipeline run.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct PipelineConfig {
    /// Directory holding the archive and the published feed files.
    pub output_dir: PathBuf,
    /// Archive file name inside `output_dir`.
    pub archive_file: String,
    pub fetch: FetchConfig,
    pub extract: ExtractConfig,
    pub normalize: NormalizeConfig,
    pub translation: TranslationConfig,
    pub feed: FeedSettings,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            output_dir: PathBuf::from("docs"),
            archive_file: "archive.json".to_string(),
            fetch: FetchConfig::default(),
            extract: ExtractConfig::default(),
            normalize: NormalizeConfig::default(),
            translation: TranslationConfig::default(),
            feed: FeedSettings::default(),
        }
    }
}

/// How the source page is retrieved when no snapshot file is given.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct FetchConfig {
    pub source_url: String,
    pub timeout_secs: u64,
    pub user_agent: String,
    pub accept_language: String,
}

impl Default for FetchConfig {
    fn default() -> Self {
        Self {
            source_url: "https://www.1101.com/".to_string(),
            timeout_secs: 30,
            user_agent: "Mozilla/5.0 (Macintosh; Intel Mac OS X 10_15_7) AppleWebKit/537.36"
                .to_string(),
            accept_language: "ja,en;q=0.9".to_string(),
        }
    }
}

/// Selectors and thresholds used to locate the essay in the page markup.
///
/// The defaults describe the 1101.com front page. `min_body_chars` and the
/// author marker are heuristics tied to that markup; they are configurable
/// but should only change when the page does.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ExtractConfig {
    /// Minimum body length, counted in characters, for a candidate to be accepted.
    pub min_body_chars: usize,
    pub title_selector: String,
    pub author_selector: String,
    pub body_selector: String,
    pub paragraph_selector: String,
    /// Attribute carrying a templating expression that may embed the title.
    pub template_attribute: String,
    /// Field name looked up inside that expression.
    pub template_title_field: String,
    /// Text that identifies the essay section in the heuristic strategy.
    pub author_marker: String,
    /// A section must hold more than this many characters to be considered.
    pub section_min_chars: usize,
    /// Containers tried, in order, by the main-content strategy.
    pub main_selectors: Vec<String>,
    pub max_fallback_paragraphs: usize,
    /// Label of the synthesized title used when the page yields none.
    pub title_label: String,
    pub default_author: String,
}

impl Default for ExtractConfig {
    fn default() -> Self {
        Self {
            min_body_chars: 200,
            title_selector: ".darling-title, .darling_title".to_string(),
            author_selector: ".darling-author, .darling_author".to_string(),
            body_selector: ".darling-body, .darling_body, .darling-text".to_string(),
            paragraph_selector: "p".to_string(),
            template_attribute: "x-data".to_string(),
            template_title_field: "title".to_string(),
            author_marker: "糸井重里".to_string(),
            section_min_chars: 500,
            main_selectors: vec![
                "main".to_string(),
                "div#main".to_string(),
                "div.main".to_string(),
            ],
            max_fallback_paragraphs: 20,
            title_label: "今日のダーリン".to_string(),
            default_author: "糸井重里".to_string(),
        }
    }
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct NormalizeConfig {
    /// Lines containing this phrase are site boilerplate and are dropped.
    pub footer_marker: String,
    /// Number of hex characters kept from the content digest.
    pub fingerprint_len: usize,
}

impl Default for NormalizeConfig {
    fn default() -> Self {
        Self {
            footer_marker: "ほぼ日の更新時間".to_string(),
            fingerprint_len: 12,
        }
    }
}

/// Chat templates and limits for the translation boundary.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct TranslationConfig {
    pub title_template: String,
    pub body_template: String,
    pub summary_template: String,
    pub timeout_secs: u64,
    /// Extra attempts after a failed request. Zero means a single request.
    pub retries: usize,
}

impl Default for TranslationConfig {
    fn default() -> Self {
        Self {
            title_template: "itoi_title".to_string(),
            body_template: "itoi_essay".to_string(),
            summary_template: "itoi_summary".to_string(),
            timeout_secs: 180,
            retries: 0,
        }
    }
}

/// Feed-level metadata and rendering options.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct FeedSettings {
    pub title: String,
    pub subtitle: String,
    /// Canonical site URL; entry identifiers are fragments of it.
    pub site_url: String,
    /// Page every entry links to.
    pub entry_link: String,
    pub language: String,
    pub icon_url: Option<String>,
    pub thumbnail_url: Option<String>,
    pub publisher: String,
    /// Author used when a record carries neither a translated nor an original author.
    pub default_author: String,
    pub rss_file: String,
    pub atom_file: String,
    /// Number of most recent records rendered into a feed.
    pub window: usize,
    pub formats: Vec<FeedFormat>,
}

impl Default for FeedSettings {
    fn default() -> Self {
        Self {
            title: "Itoi's Daily Essay (Translated)".to_string(),
            subtitle: "Daily essays by Shigesato Itoi from 1101.com, translated to English"
                .to_string(),
            site_url: "https://adtheriault.github.io/itoi-daily/".to_string(),
            entry_link: "https://www.1101.com/".to_string(),
            language: "en".to_string(),
            icon_url: Some("https://www.1101.com/favicon.ico".to_string()),
            thumbnail_url: Some("https://www.1101.com/images/ogp.png".to_string()),
            publisher: "Hobo Nikkan Itoi Shinbun".to_string(),
            default_author: "Shigesato Itoi".to_string(),
            rss_file: "feed.xml".to_string(),
            atom_file: "atom.xml".to_string(),
            window: 30,
            formats: vec![FeedFormat::Rss, FeedFormat::Atom],
        }
    }
}

impl FeedSettings {
    pub fn file_name(&self, format: FeedFormat) -> &str {
        match format {
            FeedFormat::Rss => &self.rss_file,
            FeedFormat::Atom => &self.atom_file,
        }
    }

    pub fn site_url(&self) -> Result<Url, PipelineError> {
        Url::parse(&self.site_url)
            .map_err(|e| PipelineError::Config(format!("site_url {:?}: {e}", self.site_url)))
    }

    /// Absolute URL the given feed document is published at.
    pub fn self_url(&self, format: FeedFormat) -> Result<Url, PipelineError> {
        let file = self.file_name(format);
        self.site_url()?
            .join(file)
            .map_err(|e| PipelineError::Config(format!("feed file {file:?}: {e}")))
    }
}

impl PipelineConfig {
    /// Load configuration from a YAML file, or the defaults when `path` is `None`.
    #[instrument(level = "info", skip_all, fields(path = ?path))]
    pub fn load(path: Option<&Path>) -> Result<Self, PipelineError> {
        let config = match path {
            Some(path) => {
                let raw = std::fs::read_to_string(path).map_err(|e| {
                    PipelineError::Config(format!("cannot read {}: {e}", path.display()))
                })?;
                let parsed: PipelineConfig = serde_yaml::from_str(&raw)
                    .map_err(|e| PipelineError::Config(format!("{}: {e}", path.display())))?;
                info!("Loaded pipeline configuration");
                parsed
            }
            None => {
                info!("No configuration file given; using defaults");
                PipelineConfig::default()
            }
        };
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), PipelineError> {
        if self.feed.window == 0 {
            return Err(PipelineError::Config("feed.window must be at least 1".into()));
        }
        if self.normalize.fingerprint_len == 0 || self.normalize.fingerprint_len > 64 {
            return Err(PipelineError::Config(
                "normalize.fingerprint_len must be between 1 and 64".into(),
            ));
        }
        Url::parse(&self.fetch.source_url)
            .map_err(|e| PipelineError::Config(format!("fetch.source_url: {e}")))?;
        Url::parse(&self.feed.entry_link)
            .map_err(|e| PipelineError::Config(format!("feed.entry_link: {e}")))?;
        for format in &self.feed.formats {
            self.feed.self_url(*format)?;
        }
        Extractor::new(&self.extract)?;
        Ok(())
    }

    pub fn archive_path(&self) -> PathBuf {
        self.output_dir.join(&self.archive_file)
    }

    pub fn feed_path(&self, format: FeedFormat) -> PathBuf {
        self.output_dir.join(self.feed.file_name(format))
    }
}
