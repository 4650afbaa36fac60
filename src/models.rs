//! Records passed between the pipeline stages.
//!
//! - [`CandidateRecord`]: what an extraction strategy found in the page
//! - [`CanonicalRecord`]: the cleaned essay with its content fingerprint
//! - [`EnrichedRecord`]: a canonical record plus its translation; the only
//!   type that is persisted
//!
//! The archive file predates this crate, so [`EnrichedRecord`] also accepts
//! the older field names (`hash`, `date`, `translation`) and a body stored as
//! a single string.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Deserializer, Serialize};

/// A possibly partial essay located in the page markup.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CandidateRecord {
    pub title: Option<String>,
    pub author: Option<String>,
    pub body: Option<String>,
}

impl CandidateRecord {
    /// Length of the body in characters, or zero when there is none.
    pub fn body_chars(&self) -> usize {
        self.body.as_deref().map_or(0, |b| b.chars().count())
    }

    /// A candidate is usable once its body reaches `min_chars` characters.
    pub fn has_valid_body(&self, min_chars: usize) -> bool {
        self.body.is_some() && self.body_chars() >= min_chars
    }

    /// Merge a later strategy's findings into this candidate.
    ///
    /// Title and author found earlier are never overwritten; a body found
    /// later replaces the earlier (rejected) one.
    pub fn absorb(&mut self, later: CandidateRecord) {
        if self.title.is_none() {
            self.title = later.title;
        }
        if self.author.is_none() {
            self.author = later.author;
        }
        if later.body.is_some() {
            self.body = later.body;
        }
    }
}

/// The cleaned essay: deduplicated paragraphs and their fingerprint.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CanonicalRecord {
    pub title: String,
    pub author: String,
    pub body: Vec<String>,
    pub fingerprint: String,
    pub created_at: DateTime<Utc>,
}

impl CanonicalRecord {
    /// The body as sent to translation: paragraphs separated by a blank line.
    pub fn body_text(&self) -> String {
        self.body.join("\n\n")
    }
}

/// A canonical record together with its translation and summary.
///
/// Never mutated once created.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
pub struct EnrichedRecord {
    pub title: String,
    #[serde(default)]
    pub author: String,
    #[serde(deserialize_with = "paragraphs")]
    pub body: Vec<String>,
    #[serde(alias = "hash")]
    pub fingerprint: String,
    #[serde(alias = "date")]
    pub created_at: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub translated_title: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub translated_author: Option<String>,
    #[serde(default, alias = "translation", skip_serializing_if = "Option::is_none")]
    pub translated_body: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub summary: Option<String>,
}

impl EnrichedRecord {
    pub fn from_canonical(
        record: CanonicalRecord,
        translated_title: String,
        translated_author: String,
        translated_body: String,
        summary: String,
    ) -> Self {
        Self {
            title: record.title,
            author: record.author,
            body: record.body,
            fingerprint: record.fingerprint,
            created_at: record.created_at,
            translated_title: Some(translated_title),
            translated_author: Some(translated_author),
            translated_body: Some(translated_body),
            summary: Some(summary),
        }
    }

    pub fn display_title(&self) -> &str {
        non_empty(self.translated_title.as_deref()).unwrap_or(&self.title)
    }

    pub fn display_author<'a>(&'a self, default: &'a str) -> &'a str {
        non_empty(self.translated_author.as_deref())
            .or_else(|| non_empty(Some(self.author.as_str())))
            .unwrap_or(default)
    }

    /// Translated body, falling back to the original paragraphs.
    pub fn display_body(&self) -> String {
        match non_empty(self.translated_body.as_deref()) {
            Some(body) => body.to_string(),
            None => self.body.join("\n\n"),
        }
    }

    pub fn display_summary(&self) -> &str {
        self.summary.as_deref().unwrap_or("")
    }
}

fn non_empty(s: Option<&str>) -> Option<&str> {
    s.filter(|s| !s.trim().is_empty())
}

#[derive(Deserialize)]
#[serde(untagged)]
enum StoredBody {
    Paragraphs(Vec<String>),
    Text(String),
}

fn paragraphs<'de, D>(deserializer: D) -> Result<Vec<String>, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(match StoredBody::deserialize(deserializer)? {
        StoredBody::Paragraphs(p) => p,
        StoredBody::Text(text) => text
            .split("\n\n")
            .map(str::trim)
            .filter(|p| !p.is_empty())
            .map(str::to_string)
            .collect(),
    })
}
