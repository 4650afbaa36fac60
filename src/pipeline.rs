//! One run of the essay pipeline.
//!
//! A run has two halves:
//!
//! 1. [`stage`]: snapshot → extract → normalize → load archive → dedup.
//!    Reads only. Ends early with [`Staged::Duplicate`] when the essay is
//!    already archived, before any translation is requested.
//! 2. [`publish`]: translate → prepend → render every feed in memory →
//!    write feeds → save archive. Nothing touches disk until every document
//!    has rendered, every file is replaced atomically, and the archive is
//!    saved last so a failed write leaves the essay unarchived.
//!
//! At most one run may execute at a time; scheduling is the caller's job.

use crate::api::{Translator, enrich};
use crate::archive::Archive;
use crate::config::PipelineConfig;
use crate::error::PipelineError;
use crate::models::CanonicalRecord;
use crate::normalize::normalize;
use crate::outputs::feed::FeedFormat;
use crate::outputs::render;
use crate::scrapers::{Extractor, SnapshotSource};
use crate::utils::{ensure_writable_dir, write_atomic};
use chrono::{DateTime, Local, Utc};
use std::path::PathBuf;
use tracing::{info, instrument, warn};

/// Result of the read-only half of a run.
#[derive(Debug)]
pub enum Staged {
    /// The essay is already archived; nothing else should happen.
    Duplicate { fingerprint: String },
    /// A new essay, ready for translation.
    New {
        record: CanonicalRecord,
        archive: Archive,
    },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RunOutcome {
    Duplicate {
        fingerprint: String,
    },
    Published {
        fingerprint: String,
        archived: usize,
        feeds: Vec<PathBuf>,
    },
}

/// Fetch, extract and normalize today's essay and check it against the archive.
#[instrument(level = "info", skip_all)]
pub async fn stage<S: SnapshotSource>(
    config: &PipelineConfig,
    source: &S,
    now: DateTime<Utc>,
) -> Result<Staged, PipelineError> {
    let extractor = Extractor::new(&config.extract)?;
    let snapshot = source.snapshot().await?;
    let candidate = extractor.extract(&snapshot, now.with_timezone(&Local).date_naive())?;
    let record = normalize(candidate, &config.normalize, now);

    if record.body.is_empty() {
        return Err(PipelineError::Extraction(
            "body is empty after removing boilerplate and repeats".to_string(),
        ));
    }

    let archive = Archive::load(&config.archive_path())?;
    if archive.contains(&record.fingerprint) || archive.contains_body(&record.body) {
        info!(fingerprint = %record.fingerprint, "Essay already archived; skipping");
        return Ok(Staged::Duplicate {
            fingerprint: record.fingerprint,
        });
    }
    info!(
        fingerprint = %record.fingerprint,
        title = %record.title,
        paragraphs = record.body.len(),
        archived = archive.len(),
        "New essay found"
    );
    Ok(Staged::New { record, archive })
}

/// Render every configured feed from the archive window, in memory.
pub fn render_feeds(
    config: &PipelineConfig,
    archive: &Archive,
    formats: &[FeedFormat],
    now: DateTime<Utc>,
) -> Result<Vec<(PathBuf, String)>, PipelineError> {
    let window = archive.window(config.feed.window);
    formats
        .iter()
        .map(|format| {
            let xml = render(window, *format, &config.feed, now)?;
            Ok((config.feed_path(*format), xml))
        })
        .collect()
}

/// Write rendered feeds, each file replaced atomically.
pub fn write_feeds(feeds: &[(PathBuf, String)]) -> Result<Vec<PathBuf>, PipelineError> {
    feeds
        .iter()
        .map(|(path, xml)| {
            write_atomic(path, xml)?;
            info!(path = %path.display(), "Wrote feed");
            Ok(path.clone())
        })
        .collect()
}

/// Translate `record`, archive it and regenerate the feeds.
#[instrument(level = "info", skip_all, fields(fingerprint = %record.fingerprint))]
pub async fn publish<T: Translator>(
    config: &PipelineConfig,
    formats: &[FeedFormat],
    record: CanonicalRecord,
    mut archive: Archive,
    translator: &T,
    now: DateTime<Utc>,
) -> Result<RunOutcome, PipelineError> {
    let enriched = enrich(record, translator).await?;
    let fingerprint = enriched.fingerprint.clone();
    archive.prepend(enriched)?;

    let feeds = render_feeds(config, &archive, formats, now)?;

    ensure_writable_dir(&config.output_dir)?;
    let written = write_feeds(&feeds)?;
    archive.save(&config.archive_path())?;

    info!(archived = archive.len(), feeds = written.len(), "Published essay");
    Ok(RunOutcome::Published {
        fingerprint,
        archived: archive.len(),
        feeds: written,
    })
}

/// Both halves with an already constructed translator.
#[cfg(test)]
pub async fn run<S: SnapshotSource, T: Translator>(
    config: &PipelineConfig,
    formats: &[FeedFormat],
    source: &S,
    translator: &T,
    now: DateTime<Utc>,
) -> Result<RunOutcome, PipelineError> {
    match stage(config, source, now).await? {
        Staged::Duplicate { fingerprint } => Ok(RunOutcome::Duplicate { fingerprint }),
        Staged::New { record, archive } => {
            publish(config, formats, record, archive, translator, now).await
        }
    }
}

/// Regenerate the feeds from the persisted archive alone.
#[instrument(level = "info", skip_all)]
pub fn rebuild_feeds(
    config: &PipelineConfig,
    formats: &[FeedFormat],
    now: DateTime<Utc>,
) -> Result<Vec<PathBuf>, PipelineError> {
    let archive = Archive::load(&config.archive_path())?;
    if archive.is_empty() {
        warn!("Archive is empty; feeds will have no entries");
    }
    let feeds = render_feeds(config, &archive, formats, now)?;
    ensure_writable_dir(&config.output_dir)?;
    write_feeds(&feeds)
}
