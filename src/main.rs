//! # Itoi Daily
//!
//! Publishes Shigesato Itoi's daily column "今日のダーリン" from 1101.com as
//! translated RSS and Atom feeds.
//!
//! ## Usage
//!
//! ```sh
//! itoi_daily -o ./docs
//! ```
//!
//! ## Architecture
//!
//! One run is a strictly sequential pipeline:
//! 1. **Snapshot**: fetch the front page (or read a pre-rendered snapshot)
//! 2. **Extraction**: locate title, author and body with ordered fallback strategies
//! 3. **Normalization**: clean paragraphs and fingerprint the body
//! 4. **Deduplication**: stop if the fingerprint is already archived
//! 5. **Translation**: translate title, author and body, then summarize
//! 6. **Output**: prepend to the archive and regenerate the feeds
//!
//! A failed run leaves the archive and the published feeds untouched.

use awful_aj::config as jade;
use chrono::Utc;
use clap::Parser;
use std::error::Error;
use std::time::Duration;
use tracing::{debug, error, info, instrument};
use tracing_subscriber::{EnvFilter, fmt as tfmt};

mod api;
mod archive;
mod cli;
mod config;
mod error;
#[cfg(test)]
mod fixtures;
mod models;
mod normalize;
mod outputs;
mod pipeline;
mod scrapers;
mod utils;

use api::Templates;
use cli::Cli;
use config::PipelineConfig;
use error::PipelineError;
use pipeline::{RunOutcome, Staged};
use scrapers::{FileSnapshot, HttpSnapshot};

#[tokio::main]
#[instrument]
async fn main() -> Result<(), Box<dyn Error>> {
    // --- Tracing init ---
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tfmt()
        .with_env_filter(filter)
        .with_target(true)
        .with_file(false)
        .with_line_number(false)
        .with_timer(tracing_subscriber::fmt::time::UtcTime::rfc_3339())
        .init();

    let start_time = std::time::Instant::now();
    info!("itoi_daily starting up");

    let args = Cli::parse();
    debug!(?args, "Parsed CLI arguments");

    let mut config = PipelineConfig::load(args.config.as_deref()).inspect_err(|e| {
        error!(error = %e, "Could not load configuration");
    })?;
    if let Some(dir) = &args.output_dir {
        config.output_dir = dir.clone();
    }
    if let Some(secs) = args.translation_timeout_secs {
        config.translation.timeout_secs = secs;
    }
    if let Some(retries) = args.translation_retries {
        config.translation.retries = retries;
    }
    let formats = if args.formats.is_empty() {
        config.feed.formats.clone()
    } else {
        args.formats.clone()
    };
    let now = Utc::now();

    if args.feed_only {
        let written = pipeline::rebuild_feeds(&config, &formats, now).inspect_err(|e| {
            error!(error = %e, "Feed regeneration failed");
        })?;
        info!(feeds = written.len(), "Regenerated feeds from archive");
        return Ok(());
    }

    // ---- Snapshot, extraction, dedup ----
    let staged = match &args.snapshot {
        Some(path) => {
            let source = FileSnapshot { path: path.clone() };
            pipeline::stage(&config, &source, now).await
        }
        None => {
            let source = HttpSnapshot::new(&config.fetch)?;
            pipeline::stage(&config, &source, now).await
        }
    }
    .inspect_err(|e| error!(error = %e, "Run aborted before translation"))?;

    let (record, archive) = match staged {
        Staged::Duplicate { fingerprint } => {
            info!(%fingerprint, "Nothing new today");
            return Ok(());
        }
        Staged::New { record, archive } => (record, archive),
    };

    // ---- Translator ----
    let jade_config = load_translator_config(&args)
        .inspect_err(|e| error!(error = %e, "Translator is not configured"))?;
    let templates = Templates::load(
        &config.translation.title_template,
        &config.translation.body_template,
        &config.translation.summary_template,
    )
    .await
    .inspect_err(|e| error!(error = %e, "Could not load chat templates"))?;
    let translator = templates.translator(
        &jade_config,
        Duration::from_secs(config.translation.timeout_secs),
        config.translation.retries,
    );

    // ---- Translate, archive, publish ----
    let outcome = pipeline::publish(&config, &formats, record, archive, &translator, now)
        .await
        .inspect_err(|e| error!(error = %e, "Run aborted; archive and feeds unchanged"))?;

    if let RunOutcome::Published {
        fingerprint,
        archived,
        feeds,
    } = &outcome
    {
        info!(%fingerprint, archived, feeds = feeds.len(), "Published new essay");
    }

    let elapsed = start_time.elapsed();
    info!(
        ?elapsed,
        secs = elapsed.as_secs(),
        millis = elapsed.subsec_millis(),
        "Execution complete"
    );
    Ok(())
}

fn load_translator_config(args: &Cli) -> Result<jade::AwfulJadeConfig, PipelineError> {
    let path = match &args.translator_config {
        Some(path) => path.clone(),
        None => awful_aj::config_dir()
            .map_err(|e| PipelineError::Translation(format!("no config directory: {e}")))?
            .join("config.yaml"),
    };
    let path_str = path
        .to_str()
        .ok_or_else(|| PipelineError::Translation(format!("not a valid path: {}", path.display())))?;
    let jade = jade::load_config(path_str)
        .map_err(|e| PipelineError::Translation(format!("{path_str}: {e}")))?;
    info!(config_path = path_str, "Loaded translator configuration");
    Ok(jade)
}
