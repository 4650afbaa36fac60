//! Command-line interface definitions for Itoi Daily.
//!
//! Options override the matching fields of the YAML configuration. Paths
//! and the translator configuration can also come from the environment.

use crate::outputs::feed::FeedFormat;
use clap::Parser;
use std::path::PathBuf;

/// Command-line arguments for one pipeline run.
///
/// # Examples
///
/// ```sh
/// # Fetch today's essay and update docs/feed.xml and docs/atom.xml
/// itoi_daily -o ./docs
///
/// # Use a page rendered by a headless browser, RSS only
/// itoi_daily -s ./snapshot.html -f rss
///
/// # Rebuild the feeds from docs/archive.json without fetching
/// itoi_daily --feed-only
/// ```
#[derive(Parser, Debug)]
#[command(author, version, about)]
pub struct Cli {
    /// Pipeline configuration file (YAML)
    #[arg(short, long, env = "ITOI_CONFIG")]
    pub config: Option<PathBuf>,

    /// Directory holding archive.json and the feed files
    #[arg(short, long, env = "ITOI_OUTPUT_DIR")]
    pub output_dir: Option<PathBuf>,

    /// Feed format to render; repeat for several
    #[arg(short, long = "format", value_enum)]
    pub formats: Vec<FeedFormat>,

    /// Read the page markup from this file instead of fetching it
    #[arg(short, long)]
    pub snapshot: Option<PathBuf>,

    /// LLM client configuration (defaults to the client's config directory)
    #[arg(long, env = "ITOI_TRANSLATOR_CONFIG")]
    pub translator_config: Option<PathBuf>,

    /// Timeout for a single translation request, in seconds
    #[arg(long)]
    pub translation_timeout_secs: Option<u64>,

    /// Extra attempts for a failed translation request
    #[arg(long)]
    pub translation_retries: Option<usize>,

    /// Only regenerate the feeds from the archive
    #[arg(long)]
    pub feed_only: bool,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cli_defaults() {
        let cli = Cli::parse_from(["itoi_daily"]);
        assert!(cli.output_dir.is_none());
        assert!(cli.formats.is_empty());
        assert!(!cli.feed_only);
    }

    #[test]
    fn test_cli_short_flags() {
        let cli = Cli::parse_from([
            "itoi_daily",
            "-o",
            "/tmp/docs",
            "-s",
            "/tmp/page.html",
            "-f",
            "rss",
            "-f",
            "atom",
        ]);
        assert_eq!(cli.output_dir, Some(PathBuf::from("/tmp/docs")));
        assert_eq!(cli.snapshot, Some(PathBuf::from("/tmp/page.html")));
        assert_eq!(cli.formats, vec![FeedFormat::Rss, FeedFormat::Atom]);
    }

    #[test]
    fn test_cli_translation_overrides() {
        let cli = Cli::parse_from([
            "itoi_daily",
            "--translation-retries",
            "2",
            "--translation-timeout-secs",
            "60",
            "--feed-only",
        ]);
        assert_eq!(cli.translation_retries, Some(2));
        assert_eq!(cli.translation_timeout_secs, Some(60));
        assert!(cli.feed_only);
    }
}
