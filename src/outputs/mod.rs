//! Feed document generation.
//!
//! # Submodules
//!
//! - [`xml`]: element tree and `quick-xml` serializer
//! - [`feed`]: generic RSS/Atom trees built from the archive window
//! - [`postprocess`]: namespaces, publisher, per-entry enrichment, Atom header order
//!
//! # Output Structure
//!
//! ```text
//! output_dir/
//! ├── archive.json   # every processed essay, newest first
//! ├── feed.xml       # RSS 2.0, 30 newest essays
//! └── atom.xml       # Atom 1.0, 30 newest essays
//! ```

pub mod feed;
pub mod postprocess;
pub mod xml;

use crate::config::FeedSettings;
use crate::error::PipelineError;
use crate::models::EnrichedRecord;
use chrono::{DateTime, Utc};
use feed::FeedFormat;
use tracing::{info, instrument};

/// Build, post-process and serialize one feed document.
#[instrument(level = "info", skip_all, fields(format = format.name(), records = window.len()))]
pub fn render(
    window: &[EnrichedRecord],
    format: FeedFormat,
    settings: &FeedSettings,
    generated_at: DateTime<Utc>,
) -> Result<String, PipelineError> {
    let doc = feed::build(window, format, settings, generated_at)?;
    let doc = postprocess::post_process(doc, window, settings)?;
    let xml = xml::to_xml_string(&doc.root)?;
    info!(bytes = xml.len(), "Rendered feed");
    Ok(xml)
}
