//! Error kinds surfaced by the pipeline.
//!
//! Every variant is an abort: the archive and the previously published feed
//! files are left exactly as they were. Finding content that is already
//! archived is not an error and is reported through
//! [`crate::pipeline::Staged::Duplicate`] instead.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum PipelineError {
    /// The source page could not be retrieved.
    #[error("fetch failed: {0}")]
    Fetch(String),

    /// No extraction strategy produced a body of acceptable length.
    #[error("extraction failed: {0}")]
    Extraction(String),

    /// The translation service was unavailable, misconfigured or returned nothing.
    #[error("translation failed: {0}")]
    Translation(String),

    /// A feed document could not be post-processed or serialized.
    #[error("feed serialization failed: {0}")]
    Serialization(String),

    /// The persisted archive is unreadable or violates its invariants.
    #[error("archive error: {0}")]
    Archive(String),

    #[error("invalid configuration: {0}")]
    Config(String),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

impl From<serde_json::Error> for PipelineError {
    fn from(e: serde_json::Error) -> Self {
        PipelineError::Archive(e.to_string())
    }
}
