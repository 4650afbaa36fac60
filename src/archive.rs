//! The durable, content-addressed essay archive.
//!
//! Records are kept newest first. A record is only ever added at the head
//! and never changed or removed afterwards, and no two records share a
//! fingerprint. The whole archive is read once at the start of a run and
//! written once, atomically, at the end of a successful one.

use crate::error::PipelineError;
use crate::models::EnrichedRecord;
use crate::utils::write_atomic;
use std::collections::HashSet;
use std::path::Path;
use tracing::{info, instrument};

#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct Archive {
    records: Vec<EnrichedRecord>,
    fingerprints: HashSet<String>,
}

impl Archive {
    /// Build an archive from records ordered newest first.
    ///
    /// Fails if two records share a fingerprint.
    pub fn from_records(records: Vec<EnrichedRecord>) -> Result<Self, PipelineError> {
        let mut fingerprints = HashSet::with_capacity(records.len());
        for record in &records {
            if !fingerprints.insert(record.fingerprint.clone()) {
                return Err(PipelineError::Archive(format!(
                    "duplicate fingerprint {} in archive",
                    record.fingerprint
                )));
            }
        }
        Ok(Self {
            records,
            fingerprints,
        })
    }

    /// Read the archive at `path`; a missing file is an empty archive.
    #[instrument(level = "info", skip_all, fields(path = %path.display()))]
    pub fn load(path: &Path) -> Result<Self, PipelineError> {
        if !path.exists() {
            info!("No archive yet; starting empty");
            return Ok(Self::default());
        }
        let raw = std::fs::read_to_string(path)?;
        let records: Vec<EnrichedRecord> = serde_json::from_str(&raw)
            .map_err(|e| PipelineError::Archive(format!("{}: {e}", path.display())))?;
        let archive = Self::from_records(records)?;
        info!(records = archive.len(), "Loaded archive");
        Ok(archive)
    }

    /// Write the whole archive to `path`, replacing the previous file atomically.
    #[instrument(level = "info", skip_all, fields(path = %path.display()))]
    pub fn save(&self, path: &Path) -> Result<(), PipelineError> {
        let mut json = serde_json::to_string_pretty(&self.records)?;
        json.push('\n');
        write_atomic(path, &json)?;
        info!(records = self.len(), "Saved archive");
        Ok(())
    }

    pub fn contains(&self, fingerprint: &str) -> bool {
        self.fingerprints.contains(fingerprint)
    }

    /// Whether a record with exactly these paragraphs is archived.
    ///
    /// Catches records whose stored fingerprint was computed by an older
    /// scheme and no longer matches the current digest of the same body.
    pub fn contains_body(&self, paragraphs: &[String]) -> bool {
        self.records().iter().any(|r| r.body == paragraphs)
    }

    /// Insert `record` as the newest entry.
    ///
    /// Refuses a record whose fingerprint is already archived.
    pub fn prepend(&mut self, record: EnrichedRecord) -> Result<(), PipelineError> {
        if !self.fingerprints.insert(record.fingerprint.clone()) {
            return Err(PipelineError::Archive(format!(
                "fingerprint {} already archived",
                record.fingerprint
            )));
        }
        self.records.insert(0, record);
        Ok(())
    }

    /// The `n` most recent records, newest first.
    pub fn window(&self, n: usize) -> &[EnrichedRecord] {
        &self.records[..n.min(self.records.len())]
    }

    pub fn records(&self) -> &[EnrichedRecord] {
        &self.records
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }
}
