//! Archive port for compacted log spans.

use crate::lifecycle::domain::{ArchiveSegmentId, LogEntry, SequenceNumber, TaskId};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::sync::Arc;
use thiserror::Error;

/// Result type for archive operations.
pub type ArchiveResult<T> = Result<T, ArchiveError>;

/// Retired log entries of one compaction, sealed with a SHA-256 digest.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ArchiveSegment {
    /// Segment identifier.
    pub id: ArchiveSegmentId,
    /// Task the entries belong to.
    pub task: TaskId,
    /// Archived entries in log order.
    pub entries: Vec<LogEntry>,
    /// Hex SHA-256 digest of the JSON-encoded entries.
    pub digest: String,
}

impl ArchiveSegment {
    /// Seals `entries` into a new segment.
    ///
    /// # Errors
    ///
    /// Returns [`ArchiveError::Serialization`] if the entries cannot be
    /// encoded.
    pub fn seal(task: TaskId, entries: Vec<LogEntry>) -> ArchiveResult<Self> {
        let digest = Self::digest_of(&entries)?;
        Ok(Self {
            id: ArchiveSegmentId::new(),
            task,
            entries,
            digest,
        })
    }

    /// Computes the digest of `entries`.
    ///
    /// # Errors
    ///
    /// Returns [`ArchiveError::Serialization`] if the entries cannot be
    /// encoded.
    pub fn digest_of(entries: &[LogEntry]) -> ArchiveResult<String> {
        let encoded = serde_json::to_vec(entries)
            .map_err(|err| ArchiveError::Serialization(err.to_string()))?;
        let mut hasher = Sha256::new();
        hasher.update(&encoded);
        Ok(format!("{:x}", hasher.finalize()))
    }

    /// Recomputes the digest and compares it with the sealed one.
    ///
    /// # Errors
    ///
    /// Returns [`ArchiveError::DigestMismatch`] when the entries were altered.
    pub fn verify(&self) -> ArchiveResult<()> {
        let actual = Self::digest_of(&self.entries)?;
        if actual != self.digest {
            return Err(ArchiveError::DigestMismatch {
                segment: self.id,
                expected: self.digest.clone(),
                actual,
            });
        }
        Ok(())
    }

    /// Returns the first archived sequence number.
    #[must_use]
    pub fn first(&self) -> SequenceNumber {
        self.entries
            .first()
            .map_or(SequenceNumber::UNASSIGNED, LogEntry::sequence)
    }

    /// Returns the last archived sequence number.
    #[must_use]
    pub fn last(&self) -> SequenceNumber {
        self.entries
            .last()
            .map_or(SequenceNumber::UNASSIGNED, LogEntry::sequence)
    }
}

/// Archive segment storage contract.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait ArchiveStore: Send + Sync {
    /// Durably writes a sealed segment.
    ///
    /// # Errors
    ///
    /// Returns [`ArchiveError::DuplicateSegment`] when the id is taken, or
    /// [`ArchiveError::Storage`] if the write fails.
    async fn write_segment(&self, segment: &ArchiveSegment) -> ArchiveResult<()>;

    /// Reads a segment back.
    ///
    /// Returns `None` when the segment does not exist.
    async fn read_segment(&self, id: ArchiveSegmentId) -> ArchiveResult<Option<ArchiveSegment>>;

    /// Removes a segment that never became visible in a log.
    ///
    /// # Errors
    ///
    /// Returns [`ArchiveError::Storage`] if removal fails.
    async fn discard_segment(&self, id: ArchiveSegmentId) -> ArchiveResult<()>;
}

/// Errors returned by archive implementations.
#[derive(Debug, Clone, Error)]
pub enum ArchiveError {
    /// A segment with the same identifier already exists.
    #[error("duplicate archive segment: {0}")]
    DuplicateSegment(ArchiveSegmentId),

    /// No segment with this identifier exists.
    #[error("archive segment not found: {0}")]
    NotFound(ArchiveSegmentId),

    /// Entries could not be encoded or decoded.
    #[error("archive serialization failed: {0}")]
    Serialization(String),

    /// A segment's entries no longer match its digest.
    #[error("archive segment {segment} digest mismatch: expected {expected}, found {actual}")]
    DigestMismatch {
        /// Offending segment.
        segment: ArchiveSegmentId,
        /// Sealed digest.
        expected: String,
        /// Recomputed digest.
        actual: String,
    },

    /// Storage-layer failure.
    #[error("archive storage error: {0}")]
    Storage(Arc<dyn std::error::Error + Send + Sync>),
}

impl ArchiveError {
    /// Wraps a storage error.
    pub fn storage(err: impl std::error::Error + Send + Sync + 'static) -> Self {
        Self::Storage(Arc::new(err))
    }
}
