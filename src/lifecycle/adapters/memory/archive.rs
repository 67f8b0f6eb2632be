//! In-memory archive store.

use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::{Arc, RwLock};

use crate::lifecycle::{
    domain::ArchiveSegmentId,
    ports::{ArchiveError, ArchiveResult, ArchiveSegment, ArchiveStore},
};

/// Thread-safe in-memory archive.
#[derive(Debug, Clone, Default)]
pub struct InMemoryArchiveStore {
    segments: Arc<RwLock<HashMap<ArchiveSegmentId, ArchiveSegment>>>,
}

impl InMemoryArchiveStore {
    /// Creates an empty archive.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the number of stored segments.
    #[must_use]
    pub fn len(&self) -> usize {
        self.segments.read().map(|guard| guard.len()).unwrap_or(0)
    }

    /// Returns `true` if no segments are stored.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

fn poisoned(err: impl std::fmt::Display) -> ArchiveError {
    ArchiveError::storage(std::io::Error::other(err.to_string()))
}

#[async_trait]
impl ArchiveStore for InMemoryArchiveStore {
    async fn write_segment(&self, segment: &ArchiveSegment) -> ArchiveResult<()> {
        let mut segments = self.segments.write().map_err(poisoned)?;
        if segments.contains_key(&segment.id) {
            return Err(ArchiveError::DuplicateSegment(segment.id));
        }
        segments.insert(segment.id, segment.clone());
        Ok(())
    }

    async fn read_segment(&self, id: ArchiveSegmentId) -> ArchiveResult<Option<ArchiveSegment>> {
        let segments = self.segments.read().map_err(poisoned)?;
        Ok(segments.get(&id).cloned())
    }

    async fn discard_segment(&self, id: ArchiveSegmentId) -> ArchiveResult<()> {
        let mut segments = self.segments.write().map_err(poisoned)?;
        segments.remove(&id);
        Ok(())
    }
}
