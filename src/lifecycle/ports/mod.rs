//! Port contracts for lifecycle persistence and archival.
//!
//! Ports define infrastructure-agnostic interfaces used by lifecycle
//! services.

pub mod archive;
pub mod store;

pub use archive::{ArchiveError, ArchiveResult, ArchiveSegment, ArchiveStore};
pub use store::{LifecycleStore, ScopeHead, StoreError, StoreResult};

#[cfg(test)]
pub use archive::MockArchiveStore;
