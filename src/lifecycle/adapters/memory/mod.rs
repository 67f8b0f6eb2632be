//! In-memory adapters for tests and embedded use.

mod archive;
mod store;

pub use archive::InMemoryArchiveStore;
pub use store::InMemoryLifecycleStore;
