//! Filesystem adapters.

mod archive;

pub use archive::DirArchiveStore;
#[cfg(test)]
pub(crate) use archive::publish;
