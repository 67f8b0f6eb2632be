//! Adapter implementations of the lifecycle ports.
//!
//! - [`memory`]: thread-safe in-memory store and archive
//! - [`fs`]: directory-backed archive using capability-scoped file access

pub mod fs;
pub mod memory;
