//! Persona and gate authorization registry.
//!
//! The registry is loaded once from a versioned configuration document and
//! answers two questions for the lifecycle engine: which gates a persona may
//! execute, and what the ordered gate template of each workflow looks like.
//! It is read-only while tasks execute; a new configuration version replaces
//! it wholesale through [`RegistryHandle::reload`].
//!
//! - Domain types in [`domain`]
//! - Configuration document in [`config`]
//! - The loaded [`Registry`] and its reloadable [`RegistryHandle`]

pub mod config;
pub mod domain;
mod service;

pub use service::{Registry, RegistryHandle};

#[cfg(test)]
mod tests;
