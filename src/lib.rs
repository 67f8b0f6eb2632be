//! Stagegate: gate-driven task lifecycle engine.
//!
//! This crate routes units of work through ordered checkpoints ("gates"),
//! each executed by an authorized actor role ("persona"), and records every
//! transition in an append-only log that can be summarised for handoff and
//! compacted into an archive.
//!
//! # Architecture
//!
//! Stagegate follows hexagonal architecture principles:
//!
//! - **Domain**: Pure business logic with no infrastructure dependencies
//! - **Ports**: Abstract trait interfaces for persistence and archival
//! - **Adapters**: Concrete implementations of ports (in-memory, directory)
//! - **Services**: Orchestration of the write path and snapshots
//!
//! # Modules
//!
//! - [`registry`]: Persona authorization and workflow gate templates
//! - [`lifecycle`]: Tasks, the lifecycle log, validation, and compaction

pub mod lifecycle;
pub mod registry;
