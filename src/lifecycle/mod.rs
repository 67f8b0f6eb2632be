//! Gate-driven task lifecycles.
//!
//! A task moves through its workflow only by accepted transitions: a persona
//! requests a gate, the registry authorizes it, the [`sequencer`] checks the
//! gate order, the [`validation`] rules check structural completeness, and
//! the record is appended to the task's log. Incomplete requests are
//! recorded as BLOCKED entries instead and leave the state unchanged.
//!
//! - Domain types in [`domain`]
//! - Gate ordering in [`sequencer`]
//! - Structural validation in [`validation`]
//! - Port contracts in [`ports`]
//! - Adapter implementations in [`adapters`]
//! - Orchestration services in [`services`]
//! - The persisted text form in [`format`]
//!
//! # Example
//!
//! ```
//! use mockable::DefaultClock;
//! use stagegate::lifecycle::domain::{DomainTag, NewTaskParams, OwnerId, ProductBrief, Task};
//! use stagegate::lifecycle::sequencer::GateSequencer;
//! use stagegate::registry::Registry;
//!
//! let registry = Registry::bundled().expect("bundled registry loads");
//! let template = registry
//!     .workflow(registry.default_workflow())
//!     .expect("default workflow exists");
//! let params = NewTaskParams {
//!     workflow: template.name().clone(),
//!     initial_state: template.initial_state().clone(),
//!     domain: DomainTag::new("payments").expect("valid domain"),
//!     owner: OwnerId::new("alice").expect("valid owner"),
//!     brief: ProductBrief::new("Refund flow for card payments."),
//! };
//! let task = Task::new(params, &DefaultClock);
//!
//! let next = GateSequencer::new(template)
//!     .next_expected(&task)
//!     .expect("a fresh task has a first gate");
//! assert_eq!(next.name().as_str(), "product.discovery");
//! ```

pub mod adapters;
pub mod domain;
pub mod format;
pub mod ports;
pub mod sequencer;
pub mod services;
pub mod validation;

#[cfg(test)]
mod tests;
