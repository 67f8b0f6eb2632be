//! Step definitions for gate lifecycle BDD scenarios.

pub mod given;
pub mod then;
pub mod when;
pub mod world;
