//! Unit tests for the lifecycle bounded context.

mod log_tests;
mod support;
