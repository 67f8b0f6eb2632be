//! Unit tests for the registry module.

mod config_tests;
