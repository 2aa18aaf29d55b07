//! Integration tests for rust-pgschema
//!
//! This file serves as the entry point for all integration tests.

#[path = "common/mod.rs"]
mod common;

#[path = "integration/analyze_tests.rs"]
mod analyze_tests;

#[path = "integration/intake_tests.rs"]
mod intake_tests;
