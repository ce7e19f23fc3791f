//! Integration test suite entry point.
//!
//! Cargo compiles everything reachable from this one file into a single test
//! binary, mirroring `src/`'s own module layout: `common` holds shared
//! fixtures (a tree-building harness plus a mocked [`Component`] child),
//! `unit` holds the behavioral tests themselves.

/// Shared test fixtures: the tree-building harness and mocked components.
pub mod common;

/// Behavioral tests, one module per area of `src/`.
pub mod unit;
