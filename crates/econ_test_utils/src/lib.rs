//! # Econ Test Utilities
//!
//! Shared testing utilities for all crates:
//! - Scripted mock environment
//! - Fixture helpers
//! - Determinism test harness
//! - Property-based testing strategies

#![forbid(unsafe_code)]
#![warn(missing_docs)]

pub mod determinism;
pub mod fixtures;
pub mod mock;

pub use mock::{MockCommand, MockEnvironment};

/// Re-export proptest for convenience.
pub use proptest;
