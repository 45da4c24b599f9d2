//! # Scheduler Development Tools
//!
//! Command-line tools for development:
//! - Catalog validation
//! - Scheduler config validation

#![forbid(unsafe_code)]
#![warn(missing_docs)]
#![warn(clippy::all, clippy::pedantic)]

pub mod validate;
