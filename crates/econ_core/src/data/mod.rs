//! Data structures for catalog definitions.
//!
//! This module contains pure data structures describing production actions.
//! All structs are designed to be deserialized from RON files.
//!
//! **Note:** This module contains no IO - it only defines data types.
//! File loading lives in [`crate::catalog`].

mod action_data;
mod catalog_data;

pub use action_data::{ActionCategory, ActionData, PriorityRule, ProducerCapability, Requirement};
pub use catalog_data::CatalogData;
