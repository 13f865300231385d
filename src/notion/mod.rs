//! Client for Notion's data-source API (`2025-09-03`).
//!
//! Calls flow one way, from the pipeline down to the wire:
//!
//! ```text
//! repository ─► fields ─► schema ─► transport ─► api.notion.com
//! ```
//!
//! # Submodules
//!
//! - [`transport`]: HTTP calls with bounded retries
//! - [`schema`]: data-source schemas and resolution under a database
//! - [`fields`]: logical field names to stable property ids
//! - [`properties`]: typed property values and their JSON encoding
//! - [`repository`]: find, create and relation-merge operations

pub mod fields;
pub mod properties;
pub mod repository;
pub mod schema;
pub mod transport;

#[cfg(test)]
pub mod test_support;
