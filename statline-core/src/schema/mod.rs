//! Canonical schema assembly: table definitions and the builder that
//! populates them from raw record batches.

pub mod builder;
pub mod tables;

pub use builder::{BuildOutput, SchemaBuilder};
pub use tables::{CanonicalTables, HasUid};
