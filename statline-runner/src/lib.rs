//! Statline Runner — backfill orchestration on top of `statline-core`.
//!
//! This crate provides:
//! - The adapter registry and the bundled source adapters
//! - The backfill entry point (bounded worker pool over source/season
//!   tasks, partial-failure tolerant)
//! - The persistence sink: upsert-by-uid store with parquet/CSV export
//! - Run summaries for CLI output and `summary.json` artifacts

pub mod adapters;
pub mod backfill;
pub mod sink;
pub mod summary;

pub use adapters::{create_adapter, known_sources, RegistryError};
pub use backfill::{run_backfill, BackfillOptions, BackfillRun};
pub use sink::{ParquetSink, SinkError, SinkManifest, UpsertStats};
pub use summary::{BackfillSummary, SourceFailure};
