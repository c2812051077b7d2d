//! Source adapter contract — the input boundary of the pipeline.
//!
//! An adapter wraps one external source: it asks the scheduler for
//! documents, parses them however it needs to, and emits `RawRecord`
//! values with mandatory `source_url` and `fetched_at`. That is the only
//! obligation the pipeline places on adapters; everything downstream is
//! source-agnostic.

use crate::domain::RawRecord;
use crate::fetch::{FetchError, FetchScheduler};

pub trait SourceAdapter: Send + Sync + std::fmt::Debug {
    /// Stable key identifying this source (also its rate-limit key).
    fn source_key(&self) -> &str;

    /// Human-readable source name.
    fn display_name(&self) -> &str;

    /// Collect all raw records this source offers for one season.
    ///
    /// Absent documents are routine and simply contribute no records; a
    /// `SourceUnavailable` error marks this source's contribution to the
    /// batch as partial without aborting other sources.
    fn collect(&self, fetch: &FetchScheduler, season: u16) -> Result<Vec<RawRecord>, FetchError>;
}
