//! Statline Core — the ingestion/canonicalization pipeline.
//!
//! This crate contains the shared machinery that turns many noisy,
//! rate-limited, partially-overlapping source feeds into one canonical
//! dataset:
//! - Domain types (raw records, uids, dimension and fact rows)
//! - Fetch layer: per-source token buckets, redb-backed conditional cache,
//!   retry/backoff scheduler with a per-domain concurrency ceiling
//! - Identity resolution with exact keys and scoped fuzzy fallback
//! - Schema assembly into append/merge-only canonical tables with lineage
//! - Validation with a numeric health score
//!
//! Per-site adapters are external; they only touch the `SourceAdapter`
//! contract and the `FetchScheduler`.

pub mod adapter;
pub mod config;
pub mod context;
pub mod domain;
pub mod fetch;
pub mod identity;
pub mod schema;
pub mod validate;

pub use adapter::SourceAdapter;
pub use config::PipelineConfig;
pub use context::PipelineContext;

#[cfg(test)]
mod tests {
    use super::*;

    /// Compile-time check: everything shared across the worker pool is
    /// Send + Sync.
    #[allow(dead_code)]
    fn assert_send_sync() {
        fn require_send<T: Send>() {}
        fn require_sync<T: Sync>() {}

        // Domain types
        require_send::<domain::RawRecord>();
        require_sync::<domain::RawRecord>();
        require_send::<domain::Uid>();
        require_sync::<domain::Uid>();
        require_send::<domain::GameRow>();
        require_sync::<domain::GameRow>();
        require_send::<domain::PlayerRow>();
        require_sync::<domain::PlayerRow>();

        // Shared pipeline state
        require_send::<fetch::RateLimiter>();
        require_sync::<fetch::RateLimiter>();
        require_send::<fetch::ConditionalCache>();
        require_sync::<fetch::ConditionalCache>();
        require_send::<fetch::FetchScheduler>();
        require_sync::<fetch::FetchScheduler>();
        require_send::<identity::IdentityResolver>();
        require_sync::<identity::IdentityResolver>();

        // Batch artifacts
        require_send::<schema::CanonicalTables>();
        require_sync::<schema::CanonicalTables>();
        require_send::<validate::Report>();
        require_sync::<validate::Report>();
        require_send::<context::PipelineContext>();
        require_sync::<context::PipelineContext>();
    }
}
