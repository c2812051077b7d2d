//! Fetch layer: rate limiting, conditional caching, and scheduling.
//!
//! The `FetchScheduler` is the only entry point adapters use. It composes
//! the per-source token buckets, the redb-backed conditional cache, a
//! per-domain concurrency ceiling, and the transport retry policy.

pub mod cache;
pub mod rate_limit;
pub mod scheduler;
pub mod transport;

pub use cache::{CacheStatus, CachedDoc, ConditionalCache, FetchedDoc};
pub use rate_limit::{BucketSpec, RateLimiter};
pub use scheduler::{FetchOutcome, FetchRequest, FetchScheduler};
pub use transport::{HttpTransport, Revalidator, Transport, TransportReply};

use thiserror::Error;

/// Structured error types for the fetch layer.
///
/// Backpressure (rate-limit waits) and absent resources are not errors and
/// never appear here; they surface as latency and `FetchOutcome::Absent`.
#[derive(Debug, Error)]
pub enum FetchError {
    #[error("request timed out: {0}")]
    Timeout(String),

    #[error("server error: HTTP {status}")]
    Server { status: u16 },

    #[error("throttled by source (retry-after {retry_after_secs:?}s)")]
    Throttled { retry_after_secs: Option<u64> },

    #[error("network error: {0}")]
    Network(String),

    #[error("request denied: {0}")]
    Denied(String),

    #[error("source unavailable after {attempts} attempts: {last}")]
    SourceUnavailable { attempts: u32, last: String },

    #[error("malformed document: {0}")]
    Malformed(String),

    #[error("invalid request url '{url}': {reason}")]
    BadUrl { url: String, reason: String },

    #[error("cache store error: {0}")]
    Store(String),
}

impl FetchError {
    /// Transient failures are retried with backoff; everything else is
    /// returned to the caller immediately.
    pub fn is_transient(&self) -> bool {
        match self {
            FetchError::Timeout(_) => true,
            FetchError::Server { status } => *status >= 500,
            FetchError::Throttled { .. } => true,
            FetchError::Network(_) => true,
            FetchError::Denied(_)
            | FetchError::SourceUnavailable { .. }
            | FetchError::Malformed(_)
            | FetchError::BadUrl { .. }
            | FetchError::Store(_) => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn transient_classification() {
        assert!(FetchError::Timeout("30s".into()).is_transient());
        assert!(FetchError::Server { status: 503 }.is_transient());
        assert!(FetchError::Throttled { retry_after_secs: Some(60) }.is_transient());
        assert!(!FetchError::Server { status: 400 }.is_transient());
        assert!(!FetchError::Denied("403".into()).is_transient());
        assert!(!FetchError::Malformed("truncated json".into()).is_transient());
    }
}
