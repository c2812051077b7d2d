//! Fetch scheduler — the single entry point adapters use to obtain
//! documents.
//!
//! Composition per request: rate limiter (per-source + global) → per-domain
//! concurrency gate → conditional cache → transport with retry/backoff.
//! A fresh cache hit short-circuits everything and consumes no tokens.

use parking_lot::{Condvar, Mutex};
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, warn};

use crate::config::{FetchConfig, TtlConfig};
use crate::domain::EntityKind;

use super::cache::{CachedDoc, ConditionalCache, FetchedDoc};
use super::rate_limit::RateLimiter;
use super::transport::{Transport, TransportReply};
use super::FetchError;

/// One document request.
#[derive(Debug, Clone)]
pub struct FetchRequest {
    pub source_key: String,
    pub url: String,
    /// Drives the cache TTL for the resulting document.
    pub kind: EntityKind,
}

/// Result of a scheduled fetch. Absence is routine, not an error.
#[derive(Debug, Clone)]
pub enum FetchOutcome {
    Document { body: String, from_cache: bool },
    Absent,
}

pub struct FetchScheduler {
    limiter: Arc<RateLimiter>,
    cache: Arc<ConditionalCache>,
    transport: Arc<dyn Transport>,
    gates: Arc<DomainGates>,
    ttls: TtlConfig,
    max_retries: u32,
    base_delay: Duration,
}

impl FetchScheduler {
    pub fn new(
        limiter: Arc<RateLimiter>,
        cache: Arc<ConditionalCache>,
        transport: Arc<dyn Transport>,
        fetch_config: &FetchConfig,
        ttls: TtlConfig,
    ) -> Self {
        Self {
            limiter,
            cache,
            transport,
            gates: Arc::new(DomainGates::new(fetch_config.max_per_domain)),
            ttls,
            max_retries: fetch_config.max_retries,
            base_delay: Duration::from_millis(fetch_config.base_delay_ms),
        }
    }

    /// Fetch a document through cache, rate limiting, and retry policy.
    pub fn fetch(&self, request: &FetchRequest) -> Result<FetchOutcome, FetchError> {
        let domain = domain_of(&request.url)?;
        let key = ConditionalCache::key_for(&request.url);
        let ttl = self.ttls.for_kind(request.kind);

        let doc = self.cache.get_or_fetch(&key, ttl, |revalidator| {
            let waited = self.limiter.acquire(&request.source_key);
            if waited > Duration::from_millis(50) {
                // Expected backpressure, surfaced for observability only.
                debug!(source = %request.source_key, ?waited, "rate limiter backpressure");
            }
            let _permit = DomainGates::enter(&self.gates, &domain);
            self.attempt_with_retry(&request.url, revalidator)
        })?;

        match doc {
            CachedDoc::Document { body, from_cache } => {
                Ok(FetchOutcome::Document { body, from_cache })
            }
            CachedDoc::Absent => {
                debug!(url = %request.url, "resource absent, skipping");
                Ok(FetchOutcome::Absent)
            }
        }
    }

    /// Single-URL transport loop: transient failures retry with exponential
    /// backoff, "not found" returns `Absent` without retrying, anything
    /// else propagates immediately.
    fn attempt_with_retry(
        &self,
        url: &str,
        revalidator: Option<&super::transport::Revalidator>,
    ) -> Result<FetchedDoc, FetchError> {
        let mut last_error: Option<FetchError> = None;

        for attempt in 0..=self.max_retries {
            if attempt > 0 {
                let delay = self.base_delay * 2u32.pow(attempt - 1);
                debug!(url, attempt, ?delay, "retrying after transient failure");
                std::thread::sleep(delay);
            }

            match self.transport.execute(url, revalidator) {
                Ok(TransportReply::Success { body, revalidator }) => {
                    return Ok(FetchedDoc::Full { body, revalidator });
                }
                Ok(TransportReply::NotModified) => return Ok(FetchedDoc::NotModified),
                Ok(TransportReply::NotFound) => {
                    debug!(url, "not found");
                    return Ok(FetchedDoc::Absent);
                }
                Err(e) if e.is_transient() => {
                    last_error = Some(e);
                }
                Err(e) => return Err(e),
            }
        }

        let attempts = self.max_retries + 1;
        let last = last_error
            .map(|e| e.to_string())
            .unwrap_or_else(|| "unknown".into());
        warn!(url, attempts, %last, "source unavailable, retries exhausted");
        Err(FetchError::SourceUnavailable { attempts, last })
    }
}

fn domain_of(url: &str) -> Result<String, FetchError> {
    let parsed = reqwest::Url::parse(url).map_err(|e| FetchError::BadUrl {
        url: url.to_string(),
        reason: e.to_string(),
    })?;
    parsed
        .host_str()
        .map(str::to_string)
        .ok_or_else(|| FetchError::BadUrl {
            url: url.to_string(),
            reason: "no host".into(),
        })
}

/// Per-domain concurrency ceiling. Bounds simultaneous in-flight requests
/// to any one domain even when several logical sources share it.
struct DomainGates {
    max_per_domain: usize,
    in_flight: Mutex<HashMap<String, usize>>,
    released: Condvar,
}

impl DomainGates {
    fn new(max_per_domain: usize) -> Self {
        Self {
            max_per_domain: max_per_domain.max(1),
            in_flight: Mutex::new(HashMap::new()),
            released: Condvar::new(),
        }
    }

    fn enter(gates: &Arc<DomainGates>, domain: &str) -> DomainPermit {
        let mut in_flight = gates.in_flight.lock();
        loop {
            let count = in_flight.entry(domain.to_string()).or_insert(0);
            if *count < gates.max_per_domain {
                *count += 1;
                return DomainPermit {
                    gates: Arc::clone(gates),
                    domain: domain.to_string(),
                };
            }
            gates.released.wait(&mut in_flight);
        }
    }

    fn exit(&self, domain: &str) {
        let mut in_flight = self.in_flight.lock();
        if let Some(count) = in_flight.get_mut(domain) {
            *count = count.saturating_sub(1);
            if *count == 0 {
                in_flight.remove(domain);
            }
        }
        self.released.notify_all();
    }
}

struct DomainPermit {
    gates: Arc<DomainGates>,
    domain: String,
}

impl Drop for DomainPermit {
    fn drop(&mut self) {
        self.gates.exit(&self.domain);
    }
}
