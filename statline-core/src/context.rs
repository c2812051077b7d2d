//! Pipeline context — the explicit owner of all shared resources.
//!
//! One context is constructed per run and passed by reference through the
//! pipeline: rate limiter, conditional cache, fetch scheduler, and the
//! identity resolver all live here. No process-wide singletons.

use std::path::Path;
use std::sync::Arc;
use std::time::Duration;
use tracing::debug;

use crate::config::PipelineConfig;
use crate::fetch::{
    ConditionalCache, FetchError, FetchScheduler, HttpTransport, RateLimiter, Transport,
};
use crate::identity::IdentityResolver;
use crate::validate::Validator;

pub struct PipelineContext {
    pub config: PipelineConfig,
    pub limiter: Arc<RateLimiter>,
    pub cache: Arc<ConditionalCache>,
    pub scheduler: FetchScheduler,
    pub resolver: IdentityResolver,
}

impl PipelineContext {
    /// Construct a context with the production HTTP transport.
    pub fn new(config: PipelineConfig, cache_path: &Path) -> Result<Self, FetchError> {
        let transport = Arc::new(HttpTransport::new(Duration::from_secs(
            config.fetch.timeout_secs,
        ))?);
        Self::with_transport(config, cache_path, transport)
    }

    /// Construct a context with a caller-supplied transport (tests, replay).
    pub fn with_transport(
        config: PipelineConfig,
        cache_path: &Path,
        transport: Arc<dyn Transport>,
    ) -> Result<Self, FetchError> {
        let limiter = Arc::new(RateLimiter::new(
            config
                .rate_limits
                .per_source
                .iter()
                .map(|(k, v)| (k.clone(), *v))
                .collect(),
            config.rate_limits.unclassified,
            config.rate_limits.global,
        ));
        let cache = Arc::new(
            ConditionalCache::open(cache_path)?.with_retry_policy(
                config.cache.contention_retries,
                Duration::from_millis(config.cache.contention_base_delay_ms),
            ),
        );
        let scheduler = FetchScheduler::new(
            Arc::clone(&limiter),
            Arc::clone(&cache),
            transport,
            &config.fetch,
            config.cache.ttl.clone(),
        );
        let resolver = IdentityResolver::new(&config.identity);

        Ok(Self {
            config,
            limiter,
            cache,
            scheduler,
            resolver,
        })
    }

    pub fn validator(&self) -> Validator {
        Validator::new(&self.config.validation)
    }

    /// Explicit teardown: GC expired cache entries, then release the
    /// store. Returns how many entries were purged.
    pub fn close(self) -> Result<usize, FetchError> {
        let purged = self.cache.purge_expired()?;
        debug!(purged, "pipeline context closed");
        Ok(purged)
    }
}
