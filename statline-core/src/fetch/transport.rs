//! HTTP transport behind a trait so the scheduler and cache can be tested
//! against a mock.
//!
//! The transport performs exactly one request attempt; retry policy lives in
//! the scheduler. "Not found" and "not modified" are replies, not errors —
//! many source/season/category combinations legitimately do not exist.

use serde::{Deserialize, Serialize};
use std::time::Duration;

use super::FetchError;

/// Conditional-request metadata stored alongside a cached body.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Revalidator {
    pub etag: Option<String>,
    pub last_modified: Option<String>,
}

impl Revalidator {
    pub fn is_empty(&self) -> bool {
        self.etag.is_none() && self.last_modified.is_none()
    }
}

/// Outcome of a single transport attempt.
#[derive(Debug, Clone)]
pub enum TransportReply {
    /// Full response body plus any revalidator the server offered.
    Success {
        body: String,
        revalidator: Option<Revalidator>,
    },
    /// 304-equivalent: the stored body is still current.
    NotModified,
    /// 404-equivalent: the resource does not exist. Routine, not an error.
    NotFound,
}

/// One-shot document fetch. Implementations must be safe to share across
/// the worker pool.
pub trait Transport: Send + Sync {
    fn execute(
        &self,
        url: &str,
        revalidator: Option<&Revalidator>,
    ) -> Result<TransportReply, FetchError>;
}

/// Production transport over a blocking reqwest client.
pub struct HttpTransport {
    client: reqwest::blocking::Client,
}

impl HttpTransport {
    pub fn new(timeout: Duration) -> Result<Self, FetchError> {
        let client = reqwest::blocking::Client::builder()
            .timeout(timeout)
            .user_agent(concat!("statline/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(|e| FetchError::Network(e.to_string()))?;
        Ok(Self { client })
    }
}

impl Transport for HttpTransport {
    fn execute(
        &self,
        url: &str,
        revalidator: Option<&Revalidator>,
    ) -> Result<TransportReply, FetchError> {
        let mut request = self.client.get(url);
        if let Some(reval) = revalidator {
            if let Some(etag) = &reval.etag {
                request = request.header(reqwest::header::IF_NONE_MATCH, etag);
            }
            if let Some(lm) = &reval.last_modified {
                request = request.header(reqwest::header::IF_MODIFIED_SINCE, lm);
            }
        }

        let response = request.send().map_err(|e| {
            if e.is_timeout() {
                FetchError::Timeout(e.to_string())
            } else {
                FetchError::Network(e.to_string())
            }
        })?;

        let status = response.status();

        if status == reqwest::StatusCode::NOT_MODIFIED {
            return Ok(TransportReply::NotModified);
        }
        if status == reqwest::StatusCode::NOT_FOUND || status == reqwest::StatusCode::GONE {
            return Ok(TransportReply::NotFound);
        }
        if status == reqwest::StatusCode::TOO_MANY_REQUESTS {
            let retry_after = response
                .headers()
                .get(reqwest::header::RETRY_AFTER)
                .and_then(|v| v.to_str().ok())
                .and_then(|v| v.parse::<u64>().ok());
            return Err(FetchError::Throttled {
                retry_after_secs: retry_after,
            });
        }
        if status == reqwest::StatusCode::UNAUTHORIZED || status == reqwest::StatusCode::FORBIDDEN {
            return Err(FetchError::Denied(format!("HTTP {status} for {url}")));
        }
        if !status.is_success() {
            return Err(FetchError::Server {
                status: status.as_u16(),
            });
        }

        let header_str = |name: reqwest::header::HeaderName| {
            response
                .headers()
                .get(name)
                .and_then(|v| v.to_str().ok())
                .map(str::to_string)
        };
        let etag = header_str(reqwest::header::ETAG);
        let last_modified = header_str(reqwest::header::LAST_MODIFIED);
        let revalidator = if etag.is_some() || last_modified.is_some() {
            Some(Revalidator { etag, last_modified })
        } else {
            None
        };

        let body = response
            .text()
            .map_err(|e| FetchError::Network(e.to_string()))?;

        Ok(TransportReply::Success { body, revalidator })
    }
}
