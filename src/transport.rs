//! HTTP transport with optional exponential backoff retry.
//!
//! The pipeline only needs `fetch(url) -> (status, body)`. This module
//! defines that seam and its implementations:
//! - [`Transport`]: core trait for a single GET
//! - [`HttpTransport`]: reqwest client with a browser identification header
//!   and a bounded timeout
//! - [`RetryTransport`]: decorator adding retry to any `Transport`
//!
//! A transport returns whatever status the server sent; deciding what a
//! non-2xx status means is left to the caller. Retry is invisible to the
//! [`Resolver`](crate::resolver::Resolver).
//!
//! # Retry Strategy
//!
//! - Only network errors, timeouts, 5xx and 429 are retried
//! - Exponential backoff from the configured base delay
//! - Maximum delay capped at 30 seconds
//! - Random jitter (0-250ms) added to spread retries out

use crate::config::ResolverConfig;
use crate::error::TransportError;
use rand::{Rng, rng};
use reqwest::header::{ACCEPT, ACCEPT_LANGUAGE, HeaderMap, HeaderValue};
use std::fmt;
use std::time::{Duration, Instant};
use tokio::time::sleep;
use tracing::{debug, error, instrument, warn};

/// Status and body of a completed request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FetchResponse {
    pub status: u16,
    pub body: String,
}

impl FetchResponse {
    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }
}

/// A single HTTP GET.
///
/// Implementors return `Ok` for any response the server sent, including
/// error statuses, and `Err` only when no response was obtained.
pub trait Transport {
    /// GET `url`.
    ///
    /// # Returns
    ///
    /// The status and body, or a [`TransportError`] when the request could
    /// not complete (connection failure, timeout).
    async fn fetch(&self, url: &str) -> Result<FetchResponse, TransportError>;
}

/// reqwest-backed transport.
#[derive(Debug, Clone)]
pub struct HttpTransport {
    client: reqwest::Client,
}

impl HttpTransport {
    /// Build a client sending `config.user_agent` and giving up after
    /// `config.timeout_secs`.
    pub fn new(config: &ResolverConfig) -> Result<Self, TransportError> {
        let mut headers = HeaderMap::new();
        headers.insert(
            ACCEPT,
            HeaderValue::from_static(
                "text/html,application/xhtml+xml,application/json;q=0.9,*/*;q=0.8",
            ),
        );
        headers.insert(ACCEPT_LANGUAGE, HeaderValue::from_static("en-US,en;q=0.5"));

        let client = reqwest::Client::builder()
            .user_agent(config.user_agent.as_str())
            .default_headers(headers)
            .timeout(config.timeout())
            .build()
            .map_err(|e| TransportError::Client {
                message: e.to_string(),
            })?;
        Ok(Self { client })
    }
}

fn classify(url: &str, e: reqwest::Error) -> TransportError {
    if e.is_timeout() {
        TransportError::Timeout {
            url: url.to_string(),
        }
    } else {
        TransportError::Network {
            url: url.to_string(),
            message: e.to_string(),
        }
    }
}

impl Transport for HttpTransport {
    #[instrument(level = "debug", skip(self))]
    async fn fetch(&self, url: &str) -> Result<FetchResponse, TransportError> {
        let t0 = Instant::now();
        let response = self.client.get(url).send().await.map_err(|e| classify(url, e))?;
        let status = response.status().as_u16();
        let body = response.text().await.map_err(|e| classify(url, e))?;
        debug!(
            status,
            bytes = body.len(),
            elapsed_ms = t0.elapsed().as_millis() as u64,
            "Fetched"
        );
        Ok(FetchResponse { status, body })
    }
}

/// Wrapper that adds exponential backoff retry to any [`Transport`].
///
/// ```text
/// delay = min(base_delay * 2^(attempt-1), max_delay) + random_jitter(0..250ms)
/// ```
pub struct RetryTransport<T> {
    inner: T,
    max_retries: usize,
    base_delay: Duration,
    max_delay: Duration,
}

impl<T> RetryTransport<T>
where
    T: Transport,
{
    /// Wrap `inner`.
    ///
    /// # Arguments
    ///
    /// * `inner` - Transport doing the actual requests
    /// * `max_retries` - Attempts after the first; `0` disables retry
    /// * `base_delay` - Delay before the first retry, doubled each time
    pub fn new(inner: T, max_retries: usize, base_delay: Duration) -> Self {
        Self {
            inner,
            max_retries,
            base_delay,
            max_delay: Duration::from_secs(30),
        }
    }

    fn delay_for(&self, attempt: usize) -> Duration {
        let shift = (attempt.saturating_sub(1)).min(16) as u32;
        let delay = self.base_delay.saturating_mul(1 << shift).min(self.max_delay);
        let jitter_ms: u64 = rng().random_range(0..=250);
        delay + Duration::from_millis(jitter_ms)
    }
}

impl<T> fmt::Debug for RetryTransport<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RetryTransport")
            .field("max_retries", &self.max_retries)
            .field("base_delay", &self.base_delay)
            .field("max_delay", &self.max_delay)
            .finish()
    }
}

/// Turn a retryable status into an error so the retry loop sees it.
fn retryable_status(url: &str, response: &FetchResponse) -> Option<TransportError> {
    let err = TransportError::Status {
        url: url.to_string(),
        status: response.status,
    };
    err.is_retryable().then_some(err)
}

impl<T> Transport for RetryTransport<T>
where
    T: Transport,
{
    #[instrument(level = "debug", skip(self))]
    async fn fetch(&self, url: &str) -> Result<FetchResponse, TransportError> {
        let mut attempt = 0usize;

        loop {
            let e = match self.inner.fetch(url).await {
                Ok(response) => match retryable_status(url, &response) {
                    Some(e) if attempt < self.max_retries => e,
                    _ => return Ok(response),
                },
                Err(e) => e,
            };

            attempt += 1;
            if !e.is_retryable() || attempt > self.max_retries {
                if attempt > 1 {
                    error!(attempt, max = self.max_retries, error = %e, "fetch exhausted retries");
                }
                return Err(e);
            }
            let delay = self.delay_for(attempt);
            warn!(
                attempt,
                max = self.max_retries,
                ?delay,
                error = %e,
                "fetch attempt failed; backing off"
            );
            sleep(delay).await;
        }
    }
}

#[cfg(test)]
pub(crate) mod testing {
    //! In-memory transport for tests.

    use super::*;
    use std::cell::RefCell;
    use std::collections::{HashMap, VecDeque};

    /// Serves canned responses keyed by URL and records every request.
    /// A URL can be given a queue of outcomes, served in order, the last one
    /// repeating.
    #[derive(Default)]
    pub struct StaticTransport {
        routes: HashMap<String, RefCell<VecDeque<Result<FetchResponse, TransportError>>>>,
        pub requests: RefCell<Vec<String>>,
    }

    impl StaticTransport {
        pub fn new() -> Self {
            Self::default()
        }

        pub fn with(mut self, url: &str, status: u16, body: &str) -> Self {
            self.push(
                url,
                Ok(FetchResponse {
                    status,
                    body: body.to_string(),
                }),
            );
            self
        }

        pub fn with_error(mut self, url: &str, error: TransportError) -> Self {
            self.push(url, Err(error));
            self
        }

        fn push(&mut self, url: &str, outcome: Result<FetchResponse, TransportError>) {
            self.routes
                .entry(url.to_string())
                .or_default()
                .get_mut()
                .push_back(outcome);
        }

        pub fn request_count(&self) -> usize {
            self.requests.borrow().len()
        }
    }

    fn clone_outcome(
        outcome: &Result<FetchResponse, TransportError>,
    ) -> Result<FetchResponse, TransportError> {
        match outcome {
            Ok(r) => Ok(r.clone()),
            Err(TransportError::Status { url, status }) => Err(TransportError::Status {
                url: url.clone(),
                status: *status,
            }),
            Err(TransportError::Network { url, message }) => Err(TransportError::Network {
                url: url.clone(),
                message: message.clone(),
            }),
            Err(TransportError::Timeout { url }) => Err(TransportError::Timeout { url: url.clone() }),
            Err(TransportError::Client { message }) => Err(TransportError::Client {
                message: message.clone(),
            }),
        }
    }

    impl Transport for StaticTransport {
        async fn fetch(&self, url: &str) -> Result<FetchResponse, TransportError> {
            self.requests.borrow_mut().push(url.to_string());
            let Some(queue) = self.routes.get(url) else {
                return Ok(FetchResponse {
                    status: 404,
                    body: String::new(),
                });
            };
            let mut queue = queue.borrow_mut();
            if queue.len() > 1 {
                if let Some(outcome) = queue.pop_front() {
                    return outcome;
                }
            }
            match queue.front() {
                Some(outcome) => clone_outcome(outcome),
                None => Ok(FetchResponse {
                    status: 404,
                    body: String::new(),
                }),
            }
        }
    }
}
