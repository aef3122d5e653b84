//! Rate-limited HTTP client for the council website.
//!
//! All page fetches go through [`RegistryClient`]: one shared blocking
//! `reqwest` client, every request gated by the adaptive [`RateLimiter`],
//! and a bounded retry loop with exponential backoff for transient
//! failures.

pub mod rate_limiter;

pub use rate_limiter::{RateLimiter, RequestStats};

use std::thread;
use std::time::{Duration, Instant};

use reqwest::StatusCode;
use reqwest::blocking::{Client, RequestBuilder};

use crate::config::Config;
use crate::error::{RegistryError, Result};

/// HTTP client wrapper owning the politeness state
#[derive(Debug)]
pub struct RegistryClient {
    http: Client,
    limiter: RateLimiter,
    max_retries: usize,
    retry_delay: Duration,
}

impl RegistryClient {
    /// Build a client from the configuration.
    ///
    /// # Errors
    /// Returns an error when the underlying HTTP client cannot be built.
    pub fn new(config: &Config) -> Result<Self> {
        let http = Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .user_agent(config.user_agent.clone())
            .build()?;
        Ok(Self {
            http,
            limiter: RateLimiter::new(config),
            max_retries: config.max_retries,
            retry_delay: Duration::from_millis(config.retry_delay_ms),
        })
    }

    /// Rate-limited GET returning the response body.
    ///
    /// # Errors
    /// Propagates transport errors, non-retryable statuses, an exhausted
    /// retry budget, or an open circuit breaker.
    pub fn get(&mut self, url: &str) -> Result<String> {
        self.execute(url, |http| http.get(url))
    }

    /// Rate-limited form POST returning the response body.
    ///
    /// # Errors
    /// Same failure modes as [`RegistryClient::get`].
    pub fn post_form(&mut self, url: &str, form: &[(&str, &str)]) -> Result<String> {
        self.execute(url, |http| http.post(url).form(form))
    }

    /// Request statistics collected by the rate limiter.
    #[must_use]
    pub fn stats(&self) -> &RequestStats {
        self.limiter.stats()
    }

    /// Whether the client is in a usable state (breaker closed, acceptable
    /// success rate).
    #[must_use]
    pub fn is_healthy(&self) -> bool {
        self.limiter.is_healthy()
    }

    fn execute<F>(&mut self, url: &str, build: F) -> Result<String>
    where
        F: Fn(&Client) -> RequestBuilder,
    {
        for attempt in 0..=self.max_retries {
            self.limiter.acquire()?;
            let started = Instant::now();

            match build(&self.http).send() {
                Ok(response) => {
                    let status = response.status();
                    if status.is_success() {
                        self.limiter.record_success(started.elapsed());
                        log::debug!("{url} answered {status} in {:?}", started.elapsed());
                        return Ok(response.text()?);
                    }

                    self.limiter.record_failure(Some(status.as_u16()));
                    if attempt < self.max_retries && is_retryable_status(status) {
                        log::warn!("{url} answered {status}, retrying (attempt {attempt})");
                        thread::sleep(retry_backoff(self.retry_delay, attempt));
                        continue;
                    }
                    return Err(RegistryError::Status {
                        status: status.as_u16(),
                        url: url.to_string(),
                    });
                }
                Err(error) => {
                    self.limiter.record_failure(None);
                    if attempt < self.max_retries && is_retryable_error(&error) {
                        log::warn!("{url} failed ({error}), retrying (attempt {attempt})");
                        thread::sleep(retry_backoff(self.retry_delay, attempt));
                        continue;
                    }
                    return Err(error.into());
                }
            }
        }

        Err(RegistryError::RetriesExhausted {
            url: url.to_string(),
            attempts: self.max_retries + 1,
        })
    }
}

/// Statuses worth retrying: request timeout, throttling, server errors.
fn is_retryable_status(status: StatusCode) -> bool {
    status == StatusCode::REQUEST_TIMEOUT
        || status == StatusCode::TOO_MANY_REQUESTS
        || status.is_server_error()
}

/// Transport failures worth retrying.
fn is_retryable_error(error: &reqwest::Error) -> bool {
    error.is_timeout() || error.is_connect() || error.is_request()
}

/// Exponential backoff with a small deterministic stagger.
fn retry_backoff(base: Duration, attempt: usize) -> Duration {
    let exponent = u32::try_from(attempt).unwrap_or(8).min(8);
    let scale = 1u64.checked_shl(exponent).unwrap_or(256);
    let stagger = Duration::from_millis((attempt as u64 * 17 + 31) % 97);
    base.saturating_mul(u32::try_from(scale).unwrap_or(u32::MAX)) + stagger
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn retryable_statuses_cover_timeouts_throttling_and_5xx() {
        assert!(is_retryable_status(StatusCode::REQUEST_TIMEOUT));
        assert!(is_retryable_status(StatusCode::TOO_MANY_REQUESTS));
        assert!(is_retryable_status(StatusCode::BAD_GATEWAY));
        assert!(!is_retryable_status(StatusCode::NOT_FOUND));
        assert!(!is_retryable_status(StatusCode::FORBIDDEN));
    }

    #[test]
    fn backoff_grows_exponentially() {
        let base = Duration::from_millis(100);
        let first = retry_backoff(base, 0);
        let second = retry_backoff(base, 1);
        let third = retry_backoff(base, 2);
        assert!(first < second && second < third);
        assert!(third >= Duration::from_millis(400));
    }
}
