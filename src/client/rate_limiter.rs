//! Adaptive politeness control for requests against the council website.
//!
//! The council site is a shared government service; the limiter keeps the
//! pipeline inside a configurable delay band, widens the band when requests
//! fail or responses slow down, schedules an extra pause after a blocking
//! status, takes a long break at regular intervals, and trips a circuit
//! breaker when failures pile up.

use std::time::{Duration, Instant};

use rand::Rng;

use crate::config::Config;
use crate::error::{RegistryError, Result};

/// Delay shrink factor applied on success
const SUCCESS_DELAY_FACTOR: f64 = 0.9;
/// Delay growth factor applied on failure
const FAILURE_DELAY_FACTOR: f64 = 1.5;
/// Extra delay growth applied on a blocking status (403/429)
const BLOCKED_DELAY_FACTOR: f64 = 2.0;
/// Failure streak that opens the circuit breaker
const MAX_CONSECUTIVE_FAILURES: u32 = 5;
/// How long the breaker stays open before a retry is allowed
const BREAKER_COOL_OFF: Duration = Duration::from_secs(300);
/// Smoothing factor of the response-time moving average
const RESPONSE_TIME_ALPHA: f64 = 0.1;
/// Average response time above which delays widen
const SLOW_RESPONSE_SECS: f64 = 5.0;
/// Average response time below which delays narrow
const FAST_RESPONSE_SECS: f64 = 1.0;

/// Statistics for tracking request patterns
#[derive(Debug, Clone, Default)]
pub struct RequestStats {
    /// Requests recorded in total
    pub total_requests: u64,
    /// Requests that completed with a success status
    pub successful_requests: u64,
    /// Requests that failed (transport or status)
    pub failed_requests: u64,
    /// Requests answered with a blocking status (403/429)
    pub blocked_requests: u64,
    /// Current failure streak
    pub consecutive_failures: u32,
    /// Exponential moving average of response times, in seconds
    pub average_response_secs: f64,
}

impl RequestStats {
    /// Fraction of recorded requests that succeeded (0 when none recorded).
    #[must_use]
    pub fn success_rate(&self) -> f64 {
        if self.total_requests == 0 {
            0.0
        } else {
            self.successful_requests as f64 / self.total_requests as f64
        }
    }
}

/// Adaptive rate limiter with jitter, long breaks and a circuit breaker
#[derive(Debug)]
pub struct RateLimiter {
    min_delay: Duration,
    max_delay: Duration,
    long_break_after: u32,
    long_break: Duration,
    adaptive_pause: Duration,
    current_delay: Duration,
    requests_since_break: u32,
    pending_pause: Option<Duration>,
    breaker_open_since: Option<Instant>,
    stats: RequestStats,
}

impl RateLimiter {
    /// Create a limiter from the configured delay band.
    #[must_use]
    pub fn new(config: &Config) -> Self {
        let min_delay = Duration::from_millis(config.min_delay_ms);
        Self {
            min_delay,
            max_delay: Duration::from_millis(config.max_delay_ms),
            long_break_after: config.long_break_after,
            long_break: Duration::from_secs(config.long_break_secs),
            adaptive_pause: Duration::from_secs(config.adaptive_pause_secs),
            current_delay: min_delay,
            requests_since_break: 0,
            pending_pause: None,
            breaker_open_since: None,
            stats: RequestStats::default(),
        }
    }

    /// Block until the next request is allowed.
    ///
    /// Serves any scheduled adaptive pause, sleeps the jittered current
    /// delay, and accounts for the periodic long break.
    ///
    /// # Errors
    /// Returns [`RegistryError::CircuitOpen`] while the breaker is open.
    pub fn acquire(&mut self) -> Result<()> {
        if let Some(opened) = self.breaker_open_since {
            if opened.elapsed() < BREAKER_COOL_OFF {
                return Err(RegistryError::CircuitOpen {
                    consecutive_failures: self.stats.consecutive_failures,
                });
            }
            self.breaker_open_since = None;
            self.stats.consecutive_failures = 0;
            self.current_delay = self.min_delay;
            log::info!("circuit breaker closed after cool-off");
        }

        if let Some(pause) = self.pending_pause.take() {
            log::warn!("taking adaptive pause of {pause:?} after blocking response");
            std::thread::sleep(pause);
        }

        let delay = self.pending_delay().mul_f64(jitter());
        if !delay.is_zero() {
            std::thread::sleep(delay);
        }

        self.requests_since_break += 1;
        if self.requests_since_break >= self.long_break_after {
            log::info!(
                "taking long break of {:?} after {} requests",
                self.long_break,
                self.requests_since_break
            );
            std::thread::sleep(self.long_break);
            self.requests_since_break = 0;
            self.current_delay = self.min_delay;
        }

        Ok(())
    }

    /// The delay the next [`RateLimiter::acquire`] would sleep, before jitter.
    #[must_use]
    pub fn pending_delay(&self) -> Duration {
        let mut delay = self.current_delay;
        if self.stats.consecutive_failures > 0 {
            delay = delay.mul_f64(1.0 + 0.5 * f64::from(self.stats.consecutive_failures));
        }
        if self.stats.average_response_secs > SLOW_RESPONSE_SECS {
            delay = delay.mul_f64(1.2);
        } else if self.stats.average_response_secs < FAST_RESPONSE_SECS {
            delay = delay.mul_f64(0.9);
        }
        delay.clamp(self.min_delay, self.max_delay)
    }

    /// Record a successful request and relax the delay.
    pub fn record_success(&mut self, elapsed: Duration) {
        self.push_response_time(elapsed.as_secs_f64());
        self.stats.total_requests += 1;
        self.stats.successful_requests += 1;
        self.stats.consecutive_failures = 0;
        self.current_delay = self
            .current_delay
            .mul_f64(SUCCESS_DELAY_FACTOR)
            .clamp(self.min_delay, self.max_delay);
        if self.breaker_open_since.take().is_some() {
            log::info!("circuit breaker closed after successful request");
        }
    }

    /// Record a failed request and widen the delay.
    ///
    /// A blocking status (403/429) widens the delay further and schedules an
    /// adaptive pause which the next [`RateLimiter::acquire`] will serve.
    pub fn record_failure(&mut self, status: Option<u16>) {
        self.stats.total_requests += 1;
        self.stats.failed_requests += 1;
        self.stats.consecutive_failures += 1;
        self.current_delay = self
            .current_delay
            .mul_f64(FAILURE_DELAY_FACTOR)
            .clamp(self.min_delay, self.max_delay);

        if let Some(code @ (403 | 429)) = status {
            self.stats.blocked_requests += 1;
            self.current_delay = self
                .current_delay
                .mul_f64(BLOCKED_DELAY_FACTOR)
                .clamp(self.min_delay, self.max_delay);
            self.pending_pause = Some(self.adaptive_pause);
            log::warn!("blocking detected (HTTP {code}), scheduling adaptive pause");
        }

        if self.stats.consecutive_failures >= MAX_CONSECUTIVE_FAILURES
            && self.breaker_open_since.is_none()
        {
            self.breaker_open_since = Some(Instant::now());
            log::warn!(
                "circuit breaker opened after {} consecutive failures",
                self.stats.consecutive_failures
            );
        }
    }

    /// Current request statistics.
    #[must_use]
    pub fn stats(&self) -> &RequestStats {
        &self.stats
    }

    /// The unadjusted base delay.
    #[must_use]
    pub fn current_delay(&self) -> Duration {
        self.current_delay
    }

    /// Whether the limiter considers the session healthy: breaker closed and,
    /// once enough requests were recorded, a success rate of at least 80 %.
    #[must_use]
    pub fn is_healthy(&self) -> bool {
        if self.breaker_open_since.is_some() {
            return false;
        }
        self.stats.total_requests <= 10 || self.stats.success_rate() >= 0.8
    }

    /// Reset all adaptive state and statistics.
    pub fn reset(&mut self) {
        self.stats = RequestStats::default();
        self.current_delay = self.min_delay;
        self.requests_since_break = 0;
        self.pending_pause = None;
        self.breaker_open_since = None;
    }

    fn push_response_time(&mut self, secs: f64) {
        if self.stats.total_requests == 0 {
            self.stats.average_response_secs = secs;
        } else {
            self.stats.average_response_secs = RESPONSE_TIME_ALPHA * secs
                + (1.0 - RESPONSE_TIME_ALPHA) * self.stats.average_response_secs;
        }
    }
}

fn jitter() -> f64 {
    rand::rng().random_range(0.8..=1.2)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn fast_config() -> Config {
        Config {
            min_delay_ms: 10,
            max_delay_ms: 100,
            long_break_after: 1_000,
            long_break_secs: 0,
            adaptive_pause_secs: 0,
            ..Config::default()
        }
    }

    fn assert_close(actual: Duration, expected_ms: f64) {
        let diff = (actual.as_secs_f64() - expected_ms / 1_000.0).abs();
        assert!(diff < 1e-6, "expected ~{expected_ms}ms, got {actual:?}");
    }

    #[test]
    fn success_shrinks_and_failure_widens_delay() {
        let mut limiter = RateLimiter::new(&fast_config());
        limiter.record_failure(Some(500));
        assert_close(limiter.current_delay(), 15.0);
        limiter.record_failure(Some(500));
        assert_close(limiter.current_delay(), 22.5);

        limiter.record_success(Duration::from_millis(200));
        assert!(limiter.current_delay() < Duration::from_micros(22_000));
        assert_eq!(limiter.stats().consecutive_failures, 0);
    }

    #[test]
    fn delay_stays_inside_the_band() {
        let mut limiter = RateLimiter::new(&fast_config());
        for _ in 0..20 {
            limiter.record_failure(Some(500));
        }
        assert_eq!(limiter.current_delay(), Duration::from_millis(100));
        for _ in 0..50 {
            limiter.record_success(Duration::from_millis(1));
        }
        assert_eq!(limiter.current_delay(), Duration::from_millis(10));
    }

    #[test]
    fn blocking_status_doubles_down_and_schedules_pause() {
        let mut limiter = RateLimiter::new(&fast_config());
        limiter.record_failure(Some(429));
        assert_eq!(limiter.stats().blocked_requests, 1);
        // 10ms * 1.5 * 2.0 = 30ms
        assert_close(limiter.current_delay(), 30.0);
        assert_eq!(limiter.pending_pause, Some(Duration::from_secs(0)));
    }

    #[test]
    fn breaker_opens_after_streak_and_blocks_acquire() {
        let mut limiter = RateLimiter::new(&fast_config());
        for _ in 0..5 {
            limiter.record_failure(None);
        }
        assert!(limiter.breaker_open_since.is_some());
        assert!(!limiter.is_healthy());
        assert!(matches!(
            limiter.acquire(),
            Err(RegistryError::CircuitOpen { consecutive_failures: 5 })
        ));

        limiter.record_success(Duration::from_millis(5));
        assert!(limiter.breaker_open_since.is_none());
        assert!(limiter.acquire().is_ok());
    }

    #[test]
    fn consecutive_failures_scale_the_pending_delay() {
        let mut limiter = RateLimiter::new(&fast_config());
        limiter.record_failure(None);
        limiter.record_failure(None);
        // base 22.5ms, failure scaling 1 + 0.5*2 = 2.0, fast-response trim 0.9
        assert_close(limiter.pending_delay(), 40.5);
    }

    #[test]
    fn response_time_average_is_smoothed() {
        let mut limiter = RateLimiter::new(&fast_config());
        limiter.record_success(Duration::from_secs(2));
        assert!((limiter.stats().average_response_secs - 2.0).abs() < 1e-9);
        limiter.record_success(Duration::from_secs(4));
        assert!((limiter.stats().average_response_secs - 2.2).abs() < 1e-9);
    }

    #[test]
    fn reset_restores_baseline() {
        let mut limiter = RateLimiter::new(&fast_config());
        limiter.record_failure(Some(403));
        limiter.reset();
        assert_eq!(limiter.current_delay(), Duration::from_millis(10));
        assert_eq!(limiter.stats().total_requests, 0);
        assert!(limiter.pending_pause.is_none());
    }
}
