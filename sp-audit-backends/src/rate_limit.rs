//! Per-backend request throttling.
//!
//! Token bucket refilled at `requests_per_second`, holding at most one
//! second of burst, starting full. The bucket sits behind a fair
//! `tokio::sync::Mutex` and a caller that must wait sleeps while holding the
//! lock, so waiters are served strictly in arrival order.

use std::time::Duration;

use tokio::sync::Mutex;
use tokio::time::{sleep, Instant};

/// Snapshot of a limiter for diagnostics.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LimiterStatus {
    pub available_tokens: f64,
    pub capacity: f64,
    pub requests_per_second: f64,
}

#[derive(Debug)]
struct Bucket {
    tokens: f64,
    last_refill: Instant,
}

impl Bucket {
    fn refill(&mut self, rate: f64, capacity: f64) {
        let now = Instant::now();
        let elapsed = now.duration_since(self.last_refill).as_secs_f64();
        self.tokens = (self.tokens + elapsed * rate).min(capacity);
        self.last_refill = now;
    }
}

/// Async token-bucket limiter.
///
/// # Example
///
/// ```rust,no_run
/// use sp_audit_backends::RateLimiter;
///
/// #[tokio::main]
/// async fn main() {
///     let limiter = RateLimiter::new(10.0);
///     for _ in 0..20 {
///         limiter.acquire().await; // the last 10 are spread over ~1s
///     }
/// }
/// ```
#[derive(Debug)]
pub struct RateLimiter {
    rate: f64,
    capacity: f64,
    bucket: Mutex<Bucket>,
}

impl RateLimiter {
    /// Create a limiter allowing `requests_per_second` calls per second.
    ///
    /// Non-positive or non-finite rates are clamped to a minimal positive
    /// rate; configuration validation rejects them before this point.
    pub fn new(requests_per_second: f64) -> Self {
        let rate = if requests_per_second.is_finite() && requests_per_second > 0.0 {
            requests_per_second
        } else {
            f64::MIN_POSITIVE
        };
        let capacity = rate.max(1.0);

        Self {
            rate,
            capacity,
            bucket: Mutex::new(Bucket {
                tokens: capacity,
                last_refill: Instant::now(),
            }),
        }
    }

    /// Wait until a permit is available and consume it. Never fails.
    pub async fn acquire(&self) {
        let mut bucket = self.bucket.lock().await;
        bucket.refill(self.rate, self.capacity);

        if bucket.tokens < 1.0 {
            let deficit = 1.0 - bucket.tokens;
            let wait = Duration::try_from_secs_f64(deficit / self.rate).unwrap_or(Duration::MAX);
            tracing::trace!(wait_ms = wait.as_millis() as u64, "rate limiter waiting");
            sleep(wait).await;
            bucket.refill(self.rate, self.capacity);
        }

        bucket.tokens -= 1.0;
    }

    pub async fn status(&self) -> LimiterStatus {
        let mut bucket = self.bucket.lock().await;
        bucket.refill(self.rate, self.capacity);
        LimiterStatus {
            available_tokens: bucket.tokens.max(0.0),
            capacity: self.capacity,
            requests_per_second: self.rate,
        }
    }

    #[inline]
    pub fn requests_per_second(&self) -> f64 {
        self.rate
    }
}
