//! Request-rate limiting shared by every model call of a run.
//!
//! The worker pool may run several calls at once, but the provider's quota
//! is per account, so all workers draw from one [`RateLimiter`]. The default
//! [`TokenBucket`] with burst 1 and a 10 s interval reproduces a fixed
//! "one request every ten seconds" throttle without sleeping after calls
//! that were already slow.

use async_trait::async_trait;
use std::time::Duration;
use tokio::sync::Mutex;
use tokio::time::{sleep, Instant};

/// Gate in front of every model request.
#[async_trait]
pub trait RateLimiter: Send + Sync {
    /// Wait until one more request may be sent.
    async fn acquire(&self);
}

/// No throttling at all.
#[derive(Debug, Default, Clone, Copy)]
pub struct Unlimited;

#[async_trait]
impl RateLimiter for Unlimited {
    async fn acquire(&self) {}
}

/// Token bucket: up to `burst` requests back-to-back, then one per `interval`.
#[derive(Debug)]
pub struct TokenBucket {
    capacity: f64,
    interval: Duration,
    state: Mutex<BucketState>,
}

#[derive(Debug)]
struct BucketState {
    tokens: f64,
    last: Instant,
}

impl BucketState {
    fn refill(&mut self, capacity: f64, interval: Duration) {
        let now = Instant::now();
        let earned = now.duration_since(self.last).as_secs_f64() / interval.as_secs_f64();
        self.tokens = (self.tokens + earned).min(capacity);
        self.last = now;
    }
}

impl TokenBucket {
    /// A full bucket of `burst` tokens (at least 1) refilled one per `interval`.
    pub fn new(burst: u32, interval: Duration) -> Self {
        let capacity = f64::from(burst.max(1));
        Self {
            capacity,
            interval,
            state: Mutex::new(BucketState {
                tokens: capacity,
                last: Instant::now(),
            }),
        }
    }
}

#[async_trait]
impl RateLimiter for TokenBucket {
    async fn acquire(&self) {
        if self.interval.is_zero() {
            return;
        }
        // The lock is held across the sleep: waiters queue in FIFO order.
        let mut state = self.state.lock().await;
        state.refill(self.capacity, self.interval);
        if state.tokens < 1.0 {
            let wait = self.interval.mul_f64(1.0 - state.tokens);
            tracing::debug!("rate limiter: waiting {:?}", wait);
            sleep(wait).await;
            state.refill(self.capacity, self.interval);
        }
        state.tokens = (state.tokens - 1.0).max(0.0);
    }
}
