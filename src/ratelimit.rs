//! C7 — Rate Limiter: a global concurrency semaphore plus a per-provider
//! token bucket, mirroring the retry/backoff loop style of
//! `cosmos::suggest::llm::client` but standing rather than one-shot.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::{watch, Mutex, OwnedSemaphorePermit, Semaphore};
use tokio::time::sleep;

const POLL_INTERVAL: Duration = Duration::from_millis(100);

struct TokenBucket {
    tokens: f64,
    capacity: f64,
    last_refill: Instant,
}

impl TokenBucket {
    fn new(capacity: f64) -> Self {
        Self {
            tokens: capacity,
            capacity,
            last_refill: Instant::now(),
        }
    }

    /// Refills lazily using the wall-clock delta since the last access;
    /// tokens are fractional (spec §4.7).
    fn refill(&mut self) {
        let now = Instant::now();
        let elapsed = now.duration_since(self.last_refill).as_secs_f64();
        self.last_refill = now;
        self.tokens = (self.tokens + elapsed * (self.capacity / 60.0)).min(self.capacity);
    }

    fn try_take(&mut self) -> bool {
        self.refill();
        if self.tokens >= 1.0 {
            self.tokens -= 1.0;
            true
        } else {
            false
        }
    }

    fn estimated_wait(&mut self) -> Duration {
        self.refill();
        if self.tokens >= 1.0 {
            return Duration::ZERO;
        }
        let seconds = (1.0 - self.tokens) * 60.0 / self.capacity;
        Duration::from_secs_f64(seconds.max(0.0))
    }
}

/// An opaque handle whose drop returns one unit of concurrency to the rate
/// limiter (spec's "permit" glossary entry).
pub struct Permit {
    _slot: OwnedSemaphorePermit,
}

pub struct RateLimiter {
    concurrency: Arc<Semaphore>,
    buckets: Mutex<HashMap<String, TokenBucket>>,
    requests_per_minute: f64,
}

impl RateLimiter {
    pub fn new(max_concurrent: usize, max_requests_per_minute: u32) -> Self {
        Self {
            concurrency: Arc::new(Semaphore::new(max_concurrent)),
            buckets: Mutex::new(HashMap::new()),
            requests_per_minute: max_requests_per_minute as f64,
        }
    }

    /// Takes a concurrency slot, then polls the provider's token bucket
    /// every 100 ms until one is available, deducting it on success.
    /// Returns `None` if `cancel` fires while waiting.
    pub async fn acquire(&self, provider: &str, cancel: &watch::Receiver<bool>) -> Option<Permit> {
        if *cancel.borrow() {
            return None;
        }

        let slot = self.concurrency.clone().acquire_owned().await.ok()?;

        loop {
            if *cancel.borrow() {
                return None;
            }
            {
                let mut buckets = self.buckets.lock().await;
                let bucket = buckets
                    .entry(provider.to_string())
                    .or_insert_with(|| TokenBucket::new(self.requests_per_minute));
                if bucket.try_take() {
                    return Some(Permit { _slot: slot });
                }
            }

            let mut cancel_watch = cancel.clone();
            tokio::select! {
                _ = sleep(POLL_INTERVAL) => {}
                _ = cancel_watch.changed() => {
                    if *cancel_watch.borrow() {
                        return None;
                    }
                }
            }
        }
    }

    /// Non-blocking variant: requires both a free slot and >=1 token right
    /// now; releases the slot immediately on a token miss.
    pub fn try_acquire(&self, provider: &str) -> Option<Permit> {
        let slot = self.concurrency.clone().try_acquire_owned().ok()?;
        let mut buckets = self.buckets.try_lock().ok()?;
        let bucket = buckets
            .entry(provider.to_string())
            .or_insert_with(|| TokenBucket::new(self.requests_per_minute));
        if bucket.try_take() {
            Some(Permit { _slot: slot })
        } else {
            None
        }
    }

    pub async fn available_tokens(&self, provider: &str) -> f64 {
        let mut buckets = self.buckets.lock().await;
        let bucket = buckets
            .entry(provider.to_string())
            .or_insert_with(|| TokenBucket::new(self.requests_per_minute));
        bucket.refill();
        bucket.tokens
    }

    pub async fn estimated_wait(&self, provider: &str) -> Duration {
        let mut buckets = self.buckets.lock().await;
        let bucket = buckets
            .entry(provider.to_string())
            .or_insert_with(|| TokenBucket::new(self.requests_per_minute));
        bucket.estimated_wait()
    }
}
