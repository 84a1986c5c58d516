use std::collections::HashMap;

use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};
use tokio::sync::Mutex;

/// Shared counter store for the rate limiter. Injected into the guard so the
/// backing store can be swapped (and so tests never touch process globals).
#[async_trait]
pub trait RateLimitStore: Send + Sync {
    /// Atomically increments the counter for `key` within the current fixed
    /// window and returns the post-increment count. The window resets on a
    /// wall-clock boundary, so bucket edges allow brief bursts up to roughly
    /// twice the nominal rate.
    async fn increment(&self, key: &str, window_seconds: i64) -> u64;
}

#[derive(Default)]
pub struct InMemoryRateLimitStore {
    counters: Mutex<HashMap<String, (DateTime<Utc>, u64)>>,
}

impl InMemoryRateLimitStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl RateLimitStore for InMemoryRateLimitStore {
    async fn increment(&self, key: &str, window_seconds: i64) -> u64 {
        let now = Utc::now();
        let mut counters = self.counters.lock().await;

        let entry = counters.entry(key.to_string()).or_insert((now, 0));
        if now - entry.0 >= Duration::seconds(window_seconds) {
            *entry = (now, 0);
        }
        entry.1 += 1;
        entry.1
    }
}
