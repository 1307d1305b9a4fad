use async_trait::async_trait;
use rento_core::rate_limit::{RateLimitDecision, RateLimitStore};
use rento_core::CoreResult;
use std::collections::HashMap;
use std::time::{Duration, Instant};
use tokio::sync::Mutex;

struct Window {
    started: Instant,
    count: u32,
}

/// Fixed-window counters held in process memory. Counts are per instance.
#[derive(Default)]
pub struct MemoryRateLimitStore {
    windows: Mutex<HashMap<String, Window>>,
}

impl MemoryRateLimitStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl RateLimitStore for MemoryRateLimitStore {
    async fn hit(&self, key: &str, limit: u32, window: Duration) -> CoreResult<RateLimitDecision> {
        let now = Instant::now();
        let mut windows = self.windows.lock().await;

        // Drop expired windows so the map does not grow with every client ever seen
        windows.retain(|_, w| now.duration_since(w.started) < window);

        let entry = windows.entry(key.to_string()).or_insert(Window {
            started: now,
            count: 0,
        });
        entry.count = entry.count.saturating_add(1);

        Ok(RateLimitDecision {
            allowed: entry.count <= limit,
            limit,
            remaining: limit.saturating_sub(entry.count),
            reset_after: window.saturating_sub(now.duration_since(entry.started)),
        })
    }
}
