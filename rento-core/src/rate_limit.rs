use async_trait::async_trait;
use std::time::Duration;

use crate::CoreResult;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RateLimitDecision {
    pub allowed: bool,
    pub limit: u32,
    pub remaining: u32,
    /// Time until the current window resets
    pub reset_after: Duration,
}

/// Fixed-window request counter. Swappable so the HTTP layer does not care
/// whether counts live in process memory or Redis.
#[async_trait]
pub trait RateLimitStore: Send + Sync {
    async fn hit(&self, key: &str, limit: u32, window: Duration) -> CoreResult<RateLimitDecision>;
}
