use async_trait::async_trait;
use rento_core::rate_limit::{RateLimitDecision, RateLimitStore};
use rento_core::{CoreError, CoreResult};
use std::time::Duration;
use tracing::info;

/// Shared fixed-window counters, so every API instance sees the same totals.
#[derive(Clone)]
pub struct RedisRateLimitStore {
    client: redis::Client,
}

impl RedisRateLimitStore {
    pub fn new(connection_string: &str) -> Result<Self, redis::RedisError> {
        let client = redis::Client::open(connection_string)?;
        info!("Redis rate limiting enabled");
        Ok(Self { client })
    }
}

#[async_trait]
impl RateLimitStore for RedisRateLimitStore {
    async fn hit(&self, key: &str, limit: u32, window: Duration) -> CoreResult<RateLimitDecision> {
        let mut conn = self
            .client
            .get_multiplexed_async_connection()
            .await
            .map_err(|e| CoreError::ExternalService(format!("redis: {}", e)))?;

        let key = format!("ratelimit:{}", key);
        let window_secs = window.as_secs().max(1) as i64;

        // Start the expiry clock only on the first hit of a window
        let script = redis::Script::new(
            r#"
            local count = redis.call("INCR", KEYS[1])
            if count == 1 then
                redis.call("EXPIRE", KEYS[1], ARGV[1])
            end
            return {count, redis.call("TTL", KEYS[1])}
        "#,
        );
        let (count, ttl): (i64, i64) = script
            .key(&key)
            .arg(window_secs)
            .invoke_async(&mut conn)
            .await
            .map_err(|e| CoreError::ExternalService(format!("redis: {}", e)))?;

        let count = u32::try_from(count).unwrap_or(u32::MAX);
        let reset_after = if ttl > 0 {
            Duration::from_secs(ttl as u64)
        } else {
            window
        };

        Ok(RateLimitDecision {
            allowed: count <= limit,
            limit,
            remaining: limit.saturating_sub(count),
            reset_after,
        })
    }
}
