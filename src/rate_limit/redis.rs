use std::time::Duration;

use anyhow::{Context, Result};
use async_trait::async_trait;
use chrono::Utc;
use redis::aio::ConnectionManager;
use tracing::error;

use crate::error::IdentityError;

use super::RateLimitCounter;

/// Redis-backed counter shared across service instances.
///
/// Built on a single `SET key value NX EX cooldown` command: the server
/// evaluates the existence check, the write, and the expiry as one step, so
/// concurrent callers for the same key cannot both win. The stored value is
/// the Unix timestamp of the admitted action and is informational only.
#[derive(Clone)]
pub struct RedisRateLimitCounter {
    conn: ConnectionManager,
}

impl RedisRateLimitCounter {
    /// Connect to Redis, e.g. `redis://127.0.0.1:6379`.
    ///
    /// # Errors
    ///
    /// Fails when the URL does not parse or the initial connection cannot be
    /// established.
    pub async fn connect(url: &str) -> Result<Self> {
        let client = redis::Client::open(url).context("invalid redis url")?;
        let conn = ConnectionManager::new(client)
            .await
            .context("failed to connect to redis")?;

        Ok(Self { conn })
    }
}

#[async_trait]
impl RateLimitCounter for RedisRateLimitCounter {
    async fn try_consume(&self, key: &str, cooldown: Duration) -> Result<bool, IdentityError> {
        let seconds = cooldown.as_secs();
        if seconds == 0 {
            return Ok(true);
        }

        let mut conn = self.conn.clone();
        let response: Option<String> = redis::cmd("SET")
            .arg(key)
            .arg(Utc::now().timestamp())
            .arg("NX")
            .arg("EX")
            .arg(seconds)
            .query_async(&mut conn)
            .await
            .map_err(|err| {
                error!("rate limit store unreachable: {err}");
                IdentityError::Storage
            })?;

        // SET .. NX answers OK when the key was written, nil when it existed.
        Ok(response.is_some())
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use std::sync::Arc;

    use uuid::Uuid;

    use super::*;

    // These tests require a running Redis instance:
    // docker run -d -p 6379:6379 redis:7-alpine

    const REDIS_URL: &str = "redis://127.0.0.1:6379";

    #[tokio::test]
    #[ignore] // Requires Redis running
    async fn consume_blocks_until_cooldown_expires() -> anyhow::Result<()> {
        let counter = RedisRateLimitCounter::connect(REDIS_URL).await?;
        let key = format!("resend:cooldown-{}@example.com", Uuid::new_v4());

        assert!(counter.try_consume(&key, Duration::from_secs(2)).await?);
        assert!(!counter.try_consume(&key, Duration::from_secs(2)).await?);

        tokio::time::sleep(Duration::from_secs(3)).await;
        assert!(counter.try_consume(&key, Duration::from_secs(2)).await?);

        Ok(())
    }

    #[tokio::test]
    #[ignore] // Requires Redis running
    async fn concurrent_consume_has_a_single_winner() -> anyhow::Result<()> {
        let counter = Arc::new(RedisRateLimitCounter::connect(REDIS_URL).await?);
        let key = format!("resend:burst-{}@example.com", Uuid::new_v4());

        let mut tasks = Vec::new();
        for _ in 0..8 {
            let counter = counter.clone();
            let key = key.clone();
            tasks.push(tokio::spawn(async move {
                counter.try_consume(&key, Duration::from_secs(60)).await
            }));
        }

        let mut allowed = 0;
        for task in tasks {
            if task.await?? {
                allowed += 1;
            }
        }
        assert_eq!(allowed, 1);

        Ok(())
    }
}
