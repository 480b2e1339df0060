use std::collections::HashMap;
use std::time::{Duration, Instant};

use async_trait::async_trait;
use tokio::sync::Mutex;

use crate::error::IdentityError;

use super::RateLimitCounter;

/// In-process counter for tests and single-instance deployments.
///
/// The expiry sweep, the membership check, and the insert all run under one
/// lock acquisition, which gives the same single-winner guarantee the shared
/// store implementations provide.
#[derive(Debug, Default)]
pub struct MemoryRateLimitCounter {
    deadlines: Mutex<HashMap<String, Instant>>,
}

impl MemoryRateLimitCounter {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl RateLimitCounter for MemoryRateLimitCounter {
    async fn try_consume(&self, key: &str, cooldown: Duration) -> Result<bool, IdentityError> {
        let now = Instant::now();
        let mut deadlines = self.deadlines.lock().await;

        deadlines.retain(|_, deadline| *deadline > now);

        if deadlines.contains_key(key) {
            return Ok(false);
        }

        deadlines.insert(key.to_string(), now + cooldown);
        Ok(true)
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use std::sync::Arc;

    use super::*;

    #[tokio::test]
    async fn consume_then_refuse_within_cooldown() -> anyhow::Result<()> {
        let counter = MemoryRateLimitCounter::new();

        assert!(
            counter
                .try_consume("resend:one@example.com", Duration::from_secs(60))
                .await?
        );
        assert!(
            !counter
                .try_consume("resend:one@example.com", Duration::from_secs(60))
                .await?
        );

        Ok(())
    }

    #[tokio::test]
    async fn allows_again_after_cooldown_elapses() -> anyhow::Result<()> {
        let counter = MemoryRateLimitCounter::new();

        assert!(
            counter
                .try_consume("resend:two@example.com", Duration::from_millis(50))
                .await?
        );
        tokio::time::sleep(Duration::from_millis(80)).await;
        assert!(
            counter
                .try_consume("resend:two@example.com", Duration::from_millis(50))
                .await?
        );

        Ok(())
    }

    #[tokio::test]
    async fn distinct_keys_do_not_interfere() -> anyhow::Result<()> {
        let counter = MemoryRateLimitCounter::new();

        assert!(
            counter
                .try_consume("resend:a@example.com", Duration::from_secs(60))
                .await?
        );
        assert!(
            counter
                .try_consume("resend:b@example.com", Duration::from_secs(60))
                .await?
        );

        Ok(())
    }

    #[tokio::test]
    async fn refused_call_does_not_extend_the_window() -> anyhow::Result<()> {
        let counter = MemoryRateLimitCounter::new();

        assert!(
            counter
                .try_consume("resend:three@example.com", Duration::from_millis(60))
                .await?
        );
        tokio::time::sleep(Duration::from_millis(40)).await;
        assert!(
            !counter
                .try_consume("resend:three@example.com", Duration::from_millis(60))
                .await?
        );
        tokio::time::sleep(Duration::from_millis(40)).await;
        assert!(
            counter
                .try_consume("resend:three@example.com", Duration::from_millis(60))
                .await?
        );

        Ok(())
    }

    #[tokio::test]
    async fn concurrent_consume_has_a_single_winner() -> anyhow::Result<()> {
        let counter = Arc::new(MemoryRateLimitCounter::new());

        let mut tasks = Vec::new();
        for _ in 0..8 {
            let counter = counter.clone();
            tasks.push(tokio::spawn(async move {
                counter
                    .try_consume("resend:burst@example.com", Duration::from_secs(60))
                    .await
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
