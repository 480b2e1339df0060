//! Cooldown rate limiting over a store shared by every service instance.

use std::time::Duration;

use async_trait::async_trait;

use crate::error::IdentityError;

mod memory;
mod redis;

pub use self::memory::MemoryRateLimitCounter;
pub use self::redis::RedisRateLimitCounter;

/// Counter that admits at most one action per key per cooldown window.
///
/// `try_consume` performs one indivisible check-and-set against the shared
/// store: it succeeds when no live entry exists for `key` and in the same
/// step records one that expires after `cooldown`. Two concurrent calls for
/// the same key never both succeed. A refused call leaves the store
/// untouched.
#[async_trait]
pub trait RateLimitCounter: Send + Sync {
    /// # Errors
    ///
    /// `IdentityError::Storage` when the counter store is unreachable.
    /// Callers treat that as a refusal, not an allowance.
    async fn try_consume(&self, key: &str, cooldown: Duration) -> Result<bool, IdentityError>;
}
