//! Password hashing seam and its bcrypt implementation.

use async_trait::async_trait;
use tracing::error;

use crate::error::IdentityError;

/// One-way password hashing used by registration and authentication.
#[async_trait]
pub trait PasswordHasher: Send + Sync {
    /// # Errors
    ///
    /// `IdentityError::Storage` when a digest cannot be computed.
    async fn hash(&self, password: &str) -> Result<String, IdentityError>;

    /// # Errors
    ///
    /// `IdentityError::Storage` when the stored digest cannot be checked,
    /// e.g. because it is not a valid bcrypt string.
    async fn verify(&self, password: &str, digest: &str) -> Result<bool, IdentityError>;
}

/// bcrypt-backed hasher.
///
/// Hashing runs on the blocking pool so a production cost factor does not
/// stall the async runtime.
#[derive(Clone, Copy, Debug)]
pub struct BcryptPasswordHasher {
    cost: u32,
}

impl BcryptPasswordHasher {
    #[must_use]
    pub fn new(cost: u32) -> Self {
        Self { cost }
    }
}

impl Default for BcryptPasswordHasher {
    fn default() -> Self {
        Self::new(bcrypt::DEFAULT_COST)
    }
}

#[async_trait]
impl PasswordHasher for BcryptPasswordHasher {
    async fn hash(&self, password: &str) -> Result<String, IdentityError> {
        let cost = self.cost;
        let password = password.to_string();
        tokio::task::spawn_blocking(move || bcrypt::hash(password, cost))
            .await
            .map_err(|err| {
                error!("password hashing task failed: {err}");
                IdentityError::Storage
            })?
            .map_err(|err| {
                error!("failed to hash password: {err}");
                IdentityError::Storage
            })
    }

    async fn verify(&self, password: &str, digest: &str) -> Result<bool, IdentityError> {
        let password = password.to_string();
        let digest = digest.to_string();
        tokio::task::spawn_blocking(move || bcrypt::verify(password, &digest))
            .await
            .map_err(|err| {
                error!("password verification task failed: {err}");
                IdentityError::Storage
            })?
            .map_err(|err| {
                error!("failed to check password digest: {err}");
                IdentityError::Storage
            })
    }
}
