//! Account registration, authentication, and lifecycle flows.

use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use regex::Regex;
use tracing::{error, info};

use crate::bearer::TokenSigner;
use crate::config::IdentityConfig;
use crate::error::IdentityError;
use crate::notify::Notifier;
use crate::password::PasswordHasher;
use crate::rate_limit::RateLimitCounter;

use super::models::Account;
use super::store::AccountStore;
use super::tokens::{VerificationTokenManager, generate_verification_token};

/// Basic shape check for an email address. Matching elsewhere stays
/// case-sensitive and exact; nothing here normalizes.
fn valid_email(email: &str) -> bool {
    Regex::new(r"^[^@\s]+@[^@\s]+\.[^@\s]+$").is_ok_and(|regex| regex.is_match(email))
}

/// Outcome of a successful authentication.
#[derive(Debug, Clone)]
pub struct Session {
    pub account: Account,
    pub bearer_token: String,
}

/// Orchestrates account flows over the storage, hashing, signing, rate
/// limiting, and notification seams.
///
/// Authentication failures surface as one generic
/// [`IdentityError::InvalidCredentials`] whether the account is missing or
/// the password is wrong, so callers cannot probe which addresses are
/// registered.
#[derive(Clone)]
pub struct AuthenticationService {
    store: Arc<dyn AccountStore>,
    rate_limiter: Arc<dyn RateLimitCounter>,
    hasher: Arc<dyn PasswordHasher>,
    signer: Arc<dyn TokenSigner>,
    tokens: VerificationTokenManager,
    config: IdentityConfig,
}

impl AuthenticationService {
    #[must_use]
    pub fn new(
        store: Arc<dyn AccountStore>,
        rate_limiter: Arc<dyn RateLimitCounter>,
        hasher: Arc<dyn PasswordHasher>,
        signer: Arc<dyn TokenSigner>,
        notifier: Arc<dyn Notifier>,
        config: IdentityConfig,
    ) -> Self {
        let tokens = VerificationTokenManager::new(store.clone(), notifier, config.clone());
        Self {
            store,
            rate_limiter,
            hasher,
            signer,
            tokens,
            config,
        }
    }

    /// The verification token manager wired to the same store and notifier.
    #[must_use]
    pub fn verification(&self) -> &VerificationTokenManager {
        &self.tokens
    }

    /// Create an unverified account and dispatch its verification token.
    ///
    /// Registration succeeds even when dispatch fails; the token sits in the
    /// store and a resend can recover it.
    ///
    /// # Errors
    ///
    /// `IdentityError::Validation` for empty fields or a malformed email,
    /// `IdentityError::DuplicateAccount` when an active account already
    /// holds the address.
    pub async fn register(
        &self,
        name: &str,
        email: &str,
        password: &str,
    ) -> Result<Account, IdentityError> {
        if name.is_empty() || email.is_empty() || password.is_empty() {
            return Err(IdentityError::Validation(
                "name, email, and password are required".to_string(),
            ));
        }
        if !valid_email(email) {
            return Err(IdentityError::Validation(
                "email address is not valid".to_string(),
            ));
        }

        let digest = self.hasher.hash(password).await?;
        let token = generate_verification_token()?;
        let account = self
            .store
            .insert_account(name, email, &digest, &token, self.config.token_ttl_seconds())
            .await?;

        self.tokens.dispatch(email, &token).await;
        info!("registered account {} for {email}", account.id);

        Ok(account)
    }

    /// Check credentials and open a session.
    ///
    /// The password is verified before the confirmation state is looked at,
    /// so an unconfirmed response always proves the caller holds the
    /// password. On that path a fresh verification token is issued and the
    /// call reports [`IdentityError::NotConfirmed`].
    ///
    /// A failed last-login write is logged and recovered locally; it never
    /// turns a correct login into a failure.
    ///
    /// # Errors
    ///
    /// `IdentityError::InvalidCredentials` for an unknown address, a wrong
    /// password, or empty credentials, with no distinction between them.
    pub async fn authenticate(
        &self,
        email: &str,
        password: &str,
    ) -> Result<Session, IdentityError> {
        if email.is_empty() || password.is_empty() {
            return Err(IdentityError::InvalidCredentials);
        }

        let mut account = match self.store.find_active_by_email(email).await {
            Ok(account) => account,
            Err(IdentityError::NotFound) => return Err(IdentityError::InvalidCredentials),
            Err(err) => return Err(err),
        };

        if !self
            .hasher
            .verify(password, &account.password_digest)
            .await?
        {
            return Err(IdentityError::InvalidCredentials);
        }

        if !account.is_verified {
            self.tokens.issue(&account).await?;
            return Err(IdentityError::NotConfirmed);
        }

        let now = Utc::now();
        match self.store.update_last_login(account.id, now).await {
            Ok(()) => account.last_login = Some(now),
            Err(err) => error!("failed to record last login for {}: {err}", account.id),
        }

        let bearer_token = self.signer.sign(&account.email)?;

        Ok(Session {
            account,
            bearer_token,
        })
    }

    /// Replace the password after re-proving the current one.
    ///
    /// A wrong current password changes nothing.
    ///
    /// # Errors
    ///
    /// `IdentityError::Validation` when the new password is empty,
    /// `IdentityError::InvalidCredentials` when the current credentials do
    /// not check out.
    pub async fn reset_password(
        &self,
        email: &str,
        current_password: &str,
        new_password: &str,
    ) -> Result<(), IdentityError> {
        if new_password.is_empty() {
            return Err(IdentityError::Validation(
                "new password must not be empty".to_string(),
            ));
        }
        if email.is_empty() || current_password.is_empty() {
            return Err(IdentityError::InvalidCredentials);
        }

        let account = match self.store.find_active_by_email(email).await {
            Ok(account) => account,
            Err(IdentityError::NotFound) => return Err(IdentityError::InvalidCredentials),
            Err(err) => return Err(err),
        };

        if !self
            .hasher
            .verify(current_password, &account.password_digest)
            .await?
        {
            return Err(IdentityError::InvalidCredentials);
        }

        let digest = self.hasher.hash(new_password).await?;
        self.store.update_digest(account.id, &digest).await?;

        info!("rotated password for account {}", account.id);
        Ok(())
    }

    /// Soft-delete the account holding `email`. Every later read or write
    /// behaves as if the account never existed, and the address becomes free
    /// to register again.
    ///
    /// # Errors
    ///
    /// `IdentityError::NotFound` when no active account holds `email`.
    pub async fn delete_account(&self, email: &str) -> Result<(), IdentityError> {
        self.store.soft_delete(email).await?;
        info!("soft-deleted account for {email}");
        Ok(())
    }

    /// Re-issue the verification token for an unverified account, at most
    /// once per cooldown window.
    ///
    /// The counter is consulted before the store is touched, so a refused
    /// call neither probes account existence nor mutates anything.
    ///
    /// # Errors
    ///
    /// `IdentityError::RateLimited` inside the cooldown window,
    /// `IdentityError::NotFound` when no active unverified account holds
    /// `email`.
    pub async fn resend_verification(&self, email: &str) -> Result<String, IdentityError> {
        let cooldown = self.config.resend_cooldown_seconds();
        let allowed = self
            .rate_limiter
            .try_consume(&format!("resend:{email}"), Duration::from_secs(cooldown))
            .await?;
        if !allowed {
            return Err(IdentityError::RateLimited {
                retry_after_seconds: cooldown,
            });
        }

        self.tokens.resend(email).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn valid_email_accepts_common_shapes() {
        assert!(valid_email("ada@example.com"));
        assert!(valid_email("ada+tag@sub.example.co"));
    }

    #[test]
    fn valid_email_rejects_malformed_shapes() {
        assert!(!valid_email(""));
        assert!(!valid_email("ada"));
        assert!(!valid_email("ada@example"));
        assert!(!valid_email("ada @example.com"));
        assert!(!valid_email("@example.com"));
    }
}
