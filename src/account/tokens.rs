//! Email verification token issue, resend, and consume flows.

use std::sync::Arc;

use base64::Engine;
use rand::{RngCore, rngs::OsRng};
use tracing::{error, warn};

use crate::config::IdentityConfig;
use crate::error::IdentityError;
use crate::notify::Notifier;

use super::models::Account;
use super::store::AccountStore;

/// Create a fresh URL-safe verification token carrying 256 bits of
/// randomness. The value itself is the credential; nothing else proves
/// ownership of the pending address.
pub(crate) fn generate_verification_token() -> Result<String, IdentityError> {
    let mut bytes = [0u8; 32];
    OsRng.try_fill_bytes(&mut bytes).map_err(|err| {
        error!("failed to generate verification token: {err}");
        IdentityError::Storage
    })?;
    Ok(base64::engine::general_purpose::URL_SAFE_NO_PAD.encode(bytes))
}

/// Issues, resends, and consumes email verification tokens.
///
/// An account row holds at most one live token, so issuing a new one
/// invalidates whatever was pending. Consumption is a conditional write in
/// the store, which keeps a token single-use even under concurrent verify
/// calls.
#[derive(Clone)]
pub struct VerificationTokenManager {
    store: Arc<dyn AccountStore>,
    notifier: Arc<dyn Notifier>,
    config: IdentityConfig,
}

impl VerificationTokenManager {
    #[must_use]
    pub fn new(
        store: Arc<dyn AccountStore>,
        notifier: Arc<dyn Notifier>,
        config: IdentityConfig,
    ) -> Self {
        Self {
            store,
            notifier,
            config,
        }
    }

    /// Store a fresh token for `account` and dispatch it. The token is also
    /// returned to the caller.
    ///
    /// # Errors
    ///
    /// `IdentityError::NotFound` when the account is no longer active and
    /// unverified.
    pub async fn issue(&self, account: &Account) -> Result<String, IdentityError> {
        let token = generate_verification_token()?;
        self.store
            .replace_verify_token(account.id, &token, self.config.token_ttl_seconds())
            .await?;
        self.dispatch(&account.email, &token).await;

        Ok(token)
    }

    /// Issue a fresh token for the active unverified account holding `email`.
    ///
    /// # Errors
    ///
    /// `IdentityError::NotFound` when no active account holds `email` or the
    /// account is already verified.
    pub async fn resend(&self, email: &str) -> Result<String, IdentityError> {
        let account = self.store.find_active_by_email(email).await?;
        if account.is_verified {
            return Err(IdentityError::NotFound);
        }

        self.issue(&account).await
    }

    /// Consume `token` and mark its account as verified, returning the
    /// verified email address.
    ///
    /// # Errors
    ///
    /// `IdentityError::TokenInvalidOrExpired` when the token is empty,
    /// unknown, already spent, or past its expiry.
    pub async fn verify(&self, token: &str) -> Result<String, IdentityError> {
        if token.is_empty() {
            return Err(IdentityError::TokenInvalidOrExpired);
        }

        let account = self.store.consume_verify_token(token).await?;
        Ok(account.email)
    }

    /// Hand a stored token to the notifier. Delivery failures are logged and
    /// swallowed; the token already sits in the store, and a resend covers a
    /// lost message.
    pub(crate) async fn dispatch(&self, email: &str, token: &str) {
        if let Err(err) = self.notifier.send(email, token).await {
            warn!("failed to deliver verification token to {email}: {err}");
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use anyhow::anyhow;
    use async_trait::async_trait;
    use secrecy::SecretString;

    use crate::account::MemoryAccountStore;
    use crate::notify::RecordingNotifier;

    use super::*;

    struct FailingNotifier;

    #[async_trait]
    impl Notifier for FailingNotifier {
        async fn send(&self, _email: &str, _token: &str) -> anyhow::Result<()> {
            Err(anyhow!("smtp unreachable"))
        }
    }

    fn test_config() -> IdentityConfig {
        IdentityConfig::new(SecretString::from("test-secret".to_string()))
    }

    fn manager(
        store: Arc<MemoryAccountStore>,
        notifier: Arc<dyn Notifier>,
    ) -> VerificationTokenManager {
        VerificationTokenManager::new(store, notifier, test_config())
    }

    async fn seed(store: &MemoryAccountStore, email: &str) -> Account {
        store
            .insert_account("Test", email, "$2b$04$digest", "seed-token", 3600)
            .await
            .unwrap()
    }

    #[test]
    fn generated_tokens_decode_to_32_bytes() {
        let decoded_len = generate_verification_token()
            .ok()
            .and_then(|token| {
                base64::engine::general_purpose::URL_SAFE_NO_PAD
                    .decode(token.as_bytes())
                    .ok()
            })
            .map(|bytes| bytes.len());
        assert_eq!(decoded_len, Some(32));
    }

    #[test]
    fn generated_tokens_are_unique() {
        let first = generate_verification_token().unwrap();
        let second = generate_verification_token().unwrap();
        assert_ne!(first, second);
    }

    #[tokio::test]
    async fn issue_replaces_the_pending_token_and_notifies() {
        let store = Arc::new(MemoryAccountStore::new());
        let notifier = Arc::new(RecordingNotifier::new());
        let manager = manager(store.clone(), notifier.clone());
        let account = seed(&store, "issue@example.com").await;

        let token = manager.issue(&account).await.unwrap();

        assert_eq!(notifier.last_token().await.as_deref(), Some(token.as_str()));
        assert_eq!(
            manager.verify("seed-token").await,
            Err(IdentityError::TokenInvalidOrExpired)
        );
        assert_eq!(manager.verify(&token).await.unwrap(), "issue@example.com");
    }

    #[tokio::test]
    async fn resend_requires_an_unverified_account() {
        let store = Arc::new(MemoryAccountStore::new());
        let notifier = Arc::new(RecordingNotifier::new());
        let manager = manager(store.clone(), notifier.clone());

        assert_eq!(
            manager.resend("nobody@example.com").await,
            Err(IdentityError::NotFound)
        );

        seed(&store, "resend@example.com").await;
        let token = manager.resend("resend@example.com").await.unwrap();
        manager.verify(&token).await.unwrap();

        assert_eq!(
            manager.resend("resend@example.com").await,
            Err(IdentityError::NotFound)
        );
    }

    #[tokio::test]
    async fn verify_consumes_a_token_exactly_once() {
        let store = Arc::new(MemoryAccountStore::new());
        let manager = manager(store.clone(), Arc::new(RecordingNotifier::new()));
        seed(&store, "verify@example.com").await;

        assert_eq!(manager.verify("seed-token").await.unwrap(), "verify@example.com");
        assert_eq!(
            manager.verify("seed-token").await,
            Err(IdentityError::TokenInvalidOrExpired)
        );
        assert_eq!(
            manager.verify("").await,
            Err(IdentityError::TokenInvalidOrExpired)
        );
    }

    #[tokio::test]
    async fn delivery_failures_do_not_fail_the_issue() {
        let store = Arc::new(MemoryAccountStore::new());
        let manager = manager(store.clone(), Arc::new(FailingNotifier));
        let account = seed(&store, "degraded@example.com").await;

        let token = manager.issue(&account).await.unwrap();
        assert_eq!(manager.verify(&token).await.unwrap(), "degraded@example.com");
    }
}
