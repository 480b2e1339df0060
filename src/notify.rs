//! Delivery seam for verification tokens.

use anyhow::Result;
use async_trait::async_trait;
use tokio::sync::Mutex;

/// Delivers a verification token to an account's email address.
///
/// Delivery is out of band: a failed send is logged by the caller and never
/// invalidates the token that was issued, so the account can always request a
/// resend.
#[async_trait]
pub trait Notifier: Send + Sync {
    /// # Errors
    ///
    /// Implementations report transport failures; callers treat them as
    /// non-fatal.
    async fn send(&self, email: &str, token: &str) -> Result<()>;
}

/// Logs each dispatch and does nothing else.
///
/// Useful when delivery is owned by an outbox worker or an external mailer
/// that picks tokens up elsewhere.
#[derive(Clone, Copy, Debug, Default)]
pub struct TracingNotifier;

#[async_trait]
impl Notifier for TracingNotifier {
    async fn send(&self, email: &str, _token: &str) -> Result<()> {
        tracing::info!("verification token issued for {email}");
        Ok(())
    }
}

/// Records every `(email, token)` pair it is asked to deliver.
#[derive(Debug, Default)]
pub struct RecordingNotifier {
    sent: Mutex<Vec<(String, String)>>,
}

impl RecordingNotifier {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Snapshot of everything sent so far, oldest first.
    pub async fn sent(&self) -> Vec<(String, String)> {
        self.sent.lock().await.clone()
    }

    /// Token from the most recent send, if any.
    pub async fn last_token(&self) -> Option<String> {
        self.sent
            .lock()
            .await
            .last()
            .map(|(_, token)| token.clone())
    }
}

#[async_trait]
impl Notifier for RecordingNotifier {
    async fn send(&self, email: &str, token: &str) -> Result<()> {
        self.sent
            .lock()
            .await
            .push((email.to_string(), token.to_string()));
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::{Notifier, RecordingNotifier, TracingNotifier};

    #[tokio::test]
    async fn recording_notifier_keeps_order() {
        let notifier = RecordingNotifier::new();
        notifier.send("a@example.com", "first").await.ok();
        notifier.send("b@example.com", "second").await.ok();

        let sent = notifier.sent().await;
        assert_eq!(sent.len(), 2);
        assert_eq!(sent[0], ("a@example.com".to_string(), "first".to_string()));
        assert_eq!(notifier.last_token().await.as_deref(), Some("second"));
    }

    #[tokio::test]
    async fn tracing_notifier_always_succeeds() {
        let notifier = TracingNotifier;
        assert!(notifier.send("a@example.com", "token").await.is_ok());
    }
}
