//! Runtime configuration for the identity services.

use anyhow::{Context, Result, anyhow};
use secrecy::SecretString;

const DEFAULT_TOKEN_TTL_SECONDS: i64 = 24 * 60 * 60;
const DEFAULT_RESEND_COOLDOWN_SECONDS: u64 = 60;
const DEFAULT_BEARER_TTL_SECONDS: i64 = 24 * 60 * 60;
const DEFAULT_ISSUER: &str = "marquee";

/// Tunables for account verification, password hashing, and bearer tokens.
///
/// The bearer signing secret has no default and must be supplied by the
/// caller, either directly or through `MARQUEE_BEARER_SECRET`.
#[derive(Clone)]
pub struct IdentityConfig {
    token_ttl_seconds: i64,
    resend_cooldown_seconds: u64,
    hash_cost: u32,
    bearer_secret: SecretString,
    bearer_ttl_seconds: i64,
    issuer: String,
}

impl IdentityConfig {
    #[must_use]
    pub fn new(bearer_secret: SecretString) -> Self {
        Self {
            token_ttl_seconds: DEFAULT_TOKEN_TTL_SECONDS,
            resend_cooldown_seconds: DEFAULT_RESEND_COOLDOWN_SECONDS,
            hash_cost: bcrypt::DEFAULT_COST,
            bearer_secret,
            bearer_ttl_seconds: DEFAULT_BEARER_TTL_SECONDS,
            issuer: DEFAULT_ISSUER.to_string(),
        }
    }

    /// Build a configuration from `MARQUEE_*` environment variables.
    ///
    /// Only `MARQUEE_BEARER_SECRET` is required; every other variable falls
    /// back to its default when unset or empty.
    ///
    /// # Errors
    ///
    /// Fails when the secret is missing or empty, when a numeric variable
    /// does not parse, or when a lifetime is not positive.
    pub fn from_env() -> Result<Self> {
        let secret =
            std::env::var("MARQUEE_BEARER_SECRET").context("MARQUEE_BEARER_SECRET is not set")?;
        if secret.is_empty() {
            return Err(anyhow!("MARQUEE_BEARER_SECRET must not be empty"));
        }

        let mut config = Self::new(SecretString::from(secret));
        if let Some(seconds) = parse_env::<i64>("MARQUEE_TOKEN_TTL_SECONDS")? {
            if seconds <= 0 {
                return Err(anyhow!("MARQUEE_TOKEN_TTL_SECONDS must be positive"));
            }
            config.token_ttl_seconds = seconds;
        }
        if let Some(seconds) = parse_env::<u64>("MARQUEE_RESEND_COOLDOWN_SECONDS")? {
            config.resend_cooldown_seconds = seconds;
        }
        if let Some(cost) = parse_env::<u32>("MARQUEE_HASH_COST")? {
            config.hash_cost = cost;
        }
        if let Some(seconds) = parse_env::<i64>("MARQUEE_BEARER_TTL_SECONDS")? {
            if seconds <= 0 {
                return Err(anyhow!("MARQUEE_BEARER_TTL_SECONDS must be positive"));
            }
            config.bearer_ttl_seconds = seconds;
        }
        if let Some(issuer) = parse_env::<String>("MARQUEE_ISSUER")? {
            config.issuer = issuer;
        }
        Ok(config)
    }

    #[must_use]
    pub fn with_token_ttl_seconds(mut self, seconds: i64) -> Self {
        self.token_ttl_seconds = seconds;
        self
    }

    #[must_use]
    pub fn with_resend_cooldown_seconds(mut self, seconds: u64) -> Self {
        self.resend_cooldown_seconds = seconds;
        self
    }

    #[must_use]
    pub fn with_hash_cost(mut self, cost: u32) -> Self {
        self.hash_cost = cost;
        self
    }

    #[must_use]
    pub fn with_bearer_ttl_seconds(mut self, seconds: i64) -> Self {
        self.bearer_ttl_seconds = seconds;
        self
    }

    #[must_use]
    pub fn with_issuer(mut self, issuer: String) -> Self {
        self.issuer = issuer;
        self
    }

    #[must_use]
    pub fn token_ttl_seconds(&self) -> i64 {
        self.token_ttl_seconds
    }

    #[must_use]
    pub fn resend_cooldown_seconds(&self) -> u64 {
        self.resend_cooldown_seconds
    }

    #[must_use]
    pub fn hash_cost(&self) -> u32 {
        self.hash_cost
    }

    #[must_use]
    pub fn bearer_ttl_seconds(&self) -> i64 {
        self.bearer_ttl_seconds
    }

    #[must_use]
    pub fn issuer(&self) -> &str {
        &self.issuer
    }

    pub(crate) fn bearer_secret(&self) -> &SecretString {
        &self.bearer_secret
    }
}

impl std::fmt::Debug for IdentityConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("IdentityConfig")
            .field("token_ttl_seconds", &self.token_ttl_seconds)
            .field("resend_cooldown_seconds", &self.resend_cooldown_seconds)
            .field("hash_cost", &self.hash_cost)
            .field("bearer_secret", &"***")
            .field("bearer_ttl_seconds", &self.bearer_ttl_seconds)
            .field("issuer", &self.issuer)
            .finish()
    }
}

fn parse_env<T>(name: &str) -> Result<Option<T>>
where
    T: std::str::FromStr,
    T::Err: std::error::Error + Send + Sync + 'static,
{
    match std::env::var(name) {
        Ok(value) if !value.is_empty() => {
            let parsed = value
                .parse()
                .with_context(|| format!("invalid value for {name}"))?;
            Ok(Some(parsed))
        }
        _ => Ok(None),
    }
}
