//! Bearer token signing seam and its HS256 implementation.

use chrono::Utc;
use jsonwebtoken::{Algorithm, DecodingKey, EncodingKey, Header, Validation, decode, encode};
use secrecy::ExposeSecret;
use serde::{Deserialize, Serialize};
use tracing::{debug, error};

use crate::config::IdentityConfig;
use crate::error::IdentityError;

/// Signs and verifies the bearer tokens handed out on successful login.
pub trait TokenSigner: Send + Sync {
    /// # Errors
    ///
    /// `IdentityError::Storage` when signing fails.
    fn sign(&self, email: &str) -> Result<String, IdentityError>;

    /// Returns the email the token was issued for.
    ///
    /// # Errors
    ///
    /// `IdentityError::InvalidCredentials` for any token that does not
    /// verify: bad signature, wrong issuer, or expired.
    fn verify(&self, token: &str) -> Result<String, IdentityError>;
}

#[derive(Debug, Serialize, Deserialize)]
struct Claims {
    sub: String,
    iss: String,
    iat: i64,
    exp: i64,
}

/// HS256 JWT signer keyed by the configured bearer secret.
#[derive(Clone)]
pub struct JwtTokenSigner {
    encoding: EncodingKey,
    decoding: DecodingKey,
    ttl_seconds: i64,
    issuer: String,
}

impl JwtTokenSigner {
    #[must_use]
    pub fn from_config(config: &IdentityConfig) -> Self {
        let secret = config.bearer_secret().expose_secret().as_bytes();
        Self {
            encoding: EncodingKey::from_secret(secret),
            decoding: DecodingKey::from_secret(secret),
            ttl_seconds: config.bearer_ttl_seconds(),
            issuer: config.issuer().to_string(),
        }
    }
}

impl TokenSigner for JwtTokenSigner {
    fn sign(&self, email: &str) -> Result<String, IdentityError> {
        let now = Utc::now().timestamp();
        let claims = Claims {
            sub: email.to_string(),
            iss: self.issuer.clone(),
            iat: now,
            exp: now + self.ttl_seconds,
        };
        encode(&Header::default(), &claims, &self.encoding).map_err(|err| {
            error!("failed to sign bearer token: {err}");
            IdentityError::Storage
        })
    }

    fn verify(&self, token: &str) -> Result<String, IdentityError> {
        let mut validation = Validation::new(Algorithm::HS256);
        validation.set_issuer(&[&self.issuer]);
        let data = decode::<Claims>(token, &self.decoding, &validation).map_err(|err| {
            debug!("bearer token rejected: {err}");
            IdentityError::InvalidCredentials
        })?;
        Ok(data.claims.sub)
    }
}

/// Strip the `Bearer ` scheme from an `Authorization` header value.
#[must_use]
pub fn strip_bearer(header_value: &str) -> Option<&str> {
    header_value
        .strip_prefix("Bearer ")
        .map(str::trim)
        .filter(|token| !token.is_empty())
}
