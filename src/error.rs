//! Error kinds shared by the account, token, and collection services.

/// Errors surfaced to callers of the identity and collection APIs.
///
/// `InvalidCredentials` deliberately covers both an unknown email and a wrong
/// password so callers cannot probe which addresses have accounts. `Storage`
/// is opaque on purpose: the driver-level detail is logged where the failure
/// happens and never rendered to callers.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum IdentityError {
    #[error("{0}")]
    Validation(String),
    #[error("an account with this email already exists")]
    DuplicateAccount,
    #[error("invalid email or password")]
    InvalidCredentials,
    #[error("email address is not confirmed")]
    NotConfirmed,
    #[error("verification token is invalid or expired")]
    TokenInvalidOrExpired,
    #[error("too many requests, retry in {retry_after_seconds}s")]
    RateLimited { retry_after_seconds: u64 },
    #[error("not found")]
    NotFound,
    #[error("storage backend unavailable")]
    Storage,
}

#[cfg(test)]
mod tests {
    use super::IdentityError;

    #[test]
    fn display_is_caller_safe() {
        assert_eq!(
            IdentityError::InvalidCredentials.to_string(),
            "invalid email or password"
        );
        assert_eq!(
            IdentityError::Storage.to_string(),
            "storage backend unavailable"
        );
        assert_eq!(
            IdentityError::RateLimited {
                retry_after_seconds: 60
            }
            .to_string(),
            "too many requests, retry in 60s"
        );
    }

    #[test]
    fn validation_carries_message() {
        let err = IdentityError::Validation("name must not be empty".to_string());
        assert_eq!(err.to_string(), "name must not be empty");
    }
}
