use async_trait::async_trait;
use chrono::{DateTime, Utc};
use uuid::Uuid;

use crate::error::IdentityError;

use super::models::{Account, CollectionEntry, Relation};

/// Persistence contract for accounts and their movie collections.
///
/// Every operation addresses active rows only (`deleted_at` unset) and runs
/// as one indivisible step against the backing store. Mutations are
/// conditional writes: the row filter carries the full precondition, and a
/// write that matches nothing reports the miss instead of succeeding
/// silently. Multiple service instances may share one store; none of these
/// methods require coordination above the store itself.
///
/// `IdentityError::Storage` from any method means the backend failed; the
/// cause is logged at the call site inside the implementation and never
/// carried in the error.
#[async_trait]
pub trait AccountStore: Send + Sync {
    /// Insert an unverified account holding `verify_token` valid for
    /// `token_ttl_seconds`.
    ///
    /// # Errors
    ///
    /// `IdentityError::DuplicateAccount` when an active account already
    /// holds `email`. Soft-deleted rows do not count; their address may be
    /// registered again.
    async fn insert_account(
        &self,
        name: &str,
        email: &str,
        password_digest: &str,
        verify_token: &str,
        token_ttl_seconds: i64,
    ) -> Result<Account, IdentityError>;

    /// Look up the active account holding `email`.
    ///
    /// # Errors
    ///
    /// `IdentityError::NotFound` when no active account matches.
    async fn find_active_by_email(&self, email: &str) -> Result<Account, IdentityError>;

    /// Replace the password digest of the active account `id`.
    ///
    /// # Errors
    ///
    /// `IdentityError::NotFound` when no active account matches.
    async fn update_digest(&self, id: Uuid, password_digest: &str) -> Result<(), IdentityError>;

    /// Record `at` as the last successful authentication of account `id`.
    ///
    /// # Errors
    ///
    /// `IdentityError::NotFound` when no active account matches.
    async fn update_last_login(&self, id: Uuid, at: DateTime<Utc>) -> Result<(), IdentityError>;

    /// Mark the active account holding `email` as deleted, keeping the row.
    ///
    /// # Errors
    ///
    /// `IdentityError::NotFound` when no active account matches.
    async fn soft_delete(&self, email: &str) -> Result<(), IdentityError>;

    /// Store a fresh verification token for the unverified account `id`,
    /// invalidating whatever token the row held before.
    ///
    /// # Errors
    ///
    /// `IdentityError::NotFound` when no active unverified account matches.
    async fn replace_verify_token(
        &self,
        id: Uuid,
        verify_token: &str,
        token_ttl_seconds: i64,
    ) -> Result<(), IdentityError>;

    /// Mark the account holding the unexpired `verify_token` as verified and
    /// clear the token, all in one conditional write. A token that matched
    /// once never matches again.
    ///
    /// # Errors
    ///
    /// `IdentityError::TokenInvalidOrExpired` when no row holds the token,
    /// the token has expired, or the account is already verified.
    async fn consume_verify_token(&self, verify_token: &str) -> Result<Account, IdentityError>;

    /// Create or overwrite the collection entry `(account_id, movie_id)`.
    /// An overwrite replaces relation and score but keeps the row's
    /// first added-at timestamp.
    ///
    /// # Errors
    ///
    /// `IdentityError::NotFound` when no active account matches `account_id`.
    async fn upsert_collection_entry(
        &self,
        account_id: Uuid,
        movie_id: i64,
        relation: Relation,
        user_score: Option<i32>,
    ) -> Result<CollectionEntry, IdentityError>;

    /// Delete the collection entry `(account_id, movie_id)` if it currently
    /// holds `relation`.
    ///
    /// # Errors
    ///
    /// `IdentityError::NotFound` when the account is not active, the entry
    /// does not exist, or it holds a different relation.
    async fn delete_collection_entry(
        &self,
        account_id: Uuid,
        movie_id: i64,
        relation: Relation,
    ) -> Result<(), IdentityError>;

    /// List the collection of the active account `account_id`, most recently
    /// added first. An unknown or deleted account lists as empty.
    async fn list_collection_entries(
        &self,
        account_id: Uuid,
    ) -> Result<Vec<CollectionEntry>, IdentityError>;
}
