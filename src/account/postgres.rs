//! Postgres persistence for accounts and collections.

use std::time::Duration;

use anyhow::Context;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::{PgPool, postgres::PgPoolOptions};
use tracing::{Instrument, error};
use uuid::Uuid;

use crate::error::IdentityError;

use super::models::{Account, CollectionEntry, Relation};
use super::store::AccountStore;

/// [`AccountStore`] backed by Postgres.
///
/// Each method is a single SQL statement, so the server provides the
/// check-and-write atomicity the contract asks for. Account uniqueness rides
/// on the partial unique index over active emails, which stays correct under
/// concurrent inserts where a lookup-then-insert would race.
#[derive(Clone)]
pub struct PgAccountStore {
    pool: PgPool,
}

impl PgAccountStore {
    #[must_use]
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Connect to Postgres using `dsn`.
    ///
    /// # Errors
    ///
    /// Fails when the DSN does not parse or the database is unreachable.
    pub async fn connect(dsn: &str) -> anyhow::Result<Self> {
        let pool = PgPoolOptions::new()
            .max_connections(5)
            .acquire_timeout(Duration::from_secs(5))
            .connect(dsn)
            .await
            .context("failed to connect to postgres")?;

        Ok(Self { pool })
    }

    /// The underlying pool, e.g. for applying the schema in tests.
    #[must_use]
    pub fn pool(&self) -> &PgPool {
        &self.pool
    }
}

fn is_unique_violation(err: &sqlx::Error) -> bool {
    match err {
        sqlx::Error::Database(db_err) => db_err.code().is_some_and(|code| code.as_ref() == "23505"),
        _ => false,
    }
}

fn storage_error(action: &str, err: &sqlx::Error) -> IdentityError {
    error!("failed to {action}: {err}");
    IdentityError::Storage
}

#[async_trait]
impl AccountStore for PgAccountStore {
    async fn insert_account(
        &self,
        name: &str,
        email: &str,
        password_digest: &str,
        verify_token: &str,
        token_ttl_seconds: i64,
    ) -> Result<Account, IdentityError> {
        let query = r"
            INSERT INTO accounts
                (name, email, password_digest, verify_token, token_expires_at)
            VALUES ($1, $2, $3, $4, NOW() + ($5 * INTERVAL '1 second'))
            RETURNING id, name, email, password_digest, is_verified, verify_token,
                token_expires_at, last_login, created_at, deleted_at
        ";
        let span = tracing::info_span!(
            "db.query",
            db.system = "postgresql",
            db.operation = "INSERT",
            db.statement = query
        );
        let row = sqlx::query_as::<_, Account>(query)
            .bind(name)
            .bind(email)
            .bind(password_digest)
            .bind(verify_token)
            .bind(token_ttl_seconds)
            .fetch_one(&self.pool)
            .instrument(span)
            .await;

        match row {
            Ok(account) => Ok(account),
            Err(err) if is_unique_violation(&err) => Err(IdentityError::DuplicateAccount),
            Err(err) => Err(storage_error("insert account", &err)),
        }
    }

    async fn find_active_by_email(&self, email: &str) -> Result<Account, IdentityError> {
        let query = r"
            SELECT id, name, email, password_digest, is_verified, verify_token,
                token_expires_at, last_login, created_at, deleted_at
            FROM accounts
            WHERE email = $1 AND deleted_at IS NULL
        ";
        let span = tracing::info_span!(
            "db.query",
            db.system = "postgresql",
            db.operation = "SELECT",
            db.statement = query
        );
        let row = sqlx::query_as::<_, Account>(query)
            .bind(email)
            .fetch_optional(&self.pool)
            .instrument(span)
            .await
            .map_err(|err| storage_error("look up account by email", &err))?;

        row.ok_or(IdentityError::NotFound)
    }

    async fn update_digest(&self, id: Uuid, password_digest: &str) -> Result<(), IdentityError> {
        let query = r"
            UPDATE accounts
            SET password_digest = $2
            WHERE id = $1 AND deleted_at IS NULL
        ";
        let span = tracing::info_span!(
            "db.query",
            db.system = "postgresql",
            db.operation = "UPDATE",
            db.statement = query
        );
        let result = sqlx::query(query)
            .bind(id)
            .bind(password_digest)
            .execute(&self.pool)
            .instrument(span)
            .await
            .map_err(|err| storage_error("update password digest", &err))?;

        if result.rows_affected() == 0 {
            return Err(IdentityError::NotFound);
        }
        Ok(())
    }

    async fn update_last_login(&self, id: Uuid, at: DateTime<Utc>) -> Result<(), IdentityError> {
        let query = r"
            UPDATE accounts
            SET last_login = $2
            WHERE id = $1 AND deleted_at IS NULL
        ";
        let span = tracing::info_span!(
            "db.query",
            db.system = "postgresql",
            db.operation = "UPDATE",
            db.statement = query
        );
        let result = sqlx::query(query)
            .bind(id)
            .bind(at)
            .execute(&self.pool)
            .instrument(span)
            .await
            .map_err(|err| storage_error("update last login", &err))?;

        if result.rows_affected() == 0 {
            return Err(IdentityError::NotFound);
        }
        Ok(())
    }

    async fn soft_delete(&self, email: &str) -> Result<(), IdentityError> {
        let query = r"
            UPDATE accounts
            SET deleted_at = NOW()
            WHERE email = $1 AND deleted_at IS NULL
        ";
        let span = tracing::info_span!(
            "db.query",
            db.system = "postgresql",
            db.operation = "UPDATE",
            db.statement = query
        );
        let result = sqlx::query(query)
            .bind(email)
            .execute(&self.pool)
            .instrument(span)
            .await
            .map_err(|err| storage_error("soft delete account", &err))?;

        if result.rows_affected() == 0 {
            return Err(IdentityError::NotFound);
        }
        Ok(())
    }

    async fn replace_verify_token(
        &self,
        id: Uuid,
        verify_token: &str,
        token_ttl_seconds: i64,
    ) -> Result<(), IdentityError> {
        let query = r"
            UPDATE accounts
            SET verify_token = $2,
                token_expires_at = NOW() + ($3 * INTERVAL '1 second')
            WHERE id = $1 AND is_verified = FALSE AND deleted_at IS NULL
        ";
        let span = tracing::info_span!(
            "db.query",
            db.system = "postgresql",
            db.operation = "UPDATE",
            db.statement = query
        );
        let result = sqlx::query(query)
            .bind(id)
            .bind(verify_token)
            .bind(token_ttl_seconds)
            .execute(&self.pool)
            .instrument(span)
            .await
            .map_err(|err| storage_error("replace verification token", &err))?;

        if result.rows_affected() == 0 {
            return Err(IdentityError::NotFound);
        }
        Ok(())
    }

    async fn consume_verify_token(&self, verify_token: &str) -> Result<Account, IdentityError> {
        // The row filter is the whole validity check; whichever concurrent
        // caller updates the row first clears the token for everyone else.
        let query = r"
            UPDATE accounts
            SET is_verified = TRUE, verify_token = NULL, token_expires_at = NULL
            WHERE verify_token = $1
                AND is_verified = FALSE
                AND deleted_at IS NULL
                AND token_expires_at > NOW()
            RETURNING id, name, email, password_digest, is_verified, verify_token,
                token_expires_at, last_login, created_at, deleted_at
        ";
        let span = tracing::info_span!(
            "db.query",
            db.system = "postgresql",
            db.operation = "UPDATE",
            db.statement = query
        );
        let row = sqlx::query_as::<_, Account>(query)
            .bind(verify_token)
            .fetch_optional(&self.pool)
            .instrument(span)
            .await
            .map_err(|err| storage_error("consume verification token", &err))?;

        row.ok_or(IdentityError::TokenInvalidOrExpired)
    }

    async fn upsert_collection_entry(
        &self,
        account_id: Uuid,
        movie_id: i64,
        relation: Relation,
        user_score: Option<i32>,
    ) -> Result<CollectionEntry, IdentityError> {
        // INSERT .. SELECT keeps the active-account check and the write in
        // one statement; a deleted or unknown account yields zero rows. The
        // conflict arm leaves added_at untouched on overwrite.
        let query = r"
            INSERT INTO collection_entries
                (account_id, movie_id, relation, user_score)
            SELECT a.id, $2, $3, $4
            FROM accounts a
            WHERE a.id = $1 AND a.deleted_at IS NULL
            ON CONFLICT (account_id, movie_id)
                DO UPDATE SET relation = EXCLUDED.relation, user_score = EXCLUDED.user_score
            RETURNING account_id, movie_id, relation, user_score, added_at
        ";
        let span = tracing::info_span!(
            "db.query",
            db.system = "postgresql",
            db.operation = "INSERT",
            db.statement = query
        );
        let row = sqlx::query_as::<_, CollectionEntry>(query)
            .bind(account_id)
            .bind(movie_id)
            .bind(relation.as_str())
            .bind(user_score)
            .fetch_optional(&self.pool)
            .instrument(span)
            .await
            .map_err(|err| storage_error("upsert collection entry", &err))?;

        row.ok_or(IdentityError::NotFound)
    }

    async fn delete_collection_entry(
        &self,
        account_id: Uuid,
        movie_id: i64,
        relation: Relation,
    ) -> Result<(), IdentityError> {
        let query = r"
            DELETE FROM collection_entries
            USING accounts
            WHERE accounts.id = collection_entries.account_id
                AND accounts.deleted_at IS NULL
                AND collection_entries.account_id = $1
                AND collection_entries.movie_id = $2
                AND collection_entries.relation = $3
        ";
        let span = tracing::info_span!(
            "db.query",
            db.system = "postgresql",
            db.operation = "DELETE",
            db.statement = query
        );
        let result = sqlx::query(query)
            .bind(account_id)
            .bind(movie_id)
            .bind(relation.as_str())
            .execute(&self.pool)
            .instrument(span)
            .await
            .map_err(|err| storage_error("delete collection entry", &err))?;

        if result.rows_affected() == 0 {
            return Err(IdentityError::NotFound);
        }
        Ok(())
    }

    async fn list_collection_entries(
        &self,
        account_id: Uuid,
    ) -> Result<Vec<CollectionEntry>, IdentityError> {
        let query = r"
            SELECT ce.account_id, ce.movie_id, ce.relation, ce.user_score, ce.added_at
            FROM collection_entries ce
            JOIN accounts a ON a.id = ce.account_id
            WHERE ce.account_id = $1 AND a.deleted_at IS NULL
            ORDER BY ce.added_at DESC, ce.movie_id
        ";
        let span = tracing::info_span!(
            "db.query",
            db.system = "postgresql",
            db.operation = "SELECT",
            db.statement = query
        );
        sqlx::query_as::<_, CollectionEntry>(query)
            .bind(account_id)
            .fetch_all(&self.pool)
            .instrument(span)
            .await
            .map_err(|err| storage_error("list collection entries", &err))
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use std::borrow::Cow;
    use std::error::Error as StdError;
    use std::fmt;

    use sqlx::error::{DatabaseError, ErrorKind};

    use super::*;

    #[derive(Debug)]
    struct TestDbError {
        code: Option<&'static str>,
    }

    impl fmt::Display for TestDbError {
        fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
            write!(f, "test database error")
        }
    }

    impl StdError for TestDbError {}

    impl DatabaseError for TestDbError {
        fn message(&self) -> &'static str {
            "test database error"
        }

        fn code(&self) -> Option<Cow<'_, str>> {
            self.code.map(Cow::Borrowed)
        }

        fn as_error(&self) -> &(dyn StdError + Send + Sync + 'static) {
            self
        }

        fn as_error_mut(&mut self) -> &mut (dyn StdError + Send + Sync + 'static) {
            self
        }

        fn into_error(self: Box<Self>) -> Box<dyn StdError + Send + Sync + 'static> {
            self
        }

        fn kind(&self) -> ErrorKind {
            ErrorKind::Other
        }
    }

    #[test]
    fn is_unique_violation_matches_sqlstate() {
        let err = sqlx::Error::Database(Box::new(TestDbError {
            code: Some("23505"),
        }));
        assert!(is_unique_violation(&err));

        let err = sqlx::Error::Database(Box::new(TestDbError {
            code: Some("99999"),
        }));
        assert!(!is_unique_violation(&err));

        let err = sqlx::Error::RowNotFound;
        assert!(!is_unique_violation(&err));
    }

    #[test]
    fn storage_error_is_opaque() {
        let err = sqlx::Error::PoolTimedOut;
        assert_eq!(storage_error("reach the database", &err), IdentityError::Storage);
    }
}
