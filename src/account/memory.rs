use std::collections::HashMap;

use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};
use tokio::sync::Mutex;
use uuid::Uuid;

use crate::error::IdentityError;

use super::models::{Account, CollectionEntry, Relation};
use super::store::AccountStore;

#[derive(Debug, Default)]
struct State {
    accounts: HashMap<Uuid, Account>,
    collections: HashMap<(Uuid, i64), CollectionEntry>,
}

/// In-memory [`AccountStore`] for tests and single-process setups.
///
/// All state sits behind one lock, so each operation is as indivisible as
/// its Postgres counterpart, conditional-write misses included.
#[derive(Debug, Default)]
pub struct MemoryAccountStore {
    state: Mutex<State>,
}

impl MemoryAccountStore {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl AccountStore for MemoryAccountStore {
    async fn insert_account(
        &self,
        name: &str,
        email: &str,
        password_digest: &str,
        verify_token: &str,
        token_ttl_seconds: i64,
    ) -> Result<Account, IdentityError> {
        let mut state = self.state.lock().await;

        let taken = state
            .accounts
            .values()
            .any(|account| account.deleted_at.is_none() && account.email == email);
        if taken {
            return Err(IdentityError::DuplicateAccount);
        }

        let now = Utc::now();
        let account = Account {
            id: Uuid::new_v4(),
            name: name.to_string(),
            email: email.to_string(),
            password_digest: password_digest.to_string(),
            is_verified: false,
            verify_token: Some(verify_token.to_string()),
            token_expires_at: Some(now + Duration::seconds(token_ttl_seconds)),
            last_login: None,
            created_at: now,
            deleted_at: None,
        };
        state.accounts.insert(account.id, account.clone());

        Ok(account)
    }

    async fn find_active_by_email(&self, email: &str) -> Result<Account, IdentityError> {
        let state = self.state.lock().await;

        state
            .accounts
            .values()
            .find(|account| account.deleted_at.is_none() && account.email == email)
            .cloned()
            .ok_or(IdentityError::NotFound)
    }

    async fn update_digest(&self, id: Uuid, password_digest: &str) -> Result<(), IdentityError> {
        let mut state = self.state.lock().await;

        let Some(account) = state
            .accounts
            .get_mut(&id)
            .filter(|account| account.deleted_at.is_none())
        else {
            return Err(IdentityError::NotFound);
        };

        account.password_digest = password_digest.to_string();
        Ok(())
    }

    async fn update_last_login(&self, id: Uuid, at: DateTime<Utc>) -> Result<(), IdentityError> {
        let mut state = self.state.lock().await;

        let Some(account) = state
            .accounts
            .get_mut(&id)
            .filter(|account| account.deleted_at.is_none())
        else {
            return Err(IdentityError::NotFound);
        };

        account.last_login = Some(at);
        Ok(())
    }

    async fn soft_delete(&self, email: &str) -> Result<(), IdentityError> {
        let mut state = self.state.lock().await;

        let Some(account) = state
            .accounts
            .values_mut()
            .find(|account| account.deleted_at.is_none() && account.email == email)
        else {
            return Err(IdentityError::NotFound);
        };

        account.deleted_at = Some(Utc::now());
        Ok(())
    }

    async fn replace_verify_token(
        &self,
        id: Uuid,
        verify_token: &str,
        token_ttl_seconds: i64,
    ) -> Result<(), IdentityError> {
        let mut state = self.state.lock().await;

        let Some(account) = state
            .accounts
            .get_mut(&id)
            .filter(|account| account.deleted_at.is_none() && !account.is_verified)
        else {
            return Err(IdentityError::NotFound);
        };

        account.verify_token = Some(verify_token.to_string());
        account.token_expires_at = Some(Utc::now() + Duration::seconds(token_ttl_seconds));
        Ok(())
    }

    async fn consume_verify_token(&self, verify_token: &str) -> Result<Account, IdentityError> {
        let now = Utc::now();
        let mut state = self.state.lock().await;

        let Some(account) = state.accounts.values_mut().find(|account| {
            account.deleted_at.is_none()
                && !account.is_verified
                && account.verify_token.as_deref() == Some(verify_token)
                && account
                    .token_expires_at
                    .is_some_and(|expires_at| expires_at > now)
        }) else {
            return Err(IdentityError::TokenInvalidOrExpired);
        };

        account.is_verified = true;
        account.verify_token = None;
        account.token_expires_at = None;

        Ok(account.clone())
    }

    async fn upsert_collection_entry(
        &self,
        account_id: Uuid,
        movie_id: i64,
        relation: Relation,
        user_score: Option<i32>,
    ) -> Result<CollectionEntry, IdentityError> {
        let mut state = self.state.lock().await;

        let active = state
            .accounts
            .get(&account_id)
            .is_some_and(|account| account.deleted_at.is_none());
        if !active {
            return Err(IdentityError::NotFound);
        }

        let entry = state
            .collections
            .entry((account_id, movie_id))
            .and_modify(|entry| {
                entry.relation = relation;
                entry.user_score = user_score;
            })
            .or_insert_with(|| CollectionEntry {
                account_id,
                movie_id,
                relation,
                user_score,
                added_at: Utc::now(),
            });

        Ok(entry.clone())
    }

    async fn delete_collection_entry(
        &self,
        account_id: Uuid,
        movie_id: i64,
        relation: Relation,
    ) -> Result<(), IdentityError> {
        let mut state = self.state.lock().await;

        let active = state
            .accounts
            .get(&account_id)
            .is_some_and(|account| account.deleted_at.is_none());
        if !active {
            return Err(IdentityError::NotFound);
        }

        let matches = state
            .collections
            .get(&(account_id, movie_id))
            .is_some_and(|entry| entry.relation == relation);
        if !matches {
            return Err(IdentityError::NotFound);
        }

        state.collections.remove(&(account_id, movie_id));
        Ok(())
    }

    async fn list_collection_entries(
        &self,
        account_id: Uuid,
    ) -> Result<Vec<CollectionEntry>, IdentityError> {
        let state = self.state.lock().await;

        let active = state
            .accounts
            .get(&account_id)
            .is_some_and(|account| account.deleted_at.is_none());
        if !active {
            return Ok(Vec::new());
        }

        let mut entries: Vec<CollectionEntry> = state
            .collections
            .values()
            .filter(|entry| entry.account_id == account_id)
            .cloned()
            .collect();
        entries.sort_by(|a, b| b.added_at.cmp(&a.added_at).then(a.movie_id.cmp(&b.movie_id)));

        Ok(entries)
    }
}
