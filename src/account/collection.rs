//! Favorite/watchlist membership per account.

use std::sync::Arc;

use uuid::Uuid;

use crate::error::IdentityError;

use super::models::{CollectionEntry, Relation};
use super::store::AccountStore;

/// Maintains the one-relation-per-movie shape of an account's collection.
#[derive(Clone)]
pub struct CollectionManager {
    store: Arc<dyn AccountStore>,
}

impl CollectionManager {
    #[must_use]
    pub fn new(store: Arc<dyn AccountStore>) -> Self {
        Self { store }
    }

    /// File `movie_id` under `relation`, overwriting any previous relation
    /// and score for the same movie. The first write sets the added-at
    /// timestamp; overwrites keep it.
    ///
    /// # Errors
    ///
    /// `IdentityError::Validation` for a non-positive movie id,
    /// `IdentityError::NotFound` when the account is not active.
    pub async fn set_membership(
        &self,
        account_id: Uuid,
        movie_id: i64,
        relation: Relation,
        user_score: Option<i32>,
    ) -> Result<CollectionEntry, IdentityError> {
        if movie_id <= 0 {
            return Err(IdentityError::Validation(
                "movie id must be positive".to_string(),
            ));
        }

        self.store
            .upsert_collection_entry(account_id, movie_id, relation, user_score)
            .await
    }

    /// Remove `movie_id` from the collection, but only when the stored
    /// relation matches `relation`.
    ///
    /// # Errors
    ///
    /// `IdentityError::NotFound` when no entry with exactly this relation
    /// exists for an active account. Nothing is altered in that case.
    pub async fn remove_membership(
        &self,
        account_id: Uuid,
        movie_id: i64,
        relation: Relation,
    ) -> Result<(), IdentityError> {
        self.store
            .delete_collection_entry(account_id, movie_id, relation)
            .await
    }

    /// The account's collection, most recently added first. An unknown or
    /// deleted account lists as empty.
    pub async fn list_for_account(
        &self,
        account_id: Uuid,
    ) -> Result<Vec<CollectionEntry>, IdentityError> {
        self.store.list_collection_entries(account_id).await
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use crate::account::MemoryAccountStore;

    use super::*;

    async fn harness() -> (CollectionManager, Uuid) {
        let store = Arc::new(MemoryAccountStore::new());
        let account = store
            .insert_account("Test", "movies@example.com", "$2b$04$digest", "tok", 3600)
            .await
            .unwrap();
        (CollectionManager::new(store), account.id)
    }

    #[tokio::test]
    async fn non_positive_movie_ids_are_rejected() {
        let (collections, account_id) = harness().await;

        for movie_id in [0, -3] {
            let err = collections
                .set_membership(account_id, movie_id, Relation::Favorite, None)
                .await
                .unwrap_err();
            assert_eq!(
                err,
                crate::error::IdentityError::Validation("movie id must be positive".to_string())
            );
        }
    }

    #[tokio::test]
    async fn set_then_remove_round_trip() {
        let (collections, account_id) = harness().await;

        collections
            .set_membership(account_id, 603, Relation::Favorite, Some(10))
            .await
            .unwrap();
        let entries = collections.list_for_account(account_id).await.unwrap();
        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].user_score, Some(10));

        collections
            .remove_membership(account_id, 603, Relation::Favorite)
            .await
            .unwrap();
        assert!(collections.list_for_account(account_id).await.unwrap().is_empty());
    }
}
