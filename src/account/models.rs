use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::{FromRow, Row, postgres::PgRow};
use uuid::Uuid;

use crate::error::IdentityError;

/// How a movie is attached to an account's collection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Relation {
    Favorite,
    Watchlist,
}

impl Relation {
    /// The persisted `collection_entries.relation` textual value.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Favorite => "favorite",
            Self::Watchlist => "watchlist",
        }
    }

    /// Parse the persisted `collection_entries.relation` value into a typed enum.
    fn from_db(value: &str) -> Result<Self, sqlx::Error> {
        match value {
            "favorite" => Ok(Self::Favorite),
            "watchlist" => Ok(Self::Watchlist),
            _ => Err(sqlx::Error::Decode(Box::new(std::io::Error::new(
                std::io::ErrorKind::InvalidData,
                format!("invalid collection_entries.relation value: {value}"),
            )))),
        }
    }
}

impl std::str::FromStr for Relation {
    type Err = IdentityError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value {
            "favorite" => Ok(Self::Favorite),
            "watchlist" => Ok(Self::Watchlist),
            _ => Err(IdentityError::Validation(format!(
                "unknown relation: {value}"
            ))),
        }
    }
}

/// An account row loaded from `accounts`.
///
/// The password digest and the pending verification token never serialize;
/// they stay inside the service and store layers.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Account {
    pub id: Uuid,
    pub name: String,
    pub email: String,
    #[serde(skip)]
    pub password_digest: String,
    pub is_verified: bool,
    #[serde(skip)]
    pub verify_token: Option<String>,
    pub token_expires_at: Option<DateTime<Utc>>,
    pub last_login: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub deleted_at: Option<DateTime<Utc>>,
}

impl<'r> FromRow<'r, PgRow> for Account {
    fn from_row(row: &'r PgRow) -> Result<Self, sqlx::Error> {
        Ok(Self {
            id: row.try_get("id")?,
            name: row.try_get("name")?,
            email: row.try_get("email")?,
            password_digest: row.try_get("password_digest")?,
            is_verified: row.try_get("is_verified")?,
            verify_token: row.try_get("verify_token")?,
            token_expires_at: row.try_get("token_expires_at")?,
            last_login: row.try_get("last_login")?,
            created_at: row.try_get("created_at")?,
            deleted_at: row.try_get("deleted_at")?,
        })
    }
}

/// One membership row from `collection_entries`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CollectionEntry {
    pub account_id: Uuid,
    pub movie_id: i64,
    pub relation: Relation,
    pub user_score: Option<i32>,
    pub added_at: DateTime<Utc>,
}

impl<'r> FromRow<'r, PgRow> for CollectionEntry {
    fn from_row(row: &'r PgRow) -> Result<Self, sqlx::Error> {
        let relation: String = row.try_get("relation")?;
        Ok(Self {
            account_id: row.try_get("account_id")?,
            movie_id: row.try_get("movie_id")?,
            relation: Relation::from_db(&relation)?,
            user_score: row.try_get("user_score")?,
            added_at: row.try_get("added_at")?,
        })
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn relation_textual_forms_round_trip() {
        for relation in [Relation::Favorite, Relation::Watchlist] {
            let parsed: Relation = relation.as_str().parse().unwrap();
            assert_eq!(parsed, relation);
        }
    }

    #[test]
    fn relation_rejects_unknown_values() {
        let err = "liked".parse::<Relation>().unwrap_err();
        assert_eq!(
            err,
            IdentityError::Validation("unknown relation: liked".to_string())
        );
    }

    #[test]
    fn relation_serializes_lowercase() {
        let json = serde_json::to_string(&Relation::Watchlist).unwrap();
        assert_eq!(json, "\"watchlist\"");
    }

    #[test]
    fn account_serialization_hides_secrets() {
        let account = Account {
            id: Uuid::new_v4(),
            name: "Ada".to_string(),
            email: "ada@example.com".to_string(),
            password_digest: "$2b$04$digest".to_string(),
            is_verified: false,
            verify_token: Some("pending-token".to_string()),
            token_expires_at: Some(Utc::now()),
            last_login: None,
            created_at: Utc::now(),
            deleted_at: None,
        };

        let json = serde_json::to_string(&account).unwrap();
        assert!(!json.contains("digest"));
        assert!(!json.contains("pending-token"));
        assert!(json.contains("ada@example.com"));
    }
}
