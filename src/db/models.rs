use crate::types::{Stock, User, UserPreferences, Watchlist};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Full account row, including the credential hash that never leaves the server.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct DbUser {
    pub id: String,
    pub email: String,
    pub username: String,
    pub password_hash: String,
    pub full_name: Option<String>,
    pub preferences: UserPreferences,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub is_active: bool,
}

impl DbUser {
    pub fn new(
        email: String,
        username: String,
        password_hash: String,
        full_name: Option<String>,
    ) -> Self {
        let now = Utc::now();
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            email,
            username,
            password_hash,
            full_name,
            preferences: UserPreferences::default(),
            created_at: now,
            updated_at: now,
            is_active: true,
        }
    }
}

impl From<DbUser> for User {
    fn from(d: DbUser) -> Self {
        User {
            id: d.id,
            email: d.email,
            username: d.username,
            full_name: d.full_name,
            created_at: d.created_at,
            is_active: d.is_active,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct DbWatchlist {
    pub id: String,
    pub user_id: String,
    pub name: String,
    pub description: Option<String>,
    pub stocks: Vec<Stock>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub is_default: bool,
}

impl DbWatchlist {
    pub fn new(
        user_id: impl Into<String>,
        name: impl Into<String>,
        description: Option<String>,
        stocks: Vec<Stock>,
    ) -> Self {
        let now = Utc::now();
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            user_id: user_id.into(),
            name: name.into(),
            description,
            stocks,
            created_at: now,
            updated_at: now,
            is_default: false,
        }
    }
}

impl From<DbWatchlist> for Watchlist {
    fn from(d: DbWatchlist) -> Self {
        Watchlist {
            id: d.id,
            user_id: d.user_id,
            name: d.name,
            description: d.description,
            stocks: d.stocks,
            created_at: d.created_at,
            updated_at: d.updated_at,
            is_default: d.is_default,
        }
    }
}
