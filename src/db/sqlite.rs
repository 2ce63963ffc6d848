use crate::db::models::{DbUser, DbWatchlist};
use crate::db::schema::SQLITE_INIT;
use crate::error::ApiError;
use crate::types::{Stock, UserPreferences};
use chrono::{DateTime, Utc};
use sqlx::sqlite::{SqliteConnectOptions, SqlitePoolOptions, SqliteRow};
use sqlx::{Pool, Row, Sqlite};
use std::str::FromStr;
use std::time::Duration;
use tracing::info;

pub type SqlitePool = Pool<Sqlite>;

const USER_COLUMNS: &str = "id, email, username, password_hash, full_name, preferences, \
                            created_at, updated_at, is_active";

const WATCHLIST_COLUMNS: &str =
    "id, user_id, name, description, stocks, created_at, updated_at, is_default";

#[derive(Clone)]
pub struct Storage {
    pool: SqlitePool,
}

impl Storage {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    /// Open (creating if needed) the database at `database_url` and apply the schema.
    ///
    /// In-memory databases live as long as their connection, so they get a
    /// single connection that is never recycled.
    pub async fn connect(database_url: &str) -> Result<Self, ApiError> {
        let connect_opts = SqliteConnectOptions::from_str(database_url)?
            .create_if_missing(true)
            .foreign_keys(true)
            .busy_timeout(Duration::from_secs(10));
        let mut pool_opts = SqlitePoolOptions::new();
        if database_url.contains(":memory:") {
            pool_opts = pool_opts
                .max_connections(1)
                .idle_timeout(None)
                .max_lifetime(None);
        }
        let pool = pool_opts.connect_with(connect_opts).await?;
        let storage = Self::new(pool);
        storage.init_schema().await?;
        info!(database_url, "storage ready");
        Ok(storage)
    }

    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }

    /// Initialize the schema by executing the bundled DDL.
    pub async fn init_schema(&self) -> Result<(), ApiError> {
        // sqlx::query runs one statement at a time
        for stmt in SQLITE_INIT.split(';') {
            let s = stmt.trim();
            if s.is_empty() {
                continue;
            }
            sqlx::query(s).execute(&self.pool).await?;
        }
        Ok(())
    }

    pub async fn insert_user(&self, user: &DbUser) -> Result<(), ApiError> {
        let preferences = serde_json::to_string(&user.preferences)?;
        let result = sqlx::query(
            r#"
            INSERT INTO users (
                id, email, username, password_hash, full_name, preferences,
                created_at, updated_at, is_active
            ) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(&user.id)
        .bind(&user.email)
        .bind(&user.username)
        .bind(&user.password_hash)
        .bind(&user.full_name)
        .bind(preferences)
        .bind(user.created_at.to_rfc3339())
        .bind(user.updated_at.to_rfc3339())
        .bind(user.is_active as i64)
        .execute(&self.pool)
        .await;

        match result {
            Ok(_) => Ok(()),
            Err(e) if is_unique_violation(&e) => {
                Err(ApiError::bad_request("Email or username already registered"))
            }
            Err(e) => Err(e.into()),
        }
    }

    pub async fn find_user_by_email(&self, email: &str) -> Result<Option<DbUser>, ApiError> {
        let row = sqlx::query(&format!("SELECT {USER_COLUMNS} FROM users WHERE email = ?"))
            .bind(email)
            .fetch_optional(&self.pool)
            .await?;
        row.map(Self::row_to_user).transpose()
    }

    pub async fn find_user_by_username(&self, username: &str) -> Result<Option<DbUser>, ApiError> {
        let row = sqlx::query(&format!("SELECT {USER_COLUMNS} FROM users WHERE username = ?"))
            .bind(username)
            .fetch_optional(&self.pool)
            .await?;
        row.map(Self::row_to_user).transpose()
    }

    pub async fn get_user(&self, id: &str) -> Result<Option<DbUser>, ApiError> {
        let row = sqlx::query(&format!("SELECT {USER_COLUMNS} FROM users WHERE id = ?"))
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;
        row.map(Self::row_to_user).transpose()
    }

    /// Update the mutable profile fields; `None` leaves a field untouched.
    pub async fn update_profile(
        &self,
        id: &str,
        full_name: Option<String>,
        preferences: Option<UserPreferences>,
    ) -> Result<Option<DbUser>, ApiError> {
        let preferences = preferences.as_ref().map(serde_json::to_string).transpose()?;
        sqlx::query(
            r#"UPDATE users SET
                full_name = COALESCE(?, full_name),
                preferences = COALESCE(?, preferences),
                updated_at = ?
              WHERE id = ?"#,
        )
        .bind(full_name)
        .bind(preferences)
        .bind(Utc::now().to_rfc3339())
        .bind(id)
        .execute(&self.pool)
        .await?;
        self.get_user(id).await
    }

    pub async fn set_password_hash(&self, id: &str, password_hash: &str) -> Result<(), ApiError> {
        sqlx::query("UPDATE users SET password_hash = ?, updated_at = ? WHERE id = ?")
            .bind(password_hash)
            .bind(Utc::now().to_rfc3339())
            .bind(id)
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    pub async fn insert_watchlist(&self, watchlist: &DbWatchlist) -> Result<(), ApiError> {
        let stocks = serde_json::to_string(&watchlist.stocks)?;
        sqlx::query(
            r#"
            INSERT INTO watchlists (
                id, user_id, name, description, stocks, created_at, updated_at, is_default
            ) VALUES (?, ?, ?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(&watchlist.id)
        .bind(&watchlist.user_id)
        .bind(&watchlist.name)
        .bind(&watchlist.description)
        .bind(stocks)
        .bind(watchlist.created_at.to_rfc3339())
        .bind(watchlist.updated_at.to_rfc3339())
        .bind(watchlist.is_default as i64)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    pub async fn list_watchlists(&self, user_id: &str) -> Result<Vec<DbWatchlist>, ApiError> {
        let rows = sqlx::query(&format!(
            "SELECT {WATCHLIST_COLUMNS} FROM watchlists WHERE user_id = ? ORDER BY created_at, id"
        ))
        .bind(user_id)
        .fetch_all(&self.pool)
        .await?;
        rows.into_iter().map(Self::row_to_watchlist).collect()
    }

    /// Fetch a watchlist only if it belongs to `user_id`.
    pub async fn get_watchlist(
        &self,
        id: &str,
        user_id: &str,
    ) -> Result<Option<DbWatchlist>, ApiError> {
        let row = sqlx::query(&format!(
            "SELECT {WATCHLIST_COLUMNS} FROM watchlists WHERE id = ? AND user_id = ?"
        ))
        .bind(id)
        .bind(user_id)
        .fetch_optional(&self.pool)
        .await?;
        row.map(Self::row_to_watchlist).transpose()
    }

    pub async fn update_watchlist_meta(
        &self,
        id: &str,
        user_id: &str,
        name: Option<String>,
        description: Option<String>,
    ) -> Result<Option<DbWatchlist>, ApiError> {
        let done = sqlx::query(
            r#"UPDATE watchlists SET
                name = COALESCE(?, name),
                description = COALESCE(?, description),
                updated_at = ?
              WHERE id = ? AND user_id = ?"#,
        )
        .bind(name)
        .bind(description)
        .bind(Utc::now().to_rfc3339())
        .bind(id)
        .bind(user_id)
        .execute(&self.pool)
        .await?;
        if done.rows_affected() == 0 {
            return Ok(None);
        }
        self.get_watchlist(id, user_id).await
    }

    /// Returns false when nothing matched (unknown id or another user's list).
    pub async fn delete_watchlist(&self, id: &str, user_id: &str) -> Result<bool, ApiError> {
        let done = sqlx::query("DELETE FROM watchlists WHERE id = ? AND user_id = ?")
            .bind(id)
            .bind(user_id)
            .execute(&self.pool)
            .await?;
        Ok(done.rows_affected() > 0)
    }

    /// Read-modify-write of a watchlist's stock document inside one transaction.
    ///
    /// The transaction takes the write lock up front (`BEGIN IMMEDIATE`) so
    /// concurrent editors queue on the busy timeout instead of failing the
    /// read-to-write upgrade.
    ///
    /// `edit` sees the current stocks and may reject the change; the row is
    /// left untouched in that case. Returns `Ok(None)` when the list does not
    /// exist for this user.
    pub async fn modify_stocks<F>(
        &self,
        id: &str,
        user_id: &str,
        edit: F,
    ) -> Result<Option<DbWatchlist>, ApiError>
    where
        F: FnOnce(&mut Vec<Stock>) -> Result<(), ApiError>,
    {
        let mut tx = self.pool.begin_with("BEGIN IMMEDIATE").await?;

        let row = sqlx::query(&format!(
            "SELECT {WATCHLIST_COLUMNS} FROM watchlists WHERE id = ? AND user_id = ?"
        ))
        .bind(id)
        .bind(user_id)
        .fetch_optional(&mut *tx)
        .await?;
        let Some(row) = row else {
            return Ok(None);
        };
        let mut watchlist = Self::row_to_watchlist(row)?;

        edit(&mut watchlist.stocks)?;
        watchlist.updated_at = Utc::now();

        sqlx::query("UPDATE watchlists SET stocks = ?, updated_at = ? WHERE id = ?")
            .bind(serde_json::to_string(&watchlist.stocks)?)
            .bind(watchlist.updated_at.to_rfc3339())
            .bind(id)
            .execute(&mut *tx)
            .await?;

        tx.commit().await?;
        Ok(Some(watchlist))
    }

    fn row_to_user(row: SqliteRow) -> Result<DbUser, ApiError> {
        let preferences_json: String = row.try_get("preferences")?;
        let preferences: UserPreferences = serde_json::from_str(&preferences_json)
            .map_err(|e| sqlx::Error::Decode(Box::new(e)))?;
        let is_active: i64 = row.try_get("is_active")?;

        Ok(DbUser {
            id: row.try_get("id")?,
            email: row.try_get("email")?,
            username: row.try_get("username")?,
            password_hash: row.try_get("password_hash")?,
            full_name: row.try_get("full_name")?,
            preferences,
            created_at: parse_timestamp(row.try_get("created_at")?)?,
            updated_at: parse_timestamp(row.try_get("updated_at")?)?,
            is_active: is_active != 0,
        })
    }

    fn row_to_watchlist(row: SqliteRow) -> Result<DbWatchlist, ApiError> {
        let stocks_json: String = row.try_get("stocks")?;
        let stocks: Vec<Stock> =
            serde_json::from_str(&stocks_json).map_err(|e| sqlx::Error::Decode(Box::new(e)))?;
        let is_default: i64 = row.try_get("is_default")?;

        Ok(DbWatchlist {
            id: row.try_get("id")?,
            user_id: row.try_get("user_id")?,
            name: row.try_get("name")?,
            description: row.try_get("description")?,
            stocks,
            created_at: parse_timestamp(row.try_get("created_at")?)?,
            updated_at: parse_timestamp(row.try_get("updated_at")?)?,
            is_default: is_default != 0,
        })
    }
}

fn parse_timestamp(raw: String) -> Result<DateTime<Utc>, ApiError> {
    Ok(DateTime::parse_from_rfc3339(&raw)
        .map_err(|e| sqlx::Error::Decode(Box::new(e)))?
        .with_timezone(&Utc))
}

fn is_unique_violation(err: &sqlx::Error) -> bool {
    err.as_database_error()
        .is_some_and(|db_err| db_err.is_unique_violation())
}
