//! SQL DDL for initializing the account and watchlist storage.

/// SQLite schema with:
/// - `users`: one row per account, `email` and `username` UNIQUE
/// - `preferences` stored as a JSON document in TEXT
/// - `watchlists`: one row per list; `stocks` is a JSON array document
/// - timestamps stored as RFC3339 TEXT
pub const SQLITE_INIT: &str = r#"
CREATE TABLE IF NOT EXISTS users (
    id TEXT PRIMARY KEY,
    email TEXT NOT NULL UNIQUE,
    username TEXT NOT NULL UNIQUE,
    password_hash TEXT NOT NULL,
    full_name TEXT NULL,
    preferences TEXT NOT NULL, -- JSON object
    created_at TEXT NOT NULL,
    updated_at TEXT NOT NULL,
    is_active INTEGER NOT NULL DEFAULT 1
);

CREATE TABLE IF NOT EXISTS watchlists (
    id TEXT PRIMARY KEY,
    user_id TEXT NOT NULL REFERENCES users(id) ON DELETE CASCADE,
    name TEXT NOT NULL,
    description TEXT NULL,
    stocks TEXT NOT NULL DEFAULT '[]', -- JSON array of {symbol, name, added_at}
    created_at TEXT NOT NULL,
    updated_at TEXT NOT NULL,
    is_default INTEGER NOT NULL DEFAULT 0
);

CREATE INDEX IF NOT EXISTS idx_watchlists_user_id ON watchlists(user_id);

CREATE INDEX IF NOT EXISTS idx_watchlists_user_name ON watchlists(user_id, name);
"#;
