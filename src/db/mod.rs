//! Database module: models and schema for persistent storage.
//!
//! Layout:
//! - `models.rs`: Rust structs mirroring DB rows and conversions
//! - `schema.rs`: SQL DDL for initializing the database (SQLite-first)
//! - `sqlite.rs`: the `Storage` handle and its queries

pub mod models;
pub mod schema;
pub mod sqlite;

pub use models::{DbUser, DbWatchlist};
pub use schema::SQLITE_INIT;
pub use sqlite::{SqlitePool, Storage};
