pub mod client;
pub mod config;
pub mod db;
pub mod error;
pub mod handlers;
pub mod market;
pub mod middleware;
pub mod router;
pub mod security;
pub mod service;
pub mod state;
pub mod types;

pub use client::{AuthenticatedClient, ClientError, SessionObserver, TokenStore};
pub use error::ApiError;
pub use router::{AppState, app_router};
