pub mod auth;
pub mod health;
pub mod stocks;
pub mod upload;
pub mod watchlists;
