//! API client used by front ends: the token-refreshing HTTP layer, the
//! session store it shares with the host, and one typed wrapper per resource.

pub mod auth;
pub mod error;
pub mod http;
pub mod session;
pub mod stocks;
pub mod upload;
pub mod watchlists;

pub use auth::AuthApi;
pub use error::ClientError;
pub use http::{ApiRequest, AuthenticatedClient, MultipartField, RequestBody};
pub use session::{Session, SessionObserver, TokenStore};
pub use stocks::StockApi;
pub use upload::UploadApi;
pub use watchlists::WatchlistApi;
